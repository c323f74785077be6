//! Engine command line

use std::path::{Path, PathBuf};

use slicekit_settings::calculations::machine_center_coords;
use slicekit_settings::{ProfileStore, SettingsResult};

use super::settings::EngineSettings;
use crate::emitter::ULTIGCODE;

/// One object to slice
#[derive(Debug, Clone, PartialEq)]
pub struct SlicerObject {
    /// Binary mesh file
    pub mesh: PathBuf,
    /// Row-major 3x3 transform
    pub matrix: [f64; 9],
    /// Position on the platform relative to its centre, in mm
    pub position: [f64; 2],
}

impl SlicerObject {
    pub fn new(mesh: impl Into<PathBuf>, position: [f64; 2]) -> Self {
        Self {
            mesh: mesh.into(),
            matrix: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
            position,
        }
    }

    pub fn with_matrix(mut self, matrix: [f64; 9]) -> Self {
        self.matrix = matrix;
        self
    }
}

/// Everything needed to run the engine once
#[derive(Debug, Clone, PartialEq)]
pub struct SlicerCommand {
    pub binary: PathBuf,
    pub settings: EngineSettings,
    pub objects: Vec<SlicerObject>,
    pub output: PathBuf,
    /// Platform centre in mm, added to every object position
    pub center: [f64; 2],
    /// Filament diameter when the engine reports filament as volume
    pub volumetric_diameter: Option<f64>,
}

impl SlicerCommand {
    pub fn new(binary: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            settings: EngineSettings::new(),
            objects: Vec::new(),
            output: output.into(),
            center: [0.0, 0.0],
            volumetric_diameter: None,
        }
    }

    /// Command for `objects` with settings taken from the profile
    pub fn from_profile(
        binary: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        profile: &ProfileStore,
        objects: Vec<SlicerObject>,
        extruder_count: usize,
    ) -> SettingsResult<Self> {
        let ultigcode = profile.get_setting("gcode_flavor") == Some(ULTIGCODE);
        Ok(Self {
            settings: EngineSettings::from_profile(profile, extruder_count)?,
            objects,
            center: machine_center_coords(profile),
            volumetric_diameter: ultigcode.then(|| profile.get_setting_float("filament_diameter")),
            ..Self::new(binary, output)
        })
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_object(mut self, object: SlicerObject) -> Self {
        self.objects.push(object);
        self
    }

    pub fn with_center(mut self, center: [f64; 2]) -> Self {
        self.center = center;
        self
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Arguments after the binary.
    ///
    /// The output file comes before the objects because the engine slices
    /// each mesh as soon as it reads its path.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["-v".to_string(), "-p".to_string()];
        for (key, value) in self.settings.iter() {
            args.push("-s".to_string());
            args.push(format!("{}={}", key, value));
        }
        args.push("-o".to_string());
        args.push(self.output.display().to_string());

        for object in &self.objects {
            let matrix: Vec<String> = object.matrix.iter().map(|v| v.to_string()).collect();
            args.push("-m".to_string());
            args.push(matrix.join(","));
            args.push("-s".to_string());
            args.push(format!("posx={}", ((object.position[0] + self.center[0]) * 1000.0) as i64));
            args.push("-s".to_string());
            args.push(format!("posy={}", ((object.position[1] + self.center[1]) * 1000.0) as i64));
            args.push(object.mesh.display().to_string());
        }
        args
    }

    /// Single-line rendering for logs
    pub fn display(&self) -> String {
        let mut line = self.binary.display().to_string();
        for arg in self.args() {
            line.push(' ');
            if arg.contains('\n') {
                line.push_str("<code>");
            } else {
                line.push_str(&arg);
            }
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_order() {
        let mut settings = EngineSettings::new();
        settings.set_int("printSpeed", 50).set_int("layerThickness", 100);
        let command = SlicerCommand::new("engine", "/tmp/out.gcode")
            .with_settings(settings)
            .with_center([100.0, 100.0])
            .with_object(SlicerObject::new("/tmp/a.stl", [10.0, -5.5]));

        assert_eq!(
            command.args(),
            vec![
                "-v",
                "-p",
                "-s",
                "layerThickness=100",
                "-s",
                "printSpeed=50",
                "-o",
                "/tmp/out.gcode",
                "-m",
                "1,0,0,0,1,0,0,0,1",
                "-s",
                "posx=110000",
                "-s",
                "posy=94500",
                "/tmp/a.stl",
            ]
        );
    }

    #[test]
    fn test_from_profile_centres_on_machine() {
        let profile = ProfileStore::new();
        let command = SlicerCommand::from_profile("engine", "out.gcode", &profile, Vec::new(), 1).expect("command");
        assert_eq!(command.center, machine_center_coords(&profile));
        assert!(command.volumetric_diameter.is_none());
        assert!(command.display().contains(" -s <code>"));
    }
}
