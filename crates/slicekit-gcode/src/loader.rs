//! G-code file loading.
//!
//! Streams a file through the [`Interpreter`] with a large buffered
//! reader. Progress is reported as the fraction of bytes consumed; the
//! callback returns `true` to abort, in which case the partial document is
//! dropped and `None` comes back.

use anyhow::{anyhow, Context, Result};
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;

use slicekit_core::{AppEvent, EventBus, FileEvent};
use slicekit_settings::registry::MAX_EXTRUDERS;
use slicekit_settings::ProfileStore;

use crate::interpreter::Interpreter;
use crate::model::GcodeDocument;

/// Buffer size for reading large files (256 KB)
const READ_BUFFER_SIZE: usize = 256 * 1024;

/// Default fraction of the file between two progress reports
pub const DEFAULT_PROGRESS_STEP: f64 = 0.01;

/// Loads G-code files into [`GcodeDocument`]s
#[derive(Debug, Clone)]
pub struct GcodeLoader {
    offsets: Vec<(f64, f64)>,
    progress_step: f64,
    bus: Option<Arc<EventBus>>,
}

impl Default for GcodeLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl GcodeLoader {
    pub fn new() -> Self {
        Self {
            offsets: Vec::new(),
            progress_step: DEFAULT_PROGRESS_STEP,
            bus: None,
        }
    }

    /// Loader using the profile's nozzle offsets for tool changes.
    ///
    /// The offsets are copied; later profile edits do not affect it.
    pub fn from_profile(profile: &ProfileStore) -> Self {
        Self {
            offsets: (0..MAX_EXTRUDERS).map(|n| profile.nozzle_offset(n)).collect(),
            ..Self::new()
        }
    }

    pub fn with_progress_step(mut self, step: f64) -> Self {
        self.progress_step = step.clamp(0.0, 1.0);
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    fn publish(&self, event: FileEvent) {
        if let Some(bus) = &self.bus {
            if bus.publish(AppEvent::File(event)).is_err() {
                tracing::trace!("File event had no subscribers");
            }
        }
    }

    /// Interpret a stream of `total_bytes` bytes.
    ///
    /// A `total_bytes` of zero disables progress reports.
    ///
    /// # Errors
    /// Returns error only when the reader fails
    pub fn load_reader<R, F>(&self, mut reader: R, total_bytes: u64, mut progress: F) -> Result<Option<GcodeDocument>>
    where
        R: BufRead,
        F: FnMut(f64) -> bool,
    {
        let mut interpreter = Interpreter::with_extruder_offsets(self.offsets.clone());
        let mut buf = Vec::new();
        let mut bytes_read = 0u64;
        let mut next_report = self.progress_step;

        loop {
            buf.clear();
            let n = reader.read_until(b'\n', &mut buf)?;
            if n == 0 {
                break;
            }
            bytes_read += n as u64;

            let line = String::from_utf8_lossy(&buf);
            interpreter.feed_line(line.trim_end_matches(['\r', '\n']));

            if total_bytes > 0 {
                let fraction = (bytes_read as f64 / total_bytes as f64).min(1.0);
                if fraction >= next_report {
                    if progress(fraction) {
                        tracing::debug!(
                            "Load aborted after {} lines ({:.0}%)",
                            interpreter.lines_read(),
                            fraction * 100.0
                        );
                        return Ok(None);
                    }
                    next_report = fraction + self.progress_step;
                }
            }
        }

        let document = interpreter.finish();
        if total_bytes > 0 {
            // Completion report; aborting now has nothing left to stop
            let _ = progress(1.0);
        }
        Ok(Some(document))
    }

    /// Load a file from disk
    ///
    /// # Errors
    /// Returns error if the file does not exist or cannot be read
    pub fn load_file<F>(&self, path: impl AsRef<Path>, progress: F) -> Result<Option<GcodeDocument>>
    where
        F: FnMut(f64) -> bool,
    {
        let path = path.as_ref();
        if !path.exists() {
            return Err(anyhow!("File does not exist: {}", path.display()));
        }
        if !path.is_file() {
            return Err(anyhow!("Path is not a file: {}", path.display()));
        }
        let file_size = fs::metadata(path)?.len();
        let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;

        self.publish(FileEvent::LoadStarted {
            path: path.to_path_buf(),
        });
        let reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);
        match self.load_reader(reader, file_size, progress)? {
            Some(mut document) => {
                document.source = Some(path.to_path_buf());
                tracing::info!(
                    "Loaded {} ({} layers, {:.2} m filament)",
                    path.display(),
                    document.layer_count(),
                    document.extrusion_amount / 1000.0
                );
                self.publish(FileEvent::Loaded {
                    path: path.to_path_buf(),
                    layers: document.layer_count(),
                });
                Ok(Some(document))
            }
            None => {
                self.publish(FileEvent::LoadCancelled);
                Ok(None)
            }
        }
    }

    /// Load a file on the blocking thread pool.
    ///
    /// Must be called from within a tokio runtime.
    pub fn load_in_background<F>(self, path: PathBuf, progress: F) -> JoinHandle<Result<Option<GcodeDocument>>>
    where
        F: FnMut(f64) -> bool + Send + 'static,
    {
        tokio::task::spawn_blocking(move || self.load_file(&path, progress))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    fn layered_gcode(layers: usize) -> String {
        let mut text = String::from(";TYPE:WALL-OUTER\n");
        for n in 0..layers {
            text.push_str(&format!(";LAYER:{}\nG0 Z{:.1}\nG1 X{} Y0 E{}\n", n, 0.2 * (n + 1) as f64, n + 1, n + 1));
        }
        text
    }

    #[test]
    fn test_load_reader_reports_progress() {
        let text = layered_gcode(50);
        let mut reports = Vec::new();
        let doc = GcodeLoader::new()
            .with_progress_step(0.1)
            .load_reader(Cursor::new(text.as_bytes()), text.len() as u64, |f| {
                reports.push(f);
                false
            })
            .expect("load")
            .expect("not cancelled");

        assert_eq!(doc.layer_count(), 50);
        assert!((5..=12).contains(&reports.len()), "{reports:?}");
        assert!(reports.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(reports.last().copied(), Some(1.0));
    }

    #[test]
    fn test_abort_returns_none() {
        let text = layered_gcode(20);
        let result = GcodeLoader::new()
            .load_reader(Cursor::new(text.as_bytes()), text.len() as u64, |f| f > 0.5)
            .expect("load");
        assert!(result.is_none());
    }

    #[test]
    fn test_load_file_sets_source_and_events() {
        let bus = Arc::new(EventBus::new());
        let events = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = events.clone();
        bus.subscribe(slicekit_core::EventFilter::All, move |e| sink.lock().push(e));

        let mut file = NamedTempFile::new().expect("temp");
        file.write_all(layered_gcode(3).as_bytes()).expect("write");

        let doc = GcodeLoader::new()
            .with_event_bus(bus)
            .load_file(file.path(), |_| false)
            .expect("load")
            .expect("document");
        assert_eq!(doc.source.as_deref(), Some(file.path()));

        let events = events.lock();
        assert!(matches!(events.first(), Some(AppEvent::File(FileEvent::LoadStarted { .. }))));
        assert!(matches!(events.last(), Some(AppEvent::File(FileEvent::Loaded { layers: 3, .. }))));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().expect("dir");
        let err = GcodeLoader::new()
            .load_file(dir.path().join("nope.gcode"), |_| false)
            .expect_err("missing");
        assert!(err.to_string().contains("does not exist"));
        assert!(GcodeLoader::new().load_file(dir.path(), |_| false).is_err());
    }

    #[tokio::test]
    async fn test_load_in_background() {
        let mut file = NamedTempFile::new().expect("temp");
        file.write_all(layered_gcode(5).as_bytes()).expect("write");

        let handle = GcodeLoader::new().load_in_background(file.path().to_path_buf(), |_| false);
        let doc = handle.await.expect("join").expect("load").expect("document");
        assert_eq!(doc.layer_count(), 5);
    }
}
