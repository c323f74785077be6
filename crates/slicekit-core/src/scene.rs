//! Scene graph stored as an arena.
//!
//! Nodes refer to each other through [`NodeId`] indices; ownership flows
//! from the scene to its nodes and parents are non-owning back references.

use glam::{Mat3, Mat4};
use serde::{Deserialize, Serialize};

use crate::geometry::{BoundingBox3D, Vec3};

/// Index of a node in its [`Scene`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Node({})", self.0)
    }
}

/// What a node represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// A printable mesh.
    Sliceable,
    /// A container whose children are printed together.
    Group,
}

/// One object in the scene
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneObject {
    /// Display name.
    pub name: String,
    /// Node kind.
    pub kind: NodeKind,
    /// World position of the object origin.
    pub position: Vec3,
    /// Linear part of the object transform.
    pub transform: Mat3,
    /// Mesh extents in object space.
    pub local_bounds: BoundingBox3D,
    /// Extruder the object prints with.
    pub extruder: usize,
    /// Written by the build volume boundary check.
    pub outside_build_area: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl SceneObject {
    /// Parent node, if any
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child nodes
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_group(&self) -> bool {
        self.kind == NodeKind::Group
    }

    /// Object-to-world matrix: the linear transform, then the position
    pub fn world_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position) * Mat4::from_mat3(self.transform)
    }

    /// Transform flattened row by row, as passed to the slicing engine
    pub fn transform_flat(&self) -> [f32; 9] {
        self.transform.transpose().to_cols_array()
    }

    /// World-space bounds of this node alone (no children)
    fn own_bounds(&self) -> BoundingBox3D {
        let lo = self.local_bounds.minimum;
        let hi = self.local_bounds.maximum;
        let world = self.world_matrix();
        let mut out: Option<BoundingBox3D> = None;
        for &x in &[lo.x, hi.x] {
            for &y in &[lo.y, hi.y] {
                for &z in &[lo.z, hi.z] {
                    let p = world.transform_point3(Vec3::new(x, y, z));
                    let corner = BoundingBox3D::new(p, p);
                    out = Some(match out {
                        Some(b) => b.union(&corner),
                        None => corner,
                    });
                }
            }
        }
        out.unwrap_or_default()
    }
}

/// Arena of scene nodes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scene {
    nodes: Vec<SceneObject>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a printable object with the given object-space bounds
    pub fn add_object(&mut self, name: impl Into<String>, local_bounds: BoundingBox3D) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(SceneObject {
            name: name.into(),
            kind: NodeKind::Sliceable,
            position: Vec3::ZERO,
            transform: Mat3::IDENTITY,
            local_bounds,
            extruder: 0,
            outside_build_area: false,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Group existing root nodes under a new group node
    ///
    /// Children that already have a parent are left where they are.
    pub fn add_group(&mut self, name: impl Into<String>, children: &[NodeId]) -> NodeId {
        let id = NodeId(self.nodes.len());
        let mut adopted = Vec::new();
        for &child in children {
            if let Some(node) = self.nodes.get_mut(child.0) {
                if node.parent.is_none() {
                    node.parent = Some(id);
                    adopted.push(child);
                }
            }
        }
        self.nodes.push(SceneObject {
            name: name.into(),
            kind: NodeKind::Group,
            position: Vec3::ZERO,
            transform: Mat3::IDENTITY,
            local_bounds: BoundingBox3D::default(),
            extruder: 0,
            outside_build_area: false,
            parent: None,
            children: adopted,
        });
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneObject> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneObject> {
        self.nodes.get_mut(id.0)
    }

    /// All node ids in insertion order
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Nodes without a parent
    pub fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.ids().filter(|id| self.nodes[id.0].parent.is_none())
    }

    /// Root-level printable nodes; a group counts once
    pub fn printable_root_count(&self) -> usize {
        self.roots().count()
    }

    /// Every sliceable node, at any depth
    pub fn sliceable_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.ids()
            .filter(|id| self.nodes[id.0].kind == NodeKind::Sliceable)
    }

    /// World-space bounds; a group spans its children
    pub fn bounding_box(&self, id: NodeId) -> Option<BoundingBox3D> {
        let node = self.nodes.get(id.0)?;
        match node.kind {
            NodeKind::Sliceable => Some(node.own_bounds()),
            NodeKind::Group => node
                .children
                .iter()
                .filter_map(|&c| self.bounding_box(c))
                .reduce(|a, b| a.union(&b)),
        }
    }

    /// Move a node and all of its descendants
    pub fn translate(&mut self, id: NodeId, offset: Vec3) {
        let Some(node) = self.nodes.get_mut(id.0) else {
            return;
        };
        node.position = node.position + offset;
        let children = node.children.clone();
        for child in children {
            self.translate(child, offset);
        }
    }

    /// Set the outside flag of a node
    pub fn set_outside_build_area(&mut self, id: NodeId, outside: bool) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.outside_build_area = outside;
        }
    }
}
