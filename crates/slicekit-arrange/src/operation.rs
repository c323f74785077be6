//! Scene operations produced by the arranger.
//!
//! An [`OperationBatch`] is applied as a whole: every node it touches is
//! checked before the first one moves, so a failed apply leaves the scene
//! untouched.

use slicekit_core::{NodeId, Scene, Vec3};

use crate::error::{ArrangeError, ArrangeResult};

/// Move one node (and its children) by a fixed offset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TranslateOperation {
    pub node: NodeId,
    pub offset: Vec3,
}

impl TranslateOperation {
    pub fn new(node: NodeId, offset: Vec3) -> Self {
        Self { node, offset }
    }

    pub fn apply(&self, scene: &mut Scene) {
        scene.translate(self.node, self.offset);
    }

    pub fn undo(&self, scene: &mut Scene) {
        scene.translate(self.node, -self.offset);
    }
}

/// Named group of operations applied and undone together
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationBatch {
    name: String,
    operations: Vec<TranslateOperation>,
}

impl OperationBatch {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            operations: Vec::new(),
        }
    }

    pub fn push(&mut self, operation: TranslateOperation) {
        self.operations.push(operation);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn operations(&self) -> &[TranslateOperation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Offset the batch assigns to `node`, if any
    pub fn offset_of(&self, node: NodeId) -> Option<Vec3> {
        self.operations
            .iter()
            .filter(|op| op.node == node)
            .map(|op| op.offset)
            .reduce(|a, b| a + b)
    }

    fn check_nodes(&self, scene: &Scene) -> ArrangeResult<()> {
        match self.operations.iter().find(|op| scene.node(op.node).is_none()) {
            Some(op) => Err(ArrangeError::UnknownNode(op.node)),
            None => Ok(()),
        }
    }

    /// Apply every operation, or none of them
    pub fn apply(&self, scene: &mut Scene) -> ArrangeResult<()> {
        self.check_nodes(scene)?;
        for operation in &self.operations {
            operation.apply(scene);
        }
        tracing::debug!("Applied '{}' ({} operations)", self.name, self.operations.len());
        Ok(())
    }

    /// Revert the batch, last operation first
    pub fn undo(&self, scene: &mut Scene) -> ArrangeResult<()> {
        self.check_nodes(scene)?;
        for operation in self.operations.iter().rev() {
            operation.undo(scene);
        }
        tracing::debug!("Undid '{}'", self.name);
        Ok(())
    }
}

impl<'a> IntoIterator for &'a OperationBatch {
    type Item = &'a TranslateOperation;
    type IntoIter = std::slice::Iter<'a, TranslateOperation>;

    fn into_iter(self) -> Self::IntoIter {
        self.operations.iter()
    }
}
