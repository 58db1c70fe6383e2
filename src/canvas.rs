//! Drawing surfaces
//!
//! Painting is a renderer concern. The pipeline only hands a finished,
//! ordered instruction list to a surface obtained from a `CanvasSupplier`.

use crate::primitives::Primitive;

/// Something primitives can be painted onto
pub trait DrawingSurface: Send {
    fn size(&self) -> (u32, u32);

    fn paint(&mut self, primitive: &Primitive);
}

/// Hands out a fresh surface sized for a template
pub trait CanvasSupplier: Send + Sync {
    fn supply(&self, width: u32, height: u32) -> Box<dyn DrawingSurface>;
}

/// Surface that keeps what was painted, in paint order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordingSurface {
    width: u32,
    height: u32,
    painted: Vec<Primitive>,
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, painted: vec![] }
    }

    pub fn painted(&self) -> &[Primitive] {
        &self.painted
    }
}

impl DrawingSurface for RecordingSurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn paint(&mut self, primitive: &Primitive) {
        self.painted.push(primitive.clone());
    }
}

/// Supplies `RecordingSurface`s
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordingCanvasSupplier;

impl CanvasSupplier for RecordingCanvasSupplier {
    fn supply(&self, width: u32, height: u32) -> Box<dyn DrawingSurface> {
        Box::new(RecordingSurface::new(width, height))
    }
}
