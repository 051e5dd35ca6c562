//! The seam between the render engine and the GPU.

use anyhow::Result;
use scene::Camera;
use shadergen::Binding;

use crate::gpu_types::FrameUniform;

/// Size of the presentable surface in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn as_vec2(&self) -> glam::Vec2 {
        glam::Vec2::new(self.width as f32, self.height as f32)
    }
}

/// A generated shader and the bindings it declares
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub source: String,
    pub bindings: Vec<Binding>,
    /// Entry points are `fs_trace` and `fs_present` when false, `fs_main` when true
    pub real_time: bool,
}

/// Uniform values for one draw
#[derive(Debug, Clone, Copy)]
pub struct DrawInputs<'a> {
    pub camera: &'a Camera,
    pub frame: FrameUniform,
}

/// GPU operations the engine's state machine is built from.
///
/// The engine calls these in a fixed pattern. An offline session calls
/// `allocate_accumulation` once, then per frame `draw_sample`, `accumulate` and `present`.
/// A real-time session calls `draw_direct` once per frame. Every call happens on the thread
/// that drives the engine.
pub trait RenderBackend {
    /// Compiles `program` and makes it current.
    fn load_program(&mut self, program: &Program) -> Result<()>;

    /// Allocates a zeroed accumulation buffer of `viewport` size, replacing any previous one.
    fn allocate_accumulation(&mut self, viewport: Viewport) -> Result<()>;

    /// Drops the accumulation buffer. Must be a no-op without one.
    fn release_accumulation(&mut self);

    /// Draws one new sample into the transient trace buffer.
    fn draw_sample(&mut self, inputs: &DrawInputs<'_>) -> Result<()>;

    /// Makes the trace buffer the new accumulated sum.
    fn accumulate(&mut self) -> Result<()>;

    /// Shows the accumulation buffer scaled by `inputs.frame.one_over_sample_count`.
    fn present(&mut self, inputs: &DrawInputs<'_>) -> Result<()>;

    /// Draws one sample straight to the output.
    fn draw_direct(&mut self, inputs: &DrawInputs<'_>) -> Result<()>;

    /// Resizes the output surface.
    fn resize(&mut self, viewport: Viewport) -> Result<()>;
}
