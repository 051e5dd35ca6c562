#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::must_use_candidate)]

//! WGSL generation for rtr scenes.
//!
//! [`generate`] lowers an object list and [`GenerateOptions`] into a [`ShaderIr`] and then
//! renders it as text. The IR lists exactly what the shader needs: bindings, baked
//! constants, shared library routines, per-object routines keyed by object id, and entry
//! points. Emission is a separate pass so tests can inspect what was selected without
//! matching on text.

use scene::{Camera, RenderMode, SceneObject};

pub use scene::MAX_DISTANCE;
use thiserror::Error;

pub mod emit;
pub mod ir;
pub mod layout;
mod wgsl;

pub use emit::emit;
pub use ir::{lower, Binding, BindingKind, Constant, ConstValue, EntryPoint, LibraryRoutine, ObjectRoutines, ShaderIr};

pub const MAX_BOUNCES: u32 = 8;
pub const MAX_MARCH_STEPS: u32 = 256;
pub const HIT_EPSILON: f32 = 0.0005;
pub const FUZZY_METAL_ROUGHNESS: f32 = 0.3;
pub const SHINY_METAL_ROUGHNESS: f32 = 0.02;
pub const GLASS_IOR: f32 = 1.5;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShaderError {
    #[error("object {id}: SDF tree depth {depth} exceeds the limit of {max}")]
    SdfDepthExceeded { id: u32, depth: usize, max: usize },

    #[error("sample count must be at least 1")]
    InvalidSampleCount,
}

/// Where the generated shader reads its camera from
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum CameraSource {
    /// The `camera` uniform block, updated by the host
    #[default]
    Uniform,
    /// Values baked into the source as constants
    Baked(Camera),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShaderTarget {
    /// Full screen pass: vertex stage plus fragment entry points
    #[default]
    Screen,
    /// `cs_export` compute kernel sampling the scene distance over a grid
    Grid,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerateOptions {
    /// Draw straight to the screen instead of accumulating
    pub real_time: bool,
    /// Samples averaged per draw in offline mode
    pub num_samples: u32,
    pub render_mode: RenderMode,
    pub camera: CameraSource,
    pub target: ShaderTarget,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            real_time: false,
            num_samples: 1,
            render_mode: RenderMode::Raytrace,
            camera: CameraSource::Uniform,
            target: ShaderTarget::Screen,
        }
    }
}

impl GenerateOptions {
    /// Options for the volume export kernel
    pub fn grid() -> Self {
        Self {
            render_mode: RenderMode::Sdf,
            target: ShaderTarget::Grid,
            ..Self::default()
        }
    }

    /// Samples taken per draw; real-time rendering always takes one
    pub fn samples_per_draw(&self) -> u32 {
        if self.real_time {
            1
        } else {
            self.num_samples
        }
    }
}

/// Generates WGSL source for `objects`.
///
/// # Errors
///
/// Fails when `num_samples` is zero or an SDF tree is deeper than
/// [`scene::MAX_SDF_DEPTH`].
pub fn generate(objects: &[SceneObject], options: &GenerateOptions) -> Result<String, ShaderError> {
    let ir = lower(objects, options)?;
    let source = emit(&ir);
    tracing::debug!(
        shader_target = ?options.target,
        mode = %options.render_mode,
        real_time = options.real_time,
        objects = objects.len(),
        bytes = source.len(),
        "generated shader"
    );
    Ok(source)
}
