#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::must_use_candidate)]

//! Signed distance field export.
//!
//! A [`Grid`] partitions an axis aligned box into cubic cells. An [`ExportJob`] walks the
//! cells in bounded batches, asks a [`FieldSampler`] for the scene distance at each cell
//! center and collects the results into [`VolumeSamples`]. Samplers run either on the CPU
//! ([`CpuSampler`]) or on the GPU through the generated `cs_export` kernel
//! ([`WgpuSampler`], behind the `gpu` feature).

use thiserror::Error;

pub mod backend;
pub mod export;
pub mod grid;
pub mod layout;

#[cfg(feature = "cpu")]
mod cpu_backend;
#[cfg(feature = "gpu")]
mod wgpu_backend;

pub use backend::FieldSampler;
#[cfg(feature = "cpu")]
pub use cpu_backend::CpuSampler;
pub use export::{
    export, CancelToken, ExportError, ExportJob, ExportSettings, VolumeSamples, DEFAULT_BATCH_SIZE,
    MAX_EXPORT_RESOLUTION,
};
pub use grid::Grid;
#[cfg(feature = "gpu")]
pub use wgpu_backend::WgpuSampler;

#[derive(Error, Debug)]
pub enum ComputeError {
    #[error("cell range {start}..{end} is outside a grid of {len} cells")]
    RangeOutOfBounds { start: usize, end: usize, len: usize },
    #[error("backend not available")]
    BackendUnavailable,
    #[error("shader generation failed: {0}")]
    Shader(#[from] shadergen::ShaderError),
    #[error("GPU readback failed: {0}")]
    Readback(String),
}
