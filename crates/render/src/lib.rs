#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::must_use_candidate)]

//! Render engine for rtr scenes: the offline accumulation and real-time session state
//! machine, the GPU backend seam, and its wgpu implementation.

pub mod backend;
pub mod engine;
pub mod error;
pub mod fps;
pub mod gpu_types;
pub mod pipeline;
pub mod run;
pub mod wgpu_backend;

pub use backend::{DrawInputs, Program, RenderBackend, Viewport};
pub use engine::{
    Command, EngineConfig, EngineHandle, FrameTick, RenderEngine, SessionMode, Status, Tick,
    DEFAULT_MAX_SAMPLES,
};
pub use error::RenderError;
pub use gpu_types::{CameraUniform, FrameUniform, DEFAULT_BACKGROUND};
pub use run::{run_headless, FixedClock, FrameClock};
pub use wgpu_backend::WgpuBackend;
