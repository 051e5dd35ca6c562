#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::must_use_candidate)]

//! Scene description for the rtr renderer: camera model, object model, SDF trees and the
//! compiler that turns scene text into a [`Scene`].

pub mod camera;
pub mod compiler;
pub mod distance;
pub mod expr;
pub mod material;
pub mod object;
pub mod sdf;
pub mod settings;

pub use camera::{Camera, CameraError, CameraSpec, UniformKind, UniformValue, CAMERA_UNIFORM_LAYOUT};
pub use compiler::{compile, SceneEvalError};
pub use distance::MAX_DISTANCE;
pub use expr::{ColorExpr, ExprError};
pub use material::{Material, MaterialError};
pub use object::{Color, Scene, SceneObject, Shape};
pub use sdf::{Geometry, SdfError, SdfNode, SdfPrimitive, MAX_SDF_DEPTH};
pub use settings::{RenderMode, RendererSettings, SdfExportSettings};
