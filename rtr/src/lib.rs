#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::must_use_candidate)]

//! # rtr
//!
//! A progressive ray tracer and SDF ray marcher for declarative scene files.
//!
//! A scene file is compiled by [`scene`] into an immutable object model, turned into WGSL
//! by [`shadergen`], and rendered by the [`render`] engine, either accumulating samples
//! into a converged image or redrawing continuously in real time. [`compute`] samples the
//! same scene as a signed distance volume for export.
//!
//! This crate is the thin layer on top: the [`store`] that holds application state and
//! turns user actions into engine commands, scene file [`loader`] and [`watcher`], and the
//! [`app`] that runs it all in a window, headless or as an export job.

pub mod app;
pub mod loader;
pub mod store;
pub mod watcher;

pub use compute;
pub use render;
pub use scene;
pub use shadergen;
