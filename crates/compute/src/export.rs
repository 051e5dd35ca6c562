//! Batched volume export.
//!
//! [`ExportJob`] is a step machine: every [`ExportJob::step`] samples one batch of cells
//! and reports the fraction of the grid done so far. A host with its own event loop calls
//! `step` once per frame. [`export`] drives a job to completion in one call. Either way the
//! [`CancelToken`] is checked before each batch, and a cancelled job never hands out its
//! partial values.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use glam::{UVec3, Vec3};
use scene::SdfExportSettings;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ComputeError, FieldSampler, Grid};

/// Largest accepted grid resolution per axis
pub const MAX_EXPORT_RESOLUTION: i64 = 512;

/// Cells sampled per batch unless a job is configured otherwise
pub const DEFAULT_BATCH_SIZE: usize = 4096;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("export aborted")]
    Aborted,
    #[error("invalid bounds: min {min} must be component-wise less than max {max}")]
    InvalidBounds { min: Vec3, max: Vec3 },
    #[error("invalid resolution {0}: expected 1..={MAX_EXPORT_RESOLUTION}")]
    InvalidResolution(i64),
    #[error(transparent)]
    Sampler(#[from] ComputeError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportSettings {
    /// Cells per axis
    pub resolution: i64,
    pub min_coords: Vec3,
    pub max_coords: Vec3,
}

impl ExportSettings {
    /// Replaces every field the scene file sets
    #[must_use]
    pub fn with_overrides(self, overrides: &SdfExportSettings) -> Self {
        Self {
            resolution: overrides.resolution.unwrap_or(self.resolution),
            min_coords: overrides.min_coords.unwrap_or(self.min_coords),
            max_coords: overrides.max_coords.unwrap_or(self.max_coords),
        }
    }

    /// Validates the settings and builds the sampling grid.
    ///
    /// # Errors
    ///
    /// [`ExportError::InvalidResolution`] unless `1 <= resolution <= MAX_EXPORT_RESOLUTION`,
    /// [`ExportError::InvalidBounds`] unless both corners are finite and `min < max` on
    /// every axis.
    pub fn grid(&self) -> Result<Grid, ExportError> {
        let resolution = u32::try_from(self.resolution)
            .ok()
            .filter(|r| (1..=MAX_EXPORT_RESOLUTION).contains(&i64::from(*r)))
            .ok_or(ExportError::InvalidResolution(self.resolution))?;

        let (min, max) = (self.min_coords, self.max_coords);
        if !(min.is_finite() && max.is_finite() && min.cmplt(max).all()) {
            return Err(ExportError::InvalidBounds { min, max });
        }
        Ok(Grid::new(resolution, min, max))
    }
}

/// Cooperative cancellation flag shared between a job and whoever may stop it
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Dense scalar field sampled at cell centers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSamples {
    pub resolution: u32,
    pub min_coords: Vec3,
    pub max_coords: Vec3,
    /// One distance per cell, x fastest, then y, then z
    pub values: Vec<f32>,
}

impl VolumeSamples {
    pub fn grid(&self) -> Grid {
        Grid::new(self.resolution, self.min_coords, self.max_coords)
    }

    /// Distance sampled in cell `(i, j, k)`, `None` outside the grid
    pub fn value(&self, i: u32, j: u32, k: u32) -> Option<f32> {
        let r = self.resolution;
        if i >= r || j >= r || k >= r {
            return None;
        }
        self.values.get(self.grid().index(i, j, k)).copied()
    }

    /// World position the value of cell `(i, j, k)` was sampled at
    pub fn cell_center(&self, i: u32, j: u32, k: u32) -> Vec3 {
        self.grid().cell_center(i, j, k)
    }

    /// Iterates over `(cell, value)` pairs in storage order
    pub fn iter(&self) -> impl Iterator<Item = (UVec3, f32)> + '_ {
        let grid = self.grid();
        self.values
            .iter()
            .enumerate()
            .map(move |(index, value)| (grid.cell(index), *value))
    }
}

pub struct ExportJob<S> {
    sampler: S,
    grid: Grid,
    batch_size: usize,
    cancel: CancelToken,
    values: Vec<f32>,
}

impl<S: FieldSampler> ExportJob<S> {
    /// # Errors
    ///
    /// Fails when `settings` do not describe a valid grid, see [`ExportSettings::grid`].
    pub fn new(sampler: S, settings: &ExportSettings) -> Result<Self, ExportError> {
        let grid = settings.grid()?;
        tracing::info!(
            resolution = grid.resolution(),
            min = %grid.min(),
            max = %grid.max(),
            cells = grid.len(),
            "starting SDF export"
        );
        Ok(Self {
            sampler,
            grid,
            batch_size: DEFAULT_BATCH_SIZE,
            cancel: CancelToken::new(),
            // Reserved per batch in `step`
            values: Vec::new(),
        })
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[must_use]
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Total number of batches
    pub fn batch_count(&self) -> usize {
        self.grid.len().div_ceil(self.batch_size)
    }

    /// Fraction of cells sampled so far
    #[allow(clippy::cast_precision_loss)]
    pub fn progress(&self) -> f32 {
        self.values.len() as f32 / self.grid.len() as f32
    }

    pub fn is_finished(&self) -> bool {
        self.values.len() == self.grid.len()
    }

    /// Samples the next batch and returns the new progress.
    ///
    /// # Errors
    ///
    /// [`ExportError::Aborted`] if the job was cancelled before this batch started,
    /// [`ExportError::Sampler`] if the sampler failed.
    pub fn step(&mut self) -> Result<f32, ExportError> {
        if self.cancel.is_cancelled() {
            tracing::info!(progress = self.progress(), "SDF export cancelled");
            return Err(ExportError::Aborted);
        }
        if self.is_finished() {
            return Ok(1.0);
        }

        let start = self.values.len();
        let end = (start + self.batch_size).min(self.grid.len());
        let batch = self.sampler.sample(&self.grid, start..end)?;
        if batch.len() != end - start {
            return Err(ComputeError::Readback(format!(
                "expected {} samples, got {}",
                end - start,
                batch.len()
            ))
            .into());
        }
        self.values.reserve(batch.len());
        self.values.extend(batch);

        let progress = self.progress();
        tracing::debug!(start, end, progress, "sampled export batch");
        Ok(progress)
    }

    /// Hands out the samples of a finished job.
    ///
    /// # Errors
    ///
    /// [`ExportError::Aborted`] if the job was cancelled or has batches left.
    pub fn finish(self) -> Result<VolumeSamples, ExportError> {
        if self.cancel.is_cancelled() || !self.is_finished() {
            return Err(ExportError::Aborted);
        }
        tracing::info!(cells = self.values.len(), "SDF export finished");
        Ok(VolumeSamples {
            resolution: self.grid.resolution(),
            min_coords: self.grid.min(),
            max_coords: self.grid.max(),
            values: self.values,
        })
    }
}

/// Samples the whole grid described by `settings`.
///
/// `progress` is called after every batch with the fraction done. `cancel` is checked
/// before each batch; a cancelled export returns [`ExportError::Aborted`] and no values.
///
/// # Errors
///
/// See [`ExportJob::new`] and [`ExportJob::step`].
pub fn export<S: FieldSampler>(
    sampler: S,
    settings: &ExportSettings,
    mut progress: impl FnMut(f32),
    cancel: &CancelToken,
) -> Result<VolumeSamples, ExportError> {
    let mut job = ExportJob::new(sampler, settings)?.with_cancel_token(cancel.clone());
    while !job.is_finished() {
        progress(job.step()?);
    }
    job.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CpuSampler;
    use scene::Scene;

    fn settings(resolution: i64) -> ExportSettings {
        ExportSettings {
            resolution,
            min_coords: Vec3::splat(-1.0),
            max_coords: Vec3::splat(1.0),
        }
    }

    #[test]
    fn resolution_is_checked() {
        for resolution in [0, -3, MAX_EXPORT_RESOLUTION + 1] {
            let result = settings(resolution).grid();
            assert!(
                matches!(result, Err(ExportError::InvalidResolution(r)) if r == resolution),
                "{resolution}: {result:?}"
            );
        }
        assert_eq!(settings(MAX_EXPORT_RESOLUTION).grid().unwrap().resolution(), 512);
    }

    #[test]
    fn bounds_are_checked_per_axis() {
        let mut s = settings(4);
        s.max_coords.y = -1.0;
        assert!(matches!(s.grid(), Err(ExportError::InvalidBounds { .. })));

        s.max_coords.y = f32::INFINITY;
        assert!(matches!(s.grid(), Err(ExportError::InvalidBounds { .. })));
    }

    #[test]
    fn overrides_replace_only_given_fields() {
        let scene_settings = SdfExportSettings {
            resolution: Some(8),
            min_coords: None,
            max_coords: Some(Vec3::splat(2.0)),
        };
        let merged = settings(30).with_overrides(&scene_settings);
        assert_eq!(merged.resolution, 8);
        assert_eq!(merged.min_coords, Vec3::splat(-1.0));
        assert_eq!(merged.max_coords, Vec3::splat(2.0));
    }

    #[test]
    fn cancel_token_is_shared() {
        let token = CancelToken::new();
        let copy = token.clone();
        assert!(!copy.is_cancelled());
        token.cancel();
        assert!(copy.is_cancelled());
    }

    #[test]
    fn samples_are_allocated_per_batch() {
        let empty = Scene::new(Vec::new(), None, scene::RendererSettings::default(), None);
        let mut job = ExportJob::new(CpuSampler::new(empty), &settings(MAX_EXPORT_RESOLUTION)).unwrap();
        assert_eq!(job.values.capacity(), 0);

        job.step().unwrap();
        assert_eq!(job.values.len(), DEFAULT_BATCH_SIZE);
        assert!(job.values.capacity() < job.grid().len() / 1000);
    }

    #[test]
    fn volume_lookup_is_bounded() {
        let volume = VolumeSamples {
            resolution: 2,
            min_coords: Vec3::ZERO,
            max_coords: Vec3::splat(2.0),
            values: (0..8u8).map(f32::from).collect(),
        };
        assert_eq!(volume.value(1, 0, 0), Some(1.0));
        assert_eq!(volume.value(0, 1, 0), Some(2.0));
        assert_eq!(volume.value(1, 1, 1), Some(7.0));
        assert_eq!(volume.value(2, 0, 0), None);
        assert_eq!(volume.cell_center(1, 1, 1), Vec3::splat(1.5));
        assert_eq!(volume.iter().nth(4), Some((UVec3::new(0, 0, 1), 4.0)));
    }
}
