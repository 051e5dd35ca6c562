use std::ops::Range;

use crate::{ComputeError, Grid};

pub trait FieldSampler {
    /// Evaluates the scene distance at the centers of the cells in `cells`.
    ///
    /// `cells` holds linear indices into `grid` (see [`Grid::index`]). The returned vector
    /// has one value per cell, in the same order.
    ///
    /// # Errors
    ///
    /// Returns [`ComputeError::RangeOutOfBounds`] if `cells` reaches past the end of the
    /// grid. GPU samplers may also fail with readback or device errors.
    fn sample(&self, grid: &Grid, cells: Range<usize>) -> Result<Vec<f32>, ComputeError>;
}

/// Rejects ranges that do not fit in `grid`
pub(crate) fn check_range(grid: &Grid, cells: &Range<usize>) -> Result<(), ComputeError> {
    if cells.start > cells.end || cells.end > grid.len() {
        return Err(ComputeError::RangeOutOfBounds {
            start: cells.start,
            end: cells.end,
            len: grid.len(),
        });
    }
    Ok(())
}

impl<T: FieldSampler + ?Sized> FieldSampler for Box<T> {
    fn sample(&self, grid: &Grid, cells: Range<usize>) -> Result<Vec<f32>, ComputeError> {
        (**self).sample(grid, cells)
    }
}

impl<T: FieldSampler + ?Sized> FieldSampler for &T {
    fn sample(&self, grid: &Grid, cells: Range<usize>) -> Result<Vec<f32>, ComputeError> {
        (**self).sample(grid, cells)
    }
}
