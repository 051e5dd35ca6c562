//! Regular cubic grid over an axis aligned box

use glam::{UVec3, Vec3};

/// `resolution³` cells spanning `[min, max]`.
///
/// Cells are indexed linearly with x varying fastest, then y, then z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    resolution: u32,
    min: Vec3,
    max: Vec3,
}

impl Grid {
    /// Callers validate the box and resolution; see [`crate::ExportSettings::grid`].
    pub(crate) fn new(resolution: u32, min: Vec3, max: Vec3) -> Self {
        Self { resolution, min, max }
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn min(&self) -> Vec3 {
        self.min
    }

    pub fn max(&self) -> Vec3 {
        self.max
    }

    /// Number of cells
    pub fn len(&self) -> usize {
        let r = self.resolution as usize;
        r * r * r
    }

    pub fn is_empty(&self) -> bool {
        self.resolution == 0
    }

    /// Edge lengths of one cell
    pub fn cell_size(&self) -> Vec3 {
        #[allow(clippy::cast_precision_loss)]
        let r = self.resolution as f32;
        (self.max - self.min) / r
    }

    /// Linear index of cell `(i, j, k)`
    pub fn index(&self, i: u32, j: u32, k: u32) -> usize {
        let r = self.resolution as usize;
        i as usize + r * (j as usize + r * k as usize)
    }

    /// Inverse of [`Grid::index`]
    pub fn cell(&self, index: usize) -> UVec3 {
        let r = self.resolution as usize;
        #[allow(clippy::cast_possible_truncation)]
        let component = |v: usize| (v % r) as u32;
        UVec3::new(component(index), component(index / r), component(index / (r * r)))
    }

    /// World position of the center of cell `(i, j, k)`
    #[allow(clippy::cast_precision_loss)]
    pub fn cell_center(&self, i: u32, j: u32, k: u32) -> Vec3 {
        let cell = Vec3::new(i as f32, j as f32, k as f32) + 0.5;
        self.min + cell * self.cell_size()
    }

    /// Center of the cell at linear `index`
    pub fn center_of(&self, index: usize) -> Vec3 {
        let c = self.cell(index);
        self.cell_center(c.x, c.y, c.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_round_trips_through_cell() {
        let grid = Grid::new(3, Vec3::ZERO, Vec3::ONE);
        assert_eq!(grid.len(), 27);
        assert_eq!(grid.index(1, 0, 0), 1);
        assert_eq!(grid.index(0, 1, 0), 3);
        assert_eq!(grid.index(0, 0, 1), 9);
        for index in 0..grid.len() {
            let c = grid.cell(index);
            assert_eq!(grid.index(c.x, c.y, c.z), index);
        }
    }

    #[test]
    fn centers_sit_inside_their_cells() {
        let grid = Grid::new(2, Vec3::splat(-1.0), Vec3::new(1.0, 3.0, 1.0));
        assert_eq!(grid.cell_size(), Vec3::new(1.0, 2.0, 1.0));
        assert_eq!(grid.cell_center(0, 0, 0), Vec3::new(-0.5, 0.0, -0.5));
        assert_eq!(grid.cell_center(1, 1, 1), Vec3::new(0.5, 2.0, 0.5));
        assert_eq!(grid.center_of(grid.index(1, 0, 1)), Vec3::new(0.5, 0.0, 0.5));
    }
}
