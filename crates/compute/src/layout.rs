//! Host side of the `cs_export` kernel's bindings

use bytemuck::{Pod, Zeroable};
use shadergen::layout::{EXPORT_PARAMS_SIZE, EXPORT_WORKGROUP_SIZE};

use crate::Grid;

pub use shadergen::layout::{EXPORT_PARAMS_BINDING, EXPORT_VALUES_BINDING, GROUP};

/// Mirror of the WGSL `ExportParams` block
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ExportParams {
    pub min_coords: [f32; 4],
    pub cell_size: [f32; 4],
    pub resolution: u32,
    /// First linear cell index of the batch
    pub offset: u32,
    /// Cells in the batch
    pub count: u32,
    _pad0: u32,
}

const _: () = assert!(std::mem::size_of::<ExportParams>() as u64 == EXPORT_PARAMS_SIZE);

impl ExportParams {
    pub fn new(grid: &Grid, offset: u32, count: u32) -> Self {
        Self {
            min_coords: grid.min().extend(0.0).to_array(),
            cell_size: grid.cell_size().extend(0.0).to_array(),
            resolution: grid.resolution(),
            offset,
            count,
            _pad0: 0,
        }
    }
}

/// Workgroups needed to cover `count` cells
pub const fn workgroups(count: u32) -> u32 {
    count.div_ceil(EXPORT_WORKGROUP_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn params_carry_grid_geometry() {
        let grid = Grid::new(4, Vec3::splat(-1.0), Vec3::new(1.0, 3.0, 1.0));
        let params = ExportParams::new(&grid, 16, 32);
        assert_eq!(params.min_coords, [-1.0, -1.0, -1.0, 0.0]);
        assert_eq!(params.cell_size, [0.5, 1.0, 0.5, 0.0]);
        assert_eq!((params.resolution, params.offset, params.count), (4, 16, 32));
        assert_eq!(bytemuck::bytes_of(&params).len() as u64, EXPORT_PARAMS_SIZE);
    }

    #[test]
    fn workgroups_round_up() {
        assert_eq!(workgroups(0), 0);
        assert_eq!(workgroups(1), 1);
        assert_eq!(workgroups(EXPORT_WORKGROUP_SIZE), 1);
        assert_eq!(workgroups(EXPORT_WORKGROUP_SIZE + 1), 2);
    }
}
