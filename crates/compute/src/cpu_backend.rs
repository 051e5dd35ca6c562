use std::ops::Range;

use scene::Scene;

use crate::backend::check_range;
use crate::{ComputeError, FieldSampler, Grid};

/// Samples the scene with the CPU distance functions of the scene crate
#[derive(Debug, Clone)]
pub struct CpuSampler {
    scene: Scene,
}

impl CpuSampler {
    pub fn new(scene: Scene) -> Self {
        Self { scene }
    }
}

impl FieldSampler for CpuSampler {
    fn sample(&self, grid: &Grid, cells: Range<usize>) -> Result<Vec<f32>, ComputeError> {
        check_range(grid, &cells)?;
        Ok(cells
            .map(|index| self.scene.distance(grid.center_of(index)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use scene::{Color, Material, SceneObject, Shape};

    fn unit_sphere() -> Scene {
        Scene::new(
            vec![SceneObject {
                id: 0,
                shape: Shape::Sphere { center: Vec3::ZERO, radius: 1.0 },
                material: Material::Lambert,
                color: Color::default(),
            }],
            None,
            scene::RendererSettings::default(),
            None,
        )
    }

    #[test]
    fn out_of_range_cells_fail() {
        let sampler = CpuSampler::new(unit_sphere());
        let grid = Grid::new(2, Vec3::splat(-2.0), Vec3::splat(2.0));
        let result = sampler.sample(&grid, 4..9);
        assert!(
            matches!(result, Err(ComputeError::RangeOutOfBounds { end: 9, len: 8, .. })),
            "expected RangeOutOfBounds, got {result:?}"
        );
    }

    #[test]
    fn empty_scene_samples_match_the_kernel() {
        let sampler = CpuSampler::new(Scene::new(Vec::new(), None, scene::RendererSettings::default(), None));
        let grid = Grid::new(2, Vec3::splat(-1.0), Vec3::ONE);
        let values = sampler.sample(&grid, 0..grid.len()).unwrap();
        assert!(values.iter().all(|v| (v - scene::MAX_DISTANCE).abs() < 1e-6), "{values:?}");
    }

    #[test]
    fn samples_follow_cell_order() {
        let sampler = CpuSampler::new(unit_sphere());
        let grid = Grid::new(2, Vec3::splat(-2.0), Vec3::splat(2.0));
        let values = sampler.sample(&grid, 0..grid.len()).unwrap();
        let expected = Vec3::splat(1.0).length() - 1.0;
        assert_eq!(values.len(), 8);
        for value in values {
            assert!((value - expected).abs() < 1e-6);
        }
        assert!(sampler.sample(&grid, 3..3).unwrap().is_empty());
    }
}
