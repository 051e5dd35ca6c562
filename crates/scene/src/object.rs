//! Scene object model: primitives, their surface description, and the compiled scene.

use glam::Vec3;

use crate::camera::CameraSpec;
use crate::distance::MAX_DISTANCE;
use crate::expr::ColorExpr;
use crate::material::Material;
use crate::sdf::{Geometry, SdfNode};
use crate::settings::{RenderMode, RendererSettings, SdfExportSettings};

/// Surface color of an object
#[derive(Debug, Clone, PartialEq)]
pub enum Color {
    Literal(Vec3),
    /// Evaluated per surface point in the shader
    Expression(ColorExpr),
}

impl Default for Color {
    fn default() -> Self {
        Color::Literal(Vec3::splat(0.8))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Analytic sphere, intersected in closed form in raytrace mode
    Sphere { center: Vec3, radius: f32 },
    /// Distance field object, always ray-marched
    Sdf(SdfNode),
}

impl Shape {
    /// The shape expressed as a distance field
    #[must_use]
    pub fn to_sdf(&self) -> SdfNode {
        match self {
            Shape::Sphere { center, radius } => {
                SdfNode::primitive(Geometry::Sphere, *center, Vec3::splat(*radius))
            }
            Shape::Sdf(node) => node.clone(),
        }
    }

    #[must_use]
    pub fn distance(&self, p: Vec3) -> f32 {
        match self {
            Shape::Sphere { center, radius } => (p - *center).length() - radius,
            Shape::Sdf(node) => node.distance(p),
        }
    }

    #[must_use]
    pub fn is_sdf(&self) -> bool {
        matches!(self, Shape::Sdf(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    /// Position in the object list
    pub id: u32,
    pub shape: Shape,
    pub material: Material,
    pub color: Color,
}

/// Result of a successful compile. Immutable; a recompile produces a new value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Scene {
    pub objects: Vec<SceneObject>,
    pub camera: Option<CameraSpec>,
    pub renderer_settings: RendererSettings,
    pub sdf_export_settings: Option<SdfExportSettings>,
    pub has_sdf_geometries: bool,
}

impl Scene {
    #[must_use]
    pub fn new(
        objects: Vec<SceneObject>,
        camera: Option<CameraSpec>,
        renderer_settings: RendererSettings,
        sdf_export_settings: Option<SdfExportSettings>,
    ) -> Self {
        let has_sdf_geometries = objects.iter().any(|o| o.shape.is_sdf());
        Self {
            objects,
            camera,
            renderer_settings,
            sdf_export_settings,
            has_sdf_geometries,
        }
    }

    /// Render mode requested by the scene, raytrace when unspecified
    #[must_use]
    pub fn render_mode(&self) -> RenderMode {
        self.renderer_settings.render_mode.unwrap_or_default()
    }

    /// Union of every object's distance field at `p`, [`MAX_DISTANCE`] for an empty scene
    #[must_use]
    pub fn distance(&self, p: Vec3) -> f32 {
        self.objects
            .iter()
            .map(|o| o.shape.distance(p))
            .reduce(f32::min)
            .unwrap_or(MAX_DISTANCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(id: u32, shape: Shape) -> SceneObject {
        SceneObject {
            id,
            shape,
            material: Material::Lambert,
            color: Color::default(),
        }
    }

    #[test]
    fn sdf_flag_follows_object_list() {
        let sphere = Shape::Sphere {
            center: Vec3::ZERO,
            radius: 1.0,
        };
        let scene = Scene::new(vec![object(0, sphere.clone())], None, RendererSettings::default(), None);
        assert!(!scene.has_sdf_geometries);
        assert_eq!(scene.render_mode(), RenderMode::Raytrace);

        let scene = Scene::new(
            vec![object(0, sphere.clone()), object(1, Shape::Sdf(sphere.to_sdf()))],
            None,
            RendererSettings::default(),
            None,
        );
        assert!(scene.has_sdf_geometries);
    }

    #[test]
    fn scene_distance_is_union_of_objects() {
        let a = Shape::Sphere {
            center: Vec3::new(-2.0, 0.0, 0.0),
            radius: 1.0,
        };
        let b = Shape::Sdf(SdfNode::primitive(Geometry::Box, Vec3::new(2.0, 0.0, 0.0), Vec3::ONE));
        let scene = Scene::new(vec![object(0, a.clone()), object(1, b.clone())], None, RendererSettings::default(), None);

        for p in [Vec3::ZERO, Vec3::new(-2.0, 0.5, 0.0), Vec3::new(3.0, 3.0, 3.0)] {
            let d = scene.distance(p);
            assert!(d <= a.distance(p) + 1e-6);
            assert!(d <= b.distance(p) + 1e-6);
        }
        assert!((scene.distance(Vec3::ZERO) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn empty_scene_is_max_distance_away() {
        let scene = Scene::new(Vec::new(), None, RendererSettings::default(), None);
        assert!((scene.distance(Vec3::ZERO) - MAX_DISTANCE).abs() < 1e-6);
        assert!(scene.distance(Vec3::splat(1.0e4)).is_finite());
    }

    #[test]
    fn analytic_sphere_matches_its_distance_field() {
        let shape = Shape::Sphere {
            center: Vec3::new(0.5, 1.0, -1.0),
            radius: 0.75,
        };
        let sdf = shape.to_sdf();
        for p in [Vec3::ZERO, Vec3::ONE, Vec3::new(0.5, 1.0, -1.0)] {
            assert!((shape.distance(p) - sdf.distance(p)).abs() < 1e-6);
        }
    }
}
