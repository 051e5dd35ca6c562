//! Renderer and export settings carried by a scene file

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// How the renderer evaluates geometry.
///
/// `Raytrace` intersects analytic spheres in closed form and marches SDF objects; `Sdf`
/// marches everything, spheres included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    #[default]
    Raytrace,
    Sdf,
}

impl std::fmt::Display for RenderMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RenderMode::Raytrace => "raytrace",
            RenderMode::Sdf => "sdf",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RendererSettings {
    #[serde(default)]
    pub render_mode: Option<RenderMode>,
    #[serde(default)]
    pub max_samples: Option<u32>,
    /// Background gradient, bottom color then top color
    #[serde(default)]
    pub background: Option<[Vec3; 2]>,
}

/// Volume export parameters as they appear in a scene file. Values are checked when an
/// export is started, not when the scene is compiled.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SdfExportSettings {
    #[serde(default)]
    pub resolution: Option<i64>,
    #[serde(default)]
    pub min_coords: Option<Vec3>,
    #[serde(default)]
    pub max_coords: Option<Vec3>,
}
