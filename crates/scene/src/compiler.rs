//! Scene compiler: scene text in, [`Scene`] out.
//!
//! The author's document is placed inside a fixed envelope before parsing:
//!
//! ```text
//! {
//! "scene":
//!   <author line 1>
//!   <author line 2>
//!   ...
//! }
//! ```
//!
//! Parser locations are therefore two rows down and two columns right of the author's
//! text and are shifted back before being reported. Semantic checks that run after parsing
//! have no location and report row and column `-1`.

use glam::Vec3;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::camera::CameraSpec;
use crate::expr::ColorExpr;
use crate::material::Material;
use crate::object::{Color, Scene, SceneObject, Shape};
use crate::sdf::{Geometry, SdfNode};
use crate::settings::{RendererSettings, SdfExportSettings};

/// Rows and columns added by the envelope
const ENVELOPE_OFFSET: i64 = 2;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{row}:{column}: {message}")]
pub struct SceneEvalError {
    /// 1-based row in the author's text, `-1` when unknown
    pub row: i64,
    /// 1-based column in the author's text, `-1` when unknown
    pub column: i64,
    pub message: String,
}

impl SceneEvalError {
    fn unlocated(message: impl Into<String>) -> Self {
        Self {
            row: -1,
            column: -1,
            message: message.into(),
        }
    }

    fn from_json(err: &serde_json::Error) -> Self {
        let text = err.to_string();
        if err.line() == 0 {
            return Self::unlocated(text);
        }
        // serde_json appends the raw location to its message.
        let suffix = format!(" at line {} column {}", err.line(), err.column());
        let message = text.strip_suffix(&suffix).unwrap_or(&text).to_string();
        Self {
            row: to_i64(err.line()) - ENVELOPE_OFFSET,
            column: (to_i64(err.column()) - ENVELOPE_OFFSET).max(0),
            message,
        }
    }
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Compiles scene text into a [`Scene`].
///
/// Each call is independent: the same text always produces the same scene.
///
/// # Errors
///
/// Returns a [`SceneEvalError`] for syntax errors, unknown tags, malformed color
/// expressions and invalid geometry.
pub fn compile(source: &str) -> Result<Scene, SceneEvalError> {
    let wrapped = wrap(source);
    let envelope: Envelope =
        serde_json::from_str(&wrapped).map_err(|err| SceneEvalError::from_json(&err))?;
    let scene = envelope.scene.into_scene()?;
    tracing::debug!(
        objects = scene.objects.len(),
        has_sdf_geometries = scene.has_sdf_geometries,
        "scene compiled"
    );
    Ok(scene)
}

fn wrap(source: &str) -> String {
    let mut out = String::with_capacity(source.len() + 16);
    out.push_str("{\n\"scene\":\n");
    for line in source.lines() {
        out.push_str("  ");
        out.push_str(line);
        out.push('\n');
    }
    out.push_str("}\n");
    out
}

#[derive(Deserialize)]
struct Envelope {
    scene: SceneDef,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SceneDef {
    object_list: Vec<ObjectDef>,
    #[serde(default)]
    camera: Option<CameraSpec>,
    #[serde(default)]
    renderer_settings: Option<RendererSettings>,
    #[serde(default)]
    sdf_export_settings: Option<SdfExportSettings>,
}

#[derive(Deserialize)]
struct ObjectDef {
    #[serde(flatten)]
    shape: ShapeDef,
    material: Material,
    #[serde(default, deserialize_with = "color")]
    color: Option<Color>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum ShapeDef {
    Sphere { center: Vec3, radius: f32 },
    SdfSphere { position: Vec3, radius: f32 },
    SdfBox { position: Vec3, dimensions: Vec3 },
    SdfTorus { position: Vec3, dimensions: Vec3 },
    SdfCylinder { position: Vec3, dimensions: Vec3 },
    Sdf { geometry: SdfNodeDef },
}

#[derive(Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case", deny_unknown_fields)]
enum SdfNodeDef {
    Sphere {
        #[serde(default)]
        position: Vec3,
        radius: f32,
    },
    Box {
        #[serde(default)]
        position: Vec3,
        dimensions: Vec3,
    },
    Torus {
        #[serde(default)]
        position: Vec3,
        dimensions: Vec3,
    },
    Cylinder {
        #[serde(default)]
        position: Vec3,
        dimensions: Vec3,
    },
    Union {
        children: Vec<SdfNodeDef>,
    },
    SmoothUnion {
        k: f32,
        children: Vec<SdfNodeDef>,
    },
    Intersection {
        children: Vec<SdfNodeDef>,
    },
    Subtraction {
        base: Box<SdfNodeDef>,
        cut: Box<SdfNodeDef>,
    },
    Translate {
        offset: Vec3,
        child: Box<SdfNodeDef>,
    },
    Rotate {
        angles: Vec3,
        child: Box<SdfNodeDef>,
    },
    Repeat {
        period: Vec3,
        child: Box<SdfNodeDef>,
    },
}

fn color<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Color>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Literal(Vec3),
        Expression(String),
    }

    match Raw::deserialize(deserializer) {
        Ok(Raw::Literal(rgb)) => Ok(Some(Color::Literal(rgb))),
        Ok(Raw::Expression(text)) => ColorExpr::parse(&text)
            .map(|expr| Some(Color::Expression(expr)))
            .map_err(|err| D::Error::custom(format!("invalid color expression `{text}`: {err}"))),
        Err(_) => Err(D::Error::custom(
            "color must be an [r, g, b] array or an expression string",
        )),
    }
}

impl SceneDef {
    fn into_scene(self) -> Result<Scene, SceneEvalError> {
        let objects = self
            .object_list
            .into_iter()
            .enumerate()
            .map(|(index, def)| def.into_object(index))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Scene::new(
            objects,
            self.camera,
            self.renderer_settings.unwrap_or_default(),
            self.sdf_export_settings,
        ))
    }
}

impl ObjectDef {
    fn into_object(self, index: usize) -> Result<SceneObject, SceneEvalError> {
        let id = u32::try_from(index)
            .map_err(|_| SceneEvalError::unlocated("too many objects in objectList"))?;
        let invalid = |message: String| SceneEvalError::unlocated(format!("object {id}: {message}"));

        let shape = match self.shape {
            ShapeDef::Sphere { center, radius } => {
                if !radius.is_finite() || radius <= 0.0 {
                    return Err(invalid(format!("sphere radius must be positive, got {radius}")));
                }
                Shape::Sphere { center, radius }
            }
            ShapeDef::SdfSphere { position, radius } => Shape::Sdf(SdfNode::primitive(
                Geometry::Sphere,
                position,
                Vec3::splat(radius),
            )),
            ShapeDef::SdfBox {
                position,
                dimensions,
            } => Shape::Sdf(SdfNode::primitive(Geometry::Box, position, dimensions)),
            ShapeDef::SdfTorus {
                position,
                dimensions,
            } => Shape::Sdf(SdfNode::primitive(Geometry::Torus, position, dimensions)),
            ShapeDef::SdfCylinder {
                position,
                dimensions,
            } => Shape::Sdf(SdfNode::primitive(Geometry::Cylinder, position, dimensions)),
            ShapeDef::Sdf { geometry } => Shape::Sdf(geometry.into_node()),
        };

        if let Shape::Sdf(node) = &shape {
            node.validate().map_err(|err| invalid(err.to_string()))?;
        }

        Ok(SceneObject {
            id,
            shape,
            material: self.material,
            color: self.color.unwrap_or_default(),
        })
    }
}

impl SdfNodeDef {
    fn into_node(self) -> SdfNode {
        let boxed = |def: Box<SdfNodeDef>| Box::new(def.into_node());
        let all = |defs: Vec<SdfNodeDef>| defs.into_iter().map(SdfNodeDef::into_node).collect();

        match self {
            SdfNodeDef::Sphere { position, radius } => {
                SdfNode::primitive(Geometry::Sphere, position, Vec3::splat(radius))
            }
            SdfNodeDef::Box {
                position,
                dimensions,
            } => SdfNode::primitive(Geometry::Box, position, dimensions),
            SdfNodeDef::Torus {
                position,
                dimensions,
            } => SdfNode::primitive(Geometry::Torus, position, dimensions),
            SdfNodeDef::Cylinder {
                position,
                dimensions,
            } => SdfNode::primitive(Geometry::Cylinder, position, dimensions),
            SdfNodeDef::Union { children } => SdfNode::Union(all(children)),
            SdfNodeDef::SmoothUnion { k, children } => SdfNode::SmoothUnion {
                k,
                children: all(children),
            },
            SdfNodeDef::Intersection { children } => SdfNode::Intersection(all(children)),
            SdfNodeDef::Subtraction { base, cut } => SdfNode::Subtraction {
                base: boxed(base),
                cut: boxed(cut),
            },
            SdfNodeDef::Translate { offset, child } => SdfNode::Translate {
                offset,
                child: boxed(child),
            },
            SdfNodeDef::Rotate { angles, child } => SdfNode::Rotate {
                angles,
                child: boxed(child),
            },
            SdfNodeDef::Repeat { period, child } => SdfNode::Repeat {
                period,
                child: boxed(child),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_indents_every_line() {
        let wrapped = wrap("{\n\"objectList\": []\n}");
        assert_eq!(wrapped, "{\n\"scene\":\n  {\n  \"objectList\": []\n  }\n}\n");
    }

    #[test]
    fn syntax_error_location_is_shifted_back() {
        let source = "{\n  \"objectList\": [\n    { \"type\": \"sphere\" \"radius\": 1 }\n  ]\n}";
        let err = compile(source).unwrap_err();
        assert_eq!(err.row, 3);
        assert_eq!(err.column, 24);
        assert!(!err.message.contains("at line"));
    }

    #[test]
    fn validation_errors_have_no_location() {
        let source = r#"{ "objectList": [
            { "type": "sphere", "center": [0, 0, 0], "radius": 0, "material": "lambert" }
        ] }"#;
        let err = compile(source).unwrap_err();
        assert_eq!((err.row, err.column), (-1, -1));
        assert!(err.message.contains("object 0"));
    }
}
