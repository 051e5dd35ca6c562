//! Signed distance field object trees.
//!
//! An SDF object is a tree whose leaves are primitives and whose inner nodes are boolean
//! operators or domain transforms. The same tree is evaluated on the CPU (volume export,
//! tests) and lowered to WGSL by the shader generator.

use glam::Vec3;
use thiserror::Error;

use crate::distance;

/// Deepest tree accepted by [`SdfNode::validate`]
pub const MAX_SDF_DEPTH: usize = 16;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SdfError {
    #[error("SDF tree is deeper than {max} levels")]
    TooDeep { max: usize },

    #[error("{operator} needs at least one child")]
    EmptyOperator { operator: &'static str },

    #[error("{geometry} dimensions must be positive, got {dimensions:?}")]
    InvalidDimensions {
        geometry: &'static str,
        dimensions: [f32; 3],
    },

    #[error("{field} must be finite and positive, got {value}")]
    InvalidParameter { field: &'static str, value: f32 },
}

type DistanceFn = fn(Vec3, Vec3) -> f32;

/// Indexed by `Geometry as usize`
const DISTANCE_FNS: [DistanceFn; 4] = [
    distance::sphere,
    distance::cuboid,
    distance::torus,
    distance::cylinder,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Geometry {
    Sphere,
    Box,
    Torus,
    Cylinder,
}

impl Geometry {
    pub const ALL: [Geometry; 4] = [
        Geometry::Sphere,
        Geometry::Box,
        Geometry::Torus,
        Geometry::Cylinder,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Geometry::Sphere => "sphere",
            Geometry::Box => "box",
            Geometry::Torus => "torus",
            Geometry::Cylinder => "cylinder",
        }
    }

    /// Distance from `p` (in the primitive's local frame) to the surface
    #[must_use]
    pub fn distance(self, p: Vec3, dimensions: Vec3) -> f32 {
        DISTANCE_FNS[self as usize](p, dimensions)
    }

    /// Number of leading `dimensions` components the geometry reads
    fn used_dimensions(self) -> usize {
        match self {
            Geometry::Sphere => 1,
            Geometry::Torus | Geometry::Cylinder => 2,
            Geometry::Box => 3,
        }
    }
}

/// A primitive placed at `position`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SdfPrimitive {
    pub geometry: Geometry,
    pub position: Vec3,
    pub dimensions: Vec3,
}

impl SdfPrimitive {
    #[must_use]
    pub fn distance(&self, p: Vec3) -> f32 {
        self.geometry.distance(p - self.position, self.dimensions)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SdfNode {
    Primitive(SdfPrimitive),
    Union(Vec<SdfNode>),
    SmoothUnion { k: f32, children: Vec<SdfNode> },
    Intersection(Vec<SdfNode>),
    /// `base` with `cut` carved out of it
    Subtraction { base: Box<SdfNode>, cut: Box<SdfNode> },
    Translate { offset: Vec3, child: Box<SdfNode> },
    /// Child rotated by Euler angles in degrees, X then Y then Z
    Rotate { angles: Vec3, child: Box<SdfNode> },
    /// Child repeated on a lattice with the given cell size
    Repeat { period: Vec3, child: Box<SdfNode> },
}

impl SdfNode {
    #[must_use]
    pub fn primitive(geometry: Geometry, position: Vec3, dimensions: Vec3) -> Self {
        SdfNode::Primitive(SdfPrimitive {
            geometry,
            position,
            dimensions,
        })
    }

    /// Signed distance from `p` to the surface described by this tree
    #[must_use]
    pub fn distance(&self, p: Vec3) -> f32 {
        match self {
            SdfNode::Primitive(primitive) => primitive.distance(p),
            SdfNode::Union(children) => children
                .iter()
                .map(|c| c.distance(p))
                .fold(f32::INFINITY, f32::min),
            SdfNode::SmoothUnion { k, children } => children
                .iter()
                .map(|c| c.distance(p))
                .reduce(|a, b| distance::smooth_union(a, b, *k))
                .unwrap_or(f32::INFINITY),
            SdfNode::Intersection(children) => children
                .iter()
                .map(|c| c.distance(p))
                .fold(f32::NEG_INFINITY, f32::max),
            SdfNode::Subtraction { base, cut } => base.distance(p).max(-cut.distance(p)),
            SdfNode::Translate { offset, child } => child.distance(p - *offset),
            SdfNode::Rotate { angles, child } => child.distance(distance::inverse_rotate(p, *angles)),
            SdfNode::Repeat { period, child } => child.distance(distance::repeat(p, *period)),
        }
    }

    /// Number of levels in the tree; a lone primitive has depth 1
    #[must_use]
    pub fn depth(&self) -> usize {
        1 + self.children().map(SdfNode::depth).max().unwrap_or(0)
    }

    /// Direct children in evaluation order
    pub fn children(&self) -> Box<dyn Iterator<Item = &SdfNode> + '_> {
        match self {
            SdfNode::Primitive(_) => Box::new(std::iter::empty()),
            SdfNode::Union(children)
            | SdfNode::Intersection(children)
            | SdfNode::SmoothUnion { children, .. } => Box::new(children.iter()),
            SdfNode::Subtraction { base, cut } => {
                Box::new([base.as_ref(), cut.as_ref()].into_iter())
            }
            SdfNode::Translate { child, .. }
            | SdfNode::Rotate { child, .. }
            | SdfNode::Repeat { child, .. } => Box::new(std::iter::once(child.as_ref())),
        }
    }

    /// Every geometry kind referenced by the tree
    #[must_use]
    pub fn geometries(&self) -> Vec<Geometry> {
        let mut out = Vec::new();
        self.collect_geometries(&mut out);
        out.sort_unstable();
        out.dedup();
        out
    }

    fn collect_geometries(&self, out: &mut Vec<Geometry>) {
        if let SdfNode::Primitive(primitive) = self {
            out.push(primitive.geometry);
        }
        for child in self.children() {
            child.collect_geometries(out);
        }
    }

    /// Whether the tree uses a smooth union anywhere
    #[must_use]
    pub fn uses_smooth_union(&self) -> bool {
        matches!(self, SdfNode::SmoothUnion { .. }) || self.children().any(SdfNode::uses_smooth_union)
    }

    /// Checks structural limits and parameter ranges.
    ///
    /// # Errors
    ///
    /// Returns the first [`SdfError`] found in a depth-first walk.
    pub fn validate(&self) -> Result<(), SdfError> {
        if self.depth() > MAX_SDF_DEPTH {
            return Err(SdfError::TooDeep { max: MAX_SDF_DEPTH });
        }
        self.validate_node()
    }

    fn validate_node(&self) -> Result<(), SdfError> {
        match self {
            SdfNode::Primitive(primitive) => {
                let dims = primitive.dimensions.to_array();
                let used = &dims[..primitive.geometry.used_dimensions()];
                if used.iter().any(|d| !d.is_finite() || *d <= 0.0) {
                    return Err(SdfError::InvalidDimensions {
                        geometry: primitive.geometry.name(),
                        dimensions: dims,
                    });
                }
            }
            SdfNode::Union(children) if children.is_empty() => {
                return Err(SdfError::EmptyOperator { operator: "union" });
            }
            SdfNode::Intersection(children) if children.is_empty() => {
                return Err(SdfError::EmptyOperator {
                    operator: "intersection",
                });
            }
            SdfNode::SmoothUnion { children, .. } if children.is_empty() => {
                return Err(SdfError::EmptyOperator {
                    operator: "smooth-union",
                });
            }
            SdfNode::SmoothUnion { k, .. } if !k.is_finite() || *k <= 0.0 => {
                return Err(SdfError::InvalidParameter { field: "k", value: *k });
            }
            SdfNode::Repeat { period, .. } => {
                if let Some(bad) = period.to_array().into_iter().find(|c| !c.is_finite() || *c <= 0.0) {
                    return Err(SdfError::InvalidParameter {
                        field: "period",
                        value: bad,
                    });
                }
            }
            _ => {}
        }
        self.children().try_for_each(SdfNode::validate_node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_sphere_at(x: f32) -> SdfNode {
        SdfNode::primitive(Geometry::Sphere, Vec3::new(x, 0.0, 0.0), Vec3::ONE)
    }

    #[test]
    fn union_is_min_of_children() {
        let node = SdfNode::Union(vec![unit_sphere_at(-2.0), unit_sphere_at(2.0)]);
        assert!((node.distance(Vec3::ZERO) - 1.0).abs() < 1e-6);
        assert!((node.distance(Vec3::new(2.0, 0.0, 0.0)) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn subtraction_carves_base() {
        let node = SdfNode::Subtraction {
            base: Box::new(SdfNode::primitive(Geometry::Box, Vec3::ZERO, Vec3::ONE)),
            cut: Box::new(SdfNode::primitive(Geometry::Sphere, Vec3::ZERO, Vec3::splat(0.5))),
        };
        assert!(node.distance(Vec3::ZERO) > 0.0);
        assert!(node.distance(Vec3::new(0.75, 0.0, 0.0)) < 0.0);
    }

    #[test]
    fn transforms_move_the_child() {
        let node = SdfNode::Translate {
            offset: Vec3::new(0.0, 3.0, 0.0),
            child: Box::new(unit_sphere_at(0.0)),
        };
        assert!((node.distance(Vec3::new(0.0, 3.0, 0.0)) + 1.0).abs() < 1e-6);

        let bar = SdfNode::primitive(Geometry::Box, Vec3::ZERO, Vec3::new(2.0, 0.1, 0.1));
        let rotated = SdfNode::Rotate {
            angles: Vec3::new(0.0, 0.0, 90.0),
            child: Box::new(bar),
        };
        assert!(rotated.distance(Vec3::new(0.0, 1.5, 0.0)) < 0.0);
        assert!(rotated.distance(Vec3::new(1.5, 0.0, 0.0)) > 0.0);
    }

    #[test]
    fn depth_and_geometries() {
        let node = SdfNode::Union(vec![
            unit_sphere_at(0.0),
            SdfNode::Translate {
                offset: Vec3::ONE,
                child: Box::new(SdfNode::primitive(Geometry::Torus, Vec3::ZERO, Vec3::new(1.0, 0.2, 0.0))),
            },
        ]);
        assert_eq!(node.depth(), 3);
        assert_eq!(node.geometries(), vec![Geometry::Sphere, Geometry::Torus]);
        assert!(!node.uses_smooth_union());
    }

    #[test]
    fn validation_rejects_bad_trees() {
        let mut node = unit_sphere_at(0.0);
        for _ in 0..MAX_SDF_DEPTH {
            node = SdfNode::Translate {
                offset: Vec3::ZERO,
                child: Box::new(node),
            };
        }
        assert_eq!(node.validate(), Err(SdfError::TooDeep { max: MAX_SDF_DEPTH }));

        let flat = SdfNode::primitive(Geometry::Cylinder, Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0));
        assert!(matches!(flat.validate(), Err(SdfError::InvalidDimensions { .. })));

        let empty = SdfNode::Intersection(vec![]);
        assert!(matches!(empty.validate(), Err(SdfError::EmptyOperator { .. })));

        // Unused dimension components are not checked.
        let ball = SdfNode::primitive(Geometry::Sphere, Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(ball.validate(), Ok(()));
    }
}
