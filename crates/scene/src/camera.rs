//! Thin lens camera model
//!
//! [`Camera::build`] turns the high level [`CameraSpec`] written by scene authors into the
//! orthonormal basis and image plane vectors consumed by the generated shaders. No other
//! part of the workspace derives basis vectors: shader generation and GPU uploads read them
//! through the flat mapping returned by [`Camera::uniforms`].

use glam::Vec3;
use serde::Deserialize;
use thiserror::Error;

/// Cross products shorter than this are treated as parallel vectors
const PARALLEL_EPSILON: f32 = 1e-6;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CameraError {
    #[error("invalid camera spec: {0}")]
    InvalidCameraSpec(String),
}

/// High level camera parameters as written in a scene description
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraSpec {
    /// Eye position
    pub look_from: Vec3,
    /// Point the camera looks at
    pub look_at: Vec3,
    /// World up hint, must not be parallel to the view direction
    pub v_up: Vec3,
    /// Vertical field of view in degrees, exclusive range (0, 180)
    pub vfov: f32,
    /// Lens diameter, zero gives a pinhole camera
    #[serde(default)]
    pub aperture: f32,
    /// Width over height of the image plane
    #[serde(default = "default_aspect")]
    pub aspect: f32,
    /// Distance to the plane in focus, defaults to `|look_from - look_at|`
    #[serde(default)]
    pub focus_distance: Option<f32>,
}

fn default_aspect() -> f32 {
    1.0
}

impl Default for CameraSpec {
    /// The camera used when a scene does not declare one
    fn default() -> Self {
        Self {
            look_from: Vec3::new(3.1, 1.4, 1.9),
            look_at: Vec3::new(-0.25, 0.75, -1.5),
            v_up: Vec3::Y,
            vfov: 45.0,
            aperture: 0.001,
            aspect: default_aspect(),
            focus_distance: None,
        }
    }
}

impl CameraSpec {
    /// Returns a copy of the spec with a different aspect ratio
    #[must_use]
    pub fn with_aspect(mut self, aspect: f32) -> Self {
        self.aspect = aspect;
        self
    }
}

/// Kind of a named camera uniform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Scalar,
    Vector,
}

/// Value of a named camera uniform
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Scalar(f32),
    Vector(Vec3),
}

impl UniformValue {
    #[must_use]
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Scalar(_) => UniformKind::Scalar,
            UniformValue::Vector(_) => UniformKind::Vector,
        }
    }
}

/// Names and kinds of the camera uniforms, in binding order.
///
/// Vectors come first so a GPU block packs every vector into a 16 byte slot followed by the
/// scalars.
pub const CAMERA_UNIFORM_LAYOUT: [(&str, UniformKind); 8] = [
    ("origin", UniformKind::Vector),
    ("lower_left_corner", UniformKind::Vector),
    ("horizontal", UniformKind::Vector),
    ("vertical", UniformKind::Vector),
    ("u", UniformKind::Vector),
    ("v", UniformKind::Vector),
    ("w", UniformKind::Vector),
    ("lens_radius", UniformKind::Scalar),
];

/// Camera with derived basis and image plane, immutable once built
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    spec: CameraSpec,
    origin: Vec3,
    lower_left_corner: Vec3,
    horizontal: Vec3,
    vertical: Vec3,
    u: Vec3,
    v: Vec3,
    w: Vec3,
    lens_radius: f32,
    focus_distance: f32,
}

impl Camera {
    /// Builds the camera basis and lens model from a spec.
    ///
    /// # Errors
    ///
    /// Returns [`CameraError::InvalidCameraSpec`] when `vfov` is outside (0, 180), the
    /// aspect or focus distance is not a positive finite number, `look_from` equals
    /// `look_at`, or `v_up` is parallel to the view direction.
    pub fn build(spec: &CameraSpec) -> Result<Self, CameraError> {
        if !(spec.vfov > 0.0 && spec.vfov < 180.0) {
            return Err(CameraError::InvalidCameraSpec(format!(
                "vfov must lie in (0, 180), got {}",
                spec.vfov
            )));
        }
        if !(spec.aspect.is_finite() && spec.aspect > 0.0) {
            return Err(CameraError::InvalidCameraSpec(format!(
                "aspect must be positive, got {}",
                spec.aspect
            )));
        }
        if !(spec.aperture.is_finite() && spec.aperture >= 0.0) {
            return Err(CameraError::InvalidCameraSpec(format!(
                "aperture must not be negative, got {}",
                spec.aperture
            )));
        }

        let view = spec.look_from - spec.look_at;
        let view_length = view.length();
        if view_length <= PARALLEL_EPSILON {
            return Err(CameraError::InvalidCameraSpec(
                "lookFrom and lookAt coincide".to_string(),
            ));
        }

        let w = view / view_length;
        let side = spec.v_up.cross(w);
        if side.length() <= PARALLEL_EPSILON * spec.v_up.length().max(1.0) {
            return Err(CameraError::InvalidCameraSpec(
                "vUp is parallel to the view direction".to_string(),
            ));
        }
        let u = side.normalize();
        let v = w.cross(u);

        let focus_distance = spec.focus_distance.unwrap_or(view_length);
        if !(focus_distance.is_finite() && focus_distance > 0.0) {
            return Err(CameraError::InvalidCameraSpec(format!(
                "focusDistance must be positive, got {focus_distance}"
            )));
        }

        let half_height = (spec.vfov * 0.5).to_radians().tan();
        let half_width = spec.aspect * half_height;
        let origin = spec.look_from;
        let lower_left_corner = origin
            - half_width * focus_distance * u
            - half_height * focus_distance * v
            - focus_distance * w;

        Ok(Self {
            spec: *spec,
            origin,
            lower_left_corner,
            horizontal: 2.0 * half_width * focus_distance * u,
            vertical: 2.0 * half_height * focus_distance * v,
            u,
            v,
            w,
            lens_radius: spec.aperture * 0.5,
            focus_distance,
        })
    }

    /// Rebuilds the camera for a new image aspect ratio
    ///
    /// # Errors
    ///
    /// Fails like [`Camera::build`] when the new aspect is not positive.
    pub fn with_aspect(&self, aspect: f32) -> Result<Self, CameraError> {
        Self::build(&self.spec.with_aspect(aspect))
    }

    #[must_use]
    pub fn spec(&self) -> &CameraSpec {
        &self.spec
    }

    #[must_use]
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    #[must_use]
    pub fn lower_left_corner(&self) -> Vec3 {
        self.lower_left_corner
    }

    #[must_use]
    pub fn horizontal(&self) -> Vec3 {
        self.horizontal
    }

    #[must_use]
    pub fn vertical(&self) -> Vec3 {
        self.vertical
    }

    /// Orthonormal basis `(u, v, w)`, `w` points away from the view direction
    #[must_use]
    pub fn basis(&self) -> (Vec3, Vec3, Vec3) {
        (self.u, self.v, self.w)
    }

    #[must_use]
    pub fn lens_radius(&self) -> f32 {
        self.lens_radius
    }

    #[must_use]
    pub fn focus_distance(&self) -> f32 {
        self.focus_distance
    }

    /// Flat mapping of named values bound verbatim as shader uniforms.
    ///
    /// The order and kinds match [`CAMERA_UNIFORM_LAYOUT`].
    #[must_use]
    pub fn uniforms(&self) -> [(&'static str, UniformValue); 8] {
        [
            ("origin", UniformValue::Vector(self.origin)),
            ("lower_left_corner", UniformValue::Vector(self.lower_left_corner)),
            ("horizontal", UniformValue::Vector(self.horizontal)),
            ("vertical", UniformValue::Vector(self.vertical)),
            ("u", UniformValue::Vector(self.u)),
            ("v", UniformValue::Vector(self.v)),
            ("w", UniformValue::Vector(self.w)),
            ("lens_radius", UniformValue::Scalar(self.lens_radius)),
        ]
    }
}
