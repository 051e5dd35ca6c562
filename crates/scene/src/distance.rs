//! Signed distance functions shared by the CPU evaluator and the generated WGSL.
//!
//! Each function here has a textual twin in the shader library; keep the two in step.

use glam::{Vec2, Vec3};

/// Distance reported for empty space, and the farthest a ray is traced
pub const MAX_DISTANCE: f32 = 100.0;

/// Sphere of radius `dims.x` centred at the origin
#[must_use]
pub fn sphere(p: Vec3, dims: Vec3) -> f32 {
    p.length() - dims.x
}

/// Axis-aligned box with half extents `dims`
#[must_use]
pub fn cuboid(p: Vec3, dims: Vec3) -> f32 {
    let q = p.abs() - dims;
    q.max(Vec3::ZERO).length() + q.max_element().min(0.0)
}

/// Torus in the XZ plane, major radius `dims.x`, minor radius `dims.y`
#[must_use]
pub fn torus(p: Vec3, dims: Vec3) -> f32 {
    let q = Vec2::new(Vec2::new(p.x, p.z).length() - dims.x, p.y);
    q.length() - dims.y
}

/// Capped cylinder along Y, radius `dims.x`, half height `dims.y`
#[must_use]
pub fn cylinder(p: Vec3, dims: Vec3) -> f32 {
    let d = Vec2::new(Vec2::new(p.x, p.z).length(), p.y).abs() - Vec2::new(dims.x, dims.y);
    d.x.max(d.y).min(0.0) + d.max(Vec2::ZERO).length()
}

/// Polynomial smooth minimum with blend radius `k`
#[must_use]
pub fn smooth_union(a: f32, b: f32, k: f32) -> f32 {
    if k <= 0.0 {
        return a.min(b);
    }
    let h = (0.5 + 0.5 * (b - a) / k).clamp(0.0, 1.0);
    b + (a - b) * h - k * h * (1.0 - h)
}

/// Folds `p` into the cell of an infinite lattice with the given period.
/// Axes with a non-positive period are left untouched.
#[must_use]
pub fn repeat(p: Vec3, period: Vec3) -> Vec3 {
    let fold = |x: f32, c: f32| {
        if c > 0.0 {
            x - c * (x / c + 0.5).floor()
        } else {
            x
        }
    };
    Vec3::new(fold(p.x, period.x), fold(p.y, period.y), fold(p.z, period.z))
}

/// Maps a world point into the frame of a child rotated by `angles` (degrees, applied X then
/// Y then Z).
#[must_use]
pub fn inverse_rotate(p: Vec3, angles: Vec3) -> Vec3 {
    let r = angles * (std::f32::consts::PI / 180.0);
    let q = rotate_z(p, -r.z);
    let q = rotate_y(q, -r.y);
    rotate_x(q, -r.x)
}

fn rotate_x(p: Vec3, a: f32) -> Vec3 {
    let (s, c) = a.sin_cos();
    Vec3::new(p.x, c * p.y - s * p.z, s * p.y + c * p.z)
}

fn rotate_y(p: Vec3, a: f32) -> Vec3 {
    let (s, c) = a.sin_cos();
    Vec3::new(c * p.x + s * p.z, p.y, -s * p.x + c * p.z)
}

fn rotate_z(p: Vec3, a: f32) -> Vec3 {
    let (s, c) = a.sin_cos();
    Vec3::new(c * p.x - s * p.y, s * p.x + c * p.y, p.z)
}
