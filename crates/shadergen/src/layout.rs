//! Host-shareable layout of the uniform blocks declared by generated shaders.
//!
//! The camera block is derived from [`scene::CAMERA_UNIFORM_LAYOUT`]: vectors occupy a
//! `vec4f` slot each, scalars are packed as `f32`, and padding keeps every vector 16 byte
//! aligned. Both the WGSL declaration and the host-side word packing come from
//! [`camera_fields`], so the two cannot drift apart.

use scene::{Camera, UniformKind, UniformValue, CAMERA_UNIFORM_LAYOUT};

pub const GROUP: u32 = 0;

pub const CAMERA_BINDING: u32 = 0;
pub const FRAME_BINDING: u32 = 1;
pub const ACCUM_BINDING: u32 = 2;

pub const EXPORT_PARAMS_BINDING: u32 = 0;
pub const EXPORT_VALUES_BINDING: u32 = 1;

/// Size of the `Frame` uniform block in bytes
pub const FRAME_UNIFORM_SIZE: u64 = 64;

/// Size of the `ExportParams` uniform block in bytes
pub const EXPORT_PARAMS_SIZE: u64 = 48;

/// Workgroup size of the `cs_export` kernel
pub const EXPORT_WORKGROUP_SIZE: u32 = 64;

/// One member of the `Camera` block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraField {
    Vector(&'static str),
    Scalar(&'static str),
    /// Unnamed padding word, numbered in declaration order
    Padding(usize),
}

impl CameraField {
    #[must_use]
    pub fn words(self) -> usize {
        match self {
            CameraField::Vector(_) => 4,
            CameraField::Scalar(_) | CameraField::Padding(_) => 1,
        }
    }
}

/// Members of the `Camera` block in declaration order, padding included
#[must_use]
pub fn camera_fields() -> Vec<CameraField> {
    let mut fields = Vec::with_capacity(CAMERA_UNIFORM_LAYOUT.len() + 3);
    let mut words = 0;
    let mut pads = 0;
    let mut pad_to_vec4 = |fields: &mut Vec<CameraField>, words: &mut usize| {
        while *words % 4 != 0 {
            fields.push(CameraField::Padding(pads));
            pads += 1;
            *words += 1;
        }
    };

    for (name, kind) in CAMERA_UNIFORM_LAYOUT {
        match kind {
            UniformKind::Vector => {
                pad_to_vec4(&mut fields, &mut words);
                fields.push(CameraField::Vector(name));
                words += 4;
            }
            UniformKind::Scalar => {
                fields.push(CameraField::Scalar(name));
                words += 1;
            }
        }
    }
    pad_to_vec4(&mut fields, &mut words);
    fields
}

/// Size of the `Camera` uniform block in bytes
#[must_use]
pub fn camera_uniform_size() -> u64 {
    let words: usize = camera_fields().into_iter().map(CameraField::words).sum();
    (words * 4) as u64
}

/// Packs a camera into the words of the `Camera` uniform block
#[must_use]
pub fn camera_uniform_words(camera: &Camera) -> Vec<f32> {
    let values = camera.uniforms();
    let lookup = |name: &str| values.iter().find(|(n, _)| *n == name).map(|(_, v)| *v);

    let mut words = Vec::new();
    for field in camera_fields() {
        match field {
            CameraField::Vector(name) => match lookup(name) {
                Some(UniformValue::Vector(v)) => words.extend_from_slice(&[v.x, v.y, v.z, 0.0]),
                _ => words.extend_from_slice(&[0.0; 4]),
            },
            CameraField::Scalar(name) => match lookup(name) {
                Some(UniformValue::Scalar(s)) => words.push(s),
                _ => words.push(0.0),
            },
            CameraField::Padding(_) => words.push(0.0),
        }
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;
    use scene::CameraSpec;

    #[test]
    fn camera_block_is_vec4_aligned() {
        let fields = camera_fields();
        let mut offset = 0;
        for field in &fields {
            if let CameraField::Vector(_) = field {
                assert_eq!(offset % 4, 0, "{field:?} is misaligned");
            }
            offset += field.words();
        }
        assert_eq!(offset % 4, 0);
        assert_eq!(camera_uniform_size(), (offset * 4) as u64);
    }

    #[test]
    fn packed_words_follow_field_order() {
        let camera = Camera::build(&CameraSpec::default()).unwrap();
        let words = camera_uniform_words(&camera);
        assert_eq!(words.len() as u64 * 4, camera_uniform_size());

        let origin = camera.origin();
        assert_eq!(&words[..3], &[origin.x, origin.y, origin.z]);

        let lens = fields_offset("lens_radius");
        assert!((words[lens] - camera.lens_radius()).abs() < 1e-7);
    }

    fn fields_offset(name: &str) -> usize {
        let mut offset = 0;
        for field in camera_fields() {
            if matches!(field, CameraField::Scalar(n) | CameraField::Vector(n) if n == name) {
                return offset;
            }
            offset += field.words();
        }
        panic!("no field {name}");
    }
}
