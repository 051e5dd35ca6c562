//! GPU-compatible type definitions for rendering
//!
//! These structs are uploaded verbatim into the uniform blocks declared by the generated
//! shaders. All types must be Pod and match the WGSL layout byte for byte.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use scene::Camera;

/// Background used when a scene does not set one: `#000000` at the bottom, `#111111` at
/// the top
pub const DEFAULT_BACKGROUND: [Vec3; 2] = [Vec3::ZERO, Vec3::splat(17.0 / 255.0)];

/// Mirror of the WGSL `Frame` block
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FrameUniform {
    pub bg_gradient_bottom: [f32; 4],
    pub bg_gradient_top: [f32; 4],
    /// Viewport size in pixels
    pub resolution: [f32; 2],
    /// Per draw random seed
    pub seed: [f32; 2],
    /// Scale applied to the accumulated sum when presenting
    pub one_over_sample_count: f32,
    pub _pad: [f32; 3],
}

const _: () = assert!(std::mem::size_of::<FrameUniform>() as u64 == shadergen::layout::FRAME_UNIFORM_SIZE);

impl FrameUniform {
    pub fn new(background: [Vec3; 2], resolution: Vec2, seed: Vec2) -> Self {
        Self {
            bg_gradient_bottom: background[0].extend(1.0).to_array(),
            bg_gradient_top: background[1].extend(1.0).to_array(),
            resolution: resolution.to_array(),
            seed: seed.to_array(),
            one_over_sample_count: 1.0,
            _pad: [0.0; 3],
        }
    }

    /// Sets the present scale for `sample_count` accumulated samples
    #[must_use]
    pub fn with_sample_count(mut self, sample_count: u32) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let count = sample_count.max(1) as f32;
        self.one_over_sample_count = 1.0 / count;
        self
    }
}

/// Words of the WGSL `Camera` block
#[derive(Debug, Clone, PartialEq)]
pub struct CameraUniform(Vec<f32>);

impl CameraUniform {
    pub fn new(camera: &Camera) -> Self {
        Self(shadergen::layout::camera_uniform_words(camera))
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scene::CameraSpec;

    #[test]
    fn frame_uniform_scales_by_sample_count() {
        let frame = FrameUniform::new(DEFAULT_BACKGROUND, Vec2::new(640.0, 480.0), Vec2::ZERO);
        assert_eq!(frame.one_over_sample_count, 1.0);
        assert_eq!(frame.with_sample_count(4).one_over_sample_count, 0.25);
        assert_eq!(frame.with_sample_count(0).one_over_sample_count, 1.0);
        assert_eq!(frame.bg_gradient_top[3], 1.0);
    }

    #[test]
    fn camera_uniform_fills_the_block() {
        let camera = Camera::build(&CameraSpec::default()).unwrap();
        let uniform = CameraUniform::new(&camera);
        assert_eq!(
            uniform.as_bytes().len() as u64,
            shadergen::layout::camera_uniform_size()
        );
    }
}
