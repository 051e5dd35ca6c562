//! Render pipeline creation
//!
//! Bind group layouts are derived from the bindings a generated program declares, so the
//! GPU side always matches the shader text.

use anyhow::{bail, Result};
use shadergen::{Binding, BindingKind};
use wgpu::util::DeviceExt;

/// Format of the trace and accumulation textures
pub const ACCUMULATION_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

/// Create the fullscreen quad vertex buffer
///
/// Returns a buffer containing 4 vertices for a fullscreen triangle strip
pub fn create_fullscreen_quad(device: &wgpu::Device) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Fullscreen Quad Vertex Buffer"),
        contents: bytemuck::cast_slice(&[
            -1.0_f32, -1.0, // Bottom-left
            1.0, -1.0, // Bottom-right
            -1.0, 1.0, // Top-left
            1.0, 1.0, // Top-right
        ]),
        usage: wgpu::BufferUsages::VERTEX,
    })
}

fn layout_entry(binding: &Binding) -> Result<wgpu::BindGroupLayoutEntry> {
    let ty = match binding.kind {
        BindingKind::Camera | BindingKind::Frame => wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        BindingKind::AccumTexture => wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        BindingKind::ExportParams | BindingKind::ExportValues => {
            bail!("binding `{}` belongs to the export kernel", binding.name)
        }
    };
    Ok(wgpu::BindGroupLayoutEntry {
        binding: binding.binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty,
        count: None,
    })
}

/// Create the bind group layout for a generated program
///
/// One entry per declared binding: uniform buffers for the camera and frame blocks, an
/// unfilterable float texture for the accumulated sum.
pub fn create_bind_group_layout(
    device: &wgpu::Device,
    bindings: &[Binding],
) -> Result<wgpu::BindGroupLayout> {
    let entries = bindings.iter().map(layout_entry).collect::<Result<Vec<_>>>()?;
    Ok(device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Program Bind Group Layout"),
        entries: &entries,
    }))
}

/// Create a fullscreen pipeline running `entry_point` into a `format` target
pub fn create_render_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    entry_point: &str,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(entry_point),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: shadergen::EntryPoint::Vertex.name(),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: (2 * std::mem::size_of::<f32>()) as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &wgpu::vertex_attr_array![0 => Float32x2],
            }],
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point,
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleStrip,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
    })
}
