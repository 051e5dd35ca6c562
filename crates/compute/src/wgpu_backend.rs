//! GPU implementation of [`FieldSampler`] built on [`wgpu`].
//!
//! The sampler generates the scene's `cs_export` kernel once, then dispatches it for every
//! batch and copies the results back through a staging buffer. Initialization fails if no
//! compatible adapter is found.

use std::ops::Range;
use std::sync::Arc;

use parking_lot::Mutex;
use scene::Scene;
use shadergen::{EntryPoint, GenerateOptions};

use crate::backend::check_range;
use crate::layout::{self, ExportParams, EXPORT_PARAMS_BINDING, EXPORT_VALUES_BINDING, GROUP};
use crate::{ComputeError, FieldSampler, Grid};

/// Cells covered by one dispatch, bounded by the per-dimension workgroup limit
const MAX_DISPATCH_CELLS: usize = 65_535 * shadergen::layout::EXPORT_WORKGROUP_SIZE as usize;

/// Output and staging buffers, reused while large enough
struct BatchBuffers {
    capacity: u64,
    values: wgpu::Buffer,
    staging: wgpu::Buffer,
}

pub struct WgpuSampler {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    params: wgpu::Buffer,
    buffers: Mutex<Option<BatchBuffers>>,
}

impl WgpuSampler {
    /// Compiles the export kernel for `scene` on the default adapter.
    ///
    /// # Errors
    ///
    /// [`ComputeError::BackendUnavailable`] without a usable adapter or device,
    /// [`ComputeError::Shader`] if the kernel cannot be generated.
    pub fn new(scene: &Scene) -> Result<Self, ComputeError> {
        let backends = wgpu::util::backend_bits_from_env().unwrap_or_else(wgpu::Backends::all);
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });
        let adapter = pollster::block_on(wgpu::util::initialize_adapter_from_env_or_default(
            &instance, None,
        ))
        .ok_or(ComputeError::BackendUnavailable)?;
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("sdf-export-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
            },
            None,
        ))
        .map_err(|_| ComputeError::BackendUnavailable)?;

        Self::with_device(Arc::new(device), Arc::new(queue), scene)
    }

    /// Compiles the export kernel for `scene` on an existing device.
    ///
    /// # Errors
    ///
    /// [`ComputeError::Shader`] if the kernel cannot be generated.
    pub fn with_device(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        scene: &Scene,
    ) -> Result<Self, ComputeError> {
        let source = shadergen::generate(&scene.objects, &GenerateOptions::grid())?;
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("sdf export kernel"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let buffer_entry = |binding, ty| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sdf export bindings"),
            entries: &[
                buffer_entry(EXPORT_PARAMS_BINDING, wgpu::BufferBindingType::Uniform),
                buffer_entry(
                    EXPORT_VALUES_BINDING,
                    wgpu::BufferBindingType::Storage { read_only: false },
                ),
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("sdf export pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("sdf export pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: EntryPoint::Export.name(),
        });

        let params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("export params"),
            size: shadergen::layout::EXPORT_PARAMS_SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        tracing::debug!(objects = scene.objects.len(), "compiled SDF export kernel");
        Ok(Self {
            device,
            queue,
            pipeline,
            bind_group_layout,
            params,
            buffers: Mutex::new(None),
        })
    }

    fn batch_buffers(&self, size: u64) -> BatchBuffers {
        let values = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("export values"),
            size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("export staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        BatchBuffers {
            capacity: size,
            values,
            staging,
        }
    }

    fn dispatch(&self, grid: &Grid, offset: u32, count: u32) -> Result<Vec<f32>, ComputeError> {
        let size = u64::from(count) * 4;
        let mut slot = self.buffers.lock();
        let buffers = match slot.take() {
            Some(b) if b.capacity >= size => b,
            _ => self.batch_buffers(size),
        };

        let params = ExportParams::new(grid, offset, count);
        self.queue
            .write_buffer(&self.params, 0, bytemuck::bytes_of(&params));

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sdf export bind group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: EXPORT_PARAMS_BINDING,
                    resource: self.params.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: EXPORT_VALUES_BINDING,
                    resource: buffers.values.as_entire_binding(),
                },
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        {
            let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("sdf export pass"),
                timestamp_writes: None,
            });
            cpass.set_pipeline(&self.pipeline);
            cpass.set_bind_group(GROUP, &bind_group, &[]);
            cpass.dispatch_workgroups(layout::workgroups(count), 1, 1);
        }
        encoder.copy_buffer_to_buffer(&buffers.values, 0, &buffers.staging, 0, size);
        self.queue.submit(Some(encoder.finish()));

        let result = read_back(&self.device, &buffers.staging, size);
        *slot = Some(buffers);
        result
    }
}

fn read_back(device: &wgpu::Device, staging: &wgpu::Buffer, size: u64) -> Result<Vec<f32>, ComputeError> {
    let slice = staging.slice(..size);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device.poll(wgpu::Maintain::Wait);
    rx.recv()
        .map_err(|e| ComputeError::Readback(e.to_string()))?
        .map_err(|e| ComputeError::Readback(e.to_string()))?;

    let values = bytemuck::cast_slice::<u8, f32>(&slice.get_mapped_range()).to_vec();
    staging.unmap();
    Ok(values)
}

impl FieldSampler for WgpuSampler {
    fn sample(&self, grid: &Grid, cells: Range<usize>) -> Result<Vec<f32>, ComputeError> {
        check_range(grid, &cells)?;
        let mut values = Vec::with_capacity(cells.len());
        let mut start = cells.start;
        while start < cells.end {
            let end = (start + MAX_DISPATCH_CELLS).min(cells.end);
            let to_u32 = |v: usize| {
                u32::try_from(v).map_err(|_| ComputeError::RangeOutOfBounds {
                    start: cells.start,
                    end: cells.end,
                    len: grid.len(),
                })
            };
            values.extend(self.dispatch(grid, to_u32(start)?, to_u32(end - start)?)?);
            start = end;
        }
        Ok(values)
    }
}
