//! [`RenderBackend`] on top of wgpu.
//!
//! Output goes either to a window surface or to an offscreen `Rgba8Unorm` texture that can
//! be read back as an image. Offline sessions keep two `Rgba32Float` textures: the trace
//! target written by `fs_trace` and the accumulated sum it reads from.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use shadergen::{Binding, BindingKind, EntryPoint};
use winit::window::Window;

use crate::backend::{DrawInputs, Program, RenderBackend, Viewport};
use crate::gpu_types::CameraUniform;
use crate::pipeline::{self, ACCUMULATION_FORMAT};

/// Format of the offscreen output
pub const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

enum Output {
    Surface {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    },
    Offscreen {
        texture: wgpu::Texture,
    },
}

struct LoadedProgram {
    bindings: Vec<Binding>,
    layout: wgpu::BindGroupLayout,
    /// `fs_main`, or `fs_trace` and `fs_present`
    direct: Option<wgpu::RenderPipeline>,
    trace: Option<wgpu::RenderPipeline>,
    present: Option<wgpu::RenderPipeline>,
}

struct Accumulation {
    viewport: Viewport,
    trace: wgpu::Texture,
    accum: wgpu::Texture,
}

pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    output: Output,
    format: wgpu::TextureFormat,
    viewport: Viewport,
    quad: wgpu::Buffer,
    camera_buffer: wgpu::Buffer,
    frame_buffer: wgpu::Buffer,
    program: Option<LoadedProgram>,
    accumulation: Option<Accumulation>,
}

async fn request_device(
    instance: &wgpu::Instance,
    surface: Option<&wgpu::Surface<'_>>,
) -> Result<(wgpu::Adapter, wgpu::Device, wgpu::Queue)> {
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: surface,
            force_fallback_adapter: false,
        })
        .await
        .context("failed to get adapter")?;

    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Renderer Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
            },
            None,
        )
        .await
        .context("failed to request device")?;
    Ok((adapter, device, queue))
}

impl WgpuBackend {
    /// Renders into `window`. The surface keeps the window alive.
    ///
    /// # Errors
    ///
    /// Fails without a compatible adapter or surface format.
    pub async fn for_window(window: Arc<Window>) -> Result<Self> {
        let instance = wgpu::Instance::default();
        let size = window.inner_size();
        let surface = instance
            .create_surface(window)
            .context("failed to create surface")?;
        let (adapter, device, queue) = request_device(&instance, Some(&surface)).await?;

        let caps = surface.get_capabilities(&adapter);
        // The shader applies its own gamma curve
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .context("surface reports no formats")?;
        let viewport = Viewport::new(size.width.max(1), size.height.max(1));
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: viewport.width,
            height: viewport.height,
            desired_maximum_frame_latency: 2,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
        };
        surface.configure(&device, &config);
        tracing::info!(?format, width = viewport.width, height = viewport.height, "surface configured");

        Ok(Self::assemble(device, queue, Output::Surface { surface, config }, format, viewport))
    }

    /// Renders into an offscreen texture of `viewport` size.
    ///
    /// # Errors
    ///
    /// Fails without a usable adapter, or if `viewport` exceeds the device's texture size.
    pub fn headless(viewport: Viewport) -> Result<Self> {
        if viewport.is_empty() {
            bail!("headless viewport must not be empty, got {viewport:?}");
        }
        let instance = wgpu::Instance::default();
        let (_, device, queue) = pollster::block_on(request_device(&instance, None))?;
        check_extent(&device, viewport)?;
        let texture = scoped(&device, "failed to create offscreen output", || {
            offscreen_texture(&device, viewport)
        })?;
        Ok(Self::assemble(device, queue, Output::Offscreen { texture }, OFFSCREEN_FORMAT, viewport))
    }

    fn assemble(
        device: wgpu::Device,
        queue: wgpu::Queue,
        output: Output,
        format: wgpu::TextureFormat,
        viewport: Viewport,
    ) -> Self {
        let uniform = |label, size| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        let camera_buffer = uniform("Camera Buffer", shadergen::layout::camera_uniform_size());
        let frame_buffer = uniform("Frame Buffer", shadergen::layout::FRAME_UNIFORM_SIZE);
        let quad = pipeline::create_fullscreen_quad(&device);
        Self {
            device,
            queue,
            output,
            format,
            viewport,
            quad,
            camera_buffer,
            frame_buffer,
            program: None,
            accumulation: None,
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Copies the offscreen output into an image.
    ///
    /// # Errors
    ///
    /// Fails for window surfaces, which cannot be read back, or if mapping fails.
    pub fn read_image(&self) -> Result<image::RgbaImage> {
        let Output::Offscreen { texture } = &self.output else {
            bail!("only offscreen output can be read back");
        };
        let Viewport { width, height } = self.viewport;
        let unpadded = width * 4;
        let padded = unpadded.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Buffer"),
            size: u64::from(padded) * u64::from(height),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("readback") });
        encoder.copy_texture_to_buffer(
            texture.as_image_copy(),
            wgpu::ImageCopyBuffer {
                buffer: &buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(height),
                },
            },
            texture_extent(self.viewport),
        );
        self.queue.submit(Some(encoder.finish()));

        let slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .context("readback callback dropped")?
            .context("failed to map readback buffer")?;

        let mut pixels = Vec::with_capacity((unpadded * height) as usize);
        {
            let data = slice.get_mapped_range();
            for row in data.chunks(padded as usize) {
                pixels.extend_from_slice(&row[..unpadded as usize]);
            }
        }
        buffer.unmap();
        image::RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("readback size does not match {width}x{height}"))
    }

    /// Saves the offscreen output as a timestamped PNG in `dir`.
    ///
    /// # Errors
    ///
    /// See [`WgpuBackend::read_image`]; also fails if the file cannot be written.
    pub fn save_png(&self, dir: &Path) -> Result<PathBuf> {
        let name = format!("render-{}.png", chrono::Local::now().format("%Y%m%d-%H%M%S"));
        let path = dir.join(name);
        self.save_png_as(&path)?;
        Ok(path)
    }

    /// Saves the offscreen output to `path`.
    ///
    /// # Errors
    ///
    /// See [`WgpuBackend::save_png`].
    pub fn save_png_as(&self, path: &Path) -> Result<()> {
        self.read_image()?
            .save(path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "saved render");
        Ok(())
    }

    fn write_uniforms(&self, inputs: &DrawInputs<'_>) {
        if self.binds(BindingKind::Camera) {
            let camera = CameraUniform::new(inputs.camera);
            self.queue.write_buffer(&self.camera_buffer, 0, camera.as_bytes());
        }
        self.queue
            .write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(&inputs.frame));
    }

    fn binds(&self, kind: BindingKind) -> bool {
        self.program
            .as_ref()
            .is_some_and(|p| p.bindings.iter().any(|b| b.kind == kind))
    }

    fn bind_group(&self, program: &LoadedProgram) -> Result<wgpu::BindGroup> {
        let accum_view = self
            .accumulation
            .as_ref()
            .map(|a| a.accum.create_view(&wgpu::TextureViewDescriptor::default()));

        let mut entries = Vec::with_capacity(program.bindings.len());
        for binding in &program.bindings {
            let resource = match binding.kind {
                BindingKind::Camera => self.camera_buffer.as_entire_binding(),
                BindingKind::Frame => self.frame_buffer.as_entire_binding(),
                BindingKind::AccumTexture => wgpu::BindingResource::TextureView(
                    accum_view
                        .as_ref()
                        .context("offline program drawn without an accumulation buffer")?,
                ),
                BindingKind::ExportParams | BindingKind::ExportValues => {
                    bail!("binding `{}` belongs to the export kernel", binding.name)
                }
            };
            entries.push(wgpu::BindGroupEntry {
                binding: binding.binding,
                resource,
            });
        }
        Ok(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Program Bind Group"),
            layout: &program.layout,
            entries: &entries,
        }))
    }

    /// Runs a fullscreen pass of `pipeline` into `target`
    fn draw(&self, pipeline: &wgpu::RenderPipeline, target: &wgpu::TextureView) -> Result<()> {
        let program = self.program.as_ref().context("no program loaded")?;
        let bind_group = self.bind_group(program)?;
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("enc") });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("rpass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            rpass.set_pipeline(pipeline);
            rpass.set_bind_group(shadergen::layout::GROUP, &bind_group, &[]);
            rpass.set_vertex_buffer(0, self.quad.slice(..));
            rpass.draw(0..4, 0..1);
        }
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    /// Draws `pipeline` to the output and presents it
    fn draw_to_output(&self, pipeline: &wgpu::RenderPipeline) -> Result<()> {
        match &self.output {
            Output::Surface { surface, config } => {
                let frame = match surface.get_current_texture() {
                    Ok(frame) => frame,
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        surface.configure(&self.device, config);
                        surface
                            .get_current_texture()
                            .context("failed to acquire surface texture")?
                    }
                    Err(e) => return Err(e).context("failed to acquire surface texture"),
                };
                let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());
                self.draw(pipeline, &view)?;
                frame.present();
            }
            Output::Offscreen { texture } => {
                let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
                self.draw(pipeline, &view)?;
            }
        }
        Ok(())
    }

    fn build_program(&self, program: &Program) -> Result<LoadedProgram> {
        let shader = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Generated Shader"),
            source: wgpu::ShaderSource::Wgsl(program.source.as_str().into()),
        });
        let layout = pipeline::create_bind_group_layout(&self.device, &program.bindings)?;
        let pipeline_layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Program Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let build = |entry: EntryPoint, format| {
            pipeline::create_render_pipeline(&self.device, &pipeline_layout, &shader, entry.name(), format)
        };

        let (direct, trace, present) = if program.real_time {
            (Some(build(EntryPoint::RealTime, self.format)), None, None)
        } else {
            (
                None,
                Some(build(EntryPoint::Trace, ACCUMULATION_FORMAT)),
                Some(build(EntryPoint::Present, self.format)),
            )
        };
        Ok(LoadedProgram {
            bindings: program.bindings.clone(),
            layout,
            direct,
            trace,
            present,
        })
    }

    fn pipeline(&self, entry: EntryPoint) -> Result<&wgpu::RenderPipeline> {
        let program = self.program.as_ref().context("no program loaded")?;
        let pipeline = match entry {
            EntryPoint::RealTime => program.direct.as_ref(),
            EntryPoint::Trace => program.trace.as_ref(),
            EntryPoint::Present => program.present.as_ref(),
            EntryPoint::Vertex | EntryPoint::Export => None,
        };
        pipeline.with_context(|| format!("loaded program has no `{}` entry point", entry.name()))
    }
}

/// Runs `create` inside validation and out-of-memory error scopes, turning a captured
/// device error into `Err` instead of the uncaptured-error panic
fn scoped<T>(device: &wgpu::Device, what: &str, create: impl FnOnce() -> T) -> Result<T> {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = create();
    let validation = pollster::block_on(device.pop_error_scope());
    let out_of_memory = pollster::block_on(device.pop_error_scope());
    match validation.or(out_of_memory) {
        Some(error) => Err(anyhow!("{what}: {error}")),
        None => Ok(value),
    }
}

fn check_extent(device: &wgpu::Device, viewport: Viewport) -> Result<()> {
    let max = device.limits().max_texture_dimension_2d;
    if viewport.width > max || viewport.height > max {
        bail!(
            "viewport {}x{} exceeds the device texture limit of {max}",
            viewport.width,
            viewport.height
        );
    }
    Ok(())
}

fn texture_extent(viewport: Viewport) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: viewport.width,
        height: viewport.height,
        depth_or_array_layers: 1,
    }
}

fn offscreen_texture(device: &wgpu::Device, viewport: Viewport) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Offscreen Output"),
        size: texture_extent(viewport),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: OFFSCREEN_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}

fn accumulation_texture(device: &wgpu::Device, viewport: Viewport, label: &str) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: texture_extent(viewport),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: ACCUMULATION_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    })
}

impl RenderBackend for WgpuBackend {
    fn load_program(&mut self, program: &Program) -> Result<()> {
        let loaded = scoped(&self.device, "failed to build program", || {
            self.build_program(program)
        })??;
        self.program = Some(loaded);
        tracing::debug!(real_time = program.real_time, bytes = program.source.len(), "program loaded");
        Ok(())
    }

    fn allocate_accumulation(&mut self, viewport: Viewport) -> Result<()> {
        if viewport.is_empty() {
            bail!("cannot accumulate into an empty viewport");
        }
        check_extent(&self.device, viewport)?;
        self.release_accumulation();
        // New textures start zeroed
        let accumulation = scoped(&self.device, "failed to allocate accumulation buffer", || {
            Accumulation {
                viewport,
                trace: accumulation_texture(&self.device, viewport, "Trace Texture"),
                accum: accumulation_texture(&self.device, viewport, "Accumulation Texture"),
            }
        })?;
        self.accumulation = Some(accumulation);
        tracing::debug!(width = viewport.width, height = viewport.height, "accumulation allocated");
        Ok(())
    }

    fn release_accumulation(&mut self) {
        if let Some(accumulation) = self.accumulation.take() {
            accumulation.trace.destroy();
            accumulation.accum.destroy();
        }
    }

    fn draw_sample(&mut self, inputs: &DrawInputs<'_>) -> Result<()> {
        let trace = &self
            .accumulation
            .as_ref()
            .context("no accumulation buffer")?
            .trace;
        let view = trace.create_view(&wgpu::TextureViewDescriptor::default());
        self.write_uniforms(inputs);
        self.draw(self.pipeline(EntryPoint::Trace)?, &view)
    }

    fn accumulate(&mut self) -> Result<()> {
        let accumulation = self.accumulation.as_ref().context("no accumulation buffer")?;
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("accumulate") });
        encoder.copy_texture_to_texture(
            accumulation.trace.as_image_copy(),
            accumulation.accum.as_image_copy(),
            texture_extent(accumulation.viewport),
        );
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn present(&mut self, inputs: &DrawInputs<'_>) -> Result<()> {
        self.write_uniforms(inputs);
        self.draw_to_output(self.pipeline(EntryPoint::Present)?)
    }

    fn draw_direct(&mut self, inputs: &DrawInputs<'_>) -> Result<()> {
        self.write_uniforms(inputs);
        self.draw_to_output(self.pipeline(EntryPoint::RealTime)?)
    }

    fn resize(&mut self, viewport: Viewport) -> Result<()> {
        if viewport.is_empty() {
            bail!("cannot resize to an empty viewport");
        }
        check_extent(&self.device, viewport)?;
        let device = &self.device;
        match &mut self.output {
            Output::Surface { surface, config } => {
                config.width = viewport.width;
                config.height = viewport.height;
                scoped(device, "failed to reconfigure surface", || {
                    surface.configure(device, config);
                })?;
            }
            Output::Offscreen { texture } => {
                let resized = scoped(device, "failed to resize offscreen output", || {
                    offscreen_texture(device, viewport)
                })?;
                std::mem::replace(texture, resized).destroy();
            }
        }
        self.viewport = viewport;
        Ok(())
    }
}
