//! # rtr Application Logic
//!
//! Wires the store, the render engine and the exporter together for the three ways the
//! binary runs:
//!
//! - windowed: a winit event loop drives one engine tick per redraw, hotkeys dispatch
//!   actions and the scene file is watched for changes;
//! - headless: the engine renders into an offscreen texture until the session stops and
//!   the result is saved as a PNG;
//! - export: the scene's distance field is sampled and written as JSON.

use std::fs::File;
use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use compute::{CancelToken, ExportError, ExportJob, ExportSettings, VolumeSamples};
use render::{
    EngineConfig, EngineHandle, FrameClock, FrameTick, RenderEngine, Status, Tick,
    Viewport, WgpuBackend,
};
use scene::Scene;
use tracing::{debug, error, info, warn};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoopBuilder};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowBuilder};

use crate::loader;
use crate::store::{Action, AppState, Effect, Store};
use crate::watcher;

/// How the binary was asked to run
#[derive(Debug, Clone)]
pub struct Options {
    pub scene: PathBuf,
    /// Overrides the offline sample count
    pub samples: Option<u32>,
    pub real_time: bool,
    pub headless: bool,
    /// PNG file or directory for headless renders
    pub output: Option<PathBuf>,
    pub viewport: Viewport,
    /// Write the scene's distance field here instead of rendering
    pub export: Option<PathBuf>,
}

#[cfg(not(feature = "gpu-export"))]
type Sampler = compute::CpuSampler;
#[cfg(feature = "gpu-export")]
type Sampler = compute::WgpuSampler;

#[cfg(not(feature = "gpu-export"))]
#[allow(clippy::unnecessary_wraps)]
fn sampler(scene: &Scene) -> Result<Sampler> {
    Ok(compute::CpuSampler::new(scene.clone()))
}

#[cfg(feature = "gpu-export")]
fn sampler(scene: &Scene) -> Result<Sampler> {
    compute::WgpuSampler::new(scene).context("GPU export sampler unavailable")
}

/// Runs the application until the window closes or the batch job is done.
///
/// # Errors
///
/// Fails when the scene cannot be loaded, or in headless and export modes when it does not
/// compile. GPU setup failures are returned in every mode.
pub fn run(options: &Options) -> Result<()> {
    let source = loader::load_scene_source(&options.scene)?;
    let mut store = Store::new(AppState::new(options.viewport));
    store.dispatch(Action::SourceLoaded(source));
    store.dispatch(Action::Compile);
    if let Some(samples) = options.samples {
        store.dispatch(Action::SetMaxSampleCount(samples));
    }

    if let Some(path) = &options.export {
        ensure_compiled(&store)?;
        return export_to_file(&mut store, path);
    }
    if options.headless {
        ensure_compiled(&store)?;
        return render_headless(&mut store, options);
    }
    run_windowed(store, options)
}

fn ensure_compiled(store: &Store) -> Result<()> {
    match store.state().error() {
        Some(e) => bail!("{e}"),
        None => Ok(()),
    }
}

fn session_action(options: &Options) -> Action {
    if options.real_time {
        Action::RealTime
    } else {
        Action::Render
    }
}

fn export_to_file(store: &mut Store, path: &Path) -> Result<()> {
    let effects = store.dispatch(Action::ExportSdf);
    let Some((scene, settings)) = effects.into_iter().find_map(|effect| match effect {
        Effect::StartExport { scene, settings } => Some((scene, settings)),
        _ => None,
    }) else {
        bail!("nothing to export");
    };

    info!(
        resolution = settings.resolution,
        min = ?settings.min_coords,
        max = ?settings.max_coords,
        "exporting distance field"
    );
    let volume = compute::export(
        sampler(&scene)?,
        &settings,
        |progress| {
            debug!(progress, "export progress");
            store.dispatch(Action::ExportProgress(progress));
        },
        &CancelToken::new(),
    );
    store.dispatch(Action::ExportFinished);
    write_volume(path, &volume?)
}

fn write_volume(path: &Path, volume: &VolumeSamples) -> Result<()> {
    let file = File::create(path).with_context(|| format!("cannot create `{}`", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, volume).context("failed to serialise export")?;
    writer.flush()?;
    info!(path = %path.display(), cells = volume.values.len(), "export written");
    Ok(())
}

fn render_headless(store: &mut Store, options: &Options) -> Result<()> {
    let backend = WgpuBackend::headless(options.viewport)?;
    let mut engine = RenderEngine::new(backend, options.viewport, EngineConfig::default());
    let handle = engine.handle();
    for effect in store.dispatch(session_action(options)) {
        if let Effect::Engine(command) = effect {
            handle.send(command);
        }
    }

    let frames = store.state().headless_frames();
    let ran = render::run_headless(&mut engine, frames)?;
    info!(frames = ran, status = ?engine.status(), "headless render finished");

    let backend = engine.backend();
    let saved = match &options.output {
        Some(path) if path.extension().is_some_and(|ext| ext == "png") => {
            backend.save_png_as(path)?;
            path.clone()
        }
        Some(dir) => backend.save_png(dir)?,
        None => backend.save_png(Path::new("."))?,
    };
    info!(path = %saved.display(), "image saved");
    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum UserEvent {
    SceneChanged,
}

/// An export stepped once per frame
struct RunningExport {
    job: ExportJob<Sampler>,
    path: PathBuf,
}

/// Everything the event loop owns
struct App {
    window: Arc<Window>,
    store: Store,
    engine: RenderEngine<WgpuBackend>,
    handle: EngineHandle,
    clock: FrameClock,
    running: bool,
    export: Option<RunningExport>,
    scene_path: PathBuf,
    export_path: PathBuf,
}

impl App {
    fn dispatch(&mut self, action: Action) {
        for effect in self.store.dispatch(action) {
            match effect {
                Effect::Engine(command) => self.handle.send(command),
                Effect::StartExport { scene, settings } => self.start_export(&scene, &settings),
                Effect::CancelExport => {
                    if let Some(export) = &self.export {
                        export.job.cancel_token().cancel();
                    }
                }
            }
        }
    }

    /// Rereads the scene file and restarts the session if it compiles
    fn reload(&mut self) {
        match loader::load_scene_source(&self.scene_path) {
            Ok(source) => {
                self.dispatch(Action::SourceLoaded(source));
                self.dispatch(Action::RegenerateScene);
            }
            Err(e) => self.dispatch(Action::SourceFailed(format!("{e:#}"))),
        }
    }

    fn key_pressed(&mut self, code: KeyCode) {
        match code {
            KeyCode::KeyR => self.dispatch(Action::Render),
            KeyCode::KeyE => self.dispatch(Action::RealTime),
            KeyCode::KeyG => self.reload(),
            KeyCode::KeyX => self.dispatch(Action::ExportSdf),
            KeyCode::KeyC => self.dispatch(Action::CancelExport),
            KeyCode::Escape => self.dispatch(Action::Cancel),
            _ => {}
        }
    }

    fn start_export(&mut self, scene: &Scene, settings: &ExportSettings) {
        let job = sampler(scene)
            .and_then(|s| ExportJob::new(s, settings).map_err(anyhow::Error::from));
        match job {
            Ok(job) => {
                info!(batches = job.batch_count(), path = %self.export_path.display(), "export started");
                self.export = Some(RunningExport {
                    job,
                    path: self.export_path.clone(),
                });
            }
            Err(e) => {
                error!("cannot start export: {e:#}");
                self.dispatch(Action::ExportFinished);
            }
        }
    }

    /// Samples one export batch
    fn step_export(&mut self) {
        let Some(export) = self.export.as_mut() else {
            return;
        };
        match export.job.step() {
            Ok(progress) => {
                self.dispatch(Action::ExportProgress(progress));
                if !self.export.as_ref().is_some_and(|e| e.job.is_finished()) {
                    return;
                }
            }
            Err(ExportError::Aborted) => info!("export aborted"),
            Err(e) => error!("export failed: {e}"),
        }

        if let Some(RunningExport { job, path }) = self.export.take() {
            if job.is_finished() {
                let written = job
                    .finish()
                    .map_err(anyhow::Error::from)
                    .and_then(|volume| write_volume(&path, &volume));
                if let Err(e) = written {
                    error!("export failed: {e:#}");
                }
            }
        }
        self.dispatch(Action::ExportFinished);
    }

    fn frame(&mut self) {
        let tick = self.clock.next_tick();
        self.step_export();
        match self.engine.tick(tick) {
            Ok(next) => self.running = next == Tick::Continue,
            Err(e) => {
                error!("render failed: {e:#}");
                self.running = false;
            }
        }
        self.report(tick);
    }

    fn report(&self, tick: FrameTick) {
        let title = match self.engine.status() {
            Status::Idle => String::from("rtr"),
            Status::Offline {
                sample_index,
                max_samples,
                elapsed,
            } => {
                debug!(sample_index, max_samples, elapsed_ms = elapsed.as_millis(), "sample drawn");
                format!("rtr - {sample_index}/{max_samples} samples, {:.2}s", elapsed.as_secs_f32())
            }
            Status::Converged {
                sample_index,
                elapsed,
                ..
            } => format!("rtr - {sample_index} samples in {:.2}s", elapsed.as_secs_f32()),
            Status::RealTime { fps } => {
                let fps = fps.unwrap_or_default();
                if tick.frame_index % 120 == 0 {
                    debug!(fps, "real-time");
                }
                format!("rtr - {fps:.1} fps")
            }
        };
        let title = match self.store.state().export_progress() {
            Some(progress) => format!("{title} - export {:.0}%", progress * 100.0),
            None => title,
        };
        self.window.set_title(&title);
    }

    fn wants_frame(&self) -> bool {
        self.running || self.handle.pending() > 0 || self.export.is_some()
    }
}

fn run_windowed(store: Store, options: &Options) -> Result<()> {
    let event_loop = EventLoopBuilder::<UserEvent>::with_user_event()
        .build()
        .context("failed to create event loop")?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("rtr")
            .with_inner_size(PhysicalSize::new(
                options.viewport.width,
                options.viewport.height,
            ))
            .build(&event_loop)
            .context("failed to create window")?,
    );

    let backend = pollster::block_on(WgpuBackend::for_window(Arc::clone(&window)))?;
    let viewport = backend.viewport();
    let engine = RenderEngine::new(backend, viewport, EngineConfig::default());
    let handle = engine.handle();

    let proxy = event_loop.create_proxy();
    let _scene_watcher = match watcher::start(&options.scene, move || {
        if proxy.send_event(UserEvent::SceneChanged).is_err() {
            debug!("event loop closed, dropping scene change");
        }
    }) {
        Ok(w) => Some(w),
        Err(e) => {
            warn!("scene hot reload disabled: {e:#}");
            None
        }
    };

    let compiled = store.state().error().is_none();
    let mut app = App {
        window: Arc::clone(&window),
        store,
        engine,
        handle,
        clock: FrameClock::new(),
        running: false,
        export: None,
        scene_path: options.scene.clone(),
        export_path: options
            .export
            .clone()
            .unwrap_or_else(|| options.scene.with_extension("sdf.json")),
    };
    app.dispatch(Action::Resize(viewport));
    if compiled {
        app.dispatch(session_action(options));
    }

    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { event, window_id } if window_id == window.id() => match event {
            WindowEvent::CloseRequested => elwt.exit(),
            WindowEvent::Resized(size) => {
                app.dispatch(Action::Resize(Viewport::new(size.width, size.height)));
            }
            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed && !event.repeat =>
            {
                if let PhysicalKey::Code(code) = event.physical_key {
                    app.key_pressed(code);
                }
            }
            WindowEvent::RedrawRequested => app.frame(),
            _ => {}
        },
        Event::UserEvent(UserEvent::SceneChanged) => app.reload(),
        Event::AboutToWait => {
            if app.wants_frame() {
                elwt.set_control_flow(ControlFlow::Poll);
                window.request_redraw();
            } else {
                elwt.set_control_flow(ControlFlow::Wait);
            }
        }
        _ => {}
    })?;
    Ok(())
}
