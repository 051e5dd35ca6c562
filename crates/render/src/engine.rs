//! Render session state machine.
//!
//! The engine is `Idle` until a session starts. `render` starts an offline session that
//! accumulates one sample per tick and becomes `Converged` after `max_samples` ticks;
//! `real_time` starts a session that draws straight to the output every tick and never
//! ends on its own. Starting a session cancels the current one. Resizing restarts
//! accumulation from zero at the new size.
//!
//! Commands from event handlers go through an [`EngineHandle`] and are applied in call
//! order at the top of the next [`RenderEngine::tick`], before anything is drawn.

use std::collections::VecDeque;
use std::mem;
use std::sync::Arc;
use std::time::Duration;

use glam::Vec2;
use parking_lot::Mutex;
use scene::{Camera, Scene};
use shadergen::{CameraSource, GenerateOptions, ShaderTarget};

use crate::backend::{DrawInputs, Program, RenderBackend, Viewport};
use crate::error::RenderError;
use crate::fps::FpsWindow;
use crate::gpu_types::{FrameUniform, DEFAULT_BACKGROUND};

/// Samples accumulated by an offline session unless told otherwise
pub const DEFAULT_MAX_SAMPLES: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Offline,
    RealTime,
}

/// Scheduler input for one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTick {
    /// Time since the scheduler started
    pub time: Duration,
    pub frame_index: u64,
}

/// Whether the engine wants another tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Continue,
    Stop,
}

/// Status feed for the host
#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    Idle,
    Offline {
        sample_index: u32,
        max_samples: u32,
        elapsed: Duration,
    },
    Converged {
        sample_index: u32,
        max_samples: u32,
        elapsed: Duration,
    },
    RealTime {
        fps: Option<f32>,
    },
}

#[derive(Debug, Clone)]
pub enum Command {
    Render {
        scene: Arc<Scene>,
        camera: Camera,
        max_samples: u32,
    },
    RealTime {
        scene: Arc<Scene>,
        camera: Camera,
    },
    Cancel,
    Resize(Viewport),
}

/// Cloneable command queue feeding one engine
#[derive(Debug, Clone, Default)]
pub struct EngineHandle {
    queue: Arc<Mutex<VecDeque<Command>>>,
}

impl EngineHandle {
    pub fn send(&self, command: Command) {
        self.queue.lock().push_back(command);
    }

    pub fn render(&self, scene: Arc<Scene>, camera: Camera, max_samples: u32) {
        self.send(Command::Render {
            scene,
            camera,
            max_samples,
        });
    }

    pub fn real_time(&self, scene: Arc<Scene>, camera: Camera) {
        self.send(Command::RealTime { scene, camera });
    }

    pub fn cancel(&self) {
        self.send(Command::Cancel);
    }

    pub fn resize(&self, viewport: Viewport) {
        self.send(Command::Resize(viewport));
    }

    /// Commands waiting for the next tick
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    fn drain(&self) -> Vec<Command> {
        self.queue.lock().drain(..).collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EngineConfig {
    /// Bake the camera into the shader source instead of a uniform block
    pub bake_camera: bool,
    /// Fixed seed for the per draw random seeds
    pub seed: Option<u64>,
}

#[derive(Debug, Clone)]
struct Session {
    mode: SessionMode,
    scene: Arc<Scene>,
    camera: Camera,
    sample_index: u32,
    max_samples: u32,
    started: Option<Duration>,
    elapsed: Duration,
}

#[derive(Debug)]
enum EngineState {
    Idle,
    Active(Session),
    Converged(Session),
}

pub struct RenderEngine<B> {
    backend: B,
    config: EngineConfig,
    viewport: Viewport,
    state: EngineState,
    handle: EngineHandle,
    rng: fastrand::Rng,
    fps: FpsWindow,
}

impl<B: RenderBackend> RenderEngine<B> {
    pub fn new(backend: B, viewport: Viewport, config: EngineConfig) -> Self {
        let rng = config.seed.map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed);
        Self {
            backend,
            config,
            viewport,
            state: EngineState::Idle,
            handle: EngineHandle::default(),
            rng,
            fps: FpsWindow::new(),
        }
    }

    /// A handle whose commands this engine applies on its next tick
    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Mode of the active or converged session
    pub fn mode(&self) -> Option<SessionMode> {
        match &self.state {
            EngineState::Idle => None,
            EngineState::Active(s) | EngineState::Converged(s) => Some(s.mode),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, EngineState::Idle)
    }

    pub fn is_converged(&self) -> bool {
        matches!(self.state, EngineState::Converged(_))
    }

    pub fn status(&self) -> Status {
        match &self.state {
            EngineState::Idle => Status::Idle,
            EngineState::Active(s) if s.mode == SessionMode::RealTime => {
                Status::RealTime { fps: self.fps.fps() }
            }
            EngineState::Active(s) => Status::Offline {
                sample_index: s.sample_index,
                max_samples: s.max_samples,
                elapsed: s.elapsed,
            },
            EngineState::Converged(s) => Status::Converged {
                sample_index: s.sample_index,
                max_samples: s.max_samples,
                elapsed: s.elapsed,
            },
        }
    }

    /// Starts an offline session accumulating `max_samples` samples (at least one).
    ///
    /// # Errors
    ///
    /// Fails if the shader cannot be generated or the backend rejects it. The engine is
    /// idle afterwards.
    pub fn render(
        &mut self,
        scene: Arc<Scene>,
        camera: Camera,
        max_samples: u32,
    ) -> Result<(), RenderError> {
        self.start(SessionMode::Offline, scene, camera, max_samples.max(1))
    }

    /// Starts a real-time session.
    ///
    /// # Errors
    ///
    /// See [`RenderEngine::render`].
    pub fn real_time(&mut self, scene: Arc<Scene>, camera: Camera) -> Result<(), RenderError> {
        self.start(SessionMode::RealTime, scene, camera, 0)
    }

    /// Ends the current session. Does nothing when idle.
    pub fn cancel(&mut self) {
        let state = mem::replace(&mut self.state, EngineState::Idle);
        if let EngineState::Active(session) | EngineState::Converged(session) = state {
            self.backend.release_accumulation();
            self.fps.clear();
            tracing::info!(mode = ?session.mode, samples = session.sample_index, "session cancelled");
        }
    }

    /// Resizes the output. An offline session restarts accumulation at the new size.
    ///
    /// # Errors
    ///
    /// Fails when the backend cannot resize or reallocate; the session is cancelled.
    pub fn resize(&mut self, viewport: Viewport) -> Result<(), RenderError> {
        if viewport == self.viewport || viewport.is_empty() {
            return Ok(());
        }
        tracing::debug!(width = viewport.width, height = viewport.height, "resizing");
        if let Err(e) = self.backend.resize(viewport) {
            return Err(self.fail(e));
        }
        self.viewport = viewport;

        let (EngineState::Active(mut session) | EngineState::Converged(mut session)) =
            mem::replace(&mut self.state, EngineState::Idle)
        else {
            return Ok(());
        };
        session.camera = match session.camera.with_aspect(viewport.aspect()) {
            Ok(camera) => camera,
            Err(e) => {
                self.backend.release_accumulation();
                self.fps.clear();
                return Err(e.into());
            }
        };
        if self.config.bake_camera {
            self.load_program(&session)?;
        }
        if session.mode == SessionMode::Offline {
            if let Err(e) = self.backend.allocate_accumulation(viewport) {
                return Err(self.fail(e));
            }
            session.sample_index = 0;
            session.started = None;
            session.elapsed = Duration::ZERO;
        }
        self.state = EngineState::Active(session);
        Ok(())
    }

    /// Applies one command immediately.
    ///
    /// # Errors
    ///
    /// Whatever the corresponding method returns.
    pub fn apply(&mut self, command: Command) -> Result<(), RenderError> {
        match command {
            Command::Render {
                scene,
                camera,
                max_samples,
            } => self.render(scene, camera, max_samples),
            Command::RealTime { scene, camera } => self.real_time(scene, camera),
            Command::Cancel => {
                self.cancel();
                Ok(())
            }
            Command::Resize(viewport) => self.resize(viewport),
        }
    }

    /// Runs one scheduler tick: applies queued commands in order, then draws one frame of
    /// the active session.
    ///
    /// Returns [`Tick::Stop`] once there is nothing left to draw.
    ///
    /// # Errors
    ///
    /// The first error raised by a queued command or by the backend during the draw. The
    /// failing session is cancelled and nothing is drawn this tick.
    pub fn tick(&mut self, tick: FrameTick) -> Result<Tick, RenderError> {
        let mut first_error = None;
        for command in self.handle.drain() {
            if let Err(e) = self.apply(command) {
                first_error.get_or_insert(e);
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        let mut session = match mem::replace(&mut self.state, EngineState::Idle) {
            EngineState::Active(session) => session,
            other => {
                self.state = other;
                return Ok(Tick::Stop);
            }
        };

        let started = *session.started.get_or_insert(tick.time);
        session.elapsed = tick.time.saturating_sub(started);

        let drawn = match session.mode {
            SessionMode::Offline => self.draw_offline(&mut session),
            SessionMode::RealTime => self.draw_real_time(&session, tick.time),
        };
        if let Err(e) = drawn {
            return Err(self.fail(e));
        }

        if session.mode == SessionMode::Offline && session.sample_index >= session.max_samples {
            tracing::info!(
                samples = session.sample_index,
                elapsed_ms = session.elapsed.as_millis(),
                "offline render converged"
            );
            self.state = EngineState::Converged(session);
            return Ok(Tick::Stop);
        }
        self.state = EngineState::Active(session);
        Ok(Tick::Continue)
    }

    fn start(
        &mut self,
        mode: SessionMode,
        scene: Arc<Scene>,
        camera: Camera,
        max_samples: u32,
    ) -> Result<(), RenderError> {
        self.cancel();

        let camera = if self.viewport.is_empty() {
            camera
        } else {
            camera.with_aspect(self.viewport.aspect())?
        };
        let session = Session {
            mode,
            scene,
            camera,
            sample_index: 0,
            max_samples,
            started: None,
            elapsed: Duration::ZERO,
        };
        self.load_program(&session)?;
        if mode == SessionMode::Offline {
            if let Err(e) = self.backend.allocate_accumulation(self.viewport) {
                return Err(self.fail(e));
            }
        }

        tracing::info!(
            ?mode,
            render_mode = %session.scene.render_mode(),
            objects = session.scene.objects.len(),
            max_samples,
            "session started"
        );
        self.state = EngineState::Active(session);
        Ok(())
    }

    fn load_program(&mut self, session: &Session) -> Result<(), RenderError> {
        let options = GenerateOptions {
            real_time: session.mode == SessionMode::RealTime,
            num_samples: 1,
            render_mode: session.scene.render_mode(),
            camera: if self.config.bake_camera {
                CameraSource::Baked(session.camera)
            } else {
                CameraSource::Uniform
            },
            target: ShaderTarget::Screen,
        };
        let ir = shadergen::lower(&session.scene.objects, &options)?;
        let program = Program {
            source: shadergen::emit(&ir),
            bindings: ir.bindings,
            real_time: options.real_time,
        };
        self.backend
            .load_program(&program)
            .map_err(|e| self.fail(e))
    }

    fn frame_uniform(&mut self, scene: &Scene) -> FrameUniform {
        let background = scene
            .renderer_settings
            .background
            .unwrap_or(DEFAULT_BACKGROUND);
        let seed = Vec2::new(self.rng.f32(), self.rng.f32());
        FrameUniform::new(background, self.viewport.as_vec2(), seed)
    }

    fn draw_offline(&mut self, session: &mut Session) -> anyhow::Result<()> {
        let sample_count = session.sample_index + 1;
        let frame = self.frame_uniform(&session.scene).with_sample_count(sample_count);
        let inputs = DrawInputs {
            camera: &session.camera,
            frame,
        };
        self.backend.draw_sample(&inputs)?;
        self.backend.accumulate()?;
        self.backend.present(&inputs)?;
        session.sample_index = sample_count;
        Ok(())
    }

    fn draw_real_time(&mut self, session: &Session, time: Duration) -> anyhow::Result<()> {
        let frame = self.frame_uniform(&session.scene);
        self.backend.draw_direct(&DrawInputs {
            camera: &session.camera,
            frame,
        })?;
        self.fps.record(time);
        Ok(())
    }

    /// Drops whatever session is left and wraps a backend failure
    fn fail(&mut self, error: anyhow::Error) -> RenderError {
        tracing::error!("render session failed: {error:#}");
        self.state = EngineState::Idle;
        self.backend.release_accumulation();
        self.fps.clear();
        RenderError::Backend(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_keeps_call_order() {
        let handle = EngineHandle::default();
        let other = handle.clone();
        handle.cancel();
        other.resize(Viewport::new(4, 4));
        handle.cancel();
        assert_eq!(handle.pending(), 3);

        let drained = handle.drain();
        assert!(matches!(
            drained.as_slice(),
            [Command::Cancel, Command::Resize(v), Command::Cancel] if *v == Viewport::new(4, 4)
        ));
        assert_eq!(other.pending(), 0);
    }
}
