//! Application state and the actions that change it.
//!
//! [`dispatch`] is the only way to change an [`AppState`]. It returns the new state and the
//! [`Effect`]s the host has to carry out: engine commands and export jobs. The state never
//! touches the GPU itself, so every transition can be checked without a window.

use std::sync::Arc;

use compute::ExportSettings;
use glam::Vec3;
use render::{Command, Viewport, DEFAULT_MAX_SAMPLES};
use scene::{Camera, CameraError, CameraSpec, RenderMode, Scene, SceneEvalError};
use thiserror::Error;

/// Sample count used whenever the render mode is `sdf`
pub const SDF_MAX_SAMPLES: u32 = 2;

/// Export settings before a scene overrides them
pub const DEFAULT_EXPORT_SETTINGS: ExportSettings = ExportSettings {
    resolution: 30,
    min_coords: Vec3::splat(-1.0),
    max_coords: Vec3::splat(-1.0),
};

/// Why the current scene source could not be used
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("could not load scene: {0}")]
    Fetch(String),
    #[error("scene error at {0}")]
    Eval(SceneEvalError),
    #[error(transparent)]
    Camera(#[from] CameraError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Scene text arrived from disk
    SourceLoaded(String),
    /// Reading the scene text failed
    SourceFailed(String),
    /// Compile the current source without starting a session
    Compile,
    /// Start an offline session
    Render,
    /// Start a real-time session
    RealTime,
    /// Stop the current session
    Cancel,
    /// Recompile, reset the sample count and restart in the current mode
    RegenerateScene,
    SetMaxSampleCount(u32),
    /// Start exporting the scene's distance field
    ExportSdf,
    ExportProgress(f32),
    ExportFinished,
    CancelExport,
    Resize(Viewport),
}

#[derive(Debug, Clone)]
pub enum Effect {
    /// Forward to the render engine
    Engine(Command),
    StartExport {
        scene: Arc<Scene>,
        settings: ExportSettings,
    },
    CancelExport,
}

#[derive(Debug, Clone)]
pub struct AppState {
    source: String,
    scene: Option<Arc<Scene>>,
    camera_spec: CameraSpec,
    error: Option<StoreError>,
    render_mode: RenderMode,
    real_time: bool,
    max_sample_count: u32,
    export_settings: ExportSettings,
    export_progress: Option<f32>,
    viewport: Viewport,
    initial_compile: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Viewport::new(1, 1))
    }
}

impl AppState {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            source: String::new(),
            scene: None,
            camera_spec: CameraSpec::default(),
            error: None,
            render_mode: RenderMode::default(),
            real_time: false,
            max_sample_count: DEFAULT_MAX_SAMPLES,
            export_settings: DEFAULT_EXPORT_SETTINGS,
            export_progress: None,
            viewport,
            initial_compile: true,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Last successfully compiled scene
    pub fn scene(&self) -> Option<&Arc<Scene>> {
        self.scene.as_ref()
    }

    /// Error from the last load or compile, cleared by the next successful compile
    pub fn error(&self) -> Option<&StoreError> {
        self.error.as_ref()
    }

    pub fn render_mode(&self) -> RenderMode {
        self.render_mode
    }

    pub fn is_real_time(&self) -> bool {
        self.real_time
    }

    /// Samples per offline session. Always [`SDF_MAX_SAMPLES`] in `sdf` mode.
    pub fn current_max_sample_count(&self) -> u32 {
        match self.render_mode {
            RenderMode::Sdf => SDF_MAX_SAMPLES,
            RenderMode::Raytrace => self.max_sample_count,
        }
    }

    /// Frames a headless run ticks for. The engine draws at least one sample per
    /// session, so a zero sample count still needs one frame.
    pub fn headless_frames(&self) -> u64 {
        u64::from(self.current_max_sample_count().max(1))
    }

    /// Ignored in `sdf` mode.
    pub fn set_max_sample_count(&mut self, count: u32) {
        if self.render_mode == RenderMode::Sdf {
            return;
        }
        self.max_sample_count = count;
    }

    pub fn export_settings(&self) -> ExportSettings {
        self.export_settings
    }

    /// Fraction of the running export, `None` when no export runs
    pub fn export_progress(&self) -> Option<f32> {
        self.export_progress
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Camera of the current scene at the current viewport's aspect ratio
    ///
    /// # Errors
    ///
    /// Fails if the scene's camera spec is invalid.
    pub fn camera(&self) -> Result<Camera, CameraError> {
        Camera::build(&self.camera_spec.with_aspect(self.viewport.aspect()))
    }

    fn compile(&mut self) -> bool {
        let scene = match scene::compile(&self.source) {
            Ok(scene) => scene,
            Err(e) => {
                tracing::warn!(row = e.row, column = e.column, "scene failed to compile: {}", e.message);
                self.error = Some(StoreError::Eval(e));
                return false;
            }
        };
        let camera_spec = scene.camera.unwrap_or_default();
        if let Err(e) = Camera::build(&camera_spec.with_aspect(self.viewport.aspect())) {
            tracing::warn!("scene camera rejected: {e}");
            self.error = Some(e.into());
            return false;
        }

        if self.initial_compile {
            self.initial_compile = false;
            if let Some(overrides) = &scene.sdf_export_settings {
                self.export_settings = self.export_settings.with_overrides(overrides);
                tracing::debug!(settings = ?self.export_settings, "export settings taken from scene");
            }
            self.render_mode = scene.render_mode();
        }

        tracing::info!(
            objects = scene.objects.len(),
            render_mode = %scene.render_mode(),
            "scene compiled"
        );
        self.camera_spec = camera_spec;
        self.scene = Some(Arc::new(scene));
        self.error = None;
        true
    }

    fn trace(&self) -> Vec<Effect> {
        let Some(scene) = self.scene.clone() else {
            tracing::warn!("no scene to render");
            return Vec::new();
        };
        let camera = match self.camera() {
            Ok(camera) => camera,
            Err(e) => {
                tracing::error!("cannot start session: {e}");
                return Vec::new();
            }
        };
        let command = if self.real_time {
            Command::RealTime { scene, camera }
        } else {
            Command::Render {
                scene,
                camera,
                max_samples: self.current_max_sample_count(),
            }
        };
        vec![Effect::Engine(command)]
    }
}

/// Owns an [`AppState`] and threads it through [`dispatch`]
#[derive(Debug, Default)]
pub struct Store {
    state: AppState,
}

impl Store {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn dispatch(&mut self, action: Action) -> Vec<Effect> {
        let (state, effects) = dispatch(std::mem::take(&mut self.state), action);
        self.state = state;
        effects
    }
}

/// Applies `action` to `state`.
pub fn dispatch(mut state: AppState, action: Action) -> (AppState, Vec<Effect>) {
    tracing::debug!(?action, "dispatch");
    let effects = match action {
        Action::SourceLoaded(source) => {
            state.source = source;
            if matches!(state.error, Some(StoreError::Fetch(_))) {
                state.error = None;
            }
            Vec::new()
        }
        Action::SourceFailed(message) => {
            tracing::error!("{message}");
            state.error = Some(StoreError::Fetch(message));
            Vec::new()
        }
        Action::Compile => {
            state.compile();
            Vec::new()
        }
        Action::Render => {
            state.real_time = false;
            state.trace()
        }
        Action::RealTime => {
            state.real_time = true;
            state.trace()
        }
        Action::Cancel => vec![Effect::Engine(Command::Cancel)],
        Action::RegenerateScene => {
            // The previous session keeps running when the new source is broken
            if state.compile() {
                state.set_max_sample_count(DEFAULT_MAX_SAMPLES);
                state.trace()
            } else {
                Vec::new()
            }
        }
        Action::SetMaxSampleCount(count) => {
            state.set_max_sample_count(count);
            Vec::new()
        }
        Action::ExportSdf => match (&state.scene, state.export_progress) {
            (_, Some(_)) => {
                tracing::warn!("an export is already running");
                Vec::new()
            }
            (None, None) => {
                tracing::warn!("no scene to export");
                Vec::new()
            }
            (Some(scene), None) => {
                let effect = Effect::StartExport {
                    scene: Arc::clone(scene),
                    settings: state.export_settings,
                };
                state.export_progress = Some(0.0);
                vec![effect]
            }
        },
        Action::ExportProgress(progress) => {
            if state.export_progress.is_some() {
                state.export_progress = Some(progress.clamp(0.0, 1.0));
            }
            Vec::new()
        }
        Action::ExportFinished => {
            state.export_progress = None;
            Vec::new()
        }
        Action::CancelExport => {
            if state.export_progress.take().is_some() {
                vec![Effect::CancelExport]
            } else {
                Vec::new()
            }
        }
        Action::Resize(viewport) => {
            if viewport.is_empty() || viewport == state.viewport {
                Vec::new()
            } else {
                state.viewport = viewport;
                vec![Effect::Engine(Command::Resize(viewport))]
            }
        }
    };
    (state, effects)
}
