use std::sync::Arc;

use glam::Vec3;
use render::{Command, Viewport, DEFAULT_MAX_SAMPLES};
use rtr::store::{Action, AppState, Effect, Store, StoreError, DEFAULT_EXPORT_SETTINGS, SDF_MAX_SAMPLES};
use scene::{Camera, CameraSpec, RenderMode};

const SDF_SCENE: &str = r#"{
  "rendererSettings": { "renderMode": "sdf" },
  "sdfExportSettings": { "resolution": 48, "minCoords": [-2, -2, -2] },
  "objectList": [
    { "type": "sdf-sphere", "position": [0, 0, 0], "radius": 0.5, "material": "lambert" }
  ]
}"#;

const RAYTRACE_SCENE: &str = r#"{
  "camera": { "lookFrom": [0, 1, 4], "lookAt": [0, 0.5, 0], "vUp": [0, 1, 0], "vfov": 40 },
  "sdfExportSettings": { "resolution": 8, "minCoords": [-1, -1, -1], "maxCoords": [1, 1, 1] },
  "objectList": [
    { "type": "sphere", "center": [0, 0, -1], "radius": 0.5, "material": "lambert" }
  ]
}"#;

fn loaded(source: &str) -> Store {
    let mut store = Store::new(AppState::new(Viewport::new(200, 100)));
    store.dispatch(Action::SourceLoaded(source.to_string()));
    store.dispatch(Action::Compile);
    store
}

fn engine_command(effects: Vec<Effect>) -> Command {
    match effects.as_slice() {
        [Effect::Engine(command)] => command.clone(),
        other => panic!("expected one engine command, got {other:?}"),
    }
}

#[test]
fn first_compile_seeds_mode_and_export_settings() {
    let mut store = loaded(SDF_SCENE);
    let state = store.state();
    assert!(state.error().is_none());
    assert_eq!(state.render_mode(), RenderMode::Sdf);

    let settings = state.export_settings();
    assert_eq!(settings.resolution, 48);
    assert_eq!(settings.min_coords, Vec3::splat(-2.0));
    assert_eq!(settings.max_coords, DEFAULT_EXPORT_SETTINGS.max_coords);

    // Later compiles replace the scene but not the seeded values
    store.dispatch(Action::SourceLoaded(RAYTRACE_SCENE.to_string()));
    store.dispatch(Action::Compile);
    let state = store.state();
    assert_eq!(state.render_mode(), RenderMode::Sdf);
    assert_eq!(state.export_settings().resolution, 48);
    assert!(!state.scene().unwrap().has_sdf_geometries);
}

#[test]
fn sdf_mode_renders_two_samples() {
    let mut store = loaded(SDF_SCENE);
    store.dispatch(Action::SetMaxSampleCount(100));
    assert_eq!(store.state().current_max_sample_count(), SDF_MAX_SAMPLES);

    match engine_command(store.dispatch(Action::Render)) {
        Command::Render { max_samples, .. } => assert_eq!(max_samples, SDF_MAX_SAMPLES),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn render_uses_the_sample_count_and_scene() {
    let mut store = loaded(RAYTRACE_SCENE);
    store.dispatch(Action::SetMaxSampleCount(25));

    match engine_command(store.dispatch(Action::Render)) {
        Command::Render {
            scene,
            camera,
            max_samples,
        } => {
            assert_eq!(max_samples, 25);
            assert!(Arc::ptr_eq(&scene, store.state().scene().unwrap()));
            assert!((camera.spec().aspect - 2.0).abs() < 1e-6);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(!store.state().is_real_time());
}

#[test]
fn zero_samples_still_runs_one_headless_frame() {
    let mut store = loaded(RAYTRACE_SCENE);
    store.dispatch(Action::SetMaxSampleCount(0));
    assert_eq!(store.state().current_max_sample_count(), 0);
    assert_eq!(store.state().headless_frames(), 1);

    store.dispatch(Action::SetMaxSampleCount(12));
    assert_eq!(store.state().headless_frames(), 12);
}

#[test]
fn regenerate_resets_samples_and_keeps_the_mode() {
    let mut store = loaded(RAYTRACE_SCENE);
    store.dispatch(Action::SetMaxSampleCount(3));
    assert!(matches!(
        engine_command(store.dispatch(Action::RealTime)),
        Command::RealTime { .. }
    ));

    let command = engine_command(store.dispatch(Action::RegenerateScene));
    assert!(matches!(command, Command::RealTime { .. }));
    assert_eq!(store.state().current_max_sample_count(), DEFAULT_MAX_SAMPLES);

    store.dispatch(Action::Render);
    store.dispatch(Action::SetMaxSampleCount(3));
    match engine_command(store.dispatch(Action::RegenerateScene)) {
        Command::Render { max_samples, .. } => assert_eq!(max_samples, DEFAULT_MAX_SAMPLES),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn failed_compile_keeps_previous_scene() {
    let mut store = loaded(RAYTRACE_SCENE);
    let previous = Arc::clone(store.state().scene().unwrap());

    store.dispatch(Action::SourceLoaded("{\n  \"objectList\": [\n    {,\n  ]\n}".to_string()));
    let effects = store.dispatch(Action::RegenerateScene);
    assert!(effects.is_empty(), "a broken scene must not restart the session");

    let state = store.state();
    assert!(Arc::ptr_eq(state.scene().unwrap(), &previous));
    match state.error() {
        Some(StoreError::Eval(e)) => assert_eq!(e.row, 3),
        other => panic!("expected an eval error, got {other:?}"),
    }

    store.dispatch(Action::SourceLoaded(RAYTRACE_SCENE.to_string()));
    assert_eq!(store.dispatch(Action::RegenerateScene).len(), 1);
    assert!(store.state().error().is_none());
}

#[test]
fn scene_without_camera_uses_the_default() {
    let store = loaded(SDF_SCENE);
    let expected = Camera::build(&CameraSpec::default().with_aspect(2.0)).unwrap();
    assert_eq!(store.state().camera().unwrap(), expected);
}

#[test]
fn nothing_to_render_before_a_compile() {
    let mut store = Store::default();
    assert!(store.dispatch(Action::Render).is_empty());
    assert!(store.dispatch(Action::ExportSdf).is_empty());
    assert!(matches!(
        engine_command(store.dispatch(Action::Cancel)),
        Command::Cancel
    ));
}

#[test]
fn export_lifecycle() {
    let mut store = loaded(RAYTRACE_SCENE);
    let effects = store.dispatch(Action::ExportSdf);
    match effects.as_slice() {
        [Effect::StartExport { settings, .. }] => {
            assert_eq!(settings.resolution, 8);
            assert_eq!(settings.max_coords, Vec3::ONE);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(store.state().export_progress(), Some(0.0));

    assert!(store.dispatch(Action::ExportSdf).is_empty(), "one export at a time");

    store.dispatch(Action::ExportProgress(0.25));
    assert_eq!(store.state().export_progress(), Some(0.25));

    assert!(matches!(
        store.dispatch(Action::CancelExport).as_slice(),
        [Effect::CancelExport]
    ));
    assert_eq!(store.state().export_progress(), None);
    assert!(store.dispatch(Action::CancelExport).is_empty());

    // Late progress from the aborted job is dropped
    store.dispatch(Action::ExportProgress(0.5));
    assert_eq!(store.state().export_progress(), None);
}

#[test]
fn resize_forwards_to_the_engine() {
    let mut store = loaded(RAYTRACE_SCENE);
    let size = Viewport::new(640, 480);
    assert!(matches!(
        engine_command(store.dispatch(Action::Resize(size))),
        Command::Resize(v) if v == size
    ));
    assert!(store.dispatch(Action::Resize(size)).is_empty());

    let camera = store.state().camera().unwrap();
    assert!((camera.spec().aspect - 640.0 / 480.0).abs() < 1e-6);
}

#[test]
fn fetch_errors_clear_on_the_next_load() {
    let mut store = Store::default();
    store.dispatch(Action::SourceFailed("could not read scene `a.json`".to_string()));
    assert!(matches!(store.state().error(), Some(StoreError::Fetch(_))));

    store.dispatch(Action::SourceLoaded(SDF_SCENE.to_string()));
    assert!(store.state().error().is_none());
    assert_eq!(store.state().source(), SDF_SCENE);
}
