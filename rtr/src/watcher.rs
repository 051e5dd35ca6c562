//! # Scene Hot-Reloading
//!
//! Watches the scene file and calls back whenever it is written. The watcher observes the
//! file's parent directory rather than the file itself, since many editors save by
//! replacing the file.
//!
//! The caller keeps the returned [`RecommendedWatcher`] alive; dropping it stops the
//! notifications.

use std::path::Path;

use anyhow::{Context, Result};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher as _};
use tracing::{error, info};

/// Starts watching `scene_path`, calling `on_change` after every write to it.
///
/// # Errors
///
/// Fails if the path has no usable parent directory or the platform watcher cannot be
/// created.
pub fn start<F>(scene_path: &Path, on_change: F) -> Result<RecommendedWatcher>
where
    F: Fn() + Send + 'static,
{
    let scene_path = scene_path
        .canonicalize()
        .with_context(|| format!("cannot resolve scene path `{}`", scene_path.display()))?;
    let directory = scene_path
        .parent()
        .map(Path::to_path_buf)
        .context("scene path has no parent directory")?;

    let watched = scene_path.clone();
    let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
        match result {
            Ok(event) if touches(&event, &watched) => {
                info!(path = %watched.display(), "scene file changed");
                on_change();
            }
            Ok(_) => {}
            Err(e) => error!("file watcher error: {e:?}"),
        }
    })
    .context("failed to create file watcher")?;

    watcher
        .watch(&directory, RecursiveMode::NonRecursive)
        .with_context(|| format!("failed to watch `{}`", directory.display()))?;
    info!(path = %scene_path.display(), "watching scene file");
    Ok(watcher)
}

/// Whether `event` is a write or creation of `path`
fn touches(event: &Event, path: &Path) -> bool {
    (event.kind.is_modify() || event.kind.is_create())
        && event.paths.iter().any(|p| p.as_path() == path)
}
