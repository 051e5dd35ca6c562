//! Scene file loading

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
#[error("could not read scene `{}`", path.display())]
pub struct SceneFetchError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Reads the scene text at `path`.
///
/// # Errors
///
/// Returns a [`SceneFetchError`] if the file cannot be read as UTF-8 text.
pub fn load_scene_source(path: &Path) -> Result<String, SceneFetchError> {
    let source = std::fs::read_to_string(path).map_err(|source| SceneFetchError {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), bytes = source.len(), "scene source loaded");
    Ok(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_names_the_path() {
        let err = load_scene_source(Path::new("does/not/exist.json")).unwrap_err();
        assert!(err.to_string().contains("does/not/exist.json"));
        assert_eq!(err.source.kind(), std::io::ErrorKind::NotFound);
    }
}
