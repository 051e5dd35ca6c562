use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("failed to generate shader: {0}")]
    Shader(#[from] shadergen::ShaderError),
    #[error(transparent)]
    Camera(#[from] scene::CameraError),
    /// A GPU operation failed; the session that issued it has been cancelled
    #[error("render backend failed: {0:#}")]
    Backend(#[source] anyhow::Error),
}
