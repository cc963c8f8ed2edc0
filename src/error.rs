use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Browser launch failed: {0}")]
    Launch(String),

    /// Network failure or load timeout. Callers may retry the URL.
    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Form frame could not be resolved: {0}")]
    FrameResolution(String),

    #[error("Timed out interacting with: {0}")]
    InteractionTimeout(String),

    #[error("JavaScript error: {0}")]
    Js(String),

    #[error("Invalid form descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("CDP error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
