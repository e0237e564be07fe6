//! Error types for the rendering core
//!
//! Everything in here is a startup-time condition. Per-frame problems are
//! logged and skipped, never surfaced as `Err`.

use std::path::PathBuf;

use thiserror::Error;

use crate::backend::{BackendError, TextureFormat};

/// Fatal rendering-system error
#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("Framebuffer '{label}' is incomplete: {reason}")]
    IncompleteFramebuffer { label: String, reason: String },
    #[error("Requested {requested} color attachments, backend supports {max}")]
    TooManyAttachments { requested: usize, max: u32 },
    #[error("Invalid render target dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("Depth format {0:?} cannot be used as a color attachment")]
    DepthFormatAsColor(TextureFormat),
    #[error("Graphics API {major}.{minor} is not supported, 3.0 or newer required")]
    UnsupportedApiVersion { major: u32, minor: u32 },
    #[error("Unknown component type '{0}'")]
    UnknownComponentType(String),
    #[error("No render target at index {0}")]
    InvalidRenderTarget(usize),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Engine configuration loading error
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

pub type RenderResult<T> = Result<T, RenderError>;
