//! Unified error type for lora-studio.

use thiserror::Error;

/// Errors that can occur while serving a generation request.
#[derive(Debug, Error)]
pub enum StudioError {
    /// The generation endpoint returned an error response.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// A network error occurred.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// Invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Image format conversion error.
    #[error("Image conversion error: {0}")]
    ImageConversion(String),

    /// A style adapter could not be loaded.
    #[error("Failed to load LoRA model '{adapter}': {reason}")]
    AdapterLoad {
        /// The adapter identifier that was requested.
        adapter: String,
        /// Why the load failed.
        reason: String,
    },

    /// No access token configured for the model host.
    #[error("No access token. Set {env_var} or add `token` to the [service] config section.")]
    MissingToken {
        /// The environment variable name.
        env_var: String,
    },

    /// A replayed cassette did not match the calls being made.
    #[error("Cassette error: {0}")]
    Cassette(String),

    /// A background task running part of a request panicked or was cancelled.
    #[error("Worker task failed: {0}")]
    Worker(String),
}

impl StudioError {
    /// Whether the failure came from the caller's input rather than the service or host.
    #[must_use]
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    /// Whether the failure happened locally: filesystem, image encoding, or a worker task.
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Io(_) | Self::ImageConversion(_) | Self::Worker(_))
    }
}
