use thiserror::Error;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while constructing, synchronizing or stopping a [crate::Client].
///
/// Feature evaluation never fails; these errors only surface from construction and `stop`, or
/// are logged by the sync tasks, which always try again.
#[derive(Error, Debug)]
pub enum Error {
    /// No API key was supplied.
    #[error("an API key is required")]
    MissingApiKey,

    /// The configured base URL could not be parsed.
    #[error("invalid base url '{url}': {message}")]
    InvalidBaseUrl {
        /// The rejected URL.
        url: String,
        /// Why it was rejected.
        message: String,
    },

    /// The polling interval must be greater than zero.
    #[error("poll interval must be greater than zero")]
    InvalidPollInterval,

    /// Network or transport error.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("server responded with {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, if it could be read.
        body: String,
    },

    /// The event stream failed mid-read.
    #[error("event stream error: {0}")]
    Stream(String),

    /// A payload could not be decoded.
    #[error("failed to parse payload: {0}")]
    Parse(#[from] serde_json::Error),

    /// `stop` was called on a client that is already stopped.
    #[error("client has already been stopped")]
    AlreadyStopped,
}
