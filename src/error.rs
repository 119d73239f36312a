use thiserror::Error;

/// Maximum number of characters of an error response body kept in [`FetchError::Http`].
pub const MAX_ERROR_BODY_CHARS: usize = 500;

/// Failure of a single fetch cycle.
///
/// Fetch errors never reach the accessors of the client. They are handed to
/// the `on_error` callback and logged, and the cache keeps its previous content.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The request could not be completed or the response could not be decoded.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl FetchError {
    pub(crate) fn http(status: u16, body: &str) -> Self {
        Self::Http {
            status,
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        }
    }

    /// Status code of the response, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Http { status, .. } => Some(*status),
            FetchError::Transport(e) => e.status().map(|s| s.as_u16()),
        }
    }
}
