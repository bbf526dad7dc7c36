//! Error taxonomy for the context aggregation core.
//!
//! None of these are fatal to the session: user-input errors block an action
//! before any network call, network/backend errors surface a message and
//! reset the relevant flow, and write errors degrade to the direct-download
//! fallback before they are ever surfaced.

/// Errors surfaced by extraction, enhancement and persistence operations.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    /// A required field was missing or empty; raised before any call.
    #[error("{message}")]
    UserInput { message: String },

    /// The request never produced a response (transport rejection).
    #[error("Network error: {message}")]
    Network { message: String },

    /// The backend answered with a non-2xx status.
    #[error("Backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    /// The platform has no directory-access capability to offer.
    #[error("Directory access unavailable: {reason}")]
    UnsupportedPlatform { reason: String },

    /// Persistence failed even after the direct-download fallback.
    #[error("Write failed: {0}")]
    Write(#[from] std::io::Error),
}

impl ContextError {
    pub fn user_input(message: impl Into<String>) -> Self {
        Self::UserInput {
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }
}
