//! # Call Errors
//!
//! Every way a call can fail, resolved through the same future as a successful response.
use crate::{message::DecodeError, registry::NameNotFound, transport::TransportError};

#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error(transparent)]
    NameNotFound(#[from] NameNotFound),
    /// The arguments do not satisfy the request type. Raised before any network activity.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Message type '{0}' cannot be sent with the protobuf wire format")]
    UnsupportedFormat(String),
    /// The server was never reached, or did not answer successfully.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    /// The server answered, but the payload does not match the response type.
    #[error("Failed to decode response: {0}")]
    Decode(#[from] DecodeError),
    #[error("Call cancelled")]
    Cancelled,
}

/// The tag of a [`CallError`], for programmatic matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NameNotFound,
    InvalidRequest,
    UnsupportedFormat,
    Transport,
    Decode,
    Cancelled,
}

impl CallError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CallError::NameNotFound(_) => ErrorKind::NameNotFound,
            CallError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            CallError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            CallError::Transport(_) => ErrorKind::Transport,
            CallError::Decode(_) => ErrorKind::Decode,
            CallError::Cancelled => ErrorKind::Cancelled,
        }
    }
}
