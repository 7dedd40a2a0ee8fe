//! Keypad interface error types

use mxconsole_transport::{ProtocolError, TransportError};
use thiserror::Error;

use crate::jpeg::EncodeError;

/// Errors from keypad operations
#[derive(Error, Debug)]
pub enum KeypadError {
    /// Transport layer error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Packet could not be built
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Frame could not be compressed
    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    /// Invalid parameter value
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Feature not supported by this device
    #[error("Feature not supported: {0}")]
    NotSupported(String),

    /// Every frame of an animation failed to encode
    #[error("No playable frames in animation")]
    NoPlayableFrames,

    /// Playback was stopped before it finished
    #[error("Playback cancelled")]
    Cancelled,
}

impl KeypadError {
    /// Cancellation is a normal way for playback to end
    pub fn is_cancelled(&self) -> bool {
        matches!(self, KeypadError::Cancelled)
    }
}
