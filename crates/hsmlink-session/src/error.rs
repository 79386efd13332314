use hsmlink_wire::WireError;

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The session has not been initialized, or has been cleaned up.
    #[error("session not initialized")]
    NotInitialized,

    /// The payload exceeds the fixed per-packet data capacity.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The caller's buffer cannot hold the received payload. The packet
    /// has already been consumed from the transport and is lost.
    #[error("receive buffer too small (need {need} bytes, have {capacity})")]
    BufferTooSmall { need: usize, capacity: usize },

    /// A received packet is too short to carry a header.
    #[error("malformed packet ({len} bytes, header is {} bytes)", hsmlink_wire::HEADER_LEN)]
    Malformed { len: usize },

    /// A default-sequence response was attempted with no request to answer.
    #[error("no request pending (nothing to respond to)")]
    NoPendingRequest,

    /// Transport initialization failed.
    #[error("transport init failed: {0}")]
    Init(#[source] hsmlink_transport::TransportError),

    /// Transport-level error during an exchange.
    #[error("transport error: {0}")]
    Transport(#[from] hsmlink_transport::TransportError),
}

impl From<WireError> for SessionError {
    fn from(err: WireError) -> Self {
        match err {
            WireError::PayloadTooLarge { size, max } => SessionError::PayloadTooLarge { size, max },
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
