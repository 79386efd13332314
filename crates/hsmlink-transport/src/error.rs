use std::path::PathBuf;

/// Errors that can occur in packet transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The operation cannot complete right now; poll again later.
    ///
    /// On send this means the outgoing slot is still occupied, on receive
    /// it means no packet has arrived. Callers treat this as progress
    /// pacing, not as failure.
    #[error("transport would block")]
    WouldBlock,

    /// The transport has not been initialized, or has no peer to reply to.
    #[error("transport not connected")]
    NotConnected,

    /// The peer has gone away and no further packets can be exchanged.
    #[error("peer closed the link")]
    Closed,

    /// The packet exceeds the transport's maximum transmission unit.
    #[error("packet exceeds MTU ({len} bytes, max {mtu})")]
    Oversize { len: usize, mtu: usize },

    /// Failed to bind to the specified address.
    #[error("failed to bind to {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// An I/O error occurred on the transport.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
