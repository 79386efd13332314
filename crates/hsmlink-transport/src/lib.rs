//! Packet transports for the hsmlink communication layer.
//!
//! A transport moves whole packets of at most [`hsmlink_wire::MTU`] bytes
//! between one client and one server, reliably and in order, without ever
//! splitting or merging them. Every operation is non-blocking;
//! [`TransportError::WouldBlock`] means "poll again", not failure.
//!
//! Two transports are provided:
//! - [`mem::pair`]: an in-process mailbox pair with one packet slot per
//!   direction, modeling a shared-memory link
//! - [`UnixDgramClient`] / [`UnixDgramServer`]: Unix datagram sockets,
//!   where one datagram is one packet

pub mod error;
pub mod mem;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use mem::{pair, MemClient, MemServer};
pub use traits::{ClientTransport, ServerTransport};

#[cfg(unix)]
pub use uds::{UnixDgramClient, UnixDgramServer, DEFAULT_SOCKET_MODE};
