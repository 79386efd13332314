//! Packet-based request/response link layer for HSM clients and servers.
//!
//! hsmlink carries fixed-MTU request and response packets between an
//! application and a hardware security module endpoint, negotiating byte
//! order per packet and correlating exchanges by sequence number. Transports
//! are pluggable and non-blocking; the session layer polls them.
//!
//! # Crate Structure
//!
//! - [`wire`] — 8-byte packet header codec, magic constants, byte-order
//!   translation, fixed-capacity packet buffer
//! - [`transport`] — Client/server transport capability traits plus the
//!   in-process memory pair and Unix datagram transports
//! - [`session`] — `ClientSession` and `ServerSession` polling state machines

/// Re-export wire types.
pub mod wire {
    pub use hsmlink_wire::*;
}

/// Re-export transport types.
pub mod transport {
    pub use hsmlink_transport::*;
}

/// Re-export session types.
pub mod session {
    pub use hsmlink_session::*;
}
