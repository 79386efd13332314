//! Polled request/response sessions between a client and a security
//! module server.
//!
//! This is the layer applications talk to. A [`ClientSession`] issues
//! requests and polls for the matching responses; a [`ServerSession`]
//! polls for requests and answers them. Each endpoint owns one packet
//! buffer, so exactly one exchange is in flight per session, and every
//! operation returns `Ok(None)` instead of blocking when the other side
//! has not caught up.
//!
//! Byte order is negotiated per packet: the sender stamps its magic and
//! writes header fields in its own order, the receiver translates through
//! the magic it observed. Payload bytes pass through untouched in both
//! directions; their interpretation belongs to the layer above.

pub mod client;
pub mod error;
pub mod server;
pub mod state;

pub use client::{ClientConfig, ClientSession, Response};
pub use error::{Result, SessionError};
pub use server::{Request, ServerConfig, ServerSession};
pub use state::SessionState;
