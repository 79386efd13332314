use crate::error::Result;

/// The client end of a packet transport.
///
/// All operations are non-blocking: `send` and `recv` return
/// [`TransportError::WouldBlock`](crate::TransportError::WouldBlock) when
/// they cannot make progress, and the caller polls again. A transport
/// carries whole packets of at most [`hsmlink_wire::MTU`] bytes, delivered
/// intact and in order; it never splits or merges them.
pub trait ClientTransport {
    /// Establish the link to the server end.
    fn init(&mut self) -> Result<()>;

    /// Send one request packet to the server.
    fn send(&mut self, packet: &[u8]) -> Result<()>;

    /// Receive one response packet into `buf`, returning its wire length.
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Release transport resources. Idempotent.
    fn cleanup(&mut self) -> Result<()>;
}

/// The server end of a packet transport.
///
/// Same non-blocking contract as [`ClientTransport`]. The server replies
/// to whichever client it most recently received from: `recv` records the
/// requester and `send` addresses it. One exchange at a time.
pub trait ServerTransport {
    /// Stand up the server end and start accepting packets.
    fn init(&mut self) -> Result<()>;

    /// Send one response packet to the most recent requester.
    fn send(&mut self, packet: &[u8]) -> Result<()>;

    /// Receive one request packet into `buf`, returning its wire length.
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Release transport resources. Idempotent.
    fn cleanup(&mut self) -> Result<()>;
}
