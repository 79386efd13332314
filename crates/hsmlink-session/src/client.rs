use tracing::debug;

use hsmlink_transport::{ClientTransport, TransportError};
use hsmlink_wire::{translate_u16, Header, PacketBuf, MAX_PAYLOAD};

use crate::error::{Result, SessionError};
use crate::state::SessionState;

/// Configuration for a client session.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Identifier stamped into the aux field of every request, letting a
    /// server distinguish callers sharing one transport endpoint.
    pub client_id: u16,
}

/// A response received from the server.
///
/// `kind`, `seq` and `status` are translated to this machine's byte
/// order; `magic` is kept exactly as the server stamped it. The payload
/// has already been copied into the caller's buffer, `len` says how much.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    pub magic: u16,
    pub kind: u16,
    pub seq: u16,
    pub status: u16,
    pub len: usize,
}

/// Client end of a request/response session.
///
/// Owns the sequence counter and a single reusable packet buffer, so at
/// most one exchange is in flight at a time. Operations never block:
/// `Ok(None)` from [`send_request`](Self::send_request) or
/// [`recv_response`](Self::recv_response) means "no progress yet, poll
/// again". Sequence correlation is left to the caller; a response carries
/// whatever sequence the server echoed.
pub struct ClientSession<T> {
    transport: T,
    config: ClientConfig,
    state: SessionState,
    seq: u16,
    server_id: u16,
    packet: PacketBuf,
}

impl<T: ClientTransport> ClientSession<T> {
    /// Create a session over `transport`. No I/O happens until
    /// [`init`](Self::init).
    pub fn new(transport: T, config: ClientConfig) -> Self {
        Self {
            transport,
            config,
            state: SessionState::Uninitialized,
            seq: 0,
            server_id: 0,
            packet: PacketBuf::new(),
        }
    }

    /// Establish the transport link and reset the session counters.
    ///
    /// On failure the session stays uninitialized and may be retried.
    pub fn init(&mut self) -> Result<()> {
        self.transport.init().map_err(SessionError::Init)?;
        self.seq = 0;
        self.server_id = 0;
        self.packet.clear();
        self.state = SessionState::Ready;
        debug!(client_id = self.config.client_id, "client session initialized");
        Ok(())
    }

    /// Send one request of `kind` carrying `data`.
    ///
    /// Returns the sequence number assigned to the request, or `Ok(None)`
    /// if the transport cannot accept a packet right now. The counter is
    /// pre-incremented and never rolled back: a retry after `Ok(None)` or
    /// a transport error goes out under a fresh sequence. Payloads over
    /// [`MAX_PAYLOAD`] are rejected before the counter moves.
    ///
    /// `magic` is stamped verbatim; `kind`, the sequence and the client id
    /// are written through [`translate_u16`] keyed on it. Callers pass
    /// [`MAGIC_NATIVE`](hsmlink_wire::MAGIC_NATIVE) unless they are
    /// forwarding a foreign-order exchange.
    ///
    /// Sending while a response is still outstanding is allowed and
    /// abandons that exchange.
    pub fn send_request(&mut self, magic: u16, kind: u16, data: &[u8]) -> Result<Option<u16>> {
        if !self.state.is_initialized() {
            return Err(SessionError::NotInitialized);
        }
        if data.len() > MAX_PAYLOAD {
            return Err(SessionError::PayloadTooLarge {
                size: data.len(),
                max: MAX_PAYLOAD,
            });
        }
        if self.state == SessionState::Pending {
            debug!(seq = self.seq, "abandoning outstanding request");
        }

        let seq = self.seq.wrapping_add(1);
        self.seq = seq;

        let header = Header::new(
            magic,
            translate_u16(magic, kind),
            translate_u16(magic, seq),
            translate_u16(magic, self.config.client_id),
        );
        self.packet.load(header, data)?;

        match self.transport.send(self.packet.as_slice()) {
            Ok(()) => {
                self.state = SessionState::Pending;
                debug!(seq, kind, len = data.len(), "request sent");
                Ok(Some(seq))
            }
            Err(TransportError::WouldBlock) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Poll for the response to the outstanding request.
    ///
    /// Returns `Ok(None)` while no packet has arrived. On delivery the
    /// payload is copied into `buf` and the translated header fields come
    /// back in a [`Response`]. A packet too short to carry a header
    /// surfaces as [`SessionError::Malformed`]; a payload larger than
    /// `buf` as [`SessionError::BufferTooSmall`]. Either way the packet
    /// has been consumed, so callers should offer [`MAX_PAYLOAD`] bytes.
    pub fn recv_response(&mut self, buf: &mut [u8]) -> Result<Option<Response>> {
        if !self.state.is_initialized() {
            return Err(SessionError::NotInitialized);
        }

        let n = match self.transport.recv(self.packet.as_mut_slice()) {
            Ok(n) => n,
            Err(TransportError::WouldBlock) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        self.packet.set_len(n);

        let header = self
            .packet
            .header()
            .ok_or(SessionError::Malformed { len: n })?;
        let payload = self.packet.payload();
        if payload.len() > buf.len() {
            return Err(SessionError::BufferTooSmall {
                need: payload.len(),
                capacity: buf.len(),
            });
        }
        buf[..payload.len()].copy_from_slice(payload);

        let magic = header.magic;
        let response = Response {
            magic,
            kind: translate_u16(magic, header.kind),
            seq: translate_u16(magic, header.seq),
            status: translate_u16(magic, header.aux),
            len: payload.len(),
        };
        self.state = SessionState::Ready;
        debug!(
            seq = response.seq,
            kind = response.kind,
            status = response.status,
            len = response.len,
            "response received"
        );
        Ok(Some(response))
    }

    /// Release the transport. Idempotent: only the first call reaches the
    /// transport; afterwards the session is retired until a fresh `init`.
    pub fn cleanup(&mut self) -> Result<()> {
        if !self.state.is_initialized() {
            return Ok(());
        }
        self.transport.cleanup()?;
        self.state = SessionState::Cleaned;
        debug!("client session cleaned up");
        Ok(())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The identifier stamped into requests.
    pub fn client_id(&self) -> u16 {
        self.config.client_id
    }

    /// The most recently issued sequence number.
    pub fn last_seq(&self) -> u16 {
        self.seq
    }

    /// Server identifier learned out of band. Not interpreted here.
    pub fn server_id(&self) -> u16 {
        self.server_id
    }

    /// Record the server identifier for this link.
    pub fn set_server_id(&mut self, id: u16) {
        self.server_id = id;
    }

    /// Borrow the underlying transport.
    pub fn get_ref(&self) -> &T {
        &self.transport
    }

    /// Mutably borrow the underlying transport.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consume the session and return the transport.
    pub fn into_inner(self) -> T {
        self.transport
    }
}

impl<T> std::fmt::Debug for ClientSession<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("state", &self.state)
            .field("client_id", &self.config.client_id)
            .field("seq", &self.seq)
            .finish()
    }
}
