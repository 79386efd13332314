use tracing::debug;

use hsmlink_transport::{ServerTransport, TransportError};
use hsmlink_wire::{translate_u16, Header, PacketBuf, MAX_PAYLOAD};

use crate::error::{Result, SessionError};
use crate::state::SessionState;

/// A request received from a client.
///
/// `kind`, `seq` and `client_id` are translated to this machine's byte
/// order; `magic` is kept exactly as the client stamped it, and is what a
/// response conventionally passes back so the reply lands in the client's
/// byte order. The payload has already been copied into the caller's
/// buffer, `len` says how much.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    pub magic: u16,
    pub kind: u16,
    pub seq: u16,
    pub client_id: u16,
    pub len: usize,
}

/// Configuration for a server session.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// Identifier of this server, carried for higher-layer discovery.
    /// Never interpreted here.
    pub server_id: u16,
}

#[derive(Debug, Clone, Copy)]
struct ServedRequest {
    seq: u16,
    client_id: u16,
}

/// Server end of a request/response session.
///
/// Serves one exchange at a time: [`recv_request`](Self::recv_request)
/// caches the request's sequence so that
/// [`send_response`](Self::send_response) can echo it by default, which is
/// what correlates a response to its request on the client side. All
/// operations poll; `Ok(None)` means "no progress yet, call again".
pub struct ServerSession<T> {
    transport: T,
    config: ServerConfig,
    state: SessionState,
    packet: PacketBuf,
    served: Option<ServedRequest>,
}

impl<T: ServerTransport> ServerSession<T> {
    /// Create a session over `transport`. No I/O happens until
    /// [`init`](Self::init).
    pub fn new(transport: T, config: ServerConfig) -> Self {
        Self {
            transport,
            config,
            state: SessionState::Uninitialized,
            packet: PacketBuf::new(),
            served: None,
        }
    }

    /// Stand up the transport and start accepting requests.
    ///
    /// On failure the session stays uninitialized and may be retried.
    pub fn init(&mut self) -> Result<()> {
        self.transport.init().map_err(SessionError::Init)?;
        self.served = None;
        self.packet.clear();
        self.state = SessionState::Ready;
        debug!(server_id = self.config.server_id, "server session initialized");
        Ok(())
    }

    /// Poll for the next request.
    ///
    /// Returns `Ok(None)` while no packet has arrived. On delivery the
    /// payload is copied into `buf`, the translated header fields come
    /// back in a [`Request`], and its sequence is cached as the default
    /// for the next response. Receiving while a request is still being
    /// served is allowed and abandons it. Short packets surface as
    /// [`SessionError::Malformed`], payloads larger than `buf` as
    /// [`SessionError::BufferTooSmall`]; either way the packet has been
    /// consumed, so callers should offer [`MAX_PAYLOAD`] bytes.
    pub fn recv_request(&mut self, buf: &mut [u8]) -> Result<Option<Request>> {
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
        let request = Request {
            magic,
            kind: translate_u16(magic, header.kind),
            seq: translate_u16(magic, header.seq),
            client_id: translate_u16(magic, header.aux),
            len: payload.len(),
        };
        self.served = Some(ServedRequest {
            seq: request.seq,
            client_id: request.client_id,
        });
        self.state = SessionState::Pending;
        debug!(
            seq = request.seq,
            kind = request.kind,
            client_id = request.client_id,
            len = request.len,
            "request received"
        );
        Ok(Some(request))
    }

    /// Send one response of `kind` with `status` carrying `data`.
    ///
    /// `seq` of `None` echoes the sequence of the request being served,
    /// the normal case; an explicit sequence is reserved for unsolicited
    /// notifications such as keep-alive or close. Returns `Ok(None)` if
    /// the transport cannot accept a packet right now; retrying resends
    /// under the same sequence.
    ///
    /// `magic` is stamped verbatim and conventionally is the requester's
    /// magic, so the outgoing `kind`, sequence and `status` are written in
    /// the requester's byte order via [`translate_u16`]. Answering the
    /// served request (by default or by its explicit sequence) concludes
    /// the exchange; a notification leaves it outstanding.
    pub fn send_response(
        &mut self,
        magic: u16,
        kind: u16,
        seq: Option<u16>,
        status: u16,
        data: &[u8],
    ) -> Result<Option<()>> {
        if !self.state.is_initialized() {
            return Err(SessionError::NotInitialized);
        }
        if data.len() > MAX_PAYLOAD {
            return Err(SessionError::PayloadTooLarge {
                size: data.len(),
                max: MAX_PAYLOAD,
            });
        }
        let seq = match seq {
            Some(explicit) => explicit,
            None => self.served.ok_or(SessionError::NoPendingRequest)?.seq,
        };

        let header = Header::new(
            magic,
            translate_u16(magic, kind),
            translate_u16(magic, seq),
            translate_u16(magic, status),
        );
        self.packet.load(header, data)?;

        match self.transport.send(self.packet.as_slice()) {
            Ok(()) => {
                if self.served.map(|r| r.seq) == Some(seq) {
                    self.served = None;
                    self.state = SessionState::Ready;
                }
                debug!(seq, kind, status, len = data.len(), "response sent");
                Ok(Some(()))
            }
            Err(TransportError::WouldBlock) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Release the transport. Idempotent: only the first call reaches the
    /// transport; afterwards the session is retired until a fresh `init`.
    pub fn cleanup(&mut self) -> Result<()> {
        if !self.state.is_initialized() {
            return Ok(());
        }
        self.transport.cleanup()?;
        self.state = SessionState::Cleaned;
        debug!("server session cleaned up");
        Ok(())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The identifier configured for this server.
    pub fn server_id(&self) -> u16 {
        self.config.server_id
    }

    /// Sequence of the request currently being served, if any.
    pub fn served_seq(&self) -> Option<u16> {
        self.served.map(|r| r.seq)
    }

    /// Client id of the request currently being served, if any.
    pub fn served_client_id(&self) -> Option<u16> {
        self.served.map(|r| r.client_id)
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

impl<T> std::fmt::Debug for ServerSession<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerSession")
            .field("state", &self.state)
            .field("server_id", &self.config.server_id)
            .field("served", &self.served)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use hsmlink_wire::{HEADER_LEN, MAGIC_NATIVE};

    use super::*;

    #[derive(Debug, Default)]
    struct StubTransport {
        inits: usize,
        cleanups: usize,
        fail_init: bool,
        would_block_sends: usize,
        sent: Vec<Vec<u8>>,
        inbox: VecDeque<Vec<u8>>,
    }

    impl ServerTransport for StubTransport {
        fn init(&mut self) -> hsmlink_transport::Result<()> {
            self.inits += 1;
            if self.fail_init {
                return Err(TransportError::NotConnected);
            }
            Ok(())
        }

        fn send(&mut self, packet: &[u8]) -> hsmlink_transport::Result<()> {
            if self.would_block_sends > 0 {
                self.would_block_sends -= 1;
                return Err(TransportError::WouldBlock);
            }
            self.sent.push(packet.to_vec());
            Ok(())
        }

        fn recv(&mut self, buf: &mut [u8]) -> hsmlink_transport::Result<usize> {
            match self.inbox.pop_front() {
                Some(packet) => {
                    let n = packet.len().min(buf.len());
                    buf[..n].copy_from_slice(&packet[..n]);
                    Ok(n)
                }
                None => Err(TransportError::WouldBlock),
            }
        }

        fn cleanup(&mut self) -> hsmlink_transport::Result<()> {
            self.cleanups += 1;
            Ok(())
        }
    }

    fn ready_session() -> ServerSession<StubTransport> {
        let mut session = ServerSession::new(StubTransport::default(), ServerConfig::default());
        session.init().unwrap();
        session
    }

    fn wire_request(magic: u16, kind: u16, seq: u16, client_id: u16, payload: &[u8]) -> Vec<u8> {
        let mut packet = Header::new(magic, kind, seq, client_id).encode().to_vec();
        packet.extend_from_slice(payload);
        packet
    }

    #[test]
    fn recv_request_translates_and_caches() {
        let mut session = ready_session();
        session
            .get_mut()
            .inbox
            .push_back(wire_request(MAGIC_NATIVE, 2, 5, 7, b"body"));

        let mut buf = [0u8; MAX_PAYLOAD];
        let request = session.recv_request(&mut buf).unwrap().unwrap();
        assert_eq!(request.magic, MAGIC_NATIVE);
        assert_eq!(request.kind, 2);
        assert_eq!(request.seq, 5);
        assert_eq!(request.client_id, 7);
        assert_eq!(&buf[..request.len], b"body");

        assert_eq!(session.served_seq(), Some(5));
        assert_eq!(session.served_client_id(), Some(7));
        assert_eq!(session.state(), SessionState::Pending);
    }

    #[test]
    fn recv_request_none_when_nothing_arrived() {
        let mut session = ready_session();
        let mut buf = [0u8; MAX_PAYLOAD];
        assert!(session.recv_request(&mut buf).unwrap().is_none());
    }

    #[test]
    fn recv_request_foreign_order_caches_host_values() {
        let mut session = ready_session();
        let foreign = MAGIC_NATIVE.swap_bytes();
        session.get_mut().inbox.push_back(wire_request(
            foreign,
            0x0102u16.swap_bytes(),
            0x0005u16.swap_bytes(),
            0x0007u16.swap_bytes(),
            b"",
        ));

        let mut buf = [0u8; MAX_PAYLOAD];
        let request = session.recv_request(&mut buf).unwrap().unwrap();
        assert_eq!(request.magic, foreign);
        assert_eq!(request.kind, 0x0102);
        assert_eq!(request.seq, 0x0005);
        assert_eq!(request.client_id, 0x0007);
        assert_eq!(session.served_seq(), Some(0x0005));
    }

    #[test]
    fn send_response_echoes_served_seq_by_default() {
        let mut session = ready_session();
        session
            .get_mut()
            .inbox
            .push_back(wire_request(MAGIC_NATIVE, 2, 5, 7, b""));
        let mut buf = [0u8; MAX_PAYLOAD];
        let request = session.recv_request(&mut buf).unwrap().unwrap();

        session
            .send_response(request.magic, request.kind, None, 0, b"done")
            .unwrap()
            .unwrap();

        let packet = &session.get_ref().sent[0];
        let header = Header::decode(packet).unwrap();
        assert_eq!(header.magic, MAGIC_NATIVE);
        assert_eq!(header.kind, 2);
        assert_eq!(header.seq, 5);
        assert_eq!(header.aux, 0);
        assert_eq!(&packet[HEADER_LEN..], b"done");

        // The exchange is concluded.
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.served_seq(), None);
    }

    #[test]
    fn send_response_to_foreign_requester_swaps_outgoing_fields() {
        let mut session = ready_session();
        let foreign = MAGIC_NATIVE.swap_bytes();
        session.get_mut().inbox.push_back(wire_request(
            foreign,
            0x0002u16.swap_bytes(),
            0x0005u16.swap_bytes(),
            0x0007u16.swap_bytes(),
            b"",
        ));
        let mut buf = [0u8; MAX_PAYLOAD];
        let request = session.recv_request(&mut buf).unwrap().unwrap();

        session
            .send_response(request.magic, request.kind, None, 0x0001, b"")
            .unwrap()
            .unwrap();

        // Stamped raw magic, everything else in the requester's order.
        let header = Header::decode(&session.get_ref().sent[0]).unwrap();
        assert_eq!(header.magic, foreign);
        assert_eq!(header.kind, 0x0002u16.swap_bytes());
        assert_eq!(header.seq, 0x0005u16.swap_bytes());
        assert_eq!(header.aux, 0x0001u16.swap_bytes());
    }

    #[test]
    fn send_response_explicit_seq_is_a_notification() {
        let mut session = ready_session();
        session
            .get_mut()
            .inbox
            .push_back(wire_request(MAGIC_NATIVE, 2, 5, 7, b""));
        let mut buf = [0u8; MAX_PAYLOAD];
        session.recv_request(&mut buf).unwrap().unwrap();

        // A keep-alive under an unrelated sequence leaves the served
        // request outstanding.
        session
            .send_response(MAGIC_NATIVE, 0xFF00, Some(99), 0, b"")
            .unwrap()
            .unwrap();
        assert_eq!(session.served_seq(), Some(5));
        assert_eq!(session.state(), SessionState::Pending);

        // Answering the served request by its explicit sequence concludes
        // the exchange just like the default echo.
        session
            .send_response(MAGIC_NATIVE, 2, Some(5), 0, b"")
            .unwrap()
            .unwrap();
        assert_eq!(session.served_seq(), None);
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn send_response_without_request_errs() {
        let mut session = ready_session();
        let err = session
            .send_response(MAGIC_NATIVE, 1, None, 0, b"")
            .unwrap_err();
        assert!(matches!(err, SessionError::NoPendingRequest));
    }

    #[test]
    fn send_response_would_block_keeps_served_request() {
        let mut session = ready_session();
        session
            .get_mut()
            .inbox
            .push_back(wire_request(MAGIC_NATIVE, 2, 5, 7, b""));
        let mut buf = [0u8; MAX_PAYLOAD];
        session.recv_request(&mut buf).unwrap().unwrap();

        session.get_mut().would_block_sends = 1;
        assert!(session
            .send_response(MAGIC_NATIVE, 2, None, 0, b"x")
            .unwrap()
            .is_none());
        // The retry still knows which sequence to echo.
        assert_eq!(session.served_seq(), Some(5));
        session
            .send_response(MAGIC_NATIVE, 2, None, 0, b"x")
            .unwrap()
            .unwrap();
        let header = Header::decode(&session.get_ref().sent[0]).unwrap();
        assert_eq!(header.seq, 5);
    }

    #[test]
    fn recv_request_while_serving_abandons_previous() {
        let mut session = ready_session();
        session
            .get_mut()
            .inbox
            .push_back(wire_request(MAGIC_NATIVE, 1, 1, 7, b""));
        session
            .get_mut()
            .inbox
            .push_back(wire_request(MAGIC_NATIVE, 1, 2, 7, b""));

        let mut buf = [0u8; MAX_PAYLOAD];
        session.recv_request(&mut buf).unwrap().unwrap();
        session.recv_request(&mut buf).unwrap().unwrap();
        assert_eq!(session.served_seq(), Some(2));
    }

    #[test]
    fn oversize_response_payload_rejected() {
        let mut session = ready_session();
        session
            .get_mut()
            .inbox
            .push_back(wire_request(MAGIC_NATIVE, 1, 1, 7, b""));
        let mut buf = [0u8; MAX_PAYLOAD];
        session.recv_request(&mut buf).unwrap().unwrap();

        let oversize = vec![0u8; MAX_PAYLOAD + 1];
        let err = session
            .send_response(MAGIC_NATIVE, 1, None, 0, &oversize)
            .unwrap_err();
        assert!(matches!(err, SessionError::PayloadTooLarge { .. }));
        // The served request is still answerable.
        assert_eq!(session.served_seq(), Some(1));
    }

    #[test]
    fn recv_request_short_packet_is_malformed() {
        let mut session = ready_session();
        session.get_mut().inbox.push_back(vec![0u8; 7]);

        let mut buf = [0u8; MAX_PAYLOAD];
        let err = session.recv_request(&mut buf).unwrap_err();
        assert!(matches!(err, SessionError::Malformed { len: 7 }));
    }

    #[test]
    fn recv_request_buffer_too_small_consumes_packet() {
        let mut session = ready_session();
        session
            .get_mut()
            .inbox
            .push_back(wire_request(MAGIC_NATIVE, 1, 1, 7, b"0123456789"));

        let mut small = [0u8; 4];
        let err = session.recv_request(&mut small).unwrap_err();
        assert!(matches!(
            err,
            SessionError::BufferTooSmall {
                need: 10,
                capacity: 4
            }
        ));
        let mut buf = [0u8; MAX_PAYLOAD];
        assert!(session.recv_request(&mut buf).unwrap().is_none());
    }

    #[test]
    fn configured_server_id_is_exposed() {
        let session =
            ServerSession::new(StubTransport::default(), ServerConfig { server_id: 9 });
        assert_eq!(session.server_id(), 9);
    }

    #[test]
    fn ops_require_init() {
        let mut session = ServerSession::new(StubTransport::default(), ServerConfig::default());
        let mut buf = [0u8; MAX_PAYLOAD];
        assert!(matches!(
            session.recv_request(&mut buf),
            Err(SessionError::NotInitialized)
        ));
        assert!(matches!(
            session.send_response(MAGIC_NATIVE, 1, Some(1), 0, b""),
            Err(SessionError::NotInitialized)
        ));
    }

    #[test]
    fn init_failure_leaves_session_uninitialized() {
        let mut session = ServerSession::new(
            StubTransport {
                fail_init: true,
                ..StubTransport::default()
            },
            ServerConfig::default(),
        );
        assert!(matches!(session.init(), Err(SessionError::Init(_))));
        assert_eq!(session.state(), SessionState::Uninitialized);
    }

    #[test]
    fn cleanup_reaches_transport_exactly_once() {
        let mut session = ready_session();
        session.cleanup().unwrap();
        session.cleanup().unwrap();
        assert_eq!(session.get_ref().cleanups, 1);
        assert_eq!(session.state(), SessionState::Cleaned);
    }
}
