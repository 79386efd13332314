use crate::error::{Result, WireError};
use crate::header::{Header, HEADER_LEN};

/// Fixed per-packet data capacity in bytes.
pub const MAX_PAYLOAD: usize = 1280;

/// Maximum transmission unit: header plus data capacity.
pub const MTU: usize = HEADER_LEN + MAX_PAYLOAD;

/// A reusable MTU-sized packet buffer.
///
/// Each session endpoint owns exactly one of these and reuses it for every
/// send and receive, so at most one exchange can be in flight per session.
/// Wire length is tracked separately: the protocol has no on-wire length
/// field, the transport reports how many bytes actually arrived.
#[derive(Debug, Clone)]
pub struct PacketBuf {
    buf: [u8; MTU],
    len: usize,
}

impl PacketBuf {
    /// Create an empty packet buffer.
    pub const fn new() -> Self {
        Self {
            buf: [0u8; MTU],
            len: 0,
        }
    }

    /// Assemble an outgoing packet: header at the front, payload behind it.
    ///
    /// Fails with [`WireError::PayloadTooLarge`] before touching the buffer
    /// if the payload exceeds [`MAX_PAYLOAD`].
    pub fn load(&mut self, header: Header, payload: &[u8]) -> Result<()> {
        if payload.len() > MAX_PAYLOAD {
            return Err(WireError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD,
            });
        }
        header.encode_into(&mut self.buf);
        self.buf[HEADER_LEN..HEADER_LEN + payload.len()].copy_from_slice(payload);
        self.len = HEADER_LEN + payload.len();
        Ok(())
    }

    /// The assembled or received packet bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// The full MTU-sized buffer, for a transport to receive into.
    ///
    /// Follow up with [`set_len`](Self::set_len) once the transport reports
    /// how many bytes landed.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// Record the wire length of a packet received into
    /// [`as_mut_slice`](Self::as_mut_slice).
    pub fn set_len(&mut self, len: usize) {
        debug_assert!(len <= MTU);
        self.len = len.min(MTU);
    }

    /// Decode the header at the front, if enough bytes are present.
    pub fn header(&self) -> Option<Header> {
        Header::decode(self.as_slice())
    }

    /// The payload bytes behind the header. Empty if the packet is shorter
    /// than a header.
    pub fn payload(&self) -> &[u8] {
        if self.len < HEADER_LEN {
            return &[];
        }
        &self.buf[HEADER_LEN..self.len]
    }

    /// Number of valid bytes in the buffer.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds no packet.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Discard the current packet.
    pub fn clear(&mut self) {
        self.len = 0;
    }
}

impl Default for PacketBuf {
    fn default() -> Self {
        Self::new()
    }
}
