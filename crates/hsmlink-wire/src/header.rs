use crate::magic;

/// Packet header: magic (2) + kind (2) + seq (2) + aux (2) = 8 bytes.
pub const HEADER_LEN: usize = 8;

/// The fixed header at the front of every packet.
///
/// Wire format:
/// ```text
/// ┌──────────┬──────────┬──────────┬──────────┬─────────────────┐
/// │ Magic    │ Kind     │ Seq      │ Aux      │ Payload         │
/// │ (2B)     │ (2B)     │ (2B)     │ (2B)     │ (0..=1280 B)    │
/// └──────────┴──────────┴──────────┴──────────┴─────────────────┘
/// ```
///
/// All four fields travel in the *sender's* native byte order; there is no
/// canonical wire order. The receiver reads the magic as-is and runs the
/// remaining fields through [`magic::translate_u16`] keyed on it. Encoding
/// and decoding therefore never reorder bytes themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Endianness marker + protocol version, stamped verbatim by the sender.
    pub magic: u16,
    /// Request/response kind, as placed on the wire by the sender.
    pub kind: u16,
    /// Correlation sequence number, as placed on the wire by the sender.
    pub seq: u16,
    /// Auxiliary field: client id on requests, status on responses.
    pub aux: u16,
}

impl Header {
    /// Create a new header.
    pub fn new(magic: u16, kind: u16, seq: u16, aux: u16) -> Self {
        Self {
            magic,
            kind,
            seq,
            aux,
        }
    }

    /// Encode the header to its 8-byte wire form (native byte order).
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        self.encode_into(&mut buf);
        buf
    }

    /// Encode the header into the front of an existing buffer.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if `buf` is shorter than [`HEADER_LEN`].
    pub fn encode_into(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= HEADER_LEN);
        buf[0..2].copy_from_slice(&self.magic.to_ne_bytes());
        buf[2..4].copy_from_slice(&self.kind.to_ne_bytes());
        buf[4..6].copy_from_slice(&self.seq.to_ne_bytes());
        buf[6..8].copy_from_slice(&self.aux.to_ne_bytes());
    }

    /// Decode a header from the front of a received packet.
    ///
    /// Returns `None` if the buffer is shorter than [`HEADER_LEN`]. The
    /// fields come back exactly as the sender laid them down; callers that
    /// need the peer's values translate them through the magic.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_LEN {
            return None;
        }
        Some(Self {
            magic: u16::from_ne_bytes([buf[0], buf[1]]),
            kind: u16::from_ne_bytes([buf[2], buf[3]]),
            seq: u16::from_ne_bytes([buf[4], buf[5]]),
            aux: u16::from_ne_bytes([buf[6], buf[7]]),
        })
    }

    /// Whether the sender of this header shares our byte order.
    #[inline]
    pub fn same_byte_order(&self) -> bool {
        magic::same_byte_order(self.magic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::magic::MAGIC_NATIVE;

    #[test]
    fn test_header_encode_decode_roundtrip() {
        let original = Header::new(MAGIC_NATIVE, 0x0102, 0x0304, 0x0506);
        let encoded = original.encode();
        let decoded = Header::decode(&encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_header_field_offsets_native_order() {
        let header = Header::new(0xA501, 0x0102, 0x0304, 0x0506);
        let bytes = header.encode();

        assert_eq!(bytes[0..2], 0xA501u16.to_ne_bytes());
        assert_eq!(bytes[2..4], 0x0102u16.to_ne_bytes());
        assert_eq!(bytes[4..6], 0x0304u16.to_ne_bytes());
        assert_eq!(bytes[6..8], 0x0506u16.to_ne_bytes());
    }

    #[cfg(target_endian = "little")]
    #[test]
    fn test_header_byte_layout_little_endian() {
        let header = Header::new(0xA501, 0x0102, 0x0304, 0x0506);
        let bytes = header.encode();
        assert_eq!(bytes, [0x01, 0xA5, 0x02, 0x01, 0x04, 0x03, 0x06, 0x05]);
    }

    #[test]
    fn test_header_len_is_exactly_8() {
        assert_eq!(HEADER_LEN, 8);
        let header = Header::new(MAGIC_NATIVE, 1, 1, 0);
        assert_eq!(header.encode().len(), 8);
    }

    #[test]
    fn test_decode_too_short_buffer() {
        assert!(Header::decode(&[]).is_none());
        assert!(Header::decode(&[0u8; 7]).is_none());
        assert!(Header::decode(&[0u8; 8]).is_some());
    }

    #[test]
    fn test_encode_into_leaves_tail_untouched() {
        let header = Header::new(MAGIC_NATIVE, 2, 3, 4);
        let mut buf = [0xEEu8; 16];
        header.encode_into(&mut buf);

        let decoded = Header::decode(&buf).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(buf[8..], [0xEE; 8]);
    }

    #[test]
    fn test_decode_never_reorders_bytes() {
        // A peer of the opposite byte order stamped these fields; decoding
        // must surface them raw, swapped from our point of view.
        fn reversed(value: u16) -> [u8; 2] {
            let native = value.to_ne_bytes();
            [native[1], native[0]]
        }

        let mut wire = [0u8; HEADER_LEN];
        wire[0..2].copy_from_slice(&reversed(0xA501));
        wire[2..4].copy_from_slice(&reversed(0x0102));
        wire[4..6].copy_from_slice(&reversed(0x0304));
        wire[6..8].copy_from_slice(&reversed(0x0506));

        let decoded = Header::decode(&wire).unwrap();
        assert_eq!(decoded.magic, 0xA501u16.swap_bytes());
        assert_eq!(decoded.kind, 0x0102u16.swap_bytes());
        assert_eq!(decoded.seq, 0x0304u16.swap_bytes());
        assert_eq!(decoded.aux, 0x0506u16.swap_bytes());
        assert!(!decoded.same_byte_order());
    }
}
