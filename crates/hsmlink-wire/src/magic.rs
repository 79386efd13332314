//! Magic values and byte-order translation.
//!
//! Every packet opens with a 16-bit magic whose high byte is an endianness
//! marker and whose low byte is the protocol version (BCD). Because the
//! sender writes the magic in its own native order, a receiver on a
//! same-order machine reads [`MAGIC_NATIVE`] while a receiver on an
//! opposite-order machine reads [`MAGIC_SWAPPED`]. That single comparison
//! replaces any out-of-band endianness negotiation.

/// Protocol version carried in the low byte of the magic (BCD-coded).
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Endianness marker carried in the high byte of the magic.
pub const ENDIAN_MARK: u8 = 0xA5;

/// The magic as composed on the sending machine, whatever its byte order.
pub const MAGIC_NATIVE: u16 = ((ENDIAN_MARK as u16) << 8) | (PROTOCOL_VERSION as u16);

/// What [`MAGIC_NATIVE`] looks like after crossing to an opposite-order machine.
pub const MAGIC_SWAPPED: u16 = MAGIC_NATIVE.swap_bytes();

/// Mask selecting the endianness marker within a magic value.
pub const ENDIAN_MASK: u16 = 0xFF00;

/// Mask selecting the protocol version within a magic value.
pub const VERSION_MASK: u16 = 0x00FF;

/// Whether a received magic indicates the peer shares our byte order.
///
/// Only the endianness marker participates: any magic whose high byte is
/// not [`ENDIAN_MARK`] is treated as sent from an opposite-order machine.
/// No magic value is ever rejected.
#[inline]
pub const fn same_byte_order(magic: u16) -> bool {
    (magic & ENDIAN_MASK) == (MAGIC_NATIVE & ENDIAN_MASK)
}

/// Translate an 8-bit field under `magic`. Always the identity.
#[inline]
pub const fn translate_u8(_magic: u16, value: u8) -> u8 {
    value
}

/// Translate a 16-bit field under `magic`: identity when the peer shares
/// our byte order, full byte reversal otherwise.
#[inline]
pub const fn translate_u16(magic: u16, value: u16) -> u16 {
    if same_byte_order(magic) {
        value
    } else {
        value.swap_bytes()
    }
}

/// Translate a 32-bit field under `magic`.
#[inline]
pub const fn translate_u32(magic: u16, value: u32) -> u32 {
    if same_byte_order(magic) {
        value
    } else {
        value.swap_bytes()
    }
}

/// Translate a 64-bit field under `magic`.
#[inline]
pub const fn translate_u64(magic: u16, value: u64) -> u64 {
    if same_byte_order(magic) {
        value
    } else {
        value.swap_bytes()
    }
}
