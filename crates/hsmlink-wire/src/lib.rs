//! Wire format for the hsmlink packet layer.
//!
//! Every message is a single packet of at most [`MTU`] bytes:
//! - An 8-byte header: magic, kind, sequence, auxiliary — four `u16`s in
//!   the sender's native byte order
//! - Up to [`MAX_PAYLOAD`] bytes of opaque payload
//!
//! There is no length field on the wire; the transport reports how many
//! bytes arrived. Endianness is negotiated per packet through the magic:
//! the receiver compares the magic's high byte against [`ENDIAN_MARK`] and
//! byte-reverses the remaining fields when the peer's order differs. The
//! payload is never touched.

pub mod error;
pub mod header;
pub mod magic;
pub mod packet;

pub use error::{Result, WireError};
pub use header::{Header, HEADER_LEN};
pub use magic::{
    same_byte_order, translate_u16, translate_u32, translate_u64, translate_u8, ENDIAN_MARK,
    ENDIAN_MASK, MAGIC_NATIVE, MAGIC_SWAPPED, PROTOCOL_VERSION, VERSION_MASK,
};
pub use packet::{PacketBuf, MAX_PAYLOAD, MTU};
