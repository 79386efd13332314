/// Errors that can occur while assembling packets.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The payload exceeds the fixed per-packet data capacity.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, WireError>;
