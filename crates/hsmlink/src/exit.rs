use std::fmt;
use std::io;

use hsmlink_session::SessionError;
use hsmlink_transport::TransportError;

// Exit code constants aligned with rsfulmen/DDR-0002 semantics.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const HEALTH_CHECK_FAILED: i32 = 30;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::Init(err) | SessionError::Transport(err) => transport_error(context, err),
        SessionError::PayloadTooLarge { .. }
        | SessionError::BufferTooSmall { .. }
        | SessionError::Malformed { .. } => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_denied_maps_to_50() {
        let err = io_error(
            "bind failed",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.code, PERMISSION_DENIED);
    }

    #[test]
    fn oversize_maps_to_transport_code() {
        let err = transport_error(
            "send failed",
            TransportError::Oversize {
                len: 2000,
                mtu: 1288,
            },
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
    }

    #[test]
    fn malformed_packet_maps_to_data_invalid() {
        let err = session_error("receive failed", SessionError::Malformed { len: 3 });
        assert_eq!(err.code, DATA_INVALID);
        assert!(err.message.starts_with("receive failed: "));
    }

    #[test]
    fn nested_connect_error_uses_io_mapping() {
        let err = session_error(
            "connect failed",
            SessionError::Init(TransportError::Connect {
                path: "/tmp/x.sock".into(),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
            }),
        );
        assert_eq!(err.code, FAILURE);
    }
}
