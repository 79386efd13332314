/// Lifecycle of a session endpoint.
///
/// Sessions are created idle, armed by `init`, and retired by `cleanup`.
/// Between those, `Ready` and `Pending` track whether an exchange is in
/// flight. The states gate only initialization: starting a new exchange
/// from `Pending` is legal and abandons the outstanding one, since each
/// endpoint owns a single packet buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created but not yet initialized; no I/O has happened.
    Uninitialized,
    /// Initialized with no exchange in flight.
    Ready,
    /// A request is outstanding (client) or being served (server).
    Pending,
    /// Cleaned up; retired until a fresh `init`.
    Cleaned,
}

impl SessionState {
    /// Whether operations other than `init` are permitted.
    pub fn is_initialized(self) -> bool {
        matches!(self, SessionState::Ready | SessionState::Pending)
    }
}
