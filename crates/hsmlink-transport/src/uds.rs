use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use tracing::{debug, info};

use hsmlink_wire::MTU;

use crate::error::{Result, TransportError};
use crate::traits::{ClientTransport, ServerTransport};

/// Default permission mode for created socket paths.
pub const DEFAULT_SOCKET_MODE: u32 = 0o600;

/// Maximum socket path length.
/// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
#[cfg(target_os = "linux")]
const MAX_PATH_LEN: usize = 108;
#[cfg(not(target_os = "linux"))]
const MAX_PATH_LEN: usize = 104;

fn validate_path_len(path: &Path) -> Result<()> {
    let len = path.as_os_str().len();
    if len >= MAX_PATH_LEN {
        return Err(TransportError::PathTooLong {
            path: path.to_path_buf(),
            len,
            max: MAX_PATH_LEN,
        });
    }
    Ok(())
}

fn bind_error(path: &Path, source: std::io::Error) -> TransportError {
    TransportError::Bind {
        path: path.to_path_buf(),
        source,
    }
}

/// Remove a leftover socket file, but never a non-socket path.
fn remove_stale_socket(path: &Path) -> Result<()> {
    if path.exists() {
        let metadata = std::fs::symlink_metadata(path).map_err(|e| bind_error(path, e))?;
        if metadata.file_type().is_socket() {
            debug!(?path, "removing stale socket");
            std::fs::remove_file(path).map_err(|e| bind_error(path, e))?;
        } else {
            return Err(bind_error(
                path,
                std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "existing path is not a unix socket",
                ),
            ));
        }
    }
    Ok(())
}

/// Bind a non-blocking datagram socket at `path` with hardened permissions.
/// Returns the socket and the created inode identity for guarded cleanup.
fn bind_dgram(path: &Path, mode: u32) -> Result<(UnixDatagram, (u64, u64))> {
    validate_path_len(path)?;
    remove_stale_socket(path)?;

    let socket = UnixDatagram::bind(path).map_err(|e| bind_error(path, e))?;
    socket
        .set_nonblocking(true)
        .map_err(|e| bind_error(path, e))?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .map_err(|e| bind_error(path, e))?;

    let metadata = std::fs::symlink_metadata(path).map_err(|e| bind_error(path, e))?;
    Ok((socket, (metadata.dev(), metadata.ino())))
}

/// Remove the socket file we created, skipping if the path identity changed.
fn remove_bound_socket(path: &Path, created_inode: Option<(u64, u64)>) {
    if let Some((expected_dev, expected_ino)) = created_inode {
        if let Ok(metadata) = std::fs::symlink_metadata(path) {
            if metadata.file_type().is_socket()
                && metadata.dev() == expected_dev
                && metadata.ino() == expected_ino
            {
                debug!(?path, "cleaning up socket file");
                let _ = std::fs::remove_file(path);
            } else {
                debug!(?path, "socket path identity changed; skipping cleanup");
            }
        }
    }
}

fn map_io(e: std::io::Error) -> TransportError {
    match e.kind() {
        std::io::ErrorKind::WouldBlock => TransportError::WouldBlock,
        std::io::ErrorKind::NotConnected => TransportError::NotConnected,
        // The peer's datagram socket is gone.
        std::io::ErrorKind::ConnectionRefused => TransportError::Closed,
        _ => TransportError::Io(e),
    }
}

fn default_client_path(server_path: &Path) -> PathBuf {
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut os = server_path.as_os_str().to_os_string();
    os.push(format!(".c{}-{}", std::process::id(), n));
    PathBuf::from(os)
}

/// Client end of a Unix datagram socket transport.
///
/// Datagram sockets preserve packet boundaries, so one datagram is one
/// packet. The client binds its own socket file (the server replies to the
/// sender's address) and connects it to the server path, which both sets
/// the send target and filters received datagrams to that peer.
#[derive(Debug)]
pub struct UnixDgramClient {
    server_path: PathBuf,
    local_path: PathBuf,
    mode: u32,
    socket: Option<UnixDatagram>,
    bound_inode: Option<(u64, u64)>,
}

impl UnixDgramClient {
    /// Create a client for the server at `server_path`. The local socket
    /// path is derived from it (unique per process and instance).
    pub fn new(server_path: impl AsRef<Path>) -> Self {
        let server_path = server_path.as_ref().to_path_buf();
        let local_path = default_client_path(&server_path);
        Self {
            server_path,
            local_path,
            mode: DEFAULT_SOCKET_MODE,
            socket: None,
            bound_inode: None,
        }
    }

    /// Use an explicit local socket path instead of the derived one.
    pub fn with_local_path(mut self, path: impl AsRef<Path>) -> Self {
        self.local_path = path.as_ref().to_path_buf();
        self
    }

    /// Use an explicit permission mode for the local socket file.
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    /// The server path this client targets.
    pub fn server_path(&self) -> &Path {
        &self.server_path
    }

    /// The local socket path this client binds.
    pub fn local_path(&self) -> &Path {
        &self.local_path
    }
}

impl ClientTransport for UnixDgramClient {
    fn init(&mut self) -> Result<()> {
        if self.socket.is_some() {
            return Ok(());
        }
        validate_path_len(&self.server_path)?;

        let (socket, inode) = bind_dgram(&self.local_path, self.mode)?;
        if let Err(e) = socket.connect(&self.server_path) {
            drop(socket);
            remove_bound_socket(&self.local_path, Some(inode));
            return Err(TransportError::Connect {
                path: self.server_path.clone(),
                source: e,
            });
        }

        info!(server = ?self.server_path, local = ?self.local_path,
              "connected unix datagram transport");
        self.socket = Some(socket);
        self.bound_inode = Some(inode);
        Ok(())
    }

    fn send(&mut self, packet: &[u8]) -> Result<()> {
        let socket = self.socket.as_ref().ok_or(TransportError::NotConnected)?;
        if packet.len() > MTU {
            return Err(TransportError::Oversize {
                len: packet.len(),
                mtu: MTU,
            });
        }
        socket.send(packet).map_err(map_io)?;
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize> {
        let socket = self.socket.as_ref().ok_or(TransportError::NotConnected)?;
        socket.recv(buf).map_err(map_io)
    }

    fn cleanup(&mut self) -> Result<()> {
        if let Some(socket) = self.socket.take() {
            drop(socket);
            remove_bound_socket(&self.local_path, self.bound_inode.take());
            debug!(local = ?self.local_path, "unix datagram client cleaned up");
        }
        Ok(())
    }
}

impl Drop for UnixDgramClient {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

/// Server end of a Unix datagram socket transport.
///
/// Receives requests from any client and replies to the most recent
/// sender, whose address is captured on each `recv`.
#[derive(Debug)]
pub struct UnixDgramServer {
    path: PathBuf,
    mode: u32,
    socket: Option<UnixDatagram>,
    bound_inode: Option<(u64, u64)>,
    peer: Option<PathBuf>,
}

impl UnixDgramServer {
    /// Create a server that will bind at `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            mode: DEFAULT_SOCKET_MODE,
            socket: None,
            bound_inode: None,
            peer: None,
        }
    }

    /// Use an explicit permission mode for the socket file.
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    /// The path this server binds.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ServerTransport for UnixDgramServer {
    fn init(&mut self) -> Result<()> {
        if self.socket.is_some() {
            return Ok(());
        }
        let (socket, inode) = bind_dgram(&self.path, self.mode)?;
        info!(path = ?self.path, "listening on unix datagram socket");
        self.socket = Some(socket);
        self.bound_inode = Some(inode);
        Ok(())
    }

    fn send(&mut self, packet: &[u8]) -> Result<()> {
        let socket = self.socket.as_ref().ok_or(TransportError::NotConnected)?;
        if packet.len() > MTU {
            return Err(TransportError::Oversize {
                len: packet.len(),
                mtu: MTU,
            });
        }
        let peer = self.peer.as_ref().ok_or(TransportError::NotConnected)?;
        socket.send_to(packet, peer).map_err(map_io)?;
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize> {
        let socket = self.socket.as_ref().ok_or(TransportError::NotConnected)?;
        let (n, addr) = socket.recv_from(buf).map_err(map_io)?;
        // Reply target for the next send. Unnamed senders cannot be
        // answered; sends will report NotConnected until a named client
        // shows up.
        self.peer = addr.as_pathname().map(Path::to_path_buf);
        debug!(len = n, peer = ?self.peer, "received request packet");
        Ok(n)
    }

    fn cleanup(&mut self) -> Result<()> {
        if let Some(socket) = self.socket.take() {
            drop(socket);
            remove_bound_socket(&self.path, self.bound_inode.take());
            self.peer = None;
            debug!(path = ?self.path, "unix datagram server cleaned up");
        }
        Ok(())
    }
}

impl Drop for UnixDgramServer {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}
