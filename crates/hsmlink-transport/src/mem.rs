use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;

use hsmlink_wire::MTU;

use crate::error::{Result, TransportError};
use crate::traits::{ClientTransport, ServerTransport};

/// In-process packet transport: one mailbox slot per direction.
///
/// Models a shared-memory link to a security module. Each direction holds
/// at most one packet; sending into an occupied slot reports
/// [`TransportError::WouldBlock`] until the receiver drains it. Capacity
/// one is deliberate, the session layer above never has more than one
/// exchange in flight.
#[derive(Debug, Default)]
struct Mailbox {
    slot: Mutex<Option<Bytes>>,
}

impl Mailbox {
    fn lock(&self) -> Result<MutexGuard<'_, Option<Bytes>>> {
        self.slot
            .lock()
            .map_err(|_| TransportError::Io(std::io::Error::other("mailbox lock poisoned")))
    }

    fn put(&self, packet: &[u8]) -> Result<()> {
        let mut slot = self.lock()?;
        if slot.is_some() {
            return Err(TransportError::WouldBlock);
        }
        *slot = Some(Bytes::copy_from_slice(packet));
        Ok(())
    }

    /// Take the pending packet, if any. Copies into `buf` with datagram
    /// truncation semantics.
    fn take(&self, buf: &mut [u8]) -> Result<Option<usize>> {
        let mut slot = self.lock()?;
        match slot.take() {
            Some(packet) => {
                let n = packet.len().min(buf.len());
                buf[..n].copy_from_slice(&packet[..n]);
                Ok(Some(n))
            }
            None => Ok(None),
        }
    }
}

#[derive(Debug)]
struct Shared {
    requests: Mailbox,
    responses: Mailbox,
    client_alive: AtomicBool,
    server_alive: AtomicBool,
}

/// Create a connected in-process transport pair.
pub fn pair() -> (MemClient, MemServer) {
    let shared = Arc::new(Shared {
        requests: Mailbox::default(),
        responses: Mailbox::default(),
        client_alive: AtomicBool::new(true),
        server_alive: AtomicBool::new(true),
    });
    (
        MemClient {
            shared: Arc::clone(&shared),
            ready: false,
        },
        MemServer {
            shared,
            ready: false,
        },
    )
}

/// Client end of an in-process transport pair.
#[derive(Debug)]
pub struct MemClient {
    shared: Arc<Shared>,
    ready: bool,
}

impl ClientTransport for MemClient {
    fn init(&mut self) -> Result<()> {
        self.shared.client_alive.store(true, Ordering::Release);
        self.ready = true;
        Ok(())
    }

    fn send(&mut self, packet: &[u8]) -> Result<()> {
        if !self.ready {
            return Err(TransportError::NotConnected);
        }
        if packet.len() > MTU {
            return Err(TransportError::Oversize {
                len: packet.len(),
                mtu: MTU,
            });
        }
        if !self.shared.server_alive.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        self.shared.requests.put(packet)
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.ready {
            return Err(TransportError::NotConnected);
        }
        match self.shared.responses.take(buf)? {
            Some(n) => Ok(n),
            // Drain before reporting the peer gone: a response may have
            // been left behind by a server that has since shut down.
            None if !self.shared.server_alive.load(Ordering::Acquire) => {
                Err(TransportError::Closed)
            }
            None => Err(TransportError::WouldBlock),
        }
    }

    fn cleanup(&mut self) -> Result<()> {
        self.ready = false;
        self.shared.client_alive.store(false, Ordering::Release);
        Ok(())
    }
}

impl Drop for MemClient {
    fn drop(&mut self) {
        self.shared.client_alive.store(false, Ordering::Release);
    }
}

/// Server end of an in-process transport pair.
#[derive(Debug)]
pub struct MemServer {
    shared: Arc<Shared>,
    ready: bool,
}

impl ServerTransport for MemServer {
    fn init(&mut self) -> Result<()> {
        self.shared.server_alive.store(true, Ordering::Release);
        self.ready = true;
        Ok(())
    }

    fn send(&mut self, packet: &[u8]) -> Result<()> {
        if !self.ready {
            return Err(TransportError::NotConnected);
        }
        if packet.len() > MTU {
            return Err(TransportError::Oversize {
                len: packet.len(),
                mtu: MTU,
            });
        }
        if !self.shared.client_alive.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        self.shared.responses.put(packet)
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.ready {
            return Err(TransportError::NotConnected);
        }
        match self.shared.requests.take(buf)? {
            Some(n) => Ok(n),
            None if !self.shared.client_alive.load(Ordering::Acquire) => {
                Err(TransportError::Closed)
            }
            None => Err(TransportError::WouldBlock),
        }
    }

    fn cleanup(&mut self) -> Result<()> {
        self.ready = false;
        self.shared.server_alive.store(false, Ordering::Release);
        Ok(())
    }
}

impl Drop for MemServer {
    fn drop(&mut self) {
        self.shared.server_alive.store(false, Ordering::Release);
    }
}
