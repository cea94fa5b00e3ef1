//! Art-Net receiver
//!
//! Owns one UDP socket and a background receive thread. Every valid ArtDmx
//! frame is written into the shared [`UniverseStore`]; the listener never
//! talks to the host scene.

use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use beamsync_core::{ListenerConfig, UniverseStore};
use parking_lot::RwLock;
use tracing::{debug, error, info, trace, warn};

use super::packet::apply_datagram;
use crate::error::{ControlError, Result};

/// Large enough for a full ArtDmx frame with slack for trailing bytes
const RECV_BUFFER_LEN: usize = 1024;

/// Listener counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerStats {
    pub datagrams_received: u64,
    /// Valid frames, whether or not they changed anything
    pub frames_applied: u64,
    pub frames_dropped: u64,
    pub channels_changed: u64,
    pub reconnects: u64,
}

/// Receives Art-Net on a background thread
pub struct ArtNetListener {
    config: ListenerConfig,
    store: Arc<UniverseStore>,
    running: Arc<AtomicBool>,
    stats: Arc<RwLock<ListenerStats>>,
    local_addr: Option<SocketAddr>,
    receive_thread: Option<JoinHandle<()>>,
}

impl ArtNetListener {
    pub fn new(config: ListenerConfig, store: Arc<UniverseStore>) -> Self {
        Self {
            config,
            store,
            running: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(RwLock::new(ListenerStats::default())),
            local_addr: None,
            receive_thread: None,
        }
    }

    /// Bind the socket and start the receive thread.
    ///
    /// On bind failure the listener stays inert and the error is returned.
    pub fn start(&mut self) -> Result<()> {
        if let (true, Some(addr)) = (self.is_running(), self.local_addr) {
            return Err(ControlError::AlreadyRunning(addr));
        }
        // Reap a thread that exited on its own
        self.stop();

        let socket = bind(self.config.bind_address, self.config.read_timeout())?;
        let local_addr = socket.local_addr()?;
        info!("Art-Net listener bound to {}", local_addr);

        self.spawn(Some(socket), local_addr)
    }

    /// Run the receive loop on `address`, binding first if `socket` is `None`
    fn spawn(&mut self, socket: Option<UdpSocket>, address: SocketAddr) -> Result<()> {
        self.running.store(true, Ordering::Relaxed);
        let worker = ReceiveLoop {
            // Rebind the concrete port on reconnect, even if configured as 0
            address,
            read_timeout: self.config.read_timeout(),
            reconnect_delay: self.config.reconnect_delay(),
            store: self.store.clone(),
            running: self.running.clone(),
            stats: self.stats.clone(),
        };

        let spawned = thread::Builder::new()
            .name("artnet-receive".to_string())
            .spawn(move || worker.run(socket));
        match spawned {
            Ok(handle) => {
                self.receive_thread = Some(handle);
                self.local_addr = Some(address);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Relaxed);
                Err(ControlError::IoError(e))
            }
        }
    }

    /// Signal the receive thread to exit and wait for it.
    ///
    /// Returns within roughly one read timeout.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(thread) = self.receive_thread.take() {
            info!("Stopping Art-Net listener");
            if thread.join().is_err() {
                error!("Art-Net receive thread panicked");
            }
        }
        self.local_addr = None;
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed) && self.receive_thread.is_some()
    }

    /// Address the socket is bound to while running
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn stats(&self) -> ListenerStats {
        *self.stats.read()
    }

    pub fn reset_stats(&self) {
        *self.stats.write() = ListenerStats::default();
    }
}

impl Drop for ArtNetListener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn bind(address: SocketAddr, read_timeout: Duration) -> Result<UdpSocket> {
    let socket = UdpSocket::bind(address).map_err(|source| ControlError::Bind { address, source })?;
    socket.set_read_timeout(Some(read_timeout))?;
    Ok(socket)
}

fn is_timeout(error: &std::io::Error) -> bool {
    matches!(error.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

/// State moved into the receive thread
struct ReceiveLoop {
    address: SocketAddr,
    read_timeout: Duration,
    reconnect_delay: Duration,
    store: Arc<UniverseStore>,
    running: Arc<AtomicBool>,
    stats: Arc<RwLock<ListenerStats>>,
}

impl ReceiveLoop {
    fn run(self, mut socket: Option<UdpSocket>) {
        info!("Art-Net receive thread started");
        let mut buffer = [0u8; RECV_BUFFER_LEN];

        while self.running.load(Ordering::Relaxed) {
            let Some(active) = socket.as_ref() else {
                socket = self.reconnect();
                continue;
            };

            match active.recv_from(&mut buffer) {
                Ok((len, source)) => self.handle_datagram(&buffer[..len], source),
                Err(e) if is_timeout(&e) => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    warn!("Art-Net socket error, reconnecting: {}", e);
                    socket = None;
                }
            }
        }

        info!("Art-Net receive thread stopped");
    }

    fn handle_datagram(&self, datagram: &[u8], source: SocketAddr) {
        match apply_datagram(&self.store, datagram) {
            Ok(changed) => {
                let mut stats = self.stats.write();
                stats.datagrams_received += 1;
                stats.frames_applied += 1;
                stats.channels_changed += changed as u64;
            }
            Err(reason) => {
                trace!("Dropped datagram from {}: {}", source, reason);
                let mut stats = self.stats.write();
                stats.datagrams_received += 1;
                stats.frames_dropped += 1;
            }
        }
    }

    /// One reconnect attempt. Returns `None` if the bind failed.
    fn reconnect(&self) -> Option<UdpSocket> {
        thread::sleep(self.reconnect_delay);
        if !self.running.load(Ordering::Relaxed) {
            return None;
        }
        self.stats.write().reconnects += 1;
        match bind(self.address, self.read_timeout) {
            Ok(socket) => {
                info!("Art-Net listener reconnected on {}", self.address);
                Some(socket)
            }
            Err(e) => {
                debug!("Art-Net reconnect failed: {}", e);
                None
            }
        }
    }
}
