//! Peer registry and per-peer connection handles

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{mpsc, Notify};

use crate::address::Address;
use crate::error::{NetworkError, NetworkResult};
use crate::message::Message;

/// Handle to one established connection.
///
/// Holds the outbound sink of the connection's writer task. Cloned
/// `Arc`s of the handle circulate through broadcast snapshots; the
/// underlying channel closes once every clone is dropped.
#[derive(Debug)]
pub struct PeerHandle {
    /// Display address the peer claimed during the handshake
    pub address: Address,
    /// Remote socket address
    pub remote_addr: SocketAddr,
    /// Whether the peer dialed us
    pub inbound: bool,
    /// Outgoing message sender
    sender: mpsc::Sender<Message>,
    /// Stop signal for the connection's read loop
    shutdown: Notify,
}

impl PeerHandle {
    /// Create a handle around a connection's outbound channel
    pub fn new(
        address: Address,
        remote_addr: SocketAddr,
        inbound: bool,
        sender: mpsc::Sender<Message>,
    ) -> Self {
        Self {
            address,
            remote_addr,
            inbound,
            sender,
            shutdown: Notify::new(),
        }
    }

    /// Send a message to this peer
    pub async fn send(&self, msg: Message) -> NetworkResult<()> {
        self.sender
            .send(msg)
            .await
            .map_err(|_| NetworkError::ChannelClosed)
    }

    /// Ask the connection's read loop to shut down
    pub fn close(&self) {
        self.shutdown.notify_one();
    }

    /// Resolves once [`close`](Self::close) has been called, even if the
    /// call happened before anyone was waiting
    pub async fn closed(&self) {
        self.shutdown.notified().await;
    }
}

/// Registry of established peers, keyed by display address.
///
/// One entry per address. When a second connection handshakes with an
/// address that is already present the newer connection wins the slot;
/// the displaced handle is handed back to the caller for teardown.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: RwLock<HashMap<Address, Arc<PeerHandle>>>,
}

impl PeerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a peer, displacing any previous entry for the address.
    ///
    /// Returns the displaced handle so the caller can close it.
    pub fn register(&self, handle: Arc<PeerHandle>) -> Option<Arc<PeerHandle>> {
        self.peers.write().insert(handle.address.clone(), handle)
    }

    /// Remove the entry for an address. Idempotent.
    pub fn remove(&self, address: &Address) -> Option<Arc<PeerHandle>> {
        self.peers.write().remove(address)
    }

    /// Remove an entry only if it still holds this exact handle.
    ///
    /// A connection that lost its slot to a newer connection for the same
    /// address must not evict its replacement during teardown. Returns
    /// whether the entry was removed.
    pub fn remove_handle(&self, handle: &Arc<PeerHandle>) -> bool {
        let mut peers = self.peers.write();
        match peers.get(&handle.address) {
            Some(current) if Arc::ptr_eq(current, handle) => {
                peers.remove(&handle.address);
                true
            }
            _ => false,
        }
    }

    /// Get the handle for an address
    pub fn get(&self, address: &Address) -> Option<Arc<PeerHandle>> {
        self.peers.read().get(address).cloned()
    }

    /// Point-in-time snapshot of every registered handle.
    ///
    /// Registrations and removals after the snapshot do not affect it.
    pub fn snapshot(&self) -> Vec<Arc<PeerHandle>> {
        self.peers.read().values().cloned().collect()
    }

    /// Addresses of every registered peer
    pub fn addresses(&self) -> Vec<Address> {
        self.peers.read().keys().cloned().collect()
    }

    /// Check if an address is registered
    pub fn contains(&self, address: &Address) -> bool {
        self.peers.read().contains_key(address)
    }

    /// Number of registered peers
    pub fn peer_count(&self) -> usize {
        self.peers.read().len()
    }

    /// Whether the registry has no peers
    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }
}
