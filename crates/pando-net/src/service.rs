//! Network service: listener, bootstrap dialing, connections, broadcast

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::StreamExt;
use futures::SinkExt;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::address::{Address, NodeIdentity, SECRET_LEN};
use crate::aggregator::QueryAggregator;
use crate::codec::WireCodec;
use crate::dedup::{SeenCache, DEFAULT_SEEN_CAPACITY};
use crate::error::{NetworkError, NetworkResult};
use crate::handler::QueryHandler;
use crate::message::Message;
use crate::peer::{PeerHandle, PeerRegistry};
use crate::router::MessageRouter;

/// Network configuration
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Listen address
    pub listen_addr: SocketAddr,
    /// Bootstrap peers as `host:port` strings
    pub bootstrap_peers: Vec<String>,
    /// Fixed node secret; a fresh random secret is used when absent
    pub secret: Option<[u8; SECRET_LEN]>,
    /// Capacity of the processed-query id cache
    pub seen_capacity: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:9440".parse().unwrap(),
            bootstrap_peers: Vec::new(),
            secret: None,
            seen_capacity: DEFAULT_SEEN_CAPACITY,
        }
    }
}

/// Split a `host:port` bootstrap entry.
///
/// The host may be a name; resolution happens at dial time. Bracketed
/// IPv6 hosts are unwrapped. Entries without a port, with an empty host,
/// or with an unparseable port are rejected.
pub fn parse_bootstrap(entry: &str) -> NetworkResult<(String, u16)> {
    let entry = entry.trim();
    let (host, port) = entry
        .rsplit_once(':')
        .ok_or_else(|| NetworkError::InvalidBootstrap(entry.to_string()))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(NetworkError::InvalidBootstrap(entry.to_string()));
    }
    let port = port
        .parse::<u16>()
        .map_err(|_| NetworkError::InvalidBootstrap(entry.to_string()))?;
    Ok((host.to_string(), port))
}

/// Handle to an overlay node.
///
/// Owns the node's identity, peer registry, dedup cache, and response
/// aggregator. Every instance is independent; nothing is shared between
/// two `Network`s in one process.
pub struct Network {
    /// Configuration
    config: NetworkConfig,
    /// Node identity
    identity: NodeIdentity,
    /// Established peers
    registry: Arc<PeerRegistry>,
    /// Replies owed to our own broadcasts
    aggregator: Arc<QueryAggregator>,
    /// Already-processed query ids
    seen: Arc<SeenCache>,
    /// Dispatch for established-connection traffic
    router: Arc<MessageRouter>,
    /// Running flag
    running: Arc<RwLock<bool>>,
    /// Address the listener actually bound
    local_addr: Arc<RwLock<Option<SocketAddr>>>,
}

impl Network {
    /// Create a node over `config`, answering queries with `handler`
    pub fn new(config: NetworkConfig, handler: Arc<dyn QueryHandler>) -> Self {
        let identity = match config.secret {
            Some(ref secret) => NodeIdentity::from_secret(secret),
            None => NodeIdentity::random(),
        };
        let registry = Arc::new(PeerRegistry::new());
        let aggregator = Arc::new(QueryAggregator::new());
        let seen = Arc::new(SeenCache::new(config.seen_capacity));
        let router = Arc::new(MessageRouter::new(
            identity.address().clone(),
            registry.clone(),
            aggregator.clone(),
            seen.clone(),
            handler,
        ));
        Self {
            config,
            identity,
            registry,
            aggregator,
            seen,
            router,
            running: Arc::new(RwLock::new(false)),
            local_addr: Arc::new(RwLock::new(None)),
        }
    }

    /// This node's display address
    pub fn address(&self) -> &Address {
        self.identity.address()
    }

    /// Socket address the listener bound, once running
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.read()
    }

    /// Check if running
    pub fn is_running(&self) -> bool {
        *self.running.read()
    }

    /// Number of established peers
    pub fn peer_count(&self) -> usize {
        self.registry.peer_count()
    }

    /// Addresses of established peers
    pub fn connected_peers(&self) -> Vec<Address> {
        self.registry.addresses()
    }

    /// Start the listener and dial the bootstrap peers.
    ///
    /// Failing to bind the listener is the only fatal error; malformed
    /// bootstrap entries and unreachable bootstrap peers are logged and
    /// skipped. Returns once the listener is accepting; connections
    /// proceed on background tasks.
    pub async fn start(&self) -> NetworkResult<()> {
        if *self.running.read() {
            return Err(NetworkError::AlreadyRunning);
        }

        let listener = TcpListener::bind(self.config.listen_addr).await?;
        let bound = listener.local_addr()?;
        *self.local_addr.write() = Some(bound);
        *self.running.write() = true;

        info!("Listening on {} as {}", bound, self.identity.address());

        // Connect to bootstrap peers
        for entry in &self.config.bootstrap_peers {
            let (host, port) = match parse_bootstrap(entry) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!("Skipping bootstrap peer {:?}: {}", entry, e);
                    continue;
                }
            };
            let network = self.clone_handle();
            tokio::spawn(async move {
                if let Err(e) = network.connect_host(&host, port).await {
                    warn!("Failed to connect to bootstrap peer {}:{}: {}", host, port, e);
                }
            });
        }

        // Accept incoming connections
        let network = self.clone_handle();
        tokio::spawn(async move {
            while *network.running.read() {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        debug!("Incoming connection from {}", addr);
                        let network = network.clone_handle();
                        tokio::spawn(async move {
                            if let Err(e) = network.handle_connection(stream, addr, true).await {
                                warn!("Connection error from {}: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Accept error: {}", e);
                    }
                }
            }
        });

        Ok(())
    }

    /// Stop accepting connections and close every established peer
    pub fn stop(&self) {
        *self.running.write() = false;
        for peer in self.registry.snapshot() {
            peer.close();
        }
    }

    /// Connect to a peer by socket address
    pub async fn connect(&self, addr: SocketAddr) -> NetworkResult<Address> {
        info!("Connecting to {}", addr);
        let stream = TcpStream::connect(addr).await?;
        self.handle_connection(stream, addr, false).await
    }

    /// Connect to a peer by host name and port
    pub async fn connect_host(&self, host: &str, port: u16) -> NetworkResult<Address> {
        info!("Connecting to {}:{}", host, port);
        let stream = TcpStream::connect((host, port)).await?;
        let addr = stream.peer_addr()?;
        self.handle_connection(stream, addr, false).await
    }

    /// Broadcast a query to every connected peer and gather the replies.
    ///
    /// Returns when every peer has replied or been discounted, or when
    /// `timeout` passes, whichever comes first; a timeout yields the
    /// partial list collected so far. With no peers connected it returns
    /// an empty list immediately.
    pub async fn broadcast_query(&self, query: &str, timeout: Duration) -> Vec<Value> {
        let peers = self.registry.snapshot();
        if peers.is_empty() {
            debug!("Broadcast requested with no peers connected");
            return Vec::new();
        }

        let id = Uuid::new_v4().to_string();
        // Our own query must never be answered or re-forwarded here if
        // the flood loops it back.
        self.seen.insert(&id);

        let addresses: Vec<Address> = peers.iter().map(|p| p.address.clone()).collect();
        if !self.aggregator.begin(&id, &addresses) {
            return Vec::new();
        }
        info!("Broadcasting query {} to {} peers", id, peers.len());

        let msg = Message::query(id.clone(), self.identity.address().clone(), query);
        for peer in &peers {
            if let Err(e) = peer.send(msg.clone()).await {
                warn!("Failed to send query to {}: {}", peer.address, e);
                self.aggregator.discount(&id, &peer.address);
            }
        }

        self.aggregator.await_completion(&id, timeout).await
    }

    /// Handshake a fresh connection, register the peer, and spawn its
    /// reader and writer tasks.
    async fn handle_connection(
        &self,
        stream: TcpStream,
        addr: SocketAddr,
        inbound: bool,
    ) -> NetworkResult<Address> {
        let (read_half, write_half) = stream.into_split();
        let mut reader = FramedRead::new(read_half, WireCodec::new());
        let mut writer = FramedWrite::new(write_half, WireCodec::new());

        let peer_address =
            perform_handshake(&mut reader, &mut writer, self.identity.address(), inbound).await?;

        let (tx, mut rx) = mpsc::channel::<Message>(256);
        let handle = Arc::new(PeerHandle::new(peer_address.clone(), addr, inbound, tx));

        if let Some(displaced) = self.registry.register(handle.clone()) {
            debug!("Superseding existing connection for {}", peer_address);
            displaced.close();
        }
        info!("Peer {} connected from {}", peer_address, addr);

        // Writer task: drains the outbound queue until every sender is
        // gone, then drops the write half.
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = writer.send(msg).await {
                    debug!("Write failed: {}", e);
                    break;
                }
            }
        });

        // Reader task: dispatches until EOF, a bad frame, or a close
        // signal, then tears the peer down exactly once.
        let registry = self.registry.clone();
        let aggregator = self.aggregator.clone();
        let router = self.router.clone();
        let reader_handle = handle.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    item = reader.next() => match item {
                        Some(Ok(msg)) => router.dispatch(msg, &reader_handle.address).await,
                        Some(Err(e)) => {
                            warn!("Dropping connection to {}: {}", reader_handle.address, e);
                            break;
                        }
                        None => break,
                    },
                    _ = reader_handle.closed() => break,
                }
            }
            // Only the handle still holding the registry slot discounts
            // in-flight replies; a superseded connection must not.
            if registry.remove_handle(&reader_handle) {
                aggregator.forget_peer(&reader_handle.address);
                info!("Peer {} disconnected", reader_handle.address);
            }
        });

        Ok(peer_address)
    }

    /// Clone handle for spawning
    fn clone_handle(&self) -> Self {
        Self {
            config: self.config.clone(),
            identity: self.identity.clone(),
            registry: self.registry.clone(),
            aggregator: self.aggregator.clone(),
            seen: self.seen.clone(),
            router: self.router.clone(),
            running: self.running.clone(),
            local_addr: self.local_addr.clone(),
        }
    }
}

/// Runs the version/acknowledge exchange and returns the peer's claimed
/// address.
///
/// The dialing side speaks first. Either side aborts on any unexpected
/// message, decode failure, or EOF; the caller then drops the connection
/// without registering anything.
async fn perform_handshake<R, W>(
    reader: &mut FramedRead<R, WireCodec>,
    writer: &mut FramedWrite<W, WireCodec>,
    local: &Address,
    inbound: bool,
) -> NetworkResult<Address>
where
    R: tokio::io::AsyncRead + Unpin,
    W: tokio::io::AsyncWrite + Unpin,
{
    if inbound {
        let peer = match next_handshake_message(reader).await? {
            Message::Version { address } => address,
            other => return Err(unexpected("version", &other)),
        };
        send_handshake_message(writer, Message::version(local.clone())).await?;
        match next_handshake_message(reader).await? {
            Message::Acknowledge => {}
            other => return Err(unexpected("acknowledge", &other)),
        }
        send_handshake_message(writer, Message::acknowledge()).await?;
        Ok(peer)
    } else {
        send_handshake_message(writer, Message::version(local.clone())).await?;
        let peer = match next_handshake_message(reader).await? {
            Message::Version { address } => address,
            other => return Err(unexpected("version", &other)),
        };
        send_handshake_message(writer, Message::acknowledge()).await?;
        match next_handshake_message(reader).await? {
            Message::Acknowledge => {}
            other => return Err(unexpected("acknowledge", &other)),
        }
        Ok(peer)
    }
}

async fn next_handshake_message<R>(reader: &mut FramedRead<R, WireCodec>) -> NetworkResult<Message>
where
    R: tokio::io::AsyncRead + Unpin,
{
    reader
        .next()
        .await
        .ok_or_else(|| NetworkError::HandshakeFailed("connection closed".into()))?
        .map_err(|e| NetworkError::HandshakeFailed(format!("read failed: {}", e)))
}

async fn send_handshake_message<W>(
    writer: &mut FramedWrite<W, WireCodec>,
    msg: Message,
) -> NetworkResult<()>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    let name = msg.name();
    writer
        .send(msg)
        .await
        .map_err(|e| NetworkError::HandshakeFailed(format!("send {}: {}", name, e)))
}

fn unexpected(expected: &str, got: &Message) -> NetworkError {
    NetworkError::HandshakeFailed(format!("expected {}, got {}", expected, got.name()))
}
