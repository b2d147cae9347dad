//! Message dispatch: dedup, flood forwarding, answering, correlation

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, trace, warn};

use crate::address::Address;
use crate::aggregator::QueryAggregator;
use crate::dedup::SeenCache;
use crate::handler::QueryHandler;
use crate::message::Message;
use crate::peer::PeerRegistry;

/// Routes traffic arriving on established connections.
///
/// One router per node, shared by every connection's read loop. Queries
/// are deduplicated, flooded onward, answered locally, and replied to;
/// responses are matched against the aggregator purely by query id.
pub struct MessageRouter {
    local: Address,
    registry: Arc<PeerRegistry>,
    aggregator: Arc<QueryAggregator>,
    seen: Arc<SeenCache>,
    handler: Arc<dyn QueryHandler>,
}

impl MessageRouter {
    /// Create a router over a node's shared state
    pub fn new(
        local: Address,
        registry: Arc<PeerRegistry>,
        aggregator: Arc<QueryAggregator>,
        seen: Arc<SeenCache>,
        handler: Arc<dyn QueryHandler>,
    ) -> Self {
        Self {
            local,
            registry,
            aggregator,
            seen,
            handler,
        }
    }

    /// Dispatch one message read from an established connection.
    ///
    /// `sender` is the address of the peer whose connection delivered the
    /// message; for forwarded queries that is not the query's origin.
    pub async fn dispatch(&self, msg: Message, sender: &Address) {
        match msg {
            Message::Query {
                id,
                origin,
                payload,
            } => {
                self.on_query(id, origin, payload, sender).await;
            }
            Message::Response { id, from, response } => {
                self.on_response(id, from, response, sender);
            }
            other => {
                trace!(
                    "Ignoring {} from {} on established connection",
                    other.name(),
                    sender
                );
            }
        }
    }

    async fn on_query(&self, id: String, origin: Address, payload: String, sender: &Address) {
        if id.is_empty() {
            debug!("Discarding query with empty id from {}", sender);
            return;
        }

        // Mark the id before any forwarding or answering, so copies of
        // this query racing in over other connections are already stale.
        if !self.seen.insert(&id) {
            trace!("Suppressing duplicate query {} from {}", id, sender);
            return;
        }
        debug!("Processing query {} from {} (origin {})", id, sender, origin);

        let forward = Message::query(id.clone(), origin, payload.clone());
        for peer in self.registry.snapshot() {
            if peer.address == *sender {
                continue;
            }
            if let Err(e) = peer.send(forward.clone()).await {
                warn!("Failed to forward query to {}: {}", peer.address, e);
            }
        }

        let answer = match self.handler.answer(&payload).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Query handler failed for {}: {}", id, e);
                json!({ "error": e.to_string() })
            }
        };

        let reply = Message::response(id, self.local.clone(), answer);
        match self.registry.get(sender) {
            Some(peer) => {
                if let Err(e) = peer.send(reply).await {
                    debug!("Failed to return response to {}: {}", sender, e);
                }
            }
            None => {
                debug!("Query sender {} disconnected before response", sender);
            }
        }
    }

    fn on_response(&self, id: String, from: Address, response: Value, sender: &Address) {
        if id.is_empty() {
            debug!("Discarding response with empty id from {}", sender);
            return;
        }
        trace!("Response for {} from {} via {}", id, from, sender);
        self.aggregator.record_response(&id, &from, response);
    }
}
