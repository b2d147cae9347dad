//! Response aggregation for in-flight broadcasts

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Notify;
use tracing::{debug, trace};

use crate::address::Address;

/// State of one in-flight broadcast.
#[derive(Debug)]
struct PendingQuery {
    /// Response payloads collected so far, in arrival order
    responses: Vec<Value>,
    /// Peers that still owe a reply
    outstanding: HashSet<Address>,
    /// Fired once `outstanding` empties
    done: Arc<Notify>,
}

/// Tracks the replies owed to this node's own broadcasts.
///
/// A broadcast opens an entry naming the peers it was sent to. Replies
/// and send failures shrink that set; the broadcaster's wait ends when
/// the set empties or its timeout fires. The entry is removed when the
/// wait returns, so anything arriving later finds no entry and is
/// dropped.
#[derive(Debug, Default)]
pub struct QueryAggregator {
    pending: Mutex<HashMap<String, PendingQuery>>,
}

impl QueryAggregator {
    /// Create an empty aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an entry for a broadcast sent to `peers`.
    ///
    /// Returns `false` (and stores nothing) when `peers` is empty or the
    /// id already has an entry.
    pub fn begin(&self, id: &str, peers: &[Address]) -> bool {
        if peers.is_empty() {
            return false;
        }
        let mut pending = self.pending.lock();
        if pending.contains_key(id) {
            return false;
        }
        pending.insert(
            id.to_string(),
            PendingQuery {
                responses: Vec::new(),
                outstanding: peers.iter().cloned().collect(),
                done: Arc::new(Notify::new()),
            },
        );
        true
    }

    /// Record a reply to an in-flight broadcast.
    ///
    /// Replies for unknown ids (broadcasts this node did not originate,
    /// or entries already closed) and repeat replies from the same peer
    /// are dropped.
    pub fn record_response(&self, id: &str, from: &Address, payload: Value) {
        let mut pending = self.pending.lock();
        if let Some(entry) = pending.get_mut(id) {
            if !entry.outstanding.remove(from) {
                trace!("Dropping repeat response for {} from {}", id, from);
                return;
            }
            entry.responses.push(payload);
            if entry.outstanding.is_empty() {
                entry.done.notify_one();
            }
        } else {
            debug!("Dropping response for unknown query {} from {}", id, from);
        }
    }

    /// Drop one owed reply without recording a payload.
    ///
    /// Used when the broadcast's send to that peer failed.
    pub fn discount(&self, id: &str, peer: &Address) {
        let mut pending = self.pending.lock();
        if let Some(entry) = pending.get_mut(id) {
            if entry.outstanding.remove(peer) && entry.outstanding.is_empty() {
                entry.done.notify_one();
            }
        }
    }

    /// Discount a departed peer across every in-flight broadcast
    pub fn forget_peer(&self, peer: &Address) {
        let mut pending = self.pending.lock();
        for entry in pending.values_mut() {
            if entry.outstanding.remove(peer) && entry.outstanding.is_empty() {
                entry.done.notify_one();
            }
        }
    }

    /// Wait until every owed reply has arrived or `timeout` passes, then
    /// close the entry and return what was collected.
    ///
    /// The entry is always removed, so a timed-out broadcast returns the
    /// partial list and later replies are dropped. An id with no entry
    /// yields an empty list immediately.
    pub async fn await_completion(&self, id: &str, timeout: Duration) -> Vec<Value> {
        let done = {
            let pending = self.pending.lock();
            match pending.get(id) {
                Some(entry) => entry.done.clone(),
                None => return Vec::new(),
            }
        };

        // The signal may have fired before we start waiting; Notify holds
        // the permit, so notified() still resolves immediately.
        let _ = tokio::time::timeout(timeout, done.notified()).await;

        match self.pending.lock().remove(id) {
            Some(entry) => entry.responses,
            None => Vec::new(),
        }
    }

    /// Number of broadcasts currently awaiting replies
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}
