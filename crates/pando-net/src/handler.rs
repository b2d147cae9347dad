//! Query answering capability

use async_trait::async_trait;
use serde_json::Value;

use crate::error::NetworkResult;

/// Capability for answering queries that arrive over the overlay.
///
/// The router awaits the handler once for every first-seen query and
/// relays the returned value to the peer the query arrived from. Errors
/// do not propagate as failures: the router folds them into an
/// `{"error": ...}` marker response.
#[async_trait]
pub trait QueryHandler: Send + Sync {
    /// Produce an answer for an incoming query
    async fn answer(&self, query: &str) -> NetworkResult<Value>;
}

/// Handler answering every query with one fixed value.
///
/// Stands in for a real answering backend during development and in
/// tests.
#[derive(Debug, Clone)]
pub struct StaticAnswer {
    value: Value,
}

impl StaticAnswer {
    /// Answer every query with `value`
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

#[async_trait]
impl QueryHandler for StaticAnswer {
    async fn answer(&self, _query: &str) -> NetworkResult<Value> {
        Ok(self.value.clone())
    }
}
