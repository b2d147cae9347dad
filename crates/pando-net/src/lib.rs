//! # pando-net
//!
//! P2P query overlay for Pando.
//!
//! This crate provides:
//! - Node addresses derived from a 32-byte secret
//! - Line-delimited JSON wire protocol
//! - Version/acknowledge connection handshake
//! - Query flooding with duplicate suppression
//! - Response aggregation with per-query timeout
//!
//! ## Architecture
//!
//! ```text
//! +-------------------+
//! |     Network       |  <- Main service
//! +-------------------+
//!          |
//! +--------+--------+
//! | Listen | Connect|  <- TCP connections
//! +--------+--------+
//!          |
//! +-------------------+
//! |   MessageRouter   |  <- Flood + reply routing
//! +-------------------+
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use pando_net::{Network, NetworkConfig, StaticAnswer};
//!
//! // Configure the node
//! let config = NetworkConfig {
//!     listen_addr: "0.0.0.0:9440".parse().unwrap(),
//!     bootstrap_peers: vec!["seed.example.com:9440".to_string()],
//!     ..Default::default()
//! };
//!
//! // Create and start it
//! let network = Network::new(config, Arc::new(StaticAnswer::new("ok")));
//! network.start().await?;
//!
//! // Ask every connected peer a question
//! let answers = network
//!     .broadcast_query("who has block 42?", Duration::from_secs(5))
//!     .await;
//! for answer in answers {
//!     println!("{}", answer);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod address;
mod aggregator;
mod codec;
mod dedup;
mod error;
mod handler;
mod message;
mod peer;
mod router;
mod service;

pub use address::{derive_address, Address, NodeIdentity, SECRET_LEN};
pub use aggregator::QueryAggregator;
pub use codec::WireCodec;
pub use dedup::{SeenCache, DEFAULT_SEEN_CAPACITY};
pub use error::{NetworkError, NetworkResult};
pub use handler::{QueryHandler, StaticAnswer};
pub use message::Message;
pub use peer::{PeerHandle, PeerRegistry};
pub use router::MessageRouter;
pub use service::{parse_bootstrap, Network, NetworkConfig};
