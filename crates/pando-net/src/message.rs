//! Wire protocol messages

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::address::Address;

/// Overlay protocol messages.
///
/// Serialized as JSON objects tagged by a lowercase `type` field, one
/// object per line on the wire. `version` and `acknowledge` only appear
/// during the handshake; `query` and `response` carry all traffic after
/// establishment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    /// Handshake opener announcing the sender's display address
    Version {
        /// Sender's display address
        address: Address,
    },

    /// Handshake confirmation
    Acknowledge,

    /// A query flooding through the overlay
    Query {
        /// Globally unique query id, used for dedup and correlation
        id: String,
        /// Display address of the node that created the query
        origin: Address,
        /// Opaque query text
        payload: String,
    },

    /// A node's answer to a query, sent back to the peer the query
    /// arrived from
    Response {
        /// Id of the query being answered
        id: String,
        /// Display address of the answering node
        from: Address,
        /// Arbitrary answer value, or an `{"error": ...}` marker
        response: Value,
    },
}

impl Message {
    /// Returns the wire tag of the message for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Version { .. } => "version",
            Self::Acknowledge => "acknowledge",
            Self::Query { .. } => "query",
            Self::Response { .. } => "response",
        }
    }

    /// Creates a version message for the handshake.
    pub fn version(address: Address) -> Self {
        Self::Version { address }
    }

    /// Creates an acknowledge message.
    pub fn acknowledge() -> Self {
        Self::Acknowledge
    }

    /// Creates a query message.
    pub fn query(id: impl Into<String>, origin: Address, payload: impl Into<String>) -> Self {
        Self::Query {
            id: id.into(),
            origin,
            payload: payload.into(),
        }
    }

    /// Creates a response message.
    pub fn response(id: impl Into<String>, from: Address, response: Value) -> Self {
        Self::Response {
            id: id.into(),
            from,
            response,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_name() {
        assert_eq!(Message::acknowledge().name(), "acknowledge");
        assert_eq!(
            Message::query("q1", Address::from("1abc"), "hello").name(),
            "query"
        );
    }

    #[test]
    fn test_version_wire_shape() {
        let msg = Message::version(Address::from("1abc"));
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value, json!({"type": "version", "address": "1abc"}));
    }

    #[test]
    fn test_acknowledge_wire_shape() {
        let value = serde_json::to_value(Message::acknowledge()).unwrap();
        assert_eq!(value, json!({"type": "acknowledge"}));
    }

    #[test]
    fn test_query_wire_shape() {
        let msg = Message::query("q-1", Address::from("1orig"), "what is up");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({"type": "query", "id": "q-1", "origin": "1orig", "payload": "what is up"})
        );
    }

    #[test]
    fn test_response_wire_shape() {
        let msg = Message::response("q-1", Address::from("1from"), json!({"answer": 42}));
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({"type": "response", "id": "q-1", "from": "1from", "response": {"answer": 42}})
        );
    }

    #[test]
    fn test_response_value_may_be_error_marker() {
        let msg = Message::response("q-1", Address::from("1from"), json!({"error": "boom"}));
        match msg {
            Message::Response { response, .. } => {
                assert_eq!(response["error"], "boom");
            }
            _ => panic!("wrong message type"),
        }
    }

    #[test]
    fn test_decode_known_tags() {
        let msg: Message = serde_json::from_str(r#"{"type":"version","address":"1a"}"#).unwrap();
        assert!(matches!(msg, Message::Version { .. }));

        let msg: Message = serde_json::from_str(r#"{"type":"acknowledge"}"#).unwrap();
        assert_eq!(msg, Message::Acknowledge);
    }

    #[test]
    fn test_decode_rejects_unknown_tag() {
        let result: Result<Message, _> =
            serde_json::from_str(r#"{"type":"gossip","data":"x"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_rejects_missing_fields() {
        // A query without an id is unrepresentable, not an empty-id query.
        let result: Result<Message, _> =
            serde_json::from_str(r#"{"type":"query","origin":"1a","payload":"p"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_rejects_untagged_object() {
        let result: Result<Message, _> = serde_json::from_str(r#"{"address":"1a"}"#);
        assert!(result.is_err());
    }
}
