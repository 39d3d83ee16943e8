//! Delivery-mode classification.
//!
//! An envelope may satisfy several predicates at once (a response can carry a
//! `socketId`, a query can carry `serialData`). Exactly one mode applies, and
//! the checks below run in a fixed precedence order; reordering them changes
//! where messages go.

use crate::envelope::Envelope;
use crate::ids::{ConnectionId, RequestId};

/// How an authenticated envelope is delivered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Only to the connection with this identity, or to no one.
    Targeted {
        /// Recipient identity.
        socket_id: ConnectionId,
    },
    /// A request: remember the sender, broadcast to everyone else.
    Query {
        /// Caller-supplied correlation id, if any.
        request_id: Option<RequestId>,
    },
    /// A reply: deliver only to whoever issued `request_id`.
    Response {
        /// Correlation id of the original query.
        request_id: RequestId,
    },
    /// Payload without correlation: echo to sender and broadcast.
    Unsolicited,
    /// Everything else: broadcast to everyone but the sender.
    Broadcast,
}

impl DeliveryMode {
    /// Stable label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Targeted { .. } => "targeted",
            Self::Query { .. } => "query",
            Self::Response { .. } => "response",
            Self::Unsolicited => "unsolicited",
            Self::Broadcast => "broadcast",
        }
    }
}

/// Pick the delivery mode for an envelope. First match wins:
///
/// 1. non-empty `socketId` → [`DeliveryMode::Targeted`]
/// 2. non-empty `action` → [`DeliveryMode::Query`]
/// 3. `requestId` plus a payload → [`DeliveryMode::Response`]
/// 4. a payload without `requestId` → [`DeliveryMode::Unsolicited`]
/// 5. otherwise → [`DeliveryMode::Broadcast`]
pub fn classify(envelope: &Envelope) -> DeliveryMode {
    if let Some(target) = envelope.socket_id() {
        return DeliveryMode::Targeted {
            socket_id: ConnectionId::from(target),
        };
    }

    if envelope.action().is_some() {
        return DeliveryMode::Query {
            request_id: envelope.request_id().map(RequestId::from),
        };
    }

    if envelope.has_payload() {
        return match envelope.request_id() {
            Some(id) => DeliveryMode::Response {
                request_id: RequestId::from(id),
            },
            None => DeliveryMode::Unsolicited,
        };
    }

    DeliveryMode::Broadcast
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::{Value, json};

    fn classify_json(value: Value) -> DeliveryMode {
        classify(&Envelope::from_value(value).unwrap())
    }

    #[test]
    fn socket_id_targets() {
        let mode = classify_json(json!({"socketId": "conn_1", "foo": "bar"}));
        assert_matches!(mode, DeliveryMode::Targeted { socket_id } if socket_id.as_str() == "conn_1");
    }

    #[test]
    fn socket_id_beats_action() {
        let mode = classify_json(json!({"socketId": "conn_1", "action": "getSerialData"}));
        assert_matches!(mode, DeliveryMode::Targeted { .. });
    }

    #[test]
    fn socket_id_beats_response() {
        let mode = classify_json(json!({"socketId": "c", "requestId": "x", "serialData": 1}));
        assert_matches!(mode, DeliveryMode::Targeted { .. });
    }

    #[test]
    fn empty_socket_id_is_ignored() {
        let mode = classify_json(json!({"socketId": "", "foo": 1}));
        assert_eq!(mode, DeliveryMode::Broadcast);
    }

    #[test]
    fn action_with_request_id_is_query() {
        let mode = classify_json(json!({"action": "getCurrentTheme", "requestId": "r1"}));
        assert_eq!(
            mode,
            DeliveryMode::Query {
                request_id: Some(RequestId::from("r1"))
            }
        );
    }

    #[test]
    fn action_without_request_id_is_uncorrelated_query() {
        let mode = classify_json(json!({"action": "getCurrentApp"}));
        assert_eq!(mode, DeliveryMode::Query { request_id: None });
    }

    #[test]
    fn unknown_action_is_still_query() {
        let mode = classify_json(json!({"action": "reboot"}));
        assert_matches!(mode, DeliveryMode::Query { .. });
    }

    #[test]
    fn action_beats_payload() {
        let mode = classify_json(json!({"action": "getSerialData", "requestId": "x", "serialData": 5}));
        assert_matches!(mode, DeliveryMode::Query { .. });
    }

    #[test]
    fn request_id_with_serial_data_is_response() {
        let mode = classify_json(json!({"requestId": "x", "serialData": 42}));
        assert_eq!(
            mode,
            DeliveryMode::Response {
                request_id: RequestId::from("x")
            }
        );
    }

    #[test]
    fn request_id_with_screenshot_data_is_response() {
        let mode = classify_json(json!({"requestId": "x", "screenshotData": "base64"}));
        assert_matches!(mode, DeliveryMode::Response { .. });
    }

    #[test]
    fn payload_without_request_id_is_unsolicited() {
        assert_eq!(
            classify_json(json!({"serialData": [1, 2, 3]})),
            DeliveryMode::Unsolicited
        );
        assert_eq!(
            classify_json(json!({"screenshotData": null})),
            DeliveryMode::Unsolicited
        );
    }

    #[test]
    fn non_string_request_id_with_payload_is_unsolicited() {
        assert_eq!(
            classify_json(json!({"requestId": 12, "serialData": 1})),
            DeliveryMode::Unsolicited
        );
    }

    #[test]
    fn request_id_alone_is_broadcast() {
        assert_eq!(classify_json(json!({"requestId": "x"})), DeliveryMode::Broadcast);
    }

    #[test]
    fn plain_envelope_is_broadcast() {
        assert_eq!(classify_json(json!({"apiKey": "k", "foo": "bar"})), DeliveryMode::Broadcast);
        assert_eq!(classify_json(json!({})), DeliveryMode::Broadcast);
    }

    #[test]
    fn labels_are_stable() {
        assert_eq!(DeliveryMode::Broadcast.label(), "broadcast");
        assert_eq!(DeliveryMode::Unsolicited.label(), "unsolicited");
        assert_eq!(DeliveryMode::Query { request_id: None }.label(), "query");
        assert_eq!(
            DeliveryMode::Response {
                request_id: RequestId::from("x")
            }
            .label(),
            "response"
        );
        assert_eq!(
            DeliveryMode::Targeted {
                socket_id: ConnectionId::from("c")
            }
            .label(),
            "targeted"
        );
    }
}
