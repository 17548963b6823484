//! Typed frames from the event stream

use crate::NotificationEvent;

/// Named event types the server emits on the stream.
pub const EVENT_NOTIFICATION: &str = "notification";
pub const EVENT_HEARTBEAT: &str = "heartbeat";

/// One decoded frame from the event stream, classified by event name
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A `notification` event with a parsed payload
    Notification(NotificationEvent),
    /// A `heartbeat` event; payload, if any, is ignored
    Heartbeat,
    /// A frame whose payload failed to parse; the connection stays open
    Malformed { error: String },
}

impl StreamEvent {
    /// Classify a raw frame by its event name and parse the payload.
    ///
    /// An unnamed frame defaults to `notification`, matching the server's
    /// behavior of omitting the event field on its primary event type.
    pub fn classify(event_name: Option<&str>, data: &str) -> Self {
        match event_name.unwrap_or(EVENT_NOTIFICATION) {
            EVENT_HEARTBEAT => StreamEvent::Heartbeat,
            EVENT_NOTIFICATION => match serde_json::from_str::<NotificationEvent>(data) {
                Ok(event) => StreamEvent::Notification(event),
                Err(e) => StreamEvent::Malformed {
                    error: e.to_string(),
                },
            },
            other => StreamEvent::Malformed {
                error: format!("unrecognized event name: {}", other),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NotificationKind;

    #[test]
    fn classify_notification() {
        let data = r#"{"type":"achievement","title":"Streak","body":"7 days"}"#;
        let event = StreamEvent::classify(Some("notification"), data);

        match event {
            StreamEvent::Notification(n) => assert_eq!(n.kind, NotificationKind::Achievement),
            other => panic!("expected notification, got {:?}", other),
        }
    }

    #[test]
    fn classify_heartbeat_ignores_payload() {
        assert_eq!(StreamEvent::classify(Some("heartbeat"), ""), StreamEvent::Heartbeat);
        assert_eq!(
            StreamEvent::classify(Some("heartbeat"), "whatever"),
            StreamEvent::Heartbeat
        );
    }

    #[test]
    fn malformed_payload_does_not_panic() {
        let event = StreamEvent::classify(Some("notification"), "{nope");
        assert!(matches!(event, StreamEvent::Malformed { .. }));
    }

    #[test]
    fn unnamed_frame_defaults_to_notification() {
        let data = r#"{"type":"system","title":"Maintenance","body":"Tonight"}"#;
        let event = StreamEvent::classify(None, data);
        assert!(matches!(event, StreamEvent::Notification(_)));
    }
}
