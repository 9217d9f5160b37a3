use serde::{Deserialize, Serialize};

use crate::event::{AnalyticsLabels, Event};
use crate::format::format_message;

/// Display message handed to the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sections: Vec<Section>,
}

/// One message section: a header line and a plaintext body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub header: String,
    pub body: Body,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Body {
    pub plaintext: String,
}

/// Outgoing item emitted on the stream channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEvent {
    /// Formatted display message.
    pub message: Message,
    /// The event the message was built from.
    pub raw_object: Event,
    /// Anonymized labels for analytics.
    pub analytics_labels: AnalyticsLabels,
}

impl SourceEvent {
    /// Formats `event` and wraps it together with its analytics labels.
    pub fn from_event(event: Event) -> Self {
        Self {
            message: format_message(&event),
            analytics_labels: event.to_anonymized_labels(),
            raw_object: event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_event_carries_raw_object_and_labels() {
        let event: Event = serde_json::from_str(
            r#"{"id":"e1","type":"sh.keptn.event.approval.triggered","data":{"status":"aborted"}}"#,
        )
        .unwrap();
        let out = SourceEvent::from_event(event.clone());
        assert_eq!(out.raw_object, event);
        assert_eq!(out.analytics_labels.status.as_deref(), Some("aborted"));
        assert_eq!(out.message.sections.len(), 1);
    }
}
