//! Keptn event records as returned by the datastore API.

use serde::{Deserialize, Serialize};

/// A single Keptn cloud event.
///
/// String fields missing on the wire decode as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Event {
    pub id: String,
    pub source: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specversion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shkeptncontext: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    pub data: EventData,
}

/// Payload of a Keptn event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventData {
    /// Terminal status (`succeeded`, `errored`, `aborted`). `None` when the
    /// payload carries no status field at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub message: String,
    pub project: String,
    pub stage: String,
    pub service: String,
    pub result: String,
}

/// Anonymized summary attached to every outgoing event for analytics.
///
/// Carries only the event type and status; identifiers, sources, free text
/// and project coordinates are never included.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsLabels {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Event {
    /// Builds the anonymized analytics labels for this event.
    pub fn to_anonymized_labels(&self) -> AnalyticsLabels {
        AnalyticsLabels {
            event_type: self.event_type.clone(),
            status: self.data.status.clone().filter(|s| !s.is_empty()),
        }
    }
}
