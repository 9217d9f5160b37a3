use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_URL;

/// Registered name of the Keptn source.
pub const PLUGIN_NAME: &str = "keptn";

/// Human-readable description advertised to the host.
pub const DESCRIPTION: &str = "Keptn plugin polls events from configured Keptn API endpoint.";

/// Static identity of a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub version: String,
    pub description: String,
    /// Draft-04 JSON schema describing the accepted configuration keys.
    pub json_schema: serde_json::Value,
}

impl Metadata {
    /// Metadata of the Keptn source for the given plugin version.
    pub fn keptn(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            description: DESCRIPTION.to_string(),
            json_schema: json_schema(),
        }
    }
}

fn json_schema() -> serde_json::Value {
    serde_json::json!({
        "$schema": "http://json-schema.org/draft-04/schema#",
        "title": "Keptn",
        "description": DESCRIPTION,
        "type": "object",
        "properties": {
            "url": {
                "description": "Keptn API endpoint",
                "type": "string",
                "default": DEFAULT_URL
            },
            "token": {
                "description": "Keptn API Token",
                "type": "string"
            },
            "project": {
                "description": "Keptn Project",
                "type": "string"
            },
            "service": {
                "description": "Keptn Service",
                "type": "string"
            }
        },
        "required": []
    })
}
