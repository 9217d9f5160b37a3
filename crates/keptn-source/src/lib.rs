//! Keptn event source: polls a Keptn API for recent events and republishes
//! them as formatted notification messages.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use keptn_source::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), SourceError> {
//! let registry = SourceRegistry::builder()
//!     .register(Arc::new(KeptnSource::new("dev")))
//!     .build()?;
//!
//! let mut stream = registry
//!     .get("keptn")?
//!     .stream(StreamInput::new(vec![ConfigFragment::new(serde_json::json!({
//!         "url": "http://localhost:8080/api",
//!         "project": "sockshop",
//!     }))]))
//!     .await?;
//!
//! while let Some(event) = stream.next_event().await {
//!     println!("{}", event.message.sections[0].header);
//! }
//! # Ok(())
//! # }
//! ```

/// Keptn API client and the `EventsApi` abstraction.
pub mod client;
/// Effective configuration and fragment merging.
pub mod config;
/// Public error types.
pub mod errors;
/// Keptn event records and analytics labels.
pub mod event;
/// Event-to-message formatting.
pub mod format;
/// Outgoing message types.
pub mod message;
/// Static source metadata and configuration schema.
pub mod metadata;
/// Process-wide logging setup.
pub mod observability;
/// Common imports for typical usage.
pub mod prelude;
/// Name-keyed source registry.
pub mod registry;
/// Source contract and the Keptn implementation.
pub mod source;
/// Poll loop and stream handle.
pub mod stream;

pub use client::{EventsApi, EventsRequest, KeptnClient};
pub use config::{Config, ConfigFragment};
pub use errors::{ApiError, ConfigError, SourceError};
pub use event::{AnalyticsLabels, Event, EventData};
pub use format::{emoji_for_status, format_message};
pub use message::{Body, Message, Section, SourceEvent};
pub use metadata::Metadata;
pub use registry::{SourceRegistry, SourceRegistryBuilder};
pub use source::{ClientFactory, KeptnClientFactory, KeptnSource, Source, StreamInput};
pub use stream::{AbortHandle, EventStream, StreamOptions, spawn_poll_loop};
