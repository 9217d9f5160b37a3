//! Host-facing source contract and the Keptn implementation.

use std::sync::Arc;

use tracing::debug;

use crate::client::{EventsApi, KeptnClient};
use crate::config::{Config, ConfigFragment};
use crate::errors::{ApiError, SourceError};
use crate::metadata::{Metadata, PLUGIN_NAME};
use crate::stream::{EventStream, StreamOptions, spawn_poll_loop};

/// Input of a stream-start call.
#[derive(Clone, Debug, Default)]
pub struct StreamInput {
    /// Configuration fragments, merged in order.
    pub configs: Vec<ConfigFragment>,
    /// Poll loop tuning.
    pub options: StreamOptions,
}

impl StreamInput {
    pub fn new(configs: Vec<ConfigFragment>) -> Self {
        Self {
            configs,
            options: StreamOptions::default(),
        }
    }

    pub fn options(mut self, options: StreamOptions) -> Self {
        self.options = options;
        self
    }
}

/// A pluggable event source the host can stream from.
#[async_trait::async_trait]
pub trait Source: Send + Sync {
    /// Registry key of this source.
    fn name(&self) -> &str;

    /// Static identity and configuration schema.
    fn metadata(&self) -> Metadata;

    /// Starts a new independent stream session.
    async fn stream(&self, input: StreamInput) -> Result<EventStream, SourceError>;
}

/// Builds the API client for a merged configuration.
pub trait ClientFactory: Send + Sync {
    fn build(&self, config: &Config) -> Result<Arc<dyn EventsApi>, ApiError>;
}

impl<F> ClientFactory for F
where
    F: Fn(&Config) -> Result<Arc<dyn EventsApi>, ApiError> + Send + Sync,
{
    fn build(&self, config: &Config) -> Result<Arc<dyn EventsApi>, ApiError> {
        self(config)
    }
}

/// Default factory producing [`KeptnClient`]s.
pub struct KeptnClientFactory;

impl ClientFactory for KeptnClientFactory {
    fn build(&self, config: &Config) -> Result<Arc<dyn EventsApi>, ApiError> {
        Ok(Arc::new(KeptnClient::from_config(config)?))
    }
}

/// Source polling a Keptn API.
pub struct KeptnSource {
    version: String,
    factory: Arc<dyn ClientFactory>,
}

impl KeptnSource {
    /// Creates a source using the HTTP client.
    pub fn new(version: impl Into<String>) -> Self {
        Self::with_client_factory(version, Arc::new(KeptnClientFactory))
    }

    /// Creates a source with a custom client factory.
    pub fn with_client_factory(
        version: impl Into<String>,
        factory: Arc<dyn ClientFactory>,
    ) -> Self {
        Self {
            version: version.into(),
            factory,
        }
    }
}

#[async_trait::async_trait]
impl Source for KeptnSource {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn metadata(&self) -> Metadata {
        Metadata::keptn(self.version.clone())
    }

    async fn stream(&self, input: StreamInput) -> Result<EventStream, SourceError> {
        let config = Config::merge(&input.configs)?;
        input.options.validate()?;
        debug!(
            event = "keptn.config_merged",
            url = %config.url,
            project = %config.project,
            has_token = !config.token.is_empty()
        );
        let api = self.factory.build(&config)?;
        spawn_poll_loop(api, config, input.options)
    }
}
