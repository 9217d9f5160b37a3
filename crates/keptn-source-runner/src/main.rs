//! Minimal host for the Keptn source: starts one stream session and prints
//! every message until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use keptn_source::observability::init_observability;
use keptn_source::prelude::*;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "keptn-source-runner", version, about = "Stream Keptn events to stdout")]
struct Cli {
    /// Raw JSON config fragment; may be repeated, later fragments win.
    #[arg(long = "config-json", value_name = "JSON")]
    config_json: Vec<String>,
    /// Keptn API endpoint.
    #[arg(long, env = "KEPTN_URL")]
    url: Option<String>,
    /// Keptn API token.
    #[arg(long, env = "KEPTN_TOKEN", hide_env_values = true)]
    token: Option<String>,
    /// Keptn project.
    #[arg(long, env = "KEPTN_PROJECT")]
    project: Option<String>,
    /// Keptn service.
    #[arg(long, env = "KEPTN_SERVICE")]
    service: Option<String>,
    /// Seconds between polls.
    #[arg(long, env = "KEPTN_POLL_INTERVAL_SECS", default_value_t = 5)]
    interval_secs: u64,
    /// Capacity of the event hand-off channel.
    #[arg(long, env = "KEPTN_BUFFER", default_value_t = 1)]
    buffer: usize,
    /// Print the source metadata and exit.
    #[arg(long)]
    metadata: bool,
}

impl Cli {
    fn fragments(&self) -> Result<Vec<ConfigFragment>, serde_json::Error> {
        let mut fragments = self
            .config_json
            .iter()
            .map(|raw| ConfigFragment::from_json_str(raw))
            .collect::<Result<Vec<_>, _>>()?;

        let mut flags = serde_json::Map::new();
        for (key, value) in [
            ("url", &self.url),
            ("token", &self.token),
            ("project", &self.project),
            ("service", &self.service),
        ] {
            if let Some(value) = value {
                flags.insert(key.to_string(), serde_json::Value::String(value.clone()));
            }
        }
        fragments.push(ConfigFragment::new(serde_json::Value::Object(flags)));
        Ok(fragments)
    }

    fn options(&self) -> StreamOptions {
        StreamOptions::default()
            .poll_interval(Duration::from_secs(self.interval_secs))
            .buffer_capacity(self.buffer)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_observability();
    let cli = Cli::parse();

    let registry = SourceRegistry::builder()
        .register(Arc::new(KeptnSource::new(env!("CARGO_PKG_VERSION"))))
        .build()?;
    let source = registry.get(keptn_source::metadata::PLUGIN_NAME)?;

    if cli.metadata {
        println!("{}", serde_json::to_string_pretty(&source.metadata())?);
        return Ok(());
    }

    let input = StreamInput::new(cli.fragments()?).options(cli.options());
    let mut stream = match source.stream(input).await {
        Ok(stream) => stream,
        Err(err) => {
            error!(
                event = "runner.stream_start_failed",
                error = %err,
                "failed to start Keptn stream"
            );
            return Err(err.into());
        }
    };
    info!(
        event = "runner.stream_started",
        session_id = %stream.session_id(),
        "streaming Keptn events"
    );

    let abort = stream.abort_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!(event = "runner.shutdown_requested", "Ctrl-C received, stopping");
            abort.abort();
        }
    });

    while let Some(event) = stream.next_event().await {
        for section in &event.message.sections {
            println!("{}", section.header);
            if !section.body.plaintext.is_empty() {
                print!("{}", section.body.plaintext);
            }
        }
        println!();
    }

    stream.finish().await;
    Ok(())
}
