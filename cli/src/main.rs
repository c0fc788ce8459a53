//! Lookout CLI
//!
//! Command-line interface for interacting with a Lookout API server and
//! its log sink.
//!
//! # Usage
//!
//! ```bash
//! lookout --help
//! lookout health
//! lookout scrape
//! lookout push --sink-host grafana-alloy.railway.internal --level warn \
//!     --message "Disk almost full" --attr disk=/dev/sda1 --attr used_pct=93
//! ```

#![deny(unsafe_code)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lookout_shared::config::SinkEndpoint;
use lookout_shared::models::{AttributeValue, Attributes, Event, Level};
use lookout_shared::push::{PushContext, PushRequest};
use lookout_shared::sink::LogSinkClient;
use std::time::Duration;

/// Lookout CLI - telemetry pipeline command-line interface
#[derive(Parser)]
#[command(name = "lookout")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// API server URL
    #[arg(
        short,
        long,
        env = "LOOKOUT_API_URL",
        default_value = "http://localhost:8080"
    )]
    api_url: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check API server health
    Health,
    /// Print the API server's metrics exposition
    Scrape,
    /// Send one event straight to a log sink
    Push {
        /// Sink host; port 3100 and the push path are appended
        #[arg(long, env = "GRAFANA_ALLOY_HOST")]
        sink_host: String,
        /// Event level (debug, info, warn, error)
        #[arg(short, long, default_value = "info")]
        level: Level,
        /// Event message
        #[arg(short, long)]
        message: String,
        /// Extra attribute as key=value; repeatable
        #[arg(long = "attr", value_parser = parse_attribute)]
        attributes: Vec<(String, AttributeValue)>,
        /// Value of the `app` stream label
        #[arg(long, default_value = "lookout-cli")]
        app: String,
        /// Value of the `service` stream label
        #[arg(long, default_value = "lookout")]
        service: String,
        /// Value of the `environment` field
        #[arg(long, default_value = "development")]
        environment: String,
        /// Push timeout in milliseconds
        #[arg(long, default_value_t = 5000)]
        timeout_ms: u64,
    },
}

/// Parses `key=value`, typing the value as integer, float, bool or string.
fn parse_attribute(raw: &str) -> Result<(String, AttributeValue), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty attribute key in '{raw}'"));
    }

    let value = if let Ok(i) = value.parse::<i64>() {
        AttributeValue::Int(i)
    } else if let Ok(f) = value.parse::<f64>() {
        AttributeValue::Float(f)
    } else if let Ok(b) = value.parse::<bool>() {
        AttributeValue::Bool(b)
    } else {
        AttributeValue::String(value.to_string())
    };
    Ok((key.to_string(), value))
}

async fn fetch(api_url: &str, path: &str) -> Result<String> {
    let url = format!("{}{path}", api_url.trim_end_matches('/'));
    let response = reqwest::get(&url)
        .await
        .with_context(|| format!("Failed to reach {url}"))?;
    let status = response.status();
    let body = response.text().await?;
    anyhow::ensure!(status.is_success(), "{url} returned {status}: {body}");
    Ok(body)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Health) => {
            let body = fetch(&cli.api_url, "/health").await?;
            let health: serde_json::Value =
                serde_json::from_str(&body).context("Health response is not JSON")?;
            println!("{}", serde_json::to_string_pretty(&health)?);
        }
        Some(Commands::Scrape) => {
            print!("{}", fetch(&cli.api_url, "/metrics").await?);
        }
        Some(Commands::Push {
            sink_host,
            level,
            message,
            attributes,
            app,
            service,
            environment,
            timeout_ms,
        }) => {
            let endpoint = SinkEndpoint::from_host(&sink_host)?
                .with_timeout(Duration::from_millis(timeout_ms))?;
            let event = Event::new(level, message)?
                .with_attributes(attributes.into_iter().collect::<Attributes>());
            let request = PushRequest::from_events(
                &PushContext::new(app, service, environment),
                [&event],
            );

            let url = endpoint.push_url();
            LogSinkClient::new(endpoint)?
                .push(&request)
                .await
                .with_context(|| format!("Push to {url} failed"))?;
            println!("Pushed 1 {level} event to {url}");
        }
        None => {
            println!("Lookout CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for usage information");
        }
    }

    Ok(())
}
