//! Mask engine CLI
//!
//! Classifies a single visit from the command line and prints the decision
//! as JSON. Useful for smoke-testing mask files and pattern tables.

use anyhow::Result;
use clap::Parser;
use maskgate::analytics::MemorySink;
use maskgate::detectors::telemetry::{BehaviorTelemetry, Fingerprint};
use maskgate::{EngineConfig, MaskEngine, RequestInfo, StaticMaskSource};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "maskgate")]
#[command(author, version, about = "Visitor classification and mask policy engine")]
struct Args {
    /// Path to configuration file (JSON or YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the mask definitions file (JSON array)
    #[arg(short, long)]
    masks: PathBuf,

    /// Domain the request was served for
    #[arg(long)]
    domain: String,

    /// Client IP address
    #[arg(long)]
    ip: String,

    /// Client User-Agent header
    #[arg(long, default_value = "")]
    user_agent: String,

    /// Client Accept-Language header
    #[arg(long, default_value = "")]
    accept_language: String,

    /// Optional client fingerprint payload (JSON)
    #[arg(long)]
    fingerprint: Option<String>,

    /// Optional behavioral telemetry payload (JSON)
    #[arg(long)]
    behavior: Option<String>,

    /// Enable JSON logging format
    #[arg(long)]
    json_logs: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_logging(json: bool, level: &str) {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let env_filter = EnvFilter::from_default_env().add_directive(level.into());

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.json_logs, &args.log_level);

    let config = match &args.config {
        Some(path) => EngineConfig::from_path(path)?,
        None => EngineConfig::default(),
    };

    let masks = Arc::new(StaticMaskSource::from_path(&args.masks)?);
    info!(masks = masks.len(), "loaded mask definitions");

    let sink = Arc::new(MemorySink::new());
    let engine = MaskEngine::new(config, masks, sink)?;

    let request = RequestInfo {
        domain: args.domain,
        ip: args.ip,
        user_agent: args.user_agent,
        accept_language: args.accept_language,
    };

    match engine.process(&request).await {
        Some(decision) => println!("{}", serde_json::to_string_pretty(&decision)?),
        None => println!("{{\"mask\": null}}"),
    }

    let fingerprint = args.fingerprint.as_deref().and_then(Fingerprint::from_json);
    let behavior = args.behavior.as_deref().and_then(BehaviorTelemetry::from_json);

    if fingerprint.is_some() || behavior.is_some() {
        let report = engine
            .analyze_telemetry(&request, fingerprint.as_ref(), behavior.as_ref())
            .await;
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}
