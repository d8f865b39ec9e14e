//! Generic twin host.
//!
//! Builds one JSON record store per configured resource, an optional webhook
//! dispatcher, and serves the admin API until Ctrl-C.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};
use twinkit::admin_api::AdminApiServer;
use twinkit::config::Config;
use twinkit::{Dispatcher, RecordStore, SimClock, SleepMode, Twin};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "twinkit")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(short, long, env = "TWINKIT_CONFIG")]
    config: Option<String>,

    /// Admin API port, overriding the config file
    #[arg(short, long, env = "TWINKIT_PORT")]
    port: Option<u16>,

    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format)?;

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(port) = args.port {
        config.admin.port = port;
    }

    let twin = Arc::new(build_twin(&config)?);
    info!(
        twin = %config.name,
        resources = ?twin.resources(),
        webhooks = twin.dispatcher().is_some(),
        "Twin ready"
    );

    let server = AdminApiServer::new(config.admin.socket_addr(), twin);
    tokio::select! {
        result = server.run() => {
            if let Err(e) = &result {
                error!(error = %e, "Admin API failed");
            }
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    Ok(())
}

fn init_tracing(format: LogFormat) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Invalid RUST_LOG environment variable")?;

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(fmt::layer().with_target(true)).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
    Ok(())
}

fn build_twin(config: &Config) -> Result<Twin> {
    let sleep_mode = if config.clock.virtual_sleep {
        SleepMode::Virtual
    } else {
        SleepMode::Real
    };
    let clock = Arc::new(
        SimClock::new()
            .with_sleep_mode(sleep_mode)
            .allow_rewind(config.clock.allow_rewind),
    );

    let mut builder = Twin::builder(config.name.clone()).clock(clock.clone());
    for resource in &config.resources {
        let store: RecordStore<Value> = RecordStore::named(resource.name.clone(), resource.prefix.clone());
        builder = builder.store(resource.name.clone(), Arc::new(store));
    }

    if let Some(webhooks) = &config.webhooks {
        let dispatcher = Dispatcher::builder(webhooks.clone())
            .clock(clock)
            .build()
            .context("Failed to build webhook dispatcher")?;
        builder = builder.dispatcher(dispatcher);
    }

    Ok(builder.build())
}
