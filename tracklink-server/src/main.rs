#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tracklink_server::bus::{KafkaBusProducer, Publisher};
use tracklink_server::config::{apply_env_overrides, load_from_path};
use tracklink_server::Supervisor;

#[derive(Parser, Debug)]
#[command(author, version, about = "Multi-protocol GPS tracker ingest server")]
struct Cli {
    /// Path to configuration TOML file
    #[arg(short, long, value_name = "FILE", default_value = "config/tracklink.toml")]
    config: PathBuf,

    /// Kafka bootstrap brokers; overrides the config file and KAFKA_BROKER
    #[arg(long, env = "KAFKA_BROKER")]
    kafka_broker: Option<String>,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    let mut cfg = match load_from_path(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(%err, "failed to load configuration");
            std::process::exit(1);
        }
    };
    apply_env_overrides(&mut cfg);
    if let Some(broker) = cli.kafka_broker {
        cfg.kafka_broker = broker;
    }
    info!(kafka_broker = %cfg.kafka_broker, "configuration loaded");

    let producer = match KafkaBusProducer::new(&cfg.kafka_broker) {
        Ok(producer) => producer,
        Err(err) => {
            error!(%err, "failed to construct kafka producer");
            std::process::exit(1);
        }
    };
    let (publisher, _writer_handle) = Publisher::spawn(Arc::new(producer), cfg.publish_channel_capacity);
    let publisher = Arc::new(publisher);

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, shutting down");
            let _ = shutdown_tx.send(true);
        }
    });

    let supervisor = Supervisor::new(cfg, publisher);
    supervisor.run(shutdown_rx).await;
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).with_target(false).init();
}
