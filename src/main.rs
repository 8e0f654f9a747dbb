//! hostsdns-rust - answers A queries from a hosts file

pub mod config;
pub mod dns_server;
pub mod error;
pub mod hosts;
pub mod message;
pub mod metrics;
pub mod name;
pub mod query;
pub mod reload;
pub mod table;
pub mod types;

use anyhow::Result;
use arc_swap::ArcSwap;
use chrono::Local;
use clap::Parser;
use rolling_file::{RollingConditionBasic, RollingFileAppender};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Log timestamps in local time rather than UTC
struct LocalTimer;
impl fmt::time::FormatTime for LocalTimer {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

#[derive(Parser, Debug)]
#[command(name = "hostsdns-rust")]
#[command(about = "Answers DNS A queries from a hosts file", long_about = None)]
struct Args {
    /// Optional Corefile-style server block; overrides the flags below
    #[arg(short, long)]
    config: Option<String>,

    #[arg(long, default_value = "0.0.0.0:53")]
    address: SocketAddr,

    #[arg(long, default_value = "/etc/hosts")]
    hosts: String,

    #[arg(long, default_value = "logs")]
    log_dir: String,
}

fn main() -> Result<()> {
    // Queries are handled strictly one after another, so one thread is enough.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .thread_name("hostsdns")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    let args = Args::parse();

    std::fs::create_dir_all(&args.log_dir).unwrap_or_default();
    let file_appender = RollingFileAppender::new(
        format!("{}/hostsdns.log", args.log_dir),
        RollingConditionBasic::new().daily(),
        30,
    )?;
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false).with_timer(LocalTimer))
        .with(fmt::layer().with_writer(std::io::stdout).with_timer(LocalTimer))
        .init();

    info!("Starting hostsdns-rust version {}", env!("CARGO_PKG_VERSION"));

    let base = config::Config::new(args.address, &args.hosts);
    let cfg = match &args.config {
        Some(path) => {
            let abs_path = std::fs::canonicalize(path)
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| path.clone());
            info!(">>> Using configuration file: {}", abs_path);
            config::Config::load(&abs_path, base)?
        }
        None => base,
    };

    let initial = hosts::load(&cfg.hosts_path)?;
    if initial.table.is_empty() {
        tracing::warn!("No usable entries in {}; every query will get an empty answer", cfg.hosts_path.display());
    }
    metrics::TABLE_ENTRIES.set(initial.table.len() as f64);
    let table = Arc::new(ArcSwap::from_pointee(initial.table));

    let _watcher = cfg
        .reload
        .clone()
        .map(|rc| reload::spawn_watcher(cfg.hosts_path.clone(), rc, table.clone(), initial.digest));

    if let Some(addr) = cfg.metrics_addr.clone() {
        tokio::spawn(async move {
            if let Err(e) = metrics::serve(addr).await {
                tracing::error!("{}", e);
            }
        });
    }

    let server = dns_server::DnsServer::bind(cfg.listen, table, cfg.log_queries).await?;
    server
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}
