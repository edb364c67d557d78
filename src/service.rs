//! Top-level service lifecycle (§6): load config, build the downstream
//! graph, bind the listeners it names, run until SIGINT/SIGTERM, then tear
//! everything down in reverse order. Mirrors `Service/Resolver.py`'s
//! `Start`.

use std::path::Path;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{Builder, Config};
use crate::server::tcp::TcpServer;
use crate::server::udp::UdpServer;

pub async fn run(config_path: &Path) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(config_path)
        .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", config_path.display()))?;
    let config: Config = serde_json::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {e}", config_path.display()))?;

    init_logging(&config.logger);
    info!("starting resolver service");

    let mut builder = Builder::new();
    for item in &config.downstream.items {
        builder.apply_downstream_item(item).map_err(|e| anyhow::anyhow!("downstream item failed: {e}"))?;
    }

    let mut udp_servers = Vec::new();
    let mut tcp_servers = Vec::new();
    for item in &config.server.items {
        let (ip, port, handler) = builder
            .resolve_server_downstream(item)
            .map_err(|e| anyhow::anyhow!("server item failed: {e}"))?;
        match item.module.as_str() {
            "Server.UDP" => {
                info!(%ip, port, "binding UDP listener");
                udp_servers.push(UdpServer::bind(ip, port, handler as Arc<dyn crate::handler::Handler>).await?);
            }
            "Server.TCP" => {
                info!(%ip, port, "binding TCP listener");
                tcp_servers.push(TcpServer::bind(ip, port, handler as Arc<dyn crate::handler::Handler>).await?);
            }
            other => return Err(anyhow::anyhow!("unrecognized server module path \"{other}\"")),
        }
    }

    wait_for_shutdown_signal().await;

    info!("shutting down");
    for server in udp_servers {
        server.terminate().await;
    }
    for server in tcp_servers {
        server.terminate().await;
    }
    builder.collection.terminate().await;

    info!("resolver service terminated");
    Ok(())
}

fn init_logging(logger: &crate::config::LoggerConfig) {
    let filter = EnvFilter::try_new(&logger.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let file = logger.file.as_ref().and_then(|path| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| eprintln!("warning: failed to open log file {path}: {e}"))
            .ok()
    });

    match file {
        Some(file) => {
            let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::sync::Mutex::new(file)).try_init();
        }
        None if logger.console => {
            let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
        }
        None => {
            let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::sink).try_init();
        }
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = sigint.recv() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
