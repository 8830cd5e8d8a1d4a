use crate::config::Config;
use crate::pipeline::{Aggregator, Dispatcher};
use crate::server::HttpServer;

use anyhow::Context;
use detection_engine::{DetectionInvoker, OrtDetectionEngine};
use std::sync::Arc;
use tokio::{signal, sync::broadcast};

/// Builds the process-wide engine and the dispatcher that shares it.
pub fn build_dispatcher(config: &Config) -> anyhow::Result<Dispatcher> {
    let engine = match OrtDetectionEngine::new(&config.engine) {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!("Failed to initialize detection engine: {:?}", e);
            return Err(e).context("failed to initialize detection engine");
        }
    };
    let device = engine.device();
    let invoker: Arc<dyn DetectionInvoker> = Arc::new(engine);

    Ok(Dispatcher::new(
        invoker,
        Aggregator::new(config.pipeline.malformed_detections),
        device,
    ))
}

pub async fn start_app(config: Config) -> anyhow::Result<()> {
    let dispatcher = Arc::new(build_dispatcher(&config)?);

    let server = HttpServer::new(dispatcher, &config).await?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let server_shutdown_rx = shutdown_tx.subscribe();

    let server_handle = server.run(server_shutdown_rx).await?;

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown.");

    let _ = shutdown_tx.send(());
    server_handle.await??;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
