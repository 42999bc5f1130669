//! HTTP API server command

use super::helpers::open_service;
use anyhow::Context;
use feedback_core::{
    api::{server::BANNER, ApiServer, ApiServerConfig},
    FeedbackConfig,
};
use std::net::SocketAddr;
use tracing::{info, warn};

/// Serve the API until Ctrl-C, then close the store
pub async fn handle(config: FeedbackConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = config
        .server
        .addr
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid address '{}': {}", config.server.addr, e))?;

    let service = open_service(&config).await?;

    println!();
    println!("{}", BANNER);
    println!();
    println!("   Address: http://{}", addr);
    println!("   Collection: {}", config.store.table_name());
    println!("   Sentiment service: {}", config.sentiment.base_url);
    println!();
    println!("   Endpoints:");
    println!("   - GET    /feedbacks");
    println!("   - POST   /feedbacks");
    println!("   - PUT    /feedbacks/:id");
    println!("   - DELETE /feedbacks/:id");
    println!("   - POST   /feedbacks/upload");
    println!("   - POST   /feedbacks/:id/analyze");
    println!("   - POST   /feedbacks/analyze-all");
    println!("   - GET    /feedbacks/average-score");
    println!("   - GET    /health");
    println!();

    let server = ApiServer::new(ApiServerConfig { addr }, service.clone());
    let result = server
        .serve(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Shutdown signal received"),
                Err(e) => {
                    // Without a signal handler, run until the process is killed
                    warn!("Failed to listen for shutdown signal: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        })
        .await
        .context("API server failed");

    if let Err(e) = service.close().await {
        warn!("Failed to close store: {}", e);
    }

    result
}
