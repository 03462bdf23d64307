//! GraphMail - send and collect Microsoft 365 mail over a small HTTP API

use anyhow::Context;
use graphmail_auth::{OAuth2TokenClient, SystemClock, TokenManager, TokenStore};
use graphmail_core::{
    create_scheduler_channel, Database, MailService, RetrievalScheduler, SchedulerCommand,
    Settings,
};
use graphmail_graph::GraphMailClient;
use graphmail_server::{router, AppState};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("graphmail=debug,info")),
        )
        .init();

    info!("Starting GraphMail");

    let settings = Settings::from_env().context("loading settings")?;
    let database = Arc::new(
        Database::open(&settings.database_path)
            .await
            .context("opening database")?,
    );

    let endpoint = Arc::new(OAuth2TokenClient::new(settings.oauth.clone())?);
    let store = TokenStore::new(Arc::new(SystemClock))
        .with_expiry_margin(settings.token_expiry_margin_secs);
    let tokens = Arc::new(TokenManager::new(endpoint, store));
    info!(
        "Authorize the application at {}",
        tokens.authorization_url()
    );

    let graph = GraphMailClient::with_endpoints(tokens.clone(), settings.graph.clone());
    let mail = Arc::new(MailService::new(graph, database));

    let (scheduler_tx, scheduler_rx) = create_scheduler_channel();
    let scheduler = RetrievalScheduler::new(mail.clone(), settings.retrieval_interval, scheduler_rx);
    let scheduler_task = tokio::spawn(scheduler.run());

    let app = router(AppState::new(tokens, mail).with_scheduler(scheduler_tx.clone()));
    let listener = TcpListener::bind(settings.bind_address())
        .await
        .with_context(|| format!("binding {}", settings.bind_address()))?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if scheduler_tx.send(SchedulerCommand::Shutdown).await.is_err() {
        error!("Retrieval scheduler already stopped");
    }
    scheduler_task.await?;

    info!("GraphMail stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
