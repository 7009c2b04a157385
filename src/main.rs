use std::sync::Arc;

use anyhow::Context;

use declarest::app::{build_router, AppContext};
use declarest::config::AppConfig;
use declarest::email::LogMailer;
use declarest::model::ModelRegistry;
use declarest::store::MemoryStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let config = AppConfig::from_env()?;

    let source = std::fs::read_to_string(&config.models_path)
        .with_context(|| format!("failed to read model file {}", config.models_path))?;
    let registry = ModelRegistry::from_yaml(&source)?;

    let ctx = AppContext {
        store: Arc::new(MemoryStore::new()),
        mailer: Arc::new(LogMailer::new(config.email())),
        config: Arc::new(config),
    };

    let bind_addr = format!("0.0.0.0:{}", ctx.config.port);
    let app = build_router(ctx, &registry);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("listening on http://{}", bind_addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
