//! Server binary: builds the registry (with PostgreSQL when DATABASE_URL is
//! set), resumes the last persisted schema, and serves the router.

use protean_sdk::{app_router, persist, AppState, PgStore, SchemaRegistry};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("protean_sdk=info".parse()?))
        .init();

    let postgres = match std::env::var("DATABASE_URL") {
        Ok(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(5)
                .connect_lazy(&url)?;
            Some(Arc::new(PgStore::new(pool)))
        }
        Err(_) => {
            tracing::warn!("DATABASE_URL not set, running on the in-process store only");
            None
        }
    };

    let registry = SchemaRegistry::new(postgres.clone());

    // Resume the last accepted schema, if one was persisted and the database
    // is up. Failure here is not fatal: the registry starts empty.
    if let Some(pg) = &postgres {
        match persist::load_document(pg.pool()).await {
            Ok(Some(document)) => match registry.submit(document).await {
                Ok(outcome) => tracing::info!(entities = outcome.entities.len(), "resumed persisted schema"),
                Err(e) => tracing::warn!(error = %e, "persisted schema no longer compiles"),
            },
            Ok(None) => tracing::info!("no persisted schema found"),
            Err(e) => tracing::warn!(error = %e, "could not load persisted schema"),
        }
    }

    let app = app_router(AppState::new(registry));

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".into());
    let listener = TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
