use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;

use catalog_search::config::Config;
use catalog_search::infrastructure::db::RelationalStore;
use catalog_search::infrastructure::health_gate::HealthGate;
use catalog_search::infrastructure::search_backend::SearchBackend;
use catalog_search::query::dynamic_data::NoopDynamicDataProvider;
use catalog_search::query::service::QueryService;
use catalog_search::{http, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rs_common::telemetry::init_tracing("catalog-search");

    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!().run(&pool).await?;

    let search_backend = SearchBackend::new(&config.search_url, config.bulk_timeout_secs)?;
    let relational = RelationalStore::new(pool);
    let health_gate = HealthGate::new(Duration::from_secs(config.health_timeout_secs));
    let dynamic_data = Arc::new(NoopDynamicDataProvider);

    let query_service = Arc::new(QueryService::new(
        relational,
        search_backend,
        health_gate,
        dynamic_data,
        config.clone(),
    ));

    let app = http::router(AppState { query_service });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
