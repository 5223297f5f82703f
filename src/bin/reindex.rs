//! Standalone reindex job: a single-writer batch run of [`IndexerPipeline`],
//! invoked from a scheduler or an operator's shell. Never shares a process
//! with the query service.

use sqlx::postgres::PgPoolOptions;

use catalog_search::config::Config;
use catalog_search::indexer::pipeline::IndexerPipeline;
use catalog_search::infrastructure::db::RelationalStore;
use catalog_search::infrastructure::search_backend::SearchBackend;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rs_common::telemetry::init_tracing("catalog-reindex");

    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;

    let search_backend = SearchBackend::new(&config.search_url, config.bulk_timeout_secs)?;
    let relational = RelationalStore::new(pool);
    let pipeline = IndexerPipeline::new(search_backend, relational, config);

    tokio::select! {
        result = pipeline.run() => {
            match result {
                Ok(report) => {
                    tracing::info!(
                        new_index = %report.new_index,
                        processed = report.processed,
                        skipped = report.skipped,
                        errors = report.errors,
                        retained = ?report.retained_indices,
                        deleted = ?report.deleted_indices,
                        "reindex run completed"
                    );
                    Ok(())
                }
                Err(err) => {
                    tracing::error!(error = %err, "reindex run failed");
                    Err(err.into())
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            pipeline.cleanup_in_progress().await;
            tracing::error!("reindex run interrupted");
            Err(anyhow::anyhow!("reindex interrupted"))
        }
    }
}
