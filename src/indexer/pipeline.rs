//! The zero-downtime reindex state machine: PREFLIGHT → CONNECT → ANALYZE →
//! CREATE → POPULATE → VALIDATE → SWAP → RETENT → DONE, with CLEANUP_PARTIAL
//! as the failure sink for anything that goes wrong after CREATE and before
//! a successful SWAP. Invoked as a standalone batch binary (see
//! `src/bin/reindex.rs`), never from the query service's process.

use std::sync::Mutex;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::Config;
use crate::document_builder;
use crate::error::AppError;
use crate::indexer::schema::{embedded_schema, validate_schema};
use crate::infrastructure::db::RelationalStore;
use crate::infrastructure::search_backend::{AliasAction, SearchBackend};

const INDEX_PATTERN: &str = "products_*";
const ALIAS_POLL_ATTEMPTS: u32 = 15;
const ALIAS_POLL_INTERVAL: Duration = Duration::from_secs(2);
const ALIAS_POLL_TIMEOUT: Duration = Duration::from_secs(10);
const SLEEP_EVERY_N_BATCHES: u64 = 50;
const SKIP_LOG_LIMIT_PER_BATCH: u32 = 5;

#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub new_index: String,
    pub processed: i64,
    pub skipped: i64,
    pub errors: i64,
    pub retained_indices: Vec<String>,
    pub deleted_indices: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
struct PopulateStats {
    processed: i64,
    skipped: i64,
    errors: i64,
}

pub struct IndexerPipeline {
    search: SearchBackend,
    relational: RelationalStore,
    config: Config,
    /// Name of the physical index currently being built, if any. Lets an
    /// interrupt handler outside `run` find and clean up an uncommitted
    /// index (see [`IndexerPipeline::cleanup_in_progress`]).
    in_progress: Mutex<Option<String>>,
}

impl IndexerPipeline {
    pub fn new(search: SearchBackend, relational: RelationalStore, config: Config) -> Self {
        Self { search, relational, config, in_progress: Mutex::new(None) }
    }

    /// Best-effort cleanup for a SIGINT/SIGTERM that lands after CREATE but
    /// before SWAP: deletes whatever physical index `run` last recorded as
    /// in progress. A no-op once `run` has passed SWAP or finished.
    pub async fn cleanup_in_progress(&self) {
        let name = self.in_progress.lock().expect("pipeline mutex poisoned").clone();
        if let Some(name) = name {
            warn!(index = %name, "interrupted, cleaning up partial index");
            self.cleanup_partial(&name).await;
            *self.in_progress.lock().expect("pipeline mutex poisoned") = None;
        }
    }

    pub async fn run(&self) -> Result<PipelineReport, AppError> {
        info!("PREFLIGHT: validating embedded schema");
        let schema = self.preflight()?;

        info!("CONNECT: checking cluster health");
        self.connect().await?;

        info!("ANALYZE: inspecting existing indices and catalogue size");
        let (_existing_indices, current_targets, total_products) = self.analyze().await?;
        if total_products == 0 {
            return Err(AppError::FatalIndexer("relational catalogue has zero products".into()));
        }
        info!(total_products, "ANALYZE complete");

        info!("CREATE: provisioning a fresh physical index");
        let new_index = match self.create(&schema).await {
            Ok(name) => name,
            Err(err) => return Err(err),
        };

        let report = match self.populate_and_finish(&new_index, &current_targets).await {
            Ok(report) => report,
            Err(err) => {
                warn!(error = %err, new_index = %new_index, "reindex failed after CREATE, cleaning up partial index");
                self.cleanup_partial(&new_index).await;
                *self.in_progress.lock().expect("pipeline mutex poisoned") = None;
                return Err(err);
            }
        };
        // Past SWAP: the index is live, no longer "in progress" for interrupt cleanup.
        *self.in_progress.lock().expect("pipeline mutex poisoned") = None;

        info!(
            new_index = %report.new_index,
            processed = report.processed,
            skipped = report.skipped,
            errors = report.errors,
            "DONE"
        );
        Ok(report)
    }

    /// Everything from POPULATE through RETENT, factored out so `run` can
    /// route any failure in this range to CLEANUP_PARTIAL.
    async fn populate_and_finish(
        &self,
        new_index: &str,
        current_targets: &[String],
    ) -> Result<PipelineReport, AppError> {
        info!(new_index, "POPULATE: streaming relational rows into the new index");
        let stats = self.populate(new_index).await?;

        info!(new_index, processed = stats.processed, "VALIDATE: confirming document counts");
        self.validate(new_index, stats.processed).await?;

        info!(new_index, "SWAP: repointing the alias");
        self.swap(new_index, current_targets).await?;

        info!("RETENT: pruning old physical indices");
        let (retained, deleted) = self.retent().await;

        Ok(PipelineReport {
            new_index: new_index.to_string(),
            processed: stats.processed,
            skipped: stats.skipped,
            errors: stats.errors,
            retained_indices: retained,
            deleted_indices: deleted,
        })
    }

    fn preflight(&self) -> Result<serde_json::Value, AppError> {
        let schema = embedded_schema();
        validate_schema(&schema).map_err(AppError::FatalIndexer)?;
        Ok(schema)
    }

    async fn connect(&self) -> Result<(), AppError> {
        let health = self.search.cluster_health(None, ALIAS_POLL_TIMEOUT).await?;
        if !health.status.is_usable() {
            return Err(AppError::FatalIndexer(format!(
                "cluster health is {:?}, refusing to start a reindex",
                health.status
            )));
        }
        Ok(())
    }

    async fn analyze(&self) -> Result<(Vec<String>, Vec<String>, i64), AppError> {
        let existing = self.search.list_indices(INDEX_PATTERN).await?;
        let current_targets = self.search.get_alias(&self.config.search_index_alias).await?;
        let total = self.relational.total_products().await?;
        Ok((existing, current_targets, total))
    }

    async fn create(&self, schema: &serde_json::Value) -> Result<String, AppError> {
        let name = format!("products_{}", chrono::Utc::now().format("%Y_%m_%d_%H_%M_%S"));

        if self.search.index_exists(&name).await? {
            warn!(index = %name, "index name collision, deleting before recreate");
            self.search.delete_index(&name).await?;
        }

        validate_schema(schema).map_err(AppError::FatalIndexer)?;
        self.search.create_index(&name, schema.clone()).await?;
        *self.in_progress.lock().expect("pipeline mutex poisoned") = Some(name.clone());

        for attempt in 1..=ALIAS_POLL_ATTEMPTS {
            let health = self.search.cluster_health(Some(&name), ALIAS_POLL_TIMEOUT).await?;
            if health.status.is_usable() {
                return Ok(name);
            }
            warn!(index = %name, attempt, status = ?health.status, "waiting for new index to turn yellow/green");
            tokio::time::sleep(ALIAS_POLL_INTERVAL).await;
        }

        Err(AppError::FatalIndexer(format!(
            "index {name} never reached yellow/green after {ALIAS_POLL_ATTEMPTS} attempts"
        )))
    }

    async fn populate(&self, index: &str) -> Result<PopulateStats, AppError> {
        let mut stats = PopulateStats::default();
        let mut offset = 0i64;
        let mut batch_number = 0u64;

        loop {
            let rows = self.relational.stream_page(offset, self.config.batch_size).await?;
            if rows.is_empty() {
                break;
            }

            let mut docs = Vec::with_capacity(rows.len());
            let mut batch_skips = 0u32;
            for row in rows {
                match document_builder::build(row) {
                    Ok(doc) => docs.push(doc),
                    Err(reason) => {
                        stats.skipped += 1;
                        batch_skips += 1;
                        if batch_skips <= SKIP_LOG_LIMIT_PER_BATCH {
                            tracing::debug!(reason = %reason, "skipping row during POPULATE");
                        }
                    }
                }
            }
            if batch_skips > SKIP_LOG_LIMIT_PER_BATCH {
                tracing::debug!(
                    suppressed = batch_skips - SKIP_LOG_LIMIT_PER_BATCH,
                    "further POPULATE skips in this batch suppressed"
                );
            }

            let bulk_result = self.search.bulk(index, &docs).await?;
            stats.processed += bulk_result.indexed_count as i64;
            stats.errors += bulk_result.item_errors.len() as i64;
            for item_error in &bulk_result.item_errors {
                warn!(doc_id = %item_error.id, reason = %item_error.reason, "bulk item error during POPULATE");
            }

            offset += self.config.batch_size;
            batch_number += 1;
            if batch_number % SLEEP_EVERY_N_BATCHES == 0 {
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }

        Ok(stats)
    }

    async fn validate(&self, index: &str, processed: i64) -> Result<(), AppError> {
        self.search.refresh(index).await?;
        let doc_count = self.search.doc_count(index).await?;
        if (doc_count - processed).abs() > self.config.doc_count_tolerance {
            return Err(AppError::FatalIndexer(format!(
                "doc count {doc_count} diverges from processed {processed} beyond tolerance {}",
                self.config.doc_count_tolerance
            )));
        }

        let probe = self
            .search
            .search(index, serde_json::json!({ "size": 5, "query": { "match_all": {} } }))
            .await?;
        if probe.total < 1 {
            return Err(AppError::FatalIndexer("match_all probe returned zero hits".into()));
        }
        Ok(())
    }

    async fn swap(&self, new_index: &str, current_targets: &[String]) -> Result<(), AppError> {
        let mut actions: Vec<AliasAction> = current_targets
            .iter()
            .filter(|target| target.as_str() != new_index)
            .map(|target| AliasAction::Remove {
                index: target.clone(),
                alias: self.config.search_index_alias.clone(),
            })
            .collect();
        actions.push(AliasAction::Add {
            index: new_index.to_string(),
            alias: self.config.search_index_alias.clone(),
        });
        self.search.update_aliases(&actions).await
    }

    /// Best-effort: RETENT failures are logged, never fatal.
    async fn retent(&self) -> (Vec<String>, Vec<String>) {
        let mut indices = match self.search.list_indices(INDEX_PATTERN).await {
            Ok(list) => list,
            Err(err) => {
                warn!(error = %err, "RETENT: failed to list indices, skipping pruning");
                return (Vec::new(), Vec::new());
            }
        };
        indices.sort_by(|a, b| b.cmp(a));
        let keep_count = self.config.max_old_indices + 1;
        let retained: Vec<String> = indices.iter().take(keep_count).cloned().collect();
        let to_delete: Vec<String> = indices.into_iter().skip(keep_count).collect();

        let mut deleted = Vec::new();
        for name in to_delete {
            match self.search.delete_index(&name).await {
                Ok(()) => deleted.push(name),
                Err(err) => warn!(error = %err, index = %name, "RETENT: failed to delete stale index"),
            }
        }
        (retained, deleted)
    }

    async fn cleanup_partial(&self, new_index: &str) {
        if let Err(err) = self.search.delete_index(new_index).await {
            warn!(error = %err, index = %new_index, "CLEANUP_PARTIAL: failed to delete partial index");
        }
    }
}

#[cfg(test)]
mod tests {
    /// `retent`'s keep/delete split is exercised directly here since it is
    /// pure list arithmetic once indices are sorted lexicographically
    /// descending; the surrounding `IndexerPipeline` method only adds the
    /// backend calls around it.
    fn split(mut indices: Vec<&str>, max_old: usize) -> (Vec<String>, Vec<String>) {
        indices.sort_by(|a, b| b.cmp(a));
        let keep_count = max_old + 1;
        let retained = indices.iter().take(keep_count).map(|s| s.to_string()).collect();
        let deleted = indices.into_iter().skip(keep_count).map(|s| s.to_string()).collect();
        (retained, deleted)
    }

    #[test]
    fn retention_keeps_newest_lexicographic_names() {
        let indices = vec![
            "products_2024_01_01_00_00_00",
            "products_2024_03_01_00_00_00",
            "products_2024_02_01_00_00_00",
        ];
        let (retained, deleted) = split(indices, 1);
        assert_eq!(retained, vec!["products_2024_03_01_00_00_00", "products_2024_02_01_00_00_00"]);
        assert_eq!(deleted, vec!["products_2024_01_01_00_00_00"]);
    }

    #[test]
    fn retention_deletes_nothing_when_under_the_limit() {
        let indices = vec!["products_2024_01_01_00_00_00"];
        let (retained, deleted) = split(indices, 2);
        assert_eq!(retained.len(), 1);
        assert!(deleted.is_empty());
    }
}
