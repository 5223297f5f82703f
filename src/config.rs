//! Process-wide configuration, assembled once at startup from the environment.
//!
//! Mirrors the teacher stack's small typed `env_*` helpers (`rs_common::env`)
//! rather than re-parsing `std::env::var` ad hoc at each call site.

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub search_url: String,
    pub search_index_alias: String,
    pub batch_size: i64,
    pub max_old_indices: usize,
    pub health_timeout_secs: u64,
    pub search_timeout_secs: u64,
    pub bulk_timeout_secs: u64,
    pub rescore_window: u32,
    pub max_product_ids_per_batch: usize,
    pub q_length_cap: usize,
    pub doc_count_tolerance: i64,
    pub bind_addr: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL is required"))?,
            search_url: std::env::var("SEARCH_URL")
                .map_err(|_| anyhow::anyhow!("SEARCH_URL is required"))?,
            search_index_alias: std::env::var("SEARCH_INDEX_ALIAS")
                .unwrap_or_else(|_| "products_current".to_string()),
            batch_size: rs_common::env::env_i64("BATCH_SIZE", 1000),
            max_old_indices: rs_common::env::env_usize("MAX_OLD_INDICES", 2),
            health_timeout_secs: rs_common::env::env_u64("HEALTH_TIMEOUT_SECS", 5),
            search_timeout_secs: rs_common::env::env_u64("SEARCH_TIMEOUT_SECS", 20),
            bulk_timeout_secs: rs_common::env::env_u64("BULK_TIMEOUT_SECS", 60),
            rescore_window: rs_common::env::env_usize("RESCORE_WINDOW", 50) as u32,
            max_product_ids_per_batch: rs_common::env::env_usize("MAX_PRODUCT_IDS_PER_BATCH", 1000),
            q_length_cap: rs_common::env::env_usize("Q_LENGTH_CAP", 200),
            doc_count_tolerance: rs_common::env::env_i64("DOC_COUNT_TOLERANCE", 10),
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
        })
    }
}
