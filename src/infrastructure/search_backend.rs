//! `SearchBackend`: the only component that talks to the search engine.
//! Everything else in the crate sees [`Document`](crate::domain::document::Document)
//! values and `serde_json::Value` request bodies, never the transport.

use std::time::{Duration, Instant};

use opensearch::cluster::ClusterHealthParts;
use opensearch::http::transport::Transport;
use opensearch::indices::{
    IndicesCreateParts, IndicesDeleteParts, IndicesExistsParts, IndicesGetAliasParts, IndicesGetParts,
    IndicesRefreshParts, IndicesStatsParts,
};
use opensearch::params::Refresh;
use opensearch::{BulkParts, OpenSearch, SearchParts};
use serde_json::{json, Value};

use crate::domain::document::Document;
use crate::error::AppError;

#[derive(Clone)]
pub struct SearchBackend {
    client: OpenSearch,
    bulk_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ItemError {
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct BulkResult {
    pub indexed_count: usize,
    pub item_errors: Vec<ItemError>,
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub source: Value,
    pub score: f64,
    pub highlight: Option<Value>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchResult {
    pub hits: Vec<SearchHit>,
    pub total: i64,
    pub max_score: Option<f64>,
    pub suggest: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterStatus {
    Green,
    Yellow,
    Red,
}

impl ClusterStatus {
    fn parse(raw: &str) -> Self {
        match raw {
            "green" => ClusterStatus::Green,
            "yellow" => ClusterStatus::Yellow,
            _ => ClusterStatus::Red,
        }
    }

    pub fn is_usable(self) -> bool {
        matches!(self, ClusterStatus::Green | ClusterStatus::Yellow)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ClusterHealth {
    pub status: ClusterStatus,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone)]
pub enum AliasAction {
    Add { index: String, alias: String },
    Remove { index: String, alias: String },
}

fn transport_err(context: &str, err: impl std::fmt::Display) -> AppError {
    AppError::SearchUnavailable(format!("{context}: {err}"))
}

impl SearchBackend {
    pub fn new(url: &str, bulk_timeout_secs: u64) -> Result<Self, AppError> {
        let transport = Transport::single_node(url).map_err(|err| transport_err("transport init", err))?;
        Ok(Self {
            client: OpenSearch::new(transport),
            bulk_timeout: Duration::from_secs(bulk_timeout_secs.max(1)),
        })
    }

    /// Bulk-index documents under `index`. Idempotent per document id;
    /// partial failures are reported as [`ItemError`]s rather than raised.
    /// Refresh is left disabled per §4.1 so the caller controls visibility.
    pub async fn bulk(&self, index: &str, docs: &[Document]) -> Result<BulkResult, AppError> {
        if docs.is_empty() {
            return Ok(BulkResult::default());
        }
        let mut body: Vec<opensearch::http::request::JsonBody<Value>> = Vec::with_capacity(docs.len() * 2);
        for doc in docs {
            body.push(json!({ "index": { "_id": doc.id() } }).into());
            body.push(serde_json::to_value(doc).unwrap_or(Value::Null).into());
        }

        let timeout_str = format!("{}s", self.bulk_timeout.as_secs());
        let response = self
            .client
            .bulk(BulkParts::Index(index))
            .timeout(&timeout_str)
            .refresh(Refresh::False)
            .body(body)
            .send()
            .await
            .map_err(|err| transport_err("bulk request", err))?;

        let payload: Value = response
            .json()
            .await
            .map_err(|err| transport_err("bulk response decode", err))?;

        let mut result = BulkResult::default();
        if let Some(items) = payload["items"].as_array() {
            for item in items {
                let Some(entry) = item.get("index") else { continue };
                let id = entry["_id"].as_str().unwrap_or_default().to_string();
                if let Some(error) = entry.get("error") {
                    let reason = error["reason"].as_str().unwrap_or("unknown bulk error").to_string();
                    result.item_errors.push(ItemError { id, reason });
                } else {
                    result.indexed_count += 1;
                }
            }
        }
        Ok(result)
    }

    pub async fn search(&self, index_or_alias: &str, body: Value) -> Result<SearchResult, AppError> {
        let response = self
            .client
            .search(SearchParts::Index(&[index_or_alias]))
            .body(body)
            .send()
            .await
            .map_err(|err| transport_err("search request", err))?;

        let payload: Value = response
            .json()
            .await
            .map_err(|err| transport_err("search response decode", err))?;

        let hits_node = &payload["hits"];
        let total = hits_node["total"]["value"].as_i64().unwrap_or(0);
        let max_score = hits_node["max_score"].as_f64();
        let hits = hits_node["hits"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|hit| SearchHit {
                id: hit["_id"].as_str().unwrap_or_default().to_string(),
                source: hit["_source"].clone(),
                score: hit["_score"].as_f64().unwrap_or(0.0),
                highlight: hit.get("highlight").cloned(),
            })
            .collect();

        Ok(SearchResult {
            hits,
            total,
            max_score,
            suggest: payload.get("suggest").cloned(),
        })
    }

    pub async fn create_index(&self, name: &str, schema: Value) -> Result<(), AppError> {
        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(name))
            .body(schema)
            .send()
            .await
            .map_err(|err| transport_err("create index", err))?;
        ensure_success(response).await
    }

    pub async fn delete_index(&self, name: &str) -> Result<(), AppError> {
        let response = self
            .client
            .indices()
            .delete(IndicesDeleteParts::Index(&[name]))
            .send()
            .await
            .map_err(|err| transport_err("delete index", err))?;
        ensure_success(response).await
    }

    pub async fn index_exists(&self, name: &str) -> Result<bool, AppError> {
        let response = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[name]))
            .send()
            .await
            .map_err(|err| transport_err("index exists", err))?;
        Ok(response.status_code().as_u16() == 200)
    }

    pub async fn refresh(&self, name: &str) -> Result<(), AppError> {
        let response = self
            .client
            .indices()
            .refresh(IndicesRefreshParts::Index(&[name]))
            .send()
            .await
            .map_err(|err| transport_err("refresh", err))?;
        ensure_success(response).await
    }

    pub async fn doc_count(&self, name: &str) -> Result<i64, AppError> {
        let response = self
            .client
            .indices()
            .stats(IndicesStatsParts::Index(&[name]))
            .send()
            .await
            .map_err(|err| transport_err("index stats", err))?;
        let payload: Value = response
            .json()
            .await
            .map_err(|err| transport_err("stats response decode", err))?;
        Ok(payload["_all"]["primaries"]["docs"]["count"].as_i64().unwrap_or(0))
    }

    pub async fn update_aliases(&self, actions: &[AliasAction]) -> Result<(), AppError> {
        let rendered: Vec<Value> = actions
            .iter()
            .map(|action| match action {
                AliasAction::Add { index, alias } => json!({ "add": { "index": index, "alias": alias } }),
                AliasAction::Remove { index, alias } => json!({ "remove": { "index": index, "alias": alias } }),
            })
            .collect();
        let response = self
            .client
            .indices()
            .update_aliases()
            .body(json!({ "actions": rendered }))
            .send()
            .await
            .map_err(|err| transport_err("update aliases", err))?;
        ensure_success(response).await
    }

    /// The set of physical indices currently behind `alias`. Empty when the
    /// alias does not exist yet (ANALYZE tolerates this).
    pub async fn get_alias(&self, alias: &str) -> Result<Vec<String>, AppError> {
        let response = self
            .client
            .indices()
            .get_alias(IndicesGetAliasParts::Name(&[alias]))
            .send()
            .await
            .map_err(|err| transport_err("get alias", err))?;
        if response.status_code().as_u16() == 404 {
            return Ok(Vec::new());
        }
        let payload: Value = response
            .json()
            .await
            .map_err(|err| transport_err("get alias response decode", err))?;
        Ok(payload
            .as_object()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default())
    }

    pub async fn list_indices(&self, pattern: &str) -> Result<Vec<String>, AppError> {
        let response = self
            .client
            .indices()
            .get(IndicesGetParts::Index(&[pattern]))
            .send()
            .await
            .map_err(|err| transport_err("list indices", err))?;
        if response.status_code().as_u16() == 404 {
            return Ok(Vec::new());
        }
        let payload: Value = response
            .json()
            .await
            .map_err(|err| transport_err("list indices response decode", err))?;
        Ok(payload
            .as_object()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default())
    }

    pub async fn cluster_health(&self, index: Option<&str>, timeout: Duration) -> Result<ClusterHealth, AppError> {
        let started = Instant::now();
        let parts = match index {
            Some(name) => ClusterHealthParts::Index(&[name]),
            None => ClusterHealthParts::None,
        };
        let timeout_str = format!("{}s", timeout.as_secs().max(1));
        let response = self
            .client
            .cluster()
            .health(parts)
            .timeout(&timeout_str)
            .send()
            .await
            .map_err(|err| transport_err("cluster health", err))?;
        let payload: Value = response
            .json()
            .await
            .map_err(|err| transport_err("cluster health response decode", err))?;
        let status = ClusterStatus::parse(payload["status"].as_str().unwrap_or("red"));
        Ok(ClusterHealth {
            status,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }

    pub async fn plugins_installed(&self) -> Result<Vec<String>, AppError> {
        let response = self
            .client
            .cat()
            .plugins()
            .format("json")
            .send()
            .await
            .map_err(|err| transport_err("cat plugins", err))?;
        let payload: Value = response
            .json()
            .await
            .map_err(|err| transport_err("plugins response decode", err))?;
        Ok(payload
            .as_array()
            .map(|rows| {
                rows.iter()
                    .filter_map(|row| row["component"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default())
    }
}

async fn ensure_success(response: opensearch::http::response::Response) -> Result<(), AppError> {
    if response.status_code().is_success() {
        Ok(())
    } else {
        let status = response.status_code();
        let body = response.text().await.unwrap_or_default();
        Err(AppError::SearchUnavailable(format!("{status}: {body}")))
    }
}
