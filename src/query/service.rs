//! `QueryService`: the single entry point the HTTP handlers call into.
//! Owns backend selection via [`HealthGate`], fallback routing to
//! [`RelationalStore`], and result enrichment via [`DynamicDataProvider`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::config::Config;
use crate::domain::query_spec::{
    parse_product_ids, AutocompleteSpec, RawAutocompleteParams, RawSearchParams, SearchSpec,
};
use crate::error::AppError;
use crate::infrastructure::db::RelationalStore;
use crate::infrastructure::health_gate::HealthGate;
use crate::infrastructure::search_backend::SearchBackend;
use crate::query::builder::{build_autocomplete_body, build_search_body};
use crate::query::dynamic_data::DynamicDataProvider;

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchProduct {
    pub product_id: i64,
    pub external_id: String,
    pub sku: String,
    pub name: String,
    pub description: String,
    pub brand_name: String,
    pub series_name: String,
    pub popularity_score: f64,
    pub in_stock: bool,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight: Option<Value>,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub dynamic: Value,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResponseData {
    pub products: Vec<SearchProduct>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregations: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Suggestion {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AutocompleteResponseData {
    pub suggestions: Vec<Suggestion>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestResponseData {
    pub message: String,
    pub timestamp: String,
    pub user_authenticated: bool,
    pub opensearch_available: bool,
}

pub struct QueryService {
    relational: RelationalStore,
    search_backend: SearchBackend,
    health_gate: HealthGate,
    dynamic_data: Arc<dyn DynamicDataProvider>,
    config: Config,
}

impl QueryService {
    pub fn new(
        relational: RelationalStore,
        search_backend: SearchBackend,
        health_gate: HealthGate,
        dynamic_data: Arc<dyn DynamicDataProvider>,
        config: Config,
    ) -> Self {
        Self { relational, search_backend, health_gate, dynamic_data, config }
    }

    pub async fn search(&self, raw: RawSearchParams) -> crate::envelope::ResponseEnvelope<SearchResponseData> {
        let spec = match SearchSpec::from_raw(raw, self.config.q_length_cap) {
            Ok(spec) => spec,
            Err(message) => {
                return crate::envelope::ResponseEnvelope::degraded_empty(&AppError::Validation(message));
            }
        };

        let primary_available = self.health_gate.is_available(&self.search_backend).await;

        let outcome = if primary_available {
            self.run_primary(&spec).await
        } else {
            self.run_fallback(&spec).await
        };

        match outcome {
            Ok(mut data) => {
                self.enrich(&mut data.products, spec.city_id, spec.user_id).await;
                crate::envelope::ResponseEnvelope::ok(data)
            }
            Err(err) => {
                warn!(error = %err, "search request degraded");
                crate::envelope::ResponseEnvelope::degraded_empty(&err)
            }
        }
    }

    async fn run_primary(&self, spec: &SearchSpec) -> Result<SearchResponseData, AppError> {
        let body = build_search_body(spec, self.config.rescore_window);
        let deadline = Duration::from_secs(self.config.search_timeout_secs);
        let result = tokio::time::timeout(deadline, self.search_backend.search(&self.config.search_index_alias, body))
            .await
            .map_err(|_| AppError::SearchUnavailable("search request timed out".into()))??;

        let products = result
            .hits
            .iter()
            .map(|hit| document_hit_to_product(&hit.source, hit.highlight.clone()))
            .collect();

        Ok(SearchResponseData {
            products,
            total: result.total,
            page: spec.page,
            limit: spec.limit,
            aggregations: None,
            max_score: result.max_score,
        })
    }

    async fn run_fallback(&self, spec: &SearchSpec) -> Result<SearchResponseData, AppError> {
        let (rows, total) = self.relational.fallback_search(spec).await?;
        let products = rows
            .into_iter()
            .map(|row| SearchProduct {
                product_id: row.product_id,
                external_id: row.external_id,
                sku: row.sku,
                name: row.name,
                description: row.description,
                brand_name: row.brand_name,
                series_name: row.series_name,
                popularity_score: row.popularity_score,
                in_stock: row.in_stock,
                categories: Vec::new(),
                images: Vec::new(),
                highlight: None,
                dynamic: Value::Null,
            })
            .collect();

        Ok(SearchResponseData {
            products,
            total,
            page: spec.page,
            limit: spec.limit,
            aggregations: None,
            max_score: None,
        })
    }

    async fn enrich(&self, products: &mut [SearchProduct], city_id: Option<i64>, user_id: Option<i64>) {
        if products.is_empty() {
            return;
        }
        let ids: Vec<i64> = products.iter().map(|p| p.product_id).collect();
        let attributes = self.dynamic_data.fetch(&ids, city_id, user_id).await;
        for product in products.iter_mut() {
            if let Some(extra) = attributes.get(&product.product_id) {
                product.dynamic = extra.clone();
            }
        }
    }

    pub async fn autocomplete(
        &self,
        raw: RawAutocompleteParams,
    ) -> crate::envelope::ResponseEnvelope<AutocompleteResponseData> {
        let spec = match AutocompleteSpec::from_raw(raw) {
            Ok(Some(spec)) => spec,
            Ok(None) => return crate::envelope::ResponseEnvelope::ok(AutocompleteResponseData::default()),
            Err(message) => {
                return crate::envelope::ResponseEnvelope::degraded_empty(&AppError::Validation(message));
            }
        };

        let primary_available = self.health_gate.is_available(&self.search_backend).await;
        let suggestions = if primary_available {
            match self.autocomplete_primary(&spec).await {
                Ok(list) => list,
                Err(err) => {
                    warn!(error = %err, "autocomplete primary path failed, degrading silently");
                    self.autocomplete_fallback(&spec).await
                }
            }
        } else {
            self.autocomplete_fallback(&spec).await
        };

        crate::envelope::ResponseEnvelope::ok(AutocompleteResponseData { suggestions })
    }

    async fn autocomplete_primary(&self, spec: &AutocompleteSpec) -> Result<Vec<Suggestion>, AppError> {
        let body = build_autocomplete_body(&spec.q, spec.limit);
        let result = tokio::time::timeout(
            Duration::from_secs(3),
            self.search_backend.search(&self.config.search_index_alias, body),
        )
        .await
        .map_err(|_| AppError::SearchUnavailable("autocomplete request timed out".into()))??;

        Ok(merge_suggestions(&result, spec.limit))
    }

    async fn autocomplete_fallback(&self, spec: &AutocompleteSpec) -> Vec<Suggestion> {
        match self.relational.fallback_autocomplete(&spec.q, spec.limit).await {
            Ok(rows) => rows
                .into_iter()
                .map(|row| Suggestion {
                    text: row.text,
                    kind: "product",
                    score: row.score,
                    external_id: Some(row.external_id),
                })
                .collect(),
            Err(err) => {
                warn!(error = %err, "autocomplete fallback query failed, returning no suggestions");
                Vec::new()
            }
        }
    }

    pub async fn availability(
        &self,
        city_id_raw: Option<&str>,
        product_ids_csv: &str,
    ) -> crate::envelope::ResponseEnvelope<HashMap<String, Value>> {
        let parsed_city_id = match city_id_raw.map(str::trim) {
            None | Some("") => None,
            Some(s) => match s.parse::<i64>() {
                Ok(v) => Some(v),
                Err(_) => {
                    return crate::envelope::ResponseEnvelope::degraded_empty(&AppError::Validation(
                        "city_id must be an integer".into(),
                    ));
                }
            },
        };
        let Some(city_id) = parsed_city_id.filter(|id| *id >= 1) else {
            return crate::envelope::ResponseEnvelope::degraded_empty(&AppError::Validation(
                "city_id must be a positive integer".into(),
            ));
        };
        let ids = match parse_product_ids(product_ids_csv, self.config.max_product_ids_per_batch) {
            Ok(ids) => ids,
            Err(message) => {
                return crate::envelope::ResponseEnvelope::degraded_empty(&AppError::Validation(message));
            }
        };

        let attributes = self.dynamic_data.fetch(&ids, Some(city_id), None).await;
        let data: HashMap<String, Value> = ids
            .iter()
            .map(|id| {
                let value = attributes.get(id).cloned().unwrap_or_else(|| serde_json::json!({ "in_stock": false }));
                (id.to_string(), value)
            })
            .collect();
        crate::envelope::ResponseEnvelope::ok(data)
    }

    pub async fn test(&self) -> crate::envelope::ResponseEnvelope<TestResponseData> {
        let opensearch_available = self.health_gate.is_available(&self.search_backend).await;
        crate::envelope::ResponseEnvelope::ok(TestResponseData {
            message: "catalog search service is operational".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            user_authenticated: false,
            opensearch_available,
        })
    }
}

fn document_hit_to_product(source: &Value, highlight: Option<Value>) -> SearchProduct {
    SearchProduct {
        product_id: source["product_id"].as_i64().unwrap_or(0),
        external_id: source["external_id"].as_str().unwrap_or_default().to_string(),
        sku: source["sku"].as_str().unwrap_or_default().to_string(),
        name: source["name"].as_str().unwrap_or_default().to_string(),
        description: source["description"].as_str().unwrap_or_default().to_string(),
        brand_name: source["brand_name"].as_str().unwrap_or_default().to_string(),
        series_name: source["series_name"].as_str().unwrap_or_default().to_string(),
        popularity_score: source["popularity_score"].as_f64().unwrap_or(0.0),
        in_stock: source["in_stock"].as_bool().unwrap_or(false),
        categories: source["categories"]
            .as_array()
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default(),
        images: source["images"]
            .as_array()
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default(),
        highlight,
        dynamic: Value::Null,
    }
}

/// Merges completion-suggester options with query-path hits per §4.5:
/// dedup by lowercase text, completion entries win ties, sort by score desc.
fn merge_suggestions(result: &crate::infrastructure::search_backend::SearchResult, limit: u32) -> Vec<Suggestion> {
    let mut seen: HashMap<String, Suggestion> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    if let Some(suggest) = &result.suggest {
        if let Some(entries) = suggest["product-suggest"].as_array() {
            for entry in entries {
                if let Some(options) = entry["options"].as_array() {
                    for option in options {
                        let text = option["text"].as_str().unwrap_or_default().to_string();
                        if text.is_empty() {
                            continue;
                        }
                        let key = text.to_ascii_lowercase();
                        let score = option["_score"].as_f64().unwrap_or(1.0);
                        if !seen.contains_key(&key) {
                            order.push(key.clone());
                        }
                        seen.insert(
                            key,
                            Suggestion { text, kind: "suggest", score, external_id: None },
                        );
                    }
                }
            }
        }
    }

    for hit in &result.hits {
        let name = hit.source["name"].as_str().unwrap_or_default().to_string();
        if name.is_empty() {
            continue;
        }
        let key = name.to_ascii_lowercase();
        if seen.contains_key(&key) {
            continue;
        }
        order.push(key.clone());
        seen.insert(
            key,
            Suggestion {
                text: name,
                kind: "product",
                score: hit.score,
                external_id: hit.source["external_id"].as_str().map(str::to_string),
            },
        );
    }

    let mut merged: Vec<Suggestion> = order.into_iter().filter_map(|key| seen.remove(&key)).collect();
    merged.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    merged.truncate(limit as usize);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::search_backend::{SearchHit, SearchResult};

    #[test]
    fn merge_prefers_completion_entries_over_query_hits_with_same_text() {
        let result = SearchResult {
            hits: vec![SearchHit {
                id: "1".into(),
                source: serde_json::json!({ "name": "Hammer Drill", "external_id": "HD-1" }),
                score: 2.0,
                highlight: None,
            }],
            total: 1,
            max_score: Some(2.0),
            suggest: Some(serde_json::json!({
                "product-suggest": [
                    { "options": [ { "text": "Hammer Drill", "_score": 1.0 } ] }
                ]
            })),
        };
        let merged = merge_suggestions(&result, 10);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].kind, "suggest");
    }

    #[test]
    fn merge_truncates_to_limit_and_sorts_by_score() {
        let result = SearchResult {
            hits: vec![
                SearchHit {
                    id: "1".into(),
                    source: serde_json::json!({ "name": "Wrench", "external_id": "W-1" }),
                    score: 1.0,
                    highlight: None,
                },
                SearchHit {
                    id: "2".into(),
                    source: serde_json::json!({ "name": "Drill", "external_id": "D-1" }),
                    score: 5.0,
                    highlight: None,
                },
            ],
            total: 2,
            max_score: Some(5.0),
            suggest: None,
        };
        let merged = merge_suggestions(&result, 1);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].text, "Drill");
    }
}
