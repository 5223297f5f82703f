//! The indexable document: a superset of [`ProductRow`](super::product::ProductRow)
//! plus fields derived by [`crate::document_builder`].

use std::collections::HashMap;

use serde::Serialize;

/// Suggest-field weight scale. Schema constants, not magic numbers per call
/// site — the completion payload must survive re-indexing unchanged.
pub const SUGGEST_WEIGHT_NAME: i32 = 100;
pub const SUGGEST_WEIGHT_EXTERNAL_ID: i32 = 95;
pub const SUGGEST_WEIGHT_SKU: i32 = 90;
pub const SUGGEST_WEIGHT_BRAND_NAME: i32 = 70;
pub const SUGGEST_WEIGHT_SERIES_NAME: i32 = 60;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SuggestEntry {
    pub input: Vec<String>,
    pub weight: i32,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct DocumentCounts {
    pub certificates: i32,
    pub manuals: i32,
    pub drawings: i32,
}

fn is_empty_string(s: &str) -> bool {
    s.is_empty()
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Document {
    pub product_id: i64,

    #[serde(skip_serializing_if = "is_empty_string")]
    pub external_id: String,
    #[serde(skip_serializing_if = "is_empty_string")]
    pub sku: String,
    #[serde(skip_serializing_if = "is_empty_string")]
    pub name: String,
    #[serde(skip_serializing_if = "is_empty_string")]
    pub description: String,

    pub brand_id: i64,
    #[serde(skip_serializing_if = "is_empty_string")]
    pub brand_name: String,
    pub series_id: i64,
    #[serde(skip_serializing_if = "is_empty_string")]
    pub series_name: String,

    #[serde(skip_serializing_if = "is_empty_string")]
    pub unit: String,
    #[serde(skip_serializing_if = "is_empty_string")]
    pub dimensions: String,
    pub min_sale: i32,
    pub weight: f64,

    pub search_all: String,
    pub suggest: Vec<SuggestEntry>,

    pub popularity_score: f64,
    pub in_stock: bool,

    pub categories: Vec<String>,
    pub category_ids: Vec<i64>,
    pub attributes: HashMap<String, String>,
    pub images: Vec<String>,
    pub documents: DocumentCounts,

    pub created_at: String,
    pub updated_at: String,
}

impl Document {
    /// Document identity, also the backend document id (§3 invariant: no
    /// two documents share an id).
    pub fn id(&self) -> String {
        self.product_id.to_string()
    }
}
