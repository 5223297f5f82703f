//! The relational source-of-truth row. See [`crate::domain::document::Document`]
//! for the derived, indexable shape built from it.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub product_id: i64,
    pub external_id: String,
    pub sku: String,
    pub name: String,
    pub description: String,
    pub brand_id: i64,
    pub brand_name: String,
    pub series_id: i64,
    pub series_name: String,
    pub unit: String,
    pub dimensions: String,
    pub min_sale: i32,
    pub weight: f64,
    pub popularity_score: f64,
    pub in_stock: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}
