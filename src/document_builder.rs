//! Pure `row -> indexable document` transformation. No I/O, no backend
//! knowledge — this module is exercised directly in tests with in-memory
//! [`ProductRow`] fixtures.

use std::collections::HashMap;

use chrono::Utc;

use crate::domain::document::{
    Document, DocumentCounts, SuggestEntry, SUGGEST_WEIGHT_BRAND_NAME, SUGGEST_WEIGHT_EXTERNAL_ID,
    SUGGEST_WEIGHT_NAME, SUGGEST_WEIGHT_SERIES_NAME, SUGGEST_WEIGHT_SKU,
};
use crate::domain::product::ProductRow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NonPositiveProductId,
    MissingIdentifyingText,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NonPositiveProductId => write!(f, "product_id must be positive"),
            SkipReason::MissingIdentifyingText => write!(f, "name, external_id and sku are all empty"),
        }
    }
}

/// Strip control characters other than tab/newline/carriage-return, collapse
/// internal whitespace runs to a single space, and trim the ends.
fn normalize_text(raw: &str) -> String {
    let stripped: String = raw
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\t' | '\n' | '\r'))
        .collect();
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.trim().to_string()
}

fn suggest_entry(text: &str, weight: i32) -> Option<SuggestEntry> {
    if text.chars().count() < 2 {
        return None;
    }
    Some(SuggestEntry {
        input: vec![text.to_string()],
        weight,
    })
}

fn coerce_timestamp(value: Option<chrono::DateTime<Utc>>) -> String {
    value
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| Utc::now().to_rfc3339())
}

/// Build an indexable [`Document`] from a relational row, or report why the
/// row was skipped. See §4.3 for the rule numbering this function follows.
pub fn build(row: ProductRow) -> Result<Document, SkipReason> {
    // Rule 1: reject non-positive product_id.
    if row.product_id <= 0 {
        return Err(SkipReason::NonPositiveProductId);
    }

    // Rule 2: normalize text fields up front.
    let name = normalize_text(&row.name);
    let external_id = normalize_text(&row.external_id);
    let sku = normalize_text(&row.sku);
    let description = normalize_text(&row.description);
    let brand_name = normalize_text(&row.brand_name);
    let series_name = normalize_text(&row.series_name);
    let unit = normalize_text(&row.unit);
    let dimensions = normalize_text(&row.dimensions);

    // Rule 1 continued: reject rows with no identifying text at all.
    if name.is_empty() && external_id.is_empty() && sku.is_empty() {
        return Err(SkipReason::MissingIdentifyingText);
    }

    // Rule 3: clamp numerics.
    let brand_id = row.brand_id.max(0);
    let series_id = row.series_id.max(0);
    let weight = row.weight.max(0.0);
    let min_sale = row.min_sale.max(1);

    // Rule 4: build suggest entries, skipping short inputs.
    let suggest: Vec<SuggestEntry> = [
        suggest_entry(&name, SUGGEST_WEIGHT_NAME),
        suggest_entry(&external_id, SUGGEST_WEIGHT_EXTERNAL_ID),
        suggest_entry(&sku, SUGGEST_WEIGHT_SKU),
        suggest_entry(&brand_name, SUGGEST_WEIGHT_BRAND_NAME),
        suggest_entry(&series_name, SUGGEST_WEIGHT_SERIES_NAME),
    ]
    .into_iter()
    .flatten()
    .collect();

    // Rule 5: search_all joins the identifying/text fields, re-normalized.
    let search_all = normalize_text(
        &[&name, &external_id, &sku, &brand_name, &series_name, &description].join(" "),
    );

    // Rule 6: coerce dates, defaulting to now on null/unparseable.
    let created_at = coerce_timestamp(row.created_at);
    let updated_at = coerce_timestamp(row.updated_at);

    Ok(Document {
        product_id: row.product_id,
        external_id,
        sku,
        name,
        description,
        brand_id,
        brand_name,
        series_id,
        series_name,
        unit,
        dimensions,
        min_sale,
        weight,
        search_all,
        suggest,
        popularity_score: row.popularity_score.max(0.0),
        in_stock: row.in_stock,
        categories: Vec::new(),
        category_ids: Vec::new(),
        attributes: HashMap::new(),
        images: Vec::new(),
        documents: DocumentCounts::default(),
        created_at,
        updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_row() -> ProductRow {
        ProductRow {
            product_id: 1,
            external_id: "AB-123".to_string(),
            sku: "S1".to_string(),
            name: "  Gadget   Pro  ".to_string(),
            description: "A\u{0007}great gadget".to_string(),
            brand_id: 5,
            brand_name: "Acme".to_string(),
            series_id: 0,
            series_name: String::new(),
            unit: "pcs".to_string(),
            dimensions: String::new(),
            min_sale: 1,
            weight: 1.5,
            popularity_score: 0.0,
            in_stock: false,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn normalizes_whitespace_and_strips_control_chars() {
        let doc = build(base_row()).expect("should build");
        assert_eq!(doc.name, "Gadget Pro");
        assert_eq!(doc.description, "Agreat gadget");
    }

    #[test]
    fn rejects_non_positive_product_id() {
        let mut row = base_row();
        row.product_id = 0;
        assert_eq!(build(row).unwrap_err(), SkipReason::NonPositiveProductId);
    }

    #[test]
    fn rejects_rows_with_no_identifying_text() {
        let mut row = base_row();
        row.name.clear();
        row.external_id.clear();
        row.sku.clear();
        assert_eq!(build(row).unwrap_err(), SkipReason::MissingIdentifyingText);
    }

    #[test]
    fn skips_short_suggest_inputs() {
        let mut row = base_row();
        row.sku = "S".to_string();
        let doc = build(row).expect("should build");
        assert!(doc.suggest.iter().all(|entry| entry.input[0] != "S"));
    }

    #[test]
    fn defaults_dates_to_now_when_missing() {
        let doc = build(base_row()).expect("should build");
        assert!(chrono::DateTime::parse_from_rfc3339(&doc.created_at).is_ok());
    }

    #[test]
    fn clamps_negative_numerics() {
        let mut row = base_row();
        row.brand_id = -4;
        row.weight = -2.0;
        row.min_sale = -1;
        let doc = build(row).expect("should build");
        assert_eq!(doc.brand_id, 0);
        assert_eq!(doc.weight, 0.0);
        assert_eq!(doc.min_sale, 1);
    }
}
