//! The index schema (settings + mappings) shipped with the binary. CREATE
//! validates its shape before ever handing it to the backend, per §4.4.

use serde_json::{json, Value};

const REQUIRED_ANALYZERS: &[&str] =
    &["text_analyzer", "code_analyzer", "search_analyzer", "autocomplete_analyzer"];

const REQUIRED_FIELDS: &[&str] = &["product_id", "external_id", "name", "brand_name", "suggest"];

/// The embedded schema. `autocomplete_analyzer` uses an edge-ngram filter so
/// prefix matching on `name.autocomplete` and `brand_name.autocomplete`
/// works without a dedicated prefix query at index time.
pub fn embedded_schema() -> Value {
    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 1,
            "analysis": {
                "filter": {
                    "edge_ngram_filter": {
                        "type": "edge_ngram",
                        "min_gram": 1,
                        "max_gram": 20
                    },
                    "ngram_filter": {
                        "type": "ngram",
                        "min_gram": 2,
                        "max_gram": 4
                    }
                },
                "analyzer": {
                    "text_analyzer": {
                        "type": "custom",
                        "tokenizer": "standard",
                        "filter": ["lowercase", "asciifolding"]
                    },
                    "code_analyzer": {
                        "type": "custom",
                        "tokenizer": "keyword",
                        "filter": ["lowercase"]
                    },
                    "search_analyzer": {
                        "type": "custom",
                        "tokenizer": "standard",
                        "filter": ["lowercase", "asciifolding"]
                    },
                    "autocomplete_analyzer": {
                        "type": "custom",
                        "tokenizer": "standard",
                        "filter": ["lowercase", "asciifolding", "edge_ngram_filter"]
                    },
                    "ngram_analyzer": {
                        "type": "custom",
                        "tokenizer": "standard",
                        "filter": ["lowercase", "asciifolding", "ngram_filter"]
                    }
                }
            }
        },
        "mappings": {
            "properties": {
                "product_id": { "type": "long" },
                "external_id": {
                    "type": "text",
                    "analyzer": "code_analyzer",
                    "fields": { "keyword": { "type": "keyword" } }
                },
                "sku": {
                    "type": "text",
                    "analyzer": "code_analyzer",
                    "fields": { "keyword": { "type": "keyword" } }
                },
                "name": {
                    "type": "text",
                    "analyzer": "text_analyzer",
                    "search_analyzer": "search_analyzer",
                    "fields": {
                        "keyword": { "type": "keyword" },
                        "ngram": { "type": "text", "analyzer": "ngram_analyzer", "search_analyzer": "search_analyzer" },
                        "autocomplete": { "type": "text", "analyzer": "autocomplete_analyzer", "search_analyzer": "search_analyzer" }
                    }
                },
                "description": { "type": "text", "analyzer": "text_analyzer" },
                "brand_id": { "type": "long" },
                "brand_name": {
                    "type": "text",
                    "analyzer": "text_analyzer",
                    "fields": {
                        "keyword": { "type": "keyword" },
                        "autocomplete": { "type": "text", "analyzer": "autocomplete_analyzer", "search_analyzer": "search_analyzer" }
                    }
                },
                "series_id": { "type": "long" },
                "series_name": {
                    "type": "text",
                    "analyzer": "text_analyzer",
                    "fields": { "keyword": { "type": "keyword" } }
                },
                "unit": { "type": "keyword" },
                "dimensions": { "type": "keyword" },
                "min_sale": { "type": "integer" },
                "weight": { "type": "double" },
                "search_all": { "type": "text", "analyzer": "text_analyzer" },
                "suggest": { "type": "completion" },
                "popularity_score": { "type": "double" },
                "in_stock": { "type": "boolean" },
                "categories": { "type": "keyword" },
                "category_ids": { "type": "long" },
                "attributes": { "type": "object", "enabled": false },
                "images": { "type": "keyword" },
                "documents": {
                    "properties": {
                        "certificates": { "type": "integer" },
                        "manuals": { "type": "integer" },
                        "drawings": { "type": "integer" }
                    }
                },
                "created_at": { "type": "date" },
                "updated_at": { "type": "date" }
            }
        }
    })
}

/// Confirms `schema` has the shape CREATE requires: `settings`/`mappings`
/// top-level objects, all required analyzers, and all required mapped
/// fields present.
pub fn validate_schema(schema: &Value) -> Result<(), String> {
    let settings = schema.get("settings").ok_or("schema missing `settings`")?;
    let mappings = schema.get("mappings").ok_or("schema missing `mappings`")?;

    let analyzers = settings
        .get("analysis")
        .and_then(|a| a.get("analyzer"))
        .and_then(Value::as_object)
        .ok_or("schema missing `settings.analysis.analyzer`")?;
    for required in REQUIRED_ANALYZERS {
        if !analyzers.contains_key(*required) {
            return Err(format!("schema missing required analyzer `{required}`"));
        }
    }

    let properties = mappings
        .get("properties")
        .and_then(Value::as_object)
        .ok_or("schema missing `mappings.properties`")?;
    for required in REQUIRED_FIELDS {
        if !properties.contains_key(*required) {
            return Err(format!("schema missing required mapped field `{required}`"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_schema_is_self_consistent() {
        validate_schema(&embedded_schema()).expect("embedded schema must validate");
    }

    #[test]
    fn rejects_schema_missing_an_analyzer() {
        let mut schema = embedded_schema();
        schema["settings"]["analysis"]["analyzer"]
            .as_object_mut()
            .unwrap()
            .remove("code_analyzer");
        assert!(validate_schema(&schema).is_err());
    }

    #[test]
    fn rejects_schema_missing_a_required_field() {
        let mut schema = embedded_schema();
        schema["mappings"]["properties"].as_object_mut().unwrap().remove("suggest");
        assert!(validate_schema(&schema).is_err());
    }
}
