//! Translates a validated [`SearchSpec`] into the search backend's request
//! body. Clause construction goes through the tagged [`Clause`] enum so
//! boosting and field lists are type-checked before the single [`Clause::render`]
//! call that flattens everything to the wire JSON (§9 Design Notes).

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use crate::domain::query_spec::{SearchSpec, Sort};

static CODE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9\-./]+$").unwrap());

/// isCode(q): alnum with dash/dot/slash, contains a digit, length <= 50.
pub fn is_code(q: &str) -> bool {
    q.len() <= 50 && q.chars().any(|c| c.is_ascii_digit()) && CODE_PATTERN.is_match(q)
}

pub fn words(q: &str) -> Vec<&str> {
    q.split_whitespace().filter(|w| w.chars().count() >= 2).collect()
}

#[derive(Debug, Clone)]
pub enum Clause {
    Term { field: String, value: String, boost: f64 },
    Prefix { field: String, value: String, boost: f64 },
    Fuzzy { field: String, value: String, prefix_length: u32, boost: f64 },
    Match { field: String, value: String, operator: Option<&'static str>, fuzziness: bool, prefix_length: Option<u32>, boost: f64 },
    MatchPhrase { field: String, value: String, boost: f64 },
    MultiMatch { fields: Vec<String>, value: String, fuzziness: bool, boost: f64 },
    Wildcard { field: String, value: String, boost: f64 },
    Bool { should: Vec<Clause>, minimum_should_match: String },
    BoostedBool { should: Vec<Clause>, minimum_should_match: String, boost: f64 },
}

impl Clause {
    pub fn render(&self) -> Value {
        match self {
            Clause::Term { field, value, boost } => json!({
                "term": { field: { "value": value, "boost": boost } }
            }),
            Clause::Prefix { field, value, boost } => json!({
                "prefix": { field: { "value": value, "boost": boost } }
            }),
            Clause::Fuzzy { field, value, prefix_length, boost } => json!({
                "fuzzy": { field: { "value": value, "fuzziness": "AUTO", "prefix_length": prefix_length, "boost": boost } }
            }),
            Clause::Match { field, value, operator, fuzziness, prefix_length, boost } => {
                let mut inner = json!({ "query": value, "boost": boost });
                if let Some(op) = operator {
                    inner["operator"] = json!(op);
                }
                if *fuzziness {
                    inner["fuzziness"] = json!("AUTO");
                    if let Some(pl) = prefix_length {
                        inner["prefix_length"] = json!(pl);
                    }
                }
                json!({ "match": { field: inner } })
            }
            Clause::MatchPhrase { field, value, boost } => json!({
                "match_phrase": { field: { "query": value, "boost": boost } }
            }),
            Clause::MultiMatch { fields, value, fuzziness, boost } => {
                let mut body = json!({
                    "query": value,
                    "fields": fields,
                    "type": "best_fields",
                    "boost": boost,
                });
                if *fuzziness {
                    body["fuzziness"] = json!("AUTO");
                }
                json!({ "multi_match": body })
            }
            Clause::Wildcard { field, value, boost } => json!({
                "wildcard": { field: { "value": format!("*{value}*"), "boost": boost } }
            }),
            Clause::Bool { should, minimum_should_match } => json!({
                "bool": {
                    "should": should.iter().map(Clause::render).collect::<Vec<_>>(),
                    "minimum_should_match": minimum_should_match,
                }
            }),
            Clause::BoostedBool { should, minimum_should_match, boost } => json!({
                "bool": {
                    "should": should.iter().map(Clause::render).collect::<Vec<_>>(),
                    "minimum_should_match": minimum_should_match,
                    "boost": boost,
                }
            }),
        }
    }
}

/// The 12-clause `bool.should` described in §4.5. Each clause carries its own
/// boost; the overall query requires at least one clause to match.
pub fn main_query(q: &str) -> Clause {
    let code = is_code(q);
    let mut should = Vec::new();

    if code {
        should.push(Clause::Term { field: "external_id.keyword".into(), value: q.into(), boost: 1000.0 });
        should.push(Clause::Term { field: "sku.keyword".into(), value: q.into(), boost: 900.0 });
    }
    should.push(Clause::Prefix { field: "external_id".into(), value: q.into(), boost: 100.0 });
    should.push(Clause::Prefix { field: "sku".into(), value: q.into(), boost: 90.0 });
    should.push(Clause::Fuzzy { field: "external_id".into(), value: q.into(), prefix_length: 2, boost: 80.0 });
    should.push(Clause::MatchPhrase { field: "name".into(), value: q.into(), boost: 70.0 });
    should.push(Clause::Match {
        field: "name".into(),
        value: q.into(),
        operator: Some("and"),
        fuzziness: false,
        prefix_length: None,
        boost: 60.0,
    });
    should.push(Clause::Match {
        field: "name".into(),
        value: q.into(),
        operator: None,
        fuzziness: true,
        prefix_length: Some(3),
        boost: 40.0,
    });
    should.push(Clause::MultiMatch {
        fields: vec![
            "name^5".into(),
            "name.ngram^2".into(),
            "brand_name^3".into(),
            "series_name^2".into(),
            "description".into(),
        ],
        value: q.into(),
        fuzziness: true,
        boost: 30.0,
    });

    let split = words(q);
    if split.len() > 1 {
        let minimum = (0.7 * split.len() as f64).ceil() as u32;
        let nested_should = split
            .iter()
            .map(|word| Clause::MultiMatch {
                fields: vec!["name^3".into(), "brand_name^2".into(), "description".into()],
                value: (*word).into(),
                fuzziness: false,
                boost: 1.0,
            })
            .collect();
        should.push(Clause::BoostedBool {
            should: nested_should,
            minimum_should_match: minimum.to_string(),
            boost: 20.0,
        });
    }

    should.push(Clause::Match {
        field: "name.ngram".into(),
        value: q.into(),
        operator: None,
        fuzziness: false,
        prefix_length: None,
        boost: 10.0,
    });

    if q.chars().count() >= 3 && !code {
        should.push(Clause::Wildcard { field: "name.keyword".into(), value: q.into(), boost: 5.0 });
    }

    Clause::Bool { should, minimum_should_match: "1".into() }
}

pub fn scoring_functions() -> Vec<Value> {
    vec![
        json!({
            "field_value_factor": {
                "field": "popularity_score",
                "factor": 1.2,
                "modifier": "log1p",
                "missing": 0
            },
            "weight": 10
        }),
        json!({
            "filter": { "term": { "in_stock": true } },
            "weight": 5
        }),
        json!({
            "script_score": {
                "script": {
                    "source": "Math.max(1, 50 - params._source['name'].length()) / 50"
                }
            },
            "weight": 3
        }),
        json!({
            "script_score": {
                "script": {
                    "source": "params._source.containsKey('description') && params._source['description'] != null ? Math.max(0.5, 1 - params._source['description'].length() / 1000.0) : 1.0"
                }
            },
            "weight": 2
        }),
    ]
}

fn rescore_for(q: &str, rescore_window: u32) -> Value {
    json!({
        "window_size": rescore_window,
        "query": {
            "rescore_query": {
                "bool": {
                    "should": [
                        { "match_phrase": { "name": { "query": q, "boost": 10 } } },
                        { "match": { "name": { "query": q, "operator": "and", "boost": 5 } } }
                    ]
                }
            },
            "query_weight": 0.7,
            "rescore_query_weight": 1.3
        }
    })
}

pub fn highlight() -> Value {
    json!({
        "pre_tags": ["<mark>"],
        "post_tags": ["</mark>"],
        "fields": {
            "name": {},
            "external_id": {},
            "sku": {},
            "description": { "fragment_size": 150, "number_of_fragments": 1 }
        }
    })
}

fn sort_clause(sort: Sort, has_query: bool) -> Value {
    match sort {
        Sort::Relevance if has_query => json!([{ "_score": "desc" }, { "popularity_score": "desc" }]),
        Sort::Relevance => json!([{ "popularity_score": "desc" }, { "name.keyword": "asc" }]),
        Sort::Name => json!([{ "name.keyword": "asc" }]),
        Sort::ExternalId => json!([{ "external_id.keyword": "asc" }]),
        Sort::Availability => json!([{ "in_stock": "desc" }, { "_score": "desc" }]),
        Sort::Popularity => json!([{ "popularity_score": "desc" }, { "_score": "desc" }]),
        // Documented placeholder (§9 Open Question 1): no canonical price
        // field exists yet, so price sorts fall back to product_id order.
        Sort::PriceAsc => json!([{ "product_id": "asc" }]),
        Sort::PriceDesc => json!([{ "product_id": "desc" }]),
    }
}

const SOURCE_FIELDS: &[&str] = &[
    "product_id",
    "external_id",
    "sku",
    "name",
    "description",
    "brand_name",
    "series_name",
    "popularity_score",
    "in_stock",
    "categories",
    "category_ids",
    "images",
];

fn apply_filters(mut query: Value, spec: &SearchSpec) -> Value {
    let mut filters = Vec::new();
    if let Some(brand) = &spec.filters.brand_name {
        filters.push(json!({ "term": { "brand_name.keyword": brand } }));
    }
    if let Some(series) = &spec.filters.series_name {
        filters.push(json!({ "term": { "series_name.keyword": series } }));
    }
    if let Some(category) = &spec.filters.category {
        filters.push(json!({ "term": { "category_ids": category } }));
    }
    if filters.is_empty() {
        return query;
    }
    query = json!({
        "bool": {
            "must": [query],
            "filter": filters,
        }
    });
    query
}

/// Build the full OpenSearch request body for `/api/search`, per §4.5.
pub fn build_search_body(spec: &SearchSpec, rescore_window: u32) -> Value {
    let base_query = if spec.q.is_empty() {
        json!({ "match_all": {} })
    } else {
        json!({
            "function_score": {
                "query": main_query(&spec.q).render(),
                "functions": scoring_functions(),
                "score_mode": "sum",
                "boost_mode": "multiply",
            }
        })
    };

    let mut body = json!({
        "size": spec.limit,
        "from": spec.offset(),
        "track_total_hits": true,
        "timeout": "15s",
        "_source": SOURCE_FIELDS,
        "query": apply_filters(base_query, spec),
        "sort": sort_clause(spec.sort, !spec.q.is_empty()),
    });

    if !spec.q.is_empty() {
        body["highlight"] = highlight();
        body["rescore"] = rescore_for(&spec.q, rescore_window);
    }

    body
}

/// Build the completion-suggester + fallback-query body for `/api/autocomplete`.
pub fn build_autocomplete_body(q: &str, limit: u32) -> Value {
    json!({
        "suggest": {
            "product-suggest": {
                "prefix": q,
                "completion": {
                    "field": "suggest",
                    "size": limit,
                    "fuzzy": { "fuzziness": "AUTO", "prefix_length": 1 }
                }
            }
        },
        "query": {
            "bool": {
                "should": [
                    { "prefix": { "external_id": { "value": q, "boost": 10 } } },
                    { "prefix": { "name.autocomplete": { "value": q, "boost": 5 } } },
                    { "match_phrase_prefix": { "name": { "query": q, "boost": 3 } } },
                    { "fuzzy": { "name": { "value": q, "fuzziness": "AUTO", "boost": 2 } } },
                    { "prefix": { "brand_name.autocomplete": { "value": q, "boost": 2 } } }
                ]
            }
        },
        "size": limit,
        "_source": SOURCE_FIELDS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_code_requires_digit_and_allowed_charset() {
        assert!(is_code("AB-123"));
        assert!(!is_code("Gadget"));
        assert!(!is_code("has space 1"));
    }

    #[test]
    fn is_code_rejects_overlong_strings() {
        let long = "A1".repeat(30);
        assert!(!is_code(&long));
    }

    #[test]
    fn main_query_includes_code_clauses_only_when_code() {
        let rendered = main_query("AB-123").render();
        let should = rendered["bool"]["should"].as_array().unwrap();
        assert!(should.iter().any(|c| c.get("term").is_some()));

        let rendered = main_query("gadget").render();
        let should = rendered["bool"]["should"].as_array().unwrap();
        assert!(!should.iter().any(|c| c.get("term").is_some()));
    }

    #[test]
    fn multi_word_query_adds_nested_should_clause() {
        let rendered = main_query("cordless hammer drill").render();
        let should = rendered["bool"]["should"].as_array().unwrap();
        assert!(should.iter().any(|c| c.get("bool").is_some()));
    }

    #[test]
    fn sort_relevance_empty_query_orders_by_popularity_then_name() {
        let value = sort_clause(Sort::Relevance, false);
        assert_eq!(value[0]["popularity_score"], "desc");
        assert_eq!(value[1]["name.keyword"], "asc");
    }

    #[test]
    fn price_sorts_fall_back_to_product_id() {
        assert_eq!(sort_clause(Sort::PriceAsc, true)[0]["product_id"], "asc");
        assert_eq!(sort_clause(Sort::PriceDesc, true)[0]["product_id"], "desc");
    }
}
