//! Validated request DTOs. Raw HTTP query params are turned into these via
//! [`SearchSpec::from_raw`]/[`AutocompleteSpec::from_raw`] — the only place
//! clamping and the sort whitelist are applied.

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sort {
    Relevance,
    Name,
    ExternalId,
    PriceAsc,
    PriceDesc,
    Availability,
    Popularity,
}

impl Sort {
    /// Unknown/unparseable sort values fall back to `relevance` per §4.5.
    pub fn parse_or_default(raw: Option<&str>) -> Self {
        match raw.map(str::to_ascii_lowercase).as_deref() {
            Some("name") => Sort::Name,
            Some("external_id") => Sort::ExternalId,
            Some("price_asc") => Sort::PriceAsc,
            Some("price_desc") => Sort::PriceDesc,
            Some("availability") => Sort::Availability,
            Some("popularity") => Sort::Popularity,
            _ => Sort::Relevance,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub brand_name: Option<String>,
    pub series_name: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SearchSpec {
    pub q: String,
    pub page: u32,
    pub limit: u32,
    pub sort: Sort,
    pub city_id: Option<i64>,
    pub user_id: Option<i64>,
    pub filters: SearchFilters,
}

/// Raw, unvalidated query params as axum would deserialize them from the
/// HTTP querystring. Numeric fields are kept as strings here so a malformed
/// value (`page=abc`) fails inside [`SearchSpec::from_raw`] and comes back
/// as a `ResponseEnvelope`, rather than axum's own `QueryRejection` (plain
/// text, no envelope) rejecting the extractor before the handler runs.
#[derive(Debug, Deserialize, Default)]
pub struct RawSearchParams {
    pub q: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
    pub sort: Option<String>,
    pub city_id: Option<String>,
    pub user_id: Option<String>,
    pub brand_name: Option<String>,
    pub series_name: Option<String>,
    pub category: Option<String>,
}

/// Parses an optional numeric querystring field, treating an absent or
/// empty value as `None` and any non-numeric value as a validation error.
fn parse_opt_i64(field: &str, raw: Option<&str>) -> Result<Option<i64>, String> {
    match raw.map(str::trim) {
        None => Ok(None),
        Some("") => Ok(None),
        Some(s) => s.parse::<i64>().map(Some).map_err(|_| format!("{field} must be an integer")),
    }
}

impl SearchSpec {
    pub fn from_raw(raw: RawSearchParams, q_length_cap: usize) -> Result<Self, String> {
        let page = parse_opt_i64("page", raw.page.as_deref())?.unwrap_or(1).max(1) as u32;
        let limit = parse_opt_i64("limit", raw.limit.as_deref())?.unwrap_or(20).clamp(1, 100) as u32;
        let city_id = parse_opt_i64("city_id", raw.city_id.as_deref())?;
        let user_id = parse_opt_i64("user_id", raw.user_id.as_deref())?;
        let mut q = raw.q.unwrap_or_default();
        if q.chars().count() > q_length_cap {
            q = q.chars().take(q_length_cap).collect();
        }
        Ok(SearchSpec {
            q,
            page,
            limit,
            sort: Sort::parse_or_default(raw.sort.as_deref()),
            city_id,
            user_id,
            filters: SearchFilters {
                brand_name: raw.brand_name.filter(|v| !v.is_empty()),
                series_name: raw.series_name.filter(|v| !v.is_empty()),
                category: raw.category.filter(|v| !v.is_empty()),
            },
        })
    }

    pub fn offset(&self) -> u32 {
        (self.page - 1) * self.limit
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct RawAutocompleteParams {
    pub q: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AutocompleteSpec {
    pub q: String,
    pub limit: u32,
}

/// Characters outside `\p{L}\p{N}\s-_.` are stripped before querying (§8
/// boundary behavior); an empty post-strip query yields no suggestions.
fn sanitize_autocomplete_query(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-' || *c == '_' || *c == '.')
        .collect()
}

impl AutocompleteSpec {
    /// `Ok(None)` means "no suggestions, not an error" (empty post-sanitize
    /// query); `Err` is a genuine validation failure (non-numeric `limit`).
    pub fn from_raw(raw: RawAutocompleteParams) -> Result<Option<Self>, String> {
        let sanitized = sanitize_autocomplete_query(raw.q.unwrap_or_default().trim());
        if sanitized.is_empty() {
            return Ok(None);
        }
        let limit = parse_opt_i64("limit", raw.limit.as_deref())?.unwrap_or(10).clamp(1, 20) as u32;
        Ok(Some(AutocompleteSpec { q: sanitized, limit }))
    }
}

/// `product_ids` CSV parsing for the availability endpoint: up to
/// `max_ids` distinct positive integers, else a validation error.
pub fn parse_product_ids(csv: &str, max_ids: usize) -> Result<Vec<i64>, String> {
    let mut ids = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for part in csv.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let id: i64 = part
            .parse()
            .map_err(|_| format!("invalid product id: {part}"))?;
        if id <= 0 {
            return Err(format!("product id must be positive: {id}"));
        }
        if seen.insert(id) {
            ids.push(id);
        }
    }
    if ids.len() > max_ids {
        return Err(format!("product_ids exceeds max of {max_ids}"));
    }
    Ok(ids)
}
