//! `RelationalStore`: the source of truth. Streams rows for the indexer and
//! implements the degraded fallback search/autocomplete paths used when the
//! search backend is down.

use sqlx::{PgPool, Postgres, QueryBuilder, Row};

use crate::domain::product::ProductRow;
use crate::domain::query_spec::{SearchFilters, SearchSpec};
use crate::error::AppError;

#[derive(Clone)]
pub struct RelationalStore {
    pool: PgPool,
}

const PRODUCT_COLUMNS: &str = r#"
    p.product_id,
    p.external_id,
    p.sku,
    p.name,
    p.description,
    p.brand_id,
    COALESCE(b.name, '') as brand_name,
    p.series_id,
    COALESCE(s.name, '') as series_name,
    p.unit,
    p.dimensions,
    p.min_sale,
    p.weight,
    p.popularity_score,
    p.in_stock,
    p.created_at,
    p.updated_at
"#;

const PRODUCT_FROM: &str = r#"
    FROM products p
    LEFT JOIN brands b ON b.brand_id = p.brand_id
    LEFT JOIN series s ON s.series_id = p.series_id
"#;

impl RelationalStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Count of rows with `product_id > 0`, used by ANALYZE to reject an
    /// empty catalogue before a reindex run begins.
    pub async fn total_products(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM products WHERE product_id > 0")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("count"))
    }

    /// One page of the relational stream, ordered ascending by
    /// `product_id`. An empty batch signals the stream is exhausted.
    pub async fn stream_page(&self, offset: i64, batch_size: i64) -> Result<Vec<ProductRow>, AppError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} {PRODUCT_FROM} ORDER BY p.product_id ASC LIMIT $1 OFFSET $2"
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(batch_size)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Applies the §4.7 predicate (free-text ILIKE across the identifying
    /// fields plus brand/series filters) to `builder`, shared by the row scan
    /// and its companion `COUNT(*)` so both see exactly the same candidate set.
    fn push_predicate(builder: &mut QueryBuilder<'_, Postgres>, spec: &SearchSpec) {
        let has_predicate = !spec.q.is_empty() || has_filters(&spec.filters);
        if !has_predicate {
            return;
        }
        builder.push(" WHERE ");
        let mut separated = builder.separated(" AND ");
        if !spec.q.is_empty() {
            let like = format!("%{}%", spec.q);
            separated.push("(p.external_id ILIKE ");
            separated.push_bind_unseparated(like.clone());
            separated.push_unseparated(" OR p.sku ILIKE ");
            separated.push_bind_unseparated(like.clone());
            separated.push_unseparated(" OR p.name ILIKE ");
            separated.push_bind_unseparated(like.clone());
            separated.push_unseparated(" OR COALESCE(b.name, '') ILIKE ");
            separated.push_bind_unseparated(like.clone());
            separated.push_unseparated(" OR p.description ILIKE ");
            separated.push_bind_unseparated(like);
            separated.push_unseparated(")");
        }
        if let Some(brand_name) = &spec.filters.brand_name {
            separated.push("b.name = ");
            separated.push_bind_unseparated(brand_name.clone());
        }
        if let Some(series_name) = &spec.filters.series_name {
            separated.push("s.name = ");
            separated.push_bind_unseparated(series_name.clone());
        }
    }

    /// Degraded search path: a relevance score is computed per candidate row
    /// in application code rather than via a backend-specific `CASE`
    /// expression, so the ranking logic is portable across relational
    /// engines (see DESIGN.md). `total` comes from a companion `COUNT(*)`
    /// query run against the same predicate, per §4.7; the row scan itself
    /// is unbounded so ranking sees the full filtered set, not a truncated
    /// sample.
    pub async fn fallback_search(
        &self,
        spec: &SearchSpec,
    ) -> Result<(Vec<ProductRow>, i64), AppError> {
        let mut count_builder = QueryBuilder::<Postgres>::new(format!("SELECT COUNT(*) as count {PRODUCT_FROM}"));
        Self::push_predicate(&mut count_builder, spec);
        let count_row = count_builder.build().fetch_one(&self.pool).await?;
        let total: i64 = count_row.get("count");

        let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {PRODUCT_COLUMNS} {PRODUCT_FROM}"));
        Self::push_predicate(&mut builder, spec);
        builder.push(" ORDER BY p.product_id ASC");

        let rows = builder
            .build_query_as::<ProductRow>()
            .fetch_all(&self.pool)
            .await?;

        let mut scored: Vec<(i64, ProductRow)> = rows
            .into_iter()
            .map(|row| (relevance_score(&row, &spec.q), row))
            .collect();
        scored.sort_by(|(score_a, row_a), (score_b, row_b)| {
            score_b.cmp(score_a).then_with(|| row_a.name.cmp(&row_b.name))
        });

        let offset = spec.offset() as usize;
        let page: Vec<ProductRow> = scored
            .into_iter()
            .skip(offset)
            .take(spec.limit as usize)
            .map(|(_, row)| row)
            .collect();
        Ok((page, total))
    }

    /// Degraded autocomplete path: prefix, contains, then phonetic
    /// (soundex-equivalent) matching, in that priority order.
    pub async fn fallback_autocomplete(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<FallbackSuggestion>, AppError> {
        let like_prefix = format!("{query}%");
        let like_contains = format!("%{query}%");
        let rows = sqlx::query(
            r#"
            SELECT product_id, external_id, name
            FROM products
            WHERE name ILIKE $1 OR external_id ILIKE $1
            ORDER BY product_id ASC
            LIMIT 500
            "#,
        )
        .bind(&like_contains)
        .fetch_all(&self.pool)
        .await?;

        let query_soundex = soundex(query);
        let mut scored: Vec<(f64, FallbackSuggestion)> = rows
            .into_iter()
            .map(|row| {
                let name: String = row.get("name");
                let external_id: String = row.get("external_id");
                let product_id: i64 = row.get("product_id");
                let score = if name.to_ascii_lowercase().starts_with(&query.to_ascii_lowercase())
                    || external_id.to_ascii_lowercase().starts_with(&query.to_ascii_lowercase())
                {
                    100.0
                } else if name.to_ascii_lowercase().contains(&query.to_ascii_lowercase()) {
                    50.0
                } else if soundex(&name) == query_soundex {
                    10.0
                } else {
                    1.0
                };
                (
                    score,
                    FallbackSuggestion {
                        text: name,
                        external_id,
                        score,
                        product_id,
                    },
                )
            })
            .collect();
        let _ = like_prefix;
        scored.sort_by(|(a, _), (b, _)| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored
            .into_iter()
            .take(limit as usize)
            .map(|(_, s)| s)
            .collect())
    }
}

#[derive(Debug, Clone)]
pub struct FallbackSuggestion {
    pub text: String,
    pub external_id: String,
    pub score: f64,
    pub product_id: i64,
}

fn has_filters(filters: &SearchFilters) -> bool {
    filters.brand_name.is_some() || filters.series_name.is_some() || filters.category.is_some()
}

/// Application-side implementation of the §4.7 `CASE`-based ranking table.
fn relevance_score(row: &ProductRow, q: &str) -> i64 {
    if q.is_empty() {
        return 0;
    }
    let q_lower = q.to_ascii_lowercase();
    let external_id = row.external_id.to_ascii_lowercase();
    let sku = row.sku.to_ascii_lowercase();
    let name = row.name.to_ascii_lowercase();
    let brand_name = row.brand_name.to_ascii_lowercase();
    let description = row.description.to_ascii_lowercase();

    if external_id == q_lower {
        1000
    } else if sku == q_lower {
        900
    } else if external_id.starts_with(&q_lower) {
        100
    } else if sku.starts_with(&q_lower) {
        90
    } else if name == q_lower {
        80
    } else if name.starts_with(&q_lower) {
        50
    } else if name.contains(&q_lower) {
        30
    } else if brand_name.contains(&q_lower) {
        20
    } else if description.contains(&q_lower) {
        10
    } else {
        1
    }
}

/// Minimal American Soundex, used as the phonetic fallback tier of
/// autocomplete matching. Not crate-backed: no dependency in this corpus
/// provides it, and it is small, well-defined domain logic rather than
/// ambient scaffolding.
fn soundex(input: &str) -> String {
    let mut chars = input.chars().filter(|c| c.is_alphabetic());
    let Some(first) = chars.next() else {
        return String::new();
    };
    let code = |c: char| -> u8 {
        match c.to_ascii_uppercase() {
            'B' | 'F' | 'P' | 'V' => b'1',
            'C' | 'G' | 'J' | 'K' | 'Q' | 'S' | 'X' | 'Z' => b'2',
            'D' | 'T' => b'3',
            'L' => b'4',
            'M' | 'N' => b'5',
            'R' => b'6',
            _ => b'0',
        }
    };
    let mut result = first.to_ascii_uppercase().to_string();
    let mut last_code = code(first);
    for c in chars {
        let current = code(c);
        if current != b'0' && current != last_code {
            result.push(current as char);
        }
        last_code = current;
        if result.len() >= 4 {
            break;
        }
    }
    while result.len() < 4 {
        result.push('0');
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(product_id: i64, external_id: &str, sku: &str, name: &str, brand: &str, desc: &str) -> ProductRow {
        ProductRow {
            product_id,
            external_id: external_id.to_string(),
            sku: sku.to_string(),
            name: name.to_string(),
            description: desc.to_string(),
            brand_id: 0,
            brand_name: brand.to_string(),
            series_id: 0,
            series_name: String::new(),
            unit: String::new(),
            dimensions: String::new(),
            min_sale: 1,
            weight: 0.0,
            popularity_score: 0.0,
            in_stock: false,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn exact_external_id_outranks_everything() {
        let r = row(1, "AB-123", "S1", "Gadget", "Acme", "");
        assert_eq!(relevance_score(&r, "AB-123"), 1000);
    }

    #[test]
    fn name_contains_outranks_brand_and_description() {
        let r = row(1, "X", "Y", "Hammer drill", "Acme", "a drill for hammering");
        assert_eq!(relevance_score(&r, "drill"), 30);
    }

    #[test]
    fn no_match_falls_back_to_one() {
        let r = row(1, "X", "Y", "Gadget", "Acme", "");
        assert_eq!(relevance_score(&r, "zzz"), 1);
    }

    #[test]
    fn soundex_groups_similar_sounding_words() {
        assert_eq!(soundex("Robert"), soundex("Rupert"));
        assert_ne!(soundex("Robert"), soundex("Gadget"));
    }
}
