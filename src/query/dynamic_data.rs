//! Contract for the opaque per-product enrichment collaborator (stock,
//! pricing, delivery estimates — out of scope for this crate per §1). The
//! query path only ever sees this trait; no concrete backend lives here.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

pub trait DynamicDataProvider: Send + Sync {
    /// Looks up per-product attributes for `product_ids`, scoped by an
    /// optional city/user. A failed or slow provider must never be allowed
    /// to fail the surrounding request — callers log and merge whatever
    /// came back, which for an erroring provider is nothing.
    fn fetch<'a>(
        &'a self,
        product_ids: &'a [i64],
        city_id: Option<i64>,
        user_id: Option<i64>,
    ) -> Pin<Box<dyn Future<Output = HashMap<i64, Value>> + Send + 'a>>;
}

/// Stand-in used when no enrichment collaborator is wired up: every lookup
/// returns an empty map, which is indistinguishable at the call site from a
/// real provider that found nothing.
#[derive(Debug, Clone, Default)]
pub struct NoopDynamicDataProvider;

impl DynamicDataProvider for NoopDynamicDataProvider {
    fn fetch<'a>(
        &'a self,
        _product_ids: &'a [i64],
        _city_id: Option<i64>,
        _user_id: Option<i64>,
    ) -> Pin<Box<dyn Future<Output = HashMap<i64, Value>> + Send + 'a>> {
        Box::pin(async { HashMap::new() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_provider_returns_empty_map() {
        let provider = NoopDynamicDataProvider;
        let result = provider.fetch(&[1, 2, 3], Some(7), None).await;
        assert!(result.is_empty());
    }
}
