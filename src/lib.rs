pub mod config;
pub mod document_builder;
pub mod domain;
pub mod envelope;
pub mod error;
pub mod http;
pub mod indexer;
pub mod infrastructure;
pub mod query;

use std::sync::Arc;

use query::service::QueryService;

#[derive(Clone)]
pub struct AppState {
    pub query_service: Arc<QueryService>,
}
