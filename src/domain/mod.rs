pub mod document;
pub mod product;
pub mod query_spec;
