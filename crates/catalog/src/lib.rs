//! Persisted catalog of ingestion entries.

pub mod row;
pub mod store;

pub use row::{Catalog, CatalogRow};
pub use store::{CatalogStore, CatalogStoreError, Upsert};
