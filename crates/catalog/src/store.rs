use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use loghaul_core::IngestionEntry;

use crate::row::Catalog;

#[derive(Debug, Error)]
pub enum CatalogStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Outcome of [`CatalogStore::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Updated,
}

/// JSON-file-backed catalog of ingestion entries.
///
/// The catalog is a single JSON array, rewritten in full on every save:
/// ```text
/// [
///     { "station": "IR", "label": "IR_EXP_10", "user": "ubuntu", ... },
///     ...
/// ]
/// ```
/// There is no locking; a single writer process is assumed.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    path: PathBuf,
}

impl CatalogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file for this store.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every entry, treating a missing or unreadable catalog as empty.
    pub fn load(&self) -> Vec<IngestionEntry> {
        self.load_catalog().into_entries()
    }

    /// Load every entry, surfacing parse and I/O failures.
    ///
    /// A missing file is not an error and yields an empty catalog.
    pub fn try_load(&self) -> Result<Vec<IngestionEntry>, CatalogStoreError> {
        Ok(self.try_load_catalog()?.into_entries())
    }

    /// Load the catalog with its raw rows, treating a missing or unreadable
    /// file as empty.
    pub fn load_catalog(&self) -> Catalog {
        match self.try_load_catalog() {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "catalog unreadable, treating as empty"
                );
                Catalog::default()
            }
        }
    }

    /// Load the catalog with its raw rows.
    ///
    /// Only a file that is not a JSON array fails; a row that does not fit
    /// the entry shape is kept and flagged instead.
    pub fn try_load_catalog(&self) -> Result<Catalog, CatalogStoreError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "catalog file absent");
            return Ok(Catalog::default());
        }
        let json = std::fs::read_to_string(&self.path)?;
        let values: Vec<Value> = serde_json::from_str(&json)?;
        Ok(Catalog::from_values(values))
    }

    /// Overwrite the catalog with `entries`.
    pub fn save(&self, entries: &[IngestionEntry]) -> Result<(), CatalogStoreError> {
        self.save_catalog(&Catalog::from_entries(entries.iter().cloned()))
    }

    /// Write every row back as it was read, plus any changes made to it.
    pub fn save_catalog(&self, catalog: &Catalog) -> Result<(), CatalogStoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, to_pretty_json(&catalog.raw_values())?)?;
        debug!(path = %self.path.display(), entries = catalog.len(), "catalog saved");
        Ok(())
    }

    /// Look up an entry by label.
    pub fn find(&self, label: &str) -> Result<Option<IngestionEntry>, CatalogStoreError> {
        Ok(self.try_load_catalog()?.find(label).cloned())
    }

    /// Insert `entry`, or replace the entry with the same label in place.
    ///
    /// Refuses to touch a catalog that cannot be parsed.
    pub fn upsert(&self, entry: IngestionEntry) -> Result<Upsert, CatalogStoreError> {
        let mut catalog = self.try_load_catalog()?;
        let outcome = if catalog.upsert(entry) {
            Upsert::Updated
        } else {
            Upsert::Inserted
        };
        self.save_catalog(&catalog)?;
        info!(path = %self.path.display(), ?outcome, "catalog entry stored");
        Ok(outcome)
    }
}

/// Pretty-print with four-space indentation.
fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(buf)
}
