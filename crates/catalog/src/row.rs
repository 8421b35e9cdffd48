//! Catalog rows that keep the JSON they were read from.
//!
//! The catalog is shared with other producers, so rows may carry keys this
//! crate does not know about or omit keys it does. Each row keeps its raw
//! value and only the keys that are actually changed get rewritten.

use serde_json::{Map, Value};
use tracing::warn;

use loghaul_core::IngestionEntry;

/// One element of the catalog array.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogRow {
    raw: Value,
    entry: IngestionEntry,
    parse_error: Option<String>,
}

impl CatalogRow {
    /// Interpret one raw array element. A row that does not fit the entry
    /// shape is kept verbatim and flagged with [`CatalogRow::parse_error`].
    pub fn from_value(index: usize, raw: Value) -> Self {
        match serde_json::from_value::<IngestionEntry>(raw.clone()) {
            Ok(entry) => Self {
                raw,
                entry,
                parse_error: None,
            },
            Err(e) => {
                warn!(index, error = %e, "catalog row does not match the entry shape");
                let label = raw
                    .get("label")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                Self {
                    raw,
                    entry: IngestionEntry {
                        label,
                        ..Default::default()
                    },
                    parse_error: Some(e.to_string()),
                }
            }
        }
    }

    pub fn from_entry(entry: IngestionEntry) -> Self {
        Self {
            raw: entry_value(&entry),
            entry,
            parse_error: None,
        }
    }

    pub fn entry(&self) -> &IngestionEntry {
        &self.entry
    }

    pub fn into_entry(self) -> IngestionEntry {
        self.entry
    }

    /// The row exactly as it will be written back.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Why the row could not be read as an entry, if it could not.
    pub fn parse_error(&self) -> Option<&str> {
        self.parse_error.as_deref()
    }

    /// Record an ingestion time. Only the `timestamp` key of the raw row changes.
    pub fn set_timestamp(&mut self, timestamp: &str) {
        if let Value::Object(map) = &mut self.raw {
            map.insert("timestamp".to_string(), Value::String(timestamp.to_string()));
        }
        self.entry.timestamp = Some(timestamp.to_string());
    }

    /// Overwrite the known fields with `entry`, keeping unknown keys.
    /// A replaced row starts over without a timestamp unless `entry` has one.
    pub fn replace(&mut self, entry: IngestionEntry) {
        match (&mut self.raw, entry_value(&entry)) {
            (Value::Object(map), Value::Object(fields)) => {
                if entry.timestamp.is_none() {
                    map.remove("timestamp");
                }
                map.extend(fields);
            }
            (raw, fields) => *raw = fields,
        }
        self.entry = entry;
        self.parse_error = None;
    }
}

fn entry_value(entry: &IngestionEntry) -> Value {
    serde_json::to_value(entry).unwrap_or_else(|_| Value::Object(Map::new()))
}

/// The whole catalog in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    rows: Vec<CatalogRow>,
}

impl Catalog {
    pub fn from_values(values: Vec<Value>) -> Self {
        Self {
            rows: values
                .into_iter()
                .enumerate()
                .map(|(i, v)| CatalogRow::from_value(i, v))
                .collect(),
        }
    }

    pub fn from_entries(entries: impl IntoIterator<Item = IngestionEntry>) -> Self {
        Self {
            rows: entries.into_iter().map(CatalogRow::from_entry).collect(),
        }
    }

    pub fn rows(&self) -> &[CatalogRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CatalogRow> {
        self.rows.get(index)
    }

    pub fn set_timestamp(&mut self, index: usize, timestamp: &str) {
        if let Some(row) = self.rows.get_mut(index) {
            row.set_timestamp(timestamp);
        }
    }

    pub fn find(&self, label: &str) -> Option<&IngestionEntry> {
        self.rows
            .iter()
            .map(CatalogRow::entry)
            .find(|e| e.label == label)
    }

    /// Replace the row with the same label in place, or append. Returns
    /// `true` when an existing row was replaced.
    pub fn upsert(&mut self, entry: IngestionEntry) -> bool {
        match self.rows.iter_mut().find(|r| r.entry.label == entry.label) {
            Some(row) => {
                row.replace(entry);
                true
            }
            None => {
                self.rows.push(CatalogRow::from_entry(entry));
                false
            }
        }
    }

    pub fn raw_values(&self) -> Vec<&Value> {
        self.rows.iter().map(CatalogRow::raw).collect()
    }

    pub fn into_entries(self) -> Vec<IngestionEntry> {
        self.rows.into_iter().map(CatalogRow::into_entry).collect()
    }
}
