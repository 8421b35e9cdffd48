pub mod config;
pub mod destination;
pub mod entry;
pub mod error;
pub mod station;

pub use config::{Config, SizeMatch};
pub use destination::{destination_path, size_mb, BYTES_PER_MB};
pub use entry::{IngestionEntry, NewEntry, RemoteTarget};
pub use error::*;
pub use station::Station;
