pub mod clock;
pub mod job;
pub mod logging;
pub mod report;
pub mod runtime;

pub use clock::{Clock, FixedClock, SystemClock};
pub use job::{JobSettings, ReconcileJob};
pub use report::{EntryOutcome, EntryReport, RunReport};
pub use runtime::{Runtime, RuntimeError};
