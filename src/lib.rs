// src/lib.rs
// Public library surface for the `upd` binary and integration tests.

pub mod config;
pub mod error;
pub mod local;
pub mod output;
pub mod probe;
pub mod report;
pub mod scheduler;
pub mod state;
pub mod transport;

// ---- Re-exports for stable public API ----
pub use crate::error::{CheckError, CheckResult};
pub use crate::probe::{CheckOptions, Probe, ProbeResult, Registry};
pub use crate::report::{Report, ReportItem, Status, Summary};
pub use crate::scheduler::{run_once, Scheduler};
pub use crate::state::{Observation, State};
