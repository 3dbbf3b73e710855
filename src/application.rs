//! Application layer: scan cycles, digests, scheduling and the run loop

pub mod digest;
pub mod runner;
pub mod scan_cycle;
pub mod schedule;

pub use digest::{NotificationEvent, format_digest, format_operator_alert};
pub use runner::{CleanReport, Runner};
pub use scan_cycle::{CycleReport, ScanCycle, ScanSettings, ScanSource, ScanState, resolve_sources};
