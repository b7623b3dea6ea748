//! Host workload collection and log windowing for diagnostic bundles.
//!
//! - [`sar`]: parses `sar` reports into [`workload::WorkloadTable`]s, with
//!   per-distribution column layouts and multi-day archive reads.
//! - [`sampler`]: produces the same tables from procfs counters when sar is
//!   not installed.
//! - [`logwindow`]: extracts a time window from large logs by reading them
//!   backwards.

pub mod config;
pub mod logwindow;
pub mod osinfo;
pub mod sampler;
pub mod sar;
pub mod system;
pub mod workload;
