//! sysinflux-core — host metrics sampling and rate normalization.
//!
//! Provides:
//! - `collector` — `/proc` samplers, one per metric family
//! - `rates` — counter-to-rate normalization with per-table raw snapshots
//! - `orchestrator` — concurrent laps, completeness checks, emission
//! - `sink` — display (text/JSON) and InfluxDB outputs
//! - `table` — the measurement table exchanged between all of the above
//! - `config` — startup configuration
//! - `util` — hostname, pid file and secret file helpers

pub mod collector;
pub mod config;
pub mod orchestrator;
pub mod rates;
pub mod sink;
pub mod table;
pub mod util;

/// Crate version with the git revision it was built from.
pub const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("SYSINFLUX_GIT_SHA"),
    ")"
);
