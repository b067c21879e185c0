//! Host metrics samplers for Linux.
//!
//! This module reads the `/proc` filesystem (plus `statvfs(3)` for mounts)
//! and turns each source into a [`Table`](crate::table::Table). All OS
//! access goes through the [`FileSystem`] trait so samplers can be tested
//! against [`MockFs`] on any platform.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        Sampler                           │
//! │   Family::Cpu ──► /proc/stat       Family::Mem  ──► ...  │
//! │   Family::Network ──► /proc/net/dev                      │
//! │   Family::Mounts ──► /proc/mounts + statvfs              │
//! │                           │                              │
//! │                    ┌──────▼──────┐                       │
//! │                    │  FileSystem │ (trait)               │
//! │                    └──────┬──────┘                       │
//! └───────────────────────────┼──────────────────────────────┘
//!                             │
//!              ┌──────────────┼──────────────┐
//!              │              │              │
//!       ┌──────▼──────┐ ┌─────▼──────┐ ┌─────▼──────┐
//!       │   RealFs    │ │   MockFs   │ │ Scenarios  │
//!       │  (Linux)    │ │ (Testing)  │ │ (Fixtures) │
//!       └─────────────┘ └────────────┘ └────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use sysinflux_core::collector::{Family, MockFs, Sampler};
//!
//! let sampler = Sampler::new(MockFs::typical_system(), "/proc", "web01.");
//! let table = sampler.sample(Family::Load).unwrap();
//! assert_eq!(table.name, "web01.load");
//! ```

pub mod family;
pub mod mock;
pub mod procfs;
pub mod sampler;
pub mod traits;

pub use family::Family;
pub use mock::MockFs;
pub use sampler::{SampleError, Sampler};
pub use traits::{FileSystem, FsStat, RealFs};
