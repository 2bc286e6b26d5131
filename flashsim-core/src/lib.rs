//! # flashsim-core
//!
//! Core abstractions for the flashsim SSD-scheduling simulator.
//!
//! This crate provides the vocabulary shared between the scheduler engine
//! and its collaborators. The scheduler decides *when* and *in what order*
//! sub-operations reach the flash device; everything it needs from the
//! outside world is expressed here as a small set of traits:
//!
//! | Trait | Owns | Purpose |
//! |-------|------|---------|
//! | [`BlockManager`] | physical allocation, die busy times | address selection, busy queries, GC migrations |
//! | [`Ftl`] | the logical-to-physical map | address resolution, completion callbacks |
//! | [`Device`] | channel/die timing | executing sub-operations, releasing events |
//!
//! Application code (workload drivers, experiment harnesses) constructs
//! [`Event`]s and hands them to the scheduler; the scheduler consults the
//! traits above and never reaches into their state directly.
//!
//! ## Core types
//!
//! - [`Event`]: one sub-operation at one simulated time
//! - [`EventKind`]: the operation alphabet, including the virtual `Read`
//! - [`PhysicalAddress`]: a (package, die, plane, block, page) tuple
//! - [`SchedulerConfig`]: run configuration (policy, seed, bounds)
//! - [`SchedulerError`]: fatal conditions surfaced to the run driver

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

mod address;
mod config;
mod error;
mod event;
mod traits;
mod types;

pub use address::PhysicalAddress;
pub use config::{BlockManagerId, SchedulerConfig, SchedulingScheme, DEFAULT_WAIT_TIME};
pub use error::{SchedulerError, SchedulerResult};
pub use event::{Event, EventKind, FlexibleRead};
pub use traits::{BlockManager, Device, Ftl, IssueOutcome, MigrationQueue};
pub use types::{tick_of, EventId, Lba, OpId, SimTime};
