//! # flashsim-sched
//!
//! The I/O scheduling core of the flashsim SSD simulator.
//!
//! The scheduler accepts logical operations — each potentially expanded
//! into a chain of dependent sub-events — and decides, tick by tick, which
//! sub-event reaches the device, in what order, and which pending work a
//! later arrival has made redundant.
//!
//! ## Shape
//!
//! - [`IoScheduler`] owns the event queues, the dependency store, the
//!   per-LBA lock table, the simulation clock, and a seeded RNG that
//!   breaks same-timestamp ties reproducibly.
//! - The block manager, FTL, and device model are held as owned trait
//!   objects (see `flashsim-core`); the scheduler queries them and never
//!   touches their state.
//!
//! ## Determinism
//!
//! The simulation is single-threaded and cooperative. All suspension is
//! explicit: a sub-event that cannot run is re-pushed into a later time
//! bucket. Two runs with the same workload, configuration, and seed
//! produce identical dispatch sequences.
//!
//! ```
//! # fn demo(device: Box<dyn flashsim_core::Device>,
//! #         ftl: Box<dyn flashsim_core::Ftl>,
//! #         bm: Box<dyn flashsim_core::BlockManager>) -> flashsim_core::SchedulerResult<()> {
//! use flashsim_core::{Event, EventId, EventKind, Lba, SchedulerConfig};
//! use flashsim_sched::IoScheduler;
//!
//! let mut scheduler = IoScheduler::new(SchedulerConfig::default(), device, ftl, bm);
//! scheduler.schedule_event(Event::new(EventKind::Write, Lba(7), EventId(1), 0.0))?;
//! scheduler.finish_all_events_until_this_time(1_000.0)?;
//! assert!(scheduler.is_empty());
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

mod deps;
mod lock;
mod queues;
mod resolver;
mod rng;
mod scheduler;
mod stats;

pub use rng::SchedulerRng;
pub use scheduler::IoScheduler;
pub use stats::SchedulerStats;
