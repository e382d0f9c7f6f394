//! Durable daily-slot scheduler for autopost.
//!
//! This crate provides a persistent scheduler that:
//! - Fires jobs at fixed local-time-of-day slots (timezone-aware)
//! - Stores next-run instants as a JSON file, rewritten atomically
//! - Survives crashes and restarts without double-firing or missed slots
//! - Always advances a fired job by one local calendar day

mod error;
mod scheduler;
mod slot;
mod state;
mod types;

pub use error::SchedulerError;
pub use scheduler::{FireHandler, FiringOutcome, Scheduler, warn_if_stale};
pub use slot::{advance_one_day, next_occurrence};
pub use state::{JsonStateStore, MemoryStateStore, ScheduleState, StateStore};
pub use types::{Job, JobKind, JobTable, SlotTime};
