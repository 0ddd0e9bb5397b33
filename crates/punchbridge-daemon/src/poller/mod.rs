//! Interval-driven device polling.

mod events;
mod scheduler;

pub use events::{SyncEvent, SyncResult};
pub use scheduler::{PollScheduler, SweepError};
