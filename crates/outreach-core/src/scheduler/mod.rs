//! Bounded scheduler for provider work.
//!
//! Two independent limits apply to every unit: at most `concurrency` units
//! execute at once (a semaphore of slots), and at most `interval_cap` units
//! start within any rolling `interval` (a sliding window of start times).
//! `reserve` waits for both a slot and a start, and `start` spawns the unit
//! on that reservation, so a caller can re-check its own state between the
//! two. The caller never waits on the unit's own work. `drain` awaits
//! everything still in flight.

mod bounded;
mod window;

pub use bounded::{BoundedScheduler, Reservation, SchedulerLimits, SchedulerStats};
pub use window::StartWindow;
