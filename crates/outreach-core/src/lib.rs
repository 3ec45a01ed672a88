pub mod config;
pub mod logging;

// Job processing engine
pub mod control;
pub mod guard;
pub mod job;
pub mod processor;
pub mod provider;
pub mod scheduler;
pub mod sheet;
pub mod store;

/// Current time as Unix milliseconds (job deadlines, artifact names, DB timestamps).
pub fn unix_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
