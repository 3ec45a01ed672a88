//! Durable job snapshots (SQLite via sqlx).
//!
//! Keeps enough of each job to continue it after a restart: the job record
//! itself plus the dataset paths and send timeout of its run.

pub mod db;
mod jobs;

pub use db::JobStore;
pub use jobs::{RunInfo, StoredJob};

#[cfg(test)]
mod tests;
