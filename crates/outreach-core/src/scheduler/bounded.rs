//! Concurrency slots plus start window over a `JoinSet` of units.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;

use super::window::StartWindow;
use crate::config::SchedulerConfig;

/// Limits applied to every submitted unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerLimits {
    pub concurrency: usize,
    pub interval_cap: usize,
    pub interval: Duration,
}

impl From<&SchedulerConfig> for SchedulerLimits {
    fn from(cfg: &SchedulerConfig) -> Self {
        Self {
            concurrency: cfg.concurrency,
            interval_cap: cfg.interval_cap,
            interval: cfg.interval(),
        }
    }
}

/// Counters for observing the scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub in_flight: usize,
    pub peak_in_flight: usize,
    pub started: usize,
}

#[derive(Debug, Default)]
struct Gauge {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    started: AtomicUsize,
}

impl Gauge {
    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak.fetch_max(now, Ordering::AcqRel);
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Decrements the in-flight gauge when the unit ends, even if it panics.
struct InFlight(Arc<Gauge>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.leave();
    }
}

/// A concurrency slot plus a start inside the window, not yet used.
///
/// Dropping it without [`BoundedScheduler::start`] frees the slot; the
/// window start stays spent.
#[must_use = "a reservation does nothing until passed to start"]
#[derive(Debug)]
pub struct Reservation {
    permit: OwnedSemaphorePermit,
}

/// Runs units with bounded concurrency and a bounded start rate.
pub struct BoundedScheduler {
    slots: Arc<Semaphore>,
    window: StartWindow,
    units: JoinSet<()>,
    gauge: Arc<Gauge>,
}

impl BoundedScheduler {
    pub fn new(limits: SchedulerLimits) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(limits.concurrency.max(1))),
            window: StartWindow::new(limits.interval_cap, limits.interval),
            units: JoinSet::new(),
            gauge: Arc::new(Gauge::default()),
        }
    }

    /// Wait for a free slot and a start inside the window.
    pub async fn reserve(&self) -> Result<Reservation> {
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .context("scheduler slots closed")?;
        self.window.acquire().await;
        Ok(Reservation { permit })
    }

    /// Spawn `unit` on a slot taken by [`reserve`](Self::reserve).
    pub fn start<F>(&mut self, reservation: Reservation, unit: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.gauge.enter();
        let in_flight = InFlight(Arc::clone(&self.gauge));
        let permit = reservation.permit;
        self.units.spawn(async move {
            let _permit = permit;
            let _in_flight = in_flight;
            unit.await;
        });
        self.reap();
    }

    /// Start `unit` once a slot is free and the window allows a start.
    /// Returns when the unit has started, not when it finishes.
    pub async fn submit<F>(&mut self, unit: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let reservation = self.reserve().await?;
        self.start(reservation, unit);
        Ok(())
    }

    /// Collect finished units without waiting.
    fn reap(&mut self) {
        while let Some(res) = self.units.try_join_next() {
            log_unit_result(res);
        }
    }

    /// Wait for every submitted unit to finish.
    pub async fn drain(&mut self) {
        while let Some(res) = self.units.join_next().await {
            log_unit_result(res);
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            in_flight: self.gauge.in_flight.load(Ordering::Acquire),
            peak_in_flight: self.gauge.peak.load(Ordering::Acquire),
            started: self.gauge.started.load(Ordering::Relaxed),
        }
    }
}

fn log_unit_result(res: Result<(), tokio::task::JoinError>) {
    if let Err(e) = res {
        tracing::error!("scheduler unit did not finish: {}", e);
    }
}
