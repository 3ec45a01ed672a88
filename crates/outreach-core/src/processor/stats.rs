//! Run counters, kept by the driver.
//!
//! A row is counted when its outcome is written into the sheet, so the
//! counters saved with a flushed dataset describe exactly the rows it holds.

use super::unit::{RowOutcome, SendOutcome};
use crate::job::JobStats;

#[derive(Debug, Default)]
pub(crate) struct StatsCounter {
    stats: JobStats,
}

impl StatsCounter {
    /// Start from an earlier run segment's counters.
    pub(crate) fn seeded(stats: &JobStats) -> Self {
        Self { stats: *stats }
    }

    pub(crate) fn record_invalid(&mut self) {
        self.stats.total += 1;
        self.stats.invalid += 1;
    }

    pub(crate) fn record(&mut self, outcome: &RowOutcome) {
        let s = &mut self.stats;
        s.total += 1;
        match outcome {
            RowOutcome::NotFound => s.not_found += 1,
            RowOutcome::LookupFailed(_) => s.error += 1,
            RowOutcome::Found { send, .. } => {
                s.found += 1;
                match send {
                    SendOutcome::Sent => s.send_message_success += 1,
                    SendOutcome::Failed(_) | SendOutcome::TimedOut { .. } | SendOutcome::NoTarget => {
                        s.send_message_failed += 1
                    }
                }
            }
        }
    }

    pub(crate) fn snapshot(&self) -> JobStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn found(send: SendOutcome) -> RowOutcome {
        RowOutcome::Found {
            name: "An".to_string(),
            user_id: "u1".to_string(),
            phone: "0912345678".to_string(),
            avatar: "N/A".to_string(),
            send,
        }
    }

    #[test]
    fn seeded_counters_continue_from_previous_segment() {
        let previous = JobStats {
            total: 5,
            found: 4,
            send_message_success: 3,
            ..Default::default()
        };
        let mut stats = StatsCounter::seeded(&previous);
        stats.record(&found(SendOutcome::TimedOut { after_ms: 50 }));
        let snap = stats.snapshot();
        assert_eq!(snap.total, 6);
        assert_eq!(snap.found, 5);
        assert_eq!(snap.send_message_success, 3);
        assert_eq!(snap.send_message_failed, 1);
    }

    #[test]
    fn each_outcome_lands_in_one_bucket() {
        let mut stats = StatsCounter::default();
        stats.record_invalid();
        stats.record(&RowOutcome::NotFound);
        stats.record(&RowOutcome::LookupFailed("quota".to_string()));
        stats.record(&found(SendOutcome::Sent));
        stats.record(&found(SendOutcome::NoTarget));
        assert_eq!(
            stats.snapshot(),
            JobStats {
                total: 5,
                invalid: 1,
                found: 2,
                not_found: 1,
                error: 1,
                send_message_success: 1,
                send_message_failed: 1,
            }
        );
    }
}
