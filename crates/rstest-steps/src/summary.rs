//! Aggregate counters returned for each scenario run.

use std::ops::AddAssign;
use std::time::Duration;

/// Totals accumulated across the results of one run.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use rstest_steps::RunSummary;
///
/// let mut summary = RunSummary::passed(Duration::from_millis(3));
/// summary.aggregate(RunSummary::failed(Duration::from_millis(4)));
/// assert_eq!(summary.total, 2);
/// assert_eq!(summary.failed, 1);
/// assert_eq!(summary.time, Duration::from_millis(7));
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Number of reported results.
    pub total: usize,
    /// Number of failed results.
    pub failed: usize,
    /// Number of skipped results.
    pub skipped: usize,
    /// Total elapsed time.
    pub time: Duration,
}

impl RunSummary {
    /// Summary of one passing result.
    #[must_use]
    pub const fn passed(time: Duration) -> Self {
        Self {
            total: 1,
            failed: 0,
            skipped: 0,
            time,
        }
    }

    /// Summary of one failing result.
    #[must_use]
    pub const fn failed(time: Duration) -> Self {
        Self {
            total: 1,
            failed: 1,
            skipped: 0,
            time,
        }
    }

    /// Summary of one skipped result.
    #[must_use]
    pub const fn skipped() -> Self {
        Self {
            total: 1,
            failed: 0,
            skipped: 1,
            time: Duration::ZERO,
        }
    }

    /// Add another summary's counters into this one.
    pub fn aggregate(&mut self, other: Self) {
        self.total += other.total;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.time += other.time;
    }

    /// Number of results that neither failed nor skipped.
    #[must_use]
    pub const fn passed_count(&self) -> usize {
        self.total.saturating_sub(self.failed + self.skipped)
    }

    /// Whether no result failed.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.failed == 0
    }
}

impl AddAssign for RunSummary {
    fn add_assign(&mut self, other: Self) {
        self.aggregate(other);
    }
}
