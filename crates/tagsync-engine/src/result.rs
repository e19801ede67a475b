//! Sync run result types.

use std::ops::AddAssign;

/// Counts for one drain or refresh run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub batches: usize,
    pub records: usize,
}

impl SyncReport {
    /// Report for a single processed batch.
    #[must_use]
    pub fn batch(records: usize) -> Self {
        Self {
            batches: 1,
            records,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batches == 0
    }
}

impl AddAssign for SyncReport {
    fn add_assign(&mut self, rhs: Self) {
        self.batches += rhs.batches;
        self.records += rhs.records;
    }
}

/// What a coordinator entry point did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The run executed and delivered what the report says.
    Completed(SyncReport),
    /// Another run of the same kind was in flight; this trigger was dropped.
    Skipped,
}

impl RunOutcome {
    /// The report, or an empty one when the run was skipped.
    #[must_use]
    pub fn report(self) -> SyncReport {
        match self {
            Self::Completed(report) => report,
            Self::Skipped => SyncReport::default(),
        }
    }

    #[must_use]
    pub fn is_skipped(self) -> bool {
        matches!(self, Self::Skipped)
    }
}
