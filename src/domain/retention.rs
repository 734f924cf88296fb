//! Holder Retention
//!
//! Buckets a holder by how much of the first buy they still hold.
//! Comparisons are done in u128 so large supplies never overflow.

use std::fmt;

use serde::Serialize;

use super::holder::Holder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RetentionStatus {
    /// Holds more than the initial buy
    Increased,
    /// Holds more than 90% of the initial buy
    Holding,
    /// Holds more than half
    Partial,
    /// Holds something
    Reduced,
    /// Holds nothing
    Sold,
    /// Last refresh failed, the balance cannot be trusted
    Unknown,
}

impl RetentionStatus {
    pub fn classify(initial: u64, current: u64, stale: bool) -> Self {
        if stale {
            return RetentionStatus::Unknown;
        }
        let (initial, current) = (initial as u128, current as u128);
        if current > initial {
            RetentionStatus::Increased
        } else if current * 10 > initial * 9 {
            RetentionStatus::Holding
        } else if current * 2 > initial {
            RetentionStatus::Partial
        } else if current > 0 {
            RetentionStatus::Reduced
        } else {
            RetentionStatus::Sold
        }
    }

    pub fn of(holder: &Holder) -> Self {
        Self::classify(holder.initial_balance, holder.current_balance, holder.stale)
    }
}

impl fmt::Display for RetentionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RetentionStatus::Increased => "increased",
            RetentionStatus::Holding => "holding",
            RetentionStatus::Partial => "partial",
            RetentionStatus::Reduced => "reduced",
            RetentionStatus::Sold => "sold",
            RetentionStatus::Unknown => "unknown",
        };
        write!(f, "{}", label)
    }
}

/// Holder counts per retention bucket
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RetentionSummary {
    pub increased: usize,
    pub holding: usize,
    pub partial: usize,
    pub reduced: usize,
    pub sold: usize,
    pub unknown: usize,
}

impl RetentionSummary {
    pub fn from_holders(holders: &[Holder]) -> Self {
        let mut summary = Self::default();
        for holder in holders {
            match RetentionStatus::of(holder) {
                RetentionStatus::Increased => summary.increased += 1,
                RetentionStatus::Holding => summary.holding += 1,
                RetentionStatus::Partial => summary.partial += 1,
                RetentionStatus::Reduced => summary.reduced += 1,
                RetentionStatus::Sold => summary.sold += 1,
                RetentionStatus::Unknown => summary.unknown += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.increased + self.holding + self.partial + self.reduced + self.sold + self.unknown
    }
}
