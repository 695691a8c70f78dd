//! Monthly overage calculation.

use serde::{Deserialize, Serialize};

use agencybill_core::{Hours, Money};

use crate::time_entry::{self, TimeEntry};

/// The derived overage for one report period.
///
/// Re-derivable at any time; never cached as ground truth on the report,
/// because time entries stay editable until the period is closed out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverageBreakdown {
    pub billable_hours: Hours,
    pub free_limit: Hours,
    pub overage_hours: Hours,
    pub amount: Money,
    /// Set when the organization has no rate: the amount is reported as zero
    /// rather than computed from a guessed rate.
    pub rate_missing: bool,
}

/// Compute the chargeable overage for a period's entries against the
/// organization's included allowance.
pub fn compute_overage(
    entries: &[TimeEntry],
    free_limit: Hours,
    rate: Option<Money>,
) -> OverageBreakdown {
    let billable = time_entry::billable_hours(entries);
    let overage = (billable - free_limit).max(Hours::ZERO);

    let (amount, rate_missing) = match rate {
        Some(rate) => (Money::from_hours(overage, rate), false),
        None => (Money::ZERO, true),
    };

    OverageBreakdown {
        billable_hours: billable,
        free_limit,
        overage_hours: overage,
        amount,
        rate_missing,
    }
}
