//! Amount resolution for billable work.

use serde::{Deserialize, Serialize};

use agencybill_core::{BillingError, BillingResult, Hours, Money};

use crate::billable::Billable;
use crate::time_entry::{self, TimeEntry};

/// Where a resolved amount came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmountSource {
    Flat,
    Hourly,
}

/// A resolved amount with its derivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountBreakdown {
    pub amount: Money,
    pub source: AmountSource,
    pub hours: Hours,
    pub rate: Money,
}

/// Rates available for hourly billing: the organization's own rate, with an
/// engine-configured default as fallback. Both absent is an explicit error,
/// never a silent zero-charge.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RateCard {
    pub organization_rate: Option<Money>,
    pub default_rate: Option<Money>,
}

impl RateCard {
    pub fn new(organization_rate: Option<Money>, default_rate: Option<Money>) -> Self {
        Self {
            organization_rate,
            default_rate,
        }
    }

    pub fn effective(&self) -> Option<Money> {
        self.organization_rate.or(self.default_rate)
    }
}

/// Compute the billable amount for a unit of work.
///
/// A fixed amount > 0 is returned verbatim. Otherwise the amount is the sum
/// of billable-flagged linked hours times the effective hourly rate.
///
/// A zero hourly amount means "not yet eligible for billing", not "billed
/// for $0" — callers decide what to do with it.
pub fn resolve_amount(
    billable: &dyn Billable,
    entries: &[TimeEntry],
    rates: &RateCard,
) -> BillingResult<AmountBreakdown> {
    if let Some(amount) = billable.fixed_amount() {
        return Ok(AmountBreakdown {
            amount,
            source: AmountSource::Flat,
            hours: Hours::ZERO,
            rate: Money::ZERO,
        });
    }

    let rate = rates.effective().ok_or(BillingError::MissingRate)?;
    let hours = time_entry::billable_hours(entries);

    Ok(AmountBreakdown {
        amount: Money::from_hours(hours, rate),
        source: AmountSource::Hourly,
        hours,
        rate,
    })
}
