//! Client organization record.

use serde::{Deserialize, Serialize};

use agencybill_core::{BillingError, BillingResult, Hours, Money, OrganizationId};

/// A client account. Carries the monthly free-hours allowance and the hourly
/// rate used for all time-based billing.
///
/// An absent `hourly_rate` is an explicit state: hourly amounts for such an
/// organization either fall back to the engine's configured default rate or
/// fail with `MissingRate`. It is never an implicit zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    /// Hours per month included in the retainer before overage billing kicks in.
    pub free_hours: Hours,
    pub hourly_rate: Option<Money>,
}

impl Organization {
    pub fn new(
        id: OrganizationId,
        name: impl Into<String>,
        free_hours: Hours,
        hourly_rate: Option<Money>,
    ) -> BillingResult<Self> {
        if free_hours.is_sign_negative() {
            return Err(BillingError::validation("free hours must be non-negative"));
        }
        if let Some(rate) = hourly_rate {
            if rate.is_negative() {
                return Err(BillingError::validation("hourly rate must be non-negative"));
            }
        }
        Ok(Self {
            id,
            name: name.into(),
            free_hours,
            hourly_rate,
        })
    }
}
