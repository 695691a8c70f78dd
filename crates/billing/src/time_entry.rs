//! Logged time entries.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use agencybill_core::{
    BillingError, BillingResult, Hours, MilestoneId, OrganizationId, ProjectId, ServiceRequestId,
    TimeEntryId,
};

/// What a time entry is attached to. At most one of these; an entry with no
/// link is "orphan" time that only ever surfaces in period reporting.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeLink {
    ServiceRequest(ServiceRequestId),
    Project(ProjectId),
    Milestone(MilestoneId),
}

/// A unit of logged work.
///
/// Editable by staff until an invoice consumes it (`billed` flips to true),
/// after which the record store refuses further writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: TimeEntryId,
    pub organization: OrganizationId,
    pub worked_on: NaiveDate,
    pub hours: Hours,
    pub billable: bool,
    pub link: Option<TimeLink>,
    pub billed: bool,
}

impl TimeEntry {
    pub fn new(
        id: TimeEntryId,
        organization: OrganizationId,
        worked_on: NaiveDate,
        hours: Hours,
        billable: bool,
        link: Option<TimeLink>,
    ) -> BillingResult<Self> {
        if hours.is_sign_negative() {
            return Err(BillingError::validation("hours must be non-negative"));
        }
        Ok(Self {
            id,
            organization,
            worked_on,
            hours,
            billable,
            link,
            billed: false,
        })
    }

    /// Hours that count toward billing. Non-billable entries still count
    /// toward total-hours reporting elsewhere, never toward amounts.
    pub fn billable_hours(&self) -> Hours {
        if self.billable {
            self.hours
        } else {
            Hours::ZERO
        }
    }
}

/// Sum of billable-flagged hours across a set of entries.
pub fn billable_hours(entries: &[TimeEntry]) -> Hours {
    entries.iter().map(TimeEntry::billable_hours).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 3).unwrap()
    }

    #[test]
    fn negative_hours_are_rejected() {
        let err = TimeEntry::new(
            TimeEntryId::new(),
            OrganizationId::new(),
            date(),
            dec!(-0.5),
            true,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, BillingError::Validation(_)));
    }

    #[test]
    fn only_billable_entries_count() {
        let org = OrganizationId::new();
        let billable =
            TimeEntry::new(TimeEntryId::new(), org, date(), dec!(3), true, None).unwrap();
        let internal =
            TimeEntry::new(TimeEntryId::new(), org, date(), dec!(2), false, None).unwrap();
        assert_eq!(billable_hours(&[billable, internal]), dec!(3));
    }
}
