//! Monthly reports (recurring billing periods).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use agencybill_core::{InvoiceId, Money, OrganizationId, ReportId};

use crate::billable::Billable;
use crate::time_entry::TimeEntry;

/// An inclusive date range with a human label (e.g. "August 2026").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    pub fn new(label: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            label: label.into(),
            start,
            end,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// A recurring billing period for an organization.
///
/// The overage amount is always derived from the period's time entries at
/// read time — entries stay editable until the period is closed out, so
/// nothing here caches it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyReport {
    pub id: ReportId,
    pub organization: OrganizationId,
    pub period: Period,
    pub invoice: Option<InvoiceId>,
}

impl MonthlyReport {
    pub fn new(id: ReportId, organization: OrganizationId, period: Period) -> Self {
        Self {
            id,
            organization,
            period,
            invoice: None,
        }
    }

    /// Entries that fall inside this report's period.
    pub fn select<'a>(&self, entries: &'a [TimeEntry]) -> Vec<&'a TimeEntry> {
        entries
            .iter()
            .filter(|e| e.organization == self.organization && self.period.contains(e.worked_on))
            .collect()
    }
}

impl Billable for MonthlyReport {
    fn fixed_amount(&self) -> Option<Money> {
        // Reports are always billed from time (overage).
        None
    }

    fn organization(&self) -> OrganizationId {
        self.organization
    }
}
