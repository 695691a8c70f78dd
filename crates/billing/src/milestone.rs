//! Project milestones.

use serde::{Deserialize, Serialize};

use agencybill_core::{InvoiceId, MilestoneId, Money, OrganizationId, ProjectId};

use crate::billable::Billable;

/// A billable chunk of a project.
///
/// A milestone with a fixed amount > 0 bills flat; otherwise it is *hourly*
/// and its amount is resolved from linked time entries. Billing status is
/// never stored here — it is always projected from the linked invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: MilestoneId,
    /// Owning organization (denormalized from the project for rate lookup).
    pub organization: OrganizationId,
    /// Required for invoicing eligibility.
    pub project: Option<ProjectId>,
    pub name: String,
    pub fixed_amount: Option<Money>,
    pub deposit: bool,
    pub invoice: Option<InvoiceId>,
}

impl Milestone {
    pub fn new(
        id: MilestoneId,
        organization: OrganizationId,
        project: Option<ProjectId>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            organization,
            project,
            name: name.into(),
            fixed_amount: None,
            deposit: false,
            invoice: None,
        }
    }

    pub fn with_fixed_amount(mut self, amount: Money) -> Self {
        self.fixed_amount = Some(amount);
        self
    }

    pub fn as_deposit(mut self) -> Self {
        self.deposit = true;
        self
    }

    /// True when the amount must be resolved from logged time.
    pub fn is_hourly(&self) -> bool {
        Billable::fixed_amount(self).is_none()
    }
}

impl Billable for Milestone {
    fn fixed_amount(&self) -> Option<Money> {
        // Zero or negative fixed amounts mean "price from time".
        self.fixed_amount.filter(Money::is_positive)
    }

    fn organization(&self) -> OrganizationId {
        self.organization
    }

    fn is_deposit(&self) -> bool {
        self.deposit
    }
}
