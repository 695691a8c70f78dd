//! Billing status projection.
//!
//! A milestone's or report's billing status is a read-only view derived from
//! its linked invoice — never stored truth that could drift.

use serde::{Deserialize, Serialize};

use crate::invoice::InvoiceStatus;

/// Display billing status of a billable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingStatus {
    Pending,
    Invoiced,
    InvoicedAsDeposit,
    Paid,
}

impl core::fmt::Display for BillingStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            BillingStatus::Pending => "Pending",
            BillingStatus::Invoiced => "Invoiced",
            BillingStatus::InvoicedAsDeposit => "Invoiced as Deposit",
            BillingStatus::Paid => "Paid",
        };
        f.write_str(s)
    }
}

/// Pure projection of (linked invoice status, deposit flag) to billing status.
///
/// A void invoice behaves as if no invoice existed, so billing status is
/// never stuck on a cancelled invoice.
pub fn project_status(invoice: Option<InvoiceStatus>, is_deposit: bool) -> BillingStatus {
    match invoice.map(InvoiceStatus::normalized) {
        None | Some(InvoiceStatus::Void) => BillingStatus::Pending,
        Some(InvoiceStatus::Paid) => BillingStatus::Paid,
        Some(_) if is_deposit => BillingStatus::InvoicedAsDeposit,
        Some(_) => BillingStatus::Invoiced,
    }
}
