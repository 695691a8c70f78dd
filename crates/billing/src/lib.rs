//! Billing engine domain module.
//!
//! This crate contains the business rules for client billing — amount
//! resolution, overage calculation, the invoice ledger and its status state
//! machine, project closeout aggregation, and billing-status projection —
//! implemented purely as deterministic domain logic (no IO, no HTTP, no
//! storage).

pub mod billable;
pub mod closeout;
pub mod invoice;
pub mod milestone;
pub mod organization;
pub mod overage;
pub mod project;
pub mod projector;
pub mod report;
pub mod resolver;
pub mod time_entry;

pub use billable::Billable;
pub use closeout::{CloseoutCandidate, CloseoutPlan, EligibleItem, ExclusionReason, build_closeout};
pub use invoice::{
    AddLineItem, DocumentState, Finalize, Invoice, InvoiceCommand, InvoiceEvent, InvoiceFinalized,
    InvoiceKind, InvoiceNumber, InvoiceSource, InvoiceStatus, LineItem, LineItemKind, MarkPaid,
    PaymentRecorded, RecordPartialPayment, RevertToDraft, VoidInvoice,
};
pub use milestone::Milestone;
pub use organization::Organization;
pub use overage::{OverageBreakdown, compute_overage};
pub use project::Project;
pub use projector::{BillingStatus, project_status};
pub use report::{MonthlyReport, Period};
pub use resolver::{AmountBreakdown, AmountSource, RateCard, resolve_amount};
pub use time_entry::{TimeEntry, TimeLink};
