//! `agencybill-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod aggregate;
pub mod clock;
pub mod error;
pub mod id;
pub mod money;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{BillingError, BillingResult};
pub use id::{
    InvoiceId, LineItemId, MilestoneId, OrganizationId, ProjectId, ReportId, ServiceRequestId,
    TimeEntryId,
};
pub use money::{Hours, Money};
