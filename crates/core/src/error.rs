//! Domain error model.

use thiserror::Error;

/// Result type used across the billing engine.
pub type BillingResult<T> = Result<T, BillingError>;

/// Billing-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BillingError {
    /// An hourly amount was requested but neither the organization nor the
    /// engine configuration carries an hourly rate.
    #[error("no hourly rate configured for organization")]
    MissingRate,

    /// Line items are only mutable while the invoice is in Draft.
    #[error("invoice is locked: line items are only mutable in draft")]
    InvoiceLocked,

    /// A status transition outside the legal table was attempted.
    #[error("illegal invoice transition: {from} -> {to}")]
    IllegalTransition { from: String, to: String },

    /// The invoice moved underneath us (optimistic concurrency check failed).
    #[error("invoice was modified concurrently")]
    ConcurrentModification,

    /// The project already has an outstanding (non-void) closeout invoice.
    #[error("project already has an outstanding closeout invoice")]
    AlreadyClosedOut,

    /// A closeout was requested but nothing under the project is billable.
    #[error("no eligible billable work")]
    NoEligibleWork,

    /// A value failed validation (e.g. malformed or out-of-range input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested record was not found.
    #[error("not found")]
    NotFound,
}

impl BillingError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn illegal_transition(from: impl ToString, to: impl ToString) -> Self {
        Self::IllegalTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}
