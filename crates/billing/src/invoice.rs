//! Invoice aggregate: ledger arithmetic + the status state machine.
//!
//! The state machine is the single writer of invoice status. Commands are
//! validated by `handle` (which never mutates; an illegal transition leaves
//! the aggregate untouched) and state evolves only through `apply`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use agencybill_core::{
    Aggregate, AggregateRoot, BillingError, BillingResult, Hours, InvoiceId, LineItemId,
    MilestoneId, Money, ProjectId, ReportId,
};

/// Invoice status lifecycle.
///
/// `Overdue` is a computed overlay on `Pending` (due date in the past); it is
/// never the stored status, and the transition table treats it as `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Pending,
    Partial,
    Paid,
    Overdue,
    Void,
}

impl InvoiceStatus {
    /// Collapse the display overlay back to the legal state.
    pub fn normalized(self) -> Self {
        match self {
            InvoiceStatus::Overdue => InvoiceStatus::Pending,
            other => other,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, InvoiceStatus::Paid | InvoiceStatus::Void)
    }
}

impl core::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Partial => "partial",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Void => "void",
        };
        f.write_str(s)
    }
}

/// Monotonically issued invoice number. Assigned at first finalize and never
/// reclaimed, even when the invoice is reverted to draft.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceNumber(pub u64);

impl core::fmt::Display for InvoiceNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "INV-{:06}", self.0)
    }
}

/// What kind of billing produced this invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceKind {
    Standard,
    Milestone,
    Closeout,
    Deposit,
}

/// The record this invoice bills for (at most one).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceSource {
    Milestone(MilestoneId),
    Report(ReportId),
    Closeout(ProjectId),
}

/// Line item type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineItemKind {
    Service,
    Overage,
    Deposit,
    Credit,
}

/// One charge or credit on an invoice. Credits carry a negative amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: LineItemId,
    pub kind: LineItemKind,
    pub description: String,
    pub quantity: Decimal,
    pub rate: Money,
    pub amount: Money,
}

impl LineItem {
    /// A flat charge: quantity 1 at the full amount.
    pub fn flat(kind: LineItemKind, description: impl Into<String>, amount: Money) -> Self {
        Self {
            id: LineItemId::new(),
            kind,
            description: description.into(),
            quantity: Decimal::ONE,
            rate: amount,
            amount,
        }
    }

    /// A time-based charge: hours at an hourly rate.
    pub fn hourly(
        kind: LineItemKind,
        description: impl Into<String>,
        hours: Hours,
        rate: Money,
    ) -> Self {
        Self {
            id: LineItemId::new(),
            kind,
            description: description.into(),
            quantity: hours,
            rate,
            amount: Money::from_hours(hours, rate),
        }
    }

    /// A credit for a positive magnitude; the stored amount is negative.
    pub fn credit(description: impl Into<String>, magnitude: Money) -> Self {
        Self {
            id: LineItemId::new(),
            kind: LineItemKind::Credit,
            description: description.into(),
            quantity: Decimal::ONE,
            rate: -magnitude,
            amount: -magnitude,
        }
    }
}

/// Document generation state for a finalized invoice.
///
/// Generation is best-effort and post-commit: a failure never rolls back the
/// finalize transition, it only leaves a retryable flag here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentState {
    NotGenerated,
    Generated { location: String },
    Failed,
}

/// Aggregate root: Invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    id: InvoiceId,
    kind: InvoiceKind,
    source: Option<InvoiceSource>,
    status: InvoiceStatus,
    number: Option<InvoiceNumber>,
    lines: Vec<LineItem>,
    /// Line-item sum while in Draft; frozen by the finalize event afterwards.
    total: Money,
    paid: Money,
    due_date: Option<DateTime<Utc>>,
    finalized_at: Option<DateTime<Utc>>,
    paid_at: Option<DateTime<Utc>>,
    document: DocumentState,
    version: u64,
}

impl Invoice {
    /// A fresh draft with no lines.
    pub fn draft(id: InvoiceId, kind: InvoiceKind, source: Option<InvoiceSource>) -> Self {
        Self {
            id,
            kind,
            source,
            status: InvoiceStatus::Draft,
            number: None,
            lines: Vec::new(),
            total: Money::ZERO,
            paid: Money::ZERO,
            due_date: None,
            finalized_at: None,
            paid_at: None,
            document: DocumentState::NotGenerated,
            version: 0,
        }
    }

    pub fn id_typed(&self) -> InvoiceId {
        self.id
    }

    pub fn kind(&self) -> InvoiceKind {
        self.kind
    }

    pub fn source(&self) -> Option<InvoiceSource> {
        self.source
    }

    /// The stored status. Never `Overdue`; see `effective_status`.
    pub fn status(&self) -> InvoiceStatus {
        self.status
    }

    pub fn number(&self) -> Option<InvoiceNumber> {
        self.number
    }

    pub fn lines(&self) -> &[LineItem] {
        &self.lines
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn paid(&self) -> Money {
        self.paid
    }

    pub fn due_date(&self) -> Option<DateTime<Utc>> {
        self.due_date
    }

    pub fn finalized_at(&self) -> Option<DateTime<Utc>> {
        self.finalized_at
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    pub fn document(&self) -> &DocumentState {
        &self.document
    }

    /// Arithmetic sum of all line-item amounts (credits subtract).
    pub fn line_total(&self) -> Money {
        self.lines.iter().map(|l| l.amount).sum()
    }

    /// `total - paid`. Negative means over-payment; surfaced, never clamped.
    pub fn balance(&self) -> Money {
        self.total - self.paid
    }

    pub fn is_overpaid(&self) -> bool {
        self.balance().is_negative()
    }

    /// A zero balance on an invoice that is neither Paid nor Void is a
    /// consistency warning the caller reconciles; it is not an error here.
    pub fn needs_reconciliation(&self) -> bool {
        self.balance().is_zero() && self.total.is_positive() && !self.status.is_terminal()
    }

    /// Whether the invoice is pending and past its due date.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == InvoiceStatus::Pending
            && self.due_date.map(|due| due < now).unwrap_or(false)
    }

    /// Stored status with the overdue overlay applied.
    pub fn effective_status(&self, now: DateTime<Utc>) -> InvoiceStatus {
        if self.is_overdue(now) {
            InvoiceStatus::Overdue
        } else {
            self.status
        }
    }
}

/// Command: add a line item to a draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLineItem {
    pub line: LineItem,
}

/// Command: Draft → Pending. The number comes from the numbering authority;
/// a number already assigned by an earlier finalize is kept instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finalize {
    pub number: InvoiceNumber,
    pub due_date: Option<DateTime<Utc>>,
    pub finalized_at: DateTime<Utc>,
}

/// Command: settle the invoice in full.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkPaid {
    pub paid_at: DateTime<Utc>,
}

/// Command: record a payment smaller than the outstanding balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPartialPayment {
    pub amount: Money,
    pub paid_at: DateTime<Utc>,
}

/// Command: cancel the invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoidInvoice {
    pub reason: Option<String>,
}

/// Command: Pending → Draft. Keeps the assigned number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevertToDraft;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceCommand {
    AddLineItem(AddLineItem),
    Finalize(Finalize),
    MarkPaid(MarkPaid),
    RecordPartialPayment(RecordPartialPayment),
    Void(VoidInvoice),
    RevertToDraft(RevertToDraft),
    MarkDocumentGenerated { location: String },
    MarkDocumentFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceFinalized {
    pub number: InvoiceNumber,
    pub total: Money,
    pub due_date: Option<DateTime<Utc>>,
    pub finalized_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecorded {
    pub new_paid: Money,
    pub paid_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceEvent {
    LineItemAdded(LineItem),
    Finalized(InvoiceFinalized),
    /// Full settlement: paid snaps to the total.
    Paid(PaymentRecorded),
    PartialPaymentRecorded(PaymentRecorded),
    Voided { reason: Option<String> },
    RevertedToDraft,
    DocumentGenerated { location: String },
    DocumentFailed,
}

impl InvoiceEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            InvoiceEvent::LineItemAdded(_) => "billing.invoice.line_item_added",
            InvoiceEvent::Finalized(_) => "billing.invoice.finalized",
            InvoiceEvent::Paid(_) => "billing.invoice.paid",
            InvoiceEvent::PartialPaymentRecorded(_) => "billing.invoice.partial_payment",
            InvoiceEvent::Voided { .. } => "billing.invoice.voided",
            InvoiceEvent::RevertedToDraft => "billing.invoice.reverted_to_draft",
            InvoiceEvent::DocumentGenerated { .. } => "billing.invoice.document_generated",
            InvoiceEvent::DocumentFailed => "billing.invoice.document_failed",
        }
    }
}

impl AggregateRoot for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Aggregate for Invoice {
    type Command = InvoiceCommand;
    type Event = InvoiceEvent;
    type Error = BillingError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InvoiceEvent::LineItemAdded(line) => {
                self.lines.push(line.clone());
                // Draft totals track the line sum until finalize freezes them.
                self.total = self.line_total();
            }
            InvoiceEvent::Finalized(e) => {
                self.number = Some(e.number);
                self.total = e.total;
                self.due_date = e.due_date;
                self.finalized_at = Some(e.finalized_at);
                self.status = InvoiceStatus::Pending;
            }
            InvoiceEvent::Paid(e) => {
                self.paid = e.new_paid;
                self.paid_at = Some(e.paid_at);
                self.status = InvoiceStatus::Paid;
            }
            InvoiceEvent::PartialPaymentRecorded(e) => {
                self.paid = e.new_paid;
                self.paid_at = Some(e.paid_at);
                self.status = InvoiceStatus::Partial;
            }
            InvoiceEvent::Voided { .. } => {
                self.status = InvoiceStatus::Void;
            }
            InvoiceEvent::RevertedToDraft => {
                // Number and finalize stamp survive; numbers are never reused.
                self.status = InvoiceStatus::Draft;
            }
            InvoiceEvent::DocumentGenerated { location } => {
                self.document = DocumentState::Generated {
                    location: location.clone(),
                };
            }
            InvoiceEvent::DocumentFailed => {
                self.document = DocumentState::Failed;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InvoiceCommand::AddLineItem(cmd) => self.handle_add_line_item(cmd),
            InvoiceCommand::Finalize(cmd) => self.handle_finalize(cmd),
            InvoiceCommand::MarkPaid(cmd) => self.handle_mark_paid(cmd),
            InvoiceCommand::RecordPartialPayment(cmd) => self.handle_partial_payment(cmd),
            InvoiceCommand::Void(cmd) => self.handle_void(cmd),
            InvoiceCommand::RevertToDraft(_) => self.handle_revert(),
            InvoiceCommand::MarkDocumentGenerated { location } => {
                self.handle_document_outcome(Some(location.clone()))
            }
            InvoiceCommand::MarkDocumentFailed => self.handle_document_outcome(None),
        }
    }
}

impl Invoice {
    fn handle_add_line_item(&self, cmd: &AddLineItem) -> BillingResult<Vec<InvoiceEvent>> {
        if self.status != InvoiceStatus::Draft {
            return Err(BillingError::InvoiceLocked);
        }

        let line = &cmd.line;
        if line.amount.is_zero() {
            return Err(BillingError::validation("line item amount must be non-zero"));
        }
        match line.kind {
            LineItemKind::Credit => {
                if !line.amount.is_negative() {
                    return Err(BillingError::validation("credit amount must be negative"));
                }
            }
            _ => {
                if line.amount.is_negative() {
                    return Err(BillingError::validation(
                        "charge amount must be positive; use a credit line",
                    ));
                }
            }
        }

        Ok(vec![InvoiceEvent::LineItemAdded(line.clone())])
    }

    fn handle_finalize(&self, cmd: &Finalize) -> BillingResult<Vec<InvoiceEvent>> {
        if self.status != InvoiceStatus::Draft {
            return Err(BillingError::illegal_transition(
                self.status,
                InvoiceStatus::Pending,
            ));
        }

        let total = self.line_total();
        if self.lines.is_empty() || !total.is_positive() {
            return Err(BillingError::illegal_transition(
                InvoiceStatus::Draft,
                InvoiceStatus::Pending,
            ));
        }

        // A number assigned by an earlier finalize sticks across revert.
        let number = self.number.unwrap_or(cmd.number);

        Ok(vec![InvoiceEvent::Finalized(InvoiceFinalized {
            number,
            total,
            due_date: cmd.due_date,
            finalized_at: cmd.finalized_at,
        })])
    }

    fn handle_mark_paid(&self, cmd: &MarkPaid) -> BillingResult<Vec<InvoiceEvent>> {
        match self.status.normalized() {
            InvoiceStatus::Pending | InvoiceStatus::Partial => {}
            other => {
                return Err(BillingError::illegal_transition(other, InvoiceStatus::Paid));
            }
        }

        // Full settlement regardless of prior partial payments.
        Ok(vec![InvoiceEvent::Paid(PaymentRecorded {
            new_paid: self.total,
            paid_at: cmd.paid_at,
        })])
    }

    fn handle_partial_payment(
        &self,
        cmd: &RecordPartialPayment,
    ) -> BillingResult<Vec<InvoiceEvent>> {
        match self.status.normalized() {
            InvoiceStatus::Pending | InvoiceStatus::Partial => {}
            other => {
                return Err(BillingError::illegal_transition(
                    other,
                    InvoiceStatus::Partial,
                ));
            }
        }

        if !cmd.amount.is_positive() {
            return Err(BillingError::validation("payment amount must be positive"));
        }

        let new_paid = self.paid + cmd.amount;
        if new_paid >= self.total {
            return Err(BillingError::validation(
                "partial payment must leave a balance; use mark_paid for settlement",
            ));
        }

        Ok(vec![InvoiceEvent::PartialPaymentRecorded(PaymentRecorded {
            new_paid,
            paid_at: cmd.paid_at,
        })])
    }

    fn handle_void(&self, cmd: &VoidInvoice) -> BillingResult<Vec<InvoiceEvent>> {
        match self.status.normalized() {
            InvoiceStatus::Pending | InvoiceStatus::Partial => {}
            other => {
                return Err(BillingError::illegal_transition(other, InvoiceStatus::Void));
            }
        }

        Ok(vec![InvoiceEvent::Voided {
            reason: cmd.reason.clone(),
        }])
    }

    fn handle_revert(&self) -> BillingResult<Vec<InvoiceEvent>> {
        // Only from Pending; Partial and Overdue have client-visible payment
        // history and must be voided instead.
        if self.status != InvoiceStatus::Pending {
            return Err(BillingError::illegal_transition(
                self.status,
                InvoiceStatus::Draft,
            ));
        }

        Ok(vec![InvoiceEvent::RevertedToDraft])
    }

    fn handle_document_outcome(
        &self,
        location: Option<String>,
    ) -> BillingResult<Vec<InvoiceEvent>> {
        if self.number.is_none() {
            return Err(BillingError::validation(
                "document state is tracked only after finalize",
            ));
        }

        Ok(vec![match location {
            Some(location) => InvoiceEvent::DocumentGenerated { location },
            None => InvoiceEvent::DocumentFailed,
        }])
    }

    /// Convenience: handle then apply, returning the emitted events.
    ///
    /// A failed command leaves the invoice untouched.
    pub fn execute(&mut self, command: &InvoiceCommand) -> BillingResult<Vec<InvoiceEvent>> {
        let events = self.handle(command)?;
        for event in &events {
            self.apply(event);
        }
        Ok(events)
    }
}
