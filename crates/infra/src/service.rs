//! Billing service: the orchestration layer over the pure engine.
//!
//! Every status change goes through here and nowhere else; list screens,
//! scheduled sweeps, and manual operator actions all call these operations
//! instead of writing status fields directly. Each operation loads state,
//! decides through the invoice aggregate, and commits compare-and-set, so a
//! lost race surfaces as `ConcurrentModification` instead of a torn write.

use std::sync::Arc;

use tracing::{debug, info, warn};

use agencybill_billing::{
    AddLineItem, AmountBreakdown, BillingStatus, CloseoutCandidate, CloseoutPlan, Finalize,
    Invoice, InvoiceCommand, InvoiceKind, InvoiceSource, InvoiceStatus, LineItem, LineItemKind,
    MarkPaid, Organization, OverageBreakdown, RateCard, RecordPartialPayment,
    RevertToDraft, TimeEntry, TimeLink, VoidInvoice, build_closeout, compute_overage,
    project_status, resolve_amount,
};
use agencybill_billing::resolver::AmountSource;
use agencybill_core::{
    AggregateRoot, BillingError, BillingResult, Clock, ExpectedVersion, InvoiceId, MilestoneId,
    Money, ProjectId, ReportId, TimeEntryId,
};

use crate::documents::DocumentGenerator;
use crate::numbering::NumberingAuthority;
use crate::store::RecordStore;

/// Engine configuration.
#[derive(Debug, Clone, Copy)]
pub struct BillingConfig {
    /// Fallback hourly rate for organizations without one. `None` means
    /// hourly billing for such organizations fails with `MissingRate`.
    pub default_hourly_rate: Option<Money>,
    /// Days between finalize and due date.
    pub payment_terms_days: i64,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            default_hourly_rate: None,
            payment_terms_days: 30,
        }
    }
}

pub struct BillingService {
    store: Arc<dyn RecordStore>,
    numbering: Arc<dyn NumberingAuthority>,
    documents: Arc<dyn DocumentGenerator>,
    clock: Arc<dyn Clock>,
    config: BillingConfig,
}

impl BillingService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        numbering: Arc<dyn NumberingAuthority>,
        documents: Arc<dyn DocumentGenerator>,
        clock: Arc<dyn Clock>,
        config: BillingConfig,
    ) -> Self {
        Self {
            store,
            numbering,
            documents,
            clock,
            config,
        }
    }

    fn rate_card(&self, org: &Organization) -> RateCard {
        RateCard::new(org.hourly_rate, self.config.default_hourly_rate)
    }

    /// Load, decide, apply, commit. The CAS expectation is the version the
    /// invoice had when loaded, so a concurrent writer loses cleanly.
    fn execute_on(&self, id: InvoiceId, command: &InvoiceCommand) -> BillingResult<Invoice> {
        let mut invoice = self.store.invoice(id)?;
        let expected = ExpectedVersion::Exact(invoice.version());
        let events = invoice.execute(command)?;
        self.store.commit_invoice(invoice.clone(), expected)?;
        for event in &events {
            debug!(invoice = %id, event = event.event_type(), "invoice event committed");
        }
        Ok(invoice)
    }

    // ---- amount resolution -------------------------------------------------

    /// Resolve what a milestone would bill for today, without billing it.
    pub fn resolve_milestone_amount(&self, id: MilestoneId) -> BillingResult<AmountBreakdown> {
        let milestone = self.store.milestone(id)?;
        let org = self.store.organization(milestone.organization)?;
        let entries = self.store.entries_for_link(TimeLink::Milestone(id))?;
        resolve_amount(&milestone, &entries, &self.rate_card(&org))
    }

    /// Derive a report's overage. Read-only and re-derivable; nothing is
    /// cached on the report.
    pub fn report_overage(&self, id: ReportId) -> BillingResult<OverageBreakdown> {
        let report = self.store.report(id)?;
        let org = self.store.organization(report.organization)?;
        let entries =
            self.store
                .entries_in_period(org.id, report.period.start, report.period.end)?;
        Ok(compute_overage(
            &entries,
            org.free_hours,
            self.rate_card(&org).effective(),
        ))
    }

    // ---- drafting ----------------------------------------------------------

    /// Create a draft invoice for a milestone's resolved amount.
    pub fn draft_milestone_invoice(&self, id: MilestoneId) -> BillingResult<InvoiceId> {
        let mut milestone = self.store.milestone(id)?;
        if milestone.project.is_none() {
            return Err(BillingError::validation(
                "milestone must belong to a project to be invoiced",
            ));
        }
        if let Some(existing) = milestone.invoice {
            if self.store.invoice(existing)?.status() != InvoiceStatus::Void {
                return Err(BillingError::validation(
                    "milestone already has a live invoice",
                ));
            }
        }

        let org = self.store.organization(milestone.organization)?;
        let entries = self.store.entries_for_link(TimeLink::Milestone(id))?;
        let breakdown = resolve_amount(&milestone, &entries, &self.rate_card(&org))?;
        if !breakdown.amount.is_positive() {
            // Zero means "not yet billable", never "bill $0".
            return Err(BillingError::NoEligibleWork);
        }

        let kind = if milestone.deposit {
            InvoiceKind::Deposit
        } else {
            InvoiceKind::Milestone
        };
        let line_kind = if milestone.deposit {
            LineItemKind::Deposit
        } else {
            LineItemKind::Service
        };

        let mut invoice = Invoice::draft(
            InvoiceId::new(),
            kind,
            Some(InvoiceSource::Milestone(id)),
        );
        invoice.execute(&InvoiceCommand::AddLineItem(AddLineItem {
            line: line_for(line_kind, &milestone.name, &breakdown),
        }))?;

        let invoice_id = invoice.id_typed();
        self.store.insert_invoice(invoice)?;
        milestone.invoice = Some(invoice_id);
        self.store.put_milestone(milestone)?;

        info!(milestone = %id, invoice = %invoice_id, "drafted milestone invoice");
        Ok(invoice_id)
    }

    /// Create a draft invoice for a report period's overage.
    pub fn draft_report_invoice(&self, id: ReportId) -> BillingResult<InvoiceId> {
        let mut report = self.store.report(id)?;
        if let Some(existing) = report.invoice {
            if self.store.invoice(existing)?.status() != InvoiceStatus::Void {
                return Err(BillingError::validation("report already has a live invoice"));
            }
        }

        let org = self.store.organization(report.organization)?;
        // Drafting a real charge is where a guessed rate would leak out, so
        // an absent rate is a hard error here, not a flagged zero.
        let rate = self
            .rate_card(&org)
            .effective()
            .ok_or(BillingError::MissingRate)?;
        let entries =
            self.store
                .entries_in_period(org.id, report.period.start, report.period.end)?;
        let overage = compute_overage(&entries, org.free_hours, Some(rate));
        if !overage.amount.is_positive() {
            return Err(BillingError::NoEligibleWork);
        }

        let mut invoice = Invoice::draft(
            InvoiceId::new(),
            InvoiceKind::Standard,
            Some(InvoiceSource::Report(id)),
        );
        invoice.execute(&InvoiceCommand::AddLineItem(AddLineItem {
            line: LineItem::hourly(
                LineItemKind::Overage,
                format!("Overage for {}", report.period.label),
                overage.overage_hours,
                rate,
            ),
        }))?;

        let invoice_id = invoice.id_typed();
        self.store.insert_invoice(invoice)?;
        report.invoice = Some(invoice_id);
        self.store.put_report(report)?;

        info!(report = %id, invoice = %invoice_id, "drafted overage invoice");
        Ok(invoice_id)
    }

    /// Add a line item (charge or credit) to a draft invoice.
    pub fn add_line_item(&self, id: InvoiceId, line: LineItem) -> BillingResult<Invoice> {
        self.execute_on(id, &InvoiceCommand::AddLineItem(AddLineItem { line }))
    }

    // ---- lifecycle ---------------------------------------------------------

    /// Draft → Pending: assign the invoice number, stamp the finalize date,
    /// then kick off best-effort document generation.
    pub fn finalize_invoice(&self, id: InvoiceId) -> BillingResult<Invoice> {
        let current = self.store.invoice(id)?;
        // Numbers stick across revert; only unnumbered drafts draw a new one.
        let number = current
            .number()
            .unwrap_or_else(|| self.numbering.next_number());
        let now = self.clock.now();

        let invoice = self.execute_on(
            id,
            &InvoiceCommand::Finalize(Finalize {
                number,
                due_date: Some(now + chrono::Duration::days(self.config.payment_terms_days)),
                finalized_at: now,
            }),
        )?;
        info!(invoice = %id, number = %number, "invoice finalized");

        // Post-commit and best-effort: the invoice is Pending regardless of
        // what happens here. A failure only flags the retryable condition.
        self.record_document_outcome(id, number);

        Ok(invoice)
    }

    /// Re-run document generation for a finalized invoice. Idempotent.
    pub fn retry_document(&self, id: InvoiceId) -> BillingResult<Invoice> {
        let invoice = self.store.invoice(id)?;
        let number = invoice.number().ok_or_else(|| {
            BillingError::validation("document generation requires a finalized invoice")
        })?;
        self.record_document_outcome(id, number);
        self.store.invoice(id)
    }

    fn record_document_outcome(&self, id: InvoiceId, number: agencybill_billing::InvoiceNumber) {
        let command = match self.documents.generate(id, number) {
            Ok(location) => InvoiceCommand::MarkDocumentGenerated { location },
            Err(err) => {
                warn!(invoice = %id, error = %err, "document generation failed; flagged for retry");
                InvoiceCommand::MarkDocumentFailed
            }
        };
        if let Err(err) = self.execute_on(id, &command) {
            // The flag is advisory; losing a race here is not a failure of
            // the triggering transition.
            warn!(invoice = %id, error = %err, "could not record document outcome");
        }
    }

    /// Settle the invoice in full.
    pub fn mark_paid(&self, id: InvoiceId) -> BillingResult<Invoice> {
        let invoice = self.execute_on(
            id,
            &InvoiceCommand::MarkPaid(MarkPaid {
                paid_at: self.clock.now(),
            }),
        )?;
        info!(invoice = %id, "invoice paid");
        Ok(invoice)
    }

    /// Record a payment smaller than the outstanding balance.
    pub fn record_partial_payment(&self, id: InvoiceId, amount: Money) -> BillingResult<Invoice> {
        self.execute_on(
            id,
            &InvoiceCommand::RecordPartialPayment(RecordPartialPayment {
                amount,
                paid_at: self.clock.now(),
            }),
        )
    }

    /// Cancel the invoice.
    pub fn void_invoice(&self, id: InvoiceId, reason: Option<String>) -> BillingResult<Invoice> {
        let invoice = self.execute_on(id, &InvoiceCommand::Void(VoidInvoice { reason }))?;
        info!(invoice = %id, "invoice voided");
        Ok(invoice)
    }

    /// Pending → Draft. The assigned number is kept; numbers are never
    /// reclaimed or reused.
    pub fn revert_to_draft(&self, id: InvoiceId) -> BillingResult<Invoice> {
        self.execute_on(id, &InvoiceCommand::RevertToDraft(RevertToDraft))
    }

    // ---- projections -------------------------------------------------------

    /// A milestone's display billing status, derived from its linked invoice.
    pub fn milestone_status(&self, id: MilestoneId) -> BillingResult<BillingStatus> {
        let milestone = self.store.milestone(id)?;
        Ok(project_status(
            self.linked_status(milestone.invoice)?,
            milestone.deposit,
        ))
    }

    /// A report's display billing status.
    pub fn report_status(&self, id: ReportId) -> BillingResult<BillingStatus> {
        let report = self.store.report(id)?;
        Ok(project_status(self.linked_status(report.invoice)?, false))
    }

    fn linked_status(&self, invoice: Option<InvoiceId>) -> BillingResult<Option<InvoiceStatus>> {
        Ok(match invoice {
            Some(id) => Some(self.store.invoice(id)?.status()),
            None => None,
        })
    }

    /// Invoices past due, for the scheduled sweep. Read-only: overdue is a
    /// computed overlay, nothing is written back.
    pub fn overdue_invoices(&self) -> BillingResult<Vec<Invoice>> {
        let now = self.clock.now();
        Ok(self
            .store
            .invoices()?
            .into_iter()
            .filter(|inv| inv.is_overdue(now))
            .collect())
    }

    // ---- closeout ----------------------------------------------------------

    /// Classify all billable-but-unbilled work under a project. Rejected
    /// outright while a closeout invoice is outstanding.
    pub fn build_project_closeout(&self, id: ProjectId) -> BillingResult<CloseoutPlan> {
        if self.store.outstanding_closeout(id)?.is_some() {
            return Err(BillingError::AlreadyClosedOut);
        }

        let project = self.store.project(id)?;
        let org = self.store.organization(project.organization)?;

        let mut candidates = Vec::new();
        for milestone in self.store.milestones_for_project(id)? {
            let entries = self
                .store
                .entries_for_link(TimeLink::Milestone(milestone.id))?;
            let invoice_status = self.linked_status(milestone.invoice)?;
            candidates.push(CloseoutCandidate {
                milestone,
                entries,
                invoice_status,
            });
        }
        let project_entries = self.store.entries_for_link(TimeLink::Project(id))?;

        Ok(build_closeout(
            id,
            candidates,
            project_entries,
            &self.rate_card(&org),
        ))
    }

    /// Create the closeout invoice from the current classification.
    ///
    /// The outstanding-closeout invariant is re-checked transactionally at
    /// creation time, so two simultaneous builds cannot both create one, and
    /// a re-run after partial failure cannot double-bill: consumed entries
    /// are marked billed and billed milestones are linked in the same commit.
    pub fn create_project_closeout(&self, id: ProjectId) -> BillingResult<InvoiceId> {
        let plan = self.build_project_closeout(id)?;
        if plan.is_empty() {
            return Err(BillingError::NoEligibleWork);
        }

        let mut invoice = Invoice::draft(
            InvoiceId::new(),
            InvoiceKind::Closeout,
            Some(InvoiceSource::Closeout(id)),
        );
        let mut consumed: Vec<TimeEntryId> = Vec::new();

        for item in &plan.eligible {
            invoice.execute(&InvoiceCommand::AddLineItem(AddLineItem {
                line: line_for(LineItemKind::Service, &item.name, &item.breakdown),
            }))?;
            consumed.extend(billable_entry_ids(&item.entries));
        }
        if let Some(ref project_time) = plan.project_time {
            invoice.execute(&InvoiceCommand::AddLineItem(AddLineItem {
                line: LineItem::hourly(
                    LineItemKind::Service,
                    "Project time",
                    project_time.hours,
                    project_time.rate,
                ),
            }))?;
            consumed.extend(billable_entry_ids(&plan.project_entries));
        }

        let milestones: Vec<MilestoneId> = plan.eligible.iter().map(|e| e.milestone).collect();
        let invoice_id = self
            .store
            .create_closeout_invoice(invoice, &milestones, &consumed)?;

        info!(
            project = %id,
            invoice = %invoice_id,
            milestones = milestones.len(),
            excluded = plan.excluded.len(),
            total = %plan.amount,
            "closeout invoice created"
        );
        Ok(invoice_id)
    }
}

/// Build the invoice line for a resolved amount, flat or hourly.
fn line_for(kind: LineItemKind, description: &str, breakdown: &AmountBreakdown) -> LineItem {
    match breakdown.source {
        AmountSource::Flat => LineItem::flat(kind, description, breakdown.amount),
        AmountSource::Hourly => {
            LineItem::hourly(kind, description, breakdown.hours, breakdown.rate)
        }
    }
}

fn billable_entry_ids(entries: &[TimeEntry]) -> Vec<TimeEntryId> {
    entries
        .iter()
        .filter(|e| e.billable && !e.billed)
        .map(|e| e.id)
        .collect()
}
