//! End-to-end flows across the service, store, numbering, and documents.

use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal_macros::dec;

use agencybill_billing::{
    BillingStatus, DocumentState, ExclusionReason, InvoiceStatus, LineItem, Milestone,
    MonthlyReport, Organization, Period, Project, TimeEntry, TimeLink,
};
use agencybill_core::{
    BillingError, Clock, FixedClock, Hours, MilestoneId, Money, OrganizationId, ProjectId,
    ReportId, TimeEntryId,
};

use crate::documents::RecordingDocumentGenerator;
use crate::numbering::SequentialNumbering;
use crate::service::{BillingConfig, BillingService};
use crate::store::{InMemoryRecordStore, RecordStore};

struct Harness {
    store: Arc<InMemoryRecordStore>,
    documents: Arc<RecordingDocumentGenerator>,
    clock: Arc<FixedClock>,
    service: BillingService,
}

fn harness() -> Harness {
    agencybill_observability::init();
    let store = Arc::new(InMemoryRecordStore::new());
    let documents = Arc::new(RecordingDocumentGenerator::new());
    let clock = Arc::new(FixedClock::at(
        Utc.with_ymd_and_hms(2026, 8, 24, 9, 0, 0).unwrap(),
    ));
    let service = BillingService::new(
        Arc::clone(&store) as Arc<dyn RecordStore>,
        Arc::new(SequentialNumbering::default()),
        Arc::clone(&documents) as _,
        Arc::clone(&clock) as _,
        BillingConfig::default(),
    );
    Harness {
        store,
        documents,
        clock,
        service,
    }
}

fn org_with_rate(h: &Harness, rate_cents: Option<i64>) -> OrganizationId {
    let org = Organization::new(
        OrganizationId::new(),
        "Acme Studio",
        dec!(10),
        rate_cents.map(Money::from_cents),
    )
    .unwrap();
    let id = org.id;
    h.store.put_organization(org).unwrap();
    id
}

fn project(h: &Harness, org: OrganizationId) -> ProjectId {
    let p = Project::new(ProjectId::new(), org, "Site rebuild");
    let id = p.id;
    h.store.put_project(p).unwrap();
    id
}

fn log_time(
    h: &Harness,
    org: OrganizationId,
    month: u32,
    day: u32,
    hours: Hours,
    billable: bool,
    link: Option<TimeLink>,
) -> TimeEntryId {
    let entry = TimeEntry::new(
        TimeEntryId::new(),
        org,
        NaiveDate::from_ymd_opt(2026, month, day).unwrap(),
        hours,
        billable,
        link,
    )
    .unwrap();
    let id = entry.id;
    h.store.put_time_entry(entry).unwrap();
    id
}

#[test]
fn hourly_milestone_bills_through_the_full_lifecycle() {
    let h = harness();
    let org = org_with_rate(&h, Some(4_000));
    let project = project(&h, org);

    let milestone = Milestone::new(MilestoneId::new(), org, Some(project), "Design phase");
    let mid = milestone.id;
    h.store.put_milestone(milestone).unwrap();

    log_time(&h, org, 8, 3, dec!(3), true, Some(TimeLink::Milestone(mid)));
    log_time(&h, org, 8, 4, dec!(2), false, Some(TimeLink::Milestone(mid)));

    // Only billable hours count: 3h * $40.
    let breakdown = h.service.resolve_milestone_amount(mid).unwrap();
    assert_eq!(breakdown.amount, Money::from_cents(12_000));

    assert_eq!(h.service.milestone_status(mid).unwrap(), BillingStatus::Pending);

    let invoice_id = h.service.draft_milestone_invoice(mid).unwrap();
    assert_eq!(
        h.service.milestone_status(mid).unwrap(),
        BillingStatus::Invoiced
    );

    let invoice = h.service.finalize_invoice(invoice_id).unwrap();
    assert_eq!(invoice.status(), InvoiceStatus::Pending);
    assert_eq!(invoice.number().unwrap().0, 1);
    assert_eq!(invoice.total(), Money::from_cents(12_000));
    assert!(matches!(
        h.store.invoice(invoice_id).unwrap().document(),
        DocumentState::Generated { .. }
    ));

    let invoice = h.service.mark_paid(invoice_id).unwrap();
    assert_eq!(invoice.balance(), Money::ZERO);
    assert_eq!(h.service.milestone_status(mid).unwrap(), BillingStatus::Paid);
}

#[test]
fn deposit_milestones_project_their_own_status_and_void_releases_it() {
    let h = harness();
    let org = org_with_rate(&h, Some(4_000));
    let project = project(&h, org);

    let milestone = Milestone::new(MilestoneId::new(), org, Some(project), "Kickoff")
        .with_fixed_amount(Money::from_cents(50_000))
        .as_deposit();
    let mid = milestone.id;
    h.store.put_milestone(milestone).unwrap();

    let invoice_id = h.service.draft_milestone_invoice(mid).unwrap();
    assert_eq!(
        h.service.milestone_status(mid).unwrap(),
        BillingStatus::InvoicedAsDeposit
    );

    h.service.finalize_invoice(invoice_id).unwrap();
    h.service.void_invoice(invoice_id, Some("scope change".into())).unwrap();

    // A void invoice behaves as if no invoice existed.
    assert_eq!(h.service.milestone_status(mid).unwrap(), BillingStatus::Pending);

    // And the milestone can be drafted again.
    h.service.draft_milestone_invoice(mid).unwrap();
}

#[test]
fn document_failure_flags_for_retry_without_blocking_finalize() {
    let h = harness();
    let org = org_with_rate(&h, Some(4_000));
    let project = project(&h, org);

    let milestone = Milestone::new(MilestoneId::new(), org, Some(project), "Build")
        .with_fixed_amount(Money::from_cents(10_000));
    let mid = milestone.id;
    h.store.put_milestone(milestone).unwrap();
    let invoice_id = h.service.draft_milestone_invoice(mid).unwrap();

    h.documents.set_failing(true);
    let invoice = h.service.finalize_invoice(invoice_id).unwrap();

    // The transition stands; only the document flag records the failure.
    assert_eq!(invoice.status(), InvoiceStatus::Pending);
    assert_eq!(
        h.store.invoice(invoice_id).unwrap().document(),
        &DocumentState::Failed
    );

    h.documents.set_failing(false);
    let invoice = h.service.retry_document(invoice_id).unwrap();
    assert!(matches!(invoice.document(), DocumentState::Generated { .. }));
    assert_eq!(h.documents.generated(), vec![invoice_id]);
}

#[test]
fn overdue_is_a_read_only_sweep() {
    let h = harness();
    let org = org_with_rate(&h, Some(4_000));
    let project = project(&h, org);

    let milestone = Milestone::new(MilestoneId::new(), org, Some(project), "Build")
        .with_fixed_amount(Money::from_cents(10_000));
    let mid = milestone.id;
    h.store.put_milestone(milestone).unwrap();
    let invoice_id = h.service.draft_milestone_invoice(mid).unwrap();
    h.service.finalize_invoice(invoice_id).unwrap();

    assert!(h.service.overdue_invoices().unwrap().is_empty());

    // 31 days later the 30-day terms have lapsed.
    h.clock
        .set(Utc.with_ymd_and_hms(2026, 9, 24, 9, 0, 0).unwrap());
    let overdue = h.service.overdue_invoices().unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(
        overdue[0].effective_status(h.clock.now()),
        InvoiceStatus::Overdue
    );
    // The stored status is still Pending; nothing was written back.
    assert_eq!(
        h.store.invoice(invoice_id).unwrap().status(),
        InvoiceStatus::Pending
    );

    // An overdue invoice settles exactly like a pending one.
    h.service.mark_paid(invoice_id).unwrap();
}

#[test]
fn report_overage_derives_and_drafts() {
    let h = harness();
    let org = org_with_rate(&h, Some(5_000));

    let report = MonthlyReport::new(
        ReportId::new(),
        org,
        Period::new(
            "August 2026",
            NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 8, 31).unwrap(),
        ),
    );
    let rid = report.id;
    h.store.put_report(report).unwrap();

    log_time(&h, org, 8, 5, dec!(9), true, None);
    log_time(&h, org, 8, 12, dec!(5), true, None);
    log_time(&h, org, 8, 13, dec!(6), false, None);
    // Outside the period: July hours never touch the August report.
    log_time(&h, org, 7, 5, dec!(40), true, None);

    // 14h billable against 10h free at $50/h.
    let overage = h.service.report_overage(rid).unwrap();
    assert_eq!(overage.billable_hours, dec!(14));
    assert_eq!(overage.overage_hours, dec!(4));
    assert_eq!(overage.amount, Money::from_cents(20_000));
    assert!(!overage.rate_missing);

    let invoice_id = h.service.draft_report_invoice(rid).unwrap();
    let invoice = h.store.invoice(invoice_id).unwrap();
    assert_eq!(invoice.line_total(), Money::from_cents(20_000));
    assert_eq!(h.service.report_status(rid).unwrap(), BillingStatus::Invoiced);
}

#[test]
fn missing_rate_reports_zero_but_refuses_to_draft() {
    let h = harness();
    let org = org_with_rate(&h, None);

    let report = MonthlyReport::new(
        ReportId::new(),
        org,
        Period::new(
            "August 2026",
            NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 8, 31).unwrap(),
        ),
    );
    let rid = report.id;
    h.store.put_report(report).unwrap();
    log_time(&h, org, 8, 5, dec!(14), true, None);

    let overage = h.service.report_overage(rid).unwrap();
    assert_eq!(overage.overage_hours, dec!(4));
    assert_eq!(overage.amount, Money::ZERO);
    assert!(overage.rate_missing);

    let err = h.service.draft_report_invoice(rid).unwrap_err();
    assert_eq!(err, BillingError::MissingRate);
}

#[test]
fn closeout_consolidates_and_cannot_double_bill() {
    let h = harness();
    let org = org_with_rate(&h, Some(5_000));
    let project = project(&h, org);

    let fixed = Milestone::new(MilestoneId::new(), org, Some(project), "Discovery")
        .with_fixed_amount(Money::from_cents(100_000));
    let fixed_id = fixed.id;
    h.store.put_milestone(fixed).unwrap();

    let hourly = Milestone::new(MilestoneId::new(), org, Some(project), "Buildout");
    let hourly_id = hourly.id;
    h.store.put_milestone(hourly).unwrap();
    let hourly_entry = log_time(
        &h,
        org,
        8,
        10,
        dec!(2),
        true,
        Some(TimeLink::Milestone(hourly_id)),
    );

    // Already mid-billing elsewhere: stays off the closeout.
    let invoiced = Milestone::new(MilestoneId::new(), org, Some(project), "Launch")
        .with_fixed_amount(Money::from_cents(30_000));
    let invoiced_id = invoiced.id;
    h.store.put_milestone(invoiced).unwrap();
    let standalone = h.service.draft_milestone_invoice(invoiced_id).unwrap();
    h.service.finalize_invoice(standalone).unwrap();

    // Unlinked project-level time.
    log_time(&h, org, 8, 14, dec!(4), true, Some(TimeLink::Project(project)));

    let plan = h.service.build_project_closeout(project).unwrap();
    assert_eq!(plan.eligible.len(), 2);
    assert_eq!(
        plan.excluded,
        vec![(invoiced_id, ExclusionReason::AlreadyInvoiced)]
    );
    // $1000 fixed + 2h*$50 + 4h*$50.
    assert_eq!(plan.amount, Money::from_cents(130_000));

    let closeout_id = h.service.create_project_closeout(project).unwrap();
    let closeout = h.store.invoice(closeout_id).unwrap();
    assert_eq!(closeout.line_total(), Money::from_cents(130_000));
    assert_eq!(closeout.status(), InvoiceStatus::Draft);

    // Milestones now point at the closeout; consumed time is frozen.
    assert_eq!(
        h.store.milestone(fixed_id).unwrap().invoice,
        Some(closeout_id)
    );
    assert!(h.store.time_entry(hourly_entry).unwrap().billed);

    // A second build is rejected while the closeout is outstanding.
    let err = h.service.build_project_closeout(project).unwrap_err();
    assert_eq!(err, BillingError::AlreadyClosedOut);
    let err = h.service.create_project_closeout(project).unwrap_err();
    assert_eq!(err, BillingError::AlreadyClosedOut);
}

#[test]
fn voiding_a_closeout_releases_the_project_without_rebilling_time() {
    let h = harness();
    let org = org_with_rate(&h, Some(5_000));
    let project = project(&h, org);

    let hourly = Milestone::new(MilestoneId::new(), org, Some(project), "Buildout");
    let hourly_id = hourly.id;
    h.store.put_milestone(hourly).unwrap();
    log_time(&h, org, 8, 10, dec!(2), true, Some(TimeLink::Milestone(hourly_id)));

    let closeout_id = h.service.create_project_closeout(project).unwrap();
    h.service.finalize_invoice(closeout_id).unwrap();
    h.service.void_invoice(closeout_id, None).unwrap();

    // The project is open for closeout again, but the already-consumed time
    // must not be billed twice: the milestone now classifies as empty.
    let plan = h.service.build_project_closeout(project).unwrap();
    assert!(plan.eligible.is_empty());
    assert_eq!(
        plan.excluded,
        vec![(hourly_id, ExclusionReason::NothingBillable)]
    );
    let err = h.service.create_project_closeout(project).unwrap_err();
    assert_eq!(err, BillingError::NoEligibleWork);
}

#[test]
fn revert_keeps_the_number_and_the_sequence_moves_on() {
    let h = harness();
    let org = org_with_rate(&h, Some(5_000));
    let project = project(&h, org);

    let first = Milestone::new(MilestoneId::new(), org, Some(project), "A")
        .with_fixed_amount(Money::from_cents(10_000));
    let first_id = first.id;
    h.store.put_milestone(first).unwrap();
    let second = Milestone::new(MilestoneId::new(), org, Some(project), "B")
        .with_fixed_amount(Money::from_cents(10_000));
    let second_id = second.id;
    h.store.put_milestone(second).unwrap();

    let invoice_a = h.service.draft_milestone_invoice(first_id).unwrap();
    h.service.finalize_invoice(invoice_a).unwrap();
    h.service.revert_to_draft(invoice_a).unwrap();

    // Back in draft, the number survives; re-finalize does not draw a new one.
    let reverted = h.store.invoice(invoice_a).unwrap();
    assert_eq!(reverted.status(), InvoiceStatus::Draft);
    assert_eq!(reverted.number().unwrap().0, 1);
    let refinalized = h.service.finalize_invoice(invoice_a).unwrap();
    assert_eq!(refinalized.number().unwrap().0, 1);

    let invoice_b = h.service.draft_milestone_invoice(second_id).unwrap();
    let finalized_b = h.service.finalize_invoice(invoice_b).unwrap();
    assert_eq!(finalized_b.number().unwrap().0, 2);
}

#[test]
fn line_items_lock_at_finalize_through_the_service() {
    let h = harness();
    let org = org_with_rate(&h, Some(5_000));
    let project = project(&h, org);

    let milestone = Milestone::new(MilestoneId::new(), org, Some(project), "Build")
        .with_fixed_amount(Money::from_cents(10_000));
    let mid = milestone.id;
    h.store.put_milestone(milestone).unwrap();
    let invoice_id = h.service.draft_milestone_invoice(mid).unwrap();

    // Credits are legal while drafting.
    h.service
        .add_line_item(invoice_id, LineItem::credit("goodwill", Money::from_cents(2_000)))
        .unwrap();
    let invoice = h.service.finalize_invoice(invoice_id).unwrap();
    assert_eq!(invoice.total(), Money::from_cents(8_000));

    let err = h
        .service
        .add_line_item(
            invoice_id,
            LineItem::credit("late credit", Money::from_cents(1_000)),
        )
        .unwrap_err();
    assert_eq!(err, BillingError::InvoiceLocked);
}
