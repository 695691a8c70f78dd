//! Record store boundary.
//!
//! The engine reads and writes records through this trait; persistence
//! mechanics are someone else's problem. The in-memory implementation is
//! intended for tests/dev and mirrors the concurrency contract a real
//! backend must honor: invoice commits are compare-and-set on the version
//! loaded, and closeout creation re-checks its invariant inside the write
//! lock.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::NaiveDate;

use agencybill_billing::{
    Invoice, InvoiceSource, Milestone, MonthlyReport, Organization, Project, TimeEntry, TimeLink,
};
use agencybill_core::{
    AggregateRoot, BillingError, BillingResult, ExpectedVersion, InvoiceId, MilestoneId,
    OrganizationId, ProjectId, ReportId, TimeEntryId,
};

pub trait RecordStore: Send + Sync {
    fn organization(&self, id: OrganizationId) -> BillingResult<Organization>;
    fn put_organization(&self, org: Organization) -> BillingResult<()>;

    fn project(&self, id: ProjectId) -> BillingResult<Project>;
    fn put_project(&self, project: Project) -> BillingResult<()>;

    fn milestone(&self, id: MilestoneId) -> BillingResult<Milestone>;
    fn put_milestone(&self, milestone: Milestone) -> BillingResult<()>;
    fn milestones_for_project(&self, id: ProjectId) -> BillingResult<Vec<Milestone>>;

    fn report(&self, id: ReportId) -> BillingResult<MonthlyReport>;
    fn put_report(&self, report: MonthlyReport) -> BillingResult<()>;

    fn time_entry(&self, id: TimeEntryId) -> BillingResult<TimeEntry>;
    /// Rejects writes to entries an invoice has already consumed.
    fn put_time_entry(&self, entry: TimeEntry) -> BillingResult<()>;
    fn entries_for_link(&self, link: TimeLink) -> BillingResult<Vec<TimeEntry>>;
    fn entries_in_period(
        &self,
        organization: OrganizationId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> BillingResult<Vec<TimeEntry>>;

    fn invoice(&self, id: InvoiceId) -> BillingResult<Invoice>;
    fn invoices(&self) -> BillingResult<Vec<Invoice>>;
    fn insert_invoice(&self, invoice: Invoice) -> BillingResult<()>;

    /// Replace a stored invoice, compare-and-set on the version the caller
    /// loaded. A stale version fails with `ConcurrentModification` and
    /// writes nothing.
    fn commit_invoice(&self, invoice: Invoice, expected: ExpectedVersion) -> BillingResult<()>;

    /// The project's current non-void closeout invoice, if one exists.
    fn outstanding_closeout(&self, project: ProjectId) -> BillingResult<Option<InvoiceId>>;

    /// Atomically: re-check that no non-void closeout invoice is outstanding
    /// for the project, insert the invoice, link the billed milestones to it,
    /// and mark the consumed time entries billed.
    fn create_closeout_invoice(
        &self,
        invoice: Invoice,
        milestones: &[MilestoneId],
        consumed_entries: &[TimeEntryId],
    ) -> BillingResult<InvoiceId>;
}

#[derive(Debug, Default)]
struct Records {
    organizations: HashMap<OrganizationId, Organization>,
    projects: HashMap<ProjectId, Project>,
    milestones: HashMap<MilestoneId, Milestone>,
    reports: HashMap<ReportId, MonthlyReport>,
    time_entries: HashMap<TimeEntryId, TimeEntry>,
    invoices: HashMap<InvoiceId, Invoice>,
}

impl Records {
    fn outstanding_closeout(&self, project: ProjectId) -> Option<InvoiceId> {
        self.invoices.values().find_map(|inv| {
            (inv.source() == Some(InvoiceSource::Closeout(project))
                && inv.status() != agencybill_billing::InvoiceStatus::Void)
                .then(|| inv.id_typed())
        })
    }
}

/// In-memory record store. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: RwLock<Records>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> BillingResult<std::sync::RwLockReadGuard<'_, Records>> {
        self.records
            .read()
            .map_err(|_| BillingError::validation("record store lock poisoned"))
    }

    fn write(&self) -> BillingResult<std::sync::RwLockWriteGuard<'_, Records>> {
        self.records
            .write()
            .map_err(|_| BillingError::validation("record store lock poisoned"))
    }
}

impl RecordStore for InMemoryRecordStore {
    fn organization(&self, id: OrganizationId) -> BillingResult<Organization> {
        self.read()?
            .organizations
            .get(&id)
            .cloned()
            .ok_or(BillingError::NotFound)
    }

    fn put_organization(&self, org: Organization) -> BillingResult<()> {
        self.write()?.organizations.insert(org.id, org);
        Ok(())
    }

    fn project(&self, id: ProjectId) -> BillingResult<Project> {
        self.read()?
            .projects
            .get(&id)
            .cloned()
            .ok_or(BillingError::NotFound)
    }

    fn put_project(&self, project: Project) -> BillingResult<()> {
        self.write()?.projects.insert(project.id, project);
        Ok(())
    }

    fn milestone(&self, id: MilestoneId) -> BillingResult<Milestone> {
        self.read()?
            .milestones
            .get(&id)
            .cloned()
            .ok_or(BillingError::NotFound)
    }

    fn put_milestone(&self, milestone: Milestone) -> BillingResult<()> {
        self.write()?.milestones.insert(milestone.id, milestone);
        Ok(())
    }

    fn milestones_for_project(&self, id: ProjectId) -> BillingResult<Vec<Milestone>> {
        let records = self.read()?;
        let mut milestones: Vec<Milestone> = records
            .milestones
            .values()
            .filter(|m| m.project == Some(id))
            .cloned()
            .collect();
        milestones.sort_by_key(|m| m.id.as_uuid().to_owned());
        Ok(milestones)
    }

    fn report(&self, id: ReportId) -> BillingResult<MonthlyReport> {
        self.read()?
            .reports
            .get(&id)
            .cloned()
            .ok_or(BillingError::NotFound)
    }

    fn put_report(&self, report: MonthlyReport) -> BillingResult<()> {
        self.write()?.reports.insert(report.id, report);
        Ok(())
    }

    fn time_entry(&self, id: TimeEntryId) -> BillingResult<TimeEntry> {
        self.read()?
            .time_entries
            .get(&id)
            .cloned()
            .ok_or(BillingError::NotFound)
    }

    fn put_time_entry(&self, entry: TimeEntry) -> BillingResult<()> {
        let mut records = self.write()?;
        if let Some(existing) = records.time_entries.get(&entry.id) {
            if existing.billed {
                return Err(BillingError::validation(
                    "time entry has been billed and is immutable",
                ));
            }
        }
        records.time_entries.insert(entry.id, entry);
        Ok(())
    }

    fn entries_for_link(&self, link: TimeLink) -> BillingResult<Vec<TimeEntry>> {
        let records = self.read()?;
        let mut entries: Vec<TimeEntry> = records
            .time_entries
            .values()
            .filter(|e| e.link == Some(link))
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.id.as_uuid().to_owned());
        Ok(entries)
    }

    fn entries_in_period(
        &self,
        organization: OrganizationId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> BillingResult<Vec<TimeEntry>> {
        let records = self.read()?;
        let mut entries: Vec<TimeEntry> = records
            .time_entries
            .values()
            .filter(|e| e.organization == organization && start <= e.worked_on && e.worked_on <= end)
            .cloned()
            .collect();
        entries.sort_by_key(|e| (e.worked_on, e.id.as_uuid().to_owned()));
        Ok(entries)
    }

    fn invoice(&self, id: InvoiceId) -> BillingResult<Invoice> {
        self.read()?
            .invoices
            .get(&id)
            .cloned()
            .ok_or(BillingError::NotFound)
    }

    fn invoices(&self) -> BillingResult<Vec<Invoice>> {
        let mut invoices: Vec<Invoice> = self.read()?.invoices.values().cloned().collect();
        invoices.sort_by_key(|i| i.id_typed().as_uuid().to_owned());
        Ok(invoices)
    }

    fn insert_invoice(&self, invoice: Invoice) -> BillingResult<()> {
        let mut records = self.write()?;
        let id = invoice.id_typed();
        if records.invoices.contains_key(&id) {
            return Err(BillingError::validation("invoice already exists"));
        }
        records.invoices.insert(id, invoice);
        Ok(())
    }

    fn commit_invoice(&self, invoice: Invoice, expected: ExpectedVersion) -> BillingResult<()> {
        let mut records = self.write()?;
        let id = invoice.id_typed();
        let stored = records.invoices.get(&id).ok_or(BillingError::NotFound)?;

        expected.check(stored.version())?;

        records.invoices.insert(id, invoice);
        Ok(())
    }

    fn outstanding_closeout(&self, project: ProjectId) -> BillingResult<Option<InvoiceId>> {
        Ok(self.read()?.outstanding_closeout(project))
    }

    fn create_closeout_invoice(
        &self,
        invoice: Invoice,
        milestones: &[MilestoneId],
        consumed_entries: &[TimeEntryId],
    ) -> BillingResult<InvoiceId> {
        let Some(InvoiceSource::Closeout(project)) = invoice.source() else {
            return Err(BillingError::validation(
                "closeout invoice must be sourced from a project closeout",
            ));
        };

        let mut records = self.write()?;

        // The invariant check and the insert happen under the same write
        // lock; two simultaneous closeout builds cannot both pass it.
        if records.outstanding_closeout(project).is_some() {
            return Err(BillingError::AlreadyClosedOut);
        }

        let id = invoice.id_typed();
        records.invoices.insert(id, invoice);

        for milestone_id in milestones {
            if let Some(m) = records.milestones.get_mut(milestone_id) {
                m.invoice = Some(id);
            }
        }
        for entry_id in consumed_entries {
            if let Some(e) = records.time_entries.get_mut(entry_id) {
                e.billed = true;
            }
        }

        Ok(id)
    }
}
