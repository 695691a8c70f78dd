//! Project closeout aggregation.
//!
//! Rolls up all billable-but-not-yet-billed work under a project into one
//! classification: which milestones can go on the closeout invoice and which
//! are excluded, with the reason. Classification never mutates anything —
//! invoice creation from the plan is a separate, explicit action.

use serde::{Deserialize, Serialize};

use agencybill_core::{BillingError, MilestoneId, Money, ProjectId};

use crate::invoice::InvoiceStatus;
use crate::milestone::Milestone;
use crate::resolver::{AmountBreakdown, RateCard, resolve_amount};
use crate::time_entry::TimeEntry;

/// Why a milestone stays off the closeout invoice. Excluded milestones are
/// still reported so staff can see what was skipped and why.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    /// Already carries a non-draft, non-void invoice.
    AlreadyInvoiced,
    /// A draft invoice exists — unapproved time, not safe to re-bill.
    DraftExists,
    /// Resolves to zero: nothing billable yet.
    NothingBillable,
    /// Hourly milestone with no rate anywhere; downgraded, not aborted.
    RateMissing,
    /// Not linked to the project being closed out.
    NoProject,
}

/// A milestone plus the context needed to classify it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseoutCandidate {
    pub milestone: Milestone,
    /// Time entries linked to this milestone.
    pub entries: Vec<TimeEntry>,
    /// Stored status of the milestone's linked invoice, if any.
    pub invoice_status: Option<InvoiceStatus>,
}

/// A milestone cleared for the closeout invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibleItem {
    pub milestone: MilestoneId,
    pub name: String,
    pub breakdown: AmountBreakdown,
    /// Entries the closeout invoice will consume (marked billed at creation).
    pub entries: Vec<TimeEntry>,
}

/// The closeout classification for one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseoutPlan {
    pub project: ProjectId,
    pub eligible: Vec<EligibleItem>,
    pub excluded: Vec<(MilestoneId, ExclusionReason)>,
    /// Unlinked project-level time rolled into its own entry, when billable.
    pub project_time: Option<AmountBreakdown>,
    pub project_entries: Vec<TimeEntry>,
    pub amount: Money,
}

impl CloseoutPlan {
    pub fn is_empty(&self) -> bool {
        self.eligible.is_empty() && self.project_time.is_none()
    }
}

/// Classify every milestone under a project plus the project's own unlinked
/// time entries.
///
/// Amount-resolution failures downgrade to an exclusion rather than aborting
/// the whole build. Entries already consumed by an earlier invoice are
/// ignored, which is what keeps a re-run after partial failure from
/// double-billing.
pub fn build_closeout(
    project: ProjectId,
    candidates: Vec<CloseoutCandidate>,
    project_entries: Vec<TimeEntry>,
    rates: &RateCard,
) -> CloseoutPlan {
    let mut eligible = Vec::new();
    let mut excluded = Vec::new();
    let mut amount = Money::ZERO;

    for candidate in candidates {
        let milestone = candidate.milestone;
        let id = milestone.id;

        if milestone.project != Some(project) {
            excluded.push((id, ExclusionReason::NoProject));
            continue;
        }

        match candidate.invoice_status.map(InvoiceStatus::normalized) {
            Some(InvoiceStatus::Draft) => {
                excluded.push((id, ExclusionReason::DraftExists));
                continue;
            }
            Some(InvoiceStatus::Void) | None => {}
            Some(_) => {
                excluded.push((id, ExclusionReason::AlreadyInvoiced));
                continue;
            }
        }

        let entries: Vec<TimeEntry> = candidate
            .entries
            .into_iter()
            .filter(|e| !e.billed)
            .collect();

        let breakdown = match resolve_amount(&milestone, &entries, rates) {
            Ok(b) => b,
            Err(BillingError::MissingRate) => {
                excluded.push((id, ExclusionReason::RateMissing));
                continue;
            }
            Err(_) => {
                excluded.push((id, ExclusionReason::NothingBillable));
                continue;
            }
        };

        if !breakdown.amount.is_positive() {
            excluded.push((id, ExclusionReason::NothingBillable));
            continue;
        }

        amount += breakdown.amount;
        eligible.push(EligibleItem {
            milestone: id,
            name: milestone.name,
            breakdown,
            entries,
        });
    }

    let project_entries: Vec<TimeEntry> = project_entries
        .into_iter()
        .filter(|e| !e.billed)
        .collect();

    let project_time = match rates.effective() {
        Some(rate) => {
            let hours = crate::time_entry::billable_hours(&project_entries);
            let charge = Money::from_hours(hours, rate);
            charge.is_positive().then(|| AmountBreakdown {
                amount: charge,
                source: crate::resolver::AmountSource::Hourly,
                hours,
                rate,
            })
        }
        // Rate missing: project-level time is skipped, milestones already
        // carry the per-milestone RateMissing exclusions.
        None => None,
    };

    if let Some(ref pt) = project_time {
        amount += pt.amount;
    }

    CloseoutPlan {
        project,
        eligible,
        excluded,
        project_time,
        project_entries,
        amount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agencybill_core::{OrganizationId, TimeEntryId};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    use crate::milestone::Milestone;
    use crate::time_entry::TimeLink;

    fn org() -> OrganizationId {
        OrganizationId::new()
    }

    fn entry(org: OrganizationId, hours: rust_decimal::Decimal, billable: bool) -> TimeEntry {
        TimeEntry::new(
            TimeEntryId::new(),
            org,
            NaiveDate::from_ymd_opt(2026, 7, 20).unwrap(),
            hours,
            billable,
            None,
        )
        .unwrap()
    }

    fn milestone(org: OrganizationId, project: ProjectId, name: &str) -> Milestone {
        Milestone::new(agencybill_core::MilestoneId::new(), org, Some(project), name)
    }

    fn rates() -> RateCard {
        RateCard::new(Some(Money::from_cents(5_000)), None)
    }

    #[test]
    fn classifies_eligible_and_excluded() {
        let org = org();
        let project = ProjectId::new();

        let fixed = milestone(org, project, "fixed").with_fixed_amount(Money::from_cents(100_000));
        let invoiced = milestone(org, project, "invoiced");
        let drafted = milestone(org, project, "drafted");
        let empty = milestone(org, project, "empty");
        let hourly = milestone(org, project, "hourly");

        let plan = build_closeout(
            project,
            vec![
                CloseoutCandidate {
                    milestone: fixed.clone(),
                    entries: vec![],
                    invoice_status: None,
                },
                CloseoutCandidate {
                    milestone: invoiced.clone(),
                    entries: vec![],
                    invoice_status: Some(InvoiceStatus::Pending),
                },
                CloseoutCandidate {
                    milestone: drafted.clone(),
                    entries: vec![],
                    invoice_status: Some(InvoiceStatus::Draft),
                },
                CloseoutCandidate {
                    milestone: empty.clone(),
                    entries: vec![],
                    invoice_status: None,
                },
                CloseoutCandidate {
                    milestone: hourly.clone(),
                    entries: vec![entry(org, dec!(2), true)],
                    invoice_status: None,
                },
            ],
            vec![],
            &rates(),
        );

        let eligible: Vec<_> = plan.eligible.iter().map(|e| e.milestone).collect();
        assert_eq!(eligible, vec![fixed.id, hourly.id]);
        assert_eq!(
            plan.excluded,
            vec![
                (invoiced.id, ExclusionReason::AlreadyInvoiced),
                (drafted.id, ExclusionReason::DraftExists),
                (empty.id, ExclusionReason::NothingBillable),
            ]
        );
        // $1000 fixed + 2h * $50.
        assert_eq!(plan.amount, Money::from_cents(110_000));
    }

    #[test]
    fn void_invoice_does_not_block_closeout() {
        let org = org();
        let project = ProjectId::new();
        let m = milestone(org, project, "voided").with_fixed_amount(Money::from_cents(10_000));

        let plan = build_closeout(
            project,
            vec![CloseoutCandidate {
                milestone: m.clone(),
                entries: vec![],
                invoice_status: Some(InvoiceStatus::Void),
            }],
            vec![],
            &rates(),
        );

        assert_eq!(plan.eligible.len(), 1);
        assert_eq!(plan.eligible[0].milestone, m.id);
    }

    #[test]
    fn missing_rate_downgrades_to_exclusion() {
        let org = org();
        let project = ProjectId::new();
        let hourly = milestone(org, project, "hourly");

        let plan = build_closeout(
            project,
            vec![CloseoutCandidate {
                milestone: hourly.clone(),
                entries: vec![entry(org, dec!(3), true)],
                invoice_status: None,
            }],
            vec![],
            &RateCard::default(),
        );

        assert!(plan.eligible.is_empty());
        assert_eq!(plan.excluded, vec![(hourly.id, ExclusionReason::RateMissing)]);
    }

    #[test]
    fn project_level_unlinked_time_is_rolled_in() {
        let org = org();
        let project = ProjectId::new();
        let mut linked = entry(org, dec!(4), true);
        linked.link = Some(TimeLink::Project(project));

        let plan = build_closeout(project, vec![], vec![linked], &rates());

        let pt = plan.project_time.expect("project time should bill");
        assert_eq!(pt.hours, dec!(4));
        assert_eq!(plan.amount, Money::from_cents(20_000));
    }

    #[test]
    fn already_billed_entries_are_not_rebilled() {
        let org = org();
        let project = ProjectId::new();
        let mut consumed = entry(org, dec!(4), true);
        consumed.billed = true;

        let plan = build_closeout(project, vec![], vec![consumed], &rates());
        assert!(plan.project_time.is_none());
        assert!(plan.is_empty());
        assert_eq!(plan.amount, Money::ZERO);
    }
}
