//! The `Billable` seam.
//!
//! Milestones, monthly reports, and project closeouts all resolve a
//! chargeable amount through the same rules. Instead of duck-typed lookups,
//! each entity states its billing inputs through this trait.

use agencybill_core::{Money, OrganizationId};

/// Any entity for which a chargeable amount can be resolved.
pub trait Billable {
    /// Fixed price, if the entity carries one. An amount ≤ 0 counts as unset
    /// (the entity is billed hourly).
    fn fixed_amount(&self) -> Option<Money>;

    /// The organization that pays for this work.
    fn organization(&self) -> OrganizationId;

    /// Whether this is a deposit (invoiced ahead of normal completion billing).
    fn is_deposit(&self) -> bool {
        false
    }
}
