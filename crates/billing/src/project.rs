//! Project record.

use serde::{Deserialize, Serialize};

use agencybill_core::{OrganizationId, ProjectId};

/// A body of work for one organization, billed through milestones and, at the
/// end, a single closeout invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub organization: OrganizationId,
    pub name: String,
}

impl Project {
    pub fn new(id: ProjectId, organization: OrganizationId, name: impl Into<String>) -> Self {
        Self {
            id,
            organization,
            name: name.into(),
        }
    }
}
