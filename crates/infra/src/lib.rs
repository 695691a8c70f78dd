//! Infrastructure for the billing engine: record store, numbering authority,
//! document generation, and the `BillingService` orchestration layer.
//!
//! The engine itself (`agencybill-billing`) is pure; everything that touches
//! shared state or an external collaborator lives here, behind narrow traits
//! with in-memory implementations for tests and development.

pub mod documents;
pub mod numbering;
pub mod service;
pub mod store;

#[cfg(test)]
mod integration_tests;

pub use documents::{DocumentError, DocumentGenerator, RecordingDocumentGenerator};
pub use numbering::{NumberingAuthority, SequentialNumbering};
pub use service::{BillingConfig, BillingService};
pub use store::{InMemoryRecordStore, RecordStore};
