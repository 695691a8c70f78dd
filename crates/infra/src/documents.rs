//! Document generation boundary.
//!
//! Called after Draft goes Pending, best-effort: a failure flags the invoice
//! for retry and never rolls back the transition. Generation must be
//! idempotent so retries are safe.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

use agencybill_billing::InvoiceNumber;
use agencybill_core::InvoiceId;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("document generation failed: {0}")]
    Generation(String),
}

/// Renders the client-facing document for a finalized invoice and returns
/// its location.
pub trait DocumentGenerator: Send + Sync {
    fn generate(&self, invoice: InvoiceId, number: InvoiceNumber)
    -> Result<String, DocumentError>;
}

/// Test double: records every generation request and can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingDocumentGenerator {
    failing: AtomicBool,
    generated: Mutex<Vec<InvoiceId>>,
}

impl RecordingDocumentGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn generated(&self) -> Vec<InvoiceId> {
        self.generated.lock().expect("generator lock poisoned").clone()
    }
}

impl DocumentGenerator for RecordingDocumentGenerator {
    fn generate(
        &self,
        invoice: InvoiceId,
        number: InvoiceNumber,
    ) -> Result<String, DocumentError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DocumentError::Generation("backend unavailable".into()));
        }
        self.generated
            .lock()
            .expect("generator lock poisoned")
            .push(invoice);
        Ok(format!("invoices/{number}.pdf"))
    }
}
