//! Invoice numbering authority.

use std::sync::atomic::{AtomicU64, Ordering};

use agencybill_billing::InvoiceNumber;

/// Issues the next invoice number at finalize time.
///
/// Numbers must be unique even under concurrent finalize calls, and are
/// never reclaimed: a finalize that later fails its concurrency check simply
/// leaves a gap in the sequence.
pub trait NumberingAuthority: Send + Sync {
    fn next_number(&self) -> InvoiceNumber;
}

/// Monotonic in-process counter.
#[derive(Debug)]
pub struct SequentialNumbering {
    next: AtomicU64,
}

impl SequentialNumbering {
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl Default for SequentialNumbering {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl NumberingAuthority for SequentialNumbering {
    fn next_number(&self) -> InvoiceNumber {
        InvoiceNumber(self.next.fetch_add(1, Ordering::SeqCst))
    }
}
