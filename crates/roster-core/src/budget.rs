//! Process-wide crawl counters shared by every worker.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::config::SeedScope;

/// Record cap and one-shot latches.
///
/// `stop_requested` and the seeding latch only ever flip from false to true.
#[derive(Debug)]
pub struct CrawlBudget {
    max_records: Option<u64>,
    records_emitted: AtomicU64,
    stop_requested: AtomicBool,
    seed_scope: SeedScope,
    numeric_pagination_seeded: AtomicBool,
    seeded_roots: Mutex<HashSet<String>>,
}

impl CrawlBudget {
    pub fn new(max_records: Option<u64>, seed_scope: SeedScope) -> Self {
        let budget = Self {
            max_records,
            records_emitted: AtomicU64::new(0),
            stop_requested: AtomicBool::new(false),
            seed_scope,
            numeric_pagination_seeded: AtomicBool::new(false),
            seeded_roots: Mutex::new(HashSet::new()),
        };
        if max_records == Some(0) {
            budget.stop_requested.store(true, Ordering::SeqCst);
        }
        budget
    }

    pub fn unlimited() -> Self {
        Self::new(None, SeedScope::Run)
    }

    /// Counts one emitted record; returns the new total.
    ///
    /// Latches `stop_requested` once the cap is reached.
    pub fn record_emitted(&self) -> u64 {
        let total = self.records_emitted.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(cap) = self.max_records {
            if total >= cap && !self.stop_requested.swap(true, Ordering::SeqCst) {
                tracing::info!(records = total, cap, "Record cap reached, stopping discovery");
            }
        }
        total
    }

    pub fn records_emitted(&self) -> u64 {
        self.records_emitted.load(Ordering::SeqCst)
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    pub fn numeric_pagination_seeded(&self) -> bool {
        self.numeric_pagination_seeded.load(Ordering::SeqCst)
    }

    /// Claims the bulk-seeding slot. Exactly one caller per scope gets `true`.
    ///
    /// `root` identifies the listing (host + path); it only matters under
    /// [`SeedScope::ListingRoot`].
    pub fn try_claim_seeding(&self, root: &str) -> bool {
        match self.seed_scope {
            SeedScope::Run => self
                .numeric_pagination_seeded
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok(),
            SeedScope::ListingRoot => {
                let mut roots = match self.seeded_roots.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                let claimed = roots.insert(root.to_string());
                if claimed {
                    self.numeric_pagination_seeded.store(true, Ordering::SeqCst);
                }
                claimed
            }
        }
    }
}

impl Default for CrawlBudget {
    fn default() -> Self {
        Self::unlimited()
    }
}
