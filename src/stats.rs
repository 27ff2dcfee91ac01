use std::sync::atomic::{AtomicU64, Ordering};

/// Session-side counters, purely observational.
#[derive(Debug, Default)]
pub struct Stats {
    claimed: AtomicU64,
    claim_races: AtomicU64,
    duplicates: AtomicU64,
    promoted: AtomicU64,
    crashes: AtomicU64,
    lock_misses: AtomicU64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn inc_claimed(&self) {
        self.claimed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_claim_races(&self) {
        self.claim_races.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_duplicates(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_promoted(&self, n: u64) {
        self.promoted.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn inc_crashes(&self) {
        self.crashes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_lock_misses(&self) {
        self.lock_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn claimed(&self) -> u64 {
        self.claimed.load(Ordering::Relaxed)
    }

    pub fn claim_races(&self) -> u64 {
        self.claim_races.load(Ordering::Relaxed)
    }

    pub fn duplicates(&self) -> u64 {
        self.duplicates.load(Ordering::Relaxed)
    }

    pub fn promoted(&self) -> u64 {
        self.promoted.load(Ordering::Relaxed)
    }

    pub fn crashes(&self) -> u64 {
        self.crashes.load(Ordering::Relaxed)
    }

    pub fn lock_misses(&self) -> u64 {
        self.lock_misses.load(Ordering::Relaxed)
    }

    pub fn log_summary(&self) {
        log::info!(
            "claimed: {}, races: {}, dup: {}, promoted: {}, crashes: {}, lock misses: {}",
            self.claimed(),
            self.claim_races(),
            self.duplicates(),
            self.promoted(),
            self.crashes(),
            self.lock_misses()
        );
    }
}
