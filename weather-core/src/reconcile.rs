//! Reconciliation of the upstream dataset against expected state.
//!
//! Two pieces live here: the seeding pass run ahead of unfiltered list reads,
//! and the read-back that disambiguates a delete reported as a 500.
//! [`ReconciliationState`] is the only state they share.

use std::sync::atomic::{AtomicBool, Ordering};

pub mod deletion;
pub mod seeding;

pub use deletion::{DeleteResolution, ReadBack};
pub use seeding::{SeedOptions, SeedOutcome, SeedSummary};

/// Advisory flags for the seeding heuristics, owned by the hosting process.
///
/// Checks and updates are separate loads and stores, so two concurrent list
/// reads can both see `initialization_attempted == false` and both seed.
/// Losing these flags only causes a redundant seeding attempt, since seeding
/// creates only missing reports.
#[derive(Debug, Default)]
pub struct ReconciliationState {
    initialization_attempted: AtomicBool,
    just_deleted_all: AtomicBool,
}

impl ReconciliationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initialization_attempted(&self) -> bool {
        self.initialization_attempted.load(Ordering::SeqCst)
    }

    pub fn set_initialization_attempted(&self, attempted: bool) {
        self.initialization_attempted.store(attempted, Ordering::SeqCst);
    }

    pub fn just_deleted_all(&self) -> bool {
        self.just_deleted_all.load(Ordering::SeqCst)
    }

    /// Record a confirmed delete-all so the next list read skips seeding.
    pub fn mark_deleted_all(&self) {
        self.just_deleted_all.store(true, Ordering::SeqCst);
    }

    /// Clear the delete-all marker, returning whether it was set.
    pub fn take_just_deleted_all(&self) -> bool {
        self.just_deleted_all.swap(false, Ordering::SeqCst)
    }

    /// Force `initialization_attempted` to true until the guard is dropped,
    /// then restore the previous value.
    pub fn suspend_initialization(&self) -> SuspendedInitialization<'_> {
        let previous = self.initialization_attempted.swap(true, Ordering::SeqCst);
        SuspendedInitialization {
            state: self,
            previous,
        }
    }
}

#[must_use = "initialization resumes as soon as the guard is dropped"]
#[derive(Debug)]
pub struct SuspendedInitialization<'a> {
    state: &'a ReconciliationState,
    previous: bool,
}

impl Drop for SuspendedInitialization<'_> {
    fn drop(&mut self) {
        self.state.set_initialization_attempted(self.previous);
    }
}
