//! Debounced accumulation of wishlist status checks.
//!
//! [`BatchState`] is the pure state machine behind the coordinator's batch
//! dispatch. It owns the pending and in-flight id sets and decides when a
//! timer firing should drain them; the coordinator owns the actual timer and
//! the network call.
//!
//! ```text
//!            enqueue (arm g)          fire(g), g current
//!   Idle ─────────────────▶ Accumulating ─────────────────▶ Draining
//!    ▲                        │  ▲   enqueue (arm g+1)         │
//!    │                        └──┘                             │
//!    │           last drain settles, nothing pending           │
//!    └─────────────────────────────────────────────────────────┘
//! ```
//!
//! An enqueue while draining moves straight back to `Accumulating`. A fire
//! whose generation is not the latest one is stale and changes nothing.

use std::collections::{BTreeSet, HashSet};

use shopfront_core::ProductId;

/// Observable phase of the batch machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPhase {
    /// Nothing pending, nothing in flight.
    Idle,
    /// Ids are pending and a timer is armed.
    Accumulating,
    /// At least one drained batch is in flight and nothing is pending.
    Draining,
}

/// Pending/in-flight bookkeeping for batched status checks.
#[derive(Debug)]
pub struct BatchState {
    phase: BatchPhase,
    generation: u64,
    pending: BTreeSet<ProductId>,
    in_flight: HashSet<ProductId>,
    drains: usize,
}

impl Default for BatchState {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchState {
    /// Create an idle machine.
    #[must_use]
    pub fn new() -> Self {
        Self {
            phase: BatchPhase::Idle,
            generation: 0,
            pending: BTreeSet::new(),
            in_flight: HashSet::new(),
            drains: 0,
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> BatchPhase {
        self.phase
    }

    /// Generation of the most recently armed timer.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether `id` is waiting for the next drain.
    #[must_use]
    pub fn is_pending(&self, id: ProductId) -> bool {
        self.pending.contains(&id)
    }

    /// Whether `id` is part of a batch request that has not settled.
    #[must_use]
    pub fn is_in_flight(&self, id: ProductId) -> bool {
        self.in_flight.contains(&id)
    }

    /// Pending ids in ascending order.
    #[must_use]
    pub fn pending_ids(&self) -> Vec<ProductId> {
        self.pending.iter().copied().collect()
    }

    /// Queue ids for the next drain.
    ///
    /// Ids already in flight are skipped since their answer is on its way.
    /// Returns the generation the caller must arm a timer for, or `None` when
    /// nothing was requested and the current timer (if any) stays as is.
    pub fn enqueue(&mut self, ids: impl IntoIterator<Item = ProductId>) -> Option<u64> {
        let mut requested = false;
        for id in ids {
            if self.in_flight.contains(&id) {
                continue;
            }
            self.pending.insert(id);
            requested = true;
        }

        if !requested {
            return None;
        }

        self.generation += 1;
        self.phase = BatchPhase::Accumulating;
        Some(self.generation)
    }

    /// Handle a timer firing for `generation`.
    ///
    /// Returns the drained ids when the timer is the current one and ids are
    /// pending. The drained set is exactly the pending set at this instant.
    pub fn fire(&mut self, generation: u64) -> Option<Vec<ProductId>> {
        if self.phase != BatchPhase::Accumulating || generation != self.generation {
            return None;
        }

        if self.pending.is_empty() {
            self.phase = self.settled_phase();
            return None;
        }

        let drained: Vec<ProductId> = std::mem::take(&mut self.pending).into_iter().collect();
        self.in_flight.extend(drained.iter().copied());
        self.drains += 1;
        self.phase = BatchPhase::Draining;
        Some(drained)
    }

    /// Record that the batch request for `ids` settled (either way).
    pub fn settle(&mut self, ids: &[ProductId]) {
        for id in ids {
            self.in_flight.remove(id);
        }
        self.drains = self.drains.saturating_sub(1);
        if self.phase == BatchPhase::Draining {
            self.phase = self.settled_phase();
        }
    }

    /// Drop `id` from the pending set, e.g. after an optimistic write made
    /// its status known. Returns whether it was pending.
    pub fn forget(&mut self, id: ProductId) -> bool {
        self.pending.remove(&id)
    }

    /// Discard every pending id without sending it. In-flight batches are
    /// unaffected. Returns the discarded ids.
    pub fn cancel_pending(&mut self) -> Vec<ProductId> {
        let cancelled: Vec<ProductId> = std::mem::take(&mut self.pending).into_iter().collect();
        // Any armed timer is now stale.
        self.generation += 1;
        if self.phase == BatchPhase::Accumulating {
            self.phase = self.settled_phase();
        }
        cancelled
    }

    /// Forget everything, invalidating any armed timer.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.in_flight.clear();
        self.drains = 0;
        self.generation += 1;
        self.phase = BatchPhase::Idle;
    }

    const fn settled_phase(&self) -> BatchPhase {
        if self.drains > 0 {
            BatchPhase::Draining
        } else {
            BatchPhase::Idle
        }
    }
}
