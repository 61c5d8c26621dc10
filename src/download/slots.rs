// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Progress slot pool.
//!
//! A fixed-capacity arena of reusable progress rows. Slots are created
//! lazily up to capacity and then recycled for the rest of the run: when a
//! task finishes, its slot becomes eligible for the next task that needs
//! one, reset to the new occupant's total and label.
//!
//! The pool owns the authoritative slot state (current/total/label plus a
//! finished flag); the display row is just a view. All bookkeeping runs
//! under one mutex - acquire scans and reserves in a single critical
//! section, so two tasks can never be handed the same slot.
//!
//! The scheduler dispatches at most `capacity` tasks concurrently, so an
//! acquire always finds a free or finished slot. Exhaustion is therefore an
//! invariant violation, not back-pressure, and the pool panics on it rather
//! than blocking.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::download::display::{ProgressDisplay, ProgressRow};

struct Slot {
    current: u64,
    total: u64,
    label: String,
    finished: bool,
    row: Box<dyn ProgressRow>,
}

/// Fixed-capacity pool of recycled progress slots.
pub struct SlotPool {
    capacity: usize,
    display: Arc<dyn ProgressDisplay>,
    slots: Mutex<Vec<Slot>>,
}

impl SlotPool {
    /// Create a pool that will never hold more than `capacity` slots.
    pub fn new(capacity: usize, display: Arc<dyn ProgressDisplay>) -> Arc<Self> {
        Arc::new(Self {
            capacity,
            display,
            slots: Mutex::new(Vec::new()),
        })
    }

    /// Hand out a slot for a new transfer, creating one if the pool is
    /// below capacity, otherwise recycling the most recently finished one.
    ///
    /// # Panics
    ///
    /// Panics if every slot is occupied - that means more than `capacity`
    /// tasks are running concurrently, which the scheduler rules out.
    pub fn acquire(self: &Arc<Self>, total: u64, label: &str) -> SlotHandle {
        let mut slots = self.lock();

        let index = if slots.len() < self.capacity {
            let mut row = self.display.create_row();
            row.begin(total, label);
            slots.push(Slot {
                current: 0,
                total,
                label: label.to_string(),
                finished: false,
                row,
            });
            slots.len() - 1
        } else {
            let index = slots
                .iter()
                .rposition(|s| s.finished)
                .expect("slot pool exhausted: concurrent acquirers exceed pool capacity");
            let slot = &mut slots[index];
            slot.current = 0;
            slot.total = total;
            slot.label = label.to_string();
            slot.finished = false;
            slot.row.begin(total, label);
            index
        };

        tracing::trace!("slot {} -> {}", index, label.trim_end());
        SlotHandle {
            pool: Arc::clone(self),
            index,
            released: false,
        }
    }

    /// Number of slots created so far. Never exceeds capacity.
    pub fn live_slots(&self) -> usize {
        self.lock().len()
    }

    fn advance(&self, index: usize, delta: u64) {
        let mut slots = self.lock();
        let slot = &mut slots[index];
        slot.current += delta;
        slot.row.advance(delta);
    }

    fn release(&self, index: usize) {
        let mut slots = self.lock();
        let slot = &mut slots[index];
        slot.finished = true;
        slot.row.complete();
    }

    // A poisoned lock only means a sibling task panicked mid-update; the
    // byte counters are still sound, so keep going.
    fn lock(&self) -> MutexGuard<'_, Vec<Slot>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Exclusive handle to one slot for the duration of one transfer.
///
/// Dropping the handle releases the slot, so a failed task frees its row
/// the same way a successful one does.
pub struct SlotHandle {
    pool: Arc<SlotPool>,
    index: usize,
    released: bool,
}

impl SlotHandle {
    /// Record `delta` more bytes transferred.
    pub fn advance(&self, delta: u64) {
        self.pool.advance(self.index, delta);
    }

    /// Mark the transfer complete and make the slot reusable.
    pub fn finish(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if !self.released {
            self.released = true;
            self.pool.release(self.index);
        }
    }
}

impl Drop for SlotHandle {
    fn drop(&mut self) {
        self.release_inner();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::display::SilentDisplay;

    fn pool(capacity: usize) -> Arc<SlotPool> {
        SlotPool::new(capacity, Arc::new(SilentDisplay))
    }

    #[test]
    fn test_slots_created_lazily_up_to_capacity() {
        let pool = pool(3);
        assert_eq!(pool.live_slots(), 0);

        let a = pool.acquire(10, "a");
        let b = pool.acquire(20, "b");
        assert_eq!(pool.live_slots(), 2);

        a.finish();
        b.finish();
        assert_eq!(pool.live_slots(), 2);
    }

    #[test]
    fn test_finished_slot_is_recycled_not_grown() {
        let pool = pool(2);
        let a = pool.acquire(10, "a");
        let _b = pool.acquire(20, "b");
        a.finish();

        let c = pool.acquire(30, "c");
        assert_eq!(pool.live_slots(), 2);

        {
            let slots = pool.lock();
            let slot = slots.iter().find(|s| s.label == "c").unwrap();
            assert_eq!(slot.current, 0);
            assert_eq!(slot.total, 30);
            assert!(!slot.finished);
        }
        c.finish();
    }

    #[test]
    fn test_recycle_picks_last_finished_in_scan_order() {
        let pool = pool(3);
        let a = pool.acquire(1, "a");
        let b = pool.acquire(1, "b");
        let _c = pool.acquire(1, "c");
        a.finish();
        b.finish();

        // b sits after a in scan order, so b's slot (index 1) is reused
        let d = pool.acquire(5, "d");
        assert_eq!(d.index, 1);
    }

    #[test]
    fn test_advance_accumulates() {
        let pool = pool(1);
        let slot = pool.acquire(100, "x");
        slot.advance(30);
        slot.advance(12);
        {
            let slots = pool.lock();
            assert_eq!(slots[0].current, 42);
        }
        slot.finish();
    }

    #[test]
    fn test_drop_releases_like_finish() {
        let pool = pool(1);
        {
            let _slot = pool.acquire(10, "doomed");
            // dropped without finish(), e.g. the task errored out
        }
        let next = pool.acquire(20, "next");
        assert_eq!(pool.live_slots(), 1);
        next.finish();
    }

    #[test]
    #[should_panic(expected = "slot pool exhausted")]
    fn test_exhaustion_is_an_invariant_violation() {
        let pool = pool(1);
        let _held = pool.acquire(10, "held");
        let _ = pool.acquire(10, "too many");
    }
}
