// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The fenced ring algorithm.
//!
//! A [`RingCursor`] hands out ranges of a fixed-size arena through a write
//! offset that only ever grows; the position inside the arena is the offset
//! modulo the arena size. Work recorded since the last [`close_tab`] is grouped
//! into a [`RingTab`] tagged with the fence value that retires it, and
//! [`reclaim`] advances the consumed offset past every tab whose fence has
//! completed.
//!
//! An allocation never straddles the end of the arena: when it would, the tail
//! is skipped and counted as used until the tab that contains it retires. A
//! ring with nothing in flight restarts at the start of the arena.
//!
//! ```text
//!   consumed            written
//!      |   tab(f=7)  | tab(f=8) |  open  |
//! -----[=============|==========|========]---------
//! ```
//!
//! Invariant: `written - consumed <= capacity`. An allocation that would break
//! it fails instead of overwriting unconsumed data.
//!
//! [`close_tab`]: RingCursor::close_tab
//! [`reclaim`]: RingCursor::reclaim

use cadence_core::{align_up, FenceValue};
use std::collections::VecDeque;

/// A closed span of the ring, retired once `fence` completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingTab {
    /// Write offset at the moment the tab was closed.
    pub end: u64,
    /// Fence value that retires the span.
    pub fence: FenceValue,
}

/// A monotonic write cursor over a fixed-size arena.
#[derive(Debug)]
pub struct RingCursor {
    capacity: u64,
    alignment: u64,
    written: u64,
    consumed: u64,
    tab_start: u64,
    tabs: VecDeque<RingTab>,
}

impl RingCursor {
    /// Creates a cursor over `capacity` bytes, aligning every allocation to
    /// `alignment` (a power of two). The capacity is rounded down to a
    /// multiple of the alignment.
    pub fn new(capacity: u64, alignment: u64) -> Self {
        debug_assert!(alignment.is_power_of_two());
        Self {
            capacity: capacity - capacity % alignment,
            alignment,
            written: 0,
            consumed: 0,
            tab_start: 0,
            tabs: VecDeque::new(),
        }
    }

    /// Reserves `size` bytes and returns their offset inside the arena.
    ///
    /// Returns `None` if the reservation would overwrite data that has not
    /// been reclaimed yet.
    pub fn allocate(&mut self, size: u64) -> Option<u64> {
        let size = align_up(size.max(1), self.alignment);
        if size > self.capacity {
            return None;
        }

        let head = self.written % self.capacity;
        let padding = if head + size > self.capacity {
            self.capacity - head
        } else {
            0
        };
        if self.written + padding + size - self.consumed > self.capacity {
            return None;
        }

        self.written += padding;
        let offset = self.written % self.capacity;
        self.written += size;
        Some(offset)
    }

    /// Closes the open span into a tab retired by `fence`.
    pub fn close_tab(&mut self, fence: FenceValue) {
        if self.written > self.tab_start {
            self.tabs.push_back(RingTab {
                end: self.written,
                fence,
            });
        }
        self.tab_start = self.written;
    }

    /// Releases every tab whose fence is `<= completed` and returns the number
    /// of bytes released.
    pub fn reclaim(&mut self, completed: FenceValue) -> u64 {
        let before = self.consumed;
        while let Some(tab) = self.tabs.front().copied() {
            if tab.fence > completed {
                break;
            }
            self.consumed = tab.end;
            self.tabs.pop_front();
        }
        let released = self.consumed - before;

        if self.consumed == self.written && self.capacity > 0 {
            let restart = self.written.div_ceil(self.capacity) * self.capacity;
            self.written = restart;
            self.consumed = restart;
            self.tab_start = restart;
        }
        released
    }

    /// Arena size in bytes.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Total bytes ever reserved, padding included.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Total bytes ever released.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Bytes reserved but not yet released.
    pub fn in_flight(&self) -> u64 {
        self.written - self.consumed
    }

    /// Bytes reserved since the last closed tab.
    pub fn open_bytes(&self) -> u64 {
        self.written - self.tab_start
    }

    /// Tabs waiting on their fence.
    pub fn pending_tabs(&self) -> impl Iterator<Item = &RingTab> {
        self.tabs.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlaps(a: (u64, u64), b: (u64, u64)) -> bool {
        a.0 < b.0 + b.1 && b.0 < a.0 + a.1
    }

    #[test]
    fn test_allocations_within_capacity_never_overlap() {
        let mut ring = RingCursor::new(64 * 1024, 256);
        // Deterministic pseudo-random sizes.
        let mut seed = 0x2545_f491_u64;
        let mut ranges = Vec::new();
        let mut total = 0;
        loop {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let size = 1 + (seed >> 33) % 3000;
            let aligned = align_up(size, 256);
            if total + aligned > ring.capacity() {
                break;
            }
            let offset = ring.allocate(size).expect("within capacity");
            ranges.push((offset, aligned));
            total += aligned;
        }

        assert!(ranges.len() > 10);
        for (i, a) in ranges.iter().enumerate() {
            assert!(a.0 + a.1 <= ring.capacity());
            for b in &ranges[i + 1..] {
                assert!(!overlaps(*a, *b), "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn test_full_ring_refuses_until_reclaimed() {
        let mut ring = RingCursor::new(1024, 256);
        for _ in 0..4 {
            ring.allocate(256).unwrap();
        }
        ring.close_tab(1);
        assert_eq!(ring.allocate(1), None);

        assert_eq!(ring.reclaim(0), 0);
        assert_eq!(ring.allocate(1), None);

        assert_eq!(ring.reclaim(1), 1024);
        assert_eq!(ring.allocate(1), Some(0));
    }

    #[test]
    fn test_wrap_skips_tail_and_counts_padding() {
        let mut ring = RingCursor::new(1024, 256);
        ring.allocate(512).unwrap();
        ring.close_tab(1);
        ring.allocate(256).unwrap();
        ring.close_tab(2);
        ring.reclaim(1);

        // 256 bytes left at the tail, 512 free at the head.
        assert_eq!(ring.allocate(512), Some(0));
        assert_eq!(ring.in_flight(), 256 + 256 + 512);
        assert!(ring.in_flight() <= ring.capacity());
        assert_eq!(ring.allocate(1), None);
    }

    #[test]
    fn test_drained_ring_restarts_at_arena_start() {
        let mut ring = RingCursor::new(1024, 256);
        ring.allocate(768).unwrap();
        ring.close_tab(1);
        assert_eq!(ring.reclaim(1), 768);

        // The whole arena is free again, without padding the old tail.
        assert_eq!(ring.in_flight(), 0);
        assert_eq!(ring.allocate(512), Some(0));
        assert_eq!(ring.allocate(512), Some(512));
        assert_eq!(ring.in_flight(), 1024);
        assert!(ring.written() >= 768 + 1024);
    }

    #[test]
    fn test_reclaim_respects_fence_order() {
        let mut ring = RingCursor::new(4096, 256);
        ring.allocate(256).unwrap();
        ring.close_tab(1);
        ring.allocate(512).unwrap();
        ring.close_tab(2);
        ring.allocate(256).unwrap();
        ring.close_tab(3);

        assert_eq!(ring.reclaim(2), 768);
        assert_eq!(ring.pending_tabs().count(), 1);
        assert_eq!(ring.in_flight(), 256);
    }

    #[test]
    fn test_empty_span_does_not_create_tab() {
        let mut ring = RingCursor::new(4096, 256);
        ring.close_tab(1);
        assert_eq!(ring.pending_tabs().count(), 0);
        ring.allocate(10).unwrap();
        assert_eq!(ring.open_bytes(), 256);
        ring.close_tab(2);
        assert_eq!(ring.open_bytes(), 0);
    }

    #[test]
    fn test_oversized_request_fails() {
        let mut ring = RingCursor::new(1000, 256);
        assert_eq!(ring.capacity(), 768);
        assert_eq!(ring.allocate(769), None);
    }
}
