//! # GC root range tracking
//!
//! The runtime announces root memory ranges (stack areas, static fields,
//! handle tables) as register/unregister events. During graph assembly,
//! root slot addresses are resolved back to the named range that contains
//! them so objects can be grouped by root category.
//!
//! Ranges are kept in a `Vec` sorted ascending by start address and are
//! non-overlapping under correct runtime behavior, so a binary search
//! answers both insertion and point lookups in O(log n). Unregistration is
//! a linear scan; its volume is negligible next to lookups.

use crate::domain::AddressId;
use crate::parser::{RootRegisterEvent, RootUnregisterEvent};

/// A registered root memory range `[start, end)` with its category name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootRange {
    pub start: u64,
    pub end: u64,
    pub name: String,
}

impl RootRange {
    #[must_use]
    pub fn contains(&self, address: AddressId) -> bool {
        self.start <= address.0 && address.0 < self.end
    }
}

/// The currently-registered root ranges, ordered by start address.
///
/// Mutated only from the streaming phase of a capture; frozen before graph
/// assembly issues any lookup. In interactive mode one tracker is carried
/// across successive captures so root identity survives between dumps.
#[derive(Debug, Default)]
pub struct RootRangeTracker {
    ranges: Vec<RootRange>,
}

impl RootRangeTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the range starting at `ev.root_id`.
    ///
    /// Re-registration of an already-known start address replaces the
    /// prior entry (last write wins); registration and unregistration can
    /// race with transient runtime state, so the newest announcement is
    /// the one to trust.
    pub fn register(&mut self, ev: &RootRegisterEvent) {
        let range = RootRange {
            start: ev.root_id.0,
            end: ev.root_id.0 + ev.size,
            name: ev.key_name.clone(),
        };
        match self.ranges.binary_search_by(|r| r.start.cmp(&range.start)) {
            Ok(i) => self.ranges[i] = range,
            Err(i) => self.ranges.insert(i, range),
        }
    }

    /// Remove the range whose start equals `ev.root_id`. Silently a no-op
    /// if no such range exists.
    pub fn unregister(&mut self, ev: &RootUnregisterEvent) {
        if let Some(i) = self.ranges.iter().position(|r| r.start == ev.root_id.0) {
            self.ranges.remove(i);
        }
    }

    /// Find the range containing `address`, if any.
    #[must_use]
    pub fn find(&self, address: AddressId) -> Option<&RootRange> {
        // Candidate is the last range starting at or before the address.
        let i = self.ranges.partition_point(|r| r.start <= address.0);
        let candidate = self.ranges.get(i.checked_sub(1)?)?;
        candidate.contains(address).then_some(candidate)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Ranges in ascending start order.
    pub fn iter(&self) -> impl Iterator<Item = &RootRange> {
        self.ranges.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AddressId;

    fn register_ev(start: u64, size: u64, name: &str) -> RootRegisterEvent {
        RootRegisterEvent {
            root_id: AddressId(start),
            size,
            kind: 0,
            key_id: 0,
            key_name: name.to_string(),
        }
    }

    fn starts(tracker: &RootRangeTracker) -> Vec<u64> {
        tracker.iter().map(|r| r.start).collect()
    }

    #[test]
    fn stays_sorted_under_arbitrary_registration_order() {
        let mut tracker = RootRangeTracker::new();
        for start in [0x5000u64, 0x1000, 0x9000, 0x3000, 0x7000] {
            tracker.register(&register_ev(start, 0x100, "r"));
            let s = starts(&tracker);
            let mut sorted = s.clone();
            sorted.sort_unstable();
            assert_eq!(s, sorted);
        }
        assert_eq!(tracker.len(), 5);
    }

    #[test]
    fn find_hits_only_the_containing_range() {
        let mut tracker = RootRangeTracker::new();
        tracker.register(&register_ev(0x1000, 0x100, "Stack"));
        tracker.register(&register_ev(0x3000, 0x100, "Handles"));

        assert_eq!(tracker.find(AddressId(0x1000)).map(|r| r.name.as_str()), Some("Stack"));
        assert_eq!(tracker.find(AddressId(0x10ff)).map(|r| r.name.as_str()), Some("Stack"));
        assert_eq!(tracker.find(AddressId(0x3050)).map(|r| r.name.as_str()), Some("Handles"));
        // End is exclusive; gaps and out-of-range addresses miss.
        assert!(tracker.find(AddressId(0x1100)).is_none());
        assert!(tracker.find(AddressId(0x2000)).is_none());
        assert!(tracker.find(AddressId(0xfff)).is_none());
    }

    #[test]
    fn unregister_removes_by_start() {
        let mut tracker = RootRangeTracker::new();
        tracker.register(&register_ev(0x1000, 0x100, "a"));
        tracker.register(&register_ev(0x2000, 0x100, "b"));
        tracker.unregister(&RootUnregisterEvent { root_id: AddressId(0x1000) });
        assert_eq!(starts(&tracker), vec![0x2000]);
        assert!(tracker.find(AddressId(0x1050)).is_none());
    }

    #[test]
    fn unregister_of_absent_root_is_a_no_op() {
        let mut tracker = RootRangeTracker::new();
        tracker.register(&register_ev(0x1000, 0x100, "a"));
        tracker.unregister(&RootUnregisterEvent { root_id: AddressId(0xdead) });
        tracker.unregister(&RootUnregisterEvent { root_id: AddressId(0xdead) });
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn reregistration_replaces_the_prior_entry() {
        let mut tracker = RootRangeTracker::new();
        tracker.register(&register_ev(0x1000, 0x100, "old"));
        tracker.register(&register_ev(0x1000, 0x200, "new"));
        assert_eq!(tracker.len(), 1);
        let r = tracker.find(AddressId(0x1180)).expect("grown range");
        assert_eq!(r.name, "new");
        assert_eq!(r.end, 0x1200);
    }
}
