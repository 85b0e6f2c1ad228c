// src/feed/decisions.rs
use crate::feed::event::{BundleId, Mark, Slot, Verdict};
use log::debug;
use std::collections::HashMap;

/// Out-of-band verdicts keyed by bundle and slot. Written whenever marks
/// arrive, read lazily by the engine; entries live for the whole session.
#[derive(Debug, Default)]
pub struct DecisionStore {
    by_bundle: HashMap<BundleId, [Option<Verdict>; 8]>,
}

impl DecisionStore {
    pub fn new() -> Self { Self::default() }

    /// Merges `marks` into the bundle's map. Last write per slot wins.
    pub fn record(&mut self, bundle_id: &str, marks: &[Mark]) {
        let entry = self
            .by_bundle
            .entry(bundle_id.to_string())
            .or_insert([None; 8]);
        for m in marks {
            entry[m.slot.index()] = Some(m.verdict);
        }
        debug!("Recorded {} mark(s) for bundle '{}'.", marks.len(), bundle_id);
    }

    /// `None` means unknown, including for bundles never seen.
    #[inline]
    pub fn lookup(&self, bundle_id: &str, slot: Slot) -> Option<Verdict> {
        self.by_bundle.get(bundle_id).and_then(|v| v[slot.index()])
    }

    /// Number of bundles with at least one recorded mark.
    pub fn len(&self) -> usize { self.by_bundle.len() }
    pub fn is_empty(&self) -> bool { self.by_bundle.is_empty() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mark(n: u8, v: Verdict) -> Mark {
        Mark { slot: Slot::new(n).unwrap(), verdict: v }
    }

    #[test]
    fn lookup_for_unseen_bundle_is_unknown() {
        let d = DecisionStore::new();
        assert_eq!(d.lookup("ghost", Slot::new(1).unwrap()), None);
        assert!(d.is_empty());
    }

    #[test]
    fn record_merges_and_overwrites() {
        let mut d = DecisionStore::new();
        d.record("b", &[mark(1, Verdict::Accept), mark(2, Verdict::Reject)]);
        d.record("b", &[mark(2, Verdict::Accept)]);
        assert_eq!(d.lookup("b", Slot::new(1).unwrap()), Some(Verdict::Accept));
        assert_eq!(d.lookup("b", Slot::new(2).unwrap()), Some(Verdict::Accept));
        assert_eq!(d.lookup("b", Slot::new(3).unwrap()), None);
        assert_eq!(d.len(), 1);
    }

    #[test]
    fn record_is_idempotent() {
        let mut d = DecisionStore::new();
        let marks = [mark(5, Verdict::Reject)];
        d.record("b", &marks);
        d.record("b", &marks);
        assert_eq!(d.lookup("b", Slot::new(5).unwrap()), Some(Verdict::Reject));
    }
}
