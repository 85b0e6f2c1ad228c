// src/feed/bundle.rs
use crate::feed::event::{BUNDLE_SIZE, BundleId, Slot};
use std::collections::BTreeMap;

/// A group of up to eight item images, keyed by slot.
#[derive(Clone, Debug)]
pub struct Bundle {
    pub id: BundleId,
    items: BTreeMap<Slot, String>,
    ready: bool,
    ready_stamp: u64,
}

impl Bundle {
    pub fn new(id: BundleId) -> Self {
        Self { id, items: BTreeMap::new(), ready: false, ready_stamp: 0 }
    }

    /// Position in completion order (1 for the first bundle to become ready).
    #[inline(always)]
    pub fn ready_stamp(&self) -> u64 { self.ready_stamp }

    pub fn set_ready_stamp(&mut self, stamp: u64) {
        self.ready_stamp = stamp;
    }

    /// Records `url` at `slot`, overwriting any earlier url for that slot.
    /// Returns `true` only on the call that completes the bundle.
    pub fn insert(&mut self, slot: Slot, url: String) -> bool {
        self.items.insert(slot, url);
        if !self.ready && self.items.len() == BUNDLE_SIZE {
            self.ready = true;
            return true;
        }
        false
    }

    #[inline(always)]
    pub fn is_ready(&self) -> bool { self.ready }

    #[inline(always)]
    pub fn slot_count(&self) -> usize { self.items.len() }

    /// Items in slot order (1..=8).
    pub fn items(&self) -> impl Iterator<Item = (Slot, &str)> {
        self.items.iter().map(|(s, u)| (*s, u.as_str()))
    }
}

/// Bundles in arrival order.
#[derive(Debug, Default)]
pub struct PlaybackQueue {
    bundles: Vec<Bundle>,
}

impl PlaybackQueue {
    pub fn push(&mut self, bundle: Bundle) {
        self.bundles.push(bundle);
    }

    pub fn get(&self, id: &str) -> Option<&Bundle> {
        self.bundles.iter().find(|b| b.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Bundle> {
        self.bundles.iter_mut().find(|b| b.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn remove(&mut self, id: &str) -> Option<Bundle> {
        let idx = self.bundles.iter().position(|b| b.id == id)?;
        Some(self.bundles.remove(idx))
    }

    /// First ready bundle in queue order; earlier incomplete bundles do not block it.
    pub fn first_ready(&self) -> Option<&Bundle> {
        self.bundles.iter().find(|b| b.is_ready())
    }

    /// Ready bundle with the lowest ready stamp; equal stamps fall back to queue order.
    pub fn earliest_ready(&self) -> Option<&Bundle> {
        let mut best: Option<&Bundle> = None;
        for b in self.bundles.iter().filter(|b| b.is_ready()) {
            if best.is_none_or(|cur| b.ready_stamp < cur.ready_stamp) {
                best = Some(b);
            }
        }
        best
    }

    /// Most recently begun bundle still queued.
    pub fn newest(&self) -> Option<&Bundle> {
        self.bundles.last()
    }

    pub fn len(&self) -> usize { self.bundles.len() }
    pub fn is_empty(&self) -> bool { self.bundles.is_empty() }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.bundles.iter().map(|b| b.id.as_str())
    }
}
