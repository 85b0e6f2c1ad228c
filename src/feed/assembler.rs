// src/feed/assembler.rs
use crate::feed::bundle::{Bundle, PlaybackQueue};
use crate::feed::event::Slot;
use log::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// Unknown or already-finished bundle; nothing changed.
    Dropped,
    Recorded,
    /// This item completed the bundle; the scheduler should be poked.
    BecameReady,
}

/// Reassembles `begin-bundle` / `add-item` events into complete bundles.
/// Owns the playback queue; the scheduler only reads it and removes
/// finished entries.
#[derive(Debug, Default)]
pub struct Assembler {
    queue: PlaybackQueue,
    /// Bumped once per completed bundle; events between two frames still
    /// get distinct, ordered stamps.
    ready_seq: u64,
}

impl Assembler {
    pub fn new() -> Self { Self::default() }

    /// Appends a new empty bundle. Returns `false` when the event was dropped.
    pub fn begin_bundle(&mut self, bundle_id: &str) -> bool {
        let id = bundle_id.trim();
        if id.is_empty() {
            warn!("begin-bundle without a bundle_id; dropped.");
            return false;
        }
        if self.queue.contains(id) {
            warn!("begin-bundle for '{}' which is already queued; dropped.", id);
            return false;
        }
        self.queue.push(Bundle::new(id.to_string()));
        info!("Bundle '{}' queued ({} in queue).", id, self.queue.len());
        true
    }

    /// Records one item. The item that completes a bundle stamps it with the
    /// next readiness sequence number.
    pub fn add_item(&mut self, bundle_id: &str, slot: Slot, url: String) -> AddOutcome {
        let Some(bundle) = self.queue.get_mut(bundle_id) else {
            warn!("add-item for unknown bundle '{}' (slot {}); dropped.", bundle_id, slot);
            return AddOutcome::Dropped;
        };
        if bundle.insert(slot, url) {
            self.ready_seq += 1;
            bundle.set_ready_stamp(self.ready_seq);
            info!("All {} items for bundle '{}' received; marking ready.", bundle.slot_count(), bundle_id);
            AddOutcome::BecameReady
        } else {
            debug!("Bundle '{}' slot {} recorded ({}/8).", bundle_id, slot, bundle.slot_count());
            AddOutcome::Recorded
        }
    }

    pub fn queue(&self) -> &PlaybackQueue { &self.queue }
    pub fn queue_mut(&mut self) -> &mut PlaybackQueue { &mut self.queue }
}
