// src/feed/scheduler.rs
use crate::feed::bundle::{Bundle, PlaybackQueue};
use crate::feed::event::{BundleId, Slot};
use log::{info, warn};

/// Which ready bundle is admitted when several are waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PromotionOrder {
    /// First ready bundle in arrival order.
    Queue,
    /// Bundle that became ready earliest; ties by arrival order.
    #[default]
    Readiness,
}

impl PromotionOrder {
    pub fn from_str_lossy(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "queue" | "fifo" => Self::Queue,
            _ => Self::Readiness,
        }
    }
}

/// A bundle handed to the animation engine. Owns a snapshot of the items so
/// playback is independent of the queue entry.
#[derive(Debug, Clone)]
pub struct Promotion {
    pub bundle_id: BundleId,
    pub items: Vec<(Slot, String)>,
}

impl Promotion {
    fn from_bundle(b: &Bundle) -> Self {
        Self {
            bundle_id: b.id.clone(),
            items: b.items().map(|(s, u)| (s, u.to_string())).collect(),
        }
    }
}

/// Admits at most one bundle at a time into playback.
#[derive(Debug, Default)]
pub struct Scheduler {
    current: Option<BundleId>,
    order: PromotionOrder,
    promoted: u64,
    finished: u64,
}

impl Scheduler {
    pub fn new(order: PromotionOrder) -> Self {
        Self { order, ..Default::default() }
    }

    #[inline(always)]
    pub fn current(&self) -> Option<&str> { self.current.as_deref() }

    /// (promoted, finished) totals since start.
    pub fn counters(&self) -> (u64, u64) { (self.promoted, self.finished) }

    /// Promotes a ready bundle if nothing is current.
    pub fn try_promote(&mut self, queue: &PlaybackQueue) -> Option<Promotion> {
        if self.current.is_some() {
            return None;
        }
        let next = match self.order {
            PromotionOrder::Queue => queue.first_ready(),
            PromotionOrder::Readiness => queue.earliest_ready(),
        }?;
        self.current = Some(next.id.clone());
        self.promoted += 1;
        info!("Promoted bundle '{}' ({} still queued).", next.id, queue.len() - 1);
        Some(Promotion::from_bundle(next))
    }

    /// Ends playback of `bundle_id`, drops it from the queue and promotes the
    /// next ready bundle in the same call.
    pub fn finish(&mut self, queue: &mut PlaybackQueue, bundle_id: &str) -> Option<Promotion> {
        if self.current.as_deref() != Some(bundle_id) {
            warn!(
                "finish('{}') ignored; current is {:?}.",
                bundle_id,
                self.current.as_deref()
            );
            return None;
        }
        queue.remove(bundle_id);
        self.current = None;
        self.finished += 1;
        info!("Bundle '{}' finished.", bundle_id);
        self.try_promote(queue)
    }
}
