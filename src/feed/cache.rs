// src/feed/cache.rs
use crate::feed::event::{BundleId, Slot};
use log::{debug, info};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Pending,
    Loaded,
    Failed,
}

/// What the caller must do after asking the cache for a url.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Outcome already known.
    Settled(LoadState),
    /// Someone already asked; wait for the outcome.
    InFlight,
    /// First request for this url; the caller starts the load.
    Fetch,
}

/// Load outcome per url. The first settled outcome sticks.
#[derive(Debug, Default)]
pub struct ImageCache {
    states: HashMap<String, LoadState>,
}

impl ImageCache {
    pub fn new() -> Self { Self::default() }

    pub fn request(&mut self, url: &str) -> Request {
        match self.states.get(url) {
            Some(LoadState::Pending) => Request::InFlight,
            Some(s) => Request::Settled(*s),
            None => {
                self.states.insert(url.to_string(), LoadState::Pending);
                Request::Fetch
            }
        }
    }

    /// Returns `false` if the url had already settled (the old outcome is kept).
    pub fn settle(&mut self, url: &str, ok: bool) -> bool {
        let new = if ok { LoadState::Loaded } else { LoadState::Failed };
        match self.states.get_mut(url) {
            Some(LoadState::Pending) => {}
            Some(_) => return false,
            None => {}
        }
        self.states.insert(url.to_string(), new);
        true
    }

    pub fn state(&self, url: &str) -> Option<LoadState> {
        self.states.get(url).copied()
    }

    #[inline]
    pub fn is_loaded(&self, url: &str) -> bool {
        self.state(url) == Some(LoadState::Loaded)
    }

    pub fn len(&self) -> usize { self.states.len() }
    pub fn is_empty(&self) -> bool { self.states.is_empty() }
}

/// Counts the load outcomes of one promoted bundle. Releases once every
/// slot has settled, each slot counted exactly once.
#[derive(Debug)]
pub struct LoadBarrier {
    bundle_id: BundleId,
    slots: Vec<(Slot, String, Option<bool>)>,
    remaining: usize,
}

impl LoadBarrier {
    pub fn new(bundle_id: BundleId, items: Vec<(Slot, String)>) -> Self {
        let remaining = items.len();
        Self {
            bundle_id,
            slots: items.into_iter().map(|(s, u)| (s, u, None)).collect(),
            remaining,
        }
    }

    pub fn bundle_id(&self) -> &str { &self.bundle_id }

    /// Settles every still-open slot that uses `url`. Returns `true` only on
    /// the call that releases the barrier.
    pub fn settle_url(&mut self, url: &str, ok: bool) -> bool {
        if self.remaining == 0 {
            return false;
        }
        for (_, u, outcome) in self.slots.iter_mut() {
            if outcome.is_none() && u == url {
                *outcome = Some(ok);
                self.remaining -= 1;
            }
        }
        self.check_release()
    }

    fn check_release(&self) -> bool {
        if self.remaining == 0 {
            let failed = self.slots.iter().filter(|(_, _, o)| *o == Some(false)).count();
            info!(
                "Bundle '{}' loads settled ({} ok, {} failed).",
                self.bundle_id,
                self.slots.len() - failed,
                failed
            );
            true
        } else {
            debug!("Bundle '{}' waiting on {} load(s).", self.bundle_id, self.remaining);
            false
        }
    }

    #[inline(always)]
    pub fn is_released(&self) -> bool { self.remaining == 0 }

    pub fn remaining(&self) -> usize { self.remaining }

    /// Slots with their urls and outcomes, in the order given at creation.
    pub fn outcomes(&self) -> impl Iterator<Item = (Slot, &str, Option<bool>)> {
        self.slots.iter().map(|(s, u, o)| (*s, u.as_str(), *o))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(urls: &[&str]) -> Vec<(Slot, String)> {
        urls.iter()
            .enumerate()
            .map(|(i, u)| (Slot::new(i as u8 + 1).unwrap(), u.to_string()))
            .collect()
    }

    #[test]
    fn cache_request_then_settle() {
        let mut c = ImageCache::new();
        assert_eq!(c.request("a"), Request::Fetch);
        assert_eq!(c.request("a"), Request::InFlight);
        assert!(c.settle("a", false));
        assert_eq!(c.request("a"), Request::Settled(LoadState::Failed));
        // first outcome wins
        assert!(!c.settle("a", true));
        assert!(!c.is_loaded("a"));
    }

    #[test]
    fn barrier_releases_once_after_all_slots() {
        let mut b = LoadBarrier::new("b".into(), items(&["u1", "u2", "u3"]));
        assert!(!b.settle_url("u1", true));
        assert!(!b.settle_url("u1", true), "same slot is not counted twice");
        assert_eq!(b.remaining(), 2);
        assert!(!b.settle_url("u3", false));
        assert!(b.settle_url("u2", true));
        assert!(b.is_released());
        assert!(!b.settle_url("u2", true));
    }

    #[test]
    fn shared_url_settles_every_slot_using_it() {
        let mut b = LoadBarrier::new("b".into(), items(&["same", "same", "other"]));
        assert!(!b.settle_url("same", true));
        assert_eq!(b.remaining(), 1);
        assert!(b.settle_url("other", false));
        let failed: Vec<u8> = b
            .outcomes()
            .filter(|(_, _, o)| *o == Some(false))
            .map(|(s, _, _)| s.get())
            .collect();
        assert_eq!(failed, vec![3]);
    }

    #[test]
    fn unrelated_url_does_not_count() {
        let mut b = LoadBarrier::new("b".into(), items(&["u1"]));
        assert!(!b.settle_url("zzz", true));
        assert!(!b.is_released());
    }
}
