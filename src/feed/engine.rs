// src/feed/engine.rs
//! Scrolling feed: spawn, per-frame motion, verdict reveal and eviction.
use crate::feed::cache::{ImageCache, LoadBarrier, LoadState, Request};
use crate::feed::decisions::DecisionStore;
use crate::feed::event::{BundleId, Slot, Verdict};
use crate::feed::scheduler::Promotion;
use crate::ui::actors::{self, Actor};
use crate::ui::color::{rgba_hex, with_alpha};
use log::{debug, info, warn};
use std::collections::VecDeque;

/// Upper bound on a single frame step, so a stalled window does not teleport items.
pub const MAX_DELTA_TIME: f32 = 0.1;

const STROBE_ALPHA: f32 = 0.5;
const RESOLVED_ALPHA: f32 = 0.8;
const REJECT: [f32; 4] = rgba_hex("#ff0000");
const ACCEPT: [f32; 4] = rgba_hex("#00ff00");
const ICON_INSET: f32 = 5.0;
const ICON_SIZE: f32 = 40.0;

/// Feed surface geometry and timing, in pixels and seconds.
#[derive(Debug, Clone, Copy)]
pub struct FeedLayout {
    pub width: f32,
    pub height: f32,
    pub item_w: f32,
    pub item_h: f32,
    pub spacing: f32,
    /// Pixels per second.
    pub speed: f32,
    /// Distance of the marking line above the bottom edge.
    pub marking_offset: f32,
    pub strobe_duration: f32,
    pub strobe_frequency: f32,
}

impl Default for FeedLayout {
    fn default() -> Self {
        Self {
            width: 256.0,
            height: 720.0,
            item_w: 256.0,
            item_h: 128.0,
            spacing: 5.0,
            speed: 60.0,
            marking_offset: 90.0,
            strobe_duration: 0.7,
            strobe_frequency: 20.0,
        }
    }
}

impl FeedLayout {
    #[inline(always)]
    pub fn marking_line(&self) -> f32 { self.height - self.marking_offset }

    #[inline(always)]
    pub fn fade_distance(&self) -> f32 { self.item_h * 1.5 }

    #[inline(always)]
    fn pitch(&self) -> f32 { self.item_h + self.spacing }

    /// Opacity for an item whose top edge is at `y`: the smaller of the
    /// entry ramp and the exit ramp.
    pub fn opacity_at(&self, y: f32) -> f32 {
        let fid = self.fade_distance();
        let fade_in = if y >= 0.0 {
            1.0
        } else if y > -fid {
            1.0 - (-y / fid)
        } else {
            0.0
        };
        let bottom = y + self.item_h;
        let fade_out = if bottom > self.height - fid {
            1.0 + (self.height - bottom) / fid
        } else {
            1.0
        };
        fade_in.min(fade_out).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ItemPhase {
    Spawned,
    Strobing { started_at: f32 },
    /// Verdict is `None` while still unknown; drawn as reject and re-polled.
    Resolved { verdict: Option<Verdict> },
}

#[derive(Debug, Clone)]
pub struct ItemInstance {
    pub bundle_id: BundleId,
    pub slot: Slot,
    pub url: String,
    pub loaded: bool,
    pub x: f32,
    pub y: f32,
    pub opacity: f32,
    pub phase: ItemPhase,
}

impl ItemInstance {
    /// Overlay color at time `now`, if any.
    pub fn tint(&self, now: f32, layout: &FeedLayout) -> Option<[f32; 4]> {
        match self.phase {
            ItemPhase::Spawned => None,
            ItemPhase::Strobing { started_at } => {
                let elapsed = (now - started_at).max(0.0);
                let phase = (elapsed * layout.strobe_frequency).floor() as u64 % 2;
                Some(if phase == 0 {
                    with_alpha(REJECT, STROBE_ALPHA)
                } else {
                    with_alpha(ACCEPT, STROBE_ALPHA)
                })
            }
            ItemPhase::Resolved { verdict } => Some(match verdict {
                Some(Verdict::Accept) => with_alpha(ACCEPT, RESOLVED_ALPHA),
                _ => with_alpha(REJECT, RESOLVED_ALPHA),
            }),
        }
    }
}

/// Texture keys for the optional verdict icons drawn on resolved items.
#[derive(Debug, Clone, Default)]
pub struct VerdictIcons {
    pub accept: Option<String>,
    pub reject: Option<String>,
}

pub struct AnimationEngine {
    layout: FeedLayout,
    active: VecDeque<ItemInstance>,
    pending: Option<LoadBarrier>,
    /// Bundle whose instances are on screen; set when its barrier releases.
    playing: Option<BundleId>,
    last_now: Option<f32>,
}

impl AnimationEngine {
    pub fn new(layout: FeedLayout) -> Self {
        Self { layout, active: VecDeque::new(), pending: None, playing: None, last_now: None }
    }

    pub fn layout(&self) -> &FeedLayout { &self.layout }

    pub fn instances(&self) -> impl Iterator<Item = &ItemInstance> { self.active.iter() }

    #[inline(always)]
    pub fn active_count(&self) -> usize { self.active.len() }

    pub fn playing(&self) -> Option<&str> { self.playing.as_deref() }

    pub fn is_loading(&self) -> bool { self.pending.is_some() }

    /// Starts the load barrier for a promoted bundle. Returns the urls the
    /// caller must fetch; cached outcomes settle immediately.
    pub fn begin_spawn(&mut self, promotion: Promotion, cache: &mut ImageCache) -> Vec<String> {
        if let Some(old) = self.pending.take() {
            warn!(
                "Bundle '{}' promoted while '{}' was still loading; the old barrier is dropped.",
                promotion.bundle_id,
                old.bundle_id()
            );
        }
        let mut fetch = Vec::new();
        let mut barrier = LoadBarrier::new(promotion.bundle_id, promotion.items.clone());
        for (_, url) in &promotion.items {
            match cache.request(url) {
                Request::Settled(state) => {
                    barrier.settle_url(url, state == LoadState::Loaded);
                }
                Request::InFlight => {}
                Request::Fetch => fetch.push(url.clone()),
            }
        }
        if barrier.is_released() {
            self.spawn(barrier);
        } else {
            debug!("Bundle '{}' fetching {} image(s).", barrier.bundle_id(), fetch.len());
            self.pending = Some(barrier);
        }
        fetch
    }

    /// Feeds one load outcome to the pending barrier.
    pub fn on_load_settled(&mut self, url: &str, ok: bool) {
        let released = match self.pending.as_mut() {
            Some(b) => b.settle_url(url, ok),
            None => false,
        };
        if released {
            if let Some(barrier) = self.pending.take() {
                self.spawn(barrier);
            }
        }
    }

    fn spawn(&mut self, barrier: LoadBarrier) {
        let pitch = self.layout.pitch();
        let x = (self.layout.width - self.layout.item_w) / 2.0;
        let mut y = match self.active.back() {
            Some(top) => (top.y - pitch).min(-pitch),
            None => -pitch,
        };
        let bundle_id = barrier.bundle_id().to_string();
        for (slot, url, outcome) in barrier.outcomes() {
            self.active.push_back(ItemInstance {
                bundle_id: bundle_id.clone(),
                slot,
                url: url.to_string(),
                loaded: outcome == Some(true),
                x,
                y,
                opacity: 0.0,
                phase: ItemPhase::Spawned,
            });
            y -= pitch;
        }
        info!("Spawned bundle '{}' ({} active).", bundle_id, self.active.len());
        self.playing = Some(bundle_id);
    }

    /// Advances every instance to `now` (seconds). Returns the id of the
    /// playing bundle once its last instance has left the surface.
    pub fn tick(&mut self, now: f32, decisions: &DecisionStore) -> Option<BundleId> {
        let dt = match self.last_now {
            Some(prev) => (now - prev).clamp(0.0, MAX_DELTA_TIME),
            None => 0.0,
        };
        self.last_now = Some(now);

        let layout = self.layout;
        let marking_line = layout.marking_line();
        for item in self.active.iter_mut() {
            item.y += layout.speed * dt;
            item.opacity = layout.opacity_at(item.y);

            match item.phase {
                ItemPhase::Spawned => {
                    if item.y + layout.item_h >= marking_line {
                        item.phase = ItemPhase::Strobing { started_at: now };
                    }
                }
                ItemPhase::Strobing { started_at } => {
                    if now - started_at >= layout.strobe_duration {
                        let verdict = decisions.lookup(&item.bundle_id, item.slot);
                        item.phase = ItemPhase::Resolved { verdict };
                    }
                }
                ItemPhase::Resolved { verdict: None } => {
                    if let Some(v) = decisions.lookup(&item.bundle_id, item.slot) {
                        debug!("Late verdict {:?} for '{}' slot {}.", v, item.bundle_id, item.slot);
                        item.phase = ItemPhase::Resolved { verdict: Some(v) };
                    }
                }
                ItemPhase::Resolved { .. } => {}
            }
        }

        while self.active.front().is_some_and(|f| f.y > layout.height) {
            self.active.pop_front();
        }

        let id = self.playing.as_deref()?;
        if self.active.iter().any(|i| i.bundle_id == id) {
            return None;
        }
        self.playing.take()
    }

    /// `y` strictly decreases from the oldest instance to the newest.
    pub fn spawn_order_is_monotonic(&self) -> bool {
        self.active
            .iter()
            .zip(self.active.iter().skip(1))
            .all(|(older, newer)| newer.y < older.y)
    }

    /// Feed-local actors in spawn order. Failed loads are skipped.
    pub fn actors(&self, now: f32, icons: &VerdictIcons) -> Vec<Actor> {
        let l = &self.layout;
        let mut out = Vec::with_capacity(self.active.len() * 2);
        for item in self.active.iter().filter(|i| i.loaded) {
            if item.y > l.height || item.y + l.item_h < 0.0 {
                continue;
            }
            out.push(actors::image(&item.url, item.x, item.y, l.item_w, l.item_h, item.opacity, 0));
            if let Some(tint) = item.tint(now, l) {
                out.push(actors::quad(item.x, item.y, l.item_w, l.item_h, tint, 0));
            }
            if let ItemPhase::Resolved { verdict } = item.phase {
                let icon = match verdict {
                    Some(Verdict::Accept) => icons.accept.as_deref(),
                    _ => icons.reject.as_deref(),
                };
                if let Some(key) = icon {
                    out.push(actors::image(
                        key,
                        item.x + ICON_INSET,
                        item.y + ICON_INSET,
                        ICON_SIZE,
                        ICON_SIZE,
                        item.opacity,
                        0,
                    ));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::event::Mark;

    fn promotion(id: &str) -> Promotion {
        Promotion {
            bundle_id: id.into(),
            items: Slot::all().map(|s| (s, format!("{id}/{s}.png"))).collect(),
        }
    }

    fn settle_all(engine: &mut AnimationEngine, cache: &mut ImageCache, urls: &[String], ok: bool) {
        for u in urls {
            cache.settle(u, ok);
            engine.on_load_settled(u, ok);
        }
    }

    /// Runs 60 Hz frames from `t` until `until` returns true or `max` frames pass.
    fn run(
        engine: &mut AnimationEngine,
        decisions: &DecisionStore,
        t: &mut f32,
        max: usize,
        mut until: impl FnMut(&AnimationEngine, Option<BundleId>) -> bool,
    ) -> Vec<BundleId> {
        let mut finished = Vec::new();
        for _ in 0..max {
            *t += 1.0 / 60.0;
            let done = engine.tick(*t, decisions);
            assert!(engine.spawn_order_is_monotonic());
            if let Some(id) = done.clone() {
                finished.push(id);
            }
            if until(engine, done) {
                break;
            }
        }
        finished
    }

    #[test]
    fn opacity_ramps_take_the_minimum() {
        let l = FeedLayout { height: 300.0, ..Default::default() };
        let fid = l.fade_distance();
        assert_eq!(l.opacity_at(-fid - 1.0), 0.0);
        assert!((l.opacity_at(-fid / 2.0) - 0.5).abs() < 1e-5);
        // tall item on a short surface: both ramps active at y = -10
        let both = l.opacity_at(-10.0);
        let fade_in = 1.0 - 10.0 / fid;
        let fade_out = 1.0 + (300.0 - (-10.0 + 128.0)) / fid;
        assert!((both - fade_in.min(fade_out)).abs() < 1e-5);
        assert_eq!(l.opacity_at(l.height + fid - l.item_h), 0.0);
    }

    #[test]
    fn barrier_holds_spawn_until_all_loads_settle() {
        let mut e = AnimationEngine::new(FeedLayout::default());
        let mut cache = ImageCache::new();
        let urls = e.begin_spawn(promotion("b"), &mut cache);
        assert_eq!(urls.len(), 8);
        settle_all(&mut e, &mut cache, &urls[..7], true);
        assert_eq!(e.active_count(), 0);
        assert!(e.is_loading());
        settle_all(&mut e, &mut cache, &urls[7..], false);
        assert_eq!(e.active_count(), 8);
        assert_eq!(e.playing(), Some("b"));
        assert_eq!(e.instances().filter(|i| !i.loaded).count(), 1);
        assert!(e.spawn_order_is_monotonic());
    }

    #[test]
    fn cached_bundle_spawns_immediately() {
        let mut e = AnimationEngine::new(FeedLayout::default());
        let mut cache = ImageCache::new();
        for (_, u) in promotion("b").items {
            cache.request(&u);
            cache.settle(&u, true);
        }
        assert!(e.begin_spawn(promotion("b"), &mut cache).is_empty());
        assert_eq!(e.active_count(), 8);
    }

    #[test]
    fn strobe_then_resolve_with_known_verdict() {
        let layout = FeedLayout::default();
        let mut e = AnimationEngine::new(layout);
        let mut cache = ImageCache::new();
        let mut d = DecisionStore::new();
        d.record("b", &[Mark { slot: Slot::new(1).unwrap(), verdict: Verdict::Accept }]);
        let urls = e.begin_spawn(promotion("b"), &mut cache);
        settle_all(&mut e, &mut cache, &urls, true);

        let mut t = 0.0;
        run(&mut e, &d, &mut t, 10_000, |e, _| {
            matches!(e.instances().next().map(|i| i.phase), Some(ItemPhase::Strobing { .. }))
        });
        let first = e.instances().next().unwrap();
        assert!(first.y + layout.item_h >= layout.marking_line());
        assert_eq!(first.tint(t, &layout), Some([1.0, 0.0, 0.0, 0.5]));
        assert_eq!(first.tint(t + 0.075, &layout), Some([0.0, 1.0, 0.0, 0.5]));

        run(&mut e, &d, &mut t, 10_000, |e, _| {
            matches!(e.instances().next().map(|i| i.phase), Some(ItemPhase::Resolved { .. }))
        });
        let first = e.instances().next().unwrap();
        assert_eq!(first.phase, ItemPhase::Resolved { verdict: Some(Verdict::Accept) });
        assert_eq!(first.tint(t, &layout), Some([0.0, 1.0, 0.0, 0.8]));
    }

    #[test]
    fn unknown_verdict_draws_reject_until_it_arrives() {
        let layout = FeedLayout::default();
        let mut e = AnimationEngine::new(layout);
        let mut cache = ImageCache::new();
        let mut d = DecisionStore::new();
        let urls = e.begin_spawn(promotion("b"), &mut cache);
        settle_all(&mut e, &mut cache, &urls, true);

        let mut t = 0.0;
        run(&mut e, &d, &mut t, 10_000, |e, _| {
            matches!(e.instances().next().map(|i| i.phase), Some(ItemPhase::Resolved { .. }))
        });
        let first = e.instances().next().unwrap();
        assert_eq!(first.phase, ItemPhase::Resolved { verdict: None });
        assert_eq!(first.tint(t, &layout), Some([1.0, 0.0, 0.0, 0.8]));

        d.record("b", &[Mark { slot: Slot::new(1).unwrap(), verdict: Verdict::Accept }]);
        t += 1.0 / 60.0;
        e.tick(t, &d);
        let first = e.instances().next().unwrap();
        assert_eq!(first.phase, ItemPhase::Resolved { verdict: Some(Verdict::Accept) });

        // once known, the verdict is locked
        d.record("b", &[Mark { slot: Slot::new(1).unwrap(), verdict: Verdict::Reject }]);
        t += 1.0 / 60.0;
        e.tick(t, &d);
        assert_eq!(
            e.instances().next().unwrap().phase,
            ItemPhase::Resolved { verdict: Some(Verdict::Accept) }
        );
    }

    #[test]
    fn bundle_completes_exactly_once_after_all_items_leave() {
        let mut e = AnimationEngine::new(FeedLayout::default());
        let mut cache = ImageCache::new();
        let d = DecisionStore::new();
        let urls = e.begin_spawn(promotion("b"), &mut cache);
        settle_all(&mut e, &mut cache, &urls, true);

        let mut t = 0.0;
        let finished = run(&mut e, &d, &mut t, 20_000, |_, _| false);
        assert_eq!(finished, vec!["b".to_string()]);
        assert_eq!(e.active_count(), 0);
        assert_eq!(e.playing(), None);
    }

    #[test]
    fn loading_bundle_never_completes() {
        let mut e = AnimationEngine::new(FeedLayout::default());
        let mut cache = ImageCache::new();
        let d = DecisionStore::new();
        e.begin_spawn(promotion("b"), &mut cache);
        let mut t = 0.0;
        assert!(run(&mut e, &d, &mut t, 600, |_, _| false).is_empty());
        assert!(e.is_loading());
    }

    #[test]
    fn second_bundle_spawns_above_the_first() {
        let layout = FeedLayout::default();
        let mut e = AnimationEngine::new(layout);
        let mut cache = ImageCache::new();
        let d = DecisionStore::new();
        let urls = e.begin_spawn(promotion("a"), &mut cache);
        settle_all(&mut e, &mut cache, &urls, true);
        let mut t = 0.0;
        run(&mut e, &d, &mut t, 30, |_, _| false);
        let top_a = e.instances().last().unwrap().y;

        let urls = e.begin_spawn(promotion("b"), &mut cache);
        settle_all(&mut e, &mut cache, &urls, true);
        assert_eq!(e.active_count(), 16);
        let first_b = e.instances().nth(8).unwrap();
        assert!((first_b.y - (top_a - (layout.item_h + layout.spacing))).abs() < 1e-3);
        assert!(e.spawn_order_is_monotonic());
    }

    #[test]
    fn frame_delta_is_clamped() {
        let mut e = AnimationEngine::new(FeedLayout::default());
        let mut cache = ImageCache::new();
        let d = DecisionStore::new();
        let urls = e.begin_spawn(promotion("b"), &mut cache);
        settle_all(&mut e, &mut cache, &urls, true);
        let y0 = e.instances().next().unwrap().y;
        e.tick(0.0, &d);
        e.tick(5.0, &d);
        let y1 = e.instances().next().unwrap().y;
        assert!((y1 - y0 - 60.0 * MAX_DELTA_TIME).abs() < 1e-3);
    }

    #[test]
    fn failed_items_are_not_drawn() {
        let mut e = AnimationEngine::new(FeedLayout { height: 2000.0, ..Default::default() });
        let mut cache = ImageCache::new();
        let d = DecisionStore::new();
        let urls = e.begin_spawn(promotion("b"), &mut cache);
        settle_all(&mut e, &mut cache, &urls[..1], false);
        settle_all(&mut e, &mut cache, &urls[1..], true);
        let mut t = 0.0;
        // bring the whole bundle on screen
        run(&mut e, &d, &mut t, 1200, |e, _| e.instances().last().is_some_and(|i| i.y >= 0.0));
        let drawn = e.actors(t, &VerdictIcons::default());
        assert_eq!(drawn.len(), 7);
    }
}
