// src/feed/session.rs
use crate::feed::assembler::{AddOutcome, Assembler};
use crate::feed::balance::{BalanceIndicator, BalanceLayout};
use crate::feed::cache::{ImageCache, Request};
use crate::feed::decisions::DecisionStore;
use crate::feed::engine::{AnimationEngine, FeedLayout, VerdictIcons};
use crate::feed::event::{BundleId, FeedEvent, Mark};
use crate::feed::overlay::{Overlay, OverlayLayout, OverlayPhase};
use crate::feed::scheduler::{PromotionOrder, Scheduler};
use crate::ui::actors::Actor;
use log::{debug, info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::fmt;

#[derive(Debug, Clone, Default)]
pub struct SessionSettings {
    pub feed: FeedLayout,
    pub overlay: OverlayLayout,
    pub balance: BalanceLayout,
    pub order: PromotionOrder,
    pub icons: VerdictIcons,
    /// Fixed seed for the overlay shake; `None` seeds from the OS.
    pub shake_seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub queued: usize,
    pub current: Option<BundleId>,
    pub loading: bool,
    pub active: usize,
    pub decisions: usize,
    pub overlay: OverlayPhase,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Queue: {}, Current: {}{}, Active: {}, Decisions: {}, Overlay: {:?}",
            self.queued,
            self.current.as_deref().unwrap_or("-"),
            if self.loading { " (loading)" } else { "" },
            self.active,
            self.decisions,
            self.overlay
        )
    }
}

/// All pipeline state for one viewer. Events, load outcomes and frame ticks
/// are applied in call order from a single thread.
pub struct Session {
    assembler: Assembler,
    scheduler: Scheduler,
    decisions: DecisionStore,
    cache: ImageCache,
    engine: AnimationEngine,
    overlay: Overlay,
    balance: BalanceIndicator,
    icons: VerdictIcons,
    /// Marks that arrived with no bundle to attribute them to.
    orphan_marks: Vec<Mark>,
    load_requests: Vec<String>,
    now: f32,
}

impl Session {
    pub fn new(settings: SessionSettings) -> Self {
        let rng = match settings.shake_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let mut session = Self {
            assembler: Assembler::new(),
            scheduler: Scheduler::new(settings.order),
            decisions: DecisionStore::new(),
            cache: ImageCache::new(),
            engine: AnimationEngine::new(settings.feed),
            overlay: Overlay::with_rng(settings.overlay, rng),
            balance: BalanceIndicator::new(settings.balance),
            icons: settings.icons.clone(),
            orphan_marks: Vec::new(),
            load_requests: Vec::new(),
            now: 0.0,
        };
        for icon in [settings.icons.accept, settings.icons.reject].into_iter().flatten() {
            session.request_load(&icon);
        }
        session
    }

    fn request_load(&mut self, url: &str) {
        if self.cache.request(url) == Request::Fetch {
            self.load_requests.push(url.to_string());
        }
    }

    /// Applies one inbound event at time `now` (seconds).
    pub fn handle_event(&mut self, event: FeedEvent, now: f32) {
        self.now = now;
        debug!("Event '{}'.", event.name());
        match event {
            FeedEvent::BeginBundle { bundle_id } => {
                if self.assembler.begin_bundle(&bundle_id) && !self.orphan_marks.is_empty() {
                    let marks = std::mem::take(&mut self.orphan_marks);
                    info!("Attributing {} held mark(s) to bundle '{}'.", marks.len(), bundle_id.trim());
                    self.decisions.record(bundle_id.trim(), &marks);
                }
            }
            FeedEvent::AddItem { bundle_id, slot, url } => {
                if self.assembler.add_item(&bundle_id, slot, url) == AddOutcome::BecameReady {
                    self.promote();
                }
            }
            FeedEvent::OverlayMarks { bundle_id, marks } => self.record_marks(bundle_id, marks),
            FeedEvent::Verdict(kind) => self.overlay.trigger(kind, now),
            FeedEvent::StartInvestigation { image_url } => {
                if image_url.trim().is_empty() {
                    warn!("start-investigation without an image_url; dropped.");
                    return;
                }
                self.request_load(&image_url);
                self.overlay.start(&image_url);
            }
            FeedEvent::StopInvestigation => self.overlay.stop(now),
            FeedEvent::UpdateBalance { net_balance } => self.balance.set(net_balance),
            FeedEvent::FadeOut => debug!("fade-out has no effect on the scrolling feed."),
        }
    }

    fn record_marks(&mut self, bundle_id: Option<BundleId>, marks: Vec<Mark>) {
        let target = bundle_id
            .filter(|id| !id.trim().is_empty())
            .or_else(|| self.scheduler.current().map(str::to_string))
            .or_else(|| self.assembler.queue().newest().map(|b| b.id.clone()));
        match target {
            Some(id) => self.decisions.record(&id, &marks),
            None => {
                warn!("overlay-marks with no bundle to attribute to; holding {} mark(s).", marks.len());
                self.orphan_marks.extend(marks);
            }
        }
    }

    fn promote(&mut self) {
        if let Some(p) = self.scheduler.try_promote(self.assembler.queue()) {
            let urls = self.engine.begin_spawn(p, &mut self.cache);
            self.load_requests.extend(urls);
        }
    }

    /// Records a finished image load.
    pub fn on_image_settled(&mut self, url: &str, ok: bool) {
        if !ok {
            warn!("Image failed to load: {}", url);
        }
        if self.cache.settle(url, ok) {
            self.engine.on_load_settled(url, ok);
        }
    }

    /// Advances one render frame.
    pub fn tick(&mut self, now: f32) {
        self.now = now;
        if let Some(done) = self.engine.tick(now, &self.decisions) {
            if let Some(next) = self.scheduler.finish(self.assembler.queue_mut(), &done) {
                let urls = self.engine.begin_spawn(next, &mut self.cache);
                self.load_requests.extend(urls);
            }
        }
        self.overlay.update(now);
    }

    /// Urls that need fetching since the last call.
    pub fn take_load_requests(&mut self) -> Vec<String> {
        std::mem::take(&mut self.load_requests)
    }

    pub fn feed_actors(&self) -> Vec<Actor> {
        let icons = VerdictIcons {
            accept: self.icons.accept.clone().filter(|k| self.cache.is_loaded(k)),
            reject: self.icons.reject.clone().filter(|k| self.cache.is_loaded(k)),
        };
        self.engine.actors(self.now, &icons)
    }

    /// `dims_of` maps a loaded image key to its pixel size.
    pub fn overlay_actors(&self, dims_of: impl Fn(&str) -> Option<(f32, f32)>) -> Vec<Actor> {
        let dims = self
            .overlay
            .image()
            .filter(|url| self.cache.is_loaded(url))
            .and_then(dims_of);
        self.overlay.actors(dims)
    }

    pub fn balance_actors(&self) -> Vec<Actor> { self.balance.actors() }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            queued: self.assembler.queue().len(),
            current: self.scheduler.current().map(str::to_string),
            loading: self.engine.is_loading(),
            active: self.engine.active_count(),
            decisions: self.decisions.len(),
            overlay: self.overlay.phase(),
        }
    }

    pub fn queue_ids(&self) -> Vec<String> {
        self.assembler.queue().ids().map(str::to_string).collect()
    }

    pub fn scheduler(&self) -> &Scheduler { &self.scheduler }
    pub fn decisions(&self) -> &DecisionStore { &self.decisions }
    pub fn engine(&self) -> &AnimationEngine { &self.engine }
    pub fn overlay(&self) -> &Overlay { &self.overlay }
    pub fn balance(&self) -> &BalanceIndicator { &self.balance }
    pub fn feed_layout(&self) -> &FeedLayout { self.engine.layout() }
}
