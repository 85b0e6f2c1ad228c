use bundlefeed::feed::engine::ItemPhase;
use bundlefeed::feed::event::{FeedEvent, Mark, OverlayVerdict, Slot, Verdict};
use bundlefeed::feed::overlay::OverlayPhase;
use bundlefeed::feed::scheduler::PromotionOrder;
use bundlefeed::feed::{Session, SessionSettings};

const STEP: f32 = 1.0 / 30.0;

fn session(order: PromotionOrder) -> Session {
    Session::new(SessionSettings { order, shake_seed: Some(3), ..Default::default() })
}

fn slot(n: u8) -> Slot {
    Slot::new(n).unwrap()
}

fn begin(s: &mut Session, id: &str, now: f32) {
    s.handle_event(FeedEvent::BeginBundle { bundle_id: id.into() }, now);
}

fn add(s: &mut Session, id: &str, n: u8, now: f32) {
    s.handle_event(
        FeedEvent::AddItem { bundle_id: id.into(), slot: slot(n), url: format!("{id}/{n:02}.png") },
        now,
    );
}

fn add_all(s: &mut Session, id: &str, now: f32) {
    for n in 1..=8 {
        add(s, id, n, now);
    }
}

/// Settles every outstanding load as a success, like a fast loader would.
fn settle_loads(s: &mut Session) {
    for url in s.take_load_requests() {
        s.on_image_settled(&url, true);
    }
}

/// Runs frames from `from` to `to`, settling loads each frame. Calls
/// `observe` after every tick.
fn run(s: &mut Session, from: f32, to: f32, mut observe: impl FnMut(&Session, f32)) -> f32 {
    let mut now = from;
    while now < to {
        now += STEP;
        settle_loads(s);
        s.tick(now);
        observe(s, now);
    }
    now
}

#[test]
fn a_bundle_plays_once_and_leaves_the_queue() {
    let mut s = session(PromotionOrder::Readiness);
    begin(&mut s, "b1", 0.0);
    add_all(&mut s, "b1", 0.0);
    assert_eq!(s.scheduler().current(), Some("b1"));

    let mut max_active = 0;
    run(&mut s, 0.0, 45.0, |s, _| {
        max_active = max_active.max(s.engine().active_count());
        assert!(s.engine().spawn_order_is_monotonic());
    });

    assert_eq!(max_active, 8);
    assert_eq!(s.scheduler().counters(), (1, 1));
    assert_eq!(s.scheduler().current(), None);
    assert!(s.queue_ids().is_empty());
    assert_eq!(s.engine().active_count(), 0);
}

#[test]
fn an_early_mark_resolves_to_its_verdict() {
    let mut s = session(PromotionOrder::Readiness);
    begin(&mut s, "b1", 0.0);
    s.handle_event(
        FeedEvent::OverlayMarks {
            bundle_id: Some("b1".into()),
            marks: vec![Mark { slot: slot(1), verdict: Verdict::Accept }],
        },
        0.0,
    );
    add_all(&mut s, "b1", 0.0);

    let mut seen = Vec::new();
    run(&mut s, 0.0, 20.0, |s, _| {
        for item in s.engine().instances() {
            if let ItemPhase::Resolved { verdict } = item.phase {
                seen.push((item.slot, verdict));
            }
        }
    });

    assert!(seen.contains(&(slot(1), Some(Verdict::Accept))));
    assert!(seen.iter().filter(|(n, _)| *n == slot(1)).all(|(_, v)| *v == Some(Verdict::Accept)));
}

#[test]
fn a_late_mark_is_picked_up_after_resolution() {
    let mut s = session(PromotionOrder::Readiness);
    begin(&mut s, "b1", 0.0);
    add_all(&mut s, "b1", 0.0);

    let resolved_unknown = |s: &Session| {
        s.engine()
            .instances()
            .any(|i| i.slot == slot(1) && i.phase == ItemPhase::Resolved { verdict: None })
    };
    let mut now = 0.0;
    while !resolved_unknown(&s) {
        assert!(now < 30.0, "slot 1 never resolved");
        now = run(&mut s, now, now + STEP, |_, _| {});
    }

    s.handle_event(
        FeedEvent::OverlayMarks { bundle_id: None, marks: vec![Mark { slot: slot(1), verdict: Verdict::Accept }] },
        now,
    );
    run(&mut s, now, now + 0.1, |_, _| {});
    let first = s.engine().instances().find(|i| i.slot == slot(1)).map(|i| i.phase);
    assert_eq!(first, Some(ItemPhase::Resolved { verdict: Some(Verdict::Accept) }));
}

#[test]
fn bought_then_stop_ends_idle() {
    let mut s = session(PromotionOrder::Readiness);
    s.handle_event(FeedEvent::StartInvestigation { image_url: "suspect.png".into() }, 0.0);
    s.handle_event(FeedEvent::Verdict(OverlayVerdict::Buy), 0.0);
    // stop while the banner is still fading in
    let now = run(&mut s, 0.0, 0.1, |_, _| {});
    assert_eq!(s.overlay().phase(), OverlayPhase::Showing);
    assert!(s.overlay().banner_alpha() > 0.0);
    assert!(s.overlay().banner_alpha() < 1.0);

    s.handle_event(FeedEvent::StopInvestigation, now);
    assert_eq!(s.overlay().phase(), OverlayPhase::FadingOut);
    run(&mut s, now, now + 2.0, |_, _| {});

    assert_eq!(s.overlay().phase(), OverlayPhase::Idle);
    assert_eq!(s.overlay().banner_alpha(), 0.0);
    assert_eq!(s.overlay().image(), None);
    assert!(s.overlay_actors(|_| Some((64.0, 64.0))).is_empty());
}

#[test]
fn items_for_unknown_bundles_are_ignored() {
    let mut s = session(PromotionOrder::Readiness);
    add(&mut s, "ghost", 1, 0.0);
    assert!(s.queue_ids().is_empty());
    assert!(s.take_load_requests().is_empty());
    assert_eq!(s.status().queued, 0);
}

#[test]
fn at_most_one_bundle_is_current() {
    let mut s = session(PromotionOrder::Queue);
    for id in ["b1", "b2", "b3"] {
        begin(&mut s, id, 0.0);
        add_all(&mut s, id, 0.0);
    }
    assert_eq!(s.scheduler().current(), Some("b1"));

    let mut order = Vec::new();
    run(&mut s, 0.0, 120.0, |s, _| {
        if let Some(id) = s.scheduler().current() {
            if order.last().map(String::as_str) != Some(id) {
                order.push(id.to_string());
            }
        }
        let playing: std::collections::HashSet<_> =
            s.engine().instances().map(|i| i.bundle_id.clone()).collect();
        assert!(playing.len() <= 1, "instances from {playing:?} on screen together");
    });

    assert_eq!(order, vec!["b1", "b2", "b3"]);
    assert_eq!(s.scheduler().counters(), (3, 3));
    assert!(s.queue_ids().is_empty());
}

#[test]
fn readiness_order_plays_the_first_completed_bundle_next() {
    let mut s = session(PromotionOrder::Readiness);
    begin(&mut s, "b1", 0.0);
    begin(&mut s, "b2", 0.0);
    begin(&mut s, "b3", 0.0);
    add_all(&mut s, "b1", 0.0);
    assert_eq!(s.scheduler().current(), Some("b1"));

    // b3 completes a frame before b2
    let now = run(&mut s, 0.0, STEP, |_, _| {});
    add_all(&mut s, "b3", now);
    let now = run(&mut s, now, now + STEP, |_, _| {});
    add_all(&mut s, "b2", now);

    let mut order = vec!["b1".to_string()];
    run(&mut s, now, 100.0, |s, _| {
        if let Some(id) = s.scheduler().current() {
            if order.last().map(String::as_str) != Some(id) {
                order.push(id.to_string());
            }
        }
    });
    assert_eq!(order, vec!["b1", "b3", "b2"]);
}

#[test]
fn readiness_order_holds_for_completions_in_the_same_frame() {
    let mut s = session(PromotionOrder::Readiness);
    for id in ["b1", "b2", "b3"] {
        begin(&mut s, id, 0.0);
    }
    add_all(&mut s, "b1", 0.0);
    // b3 then b2 complete before the next tick
    add_all(&mut s, "b3", 0.0);
    add_all(&mut s, "b2", 0.0);
    assert_eq!(s.scheduler().current(), Some("b1"));

    let mut order = vec!["b1".to_string()];
    run(&mut s, 0.0, 100.0, |s, _| {
        if let Some(id) = s.scheduler().current() {
            if order.last().map(String::as_str) != Some(id) {
                order.push(id.to_string());
            }
        }
    });
    assert_eq!(order, vec!["b1", "b3", "b2"]);
}
