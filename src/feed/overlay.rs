// src/feed/overlay.rs
//! Investigation overlay: one image plus a pass/buy banner with shake.
use crate::feed::event::OverlayVerdict;
use crate::ui::actors::{self, Actor};
use crate::ui::color::{rgba_hex, with_alpha};
use crate::ui::glyphs;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::Rng;

#[derive(Debug, Clone, Copy)]
pub struct OverlayLayout {
    pub width: f32,
    pub height: f32,
    pub fade_in: f32,
    pub hold: f32,
    pub fade_out: f32,
    pub shake_duration: f32,
    pub shake_amplitude: f32,
}

impl Default for OverlayLayout {
    fn default() -> Self {
        Self {
            width: 512.0,
            height: 512.0,
            fade_in: 0.4,
            hold: 4.0,
            fade_out: 0.6,
            shake_duration: 0.3,
            shake_amplitude: 8.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayPhase {
    Idle,
    Showing,
    FadingOut,
}

const PASS_COLOR: [f32; 4] = with_alpha(rgba_hex("#ff0000"), 0.8);
const BUY_COLOR: [f32; 4] = [0.0, 0.75, 0.25, 0.8];

fn banner_style(kind: OverlayVerdict) -> ([f32; 4], &'static str) {
    match kind {
        OverlayVerdict::Pass => (PASS_COLOR, "DISQUALIFIED"),
        OverlayVerdict::Buy => (BUY_COLOR, "BOUGHT"),
    }
}

#[derive(Debug, Clone, Copy)]
struct Banner {
    kind: OverlayVerdict,
    started_at: f32,
    alpha: f32,
    fading_out: bool,
    /// Set by `stop`: (time, alpha at that time).
    forced_fade: Option<(f32, f32)>,
}

pub struct Overlay {
    layout: OverlayLayout,
    image: Option<String>,
    banner: Option<Banner>,
    clear_image_after_fade: bool,
    shake_started: Option<f32>,
    shake_offset: [f32; 2],
    rng: StdRng,
}

impl Overlay {
    pub fn with_rng(layout: OverlayLayout, rng: StdRng) -> Self {
        Self {
            layout,
            image: None,
            banner: None,
            clear_image_after_fade: false,
            shake_started: None,
            shake_offset: [0.0, 0.0],
            rng,
        }
    }

    pub fn layout(&self) -> &OverlayLayout { &self.layout }

    pub fn image(&self) -> Option<&str> { self.image.as_deref() }

    pub fn banner_alpha(&self) -> f32 {
        self.banner.map_or(0.0, |b| b.alpha)
    }

    pub fn shake_offset(&self) -> [f32; 2] { self.shake_offset }

    pub fn phase(&self) -> OverlayPhase {
        match self.banner {
            Some(b) if b.fading_out || b.forced_fade.is_some() => OverlayPhase::FadingOut,
            Some(_) => OverlayPhase::Showing,
            None if self.image.is_some() => OverlayPhase::Showing,
            None => OverlayPhase::Idle,
        }
    }

    /// Replaces the overlay wholesale with `url`.
    pub fn start(&mut self, url: &str) {
        info!("Investigation started: {}", url);
        self.image = Some(url.to_string());
        self.banner = None;
        self.clear_image_after_fade = false;
        self.shake_started = None;
        self.shake_offset = [0.0, 0.0];
    }

    pub fn trigger(&mut self, kind: OverlayVerdict, now: f32) {
        info!("Overlay verdict {:?}.", kind);
        self.banner = Some(Banner { kind, started_at: now, alpha: 0.0, fading_out: false, forced_fade: None });
        self.clear_image_after_fade = false;
        self.shake_started = Some(now);
    }

    pub fn stop(&mut self, now: f32) {
        match self.banner.as_mut() {
            Some(b) => {
                if b.forced_fade.is_none() {
                    b.forced_fade = Some((now, b.alpha));
                }
                self.clear_image_after_fade = true;
                debug!("Investigation stop during verdict; fading out.");
            }
            None => {
                self.image = None;
                debug!("Investigation stopped.");
            }
        }
    }

    pub fn update(&mut self, now: f32) {
        let l = self.layout;
        if let Some(b) = self.banner.as_mut() {
            let (alpha, done) = match b.forced_fade {
                Some((at, from)) => {
                    let t = (now - at).max(0.0);
                    if l.fade_out <= 0.0 || t >= l.fade_out {
                        (0.0, true)
                    } else {
                        (from * (1.0 - t / l.fade_out), false)
                    }
                }
                None => {
                    let e = (now - b.started_at).max(0.0);
                    if e < l.fade_in {
                        (e / l.fade_in, false)
                    } else if e < l.fade_in + l.hold {
                        (1.0, false)
                    } else if e < l.fade_in + l.hold + l.fade_out {
                        b.fading_out = true;
                        (1.0 - (e - l.fade_in - l.hold) / l.fade_out, false)
                    } else {
                        (0.0, true)
                    }
                }
            };
            b.alpha = alpha.clamp(0.0, 1.0);
            if done {
                self.banner = None;
                if self.clear_image_after_fade {
                    self.image = None;
                    self.clear_image_after_fade = false;
                }
            }
        }

        match self.shake_started {
            Some(at) if now - at < l.shake_duration => {
                let a = l.shake_amplitude.max(0.0);
                self.shake_offset = [self.rng.random_range(-a..=a), self.rng.random_range(-a..=a)];
            }
            Some(_) => {
                self.shake_started = None;
                self.shake_offset = [0.0, 0.0];
            }
            None => {}
        }
    }

    /// Surface-local actors. `image_dims` are the loaded image's pixel size.
    pub fn actors(&self, image_dims: Option<(f32, f32)>) -> Vec<Actor> {
        let l = &self.layout;
        let [dx, dy] = self.shake_offset;
        let mut out = Vec::new();
        if let (Some(url), Some((iw, ih))) = (self.image.as_deref(), image_dims) {
            if iw > 0.0 && ih > 0.0 {
                let scale = (l.width / iw).min(l.height / ih);
                let (w, h) = (iw * scale, ih * scale);
                out.push(actors::image(url, (l.width - w) / 2.0 + dx, (l.height - h) / 2.0 + dy, w, h, 1.0, 0));
            }
        }
        if let Some(b) = self.banner {
            if b.alpha > 0.0 {
                let (color, text) = banner_style(b.kind);
                let tint = [color[0], color[1], color[2], color[3] * b.alpha];
                out.push(actors::quad(dx, dy, l.width, l.height, tint, 1));
                let cell = (l.width * 0.8 / glyphs::measure(text, 1.0)).floor().max(1.0);
                out.extend(glyphs::label(
                    text,
                    l.width / 2.0 + dx,
                    l.height / 2.0 + dy,
                    cell,
                    [1.0, 1.0, 1.0, b.alpha],
                    2,
                ));
            }
        }
        out
    }
}
