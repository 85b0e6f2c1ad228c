// src/feed/balance.rs
use crate::ui::actors::{self, Actor};
use crate::ui::color::rgba_hex;
use log::warn;

const POSITIVE: [f32; 4] = rgba_hex("#00cc4d");
const NEGATIVE: [f32; 4] = rgba_hex("#d91a1a");
const TRACK: [f32; 4] = rgba_hex("#262626");
const CENTER_MARK: [f32; 4] = rgba_hex("#ffffff99");

#[derive(Debug, Clone, Copy)]
pub struct BalanceLayout {
    pub width: f32,
    pub height: f32,
    /// Balance that fills one half of the bar completely.
    pub full_scale: f64,
}

impl Default for BalanceLayout {
    fn default() -> Self {
        Self { width: 512.0, height: 48.0, full_scale: 100.0 }
    }
}

/// Signed fill bar. Holds only the last value received.
#[derive(Debug)]
pub struct BalanceIndicator {
    layout: BalanceLayout,
    value: f64,
}

impl BalanceIndicator {
    pub fn new(layout: BalanceLayout) -> Self {
        Self { layout, value: 0.0 }
    }

    pub fn layout(&self) -> &BalanceLayout { &self.layout }

    pub fn value(&self) -> f64 { self.value }

    pub fn set(&mut self, net_balance: f64) {
        if !net_balance.is_finite() {
            warn!("Ignoring non-finite balance {}.", net_balance);
            return;
        }
        self.value = net_balance;
    }

    /// Fill in [-1, 1]; negative extends left of center.
    pub fn fraction(&self) -> f32 {
        let scale = if self.layout.full_scale > 0.0 { self.layout.full_scale } else { 1.0 };
        (self.value / scale).clamp(-1.0, 1.0) as f32
    }

    pub fn actors(&self) -> Vec<Actor> {
        let (w, h) = (self.layout.width, self.layout.height);
        let center = w / 2.0;
        let f = self.fraction();
        let fill = center * f.abs();
        let mut out = vec![actors::quad(0.0, 0.0, w, h, TRACK, 0)];
        if f > 0.0 {
            out.push(actors::quad(center, 0.0, fill, h, POSITIVE, 1));
        } else if f < 0.0 {
            out.push(actors::quad(center - fill, 0.0, fill, h, NEGATIVE, 1));
        }
        out.push(actors::quad(center - 1.0, 0.0, 2.0, h, CENTER_MARK, 2));
        out
    }
}
