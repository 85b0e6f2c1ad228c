// src/core/space.rs
use cgmath::Matrix4;
use std::cell::Cell;

// -----------------------------------------------------------------------------
// Pixel space: origin at the window's top-left, y grows downward.
// -----------------------------------------------------------------------------
thread_local! {
    static CURRENT_PIXEL: Cell<(u32, u32)> = const { Cell::new((768, 720)) };
}

#[inline(always)]
pub fn set_current_window_px(px_w: u32, px_h: u32) {
    CURRENT_PIXEL.with(|c| c.set((px_w, px_h)));
}

#[inline(always)] pub fn screen_width()  -> f32 { CURRENT_PIXEL.with(|c| c.get().0 as f32) }
#[inline(always)] pub fn screen_height() -> f32 { CURRENT_PIXEL.with(|c| c.get().1 as f32) }

/// Ortho for the current window (also stores the pixel size).
#[inline(always)]
pub fn ortho_for_window(width: u32, height: u32) -> Matrix4<f32> {
    set_current_window_px(width, height);
    cgmath::ortho(0.0, width as f32, height as f32, 0.0, -1.0, 1.0)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    #[inline(always)]
    pub fn right(&self) -> f32 { self.x + self.w }
    #[inline(always)]
    pub fn bottom(&self) -> f32 { self.y + self.h }

    /// Intersection, or a zero-sized rect at `self`'s origin when disjoint.
    pub fn intersect(&self, other: &Rect) -> Rect {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let r = self.right().min(other.right());
        let b = self.bottom().min(other.bottom());
        if r <= x || b <= y {
            return Rect { x: self.x, y: self.y, w: 0.0, h: 0.0 };
        }
        Rect { x, y, w: r - x, h: b - y }
    }
}

/// Where each surface sits in the window: the feed on the left, the overlay
/// to its right with the balance bar underneath.
#[derive(Clone, Copy, Debug)]
pub struct SurfaceLayout {
    pub feed: Rect,
    pub overlay: Rect,
    pub balance: Rect,
}

pub fn surface_layout(feed: (f32, f32), overlay: (f32, f32), balance: (f32, f32)) -> SurfaceLayout {
    SurfaceLayout {
        feed: Rect { x: 0.0, y: 0.0, w: feed.0, h: feed.1 },
        overlay: Rect { x: feed.0, y: 0.0, w: overlay.0, h: overlay.1 },
        balance: Rect { x: feed.0, y: overlay.1, w: balance.0, h: balance.1 },
    }
}

impl SurfaceLayout {
    /// Smallest window that shows every surface.
    pub fn window_size(&self) -> (u32, u32) {
        let w = self.feed.right().max(self.overlay.right()).max(self.balance.right());
        let h = self.feed.bottom().max(self.overlay.bottom()).max(self.balance.bottom());
        (w.ceil() as u32, h.ceil() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Vector4, vec4};

    #[test]
    fn ortho_maps_top_left_to_ndc_corner() {
        let m = ortho_for_window(200, 100);
        let tl: Vector4<f32> = m * vec4(0.0, 0.0, 0.0, 1.0);
        let br: Vector4<f32> = m * vec4(200.0, 100.0, 0.0, 1.0);
        assert!((tl.x + 1.0).abs() < 1e-6 && (tl.y - 1.0).abs() < 1e-6);
        assert!((br.x - 1.0).abs() < 1e-6 && (br.y + 1.0).abs() < 1e-6);
        assert_eq!(screen_width(), 200.0);
    }

    #[test]
    fn layout_places_balance_under_overlay() {
        let l = surface_layout((256.0, 720.0), (512.0, 512.0), (512.0, 48.0));
        assert_eq!(l.balance.x, 256.0);
        assert_eq!(l.balance.y, 512.0);
        assert_eq!(l.window_size(), (768, 720));
    }

    #[test]
    fn intersect_clips_and_handles_disjoint() {
        let a = Rect { x: 0.0, y: 0.0, w: 10.0, h: 10.0 };
        let b = Rect { x: 5.0, y: -5.0, w: 10.0, h: 10.0 };
        assert_eq!(a.intersect(&b), Rect { x: 5.0, y: 0.0, w: 5.0, h: 5.0 });
        let far = Rect { x: 50.0, y: 50.0, w: 1.0, h: 1.0 };
        assert_eq!(a.intersect(&far).w, 0.0);
    }
}
