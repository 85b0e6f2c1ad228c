// src/utils/fps.rs
use std::time::{Duration, Instant};

pub struct FpsCounter {
    last_update_time: Instant,
    frames_since_last_update: u32,
}

impl Default for FpsCounter {
    fn default() -> Self { Self::new() }
}

impl FpsCounter {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(now: Instant) -> Self {
        FpsCounter { last_update_time: now, frames_since_last_update: 0 }
    }

    /// Call once per rendered frame. Returns `Some(fps)` about once a second.
    pub fn update(&mut self) -> Option<u32> {
        self.update_at(Instant::now())
    }

    pub fn update_at(&mut self, now: Instant) -> Option<u32> {
        self.frames_since_last_update += 1;
        if now.duration_since(self.last_update_time) < Duration::from_secs(1) {
            return None;
        }
        let fps = self.frames_since_last_update;
        self.frames_since_last_update = 0;
        // Step by whole seconds to avoid drift, unless we fell far behind.
        self.last_update_time += Duration::from_secs(1);
        if self.last_update_time + Duration::from_secs(1) < now {
            self.last_update_time = now;
        }
        Some(fps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_once_per_second() {
        let t0 = Instant::now();
        let mut c = FpsCounter::starting_at(t0);
        for i in 1..60 {
            assert_eq!(c.update_at(t0 + Duration::from_millis(i * 16)), None);
        }
        assert_eq!(c.update_at(t0 + Duration::from_millis(1000)), Some(60));
        assert_eq!(c.update_at(t0 + Duration::from_millis(1010)), None);
    }

    #[test]
    fn resyncs_after_a_stall() {
        let t0 = Instant::now();
        let mut c = FpsCounter::starting_at(t0);
        assert_eq!(c.update_at(t0 + Duration::from_secs(5)), Some(1));
        assert_eq!(c.update_at(t0 + Duration::from_millis(5500)), None);
    }
}
