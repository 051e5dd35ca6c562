use std::collections::VecDeque;
use std::time::Duration;

/// Frames in the sliding window
pub const FPS_WINDOW: usize = 5;

/// Frames per second over the last [`FPS_WINDOW`] frame timestamps
#[derive(Debug, Clone, Default)]
pub struct FpsWindow {
    stamps: VecDeque<Duration>,
}

impl FpsWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, time: Duration) {
        if self.stamps.len() == FPS_WINDOW {
            self.stamps.pop_front();
        }
        self.stamps.push_back(time);
    }

    pub fn clear(&mut self) {
        self.stamps.clear();
    }

    /// `None` until two frames with distinct timestamps have been recorded
    #[allow(clippy::cast_precision_loss)]
    pub fn fps(&self) -> Option<f32> {
        let (first, last) = (self.stamps.front()?, self.stamps.back()?);
        let span = last.checked_sub(*first)?.as_secs_f32();
        if span <= 0.0 {
            return None;
        }
        Some((self.stamps.len() - 1) as f32 / span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needs_two_frames() {
        let mut window = FpsWindow::new();
        assert_eq!(window.fps(), None);
        window.record(Duration::from_millis(10));
        assert_eq!(window.fps(), None);
        window.record(Duration::from_millis(30));
        assert!((window.fps().unwrap() - 50.0).abs() < 1e-3);
    }

    #[test]
    fn only_the_last_frames_count() {
        let mut window = FpsWindow::new();
        for ms in [0, 500, 1000, 1010, 1020, 1030, 1040] {
            window.record(Duration::from_millis(ms));
        }
        // 1000..=1040 ms: four intervals of 10 ms
        assert!((window.fps().unwrap() - 100.0).abs() < 1e-2);
    }
}
