//! Frame scheduling around a [`RenderEngine`].

use std::time::{Duration, Instant};

use crate::backend::RenderBackend;
use crate::engine::{FrameTick, RenderEngine, Tick};
use crate::error::RenderError;

/// Produces one [`FrameTick`] per call, timed from construction
#[derive(Debug, Clone)]
pub struct FrameClock {
    start: Instant,
    frame_index: u64,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            frame_index: 0,
        }
    }

    #[must_use]
    pub fn next_tick(&mut self) -> FrameTick {
        let tick = FrameTick {
            time: self.start.elapsed(),
            frame_index: self.frame_index,
        };
        self.frame_index += 1;
        tick
    }
}

/// Ticks `engine` until it stops or `max_frames` ticks have run. Returns the number of
/// ticks.
///
/// # Errors
///
/// Stops at the first error returned by [`RenderEngine::tick`].
pub fn run_headless<B: RenderBackend>(
    engine: &mut RenderEngine<B>,
    max_frames: u64,
) -> Result<u64, RenderError> {
    let mut clock = FrameClock::new();
    let mut frames = 0;
    while frames < max_frames {
        let tick = clock.next_tick();
        frames += 1;
        if engine.tick(tick)? == Tick::Stop {
            break;
        }
    }
    tracing::debug!(frames, elapsed = ?clock.start.elapsed(), "headless run finished");
    Ok(frames)
}

/// Ticks with a fixed frame interval, for deterministic timing in tests and tools
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    interval: Duration,
    frame_index: u64,
}

impl FixedClock {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            frame_index: 0,
        }
    }

    #[must_use]
    pub fn next_tick(&mut self) -> FrameTick {
        let factor = u32::try_from(self.frame_index).unwrap_or(u32::MAX);
        let tick = FrameTick {
            time: self.interval.saturating_mul(factor),
            frame_index: self.frame_index,
        };
        self.frame_index += 1;
        tick
    }
}
