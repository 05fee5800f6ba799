//! Tick rate limiter for the animation loop.

use std::time::{Duration, Instant};

pub struct TickPacer {
    min_interval: Duration,
    last_tick: Option<Instant>,
}

impl TickPacer {
    /// Limit ticks to at most `max_rate_hz` per second. Non-positive or
    /// non-finite rates disable the limit.
    pub fn new(max_rate_hz: f32) -> Self {
        let min_interval = if max_rate_hz.is_finite() && max_rate_hz > 0.0 {
            Duration::from_secs_f64(1.0 / max_rate_hz as f64)
        } else {
            Duration::ZERO
        };
        Self {
            min_interval,
            last_tick: None,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Time left before the next tick is allowed.
    pub fn remaining(&self) -> Duration {
        match self.last_tick {
            Some(last) => self.min_interval.saturating_sub(last.elapsed()),
            None => Duration::ZERO,
        }
    }

    /// Non-blocking: claim a tick if one is due.
    pub fn try_tick(&mut self) -> bool {
        if self.remaining() > Duration::ZERO {
            return false;
        }
        self.last_tick = Some(Instant::now());
        true
    }

    /// Blocking: sleep until a tick is due, then claim it.
    pub fn wait(&mut self) {
        let remaining = self.remaining();
        if remaining > Duration::ZERO {
            std::thread::sleep(remaining);
        }
        self.last_tick = Some(Instant::now());
    }

    pub fn reset(&mut self) {
        self.last_tick = None;
    }
}
