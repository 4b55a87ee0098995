//! Time utilities for game simulation

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Default rate configuration
pub const DEFAULT_TICK_RATE: u32 = 60; // physics steps per second
pub const DEFAULT_SEND_RATE: u32 = 30; // diff payloads per second
pub const DEFAULT_MAX_STEPS_PER_RUN: u32 = 10;

/// Fixed-timestep accumulator.
///
/// Converts wall-clock deltas into a whole number of fixed steps, capped so a
/// long stall cannot snowball into an unbounded catch-up burst. Time beyond
/// the cap is dropped.
#[derive(Debug, Clone)]
pub struct StepClock {
    step: Duration,
    max_steps: u32,
    accumulated: Duration,
    last: Option<Instant>,
}

impl StepClock {
    pub fn new(tick_rate: u32, max_steps: u32) -> Self {
        Self {
            step: Duration::from_nanos(1_000_000_000 / tick_rate.max(1) as u64),
            max_steps: max_steps.max(1),
            accumulated: Duration::ZERO,
            last: None,
        }
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    /// Steps owed since the previous call. The first call only starts the clock.
    pub fn steps_since_last(&mut self, now: Instant) -> u32 {
        let elapsed = match self.last.replace(now) {
            Some(prev) => now.saturating_duration_since(prev),
            None => Duration::ZERO,
        };
        self.steps_for(elapsed)
    }

    /// Steps owed for an explicit elapsed duration
    pub fn steps_for(&mut self, elapsed: Duration) -> u32 {
        self.accumulated += elapsed;
        let mut steps = 0;
        while self.accumulated >= self.step && steps < self.max_steps {
            self.accumulated -= self.step;
            steps += 1;
        }
        if steps == self.max_steps && self.accumulated >= self.step {
            self.accumulated = Duration::ZERO;
        }
        steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_partial_steps() {
        let mut clock = StepClock::new(50, 10);
        assert_eq!(clock.steps_for(Duration::from_millis(30)), 1);
        assert_eq!(clock.steps_for(Duration::from_millis(10)), 1);
        assert_eq!(clock.steps_for(Duration::from_millis(5)), 0);
    }

    #[test]
    fn caps_catch_up_and_drops_backlog() {
        let mut clock = StepClock::new(50, 3);
        assert_eq!(clock.steps_for(Duration::from_secs(2)), 3);
        assert_eq!(clock.steps_for(Duration::ZERO), 0);
    }

    #[test]
    fn first_wall_clock_call_starts_clock() {
        let mut clock = StepClock::new(60, 10);
        let start = Instant::now();
        assert_eq!(clock.steps_since_last(start), 0);
        assert_eq!(clock.steps_since_last(start + Duration::from_millis(50)), 3);
    }
}
