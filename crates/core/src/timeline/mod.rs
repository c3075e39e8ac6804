use std::time::{Duration, Instant};

/// Position of a playing source, advanced by wall-clock deltas.
#[derive(Debug, Default, Clone)]
pub struct PlaybackClock {
    pub time_seconds: f64,
    last_poll: Option<Instant>,
    running: bool,
}

impl PlaybackClock {
    pub fn reset(&mut self) {
        self.time_seconds = 0.0;
        self.last_poll = None;
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn start(&mut self, now: Instant) {
        self.running = true;
        self.last_poll = Some(now);
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.last_poll = None;
    }

    pub fn set(&mut self, seconds: f64) {
        self.time_seconds = seconds.max(0.0);
    }

    pub fn advance(&mut self, delta: f64) {
        self.time_seconds = (self.time_seconds + delta).max(0.0);
    }

    /// Advances by the time elapsed since the previous poll while running.
    /// Returns the new position when it moved.
    pub fn poll(&mut self, now: Instant) -> Option<f64> {
        if !self.running {
            return None;
        }
        let last = self.last_poll.replace(now)?;
        let delta = now.saturating_duration_since(last);
        if delta.is_zero() {
            return None;
        }
        self.advance(delta.as_secs_f64());
        Some(self.time_seconds)
    }
}

/// Marks a user-initiated seek as in flight for a short window.
///
/// The window is measured against caller supplied instants, so it is a
/// heuristic: a tick landing exactly on the deadline counts as outside.
#[derive(Debug, Clone)]
pub struct InteractionGuard {
    window: Duration,
    active_until: Option<Instant>,
}

impl InteractionGuard {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            active_until: None,
        }
    }

    /// Starts (or extends) the window at `now`.
    pub fn mark(&mut self, now: Instant) {
        self.active_until = Some(now + self.window);
    }

    pub fn is_active(&self, now: Instant) -> bool {
        self.active_until.map(|until| now < until).unwrap_or(false)
    }

    pub fn clear(&mut self) {
        self.active_until = None;
    }
}

impl Default for InteractionGuard {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}
