//! Exponential backoff with a sliding failure window and a circuit-breaker
//! floor for sustained overload.

use std::time::{Duration, Instant};

use rand::Rng;

const OVERLOAD_WINDOW: Duration = Duration::from_secs(60);
const CIRCUIT_THRESHOLD: u32 = 5;
const CIRCUIT_FLOOR_SECS: f64 = 10.0;
const MAX_EXPONENT: u32 = 6;

/// Base delay presets. Fast mode halves the base for runs against a
/// responsive target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffPreset {
    Normal,
    Fast,
}

impl BackoffPreset {
    fn base(self) -> Duration {
        match self {
            Self::Normal => Duration::from_millis(500),
            Self::Fast => Duration::from_millis(250),
        }
    }
}

/// Tracks overload signals and computes the delay before the next attempt.
///
/// Failures more than [`OVERLOAD_WINDOW`] apart reset the count, so an
/// isolated overload after a quiet period starts the progression over. Once
/// [`CIRCUIT_THRESHOLD`] failures land inside one window, the circuit opens
/// and every delay is floored at [`CIRCUIT_FLOOR_SECS`].
#[derive(Debug)]
pub struct BackoffController {
    base: Duration,
    recent_failures: u32,
    window_start: Option<Instant>,
    circuit_open: bool,
}

impl BackoffController {
    pub fn new(preset: BackoffPreset) -> Self {
        Self::with_base(preset.base())
    }

    /// Controller with an explicit base delay. Tests pass a tiny base so the
    /// sleep paths stay fast.
    pub fn with_base(base: Duration) -> Self {
        debug_assert!(!base.is_zero());
        Self {
            base,
            recent_failures: 0,
            window_start: None,
            circuit_open: false,
        }
    }

    /// Record an overload signal and return how long to wait before the next
    /// attempt.
    pub fn on_overload(&mut self) -> Duration {
        self.on_overload_at(Instant::now())
    }

    pub fn on_overload_at(&mut self, now: Instant) -> Duration {
        if let Some(start) = self.window_start
            && now.duration_since(start) > OVERLOAD_WINDOW
        {
            self.recent_failures = 0;
            self.circuit_open = false;
        }
        if self.recent_failures == 0 {
            self.window_start = Some(now);
        }
        self.recent_failures += 1;

        let exponent = (self.recent_failures - 1).min(MAX_EXPONENT);
        let mut delay = self.base.as_secs_f64() * f64::from(2u32.pow(exponent));
        if self.recent_failures >= CIRCUIT_THRESHOLD {
            self.circuit_open = true;
            delay = delay.max(CIRCUIT_FLOOR_SECS);
        }

        let jitter_cap = (delay * 0.1).min(1.0);
        let jitter = rand::thread_rng().gen_range(0.0..=jitter_cap);
        Duration::from_secs_f64(delay + jitter)
    }

    pub fn circuit_open(&self) -> bool {
        self.circuit_open
    }

    pub fn recent_failures(&self) -> u32 {
        self.recent_failures
    }
}
