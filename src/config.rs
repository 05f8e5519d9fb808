//! Simulation settings

use std::time::Duration;

use rand::Rng;

/// Random delay used to break lock-step scheduling between processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jitter {
    Disabled,
    /// Uniform delay in `min..=max`.
    Range { min: Duration, max: Duration },
}

impl Jitter {
    pub fn millis(min: u64, max: u64) -> Self {
        Jitter::Range {
            min: Duration::from_millis(min),
            max: Duration::from_millis(max),
        }
    }

    pub fn sample(&self) -> Duration {
        self.sample_with(&mut rand::rng())
    }

    pub fn sample_with(&self, rng: &mut impl Rng) -> Duration {
        match *self {
            Jitter::Disabled => Duration::ZERO,
            Jitter::Range { min, max } if min >= max => min,
            Jitter::Range { min, max } => rng.random_range(min..=max),
        }
    }

    /// Sleeps for one sample; returns immediately when disabled.
    pub async fn delay(&self) {
        let duration = self.sample();
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Delay before a process starts its first phase.
    pub startup_jitter: Jitter,
    /// Delay after every iteration of a process's receive loop.
    pub think_time: Jitter,
    /// Longest a process blocks on its mailbox before re-checking the
    /// termination signal.
    pub poll_interval: Duration,
    /// Buffer size of the protocol event bus.
    pub event_capacity: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            startup_jitter: Jitter::millis(100, 500),
            think_time: Jitter::millis(50, 200),
            poll_interval: Duration::from_millis(500),
            event_capacity: 1024,
        }
    }
}

impl SimulationConfig {
    /// No random delays and a short poll interval.
    pub fn deterministic() -> Self {
        Self {
            startup_jitter: Jitter::Disabled,
            think_time: Jitter::Disabled,
            poll_interval: Duration::from_millis(10),
            ..Self::default()
        }
    }
}
