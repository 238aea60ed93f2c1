//! Staleness budget for cached snapshots, adapted to device reachability.

use std::time::Duration;

pub const DEFAULT_NOMINAL: Duration = Duration::from_secs(3);
pub const DEFAULT_UNREACHABLE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct AdaptiveTimeout {
    nominal: Duration,
    unreachable: Duration,
    current: Duration,
}

impl AdaptiveTimeout {
    pub fn new(nominal: Duration, unreachable: Duration) -> Self {
        AdaptiveTimeout {
            nominal,
            unreachable,
            current: nominal,
        }
    }

    /// How old a snapshot may be and still be served.
    pub fn current_budget(&self) -> Duration {
        self.current
    }

    pub fn on_reachable_refresh(&mut self) {
        self.current = self.nominal;
    }

    pub fn on_unreachable(&mut self) {
        self.current = self.unreachable;
    }
}

impl Default for AdaptiveTimeout {
    fn default() -> Self {
        AdaptiveTimeout::new(DEFAULT_NOMINAL, DEFAULT_UNREACHABLE)
    }
}
