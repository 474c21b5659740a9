use rand::rngs::OsRng;
use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone)]
/// Produces human‑like pauses between browser actions.
pub struct BehavioralEngine {
    jitter_ms: (u64, u64),
}

impl BehavioralEngine {
    /// `jitter_ms` bounds the pause taken before each navigation.
    pub fn new(jitter_ms: (u64, u64)) -> Self {
        let (lo, hi) = jitter_ms;
        Self {
            jitter_ms: (lo.min(hi), lo.max(hi)),
        }
    }

    /// Sleep for a random duration between `min` and `max` milliseconds.
    pub async fn random_delay(&self, min: u64, max: u64) {
        if max == 0 || min > max {
            return;
        }
        let mut rng = OsRng;
        let ms = rng.gen_range(min..=max);
        sleep(Duration::from_millis(ms)).await;
    }

    /// Pause taken before navigating to a new URL.
    pub async fn before_navigation(&self) {
        self.random_delay(self.jitter_ms.0, self.jitter_ms.1).await;
    }
}

impl Default for BehavioralEngine {
    fn default() -> Self {
        Self::new((300, 1200))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn zero_jitter_returns_immediately() {
        let engine = BehavioralEngine::new((0, 0));
        let started = std::time::Instant::now();
        engine.before_navigation().await;
        assert!(started.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn reversed_bounds_are_normalised() {
        let engine = BehavioralEngine::new((900, 100));
        assert_eq!(engine.jitter_ms, (100, 900));
    }
}
