use std::time::Duration;

use crate::harvest::calibration::DEFAULT_MARGIN_TICKS;

/// Tunables for a harvest session.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Safety margin subtracted when deriving the per-iteration step.
    pub margin_ticks: i64,
    /// Pause after an ordinary advance so the panel finishes rendering.
    pub settle_delay: Duration,
    /// Pause after the larger over-scroll probe jump.
    pub probe_settle_delay: Duration,
    /// Backoff before the single retry of a failed capture/recognize step.
    pub retry_backoff: Duration,
    /// Upper bound on one recognition pass.
    pub recognition_timeout: Duration,
    /// Optional hard cap on interactions. `None` preserves the unbounded
    /// behavior; a panel that never stabilizes then loops until cancelled.
    pub max_interactions: Option<u32>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            margin_ticks: DEFAULT_MARGIN_TICKS,
            settle_delay: Duration::from_millis(800),
            probe_settle_delay: Duration::from_millis(1500),
            retry_backoff: Duration::from_millis(500),
            recognition_timeout: Duration::from_secs(30),
            max_interactions: None,
        }
    }
}
