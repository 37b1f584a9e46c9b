use std::time::Duration;
use thiserror::Error;

/// Errors raised by the harvest engine and its collaborators.
///
/// `Capture`, `Recognition` and `RecognitionTimeout` are recoverable once
/// per interaction (the loop retries after a short backoff); everything
/// else is fatal. A fatal error never discards the history accumulated so
/// far -- the loop hands it back alongside the failure.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("calibration failed: {0}")]
    Calibration(String),

    #[error("viewport capture failed: {0}")]
    Capture(String),

    #[error("text recognition failed: {0}")]
    Recognition(String),

    #[error("text recognition did not finish within {0:?}")]
    RecognitionTimeout(Duration),

    #[error("reached the limit of {0} interactions before the panel stabilized")]
    InteractionLimit(u32),

    #[error("viewport region record is malformed: {0}")]
    Region(String),
}

impl HarvestError {
    /// Whether a single retry of the capture/recognize step may absorb
    /// this failure.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            HarvestError::Capture(_)
                | HarvestError::Recognition(_)
                | HarvestError::RecognitionTimeout(_)
        )
    }
}
