use crate::error::HarvestError;

/// Safety margin (in scroll ticks) subtracted from a page advance so that
/// content near the viewport edge is never skipped over.
pub const DEFAULT_MARGIN_TICKS: i64 = 30;

// Empirical viewport-to-tick ratio: how much of one measured page a single
// confirmation advance covers.
const FORWARD_RATIO: f64 = 0.6111;
// Fraction of the margin-adjusted advance actually used per iteration, so
// consecutive captures always overlap.
const SAFE_STEP_RATIO: f64 = 0.75;
// Rewind factor that returns the content to its pre-calibration position.
const RETURN_RATIO: f64 = 1.5;

/// Result of the one-time scroll calibration. Computed from a single
/// manual reference scroll and immutable for the rest of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollCalibration {
    /// Net scroll delta measured while the reference content fully left
    /// the viewport. Sign encodes the user's scroll direction.
    pub raw_unit: i64,
    /// `max(1, |raw_unit|)`: ticks per page.
    pub calibrated_unit: i64,
    /// `signum(raw_unit)`; every automated scroll multiplies by this so
    /// "advance" always means the direction the user scrolled.
    pub direction: i64,
    /// Ticks to rewind to the content's starting position.
    pub return_steps: i64,
    /// Ticks that advance roughly one page.
    pub forward_units: i64,
    /// Safety margin applied when deriving the iteration step.
    pub margin: i64,
    /// The per-iteration advance. Always >= 1 and strictly less than one
    /// page, guaranteeing overlap between consecutive captures.
    pub safe_step: i64,
}

impl ScrollCalibration {
    /// Signed ticks for one loop iteration's advance.
    pub fn advance_ticks(&self) -> i64 {
        self.safe_step * self.direction
    }
}

/// Convert a measured manual scroll into a reusable calibration.
///
/// Fails when no movement was measured, or when the derived step collapses
/// below one tick (the viewport is too tall for the measured scroll
/// granularity); in both cases the user must redo the reference scroll.
pub fn calibrate(
    manual_scroll_delta: i64,
    margin: i64,
) -> Result<ScrollCalibration, HarvestError> {
    if manual_scroll_delta == 0 {
        return Err(HarvestError::Calibration(
            "no scroll movement was measured; redo the reference scroll".into(),
        ));
    }

    let calibrated_unit = manual_scroll_delta.abs().max(1);
    let return_steps = (calibrated_unit as f64 * RETURN_RATIO).floor() as i64;
    let forward_units = (calibrated_unit as f64 * FORWARD_RATIO).floor() as i64;
    let safe_step = ((forward_units - margin) as f64 * SAFE_STEP_RATIO).floor() as i64;

    if safe_step < 1 {
        return Err(HarvestError::Calibration(format!(
            "derived step of {safe_step} ticks is unusable; \
             redo the reference scroll with a larger gesture"
        )));
    }

    Ok(ScrollCalibration {
        raw_unit: manual_scroll_delta,
        calibrated_unit,
        direction: manual_scroll_delta.signum(),
        return_steps,
        forward_units,
        margin,
        safe_step,
    })
}
