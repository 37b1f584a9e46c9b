use crate::harvest::calibration::ScrollCalibration;
use crate::harvest::types::{Completeness, History, Novelty};

/// Sizing of the "has the panel ended?" check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminationWindow {
    /// How many of the most recent distinct interactions must contain only
    /// repeats before the end of the panel is suspected.
    pub num_int_check: u32,
    /// Probe distance used to look further ahead before committing to
    /// termination, large enough to jump past any merely-stalled overlap.
    pub over_scroll_ticks: i64,
}

impl TerminationWindow {
    /// Derive the window from a calibration: enough iterations to cover a
    /// full page plus three margins of slack, and a probe of twice that
    /// many steps.
    pub fn from_calibration(calibration: &ScrollCalibration) -> Self {
        let span = calibration.forward_units + 3 * calibration.margin;
        let num_int_check = (span as f64 / calibration.safe_step as f64).ceil() as u32;
        Self {
            num_int_check,
            over_scroll_ticks: calibration.safe_step * num_int_check as i64 * 2,
        }
    }
}

/// Advisory end-of-content predicate.
///
/// Walks the history backward until `num_int_check` distinct interaction
/// indices have been covered, then answers whether every complete item in
/// that span is a repeat (vacuously true when the span holds no complete
/// items). Returns `false` while fewer than `num_int_check` interactions
/// have run, and `true` when that many interactions produced nothing at
/// all.
///
/// The caller must corroborate a `true` with an over-scroll probe before
/// stopping: a short run of repeats can occur mid-content when the
/// recognized text is unstable.
pub fn is_probable_end(
    history: &History,
    interaction_index: u32,
    window: &TerminationWindow,
) -> bool {
    if interaction_index < window.num_int_check {
        return false;
    }
    if history.is_empty() {
        return true;
    }

    let mut distinct_indices: Vec<u32> = Vec::new();
    let mut recent = Vec::new();
    for item in history.iter().rev() {
        if !distinct_indices.contains(&item.interaction_index) {
            if distinct_indices.len() as u32 >= window.num_int_check {
                break;
            }
            distinct_indices.push(item.interaction_index);
        }
        recent.push(item);
    }
    recent.reverse();

    recent
        .iter()
        .filter(|item| item.completeness == Completeness::Complete)
        .all(|item| item.novelty == Novelty::Repeated)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::harvest::calibration::calibrate;
    use crate::harvest::types::Item;

    fn item(index: u32, text: &str, completeness: Completeness, novelty: Novelty) -> Item {
        Item {
            interaction_index: index,
            text: text.to_string(),
            completeness,
            novelty,
            captured_at: Utc::now(),
        }
    }

    fn window(n: u32) -> TerminationWindow {
        TerminationWindow {
            num_int_check: n,
            over_scroll_ticks: 100,
        }
    }

    #[test]
    fn window_derivation() {
        // calibrated 200 => forward 122, step 69; (122 + 90) / 69 rounds
        // up to 4 iterations and a 552-tick probe.
        let cal = calibrate(-200, 30).unwrap();
        let w = TerminationWindow::from_calibration(&cal);
        assert_eq!(w.num_int_check, 4);
        assert_eq!(w.over_scroll_ticks, 552);
    }

    #[test]
    fn too_few_interactions_is_never_the_end() {
        let history = vec![item(1, "a", Completeness::Complete, Novelty::Repeated)];
        assert!(!is_probable_end(&history, 2, &window(3)));
    }

    #[test]
    fn empty_history_after_enough_interactions_is_the_end() {
        assert!(is_probable_end(&Vec::new(), 3, &window(3)));
    }

    #[test]
    fn all_repeats_in_window_is_the_end() {
        let history = vec![
            item(1, "a", Completeness::Complete, Novelty::New),
            item(2, "a", Completeness::Complete, Novelty::Repeated),
            item(3, "a", Completeness::Complete, Novelty::Repeated),
            item(4, "a", Completeness::Complete, Novelty::Repeated),
        ];
        // Window of 3 covers interactions 2..=4 only, so the initial New
        // at interaction 1 does not block termination.
        assert!(is_probable_end(&history, 4, &window(3)));
        // Window of 4 still sees the New from interaction 1.
        assert!(!is_probable_end(&history, 4, &window(4)));
    }

    #[test]
    fn incomplete_items_are_ignored_by_the_check() {
        let history = vec![
            item(1, "a", Completeness::Complete, Novelty::Repeated),
            item(2, "a", Completeness::Complete, Novelty::Repeated),
            item(2, "cut off", Completeness::Incomplete, Novelty::New),
        ];
        assert!(is_probable_end(&history, 2, &window(2)));
    }

    #[test]
    fn window_with_no_complete_items_is_vacuously_the_end() {
        let history = vec![
            item(1, "cut", Completeness::Incomplete, Novelty::New),
            item(2, "cut", Completeness::Incomplete, Novelty::New),
        ];
        assert!(is_probable_end(&history, 2, &window(2)));
    }

    #[test]
    fn window_counts_distinct_interactions_not_items() {
        // Interaction 2 produced three items; a window of 2 must still
        // reach back to interaction 1.
        let history = vec![
            item(1, "a", Completeness::Complete, Novelty::New),
            item(2, "a", Completeness::Complete, Novelty::Repeated),
            item(2, "b", Completeness::Complete, Novelty::Repeated),
            item(2, "c", Completeness::Complete, Novelty::Repeated),
        ];
        assert!(!is_probable_end(&history, 2, &window(2)));
        assert!(is_probable_end(&history, 3, &window(1)));
    }
}
