use std::thread;
use std::time::{Duration, Instant};

use image::RgbaImage;
use tokio_util::sync::CancellationToken;

use crate::error::HarvestError;
use crate::harvest::calibration::ScrollCalibration;
use crate::harvest::classifier::classify;
use crate::harvest::config::HarvestConfig;
use crate::harvest::extractor::extract;
use crate::harvest::termination::{is_probable_end, TerminationWindow};
use crate::harvest::types::{Completeness, History, Item, Novelty, ViewportRegion};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Capability contract the loop drives. Implemented by the live OS glue
/// (capture + OCR + event synthesis) and by scripted doubles in tests.
pub trait PanelPort {
    /// Capture the viewport as a raster image. Fails when the target
    /// window is not frontmost or visible.
    fn capture_region(&mut self, region: &ViewportRegion) -> Result<RgbaImage, HarvestError>;

    /// Recognize text in a captured image. A blank image yields an empty
    /// string, not an error.
    fn recognize_text(&mut self, image: RgbaImage) -> Result<String, HarvestError>;

    /// Advance the panel content by `ticks` (sign per the calibration's
    /// direction convention) and wait for it to settle. Best effort.
    fn scroll_by(&mut self, ticks: i64, settle: Duration);

    /// Park the pointer at a fixed position for the duration of one
    /// capture/scroll step.
    fn pin_pointer(&mut self, x: i32, y: i32);

    /// Release the pointer parked by `pin_pointer`.
    fn release_pointer(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Running,
    Probing,
    Done,
}

/// How a harvest run ended.
#[derive(Debug)]
pub enum HarvestStatus {
    /// The termination probe corroborated that the panel has no further
    /// content.
    Completed,
    /// The user cancelled the run; deliberate, not an error.
    Cancelled,
    /// A fatal error aborted the run.
    Failed(HarvestError),
}

/// Final result of a harvest run. The history is returned for every
/// status so partial results survive failures and cancellation.
#[derive(Debug)]
pub struct HarvestOutcome {
    pub status: HarvestStatus,
    pub history: History,
}

impl HarvestOutcome {
    /// The de-duplicated entries: complete items seen for the first time.
    pub fn kept_items(&self) -> impl Iterator<Item = &Item> {
        self.history.iter().filter(|item| item.is_keeper())
    }
}

/// The capture-dedup engine: repeatedly captures the viewport, extracts
/// and classifies text items, advances by the calibrated sub-page step,
/// and stops once an over-scroll probe corroborates that only repeats
/// remain.
pub struct HarvestLoop<P: PanelPort> {
    port: P,
    region: ViewportRegion,
    calibration: ScrollCalibration,
    window: TerminationWindow,
    config: HarvestConfig,
    cancel: CancellationToken,
    history: History,
    interaction_index: u32,
    state: LoopState,
}

impl<P: PanelPort> HarvestLoop<P> {
    pub fn new(
        port: P,
        region: ViewportRegion,
        calibration: ScrollCalibration,
        config: HarvestConfig,
        cancel: CancellationToken,
    ) -> Self {
        let window = TerminationWindow::from_calibration(&calibration);
        Self {
            port,
            region,
            calibration,
            window,
            config,
            cancel,
            history: Vec::new(),
            interaction_index: 0,
            state: LoopState::Running,
        }
    }

    pub fn termination_window(&self) -> &TerminationWindow {
        &self.window
    }

    /// Drive the state machine to its end. Blocking; run it under
    /// `spawn_blocking` (see the controller).
    pub fn run(mut self) -> HarvestOutcome {
        loop {
            if self.cancel.is_cancelled() {
                log_warn!(
                    "harvest cancelled after {} interactions",
                    self.interaction_index
                );
                return self.finish(HarvestStatus::Cancelled);
            }

            if let Some(limit) = self.config.max_interactions {
                if self.interaction_index >= limit {
                    log_error!("interaction limit of {limit} reached; aborting");
                    return self
                        .finish(HarvestStatus::Failed(HarvestError::InteractionLimit(limit)));
                }
            }

            let step = match self.state {
                LoopState::Running => self.run_interaction(),
                LoopState::Probing => self.run_probe(),
                LoopState::Done => return self.finish(HarvestStatus::Completed),
            };

            if let Err(err) = step {
                log_error!(
                    "harvest aborted at interaction {}: {err}",
                    self.interaction_index
                );
                return self.finish(HarvestStatus::Failed(err));
            }
        }
    }

    fn finish(self, status: HarvestStatus) -> HarvestOutcome {
        HarvestOutcome {
            status,
            history: self.history,
        }
    }

    /// One RUNNING tick: capture, extract, classify, append, then either
    /// advance by the safe step or switch to PROBING when the recent
    /// window contains only repeats.
    fn run_interaction(&mut self) -> Result<(), HarvestError> {
        let started = Instant::now();
        let (anchor_x, anchor_y) = self.region.pointer_anchor();
        self.port.pin_pointer(anchor_x, anchor_y);

        let raw_text = match self.capture_with_retry() {
            Ok(text) => text,
            Err(err) => {
                self.port.release_pointer();
                return Err(err);
            }
        };

        self.interaction_index += 1;
        let extracted = extract(&raw_text);
        let items = classify(&self.history, &extracted, self.interaction_index);
        let new_count = items.iter().filter(|i| i.novelty == Novelty::New).count();
        log_info!(
            "interaction {}: {} items ({} new) in {}ms",
            self.interaction_index,
            items.len(),
            new_count,
            started.elapsed().as_millis()
        );
        self.history.extend(items);

        if is_probable_end(&self.history, self.interaction_index, &self.window) {
            log_info!(
                "last {} interactions held only repeats; probing past the current position",
                self.window.num_int_check
            );
            self.state = LoopState::Probing;
        } else {
            self.port
                .scroll_by(self.calibration.advance_ticks(), self.config.settle_delay);
        }

        self.port.release_pointer();
        Ok(())
    }

    /// One PROBING tick: jump well past the current position and capture
    /// again. If the far content is still nothing but repeats, commit to
    /// termination; otherwise rewind, keep the probe's items as ordinary
    /// data, and resume.
    fn run_probe(&mut self) -> Result<(), HarvestError> {
        let (anchor_x, anchor_y) = self.region.pointer_anchor();
        self.port.pin_pointer(anchor_x, anchor_y);

        let probe_ticks = self.window.over_scroll_ticks * self.calibration.direction;
        self.port
            .scroll_by(probe_ticks, self.config.probe_settle_delay);

        let raw_text = match self.capture_with_retry() {
            Ok(text) => text,
            Err(err) => {
                self.port.release_pointer();
                return Err(err);
            }
        };

        let probe_index = self.interaction_index + 1;
        let extracted = extract(&raw_text);
        let probe_items = classify(&self.history, &extracted, probe_index);

        // Evaluate the predicate as if the probe had been appended, without
        // committing it yet.
        let mut hypothetical = self.history.clone();
        hypothetical.extend(probe_items.iter().cloned());

        if is_probable_end(&hypothetical, probe_index, &self.window) {
            // The viewport-edge cut can no longer be resolved by a later
            // capture, so the stored tail counts as complete.
            if let Some(last) = self.history.last_mut() {
                if last.completeness == Completeness::Incomplete {
                    last.completeness = Completeness::Complete;
                }
            }
            log_info!(
                "probe at interaction {} corroborated the end of the panel",
                probe_index
            );
            self.state = LoopState::Done;
        } else {
            log_info!(
                "probe at interaction {} found fresh content; rewinding and resuming",
                probe_index
            );
            self.port
                .scroll_by(-probe_ticks, self.config.probe_settle_delay);
            self.interaction_index = probe_index;
            self.history.extend(probe_items);
            self.state = LoopState::Running;
        }

        self.port.release_pointer();
        Ok(())
    }

    fn capture_and_recognize(&mut self) -> Result<String, HarvestError> {
        let image = self.port.capture_region(&self.region)?;
        self.port.recognize_text(image)
    }

    /// Capture/recognize with the single-retry recovery: a recoverable
    /// failure is logged, backed off, and retried once; a second failure
    /// escalates to fatal.
    fn capture_with_retry(&mut self) -> Result<String, HarvestError> {
        match self.capture_and_recognize() {
            Ok(text) => Ok(text),
            Err(err) if err.is_recoverable() => {
                log_warn!(
                    "capture step failed after interaction {} ({err}); retrying once",
                    self.interaction_index
                );
                thread::sleep(self.config.retry_backoff);
                self.capture_and_recognize()
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::harvest::calibration::calibrate;

    /// Scripted collaborator: serves queued recognition results, then a
    /// fallback page forever. Records every scroll and pin call.
    struct ScriptedPort {
        responses: VecDeque<Result<String, HarvestError>>,
        fallback: String,
        scrolls: Vec<i64>,
        pins: u32,
        releases: u32,
        recognitions: u32,
    }

    impl ScriptedPort {
        fn repeating(page: &str) -> Self {
            Self {
                responses: VecDeque::new(),
                fallback: page.to_string(),
                scrolls: Vec::new(),
                pins: 0,
                releases: 0,
                recognitions: 0,
            }
        }

        fn scripted(responses: Vec<Result<String, HarvestError>>, fallback: &str) -> Self {
            Self {
                responses: responses.into(),
                fallback: fallback.to_string(),
                scrolls: Vec::new(),
                pins: 0,
                releases: 0,
                recognitions: 0,
            }
        }
    }

    impl PanelPort for ScriptedPort {
        fn capture_region(
            &mut self,
            _region: &ViewportRegion,
        ) -> Result<RgbaImage, HarvestError> {
            Ok(RgbaImage::new(1, 1))
        }

        fn recognize_text(&mut self, _image: RgbaImage) -> Result<String, HarvestError> {
            self.recognitions += 1;
            self.responses
                .pop_front()
                .unwrap_or_else(|| Ok(self.fallback.clone()))
        }

        fn scroll_by(&mut self, ticks: i64, _settle: Duration) {
            self.scrolls.push(ticks);
        }

        fn pin_pointer(&mut self, _x: i32, _y: i32) {
            self.pins += 1;
        }

        fn release_pointer(&mut self) {
            self.releases += 1;
        }
    }

    fn test_region() -> ViewportRegion {
        ViewportRegion {
            x: 0,
            y: 0,
            width: 100,
            height: 100,
        }
    }

    fn fast_config() -> HarvestConfig {
        HarvestConfig {
            settle_delay: Duration::ZERO,
            probe_settle_delay: Duration::ZERO,
            retry_backoff: Duration::ZERO,
            ..HarvestConfig::default()
        }
    }

    fn build_loop(port: ScriptedPort) -> HarvestLoop<ScriptedPort> {
        // calibrated 200 => step 69, window of 4 interactions, 552-tick
        // probe, downward direction.
        let calibration = calibrate(-200, 30).unwrap();
        HarvestLoop::new(
            port,
            test_region(),
            calibration,
            fast_config(),
            CancellationToken::new(),
        )
    }

    fn texts(items: Vec<&Item>) -> Vec<&str> {
        items.into_iter().map(|i| i.text.as_str()).collect()
    }

    #[test]
    fn static_panel_terminates_with_each_item_kept_once() {
        let port = ScriptedPort::repeating("alpha\n\nbeta\n\n");
        let worker = build_loop(port);
        let outcome = worker.run();

        assert!(matches!(outcome.status, HarvestStatus::Completed));
        assert_eq!(texts(outcome.kept_items().collect()), vec!["alpha", "beta"]);

        // Interactions 2..=5 are all repeats, so the window of 4 fires
        // after interaction 5 and the probe confirms.
        let repeats = outcome
            .history
            .iter()
            .filter(|i| i.novelty == Novelty::Repeated)
            .count();
        assert_eq!(outcome.history.len(), 10);
        assert_eq!(repeats, 8);
    }

    #[test]
    fn scroll_trace_for_a_committed_probe() {
        let calibration = calibrate(-200, 30).unwrap();
        let port = ScriptedPort::repeating("alpha\n\nbeta\n\n");
        let mut worker = HarvestLoop::new(
            port,
            test_region(),
            calibration,
            fast_config(),
            CancellationToken::new(),
        );

        // Drive the machine manually to keep hold of the port.
        for _ in 0..5 {
            worker.run_interaction().unwrap();
        }
        assert_eq!(worker.state, LoopState::Probing);
        worker.run_probe().unwrap();
        assert_eq!(worker.state, LoopState::Done);

        assert_eq!(worker.port.scrolls, vec![-69, -69, -69, -69, -552]);
        assert_eq!(worker.port.pins, worker.port.releases);
    }

    #[test]
    fn incomplete_tail_becomes_complete_on_commit() {
        // The fallback page never ends with a blank line, so its last
        // item stays incomplete until the commit resolves it.
        let port = ScriptedPort::repeating("alpha\n\nbeta");
        let worker = build_loop(port);
        let outcome = worker.run();

        assert!(matches!(outcome.status, HarvestStatus::Completed));
        let kept = texts(outcome.kept_items().collect());
        assert_eq!(kept, vec!["alpha", "beta"]);

        let last = outcome.history.last().unwrap();
        assert_eq!(last.completeness, Completeness::Complete);
        assert_eq!(last.text, "beta");
    }

    #[test]
    fn failed_probe_rewinds_and_keeps_the_probe_items() {
        // Five identical pages trigger the probe; the probe lands on
        // fresh content, so the loop rewinds and continues until the new
        // content has repeated long enough for a second, successful probe.
        let page_one = "alpha\n\nbeta\n\n";
        let mut responses: Vec<Result<String, HarvestError>> = Vec::new();
        for _ in 0..5 {
            responses.push(Ok(page_one.to_string()));
        }
        responses.push(Ok("gamma\n\n".to_string())); // probe capture

        let port = ScriptedPort::scripted(responses, "gamma\n\n");
        let calibration = calibrate(-200, 30).unwrap();
        let mut worker = HarvestLoop::new(
            port,
            test_region(),
            calibration,
            fast_config(),
            CancellationToken::new(),
        );

        for _ in 0..5 {
            worker.run_interaction().unwrap();
        }
        worker.run_probe().unwrap();
        // Fresh content: back to RUNNING, probe items appended under the
        // next interaction index, viewport rewound by the probe distance.
        assert_eq!(worker.state, LoopState::Running);
        assert_eq!(worker.interaction_index, 6);
        let gamma = worker.history.last().unwrap();
        assert_eq!(gamma.text, "gamma");
        assert_eq!(gamma.interaction_index, 6);
        assert_eq!(gamma.novelty, Novelty::New);
        assert_eq!(worker.port.scrolls.last(), Some(&552));

        let outcome = worker.run();
        assert!(matches!(outcome.status, HarvestStatus::Completed));
        assert_eq!(
            texts(outcome.kept_items().collect()),
            vec!["alpha", "beta", "gamma"]
        );
    }

    #[test]
    fn single_recognition_failure_is_absorbed() {
        let responses = vec![Err(HarvestError::Recognition("engine hiccup".into()))];
        let port = ScriptedPort::scripted(responses, "alpha\n\nbeta\n\n");
        let worker = build_loop(port);
        let outcome = worker.run();

        assert!(matches!(outcome.status, HarvestStatus::Completed));
        assert_eq!(texts(outcome.kept_items().collect()), vec!["alpha", "beta"]);
    }

    #[test]
    fn second_recognition_failure_is_fatal_but_history_survives() {
        // Two clean interactions, then an interaction whose capture fails
        // twice in a row.
        let responses = vec![
            Ok("alpha\n\n".to_string()),
            Ok("alpha\n\nbeta\n\n".to_string()),
            Err(HarvestError::Recognition("engine down".into())),
            Err(HarvestError::Recognition("engine down".into())),
        ];
        let port = ScriptedPort::scripted(responses, "unreached\n\n");
        let worker = build_loop(port);
        let outcome = worker.run();

        match outcome.status {
            HarvestStatus::Failed(HarvestError::Recognition(_)) => {}
            other => panic!("expected a recognition failure, got {other:?}"),
        }
        assert_eq!(texts(outcome.kept_items().collect()), vec!["alpha", "beta"]);
        assert_eq!(outcome.history.len(), 3);
    }

    #[test]
    fn cancellation_is_distinguished_from_completion() {
        let token = CancellationToken::new();
        token.cancel();
        let calibration = calibrate(-200, 30).unwrap();
        let worker = HarvestLoop::new(
            ScriptedPort::repeating("alpha\n\n"),
            test_region(),
            calibration,
            fast_config(),
            token,
        );
        let outcome = worker.run();
        assert!(matches!(outcome.status, HarvestStatus::Cancelled));
        assert!(outcome.history.is_empty());
    }

    #[test]
    fn interaction_limit_aborts_with_history_preserved() {
        let calibration = calibrate(-200, 30).unwrap();
        let config = HarvestConfig {
            max_interactions: Some(2),
            ..fast_config()
        };
        let worker = HarvestLoop::new(
            ScriptedPort::repeating("alpha\n\n"),
            test_region(),
            calibration,
            config,
            CancellationToken::new(),
        );
        let outcome = worker.run();
        match outcome.status {
            HarvestStatus::Failed(HarvestError::InteractionLimit(2)) => {}
            other => panic!("expected the interaction limit, got {other:?}"),
        }
        assert_eq!(outcome.history.len(), 2);
    }

    #[test]
    fn blank_panel_terminates_with_empty_history() {
        let port = ScriptedPort::repeating("");
        let worker = build_loop(port);
        let outcome = worker.run();
        assert!(matches!(outcome.status, HarvestStatus::Completed));
        assert!(outcome.history.is_empty());
    }
}
