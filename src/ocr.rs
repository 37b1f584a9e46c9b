//! Text recognition via the ocrs engine.
//!
//! The engine lives on a dedicated worker thread; callers send an image
//! and wait for the result with a bounded timeout, so a hung recognition
//! pass surfaces as a recoverable error instead of stalling the harvest.
//! A timed-out pass keeps running in the background and its result is
//! discarded; the next request simply queues behind it.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use image::RgbaImage;
use ocrs::{ImageSource, OcrEngine, OcrEngineParams};

use crate::error::HarvestError;

struct Job {
    image: RgbaImage,
    reply: Sender<Result<String, String>>,
}

#[derive(Debug)]
pub struct TextRecognizer {
    jobs: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
}

impl TextRecognizer {
    /// Load the detection and recognition models and spin up the worker.
    pub fn new(detection_model: &Path, recognition_model: &Path) -> Result<Self, HarvestError> {
        let (jobs_tx, jobs_rx) = mpsc::channel::<Job>();
        let (init_tx, init_rx) = mpsc::channel::<Result<(), String>>();
        let detection = detection_model.to_path_buf();
        let recognition = recognition_model.to_path_buf();

        let worker = thread::spawn(move || worker_loop(detection, recognition, jobs_rx, init_tx));

        match init_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                jobs: Some(jobs_tx),
                worker: Some(worker),
            }),
            Ok(Err(message)) => Err(HarvestError::Recognition(message)),
            Err(_) => Err(HarvestError::Recognition(
                "recognizer worker exited during startup".into(),
            )),
        }
    }

    /// Recognize the text in `image`, waiting at most `timeout`.
    ///
    /// A blank image yields an empty string, not an error.
    pub fn recognize(
        &self,
        image: RgbaImage,
        timeout: Duration,
    ) -> Result<String, HarvestError> {
        let Some(jobs) = self.jobs.as_ref() else {
            return Err(HarvestError::Recognition("recognizer is shut down".into()));
        };

        let (reply_tx, reply_rx) = mpsc::channel();
        jobs.send(Job {
            image,
            reply: reply_tx,
        })
        .map_err(|_| HarvestError::Recognition("recognizer worker is gone".into()))?;

        match reply_rx.recv_timeout(timeout) {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(message)) => Err(HarvestError::Recognition(message)),
            Err(RecvTimeoutError::Timeout) => Err(HarvestError::RecognitionTimeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(HarvestError::Recognition(
                "recognizer worker died mid-job".into(),
            )),
        }
    }
}

impl Drop for TextRecognizer {
    fn drop(&mut self) {
        // Closing the job channel ends the worker loop.
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn worker_loop(
    detection: PathBuf,
    recognition: PathBuf,
    jobs: Receiver<Job>,
    init: Sender<Result<(), String>>,
) {
    let engine = match build_engine(&detection, &recognition) {
        Ok(engine) => {
            let _ = init.send(Ok(()));
            engine
        }
        Err(message) => {
            let _ = init.send(Err(message));
            return;
        }
    };

    while let Ok(job) = jobs.recv() {
        let result = recognize_image(&engine, &job.image);
        let _ = job.reply.send(result);
    }
}

fn build_engine(detection: &Path, recognition: &Path) -> Result<OcrEngine, String> {
    let detection_model = rten::Model::load_file(detection)
        .map_err(|e| format!("failed to load detection model {}: {e}", detection.display()))?;
    let recognition_model = rten::Model::load_file(recognition).map_err(|e| {
        format!(
            "failed to load recognition model {}: {e}",
            recognition.display()
        )
    })?;

    OcrEngine::new(OcrEngineParams {
        detection_model: Some(detection_model),
        recognition_model: Some(recognition_model),
        ..Default::default()
    })
    .map_err(|e| format!("failed to build the OCR engine: {e}"))
}

fn recognize_image(engine: &OcrEngine, image: &RgbaImage) -> Result<String, String> {
    let source = ImageSource::from_bytes(image.as_raw(), image.dimensions())
        .map_err(|e| format!("captured image rejected: {e}"))?;
    let input = engine
        .prepare_input(source)
        .map_err(|e| format!("failed to prepare OCR input: {e}"))?;
    engine
        .get_text(&input)
        .map_err(|e| format!("text extraction failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_models_fail_cleanly() {
        let err = TextRecognizer::new(
            Path::new("/nonexistent/detection.rten"),
            Path::new("/nonexistent/recognition.rten"),
        )
        .unwrap_err();
        assert!(matches!(err, HarvestError::Recognition(_)));
    }
}
