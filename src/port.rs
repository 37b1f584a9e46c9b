//! Live implementation of the panel collaborator contracts, wiring the
//! capture, recognition and input glue behind the loop's port trait.

use std::time::Duration;

use image::RgbaImage;
use tokio_util::sync::CancellationToken;

use crate::capture;
use crate::error::HarvestError;
use crate::harvest::loop_worker::PanelPort;
use crate::harvest::types::ViewportRegion;
use crate::input::{self, PointerPin};
use crate::ocr::TextRecognizer;

pub struct LivePanelPort {
    recognizer: TextRecognizer,
    recognition_timeout: Duration,
    session_token: CancellationToken,
    pin: Option<PointerPin>,
}

impl LivePanelPort {
    pub fn new(
        recognizer: TextRecognizer,
        recognition_timeout: Duration,
        session_token: CancellationToken,
    ) -> Self {
        Self {
            recognizer,
            recognition_timeout,
            session_token,
            pin: None,
        }
    }
}

impl PanelPort for LivePanelPort {
    fn capture_region(&mut self, region: &ViewportRegion) -> Result<RgbaImage, HarvestError> {
        capture::capture_region(region)
    }

    fn recognize_text(&mut self, image: RgbaImage) -> Result<String, HarvestError> {
        self.recognizer.recognize(image, self.recognition_timeout)
    }

    fn scroll_by(&mut self, ticks: i64, settle: Duration) {
        input::scroll_by(ticks, settle);
    }

    fn pin_pointer(&mut self, x: i32, y: i32) {
        self.pin = Some(PointerPin::start(x as f64, y as f64, &self.session_token));
    }

    fn release_pointer(&mut self) {
        if let Some(pin) = self.pin.take() {
            pin.join();
        }
    }
}
