pub mod capture;
pub mod error;
pub mod harvest;
pub mod macos_bridge;
pub mod ocr;
pub mod session;
pub mod settings;
pub mod utils;

#[cfg(target_os = "macos")]
pub mod input;
#[cfg(target_os = "macos")]
pub mod port;

pub use error::HarvestError;
pub use harvest::{
    calibrate, Completeness, HarvestConfig, HarvestController, HarvestLoop, HarvestOutcome,
    HarvestStatus, History, Item, Novelty, PanelPort, ScrollCalibration, TerminationWindow,
    ViewportRegion,
};
