pub mod calibration;
pub mod classifier;
pub mod config;
pub mod controller;
pub mod extractor;
pub mod loop_worker;
pub mod termination;
pub mod types;

pub use calibration::{calibrate, ScrollCalibration};
pub use config::HarvestConfig;
pub use controller::HarvestController;
pub use loop_worker::{HarvestLoop, HarvestOutcome, HarvestStatus, PanelPort};
pub use termination::TerminationWindow;
pub use types::{Completeness, History, Item, Novelty, ViewportRegion};
