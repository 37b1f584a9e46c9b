use anyhow::{bail, Context, Result};
use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::harvest::calibration::ScrollCalibration;
use crate::harvest::config::HarvestConfig;
use crate::harvest::loop_worker::{HarvestLoop, HarvestOutcome, PanelPort};
use crate::harvest::types::ViewportRegion;

/// Owns a running harvest: spawns the blocking loop on the runtime's
/// blocking pool, exposes cancellation, and joins for the outcome.
pub struct HarvestController {
    handle: Option<JoinHandle<HarvestOutcome>>,
    cancel_token: Option<CancellationToken>,
}

impl HarvestController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    /// Start the loop. The session token is shared with collaborators
    /// (pointer pin, cancel watcher) so one cancellation reaches all of
    /// them.
    pub fn start<P>(
        &mut self,
        port: P,
        region: ViewportRegion,
        calibration: ScrollCalibration,
        config: HarvestConfig,
        cancel_token: CancellationToken,
    ) -> Result<()>
    where
        P: PanelPort + Send + 'static,
    {
        if self.handle.is_some() {
            bail!("harvest already active");
        }

        let worker = HarvestLoop::new(port, region, calibration, config, cancel_token.clone());
        info!(
            "starting harvest: step {} ticks, window {} interactions, probe {} ticks",
            calibration.safe_step,
            worker.termination_window().num_int_check,
            worker.termination_window().over_scroll_ticks
        );

        let handle = tokio::task::spawn_blocking(move || worker.run());
        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    /// Flag the loop to stop at the next interaction boundary.
    pub fn request_cancel(&self) {
        if let Some(token) = &self.cancel_token {
            token.cancel();
            info!("cancel signal sent to harvest loop");
        }
    }

    /// Wait for the loop to finish and take its outcome.
    pub async fn wait(&mut self) -> Result<HarvestOutcome> {
        let handle = self
            .handle
            .take()
            .context("no harvest is currently running")?;
        self.cancel_token = None;
        handle.await.context("harvest worker failed to join")
    }

    /// Cancel and wait in one step.
    pub async fn stop(&mut self) -> Result<HarvestOutcome> {
        self.request_cancel();
        self.wait().await
    }
}

impl Default for HarvestController {
    fn default() -> Self {
        Self::new()
    }
}
