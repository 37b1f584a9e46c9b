//! Viewport capture via the xcap crate.

use image::RgbaImage;
use xcap::Monitor;

use crate::error::HarvestError;
use crate::harvest::types::ViewportRegion;

/// Pixel bounds of one physical display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorBounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl MonitorBounds {
    fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x
            && y >= self.y
            && x < self.x + self.width as i32
            && y < self.y + self.height as i32
    }
}

fn monitor_bounds(monitor: &Monitor) -> Result<MonitorBounds, HarvestError> {
    Ok(MonitorBounds {
        x: monitor
            .x()
            .map_err(|e| HarvestError::Capture(format!("monitor geometry: {e}")))?,
        y: monitor
            .y()
            .map_err(|e| HarvestError::Capture(format!("monitor geometry: {e}")))?,
        width: monitor
            .width()
            .map_err(|e| HarvestError::Capture(format!("monitor geometry: {e}")))?,
        height: monitor
            .height()
            .map_err(|e| HarvestError::Capture(format!("monitor geometry: {e}")))?,
    })
}

/// Capture the given screen region as an RGBA image.
///
/// The monitor containing the region's origin is captured whole and then
/// cropped; the crop is clamped to the monitor edges, so a region hanging
/// off-screen yields the visible part rather than an error.
pub fn capture_region(region: &ViewportRegion) -> Result<RgbaImage, HarvestError> {
    let monitors = Monitor::all()
        .map_err(|e| HarvestError::Capture(format!("monitor enumeration failed: {e}")))?;

    for monitor in monitors {
        let bounds = monitor_bounds(&monitor)?;
        if !bounds.contains(region.x, region.y) {
            continue;
        }

        let screenshot = monitor
            .capture_image()
            .map_err(|e| HarvestError::Capture(format!("screen capture failed: {e}")))?;

        let local_x = (region.x - bounds.x) as u32;
        let local_y = (region.y - bounds.y) as u32;
        let width = region.width.min(screenshot.width().saturating_sub(local_x));
        let height = region
            .height
            .min(screenshot.height().saturating_sub(local_y));
        if width == 0 || height == 0 {
            return Err(HarvestError::Capture(
                "capture region lies outside the monitor's pixel bounds".into(),
            ));
        }

        let cropped =
            image::imageops::crop_imm(&screenshot, local_x, local_y, width, height).to_image();
        return Ok(cropped);
    }

    Err(HarvestError::Capture(format!(
        "no monitor contains the region origin ({}, {})",
        region.x, region.y
    )))
}

/// Bounds of the largest attached display, where the target window gets
/// parked before harvesting.
pub fn largest_monitor() -> Result<MonitorBounds, HarvestError> {
    let monitors = Monitor::all()
        .map_err(|e| HarvestError::Capture(format!("monitor enumeration failed: {e}")))?;

    let mut largest: Option<MonitorBounds> = None;
    for monitor in monitors {
        let bounds = monitor_bounds(&monitor)?;
        let area = bounds.width as u64 * bounds.height as u64;
        let best = largest
            .map(|b| b.width as u64 * b.height as u64)
            .unwrap_or(0);
        if area > best {
            largest = Some(bounds);
        }
    }

    largest.ok_or_else(|| HarvestError::Capture("no monitors detected".into()))
}
