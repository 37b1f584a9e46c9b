use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::HarvestError;

/// The fixed on-screen rectangle captured on every interaction.
///
/// Persisted across runs as a single line of four comma-separated integers
/// (`x,y,width,height`). The region is assumed to lie within the target
/// window's bounds at capture time; that is the window-placement glue's
/// responsibility, not checked here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportRegion {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl ViewportRegion {
    /// Parse the persisted `x,y,width,height` record.
    pub fn parse_record(record: &str) -> Result<Self, HarvestError> {
        let fields: Vec<&str> = record.trim().split(',').map(str::trim).collect();
        if fields.len() != 4 {
            return Err(HarvestError::Region(format!(
                "expected 4 comma-separated integers, got {} fields",
                fields.len()
            )));
        }

        let parse_i32 = |field: &str, name: &str| {
            field.parse::<i32>().map_err(|_| {
                HarvestError::Region(format!("{name} is not an integer: {field:?}"))
            })
        };
        let parse_u32 = |field: &str, name: &str| {
            field.parse::<u32>().map_err(|_| {
                HarvestError::Region(format!("{name} is not a positive integer: {field:?}"))
            })
        };

        let region = Self {
            x: parse_i32(fields[0], "x")?,
            y: parse_i32(fields[1], "y")?,
            width: parse_u32(fields[2], "width")?,
            height: parse_u32(fields[3], "height")?,
        };

        if region.width == 0 || region.height == 0 {
            return Err(HarvestError::Region(
                "width and height must be greater than zero".into(),
            ));
        }

        Ok(region)
    }

    pub fn to_record(&self) -> String {
        format!("{},{},{},{}", self.x, self.y, self.width, self.height)
    }

    /// Where the pointer is parked during a capture/scroll step. Scroll
    /// events land on the window under the pointer, so the anchor sits at
    /// the center of the region.
    pub fn pointer_anchor(&self) -> (i32, i32) {
        (
            self.x + self.width as i32 / 2,
            self.y + self.height as i32 / 2,
        )
    }
}

/// Whether an extracted block was bounded by a blank line (trusted) or may
/// have been cut by the viewport edge (untrusted, re-captured on the next
/// interaction thanks to the sub-page scroll step).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Completeness {
    Complete,
    Incomplete,
}

/// New vs. already-seen classification of an item's text. Only meaningful
/// for complete items; incomplete ones are always `New` because they get
/// re-evaluated once the next capture shows their full text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Novelty {
    New,
    Repeated,
}

/// One text block extracted from a single captured viewport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// The interaction (loop iteration) that produced this item, starting
    /// at 1 and strictly monotonic.
    pub interaction_index: u32,
    /// Newline-joined trimmed lines of the block. Never empty.
    pub text: String,
    pub completeness: Completeness,
    pub novelty: Novelty,
    pub captured_at: DateTime<Utc>,
}

impl Item {
    /// An item that survives final filtering: fully visible when captured
    /// and not a repeat of earlier content.
    pub fn is_keeper(&self) -> bool {
        self.completeness == Completeness::Complete && self.novelty == Novelty::New
    }
}

/// Append-only record of everything extracted so far, owned exclusively by
/// the harvest loop. The set of distinct complete texts is derived from it
/// on demand rather than stored separately.
pub type History = Vec<Item>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_record_roundtrip() {
        let region = ViewportRegion {
            x: -10,
            y: 42,
            width: 800,
            height: 600,
        };
        let parsed = ViewportRegion::parse_record(&region.to_record()).unwrap();
        assert_eq!(parsed, region);
    }

    #[test]
    fn region_record_tolerates_whitespace() {
        let parsed = ViewportRegion::parse_record(" 1, 2, 3 ,4 \n").unwrap();
        assert_eq!(
            parsed,
            ViewportRegion {
                x: 1,
                y: 2,
                width: 3,
                height: 4
            }
        );
    }

    #[test]
    fn region_record_rejects_bad_input() {
        assert!(ViewportRegion::parse_record("1,2,3").is_err());
        assert!(ViewportRegion::parse_record("1,2,three,4").is_err());
        assert!(ViewportRegion::parse_record("1,2,0,4").is_err());
        assert!(ViewportRegion::parse_record("").is_err());
    }

    #[test]
    fn pointer_anchor_is_region_center() {
        let region = ViewportRegion {
            x: 100,
            y: 200,
            width: 400,
            height: 300,
        };
        assert_eq!(region.pointer_anchor(), (300, 350));
    }
}
