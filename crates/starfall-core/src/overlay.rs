use serde::{Deserialize, Serialize};

use crate::catalog::PointCatalog;
use crate::error::ConfigurationError;
use crate::geometry::Star;

/// Which stars frame the hidden-image overlay.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayAnchor {
    /// Star at the overlay's top edge; also fixes its left edge.
    pub top_left_day: u32,
    /// Star at the overlay's bottom edge.
    pub bottom_day: u32,
    /// How far left of the top-left star the image starts (px).
    pub left_offset_px: f64,
}

impl Default for OverlayAnchor {
    fn default() -> Self {
        Self {
            top_left_day: 16,
            bottom_day: 8,
            left_offset_px: 140.0,
        }
    }
}

/// Screen placement of the overlay image.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct OverlayFrame {
    pub left: f64,
    pub top: f64,
    pub height: f64,
}

impl OverlayAnchor {
    pub fn validate(&self, catalog: &PointCatalog) -> Result<(), ConfigurationError> {
        for day in [self.top_left_day, self.bottom_day] {
            if !catalog.contains(day) {
                return Err(ConfigurationError::UnknownAnchor(day));
            }
        }
        Ok(())
    }

    /// `None` until both anchor stars are on screen.
    pub fn frame(&self, stars: &[Star]) -> Option<OverlayFrame> {
        let find = |day| stars.iter().find(|s| s.day == day).map(|s| s.position);
        let top_left = find(self.top_left_day)?;
        let bottom = find(self.bottom_day)?;
        Some(OverlayFrame {
            left: top_left.x - self.left_offset_px,
            top: top_left.y,
            height: bottom.y - top_left.y,
        })
    }
}
