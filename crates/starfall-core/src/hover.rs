use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::catalog::Point;
use crate::constants::{LABEL_RISE_PX, LABEL_SHIFT_LONG_PX, LABEL_SHIFT_SHORT_PX};
use crate::geometry::ScreenPosition;

/// Where the directional hint should point.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HoverTarget {
    pub day: u32,
    pub angle_deg: f64,
}

/// Marker lookup for undiscovered points.
///
/// The map collaborator flags the single point the user may currently find.
pub trait MarkerLookup {
    fn position(&self, day: u32) -> Option<ScreenPosition>;
    fn is_findable(&self, day: u32) -> bool;
}

/// Locate the findable undiscovered marker and the angle from the pointer to it.
///
/// If the collaborator flags more than one marker, the lowest day wins.
pub fn nearest_undiscovered(
    pointer: ScreenPosition,
    points: &[Point],
    discovered: &BTreeSet<u32>,
    markers: &impl MarkerLookup,
) -> Option<HoverTarget> {
    points
        .iter()
        .filter(|p| !discovered.contains(&p.day) && markers.is_findable(p.day))
        .filter_map(|p| markers.position(p.day).map(|pos| (p.day, pos)))
        .min_by_key(|(day, _)| *day)
        .map(|(day, pos)| HoverTarget {
            day,
            angle_deg: pointer.angle_to(pos),
        })
}

/// Day number shown next to a discovered marker under the pointer.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkerLabel {
    pub day: u32,
    pub left: f64,
    pub top: f64,
}

impl MarkerLabel {
    /// Above and to the left of the marker; two-digit days shift further left.
    pub fn beside(day: u32, marker: ScreenPosition) -> Self {
        let shift = if day < 10 {
            LABEL_SHIFT_SHORT_PX
        } else {
            LABEL_SHIFT_LONG_PX
        };
        Self {
            day,
            left: marker.x - shift,
            top: marker.y - LABEL_RISE_PX,
        }
    }
}

/// Help-mode state: the hint is only tracked while help is on.
#[derive(Clone, Copy, Debug, Default)]
pub struct HoverProbe {
    active: bool,
    target: Option<HoverTarget>,
}

impl HoverProbe {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
        if !active {
            self.target = None;
        }
    }

    /// Recompute for a pointer move. No-op while help mode is off.
    pub fn pointer_moved(
        &mut self,
        pointer: ScreenPosition,
        points: &[Point],
        discovered: &BTreeSet<u32>,
        markers: &impl MarkerLookup,
    ) -> Option<HoverTarget> {
        if self.active {
            self.target = nearest_undiscovered(pointer, points, discovered, markers);
        }
        self.target
    }

    pub fn target(&self) -> Option<HoverTarget> {
        self.target
    }
}
