//! Stand-in map collaborator: a fixed-size Web-Mercator viewport.
//!
//! Projects catalog coordinates to pixels with 256-px tiles at the configured
//! zoom, the same way a slippy map lays out its markers.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use starfall_core::{Coordinate, KeyValueStore, MapSurface, MarkerLookup, ScreenPosition, Session};

const TILE_SIZE: f64 = 256.0;
const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

pub struct Viewport {
    center: Coordinate,
    zoom: u8,
    width: f64,
    height: f64,
    opacity: f64,
    interactive: bool,
    /// Rendered markers for discovered days.
    markers: BTreeMap<u32, Coordinate>,
    findable: Option<(u32, Coordinate)>,
}

impl Viewport {
    pub fn new(center: Coordinate, zoom: u8, width: u32, height: u32) -> Self {
        Self {
            center,
            zoom,
            width: width as f64,
            height: height as f64,
            opacity: 1.0,
            interactive: true,
            markers: BTreeMap::new(),
            findable: None,
        }
    }

    /// Pixel position of `coord` in world space at the current zoom.
    fn world_px(&self, coord: Coordinate) -> (f64, f64) {
        let scale = TILE_SIZE * 2f64.powi(self.zoom as i32);
        let lat = coord.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
        let x = (coord.lon + 180.0) / 360.0 * scale;
        let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * scale;
        (x, y)
    }

    /// Screen position of `coord` with the camera on `self.center`.
    pub fn project(&self, coord: Coordinate) -> ScreenPosition {
        let (cx, cy) = self.world_px(self.center);
        let (x, y) = self.world_px(coord);
        ScreenPosition::new(x - cx + self.width / 2.0, y - cy + self.height / 2.0)
    }

    /// Mirror the session's discovered markers and current findable point.
    pub fn sync<S: KeyValueStore>(&mut self, session: &Session<S>) {
        let default_center = session.settings().center;
        let resolve = |day: u32| {
            session
                .catalog()
                .get(day)
                .map(|p| p.placement.resolve(default_center))
        };

        self.markers = session
            .catalog()
            .points()
            .iter()
            .filter(|p| session.discovered_days().contains(&p.day))
            .map(|p| (p.day, p.placement.resolve(default_center)))
            .collect();
        self.findable = session
            .findable_day()
            .and_then(|day| resolve(day).map(|c| (day, c)));
    }

    pub fn opacity(&self) -> f64 {
        self.opacity
    }

    pub fn interactive(&self) -> bool {
        self.interactive
    }
}

impl MapSurface for Viewport {
    fn marker_position(&self, day: u32) -> Option<ScreenPosition> {
        self.markers.get(&day).map(|c| self.project(*c))
    }

    fn recenter(&mut self, center: Coordinate) {
        tracing::debug!(lat = center.lat, lon = center.lon, "recentering viewport");
        self.center = center;
    }

    fn set_surface(&mut self, opacity: f64, interactive: bool) {
        self.opacity = opacity;
        self.interactive = interactive;
    }
}

impl MarkerLookup for Viewport {
    fn position(&self, day: u32) -> Option<ScreenPosition> {
        match self.findable {
            Some((d, c)) if d == day => Some(self.project(c)),
            _ => self.marker_position(day),
        }
    }

    fn is_findable(&self, day: u32) -> bool {
        self.findable.is_some_and(|(d, _)| d == day)
    }
}
