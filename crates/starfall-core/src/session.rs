use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::catalog::{Coordinate, Point, PointCatalog};
use crate::discovery::{DiscoveryStore, KeyValueStore};
use crate::error::ConfigurationError;
use crate::geometry::{Connection, ScreenPosition, Star};
use crate::hover::{HoverProbe, HoverTarget, MarkerLabel, MarkerLookup};
use crate::overlay::{OverlayAnchor, OverlayFrame};
use crate::reveal::{ConnectionView, MapSurface, RevealPhase, RevealStateMachine, RevealTiming};
use crate::season::{CivilDate, Season};
use crate::timeline::Millis;

/// Everything a session needs besides the catalog and the backend.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    pub center: Coordinate,
    pub season: Season,
    pub timing: RevealTiming,
    pub overlay: OverlayAnchor,
}

/// "found N of M" where M counts the days open so far.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub found: usize,
    pub available: usize,
    pub total: usize,
}

/// Presentation-facing facade: one catalog, one discovery store, one reveal
/// state machine and the help-mode hint.
pub struct Session<S> {
    catalog: PointCatalog,
    settings: SessionSettings,
    today: CivilDate,
    discovery: DiscoveryStore<S>,
    reveal: RevealStateMachine,
    probe: HoverProbe,
}

impl<S: KeyValueStore> Session<S> {
    pub fn new(
        catalog: PointCatalog,
        settings: SessionSettings,
        backend: S,
        today: CivilDate,
    ) -> Result<Self, ConfigurationError> {
        settings.overlay.validate(&catalog)?;
        let discovery = DiscoveryStore::open(backend);
        let reveal = RevealStateMachine::new(settings.center, settings.timing);
        Ok(Self {
            catalog,
            settings,
            today,
            discovery,
            reveal,
            probe: HoverProbe::default(),
        })
    }

    pub fn catalog(&self) -> &PointCatalog {
        &self.catalog
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn set_today(&mut self, today: CivilDate) {
        self.today = today;
    }

    pub fn available_through(&self) -> u32 {
        self.settings.season.available_through(self.today)
    }

    /// Points whose day has opened.
    pub fn visible_points(&self) -> impl Iterator<Item = &Point> + '_ {
        let through = self.available_through();
        self.catalog.points().iter().filter(move |p| p.day <= through)
    }

    /// The one undiscovered point the user may currently find: the lowest
    /// open day not yet discovered.
    pub fn findable_day(&self) -> Option<u32> {
        self.visible_points()
            .map(|p| p.day)
            .find(|d| !self.discovery.contains(*d))
    }

    pub fn progress(&self) -> Progress {
        let through = self.available_through();
        let available = self.visible_points().count();
        let found = self
            .discovery
            .found()
            .iter()
            .filter(|d| **d <= through && self.catalog.contains(**d))
            .count();
        Progress {
            found,
            available,
            total: self.catalog.len(),
        }
    }

    pub fn phase(&self) -> RevealPhase {
        self.reveal.phase()
    }

    pub fn connections(&self) -> &[Connection] {
        self.reveal.connections()
    }

    pub fn connection_views(&self, now: Millis) -> Vec<ConnectionView> {
        self.reveal.connection_views(now)
    }

    pub fn stars(&self) -> &[Star] {
        self.reveal.stars()
    }

    pub fn discovered_days(&self) -> &BTreeSet<u32> {
        self.discovery.found()
    }

    pub fn hover_target(&self) -> Option<HoverTarget> {
        self.probe.target()
    }

    pub fn overlay_shown(&self) -> bool {
        self.reveal.overlay_shown()
    }

    /// Overlay placement, once built and shown.
    pub fn overlay_frame(&self) -> Option<OverlayFrame> {
        if !self.reveal.overlay_shown() {
            return None;
        }
        self.settings.overlay.frame(self.reveal.stars())
    }

    /// Day label for a discovered marker under the pointer. Only shown on the map.
    pub fn marker_label<M: MapSurface + ?Sized>(&self, day: u32, map: &M) -> Option<MarkerLabel> {
        if self.reveal.phase() != RevealPhase::Mapped || !self.discovery.contains(day) {
            return None;
        }
        map.marker_position(day).map(|pos| MarkerLabel::beside(day, pos))
    }

    /// Record a find. Unknown days and days that have not opened yet are ignored.
    pub fn mark_discovered(&mut self, day: u32) -> bool {
        if !self.catalog.contains(day) {
            tracing::debug!(day, "ignoring find for unknown day");
            return false;
        }
        if !self.settings.season.is_open(day, self.today) {
            tracing::debug!(day, "ignoring find for a day that has not opened");
            return false;
        }
        self.discovery.mark_found(day);
        true
    }

    /// Forget all progress. Only allowed on the map.
    pub fn forget_all(&mut self) -> bool {
        if self.reveal.phase() != RevealPhase::Mapped {
            return false;
        }
        if let Err(e) = self.discovery.clear() {
            tracing::warn!("failed to persist cleared discovery state: {e}");
        }
        true
    }

    pub fn request_reveal<M: MapSurface + ?Sized>(&mut self, now: Millis, map: &mut M) -> bool {
        self.reveal
            .request_reveal(now, self.catalog.points(), self.discovery.found(), map)
    }

    pub fn request_build(&mut self, now: Millis) -> bool {
        self.reveal.request_build(now)
    }

    pub fn request_reset<M: MapSurface + ?Sized>(&mut self, now: Millis, map: &mut M) -> bool {
        self.reveal.request_reset(now, map)
    }

    pub fn toggle_overlay(&mut self) -> bool {
        self.reveal.toggle_overlay()
    }

    pub fn advance<M: MapSurface + ?Sized>(&mut self, now: Millis, map: &mut M) {
        self.reveal
            .advance(now, self.catalog.points(), self.discovery.found(), map);
    }

    pub fn next_deadline(&self) -> Option<Millis> {
        self.reveal.next_deadline()
    }

    pub fn help_mode(&self) -> bool {
        self.probe.is_active()
    }

    pub fn set_help_mode(&mut self, on: bool) {
        self.probe.set_active(on);
    }

    pub fn pointer_moved(
        &mut self,
        pointer: ScreenPosition,
        markers: &impl MarkerLookup,
    ) -> Option<HoverTarget> {
        self.probe.pointer_moved(
            pointer,
            self.catalog.points(),
            self.discovery.found(),
            markers,
        )
    }

    pub fn discovery(&self) -> &DiscoveryStore<S> {
        &self.discovery
    }
}
