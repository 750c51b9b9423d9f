//! Reveal state machine: map → starry sky → connection build → overlay.
//!
//! Every delayed step goes through an owned [`Timeline`]. A reset bumps the
//! timeline generation, so a reveal tick scheduled before the reset can never
//! reopen a connection afterwards.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::{Coordinate, Point};
use crate::constants::{DRAW_DURATION_MS, RESET_DELAY_MS, SETTLE_DELAY_MS, STEP_INTERVAL_MS};
use crate::geometry::{
    Connection, PositionLookup, ScreenPosition, Star, compute_constellation, reveal_groups, stars,
};
use crate::timeline::{Millis, Timeline};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevealPhase {
    #[default]
    Mapped,
    Transitioning,
    Starry,
    Building,
    Built,
    Resetting,
}

impl RevealPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mapped => "mapped",
            Self::Transitioning => "transitioning",
            Self::Starry => "starry",
            Self::Building => "building",
            Self::Built => "built",
            Self::Resetting => "resetting",
        }
    }

    /// Phases in which the connection list is exposed to the presentation layer.
    pub fn shows_connections(&self) -> bool {
        matches!(self, Self::Starry | Self::Building | Self::Built)
    }
}

impl fmt::Display for RevealPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map/render collaborator.
pub trait MapSurface {
    /// Current screen position of a discovered point's marker.
    fn marker_position(&self, day: u32) -> Option<ScreenPosition>;
    fn recenter(&mut self, center: Coordinate);
    fn set_surface(&mut self, opacity: f64, interactive: bool);
}

struct SurfaceLookup<'a, M: ?Sized>(&'a M);

impl<M: MapSurface + ?Sized> PositionLookup for SurfaceLookup<'_, M> {
    fn position(&self, day: u32) -> Option<ScreenPosition> {
        self.0.marker_position(day)
    }
}

/// Delays and policy for a reveal run.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevealTiming {
    pub settle_delay_ms: Millis,
    pub step_interval_ms: Millis,
    pub draw_duration_ms: Millis,
    pub reset_delay_ms: Millis,
    /// Accept a reset while connections are still being revealed.
    pub allow_reset_while_building: bool,
}

impl Default for RevealTiming {
    fn default() -> Self {
        Self {
            settle_delay_ms: SETTLE_DELAY_MS,
            step_interval_ms: STEP_INTERVAL_MS,
            draw_duration_ms: DRAW_DURATION_MS,
            reset_delay_ms: RESET_DELAY_MS,
            allow_reset_while_building: false,
        }
    }
}

/// Eased length animation for one connection.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Tween {
    from: f64,
    to: f64,
    start: Millis,
    duration: Millis,
}

impl Tween {
    fn rest(value: f64) -> Self {
        Self {
            from: value,
            to: value,
            start: 0,
            duration: 0,
        }
    }

    fn value_at(&self, now: Millis) -> f64 {
        if now <= self.start {
            return self.from;
        }
        if self.duration == 0 {
            return self.to;
        }
        let t = ((now - self.start) as f64 / self.duration as f64).clamp(0.0, 1.0);
        // Ease-out cubic: fast start, slow finish
        let eased = 1.0 - (1.0 - t).powi(3);
        self.from + (self.to - self.from) * eased
    }
}

/// A connection together with its rendered length at some instant.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ConnectionView {
    pub connection: Connection,
    pub drawn_length_px: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RevealAction {
    Settle,
    RevealGroup(usize),
    Collapse,
    Finish,
}

pub struct RevealStateMachine {
    phase: RevealPhase,
    timing: RevealTiming,
    center: Coordinate,
    timeline: Timeline<RevealAction>,
    stars: Vec<Star>,
    connections: Vec<Connection>,
    tweens: Vec<Tween>,
    groups: Vec<Vec<usize>>,
    overlay_shown: bool,
}

impl RevealStateMachine {
    pub fn new(center: Coordinate, timing: RevealTiming) -> Self {
        Self {
            phase: RevealPhase::Mapped,
            timing,
            center,
            timeline: Timeline::new(),
            stars: Vec::new(),
            connections: Vec::new(),
            tweens: Vec::new(),
            groups: Vec::new(),
            overlay_shown: false,
        }
    }

    pub fn phase(&self) -> RevealPhase {
        self.phase
    }

    pub fn timing(&self) -> &RevealTiming {
        &self.timing
    }

    /// Connections of the current run; empty outside Starry/Building/Built.
    pub fn connections(&self) -> &[Connection] {
        if self.phase.shows_connections() {
            &self.connections
        } else {
            &[]
        }
    }

    /// Stars of the current run, in day order.
    pub fn stars(&self) -> &[Star] {
        &self.stars
    }

    /// Rendered lengths at `now`. Also populated while resetting, so the
    /// collapse can be drawn.
    pub fn connection_views(&self, now: Millis) -> Vec<ConnectionView> {
        self.connections
            .iter()
            .zip(&self.tweens)
            .map(|(c, t)| ConnectionView {
                connection: *c,
                drawn_length_px: t.value_at(now),
            })
            .collect()
    }

    pub fn overlay_shown(&self) -> bool {
        self.overlay_shown
    }

    pub fn next_deadline(&self) -> Option<Millis> {
        self.timeline.next_deadline()
    }

    /// Number of reveal groups in the current run.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Start the reveal once every point has been discovered.
    pub fn request_reveal<M: MapSurface + ?Sized>(
        &mut self,
        now: Millis,
        points: &[Point],
        discovered: &BTreeSet<u32>,
        map: &mut M,
    ) -> bool {
        if self.phase != RevealPhase::Mapped {
            tracing::debug!(phase = %self.phase, "reveal request ignored");
            return false;
        }
        let missing = points.iter().filter(|p| !discovered.contains(&p.day)).count();
        if points.is_empty() || missing > 0 {
            tracing::debug!(missing, "reveal request ignored: not every day found");
            return false;
        }

        map.recenter(self.center);
        self.timeline
            .after(now, self.timing.settle_delay_ms, RevealAction::Settle);
        self.enter(RevealPhase::Transitioning);
        true
    }

    /// Begin the sequential connection reveal.
    pub fn request_build(&mut self, now: Millis) -> bool {
        if self.phase != RevealPhase::Starry {
            tracing::debug!(phase = %self.phase, "build request ignored");
            return false;
        }

        self.groups = reveal_groups(&self.connections);
        if self.groups.is_empty() {
            self.enter(RevealPhase::Built);
            return true;
        }
        for k in 0..self.groups.len() {
            let delay = self.timing.step_interval_ms.saturating_mul(k as u64);
            self.timeline.after(now, delay, RevealAction::RevealGroup(k));
        }
        self.enter(RevealPhase::Building);
        true
    }

    /// Return to the map: restore it now, collapse the drawing after a delay.
    pub fn request_reset<M: MapSurface + ?Sized>(&mut self, now: Millis, map: &mut M) -> bool {
        let accepted = match self.phase {
            RevealPhase::Starry | RevealPhase::Built => true,
            RevealPhase::Building => self.timing.allow_reset_while_building,
            _ => false,
        };
        if !accepted {
            tracing::debug!(phase = %self.phase, "reset request ignored");
            return false;
        }

        self.timeline.cancel_all();
        map.set_surface(1.0, true);
        self.overlay_shown = false;
        self.timeline
            .after(now, self.timing.reset_delay_ms, RevealAction::Collapse);
        self.enter(RevealPhase::Resetting);
        true
    }

    /// Show or hide the hidden-image overlay. Only meaningful once built.
    pub fn toggle_overlay(&mut self) -> bool {
        if self.phase != RevealPhase::Built {
            tracing::debug!(phase = %self.phase, "overlay toggle ignored");
            return false;
        }
        self.overlay_shown = !self.overlay_shown;
        true
    }

    /// Fire every task due at or before `now`, in order.
    pub fn advance<M: MapSurface + ?Sized>(
        &mut self,
        now: Millis,
        points: &[Point],
        discovered: &BTreeSet<u32>,
        map: &mut M,
    ) {
        while let Some(task) = self.timeline.pop_due(now) {
            match task.action {
                RevealAction::Settle => self.settle(points, discovered, map),
                RevealAction::RevealGroup(k) => self.reveal_group(k, task.due),
                RevealAction::Collapse => self.collapse(task.due),
                RevealAction::Finish => self.finish(),
            }
        }
    }

    fn settle<M: MapSurface + ?Sized>(
        &mut self,
        points: &[Point],
        discovered: &BTreeSet<u32>,
        map: &mut M,
    ) {
        if self.phase != RevealPhase::Transitioning {
            return;
        }
        let lookup = SurfaceLookup(&*map);
        let geometry = stars(points, discovered, &lookup).and_then(|stars| {
            compute_constellation(points, discovered, &lookup).map(|conns| (stars, conns))
        });

        match geometry {
            Ok((stars, connections)) => {
                map.set_surface(0.0, false);
                self.tweens = vec![Tween::rest(0.0); connections.len()];
                self.stars = stars;
                self.connections = connections;
                self.enter(RevealPhase::Starry);
            }
            Err(e) => {
                tracing::warn!("aborting reveal: {e}");
                self.enter(RevealPhase::Mapped);
            }
        }
    }

    fn reveal_group(&mut self, k: usize, at: Millis) {
        if self.phase != RevealPhase::Building {
            return;
        }
        let Some(group) = self.groups.get(k) else {
            return;
        };
        for &i in group {
            self.tweens[i] = Tween {
                from: 0.0,
                to: self.connections[i].length_px,
                start: at,
                duration: self.timing.draw_duration_ms,
            };
        }
        if k + 1 == self.groups.len() {
            self.enter(RevealPhase::Built);
        }
    }

    fn collapse(&mut self, at: Millis) {
        if self.phase != RevealPhase::Resetting {
            return;
        }
        for tween in &mut self.tweens {
            *tween = Tween {
                from: tween.value_at(at),
                to: 0.0,
                start: at,
                duration: self.timing.draw_duration_ms,
            };
        }
        self.timeline
            .after(at, self.timing.draw_duration_ms, RevealAction::Finish);
    }

    fn finish(&mut self) {
        if self.phase != RevealPhase::Resetting {
            return;
        }
        self.stars.clear();
        self.connections.clear();
        self.tweens.clear();
        self.groups.clear();
        self.enter(RevealPhase::Mapped);
    }

    fn enter(&mut self, phase: RevealPhase) {
        tracing::info!(from = %self.phase, to = %phase, "reveal phase change");
        self.phase = phase;
    }
}
