//! Starfall constellation reveal engine.
//!
//! Tracks which days have been discovered, turns the discovered points into a
//! screen-space constellation (stars plus ordered connections), and sequences
//! the map → starry sky → build → overlay reveal on an explicit timeline.
//!
//! Zero I/O: the map and the persistence backend are supplied through traits,
//! and the clock is a plain millisecond value passed in by the caller.

pub mod catalog;
pub mod constants;
pub mod discovery;
pub mod error;
pub mod geometry;
pub mod hover;
pub mod overlay;
pub mod reveal;
pub mod season;
pub mod session;
pub mod timeline;

pub use catalog::{Coordinate, Placement, Point, PointCatalog, branch_compatible};
pub use constants::{
    DAYS_FOUND_KEY, DEFAULT_ZOOM, DRAW_DURATION_MS, LABEL_RISE_PX, LABEL_SHIFT_LONG_PX,
    LABEL_SHIFT_SHORT_PX, RESET_DELAY_MS, SETTLE_DELAY_MS, STEP_INTERVAL_MS,
};
pub use discovery::{DiscoveryStore, KeyValueStore, MemoryKv, decode_days, encode_days};
pub use error::{ConfigurationError, IncompleteGeometryError, PersistenceError};
pub use geometry::{
    Connection, PositionLookup, ScreenPosition, Star, compute_constellation, reveal_groups, stars,
};
pub use hover::{HoverProbe, HoverTarget, MarkerLabel, MarkerLookup, nearest_undiscovered};
pub use overlay::{OverlayAnchor, OverlayFrame};
pub use reveal::{ConnectionView, MapSurface, RevealPhase, RevealStateMachine, RevealTiming};
pub use season::{CivilDate, Season, now_unix_secs};
pub use session::{Progress, Session, SessionSettings};
pub use timeline::{Millis, Timeline};
