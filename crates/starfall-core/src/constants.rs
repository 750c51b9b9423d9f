/// Key under which the discovered-day list is persisted.
pub const DAYS_FOUND_KEY: &str = "DAYS_FOUND";

/// Time the camera needs to finish recentering before the map fades out (ms).
pub const SETTLE_DELAY_MS: u64 = 1000;

/// Interval between successive connection groups while building (ms).
pub const STEP_INTERVAL_MS: u64 = 1000;

/// Duration of a single connection's grow/collapse tween (ms).
pub const DRAW_DURATION_MS: u64 = 400;

/// Delay between a reset request and the collapse of all connections (ms).
pub const RESET_DELAY_MS: u64 = 500;

/// Default zoom level for the map collaborator.
pub const DEFAULT_ZOOM: u8 = 12;

/// Day labels sit this far above their marker (px).
pub const LABEL_RISE_PX: f64 = 30.0;

/// Left shift of a day label, for one-digit and longer day numbers (px).
pub const LABEL_SHIFT_SHORT_PX: f64 = 30.0;
pub const LABEL_SHIFT_LONG_PX: f64 = 50.0;
