//! Calendar gating: which days of the season are open for discovery.
//!
//! Uses Howard Hinnant's civil_from_days algorithm for Unix-to-date
//! conversion (no chrono dependency).

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Current UTC time as Unix seconds.
pub fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// A UTC calendar date.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct CivilDate {
    pub year: i64,
    pub month: u32,
    pub day: u32,
}

impl CivilDate {
    pub fn new(year: i64, month: u32, day: u32) -> Self {
        Self { year, month, day }
    }

    pub fn from_unix_secs(secs: u64) -> Self {
        let (year, month, day) = civil_from_days((secs / 86400) as i64);
        Self {
            year,
            month: month as u32,
            day: day as u32,
        }
    }

    pub fn today() -> Self {
        Self::from_unix_secs(now_unix_secs())
    }
}

/// Howard Hinnant's civil_from_days: Unix epoch days → (year, month, day).
fn civil_from_days(days: i64) -> (i64, u64, u64) {
    let z = days + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d)
}

/// The month in which one point opens per day.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Season {
    pub year: i64,
    pub month: u32,
    /// Highest day that ever opens.
    pub last_day: u32,
}

impl Default for Season {
    fn default() -> Self {
        Self {
            year: 2023,
            month: 12,
            last_day: 24,
        }
    }
}

impl Season {
    /// Highest day open on `today`: nothing before the season, one day per
    /// calendar day during it, everything afterwards.
    pub fn available_through(&self, today: CivilDate) -> u32 {
        let started = (today.year, today.month) >= (self.year, self.month);
        if !started {
            return 0;
        }
        if (today.year, today.month) == (self.year, self.month) {
            today.day.min(self.last_day)
        } else {
            self.last_day
        }
    }

    pub fn is_open(&self, day: u32, today: CivilDate) -> bool {
        day <= self.available_through(today)
    }
}
