use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Geographic coordinate in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Where a point sits on the map: either absolute, or relative to the
/// configured default center.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    LatLon(Coordinate),
    OffsetFromCenter { dlat: f64, dlon: f64 },
}

impl Placement {
    pub fn resolve(self, center: Coordinate) -> Coordinate {
        match self {
            Self::LatLon(c) => c,
            Self::OffsetFromCenter { dlat, dlon } => {
                Coordinate::new(center.lat + dlat, center.lon + dlon)
            }
        }
    }
}

/// One day's discoverable location plus its place in the constellation chain.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub day: u32,
    pub placement: Placement,
    pub edge_index: i32,
    #[serde(default)]
    pub branch_index: Option<u32>,
}

impl Point {
    pub fn new(day: u32, placement: Placement, edge_index: i32) -> Self {
        Self {
            day,
            placement,
            edge_index,
            branch_index: None,
        }
    }

    pub fn with_branch(mut self, branch_index: u32) -> Self {
        self.branch_index = Some(branch_index);
        self
    }
}

/// Two points may be chained unless both carry a branch index and the
/// indices differ.
pub fn branch_compatible(from: &Point, to: &Point) -> bool {
    match (from.branch_index, to.branch_index) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}

/// Stable chain order: edge index ascending, ties broken by day.
pub fn chain_order<'a>(points: impl IntoIterator<Item = &'a Point>) -> Vec<&'a Point> {
    let mut sorted: Vec<&Point> = points.into_iter().collect();
    sorted.sort_by_key(|p| (p.edge_index, p.day));
    sorted
}

/// Successors of `sorted[pos]` within an already chain-ordered slice.
/// The last point closes the loop onto the first point at the minimum edge index.
pub fn successors<'a>(sorted: &[&'a Point], pos: usize) -> Vec<&'a Point> {
    let Some(from) = sorted.get(pos) else {
        return Vec::new();
    };
    if pos + 1 == sorted.len() {
        return sorted.first().copied().into_iter().collect();
    }
    sorted
        .iter()
        .filter(|s| s.edge_index == from.edge_index + 1 && branch_compatible(from, s))
        .copied()
        .collect()
}

/// Immutable, validated registry of every point in the constellation.
#[derive(Clone, Debug)]
pub struct PointCatalog {
    points: Vec<Point>,
}

impl PointCatalog {
    /// Validate and build a catalog. Points are stored in day order.
    pub fn new(mut points: Vec<Point>) -> Result<Self, ConfigurationError> {
        if points.is_empty() {
            return Err(ConfigurationError::EmptyCatalog);
        }

        let mut seen = HashSet::new();
        for p in &points {
            if p.day == 0 {
                return Err(ConfigurationError::InvalidDay(p.day));
            }
            if !seen.insert(p.day) {
                return Err(ConfigurationError::DuplicateDay(p.day));
            }
        }

        let mut by_edge: BTreeMap<i32, Vec<&Point>> = BTreeMap::new();
        for p in &points {
            by_edge.entry(p.edge_index).or_default().push(p);
        }

        let edges: Vec<i32> = by_edge.keys().copied().collect();
        for pair in edges.windows(2) {
            if pair[1] != pair[0] + 1 {
                return Err(ConfigurationError::EdgeIndexGap {
                    after: pair[0],
                    next: pair[1],
                });
            }
        }

        for (edge_index, group) in &by_edge {
            if group.len() < 2 {
                continue;
            }
            let branches: HashSet<Option<u32>> = group.iter().map(|p| p.branch_index).collect();
            if branches.contains(&None) || branches.len() != group.len() {
                return Err(ConfigurationError::AmbiguousBranch {
                    edge_index: *edge_index,
                });
            }
        }

        let sorted = chain_order(&points);
        for pos in 0..sorted.len() {
            if successors(&sorted, pos).is_empty() {
                return Err(ConfigurationError::MissingSuccessor {
                    day: sorted[pos].day,
                });
            }
        }

        points.sort_by_key(|p| p.day);
        Ok(Self { points })
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn get(&self, day: u32) -> Option<&Point> {
        self.points
            .binary_search_by_key(&day, |p| p.day)
            .ok()
            .map(|i| &self.points[i])
    }

    pub fn contains(&self, day: u32) -> bool {
        self.get(day).is_some()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn days(&self) -> impl Iterator<Item = u32> + '_ {
        self.points.iter().map(|p| p.day)
    }
}
