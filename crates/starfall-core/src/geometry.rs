//! Screen-space constellation geometry.
//!
//! Turns the screen positions of discovered points into an ordered list of
//! connections. All math happens after projection; nothing here knows about
//! latitude or longitude.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::catalog::{Point, chain_order, successors};
use crate::error::IncompleteGeometryError;

/// Pixel position of a rendered marker.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScreenPosition {
    pub x: f64,
    pub y: f64,
}

impl ScreenPosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Self) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Angle of the vector from `self` to `other`, in degrees.
    /// Screen y grows downward, so positive angles turn clockwise.
    pub fn angle_to(self, other: Self) -> f64 {
        (other.y - self.y).atan2(other.x - self.x).to_degrees()
    }
}

/// Source of live marker positions, keyed by day.
pub trait PositionLookup {
    fn position(&self, day: u32) -> Option<ScreenPosition>;
}

impl PositionLookup for HashMap<u32, ScreenPosition> {
    fn position(&self, day: u32) -> Option<ScreenPosition> {
        self.get(&day).copied()
    }
}

impl PositionLookup for BTreeMap<u32, ScreenPosition> {
    fn position(&self, day: u32) -> Option<ScreenPosition> {
        self.get(&day).copied()
    }
}

/// A drawn edge between two stars.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub from_day: u32,
    pub to_day: u32,
    pub length_px: f64,
    pub angle_deg: f64,
    /// Reveal order. Connections sharing an index animate together.
    pub sequence_index: usize,
}

/// A star on the starry background: a discovered point at its screen position.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Star {
    pub day: u32,
    pub position: ScreenPosition,
}

/// Stars for every discovered point, in day order.
pub fn stars(
    points: &[Point],
    discovered: &BTreeSet<u32>,
    positions: &impl PositionLookup,
) -> Result<Vec<Star>, IncompleteGeometryError> {
    let mut stars = Vec::new();
    for p in points.iter().filter(|p| discovered.contains(&p.day)) {
        let position = positions
            .position(p.day)
            .ok_or(IncompleteGeometryError { day: p.day })?;
        stars.push(Star {
            day: p.day,
            position,
        });
    }
    stars.sort_by_key(|s| s.day);
    Ok(stars)
}

/// Build the connection list for the discovered subset of `points`.
///
/// Fails if any discovered point has no screen position. Output order is
/// chain order, so `sequence_index` never decreases.
pub fn compute_constellation(
    points: &[Point],
    discovered: &BTreeSet<u32>,
    positions: &impl PositionLookup,
) -> Result<Vec<Connection>, IncompleteGeometryError> {
    let mut located: HashMap<u32, ScreenPosition> = HashMap::new();
    let mut active = Vec::new();
    for p in points.iter().filter(|p| discovered.contains(&p.day)) {
        let pos = positions
            .position(p.day)
            .ok_or(IncompleteGeometryError { day: p.day })?;
        located.insert(p.day, pos);
        active.push(p);
    }

    let sorted = chain_order(active);

    // Rank of each distinct edge index; equals edge_index - min for a gap-free chain.
    let mut rank: BTreeMap<i32, usize> = BTreeMap::new();
    for p in &sorted {
        let next = rank.len();
        rank.entry(p.edge_index).or_insert(next);
    }

    let mut connections = Vec::new();
    for (pos, from) in sorted.iter().enumerate() {
        let start = located[&from.day];
        let sequence_index = rank[&from.edge_index];
        for to in successors(&sorted, pos) {
            let end = located[&to.day];
            connections.push(Connection {
                from_day: from.day,
                to_day: to.day,
                length_px: start.distance(end),
                angle_deg: start.angle_to(end),
                sequence_index,
            });
        }
    }

    Ok(connections)
}

/// Group connection indices by `sequence_index`, ascending.
pub fn reveal_groups(connections: &[Connection]) -> Vec<Vec<usize>> {
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, c) in connections.iter().enumerate() {
        groups.entry(c.sequence_index).or_default().push(i);
    }
    groups.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Placement;
    use approx::assert_relative_eq;

    fn at(day: u32, edge: i32) -> Point {
        Point::new(day, Placement::OffsetFromCenter { dlat: 0.0, dlon: 0.0 }, edge)
    }

    fn positions(entries: &[(u32, f64, f64)]) -> HashMap<u32, ScreenPosition> {
        entries
            .iter()
            .map(|&(d, x, y)| (d, ScreenPosition::new(x, y)))
            .collect()
    }

    fn all(days: &[u32]) -> BTreeSet<u32> {
        days.iter().copied().collect()
    }

    #[test]
    fn test_three_point_loop() {
        let points = [at(1, 0), at(2, 1), at(3, 2)];
        let pos = positions(&[(1, 0.0, 0.0), (2, 3.0, 4.0), (3, 3.0, 0.0)]);
        let conns = compute_constellation(&points, &all(&[1, 2, 3]), &pos).unwrap();

        let pairs: Vec<(u32, u32, usize)> = conns
            .iter()
            .map(|c| (c.from_day, c.to_day, c.sequence_index))
            .collect();
        assert_eq!(pairs, vec![(1, 2, 0), (2, 3, 1), (3, 1, 2)]);

        assert_relative_eq!(conns[0].length_px, 5.0);
        assert_relative_eq!(conns[1].length_px, 4.0);
        assert_relative_eq!(conns[1].angle_deg, -90.0);
        assert_relative_eq!(conns[2].angle_deg, 180.0);
    }

    #[test]
    fn test_missing_position_is_incomplete() {
        let points = [at(1, 0), at(2, 1)];
        let pos = positions(&[(1, 0.0, 0.0)]);
        let err = compute_constellation(&points, &all(&[1, 2]), &pos).unwrap_err();
        assert_eq!(err, IncompleteGeometryError { day: 2 });
    }

    #[test]
    fn test_undiscovered_points_are_skipped() {
        let points = [at(1, 0), at(2, 1), at(3, 2)];
        // Day 2 has no position but is not discovered, so it is never asked for.
        let pos = positions(&[(1, 0.0, 0.0), (3, 10.0, 0.0)]);
        let conns = compute_constellation(&points, &all(&[1, 3]), &pos).unwrap();
        // 1 has no edge-1 successor in the subset; 3 is last and closes onto 1.
        assert_eq!(conns.len(), 1);
        assert_eq!((conns[0].from_day, conns[0].to_day), (3, 1));
        assert_eq!(conns[0].sequence_index, 1);
    }

    #[test]
    fn test_branch_fork_animates_concurrently() {
        let points = [
            at(1, 0),
            at(2, 1).with_branch(1),
            at(3, 1).with_branch(2),
            at(4, 2).with_branch(1),
            at(5, 2).with_branch(2),
            at(6, 3),
        ];
        let pos = positions(&[
            (1, 0.0, 0.0),
            (2, 10.0, -10.0),
            (3, 10.0, 10.0),
            (4, 20.0, -10.0),
            (5, 20.0, 10.0),
            (6, 30.0, 0.0),
        ]);
        let conns = compute_constellation(&points, &all(&[1, 2, 3, 4, 5, 6]), &pos).unwrap();
        let pairs: Vec<(u32, u32, usize)> = conns
            .iter()
            .map(|c| (c.from_day, c.to_day, c.sequence_index))
            .collect();
        assert_eq!(
            pairs,
            vec![
                (1, 2, 0),
                (1, 3, 0),
                (2, 4, 1),
                (3, 5, 1),
                (4, 6, 2),
                (5, 6, 2),
                (6, 1, 3),
            ]
        );

        let groups = reveal_groups(&conns);
        assert_eq!(groups, vec![vec![0, 1], vec![2, 3], vec![4, 5], vec![6]]);
    }

    #[test]
    fn test_deterministic_output() {
        let points = [at(4, 3), at(1, 0), at(3, 2), at(2, 1)];
        let pos = positions(&[(1, 1.0, 2.0), (2, 5.0, 9.0), (3, -4.0, 7.5), (4, 0.5, 0.5)]);
        let days = all(&[1, 2, 3, 4]);
        let first = compute_constellation(&points, &days, &pos).unwrap();
        for _ in 0..5 {
            assert_eq!(compute_constellation(&points, &days, &pos).unwrap(), first);
        }
    }

    #[test]
    fn test_single_point_loops_to_itself() {
        let points = [at(7, 0)];
        let pos = positions(&[(7, 5.0, 5.0)]);
        let conns = compute_constellation(&points, &all(&[7]), &pos).unwrap();
        assert_eq!(conns.len(), 1);
        assert_eq!((conns[0].from_day, conns[0].to_day), (7, 7));
        assert_relative_eq!(conns[0].length_px, 0.0);
    }

    #[test]
    fn test_nothing_discovered_yields_nothing() {
        let points = [at(1, 0), at(2, 1)];
        let conns = compute_constellation(&points, &BTreeSet::new(), &HashMap::new()).unwrap();
        assert!(conns.is_empty());
    }

    #[test]
    fn test_stars_in_day_order() {
        let points = [at(2, 0), at(1, 1)];
        let pos = positions(&[(1, 1.0, 1.0), (2, 2.0, 2.0)]);
        let stars = stars(&points, &all(&[1, 2]), &pos).unwrap();
        assert_eq!(stars.iter().map(|s| s.day).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_angle_quadrants() {
        let o = ScreenPosition::new(100.0, 100.0);
        assert_relative_eq!(o.angle_to(ScreenPosition::new(150.0, 100.0)), 0.0);
        assert_relative_eq!(o.angle_to(ScreenPosition::new(100.0, 150.0)), 90.0);
        assert_relative_eq!(o.angle_to(ScreenPosition::new(50.0, 100.0)), 180.0);
        assert_relative_eq!(o.angle_to(ScreenPosition::new(100.0, 50.0)), -90.0);
    }
}
