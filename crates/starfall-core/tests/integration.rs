//! Integration tests across the engine: discovery → geometry → reveal.

use std::collections::{BTreeSet, HashMap};

use proptest::prelude::*;
use starfall_core::{
    CivilDate, Coordinate, DAYS_FOUND_KEY, DiscoveryStore, KeyValueStore, MapSurface, MemoryKv,
    OverlayAnchor, Placement, Point, PointCatalog, RevealPhase, RevealTiming, ScreenPosition,
    Season, Session, SessionSettings, compute_constellation,
};

fn ring(n: u32) -> Vec<Point> {
    (1..=n)
        .map(|d| {
            Point::new(
                d,
                Placement::OffsetFromCenter {
                    dlat: d as f64 * 0.001,
                    dlon: 0.0,
                },
                d as i32 - 1,
            )
        })
        .collect()
}

fn ring_positions(n: u32) -> HashMap<u32, ScreenPosition> {
    (1..=n)
        .map(|d| {
            let theta = d as f64 / n as f64 * std::f64::consts::TAU;
            (d, ScreenPosition::new(400.0 + 200.0 * theta.cos(), 300.0 + 200.0 * theta.sin()))
        })
        .collect()
}

struct Screen {
    positions: HashMap<u32, ScreenPosition>,
}

impl MapSurface for Screen {
    fn marker_position(&self, day: u32) -> Option<ScreenPosition> {
        self.positions.get(&day).copied()
    }
    fn recenter(&mut self, _center: Coordinate) {}
    fn set_surface(&mut self, _opacity: f64, _interactive: bool) {}
}

/// Scenario A: three unbranched points make a closed triangle.
#[test]
fn three_points_make_three_connections() {
    let points = ring(3);
    let conns =
        compute_constellation(&points, &BTreeSet::from([1, 2, 3]), &ring_positions(3)).unwrap();
    let shape: Vec<(u32, u32, usize)> = conns
        .iter()
        .map(|c| (c.from_day, c.to_day, c.sequence_index))
        .collect();
    assert_eq!(shape, vec![(1, 2, 0), (2, 3, 1), (3, 1, 2)]);
}

/// Scenario D: duplicates in persisted state collapse.
#[test]
fn persisted_duplicates_collapse() {
    let store = DiscoveryStore::open(MemoryKv::with_entry(DAYS_FOUND_KEY, "[1,2,2,3]"));
    assert_eq!(store.load(), BTreeSet::from([1, 2, 3]));
}

/// Scenario C: a reveal request while building changes nothing.
#[test]
fn reveal_request_while_building_is_noop() {
    let settings = SessionSettings {
        center: Coordinate::new(-27.43, 153.03),
        season: Season {
            year: 2023,
            month: 12,
            last_day: 24,
        },
        timing: RevealTiming::default(),
        overlay: OverlayAnchor::default(),
    };
    let catalog = PointCatalog::new(ring(24)).unwrap();
    let mut session =
        Session::new(catalog, settings, MemoryKv::new(), CivilDate::new(2024, 1, 1)).unwrap();
    for d in 1..=24 {
        session.mark_discovered(d);
    }
    let mut screen = Screen {
        positions: ring_positions(24),
    };

    assert!(session.request_reveal(0, &mut screen));
    session.advance(5_000, &mut screen);
    assert!(session.request_build(5_000));
    session.advance(6_000, &mut screen);
    assert_eq!(session.phase(), RevealPhase::Building);

    assert!(!session.request_reveal(6_000, &mut screen));
    assert_eq!(session.phase(), RevealPhase::Building);
}

#[test]
fn full_ring_is_a_single_cycle() {
    let n = 24;
    let conns = compute_constellation(
        &ring(n),
        &(1..=n).collect::<BTreeSet<u32>>(),
        &ring_positions(n),
    )
    .unwrap();
    assert_eq!(conns.len(), n as usize);

    let next: HashMap<u32, u32> = conns.iter().map(|c| (c.from_day, c.to_day)).collect();
    let mut visited = BTreeSet::new();
    let mut day = 1;
    for _ in 0..n {
        assert!(visited.insert(day), "day {day} visited twice");
        day = next[&day];
    }
    assert_eq!(day, 1, "chain must return to its start");
    assert_eq!(visited.len(), n as usize);
}

proptest! {
    #[test]
    fn discovery_order_and_duplicates_do_not_matter(
        days in proptest::collection::vec(1u32..=25, 0..60)
    ) {
        let mut store = DiscoveryStore::open(MemoryKv::new());
        let mut sizes = Vec::new();
        for d in &days {
            sizes.push(store.mark_found(*d).len());
        }
        prop_assert!(sizes.windows(2).all(|w| w[0] <= w[1]), "set shrank: {sizes:?}");

        let expected: BTreeSet<u32> = days.iter().copied().collect();
        let reopened = DiscoveryStore::open(store.into_backend());
        prop_assert_eq!(reopened.load(), expected);
    }

    #[test]
    fn geometry_is_deterministic(
        coords in proptest::collection::vec((-1000.0f64..1000.0, -1000.0f64..1000.0), 1..25),
        mask in proptest::collection::vec(any::<bool>(), 25)
    ) {
        let n = coords.len() as u32;
        let points = ring(n);
        let positions: HashMap<u32, ScreenPosition> = coords
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| (i as u32 + 1, ScreenPosition::new(x, y)))
            .collect();
        let discovered: BTreeSet<u32> = (1..=n).filter(|d| mask[*d as usize - 1]).collect();

        let a = compute_constellation(&points, &discovered, &positions).unwrap();
        let b = compute_constellation(&points, &discovered, &positions).unwrap();
        prop_assert_eq!(&a, &b);
        prop_assert!(a.windows(2).all(|w| w[0].sequence_index <= w[1].sequence_index));
        for c in &a {
            prop_assert!(c.length_px >= 0.0);
            prop_assert!((-180.0..=180.0).contains(&c.angle_deg));
        }
    }
}

#[test]
fn reopened_backend_sees_every_write() {
    let mut kv = MemoryKv::new();
    kv.write(DAYS_FOUND_KEY, "[5]").unwrap();
    let mut store = DiscoveryStore::open(kv);
    store.mark_found(6);
    let backend = store.into_backend();
    assert_eq!(
        backend.read(DAYS_FOUND_KEY).unwrap().as_deref(),
        Some("[5,6]")
    );
}
