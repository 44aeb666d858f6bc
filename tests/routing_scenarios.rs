//! End-to-end routing scenarios on small synthetic networks.

use std::sync::Arc;

use monarch_route::ebg::turns::TurnInstruction;
use monarch_route::error::ErrorKind;
use monarch_route::geo::FixedLatLon;
use monarch_route::graph::node_based::{ImportNode, ImportWay};
use monarch_route::prepare::{prepare, ExcludableClass, PrepareConfig};
use monarch_route::profile::{CarProfile, NodeProperties, Profile, TagMap, TravelMode, WayProperties};
use monarch_route::response::{GeometryFormat, RouteGeometry, RouteOptions};
use monarch_route::restrictions::{InputRestriction, RestrictionKind, RestrictionVia};
use monarch_route::RouteEngine;

fn tags(pairs: &[(&str, &str)]) -> TagMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn node(id: i64, lat: f64, lon: f64) -> ImportNode {
    ImportNode {
        id,
        coordinate: FixedLatLon::from_degrees(lat, lon),
        tags: TagMap::default(),
    }
}

fn way(id: i64, nodes: &[i64], name: &str) -> ImportWay {
    ImportWay {
        id,
        nodes: nodes.to_vec(),
        tags: tags(&[
            ("highway", "primary"),
            ("maxspeed", "36"),
            ("name", name),
        ]),
    }
}

fn engine(
    nodes: Vec<ImportNode>,
    ways: Vec<ImportWay>,
    restrictions: Vec<InputRestriction>,
    profile: &dyn Profile,
    config: PrepareConfig,
) -> RouteEngine {
    let dataset = prepare(nodes, ways, &restrictions, profile, &config).unwrap();
    RouteEngine::new(Arc::new(dataset.into_facade()))
}

fn geometry_points(geometry: &RouteGeometry) -> usize {
    match geometry {
        RouteGeometry::GeoJson(v) => v["coordinates"].as_array().unwrap().len(),
        RouteGeometry::Encoded(s) => {
            monarch_route::polyline::decode(s, monarch_route::polyline::PolylinePrecision::Five)
                .unwrap()
                .len()
        }
        RouteGeometry::Empty => 0,
    }
}

/// ~1000 m of longitude at the equator, in degrees.
const KM_LON: f64 = 0.0089907;

#[test]
fn test_straight_line_distance_and_duration() {
    // A, B, C on a straight line, 1000 m apart, 36 km/h
    let engine = engine(
        vec![
            node(1, 0.0, 0.0),
            node(2, 0.0, KM_LON),
            node(3, 0.0, 2.0 * KM_LON),
        ],
        vec![way(100, &[1, 2, 3], "Long Road")],
        vec![],
        &CarProfile::new(),
        PrepareConfig::default(),
    );

    let options = RouteOptions {
        geometry: GeometryFormat::Geojson,
        ..Default::default()
    };
    let response = engine
        .route(
            &[
                FixedLatLon::from_degrees(0.0, 0.0),
                FixedLatLon::from_degrees(0.0, 2.0 * KM_LON),
            ],
            &options,
        )
        .unwrap();

    assert!(
        (response.summary.total_duration_s - 200.0).abs() < 0.5,
        "duration was {}",
        response.summary.total_duration_s
    );
    assert!(
        (response.summary.total_distance_m - 2000.0).abs() < 5.0,
        "distance was {}",
        response.summary.total_distance_m
    );
    // the interior node survives as geometry: three points
    assert_eq!(geometry_points(&response.geometry), 3);
    assert_eq!(response.summary.start_street_name, "Long Road");
}

/// Car profile that claims the bicycle exception class.
struct BicycleProfile {
    inner: CarProfile,
    exceptions: Vec<String>,
}

impl BicycleProfile {
    fn new() -> Self {
        Self {
            inner: CarProfile::new(),
            exceptions: vec!["bicycle".to_string()],
        }
    }
}

impl Profile for BicycleProfile {
    fn way_speed(&self, tags: &TagMap) -> Option<WayProperties> {
        self.inner.way_speed(tags)
    }
    fn node_barrier(&self, tags: &TagMap) -> NodeProperties {
        self.inner.node_barrier(tags)
    }
    fn turn_penalty(&self, angle: f64, from: TravelMode, to: TravelMode) -> u32 {
        self.inner.turn_penalty(angle, from, to)
    }
    fn u_turn_penalty(&self) -> Option<u32> {
        self.inner.u_turn_penalty()
    }
    fn traffic_signal_penalty(&self) -> u32 {
        self.inner.traffic_signal_penalty()
    }
    fn exceptions(&self) -> &[String] {
        &self.exceptions
    }
    fn use_turn_restrictions(&self) -> bool {
        true
    }
}

#[test]
fn test_no_restriction_blocks_route() {
    let build = |profile: &dyn Profile| {
        engine(
            vec![
                node(1, 0.0, 0.0),
                node(2, 0.0, KM_LON),
                node(3, 0.0, 2.0 * KM_LON),
            ],
            vec![way(100, &[1, 2], "West Leg"), way(101, &[2, 3], "East Leg")],
            vec![InputRestriction {
                kind: RestrictionKind::No,
                from_way: 100,
                via: RestrictionVia::Node(2),
                to_way: 101,
                exceptions: vec!["bicycle".to_string()],
            }],
            profile,
            PrepareConfig::default(),
        )
    };
    let coordinates = [
        FixedLatLon::from_degrees(0.0, 0.0),
        FixedLatLon::from_degrees(0.0, 2.0 * KM_LON),
    ];

    // the restriction applies to cars: no route
    let car = build(&CarProfile::new());
    let result = car.route(&coordinates, &RouteOptions::default());
    assert!(matches!(result, Err(ErrorKind::NoRoute)), "{result:?}");

    // the bicycle class is excepted: route exists
    let bike = build(&BicycleProfile::new());
    let response = bike.route(&coordinates, &RouteOptions::default()).unwrap();
    assert!((response.summary.total_duration_s - 200.0).abs() < 1.0);
}

#[test]
fn test_rectangle_takes_diagonal_and_contracts_shortcuts() {
    // rectangle A-B-C-D with both diagonals
    let a = node(1, 0.0, 0.0);
    let b = node(2, 0.0, KM_LON);
    let c = node(3, 0.6 * KM_LON, KM_LON);
    let d = node(4, 0.6 * KM_LON, 0.0);
    let dataset = prepare(
        vec![a, b, c, d],
        vec![
            way(100, &[1, 2], "North"),
            way(101, &[2, 3], "East"),
            way(102, &[3, 4], "South"),
            way(103, &[4, 1], "West"),
            way(104, &[1, 3], "Diagonal AC"),
            way(105, &[2, 4], "Diagonal BD"),
        ],
        &[],
        &CarProfile::new(),
        &PrepareConfig::default(),
    )
    .unwrap();

    let shortcut_count = (0..dataset.query_graph.edge_count() as u32)
        .filter(|&e| dataset.query_graph.edge(e).shortcut)
        .count();
    assert!(shortcut_count >= 1, "contraction produced no shortcuts");

    let engine = RouteEngine::new(Arc::new(dataset.into_facade()));
    let response = engine
        .route(
            &[
                FixedLatLon::from_degrees(0.0, 0.0),
                FixedLatLon::from_degrees(0.6 * KM_LON, KM_LON),
            ],
            &RouteOptions::default(),
        )
        .unwrap();

    // the diagonal is ~1166 m; any way around the rectangle is >= 1600 m
    assert!(
        response.summary.total_distance_m < 1300.0,
        "route did not take the diagonal: {} m",
        response.summary.total_distance_m
    );
}

/// Profile without u-turn edges, so turning around mid-route is not an
/// option.
struct NoUturnProfile(CarProfile);

impl Profile for NoUturnProfile {
    fn way_speed(&self, tags: &TagMap) -> Option<WayProperties> {
        self.0.way_speed(tags)
    }
    fn node_barrier(&self, tags: &TagMap) -> NodeProperties {
        self.0.node_barrier(tags)
    }
    fn turn_penalty(&self, angle: f64, from: TravelMode, to: TravelMode) -> u32 {
        self.0.turn_penalty(angle, from, to)
    }
    fn u_turn_penalty(&self) -> Option<u32> {
        None
    }
    fn traffic_signal_penalty(&self) -> u32 {
        self.0.traffic_signal_penalty()
    }
    fn exceptions(&self) -> &[String] {
        self.0.exceptions()
    }
    fn use_turn_restrictions(&self) -> bool {
        true
    }
}

fn block_engine() -> RouteEngine {
    // main street A-B with a block B-C-D-A around the back
    engine(
        vec![
            node(1, 0.0, 0.0),
            node(2, 0.0, KM_LON),
            node(3, 0.3 * KM_LON, KM_LON),
            node(4, 0.3 * KM_LON, 0.0),
        ],
        vec![
            way(100, &[1, 2], "Main"),
            way(101, &[2, 3], "East Side"),
            way(102, &[3, 4], "Back"),
            way(103, &[4, 1], "West Side"),
        ],
        vec![],
        &NoUturnProfile(CarProfile::new()),
        PrepareConfig::default(),
    )
}

#[test]
fn test_same_edge_reversed_offsets_with_uturn() {
    let engine = block_engine();
    let response = engine
        .route(
            &[
                FixedLatLon::from_degrees(0.0, 0.8 * KM_LON),
                FixedLatLon::from_degrees(0.0, 0.2 * KM_LON),
            ],
            &RouteOptions {
                uturn_allowed: vec![true],
                ..Default::default()
            },
        )
        .unwrap();

    assert!(
        (response.summary.total_duration_s - 60.0).abs() < 1.0,
        "duration was {}",
        response.summary.total_duration_s
    );
    assert!((response.summary.total_distance_m - 600.0).abs() < 10.0);
    assert!(
        response
            .instructions
            .iter()
            .any(|i| i.instruction == TurnInstruction::UTurn as u8),
        "expected a u-turn instruction"
    );
}

#[test]
fn test_same_edge_reversed_offsets_without_uturn_goes_around() {
    let engine = block_engine();
    let response = engine
        .route(
            &[
                FixedLatLon::from_degrees(0.0, 0.8 * KM_LON),
                FixedLatLon::from_degrees(0.0, 0.2 * KM_LON),
            ],
            &RouteOptions::default(),
        )
        .unwrap();

    // around the block: 200 m + 300 + 1000 + 300 + 200
    assert!(
        response.summary.total_distance_m > 1900.0,
        "route cheated with {} m",
        response.summary.total_distance_m
    );
    assert!(!response
        .instructions
        .iter()
        .any(|i| i.instruction == TurnInstruction::UTurn as u8));
}

#[test]
fn test_same_edge_forward_offsets_is_direct_subsegment() {
    let engine = block_engine();
    let response = engine
        .route(
            &[
                FixedLatLon::from_degrees(0.0, 0.2 * KM_LON),
                FixedLatLon::from_degrees(0.0, 0.8 * KM_LON),
            ],
            &RouteOptions {
                geometry: GeometryFormat::Geojson,
                ..Default::default()
            },
        )
        .unwrap();

    assert!((response.summary.total_duration_s - 60.0).abs() < 1.0);
    assert!((response.summary.total_distance_m - 600.0).abs() < 10.0);
    // direct sub-segment: just the two snapped endpoints
    assert_eq!(geometry_points(&response.geometry), 2);
}

#[test]
fn test_single_coordinate_is_no_route() {
    let engine = block_engine();
    let result = engine.route(
        &[FixedLatLon::from_degrees(0.0, 0.0)],
        &RouteOptions::default(),
    );
    assert!(matches!(result, Err(ErrorKind::NoRoute)));
}

#[test]
fn test_far_away_coordinate_is_no_segment() {
    let engine = block_engine();
    let result = engine.route(
        &[
            FixedLatLon::from_degrees(0.0, 0.0),
            FixedLatLon::from_degrees(45.0, 90.0),
        ],
        &RouteOptions::default(),
    );
    assert!(matches!(result, Err(ErrorKind::NoSegment { index: 1 })));
}

#[test]
fn test_zero_speed_override_makes_no_route() {
    use std::io::Write;
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("closures.csv");
    let mut f = std::fs::File::create(&csv).unwrap();
    // close the middle segment in both directions
    writeln!(f, "2,3,0,roadworks").unwrap();
    writeln!(f, "3,2,0,roadworks").unwrap();
    drop(f);

    let engine = engine(
        vec![
            node(1, 0.0, 0.0),
            node(2, 0.0, KM_LON),
            node(3, 0.0, 2.0 * KM_LON),
            node(4, 0.0, 3.0 * KM_LON),
        ],
        vec![
            way(100, &[1, 2], "West"),
            way(101, &[2, 3], "Middle"),
            way(102, &[3, 4], "East"),
        ],
        vec![],
        &CarProfile::new(),
        PrepareConfig {
            speed_files: vec![csv],
            ..Default::default()
        },
    );

    let result = engine.route(
        &[
            FixedLatLon::from_degrees(0.0, 0.5 * KM_LON),
            FixedLatLon::from_degrees(0.0, 2.5 * KM_LON),
        ],
        &RouteOptions::default(),
    );
    assert!(matches!(result, Err(ErrorKind::NoRoute)), "{result:?}");
}

#[test]
fn test_via_point_inserts_marker() {
    let engine = block_engine();
    let response = engine
        .route(
            &[
                FixedLatLon::from_degrees(0.0, 0.1 * KM_LON),
                FixedLatLon::from_degrees(0.0, 0.5 * KM_LON),
                FixedLatLon::from_degrees(0.0, 0.9 * KM_LON),
            ],
            &RouteOptions::default(),
        )
        .unwrap();

    assert!(response
        .instructions
        .iter()
        .any(|i| i.instruction == TurnInstruction::ReachViaLocation as u8));
    assert!((response.summary.total_duration_s - 80.0).abs() < 2.0);
}

#[test]
fn test_hints_survive_a_round_trip() {
    let engine = block_engine();
    let coordinates = [
        FixedLatLon::from_degrees(0.0, 0.2 * KM_LON),
        FixedLatLon::from_degrees(0.0, 0.8 * KM_LON),
    ];
    let first = engine.route(&coordinates, &RouteOptions::default()).unwrap();
    assert_eq!(first.hints.len(), 2);

    let second = engine
        .route(
            &coordinates,
            &RouteOptions {
                hints: first.hints.iter().cloned().map(Some).collect(),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(
        first.summary.total_duration_s,
        second.summary.total_duration_s
    );
}

#[test]
fn test_excluded_ferry_metric() {
    let mut ferry_way = ImportWay {
        id: 101,
        nodes: vec![2, 3],
        tags: tags(&[("route", "ferry"), ("name", "Crossing")]),
    };
    ferry_way.tags.insert("maxspeed".to_string(), "10".to_string());

    let engine = engine(
        vec![
            node(1, 0.0, 0.0),
            node(2, 0.0, KM_LON),
            node(3, 0.0, 2.0 * KM_LON),
            node(4, 0.0, 3.0 * KM_LON),
        ],
        vec![
            way(100, &[1, 2], "To The Dock"),
            ferry_way,
            way(102, &[3, 4], "From The Dock"),
        ],
        vec![],
        &CarProfile::new(),
        PrepareConfig {
            excludes: vec![ExcludableClass::Ferry],
            ..Default::default()
        },
    );

    let coordinates = [
        FixedLatLon::from_degrees(0.0, 0.5 * KM_LON),
        FixedLatLon::from_degrees(0.0, 2.5 * KM_LON),
    ];
    // the base metric crosses the ferry
    let with_ferry = engine
        .route(&coordinates, &RouteOptions::default())
        .unwrap();
    assert!(with_ferry.summary.total_duration_s > 0.0);

    // the ferry-free metric has nowhere to go
    let without = engine.route(
        &coordinates,
        &RouteOptions {
            metric: 1,
            ..Default::default()
        },
    );
    assert!(matches!(without, Err(ErrorKind::NoRoute)), "{without:?}");
}
