//! Routing profile contract
//!
//! The engine consumes a profile as a bundle of pure callbacks: per-way
//! speeds and classification, per-node barrier/signal detection, the turn
//! cost function, and restriction exceptions. Implementations may be
//! hand-written (like [`CarProfile`]) or generated from a scripted profile
//! ahead of time; the engine only depends on this trait and may call it
//! from multiple threads.

use rustc_hash::FxHashMap;

/// Raw key/value tags of a way or node from the source dataset.
pub type TagMap = FxHashMap<String, String>;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum TravelMode {
    Inaccessible = 0,
    Driving = 1,
    Cycling = 2,
    Walking = 3,
    Ferry = 4,
}

impl TravelMode {
    pub fn from_u8(v: u8) -> Option<TravelMode> {
        match v {
            0 => Some(TravelMode::Inaccessible),
            1 => Some(TravelMode::Driving),
            2 => Some(TravelMode::Cycling),
            3 => Some(TravelMode::Walking),
            4 => Some(TravelMode::Ferry),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TravelMode::Inaccessible => "inaccessible",
            TravelMode::Driving => "driving",
            TravelMode::Cycling => "cycling",
            TravelMode::Walking => "walking",
            TravelMode::Ferry => "ferry",
        }
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RoadClass {
    Motorway = 0,
    MotorwayLink = 1,
    Trunk = 2,
    TrunkLink = 3,
    Primary = 4,
    Secondary = 5,
    Tertiary = 6,
    Residential = 7,
    LivingStreet = 8,
    Service = 9,
    Track = 10,
    Ferry = 11,
    Other = 12,
}

impl RoadClass {
    pub fn from_u8(v: u8) -> RoadClass {
        match v {
            0 => RoadClass::Motorway,
            1 => RoadClass::MotorwayLink,
            2 => RoadClass::Trunk,
            3 => RoadClass::TrunkLink,
            4 => RoadClass::Primary,
            5 => RoadClass::Secondary,
            6 => RoadClass::Tertiary,
            7 => RoadClass::Residential,
            8 => RoadClass::LivingStreet,
            9 => RoadClass::Service,
            10 => RoadClass::Track,
            11 => RoadClass::Ferry,
            _ => RoadClass::Other,
        }
    }

    /// Link roads behave as ramps for turn classification.
    pub fn is_link(&self) -> bool {
        matches!(self, RoadClass::MotorwayLink | RoadClass::TrunkLink)
    }
}

/// Per-way answer of the profile. Speeds of zero mean no access in that
/// direction.
#[derive(Debug, Clone, PartialEq)]
pub struct WayProperties {
    pub forward_speed_kmh: f64,
    pub backward_speed_kmh: f64,
    pub travel_mode_forward: TravelMode,
    pub travel_mode_backward: TravelMode,
    pub name: String,
    pub classification: RoadClass,
    pub access_restricted: bool,
    pub roundabout: bool,
    /// One-way forced by a contra-flow lane rather than geometry.
    pub contra_flow: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeProperties {
    pub is_barrier: bool,
    pub is_signal: bool,
}

pub trait Profile: Send + Sync {
    /// Classify a way; `None` means the way is not routable at all.
    fn way_speed(&self, tags: &TagMap) -> Option<WayProperties>;

    /// Barrier / traffic-signal classification of a node.
    fn node_barrier(&self, tags: &TagMap) -> NodeProperties;

    /// Turn cost in deci-seconds for the given interior angle (degrees,
    /// 180 = straight) and the travel modes entering and leaving the turn.
    fn turn_penalty(&self, angle_degrees: f64, from: TravelMode, to: TravelMode) -> u32;

    /// Cost of a u-turn in deci-seconds, or `None` when u-turns are
    /// forbidden outright. A finite penalty still produces an edge.
    fn u_turn_penalty(&self) -> Option<u32>;

    /// Extra cost in deci-seconds for crossing a traffic signal.
    fn traffic_signal_penalty(&self) -> u32;

    /// Vehicle classes this profile is exempt from in turn restrictions
    /// (e.g. a bicycle profile returns `["bicycle"]`).
    fn exceptions(&self) -> &[String];

    fn use_turn_restrictions(&self) -> bool;
}

/// Default automobile profile.
pub struct CarProfile {
    exceptions: Vec<String>,
}

impl CarProfile {
    pub fn new() -> Self {
        Self {
            exceptions: vec!["motorcar".to_string(), "motor_vehicle".to_string()],
        }
    }

    fn base_speed(highway: &str) -> Option<(f64, RoadClass)> {
        let v = match highway {
            "motorway" => (110.0, RoadClass::Motorway),
            "motorway_link" => (60.0, RoadClass::MotorwayLink),
            "trunk" => (90.0, RoadClass::Trunk),
            "trunk_link" => (50.0, RoadClass::TrunkLink),
            "primary" | "primary_link" => (70.0, RoadClass::Primary),
            "secondary" | "secondary_link" => (60.0, RoadClass::Secondary),
            "tertiary" | "tertiary_link" => (50.0, RoadClass::Tertiary),
            "unclassified" => (50.0, RoadClass::Residential),
            "residential" => (30.0, RoadClass::Residential),
            "living_street" => (10.0, RoadClass::LivingStreet),
            "service" => (20.0, RoadClass::Service),
            _ => return None,
        };
        Some(v)
    }
}

impl Default for CarProfile {
    fn default() -> Self {
        Self::new()
    }
}

impl Profile for CarProfile {
    fn way_speed(&self, tags: &TagMap) -> Option<WayProperties> {
        let route_ferry = tags.get("route").map(|r| r == "ferry").unwrap_or(false);
        let (mut speed, classification) = if route_ferry {
            (5.0, RoadClass::Ferry)
        } else {
            Self::base_speed(tags.get("highway")?.as_str())?
        };

        for key in ["access", "vehicle", "motor_vehicle", "motorcar"] {
            if let Some(v) = tags.get(key) {
                if matches!(v.as_str(), "no" | "private" | "agricultural" | "forestry") {
                    return None;
                }
            }
        }

        if let Some(max) = tags.get("maxspeed").and_then(|m| parse_maxspeed(m)) {
            speed = speed.min(max);
        }

        let oneway = tags.get("oneway").map(String::as_str);
        let roundabout = tags
            .get("junction")
            .map(|j| j == "roundabout")
            .unwrap_or(false);
        // roundabouts are implicitly oneway
        let (fwd, bwd) = match oneway {
            Some("yes") | Some("1") | Some("true") => (speed, 0.0),
            Some("-1") | Some("reverse") => (0.0, speed),
            _ if roundabout => (speed, 0.0),
            _ => (speed, speed),
        };

        let mode = if route_ferry {
            TravelMode::Ferry
        } else {
            TravelMode::Driving
        };

        Some(WayProperties {
            forward_speed_kmh: fwd,
            backward_speed_kmh: bwd,
            travel_mode_forward: if fwd > 0.0 { mode } else { TravelMode::Inaccessible },
            travel_mode_backward: if bwd > 0.0 { mode } else { TravelMode::Inaccessible },
            name: tags.get("name").cloned().unwrap_or_default(),
            classification,
            access_restricted: tags
                .get("access")
                .map(|a| a == "destination" || a == "delivery")
                .unwrap_or(false),
            roundabout,
            contra_flow: tags
                .get("oneway:bus")
                .map(|v| v == "opposite_lane")
                .unwrap_or(false),
        })
    }

    fn node_barrier(&self, tags: &TagMap) -> NodeProperties {
        let is_barrier = match tags.get("barrier").map(String::as_str) {
            Some("gate") | Some("bollard") | Some("lift_gate") | Some("cycle_barrier")
            | Some("block") => !matches!(
                tags.get("access").map(String::as_str),
                Some("yes") | Some("permissive") | Some("designated")
            ),
            _ => false,
        };
        let is_signal = tags
            .get("highway")
            .map(|h| h == "traffic_signals")
            .unwrap_or(false);
        NodeProperties {
            is_barrier,
            is_signal,
        }
    }

    fn turn_penalty(&self, angle_degrees: f64, from: TravelMode, to: TravelMode) -> u32 {
        if from == TravelMode::Ferry || to == TravelMode::Ferry {
            return 0;
        }
        // deviation from straight, 0..180
        let deviation = (angle_degrees - 180.0).abs();
        // quadratic ramp: free until ~45 degrees, ~7.5s for a full u-turn
        let seconds = 7.5 * (deviation / 180.0).powi(2);
        (seconds * 10.0) as u32
    }

    fn u_turn_penalty(&self) -> Option<u32> {
        Some(200)
    }

    fn traffic_signal_penalty(&self) -> u32 {
        70
    }

    fn exceptions(&self) -> &[String] {
        &self.exceptions
    }

    fn use_turn_restrictions(&self) -> bool {
        true
    }
}

fn parse_maxspeed(value: &str) -> Option<f64> {
    let value = value.trim();
    if let Some(mph) = value.strip_suffix("mph") {
        return mph.trim().parse::<f64>().ok().map(|v| v * 1.609_344);
    }
    value.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> TagMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_residential_way() {
        let p = CarProfile::new();
        let props = p
            .way_speed(&tags(&[("highway", "residential"), ("name", "Rue Grimaldi")]))
            .unwrap();
        assert_eq!(props.forward_speed_kmh, 30.0);
        assert_eq!(props.backward_speed_kmh, 30.0);
        assert_eq!(props.name, "Rue Grimaldi");
        assert_eq!(props.classification, RoadClass::Residential);
    }

    #[test]
    fn test_footway_not_routable() {
        let p = CarProfile::new();
        assert!(p.way_speed(&tags(&[("highway", "footway")])).is_none());
    }

    #[test]
    fn test_oneway_reverse() {
        let p = CarProfile::new();
        let props = p
            .way_speed(&tags(&[("highway", "primary"), ("oneway", "-1")]))
            .unwrap();
        assert_eq!(props.forward_speed_kmh, 0.0);
        assert_eq!(props.backward_speed_kmh, 70.0);
        assert_eq!(props.travel_mode_forward, TravelMode::Inaccessible);
    }

    #[test]
    fn test_maxspeed_caps_base() {
        let p = CarProfile::new();
        let props = p
            .way_speed(&tags(&[("highway", "motorway"), ("maxspeed", "80")]))
            .unwrap();
        assert_eq!(props.forward_speed_kmh, 80.0);
    }

    #[test]
    fn test_maxspeed_mph() {
        assert!((parse_maxspeed("30 mph").unwrap() - 48.28).abs() < 0.01);
    }

    #[test]
    fn test_roundabout_is_oneway() {
        let p = CarProfile::new();
        let props = p
            .way_speed(&tags(&[("highway", "primary"), ("junction", "roundabout")]))
            .unwrap();
        assert!(props.roundabout);
        assert_eq!(props.backward_speed_kmh, 0.0);
    }

    #[test]
    fn test_signal_node() {
        let p = CarProfile::new();
        let props = p.node_barrier(&tags(&[("highway", "traffic_signals")]));
        assert!(props.is_signal);
        assert!(!props.is_barrier);
    }

    #[test]
    fn test_straight_turn_is_free() {
        let p = CarProfile::new();
        assert_eq!(p.turn_penalty(180.0, TravelMode::Driving, TravelMode::Driving), 0);
    }

    #[test]
    fn test_sharp_turn_costs_more_than_slight() {
        let p = CarProfile::new();
        let slight = p.turn_penalty(160.0, TravelMode::Driving, TravelMode::Driving);
        let sharp = p.turn_penalty(60.0, TravelMode::Driving, TravelMode::Driving);
        assert!(sharp > slight);
    }
}
