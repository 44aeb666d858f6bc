//! Turn classification
//!
//! Maps the interior angle of a turn (180 = straight) and the road context
//! onto a turn instruction. The numeric penalty is the profile's business;
//! this module only decides what the maneuver is called.

use crate::profile::RoadClass;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TurnInstruction {
    NoTurn = 0,
    GoStraight = 1,
    TurnSlightRight = 2,
    TurnRight = 3,
    TurnSharpRight = 4,
    UTurn = 5,
    TurnSharpLeft = 6,
    TurnLeft = 7,
    TurnSlightLeft = 8,
    ReachViaLocation = 9,
    HeadOn = 10,
    EnterRoundabout = 11,
    LeaveRoundabout = 12,
    StayOnRoundabout = 13,
    StartAtEndOfStreet = 14,
    ReachedYourDestination = 15,
    RampOn = 16,
    RampOff = 17,
    ForkLeft = 18,
    ForkRight = 19,
}

impl TurnInstruction {
    pub fn from_u8(v: u8) -> Option<TurnInstruction> {
        use TurnInstruction::*;
        Some(match v {
            0 => NoTurn,
            1 => GoStraight,
            2 => TurnSlightRight,
            3 => TurnRight,
            4 => TurnSharpRight,
            5 => UTurn,
            6 => TurnSharpLeft,
            7 => TurnLeft,
            8 => TurnSlightLeft,
            9 => ReachViaLocation,
            10 => HeadOn,
            11 => EnterRoundabout,
            12 => LeaveRoundabout,
            13 => StayOnRoundabout,
            14 => StartAtEndOfStreet,
            15 => ReachedYourDestination,
            16 => RampOn,
            17 => RampOff,
            18 => ForkLeft,
            19 => ForkRight,
            _ => return None,
        })
    }

    /// Instructions that survive the annotation repair pass even when the
    /// street name does not change.
    pub fn is_necessary(&self) -> bool {
        !matches!(self, TurnInstruction::NoTurn | TurnInstruction::StayOnRoundabout)
    }
}

/// Everything the classifier needs to know about one candidate turn.
#[derive(Debug, Clone, Copy)]
pub struct TurnContext {
    /// Interior angle at the via node, degrees; 180 = straight.
    pub angle: f64,
    pub from_class: RoadClass,
    pub to_class: RoadClass,
    pub from_roundabout: bool,
    pub to_roundabout: bool,
    pub is_u_turn: bool,
    /// The via node offers another near-straight continuation of similar
    /// class, so the maneuver reads as a fork.
    pub is_fork: bool,
}

pub fn classify_turn(ctx: TurnContext) -> TurnInstruction {
    if ctx.is_u_turn {
        return TurnInstruction::UTurn;
    }
    match (ctx.from_roundabout, ctx.to_roundabout) {
        (false, true) => return TurnInstruction::EnterRoundabout,
        (true, false) => return TurnInstruction::LeaveRoundabout,
        (true, true) => return TurnInstruction::StayOnRoundabout,
        (false, false) => {}
    }
    if ctx.is_fork && is_straightish(ctx.angle) {
        return if ctx.angle < 180.0 {
            TurnInstruction::ForkRight
        } else {
            TurnInstruction::ForkLeft
        };
    }
    if ctx.to_class.is_link() && !ctx.from_class.is_link() && is_straightish(ctx.angle) {
        return TurnInstruction::RampOn;
    }
    if ctx.from_class.is_link() && !ctx.to_class.is_link() && is_straightish(ctx.angle) {
        return TurnInstruction::RampOff;
    }
    binned(ctx.angle)
}

fn is_straightish(angle: f64) -> bool {
    (113.0..247.0).contains(&angle)
}

/// Angle bins; 180 is dead straight, smaller bends right.
fn binned(angle: f64) -> TurnInstruction {
    use TurnInstruction::*;
    if (23.0..67.0).contains(&angle) {
        TurnSharpRight
    } else if (67.0..113.0).contains(&angle) {
        TurnRight
    } else if (113.0..158.0).contains(&angle) {
        TurnSlightRight
    } else if (158.0..202.0).contains(&angle) {
        GoStraight
    } else if (202.0..248.0).contains(&angle) {
        TurnSlightLeft
    } else if (248.0..292.0).contains(&angle) {
        TurnLeft
    } else if (292.0..336.0).contains(&angle) {
        TurnSharpLeft
    } else {
        UTurn
    }
}
