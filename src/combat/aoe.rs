//! Area-of-effect targeting
//!
//! Pure geometry: each shape takes candidate positions (feet, 2D) and
//! returns the ones inside, with their distance from the shape's origin.
//! Nothing here rolls dice or touches combat state.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use super::error::CombatError;
use super::stats::Ability;

/// Default width of a line effect in feet
pub const DEFAULT_LINE_WIDTH: f64 = 5.0;

/// A point on the battle map
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// A participant that might be caught in an area
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AoeCandidate {
    pub id: u32,
    pub position: Point,
}

/// A participant inside an area
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AoeHit {
    pub id: u32,
    pub distance: f64,
}

/// Area shapes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum AoeShape {
    Sphere {
        origin: Point,
        radius: f64,
    },
    Cone {
        caster: Point,
        aim: Point,
        length: f64,
        #[serde(default)]
        width: Option<f64>,
    },
    Line {
        start: Point,
        end: Point,
        #[serde(default)]
        width: Option<f64>,
    },
    Cube {
        origin: Point,
        size: f64,
    },
}

impl AoeShape {
    /// Select the candidates inside this shape
    pub fn select(&self, candidates: &[AoeCandidate]) -> Vec<AoeHit> {
        match *self {
            AoeShape::Sphere { origin, radius } => sphere(origin, radius, candidates),
            AoeShape::Cone {
                caster,
                aim,
                length,
                width,
            } => cone(caster, aim, length, width, candidates),
            AoeShape::Line { start, end, width } => line(start, end, width, candidates),
            AoeShape::Cube { origin, size } => cube(origin, size, candidates),
        }
    }
}

/// Everything within `radius` of `origin`, boundary inclusive
pub fn sphere(origin: Point, radius: f64, candidates: &[AoeCandidate]) -> Vec<AoeHit> {
    candidates
        .iter()
        .filter_map(|c| {
            let distance = origin.distance(&c.position);
            (distance <= radius).then_some(AoeHit { id: c.id, distance })
        })
        .collect()
}

/// Unit vector from `from` toward `to`, or `None` when they coincide
fn direction(from: Point, to: Point) -> Option<(f64, f64, f64)> {
    let (dx, dy) = (to.x - from.x, to.y - from.y);
    let len = dx.hypot(dy);
    (len > f64::EPSILON).then(|| (dx / len, dy / len, len))
}

/// Signed distance along the axis and perpendicular offset from it
fn project(origin: Point, ux: f64, uy: f64, p: Point) -> (f64, f64) {
    let (vx, vy) = (p.x - origin.x, p.y - origin.y);
    let along = vx * ux + vy * uy;
    let perp = vx * -uy + vy * ux;
    (along, perp)
}

/// A cone from `caster` toward `aim`; width at the far end defaults to `length`
pub fn cone(
    caster: Point,
    aim: Point,
    length: f64,
    width: Option<f64>,
    candidates: &[AoeCandidate],
) -> Vec<AoeHit> {
    let Some((ux, uy, _)) = direction(caster, aim) else {
        return Vec::new();
    };
    if length <= 0.0 {
        return Vec::new();
    }
    let width = width.unwrap_or(length);

    candidates
        .iter()
        .filter_map(|c| {
            let (along, perp) = project(caster, ux, uy, c.position);
            if along < 0.0 || along > length {
                return None;
            }
            let width_here = (along / length) * width;
            (perp.abs() <= width_here).then_some(AoeHit {
                id: c.id,
                distance: caster.distance(&c.position),
            })
        })
        .collect()
}

/// A line from `start` to `end`, `width` feet wide (default 5)
pub fn line(start: Point, end: Point, width: Option<f64>, candidates: &[AoeCandidate]) -> Vec<AoeHit> {
    let Some((ux, uy, line_length)) = direction(start, end) else {
        return Vec::new();
    };
    let half_width = width.unwrap_or(DEFAULT_LINE_WIDTH) / 2.0;

    candidates
        .iter()
        .filter_map(|c| {
            let (along, perp) = project(start, ux, uy, c.position);
            if along < 0.0 || along > line_length {
                return None;
            }
            (perp.abs() <= half_width).then_some(AoeHit {
                id: c.id,
                distance: start.distance(&c.position),
            })
        })
        .collect()
}

/// Axis-aligned square with its corner at `origin`
pub fn cube(origin: Point, size: f64, candidates: &[AoeCandidate]) -> Vec<AoeHit> {
    candidates
        .iter()
        .filter(|c| {
            let p = c.position;
            origin.x <= p.x && p.x <= origin.x + size && origin.y <= p.y && p.y <= origin.y + size
        })
        .map(|c| AoeHit {
            id: c.id,
            distance: origin.distance(&c.position),
        })
        .collect()
}

/// Shape family of a templated spell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    Sphere,
    Cone,
    Line,
    Cube,
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ShapeKind::Sphere => "sphere",
            ShapeKind::Cone => "cone",
            ShapeKind::Line => "line",
            ShapeKind::Cube => "cube",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ShapeKind {
    type Err = CombatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sphere" | "radius" | "cylinder" => Ok(ShapeKind::Sphere),
            "cone" => Ok(ShapeKind::Cone),
            "line" => Ok(ShapeKind::Line),
            "cube" | "square" => Ok(ShapeKind::Cube),
            other => Err(CombatError::validation(format!("unknown area shape: {}", other))),
        }
    }
}

/// Static description of an area spell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AoeSpellTemplate {
    pub name: &'static str,
    pub shape: ShapeKind,
    /// Radius, length, or edge in feet
    pub size: f64,
    /// Line width; cones default to their length
    pub width: Option<f64>,
    pub save: Ability,
    pub damage: Option<&'static str>,
    pub half_on_save: bool,
    pub level: u32,
}

impl AoeSpellTemplate {
    /// Build the concrete shape from a caster position and a target point
    pub fn shape_at(&self, caster: Point, target: Point) -> AoeShape {
        match self.shape {
            ShapeKind::Sphere => AoeShape::Sphere {
                origin: target,
                radius: self.size,
            },
            ShapeKind::Cone => AoeShape::Cone {
                caster,
                aim: target,
                length: self.size,
                width: self.width,
            },
            ShapeKind::Line => {
                // The line runs its full length from the caster toward the target
                let end = match direction(caster, target) {
                    Some((ux, uy, _)) => Point::new(caster.x + ux * self.size, caster.y + uy * self.size),
                    None => target,
                };
                AoeShape::Line {
                    start: caster,
                    end,
                    width: self.width,
                }
            }
            ShapeKind::Cube => AoeShape::Cube {
                origin: target,
                size: self.size,
            },
        }
    }
}

static AOE_SPELLS: LazyLock<HashMap<&'static str, AoeSpellTemplate>> = LazyLock::new(|| {
    let templates = [
        AoeSpellTemplate {
            name: "fireball",
            shape: ShapeKind::Sphere,
            size: 20.0,
            width: None,
            save: Ability::Dexterity,
            damage: Some("8d6 fire"),
            half_on_save: true,
            level: 3,
        },
        AoeSpellTemplate {
            name: "lightning bolt",
            shape: ShapeKind::Line,
            size: 100.0,
            width: Some(5.0),
            save: Ability::Dexterity,
            damage: Some("8d6 lightning"),
            half_on_save: true,
            level: 3,
        },
        AoeSpellTemplate {
            name: "burning hands",
            shape: ShapeKind::Cone,
            size: 15.0,
            width: None,
            save: Ability::Dexterity,
            damage: Some("3d6 fire"),
            half_on_save: true,
            level: 1,
        },
        AoeSpellTemplate {
            name: "cone of cold",
            shape: ShapeKind::Cone,
            size: 60.0,
            width: None,
            save: Ability::Constitution,
            damage: Some("8d8 cold"),
            half_on_save: true,
            level: 5,
        },
        AoeSpellTemplate {
            name: "thunderwave",
            shape: ShapeKind::Cube,
            size: 15.0,
            width: None,
            save: Ability::Constitution,
            damage: Some("2d8 thunder"),
            half_on_save: true,
            level: 1,
        },
        AoeSpellTemplate {
            name: "shatter",
            shape: ShapeKind::Sphere,
            size: 10.0,
            width: None,
            save: Ability::Constitution,
            damage: Some("3d8 thunder"),
            half_on_save: true,
            level: 2,
        },
        AoeSpellTemplate {
            name: "hypnotic pattern",
            shape: ShapeKind::Cube,
            size: 30.0,
            width: None,
            save: Ability::Wisdom,
            damage: None,
            half_on_save: false,
            level: 3,
        },
    ];
    templates.into_iter().map(|t| (t.name, t)).collect()
});

/// Look up an area spell template by name (case-insensitive)
pub fn aoe_spell(name: &str) -> Option<&'static AoeSpellTemplate> {
    AOE_SPELLS.get(name.trim().to_lowercase().as_str())
}
