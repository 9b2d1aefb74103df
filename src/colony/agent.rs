use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::colony::ColonyError;
use crate::geometry::{body_side, Position};
use crate::thermal::{Field, Tissue};

/// Largest per-axis displacement of the exploratory jitter.
pub const JITTER: i32 = 3;

/// Greedy walk candidates as (d_row, d_col), in tie-break order:
/// stay, up, down, left, right.
const WALK_STEPS: [(i32, i32); 5] = [(0, 0), (0, 1), (0, -1), (-1, 0), (1, 0)];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub u32);

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How an agent turns sensed neighbors into a movement target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementPolicy {
    /// Sum of all relative neighbor positions.
    Average,
    /// Relative position of the nearest neighbor.
    Closest,
    /// Never moves. Used for obstacles.
    Stationary,
}

impl std::str::FromStr for MovementPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "average" => Ok(MovementPolicy::Average),
            "closest" => Ok(MovementPolicy::Closest),
            "stationary" => Ok(MovementPolicy::Stationary),
            other => Err(format!(
                "unknown movement policy '{}', expected one of average, closest, stationary",
                other
            )),
        }
    }
}

/// Survival band and comfort band of the core temperature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub low_death: f64,
    pub high_death: f64,
    pub low_move: f64,
    pub high_move: f64,
}

/// Plain-data description of an agent to be placed in a colony.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub position: Position,
    pub body_radius: u32,
    pub sense_radius: i32,
    /// Initial temperature of every body cell.
    pub body_temp: f64,
    pub thresholds: Thresholds,
    pub tissue: Tissue,
    pub movement_policy: MovementPolicy,
    /// Maximum tiles walked per tick.
    pub movement_speed: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeathCause {
    Hypothermia,
    Hyperthermia,
}

/// Emitted when a thermal update pushes the core out of the survival band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeathEvent {
    pub agent: AgentId,
    pub position: Position,
    pub core_temp: f64,
    pub cause: DeathCause,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    id: AgentId,
    position: Position,
    body_radius: u32,
    sense_radius: i32,
    /// `(2r-1) x (2r-1)` temperatures indexed by body offset. Cells outside
    /// the diamond footprint are padding and never read.
    body_temp: Field<f64>,
    thresholds: Thresholds,
    tissue: Tissue,
    movement_policy: MovementPolicy,
    movement_speed: u32,
    alive: bool,
}

impl Agent {
    pub fn new(id: AgentId, spec: &AgentSpec) -> Result<Self, ColonyError> {
        validate_spec(spec)?;
        let side = body_side(spec.body_radius);
        Ok(Self {
            id,
            position: spec.position,
            body_radius: spec.body_radius,
            sense_radius: spec.sense_radius,
            body_temp: Field::filled(side, side, spec.body_temp),
            thresholds: spec.thresholds,
            tissue: spec.tissue,
            movement_policy: spec.movement_policy,
            movement_speed: spec.movement_speed,
            alive: true,
        })
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    pub fn body_radius(&self) -> u32 {
        self.body_radius
    }

    pub fn sense_radius(&self) -> i32 {
        self.sense_radius
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn tissue(&self) -> &Tissue {
        &self.tissue
    }

    pub fn movement_policy(&self) -> MovementPolicy {
        self.movement_policy
    }

    pub fn movement_speed(&self) -> u32 {
        self.movement_speed
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Permanently mark the agent dead.
    pub fn kill(&mut self) {
        self.alive = false;
    }

    pub fn body_temp(&self) -> &Field<f64> {
        &self.body_temp
    }

    /// Temperature at a body offset relative to the center.
    pub fn body_temp_at(&self, d_row: i32, d_col: i32) -> Option<f64> {
        let half = self.body_radius as i32 - 1;
        let (r, c) = (d_row + half, d_col + half);
        if r < 0 || c < 0 {
            return None;
        }
        self.body_temp.get(r as usize, c as usize).copied()
    }

    pub fn core_temp(&self) -> f64 {
        self.body_temp_at(0, 0).unwrap_or(f64::NAN)
    }

    /// True when the body field has the odd square shape of the radius.
    pub fn has_valid_body_field(&self) -> bool {
        let side = body_side(self.body_radius);
        self.body_temp.rows() == side && self.body_temp.cols() == side && self.body_temp.is_consistent()
    }

    /// Replace the body temperature field and apply the survival rule.
    ///
    /// Returns the death event when this update kills the agent. A dead
    /// agent ignores further updates. Fields of the wrong shape are ignored.
    pub fn apply_thermal_update(&mut self, body_temp: Field<f64>) -> Option<DeathEvent> {
        if !self.alive {
            return None;
        }
        let side = body_side(self.body_radius);
        if body_temp.rows() != side || body_temp.cols() != side {
            return None;
        }
        self.body_temp = body_temp;

        let core = self.core_temp();
        let cause = if core < self.thresholds.low_death {
            DeathCause::Hypothermia
        } else if core > self.thresholds.high_death {
            DeathCause::Hyperthermia
        } else {
            return None;
        };
        self.alive = false;
        Some(DeathEvent {
            agent: self.id,
            position: self.position,
            core_temp: core,
            cause,
        })
    }

    /// RGB color for renderers: blue at the cold death threshold, red at
    /// the hot one.
    pub fn color(&self) -> [u8; 3] {
        let span = self.thresholds.high_death - self.thresholds.low_death;
        let t = if span.is_finite() && span > 0.0 {
            ((self.core_temp() - self.thresholds.low_death) / span).clamp(0.0, 1.0)
        } else {
            0.5
        };
        [(t * 255.0).round() as u8, 0, ((1.0 - t) * 255.0).round() as u8]
    }

    /// Choose the position this agent wants to occupy next tick.
    ///
    /// A jittered position is always drawn first. Without neighbors, or when
    /// the core sits inside the comfort band, the jitter is the move.
    /// Otherwise the agent walks greedily from the jitter towards the swarm
    /// target when cold, or away from it when hot.
    pub fn get_move<R: Rng>(&self, neighbors: &[&Agent], rng: &mut R) -> Position {
        if self.movement_policy == MovementPolicy::Stationary {
            return self.position;
        }

        let jittered = self.position.offset(
            rng.gen_range(-JITTER..=JITTER),
            rng.gen_range(-JITTER..=JITTER),
        );

        let Some((d_row, d_col)) = self.swarm_vector(neighbors) else {
            return jittered;
        };

        let core = self.core_temp();
        let goal = if core < self.thresholds.low_move {
            self.position.offset(d_row, d_col)
        } else if core > self.thresholds.high_move {
            self.position.offset(-d_row, -d_col)
        } else {
            return jittered;
        };

        greedy_walk(jittered, goal, self.movement_speed)
    }

    /// Relative swarm target under this agent's policy.
    fn swarm_vector(&self, neighbors: &[&Agent]) -> Option<(i32, i32)> {
        if neighbors.is_empty() {
            return None;
        }
        let relative = neighbors.iter().map(|n| n.position.relative_to(self.position));
        match self.movement_policy {
            MovementPolicy::Average => {
                Some(relative.fold((0, 0), |(r, c), (dr, dc)| (r + dr, c + dc)))
            }
            MovementPolicy::Closest => {
                // min_by_key keeps the first minimum
                relative.min_by_key(|(dr, dc)| dr.abs() + dc.abs())
            }
            MovementPolicy::Stationary => None,
        }
    }
}

/// Walk `steps` single-tile moves from `start`, each time taking the first
/// candidate (stay, up, down, left, right) that minimizes the L1 distance
/// to `goal`.
pub fn greedy_walk(start: Position, goal: Position, steps: u32) -> Position {
    let mut pos = start;
    for _ in 0..steps {
        let mut best = pos;
        let mut best_dist = pos.manhattan(goal);
        for (d_row, d_col) in WALK_STEPS.iter().skip(1) {
            let candidate = pos.offset(*d_row, *d_col);
            let dist = candidate.manhattan(goal);
            if dist < best_dist {
                best = candidate;
                best_dist = dist;
            }
        }
        pos = best;
    }
    pos
}

fn validate_spec(spec: &AgentSpec) -> Result<(), ColonyError> {
    if spec.body_radius == 0 {
        return Err(ColonyError::InvalidBodyRadius(spec.body_radius));
    }

    let positive = [
        ("internal_conductivity", spec.tissue.internal_conductivity),
        ("external_conductivity", spec.tissue.external_conductivity),
        ("density", spec.tissue.density),
    ];
    for (parameter, value) in positive {
        if !(value.is_finite() && value > 0.0) {
            return Err(ColonyError::NonPositive { parameter, value });
        }
    }

    if !(spec.tissue.insulation_thickness.is_finite() && spec.tissue.insulation_thickness >= 0.0) {
        return Err(ColonyError::NonPositive {
            parameter: "insulation_thickness",
            value: spec.tissue.insulation_thickness,
        });
    }

    if !spec.body_temp.is_finite() {
        return Err(ColonyError::NonPositive {
            parameter: "body_temp",
            value: spec.body_temp,
        });
    }

    let t = &spec.thresholds;
    if t.low_death > t.high_death {
        return Err(ColonyError::InvertedThresholds {
            low: "low_death_threshold",
            high: "high_death_threshold",
        });
    }
    if t.low_move > t.high_move {
        return Err(ColonyError::InvertedThresholds {
            low: "low_move_threshold",
            high: "high_move_threshold",
        });
    }
    Ok(())
}
