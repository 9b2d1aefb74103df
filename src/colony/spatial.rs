use serde::{Deserialize, Serialize};

use crate::colony::agent::Agent;
use crate::geometry::Position;

/// Whether two diamond bodies overlap: `|d_row| + |d_col| < r_a + r_b - 1`.
pub fn bodies_collide(a: Position, radius_a: u32, b: Position, radius_b: u32) -> bool {
    (a.manhattan(b) as i64) < radius_a as i64 + radius_b as i64 - 1
}

/// Neighbor and collision queries over the colony population.
///
/// Queries scan the population directly, so they always see the latest
/// committed positions. Dead agents are invisible to every query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpatialIndex {
    rows: usize,
    cols: usize,
}

impl SpatialIndex {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    /// Whether a body of `radius` centered at `pos` lies fully inside the grid.
    pub fn in_bounds(&self, pos: Position, radius: u32) -> bool {
        let margin = radius as i64 - 1;
        let (row, col) = (pos.row as i64, pos.col as i64);
        row >= margin
            && col >= margin
            && row <= self.rows as i64 - radius as i64
            && col <= self.cols as i64 - radius as i64
    }

    /// Whether any body of `radius` fits the grid at all.
    pub fn fits(&self, radius: u32) -> bool {
        let side = crate::geometry::body_side(radius);
        side > 0 && side <= self.rows && side <= self.cols
    }

    /// Living agents other than `agent` whose centers lie strictly closer
    /// than `agent.sense_radius()` in Manhattan distance.
    pub fn neighbors_within<'a>(&self, agent: &Agent, all_agents: &'a [Agent]) -> Vec<&'a Agent> {
        let radius = agent.sense_radius();
        if radius <= 0 {
            return Vec::new();
        }
        all_agents
            .iter()
            .filter(|other| other.id() != agent.id() && other.is_alive())
            .filter(|other| other.position().manhattan(agent.position()) < radius)
            .collect()
    }

    /// Whether `agent` could stand at `(row, col)` without leaving the grid
    /// or overlapping another living agent.
    pub fn is_valid_placement(&self, agent: &Agent, row: i32, col: i32, all_agents: &[Agent]) -> bool {
        let target = Position::new(row, col);
        if !self.in_bounds(target, agent.body_radius()) {
            return false;
        }
        !all_agents.iter().any(|other| {
            other.id() != agent.id()
                && other.is_alive()
                && bodies_collide(target, agent.body_radius(), other.position(), other.body_radius())
        })
    }
}
