use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::colony::agent::AgentId;
use crate::colony::Colony;

/// Observable state of one agent between ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentFrame {
    pub id: AgentId,
    pub row: i32,
    pub col: i32,
    pub alive: bool,
    pub core_temp: f64,
    pub color: [u8; 3],
}

/// Plain-data view of the colony handed to renderers and plotters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub colony_id: Uuid,
    pub tick: u64,
    pub rows: usize,
    pub cols: usize,
    pub agents: Vec<AgentFrame>,
    /// Row-major tile temperatures, when maps are recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thermal_map: Option<Vec<f64>>,
    /// Row-major material codes (0 air, 1 core, 2 internal, 3 external).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material_map: Option<Vec<u8>>,
}

impl Frame {
    pub fn capture(colony: &Colony, include_maps: bool) -> Self {
        let grid = colony.grid();
        let agents = colony
            .agents()
            .iter()
            .map(|a| AgentFrame {
                id: a.id(),
                row: a.position().row,
                col: a.position().col,
                alive: a.is_alive(),
                core_temp: a.core_temp(),
                color: a.color(),
            })
            .collect();

        let (thermal_map, material_map) = if include_maps {
            (
                Some(grid.thermal_map().as_slice().to_vec()),
                Some(grid.material_map().iter().map(|m| m.code()).collect()),
            )
        } else {
            (None, None)
        };

        Frame {
            colony_id: colony.id(),
            tick: colony.tick_count(),
            rows: grid.rows(),
            cols: grid.cols(),
            agents,
            thermal_map,
            material_map,
        }
    }

    /// Serialize as a single JSON line (no trailing newline).
    pub fn to_json_line(&self) -> Result<String, String> {
        serde_json::to_string(self).map_err(|e| format!("Cannot encode frame {}: {}", self.tick, e))
    }
}
