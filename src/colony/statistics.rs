use serde::{Deserialize, Serialize};

use crate::colony::agent::Agent;
use crate::thermal::ThermalGrid;

/// Per-tick aggregate metrics for observers and renderers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickStatistics {
    pub tick: u64,
    pub alive: u32,
    pub dead: u32,
    pub deaths_this_tick: u32,
    pub moves_committed: u32,
    pub moves_rejected: u32,
    /// Core temperature aggregates over living agents; zero when extinct.
    pub mean_core_temp: f64,
    pub min_core_temp: f64,
    pub max_core_temp: f64,
    pub mean_air_temp: f64,
    pub mean_tile_temp: f64,
    pub tick_duration_ms: f32,
}

/// Movement bookkeeping gathered while a tick runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveCounts {
    pub committed: u32,
    pub rejected: u32,
}

/// Compute statistics for the colony state after a tick.
pub fn compute_statistics(
    tick: u64,
    agents: &[Agent],
    grid: &ThermalGrid,
    deaths_this_tick: u32,
    moves: MoveCounts,
    tick_duration_ms: f32,
) -> TickStatistics {
    let mut alive = 0_u32;
    let mut total_core = 0.0_f64;
    let mut min_core = f64::INFINITY;
    let mut max_core = f64::NEG_INFINITY;

    for agent in agents.iter().filter(|a| a.is_alive()) {
        let core = agent.core_temp();
        alive += 1;
        total_core += core;
        min_core = min_core.min(core);
        max_core = max_core.max(core);
    }

    let (mean_core, min_core, max_core) = if alive == 0 {
        (0.0, 0.0, 0.0)
    } else {
        (total_core / alive as f64, min_core, max_core)
    };

    let mut air_tiles = 0_usize;
    let mut total_air = 0.0_f64;
    for (temp, material) in grid.thermal_map().iter().zip(grid.material_map().iter()) {
        if !material.is_agent() {
            air_tiles += 1;
            total_air += temp;
        }
    }
    let mean_air = if air_tiles == 0 { 0.0 } else { total_air / air_tiles as f64 };

    let tiles = grid.thermal_map().len();
    let mean_tile = if tiles == 0 {
        0.0
    } else {
        grid.thermal_map().iter().sum::<f64>() / tiles as f64
    };

    TickStatistics {
        tick,
        alive,
        dead: agents.len() as u32 - alive,
        deaths_this_tick,
        moves_committed: moves.committed,
        moves_rejected: moves.rejected,
        mean_core_temp: mean_core,
        min_core_temp: min_core,
        max_core_temp: max_core,
        mean_air_temp: mean_air,
        mean_tile_temp: mean_tile,
        tick_duration_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colony::agent::{AgentId, AgentSpec, MovementPolicy, Thresholds};
    use crate::geometry::Position;
    use crate::thermal::{ThermalParams, Tissue};

    fn params() -> ThermalParams {
        ThermalParams {
            air_conductivity: 1.0,
            initial_air_temp: -10.0,
            ambient_air_temp: -10.0,
            grid_size: 1.0,
            time_step_size: 0.01,
            air_heat_capacity: 1.0,
            tissue_specific_heat: 1.0,
        }
    }

    fn agent(id: u32, col: i32, temp: f64) -> Agent {
        let spec = AgentSpec {
            position: Position::new(2, col),
            body_radius: 1,
            sense_radius: 3,
            body_temp: temp,
            thresholds: Thresholds {
                low_death: -40.0,
                high_death: 40.0,
                low_move: 30.0,
                high_move: 38.0,
            },
            tissue: Tissue {
                internal_conductivity: 1.0,
                external_conductivity: 1.0,
                insulation_thickness: 1.0,
                density: 1.0,
                metabolism: 0.0,
            },
            movement_policy: MovementPolicy::Closest,
            movement_speed: 1,
        };
        Agent::new(AgentId(id), &spec).unwrap()
    }

    #[test]
    fn aggregates_living_agents_only() {
        let mut agents = vec![agent(0, 1, 30.0), agent(1, 3, 20.0), agent(2, 5, -35.0)];
        agents[2].kill();
        let mut grid = ThermalGrid::new(5, 7, params());
        grid.rebuild_maps(&agents);

        let stats = compute_statistics(4, &agents, &grid, 1, MoveCounts { committed: 2, rejected: 1 }, 0.5);
        assert_eq!(stats.tick, 4);
        assert_eq!(stats.alive, 2);
        assert_eq!(stats.dead, 1);
        assert_eq!(stats.deaths_this_tick, 1);
        assert_eq!(stats.moves_committed, 2);
        assert_eq!(stats.moves_rejected, 1);
        assert_eq!(stats.mean_core_temp, 25.0);
        assert_eq!(stats.min_core_temp, 20.0);
        assert_eq!(stats.max_core_temp, 30.0);
        assert_eq!(stats.mean_air_temp, -10.0);
        let expected_tile = (30.0 + 20.0 - 10.0 * 33.0) / 35.0;
        assert!((stats.mean_tile_temp - expected_tile).abs() < 1e-12);
    }

    #[test]
    fn extinct_colony_reports_zeroes() {
        let mut agents = vec![agent(0, 1, 30.0)];
        agents[0].kill();
        let grid = ThermalGrid::new(5, 7, params());
        let stats = compute_statistics(9, &agents, &grid, 0, MoveCounts::default(), 0.0);
        assert_eq!(stats.alive, 0);
        assert_eq!(stats.mean_core_temp, 0.0);
        assert_eq!(stats.min_core_temp, 0.0);
    }
}
