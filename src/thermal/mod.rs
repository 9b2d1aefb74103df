//! Heat exchange on the shared colony grid.
//!
//! Every tile holds a temperature and a material class. Once per tick the
//! grid is re-rasterized from the living agents, vacated tiles are reset to
//! ambient, heat is exchanged between 4-connected tiles through a series
//! resistance circuit, and the result is integrated with one forward-Euler
//! step. Forward Euler is only stable while `time_step_size` stays small
//! relative to the conductances involved; callers pick the step.

pub mod field;
pub mod material;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::colony::agent::{Agent, AgentId, DeathEvent};
use crate::geometry::{footprint, NEIGHBOR_OFFSETS};
pub use field::Field;
pub use material::{Material, Tissue};

/// Physical constants of the air and the integration step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThermalParams {
    /// Conductivity of air. Zero means perfectly still air: no conduction
    /// through air tiles and no exchange with the ambient reservoir.
    pub air_conductivity: f64,
    pub initial_air_temp: f64,
    pub ambient_air_temp: f64,
    /// Physical edge length of one tile.
    pub grid_size: f64,
    pub time_step_size: f64,
    /// Heat capacity of one air tile.
    pub air_heat_capacity: f64,
    /// Multiplier turning `density * grid_size^2` into tissue heat capacity.
    pub tissue_specific_heat: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermalGrid {
    params: ThermalParams,
    thermal_map: Field<f64>,
    material_map: Field<Material>,
    agent_id_map: Field<Option<AgentId>>,
    heat_capacity_map: Field<f64>,
    tissues: HashMap<AgentId, Tissue>,
}

impl ThermalGrid {
    /// Create an all-air grid seeded with `initial_air_temp`.
    pub fn new(rows: usize, cols: usize, params: ThermalParams) -> Self {
        Self {
            params,
            thermal_map: Field::filled(rows, cols, params.initial_air_temp),
            material_map: Field::filled(rows, cols, Material::Air),
            agent_id_map: Field::filled(rows, cols, None),
            heat_capacity_map: Field::filled(rows, cols, params.air_heat_capacity),
            tissues: HashMap::new(),
        }
    }

    pub fn params(&self) -> &ThermalParams {
        &self.params
    }

    pub fn rows(&self) -> usize {
        self.thermal_map.rows()
    }

    pub fn cols(&self) -> usize {
        self.thermal_map.cols()
    }

    pub fn thermal_map(&self) -> &Field<f64> {
        &self.thermal_map
    }

    pub fn material_map(&self) -> &Field<Material> {
        &self.material_map
    }

    pub fn agent_id_map(&self) -> &Field<Option<AgentId>> {
        &self.agent_id_map
    }

    pub fn heat_capacity_map(&self) -> &Field<f64> {
        &self.heat_capacity_map
    }

    /// All four maps share the grid shape.
    pub fn is_consistent(&self) -> bool {
        let (rows, cols) = (self.rows(), self.cols());
        self.thermal_map.is_consistent()
            && [
                (self.material_map.rows(), self.material_map.cols()),
                (self.agent_id_map.rows(), self.agent_id_map.cols()),
                (self.heat_capacity_map.rows(), self.heat_capacity_map.cols()),
            ]
            .iter()
            .all(|&shape| shape == (rows, cols))
            && self.material_map.is_consistent()
            && self.agent_id_map.is_consistent()
            && self.heat_capacity_map.is_consistent()
    }

    /// Total internal energy, `sum(temp * heat_capacity)` over all tiles.
    pub fn total_energy(&self) -> f64 {
        self.thermal_map
            .iter()
            .zip(self.heat_capacity_map.iter())
            .map(|(t, c)| t * c)
            .sum()
    }

    /// Run one full heat-exchange step and refresh every living agent's body
    /// temperatures. Returns the agents that died from the update.
    pub fn step(&mut self, agents: &mut [Agent]) -> Vec<DeathEvent> {
        self.rebuild_maps(agents);
        self.exchange_heat();
        self.resample_agents(agents)
    }

    /// Rasterize the living agents onto the material, ownership and heat
    /// capacity maps, stamp their body temperatures onto the thermal map,
    /// and reset tiles vacated since the previous rebuild to ambient.
    pub fn rebuild_maps(&mut self, agents: &[Agent]) {
        let (rows, cols) = (self.rows(), self.cols());
        let previous = std::mem::replace(
            &mut self.material_map,
            Field::filled(rows, cols, Material::Air),
        );
        self.agent_id_map.fill(None);
        self.heat_capacity_map.fill(self.params.air_heat_capacity);
        self.tissues.clear();

        for agent in agents.iter().filter(|a| a.is_alive()) {
            let tissue = *agent.tissue();
            let capacity =
                tissue.heat_capacity(self.params.grid_size, self.params.tissue_specific_heat);
            self.tissues.insert(agent.id(), tissue);

            let radius = agent.body_radius();
            let center = agent.position();
            for (d_row, d_col) in footprint(radius) {
                let Some(idx) = self.thermal_map.index_at(center.offset(d_row, d_col)) else {
                    continue;
                };
                self.material_map[idx] = Material::classify(d_row, d_col, radius);
                self.agent_id_map[idx] = Some(agent.id());
                self.heat_capacity_map[idx] = capacity;
                if let Some(temp) = agent.body_temp_at(d_row, d_col) {
                    self.thermal_map[idx] = temp;
                }
            }
        }

        let ambient = self.params.ambient_air_temp;
        for idx in 0..self.thermal_map.len() {
            if previous[idx].is_agent() && !self.material_map[idx].is_agent() {
                self.thermal_map[idx] = ambient;
            }
        }
    }

    /// Accumulate generation, ambient loss and 4-neighbor conduction for
    /// every tile, then integrate one forward-Euler step.
    pub fn exchange_heat(&mut self) {
        let heat = self.heat_exchange();
        let dt = self.params.time_step_size;
        for (idx, q) in heat.into_iter().enumerate() {
            self.thermal_map[idx] += q / self.heat_capacity_map[idx] * dt;
        }
    }

    fn heat_exchange(&self) -> Vec<f64> {
        let (rows, cols) = (self.rows(), self.cols());
        let geometry = self.params.grid_size;
        let mut heat = vec![0.0_f64; self.thermal_map.len()];

        for row in 0..rows {
            for col in 0..cols {
                let idx = self.thermal_map.index_of(row, col);
                let temp = self.thermal_map[idx];

                heat[idx] += match self.material_map[idx] {
                    Material::Air => {
                        self.params.air_conductivity
                            * geometry
                            * (self.params.ambient_air_temp - temp)
                    }
                    Material::AgentCore => self
                        .tissue_at(idx)
                        .map_or(0.0, |t| t.metabolism * geometry),
                    Material::AgentInternal | Material::AgentExternal => 0.0,
                };

                for (d_row, d_col) in NEIGHBOR_OFFSETS {
                    let (n_row, n_col) = (row as i64 + d_row as i64, col as i64 + d_col as i64);
                    if n_row < 0 || n_col < 0 || n_row >= rows as i64 || n_col >= cols as i64 {
                        continue;
                    }
                    let n_idx = self.thermal_map.index_of(n_row as usize, n_col as usize);
                    let conductance = self.pair_conductance(idx, n_idx);
                    heat[idx] += conductance * (self.thermal_map[n_idx] - temp);
                }
            }
        }
        heat
    }

    /// Inverse of the series resistance of two adjacent tiles.
    fn pair_conductance(&self, a: usize, b: usize) -> f64 {
        let total = self.tile_resistance(a, b) + self.tile_resistance(b, a);
        if total.is_finite() && total > 0.0 {
            1.0 / total
        } else {
            0.0
        }
    }

    /// Resistance contributed by `tile` when conducting towards `other`.
    fn tile_resistance(&self, tile: usize, other: usize) -> f64 {
        let geometry = self.params.grid_size;
        match self.agent_id_map[tile] {
            None => 1.0 / (self.params.air_conductivity * geometry),
            Some(id) => match self.tissues.get(&id) {
                Some(tissue) => {
                    let skin = self.agent_id_map[other] != Some(id);
                    tissue.resistance(geometry, skin)
                }
                None => f64::INFINITY,
            },
        }
    }

    fn tissue_at(&self, idx: usize) -> Option<&Tissue> {
        self.agent_id_map[idx].and_then(|id| self.tissues.get(&id))
    }

    /// Sample each living agent's footprint back out of the thermal map.
    pub fn resample_agents(&self, agents: &mut [Agent]) -> Vec<DeathEvent> {
        let mut deaths = Vec::new();
        for agent in agents.iter_mut().filter(|a| a.is_alive()) {
            let mut body = agent.body_temp().clone();
            let radius = agent.body_radius();
            let center = agent.position();
            let half = radius as i32 - 1;
            for (d_row, d_col) in footprint(radius) {
                if let Some(&temp) = self.thermal_map.at(center.offset(d_row, d_col)) {
                    if let Some(cell) =
                        body.get_mut((d_row + half) as usize, (d_col + half) as usize)
                    {
                        *cell = temp;
                    }
                }
            }
            if let Some(death) = agent.apply_thermal_update(body) {
                deaths.push(death);
            }
        }
        deaths
    }
}
