use serde::{Deserialize, Serialize};

/// Material class of a single grid tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Material {
    Air = 0,
    AgentCore = 1,
    AgentInternal = 2,
    AgentExternal = 3,
}

impl Material {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn is_agent(self) -> bool {
        self != Material::Air
    }

    /// Classify a body offset of an agent with the given radius.
    ///
    /// The center is always the core, even for radius-1 bodies whose only
    /// cell is also the outer ring.
    pub fn classify(d_row: i32, d_col: i32, radius: u32) -> Material {
        if d_row == 0 && d_col == 0 {
            Material::AgentCore
        } else if crate::geometry::is_boundary_offset(d_row, d_col, radius) {
            Material::AgentExternal
        } else {
            Material::AgentInternal
        }
    }
}

/// Physical constants of an agent's body.
///
/// All conductivities and the density must be strictly positive; the grid
/// divides by them without further checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tissue {
    pub internal_conductivity: f64,
    pub external_conductivity: f64,
    pub insulation_thickness: f64,
    pub density: f64,
    /// Heat generated per tick at the core tile.
    pub metabolism: f64,
}

impl Tissue {
    /// Resistance of one tissue tile in a conduction pair.
    ///
    /// `skin` adds the insulation layer for pairs that leave the body.
    pub fn resistance(&self, geometry: f64, skin: bool) -> f64 {
        let bulk = 1.0 / (self.internal_conductivity * geometry);
        if skin {
            bulk + 1.0 / (self.external_conductivity * geometry / self.insulation_thickness)
        } else {
            bulk
        }
    }

    pub fn heat_capacity(&self, grid_size: f64, specific_heat: f64) -> f64 {
        self.density * grid_size * grid_size * specific_heat
    }
}
