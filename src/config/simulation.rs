use serde::Deserialize;
use std::path::Path;

use crate::colony::{AgentSpec, EnvironmentParams, MovementPolicy, Thresholds};
use crate::config::sweep::SweepConfig;
use crate::geometry::Position;
use crate::thermal::{ThermalParams, Tissue};

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    pub env: EnvConfig,
    pub penguin: PenguinConfig,
    #[serde(default, rename = "obstacle")]
    pub obstacles: Vec<ObstacleConfig>,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_name")]
    pub name: String,
    /// 0 picks a random seed at startup.
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_true")]
    pub stop_when_extinct: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            name: default_name(),
            seed: 0,
            log_level: default_log_level(),
            stop_when_extinct: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnvConfig {
    /// `[rows, cols]`
    pub env_size: [usize; 2],
    #[serde(default = "default_grid_size")]
    pub grid_size: f64,
    pub time_step_size: f64,
    pub epochs: u64,
    pub air_conductivity: f64,
    pub initial_air_temp: f64,
    pub ambient_air_temp: f64,
    #[serde(default = "default_one")]
    pub air_heat_capacity: f64,
    #[serde(default = "default_one")]
    pub tissue_specific_heat: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PenguinConfig {
    pub count: u32,
    pub body_radius: u32,
    pub sense_radius: i32,
    pub body_temp: f64,
    pub low_death_threshold: f64,
    pub high_death_threshold: f64,
    pub low_move_threshold: f64,
    pub high_move_threshold: f64,
    pub internal_conductivity: f64,
    pub external_conductivity: f64,
    pub insulation_thickness: f64,
    pub density: f64,
    pub movement_speed: u32,
    pub metabolism: f64,
    #[serde(default = "default_policy")]
    pub movement_policy: MovementPolicy,
    #[serde(default = "default_placement_attempts")]
    pub placement_attempts: u32,
}

/// A stationary body placed at a fixed position before the penguins.
#[derive(Debug, Clone, Deserialize)]
pub struct ObstacleConfig {
    pub row: i32,
    pub col: i32,
    pub body_radius: u32,
    pub temperature: f64,
    #[serde(default = "default_one")]
    pub internal_conductivity: f64,
    #[serde(default = "default_one")]
    pub external_conductivity: f64,
    #[serde(default)]
    pub insulation_thickness: f64,
    #[serde(default = "default_one")]
    pub density: f64,
    #[serde(default)]
    pub metabolism: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// JSON-lines frame file; no frames are written when unset.
    #[serde(default)]
    pub frames: Option<String>,
    #[serde(default)]
    pub record_maps: bool,
    #[serde(default = "default_snapshot_directory")]
    pub snapshot_directory: String,
    /// Ticks between snapshots; 0 saves only the final state.
    #[serde(default)]
    pub snapshot_interval: u32,
    #[serde(default = "default_max_snapshots")]
    pub max_snapshots: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            frames: None,
            record_maps: false,
            snapshot_directory: default_snapshot_directory(),
            snapshot_interval: 0,
            max_snapshots: default_max_snapshots(),
        }
    }
}

fn default_name() -> String {
    "colony".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_grid_size() -> f64 {
    1.0
}
fn default_one() -> f64 {
    1.0
}
fn default_policy() -> MovementPolicy {
    MovementPolicy::Average
}
fn default_placement_attempts() -> u32 {
    100
}
fn default_snapshot_directory() -> String {
    "./snapshots".to_string()
}
fn default_max_snapshots() -> u32 {
    10
}

impl SimulationConfig {
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
        Self::from_toml_str(&content, path)
    }

    pub fn from_toml_str(content: &str, source_path: &Path) -> Result<Self, String> {
        let config: SimulationConfig =
            toml::from_str(content).map_err(|e| format!("{}: {}", source_path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        let mut errors = Vec::new();

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            errors.push(format!(
                "general.log_level must be one of {:?}, got '{}'. Example: log_level = \"info\"",
                valid_levels, self.general.log_level
            ));
        }

        let env = &self.env;
        if env.env_size[0] == 0 || env.env_size[1] == 0 {
            errors.push(format!(
                "env.env_size must be at least [1, 1], got {:?}. Example: env_size = [100, 100]",
                env.env_size
            ));
        }
        for (name, value, example) in [
            ("env.grid_size", env.grid_size, "grid_size = 1.0"),
            ("env.time_step_size", env.time_step_size, "time_step_size = 0.01"),
            ("env.air_heat_capacity", env.air_heat_capacity, "air_heat_capacity = 1.0"),
            ("env.tissue_specific_heat", env.tissue_specific_heat, "tissue_specific_heat = 1.0"),
        ] {
            if !(value > 0.0) {
                errors.push(format!("{} must be > 0.0, got {}. Example: {}", name, value, example));
            }
        }
        if !(env.air_conductivity >= 0.0) {
            errors.push(format!(
                "env.air_conductivity must be >= 0.0, got {}. Example: air_conductivity = 1.0",
                env.air_conductivity
            ));
        }

        let p = &self.penguin;
        if p.body_radius == 0 {
            errors.push(
                "penguin.body_radius must be >= 1, got 0. Example: body_radius = 2".to_string(),
            );
        } else {
            let side = 2 * p.body_radius as usize - 1;
            if side > env.env_size[0] || side > env.env_size[1] {
                errors.push(format!(
                    "penguin.body_radius {} needs a {}x{} body, larger than env_size {:?}",
                    p.body_radius, side, side, env.env_size
                ));
            }
        }
        for (name, value, example) in [
            ("penguin.internal_conductivity", p.internal_conductivity, "internal_conductivity = 1.0"),
            ("penguin.external_conductivity", p.external_conductivity, "external_conductivity = 1.0"),
            ("penguin.density", p.density, "density = 1.0"),
        ] {
            if !(value > 0.0) {
                errors.push(format!("{} must be > 0.0, got {}. Example: {}", name, value, example));
            }
        }
        if !(p.insulation_thickness >= 0.0) {
            errors.push(format!(
                "penguin.insulation_thickness must be >= 0.0, got {}. Example: insulation_thickness = 1.0",
                p.insulation_thickness
            ));
        }
        if p.low_death_threshold > p.high_death_threshold {
            errors.push(format!(
                "penguin.low_death_threshold ({}) must not exceed high_death_threshold ({})",
                p.low_death_threshold, p.high_death_threshold
            ));
        }
        if p.low_move_threshold > p.high_move_threshold {
            errors.push(format!(
                "penguin.low_move_threshold ({}) must not exceed high_move_threshold ({})",
                p.low_move_threshold, p.high_move_threshold
            ));
        }
        if p.placement_attempts == 0 {
            errors.push(
                "penguin.placement_attempts must be > 0, got 0. Example: placement_attempts = 100"
                    .to_string(),
            );
        }

        for (i, obstacle) in self.obstacles.iter().enumerate() {
            if obstacle.body_radius == 0 {
                errors.push(format!("obstacle[{}].body_radius must be >= 1, got 0", i));
            }
            if !(obstacle.internal_conductivity > 0.0
                && obstacle.external_conductivity > 0.0
                && obstacle.density > 0.0)
            {
                errors.push(format!(
                    "obstacle[{}] conductivities and density must be > 0.0",
                    i
                ));
            }
        }

        if self.output.max_snapshots == 0 {
            errors.push(
                "output.max_snapshots must be > 0, got 0. Example: max_snapshots = 10".to_string(),
            );
        }

        if let Err(e) = self.sweep.validate() {
            errors.push(e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("\n"))
        }
    }

    /// Environment construction input, using `seed` in place of the
    /// configured one (which may be 0 = random).
    pub fn environment(&self, seed: u64) -> EnvironmentParams {
        EnvironmentParams {
            rows: self.env.env_size[0],
            cols: self.env.env_size[1],
            thermal: ThermalParams {
                air_conductivity: self.env.air_conductivity,
                initial_air_temp: self.env.initial_air_temp,
                ambient_air_temp: self.env.ambient_air_temp,
                grid_size: self.env.grid_size,
                time_step_size: self.env.time_step_size,
                air_heat_capacity: self.env.air_heat_capacity,
                tissue_specific_heat: self.env.tissue_specific_heat,
            },
            seed,
        }
    }

    /// Template for random penguin placement; the position is a placeholder.
    pub fn penguin_spec(&self) -> AgentSpec {
        let p = &self.penguin;
        AgentSpec {
            position: Position::new(0, 0),
            body_radius: p.body_radius,
            sense_radius: p.sense_radius,
            body_temp: p.body_temp,
            thresholds: Thresholds {
                low_death: p.low_death_threshold,
                high_death: p.high_death_threshold,
                low_move: p.low_move_threshold,
                high_move: p.high_move_threshold,
            },
            tissue: Tissue {
                internal_conductivity: p.internal_conductivity,
                external_conductivity: p.external_conductivity,
                insulation_thickness: p.insulation_thickness,
                density: p.density,
                metabolism: p.metabolism,
            },
            movement_policy: p.movement_policy,
            movement_speed: p.movement_speed,
        }
    }
}

impl ObstacleConfig {
    /// Obstacles never move, sense nothing and cannot die.
    pub fn spec(&self) -> AgentSpec {
        AgentSpec {
            position: Position::new(self.row, self.col),
            body_radius: self.body_radius,
            sense_radius: 0,
            body_temp: self.temperature,
            thresholds: Thresholds {
                low_death: f64::NEG_INFINITY,
                high_death: f64::INFINITY,
                low_move: f64::NEG_INFINITY,
                high_move: f64::INFINITY,
            },
            tissue: Tissue {
                internal_conductivity: self.internal_conductivity,
                external_conductivity: self.external_conductivity,
                insulation_thickness: self.insulation_thickness,
                density: self.density,
                metabolism: self.metabolism,
            },
            movement_policy: MovementPolicy::Stationary,
            movement_speed: 0,
        }
    }
}
