pub mod agent;
pub mod frame;
pub mod observer;
pub mod populate;
pub mod spatial;
pub mod statistics;

use std::time::Instant;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::Position;
use crate::thermal::{ThermalGrid, ThermalParams};
pub use agent::{Agent, AgentId, AgentSpec, DeathCause, DeathEvent, MovementPolicy, Thresholds};
pub use frame::Frame;
pub use observer::{ColonyObserver, NullObserver, TracingObserver};
pub use spatial::SpatialIndex;
pub use statistics::TickStatistics;

use statistics::MoveCounts;

/// Construction-time configuration errors. Never raised by a running tick.
#[derive(Debug, Clone, PartialEq)]
pub enum ColonyError {
    InvalidBodyRadius(u32),
    NonPositive { parameter: &'static str, value: f64 },
    InvertedThresholds { low: &'static str, high: &'static str },
    EnvironmentTooSmall { rows: usize, cols: usize, body_radius: u32 },
    InvalidEnvironment(String),
}

impl std::fmt::Display for ColonyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColonyError::InvalidBodyRadius(r) => {
                write!(f, "body_radius must be >= 1, got {}", r)
            }
            ColonyError::NonPositive { parameter, value } => {
                write!(f, "{} must be a positive finite number, got {}", parameter, value)
            }
            ColonyError::InvertedThresholds { low, high } => {
                write!(f, "{} must not exceed {}", low, high)
            }
            ColonyError::EnvironmentTooSmall {
                rows,
                cols,
                body_radius,
            } => write!(
                f,
                "a {}x{} environment cannot hold a body of radius {}",
                rows, cols, body_radius
            ),
            ColonyError::InvalidEnvironment(msg) => write!(f, "invalid environment: {}", msg),
        }
    }
}

impl std::error::Error for ColonyError {}

/// Plain-data construction input for a colony.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentParams {
    pub rows: usize,
    pub cols: usize,
    pub thermal: ThermalParams,
    /// Seed for shuffling, jitter and random placement.
    pub seed: u64,
}

impl EnvironmentParams {
    pub fn validate(&self) -> Result<(), ColonyError> {
        if self.rows == 0 || self.cols == 0 {
            return Err(ColonyError::InvalidEnvironment(format!(
                "env_size must be at least 1x1, got {}x{}",
                self.rows, self.cols
            )));
        }
        let t = &self.thermal;
        let positive = [
            ("grid_size", t.grid_size),
            ("time_step_size", t.time_step_size),
            ("air_heat_capacity", t.air_heat_capacity),
            ("tissue_specific_heat", t.tissue_specific_heat),
        ];
        for (parameter, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ColonyError::NonPositive { parameter, value });
            }
        }
        if !(t.air_conductivity.is_finite() && t.air_conductivity >= 0.0) {
            return Err(ColonyError::NonPositive {
                parameter: "air_conductivity",
                value: t.air_conductivity,
            });
        }
        for (name, value) in [
            ("initial_air_temp", t.initial_air_temp),
            ("ambient_air_temp", t.ambient_air_temp),
        ] {
            if !value.is_finite() {
                return Err(ColonyError::InvalidEnvironment(format!(
                    "{} must be finite, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Result of executing a single tick.
#[derive(Debug, Clone)]
pub struct TickResult {
    pub statistics: TickStatistics,
    pub deaths: Vec<DeathEvent>,
}

/// Outcome of [`Colony::run`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub ticks_run: u64,
    pub final_tick: u64,
    pub alive: u32,
    pub total_deaths: u32,
    pub extinct: bool,
    pub last_statistics: Option<TickStatistics>,
}

/// Owns the agent population and the thermal grid and advances them one
/// tick at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Colony {
    id: Uuid,
    tick_count: u64,
    index: SpatialIndex,
    agents: Vec<Agent>,
    grid: ThermalGrid,
    next_id: u32,
    rng: ChaCha8Rng,
}

impl Colony {
    pub fn new(env: EnvironmentParams) -> Result<Self, ColonyError> {
        env.validate()?;
        let mut rng = ChaCha8Rng::seed_from_u64(env.seed);
        let id = Uuid::from_bytes(rng.r#gen());
        Ok(Self {
            id,
            tick_count: 0,
            index: SpatialIndex::new(env.rows, env.cols),
            agents: Vec::new(),
            grid: ThermalGrid::new(env.rows, env.cols, env.thermal),
            next_id: 0,
            rng,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn rows(&self) -> usize {
        self.grid.rows()
    }

    pub fn cols(&self) -> usize {
        self.grid.cols()
    }

    /// Every agent ever added, dead ones included, in insertion order.
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id() == id)
    }

    pub fn grid(&self) -> &ThermalGrid {
        &self.grid
    }

    pub fn spatial_index(&self) -> &SpatialIndex {
        &self.index
    }

    pub fn alive_count(&self) -> usize {
        self.agents.iter().filter(|a| a.is_alive()).count()
    }

    /// True once the population has no living agents. Callers decide
    /// whether that ends the run.
    pub fn is_extinct(&self) -> bool {
        self.alive_count() == 0
    }

    /// Error unless a body of `radius` fits inside the grid somewhere.
    pub fn check_fits(&self, radius: u32) -> Result<(), ColonyError> {
        if radius == 0 {
            return Err(ColonyError::InvalidBodyRadius(radius));
        }
        if !self.index.fits(radius) {
            return Err(ColonyError::EnvironmentTooSmall {
                rows: self.rows(),
                cols: self.cols(),
                body_radius: radius,
            });
        }
        Ok(())
    }

    /// A uniformly random center that keeps a body of `radius` in bounds.
    pub fn random_position(&mut self, radius: u32) -> Position {
        let margin = radius as i32 - 1;
        let max_row = (self.rows() as i32 - radius as i32).max(margin);
        let max_col = (self.cols() as i32 - radius as i32).max(margin);
        Position::new(
            self.rng.gen_range(margin..=max_row),
            self.rng.gen_range(margin..=max_col),
        )
    }

    /// Add an agent if its body is in bounds and overlaps no living agent.
    ///
    /// Invalid physical constants, or a body that cannot fit the grid at
    /// all, are errors. A placement conflict returns `Ok(false)`.
    pub fn add_agent(
        &mut self,
        spec: &AgentSpec,
        observer: &mut dyn ColonyObserver,
    ) -> Result<bool, ColonyError> {
        let agent = Agent::new(AgentId(self.next_id), spec)?;
        self.check_fits(agent.body_radius())?;

        let pos = agent.position();
        if !self.index.is_valid_placement(&agent, pos.row, pos.col, &self.agents) {
            return Ok(false);
        }
        self.next_id += 1;
        observer.agent_added(&agent);
        self.agents.push(agent);
        Ok(true)
    }

    /// Advance the colony by one tick.
    ///
    /// Agents act one at a time in a freshly shuffled order; each sees the
    /// positions already committed by the agents before it. After all moves
    /// the thermal grid is stepped, which refreshes body temperatures and
    /// may kill agents.
    pub fn tick(&mut self, observer: &mut dyn ColonyObserver) -> TickResult {
        let tick_start = Instant::now();

        let mut order: Vec<usize> = (0..self.agents.len()).collect();
        order.shuffle(&mut self.rng);

        let mut moves = MoveCounts::default();
        for idx in order {
            let agent = &self.agents[idx];
            if !agent.is_alive() {
                continue;
            }
            let from = agent.position();
            let neighbors = self.index.neighbors_within(agent, &self.agents);
            let to = agent.get_move(&neighbors, &mut self.rng);
            if to == from {
                continue;
            }

            if self.index.is_valid_placement(agent, to.row, to.col, &self.agents) {
                let id = agent.id();
                self.agents[idx].set_position(to);
                moves.committed += 1;
                observer.agent_moved(id, from, to);
            } else {
                moves.rejected += 1;
                observer.move_rejected(agent.id(), from, to);
            }
        }

        let deaths = self.grid.step(&mut self.agents);
        self.tick_count += 1;
        for death in &deaths {
            observer.agent_died(self.tick_count, death);
        }

        let statistics = statistics::compute_statistics(
            self.tick_count,
            &self.agents,
            &self.grid,
            deaths.len() as u32,
            moves,
            tick_start.elapsed().as_secs_f32() * 1000.0,
        );
        observer.tick_completed(&statistics);

        TickResult { statistics, deaths }
    }

    /// Run up to `epochs` ticks. With `stop_when_extinct`, stops after the
    /// tick in which the last agent died (or immediately if none is alive).
    pub fn run(
        &mut self,
        epochs: u64,
        stop_when_extinct: bool,
        observer: &mut dyn ColonyObserver,
    ) -> RunSummary {
        let mut ticks_run = 0;
        let mut total_deaths = 0;
        let mut last_statistics = None;

        for _ in 0..epochs {
            if stop_when_extinct && self.is_extinct() {
                break;
            }
            let result = self.tick(observer);
            ticks_run += 1;
            total_deaths += result.deaths.len() as u32;
            last_statistics = Some(result.statistics);
        }

        RunSummary {
            ticks_run,
            final_tick: self.tick_count,
            alive: self.alive_count() as u32,
            total_deaths,
            extinct: self.is_extinct(),
            last_statistics,
        }
    }

    /// Shape checks used after deserializing a colony.
    pub fn is_consistent(&self) -> bool {
        self.grid.is_consistent()
            && self.agents.iter().all(|a| a.has_valid_body_field())
            && self.index == SpatialIndex::new(self.grid.rows(), self.grid.cols())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colony::spatial::bodies_collide;

    fn env(rows: usize, cols: usize) -> EnvironmentParams {
        EnvironmentParams {
            rows,
            cols,
            thermal: ThermalParams {
                air_conductivity: 1.0,
                initial_air_temp: -60.0,
                ambient_air_temp: -60.0,
                grid_size: 1.0,
                time_step_size: 0.01,
                air_heat_capacity: 1.0,
                tissue_specific_heat: 1.0,
            },
            seed: 42,
        }
    }

    fn penguin(row: i32, col: i32, radius: u32) -> AgentSpec {
        AgentSpec {
            position: Position::new(row, col),
            body_radius: radius,
            sense_radius: 10,
            body_temp: 35.0,
            thresholds: Thresholds {
                low_death: -40.0,
                high_death: 40.0,
                low_move: 30.0,
                high_move: 38.0,
            },
            tissue: crate::thermal::Tissue {
                internal_conductivity: 1.0,
                external_conductivity: 1.0,
                insulation_thickness: 1.0,
                density: 1.0,
                metabolism: 1.0,
            },
            movement_policy: MovementPolicy::Average,
            movement_speed: 1,
        }
    }

    #[derive(Default)]
    struct Recorder {
        added: u32,
        moved: u32,
        rejected: u32,
        died: Vec<AgentId>,
        ticks: Vec<u64>,
    }

    impl ColonyObserver for Recorder {
        fn agent_added(&mut self, _agent: &Agent) {
            self.added += 1;
        }
        fn agent_moved(&mut self, _agent: AgentId, _from: Position, _to: Position) {
            self.moved += 1;
        }
        fn move_rejected(&mut self, _agent: AgentId, _from: Position, _to: Position) {
            self.rejected += 1;
        }
        fn agent_died(&mut self, _tick: u64, event: &DeathEvent) {
            self.died.push(event.agent);
        }
        fn tick_completed(&mut self, statistics: &TickStatistics) {
            self.ticks.push(statistics.tick);
        }
    }

    fn assert_no_living_collisions(colony: &Colony) {
        let living: Vec<_> = colony.agents().iter().filter(|a| a.is_alive()).collect();
        for (i, a) in living.iter().enumerate() {
            assert!(colony.spatial_index().in_bounds(a.position(), a.body_radius()));
            for b in &living[i + 1..] {
                assert!(
                    !bodies_collide(a.position(), a.body_radius(), b.position(), b.body_radius()),
                    "{} and {} collide at tick {}",
                    a.id(),
                    b.id(),
                    colony.tick_count()
                );
            }
        }
    }

    #[test]
    fn invalid_environment_rejected() {
        let mut e = env(20, 20);
        e.thermal.time_step_size = 0.0;
        assert!(matches!(
            Colony::new(e).unwrap_err(),
            ColonyError::NonPositive { parameter: "time_step_size", .. }
        ));

        let mut e = env(20, 20);
        e.thermal.air_conductivity = -1.0;
        assert!(Colony::new(e).is_err());

        assert!(Colony::new(env(0, 20)).is_err());
    }

    #[test]
    fn still_air_is_a_valid_environment() {
        let mut e = env(20, 20);
        e.thermal.air_conductivity = 0.0;
        assert!(Colony::new(e).is_ok());
    }

    #[test]
    fn add_agent_assigns_sequential_ids() {
        let mut colony = Colony::new(env(30, 30)).unwrap();
        let mut rec = Recorder::default();
        assert!(colony.add_agent(&penguin(5, 5, 2), &mut rec).unwrap());
        assert!(!colony.add_agent(&penguin(5, 6, 2), &mut rec).unwrap());
        assert!(colony.add_agent(&penguin(20, 20, 2), &mut rec).unwrap());
        let ids: Vec<_> = colony.agents().iter().map(|a| a.id()).collect();
        assert_eq!(ids, vec![AgentId(0), AgentId(1)]);
        assert_eq!(rec.added, 2);
    }

    #[test]
    fn overlapping_second_agent_is_refused() {
        let mut colony = Colony::new(env(30, 30)).unwrap();
        assert!(colony.add_agent(&penguin(10, 10, 3), &mut NullObserver).unwrap());
        // 3 + 3 - 2 = 4: one short of the minimum separation
        assert!(!colony.add_agent(&penguin(10, 14, 3), &mut NullObserver).unwrap());
        assert!(!colony.add_agent(&penguin(12, 12, 3), &mut NullObserver).unwrap());
        // Exactly touching
        assert!(colony.add_agent(&penguin(10, 15, 3), &mut NullObserver).unwrap());
        assert_eq!(colony.agents().len(), 2);
    }

    #[test]
    fn out_of_bounds_agent_is_refused() {
        let mut colony = Colony::new(env(10, 10)).unwrap();
        assert!(!colony.add_agent(&penguin(0, 5, 2), &mut NullObserver).unwrap());
        assert!(!colony.add_agent(&penguin(5, 9, 2), &mut NullObserver).unwrap());
        assert!(colony.agents().is_empty());
    }

    #[test]
    fn invalid_agent_is_an_error() {
        let mut colony = Colony::new(env(10, 10)).unwrap();
        let mut spec = penguin(5, 5, 2);
        spec.tissue.internal_conductivity = 0.0;
        assert!(colony.add_agent(&spec, &mut NullObserver).is_err());
        assert!(matches!(
            colony.add_agent(&penguin(10, 10, 11), &mut NullObserver).unwrap_err(),
            ColonyError::EnvironmentTooSmall { .. }
        ));
    }

    #[test]
    fn lone_agent_baseline_scenario() {
        let mut colony = Colony::new(env(20, 20)).unwrap();
        assert!(colony.add_agent(&penguin(10, 10, 1), &mut NullObserver).unwrap());

        let result = colony.tick(&mut NullObserver);

        let agent = &colony.agents()[0];
        assert!((agent.position().row - 10).abs() <= 3);
        assert!((agent.position().col - 10).abs() <= 3);
        assert!(agent.is_alive());
        assert!(agent.core_temp() > -40.0 && agent.core_temp() < 40.0);
        assert!(result.deaths.is_empty());
        assert_eq!(result.statistics.tick, 1);
        assert_eq!(result.statistics.alive, 1);
    }

    #[test]
    fn ticks_never_leave_colliding_agents() {
        let mut colony = Colony::new(env(30, 30)).unwrap();
        for (row, col) in [(5, 5), (5, 9), (9, 5), (9, 9), (14, 14), (20, 8), (8, 20), (25, 25)] {
            assert!(colony.add_agent(&penguin(row, col, 2), &mut NullObserver).unwrap());
        }
        let mut rec = Recorder::default();
        for _ in 0..60 {
            colony.tick(&mut rec);
            assert_no_living_collisions(&colony);
        }
        assert_eq!(rec.ticks.len(), 60);
        assert!(rec.moved > 0);
    }

    #[test]
    fn dead_agents_stay_dead_and_in_place() {
        let mut e = env(20, 20);
        e.thermal.time_step_size = 1.0;
        let mut colony = Colony::new(e).unwrap();
        let mut spec = penguin(10, 10, 1);
        spec.tissue.metabolism = 0.0;
        assert!(colony.add_agent(&spec, &mut NullObserver).unwrap());

        let mut rec = Recorder::default();
        let first = colony.tick(&mut rec);
        assert_eq!(first.deaths.len(), 1);
        assert_eq!(rec.died, vec![AgentId(0)]);
        assert!(colony.is_extinct());

        let resting = colony.agents()[0].position();
        let core = colony.agents()[0].core_temp();
        for _ in 0..5 {
            let result = colony.tick(&mut rec);
            assert!(result.deaths.is_empty());
            assert!(!colony.agents()[0].is_alive());
            assert_eq!(colony.agents()[0].position(), resting);
            assert_eq!(colony.agents()[0].core_temp(), core);
        }
        assert_eq!(colony.agents().len(), 1);
        // The corpse no longer occupies the grid
        assert!(colony.grid().material_map().iter().all(|m| !m.is_agent()));
    }

    #[test]
    fn run_stops_on_extinction_when_asked() {
        let mut e = env(20, 20);
        e.thermal.time_step_size = 1.0;
        let mut colony = Colony::new(e).unwrap();
        let mut spec = penguin(10, 10, 1);
        spec.tissue.metabolism = 0.0;
        colony.add_agent(&spec, &mut NullObserver).unwrap();

        let summary = colony.run(50, true, &mut NullObserver);
        assert_eq!(summary.ticks_run, 1);
        assert!(summary.extinct);
        assert_eq!(summary.total_deaths, 1);

        let summary = colony.run(3, false, &mut NullObserver);
        assert_eq!(summary.ticks_run, 3);
        assert_eq!(summary.final_tick, 4);
    }

    #[test]
    fn stationary_agents_hold_position() {
        let mut colony = Colony::new(env(20, 20)).unwrap();
        let mut spec = penguin(10, 10, 2);
        spec.movement_policy = MovementPolicy::Stationary;
        colony.add_agent(&spec, &mut NullObserver).unwrap();
        colony.run(10, true, &mut NullObserver);
        assert_eq!(colony.agents()[0].position(), Position::new(10, 10));
    }

    #[test]
    fn same_seed_same_trajectory() {
        let build = || {
            let mut colony = Colony::new(env(30, 30)).unwrap();
            for (row, col) in [(5, 5), (5, 12), (12, 5), (20, 20)] {
                colony.add_agent(&penguin(row, col, 2), &mut NullObserver).unwrap();
            }
            colony
        };
        let mut a = build();
        let mut b = build();
        a.run(25, true, &mut NullObserver);
        b.run(25, true, &mut NullObserver);
        assert_eq!(a, b);
    }

    #[test]
    fn body_fields_keep_their_shape() {
        let mut colony = Colony::new(env(40, 40)).unwrap();
        for (i, radius) in [1_u32, 2, 3, 4].iter().enumerate() {
            let pos = 6 + 9 * i as i32;
            colony.add_agent(&penguin(pos, pos, *radius), &mut NullObserver).unwrap();
        }
        for _ in 0..10 {
            colony.tick(&mut NullObserver);
            assert!(colony.is_consistent());
        }
    }

    #[test]
    fn frame_captures_agents_and_optional_maps() {
        let mut colony = Colony::new(env(12, 12)).unwrap();
        colony.add_agent(&penguin(6, 6, 2), &mut NullObserver).unwrap();
        colony.tick(&mut NullObserver);

        let bare = Frame::capture(&colony, false);
        assert_eq!(bare.tick, 1);
        assert_eq!(bare.agents.len(), 1);
        assert!(bare.thermal_map.is_none());
        let line = bare.to_json_line().unwrap();
        assert!(!line.contains("thermal_map"));
        assert!(!line.contains('\n'));

        let full = Frame::capture(&colony, true);
        assert_eq!(full.thermal_map.as_ref().map(Vec::len), Some(144));
        let materials = full.material_map.unwrap();
        assert_eq!(materials.iter().filter(|&&m| m == 1).count(), 1);
        assert_eq!(materials.iter().filter(|&&m| m != 0).count(), 5);
    }
}
