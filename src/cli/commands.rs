use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::colony::populate::populate;
use crate::colony::{
    AgentId, Colony, ColonyObserver, Frame, NullObserver, RunSummary, TracingObserver,
};
use crate::config::simulation::SimulationConfig;
use crate::config::sweep::SweepCase;
use crate::persistence;

/// Command-line overrides for `huddle run`.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub resume: Option<PathBuf>,
    pub epochs: Option<u64>,
    pub frames: Option<PathBuf>,
}

/// A configured seed of 0 means "pick one now".
pub fn resolve_seed(configured: u64) -> u64 {
    if configured == 0 {
        rand::random::<u64>() | 1
    } else {
        configured
    }
}

/// Build a fresh colony: obstacles first at their fixed positions, then
/// penguins at random positions.
pub fn build_colony(
    config: &SimulationConfig,
    seed: u64,
    observer: &mut dyn ColonyObserver,
) -> Result<Colony, String> {
    let mut colony = Colony::new(config.environment(seed))
        .map_err(|e| format!("Invalid environment: {}", e))?;

    for (i, obstacle) in config.obstacles.iter().enumerate() {
        let placed = colony
            .add_agent(&obstacle.spec(), observer)
            .map_err(|e| format!("obstacle[{}]: {}", i, e))?;
        if !placed {
            return Err(format!(
                "obstacle[{}] at ({}, {}) is out of bounds or overlaps another obstacle",
                i, obstacle.row, obstacle.col
            ));
        }
    }

    let template = config.penguin_spec();
    let placed = populate(
        &mut colony,
        &template,
        config.penguin.count,
        config.penguin.placement_attempts,
        observer,
    )
    .map_err(|e| format!("Cannot place penguins: {}", e))?;

    if placed < config.penguin.count {
        warn!(
            requested = config.penguin.count,
            placed,
            attempts = config.penguin.placement_attempts,
            "Grid too crowded, placed fewer penguins than requested"
        );
    }
    Ok(colony)
}

struct FrameWriter {
    out: BufWriter<File>,
    path: PathBuf,
    record_maps: bool,
}

impl FrameWriter {
    fn create(path: &Path, record_maps: bool) -> Result<Self, String> {
        let file = File::create(path)
            .map_err(|e| format!("Cannot create frame file {}: {}", path.display(), e))?;
        Ok(FrameWriter {
            out: BufWriter::new(file),
            path: path.to_path_buf(),
            record_maps,
        })
    }

    fn write(&mut self, colony: &Colony) -> Result<(), String> {
        let line = Frame::capture(colony, self.record_maps).to_json_line()?;
        writeln!(self.out, "{}", line)
            .map_err(|e| format!("Cannot write {}: {}", self.path.display(), e))
    }

    fn finish(mut self) -> Result<(), String> {
        self.out
            .flush()
            .map_err(|e| format!("Cannot flush {}: {}", self.path.display(), e))
    }
}

fn save_and_prune(colony: &Colony, snapshot_dir: &Path, max_snapshots: u32) {
    match persistence::save_snapshot(colony, snapshot_dir) {
        Ok(path) => {
            info!(tick = colony.tick_count(), path = %path.display(), "Snapshot saved");
            if let Err(e) = persistence::prune_snapshots(snapshot_dir, max_snapshots as usize) {
                warn!(error = %e, "Snapshot pruning failed");
            }
        }
        Err(e) => warn!(tick = colony.tick_count(), error = %e, "Snapshot save failed"),
    }
}

/// Run the simulation: build or resume the colony, tick it, stream frames
/// and save snapshots along the way.
pub fn run_simulation(config: &SimulationConfig, options: &RunOptions) -> Result<RunSummary, String> {
    let mut observer = TracingObserver;

    let mut colony = match &options.resume {
        Some(path) => {
            let colony = persistence::load_snapshot(path)
                .map_err(|e| format!("Failed to load snapshot: {}", e))?;
            info!(
                path = %path.display(),
                colony = %colony.id(),
                tick = colony.tick_count(),
                alive = colony.alive_count(),
                "Resumed colony"
            );
            colony
        }
        None => {
            let seed = resolve_seed(config.general.seed);
            let colony = build_colony(config, seed, &mut observer)?;
            info!(
                name = %config.general.name,
                colony = %colony.id(),
                seed,
                agents = colony.agents().len(),
                rows = colony.rows(),
                cols = colony.cols(),
                "Colony created"
            );
            colony
        }
    };

    let epochs = options.epochs.unwrap_or(config.env.epochs);
    let frames_path = options
        .frames
        .clone()
        .or_else(|| config.output.frames.as_ref().map(PathBuf::from));
    let mut frames = match &frames_path {
        Some(path) => Some(FrameWriter::create(path, config.output.record_maps)?),
        None => None,
    };
    if let Some(writer) = frames.as_mut() {
        writer.write(&colony)?;
    }

    let snapshot_dir = PathBuf::from(&config.output.snapshot_directory);
    let interval = config.output.snapshot_interval as u64;
    let milestone = (epochs / 10).max(1);

    let mut ticks_run = 0;
    let mut total_deaths = 0;
    let mut last_statistics = None;

    for _ in 0..epochs {
        if config.general.stop_when_extinct && colony.is_extinct() {
            info!(tick = colony.tick_count(), "Colony extinct, stopping early");
            break;
        }

        let result = colony.tick(&mut observer);
        ticks_run += 1;
        total_deaths += result.deaths.len() as u32;

        if let Some(writer) = frames.as_mut() {
            writer.write(&colony)?;
        }
        if interval > 0 && ticks_run % interval == 0 {
            save_and_prune(&colony, &snapshot_dir, config.output.max_snapshots);
        }
        if ticks_run % milestone == 0 {
            let s = &result.statistics;
            info!(
                tick = s.tick,
                alive = s.alive,
                dead = s.dead,
                mean_core = s.mean_core_temp,
                mean_air = s.mean_air_temp,
                ms = s.tick_duration_ms,
                "Progress"
            );
        }
        last_statistics = Some(result.statistics);
    }

    if let Some(writer) = frames {
        writer.finish()?;
    }
    save_and_prune(&colony, &snapshot_dir, config.output.max_snapshots);

    let summary = RunSummary {
        ticks_run,
        final_tick: colony.tick_count(),
        alive: colony.alive_count() as u32,
        total_deaths,
        extinct: colony.is_extinct(),
        last_statistics,
    };
    info!(
        ticks = summary.ticks_run,
        final_tick = summary.final_tick,
        alive = summary.alive,
        deaths = summary.total_deaths,
        "Simulation finished"
    );
    Ok(summary)
}

/// One finished sweep combination.
#[derive(Debug, Clone, Serialize)]
pub struct SweepOutcome {
    #[serde(flatten)]
    pub case: SweepCase,
    pub placed: u32,
    pub ticks_run: u64,
    pub alive: u32,
    pub total_deaths: u32,
    pub mean_core_temp: f64,
}

fn run_case(config: &SimulationConfig, seed: u64, case: SweepCase) -> Result<SweepOutcome, String> {
    let mut colony = Colony::new(config.environment(seed)).map_err(|e| e.to_string())?;
    let mut template = config.penguin_spec();
    template.body_radius = case.body_radius;
    template.sense_radius = case.sense_radius;
    template.movement_speed = case.movement_speed;

    let placed = populate(
        &mut colony,
        &template,
        case.count,
        config.penguin.placement_attempts,
        &mut NullObserver,
    )
    .map_err(|e| e.to_string())?;

    let summary = colony.run(config.env.epochs, config.general.stop_when_extinct, &mut NullObserver);
    Ok(SweepOutcome {
        case,
        placed,
        ticks_run: summary.ticks_run,
        alive: summary.alive,
        total_deaths: summary.total_deaths,
        mean_core_temp: summary
            .last_statistics
            .map(|s| s.mean_core_temp)
            .unwrap_or(0.0),
    })
}

/// Run every sweep combination as an independent colony, spread across threads.
pub fn sweep(config: &SimulationConfig, output: Option<&Path>) -> Result<Vec<SweepOutcome>, String> {
    let seed = resolve_seed(config.general.seed);
    let cases = config.sweep.combinations();
    info!(combinations = cases.len(), seed, "Starting sweep");

    let results: Vec<Result<SweepOutcome, (SweepCase, String)>> = cases
        .par_iter()
        .map(|&case| run_case(config, seed, case).map_err(|e| (case, e)))
        .collect();

    let mut outcomes = Vec::with_capacity(results.len());
    for result in results {
        match result {
            Ok(outcome) => outcomes.push(outcome),
            Err((case, e)) => warn!(?case, error = %e, "Sweep combination skipped"),
        }
    }

    println!(
        "{:>6} {:>6} {:>6} {:>6} {:>7} {:>6} {:>6} {:>10}",
        "radius", "sense", "count", "speed", "placed", "alive", "dead", "mean core"
    );
    println!("{}", "-".repeat(62));
    for o in &outcomes {
        println!(
            "{:>6} {:>6} {:>6} {:>6} {:>7} {:>6} {:>6} {:>10.2}",
            o.case.body_radius,
            o.case.sense_radius,
            o.case.count,
            o.case.movement_speed,
            o.placed,
            o.alive,
            o.total_deaths,
            o.mean_core_temp
        );
    }

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&outcomes)
            .map_err(|e| format!("Cannot encode sweep results: {}", e))?;
        std::fs::write(path, json)
            .map_err(|e| format!("Cannot write {}: {}", path.display(), e))?;
        info!(path = %path.display(), "Sweep results written");
    }

    Ok(outcomes)
}

/// Print a colony summary, or one agent's state, from a snapshot file.
pub fn inspect(path: &Path, agent: Option<u32>) -> Result<(), String> {
    let colony = persistence::load_snapshot(path)
        .map_err(|e| format!("Failed to load snapshot: {}", e))?;

    match agent {
        Some(id) => inspect_agent(&colony, AgentId(id)),
        None => {
            inspect_colony(&colony);
            Ok(())
        }
    }
}

fn inspect_agent(colony: &Colony, id: AgentId) -> Result<(), String> {
    let agent = colony.agent(id).ok_or_else(|| {
        format!("Agent {} not found (colony has {} agents)", id, colony.agents().len())
    })?;

    let t = agent.thresholds();
    let tissue = agent.tissue();
    println!("=== Agent {} ===", agent.id());
    println!("Alive: {}", agent.is_alive());
    println!("Position: {}", agent.position());
    println!("Body radius: {}", agent.body_radius());
    println!("Sense radius: {}", agent.sense_radius());
    println!("Policy: {:?} (speed {})", agent.movement_policy(), agent.movement_speed());
    println!();
    println!("--- Temperature ---");
    println!("  Core: {:.3}", agent.core_temp());
    println!("  Comfort band: [{:.1}, {:.1}]", t.low_move, t.high_move);
    println!("  Death band: [{:.1}, {:.1}]", t.low_death, t.high_death);
    println!();
    println!("--- Tissue ---");
    println!("  Internal conductivity: {}", tissue.internal_conductivity);
    println!("  External conductivity: {}", tissue.external_conductivity);
    println!("  Insulation thickness: {}", tissue.insulation_thickness);
    println!("  Density: {}", tissue.density);
    println!("  Metabolism: {}", tissue.metabolism);
    println!();
    println!("--- Body field ---");
    let field = agent.body_temp();
    for r in 0..field.rows() {
        let row: Vec<String> = (0..field.cols())
            .map(|c| format!("{:>8.2}", field[field.index_of(r, c)]))
            .collect();
        println!("  {}", row.join(" "));
    }
    Ok(())
}

fn inspect_colony(colony: &Colony) {
    println!("=== Colony {} ===", colony.id());
    println!("Tick: {}", colony.tick_count());
    println!("Grid: {}x{}", colony.rows(), colony.cols());
    println!(
        "Agents: {} ({} alive, {} dead)",
        colony.agents().len(),
        colony.alive_count(),
        colony.agents().len() - colony.alive_count()
    );
    println!();

    let grid = colony.grid();
    let tiles = grid.thermal_map().len().max(1) as f64;
    println!("--- Thermal ---");
    println!("  Mean tile temperature: {:.3}", grid.thermal_map().iter().sum::<f64>() / tiles);
    println!("  Total energy: {:.3}", grid.total_energy());
    println!();

    println!("--- Agents ---");
    println!("  {:>6} {:>12} {:>6} {:>10}", "id", "position", "alive", "core");
    for agent in colony.agents() {
        println!(
            "  {:>6} {:>12} {:>6} {:>10.3}",
            agent.id().to_string(),
            agent.position().to_string(),
            agent.is_alive(),
            agent.core_temp()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use tempfile::TempDir;

    fn config_in(dir: &Path, extra: &str) -> SimulationConfig {
        let toml = format!(
            r#"
            [general]
            seed = 17

            [env]
            env_size = [24, 24]
            time_step_size = 0.01
            epochs = 6
            air_conductivity = 1.0
            initial_air_temp = -30.0
            ambient_air_temp = -30.0

            [penguin]
            count = 5
            body_radius = 2
            sense_radius = 10
            body_temp = 35.0
            low_death_threshold = -40.0
            high_death_threshold = 40.0
            low_move_threshold = 30.0
            high_move_threshold = 38.0
            internal_conductivity = 1.0
            external_conductivity = 1.0
            insulation_thickness = 1.0
            density = 1.0
            movement_speed = 2
            metabolism = 1.0

            [output]
            snapshot_directory = "{}"
            snapshot_interval = 2
            max_snapshots = 2

            {}
            "#,
            dir.join("snapshots").display(),
            extra
        );
        SimulationConfig::from_toml_str(&toml, Path::new("test.toml")).unwrap()
    }

    #[test]
    fn explicit_seed_is_kept() {
        assert_eq!(resolve_seed(42), 42);
        assert_ne!(resolve_seed(0), 0);
    }

    #[test]
    fn build_places_obstacles_before_penguins() {
        let dir = TempDir::new().unwrap();
        let config = config_in(
            dir.path(),
            "[[obstacle]]\nrow = 12\ncol = 12\nbody_radius = 3\ntemperature = -5.0\n",
        );
        let colony = build_colony(&config, 3, &mut NullObserver).unwrap();
        assert_eq!(colony.agents().len(), 6);
        let obstacle = &colony.agents()[0];
        assert_eq!(obstacle.id(), AgentId(0));
        assert_eq!(obstacle.body_radius(), 3);
        assert_eq!(obstacle.core_temp(), -5.0);
    }

    #[test]
    fn conflicting_obstacles_are_an_error() {
        let dir = TempDir::new().unwrap();
        let config = config_in(
            dir.path(),
            "[[obstacle]]\nrow = 5\ncol = 5\nbody_radius = 2\ntemperature = 0.0\n\n\
             [[obstacle]]\nrow = 5\ncol = 6\nbody_radius = 2\ntemperature = 0.0\n",
        );
        let err = build_colony(&config, 3, &mut NullObserver).unwrap_err();
        assert!(err.contains("obstacle[1]"));
    }

    #[test]
    fn run_writes_frames_and_snapshots() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path(), "");
        let frames = dir.path().join("frames.jsonl");
        let options = RunOptions {
            frames: Some(frames.clone()),
            ..RunOptions::default()
        };

        let summary = run_simulation(&config, &options).unwrap();
        assert_eq!(summary.ticks_run, 6);
        assert_eq!(summary.final_tick, 6);

        let lines: Vec<String> = BufReader::new(File::open(&frames).unwrap())
            .lines()
            .map(|l| l.unwrap())
            .collect();
        assert_eq!(lines.len(), 7);
        let last: Frame = serde_json::from_str(&lines[6]).unwrap();
        assert_eq!(last.tick, 6);
        assert_eq!(last.agents.len(), 5);
        assert!(last.thermal_map.is_none());

        let snapshots = persistence::list_snapshots(&dir.path().join("snapshots")).unwrap();
        assert!(!snapshots.is_empty());
        assert!(snapshots.len() <= 2);
    }

    #[test]
    fn resume_continues_from_snapshot_tick() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path(), "");
        let snapshot_dir = dir.path().join("snapshots");

        let colony = build_colony(&config, 8, &mut NullObserver).unwrap();
        let path = persistence::save_snapshot(&colony, &snapshot_dir).unwrap();

        let options = RunOptions {
            resume: Some(path),
            epochs: Some(3),
            ..RunOptions::default()
        };
        let summary = run_simulation(&config, &options).unwrap();
        assert_eq!(summary.final_tick, 3);
    }

    #[test]
    fn small_sweep_runs_every_combination() {
        let dir = TempDir::new().unwrap();
        let config = config_in(
            dir.path(),
            "[sweep]\nbody_radii = [1, 2]\nsense_radii = [5]\ncounts = [3]\nmovement_speeds = [1, 4]\n",
        );
        let output = dir.path().join("sweep.json");

        let outcomes = sweep(&config, Some(&output)).unwrap();
        assert_eq!(outcomes.len(), 4);
        assert!(outcomes.iter().all(|o| o.placed == 3));

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(written.as_array().map(Vec::len), Some(4));
        assert!(written[0].get("body_radius").is_some());
    }

    #[test]
    fn inspect_unknown_agent_errors() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path(), "");
        let colony = build_colony(&config, 8, &mut NullObserver).unwrap();
        let path = persistence::save_snapshot(&colony, dir.path()).unwrap();

        assert!(inspect(&path, None).is_ok());
        assert!(inspect(&path, Some(0)).is_ok());
        let err = inspect(&path, Some(99)).unwrap_err();
        assert!(err.contains("not found"));
    }
}
