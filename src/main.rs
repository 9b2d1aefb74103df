use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use huddle::cli::commands::{self, RunOptions};
use huddle::config::simulation::SimulationConfig;
use huddle::persistence;

#[derive(Parser)]
#[command(name = "huddle")]
#[command(about = "Thermal colony simulation: penguins huddling on a heat-conducting grid")]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a colony for the configured number of epochs
    Run {
        /// Resume from a snapshot file instead of placing a new colony
        #[arg(short, long)]
        resume: Option<PathBuf>,

        /// Override env.epochs
        #[arg(short, long)]
        epochs: Option<u64>,

        /// Write JSON-lines frames to this path
        #[arg(short, long)]
        frames: Option<PathBuf>,
    },

    /// Run every combination of the [sweep] parameter lists
    Sweep {
        /// Write results as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Inspect a colony snapshot
    Inspect {
        /// Snapshot file
        file: PathBuf,

        /// Show a single agent
        #[arg(short, long)]
        agent: Option<u32>,
    },

    /// Manage colony snapshots
    Snapshots {
        #[command(subcommand)]
        action: SnapshotAction,
    },
}

#[derive(Subcommand)]
enum SnapshotAction {
    /// List available snapshots
    List {
        /// Snapshot directory
        #[arg(short, long, default_value = "snapshots")]
        dir: String,
    },
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

fn load_config(path: &str) -> SimulationConfig {
    match SimulationConfig::from_file(Path::new(path)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            std::process::exit(1);
        }
    }
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            resume,
            epochs,
            frames,
        } => {
            let config = load_config(&cli.config);
            let level = cli.log_level.as_deref().unwrap_or(&config.general.log_level);
            init_tracing(level, cli.log_json);

            let options = RunOptions {
                resume,
                epochs,
                frames,
            };
            match commands::run_simulation(&config, &options) {
                Ok(summary) => {
                    println!(
                        "Finished at tick {}: {} alive, {} died{}",
                        summary.final_tick,
                        summary.alive,
                        summary.total_deaths,
                        if summary.extinct { " (extinct)" } else { "" }
                    );
                }
                Err(e) => {
                    eprintln!("Simulation error: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Sweep { output } => {
            let config = load_config(&cli.config);
            let level = cli.log_level.as_deref().unwrap_or(&config.general.log_level);
            init_tracing(level, cli.log_json);

            if let Err(e) = commands::sweep(&config, output.as_deref()) {
                eprintln!("Sweep error: {}", e);
                std::process::exit(1);
            }
        }

        Commands::Inspect { file, agent } => {
            init_tracing(cli.log_level.as_deref().unwrap_or("warn"), cli.log_json);
            if let Err(e) = commands::inspect(&file, agent) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }

        Commands::Snapshots { action } => match action {
            SnapshotAction::List { dir } => {
                let snapshot_dir = Path::new(&dir);
                match persistence::list_snapshots(snapshot_dir) {
                    Ok(snapshots) => {
                        if snapshots.is_empty() {
                            println!("No snapshots found in {}", snapshot_dir.display());
                        } else {
                            println!("{:<40} {:>8} {:>12}", "File", "Tick", "Size");
                            println!("{}", "-".repeat(62));
                            for s in &snapshots {
                                let name = s
                                    .path
                                    .file_name()
                                    .and_then(|n| n.to_str())
                                    .unwrap_or("?");
                                println!("{:<40} {:>8} {:>9} KB", name, s.tick_count, s.file_size / 1024);
                            }
                            println!(
                                "\n{} snapshot(s) in {}",
                                snapshots.len(),
                                snapshot_dir.display()
                            );
                        }
                    }
                    Err(e) => {
                        eprintln!("Error listing snapshots: {}", e);
                        std::process::exit(1);
                    }
                }
            }
        },
    }
}
