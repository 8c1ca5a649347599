//! dpol command-line interface.
//!
//! Runs acceptance sweeps and streaming surveys over a raw QMD event tree.
//! Log verbosity is controlled through `RUST_LOG`.

use clap::{Parser, Subcommand};
use dpol_algorithms::{CutLevel, GeometryFilter, Stage};
use dpol_core::PolarizationType;
use dpol_io::{write_json, DataRoot, DatasetCatalog};
use dpol_sweep::{
    ConfigurationStatus, Survey, SurveyConfig, SweepConfig, SweepReport, SweepRunner,
};
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("Data error: {0}")]
    Data(#[from] dpol_io::Error),

    #[error("Geometry error: {0}")]
    Algorithm(#[from] dpol_algorithms::Error),

    #[error("Sweep error: {0}")]
    Sweep(#[from] dpol_sweep::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Acceptance and asymmetry analysis of simulated deuteron breakup events.
#[derive(Parser)]
#[command(name = "dpol")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a configuration sweep described by a JSON file
    Sweep {
        /// Sweep descriptor (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Output directory, overriding the descriptor's `output_root`
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Stream raw events through nested cut levels
    Survey {
        /// Root of the raw event tree
        #[arg(short, long)]
        data_root: PathBuf,

        /// Target nucleus
        #[arg(short, long, default_value = "Pb208")]
        target: String,

        /// Polarization type (zpol or ypol)
        #[arg(short, long, default_value = "zpol")]
        pol: PolarizationType,

        /// Gamma labels
        #[arg(long, value_delimiter = ',', default_values = ["050", "060", "070", "080"])]
        gammas: Vec<String>,

        /// Cut levels to accumulate
        #[arg(long, value_delimiter = ',', default_values_t = CutLevel::ALL.to_vec())]
        levels: Vec<CutLevel>,

        /// Capacity of each 3D reservoir
        #[arg(long, default_value = "20000")]
        capacity: usize,

        /// Master seed
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Write the bucket summary here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the geometry of one field strength and deflection angle
    Geometry {
        /// Field strength (T)
        #[arg(short, long)]
        field: f64,

        /// Deflection angle (deg)
        #[arg(short, long)]
        angle: f64,

        /// Save the snapshot as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the datasets present under a data root
    Datasets {
        /// Root of the raw event tree
        #[arg(short, long)]
        data_root: PathBuf,

        /// Restrict to one polarization type
        #[arg(short, long)]
        pol: Option<PolarizationType>,

        /// Restrict the gamma listing to one target
        #[arg(short, long)]
        target: Option<String>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Sweep { config, output } => {
            let mut sweep = SweepConfig::load(&config)?;
            if let Some(dir) = output {
                sweep = sweep.with_output_root(dir);
            }
            let start = Instant::now();
            let report = SweepRunner::new(sweep)?.run()?;
            print_sweep(&report);
            println!("Finished in {:.2}s", start.elapsed().as_secs_f64());
        }

        Commands::Survey {
            data_root,
            target,
            pol,
            gammas,
            levels,
            capacity,
            seed,
            output,
        } => {
            let config = SurveyConfig::new(data_root, pol)
                .with_target(target)
                .with_gamma_values(gammas)
                .with_levels(levels)
                .with_reservoir_capacity(capacity)
                .with_master_seed(seed);
            let summary = Survey::new(config)?.run().summary();
            match output {
                Some(path) => {
                    write_json(&path, &summary)?;
                    println!("Wrote {} buckets to {}", summary.len(), path.display());
                }
                None => println!("{}", serde_json::to_string_pretty(&summary)?),
            }
        }

        Commands::Geometry {
            field,
            angle,
            output,
        } => {
            let geometry = GeometryFilter::new(field, angle)?;
            println!("{geometry}");
            if let Some(path) = output {
                geometry.save(&path)?;
                println!("Saved snapshot to {}", path.display());
            }
        }

        Commands::Datasets {
            data_root,
            pol,
            target,
        } => {
            let root = DataRoot::new(data_root);
            root.require()?;
            let catalog = DatasetCatalog::scan(&root, pol)?;
            for pol_type in [PolarizationType::Z, PolarizationType::Y] {
                let folders = catalog.folders(pol_type);
                if folders.is_empty() {
                    continue;
                }
                println!("{pol_type} ({} folders)", folders.len());
                for name in folders {
                    println!("  {name}");
                }
            }
            println!("Targets: {}", catalog.targets().join(", "));
            println!("Gammas:  {}", catalog.gammas(target.as_deref()).join(", "));
        }
    }

    Ok(())
}

fn print_sweep(report: &SweepReport) {
    println!(
        "{:<36} | {:<9} | {:>10} | {:>10} | {:>10}",
        "Configuration", "Status", "Events", "After cut", "After geo"
    );
    println!("{:-<87}", "");
    for result in &report.configurations {
        let status = match result.status {
            ConfigurationStatus::Completed => "ok",
            ConfigurationStatus::NoData => "no data",
            ConfigurationStatus::Failed => "failed",
        };
        let totals = |stage: Stage| result.total_events(stage);
        println!(
            "{:<36} | {:<9} | {:>10} | {:>10} | {:>10}",
            result.key,
            status,
            totals(Stage::BeforeCut),
            totals(Stage::AfterCut),
            totals(Stage::AfterGeometry)
        );
        if let Some(err) = &result.error {
            println!("    {err}");
        }
    }
}
