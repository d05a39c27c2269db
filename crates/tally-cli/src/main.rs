use std::process::ExitCode;

use clap::Parser;
use thiserror::Error;
use tracing::error;

use tally_core::{Device, TallyError};

mod bench;
mod check;
mod config;

use config::{BenchArgs, BenchConfig, ConfigError};

#[derive(Parser)]
#[command(
    name = "tally",
    about = "Benchmark and parity runner for composed reductions and counters",
    version,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Show platform, thread pool and device availability
    Info,
    /// Time column_max and grouped_count against the built-in ops
    Bench(BenchArgs),
    /// Randomized parity run over generated inputs
    Check {
        /// Number of random trials
        #[arg(long, default_value = "100")]
        trials: usize,
        /// RNG seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },
}

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Tally(#[from] TallyError),
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Info => {
            cmd_info();
            Ok(())
        }
        Commands::Bench(args) => cmd_bench(&args),
        Commands::Check { trials, seed } => cmd_check(trials, seed),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn cmd_info() {
    println!("tally v{}\n", env!("CARGO_PKG_VERSION"));

    println!("Platform");
    println!("  OS:      {}", std::env::consts::OS);
    println!("  Arch:    {}", std::env::consts::ARCH);
    println!("  Threads: {}", rayon::current_num_threads());

    let cuda_built = cfg!(feature = "cuda");
    println!("\nDevices");
    println!("  cpu:  [x]");
    println!("  cuda: {}", if cuda_built { "[x]" } else { "[ ] (built without `cuda` feature)" });
    if cuda_built {
        println!("  GPUs: {}", Device::cuda_device_count());
    }

    println!("\nDTypes");
    println!("  float: f32, f64");
    println!("  int:   i32, i64");
}

fn cmd_bench(args: &BenchArgs) -> Result<(), CliError> {
    let cfg = BenchConfig::resolve(args)?;
    let device = cfg.device()?;
    bench::run(&cfg, device)?;
    Ok(())
}

fn cmd_check(trials: usize, seed: u64) -> Result<(), CliError> {
    let checks = check::run(trials, seed)?;
    println!("{} parity checks passed ({} trials, seed {})", checks, trials, seed);
    Ok(())
}
