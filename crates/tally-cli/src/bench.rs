//! `tally bench`: time the composed kernels against the built-in ops.

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

use tally_core::{Device, Result, Tensor};
use tally_kernels::{
    column_max, covers_contiguous_range, grouped_count, grouped_count_dense, time_it,
    verify_equal, BenchStats,
};

use crate::config::BenchConfig;

fn print_header() {
    println!(
        "{:<22} {:>14} {:>14} {:>10}",
        "Op", "Custom (ms)", "Builtin (ms)", "Speedup"
    );
    println!("{}", "-".repeat(63));
}

fn print_row(name: &str, custom: &BenchStats, builtin: &BenchStats) {
    println!(
        "{:<22} {:>12.3}ms {:>12.3}ms {:>9.2}x",
        name,
        custom.mean * 1000.0,
        builtin.mean * 1000.0,
        custom.speedup_over(builtin),
    );
}

/// Run the benchmark described by `cfg`, which must have passed
/// [`BenchConfig::validate`]. Parity is checked after each pair of timings
/// and the first mismatch is returned as an error.
pub fn run(cfg: &BenchConfig, device: Device) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(cfg.seed);
    info!(
        "generating {}x{} matrix and {} values on {}",
        cfg.rows, cfg.cols, cfg.len, device
    );
    let matrix =
        Tensor::rand_uniform_with(&mut rng, &[cfg.rows, cfg.cols], -1.0, 1.0).to(device)?;
    let values =
        Tensor::randint_with(&mut rng, &[cfg.len], 0, cfg.max_value + 1).to(device)?;

    println!("=== tally Benchmark ===");
    println!(
        "Device: {}  matrix: {}x{}  len: {}  max_value: {}  iters: {} (+{} warmup)\n",
        device, cfg.rows, cfg.cols, cfg.len, cfg.max_value, cfg.iters, cfg.warmup
    );
    print_header();

    for axis in 0..2 {
        let custom = time_it(device, cfg.warmup, cfg.iters, || {
            column_max(&matrix, axis).map(drop)
        })?;
        let builtin = time_it(device, cfg.warmup, cfg.iters, || {
            matrix.max_axis(axis).map(drop)
        })?;
        print_row(&format!("column_max axis={axis}"), &custom, &builtin);
        verify_equal("column_max", &column_max(&matrix, axis)?, &matrix.max_axis(axis)?)?;
    }

    let custom = time_it(device, cfg.warmup, cfg.iters, || grouped_count(&values).map(drop))?;
    let dense = time_it(device, cfg.warmup, cfg.iters, || {
        grouped_count_dense(&values).map(drop)
    })?;
    let builtin = time_it(device, cfg.warmup, cfg.iters, || values.bincount().map(drop))?;
    print_row("grouped_count", &custom, &builtin);
    print_row("grouped_count_dense", &dense, &builtin);

    let reference = values.bincount()?;
    verify_equal("grouped_count_dense", &grouped_count_dense(&values)?, &reference)?;
    if covers_contiguous_range(&reference)? {
        verify_equal("grouped_count", &grouped_count(&values)?, &reference)?;
    } else {
        warn!("input skips values below its maximum; grouped_count reports distinct-rank counts");
    }

    println!("\nParity: ok");
    Ok(())
}
