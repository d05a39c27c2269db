//! Wall-clock timing that waits for queued device work.

use std::fmt;
use std::time::Instant;

use tally_core::{Device, Result};

/// Summary of repeated timings, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BenchStats {
    pub iters: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
}

impl BenchStats {
    /// Summarize raw per-iteration durations.
    pub fn from_samples(samples: &[f64]) -> Self {
        let iters = samples.len();
        if iters == 0 {
            return Self { iters, mean: 0.0, min: 0.0, max: 0.0, std_dev: 0.0 };
        }
        let mean = samples.iter().sum::<f64>() / iters as f64;
        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let var = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / iters as f64;
        Self { iters, mean, min, max, std_dev: var.sqrt() }
    }

    /// How many times faster `self` is than `baseline` (by mean).
    pub fn speedup_over(&self, baseline: &BenchStats) -> f64 {
        if self.mean == 0.0 {
            return f64::INFINITY;
        }
        baseline.mean / self.mean
    }
}

impl fmt::Display for BenchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.3}ms ± {:.3}ms (min {:.3}ms, max {:.3}ms, n={})",
            self.mean * 1000.0,
            self.std_dev * 1000.0,
            self.min * 1000.0,
            self.max * 1000.0,
            self.iters
        )
    }
}

/// Run `f` `warmup` times untimed, then time `iters` calls.
///
/// `device.synchronize()` runs after every call so asynchronous GPU work is
/// charged to the call that queued it. The first error from `f` aborts.
pub fn time_it<F>(device: Device, warmup: usize, iters: usize, mut f: F) -> Result<BenchStats>
where
    F: FnMut() -> Result<()>,
{
    for _ in 0..warmup {
        f()?;
        device.synchronize()?;
    }

    let mut samples = Vec::with_capacity(iters);
    for _ in 0..iters {
        let start = Instant::now();
        f()?;
        device.synchronize()?;
        samples.push(start.elapsed().as_secs_f64());
    }
    Ok(BenchStats::from_samples(&samples))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::TallyError;

    #[test]
    fn test_stats_from_samples() {
        let s = BenchStats::from_samples(&[1.0, 2.0, 3.0]);
        assert_eq!(s.iters, 3);
        assert_eq!(s.mean, 2.0);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 3.0);
        assert!((s.std_dev - (2.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_stats_empty() {
        let s = BenchStats::from_samples(&[]);
        assert_eq!(s.iters, 0);
        assert_eq!(s.mean, 0.0);
    }

    #[test]
    fn test_speedup() {
        let fast = BenchStats::from_samples(&[0.5]);
        let slow = BenchStats::from_samples(&[2.0]);
        assert_eq!(fast.speedup_over(&slow), 4.0);
    }

    #[test]
    fn test_time_it_counts_calls() {
        let mut calls = 0;
        let stats = time_it(Device::Cpu, 2, 5, || {
            calls += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(calls, 7);
        assert_eq!(stats.iters, 5);
        assert!(stats.min <= stats.mean && stats.mean <= stats.max);
    }

    #[test]
    fn test_time_it_propagates_error() {
        let mut calls = 0;
        let result = time_it(Device::Cpu, 0, 10, || {
            calls += 1;
            Err(TallyError::StorageError("boom".into()))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_display_ms() {
        let s = BenchStats::from_samples(&[0.002]);
        assert!(s.to_string().starts_with("2.000ms"));
    }
}
