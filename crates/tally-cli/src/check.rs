//! `tally check`: randomized parity run on CPU.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

use tally_core::{Result, Tensor};
use tally_kernels::{column_max, grouped_count, grouped_count_dense, verify_equal};

/// Returns the number of comparisons made; stops at the first mismatch.
pub fn run(trials: usize, seed: u64) -> Result<usize> {
    let mut checks = known_cases()?;
    let mut rng = StdRng::seed_from_u64(seed);

    for trial in 0..trials {
        let rows = rng.gen_range(1..64);
        let cols = rng.gen_range(1..64);
        debug!("trial {trial}: {rows}x{cols}");

        let a = Tensor::rand_uniform_with(&mut rng, &[rows, cols], -10.0, 10.0);
        for axis in 0..2 {
            verify_equal("column_max", &column_max(&a, axis)?, &a.max_axis(axis)?)?;
            checks += 1;
        }

        let v = Tensor::rand_uniform_with(&mut rng, &[rows], -10.0, 10.0);
        verify_equal("column_max_1d", &column_max(&v, 0)?, &v.max()?.reshape(&[1])?)?;
        checks += 1;

        // every value in 0..=max present, so the run counts line up with bincount
        let max_value = rng.gen_range(0..32i64);
        let mut data: Vec<i64> = (0..=max_value).collect();
        let extra = rng.gen_range(0..256usize);
        data.extend((0..extra).map(|_| rng.gen_range(0..=max_value)));
        data.shuffle(&mut rng);
        let counted = Tensor::from_i64(&data, &[data.len()]);
        let reference = counted.bincount()?;
        verify_equal("grouped_count", &grouped_count(&counted)?, &reference)?;
        verify_equal("grouped_count_dense", &grouped_count_dense(&counted)?, &reference)?;
        checks += 2;

        let sparse = Tensor::randint_with(&mut rng, &[rows * cols], 0, 4 * rows as i64 + 1);
        verify_equal("grouped_count_dense", &grouped_count_dense(&sparse)?, &sparse.bincount()?)?;
        let before = grouped_count(&sparse)?;
        let mut shuffled = sparse.to_i64_vec()?;
        shuffled.shuffle(&mut rng);
        let after = grouped_count(&Tensor::from_i64(&shuffled, &[shuffled.len()]))?;
        verify_equal("grouped_count_shuffled", &after, &before)?;
        checks += 2;
    }
    Ok(checks)
}

fn known_cases() -> Result<usize> {
    let m = Tensor::from_f32(&[1.0, 5.0, 3.0, 2.0, 0.0, 9.0], &[3, 2]);
    verify_equal("column_max", &column_max(&m, 0)?, &Tensor::from_f32(&[3.0, 9.0], &[2]))?;
    verify_equal("column_max", &column_max(&m, 1)?, &Tensor::from_f32(&[5.0, 3.0, 9.0], &[3]))?;

    let v = Tensor::from_i64(&[0, 0, 1, 2, 2, 2, 5], &[7]);
    verify_equal("bincount", &v.bincount()?, &Tensor::from_i64(&[2, 1, 3, 0, 0, 1], &[6]))?;
    verify_equal("grouped_count", &grouped_count(&v)?, &Tensor::from_i64(&[2, 1, 3, 1], &[4]))?;
    verify_equal("grouped_count_dense", &grouped_count_dense(&v)?, &v.bincount()?)?;
    Ok(5)
}
