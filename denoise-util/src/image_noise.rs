#![allow(dead_code)]

use ndarray::Array4;
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Default corruption used for the denoising task. The mean sits at 0.5,
/// not 0, so noisy images skew brighter than the clean ones; the shift is
/// part of the task definition.
pub const NOISE_MEAN: f32 = 0.5;
pub const NOISE_STD: f32 = 0.5;

/// Corrupt a normalized image stack with independent Gaussian draws, then
/// clamp every pixel back into `[0, 1]`. Saturates rather than rejecting
/// out-of-range values, so the invariant holds for any `mean`/`std`.
/// Shape is preserved exactly.
pub fn add_gaussian_noise<R: Rng>(
    clean: &Array4<f32>,
    mean: f32,
    std: f32,
    rng: &mut R,
) -> anyhow::Result<Array4<f32>> {
    let gaussian = Normal::new(mean, std)?;

    Ok(clean.mapv(|x| (x + gaussian.sample(rng)).clamp(0.0, 1.0)))
}
