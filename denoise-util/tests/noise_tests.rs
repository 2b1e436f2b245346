use approx::assert_abs_diff_eq;
use candle_core::{Device, Tensor};
use denoise_util::image_noise::*;
use denoise_util::image_prep::*;
use ndarray::{Array3, Array4};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[test]
fn normalize_images_test() {
    let raw = Array3::<u8>::from_shape_fn((4, 28, 28), |(i, r, c)| ((i + r + c) % 256) as u8);

    let normalized = normalize_images(&raw);

    assert_eq!(normalized.dim(), (4, 1, 28, 28));
    assert!(normalized.iter().all(|&x| (0.0..=1.0).contains(&x)));

    assert_abs_diff_eq!(normalized[[0, 0, 0, 1]], 1.0 / 255.0);
    assert_abs_diff_eq!(normalized[[3, 0, 27, 27]], 57.0 / 255.0);
}

#[test]
fn noise_is_clipped_test() -> anyhow::Result<()> {
    let clean = Array4::<f32>::from_elem((2, 1, 28, 28), 0.5);
    let mut rng = StdRng::seed_from_u64(42);

    // even absurdly wide noise must saturate into [0, 1]
    let noisy = add_gaussian_noise(&clean, 0.5, 50.0, &mut rng)?;

    assert_eq!(noisy.dim(), clean.dim());
    assert!(noisy.iter().all(|&x| (0.0..=1.0).contains(&x)));

    Ok(())
}

#[test]
fn noise_draws_are_independent_test() -> anyhow::Result<()> {
    let mut rng = StdRng::seed_from_u64(7);
    let clean = Array4::<f32>::from_shape_fn((2, 1, 28, 28), |_| rng.random::<f32>());

    let mut rng_a = StdRng::seed_from_u64(1);
    let mut rng_b = StdRng::seed_from_u64(2);

    let noisy_a = add_gaussian_noise(&clean, NOISE_MEAN, NOISE_STD, &mut rng_a)?;
    let noisy_b = add_gaussian_noise(&clean, NOISE_MEAN, NOISE_STD, &mut rng_b)?;

    assert_ne!(noisy_a, noisy_b);

    // the same seed reproduces the same corruption
    let mut rng_a2 = StdRng::seed_from_u64(1);
    let replay = add_gaussian_noise(&clean, NOISE_MEAN, NOISE_STD, &mut rng_a2)?;
    assert_eq!(noisy_a, replay);

    Ok(())
}

#[test]
fn tensor_to_images_test() -> anyhow::Result<()> {
    let dev = Device::Cpu;

    let x = Tensor::full(0.5f32, (2, 1, 4, 4), &dev)?;
    let images = tensor_to_images(&x)?;

    assert_eq!(images.dim(), (2, 4, 4));
    assert!(images.iter().all(|&p| p == 128));

    // multi-channel tensors are not images for this pipeline
    let bad = Tensor::full(0.5f32, (2, 3, 4, 4), &dev)?;
    assert!(tensor_to_images(&bad).is_err());

    Ok(())
}
