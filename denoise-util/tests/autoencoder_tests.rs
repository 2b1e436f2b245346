use candle_core::{DType, Device, Tensor};
use candle_nn::{Activation, VarBuilder, VarMap};
use denoise_util::candle_autoencoder::*;
use denoise_util::candle_conv_layers::*;
use denoise_util::candle_data_loader::*;
use denoise_util::candle_image_decoder::*;
use denoise_util::candle_image_encoder::*;
use denoise_util::candle_inference::TrainConfig;
use denoise_util::candle_loss_functions::mean_squared_error;
use denoise_util::image_noise::*;
use ndarray::Array4;
use rand::rngs::StdRng;
use rand::SeedableRng;

const IN_SHAPE: ImageShape = ImageShape {
    channels: 1,
    height: 28,
    width: 28,
};

fn build_specs() -> (Vec<LayerSpec>, Vec<LayerSpec>) {
    let enc = vec![
        LayerSpec::Conv {
            filters: 32,
            kernel: 3,
            stride: 2,
            activation: Some(Activation::Relu),
        },
        LayerSpec::Conv {
            filters: 64,
            kernel: 3,
            stride: 2,
            activation: Some(Activation::Relu),
        },
    ];
    let dec = vec![
        LayerSpec::ConvTransposed {
            filters: 64,
            kernel: 3,
            stride: 2,
            activation: Some(Activation::Relu),
        },
        LayerSpec::ConvTransposed {
            filters: 32,
            kernel: 3,
            stride: 2,
            activation: Some(Activation::Relu),
        },
        LayerSpec::ConvTransposed {
            filters: 1,
            kernel: 3,
            stride: 1,
            activation: Some(Activation::Sigmoid),
        },
    ];
    (enc, dec)
}

/// flat synthetic digits: image i is a constant intensity i / (n - 1)
fn synthetic_images(num: usize) -> Array4<f32> {
    Array4::from_shape_fn((num, 1, 28, 28), |(i, _, _, _)| {
        i as f32 / (num - 1) as f32
    })
}

#[test]
fn training_does_not_increase_mse_test() -> anyhow::Result<()> {
    let dev = Device::Cpu;
    let parameters = VarMap::new();
    let vs = VarBuilder::from_varmap(&parameters, DType::F32, &dev);

    let (enc_specs, dec_specs) = build_specs();

    let encoder = ConvEncoder::new(
        ConvEncoderArgs {
            in_shape: IN_SHAPE,
            latent_dim: 16,
            conv_specs: &enc_specs,
        },
        vs.clone(),
    )?;

    let decoder = ConvDecoder::new(
        ConvDecoderArgs {
            latent_dim: 16,
            feature_shape: encoder.feature_shape(),
            deconv_specs: &dec_specs,
        },
        vs,
    )?;

    let clean = synthetic_images(16);
    let mut rng = StdRng::seed_from_u64(99);
    let noisy = add_gaussian_noise(&clean, NOISE_MEAN, NOISE_STD, &mut rng)?;

    let mut data = InMemoryData::new_with_output(&noisy, &clean)?;
    let mut held_out = InMemoryData::new_with_output(&noisy, &clean)?;

    let config = TrainConfig {
        learning_rate: 1e-3,
        batch_size: 8,
        num_epochs: 20,
        device: dev,
        verbose: false,
        show_progress: false,
    };

    let mut model = DenoisingAutoencoder::build(&encoder, &decoder, &parameters);

    let mse_before = model.evaluate(&mut held_out, &mean_squared_error, &config)?;

    let trace =
        model.train_encoder_decoder(&mut data, Some(&mut held_out), &mean_squared_error, &config)?;

    assert_eq!(trace.train_loss.len(), config.num_epochs);
    assert_eq!(trace.validation_loss.len(), config.num_epochs);

    let mse_after = model.evaluate(&mut held_out, &mean_squared_error, &config)?;

    assert!(mse_after.is_finite());
    assert!(
        mse_after <= mse_before,
        "training increased reconstruction error: {} -> {}",
        mse_before,
        mse_after
    );

    Ok(())
}

#[test]
fn denoised_images_stay_normalized_test() -> anyhow::Result<()> {
    let dev = Device::Cpu;
    let parameters = VarMap::new();
    let vs = VarBuilder::from_varmap(&parameters, DType::F32, &dev);

    let (enc_specs, dec_specs) = build_specs();

    let encoder = ConvEncoder::new(
        ConvEncoderArgs {
            in_shape: IN_SHAPE,
            latent_dim: 16,
            conv_specs: &enc_specs,
        },
        vs.clone(),
    )?;

    let decoder = ConvDecoder::new(
        ConvDecoderArgs {
            latent_dim: 16,
            feature_shape: encoder.feature_shape(),
            deconv_specs: &dec_specs,
        },
        vs,
    )?;

    let model = DenoisingAutoencoder::build(&encoder, &decoder, &parameters);

    let x = Tensor::rand(0f32, 1f32, (4, 1, 28, 28), &dev)?;
    let recon = model.denoise(&x)?;

    assert_eq!(recon.dims(), x.dims());

    let values = recon.flatten_all()?.to_vec1::<f32>()?;
    assert!(values.iter().all(|&v| (0.0..=1.0).contains(&v)));

    Ok(())
}
