use candle_core::{DType, Device, Tensor};
use candle_nn::{Activation, VarBuilder, VarMap};
use denoise_util::candle_conv_layers::*;
use denoise_util::candle_image_decoder::*;
use denoise_util::candle_image_encoder::*;
use denoise_util::candle_model_traits::*;

fn encoder_specs() -> Vec<LayerSpec> {
    vec![
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
    ]
}

fn decoder_specs() -> Vec<LayerSpec> {
    vec![
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
    ]
}

const MNIST_SHAPE: ImageShape = ImageShape {
    channels: 1,
    height: 28,
    width: 28,
};

#[test]
fn downsample_shape_propagation_test() {
    let feature = propagate_image_shape(MNIST_SHAPE, &encoder_specs());

    assert_eq!(
        feature,
        ImageShape {
            channels: 64,
            height: 7,
            width: 7
        }
    );

    // also on a smaller resolution, strides halve with a ceiling
    let small = ImageShape {
        channels: 1,
        height: 16,
        width: 16,
    };
    let feature = propagate_image_shape(small, &encoder_specs());
    assert_eq!(feature.height, 4);
    assert_eq!(feature.width, 4);
}

#[test]
fn upsample_shape_propagation_test() {
    let feature = ImageShape {
        channels: 64,
        height: 7,
        width: 7,
    };

    let out = propagate_image_shape(feature, &decoder_specs());

    assert_eq!(out, MNIST_SHAPE);
}

#[test]
fn encoder_latent_dimension_test() -> anyhow::Result<()> {
    let dev = Device::Cpu;
    let parameters = VarMap::new();
    let vs = VarBuilder::from_varmap(&parameters, DType::F32, &dev);

    let specs = encoder_specs();
    let encoder = ConvEncoder::new(
        ConvEncoderArgs {
            in_shape: MNIST_SHAPE,
            latent_dim: 16,
            conv_specs: &specs,
        },
        vs,
    )?;

    assert_eq!(
        encoder.feature_shape(),
        ImageShape {
            channels: 64,
            height: 7,
            width: 7
        }
    );

    // an all-zero image must still map to a finite 16-vector
    let x = Tensor::zeros((1, 1, 28, 28), DType::F32, &dev)?;
    let z = encoder.forward(&x)?;

    assert_eq!(z.dims(), &[1, 16]);

    let z = z.flatten_all()?.to_vec1::<f32>()?;
    assert_eq!(z.len(), 16);
    assert!(z.iter().all(|v| v.is_finite()));

    Ok(())
}

#[test]
fn decoder_output_shape_test() -> anyhow::Result<()> {
    let dev = Device::Cpu;
    let parameters = VarMap::new();
    let vs = VarBuilder::from_varmap(&parameters, DType::F32, &dev);

    let specs = decoder_specs();
    let decoder = ConvDecoder::new(
        ConvDecoderArgs {
            latent_dim: 16,
            feature_shape: ImageShape {
                channels: 64,
                height: 7,
                width: 7,
            },
            deconv_specs: &specs,
        },
        vs,
    )?;

    assert_eq!(decoder.image_shape(), MNIST_SHAPE);

    let z = Tensor::zeros((3, 16), DType::F32, &dev)?;
    let recon = decoder.forward(&z)?;

    assert_eq!(recon.dims(), &[3, 1, 28, 28]);

    // sigmoid output stays inside the normalized pixel range
    let values = recon.flatten_all()?.to_vec1::<f32>()?;
    assert!(values.iter().all(|&v| (0.0..=1.0).contains(&v)));

    Ok(())
}

#[test]
fn encode_decode_preserves_shape_test() -> anyhow::Result<()> {
    let dev = Device::Cpu;
    let parameters = VarMap::new();
    let vs = VarBuilder::from_varmap(&parameters, DType::F32, &dev);

    let enc_specs = encoder_specs();
    let encoder = ConvEncoder::new(
        ConvEncoderArgs {
            in_shape: MNIST_SHAPE,
            latent_dim: 16,
            conv_specs: &enc_specs,
        },
        vs.clone(),
    )?;

    let dec_specs = decoder_specs();
    let decoder = ConvDecoder::new(
        ConvDecoderArgs {
            latent_dim: 16,
            feature_shape: encoder.feature_shape(),
            deconv_specs: &dec_specs,
        },
        vs,
    )?;

    let x = Tensor::rand(0f32, 1f32, (5, 1, 28, 28), &dev)?;
    let recon = decoder.forward(&encoder.forward(&x)?)?;

    assert_eq!(recon.dims(), x.dims());

    Ok(())
}

#[test]
fn forward_pass_is_deterministic_test() -> anyhow::Result<()> {
    let dev = Device::Cpu;
    let parameters = VarMap::new();
    let vs = VarBuilder::from_varmap(&parameters, DType::F32, &dev);

    let specs = encoder_specs();
    let encoder = ConvEncoder::new(
        ConvEncoderArgs {
            in_shape: MNIST_SHAPE,
            latent_dim: 16,
            conv_specs: &specs,
        },
        vs,
    )?;

    let x = Tensor::rand(0f32, 1f32, (2, 1, 28, 28), &dev)?;

    let z1 = encoder.forward(&x)?.flatten_all()?.to_vec1::<f32>()?;
    let z2 = encoder.forward(&x)?.flatten_all()?.to_vec1::<f32>()?;

    assert_eq!(z1, z2);

    Ok(())
}
