use crate::mnist_idx::*;

use candle_core::Tensor;
use candle_nn::Activation;
use clap::{Args, ValueEnum};
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io::Write;

use denoise_util::candle_autoencoder::*;
use denoise_util::candle_conv_layers::*;
use denoise_util::candle_data_loader::*;
use denoise_util::candle_image_decoder::*;
use denoise_util::candle_image_encoder::*;
use denoise_util::candle_inference::TrainConfig;
use denoise_util::candle_loss_functions::mean_squared_error;
use denoise_util::candle_model_traits::*;
use denoise_util::image_noise::*;
use denoise_util::image_prep::*;

#[derive(ValueEnum, Clone, Debug, PartialEq)]
#[clap(rename_all = "lowercase")]
enum ComputeDevice {
    Cpu,
    Cuda,
    Metal,
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    #[arg(
        long,
        required = true,
        help = "Training image file",
        long_help = "IDX image file with clean training digits.\n\
		     Files ending in `.gz` are decompressed on the fly,\n\
		     e.g., train-images-idx3-ubyte.gz"
    )]
    train_images: Box<str>,

    #[arg(
        long,
        required = true,
        help = "Test image file",
        long_help = "IDX image file with clean test digits,\n\
		     e.g., t10k-images-idx3-ubyte.gz.\n\
		     Used for per-epoch validation and final denoising."
    )]
    test_images: Box<str>,

    #[arg(
        long,
        short,
        required = true,
        help = "Output header",
        long_help = "Output header for results.\n\
		     Specify the output file or prefix for generated files:\n\
		     - {out}.denoised.idx.gz\n\
		     - {out}.latent.tsv\n\
		     - {out}.mse.tsv\n\
		     - {out}.safetensors\n"
    )]
    out: Box<str>,

    #[arg(
        long,
        short = 'k',
        default_value_t = 16,
        help = "Latent dimension",
        long_help = "Size of the bottleneck vector each digit is squeezed into."
    )]
    latent_dim: usize,

    #[arg(
        long,
        value_delimiter(','),
        default_values_t = vec![32, 64],
        help = "Encoder filter counts (comma-separated)",
        long_help = "Filter counts for the encoder's strided convolution stages.\n\
		     The decoder mirrors them in reverse.\n\
		     Example: 32,64"
    )]
    conv_filters: Vec<usize>,

    #[arg(
        long,
        default_value_t = 3,
        help = "Convolution kernel size",
        long_help = "Square kernel size used by every convolution stage."
    )]
    kernel_size: usize,

    #[arg(
        long,
        default_value_t = 2,
        help = "Convolution stride",
        long_help = "Stride of each downsampling stage; each stage shrinks\n\
		     the resolution by this factor and the decoder restores it."
    )]
    conv_stride: usize,

    #[arg(
        long,
        default_value_t = NOISE_MEAN,
        help = "Gaussian noise mean",
        long_help = "Mean of the Gaussian corruption added to each pixel.\n\
		     The default 0.5 deliberately skews noisy digits brighter."
    )]
    noise_mean: f32,

    #[arg(
        long,
        default_value_t = NOISE_STD,
        help = "Gaussian noise standard deviation"
    )]
    noise_std: f32,

    #[arg(
        long,
        help = "Random seed",
        long_help = "Seed for the corruption draws. Omit for OS entropy.\n\
		     Training and test sets always get separate draws."
    )]
    seed: Option<u64>,

    #[arg(long, default_value_t = 128, help = "Minibatch size")]
    batch_size: usize,

    #[arg(
        long,
        short = 'e',
        default_value_t = 2,
        help = "Number of training epochs"
    )]
    epochs: usize,

    #[arg(long, default_value_t = 1e-3, help = "Learning rate")]
    learning_rate: f32,

    #[arg(
        long,
        value_enum,
        default_value = "cpu",
        help = "Compute device",
        long_help = "Compute device\n\
		     Example: `--device cuda` or `--device metal`"
    )]
    device: ComputeDevice,

    #[arg(long, default_value_t = false, help = "Verbose logging")]
    verbose: bool,

    #[arg(long, default_value_t = false, help = "Show progress bar")]
    show_progress: bool,
}

pub fn fit_denoising_autoencoder(args: &TrainArgs) -> anyhow::Result<()> {
    if args.verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    // 1. Read the raw digits and normalize into [0,1]
    let train_raw = read_idx_images(&args.train_images)?;
    let test_raw = read_idx_images(&args.test_images)?;

    info!(
        "loaded {} training and {} test images",
        train_raw.dim().0,
        test_raw.dim().0
    );

    let train_clean = normalize_images(&train_raw);
    let test_clean = normalize_images(&test_raw);

    // 2. Corrupt both sets; two separate draws from one stream
    let mut rng: StdRng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let train_noisy = add_gaussian_noise(&train_clean, args.noise_mean, args.noise_std, &mut rng)?;
    let test_noisy = add_gaussian_noise(&test_clean, args.noise_mean, args.noise_std, &mut rng)?;

    // 3. Build the encoder-decoder pair over one shared variable map
    let (_, _, height, width) = train_clean.dim();
    let in_shape = ImageShape {
        channels: 1,
        height,
        width,
    };

    let enc_specs = args
        .conv_filters
        .iter()
        .map(|&filters| LayerSpec::Conv {
            filters,
            kernel: args.kernel_size,
            stride: args.conv_stride,
            activation: Some(Activation::Relu),
        })
        .collect::<Vec<_>>();

    let mut dec_specs = args
        .conv_filters
        .iter()
        .rev()
        .map(|&filters| LayerSpec::ConvTransposed {
            filters,
            kernel: args.kernel_size,
            stride: args.conv_stride,
            activation: Some(Activation::Relu),
        })
        .collect::<Vec<_>>();

    dec_specs.push(LayerSpec::ConvTransposed {
        filters: in_shape.channels,
        kernel: args.kernel_size,
        stride: 1,
        activation: Some(Activation::Sigmoid),
    });

    let dev = match args.device {
        ComputeDevice::Metal => candle_core::Device::new_metal(0)?,
        ComputeDevice::Cuda => candle_core::Device::new_cuda(0)?,
        _ => candle_core::Device::Cpu,
    };

    let parameters = candle_nn::VarMap::new();
    let param_builder =
        candle_nn::VarBuilder::from_varmap(&parameters, candle_core::DType::F32, &dev);

    let encoder = ConvEncoder::new(
        ConvEncoderArgs {
            in_shape,
            latent_dim: args.latent_dim,
            conv_specs: &enc_specs,
        },
        param_builder.clone(),
    )?;

    let decoder = ConvDecoder::new(
        ConvDecoderArgs {
            latent_dim: args.latent_dim,
            feature_shape: encoder.feature_shape(),
            deconv_specs: &dec_specs,
        },
        param_builder.clone(),
    )?;

    if decoder.image_shape() != in_shape {
        return Err(anyhow::anyhow!(
            "decoder output {:?} does not restore the input resolution {:?}",
            decoder.image_shape(),
            in_shape
        ));
    }

    info!(
        "input: {}x{} -> encoder -> {} -> decoder -> output: {}x{}",
        height,
        width,
        args.latent_dim,
        decoder.image_shape().height,
        decoder.image_shape().width
    );

    // 4. Fit decoder(encoder(noisy)) to the clean targets
    let mut train_data = InMemoryData::new_with_output(&train_noisy, &train_clean)?;
    let mut test_data = InMemoryData::new_with_output(&test_noisy, &test_clean)?;

    let train_config = TrainConfig {
        learning_rate: args.learning_rate,
        batch_size: args.batch_size,
        num_epochs: args.epochs,
        device: dev.clone(),
        verbose: args.verbose,
        show_progress: args.show_progress,
    };

    let mut model = DenoisingAutoencoder::build(&encoder, &decoder, &parameters);

    let trace = model.train_encoder_decoder(
        &mut train_data,
        Some(&mut test_data),
        &mean_squared_error,
        &train_config,
    )?;

    write_loss_trace(&(args.out.to_string() + ".mse.tsv"), &trace)?;

    let test_mse = model.evaluate(&mut test_data, &mean_squared_error, &train_config)?;
    info!("test reconstruction mse: {}", test_mse);

    // 5. Denoise the corrupted test set and keep the latent codes
    let image_tensors = test_noisy.images_to_tensor_vec();

    let mut latent_chunks = vec![];
    let mut denoised_chunks = vec![];

    for chunk in image_tensors.chunks(args.batch_size) {
        let x_nchw = Tensor::cat(chunk, 0)?.to_device(&dev)?;
        let z_nk = encoder.forward(&x_nchw)?;
        let recon_nchw = decoder.forward(&z_nk)?;

        latent_chunks.push(z_nk.to_device(&candle_core::Device::Cpu)?);
        denoised_chunks.push(recon_nchw.to_device(&candle_core::Device::Cpu)?);
    }

    let denoised = Tensor::cat(&denoised_chunks, 0)?;
    write_idx_images(
        &tensor_to_images(&denoised)?,
        &(args.out.to_string() + ".denoised.idx.gz"),
    )?;

    let latent_nk = Tensor::cat(&latent_chunks, 0)?;
    write_latent_tsv(&(args.out.to_string() + ".latent.tsv"), &latent_nk)?;

    info!("writing down the model parameters");
    parameters.save(args.out.to_string() + ".safetensors")?;

    Ok(())
}

fn write_loss_trace(file_path: &str, trace: &TrainingTrace) -> anyhow::Result<()> {
    let mut writer = std::io::BufWriter::new(std::fs::File::create(file_path)?);

    writeln!(writer, "epoch\ttrain\tvalidation")?;
    for (epoch, train) in trace.train_loss.iter().enumerate() {
        let validation = trace
            .validation_loss
            .get(epoch)
            .map_or("NA".to_string(), |v| v.to_string());
        writeln!(writer, "{}\t{}\t{}", epoch + 1, train, validation)?;
    }

    Ok(())
}

fn write_latent_tsv(file_path: &str, z_nk: &Tensor) -> anyhow::Result<()> {
    let mut writer = std::io::BufWriter::new(std::fs::File::create(file_path)?);

    for row in z_nk.to_vec2::<f32>()?.iter() {
        let line = row
            .iter()
            .map(|z| z.to_string())
            .collect::<Vec<_>>()
            .join("\t");
        writeln!(writer, "{}", line)?;
    }

    Ok(())
}
