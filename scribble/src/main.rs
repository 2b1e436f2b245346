use clap::{Parser, Subcommand};
use scribble::fit_denoise::*;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "SCRIBBLE",
    long_about = "Convolutional denoising autoencoder for handwritten digits.\n\
		  Image files use the IDX format (optionally gzipped),\n\
		  the container the MNIST archives ship in."
)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Train a denoising autoencoder on digit images",
        long_about = "Train the encoder-decoder pair in three stages: \n\
		      (1) Corrupt clean digits with clipped Gaussian noise\n\
		      (2) Fit decoder(encoder(noisy)) to the clean targets\n\
		      (3) Denoise the corrupted test set with the trained model.\n"
    )]
    Train(TrainArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.commands {
        Commands::Train(args) => {
            fit_denoising_autoencoder(args)?;
        }
    }

    Ok(())
}
