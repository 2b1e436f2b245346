pub mod candle_autoencoder;
pub mod candle_conv_layers;
pub mod candle_data_loader;
pub mod candle_image_decoder;
pub mod candle_image_encoder;
pub mod candle_inference;
pub mod candle_loss_functions;
pub mod candle_model_traits;
pub mod image_noise;
pub mod image_prep;

pub use candle_core;
pub use candle_nn;
