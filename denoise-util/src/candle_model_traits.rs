#![allow(dead_code)]

use crate::candle_conv_layers::ImageShape;
use candle_core::{Result, Tensor};

pub trait EncoderModule {
    /// An encoder that maps a batch of images to latent vectors
    ///
    /// # Arguments
    /// * `x_nchw` - input images (n x channels x height x width)
    ///
    /// # Returns `z_nk`
    /// * `z_nk` - latent vectors (n x k)
    fn forward(&self, x_nchw: &Tensor) -> Result<Tensor>;

    /// Expected input image shape
    fn image_shape(&self) -> ImageShape;

    fn dim_latent(&self) -> usize;
}

pub trait DecoderModule {
    /// A decoder that maps latent vectors back to reconstructed images
    fn forward(&self, z_nk: &Tensor) -> Result<Tensor>;

    /// A decoder that spits out reconstruction and per-sample loss
    /// * `z_nk` - latent vectors
    /// * `x_nchw` - target images to reconstruct
    /// * `loss` - fn (target, reconstruction) -> per-sample loss
    fn forward_with_loss<LossFn>(
        &self,
        z_nk: &Tensor,
        x_nchw: &Tensor,
        loss: &LossFn,
    ) -> Result<(Tensor, Tensor)>
    where
        LossFn: Fn(&Tensor, &Tensor) -> Result<Tensor>;

    /// Output image shape
    fn image_shape(&self) -> ImageShape;

    fn dim_latent(&self) -> usize;
}
