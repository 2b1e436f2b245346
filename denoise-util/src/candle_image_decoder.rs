use crate::candle_conv_layers::*;
use crate::candle_model_traits::*;
use candle_core::{Result, Tensor};
use candle_nn::{Activation, Linear, Module, VarBuilder};

pub struct ConvDecoderArgs<'a> {
    pub latent_dim: usize,
    pub feature_shape: ImageShape,
    pub deconv_specs: &'a [LayerSpec],
}

/// Mirror image of the encoder: a linear layer expands the latent vector to
/// the encoder's pre-flatten feature volume, a reshape restores the spatial
/// layout, and transposed convolutions upsample back to the input
/// resolution. The last stage must end in a sigmoid so reconstructions stay
/// in `[0, 1]`.
pub struct ConvDecoder {
    latent_dim: usize,
    feature_shape: ImageShape,
    out_shape: ImageShape,
    fc: Linear,
    deconv: StackLayers<ImageLayer>,
}

impl ConvDecoder {
    /// Will create a new transposed-convolution decoder module
    /// with these variables:
    ///
    /// * `nn.dec.fc.weight`
    /// * `nn.dec.deconv.{}.weight` where {} is the stage index
    ///
    /// # Arguments
    /// * `latent_dim` - size of the latent bottleneck
    /// * `feature_shape` - the encoder's pre-flatten shape, restored by the
    ///   dense + reshape stage
    /// * `deconv_specs` - ordered upsampling stages; strides must invert the
    ///   encoder's downsampling so the output resolution matches the input
    /// * `vs` - variable builder
    pub fn new(args: ConvDecoderArgs, vs: VarBuilder) -> Result<Self> {
        debug_assert!(!args.deconv_specs.is_empty());

        let fc = candle_nn::linear(
            args.latent_dim,
            args.feature_shape.num_elements(),
            vs.pp("nn.dec.fc"),
        )?;

        let out_shape = propagate_image_shape(args.feature_shape, args.deconv_specs);
        let deconv = build_image_stack(
            args.feature_shape.channels,
            args.deconv_specs,
            vs.pp("nn.dec.deconv"),
        )?;

        Ok(Self {
            latent_dim: args.latent_dim,
            feature_shape: args.feature_shape,
            out_shape,
            fc,
            deconv,
        })
    }
}

impl DecoderModule for ConvDecoder {
    fn forward(&self, z_nk: &Tensor) -> Result<Tensor> {
        debug_assert_eq!(z_nk.dims().len(), 2);

        let n = z_nk.dims()[0];
        let (c, h, w) = (
            self.feature_shape.channels,
            self.feature_shape.height,
            self.feature_shape.width,
        );

        let h_nf = Activation::Relu.forward(&self.fc.forward(z_nk)?)?;
        let h_nchw = h_nf.reshape((n, c, h, w))?;
        self.deconv.forward(&h_nchw)
    }

    fn forward_with_loss<LossFn>(
        &self,
        z_nk: &Tensor,
        x_nchw: &Tensor,
        loss: &LossFn,
    ) -> Result<(Tensor, Tensor)>
    where
        LossFn: Fn(&Tensor, &Tensor) -> Result<Tensor>,
    {
        let recon_nchw = self.forward(z_nk)?;
        let loss_n = loss(x_nchw, &recon_nchw)?;
        Ok((recon_nchw, loss_n))
    }

    fn image_shape(&self) -> ImageShape {
        self.out_shape
    }

    fn dim_latent(&self) -> usize {
        self.latent_dim
    }
}
