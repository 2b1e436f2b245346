use crate::candle_conv_layers::*;
use crate::candle_model_traits::*;
use candle_core::{Result, Tensor};
use candle_nn::{Linear, Module, VarBuilder};

pub struct ConvEncoderArgs<'a> {
    pub in_shape: ImageShape,
    pub latent_dim: usize,
    pub conv_specs: &'a [LayerSpec],
}

/// Strided convolutions shrink the image while deepening the channels, then
/// a flatten and a linear projection collapse the feature map to a
/// `latent_dim` vector. The projection carries no activation, so the
/// bottleneck is linear.
pub struct ConvEncoder {
    in_shape: ImageShape,
    latent_dim: usize,
    feature_shape: ImageShape,
    conv: StackLayers<ImageLayer>,
    fc_z: Linear,
}

impl ConvEncoder {
    /// Will create a new convolutional encoder module
    /// with these variables:
    ///
    /// * `nn.enc.conv.{}.weight` where {} is the stage index
    /// * `nn.enc.z.weight`
    ///
    /// # Arguments
    /// * `in_shape` - input image shape (channels, height, width)
    /// * `latent_dim` - size of the latent bottleneck
    /// * `conv_specs` - ordered downsampling stages
    /// * `vs` - variable builder
    pub fn new(args: ConvEncoderArgs, vs: VarBuilder) -> Result<Self> {
        debug_assert!(!args.conv_specs.is_empty());

        let feature_shape = propagate_image_shape(args.in_shape, args.conv_specs);
        let conv = build_image_stack(args.in_shape.channels, args.conv_specs, vs.pp("nn.enc.conv"))?;
        let fc_z = candle_nn::linear(feature_shape.num_elements(), args.latent_dim, vs.pp("nn.enc.z"))?;

        Ok(Self {
            in_shape: args.in_shape,
            latent_dim: args.latent_dim,
            feature_shape,
            conv,
            fc_z,
        })
    }

    /// Feature-map shape just before flattening; the decoder mirrors this
    /// when it rebuilds the spatial layout.
    pub fn feature_shape(&self) -> ImageShape {
        self.feature_shape
    }
}

impl EncoderModule for ConvEncoder {
    fn forward(&self, x_nchw: &Tensor) -> Result<Tensor> {
        debug_assert_eq!(x_nchw.dims().len(), 4);

        let h_nchw = self.conv.forward(x_nchw)?;
        let h_nf = h_nchw.flatten_from(1)?;
        self.fc_z.forward(&h_nf)
    }

    fn image_shape(&self) -> ImageShape {
        self.in_shape
    }

    fn dim_latent(&self) -> usize {
        self.latent_dim
    }
}
