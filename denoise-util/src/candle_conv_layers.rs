#![allow(dead_code)]

use candle_core::{Result, Tensor};
use candle_nn::{
    Activation, Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig, Module, VarBuilder,
};

/// Spatial layout of an image or feature map: `(channels, height, width)`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageShape {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl ImageShape {
    pub fn num_elements(&self) -> usize {
        self.channels * self.height * self.width
    }
}

/// One stage of a convolutional stack. An ordered `&[LayerSpec]` fully
/// describes the topology; `build_image_stack` turns it into modules and
/// `propagate_image_shape` predicts the resulting feature-map shape.
#[derive(Clone, Copy, Debug)]
pub enum LayerSpec {
    Conv {
        filters: usize,
        kernel: usize,
        stride: usize,
        activation: Option<Activation>,
    },
    ConvTransposed {
        filters: usize,
        kernel: usize,
        stride: usize,
        activation: Option<Activation>,
    },
}

impl LayerSpec {
    pub fn filters(&self) -> usize {
        match *self {
            LayerSpec::Conv { filters, .. } => filters,
            LayerSpec::ConvTransposed { filters, .. } => filters,
        }
    }
}

/// build a stack of alternating `M` and `A` layers
pub struct StackLayers<M>
where
    M: Module,
{
    module_layers: Vec<M>,
    activation_layers: Vec<Option<Activation>>,
}

impl<M> Module for StackLayers<M>
where
    M: Module,
{
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        let mut x = input.clone();
        for (module, activation) in self.module_layers.iter().zip(self.activation_layers.iter()) {
            x = module.forward(&x)?;
            if let Some(activation) = activation {
                x = activation.forward(&x)?;
            }
        }
        Ok(x)
    }
}

impl<M> StackLayers<M>
where
    M: Module,
{
    pub fn new() -> Self {
        Self {
            module_layers: Vec::new(),
            activation_layers: Vec::new(),
        }
    }

    /// Appends a layer after all the current layers.
    pub fn push_with_act(&mut self, layer: M, activation: Activation) {
        self.module_layers.push(layer);
        self.activation_layers.push(Some(activation));
    }

    pub fn push(&mut self, layer: M) {
        self.module_layers.push(layer);
        self.activation_layers.push(None);
    }
}

impl<M> Default for StackLayers<M>
where
    M: Module,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Either direction of 2-D convolution, so one stack can hold both.
pub enum ImageLayer {
    Conv(Conv2d),
    ConvTransposed(ConvTranspose2d),
}

impl Module for ImageLayer {
    fn forward(&self, x_nchw: &Tensor) -> Result<Tensor> {
        match self {
            ImageLayer::Conv(conv) => conv.forward(x_nchw),
            ImageLayer::ConvTransposed(conv) => conv.forward(x_nchw),
        }
    }
}

/// Will create a convolutional stack from an ordered list of layer
/// specifications, with these variables:
///
/// * `{vs}.0.weight`, `{vs}.0.bias` ... one pair per layer index
///
/// "Same" padding convention: `padding = kernel / 2`, and for transposed
/// layers additionally `output_padding = stride - 1`, so a stride-`s` layer
/// scales the spatial resolution by exactly `1/s` (ceiling) or `s`.
///
/// # Arguments
/// * `in_channels` - channels of the incoming feature map
/// * `specs` - ordered layer specifications
/// * `vs` - variable builder
pub fn build_image_stack(
    in_channels: usize,
    specs: &[LayerSpec],
    vs: VarBuilder,
) -> Result<StackLayers<ImageLayer>> {
    debug_assert!(!specs.is_empty());

    let mut stack = StackLayers::<ImageLayer>::new();
    let mut prev_channels = in_channels;

    for (j, spec) in specs.iter().enumerate() {
        let _name = format!("{}", j);
        let (layer, filters, activation) = match *spec {
            LayerSpec::Conv {
                filters,
                kernel,
                stride,
                activation,
            } => {
                let cfg = Conv2dConfig {
                    padding: kernel / 2,
                    stride,
                    ..Default::default()
                };
                let conv = candle_nn::conv2d(prev_channels, filters, kernel, cfg, vs.pp(_name))?;
                (ImageLayer::Conv(conv), filters, activation)
            }
            LayerSpec::ConvTransposed {
                filters,
                kernel,
                stride,
                activation,
            } => {
                let cfg = ConvTranspose2dConfig {
                    padding: kernel / 2,
                    output_padding: stride - 1,
                    stride,
                    ..Default::default()
                };
                let conv =
                    candle_nn::conv_transpose2d(prev_channels, filters, kernel, cfg, vs.pp(_name))?;
                (ImageLayer::ConvTransposed(conv), filters, activation)
            }
        };

        match activation {
            Some(act) => stack.push_with_act(layer, act),
            None => stack.push(layer),
        }
        prev_channels = filters;
    }

    Ok(stack)
}

/// Statically compute the feature-map shape after applying `specs` to an
/// input of shape `input`, using the same padding convention as
/// `build_image_stack`. The decoder relies on this to size its dense and
/// reshape stages without runtime introspection.
pub fn propagate_image_shape(input: ImageShape, specs: &[LayerSpec]) -> ImageShape {
    let mut shape = input;
    for spec in specs {
        shape = match *spec {
            LayerSpec::Conv {
                filters,
                kernel,
                stride,
                ..
            } => {
                debug_assert!(stride >= 1);
                let pad = kernel / 2;
                ImageShape {
                    channels: filters,
                    height: (shape.height + 2 * pad - kernel) / stride + 1,
                    width: (shape.width + 2 * pad - kernel) / stride + 1,
                }
            }
            LayerSpec::ConvTransposed {
                filters,
                kernel,
                stride,
                ..
            } => {
                debug_assert!(stride >= 1);
                let pad = kernel / 2;
                ImageShape {
                    channels: filters,
                    height: (shape.height - 1) * stride + kernel - 2 * pad + (stride - 1),
                    width: (shape.width - 1) * stride + kernel - 2 * pad + (stride - 1),
                }
            }
        };
    }
    shape
}
