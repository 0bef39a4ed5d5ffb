//! MobileNetV2 feature extractor
//!
//! The backbone is exposed as an ordered list of named layers so it can be
//! executed piecewise: [`MobileNetV2::forward_range`] runs any contiguous span
//! of layers, which is what lets Grad-CAM cut the network at a tap layer.
//!
//! Layer names follow the Keras application:
//!
//! | index  | name            | contents                               |
//! |--------|-----------------|----------------------------------------|
//! | 0      | `Conv1`         | 3x3/2 conv, batch norm, ReLU6          |
//! | 1      | `expanded_conv` | first inverted residual (t = 1)        |
//! | 2..=17 | `block_N`       | inverted residuals 1 through 16        |
//! | 18     | `Conv_1`        | final 1x1 conv to 1280 channels        |
//! | 19     | `Conv_1_bn`     | batch norm of `Conv_1`                 |
//! | 20     | `out_relu`      | ReLU6                                  |

use std::ops::Range;

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d,
    },
    tensor::{backend::Backend, Tensor},
};

/// Expansion factor, output channels, repeats, first stride
const INVERTED_RESIDUAL_SETTINGS: [(usize, usize, usize, usize); 7] = [
    (1, 16, 1, 1),
    (6, 24, 2, 2),
    (6, 32, 3, 2),
    (6, 64, 4, 2),
    (6, 96, 3, 1),
    (6, 160, 3, 2),
    (6, 320, 1, 1),
];

const STEM_CHANNELS: usize = 32;
const LAST_CHANNELS: usize = 1280;
const CHANNEL_DIVISOR: usize = 8;

/// Configuration for the MobileNetV2 backbone
#[derive(Config, Debug)]
pub struct MobileNetV2Config {
    /// Width multiplier (`alpha`) applied to every block's channel count
    #[config(default = "1.0")]
    pub width_multiplier: f32,

    /// Number of input channels (3 for RGB)
    #[config(default = "3")]
    pub in_channels: usize,
}

impl MobileNetV2Config {
    /// Initialize the backbone
    pub fn init<B: Backend>(&self, device: &B::Device) -> MobileNetV2<B> {
        MobileNetV2::new(self, device)
    }

    /// Number of channels produced by the final layer
    pub fn out_channels(&self) -> usize {
        if self.width_multiplier > 1.0 {
            make_divisible(LAST_CHANNELS as f32 * self.width_multiplier)
        } else {
            LAST_CHANNELS
        }
    }
}

/// Round a channel count to the nearest multiple of 8, never dropping more than 10%
pub fn make_divisible(value: f32) -> usize {
    let divisor = CHANNEL_DIVISOR as f32;
    let rounded = ((value + divisor / 2.0) / divisor).floor() * divisor;
    let mut channels = rounded.max(divisor) as usize;
    if (channels as f32) < 0.9 * value {
        channels += CHANNEL_DIVISOR;
    }
    channels
}

/// Batch norm evaluated with the stored running statistics.
///
/// `BatchNorm::forward` switches to batch statistics, and updates its running
/// averages, on autodiff backends. The backbone is frozen, so every pass goes
/// through here instead.
pub fn frozen_batch_norm<B: Backend>(bn: &BatchNorm<B, 2>, x: Tensor<B, 4>) -> Tensor<B, 4> {
    let channels = bn.gamma.val().dims()[0];
    let shape = [1, channels, 1, 1];

    let mean = bn.running_mean.value().reshape(shape);
    let std = bn.running_var.value().add_scalar(bn.epsilon).sqrt().reshape(shape);
    let gamma = bn.gamma.val().reshape(shape);
    let beta = bn.beta.val().reshape(shape);

    x.sub(mean).div(std).mul(gamma).add(beta)
}

/// ReLU clipped at 6
pub fn relu6<B: Backend>(x: Tensor<B, 4>) -> Tensor<B, 4> {
    x.clamp(0.0, 6.0)
}

/// Bias-free convolution followed by batch norm
#[derive(Module, Debug)]
pub struct ConvBn<B: Backend> {
    pub conv: Conv2d<B>,
    pub bn: BatchNorm<B, 2>,
}

impl<B: Backend> ConvBn<B> {
    fn new(
        channels: [usize; 2],
        kernel_size: usize,
        stride: usize,
        groups: usize,
        device: &B::Device,
    ) -> Self {
        let padding = kernel_size / 2;
        let conv = Conv2dConfig::new(channels, [kernel_size, kernel_size])
            .with_stride([stride, stride])
            .with_padding(PaddingConfig2d::Explicit(padding, padding))
            .with_groups(groups)
            .with_bias(false)
            .init(device);
        let bn = BatchNormConfig::new(channels[1]).init(device);

        Self { conv, bn }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        frozen_batch_norm(&self.bn, self.conv.forward(x))
    }
}

/// Inverted residual block: 1x1 expand, 3x3 depthwise, 1x1 linear projection
#[derive(Module, Debug)]
pub struct InvertedResidual<B: Backend> {
    pub expand: Option<ConvBn<B>>,
    pub depthwise: ConvBn<B>,
    pub project: ConvBn<B>,
    in_channels: usize,
    out_channels: usize,
    stride: usize,
}

impl<B: Backend> InvertedResidual<B> {
    fn new(
        in_channels: usize,
        out_channels: usize,
        stride: usize,
        expansion: usize,
        device: &B::Device,
    ) -> Self {
        let hidden = in_channels * expansion;

        let expand = (expansion != 1).then(|| ConvBn::new([in_channels, hidden], 1, 1, 1, device));
        let depthwise = ConvBn::new([hidden, hidden], 3, stride, hidden, device);
        let project = ConvBn::new([hidden, out_channels], 1, 1, 1, device);

        Self {
            expand,
            depthwise,
            project,
            in_channels,
            out_channels,
            stride,
        }
    }

    /// Whether the block adds its input back onto its output
    pub fn has_residual(&self) -> bool {
        self.stride == 1 && self.in_channels == self.out_channels
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let hidden = match &self.expand {
            Some(expand) => relu6(expand.forward(x.clone())),
            None => x.clone(),
        };
        let hidden = relu6(self.depthwise.forward(hidden));
        let out = self.project.forward(hidden);

        if self.has_residual() {
            out + x
        } else {
            out
        }
    }
}

/// Addressable layer of the backbone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackboneLayer {
    Stem,
    Block(usize),
    Conv1,
    Conv1Bn,
    OutRelu,
}

impl BackboneLayer {
    /// Keras-compatible layer name
    pub fn name(&self) -> String {
        match self {
            BackboneLayer::Stem => "Conv1".to_string(),
            BackboneLayer::Block(0) => "expanded_conv".to_string(),
            BackboneLayer::Block(i) => format!("block_{}", i),
            BackboneLayer::Conv1 => "Conv_1".to_string(),
            BackboneLayer::Conv1Bn => "Conv_1_bn".to_string(),
            BackboneLayer::OutRelu => "out_relu".to_string(),
        }
    }
}

/// MobileNetV2 feature extractor (no classification top)
#[derive(Module, Debug)]
pub struct MobileNetV2<B: Backend> {
    pub stem: ConvBn<B>,
    pub blocks: Vec<InvertedResidual<B>>,
    pub conv_1: Conv2d<B>,
    pub conv_1_bn: BatchNorm<B, 2>,
    out_channels: usize,
}

impl<B: Backend> MobileNetV2<B> {
    /// Create a new backbone from configuration
    pub fn new(config: &MobileNetV2Config, device: &B::Device) -> Self {
        let alpha = config.width_multiplier;

        let stem_channels = make_divisible(STEM_CHANNELS as f32 * alpha);
        let stem = ConvBn::new([config.in_channels, stem_channels], 3, 2, 1, device);

        let mut blocks = Vec::new();
        let mut in_channels = stem_channels;
        for (expansion, channels, repeats, first_stride) in INVERTED_RESIDUAL_SETTINGS {
            let out_channels = make_divisible(channels as f32 * alpha);
            for repeat in 0..repeats {
                let stride = if repeat == 0 { first_stride } else { 1 };
                blocks.push(InvertedResidual::new(
                    in_channels,
                    out_channels,
                    stride,
                    expansion,
                    device,
                ));
                in_channels = out_channels;
            }
        }

        let out_channels = config.out_channels();
        let conv_1 = Conv2dConfig::new([in_channels, out_channels], [1, 1])
            .with_bias(false)
            .init(device);
        let conv_1_bn = BatchNormConfig::new(out_channels).init(device);

        Self {
            stem,
            blocks,
            conv_1,
            conv_1_bn,
            out_channels,
        }
    }

    /// Number of channels in the final feature map
    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    /// All layers in execution order
    pub fn layers(&self) -> Vec<BackboneLayer> {
        let mut layers = Vec::with_capacity(self.blocks.len() + 4);
        layers.push(BackboneLayer::Stem);
        layers.extend((0..self.blocks.len()).map(BackboneLayer::Block));
        layers.extend([
            BackboneLayer::Conv1,
            BackboneLayer::Conv1Bn,
            BackboneLayer::OutRelu,
        ]);
        layers
    }

    /// Layer names in execution order
    pub fn layer_names(&self) -> Vec<String> {
        self.layers().iter().map(BackboneLayer::name).collect()
    }

    /// Position of a named layer in execution order
    pub fn position(&self, name: &str) -> Option<usize> {
        self.layers().iter().position(|layer| layer.name() == name)
    }

    /// Run a single layer
    pub fn forward_layer(&self, layer: BackboneLayer, x: Tensor<B, 4>) -> Tensor<B, 4> {
        match layer {
            BackboneLayer::Stem => relu6(self.stem.forward(x)),
            BackboneLayer::Block(i) => self.blocks[i].forward(x),
            BackboneLayer::Conv1 => self.conv_1.forward(x),
            BackboneLayer::Conv1Bn => frozen_batch_norm(&self.conv_1_bn, x),
            BackboneLayer::OutRelu => relu6(x),
        }
    }

    /// Run the layers at `range` (indices into [`Self::layers`]) in order
    pub fn forward_range(&self, x: Tensor<B, 4>, range: Range<usize>) -> Tensor<B, 4> {
        self.layers()[range]
            .iter()
            .fold(x, |x, &layer| self.forward_layer(layer, x))
    }

    /// Full feature extraction pass
    ///
    /// # Arguments
    /// * `x` - Input tensor of shape [batch_size, 3, height, width]
    ///
    /// # Returns
    /// * Feature map of shape [batch_size, out_channels, height / 32, width / 32]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let len = self.layers().len();
        self.forward_range(x, 0..len)
    }
}
