//! Trainable classification head
//!
//! `global_pool → dense (ReLU) → dropout → classifier`. Layers are addressed
//! by field name; nothing downstream depends on their position.

use burn::{
    config::Config,
    module::Module,
    nn::{
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig,
    },
    tensor::{activation::relu, backend::Backend, Tensor},
};

/// Head layer names in execution order
pub const HEAD_LAYERS: [&str; 4] = ["global_pool", "dense", "dropout", "classifier"];

/// Configuration for the classification head
#[derive(Config, Debug)]
pub struct ClassifierHeadConfig {
    /// Channels of the incoming feature map
    pub in_features: usize,

    /// Number of output classes
    pub num_classes: usize,

    /// Hidden units of the dense layer
    #[config(default = "256")]
    pub dense_units: usize,

    /// Dropout rate applied after the dense layer
    #[config(default = "0.5")]
    pub dropout_rate: f64,
}

impl ClassifierHeadConfig {
    /// Initialize the head
    pub fn init<B: Backend>(&self, device: &B::Device) -> ClassifierHead<B> {
        ClassifierHead {
            global_pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            dense: LinearConfig::new(self.in_features, self.dense_units).init(device),
            dropout: DropoutConfig::new(self.dropout_rate).init(),
            classifier: LinearConfig::new(self.dense_units, self.num_classes).init(device),
        }
    }
}

/// Pooling + two dense layers producing class logits
#[derive(Module, Debug)]
pub struct ClassifierHead<B: Backend> {
    pub global_pool: AdaptiveAvgPool2d,
    pub dense: Linear<B>,
    pub dropout: Dropout,
    pub classifier: Linear<B>,
}

impl<B: Backend> ClassifierHead<B> {
    /// Global average pooling: [B, C, H, W] -> [B, C]
    fn pool(&self, features: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.global_pool.forward(features);
        let [batch_size, channels, _, _] = x.dims();
        x.reshape([batch_size, channels])
    }

    /// Forward pass producing logits
    ///
    /// Burn's dropout only acts on autodiff backends, so this is deterministic
    /// on the inference backend.
    pub fn forward(&self, features: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.pool(features);
        let x = relu(self.dense.forward(x));
        let x = self.dropout.forward(x);
        self.classifier.forward(x)
    }

    /// Forward pass with the dropout layer skipped, for use on autodiff backends
    pub fn forward_without_dropout(&self, features: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.pool(features);
        let x = relu(self.dense.forward(x));
        self.classifier.forward(x)
    }

    /// Number of output classes
    pub fn num_classes(&self) -> usize {
        self.classifier.weight.val().dims()[1]
    }
}
