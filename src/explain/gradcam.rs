//! Grad-CAM saliency
//!
//! The network is split once, at startup, into two halves around a named
//! "tap" layer of the backbone:
//!
//! ```text
//! (a) input ─ backbone[..=tap] ─ activation          inference backend
//! (b) activation ─ backbone[tap+1..] ─ head ─ softmax  autodiff backend
//! ```
//!
//! Per request, (a) runs without gradient tracking, the activation is lifted
//! into the autodiff graph, and (b) is replayed with dropout skipped. The
//! gradient of the predicted class's probability with respect to the
//! activation weights each channel; the weighted channel mean, clipped and
//! rescaled to [0, 1], is the saliency map.

use std::ops::Range;

use burn::tensor::{
    activation::softmax,
    backend::{AutodiffBackend, Backend},
    Tensor,
};

use super::heatmap::Heatmap;
use crate::model::{Classifier, MobileNetV2};
use crate::utils::error::{LeafCamError, Result};

/// Static before/after split of the backbone at the tap layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradCamSplit {
    tap_layer: String,
    tap_index: usize,
    num_layers: usize,
}

impl GradCamSplit {
    /// Locate `tap_layer` in the backbone.
    ///
    /// Returns `None` when no layer has that name.
    pub fn resolve<B: Backend>(backbone: &MobileNetV2<B>, tap_layer: &str) -> Option<Self> {
        let tap_index = backbone.position(tap_layer)?;
        Some(Self {
            tap_layer: tap_layer.to_string(),
            tap_index,
            num_layers: backbone.layers().len(),
        })
    }

    pub fn tap_layer(&self) -> &str {
        &self.tap_layer
    }

    pub fn tap_index(&self) -> usize {
        self.tap_index
    }

    /// Layers producing the activation, tap included
    pub fn before_tap(&self) -> Range<usize> {
        0..self.tap_index + 1
    }

    /// Backbone layers replayed on the autodiff side
    pub fn after_tap(&self) -> Range<usize> {
        self.tap_index + 1..self.num_layers
    }

    fn check<B: Backend>(&self, backbone: &MobileNetV2<B>) -> Result<()> {
        let names = backbone.layer_names();
        if names.len() != self.num_layers || names.get(self.tap_index) != Some(&self.tap_layer) {
            return Err(LeafCamError::Saliency(format!(
                "split at '{}' does not match the backbone",
                self.tap_layer
            )));
        }
        Ok(())
    }
}

/// Collapse an activation map and its gradient into a normalized heatmap.
///
/// Both tensors are `[1, C, H, W]`. Channel weights are the spatial mean of
/// the gradient; the map is the channel mean of `weights * activation`.
pub fn class_activation_map<B: Backend>(
    activation: Tensor<B, 4>,
    gradient: Tensor<B, 4>,
) -> Result<Heatmap> {
    let dims = activation.dims();
    if dims != gradient.dims() {
        return Err(LeafCamError::Saliency(format!(
            "activation {:?} and gradient {:?} differ in shape",
            dims,
            gradient.dims()
        )));
    }
    let [batch, _, height, width] = dims;
    if batch != 1 {
        return Err(LeafCamError::Saliency(format!(
            "expected a single-image batch, got {}",
            batch
        )));
    }

    // [1, C, 1, 1]
    let weights = gradient.mean_dim(3).mean_dim(2);
    // [1, 1, H, W]
    let cam = activation.mul(weights).mean_dim(1);

    let values = cam
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| LeafCamError::Saliency(format!("{:?}", e)))?;

    Heatmap::normalized(width as u32, height as u32, values)
}

/// Activation at the tap and the gradient of `class_index`'s probability
/// with respect to it, both `[1, C, H, W]` on the inference backend.
///
/// `model` and `grad_model` must hold the same weights; the first runs the
/// pre-tap half, the second the differentiated post-tap half.
pub fn tap_gradient<AD: AutodiffBackend>(
    split: &GradCamSplit,
    model: &Classifier<AD::InnerBackend>,
    grad_model: &Classifier<AD>,
    input: Tensor<AD::InnerBackend, 4>,
    class_index: usize,
) -> Result<(Tensor<AD::InnerBackend, 4>, Tensor<AD::InnerBackend, 4>)> {
    split.check(&model.backbone)?;
    split.check(&grad_model.backbone)?;

    let num_classes = grad_model.num_classes();
    if class_index >= num_classes {
        return Err(LeafCamError::Saliency(format!(
            "class {} out of range for {} outputs",
            class_index, num_classes
        )));
    }

    let activation = model.backbone.forward_range(input, split.before_tap());

    let tracked = Tensor::<AD, 4>::from_inner(activation.clone()).require_grad();
    let features = grad_model
        .backbone
        .forward_range(tracked.clone(), split.after_tap());
    let probabilities = softmax(grad_model.head.forward_without_dropout(features), 1);

    let score = probabilities
        .slice([0..1, class_index..class_index + 1])
        .sum();
    let grads = score.backward();

    let gradient = tracked.grad(&grads).ok_or_else(|| {
        LeafCamError::Saliency(format!(
            "no gradient reached tap layer '{}'",
            split.tap_layer()
        ))
    })?;

    Ok((activation, gradient))
}

/// Compute the Grad-CAM heatmap for `class_index`, resized to `output_size`
pub fn grad_cam<AD: AutodiffBackend>(
    split: &GradCamSplit,
    model: &Classifier<AD::InnerBackend>,
    grad_model: &Classifier<AD>,
    input: Tensor<AD::InnerBackend, 4>,
    class_index: usize,
    output_size: (u32, u32),
) -> Result<Heatmap> {
    let (activation, gradient) = tap_gradient(split, model, grad_model, input, class_index)?;
    class_activation_map(activation, gradient)?.resize(output_size.0, output_size.1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DefaultBackend, GradBackend};
    use crate::model::{ClassifierConfig, MobileNetV2Config};
    use burn::module::AutodiffModule;
    use burn::tensor::{Distribution, TensorData};

    type B = DefaultBackend;

    #[test]
    fn test_resolve_split() {
        let backbone: MobileNetV2<B> = MobileNetV2Config::new()
            .with_width_multiplier(0.35)
            .init(&Default::default());

        let split = GradCamSplit::resolve(&backbone, "Conv_1").unwrap();

        assert_eq!(split.tap_index(), 18);
        assert_eq!(split.before_tap(), 0..19);
        assert_eq!(split.after_tap(), 19..21);
        assert!(GradCamSplit::resolve(&backbone, "no_such_layer").is_none());
    }

    #[test]
    fn test_cam_matches_hand_computation() {
        let device = Default::default();
        // Two channels on a 1x2 grid
        let activation = Tensor::<B, 4>::from_floats(
            TensorData::new(vec![1.0f32, 3.0, 2.0, 0.0], [1, 2, 1, 2]),
            &device,
        );
        // Channel weights: 1.0 and -0.5
        let gradient = Tensor::<B, 4>::from_floats(
            TensorData::new(vec![1.0f32, 1.0, -0.5, -0.5], [1, 2, 1, 2]),
            &device,
        );

        let heatmap = class_activation_map(activation, gradient).unwrap();

        // Raw: [(1 - 1) / 2, (3 - 0) / 2] = [0, 1.5]
        assert_eq!(heatmap.dimensions(), (2, 1));
        assert!((heatmap.values()[0] - 0.0).abs() < 1e-6);
        assert!((heatmap.values()[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cam_without_positive_contribution_is_zero() {
        let device = Default::default();
        let activation = Tensor::<B, 4>::ones([1, 4, 3, 3], &device);
        let gradient = Tensor::<B, 4>::ones([1, 4, 3, 3], &device).neg();

        let heatmap = class_activation_map(activation, gradient).unwrap();

        assert!(heatmap.values().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_cam_rejects_shape_mismatch() {
        let device = Default::default();
        let activation = Tensor::<B, 4>::ones([1, 4, 3, 3], &device);
        let gradient = Tensor::<B, 4>::ones([1, 4, 2, 3], &device);

        assert!(class_activation_map(activation, gradient).is_err());
    }

    #[test]
    fn test_grad_cam_end_to_end() {
        let device = Default::default();
        let grad_model: Classifier<GradBackend> = ClassifierConfig::new(3)
            .with_width_multiplier(0.35)
            .init(&device);
        let model = grad_model.clone().valid();
        let split = GradCamSplit::resolve(&model.backbone, "Conv_1").unwrap();

        let input = Tensor::<B, 4>::random([1, 3, 64, 64], Distribution::Default, &device);
        let heatmap = grad_cam(&split, &model, &grad_model, input, 1, (64, 64)).unwrap();

        assert_eq!(heatmap.dimensions(), (64, 64));
        assert!(heatmap.values().iter().all(|v| (0.0..=1.0).contains(v)));
    }

    /// Class probability from the inference model, starting at the tap
    fn class_probability(
        model: &Classifier<B>,
        split: &GradCamSplit,
        activation: Vec<f32>,
        dims: [usize; 4],
        class_index: usize,
    ) -> f32 {
        let x = Tensor::<B, 4>::from_floats(TensorData::new(activation, dims), &Default::default());
        let features = model.backbone.forward_range(x, split.after_tap());
        let probabilities = softmax(model.head.forward(features), 1);
        probabilities.into_data().to_vec::<f32>().unwrap()[class_index]
    }

    #[test]
    fn test_tap_gradient_matches_finite_differences() {
        let device = Default::default();
        let grad_model: Classifier<GradBackend> = ClassifierConfig::new(3)
            .with_width_multiplier(0.35)
            .with_dense_units(64)
            .init(&device);
        let model = grad_model.clone().valid();
        let split = GradCamSplit::resolve(&model.backbone, "out_relu").unwrap();
        let class_index = 2;

        let input = Tensor::<B, 4>::random([1, 3, 64, 64], Distribution::Default, &device);
        let (activation, gradient) =
            tap_gradient(&split, &model, &grad_model, input, class_index).unwrap();

        let dims = activation.dims();
        let activation: Vec<f32> = activation.into_data().to_vec().unwrap();
        let gradient: Vec<f32> = gradient.into_data().to_vec().unwrap();
        assert_eq!(activation.len(), gradient.len());

        // Check the entries with the largest gradients
        let mut order: Vec<usize> = (0..gradient.len()).collect();
        order.sort_by(|&a, &b| gradient[b].abs().total_cmp(&gradient[a].abs()));
        assert!(gradient[order[0]].abs() > 0.0);

        let eps = 1e-2;
        for &idx in order.iter().take(4) {
            let mut plus = activation.clone();
            plus[idx] += eps;
            let mut minus = activation.clone();
            minus[idx] -= eps;

            let numeric = (class_probability(&model, &split, plus, dims, class_index)
                - class_probability(&model, &split, minus, dims, class_index))
                / (2.0 * eps);
            let analytic = gradient[idx];

            assert!(
                (numeric - analytic).abs() <= 0.05 * analytic.abs() + 1e-6,
                "index {}: analytic {} vs numeric {}",
                idx,
                analytic,
                numeric
            );
        }
    }

    #[test]
    fn test_grad_cam_rejects_bad_class() {
        let device = Default::default();
        let grad_model: Classifier<GradBackend> = ClassifierConfig::new(3)
            .with_width_multiplier(0.35)
            .init(&device);
        let model = grad_model.clone().valid();
        let split = GradCamSplit::resolve(&model.backbone, "block_16").unwrap();

        let input = Tensor::<B, 4>::zeros([1, 3, 32, 32], &device);
        let err = grad_cam(&split, &model, &grad_model, input, 3, (32, 32)).unwrap_err();

        assert!(matches!(err, LeafCamError::Saliency(_)));
    }
}
