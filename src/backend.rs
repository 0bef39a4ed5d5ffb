//! Backend abstraction
//!
//! Inference runs on the CPU `NdArray` backend unless the `cuda` feature is
//! enabled. Grad-CAM needs gradients, so the classifier also exists on the
//! autodiff wrapper of the same backend.

use burn::backend::Autodiff;
use burn::tensor::backend::Backend;

#[cfg(feature = "cuda")]
pub type DefaultBackend = burn_cuda::Cuda;

#[cfg(not(feature = "cuda"))]
pub type DefaultBackend = burn::backend::NdArray;

/// Autodiff backend used to back-propagate class scores for Grad-CAM
pub type GradBackend = Autodiff<DefaultBackend>;

/// Device type of the default backend
pub type DefaultDevice = <DefaultBackend as Backend>::Device;

/// Get the default device
pub fn default_device() -> DefaultDevice {
    #[cfg(feature = "cuda")]
    {
        burn_cuda::CudaDevice::default()
    }
    #[cfg(not(feature = "cuda"))]
    {
        burn::backend::ndarray::NdArrayDevice::Cpu
    }
}

/// Get a human-readable name for the current backend
pub fn backend_name() -> &'static str {
    #[cfg(feature = "cuda")]
    {
        "CUDA (GPU)"
    }
    #[cfg(not(feature = "cuda"))]
    {
        "NdArray (CPU)"
    }
}
