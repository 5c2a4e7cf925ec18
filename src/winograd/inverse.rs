//! Inverse Winograd transform functor
//!
//! Projects `[coordinates, out_channels, batch·tiles]` matmul results back
//! into a spatial NHWC output, fusing bias addition and activation into the
//! write. The declared output height and width come from construction;
//! tile overhang beyond them is discarded.

use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::activation::Activation;
use crate::completion::{Completion, DeviceTiming};
use crate::device::{
    ComputeDevice, Executor, KernelArgs, KernelFamily, KernelParams, KernelSpec,
};
use crate::dtype::Element;
use crate::error::{Result, TeselaError};
use crate::tensor::Tensor;

use super::variant::WinogradVariant;

/// Immutable configuration of the inverse transform
///
/// Must use the same variant as the forward step; the basis-change matrices
/// are a matched pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InverseConfig {
    variant: WinogradVariant,
    batch: usize,
    height: usize,
    width: usize,
    activation: Activation,
}

impl InverseConfig {
    /// Configuration for a `batch × height × width` output, no activation
    #[must_use]
    pub fn new(batch: usize, height: usize, width: usize) -> Self {
        Self {
            variant: WinogradVariant::default(),
            batch,
            height,
            width,
            activation: Activation::Identity,
        }
    }

    /// Select the Winograd variant (must match the forward transform)
    #[must_use]
    pub fn with_variant(mut self, variant: WinogradVariant) -> Self {
        self.variant = variant;
        self
    }

    /// Fuse an activation into the spatial write
    #[must_use]
    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    /// Accept stride parameters; anything but `(1, 1)` is rejected
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedOperation` for strides other than `(1, 1)`.
    pub fn with_strides(self, strides: (usize, usize)) -> Result<Self> {
        if strides != (1, 1) {
            return Err(TeselaError::UnsupportedOperation {
                operation: "with_strides".to_string(),
                reason: format!("winograd requires stride (1, 1), got {strides:?}"),
            });
        }
        Ok(self)
    }

    /// Accept dilation parameters; anything but `(1, 1)` is rejected
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedOperation` for dilations other than `(1, 1)`.
    pub fn with_dilations(self, dilations: (usize, usize)) -> Result<Self> {
        if dilations != (1, 1) {
            return Err(TeselaError::UnsupportedOperation {
                operation: "with_dilations".to_string(),
                reason: format!("winograd requires dilation (1, 1), got {dilations:?}"),
            });
        }
        Ok(self)
    }

    /// Winograd variant
    #[must_use]
    pub fn variant(&self) -> WinogradVariant {
        self.variant
    }

    /// Output batch size
    #[must_use]
    pub fn batch(&self) -> usize {
        self.batch
    }

    /// Declared output height
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Declared output width
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Fused activation
    #[must_use]
    pub fn activation(&self) -> Activation {
        self.activation
    }

    fn tile_grid(&self) -> (usize, usize) {
        let tile = self.variant.output_tile();
        (self.height.div_ceil(tile), self.width.div_ceil(tile))
    }
}

/// Inverse transform functor
pub struct WinogradInverseTransform<T: Element> {
    config: InverseConfig,
    executor: Executor,
    _element: PhantomData<T>,
}

impl<T: Element> WinogradInverseTransform<T> {
    /// Functor with the reference (in-process) execution strategy
    #[must_use]
    pub fn reference(config: InverseConfig) -> Self {
        Self {
            config,
            executor: Executor::reference(),
            _element: PhantomData,
        }
    }

    /// Functor offloading to `device`, with a cold kernel cache
    #[must_use]
    pub fn accelerated(config: InverseConfig, device: Box<dyn ComputeDevice>) -> Self {
        Self {
            config,
            executor: Executor::accelerated(device),
            _element: PhantomData,
        }
    }

    /// Configuration this functor was built with
    #[must_use]
    pub fn config(&self) -> &InverseConfig {
        &self.config
    }

    /// Execution strategy, for cache inspection
    #[must_use]
    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Expected matmul-result shape `[coords, out_channels, batch·tiles]`
    #[must_use]
    pub fn expected_input_shape(&self, out_channels: usize) -> Vec<usize> {
        let (tiles_h, tiles_w) = self.config.tile_grid();
        vec![
            self.config.variant.coordinates(),
            out_channels,
            self.config.batch * tiles_h * tiles_w,
        ]
    }

    /// Spatial output shape `[batch, height, width, out_channels]`
    #[must_use]
    pub fn output_shape(&self, out_channels: usize) -> Vec<usize> {
        vec![
            self.config.batch,
            self.config.height,
            self.config.width,
            out_channels,
        ]
    }

    /// Project matmul results back to the spatial domain
    ///
    /// `bias`, when present, must have one value per output channel; it is
    /// broadcast over batch and spatial dimensions. The activation from the
    /// configuration is applied after the bias. Signals `completion`
    /// exactly once with the same outcome this call returns.
    ///
    /// # Errors
    ///
    /// `InvalidShape` if the matmul-result layout does not match the
    /// declared forward layout, the bias length differs from the output
    /// channel count, or the output tensor has the wrong shape;
    /// `UnsupportedOperation` when the reference path has no kernel for
    /// `T`; device errors from the accelerated strategy.
    pub fn inverse_transform(
        &mut self,
        matmul_result: &Tensor<T>,
        bias: Option<&Tensor<T>>,
        output: &mut Tensor<T>,
        completion: &Completion,
    ) -> Result<()> {
        let outcome = self.run(matmul_result, bias, output);
        match outcome {
            Ok(timing) => {
                completion.complete(Ok(timing));
                Ok(())
            }
            Err(err) => {
                completion.complete(Err(err.clone()));
                Err(err)
            }
        }
    }

    fn run(
        &mut self,
        matmul_result: &Tensor<T>,
        bias: Option<&Tensor<T>>,
        output: &mut Tensor<T>,
    ) -> Result<DeviceTiming> {
        if matmul_result.ndim() != 3 {
            return Err(TeselaError::InvalidShape {
                reason: format!(
                    "matmul result must be rank 3 [coords, out_c, tiles], got {:?}",
                    matmul_result.shape()
                ),
            });
        }
        let out_channels = matmul_result.dim(1);
        let expected_input = self.expected_input_shape(out_channels);
        if matmul_result.shape() != expected_input.as_slice() {
            return Err(TeselaError::InvalidShape {
                reason: format!(
                    "matmul result shape {:?} does not match tile layout {:?} for a \
                     {}x{} output",
                    matmul_result.shape(),
                    expected_input,
                    self.config.height,
                    self.config.width
                ),
            });
        }
        if let Some(bias) = bias {
            if bias.ndim() != 1 || bias.dim(0) != out_channels {
                return Err(TeselaError::InvalidShape {
                    reason: format!(
                        "bias shape {:?} does not match {out_channels} output channels",
                        bias.shape()
                    ),
                });
            }
        }
        let expected_output = self.output_shape(out_channels);
        if output.shape() != expected_output.as_slice() {
            return Err(TeselaError::InvalidShape {
                reason: format!(
                    "inverse transform output shape {:?} does not match expected {:?}",
                    output.shape(),
                    expected_output
                ),
            });
        }

        let spec = KernelSpec {
            family: KernelFamily::InverseTransform,
            variant: self.config.variant,
            dtype: T::DTYPE,
            input_shape: matmul_result.shape().to_vec(),
            params: KernelParams::InverseTransform {
                batch: self.config.batch,
                height: self.config.height,
                width: self.config.width,
                out_channels,
                activation: self.config.activation,
            },
        };

        let staged: Vec<f32> = matmul_result
            .data()
            .iter()
            .copied()
            .map(Element::to_f32)
            .collect();
        let staged_bias: Option<Vec<f32>> =
            bias.map(|b| b.data().iter().copied().map(Element::to_f32).collect());
        let mut staged_out = vec![0.0f32; output.size()];
        let timing = self.executor.run(
            &spec,
            KernelArgs {
                input: &staged,
                bias: staged_bias.as_deref(),
                output: &mut staged_out,
            },
        )?;
        for (dst, src) in output.data_mut().iter_mut().zip(staged_out) {
            *dst = T::from_f32(src);
        }
        Ok(timing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strides_other_than_one_rejected() {
        let err = InverseConfig::new(1, 8, 8).with_strides((2, 2)).unwrap_err();
        assert!(matches!(err, TeselaError::UnsupportedOperation { .. }));
        let err = InverseConfig::new(1, 8, 8)
            .with_dilations((2, 1))
            .unwrap_err();
        assert!(matches!(err, TeselaError::UnsupportedOperation { .. }));
    }

    #[test]
    fn test_expected_shapes_scenario() {
        // [1,8,8,·] with the tile-4 variant: 2x2 tile grid.
        let functor = WinogradInverseTransform::<f32>::reference(InverseConfig::new(1, 8, 8));
        assert_eq!(functor.expected_input_shape(16), vec![36, 16, 4]);
        assert_eq!(functor.output_shape(16), vec![1, 8, 8, 16]);
    }

    #[test]
    fn test_mismatched_tile_layout_rejected() {
        let mut functor = WinogradInverseTransform::<f32>::reference(InverseConfig::new(1, 8, 8));
        // 16 coordinates is the tile-2 layout; the functor expects tile-4.
        let wrong = Tensor::<f32>::zeros(vec![16, 4, 16]).unwrap();
        let mut output = Tensor::zeros(vec![1, 8, 8, 4]).unwrap();
        let completion = Completion::new();
        let err = functor
            .inverse_transform(&wrong, None, &mut output, &completion)
            .unwrap_err();
        assert!(matches!(err, TeselaError::InvalidShape { .. }));
    }

    #[test]
    fn test_bias_length_mismatch_rejected() {
        let mut functor = WinogradInverseTransform::<f32>::reference(InverseConfig::new(1, 4, 4));
        let matmul = Tensor::<f32>::zeros(vec![36, 8, 1]).unwrap();
        let bias = Tensor::<f32>::zeros(vec![3]).unwrap();
        let mut output = Tensor::zeros(vec![1, 4, 4, 8]).unwrap();
        let completion = Completion::new();
        let err = functor
            .inverse_transform(&matmul, Some(&bias), &mut output, &completion)
            .unwrap_err();
        assert!(matches!(err, TeselaError::InvalidShape { .. }));
    }

    #[test]
    fn test_zero_input_yields_bias_through_activation() {
        let mut functor = WinogradInverseTransform::<f32>::reference(
            InverseConfig::new(1, 4, 4).with_activation(Activation::Relu),
        );
        let matmul = Tensor::<f32>::zeros(vec![36, 2, 1]).unwrap();
        let bias = Tensor::from_vec(vec![2], vec![1.5f32, -2.0]).unwrap();
        let mut output = Tensor::zeros(vec![1, 4, 4, 2]).unwrap();
        let completion = Completion::new();
        functor
            .inverse_transform(&matmul, Some(&bias), &mut output, &completion)
            .unwrap();
        assert!(completion.wait().is_ok());
        for px in 0..16 {
            assert_eq!(output.data()[px * 2], 1.5);
            assert_eq!(output.data()[px * 2 + 1], 0.0); // relu clipped
        }
    }
}
