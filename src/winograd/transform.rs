//! Forward Winograd transform functor
//!
//! Projects a 4-D NHWC activation tensor into Winograd-domain tiles laid
//! out `[coordinates, in_channels, batch·tiles]`, ready for the downstream
//! per-coordinate matmul. Also hosts the filter transform, which runs once
//! at graph-build time and therefore has no device execution strategy.

use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::completion::{Completion, DeviceTiming};
use crate::device::{
    ComputeDevice, Executor, KernelArgs, KernelFamily, KernelParams, KernelSpec,
};
use crate::dtype::Element;
use crate::error::{Result, TeselaError};
use crate::padding::{compute_padding, output_dim, Padding};
use crate::tensor::Tensor;

use super::kernels;
use super::variant::{WinogradVariant, FILTER_SIZE};

/// Immutable configuration of the forward transform
///
/// Stride and dilation are fixed at `(1, 1)`; the Winograd algebra is only
/// valid there. The `with_strides`/`with_dilations` builders exist so a
/// caller wiring up a conv path can pass its parameters through and get a
/// typed rejection for anything unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformConfig {
    variant: WinogradVariant,
    padding: Padding,
    strides: (usize, usize),
    dilations: (usize, usize),
}

impl TransformConfig {
    /// Configuration with the default variant and the given padding
    #[must_use]
    pub fn new(padding: Padding) -> Self {
        Self {
            variant: WinogradVariant::default(),
            padding,
            strides: (1, 1),
            dilations: (1, 1),
        }
    }

    /// Select the Winograd variant
    #[must_use]
    pub fn with_variant(mut self, variant: WinogradVariant) -> Self {
        self.variant = variant;
        self
    }

    /// Accept stride parameters; anything but `(1, 1)` is rejected
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedOperation` for strides other than `(1, 1)`;
    /// such convolutions must fall back to a different conv path.
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

    /// Padding descriptor
    #[must_use]
    pub fn padding(&self) -> Padding {
        self.padding
    }

    /// Stride, always `(1, 1)`
    #[must_use]
    pub fn strides(&self) -> (usize, usize) {
        self.strides
    }

    /// Dilation, always `(1, 1)`
    #[must_use]
    pub fn dilations(&self) -> (usize, usize) {
        self.dilations
    }
}

/// Forward transform functor
///
/// Owns its execution strategy (and, on the accelerated path, the kernel
/// cache). One instance serves one inference stream; calls on it are
/// serialized by `&mut self`.
pub struct WinogradTransform<T: Element> {
    config: TransformConfig,
    executor: Executor,
    _element: PhantomData<T>,
}

impl<T: Element> WinogradTransform<T> {
    /// Functor with the reference (in-process) execution strategy
    #[must_use]
    pub fn reference(config: TransformConfig) -> Self {
        Self {
            config,
            executor: Executor::reference(),
            _element: PhantomData,
        }
    }

    /// Functor offloading to `device`, with a cold kernel cache
    #[must_use]
    pub fn accelerated(config: TransformConfig, device: Box<dyn ComputeDevice>) -> Self {
        Self {
            config,
            executor: Executor::accelerated(device),
            _element: PhantomData,
        }
    }

    /// Configuration this functor was built with
    #[must_use]
    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    /// Execution strategy, for cache inspection
    #[must_use]
    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Tile grid `(tiles_h, tiles_w)` for a given NHWC input shape
    ///
    /// # Errors
    ///
    /// Returns `InvalidShape` if the input is not rank 4 or is too small
    /// for a 3×3 filter under the configured padding.
    pub fn tile_grid(&self, input_shape: &[usize]) -> Result<(usize, usize)> {
        if input_shape.len() != 4 {
            return Err(TeselaError::InvalidShape {
                reason: format!("transform input must be rank 4 (NHWC), got {input_shape:?}"),
            });
        }
        let amounts = compute_padding(&self.config.padding, FILTER_SIZE);
        let out_h = output_dim(input_shape[1], FILTER_SIZE, amounts.top, amounts.bottom);
        let out_w = output_dim(input_shape[2], FILTER_SIZE, amounts.left, amounts.right);
        if out_h == 0 || out_w == 0 {
            return Err(TeselaError::InvalidShape {
                reason: format!(
                    "input {input_shape:?} too small for a {FILTER_SIZE}x{FILTER_SIZE} filter \
                     under {:?} padding",
                    self.config.padding
                ),
            });
        }
        let tile = self.config.variant.output_tile();
        Ok((out_h.div_ceil(tile), out_w.div_ceil(tile)))
    }

    /// Output shape `[coords, in_channels, batch·tiles]` for an input shape
    ///
    /// Callers allocate the output tensor with this shape; `transform`
    /// never resizes it.
    ///
    /// # Errors
    ///
    /// Same conditions as [`WinogradTransform::tile_grid`].
    pub fn output_shape(&self, input_shape: &[usize]) -> Result<Vec<usize>> {
        let (tiles_h, tiles_w) = self.tile_grid(input_shape)?;
        Ok(vec![
            self.config.variant.coordinates(),
            input_shape[3],
            input_shape[0] * tiles_h * tiles_w,
        ])
    }

    /// Transform `input` into Winograd-domain tiles in `output`
    ///
    /// Signals `completion` exactly once: with timing statistics on
    /// success, or with the structured failure otherwise. The same outcome
    /// is returned directly for synchronous callers.
    ///
    /// # Errors
    ///
    /// `InvalidShape` for rank or output-shape mismatches;
    /// `UnsupportedOperation` when the reference path has no kernel for
    /// `T`; device errors from the accelerated strategy.
    pub fn transform(
        &mut self,
        input: &Tensor<T>,
        output: &mut Tensor<T>,
        completion: &Completion,
    ) -> Result<()> {
        let outcome = self.run(input, output);
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

    fn run(&mut self, input: &Tensor<T>, output: &mut Tensor<T>) -> Result<DeviceTiming> {
        let (tiles_h, tiles_w) = self.tile_grid(input.shape())?;
        let expected = self.output_shape(input.shape())?;
        if output.shape() != expected.as_slice() {
            return Err(TeselaError::InvalidShape {
                reason: format!(
                    "transform output shape {:?} does not match expected {:?}",
                    output.shape(),
                    expected
                ),
            });
        }

        let amounts = compute_padding(&self.config.padding, FILTER_SIZE);
        let spec = KernelSpec {
            family: KernelFamily::InputTransform,
            variant: self.config.variant,
            dtype: T::DTYPE,
            input_shape: input.shape().to_vec(),
            params: KernelParams::InputTransform {
                pad_top: amounts.top,
                pad_left: amounts.left,
                tiles_h,
                tiles_w,
            },
        };

        let staged: Vec<f32> = input.data().iter().copied().map(Element::to_f32).collect();
        let mut staged_out = vec![0.0f32; output.size()];
        let timing = self.executor.run(
            &spec,
            KernelArgs {
                input: &staged,
                bias: None,
                output: &mut staged_out,
            },
        )?;
        for (dst, src) in output.data_mut().iter_mut().zip(staged_out) {
            *dst = T::from_f32(src);
        }
        Ok(timing)
    }
}

/// Output shape `[coords, out_channels, in_channels]` of the filter
/// transform for an OIHW filter shape
///
/// # Errors
///
/// Returns `InvalidShape` unless the filter is `[out_c, in_c, 3, 3]`.
pub fn filter_output_shape(variant: WinogradVariant, filter_shape: &[usize]) -> Result<Vec<usize>> {
    if filter_shape.len() != 4 || filter_shape[2] != FILTER_SIZE || filter_shape[3] != FILTER_SIZE {
        return Err(TeselaError::InvalidShape {
            reason: format!(
                "filter must be [out_c, in_c, {FILTER_SIZE}, {FILTER_SIZE}], got {filter_shape:?}"
            ),
        });
    }
    Ok(vec![variant.coordinates(), filter_shape[0], filter_shape[1]])
}

/// Transform an OIHW 3×3 filter into `[coords, out_channels, in_channels]`
///
/// Runs on the host: filters are transformed once when the graph is built,
/// so there is no device strategy or completion handle here.
///
/// # Errors
///
/// `InvalidShape` for a non-3×3 filter or a mismatched output shape.
pub fn transform_filter<T: Element>(
    variant: WinogradVariant,
    filter: &Tensor<T>,
    output: &mut Tensor<T>,
) -> Result<()> {
    let expected = filter_output_shape(variant, filter.shape())?;
    if output.shape() != expected.as_slice() {
        return Err(TeselaError::InvalidShape {
            reason: format!(
                "filter transform output shape {:?} does not match expected {:?}",
                output.shape(),
                expected
            ),
        });
    }
    let staged: Vec<f32> = filter.data().iter().copied().map(Element::to_f32).collect();
    let mut staged_out = vec![0.0f32; output.size()];
    kernels::filter_transform(
        variant,
        &staged,
        filter.dim(0),
        filter.dim(1),
        &mut staged_out,
    );
    for (dst, src) in output.data_mut().iter_mut().zip(staged_out) {
        *dst = T::from_f32(src);
    }
    Ok(())
}
