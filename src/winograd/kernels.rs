//! In-process Winograd kernels, staged in f32
//!
//! These are the reference implementations of the two kernel families. The
//! reference execution strategy runs them directly; [`MockDevice`] runs the
//! same code behind the device trait so accelerated-path plumbing can be
//! tested bit-for-bit against the reference results.
//!
//! Buffer layouts (see the module docs of [`crate::winograd`]):
//! - input transform: NHWC in, `[coords, in_c, batch·tiles]` out
//! - inverse transform: `[coords, out_c, batch·tiles]` in, NHWC out
//!
//! [`MockDevice`]: crate::device::MockDevice

use crate::device::{KernelArgs, KernelParams, KernelSpec};
use crate::error::{Result, TeselaError};

use super::WinogradVariant;

/// Run the kernel a spec describes against staged f32 buffers
pub(crate) fn execute(spec: &KernelSpec, args: KernelArgs<'_>) -> Result<()> {
    match spec.params {
        KernelParams::InputTransform {
            pad_top,
            pad_left,
            tiles_h,
            tiles_w,
        } => {
            let shape = &spec.input_shape;
            if shape.len() != 4 {
                return Err(TeselaError::InvalidShape {
                    reason: format!("input transform expects rank 4, got {:?}", shape),
                });
            }
            input_transform(
                spec.variant,
                args.input,
                [shape[0], shape[1], shape[2], shape[3]],
                pad_top,
                pad_left,
                tiles_h,
                tiles_w,
                args.output,
            );
            Ok(())
        }
        KernelParams::InverseTransform {
            batch,
            height,
            width,
            out_channels,
            activation,
        } => {
            inverse_transform(
                spec.variant,
                args.input,
                args.bias,
                activation,
                batch,
                height,
                width,
                out_channels,
                args.output,
            );
            Ok(())
        }
    }
}

/// Forward transform: NHWC input to `[coords, in_c, batch·tiles]` tiles
///
/// Reads outside the input extent (implicit padding) are zero.
#[allow(clippy::too_many_arguments)]
pub(crate) fn input_transform(
    variant: WinogradVariant,
    input: &[f32],
    shape: [usize; 4],
    pad_top: usize,
    pad_left: usize,
    tiles_h: usize,
    tiles_w: usize,
    output: &mut [f32],
) {
    let [batch, in_h, in_w, in_c] = shape;
    let ot = variant.output_tile();
    let it = variant.input_tile();
    let coords = variant.coordinates();
    let total_tiles = batch * tiles_h * tiles_w;
    debug_assert_eq!(input.len(), batch * in_h * in_w * in_c);
    debug_assert_eq!(output.len(), coords * in_c * total_tiles);

    let mut d = [0.0f32; 36];
    let mut v = [0.0f32; 36];

    for n in 0..batch {
        for th in 0..tiles_h {
            for tw in 0..tiles_w {
                let tile_index = (n * tiles_h + th) * tiles_w + tw;
                for ch in 0..in_c {
                    for i in 0..it {
                        let row = (th * ot + i) as isize - pad_top as isize;
                        for j in 0..it {
                            let col = (tw * ot + j) as isize - pad_left as isize;
                            d[i * it + j] = if row >= 0
                                && (row as usize) < in_h
                                && col >= 0
                                && (col as usize) < in_w
                            {
                                let offset = ((n * in_h + row as usize) * in_w + col as usize)
                                    * in_c
                                    + ch;
                                input[offset]
                            } else {
                                0.0
                            };
                        }
                    }
                    variant.transform_input_tile(&d[..coords], &mut v[..coords]);
                    for k in 0..coords {
                        output[(k * in_c + ch) * total_tiles + tile_index] = v[k];
                    }
                }
            }
        }
    }
}

/// Inverse transform: `[coords, out_c, batch·tiles]` to NHWC output
///
/// Fuses per-channel bias addition and the activation; tile overhang past
/// `(height, width)` is discarded.
#[allow(clippy::too_many_arguments)]
pub(crate) fn inverse_transform(
    variant: WinogradVariant,
    input: &[f32],
    bias: Option<&[f32]>,
    activation: crate::activation::Activation,
    batch: usize,
    height: usize,
    width: usize,
    out_channels: usize,
    output: &mut [f32],
) {
    let ot = variant.output_tile();
    let coords = variant.coordinates();
    let tiles_h = height.div_ceil(ot);
    let tiles_w = width.div_ceil(ot);
    let total_tiles = batch * tiles_h * tiles_w;
    debug_assert_eq!(input.len(), coords * out_channels * total_tiles);
    debug_assert_eq!(output.len(), batch * height * width * out_channels);

    let mut m = [0.0f32; 36];
    let mut y = [0.0f32; 16];

    for n in 0..batch {
        for th in 0..tiles_h {
            for tw in 0..tiles_w {
                let tile_index = (n * tiles_h + th) * tiles_w + tw;
                for oc in 0..out_channels {
                    for k in 0..coords {
                        m[k] = input[(k * out_channels + oc) * total_tiles + tile_index];
                    }
                    variant.inverse_transform_tile(&m[..coords], &mut y[..ot * ot]);
                    let bias_value = bias.map_or(0.0, |b| b[oc]);
                    for i in 0..ot {
                        let row = th * ot + i;
                        if row >= height {
                            break;
                        }
                        for j in 0..ot {
                            let col = tw * ot + j;
                            if col >= width {
                                break;
                            }
                            let offset = ((n * height + row) * width + col) * out_channels + oc;
                            output[offset] = activation.apply(y[i * ot + j] + bias_value);
                        }
                    }
                }
            }
        }
    }
}

/// Filter transform: OIHW 3×3 filter to `[coords, out_c, in_c]`
pub(crate) fn filter_transform(
    variant: WinogradVariant,
    filter: &[f32],
    out_channels: usize,
    in_channels: usize,
    output: &mut [f32],
) {
    let coords = variant.coordinates();
    debug_assert_eq!(filter.len(), out_channels * in_channels * 9);
    debug_assert_eq!(output.len(), coords * out_channels * in_channels);

    let mut u = [0.0f32; 36];
    for oc in 0..out_channels {
        for ic in 0..in_channels {
            let base = (oc * in_channels + ic) * 9;
            variant.transform_filter_tile(&filter[base..base + 9], &mut u[..coords]);
            for k in 0..coords {
                output[(k * out_channels + oc) * in_channels + ic] = u[k];
            }
        }
    }
}
