//! Shared helpers: direct spatial convolution as the ground truth, and the
//! external per-coordinate matmul the engine performs between the two
//! transform stages.

#![allow(dead_code)]

use tesela::padding::output_dims;
use tesela::{Activation, Padding, Tensor};

/// Direct NHWC 3x3 stride-1 convolution with bias and activation.
///
/// Input `[n, h, w, in_c]`, filter OIHW `[out_c, in_c, 3, 3]`.
pub fn direct_conv(
    input: &Tensor<f32>,
    filter: &Tensor<f32>,
    bias: Option<&[f32]>,
    padding: Padding,
    activation: Activation,
) -> Tensor<f32> {
    let (batch, in_h, in_w, in_c) = (input.dim(0), input.dim(1), input.dim(2), input.dim(3));
    let (out_c, filter_in_c) = (filter.dim(0), filter.dim(1));
    assert_eq!(in_c, filter_in_c);

    let (out_h, out_w) = output_dims(&padding, in_h, in_w, 3);
    let amounts = tesela::padding::compute_padding(&padding, 3);

    let mut output = Tensor::zeros(vec![batch, out_h, out_w, out_c]).unwrap();
    for n in 0..batch {
        for oh in 0..out_h {
            for ow in 0..out_w {
                for oc in 0..out_c {
                    let mut sum = bias.map_or(0.0, |b| b[oc]);
                    for ki in 0..3 {
                        for kj in 0..3 {
                            let ih = (oh + ki) as isize - amounts.top as isize;
                            let iw = (ow + kj) as isize - amounts.left as isize;
                            if ih < 0 || iw < 0 || ih as usize >= in_h || iw as usize >= in_w {
                                continue;
                            }
                            for ic in 0..in_c {
                                let x = input.data()
                                    [input.nhwc_offset(n, ih as usize, iw as usize, ic)];
                                let w = filter.data()[((oc * in_c + ic) * 3 + ki) * 3 + kj];
                                sum += x * w;
                            }
                        }
                    }
                    let offset = output.nhwc_offset(n, oh, ow, oc);
                    output.data_mut()[offset] = activation.apply(sum);
                }
            }
        }
    }
    output
}

/// The engine's elementwise multiply-accumulate between the transforms:
/// one `[out_c, in_c] x [in_c, tiles]` matmul per Winograd coordinate.
///
/// `u` is `[coords, out_c, in_c]` (transformed filter), `v` is
/// `[coords, in_c, tiles]` (transformed input); result is
/// `[coords, out_c, tiles]`.
pub fn winograd_matmul(u: &Tensor<f32>, v: &Tensor<f32>) -> Tensor<f32> {
    let (coords, out_c, in_c) = (u.dim(0), u.dim(1), u.dim(2));
    assert_eq!(v.dim(0), coords);
    assert_eq!(v.dim(1), in_c);
    let tiles = v.dim(2);

    let mut result = Tensor::zeros(vec![coords, out_c, tiles]).unwrap();
    for k in 0..coords {
        for oc in 0..out_c {
            for t in 0..tiles {
                let mut sum = 0.0;
                for ic in 0..in_c {
                    sum += u.data()[(k * out_c + oc) * in_c + ic]
                        * v.data()[(k * in_c + ic) * tiles + t];
                }
                result.data_mut()[(k * out_c + oc) * tiles + t] = sum;
            }
        }
    }
    result
}

/// Max relative error between two tensors, normalized by the largest
/// magnitude in the expected tensor.
pub fn max_relative_error(got: &Tensor<f32>, expected: &Tensor<f32>) -> f32 {
    assert_eq!(got.shape(), expected.shape());
    let scale = expected
        .data()
        .iter()
        .fold(0.0f32, |acc, v| acc.max(v.abs()))
        .max(1e-6);
    got.data()
        .iter()
        .zip(expected.data().iter())
        .fold(0.0f32, |acc, (g, e)| acc.max((g - e).abs() / scale))
}

/// Deterministic pseudo-random values in `[-1, 1]` for test tensors.
pub fn test_values(len: usize, seed: u32) -> Vec<f32> {
    let mut state = seed.wrapping_mul(2_654_435_761).max(1);
    (0..len)
        .map(|_| {
            // xorshift32
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state as f32 / u32::MAX as f32) * 2.0 - 1.0
        })
        .collect()
}
