//! Winograd variants and their basis-change matrices
//!
//! Two classic minimal-filtering variants for 3×3, stride-1 convolution are
//! provided. Both compute `Y = Aᵀ[(G g Gᵀ) ⊙ (Bᵀ d B)]A` per tile:
//!
//! - `OutputTile2` — F(2×2, 3×3): 4×4 input tiles, 16 coordinates.
//! - `OutputTile4` — F(4×4, 3×3): 6×6 input tiles, 36 coordinates, the
//!   default. Fewer tiles per image at a slightly worse condition number.
//!
//! The matrices are fixed constants of the variant; they are what make the
//! forward and inverse steps a matched pair, so both functors must be built
//! with the same variant.

use serde::{Deserialize, Serialize};

/// Filter edge length both variants are defined for
pub const FILTER_SIZE: usize = 3;

// F(2x2, 3x3) — interpolation points 0, 1, -1, inf.
const BT_2: [f32; 16] = [
    1.0, 0.0, -1.0, 0.0, //
    0.0, 1.0, 1.0, 0.0, //
    0.0, -1.0, 1.0, 0.0, //
    0.0, 1.0, 0.0, -1.0,
];
const G_2: [f32; 12] = [
    1.0, 0.0, 0.0, //
    0.5, 0.5, 0.5, //
    0.5, -0.5, 0.5, //
    0.0, 0.0, 1.0,
];
const AT_2: [f32; 8] = [
    1.0, 1.0, 1.0, 0.0, //
    0.0, 1.0, -1.0, -1.0,
];

// F(4x4, 3x3) — interpolation points 0, 1, -1, 2, -2, inf.
const BT_4: [f32; 36] = [
    4.0, 0.0, -5.0, 0.0, 1.0, 0.0, //
    0.0, -4.0, -4.0, 1.0, 1.0, 0.0, //
    0.0, 4.0, -4.0, -1.0, 1.0, 0.0, //
    0.0, -2.0, -1.0, 2.0, 1.0, 0.0, //
    0.0, 2.0, -1.0, -2.0, 1.0, 0.0, //
    0.0, 4.0, 0.0, -5.0, 0.0, 1.0,
];
#[allow(clippy::approx_constant)]
const G_4: [f32; 18] = [
    1.0 / 4.0,
    0.0,
    0.0,
    -1.0 / 6.0,
    -1.0 / 6.0,
    -1.0 / 6.0,
    -1.0 / 6.0,
    1.0 / 6.0,
    -1.0 / 6.0,
    1.0 / 24.0,
    1.0 / 12.0,
    1.0 / 6.0,
    1.0 / 24.0,
    -1.0 / 12.0,
    1.0 / 6.0,
    0.0,
    0.0,
    1.0,
];
const AT_4: [f32; 24] = [
    1.0, 1.0, 1.0, 1.0, 1.0, 0.0, //
    0.0, 1.0, -1.0, 2.0, -2.0, 0.0, //
    0.0, 1.0, 1.0, 4.0, 4.0, 0.0, //
    0.0, 1.0, -1.0, 8.0, -8.0, 1.0,
];

/// Winograd minimal-filtering variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WinogradVariant {
    /// F(2×2, 3×3): 2×2 output tiles from 4×4 input tiles
    OutputTile2,
    /// F(4×4, 3×3): 4×4 output tiles from 6×6 input tiles
    OutputTile4,
}

impl Default for WinogradVariant {
    fn default() -> Self {
        WinogradVariant::OutputTile4
    }
}

impl WinogradVariant {
    /// Spatial edge length of one output tile
    #[must_use]
    pub fn output_tile(self) -> usize {
        match self {
            WinogradVariant::OutputTile2 => 2,
            WinogradVariant::OutputTile4 => 4,
        }
    }

    /// Spatial edge length of one input tile (`output_tile + filter − 1`)
    #[must_use]
    pub fn input_tile(self) -> usize {
        self.output_tile() + FILTER_SIZE - 1
    }

    /// Number of Winograd coordinates per tile (`input_tile²`)
    #[must_use]
    pub fn coordinates(self) -> usize {
        self.input_tile() * self.input_tile()
    }

    /// Short tag used in kernel identifiers
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            WinogradVariant::OutputTile2 => "m2",
            WinogradVariant::OutputTile4 => "m4",
        }
    }

    fn bt(self) -> &'static [f32] {
        match self {
            WinogradVariant::OutputTile2 => &BT_2,
            WinogradVariant::OutputTile4 => &BT_4,
        }
    }

    fn g(self) -> &'static [f32] {
        match self {
            WinogradVariant::OutputTile2 => &G_2,
            WinogradVariant::OutputTile4 => &G_4,
        }
    }

    fn at(self) -> &'static [f32] {
        match self {
            WinogradVariant::OutputTile2 => &AT_2,
            WinogradVariant::OutputTile4 => &AT_4,
        }
    }

    /// Forward basis change of one input tile: `v = Bᵀ d B`
    ///
    /// `d` and `v` are `input_tile × input_tile`, row-major.
    pub(crate) fn transform_input_tile(self, d: &[f32], v: &mut [f32]) {
        let it = self.input_tile();
        sandwich(self.bt(), it, it, d, v);
    }

    /// Filter basis change of one 3×3 filter tile: `u = G g Gᵀ`
    ///
    /// `g` is 3×3; `u` is `input_tile × input_tile`, row-major.
    pub(crate) fn transform_filter_tile(self, g: &[f32], u: &mut [f32]) {
        sandwich(self.g(), self.input_tile(), FILTER_SIZE, g, u);
    }

    /// Inverse basis change of one accumulated tile: `y = Aᵀ m A`
    ///
    /// `m` is `input_tile × input_tile`; `y` is
    /// `output_tile × output_tile`, row-major.
    pub(crate) fn inverse_transform_tile(self, m: &[f32], y: &mut [f32]) {
        sandwich(self.at(), self.output_tile(), self.input_tile(), m, y);
    }
}

/// Compute `out = left · mid · leftᵀ` for a `rows × cols` matrix `left` and
/// a `cols × cols` matrix `mid`; `out` is `rows × rows`.
///
/// Scratch fits the largest variant (6×6) on the stack.
fn sandwich(left: &[f32], rows: usize, cols: usize, mid: &[f32], out: &mut [f32]) {
    debug_assert_eq!(left.len(), rows * cols);
    debug_assert_eq!(mid.len(), cols * cols);
    debug_assert_eq!(out.len(), rows * rows);

    let mut tmp = [0.0f32; 36];
    for i in 0..rows {
        for j in 0..cols {
            let mut sum = 0.0;
            for k in 0..cols {
                sum += left[i * cols + k] * mid[k * cols + j];
            }
            tmp[i * cols + j] = sum;
        }
    }
    for i in 0..rows {
        for j in 0..rows {
            let mut sum = 0.0;
            for k in 0..cols {
                sum += tmp[i * cols + k] * left[j * cols + k];
            }
            out[i * rows + j] = sum;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn direct_conv_tile(d: &[f32], g: &[f32], it: usize, ot: usize) -> Vec<f32> {
        // Valid 2-D correlation of an it×it tile with a 3×3 filter.
        let mut y = vec![0.0f32; ot * ot];
        for i in 0..ot {
            for j in 0..ot {
                let mut sum = 0.0;
                for ki in 0..FILTER_SIZE {
                    for kj in 0..FILTER_SIZE {
                        sum += d[(i + ki) * it + (j + kj)] * g[ki * FILTER_SIZE + kj];
                    }
                }
                y[i * ot + j] = sum;
            }
        }
        y
    }

    fn check_identity(variant: WinogradVariant) {
        let it = variant.input_tile();
        let ot = variant.output_tile();
        let coords = variant.coordinates();

        // Deterministic non-trivial inputs.
        let d: Vec<f32> = (0..it * it).map(|i| (i as f32 * 0.37).sin()).collect();
        let g: Vec<f32> = (0..9).map(|i| (i as f32 * 0.91).cos()).collect();

        let mut v = vec![0.0f32; coords];
        let mut u = vec![0.0f32; coords];
        variant.transform_input_tile(&d, &mut v);
        variant.transform_filter_tile(&g, &mut u);

        let m: Vec<f32> = u.iter().zip(v.iter()).map(|(a, b)| a * b).collect();
        let mut y = vec![0.0f32; ot * ot];
        variant.inverse_transform_tile(&m, &mut y);

        let expected = direct_conv_tile(&d, &g, it, ot);
        for (got, want) in y.iter().zip(expected.iter()) {
            assert!(
                (got - want).abs() < 1e-4,
                "variant {variant:?}: got {got}, want {want}"
            );
        }
    }

    #[test]
    fn test_f2_matches_direct_convolution() {
        check_identity(WinogradVariant::OutputTile2);
    }

    #[test]
    fn test_f4_matches_direct_convolution() {
        check_identity(WinogradVariant::OutputTile4);
    }

    #[test]
    fn test_tile_geometry() {
        assert_eq!(WinogradVariant::OutputTile2.input_tile(), 4);
        assert_eq!(WinogradVariant::OutputTile2.coordinates(), 16);
        assert_eq!(WinogradVariant::OutputTile4.input_tile(), 6);
        assert_eq!(WinogradVariant::OutputTile4.coordinates(), 36);
    }

    #[test]
    fn test_default_variant() {
        assert_eq!(WinogradVariant::default(), WinogradVariant::OutputTile4);
    }
}
