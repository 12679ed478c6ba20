//! Block-mode percentile scores used to prune the search space.
//!
//! Each legal block mode gets a centile in [0, 1]; lower means more
//! generally useful. The block size descriptor keeps a mode for searching
//! when its centile is at or below the configured cutoff, and modes with a
//! centile of exactly zero form the "always enabled" tier that even the
//! fastest presets search.
//!
//! The scores here are a deterministic model derived from weight storage
//! cost: cheap single-plane grids encode the most blocks in practice and
//! sort first, dense or dual-plane grids sort last. 3D block sizes score
//! every mode as always-useful, as there is no usage data to rank them by.

use crate::quant::{ise_sequence_bitcount, Quant};
use crate::{BLOCK_MAX_WEIGHT_BITS, BLOCK_MIN_WEIGHT_BITS};

/// Centile at or below which a mode is an "always" mode.
pub const PERCENTILE_ALWAYS: f32 = 0.0;

/// The percentile score for a 2D block mode.
pub fn mode_percentile_2d(x_weights: u32, y_weights: u32, quant: Quant, is_dual_plane: bool) -> f32 {
    let weight_count = x_weights * y_weights * if is_dual_plane { 2 } else { 1 };
    let weight_bits = ise_sequence_bitcount(weight_count, quant);

    // The cheapest single-plane grids are the always tier
    if !is_dual_plane && weight_bits <= 32 {
        return 0.0;
    }

    let span = (BLOCK_MAX_WEIGHT_BITS - BLOCK_MIN_WEIGHT_BITS) as f32;
    let base = (weight_bits.saturating_sub(BLOCK_MIN_WEIGHT_BITS as u32)) as f32 / span;
    let dual_penalty = if is_dual_plane { 0.25 } else { 0.0 };
    (base + dual_penalty).min(1.0)
}

/// The percentile score for a 3D block mode.
pub fn mode_percentile_3d(
    _x_weights: u32,
    _y_weights: u32,
    _z_weights: u32,
    _quant: Quant,
    _is_dual_plane: bool,
) -> f32 {
    0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_ordering() {
        // Sparser grids never score above denser ones at the same quant
        let sparse = mode_percentile_2d(4, 4, Quant::Q4, false);
        let dense = mode_percentile_2d(8, 8, Quant::Q4, false);
        assert!(sparse <= dense);

        // Dual plane costs more than single plane
        let single = mode_percentile_2d(4, 4, Quant::Q8, false);
        let dual = mode_percentile_2d(4, 4, Quant::Q8, true);
        assert!(single <= dual);

        // The always tier exists
        assert_eq!(mode_percentile_2d(4, 4, Quant::Q2, false), PERCENTILE_ALWAYS);
    }

    #[test]
    fn test_percentile_range() {
        for xw in 2..=12u32 {
            for yw in 2..=12u32 {
                for q in 0..12 {
                    let quant = Quant::from_index(q).unwrap();
                    for dual in [false, true] {
                        let p = mode_percentile_2d(xw, yw, quant, dual);
                        assert!((0.0..=1.0).contains(&p));
                    }
                }
            }
        }
    }
}
