//! Angular endpoint search.
//!
//! Finding the optimal (low, high) weight range for every block mode by
//! full least squares is too expensive, so ideal weights are instead
//! projected onto a family of evenly spaced "angular steppings". For a
//! stepping with n intervals the best phase offset comes from the circular
//! mean of the samples; the stepping with the smallest residual that still
//! fits the quant level's codepoint count gives the weight range. The
//! trig tables are content independent and built once per process.

use std::sync::OnceLock;

use crate::block_size::BlockSizeDescriptor;
use crate::quant::WEIGHT_QUANT_COUNT;
use crate::{BLOCK_MAX_WEIGHTS, WEIGHTS_MAX_DECIMATION_MODES, WEIGHTS_PLANE2_OFFSET};

/// Largest stepping interval count; enough for the 32 level weight quant.
const MAX_ANGULAR_STEPS: usize = 32;
/// Sample positions are quantized to this many phase buckets.
const SINCOS_STEPS: usize = 64;

struct AngularTables {
    sin_table: Vec<[f32; MAX_ANGULAR_STEPS]>,
    cos_table: Vec<[f32; MAX_ANGULAR_STEPS]>,
}

fn angular_tables() -> &'static AngularTables {
    static TABLES: OnceLock<AngularTables> = OnceLock::new();
    TABLES.get_or_init(|| {
        let mut sin_table = vec![[0.0f32; MAX_ANGULAR_STEPS]; SINCOS_STEPS];
        let mut cos_table = vec![[0.0f32; MAX_ANGULAR_STEPS]; SINCOS_STEPS];
        for j in 0..SINCOS_STEPS {
            for n in 0..MAX_ANGULAR_STEPS {
                let angle =
                    2.0 * std::f32::consts::PI * (j as f32 / SINCOS_STEPS as f32) * (n + 1) as f32;
                sin_table[j][n] = angle.sin();
                cos_table[j][n] = angle.cos();
            }
        }
        AngularTables {
            sin_table,
            cos_table,
        }
    })
}

/// The best phase offset for each stepping, from the circular mean of the
/// weighted samples.
fn compute_angular_offsets(
    samples: &[f32],
    sample_weights: &[f32],
    max_angular_steps: usize,
    offsets: &mut [f32; MAX_ANGULAR_STEPS],
) {
    let tables = angular_tables();

    let mut anglesum_x = [0.0f32; MAX_ANGULAR_STEPS];
    let mut anglesum_y = [0.0f32; MAX_ANGULAR_STEPS];

    for (&s, &sw) in samples.iter().zip(sample_weights.iter()) {
        let bucket = ((s * (SINCOS_STEPS as f32 - 1.0) + 0.5) as usize).min(SINCOS_STEPS - 1);
        for n in 0..max_angular_steps {
            anglesum_x[n] += tables.cos_table[bucket][n] * sw;
            anglesum_y[n] += tables.sin_table[bucket][n] * sw;
        }
    }

    for n in 0..max_angular_steps {
        let angle = anglesum_y[n].atan2(anglesum_x[n]);
        offsets[n] = angle * (1.0 / (2.0 * std::f32::consts::PI)) / (n + 1) as f32;
    }
}

#[derive(Clone, Copy, Default)]
struct SteppingFit {
    lowest_index: i32,
    span: i32,
    error: f32,
}

/// For each stepping, snap every sample to its nearest stop and accumulate
/// the weighted residual and the index span used.
fn lowest_and_highest_weight(
    samples: &[f32],
    sample_weights: &[f32],
    max_angular_steps: usize,
    offsets: &[f32; MAX_ANGULAR_STEPS],
    fits: &mut [SteppingFit; MAX_ANGULAR_STEPS],
) {
    for n in 0..max_angular_steps {
        let stepping = (n + 1) as f32;
        let rcp = 1.0 / stepping;
        let offset = offsets[n];

        let mut min_ix = i32::MAX;
        let mut max_ix = i32::MIN;
        let mut error = 0.0f32;

        for (&s, &sw) in samples.iter().zip(sample_weights.iter()) {
            let pos = (s - offset) * stepping;
            let ix = (pos + 0.5).floor() as i32;
            min_ix = min_ix.min(ix);
            max_ix = max_ix.max(ix);
            let diff = (pos - ix as f32) * rcp;
            error += sw * diff * diff;
        }

        fits[n] = SteppingFit {
            lowest_index: min_ix,
            span: max_ix - min_ix + 1,
            error,
        };
    }
}

/// Compute the (low, high) weight values per weight quant level for one
/// decimated sample set.
fn compute_angular_endpoints_for_quant_levels(
    samples: &[f32],
    sample_weights: &[f32],
    max_quant_index: usize,
    low_value: &mut [f32; WEIGHT_QUANT_COUNT],
    high_value: &mut [f32; WEIGHT_QUANT_COUNT],
) {
    let max_steps = MAX_ANGULAR_STEPS;

    let mut offsets = [0.0f32; MAX_ANGULAR_STEPS];
    compute_angular_offsets(samples, sample_weights, max_steps, &mut offsets);

    let mut fits = [SteppingFit::default(); MAX_ANGULAR_STEPS];
    lowest_and_highest_weight(samples, sample_weights, max_steps, &offsets, &mut fits);

    for q in 0..=max_quant_index.min(WEIGHT_QUANT_COUNT - 1) {
        let steps = crate::quant::Quant::from_index(q).unwrap().levels() as i32;

        let mut best: Option<(f32, usize)> = None;
        for (n, fit) in fits[..max_steps].iter().enumerate() {
            if fit.span > steps {
                continue;
            }
            match best {
                Some((err, _)) if fit.error >= err => {}
                _ => best = Some((fit.error, n)),
            }
        }

        match best {
            Some((_, n)) => {
                let stepping = (n + 1) as f32;
                let fit = &fits[n];
                low_value[q] = fit.lowest_index as f32 / stepping + offsets[n];
                high_value[q] =
                    (fit.lowest_index + fit.span - 1) as f32 / stepping + offsets[n];
                if high_value[q] <= low_value[q] {
                    low_value[q] = 0.0;
                    high_value[q] = 1.0;
                }
            }
            None => {
                low_value[q] = 0.0;
                high_value[q] = 1.0;
            }
        }
    }
}

/// Per-block-mode (low, high) weight ranges for 1 plane encodings.
///
/// Input weights are the decimated ideal values and significances, stored
/// per decimation mode at `BLOCK_MAX_WEIGHTS` stride. Output is indexed by
/// packed block mode.
pub fn compute_angular_endpoints_1plane(
    only_always: bool,
    bsd: &BlockSizeDescriptor,
    low_weight_count_limit: usize,
    dec_weight_ideal_value: &[f32],
    dec_weight_ideal_sig: &[f32],
    low_value: &mut [f32],
    high_value: &mut [f32],
) {
    let mut low_values = [[0.0f32; WEIGHT_QUANT_COUNT]; WEIGHTS_MAX_DECIMATION_MODES];
    let mut high_values = [[1.0f32; WEIGHT_QUANT_COUNT]; WEIGHTS_MAX_DECIMATION_MODES];

    let dm_limit = if only_always {
        bsd.always_decimation_mode_count
    } else {
        bsd.decimation_modes.len()
    };

    for d in 0..dm_limit {
        let dm = &bsd.decimation_modes[d];
        if dm.maxprec_1plane < 0 || !dm.percentile_hit {
            continue;
        }
        let di = bsd.get_decimation_info(d);
        let weight_count = di.weight_count;

        // Tiny grids don't benefit from range compaction
        if weight_count < low_weight_count_limit {
            continue;
        }

        let base = d * BLOCK_MAX_WEIGHTS;
        compute_angular_endpoints_for_quant_levels(
            &dec_weight_ideal_value[base..base + weight_count],
            &dec_weight_ideal_sig[base..base + weight_count],
            dm.maxprec_1plane as usize,
            &mut low_values[d],
            &mut high_values[d],
        );
    }

    let bm_limit = if only_always {
        bsd.always_block_mode_count
    } else {
        bsd.block_modes.len()
    };
    for (i, bm) in bsd.block_modes[..bm_limit].iter().enumerate() {
        if bm.is_dual_plane {
            continue;
        }
        let q = bm.quant_mode.index();
        let d = bm.decimation_mode as usize;
        low_value[i] = low_values[d][q];
        high_value[i] = high_values[d][q];
    }
}

/// Per-block-mode (low, high) weight ranges for both planes of 2 plane
/// encodings. Plane 2 samples start at `WEIGHTS_PLANE2_OFFSET`.
#[allow(clippy::too_many_arguments)]
pub fn compute_angular_endpoints_2planes(
    bsd: &BlockSizeDescriptor,
    low_weight_count_limit: usize,
    dec_weight_ideal_value: &[f32],
    dec_weight_ideal_sig: &[f32],
    low_value1: &mut [f32],
    high_value1: &mut [f32],
    low_value2: &mut [f32],
    high_value2: &mut [f32],
) {
    let mut low_values1 = [[0.0f32; WEIGHT_QUANT_COUNT]; WEIGHTS_MAX_DECIMATION_MODES];
    let mut high_values1 = [[1.0f32; WEIGHT_QUANT_COUNT]; WEIGHTS_MAX_DECIMATION_MODES];
    let mut low_values2 = [[0.0f32; WEIGHT_QUANT_COUNT]; WEIGHTS_MAX_DECIMATION_MODES];
    let mut high_values2 = [[1.0f32; WEIGHT_QUANT_COUNT]; WEIGHTS_MAX_DECIMATION_MODES];

    for d in 0..bsd.decimation_modes.len() {
        let dm = &bsd.decimation_modes[d];
        if dm.maxprec_2planes < 0 || !dm.percentile_hit {
            continue;
        }
        let di = bsd.get_decimation_info(d);
        let weight_count = di.weight_count;
        if weight_count < low_weight_count_limit {
            continue;
        }

        let base = d * BLOCK_MAX_WEIGHTS;
        compute_angular_endpoints_for_quant_levels(
            &dec_weight_ideal_value[base..base + weight_count],
            &dec_weight_ideal_sig[base..base + weight_count],
            dm.maxprec_2planes as usize,
            &mut low_values1[d],
            &mut high_values1[d],
        );
        let base2 = base + WEIGHTS_PLANE2_OFFSET;
        compute_angular_endpoints_for_quant_levels(
            &dec_weight_ideal_value[base2..base2 + weight_count],
            &dec_weight_ideal_sig[base2..base2 + weight_count],
            dm.maxprec_2planes as usize,
            &mut low_values2[d],
            &mut high_values2[d],
        );
    }

    for (i, bm) in bsd.block_modes.iter().enumerate() {
        if !bm.is_dual_plane {
            continue;
        }
        let q = bm.quant_mode.index();
        let d = bm.decimation_mode as usize;
        low_value1[i] = low_values1[d][q];
        high_value1[i] = high_values1[d][q];
        low_value2[i] = low_values2[d][q];
        high_value2[i] = high_values2[d][q];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_small_for_aligned_samples() {
        // Samples sitting on a 4-interval grid need almost no offset;
        // the residual comes from the 1/64 sample bucketing
        let samples = [0.0, 0.25, 0.5, 0.75, 1.0];
        let weights = [1.0; 5];
        let mut offsets = [0.0f32; MAX_ANGULAR_STEPS];
        compute_angular_offsets(&samples, &weights, 8, &mut offsets);
        assert!(offsets[3].abs() < 0.02, "offset {}", offsets[3]);
    }

    #[test]
    fn test_fit_spans() {
        let samples = [0.0, 0.25, 0.5, 0.75, 1.0];
        let weights = [1.0; 5];
        let mut offsets = [0.0f32; MAX_ANGULAR_STEPS];
        compute_angular_offsets(&samples, &weights, 8, &mut offsets);
        let mut fits = [SteppingFit::default(); MAX_ANGULAR_STEPS];
        lowest_and_highest_weight(&samples, &weights, 8, &offsets, &mut fits);

        // The 4-interval stepping covers the samples with 5 stops and
        // only bucketing noise as residual
        assert_eq!(fits[3].span, 5);
        assert!(fits[3].error < 1e-3, "error {}", fits[3].error);
    }

    #[test]
    fn test_quant_level_ranges_cover_samples() {
        let samples = [0.1, 0.3, 0.5, 0.7, 0.9];
        let weights = [1.0; 5];
        let mut low = [0.0f32; WEIGHT_QUANT_COUNT];
        let mut high = [0.0f32; WEIGHT_QUANT_COUNT];
        compute_angular_endpoints_for_quant_levels(&samples, &weights, 11, &mut low, &mut high);
        for q in 2..WEIGHT_QUANT_COUNT {
            assert!(low[q] <= 0.2, "q {} low {}", q, low[q]);
            assert!(high[q] >= 0.8, "q {} high {}", q, high[q]);
            assert!(low[q] < high[q]);
        }
    }
}
