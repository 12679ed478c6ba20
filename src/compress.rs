//! Block compression driver.
//!
//! For one block this orchestrates the whole search: ideal weights per
//! decimation, angular weight ranges, partition selection, the joint
//! format and block mode chooser, then full realization of the top
//! candidates with weight realignment and endpoint refitting. Each
//! realized candidate is re-decoded and scored against the original, and
//! the best one is packed to 128 bits.

use half::f16;

use crate::angular::{compute_angular_endpoints_1plane, compute_angular_endpoints_2planes};
use crate::block_size::BlockSizeDescriptor;
use crate::color::pack_color_endpoints;
use crate::decompress::decompress_symbolic_block;
use crate::format_select::compute_ideal_endpoint_formats;
use crate::ideal::{
    compute_error_of_weight_set_1plane, compute_error_of_weight_set_2planes,
    compute_ideal_colors_and_weights_1plane, compute_ideal_colors_and_weights_2planes,
    compute_ideal_weights_for_decimation, compute_quantized_weights_for_decimation,
    recompute_ideal_colors_1plane, recompute_ideal_colors_2planes, EndpointsAndWeights,
};
use crate::image::{ErrorWeightBlock, ImageBlock};
use crate::partition::{find_best_partition_candidates, PartitionInfo};
use crate::quant::{ise_sequence_bitcount, QUANT_AND_XFER_TABLES};
use crate::symbolic::{symbolic_to_physical, BlockType, PhysicalBlock, SymbolicBlock};
use crate::vecmath::Vec4;
use crate::{
    Config, Profile, BLOCK_MAX_PARTITIONS, BLOCK_MAX_WEIGHTS, ERROR_CALC_DEFAULT,
    WEIGHTS_MAX_BLOCK_MODES, WEIGHTS_MAX_DECIMATION_MODES, WEIGHTS_PLANE2_OFFSET,
};

/// Preallocated per-thread scratch for the compressor. Nothing on the
/// per-block path allocates.
pub struct CompressionWorkingBuffers {
    pub ei1: EndpointsAndWeights,
    pub ei2: EndpointsAndWeights,
    pub ewb: Box<ErrorWeightBlock>,
    /// Ideal decimated weights, one 64-wide slot per decimation mode;
    /// plane 2 values start at `WEIGHTS_PLANE2_OFFSET` within a slot.
    pub dec_weights_ideal_value: Vec<f32>,
    pub dec_weights_ideal_sig: Vec<f32>,
    /// Quantized weights, one 64-wide slot per block mode.
    pub dec_weights_quant_uvalue: Vec<f32>,
    pub dec_weights_quant_pvalue: Vec<u8>,

    /// Per block mode angular weight ranges for both planes.
    pub angular_low1: Vec<f32>,
    pub angular_high1: Vec<f32>,
    pub angular_low2: Vec<f32>,
    pub angular_high2: Vec<f32>,
    /// Per block mode weight storage cost (-1 infeasible) and error.
    pub qwt_bitcounts: Vec<i32>,
    pub qwt_errors: Vec<f32>,
}

impl Default for CompressionWorkingBuffers {
    fn default() -> Self {
        Self::new()
    }
}

impl CompressionWorkingBuffers {
    pub fn new() -> Self {
        Self {
            ei1: EndpointsAndWeights::default(),
            ei2: EndpointsAndWeights::default(),
            ewb: Box::default(),
            dec_weights_ideal_value: vec![0.0; WEIGHTS_MAX_DECIMATION_MODES * BLOCK_MAX_WEIGHTS],
            dec_weights_ideal_sig: vec![0.0; WEIGHTS_MAX_DECIMATION_MODES * BLOCK_MAX_WEIGHTS],
            dec_weights_quant_uvalue: vec![0.0; WEIGHTS_MAX_BLOCK_MODES * BLOCK_MAX_WEIGHTS],
            dec_weights_quant_pvalue: vec![0u8; WEIGHTS_MAX_BLOCK_MODES * BLOCK_MAX_WEIGHTS],
            angular_low1: vec![0.0; WEIGHTS_MAX_BLOCK_MODES],
            angular_high1: vec![1.0; WEIGHTS_MAX_BLOCK_MODES],
            angular_low2: vec![0.0; WEIGHTS_MAX_BLOCK_MODES],
            angular_high2: vec![1.0; WEIGHTS_MAX_BLOCK_MODES],
            qwt_bitcounts: vec![-1; WEIGHTS_MAX_BLOCK_MODES],
            qwt_errors: vec![ERROR_CALC_DEFAULT; WEIGHTS_MAX_BLOCK_MODES],
        }
    }
}

/// Compute the error between a symbolic encoding and the original block.
///
/// Re-decodes the block and accumulates the weighted squared difference.
/// In RGBM mode, encodings that quantize any M value to zero are rejected
/// with a negative return, as they would divide by zero on decode.
pub fn compute_symbolic_block_difference(
    config: &Config,
    bsd: &BlockSizeDescriptor,
    scb: &SymbolicBlock,
    blk: &ImageBlock,
    ewb: &ErrorWeightBlock,
) -> f32 {
    let dec = decompress_symbolic_block(config.profile, bsd, blk.xpos, blk.ypos, blk.zpos, scb);

    if config.rgbm_m_scale > 0.0 {
        for t in 0..blk.texel_count {
            if dec.data_a[t] == 0.0 {
                return -ERROR_CALC_DEFAULT;
            }
        }
    }

    let mut error = 0.0f32;
    for t in 0..blk.texel_count {
        let diff = dec.texel(t) - blk.texel(t);
        let err = (ewb.error_weights[t] * diff * diff).hsum();
        // NaN from HDR decode never compares better than the sentinel
        if err.is_finite() {
            error += err.min(1e30);
        } else {
            error += 1e30;
        }
    }
    error
}

// Step individual weights to a neighboring codepoint when that lowers the
// infilled error; this is where the quantization transfer table's
// prev/next records earn their keep.
fn realign_weights_plane(
    eai: &EndpointsAndWeights,
    di: &crate::block_size::DecimationInfo,
    quant_index: usize,
    low_bound: f32,
    high_bound: f32,
    pvalues: &mut [u8],
) -> bool {
    let qat = &QUANT_AND_XFER_TABLES[quant_index];
    let texel_count = di.texel_count;

    // Stored weights live in the range-compacted domain; compare against
    // the ideal weights mapped into it
    let (low, high) = if high_bound > low_bound {
        (low_bound, high_bound)
    } else {
        (0.0, 1.0)
    };
    let scale = 1.0 / (high - low);
    let target = |t: usize| ((eai.weights[t] - low) * scale).clamp(0.0, 1.0);

    let mut values = [0.0f32; BLOCK_MAX_WEIGHTS];
    for w in 0..di.weight_count {
        values[w] = qat.unquantized_value[pvalues[w] as usize] as f32 * (1.0 / 64.0);
    }
    let mut infilled = [0.0f32; crate::BLOCK_MAX_TEXELS];
    for t in 0..texel_count {
        infilled[t] = di.bilinear_infill(&values, t);
    }

    let mut improved = false;
    for w in 0..di.weight_count {
        let uq = qat.unquantized_value[pvalues[w] as usize] as u32;
        let rec = qat.prev_next_values[uq as usize];
        let prev_val = rec & 0xFF;
        let next_val = (rec >> 8) & 0xFF;
        let prev_ch = ((rec >> 16) & 0xFF) as u8;
        let next_ch = (rec >> 24) as u8;

        let mut best_gain = 0.0f32;
        let mut best = None;
        for (cand_val, cand_ch) in [(prev_val, prev_ch), (next_val, next_ch)] {
            if cand_val == uq {
                continue;
            }
            let step = (cand_val as f32 - uq as f32) * (1.0 / 64.0);
            let mut gain = 0.0f32;
            for i in di.weight_span(w) {
                let t = di.weight_texels[i] as usize;
                let contrib = di.weight_texel_contrib[i];
                let old_diff = infilled[t] - target(t);
                let new_diff = old_diff + step * contrib;
                gain += eai.weight_error_scale[t] * (old_diff * old_diff - new_diff * new_diff);
            }
            if gain > best_gain {
                best_gain = gain;
                best = Some((cand_val, cand_ch, step));
            }
        }

        if let Some((cand_val, cand_ch, step)) = best {
            pvalues[w] = cand_ch;
            values[w] = cand_val as f32 * (1.0 / 64.0);
            for i in di.weight_span(w) {
                let t = di.weight_texels[i] as usize;
                infilled[t] += step * di.weight_texel_contrib[i];
            }
            improved = true;
        }
    }
    improved
}

// Channel most independent from the other three, for plane 2 assignment.
fn select_plane2_component(blk: &ImageBlock, config: &Config) -> Option<usize> {
    // Grey plus varying alpha always wants alpha on its own plane
    if blk.is_luminancealpha() && !blk.is_constant_channel(3) {
        return Some(3);
    }

    let texel_count = blk.texel_count as f32;

    let mut best: Option<(f32, usize)> = None;
    for c in 0..4usize {
        if blk.is_constant_channel(c) {
            continue;
        }

        // Correlation of this channel against the mean of the others
        let mut sum_c = 0.0f32;
        let mut sum_o = 0.0f32;
        for t in 0..blk.texel_count {
            let v = blk.texel(t);
            sum_c += v.lane(c);
            sum_o += (v.hsum() - v.lane(c)) * (1.0 / 3.0);
        }
        let mean_c = sum_c / texel_count;
        let mean_o = sum_o / texel_count;

        let mut cov = 0.0f32;
        let mut var_c = 0.0f32;
        let mut var_o = 0.0f32;
        for t in 0..blk.texel_count {
            let v = blk.texel(t);
            let dc = v.lane(c) - mean_c;
            let do_ = (v.hsum() - v.lane(c)) * (1.0 / 3.0) - mean_o;
            cov += dc * do_;
            var_c += dc * dc;
            var_o += do_ * do_;
        }
        if var_c < 1e-6 || var_o < 1e-6 {
            continue;
        }
        let corr = (cov / (var_c.sqrt() * var_o.sqrt())).abs();
        match best {
            Some((b, _)) if corr >= b => {}
            _ => best = Some((corr, c)),
        }
    }

    match best {
        Some((corr, c)) if corr <= config.p2_correlation_cutoff => Some(c),
        _ => None,
    }
}

struct BestCandidate {
    scb: SymbolicBlock,
    error: f32,
}

#[allow(clippy::too_many_arguments)]
fn trial_1plane(
    config: &Config,
    bsd: &BlockSizeDescriptor,
    blk: &ImageBlock,
    pi: &PartitionInfo,
    encode_hdr_rgb: bool,
    encode_hdr_alpha: bool,
    tmpbuf: &mut CompressionWorkingBuffers,
    best: &mut BestCandidate,
) {
    let partition_count = pi.partition_count.max(1) as usize;
    let n_modes = bsd.block_modes.len();

    let CompressionWorkingBuffers {
        ref mut ei1,
        ref ewb,
        ref mut dec_weights_ideal_value,
        ref mut dec_weights_ideal_sig,
        ref mut dec_weights_quant_uvalue,
        ref mut dec_weights_quant_pvalue,
        ref mut angular_low1,
        ref mut angular_high1,
        ref mut qwt_bitcounts,
        ref mut qwt_errors,
        ..
    } = *tmpbuf;
    let ewb: &ErrorWeightBlock = ewb;

    angular_low1[..n_modes].fill(0.0);
    angular_high1[..n_modes].fill(1.0);
    qwt_bitcounts[..n_modes].fill(-1);
    qwt_errors[..n_modes].fill(ERROR_CALC_DEFAULT);

    compute_ideal_colors_and_weights_1plane(blk, ewb, pi, ei1);

    for d in 0..bsd.decimation_modes.len() {
        let dm = &bsd.decimation_modes[d];
        if dm.maxprec_1plane < 0 || !dm.percentile_hit {
            continue;
        }
        let di = bsd.get_decimation_info(d);
        let base = d * BLOCK_MAX_WEIGHTS;
        compute_ideal_weights_for_decimation(
            ei1,
            di,
            &mut dec_weights_ideal_value[base..base + BLOCK_MAX_WEIGHTS],
            &mut dec_weights_ideal_sig[base..base + BLOCK_MAX_WEIGHTS],
        );
    }

    compute_angular_endpoints_1plane(
        false,
        bsd,
        config.low_weight_count_limit,
        dec_weights_ideal_value,
        dec_weights_ideal_sig,
        angular_low1,
        angular_high1,
    );

    for (i, bm) in bsd.block_modes.iter().enumerate() {
        if bm.is_dual_plane || !bm.percentile_hit {
            continue;
        }
        let d = bm.decimation_mode as usize;
        let dm = &bsd.decimation_modes[d];
        if dm.maxprec_1plane < bm.quant_mode.index() as i8 {
            continue;
        }
        let di = bsd.get_decimation_info(d);
        let dec_base = d * BLOCK_MAX_WEIGHTS;
        let mode_base = i * BLOCK_MAX_WEIGHTS;

        compute_quantized_weights_for_decimation(
            di,
            angular_low1[i],
            angular_high1[i],
            &dec_weights_ideal_value[dec_base..dec_base + BLOCK_MAX_WEIGHTS],
            &mut dec_weights_quant_uvalue[mode_base..mode_base + BLOCK_MAX_WEIGHTS],
            &mut dec_weights_quant_pvalue[mode_base..mode_base + BLOCK_MAX_WEIGHTS],
            bm.quant_mode.index(),
        );

        qwt_bitcounts[i] = ise_sequence_bitcount(di.weight_count as u32, bm.quant_mode) as i32;
        qwt_errors[i] = compute_error_of_weight_set_1plane(
            ei1,
            di,
            &dec_weights_quant_uvalue[mode_base..mode_base + BLOCK_MAX_WEIGHTS],
        );
    }

    let candidates = compute_ideal_endpoint_formats(
        bsd,
        pi,
        blk,
        ewb,
        &ei1.ep,
        qwt_bitcounts,
        qwt_errors,
        config.candidate_limit,
        encode_hdr_rgb,
        encode_hdr_alpha,
    );

    for cand in &candidates {
        let bm = &bsd.block_modes[cand.block_mode];
        let di = bsd.get_decimation_info(bm.decimation_mode as usize);
        let mode_base = cand.block_mode * BLOCK_MAX_WEIGHTS;

        let mut pvalues = [0u8; BLOCK_MAX_WEIGHTS];
        pvalues[..di.weight_count].copy_from_slice(
            &dec_weights_quant_pvalue[mode_base..mode_base + di.weight_count],
        );

        let mut ep = ei1.ep;
        let mut rgbs = [Vec4::zero(); BLOCK_MAX_PARTITIONS];
        let mut rgbo = [Vec4::zero(); BLOCK_MAX_PARTITIONS];

        for _ in 0..config.refinement_limit.max(1) {
            recompute_ideal_colors_1plane(
                blk,
                ewb,
                pi,
                di,
                bm.quant_mode.index(),
                &pvalues,
                &mut ep,
                &mut rgbs,
                &mut rgbo,
            );
            if !realign_weights_plane(
                ei1,
                di,
                bm.quant_mode.index(),
                angular_low1[cand.block_mode],
                angular_high1[cand.block_mode],
                &mut pvalues,
            ) {
                break;
            }
        }

        let mut scb = SymbolicBlock::new_error();
        scb.block_type = BlockType::NonConst;
        scb.block_mode = bm.mode_index;
        scb.partition_count = partition_count as u8;
        scb.partition_index = pi.partition_index;
        scb.plane2_component = -1;
        scb.weights[..di.weight_count].copy_from_slice(&pvalues[..di.weight_count]);

        // The color quant is implicit in the encoding: a decoder infers
        // it from the CEM layout and the leftover bits. Pack fallbacks can
        // flip whether the partition formats match (they never change the
        // integer count), so iterate until the level we packed with is
        // the one the layout implies.
        let weight_bits = qwt_bitcounts[cand.block_mode];
        let total_pairs: usize = cand.partition_formats[..partition_count]
            .iter()
            .map(|f| f.integer_count() / 2)
            .sum();
        let requested_matched = cand.partition_formats[..partition_count]
            .windows(2)
            .all(|w| w[0] == w[1]);
        let mut quant = if requested_matched {
            cand.quant_level_mod
        } else {
            cand.quant_level
        };

        let mut consistent = false;
        for _ in 0..4 {
            for p in 0..partition_count {
                scb.color_formats[p] = pack_color_endpoints(
                    ep.endpt0[p],
                    ep.endpt1[p],
                    rgbs[p],
                    rgbo[p],
                    cand.partition_formats[p],
                    &mut scb.color_values[p],
                    quant,
                );
            }
            let matched = scb.color_formats[..partition_count]
                .windows(2)
                .all(|w| w[0] == w[1]);
            let avail = crate::format_select::color_bits_available(
                partition_count,
                false,
                matched,
                weight_bits,
            );
            match crate::format_select::quant_for(total_pairs, avail) {
                Some(implied) if implied == quant => {
                    scb.color_formats_matched = matched;
                    consistent = true;
                    break;
                }
                Some(implied) => quant = implied,
                None => break,
            }
        }
        if !consistent {
            continue;
        }
        scb.quant_mode = quant;

        let error = compute_symbolic_block_difference(config, bsd, &scb, blk, ewb);
        if error >= 0.0 && error < best.error {
            scb.errorval = error;
            best.error = error;
            best.scb = scb;
        }
    }
}

fn trial_2planes(
    config: &Config,
    bsd: &BlockSizeDescriptor,
    blk: &ImageBlock,
    plane2_component: usize,
    encode_hdr_rgb: bool,
    encode_hdr_alpha: bool,
    tmpbuf: &mut CompressionWorkingBuffers,
    best: &mut BestCandidate,
) {
    let pi = bsd.get_partition_info(1, 0);
    let n_modes = bsd.block_modes.len();

    let CompressionWorkingBuffers {
        ref mut ei1,
        ref mut ei2,
        ref ewb,
        ref mut dec_weights_ideal_value,
        ref mut dec_weights_ideal_sig,
        ref mut dec_weights_quant_uvalue,
        ref mut dec_weights_quant_pvalue,
        ref mut angular_low1,
        ref mut angular_high1,
        ref mut angular_low2,
        ref mut angular_high2,
        ref mut qwt_bitcounts,
        ref mut qwt_errors,
    } = *tmpbuf;
    let ewb: &ErrorWeightBlock = ewb;

    angular_low1[..n_modes].fill(0.0);
    angular_high1[..n_modes].fill(1.0);
    angular_low2[..n_modes].fill(0.0);
    angular_high2[..n_modes].fill(1.0);
    qwt_bitcounts[..n_modes].fill(-1);
    qwt_errors[..n_modes].fill(ERROR_CALC_DEFAULT);

    compute_ideal_colors_and_weights_2planes(blk, ewb, pi, plane2_component, ei1, ei2);

    for d in 0..bsd.decimation_modes.len() {
        let dm = &bsd.decimation_modes[d];
        if dm.maxprec_2planes < 0 || !dm.percentile_hit {
            continue;
        }
        let di = bsd.get_decimation_info(d);
        let base = d * BLOCK_MAX_WEIGHTS;
        compute_ideal_weights_for_decimation(
            ei1,
            di,
            &mut dec_weights_ideal_value[base..base + WEIGHTS_PLANE2_OFFSET],
            &mut dec_weights_ideal_sig[base..base + WEIGHTS_PLANE2_OFFSET],
        );
        let base2 = base + WEIGHTS_PLANE2_OFFSET;
        compute_ideal_weights_for_decimation(
            ei2,
            di,
            &mut dec_weights_ideal_value[base2..base2 + WEIGHTS_PLANE2_OFFSET],
            &mut dec_weights_ideal_sig[base2..base2 + WEIGHTS_PLANE2_OFFSET],
        );
    }

    compute_angular_endpoints_2planes(
        bsd,
        config.low_weight_count_limit,
        dec_weights_ideal_value,
        dec_weights_ideal_sig,
        angular_low1,
        angular_high1,
        angular_low2,
        angular_high2,
    );

    for (i, bm) in bsd.block_modes.iter().enumerate() {
        if !bm.is_dual_plane || !bm.percentile_hit {
            continue;
        }
        let d = bm.decimation_mode as usize;
        let dm = &bsd.decimation_modes[d];
        if dm.maxprec_2planes < bm.quant_mode.index() as i8 {
            continue;
        }
        let di = bsd.get_decimation_info(d);
        let dec_base = d * BLOCK_MAX_WEIGHTS;
        let mode_base = i * BLOCK_MAX_WEIGHTS;

        compute_quantized_weights_for_decimation(
            di,
            angular_low1[i],
            angular_high1[i],
            &dec_weights_ideal_value[dec_base..dec_base + WEIGHTS_PLANE2_OFFSET],
            &mut dec_weights_quant_uvalue[mode_base..mode_base + WEIGHTS_PLANE2_OFFSET],
            &mut dec_weights_quant_pvalue[mode_base..mode_base + WEIGHTS_PLANE2_OFFSET],
            bm.quant_mode.index(),
        );

        let mode_base2 = mode_base + WEIGHTS_PLANE2_OFFSET;
        let dec_base2 = dec_base + WEIGHTS_PLANE2_OFFSET;
        compute_quantized_weights_for_decimation(
            di,
            angular_low2[i],
            angular_high2[i],
            &dec_weights_ideal_value[dec_base2..dec_base2 + WEIGHTS_PLANE2_OFFSET],
            &mut dec_weights_quant_uvalue[mode_base2..mode_base2 + WEIGHTS_PLANE2_OFFSET],
            &mut dec_weights_quant_pvalue[mode_base2..mode_base2 + WEIGHTS_PLANE2_OFFSET],
            bm.quant_mode.index(),
        );

        qwt_bitcounts[i] =
            ise_sequence_bitcount(2 * di.weight_count as u32, bm.quant_mode) as i32;
        qwt_errors[i] = compute_error_of_weight_set_2planes(
            ei1,
            ei2,
            di,
            &dec_weights_quant_uvalue[mode_base..mode_base + WEIGHTS_PLANE2_OFFSET],
            &dec_weights_quant_uvalue
                [mode_base + WEIGHTS_PLANE2_OFFSET..mode_base + BLOCK_MAX_WEIGHTS],
        );
    }

    let candidates = compute_ideal_endpoint_formats(
        bsd,
        pi,
        blk,
        ewb,
        &ei1.ep,
        qwt_bitcounts,
        qwt_errors,
        config.candidate_limit,
        encode_hdr_rgb,
        encode_hdr_alpha,
    );

    for cand in &candidates {
        let bm = &bsd.block_modes[cand.block_mode];
        let di = bsd.get_decimation_info(bm.decimation_mode as usize);
        let mode_base = cand.block_mode * BLOCK_MAX_WEIGHTS;

        let mut pvalues1 = [0u8; BLOCK_MAX_WEIGHTS];
        let mut pvalues2 = [0u8; BLOCK_MAX_WEIGHTS];
        pvalues1[..di.weight_count].copy_from_slice(
            &dec_weights_quant_pvalue[mode_base..mode_base + di.weight_count],
        );
        pvalues2[..di.weight_count].copy_from_slice(
            &dec_weights_quant_pvalue[mode_base + WEIGHTS_PLANE2_OFFSET
                ..mode_base + WEIGHTS_PLANE2_OFFSET + di.weight_count],
        );

        let mut ep = ei1.ep;
        let mut rgbs = Vec4::zero();
        let mut rgbo = Vec4::zero();

        for _ in 0..config.refinement_limit.max(1) {
            recompute_ideal_colors_2planes(
                blk,
                ewb,
                di,
                bm.quant_mode.index(),
                &pvalues1,
                &pvalues2,
                &mut ep,
                &mut rgbs,
                &mut rgbo,
                plane2_component,
            );
            let r1 = realign_weights_plane(
                ei1,
                di,
                bm.quant_mode.index(),
                angular_low1[cand.block_mode],
                angular_high1[cand.block_mode],
                &mut pvalues1,
            );
            let r2 = realign_weights_plane(
                ei2,
                di,
                bm.quant_mode.index(),
                angular_low2[cand.block_mode],
                angular_high2[cand.block_mode],
                &mut pvalues2,
            );
            if !r1 && !r2 {
                break;
            }
        }

        let mut scb = SymbolicBlock::new_error();
        scb.block_type = BlockType::NonConst;
        scb.block_mode = bm.mode_index;
        scb.partition_count = 1;
        scb.partition_index = 0;
        scb.plane2_component = plane2_component as i8;
        scb.weights[..di.weight_count].copy_from_slice(&pvalues1[..di.weight_count]);
        scb.weights[WEIGHTS_PLANE2_OFFSET..WEIGHTS_PLANE2_OFFSET + di.weight_count]
            .copy_from_slice(&pvalues2[..di.weight_count]);

        let quant = cand.quant_level;
        scb.color_formats[0] = pack_color_endpoints(
            ep.endpt0[0],
            ep.endpt1[0],
            rgbs,
            rgbo,
            cand.partition_formats[0],
            &mut scb.color_values[0],
            quant,
        );
        scb.color_formats_matched = true;
        scb.quant_mode = quant;

        // Single partition layouts imply their quant level directly; a
        // class-changing pack would desynchronize encoder and decoder
        let weight_bits = qwt_bitcounts[cand.block_mode];
        let pairs = scb.color_formats[0].integer_count() / 2;
        let avail = crate::format_select::color_bits_available(1, true, true, weight_bits);
        match crate::format_select::quant_for(pairs, avail) {
            Some(implied) if implied == quant => {}
            _ => continue,
        }

        let error = compute_symbolic_block_difference(config, bsd, &scb, blk, ewb);
        if error >= 0.0 && error < best.error {
            scb.errorval = error;
            best.error = error;
            best.scb = scb;
        }
    }
}

fn constant_block_for(profile: Profile, color: Vec4) -> SymbolicBlock {
    if matches!(profile, Profile::HdrRgbLdrA | Profile::Hdr) {
        let bits = |v: f32| f16::from_f32(v.max(0.0)).to_bits() as i32;
        SymbolicBlock::new_constant(
            [
                bits(color.lane(0)),
                bits(color.lane(1)),
                bits(color.lane(2)),
                bits(color.lane(3)),
            ],
            true,
        )
    } else {
        let unorm = |v: f32| ((v.clamp(0.0, 1.0) * 65535.0) + 0.5) as i32;
        SymbolicBlock::new_constant(
            [
                unorm(color.lane(0)),
                unorm(color.lane(1)),
                unorm(color.lane(2)),
                unorm(color.lane(3)),
            ],
            false,
        )
    }
}

/// Compress one image block into a physical block, returning the chosen
/// symbolic form alongside the 16 encoded bytes.
pub fn compress_block(
    config: &Config,
    bsd: &BlockSizeDescriptor,
    blk: &ImageBlock,
    tmpbuf: &mut CompressionWorkingBuffers,
) -> (SymbolicBlock, PhysicalBlock) {
    // Constant color blocks encode directly as void extents
    if blk.data_min == blk.data_max {
        let scb = constant_block_for(config.profile, blk.origin_texel);
        let pcb = symbolic_to_physical(bsd, &scb);
        return (scb, pcb);
    }

    tmpbuf.ewb = crate::image::compute_error_weight_block(config, blk);

    let encode_hdr_rgb = matches!(config.profile, Profile::HdrRgbLdrA | Profile::Hdr);
    let encode_hdr_alpha = config.profile == Profile::Hdr;

    // Best-effort fallback: the block mean as a constant color, so the
    // encoder always emits well formed bytes even if every candidate is
    // rejected
    let mean = (blk.data_min + blk.data_max) * 0.5;
    let mean_raw = if encode_hdr_rgb {
        blk.origin_texel
    } else {
        mean / 65535.0
    };
    let mut best = BestCandidate {
        scb: constant_block_for(config.profile, mean_raw),
        error: ERROR_CALC_DEFAULT,
    };

    // 1 partition, 1 plane
    let pi = bsd.get_partition_info(1, 0);
    trial_1plane(
        config,
        bsd,
        blk,
        pi,
        encode_hdr_rgb,
        encode_hdr_alpha,
        tmpbuf,
        &mut best,
    );

    // 1 partition, 2 planes
    if let Some(component) = select_plane2_component(blk, config) {
        trial_2planes(
            config,
            bsd,
            blk,
            component,
            encode_hdr_rgb,
            encode_hdr_alpha,
            tmpbuf,
            &mut best,
        );
    }

    // 2..4 partitions, 1 plane
    for partition_count in 2..=config.partition_count_limit.min(BLOCK_MAX_PARTITIONS) {
        let (uncor_seed, samec_seed) = find_best_partition_candidates(
            bsd,
            blk,
            &tmpbuf.ewb,
            partition_count,
            config.partition_search_limit,
        );

        let mut seeds = [uncor_seed, samec_seed];
        seeds.sort_unstable();
        let mut prev = u32::MAX;
        for &seed in &seeds {
            if seed == prev {
                continue;
            }
            prev = seed;
            let pi = bsd.get_partition_info(partition_count, seed as usize);
            if pi.partition_count == 0 {
                continue;
            }
            trial_1plane(
                config,
                bsd,
                blk,
                pi,
                encode_hdr_rgb,
                encode_hdr_alpha,
                tmpbuf,
                &mut best,
            );
        }
    }

    let pcb = symbolic_to_physical(bsd, &best.scb);
    (best.scb, pcb)
}
