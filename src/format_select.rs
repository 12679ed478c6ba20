//! Endpoint format selection.
//!
//! For every candidate block mode this weighs each endpoint format's
//! quantization error (from the color bit budget left under 128 bits)
//! against its substitution error (what is lost by dropping alpha,
//! collapsing to luminance, or forcing shared chroma), and keeps the best
//! few (format set, block mode, quant level) tuples for full trials.

use crate::block_size::BlockSizeDescriptor;
use crate::color::EndpointFormat;
use crate::ideal::Endpoints;
use crate::image::{ErrorWeightBlock, ImageBlock};
use crate::partition::PartitionInfo;
use crate::quant::{Quant, QUANT_MODE_TABLE};
use crate::vecmath::{Line4, ProcessedLine3, Vec4};
use crate::{ERROR_CALC_DEFAULT, BLOCK_MAX_PARTITIONS, TUNE_MAX_TRIAL_CANDIDATES};

/// Estimated costs of the cheaper endpoint representations, per partition.
#[derive(Clone, Copy, Debug, Default)]
pub struct EncodingChoiceErrors {
    /// Cost of the shared-chroma RGB-scale representation.
    pub rgb_scale_error: f32,
    /// Cost of collapsing HDR RGB onto the luminance axis.
    pub rgb_luma_error: f32,
    /// Cost of collapsing LDR RGB onto the luminance axis.
    pub luminance_error: f32,
    /// Cost of dropping alpha for a constant 1.0.
    pub alpha_drop_error: f32,
    /// Endpoint deltas fit the offset encodings.
    pub can_offset_encode: bool,
    /// Endpoints survive inverse blue contraction.
    pub can_blue_contract: bool,
}

/// Estimate the encoding choice errors for each partition.
pub fn compute_encoding_choice_errors(
    blk: &ImageBlock,
    pi: &PartitionInfo,
    ewb: &ErrorWeightBlock,
    ep: &Endpoints,
    eci: &mut [EncodingChoiceErrors; BLOCK_MAX_PARTITIONS],
) {
    let partition_count = pi.partition_count.max(1) as usize;
    let lum_dir = Vec4::new(1.0, 1.0, 1.0, 0.0).normalized();

    for p in 0..partition_count {
        let count = pi.partition_texel_count[p] as usize;

        // Error weighted RGB mean defines the shared-chroma axis
        let mut weight_sum = Vec4::zero();
        let mut color_sum = Vec4::zero();
        for &texel in pi.texels_of_partition[p][..count].iter() {
            let t = texel as usize;
            let w = ewb.error_weights[t];
            weight_sum += w;
            color_sum += blk.texel(t) * w;
        }
        let mut avg = Vec4::zero();
        for ch in 0..3 {
            if weight_sum.lane(ch) > 1e-10 {
                avg[ch] = color_sum.lane(ch) / weight_sum.lane(ch);
            }
        }

        let samec = ProcessedLine3::new(Line4 {
            a: Vec4::zero(),
            b: avg.with_lane(3, 0.0).normalized_safe(),
        });
        let lum = ProcessedLine3::new(Line4 {
            a: Vec4::zero(),
            b: lum_dir,
        });

        let mut rgb_scale_error = 0.0f32;
        let mut luminance_error = 0.0f32;
        let mut alpha_drop_error = 0.0f32;
        for &texel in pi.texels_of_partition[p][..count].iter() {
            let t = texel as usize;
            let point = blk.texel(t).with_lane(3, 0.0);
            let ew = ewb.error_weights[t];

            let diff = point - (samec.amod + samec.bs * samec.param_of(point));
            rgb_scale_error += (ew * diff * diff).hsum3();

            let diff = point - (lum.amod + lum.bs * lum.param_of(point));
            luminance_error += (ew * diff * diff).hsum3();

            let alpha_diff = blk.data_a[t] - 65535.0;
            alpha_drop_error += ew.lane(3) * alpha_diff * alpha_diff;
        }

        let d0 = (ep.endpt1[p] - ep.endpt0[p]).abs();
        let can_offset_encode = d0.hmax() < 0.12 * 65535.0;

        let bc0 = ep.endpt0[p];
        let bc1 = ep.endpt1[p];
        let in_range = |e: Vec4| {
            let r = 2.0 * e.lane(0) - e.lane(2);
            let g = 2.0 * e.lane(1) - e.lane(2);
            (0.0..=65535.0).contains(&r) && (0.0..=65535.0).contains(&g)
        };
        let can_blue_contract = in_range(bc0) && in_range(bc1);

        eci[p] = EncodingChoiceErrors {
            rgb_scale_error,
            rgb_luma_error: luminance_error,
            luminance_error,
            alpha_drop_error,
            can_offset_encode,
            can_blue_contract,
        };
    }
}

// Mean squared rounding error of an L level quantizer over the 16 bit
// color domain, per unit error weight.
fn baseline_quant_error(quant: Quant) -> f32 {
    let levels = quant.levels() as f32;
    let step = 65535.0 / (levels - 1.0);
    step * step * (1.0 / 12.0)
}

#[derive(Clone, Copy)]
struct PartitionWeights {
    rgb: f32,
    alpha: f32,
}

/// Estimated total error of one format for one partition at one quant
/// level. Returns the error sentinel for ineligible formats.
fn format_error(
    fmt: EndpointFormat,
    quant: Quant,
    pw: &PartitionWeights,
    eci: &EncodingChoiceErrors,
) -> f32 {
    use EndpointFormat::*;

    if quant < Quant::Q6 {
        return ERROR_CALC_DEFAULT;
    }

    let bqe = baseline_quant_error(quant);
    // Blue contraction halves the effective chroma step when available
    let rgb_factor = if eci.can_blue_contract { 0.75 } else { 1.0 };
    // Offset encodings spend their bits on a finer local range
    let delta_ok = eci.can_offset_encode;

    match fmt {
        Luminance => bqe * pw.rgb + eci.luminance_error + eci.alpha_drop_error,
        LuminanceDelta => {
            if !delta_ok {
                return ERROR_CALC_DEFAULT;
            }
            bqe * 0.5 * pw.rgb + eci.luminance_error + eci.alpha_drop_error
        }
        LuminanceAlpha => bqe * (pw.rgb + pw.alpha) + eci.luminance_error,
        LuminanceAlphaDelta => {
            if !delta_ok {
                return ERROR_CALC_DEFAULT;
            }
            bqe * 0.5 * (pw.rgb + pw.alpha) + eci.luminance_error
        }
        RgbScale => bqe * pw.rgb + eci.rgb_scale_error + eci.alpha_drop_error,
        RgbScaleAlpha => bqe * (pw.rgb + pw.alpha) + eci.rgb_scale_error,
        Rgb => bqe * rgb_factor * pw.rgb + eci.alpha_drop_error,
        RgbDelta => {
            if !delta_ok {
                return ERROR_CALC_DEFAULT;
            }
            bqe * 0.5 * rgb_factor * pw.rgb + eci.alpha_drop_error
        }
        Rgba => bqe * rgb_factor * (pw.rgb + pw.alpha),
        RgbaDelta => {
            if !delta_ok {
                return ERROR_CALC_DEFAULT;
            }
            bqe * 0.5 * rgb_factor * (pw.rgb + pw.alpha)
        }
        HdrLuminanceLargeRange | HdrLuminanceSmallRange => {
            bqe * pw.rgb + eci.rgb_luma_error + eci.alpha_drop_error
        }
        HdrRgbScale => bqe * pw.rgb + eci.rgb_scale_error + eci.alpha_drop_error,
        HdrRgb => bqe * pw.rgb + eci.alpha_drop_error,
        HdrRgbLdrAlpha | HdrRgba => bqe * (pw.rgb + pw.alpha),
    }
}

// The candidate formats per integer-count class, LDR and HDR variants.
fn class_formats(class: usize, encode_hdr_rgb: bool, encode_hdr_alpha: bool) -> &'static [EndpointFormat] {
    use EndpointFormat::*;
    if encode_hdr_rgb {
        match class {
            0 => &[HdrLuminanceLargeRange, HdrLuminanceSmallRange],
            1 => &[HdrRgbScale],
            2 => &[HdrRgb],
            _ => {
                if encode_hdr_alpha {
                    &[HdrRgba]
                } else {
                    &[HdrRgbLdrAlpha]
                }
            }
        }
    } else {
        match class {
            0 => &[LuminanceDelta, Luminance],
            1 => &[LuminanceAlphaDelta, LuminanceAlpha, RgbScale],
            2 => &[RgbDelta, Rgb],
            _ => &[RgbaDelta, Rgba, RgbScaleAlpha],
        }
    }
}

/// One surviving (formats, block mode, quant) combination.
#[derive(Clone, Copy, Debug)]
pub struct FormatCandidate {
    pub partition_formats: [EndpointFormat; BLOCK_MAX_PARTITIONS],
    /// Packed index into the descriptor's block mode array.
    pub block_mode: usize,
    pub quant_level: Quant,
    pub quant_level_mod: Quant,
    pub error: f32,
}

fn config_bits(partition_count: usize, is_dual_plane: bool, formats_matched: bool) -> u32 {
    let mut bits = 11 + 2;
    if partition_count > 1 {
        bits += 10 + 6;
        if !formats_matched {
            bits += 3 * partition_count as u32 - 4;
        }
    } else {
        bits += 4;
    }
    if is_dual_plane {
        bits += 2;
    }
    bits
}

/// The color bit budget left after the config fields and weights.
pub fn color_bits_available(
    partition_count: usize,
    is_dual_plane: bool,
    formats_matched: bool,
    weight_bits: i32,
) -> i32 {
    128 - config_bits(partition_count, is_dual_plane, formats_matched) as i32 - weight_bits
}

/// Highest color quant level fitting `2 * pairs` integers in `bits`, if
/// any usable one exists. This is the level a decoder will infer, so the
/// encoder must quantize with exactly this.
pub fn quant_for(pairs: usize, bits: i32) -> Option<Quant> {
    if bits <= 0 || bits > 127 || pairs == 0 || pairs > 16 {
        return None;
    }
    let q = QUANT_MODE_TABLE[pairs][bits as usize];
    if q < Quant::Q6 as i8 {
        None
    } else {
        Quant::from_index(q as usize)
    }
}

/// Pick the best endpoint format combination for every viable block mode
/// and return up to `tune_candidate_limit` candidates in ascending error
/// order.
#[allow(clippy::too_many_arguments)]
pub fn compute_ideal_endpoint_formats(
    bsd: &BlockSizeDescriptor,
    pi: &PartitionInfo,
    blk: &ImageBlock,
    ewb: &ErrorWeightBlock,
    ep: &Endpoints,
    qwt_bitcounts: &[i32],
    qwt_errors: &[f32],
    tune_candidate_limit: usize,
    encode_hdr_rgb: bool,
    encode_hdr_alpha: bool,
) -> Vec<FormatCandidate> {
    let partition_count = pi.partition_count.max(1) as usize;

    let mut eci = [EncodingChoiceErrors::default(); BLOCK_MAX_PARTITIONS];
    compute_encoding_choice_errors(blk, pi, ewb, ep, &mut eci);

    // Per-partition channel weight masses drive the quantization error
    let mut pw = [PartitionWeights { rgb: 0.0, alpha: 0.0 }; BLOCK_MAX_PARTITIONS];
    for p in 0..partition_count {
        let count = pi.partition_texel_count[p] as usize;
        for &texel in pi.texels_of_partition[p][..count].iter() {
            let t = texel as usize;
            let ew = ewb.error_weights[t];
            pw[p].rgb += ew.hsum3();
            pw[p].alpha += ew.lane(3);
        }
    }

    // Best (error, format) per partition, quant level and class
    let mut best: Vec<[[(f32, EndpointFormat); 4]; 21]> = Vec::with_capacity(partition_count);
    for p in 0..partition_count {
        let mut table = [[(ERROR_CALC_DEFAULT, EndpointFormat::Luminance); 4]; 21];
        for (q, row) in table.iter_mut().enumerate() {
            let quant = Quant::from_index(q).unwrap();
            for (class, slot) in row.iter_mut().enumerate() {
                for &fmt in class_formats(class, encode_hdr_rgb, encode_hdr_alpha) {
                    let err = format_error(fmt, quant, &pw[p], &eci[p]);
                    if err < slot.0 {
                        *slot = (err, fmt);
                    }
                }
            }
        }
        best.push(table);
    }

    let mut candidates: Vec<FormatCandidate> = Vec::new();

    for (i, bm) in bsd.block_modes.iter().enumerate() {
        if qwt_bitcounts[i] < 0 || qwt_errors[i] >= ERROR_CALC_DEFAULT {
            continue;
        }
        let weight_bits = qwt_bitcounts[i];

        let avail_diff =
            color_bits_available(partition_count, bm.is_dual_plane, false, weight_bits);
        let avail_same =
            color_bits_available(partition_count, bm.is_dual_plane, true, weight_bits);

        let mut best_error = ERROR_CALC_DEFAULT;
        let mut best_formats = [EndpointFormat::Luminance; BLOCK_MAX_PARTITIONS];
        let mut best_quant = None;
        let mut best_quant_mod = None;

        // Matched formats: every partition shares one format, which frees
        // the per-partition format bits for a finer color quant
        for class in 0..4usize {
            let quant_mod = match quant_for(partition_count * (class + 1), avail_same) {
                Some(q) => q,
                None => continue,
            };
            for &fmt in class_formats(class, encode_hdr_rgb, encode_hdr_alpha) {
                let mut err = qwt_errors[i];
                for p in 0..partition_count {
                    err += format_error(fmt, quant_mod, &pw[p], &eci[p]);
                }
                if err < best_error {
                    best_error = err;
                    best_formats = [fmt; BLOCK_MAX_PARTITIONS];
                    best_quant = Some(quant_mod);
                    best_quant_mod = Some(quant_mod);
                }
            }
        }

        // Differing formats, one class choice per partition
        if partition_count > 1 {
            let combos = 4usize.pow(partition_count as u32);
            for combo in 0..combos {
                let mut classes = [0usize; BLOCK_MAX_PARTITIONS];
                let mut pairs = 0usize;
                let mut c = combo;
                for p in 0..partition_count {
                    classes[p] = c & 3;
                    pairs += classes[p] + 1;
                    c >>= 2;
                }
                // The CEM encoding only spans two adjacent classes
                let min_class = *classes[..partition_count].iter().min().unwrap();
                let max_class = *classes[..partition_count].iter().max().unwrap();
                if max_class - min_class > 1 {
                    continue;
                }

                let quant = match quant_for(pairs, avail_diff) {
                    Some(q) => q,
                    None => continue,
                };

                let mut err = qwt_errors[i];
                let mut formats = [EndpointFormat::Luminance; BLOCK_MAX_PARTITIONS];
                for p in 0..partition_count {
                    let (e, fmt) = best[p][quant.index()][classes[p]];
                    err += e;
                    formats[p] = fmt;
                }
                if err < best_error {
                    best_error = err;
                    best_formats = formats;
                    best_quant = Some(quant);
                    best_quant_mod = Some(quant);
                }
            }
        } else {
            // Single partition: the 4-bit CEM field is always present
            for class in 0..4usize {
                let quant = match quant_for(class + 1, avail_diff) {
                    Some(q) => q,
                    None => continue,
                };
                let (e, fmt) = best[0][quant.index()][class];
                let err = qwt_errors[i] + e;
                if err < best_error {
                    best_error = err;
                    best_formats = [fmt; BLOCK_MAX_PARTITIONS];
                    best_quant = Some(quant);
                    best_quant_mod = Some(quant);
                }
            }
        }

        let (quant_level, quant_level_mod) = match (best_quant, best_quant_mod) {
            (Some(q), Some(qm)) => (q, qm),
            _ => continue,
        };
        if best_error >= ERROR_CALC_DEFAULT {
            continue;
        }

        // Keep the top candidates in ascending error order; ties keep the
        // earlier (lower packed index) mode
        let pos = candidates
            .iter()
            .position(|c| best_error < c.error)
            .unwrap_or(candidates.len());
        if pos < TUNE_MAX_TRIAL_CANDIDATES.min(tune_candidate_limit) {
            candidates.insert(
                pos,
                FormatCandidate {
                    partition_formats: best_formats,
                    block_mode: i,
                    quant_level,
                    quant_level_mod,
                    error: best_error,
                },
            );
            candidates.truncate(TUNE_MAX_TRIAL_CANDIDATES.min(tune_candidate_limit));
        }
    }

    candidates
}
