//! Endpoint color packing and unpacking.
//!
//! Sixteen endpoint formats cover luminance, luminance+alpha, RGB and
//! RGBA in direct, delta, scale and HDR variants. The encoded ordinals
//! are wire format, as are the value relationships the decoder keys off:
//! RGB formats compare endpoint sums to decide blue contraction, delta
//! formats split bytes with a sign transfer, and the HDR formats spread
//! mode flags across the high bits of the quantized bytes.
//!
//! The pack side works in the unquantized byte domain and re-reads every
//! byte through the quantization tables, so what the chooser scores is
//! what the decoder will see.

use crate::quant::{Quant, COLOR_QUANT_TABLES, COLOR_UNQUANT_TABLES};
use crate::vecmath::{IVec4, Vec4};
use crate::Profile;

/// The ASTC endpoint formats. The values are used directly in the
/// encoding, do not rearrange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum EndpointFormat {
    Luminance = 0,
    LuminanceDelta = 1,
    HdrLuminanceLargeRange = 2,
    HdrLuminanceSmallRange = 3,
    LuminanceAlpha = 4,
    LuminanceAlphaDelta = 5,
    RgbScale = 6,
    HdrRgbScale = 7,
    Rgb = 8,
    RgbDelta = 9,
    RgbScaleAlpha = 10,
    HdrRgb = 11,
    Rgba = 12,
    RgbaDelta = 13,
    HdrRgbLdrAlpha = 14,
    HdrRgba = 15,
}

impl EndpointFormat {
    pub fn from_index(i: usize) -> EndpointFormat {
        use EndpointFormat::*;
        const ALL: [EndpointFormat; 16] = [
            Luminance,
            LuminanceDelta,
            HdrLuminanceLargeRange,
            HdrLuminanceSmallRange,
            LuminanceAlpha,
            LuminanceAlphaDelta,
            RgbScale,
            HdrRgbScale,
            Rgb,
            RgbDelta,
            RgbScaleAlpha,
            HdrRgb,
            Rgba,
            RgbaDelta,
            HdrRgbLdrAlpha,
            HdrRgba,
        ];
        ALL[i & 15]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// The number of encoded integers, 2/4/6/8 by format class.
    pub fn integer_count(self) -> usize {
        2 * ((self as usize) / 4 + 1)
    }

    pub fn is_hdr(self) -> bool {
        matches!(
            self,
            EndpointFormat::HdrLuminanceLargeRange
                | EndpointFormat::HdrLuminanceSmallRange
                | EndpointFormat::HdrRgbScale
                | EndpointFormat::HdrRgb
                | EndpointFormat::HdrRgbLdrAlpha
                | EndpointFormat::HdrRgba
        )
    }
}

fn quantize_byte(quant: Quant, value: i32) -> u8 {
    COLOR_QUANT_TABLES[quant.index()][value.clamp(0, 255) as usize]
}

fn unquantize_byte(quant: Quant, ch: u8) -> i32 {
    COLOR_UNQUANT_TABLES[quant.index()][ch as usize] as i32
}

/// Quantize, then report what the decoder will reconstruct.
fn realize(quant: Quant, value: i32) -> (u8, i32) {
    let ch = quantize_byte(quant, value);
    (ch, unquantize_byte(quant, ch))
}

/// Quantize to the nearest codepoint whose unquantized value preserves
/// the given bits; used for HDR bytes whose high bits carry mode flags.
fn realize_masked(quant: Quant, value: i32, mask: i32, required: i32) -> (u8, i32) {
    let levels = quant.levels() as usize;
    let mut best: Option<(i32, u8, i32)> = None;
    for ch in 0..levels {
        let unq = unquantize_byte(quant, ch as u8);
        if unq & mask != required {
            continue;
        }
        let dist = (unq - value).abs();
        match best {
            Some((bd, _, bu)) if dist > bd || (dist == bd && unq >= bu) => {}
            _ => best = Some((dist, ch as u8, unq)),
        }
    }
    match best {
        Some((_, ch, unq)) => (ch, unq),
        // No codepoint carries the flags at this quant level; fall back
        // to value-nearest and accept the misdecode risk upstream
        None => realize(quant, value),
    }
}

fn float_to_byte(v: f32) -> i32 {
    (v * (1.0 / 257.0) + 0.5) as i32
}

fn mean3(v: Vec4) -> f32 {
    v.hsum3() * (1.0 / 3.0)
}

const fn sign_extend(v: i32, bits: i32) -> i32 {
    let shift = 32 - bits;
    (v << shift) >> shift
}

fn blue_contract(r: i32, g: i32, b: i32, a: i32) -> IVec4 {
    IVec4::new((r + b) >> 1, (g + b) >> 1, b, a)
}

// Inverse of the decoder's blue contraction; components may fall outside
// the byte range, in which case the caller must not use this path.
fn blue_uncontract(r: i32, g: i32, b: i32, a: i32) -> IVec4 {
    IVec4::new(2 * r - b, 2 * g - b, b, a)
}

fn in_byte_range(v: IVec4) -> bool {
    (0..4).all(|i| (0..=255).contains(&v.lane(i)))
}

// ---------------------------------------------------------------------------
// Pack
// ---------------------------------------------------------------------------

fn pack_luminance(c0: Vec4, c1: Vec4, output: &mut [u8], quant: Quant) {
    let mut l0 = mean3(c0) * (1.0 / 257.0);
    let mut l1 = mean3(c1) * (1.0 / 257.0);
    if l0 > l1 {
        let avg = (l0 + l1) * 0.5;
        l0 = avg;
        l1 = avg;
    }
    output[0] = quantize_byte(quant, (l0 + 0.5) as i32);
    output[1] = quantize_byte(quant, (l1 + 0.5) as i32);
}

fn try_pack_luminance_delta(c0: Vec4, c1: Vec4, output: &mut [u8], quant: Quant) -> bool {
    let l0 = ((mean3(c0) * (1.0 / 257.0)) + 0.5) as i32;
    let l1 = ((mean3(c1) * (1.0 / 257.0)) + 0.5) as i32;
    let d = l1 - l0;
    if !(0..=63).contains(&d) {
        return false;
    }
    output[0] = quantize_byte(quant, (l0 & 0x3F) << 2);
    output[1] = quantize_byte(quant, (l0 & 0xC0) | d);
    true
}

fn pack_luminance_alpha(c0: Vec4, c1: Vec4, output: &mut [u8], quant: Quant) {
    output[0] = quantize_byte(quant, (mean3(c0) * (1.0 / 257.0) + 0.5) as i32);
    output[1] = quantize_byte(quant, (mean3(c1) * (1.0 / 257.0) + 0.5) as i32);
    output[2] = quantize_byte(quant, float_to_byte(c0.lane(3)));
    output[3] = quantize_byte(quant, float_to_byte(c1.lane(3)));
}

/// Encode a (base, delta) pair with the sign-transfer byte split used by
/// all the delta formats. Returns `None` when the delta is out of range.
fn encode_transfer_pair(base: i32, target: i32, quant: Quant) -> Option<(u8, u8)> {
    let d = target - base;
    if !(-32..=31).contains(&d) {
        return None;
    }
    let base_byte = (base & 0x7F) << 1;
    let delta_byte = (base & 0x80) | ((d & 0x3F) << 1);
    let (cb, _) = realize(quant, base_byte);
    let (cd, _) = realize(quant, delta_byte);
    Some((cb, cd))
}

fn try_pack_luminance_alpha_delta(c0: Vec4, c1: Vec4, output: &mut [u8], quant: Quant) -> bool {
    let l0 = (mean3(c0) * (1.0 / 257.0) + 0.5) as i32;
    let l1 = (mean3(c1) * (1.0 / 257.0) + 0.5) as i32;
    let a0 = float_to_byte(c0.lane(3));
    let a1 = float_to_byte(c1.lane(3));

    let (lb, ld) = match encode_transfer_pair(l0, l1, quant) {
        Some(pair) => pair,
        None => return false,
    };
    let (ab, ad) = match encode_transfer_pair(a0, a1, quant) {
        Some(pair) => pair,
        None => return false,
    };
    output[0] = lb;
    output[1] = ld;
    output[2] = ab;
    output[3] = ad;
    true
}

/// Quantize an RGB endpoint pair, nudging the endpoints apart until the
/// realized sums keep the decoder out of the blue-contract branch.
fn pack_rgb(c0: Vec4, c1: Vec4, output: &mut [u8], quant: Quant) {
    let mut r0 = c0.lane(0) * (1.0 / 257.0);
    let mut g0 = c0.lane(1) * (1.0 / 257.0);
    let mut b0 = c0.lane(2) * (1.0 / 257.0);
    let mut r1 = c1.lane(0) * (1.0 / 257.0);
    let mut g1 = c1.lane(1) * (1.0 / 257.0);
    let mut b1 = c1.lane(2) * (1.0 / 257.0);

    let mut iters = 0;
    loop {
        let (cr0, ur0) = realize(quant, (r0 + 0.5) as i32);
        let (cg0, ug0) = realize(quant, (g0 + 0.5) as i32);
        let (cb0, ub0) = realize(quant, (b0 + 0.5) as i32);
        let (cr1, ur1) = realize(quant, (r1 + 0.5) as i32);
        let (cg1, ug1) = realize(quant, (g1 + 0.5) as i32);
        let (cb1, ub1) = realize(quant, (b1 + 0.5) as i32);

        if ur0 + ug0 + ub0 <= ur1 + ug1 + ub1 || iters >= 20 {
            output[0] = cr0;
            output[1] = cr1;
            output[2] = cg0;
            output[3] = cg1;
            output[4] = cb0;
            output[5] = cb1;
            return;
        }

        r0 = (r0 - 1.0).max(0.0);
        g0 = (g0 - 1.0).max(0.0);
        b0 = (b0 - 1.0).max(0.0);
        r1 = (r1 + 1.0).min(255.0);
        g1 = (g1 + 1.0).min(255.0);
        b1 = (b1 + 1.0).min(255.0);
        iters += 1;
    }
}

/// Blue-contracted RGB: store the inverse-contracted colors swapped so
/// the decoder's sum test lands in the contract branch.
fn try_pack_rgb_blue_contract(c0: Vec4, c1: Vec4, output: &mut [u8], quant: Quant) -> bool {
    let e0 = blue_uncontract(
        float_to_byte(c0.lane(0)),
        float_to_byte(c0.lane(1)),
        float_to_byte(c0.lane(2)),
        255,
    );
    let e1 = blue_uncontract(
        float_to_byte(c1.lane(0)),
        float_to_byte(c1.lane(1)),
        float_to_byte(c1.lane(2)),
        255,
    );
    if !in_byte_range(e0) || !in_byte_range(e1) {
        return false;
    }

    // Evens carry what decodes to endpoint 1, odds endpoint 0
    let (cr1, ur1) = realize(quant, e1.lane(0));
    let (cg1, ug1) = realize(quant, e1.lane(1));
    let (cb1, ub1) = realize(quant, e1.lane(2));
    let (cr0, ur0) = realize(quant, e0.lane(0));
    let (cg0, ug0) = realize(quant, e0.lane(1));
    let (cb0, ub0) = realize(quant, e0.lane(2));

    if ur1 + ug1 + ub1 <= ur0 + ug0 + ub0 {
        return false;
    }

    output[0] = cr1;
    output[1] = cr0;
    output[2] = cg1;
    output[3] = cg0;
    output[4] = cb1;
    output[5] = cb0;
    true
}

fn try_pack_rgb_delta(c0: Vec4, c1: Vec4, output: &mut [u8], quant: Quant) -> bool {
    let base = [
        float_to_byte(c0.lane(0)),
        float_to_byte(c0.lane(1)),
        float_to_byte(c0.lane(2)),
    ];
    let target = [
        float_to_byte(c1.lane(0)),
        float_to_byte(c1.lane(1)),
        float_to_byte(c1.lane(2)),
    ];

    let dsum: i32 = (0..3).map(|i| target[i] - base[i]).sum();
    if dsum < 0 {
        return false;
    }

    for i in 0..3 {
        match encode_transfer_pair(base[i], target[i], quant) {
            Some((b, d)) => {
                output[2 * i] = b;
                output[2 * i + 1] = d;
            }
            None => return false,
        }
    }
    true
}

fn try_pack_rgb_delta_blue_contract(c0: Vec4, c1: Vec4, output: &mut [u8], quant: Quant) -> bool {
    // The decoder contracts and swaps when the delta sum is negative
    let base = blue_uncontract(
        float_to_byte(c1.lane(0)),
        float_to_byte(c1.lane(1)),
        float_to_byte(c1.lane(2)),
        255,
    );
    let target = blue_uncontract(
        float_to_byte(c0.lane(0)),
        float_to_byte(c0.lane(1)),
        float_to_byte(c0.lane(2)),
        255,
    );
    if !in_byte_range(base) || !in_byte_range(target) {
        return false;
    }

    let dsum: i32 = (0..3).map(|i| target.lane(i) - base.lane(i)).sum();
    if dsum >= 0 {
        return false;
    }

    for i in 0..3 {
        match encode_transfer_pair(base.lane(i), target.lane(i), quant) {
            Some((b, d)) => {
                output[2 * i] = b;
                output[2 * i + 1] = d;
            }
            None => return false,
        }
    }
    true
}

fn pack_rgbs(rgbs: Vec4, output: &mut [u8], quant: Quant) {
    output[0] = quantize_byte(quant, float_to_byte(rgbs.lane(0)));
    output[1] = quantize_byte(quant, float_to_byte(rgbs.lane(1)));
    output[2] = quantize_byte(quant, float_to_byte(rgbs.lane(2)));
    output[3] = quantize_byte(quant, (rgbs.lane(3) * 256.0) as i32);
}

fn pack_alpha_pair(c0: Vec4, c1: Vec4, output: &mut [u8], quant: Quant) {
    output[0] = quantize_byte(quant, float_to_byte(c0.lane(3)));
    output[1] = quantize_byte(quant, float_to_byte(c1.lane(3)));
}

fn try_pack_alpha_delta(c0: Vec4, c1: Vec4, output: &mut [u8], quant: Quant) -> bool {
    let a0 = float_to_byte(c0.lane(3));
    let a1 = float_to_byte(c1.lane(3));
    match encode_transfer_pair(a0, a1, quant) {
        Some((b, d)) => {
            output[0] = b;
            output[1] = d;
            true
        }
        None => false,
    }
}

fn lns12(v: f32) -> i32 {
    ((v as i32) >> 4).clamp(0, 0xFFF)
}

fn pack_hdr_luminance_large(c0: Vec4, c1: Vec4, output: &mut [u8], quant: Quant) {
    let mut l0 = mean3(c0);
    let mut l1 = mean3(c1);
    if l1 < l0 {
        let avg = (l0 + l1) * 0.5;
        l0 = avg;
        l1 = avg;
    }
    let y0 = lns12(l0);
    let y1 = lns12(l1);
    // Direct submode needs v1 >= v0; quantization is monotone so the
    // ordering survives
    output[0] = quantize_byte(quant, y0 >> 4);
    output[1] = quantize_byte(quant, y1 >> 4);
}

fn pack_hdr_luminance_small(c0: Vec4, c1: Vec4, output: &mut [u8], quant: Quant) -> bool {
    let mut l0 = mean3(c0);
    let mut l1 = mean3(c1);
    if l1 < l0 {
        let avg = (l0 + l1) * 0.5;
        l0 = avg;
        l1 = avg;
    }
    let y0 = lns12(l0);
    let d = (lns12(l1) - y0).clamp(0, 124);

    if d <= 30 {
        // Fine submode: 11 bit base, 4 bit delta in steps of 2
        let base = y0 >> 1;
        let (c_lo, _) = realize_masked(quant, base & 0x7F, 0x80, 0x00);
        let (c_hi, _) = realize(quant, ((base >> 7) << 4) | (d >> 1));
        output[0] = c_lo;
        output[1] = c_hi;
    } else {
        // Coarse submode: 10 bit base, 5 bit delta in steps of 4
        let base = y0 >> 2;
        let (c_lo, _) = realize_masked(quant, 0x80 | (base & 0x7F), 0x80, 0x80);
        let (c_hi, _) = realize(quant, ((base >> 7) << 5) | (d >> 2));
        output[0] = c_lo;
        output[1] = c_hi;
    }
    true
}

/// HDR RGB in the direct major-component submode: 8 bits of red and
/// green, 7 of blue, with the submode flagged in the top bits of v4/v5.
fn pack_hdr_rgb(c0: Vec4, c1: Vec4, output: &mut [u8], quant: Quant) {
    let r0 = lns12(c0.lane(0));
    let g0 = lns12(c0.lane(1));
    let b0 = lns12(c0.lane(2));
    let r1 = lns12(c1.lane(0));
    let g1 = lns12(c1.lane(1));
    let b1 = lns12(c1.lane(2));

    output[0] = quantize_byte(quant, r0 >> 4);
    output[1] = quantize_byte(quant, r1 >> 4);
    output[2] = quantize_byte(quant, g0 >> 4);
    output[3] = quantize_byte(quant, g1 >> 4);
    let (c4, _) = realize_masked(quant, 0x80 | (b0 >> 5), 0x80, 0x80);
    let (c5, _) = realize_masked(quant, 0x80 | (b1 >> 5), 0x80, 0x80);
    output[4] = c4;
    output[5] = c5;
}

/// HDR RGB + scale in the all-components submode (modeval 0xF): 7 bit
/// fields for every component.
fn pack_hdr_rgb_scale(c0: Vec4, c1: Vec4, output: &mut [u8], quant: Quant) {
    let e1 = Vec4::new(c1.lane(0), c1.lane(1), c1.lane(2), 0.0);
    let red = lns12(e1.lane(0));
    let green = lns12(e1.lane(1));
    let blue = lns12(e1.lane(2));
    let scale_f = (mean3(c1) - mean3(c0)).max(0.0);
    let scale = lns12(scale_f);

    let r7 = red >> 5;
    let g7 = green >> 5;
    let b7 = blue >> 5;
    let s7 = scale >> 5;

    let (c0b, _) = realize_masked(quant, 0xC0 | (r7 & 0x3F), 0xC0, 0xC0);
    let (c1b, _) = realize_masked(
        quant,
        0x80 | (((g7 >> 6) & 1) << 6) | (((g7 >> 5) & 1) << 5) | (g7 & 0x1F),
        0x80,
        0x80,
    );
    let (c2b, _) = realize_masked(
        quant,
        0x80 | (((b7 >> 6) & 1) << 6) | (((b7 >> 5) & 1) << 5) | (b7 & 0x1F),
        0x80,
        0x80,
    );
    let (c3b, _) = realize(
        quant,
        (((r7 >> 6) & 1) << 7) | (((s7 >> 6) & 1) << 6) | (((s7 >> 5) & 1) << 5) | (s7 & 0x1F),
    );
    output[0] = c0b;
    output[1] = c1b;
    output[2] = c2b;
    output[3] = c3b;
}

fn pack_hdr_alpha(c0: Vec4, c1: Vec4, output: &mut [u8], quant: Quant) {
    let a0 = lns12(c0.lane(3));
    let a1 = lns12(c1.lane(3));
    let (c6, _) = realize_masked(quant, 0x80 | (a0 >> 5), 0x80, 0x80);
    let (c7, _) = realize_masked(quant, 0x80 | (a1 >> 5), 0x80, 0x80);
    output[0] = c6;
    output[1] = c7;
}

/// Pack one endpoint pair as effectively as possible.
///
/// The caller requests a base format; the packer may pick the delta or
/// blue-contract variant when it represents the endpoints better, and
/// reports the format variant actually encoded.
pub fn pack_color_endpoints(
    color0: Vec4,
    color1: Vec4,
    rgbs_color: Vec4,
    rgbo_color: Vec4,
    format: EndpointFormat,
    output: &mut [u8],
    quant: Quant,
) -> EndpointFormat {
    use EndpointFormat::*;

    match format {
        Luminance => {
            pack_luminance(color0, color1, output, quant);
            Luminance
        }
        LuminanceDelta => {
            if try_pack_luminance_delta(color0, color1, output, quant) {
                LuminanceDelta
            } else {
                pack_luminance(color0, color1, output, quant);
                Luminance
            }
        }
        HdrLuminanceLargeRange => {
            pack_hdr_luminance_large(color0, color1, output, quant);
            HdrLuminanceLargeRange
        }
        HdrLuminanceSmallRange => {
            if pack_hdr_luminance_small(color0, color1, output, quant) {
                HdrLuminanceSmallRange
            } else {
                pack_hdr_luminance_large(color0, color1, output, quant);
                HdrLuminanceLargeRange
            }
        }
        LuminanceAlpha => {
            pack_luminance_alpha(color0, color1, output, quant);
            LuminanceAlpha
        }
        LuminanceAlphaDelta => {
            if try_pack_luminance_alpha_delta(color0, color1, output, quant) {
                LuminanceAlphaDelta
            } else {
                pack_luminance_alpha(color0, color1, output, quant);
                LuminanceAlpha
            }
        }
        RgbScale => {
            pack_rgbs(rgbs_color, output, quant);
            RgbScale
        }
        HdrRgbScale => {
            let _ = rgbo_color;
            pack_hdr_rgb_scale(color0, color1, output, quant);
            HdrRgbScale
        }
        Rgb | RgbDelta => {
            if format == RgbDelta {
                if try_pack_rgb_delta_blue_contract(color0, color1, output, quant) {
                    return RgbDelta;
                }
                if try_pack_rgb_delta(color0, color1, output, quant) {
                    return RgbDelta;
                }
            }
            if try_pack_rgb_blue_contract(color0, color1, output, quant) {
                return Rgb;
            }
            pack_rgb(color0, color1, output, quant);
            Rgb
        }
        RgbScaleAlpha => {
            pack_rgbs(rgbs_color, output, quant);
            let mut alpha = [0u8; 2];
            pack_alpha_pair(color0, color1, &mut alpha, quant);
            output[4] = alpha[0];
            output[5] = alpha[1];
            RgbScaleAlpha
        }
        HdrRgb => {
            pack_hdr_rgb(color0, color1, output, quant);
            HdrRgb
        }
        Rgba | RgbaDelta => {
            if format == RgbaDelta {
                let mut rgb = [0u8; 6];
                let mut alpha = [0u8; 2];
                let rgb_ok = try_pack_rgb_delta_blue_contract(color0, color1, &mut rgb, quant)
                    || try_pack_rgb_delta(color0, color1, &mut rgb, quant);
                if rgb_ok && try_pack_alpha_delta(color0, color1, &mut alpha, quant) {
                    output[..6].copy_from_slice(&rgb);
                    output[6] = alpha[0];
                    output[7] = alpha[1];
                    return RgbaDelta;
                }
            }
            let mut rgb = [0u8; 6];
            if !try_pack_rgb_blue_contract(color0, color1, &mut rgb, quant) {
                pack_rgb(color0, color1, &mut rgb, quant);
            }
            output[..6].copy_from_slice(&rgb);
            let mut alpha = [0u8; 2];
            pack_alpha_pair(color0, color1, &mut alpha, quant);
            output[6] = alpha[0];
            output[7] = alpha[1];
            Rgba
        }
        HdrRgbLdrAlpha => {
            pack_hdr_rgb(color0, color1, output, quant);
            let mut alpha = [0u8; 2];
            pack_alpha_pair(color0, color1, &mut alpha, quant);
            output[6] = alpha[0];
            output[7] = alpha[1];
            HdrRgbLdrAlpha
        }
        HdrRgba => {
            pack_hdr_rgb(color0, color1, output, quant);
            let mut alpha = [0u8; 2];
            pack_hdr_alpha(color0, color1, &mut alpha, quant);
            output[6] = alpha[0];
            output[7] = alpha[1];
            HdrRgba
        }
    }
}

// ---------------------------------------------------------------------------
// Unpack
// ---------------------------------------------------------------------------

/// Unpacked endpoint pair in the 16-bit interpolation domain.
pub struct UnpackedEndpoints {
    pub output0: IVec4,
    pub output1: IVec4,
    pub rgb_hdr: bool,
    pub alpha_hdr: bool,
    /// Set when the format is not decodable under the decode profile.
    pub error: bool,
}

fn unpack_luminance(v: &[i32]) -> (IVec4, IVec4) {
    (
        IVec4::new(v[0], v[0], v[0], 255),
        IVec4::new(v[1], v[1], v[1], 255),
    )
}

fn unpack_luminance_delta(v: &[i32]) -> (IVec4, IVec4) {
    let l0 = (v[0] >> 2) | (v[1] & 0xC0);
    let l1 = (l0 + (v[1] & 0x3F)).min(255);
    (
        IVec4::new(l0, l0, l0, 255),
        IVec4::new(l1, l1, l1, 255),
    )
}

fn bit_transfer_signed(a: i32, b: i32) -> (i32, i32) {
    let base = (a & 0x80) | (b >> 1);
    let delta = sign_extend((a >> 1) & 0x3F, 6);
    (delta, base)
}

fn unpack_luminance_alpha(v: &[i32]) -> (IVec4, IVec4) {
    (
        IVec4::new(v[0], v[0], v[0], v[2]),
        IVec4::new(v[1], v[1], v[1], v[3]),
    )
}

fn unpack_luminance_alpha_delta(v: &[i32]) -> (IVec4, IVec4) {
    let (ld, lb) = bit_transfer_signed(v[1], v[0]);
    let (ad, ab) = bit_transfer_signed(v[3], v[2]);
    let l1 = (lb + ld).clamp(0, 255);
    let a1 = (ab + ad).clamp(0, 255);
    (
        IVec4::new(lb, lb, lb, ab),
        IVec4::new(l1, l1, l1, a1),
    )
}

fn unpack_rgb_scale(v: &[i32]) -> (IVec4, IVec4) {
    let e1 = IVec4::new(v[0], v[1], v[2], 255);
    let e0 = IVec4::new(
        (v[0] * v[3]) >> 8,
        (v[1] * v[3]) >> 8,
        (v[2] * v[3]) >> 8,
        255,
    );
    (e0, e1)
}

fn unpack_rgb_scale_alpha(v: &[i32]) -> (IVec4, IVec4) {
    let (mut e0, mut e1) = unpack_rgb_scale(v);
    e0[3] = v[4];
    e1[3] = v[5];
    (e0, e1)
}

fn unpack_rgb(v: &[i32]) -> (IVec4, IVec4) {
    let s0 = v[0] + v[2] + v[4];
    let s1 = v[1] + v[3] + v[5];
    if s1 >= s0 {
        (
            IVec4::new(v[0], v[2], v[4], 255),
            IVec4::new(v[1], v[3], v[5], 255),
        )
    } else {
        (
            blue_contract(v[1], v[3], v[5], 255),
            blue_contract(v[0], v[2], v[4], 255),
        )
    }
}

fn unpack_rgb_delta(v: &[i32]) -> (IVec4, IVec4) {
    let (dr, r0) = bit_transfer_signed(v[1], v[0]);
    let (dg, g0) = bit_transfer_signed(v[3], v[2]);
    let (db, b0) = bit_transfer_signed(v[5], v[4]);

    let rgbsum = dr + dg + db;
    let r1 = r0 + dr;
    let g1 = g0 + dg;
    let b1 = b0 + db;
    if rgbsum >= 0 {
        (
            IVec4::new(r0.clamp(0, 255), g0.clamp(0, 255), b0.clamp(0, 255), 255),
            IVec4::new(r1.clamp(0, 255), g1.clamp(0, 255), b1.clamp(0, 255), 255),
        )
    } else {
        (
            blue_contract(r1.clamp(0, 255), g1.clamp(0, 255), b1.clamp(0, 255), 255),
            blue_contract(r0.clamp(0, 255), g0.clamp(0, 255), b0.clamp(0, 255), 255),
        )
    }
}

fn unpack_rgba(v: &[i32]) -> (IVec4, IVec4) {
    let s0 = v[0] + v[2] + v[4];
    let s1 = v[1] + v[3] + v[5];
    if s1 >= s0 {
        (
            IVec4::new(v[0], v[2], v[4], v[6]),
            IVec4::new(v[1], v[3], v[5], v[7]),
        )
    } else {
        (
            blue_contract(v[1], v[3], v[5], v[7]),
            blue_contract(v[0], v[2], v[4], v[6]),
        )
    }
}

fn unpack_rgba_delta(v: &[i32]) -> (IVec4, IVec4) {
    let (dr, r0) = bit_transfer_signed(v[1], v[0]);
    let (dg, g0) = bit_transfer_signed(v[3], v[2]);
    let (db, b0) = bit_transfer_signed(v[5], v[4]);
    let (da, a0) = bit_transfer_signed(v[7], v[6]);

    let rgbsum = dr + dg + db;
    let r1 = (r0 + dr).clamp(0, 255);
    let g1 = (g0 + dg).clamp(0, 255);
    let b1 = (b0 + db).clamp(0, 255);
    let a1 = (a0 + da).clamp(0, 255);
    if rgbsum >= 0 {
        (
            IVec4::new(r0.clamp(0, 255), g0.clamp(0, 255), b0.clamp(0, 255), a0.clamp(0, 255)),
            IVec4::new(r1, g1, b1, a1),
        )
    } else {
        (
            blue_contract(r1, g1, b1, a1),
            blue_contract(r0.clamp(0, 255), g0.clamp(0, 255), b0.clamp(0, 255), a0.clamp(0, 255)),
        )
    }
}

fn unpack_hdr_luminance_large(v: &[i32]) -> (IVec4, IVec4) {
    let (y0, y1) = if v[1] >= v[0] {
        (v[0] << 4, v[1] << 4)
    } else {
        ((v[1] << 4) + 8, (v[0] << 4) - 8)
    };
    (
        IVec4::new(y0 << 4, y0 << 4, y0 << 4, 0x7800),
        IVec4::new(y1 << 4, y1 << 4, y1 << 4, 0x7800),
    )
}

fn unpack_hdr_luminance_small(v: &[i32]) -> (IVec4, IVec4) {
    let (y0, d) = if v[0] & 0x80 != 0 {
        (
            ((v[1] & 0xE0) << 4) | ((v[0] & 0x7F) << 2),
            (v[1] & 0x1F) << 2,
        )
    } else {
        (
            ((v[1] & 0xF0) << 4) | ((v[0] & 0x7F) << 1),
            (v[1] & 0x0F) << 1,
        )
    };
    let y1 = (y0 + d).min(0xFFF);
    (
        IVec4::new(y0 << 4, y0 << 4, y0 << 4, 0x7800),
        IVec4::new(y1 << 4, y1 << 4, y1 << 4, 0x7800),
    )
}

fn unpack_hdr_rgb_scale(v: &[i32]) -> (IVec4, IVec4) {
    let modeval = ((v[0] & 0xC0) >> 6) | ((v[1] & 0x80) >> 5) | ((v[2] & 0x80) >> 4);
    let (majcomp, mode) = if modeval & 0xC != 0xC {
        (modeval >> 2, modeval & 3)
    } else if modeval != 0xF {
        (modeval & 3, 4)
    } else {
        (0, 5)
    };

    let mut red = v[0] & 0x3F;
    let mut green = v[1] & 0x1F;
    let mut blue = v[2] & 0x1F;
    let mut scale = v[3] & 0x1F;

    let bit0 = (v[1] >> 6) & 1;
    let bit1 = (v[1] >> 5) & 1;
    let bit2 = (v[2] >> 6) & 1;
    let bit3 = (v[2] >> 5) & 1;
    let bit4 = (v[3] >> 7) & 1;
    let bit5 = (v[3] >> 6) & 1;
    let bit6 = (v[3] >> 5) & 1;

    let ohcomp = 1 << mode;
    if ohcomp & 0x30 != 0 {
        green |= bit0 << 6;
    }
    if ohcomp & 0x3A != 0 {
        green |= bit1 << 5;
    }
    if ohcomp & 0x30 != 0 {
        blue |= bit2 << 6;
    }
    if ohcomp & 0x3A != 0 {
        blue |= bit3 << 5;
    }
    if ohcomp & 0x3D != 0 {
        scale |= bit6 << 5;
    }
    if ohcomp & 0x2D != 0 {
        scale |= bit5 << 6;
    }
    if ohcomp & 0x04 != 0 {
        scale |= bit4 << 7;
    }
    if ohcomp & 0x3B != 0 {
        red |= bit4 << 6;
    }
    if ohcomp & 0x04 != 0 {
        red |= bit3 << 6;
    }
    if ohcomp & 0x10 != 0 {
        red |= bit5 << 7;
    }
    if ohcomp & 0x0F != 0 {
        red |= bit2 << 7;
    }
    if ohcomp & 0x05 != 0 {
        red |= bit1 << 8;
    }
    if ohcomp & 0x0A != 0 {
        red |= bit0 << 8;
    }
    if ohcomp & 0x05 != 0 {
        red |= bit0 << 9;
    }
    if ohcomp & 0x02 != 0 {
        red |= bit6 << 9;
    }
    if ohcomp & 0x01 != 0 {
        red |= bit3 << 10;
    }
    if ohcomp & 0x02 != 0 {
        red |= bit5 << 10;
    }

    const SHAMTS: [i32; 6] = [1, 1, 2, 3, 4, 5];
    let shamt = SHAMTS[mode as usize];
    red <<= shamt;
    green <<= shamt;
    blue <<= shamt;
    scale <<= shamt;

    if mode != 5 {
        green = red - green;
        blue = red - blue;
    }
    if majcomp == 1 {
        std::mem::swap(&mut red, &mut green);
    }
    if majcomp == 2 {
        std::mem::swap(&mut red, &mut blue);
    }

    let e1 = IVec4::new(
        red.clamp(0, 0xFFF) << 4,
        green.clamp(0, 0xFFF) << 4,
        blue.clamp(0, 0xFFF) << 4,
        0x7800,
    );
    let e0 = IVec4::new(
        (red - scale).clamp(0, 0xFFF) << 4,
        (green - scale).clamp(0, 0xFFF) << 4,
        (blue - scale).clamp(0, 0xFFF) << 4,
        0x7800,
    );
    (e0, e1)
}

fn unpack_hdr_rgb(v: &[i32]) -> (IVec4, IVec4) {
    let majcomp = ((v[4] & 0x80) >> 7) | ((v[5] & 0x80) >> 6);

    // Direct submode: 8:8:7 bit endpoints
    if majcomp == 3 {
        return (
            IVec4::new(v[0] << 8, v[2] << 8, (v[4] & 0x7F) << 9, 0x7800),
            IVec4::new(v[1] << 8, v[3] << 8, (v[5] & 0x7F) << 9, 0x7800),
        );
    }

    // Base-plus-offset submodes. The base value carries the major
    // component, the b values offset the two minor components and the
    // c/d values offset the second endpoint downward.
    let mode = ((v[1] & 0x80) >> 7) | ((v[2] & 0x80) >> 6) | ((v[3] & 0x80) >> 5);
    let va = v[0] | ((v[1] & 0x40) << 2);
    let vb0 = v[2] & 0x3F;
    let vb1 = v[3] & 0x3F;
    let vc = v[1] & 0x3F;
    const DBITS: [i32; 8] = [7, 6, 7, 6, 5, 6, 5, 6];
    let vd0 = sign_extend(v[4] & 0x7F, DBITS[mode as usize]);
    let vd1 = sign_extend(v[5] & 0x7F, DBITS[mode as usize]);

    const SHAMTS: [i32; 8] = [1, 1, 2, 3, 4, 5, 6, 7];
    let shamt = SHAMTS[mode as usize];

    let mut red1 = va;
    let mut green1 = va - vb0;
    let mut blue1 = va - vb1;
    let mut red0 = va - vc;
    let mut green0 = va - vb0 - vc - vd0;
    let mut blue0 = va - vb1 - vc - vd1;

    red0 = (red0 << shamt).clamp(0, 0xFFF);
    green0 = (green0 << shamt).clamp(0, 0xFFF);
    blue0 = (blue0 << shamt).clamp(0, 0xFFF);
    red1 = (red1 << shamt).clamp(0, 0xFFF);
    green1 = (green1 << shamt).clamp(0, 0xFFF);
    blue1 = (blue1 << shamt).clamp(0, 0xFFF);

    if majcomp == 1 {
        std::mem::swap(&mut red0, &mut green0);
        std::mem::swap(&mut red1, &mut green1);
    }
    if majcomp == 2 {
        std::mem::swap(&mut red0, &mut blue0);
        std::mem::swap(&mut red1, &mut blue1);
    }

    (
        IVec4::new(red0 << 4, green0 << 4, blue0 << 4, 0x7800),
        IVec4::new(red1 << 4, green1 << 4, blue1 << 4, 0x7800),
    )
}

fn unpack_hdr_alpha(v6: i32, v7: i32) -> (i32, i32) {
    let mode = ((v6 >> 7) & 1) | ((v7 >> 6) & 2);
    let mut v6 = v6 & 0x7F;
    let mut v7 = v7 & 0x7F;

    if mode == 3 {
        ((v6 << 5) << 4, (v7 << 5) << 4)
    } else {
        v6 |= (v7 << (mode + 1)) & 0x780;
        v7 &= 0x3F >> mode;
        v7 ^= 0x20 >> mode;
        v7 -= 0x20 >> mode;
        v6 <<= 4 - mode;
        v7 <<= 4 - mode;
        v7 += v6;
        v7 = v7.clamp(0, 0xFFF);
        (v6 << 4, v7 << 4)
    }
}

/// Unpack one endpoint pair to the 16-bit interpolation domain.
///
/// LDR components expand by replication (or the sRGB variant); HDR
/// components decode directly into the 16-bit LNS domain.
pub fn unpack_color_endpoints(
    profile: Profile,
    format: EndpointFormat,
    quant: Quant,
    input: &[u8],
) -> UnpackedEndpoints {
    use EndpointFormat::*;

    let mut v = [0i32; 8];
    for (i, &ch) in input.iter().take(format.integer_count()).enumerate() {
        v[i] = unquantize_byte(quant, ch);
    }

    let mut rgb_hdr = false;
    let mut alpha_hdr = false;

    let (e0, e1) = match format {
        Luminance => unpack_luminance(&v),
        LuminanceDelta => unpack_luminance_delta(&v),
        HdrLuminanceLargeRange => {
            rgb_hdr = true;
            alpha_hdr = true;
            unpack_hdr_luminance_large(&v)
        }
        HdrLuminanceSmallRange => {
            rgb_hdr = true;
            alpha_hdr = true;
            unpack_hdr_luminance_small(&v)
        }
        LuminanceAlpha => unpack_luminance_alpha(&v),
        LuminanceAlphaDelta => unpack_luminance_alpha_delta(&v),
        RgbScale => unpack_rgb_scale(&v),
        HdrRgbScale => {
            rgb_hdr = true;
            alpha_hdr = true;
            unpack_hdr_rgb_scale(&v)
        }
        Rgb => unpack_rgb(&v),
        RgbDelta => unpack_rgb_delta(&v),
        RgbScaleAlpha => unpack_rgb_scale_alpha(&v),
        HdrRgb => {
            rgb_hdr = true;
            alpha_hdr = true;
            unpack_hdr_rgb(&v)
        }
        Rgba => unpack_rgba(&v),
        RgbaDelta => unpack_rgba_delta(&v),
        HdrRgbLdrAlpha => {
            rgb_hdr = true;
            let (mut e0, mut e1) = unpack_hdr_rgb(&v);
            e0[3] = v[6];
            e1[3] = v[7];
            (e0, e1)
        }
        HdrRgba => {
            rgb_hdr = true;
            alpha_hdr = true;
            let (mut e0, mut e1) = unpack_hdr_rgb(&v);
            let (a0, a1) = unpack_hdr_alpha(v[6], v[7]);
            e0[3] = a0;
            e1[3] = a1;
            (e0, e1)
        }
    };

    // Formats without an explicit alpha take the profile's default: HDR
    // one (0x7800) in the full HDR profile, LDR opaque otherwise
    let (mut e0, mut e1) = (e0, e1);
    if rgb_hdr
        && matches!(
            format,
            HdrLuminanceLargeRange | HdrLuminanceSmallRange | HdrRgbScale | HdrRgb
        )
    {
        if profile == Profile::Hdr {
            alpha_hdr = true;
        } else {
            alpha_hdr = false;
            e0[3] = 0xFF;
            e1[3] = 0xFF;
        }
    }

    // HDR endpoints are not decodable in a pure LDR profile, and HDR
    // alpha is not decodable in the LDR-alpha profile
    let error = match profile {
        Profile::LdrSrgb | Profile::Ldr => rgb_hdr || alpha_hdr,
        Profile::HdrRgbLdrA => alpha_hdr,
        Profile::Hdr => false,
    };

    // Expand LDR components to 16 bits
    let srgb = profile == Profile::LdrSrgb;
    let expand = |x: i32| -> i32 {
        if srgb {
            (x << 8) | 0x80
        } else {
            (x << 8) | x
        }
    };

    let mut output0 = e0;
    let mut output1 = e1;
    if !rgb_hdr {
        for i in 0..3 {
            output0[i] = expand(e0.lane(i));
            output1[i] = expand(e1.lane(i));
        }
    }
    if !alpha_hdr {
        // Alpha always expands with replication, even for sRGB
        output0[3] = (e0.lane(3) << 8) | e0.lane(3);
        output1[3] = (e1.lane(3) << 8) | e1.lane(3);
    }

    UnpackedEndpoints {
        output0,
        output1,
        rgb_hdr,
        alpha_hdr,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unpack_ldr(format: EndpointFormat, quant: Quant, input: &[u8]) -> (IVec4, IVec4) {
        let up = unpack_color_endpoints(Profile::Ldr, format, quant, input);
        assert!(!up.error);
        // Collapse the 16 bit expansion back to bytes for comparison
        let down = |v: IVec4| IVec4::new(v[0] >> 8, v[1] >> 8, v[2] >> 8, v[3] >> 8);
        (down(up.output0), down(up.output1))
    }

    #[test]
    fn test_luminance_roundtrip() {
        let c0 = Vec4::splat(40.0 * 257.0);
        let c1 = Vec4::splat(200.0 * 257.0);
        let mut out = [0u8; 8];
        let fmt = pack_color_endpoints(
            c0,
            c1,
            Vec4::zero(),
            Vec4::zero(),
            EndpointFormat::Luminance,
            &mut out,
            Quant::Q256,
        );
        assert_eq!(fmt, EndpointFormat::Luminance);
        let (e0, e1) = unpack_ldr(fmt, Quant::Q256, &out);
        assert_eq!(e0.lane(0), 40);
        assert_eq!(e1.lane(0), 200);
        assert_eq!(e0.lane(3), 255);
    }

    #[test]
    fn test_rgb_roundtrip_no_blue_contract() {
        // A dark-to-bright pair keeps the decoder in the direct branch
        let c0 = Vec4::new(10.0, 20.0, 30.0, 255.0) * 257.0;
        let c1 = Vec4::new(200.0, 180.0, 160.0, 255.0) * 257.0;
        let mut out = [0u8; 8];
        let fmt = pack_color_endpoints(
            c0,
            c1,
            Vec4::zero(),
            Vec4::zero(),
            EndpointFormat::Rgb,
            &mut out,
            Quant::Q256,
        );
        assert_eq!(fmt, EndpointFormat::Rgb);
        let (e0, e1) = unpack_ldr(fmt, Quant::Q256, &out);
        for (i, (want0, want1)) in [(10, 200), (20, 180), (30, 160)].iter().enumerate() {
            assert!((e0.lane(i) - want0).abs() <= 1);
            assert!((e1.lane(i) - want1).abs() <= 1);
        }
    }

    #[test]
    fn test_rgb_blue_contract_roundtrip() {
        // Close chroma colors where contraction gains precision
        let c0 = Vec4::new(100.0, 101.0, 99.0, 255.0) * 257.0;
        let c1 = Vec4::new(120.0, 119.0, 121.0, 255.0) * 257.0;
        let mut out = [0u8; 8];
        let fmt = pack_color_endpoints(
            c0,
            c1,
            Vec4::zero(),
            Vec4::zero(),
            EndpointFormat::Rgb,
            &mut out,
            Quant::Q256,
        );
        assert_eq!(fmt, EndpointFormat::Rgb);
        let (e0, e1) = unpack_ldr(fmt, Quant::Q256, &out);
        for (i, (want0, want1)) in [(100, 120), (101, 119), (99, 121)].iter().enumerate() {
            assert!((e0.lane(i) - want0).abs() <= 1, "lane {}", i);
            assert!((e1.lane(i) - want1).abs() <= 1, "lane {}", i);
        }
    }

    #[test]
    fn test_rgb_delta_roundtrip() {
        let c0 = Vec4::new(100.0, 110.0, 120.0, 255.0) * 257.0;
        let c1 = Vec4::new(110.0, 125.0, 135.0, 255.0) * 257.0;
        let mut out = [0u8; 8];
        let fmt = pack_color_endpoints(
            c0,
            c1,
            Vec4::zero(),
            Vec4::zero(),
            EndpointFormat::RgbDelta,
            &mut out,
            Quant::Q256,
        );
        assert_eq!(fmt, EndpointFormat::RgbDelta);
        let (e0, e1) = unpack_ldr(fmt, Quant::Q256, &out);
        for (i, (want0, want1)) in [(100, 110), (110, 125), (120, 135)].iter().enumerate() {
            assert!((e0.lane(i) - want0).abs() <= 1, "lane {}", i);
            assert!((e1.lane(i) - want1).abs() <= 1, "lane {}", i);
        }
    }

    #[test]
    fn test_rgb_delta_falls_back_when_out_of_range() {
        // A huge delta cannot use the 6 bit offset encoding
        let c0 = Vec4::new(0.0, 0.0, 0.0, 255.0) * 257.0;
        let c1 = Vec4::new(255.0, 255.0, 255.0, 255.0) * 257.0;
        let mut out = [0u8; 8];
        let fmt = pack_color_endpoints(
            c0,
            c1,
            Vec4::zero(),
            Vec4::zero(),
            EndpointFormat::RgbDelta,
            &mut out,
            Quant::Q256,
        );
        assert_eq!(fmt, EndpointFormat::Rgb);
    }

    #[test]
    fn test_rgba_roundtrip() {
        let c0 = Vec4::new(10.0, 20.0, 30.0, 40.0) * 257.0;
        let c1 = Vec4::new(200.0, 180.0, 160.0, 220.0) * 257.0;
        let mut out = [0u8; 8];
        let fmt = pack_color_endpoints(
            c0,
            c1,
            Vec4::zero(),
            Vec4::zero(),
            EndpointFormat::Rgba,
            &mut out,
            Quant::Q256,
        );
        assert_eq!(fmt, EndpointFormat::Rgba);
        let (e0, e1) = unpack_ldr(fmt, Quant::Q256, &out);
        assert!((e0.lane(3) - 40).abs() <= 1);
        assert!((e1.lane(3) - 220).abs() <= 1);
    }

    #[test]
    fn test_rgb_scale_roundtrip() {
        let rgbs = Vec4::new(200.0 * 257.0, 150.0 * 257.0, 100.0 * 257.0, 0.5);
        let mut out = [0u8; 8];
        let fmt = pack_color_endpoints(
            Vec4::zero(),
            Vec4::zero(),
            rgbs,
            Vec4::zero(),
            EndpointFormat::RgbScale,
            &mut out,
            Quant::Q256,
        );
        assert_eq!(fmt, EndpointFormat::RgbScale);
        let (e0, e1) = unpack_ldr(fmt, Quant::Q256, &out);
        assert!((e1.lane(0) - 200).abs() <= 1);
        // Scale halves the endpoint
        assert!((e0.lane(0) - 100).abs() <= 2);
    }

    #[test]
    fn test_hdr_luminance_roundtrip() {
        use crate::image::float_to_lns;
        let l0 = float_to_lns(10.0);
        let l1 = float_to_lns(1000.0);
        let c0 = Vec4::new(l0, l0, l0, 65535.0);
        let c1 = Vec4::new(l1, l1, l1, 65535.0);
        let mut out = [0u8; 8];
        let fmt = pack_color_endpoints(
            c0,
            c1,
            Vec4::zero(),
            Vec4::zero(),
            EndpointFormat::HdrLuminanceLargeRange,
            &mut out,
            Quant::Q256,
        );
        let up = unpack_color_endpoints(Profile::Hdr, fmt, Quant::Q256, &out);
        assert!(up.rgb_hdr);
        // 8 bit large range storage: the top bits must survive
        assert!((up.output0.lane(0) - l0 as i32).abs() < 300);
        assert!((up.output1.lane(0) - l1 as i32).abs() < 300);
        assert_eq!(up.output0.lane(3), 0x7800);
    }

    #[test]
    fn test_hdr_rgb_direct_roundtrip() {
        use crate::image::float_to_lns;
        let c0 = Vec4::new(float_to_lns(1.0), float_to_lns(2.0), float_to_lns(3.0), 65535.0);
        let c1 = Vec4::new(
            float_to_lns(100.0),
            float_to_lns(200.0),
            float_to_lns(300.0),
            65535.0,
        );
        let mut out = [0u8; 8];
        let fmt = pack_color_endpoints(
            c0,
            c1,
            Vec4::zero(),
            Vec4::zero(),
            EndpointFormat::HdrRgb,
            &mut out,
            Quant::Q256,
        );
        assert_eq!(fmt, EndpointFormat::HdrRgb);
        let up = unpack_color_endpoints(Profile::Hdr, fmt, Quant::Q256, &out);
        assert!(!up.error);
        for i in 0..2 {
            assert!((up.output0.lane(i) - c0.lane(i) as i32).abs() < 300, "lane {}", i);
            assert!((up.output1.lane(i) - c1.lane(i) as i32).abs() < 300, "lane {}", i);
        }
        // Blue carries 7 bits
        assert!((up.output0.lane(2) - c0.lane(2) as i32).abs() < 600);
    }

    #[test]
    fn test_hdr_format_errors_in_ldr_profile() {
        let mut out = [0u8; 8];
        pack_color_endpoints(
            Vec4::splat(1000.0),
            Vec4::splat(2000.0),
            Vec4::zero(),
            Vec4::zero(),
            EndpointFormat::HdrLuminanceLargeRange,
            &mut out,
            Quant::Q256,
        );
        let up = unpack_color_endpoints(
            Profile::Ldr,
            EndpointFormat::HdrLuminanceLargeRange,
            Quant::Q256,
            &out,
        );
        assert!(up.error);
    }

    #[test]
    fn test_format_integer_counts() {
        assert_eq!(EndpointFormat::Luminance.integer_count(), 2);
        assert_eq!(EndpointFormat::LuminanceAlpha.integer_count(), 4);
        assert_eq!(EndpointFormat::Rgb.integer_count(), 6);
        assert_eq!(EndpointFormat::HdrRgba.integer_count(), 8);
    }
}
