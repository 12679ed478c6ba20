//! Symbolic block decompression.
//!
//! Reverses the symbolic encoding into an image block in the scaled float
//! domain: weights unquantize and infill bilinearly over the texel grid,
//! endpoints unpack to 16 bits and interpolate per texel. Error blocks
//! paint the profile's sentinel color.

use crate::block_size::{BlockSizeDescriptor, DecimationInfo};
use crate::color::unpack_color_endpoints;
use crate::image::{float_to_lns, ImageBlock};
use crate::quant::{Quant, QUANT_AND_XFER_TABLES};
use crate::symbolic::{BlockType, SymbolicBlock};
use crate::{Profile, BLOCK_MAX_TEXELS, WEIGHTS_PLANE2_OFFSET};

/// Unquantize and infill a symbolic block's weight grids.
///
/// Plane 2 output is only meaningful for dual plane blocks.
pub fn unpack_weights(
    scb: &SymbolicBlock,
    di: &DecimationInfo,
    is_dual_plane: bool,
    quant: Quant,
    weights_plane1: &mut [i32; BLOCK_MAX_TEXELS],
    weights_plane2: &mut [i32; BLOCK_MAX_TEXELS],
) {
    let qat = &QUANT_AND_XFER_TABLES[quant.index()];

    let mut dec1 = [0i32; crate::BLOCK_MAX_WEIGHTS];
    for w in 0..di.weight_count {
        dec1[w] = qat.unquantized_value[scb.weights[w] as usize] as i32;
    }
    for t in 0..di.texel_count {
        weights_plane1[t] = di.bilinear_infill_int(&dec1, t);
    }

    if is_dual_plane {
        let mut dec2 = [0i32; crate::BLOCK_MAX_WEIGHTS];
        for w in 0..di.weight_count {
            dec2[w] = qat.unquantized_value[scb.weights[w + WEIGHTS_PLANE2_OFFSET] as usize] as i32;
        }
        for t in 0..di.texel_count {
            weights_plane2[t] = di.bilinear_infill_int(&dec2, t);
        }
    }
}

fn paint_error_block(profile: Profile, blk: &mut ImageBlock) {
    let hdr = matches!(profile, Profile::HdrRgbLdrA | Profile::Hdr);
    for t in 0..blk.texel_count {
        if hdr {
            blk.data_r[t] = f32::NAN;
            blk.data_g[t] = f32::NAN;
            blk.data_b[t] = f32::NAN;
            blk.data_a[t] = f32::NAN;
        } else {
            // LDR error sentinel: magenta
            blk.data_r[t] = 65535.0;
            blk.data_g[t] = 0.0;
            blk.data_b[t] = 65535.0;
            blk.data_a[t] = 65535.0;
        }
        blk.rgb_lns[t] = 0;
        blk.alpha_lns[t] = 0;
    }
}

/// Decompress one symbolic block into an image block.
pub fn decompress_symbolic_block(
    profile: Profile,
    bsd: &BlockSizeDescriptor,
    xpos: u32,
    ypos: u32,
    zpos: u32,
    scb: &SymbolicBlock,
) -> ImageBlock {
    let mut blk = ImageBlock {
        xpos,
        ypos,
        zpos,
        texel_count: bsd.texel_count as usize,
        ..ImageBlock::default()
    };

    match scb.block_type {
        BlockType::Error => {
            paint_error_block(profile, &mut blk);
            return blk;
        }
        BlockType::ConstU16 => {
            for t in 0..blk.texel_count {
                blk.data_r[t] = scb.constant_color[0] as f32;
                blk.data_g[t] = scb.constant_color[1] as f32;
                blk.data_b[t] = scb.constant_color[2] as f32;
                blk.data_a[t] = scb.constant_color[3] as f32;
            }
            let v = blk.texel(0);
            blk.data_min = v;
            blk.data_max = v;
            blk.grayscale = v.lane(0) == v.lane(1) && v.lane(1) == v.lane(2);
            blk.origin_texel = v / 65535.0;
            return blk;
        }
        BlockType::ConstF16 => {
            // FP16 constants are only meaningful in HDR profiles
            if matches!(profile, Profile::Ldr | Profile::LdrSrgb) {
                paint_error_block(profile, &mut blk);
                return blk;
            }
            for t in 0..blk.texel_count {
                let to_lns = |bits: i32| {
                    float_to_lns(half::f16::from_bits(bits as u16).to_f32())
                };
                blk.data_r[t] = to_lns(scb.constant_color[0]);
                blk.data_g[t] = to_lns(scb.constant_color[1]);
                blk.data_b[t] = to_lns(scb.constant_color[2]);
                blk.data_a[t] = to_lns(scb.constant_color[3]);
                blk.rgb_lns[t] = 1;
                blk.alpha_lns[t] = 1;
            }
            let v = blk.texel(0);
            blk.data_min = v;
            blk.data_max = v;
            let raw = |bits: i32| half::f16::from_bits(bits as u16).to_f32();
            blk.origin_texel = crate::vecmath::Vec4::new(
                raw(scb.constant_color[0]),
                raw(scb.constant_color[1]),
                raw(scb.constant_color[2]),
                raw(scb.constant_color[3]),
            );
            return blk;
        }
        BlockType::NonConst => {}
    }

    let bm = match bsd.get_block_mode(scb.block_mode) {
        Some(bm) => bm,
        None => {
            paint_error_block(profile, &mut blk);
            return blk;
        }
    };
    let di = bsd.get_decimation_info(bm.decimation_mode as usize);

    let mut weights_plane1 = [0i32; BLOCK_MAX_TEXELS];
    let mut weights_plane2 = [0i32; BLOCK_MAX_TEXELS];
    unpack_weights(
        scb,
        di,
        bm.is_dual_plane,
        bm.quant_mode,
        &mut weights_plane1,
        &mut weights_plane2,
    );

    let partition_count = scb.partition_count as usize;
    let pi = bsd.get_partition_info(partition_count, scb.partition_index as usize);

    // Unpack each partition's endpoint pair
    let mut ep0 = [crate::vecmath::IVec4::splat(0); 4];
    let mut ep1 = [crate::vecmath::IVec4::splat(0); 4];
    let mut rgb_lns = [false; 4];
    let mut alpha_lns = [false; 4];
    for p in 0..partition_count {
        let up = unpack_color_endpoints(
            profile,
            scb.color_formats[p],
            scb.quant_mode,
            &scb.color_values[p],
        );
        if up.error {
            paint_error_block(profile, &mut blk);
            return blk;
        }
        ep0[p] = up.output0;
        ep1[p] = up.output1;
        rgb_lns[p] = up.rgb_hdr;
        alpha_lns[p] = up.alpha_hdr;
    }

    let srgb = profile == Profile::LdrSrgb;
    let plane2_component = scb.plane2_component;

    for t in 0..blk.texel_count {
        let p = pi.partition_of_texel[t] as usize;
        let w1 = weights_plane1[t];

        for ch in 0..4usize {
            let w = if plane2_component == ch as i8 {
                weights_plane2[t]
            } else {
                w1
            };
            let e0 = ep0[p].lane(ch);
            let e1 = ep1[p].lane(ch);
            let mut c = (e0 * (64 - w) + e1 * w + 32) >> 6;

            if srgb && ch < 3 {
                // sRGB keeps the top byte of the interpolant
                c = (c >> 8) * 257;
            }
            match ch {
                0 => blk.data_r[t] = c as f32,
                1 => blk.data_g[t] = c as f32,
                2 => blk.data_b[t] = c as f32,
                _ => blk.data_a[t] = c as f32,
            }
        }

        blk.rgb_lns[t] = rgb_lns[p] as u8;
        blk.alpha_lns[t] = alpha_lns[p] as u8;
    }

    let mut min = crate::vecmath::Vec4::splat(f32::MAX);
    let mut max = crate::vecmath::Vec4::splat(-f32::MAX);
    let mut grayscale = true;
    for t in 0..blk.texel_count {
        let v = blk.texel(t);
        min = min.min(v);
        max = max.max(v);
        grayscale &= v.lane(0) == v.lane(1) && v.lane(1) == v.lane(2);
    }
    blk.data_min = min;
    blk.data_max = max;
    blk.grayscale = grayscale;

    // Raw-domain origin texel, so re-compressing the decoded block works
    let raw = |v: f32, lns: bool| {
        if lns {
            half::f16::from_bits(crate::image::lns_to_sf16(v as u16)).to_f32()
        } else {
            v / 65535.0
        }
    };
    blk.origin_texel = crate::vecmath::Vec4::new(
        raw(blk.data_r[0], blk.rgb_lns[0] != 0),
        raw(blk.data_g[0], blk.rgb_lns[0] != 0),
        raw(blk.data_b[0], blk.rgb_lns[0] != 0),
        raw(blk.data_a[0], blk.alpha_lns[0] != 0),
    );

    blk
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_size::BlockSizeDescriptor;
    use crate::symbolic::SymbolicBlock;

    #[test]
    fn test_error_block_paints_magenta_in_ldr() {
        let bsd = BlockSizeDescriptor::new(4, 4, 1, false, 1.0).unwrap();
        let scb = SymbolicBlock::new_error();
        let blk = decompress_symbolic_block(Profile::Ldr, &bsd, 0, 0, 0, &scb);
        for t in 0..16 {
            assert_eq!(blk.data_r[t], 65535.0);
            assert_eq!(blk.data_g[t], 0.0);
            assert_eq!(blk.data_b[t], 65535.0);
            assert_eq!(blk.data_a[t], 65535.0);
        }
    }

    #[test]
    fn test_error_block_paints_nan_in_hdr() {
        let bsd = BlockSizeDescriptor::new(4, 4, 1, false, 1.0).unwrap();
        let scb = SymbolicBlock::new_error();
        let blk = decompress_symbolic_block(Profile::Hdr, &bsd, 0, 0, 0, &scb);
        for t in 0..16 {
            assert!(blk.data_r[t].is_nan());
        }
    }

    #[test]
    fn test_constant_u16_decodes_exactly() {
        let bsd = BlockSizeDescriptor::new(4, 4, 1, false, 1.0).unwrap();
        let scb = SymbolicBlock::new_constant([0xFFFF, 0, 0x8000, 0xFFFF], false);
        let blk = decompress_symbolic_block(Profile::Ldr, &bsd, 0, 0, 0, &scb);
        for t in 0..16 {
            assert_eq!(blk.data_r[t], 65535.0);
            assert_eq!(blk.data_g[t], 0.0);
            assert_eq!(blk.data_b[t], 32768.0);
            assert_eq!(blk.data_a[t], 65535.0);
        }
    }
}
