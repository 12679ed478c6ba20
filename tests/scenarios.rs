//! End-to-end encoding scenarios over known block content.

mod common;

use astc_codec::color::EndpointFormat;
use astc_codec::symbolic::BlockType;
use astc_codec::{
    decompress_symbolic_block, physical_to_symbolic, Profile, BLOCK_BAD_BLOCK_MODE,
};
use common::*;

#[test]
fn all_white_block_is_void_extent_unorm16() {
    let ctx = ldr_context(4, 4);
    let bsd = ctx.block_size_descriptor();
    let pixels = vec![255u8; 64];
    let blk = block_from_rgba8(bsd, Profile::Ldr, 4, 4, &pixels);

    let (scb, pcb) = compress_one(&ctx, &blk);
    assert_eq!(scb.block_type, BlockType::ConstU16);
    assert_eq!(scb.constant_color, [0xFFFF, 0xFFFF, 0xFFFF, 0xFFFF]);
    // Void extent marker in the low bits of the first byte
    assert_eq!(pcb[0] & 0xFF, 0xFC);

    let dec = decompress_symbolic_block(Profile::Ldr, bsd, 0, 0, 0, &scb);
    for t in 0..16 {
        assert_eq!(dec.data_r[t], 65535.0);
        assert_eq!(dec.data_a[t], 65535.0);
    }
}

#[test]
fn all_black_block_is_void_extent_with_opaque_alpha() {
    let ctx = ldr_context(4, 4);
    let bsd = ctx.block_size_descriptor();
    let pixels: Vec<u8> = (0..16).flat_map(|_| [0, 0, 0, 255]).collect();
    let blk = block_from_rgba8(bsd, Profile::Ldr, 4, 4, &pixels);

    let (scb, pcb) = compress_one(&ctx, &blk);
    assert_eq!(scb.block_type, BlockType::ConstU16);
    assert_eq!(scb.constant_color, [0, 0, 0, 0xFFFF]);
    assert_eq!(pcb[0] & 0xFF, 0xFC);
}

#[test]
fn half_black_half_white_split() {
    let ctx = ldr_context(4, 4);
    let bsd = ctx.block_size_descriptor();

    // Top half black, bottom half white
    let pixels: Vec<u8> = (0..16)
        .flat_map(|i| {
            let v = if i < 8 { 0u8 } else { 255 };
            [v, v, v, 255]
        })
        .collect();
    let blk = block_from_rgba8(bsd, Profile::Ldr, 4, 4, &pixels);

    let (scb, pcb) = compress_one(&ctx, &blk);
    assert_eq!(scb.block_type, BlockType::NonConst);

    // The packed block mode field is one of the enabled modes
    let back = physical_to_symbolic(bsd, &pcb);
    assert_ne!(
        bsd.block_mode_packed_index[back.block_mode as usize],
        BLOCK_BAD_BLOCK_MODE
    );

    // A greyscale step fits a single partition with a luminance format
    if scb.partition_count == 1 {
        assert!(
            matches!(
                scb.color_formats[0],
                EndpointFormat::Luminance | EndpointFormat::LuminanceDelta
            ),
            "got {:?}",
            scb.color_formats[0]
        );
    }

    let dec = decompress_symbolic_block(Profile::Ldr, bsd, 0, 0, 0, &scb);
    assert!(
        max_channel_error(&blk, &dec, 16) < 1e-3,
        "error {}",
        max_channel_error(&blk, &dec, 16)
    );
}

#[test]
fn red_blue_stripes_6x6() {
    let ctx = ldr_context(6, 6);
    let bsd = ctx.block_size_descriptor();

    // Vertical stripes alternating every 3 columns
    let mut pixels = Vec::with_capacity(6 * 6 * 4);
    for _y in 0..6 {
        for x in 0..6 {
            if (x / 3) % 2 == 0 {
                pixels.extend_from_slice(&[255, 0, 0, 255]);
            } else {
                pixels.extend_from_slice(&[0, 0, 255, 255]);
            }
        }
    }
    let blk = block_from_rgba8(bsd, Profile::Ldr, 6, 6, &pixels);

    let (scb, _pcb) = compress_one(&ctx, &blk);
    assert_eq!(scb.block_type, BlockType::NonConst);

    let dec = decompress_symbolic_block(Profile::Ldr, bsd, 0, 0, 0, &scb);
    assert!(
        max_channel_error(&blk, &dec, 36) < 0.02,
        "error {}",
        max_channel_error(&blk, &dec, 36)
    );

    // Decoded stripes keep their hues: red texels stay red-dominant
    for t in 0..36 {
        let is_red = (t % 6) / 3 == 0;
        if is_red {
            assert!(dec.data_r[t] > dec.data_b[t], "texel {}", t);
        } else {
            assert!(dec.data_b[t] > dec.data_r[t], "texel {}", t);
        }
    }

    // When the encoder picks two partitions, the chosen seed's coverage
    // must separate the stripes
    if scb.partition_count == 2 {
        let pi = bsd.get_partition_info(2, scb.partition_index as usize);
        let p0 = pi.partition_of_texel[0];
        for t in 0..36 {
            let is_red = (t % 6) / 3 == 0;
            let same_as_first = pi.partition_of_texel[t] == p0;
            assert_eq!(is_red, same_as_first, "texel {}", t);
        }
    }
}

#[test]
fn hdr_spike_block() {
    let mut config = astc_codec::Config::new_medium(Profile::Hdr, 4, 4, 1);
    config.decompress_only = true;
    config.mode_cutoff = 1.0;
    let ctx = astc_codec::Context::new(config).unwrap();
    let bsd = ctx.block_size_descriptor();

    let mut pixels = vec![1.0f32; 64];
    pixels[0] = 1.0e4;
    pixels[1] = 1.0e4;
    pixels[2] = 1.0e4;
    let blk = block_from_rgba_f32(bsd, Profile::Hdr, 4, 4, &pixels);

    let (scb, _pcb) = compress_one(&ctx, &blk);
    assert_eq!(scb.block_type, BlockType::NonConst);
    assert!(
        scb.color_formats[0].is_hdr(),
        "got {:?}",
        scb.color_formats[0]
    );

    let dec = decompress_symbolic_block(Profile::Hdr, bsd, 0, 0, 0, &scb);

    // No NaN anywhere, and the spike survives within a few percent
    for t in 0..16 {
        assert!(dec.data_r[t].is_finite());
    }
    let spike = half::f16::from_bits(astc_codec::image::lns_to_sf16(dec.data_r[0] as u16)).to_f32();
    let rel = (spike - 1.0e4).abs() / 1.0e4;
    assert!(rel < 0.05, "spike decoded as {} ({}%)", spike, rel * 100.0);
}

#[test]
fn reserved_mode_decodes_to_magenta() {
    let ctx = ldr_context(4, 4);
    let bsd = ctx.block_size_descriptor();

    // Raw mode 0 is reserved
    let pcb = [0u8; 16];
    let scb = physical_to_symbolic(bsd, &pcb);
    assert_eq!(scb.block_type, BlockType::Error);

    let dec = decompress_symbolic_block(Profile::Ldr, bsd, 0, 0, 0, &scb);
    for t in 0..16 {
        assert_eq!(dec.data_r[t], 65535.0);
        assert_eq!(dec.data_g[t], 0.0);
        assert_eq!(dec.data_b[t], 65535.0);
        assert_eq!(dec.data_a[t], 65535.0);
    }
}

#[test]
fn rgbm_rejects_zero_m_encodings() {
    let mut config = astc_codec::Config::new_medium(Profile::Ldr, 4, 4, 1);
    config.rgbm_m_scale = 5.0;
    config.decompress_only = true;
    config.mode_cutoff = 1.0;
    let ctx = astc_codec::Context::new(config).unwrap();
    let bsd = ctx.block_size_descriptor();

    // M (alpha) varies but never reaches zero in the source
    let pixels: Vec<u8> = (0..16u32)
        .flat_map(|i| [(i * 16) as u8, 128, 64, (40 + i * 10) as u8])
        .collect();
    let blk = block_from_rgba8(bsd, Profile::Ldr, 4, 4, &pixels);
    let (scb, _) = compress_one(&ctx, &blk);

    let dec = decompress_symbolic_block(Profile::Ldr, bsd, 0, 0, 0, &scb);
    for t in 0..16 {
        assert!(dec.data_a[t] > 0.0, "texel {} decoded M of zero", t);
    }
}
