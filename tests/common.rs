#![allow(dead_code)]

use astc_codec::image::{fetch_image_block, AstcImage, ImageData, Swizzle};
use astc_codec::{
    BlockSizeDescriptor, CompressionWorkingBuffers, Config, Context, ImageBlock, Profile,
};

/// A decode-capable 4x4 LDR descriptor.
pub fn bsd_4x4() -> Box<BlockSizeDescriptor> {
    BlockSizeDescriptor::new(4, 4, 1, false, 1.0).unwrap()
}

pub fn ldr_context(block_x: u32, block_y: u32) -> Context {
    let mut config = Config::new_medium(Profile::Ldr, block_x, block_y, 1);
    // Decode-capable contexts keep every legal mode
    config.decompress_only = true;
    config.mode_cutoff = 1.0;
    Context::new(config).unwrap()
}

/// Fetch an RGBA8 pixel buffer as one image block.
pub fn block_from_rgba8(
    bsd: &BlockSizeDescriptor,
    profile: Profile,
    width: u32,
    height: u32,
    pixels: &[u8],
) -> ImageBlock {
    assert_eq!(pixels.len(), (width * height * 4) as usize);
    let img = AstcImage {
        width,
        height,
        depth: 1,
        data: ImageData::Unorm8(pixels),
    };
    fetch_image_block(profile, &img, bsd, 0, 0, 0, Swizzle::RGBA)
}

/// Fetch an RGBA fp32 pixel buffer as one image block.
pub fn block_from_rgba_f32(
    bsd: &BlockSizeDescriptor,
    profile: Profile,
    width: u32,
    height: u32,
    pixels: &[f32],
) -> ImageBlock {
    assert_eq!(pixels.len(), (width * height * 4) as usize);
    let img = AstcImage {
        width,
        height,
        depth: 1,
        data: ImageData::F32(pixels),
    };
    fetch_image_block(profile, &img, bsd, 0, 0, 0, Swizzle::RGBA)
}

pub fn compress_one(
    ctx: &Context,
    blk: &ImageBlock,
) -> (astc_codec::SymbolicBlock, astc_codec::PhysicalBlock) {
    let mut tmpbuf = CompressionWorkingBuffers::new();
    ctx.compress_block(blk, &mut tmpbuf)
}

/// Peak error between two blocks over the first `texel_count` texels, in
/// the linear [0, 1] domain.
pub fn max_channel_error(a: &ImageBlock, b: &ImageBlock, texel_count: usize) -> f32 {
    let mut max = 0.0f32;
    for t in 0..texel_count {
        let da = a.texel(t) - b.texel(t);
        max = max.max(da.abs().hmax() / 65535.0);
    }
    max
}
