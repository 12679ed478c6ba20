//! Image block load/store and per-block error weighting.
//!
//! Block texel data lives in a scaled float domain [0, 65535]: LDR values
//! are direct UNORM16, HDR values are LNS encoded. The error weight block
//! carries a per-texel, per-component multiplier plus cheap pre-averaged
//! aggregates for every channel subset, so projections that exclude
//! channels don't have to re-reduce the weight vector in their hot loops.

use half::f16;

use crate::block_size::BlockSizeDescriptor;
use crate::vecmath::Vec4;
use crate::{Config, Profile, BLOCK_MAX_TEXELS};

/// A component swizzle selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Swz {
    R,
    G,
    B,
    A,
    Zero,
    One,
    /// Reconstruct Z from X and Y, for two component normal maps.
    Z,
}

#[derive(Clone, Copy, Debug)]
pub struct Swizzle {
    pub r: Swz,
    pub g: Swz,
    pub b: Swz,
    pub a: Swz,
}

impl Swizzle {
    pub const RGBA: Swizzle = Swizzle {
        r: Swz::R,
        g: Swz::G,
        b: Swz::B,
        a: Swz::A,
    };
}

/// Interleaved RGBA image storage in one of the supported component types.
pub enum ImageData<'a> {
    Unorm8(&'a [u8]),
    Unorm16(&'a [u16]),
    F16(&'a [u16]),
    F32(&'a [f32]),
}

/// An input or output image surface.
pub struct AstcImage<'a> {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub data: ImageData<'a>,
}

/// Mutable output surface for decompression.
pub enum ImageDataMut<'a> {
    Unorm8(&'a mut [u8]),
    Unorm16(&'a mut [u16]),
    F16(&'a mut [u16]),
    F32(&'a mut [f32]),
}

pub struct AstcImageMut<'a> {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub data: ImageDataMut<'a>,
}

/// The image data for a single block, in the scaled float domain.
#[derive(Clone)]
pub struct ImageBlock {
    pub data_r: [f32; BLOCK_MAX_TEXELS],
    pub data_g: [f32; BLOCK_MAX_TEXELS],
    pub data_b: [f32; BLOCK_MAX_TEXELS],
    pub data_a: [f32; BLOCK_MAX_TEXELS],

    /// The original color of texel 0, for constant color encoding.
    pub origin_texel: Vec4,
    pub data_min: Vec4,
    pub data_max: Vec4,
    /// R == G == B for every texel.
    pub grayscale: bool,

    /// Per texel HDR flags; only meaningful during decompression.
    pub rgb_lns: [u8; BLOCK_MAX_TEXELS],
    pub alpha_lns: [u8; BLOCK_MAX_TEXELS],

    pub xpos: u32,
    pub ypos: u32,
    pub zpos: u32,
    pub texel_count: usize,
}

impl Default for ImageBlock {
    fn default() -> Self {
        Self {
            data_r: [0.0; BLOCK_MAX_TEXELS],
            data_g: [0.0; BLOCK_MAX_TEXELS],
            data_b: [0.0; BLOCK_MAX_TEXELS],
            data_a: [0.0; BLOCK_MAX_TEXELS],
            origin_texel: Vec4::zero(),
            data_min: Vec4::zero(),
            data_max: Vec4::zero(),
            grayscale: false,
            rgb_lns: [0; BLOCK_MAX_TEXELS],
            alpha_lns: [0; BLOCK_MAX_TEXELS],
            xpos: 0,
            ypos: 0,
            zpos: 0,
            texel_count: 0,
        }
    }
}

impl ImageBlock {
    pub fn texel(&self, index: usize) -> Vec4 {
        Vec4::new(
            self.data_r[index],
            self.data_g[index],
            self.data_b[index],
            self.data_a[index],
        )
    }

    pub fn set_texel(&mut self, index: usize, v: Vec4) {
        self.data_r[index] = v.lane(0);
        self.data_g[index] = v.lane(1);
        self.data_b[index] = v.lane(2);
        self.data_a[index] = v.lane(3);
    }

    /// The default alpha for endpoint formats that don't store it, in the
    /// scaled domain; depends on whether alpha is LDR or HDR.
    pub fn get_default_alpha(&self) -> f32 {
        if self.alpha_lns[0] != 0 {
            0x7800 as f32
        } else {
            0xFFFF as f32
        }
    }

    /// True if one color channel is constant across the block. Constant
    /// channels interpolate to themselves for any weight, so they can be
    /// ignored for weight selection and plane-2 assignment.
    pub fn is_constant_channel(&self, channel: usize) -> bool {
        self.data_min.lane(channel) == self.data_max.lane(channel)
    }

    pub fn is_luminance(&self) -> bool {
        let default_alpha = self.get_default_alpha();
        let alpha1 = self.data_min.lane(3) == default_alpha && self.data_max.lane(3) == default_alpha;
        self.grayscale && alpha1
    }

    pub fn is_luminancealpha(&self) -> bool {
        let default_alpha = self.get_default_alpha();
        let alpha1 = self.data_min.lane(3) == default_alpha && self.data_max.lane(3) == default_alpha;
        self.grayscale && !alpha1
    }

    fn finalize_ranges(&mut self) {
        let mut min = Vec4::splat(f32::MAX);
        let mut max = Vec4::splat(-f32::MAX);
        let mut grayscale = true;
        for i in 0..self.texel_count {
            let t = self.texel(i);
            min = min.min(t);
            max = max.max(t);
            grayscale &= t.lane(0) == t.lane(1) && t.lane(1) == t.lane(2);
        }
        self.data_min = min;
        self.data_max = max;
        self.grayscale = grayscale;
    }
}

/// Encode a linear float value into the 16-bit LNS domain used by the HDR
/// path.
pub fn float_to_lns(p: f32) -> f32 {
    if p.is_nan() || p <= 1.0 / 67108864.0 {
        return 0.0;
    }
    if p >= 65536.0 {
        return 65535.0;
    }

    // frexp: p = frac * 2^expo with frac in [0.5, 1)
    let mut expo = p.abs().log2().floor() as i32 + 1;
    let mut p1;
    if expo < -13 {
        p1 = p * 33554432.0;
        expo = 0;
    } else {
        let frac = p / (expo as f32).exp2();
        p1 = (frac - 0.5) * 4096.0;
        expo += 14;
    }

    if p1 < 384.0 {
        p1 *= 4.0 / 3.0;
    } else if p1 <= 1408.0 {
        p1 += 128.0;
    } else {
        p1 = (p1 + 512.0) * (4.0 / 5.0);
    }

    p1 + expo as f32 * 2048.0
}

/// Convert a 16-bit LNS value to the bit pattern of an fp16.
pub fn lns_to_sf16(p: u16) -> u16 {
    let mc = p & 0x7FF;
    let ec = p >> 11;
    let mt = if mc < 512 {
        3 * mc
    } else if mc < 1536 {
        4 * mc - 512
    } else {
        5 * mc - 2048
    };
    let res = (ec << 10) | (mt >> 3);
    res.min(0x7BFF)
}

/// Convert a UNORM16 value to the nearest fp16 bit pattern.
pub fn unorm16_to_sf16(p: u16) -> u16 {
    f16::from_f32(p as f32 * (1.0 / 65535.0)).to_bits()
}

fn fetch_raw(img: &AstcImage, index: usize, channel: usize) -> f32 {
    match &img.data {
        ImageData::Unorm8(d) => d[4 * index + channel] as f32 / 255.0,
        ImageData::Unorm16(d) => d[4 * index + channel] as f32 / 65535.0,
        ImageData::F16(d) => f16::from_bits(d[4 * index + channel]).to_f32(),
        ImageData::F32(d) => d[4 * index + channel],
    }
}

fn apply_swz(rgba: [f32; 4], swz: Swz) -> f32 {
    match swz {
        Swz::R => rgba[0],
        Swz::G => rgba[1],
        Swz::B => rgba[2],
        Swz::A => rgba[3],
        Swz::Zero => 0.0,
        Swz::One => 1.0,
        Swz::Z => {
            let x = rgba[0] * 2.0 - 1.0;
            let y = rgba[3] * 2.0 - 1.0;
            let z = 1.0 - x * x - y * y;
            (z.max(0.0).sqrt() * 0.5 + 0.5).clamp(0.0, 1.0)
        }
    }
}

/// Fetch a single image block, clamping coordinates at the image edge.
pub fn fetch_image_block(
    profile: Profile,
    img: &AstcImage,
    bsd: &BlockSizeDescriptor,
    xpos: u32,
    ypos: u32,
    zpos: u32,
    swz: Swizzle,
) -> ImageBlock {
    let mut blk = ImageBlock {
        xpos,
        ypos,
        zpos,
        texel_count: bsd.texel_count as usize,
        ..ImageBlock::default()
    };

    let hdr = matches!(profile, Profile::HdrRgbLdrA | Profile::Hdr);
    let hdr_alpha = matches!(profile, Profile::Hdr);

    let mut idx = 0;
    for z in 0..bsd.zdim as u32 {
        for y in 0..bsd.ydim as u32 {
            for x in 0..bsd.xdim as u32 {
                let sx = (xpos + x).min(img.width - 1);
                let sy = (ypos + y).min(img.height - 1);
                let sz = (zpos + z).min(img.depth - 1);
                let src = ((sz * img.height + sy) * img.width + sx) as usize;

                let raw = [
                    fetch_raw(img, src, 0),
                    fetch_raw(img, src, 1),
                    fetch_raw(img, src, 2),
                    fetch_raw(img, src, 3),
                ];
                let r = apply_swz(raw, swz.r);
                let g = apply_swz(raw, swz.g);
                let b = apply_swz(raw, swz.b);
                let a = apply_swz(raw, swz.a);

                if idx == 0 {
                    blk.origin_texel = Vec4::new(r, g, b, a);
                }

                if hdr {
                    blk.data_r[idx] = float_to_lns(r);
                    blk.data_g[idx] = float_to_lns(g);
                    blk.data_b[idx] = float_to_lns(b);
                    blk.rgb_lns[idx] = 1;
                } else {
                    blk.data_r[idx] = r.clamp(0.0, 1.0) * 65535.0;
                    blk.data_g[idx] = g.clamp(0.0, 1.0) * 65535.0;
                    blk.data_b[idx] = b.clamp(0.0, 1.0) * 65535.0;
                }

                if hdr_alpha {
                    blk.data_a[idx] = float_to_lns(a);
                    blk.alpha_lns[idx] = 1;
                } else {
                    blk.data_a[idx] = a.clamp(0.0, 1.0) * 65535.0;
                }

                idx += 1;
            }
        }
    }

    blk.finalize_ranges();
    blk
}

/// Write a decompressed image block back to an output surface.
pub fn write_image_block(
    img: &mut AstcImageMut,
    blk: &ImageBlock,
    bsd: &BlockSizeDescriptor,
    xpos: u32,
    ypos: u32,
    zpos: u32,
    swz: Swizzle,
) {
    let mut idx = 0;
    for z in 0..bsd.zdim as u32 {
        for y in 0..bsd.ydim as u32 {
            for x in 0..bsd.xdim as u32 {
                let dx = xpos + x;
                let dy = ypos + y;
                let dz = zpos + z;
                if dx >= img.width || dy >= img.height || dz >= img.depth {
                    idx += 1;
                    continue;
                }
                let dst = ((dz * img.height + dy) * img.width + dx) as usize;

                // Back to linear floats
                let unscale = |v: f32, lns: bool| -> f32 {
                    if lns {
                        f16::from_bits(lns_to_sf16(v as u16)).to_f32()
                    } else {
                        v / 65535.0
                    }
                };
                let rgba = [
                    unscale(blk.data_r[idx], blk.rgb_lns[idx] != 0),
                    unscale(blk.data_g[idx], blk.rgb_lns[idx] != 0),
                    unscale(blk.data_b[idx], blk.rgb_lns[idx] != 0),
                    unscale(blk.data_a[idx], blk.alpha_lns[idx] != 0),
                ];
                let out = [
                    apply_swz(rgba, swz.r),
                    apply_swz(rgba, swz.g),
                    apply_swz(rgba, swz.b),
                    apply_swz(rgba, swz.a),
                ];

                match &mut img.data {
                    ImageDataMut::Unorm8(d) => {
                        for (c, &v) in out.iter().enumerate() {
                            d[4 * dst + c] = (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
                        }
                    }
                    ImageDataMut::Unorm16(d) => {
                        for (c, &v) in out.iter().enumerate() {
                            d[4 * dst + c] = (v.clamp(0.0, 1.0) * 65535.0 + 0.5) as u16;
                        }
                    }
                    ImageDataMut::F16(d) => {
                        for (c, &v) in out.iter().enumerate() {
                            d[4 * dst + c] = f16::from_f32(v).to_bits();
                        }
                    }
                    ImageDataMut::F32(d) => {
                        for (c, &v) in out.iter().enumerate() {
                            d[4 * dst + c] = v;
                        }
                    }
                }
                idx += 1;
            }
        }
    }
}

/// Per-texel, per-component error weights plus subset aggregates.
#[derive(Clone)]
pub struct ErrorWeightBlock {
    pub error_weights: [Vec4; BLOCK_MAX_TEXELS],

    pub block_error_weighted_rgba_sum: Vec4,
    pub block_error_weight_sum: Vec4,

    pub texel_weight: [f32; BLOCK_MAX_TEXELS],

    pub texel_weight_gba: [f32; BLOCK_MAX_TEXELS],
    pub texel_weight_rba: [f32; BLOCK_MAX_TEXELS],
    pub texel_weight_rga: [f32; BLOCK_MAX_TEXELS],
    pub texel_weight_rgb: [f32; BLOCK_MAX_TEXELS],

    pub texel_weight_rg: [f32; BLOCK_MAX_TEXELS],
    pub texel_weight_rb: [f32; BLOCK_MAX_TEXELS],
    pub texel_weight_gb: [f32; BLOCK_MAX_TEXELS],

    pub texel_weight_r: [f32; BLOCK_MAX_TEXELS],
    pub texel_weight_g: [f32; BLOCK_MAX_TEXELS],
    pub texel_weight_b: [f32; BLOCK_MAX_TEXELS],
    pub texel_weight_a: [f32; BLOCK_MAX_TEXELS],
}

impl Default for ErrorWeightBlock {
    fn default() -> Self {
        Self {
            error_weights: [Vec4::zero(); BLOCK_MAX_TEXELS],
            block_error_weighted_rgba_sum: Vec4::zero(),
            block_error_weight_sum: Vec4::zero(),
            texel_weight: [0.0; BLOCK_MAX_TEXELS],
            texel_weight_gba: [0.0; BLOCK_MAX_TEXELS],
            texel_weight_rba: [0.0; BLOCK_MAX_TEXELS],
            texel_weight_rga: [0.0; BLOCK_MAX_TEXELS],
            texel_weight_rgb: [0.0; BLOCK_MAX_TEXELS],
            texel_weight_rg: [0.0; BLOCK_MAX_TEXELS],
            texel_weight_rb: [0.0; BLOCK_MAX_TEXELS],
            texel_weight_gb: [0.0; BLOCK_MAX_TEXELS],
            texel_weight_r: [0.0; BLOCK_MAX_TEXELS],
            texel_weight_g: [0.0; BLOCK_MAX_TEXELS],
            texel_weight_b: [0.0; BLOCK_MAX_TEXELS],
            texel_weight_a: [0.0; BLOCK_MAX_TEXELS],
        }
    }
}

impl ErrorWeightBlock {
    /// The subset aggregate excluding one component, used by plane-1
    /// projections in dual plane mode.
    pub fn texel_weight_excl(&self, omitted_component: usize) -> &[f32; BLOCK_MAX_TEXELS] {
        match omitted_component {
            0 => &self.texel_weight_gba,
            1 => &self.texel_weight_rba,
            2 => &self.texel_weight_rga,
            _ => &self.texel_weight_rgb,
        }
    }

    /// The single-component aggregate, used by plane-2 projections.
    pub fn texel_weight_comp(&self, component: usize) -> &[f32; BLOCK_MAX_TEXELS] {
        match component {
            0 => &self.texel_weight_r,
            1 => &self.texel_weight_g,
            2 => &self.texel_weight_b,
            _ => &self.texel_weight_a,
        }
    }

    /// The two-component aggregate, used by two channel analysis.
    pub fn texel_weight_pair(&self, c1: usize, c2: usize) -> &[f32; BLOCK_MAX_TEXELS] {
        match (c1.min(c2), c1.max(c2)) {
            (0, 1) => &self.texel_weight_rg,
            (0, 2) => &self.texel_weight_rb,
            (1, 2) => &self.texel_weight_gb,
            _ => &self.texel_weight,
        }
    }
}

/// Build the error weight block for one image block from the config's
/// per-channel weights. RGBM mode amplifies the M channel since any error
/// there multiplies through the whole texel on decode.
pub fn compute_error_weight_block(
    config: &Config,
    blk: &ImageBlock,
) -> Box<ErrorWeightBlock> {
    let mut ewb = Box::<ErrorWeightBlock>::default();

    let base = Vec4::new(
        config.cw_r_weight,
        config.cw_g_weight,
        config.cw_b_weight,
        config.cw_a_weight,
    );

    for i in 0..blk.texel_count {
        let mut ew = base;
        if config.rgbm_m_scale > 0.0 {
            let m = (blk.data_a[i] / 65535.0 * config.rgbm_m_scale).max(1.0);
            ew[3] *= m * m;
        }

        ewb.error_weights[i] = ew;
        ewb.block_error_weight_sum += ew;
        ewb.block_error_weighted_rgba_sum += ew * blk.texel(i);

        let [r, g, b, a] = ew.0;
        ewb.texel_weight[i] = (r + g + b + a) * 0.25;
        ewb.texel_weight_gba[i] = (g + b + a) * (1.0 / 3.0);
        ewb.texel_weight_rba[i] = (r + b + a) * (1.0 / 3.0);
        ewb.texel_weight_rga[i] = (r + g + a) * (1.0 / 3.0);
        ewb.texel_weight_rgb[i] = (r + g + b) * (1.0 / 3.0);
        ewb.texel_weight_rg[i] = (r + g) * 0.5;
        ewb.texel_weight_rb[i] = (r + b) * 0.5;
        ewb.texel_weight_gb[i] = (g + b) * 0.5;
        ewb.texel_weight_r[i] = r;
        ewb.texel_weight_g[i] = g;
        ewb.texel_weight_b[i] = b;
        ewb.texel_weight_a[i] = a;
    }

    ewb
}
