//! ASTC texture block encoder and decoder.
//!
//! The core works one 128-bit block at a time: a rate-distortion search
//! over partitionings, endpoint formats, weight-grid decimations and
//! quantization levels on the encode side, and the exact inverse bit
//! transforms on the decode side. Block-shape tables are built once into a
//! [`Context`] and shared read-only across threads; per-thread scratch
//! lives in [`CompressionWorkingBuffers`].

#![warn(clippy::all)]

use thiserror::Error;

pub mod angular;
pub mod bise;
pub mod block_size;
pub mod color;
pub mod compress;
pub mod decompress;
pub mod format_select;
pub mod ideal;
pub mod image;
pub mod parallel;
pub mod partition;
pub mod percentile;
pub mod quant;
pub mod symbolic;
pub mod vecmath;

pub use block_size::{is_legal_2d_block_size, is_legal_3d_block_size, BlockSizeDescriptor};
pub use compress::{compress_block, compute_symbolic_block_difference, CompressionWorkingBuffers};
pub use decompress::decompress_symbolic_block;
pub use image::{
    compute_error_weight_block, fetch_image_block, write_image_block, AstcImage, AstcImageMut,
    ImageBlock, ImageData, ImageDataMut, Swizzle, Swz,
};
pub use parallel::ParallelManager;
pub use symbolic::{physical_to_symbolic, symbolic_to_physical, PhysicalBlock, SymbolicBlock};

/// The maximum number of components a block can support.
pub const BLOCK_MAX_COMPONENTS: usize = 4;

/// The maximum number of partitions a block can support.
pub const BLOCK_MAX_PARTITIONS: usize = 4;

/// The number of partitionings, per partition count, supported by the
/// format.
pub const BLOCK_MAX_PARTITIONINGS: usize = 1024;

/// The maximum number of texels a block can support (6x6x6).
pub const BLOCK_MAX_TEXELS: usize = 216;

/// The maximum number of texels used for partition clustering.
pub const BLOCK_MAX_KMEANS_TEXELS: usize = 64;

/// The maximum number of weights a block can store.
pub const BLOCK_MAX_WEIGHTS: usize = 64;

/// The maximum number of weights per plane in 2 plane mode.
pub const BLOCK_MAX_WEIGHTS_2PLANE: usize = BLOCK_MAX_WEIGHTS / 2;

/// The minimum number of weight bits a candidate encoding must encode.
pub const BLOCK_MIN_WEIGHT_BITS: usize = 24;

/// The maximum number of weight bits a candidate encoding can encode.
pub const BLOCK_MAX_WEIGHT_BITS: usize = 96;

/// The sentinel for an unused entry in the block mode remap table.
pub const BLOCK_BAD_BLOCK_MODE: u16 = 0xFFFF;

/// The number of partition index bits in the encoding.
pub const PARTITION_INDEX_BITS: usize = 10;

/// The offset of plane 2 weights in shared weight arrays.
pub const WEIGHTS_PLANE2_OFFSET: usize = BLOCK_MAX_WEIGHTS_2PLANE;

/// The sum of per-texel quantized weight contributions.
pub const WEIGHTS_TEXEL_SUM: f32 = 16.0;

/// The number of block modes in the format.
pub const WEIGHTS_MAX_BLOCK_MODES: usize = 2048;

/// The number of weight grid decimation modes in the format.
pub const WEIGHTS_MAX_DECIMATION_MODES: usize = 87;

/// The high default error used to initialize error trackers.
pub const ERROR_CALC_DEFAULT: f32 = 1e30;

/// The maximum number of candidate encodings trialled per encoding mode.
pub const TUNE_MAX_TRIAL_CANDIDATES: usize = 4;

/// The decode profile: where HDR endpoint modes are legal and how LDR
/// values expand during interpolation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Profile {
    /// LDR color data with the sRGB transfer function.
    LdrSrgb,
    /// LDR linear color data.
    Ldr,
    /// HDR RGB with LDR alpha.
    HdrRgbLdrA,
    /// HDR RGBA.
    Hdr,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid block size {xdim}x{ydim}x{zdim}")]
    InvalidBlockSize { xdim: u32, ydim: u32, zdim: u32 },
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
    #[error("buffer needs {needed} bytes, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Compressor configuration: block shape, decode profile, channel error
/// weighting and the search effort knobs.
#[derive(Clone, Debug)]
pub struct Config {
    pub profile: Profile,
    pub block_x: u32,
    pub block_y: u32,
    pub block_z: u32,

    /// Partitionings scored per partition count, after duplicate and
    /// degenerate seeds are dropped.
    pub partition_search_limit: usize,
    /// Highest partition count trialled (1 to 4).
    pub partition_count_limit: usize,
    /// Candidate encodings realized per search path, at most 4.
    pub candidate_limit: usize,
    /// Block mode percentile cutoff in [0, 1]; lower prunes harder.
    pub mode_cutoff: f32,
    /// Endpoint refit / weight realign iterations per candidate.
    pub refinement_limit: usize,
    /// Weight grids below this size skip the angular range search.
    pub low_weight_count_limit: usize,
    /// Channel correlation above which dual plane modes are not tried.
    pub p2_correlation_cutoff: f32,

    pub cw_r_weight: f32,
    pub cw_g_weight: f32,
    pub cw_b_weight: f32,
    pub cw_a_weight: f32,

    /// RGBM scale factor; zero disables RGBM mode.
    pub rgbm_m_scale: f32,

    /// Keep every legal block mode decodable instead of pruning to the
    /// percentile cutoff; required for decoding foreign data.
    pub decompress_only: bool,
}

impl Config {
    fn base(profile: Profile, block_x: u32, block_y: u32, block_z: u32) -> Self {
        Self {
            profile,
            block_x,
            block_y,
            block_z,
            partition_search_limit: 16,
            partition_count_limit: 4,
            candidate_limit: 3,
            mode_cutoff: 0.75,
            refinement_limit: 2,
            low_weight_count_limit: 4,
            p2_correlation_cutoff: 0.99,
            cw_r_weight: 1.0,
            cw_g_weight: 1.0,
            cw_b_weight: 1.0,
            cw_a_weight: 1.0,
            rgbm_m_scale: 0.0,
            decompress_only: false,
        }
    }

    /// Fast preset: shallow searches, always-enabled modes dominate.
    pub fn new_fast(profile: Profile, block_x: u32, block_y: u32, block_z: u32) -> Self {
        Self {
            partition_search_limit: 4,
            partition_count_limit: 2,
            candidate_limit: 2,
            mode_cutoff: 0.25,
            refinement_limit: 1,
            ..Self::base(profile, block_x, block_y, block_z)
        }
    }

    /// Balanced preset.
    pub fn new_medium(profile: Profile, block_x: u32, block_y: u32, block_z: u32) -> Self {
        Self::base(profile, block_x, block_y, block_z)
    }

    /// Thorough preset: wide partition search, full mode set.
    pub fn new_thorough(profile: Profile, block_x: u32, block_y: u32, block_z: u32) -> Self {
        Self {
            partition_search_limit: 100,
            partition_count_limit: 4,
            candidate_limit: 4,
            mode_cutoff: 1.0,
            refinement_limit: 4,
            ..Self::base(profile, block_x, block_y, block_z)
        }
    }

    fn validate(&self) -> Result<()> {
        if self.partition_count_limit == 0 || self.partition_count_limit > BLOCK_MAX_PARTITIONS {
            return Err(Error::InvalidConfig("partition count limit out of range"));
        }
        if self.candidate_limit == 0 || self.candidate_limit > TUNE_MAX_TRIAL_CANDIDATES {
            return Err(Error::InvalidConfig("candidate limit out of range"));
        }
        if !(0.0..=1.0).contains(&self.mode_cutoff) {
            return Err(Error::InvalidConfig("mode cutoff out of range"));
        }
        if self.partition_search_limit == 0 {
            return Err(Error::InvalidConfig("partition search limit is zero"));
        }
        let weights = [
            self.cw_r_weight,
            self.cw_g_weight,
            self.cw_b_weight,
            self.cw_a_weight,
        ];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(Error::InvalidConfig("channel weights must be non-negative"));
        }
        Ok(())
    }
}

/// A compression/decompression context for one block shape.
///
/// Creating a context builds the block size descriptor once; the context
/// is then shared read-only by any number of worker threads, each with
/// its own scratch buffers.
pub struct Context {
    config: Config,
    bsd: Box<BlockSizeDescriptor>,
}

// Raw output cursor shared by image compression workers; every task
// writes a disjoint 16 byte slot.
struct OutPtr(*mut u8);
unsafe impl Send for OutPtr {}
unsafe impl Sync for OutPtr {}

impl Context {
    pub fn new(config: Config) -> Result<Context> {
        config.validate()?;
        let can_omit_modes = !config.decompress_only;
        let bsd = BlockSizeDescriptor::new(
            config.block_x,
            config.block_y,
            config.block_z,
            can_omit_modes,
            config.mode_cutoff,
        )?;
        Ok(Context { config, bsd })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn block_size_descriptor(&self) -> &BlockSizeDescriptor {
        &self.bsd
    }

    /// Allocate one worker's scratch buffers.
    pub fn alloc_working_buffers(&self) -> Box<CompressionWorkingBuffers> {
        Box::new(CompressionWorkingBuffers::new())
    }

    /// Compress one fetched image block.
    pub fn compress_block(
        &self,
        blk: &ImageBlock,
        tmpbuf: &mut CompressionWorkingBuffers,
    ) -> (SymbolicBlock, PhysicalBlock) {
        compress_block(&self.config, &self.bsd, blk, tmpbuf)
    }

    /// Decompress one physical block into an image block.
    pub fn decompress_block(
        &self,
        pcb: &PhysicalBlock,
        xpos: u32,
        ypos: u32,
        zpos: u32,
    ) -> ImageBlock {
        let scb = physical_to_symbolic(&self.bsd, pcb);
        decompress_symbolic_block(self.config.profile, &self.bsd, xpos, ypos, zpos, &scb)
    }

    fn block_counts(&self, width: u32, height: u32, depth: u32) -> (u32, u32, u32) {
        (
            (width + self.config.block_x - 1) / self.config.block_x,
            (height + self.config.block_y - 1) / self.config.block_y,
            (depth + self.config.block_z - 1) / self.config.block_z,
        )
    }

    /// Compress a whole image into contiguous blocks in raster order,
    /// fanned out over `thread_count` workers.
    pub fn compress_image(
        &self,
        img: &AstcImage,
        swz: Swizzle,
        thread_count: usize,
        out: &mut [u8],
    ) -> Result<()> {
        let (bx, by, bz) = self.block_counts(img.width, img.height, img.depth);
        let block_count = (bx * by * bz) as usize;
        let needed = block_count * 16;
        if out.len() < needed {
            return Err(Error::BufferTooSmall {
                needed,
                got: out.len(),
            });
        }

        let manager = ParallelManager::new();
        manager.reset();
        let out_ptr = OutPtr(out.as_mut_ptr());
        let out_ref = &out_ptr;
        let manager_ref = &manager;

        let thread_count = thread_count.max(1);
        std::thread::scope(|scope| {
            for _ in 0..thread_count {
                scope.spawn(move || {
                    let mut tmpbuf = self.alloc_working_buffers();
                    manager_ref.init_with_count(block_count);
                    loop {
                        let (base, count) = manager_ref.get_task_assignment(4);
                        if count == 0 {
                            break;
                        }
                        for task in base..base + count {
                            let zb = task as u32 / (bx * by);
                            let yb = (task as u32 / bx) % by;
                            let xb = task as u32 % bx;
                            let blk = fetch_image_block(
                                self.config.profile,
                                img,
                                &self.bsd,
                                xb * self.config.block_x,
                                yb * self.config.block_y,
                                zb * self.config.block_z,
                                swz,
                            );
                            let (_, pcb) = self.compress_block(&blk, &mut tmpbuf);
                            // Disjoint per-task slot in the output buffer
                            unsafe {
                                std::ptr::copy_nonoverlapping(
                                    pcb.as_ptr(),
                                    out_ref.0.add(task * 16),
                                    16,
                                );
                            }
                        }
                        manager_ref.complete_task_assignment(count);
                    }
                    manager_ref.wait();
                });
            }
        });
        manager.term(|| {});

        Ok(())
    }

    /// Decompress contiguous blocks in raster order into an image.
    pub fn decompress_image(
        &self,
        data: &[u8],
        swz: Swizzle,
        img: &mut AstcImageMut,
    ) -> Result<()> {
        let (bx, by, bz) = self.block_counts(img.width, img.height, img.depth);
        let block_count = (bx * by * bz) as usize;
        let needed = block_count * 16;
        if data.len() < needed {
            return Err(Error::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }

        for task in 0..block_count {
            let zb = task as u32 / (bx * by);
            let yb = (task as u32 / bx) % by;
            let xb = task as u32 % bx;
            let mut pcb = [0u8; 16];
            pcb.copy_from_slice(&data[task * 16..task * 16 + 16]);
            let blk = self.decompress_block(
                &pcb,
                xb * self.config.block_x,
                yb * self.config.block_y,
                zb * self.config.block_z,
            );
            write_image_block(
                img,
                &blk,
                &self.bsd,
                xb * self.config.block_x,
                yb * self.config.block_y,
                zb * self.config.block_z,
                swz,
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_rejects_bad_config() {
        let mut config = Config::new_medium(Profile::Ldr, 4, 4, 1);
        config.candidate_limit = 9;
        assert!(Context::new(config).is_err());

        let config = Config::new_medium(Profile::Ldr, 7, 3, 1);
        assert!(Context::new(config).is_err());
    }

    #[test]
    fn test_image_roundtrip_smoke() {
        let config = Config::new_fast(Profile::Ldr, 4, 4, 1);
        let ctx = Context::new(config).unwrap();

        // An 8x8 image of two flat color regions
        let mut pixels = vec![0u8; 8 * 8 * 4];
        for (i, px) in pixels.chunks_exact_mut(4).enumerate() {
            let bright = (i % 8) < 4;
            px.copy_from_slice(if bright {
                &[220, 40, 40, 255]
            } else {
                &[20, 20, 200, 255]
            });
        }
        let img = AstcImage {
            width: 8,
            height: 8,
            depth: 1,
            data: ImageData::Unorm8(&pixels),
        };

        let mut blocks = vec![0u8; 4 * 16];
        ctx.compress_image(&img, Swizzle::RGBA, 2, &mut blocks).unwrap();

        let mut out_pixels = vec![0u8; 8 * 8 * 4];
        let mut out = AstcImageMut {
            width: 8,
            height: 8,
            depth: 1,
            data: ImageDataMut::Unorm8(&mut out_pixels),
        };
        ctx.decompress_image(&blocks, Swizzle::RGBA, &mut out).unwrap();

        // Flat regions should survive nearly exactly
        for (i, px) in out_pixels.chunks_exact(4).enumerate() {
            let bright = (i % 8) < 4;
            let want: [u8; 4] = if bright {
                [220, 40, 40, 255]
            } else {
                [20, 20, 200, 255]
            };
            for c in 0..4 {
                assert!(
                    (px[c] as i32 - want[c] as i32).abs() <= 12,
                    "pixel {} channel {}: {} vs {}",
                    i,
                    c,
                    px[c],
                    want[c]
                );
            }
        }
    }
}
