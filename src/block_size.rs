//! Block size descriptor construction.
//!
//! A `BlockSizeDescriptor` is built once per block footprint and reused for
//! every block: it enumerates the legal block modes, interns the weight
//! grid decimation patterns they reference, and owns the partition tables.
//! Decimation tables are held in a flat owned vector and block modes refer
//! to them by index, so teardown is just dropping the descriptor.

use crate::partition::{init_partition_tables, PartitionInfo};
use crate::percentile::{mode_percentile_2d, mode_percentile_3d, PERCENTILE_ALWAYS};
use crate::quant::{ise_sequence_bitcount, Quant};
use crate::{
    Error, Result, BLOCK_BAD_BLOCK_MODE, BLOCK_MAX_KMEANS_TEXELS, BLOCK_MAX_PARTITIONINGS,
    BLOCK_MAX_WEIGHTS, BLOCK_MAX_WEIGHT_BITS, BLOCK_MIN_WEIGHT_BITS, WEIGHTS_MAX_BLOCK_MODES,
};

/// Legal 2D block footprints defined by the format.
const LEGAL_2D: [(u8, u8); 14] = [
    (4, 4),
    (5, 4),
    (5, 5),
    (6, 5),
    (6, 6),
    (8, 5),
    (8, 6),
    (8, 8),
    (10, 5),
    (10, 6),
    (10, 8),
    (10, 10),
    (12, 10),
    (12, 12),
];

/// Legal 3D block footprints defined by the format.
const LEGAL_3D: [(u8, u8, u8); 10] = [
    (3, 3, 3),
    (4, 3, 3),
    (4, 4, 3),
    (4, 4, 4),
    (5, 4, 4),
    (5, 5, 4),
    (5, 5, 5),
    (6, 5, 5),
    (6, 6, 5),
    (6, 6, 6),
];

pub fn is_legal_2d_block_size(xdim: u32, ydim: u32) -> bool {
    LEGAL_2D.iter().any(|&(x, y)| x as u32 == xdim && y as u32 == ydim)
}

pub fn is_legal_3d_block_size(xdim: u32, ydim: u32, zdim: u32) -> bool {
    LEGAL_3D
        .iter()
        .any(|&(x, y, z)| x as u32 == xdim && y as u32 == ydim && z as u32 == zdim)
}

/// The unpacked fields of an 11-bit block mode.
#[derive(Clone, Copy, Debug)]
pub struct BlockModeLayout {
    pub x_weights: u32,
    pub y_weights: u32,
    pub z_weights: u32,
    pub quant: Quant,
    pub is_dual_plane: bool,
}

/// Decode an 11-bit 2D block mode field, or `None` for reserved patterns.
pub fn decode_block_mode_2d(mode: u16) -> Option<BlockModeLayout> {
    let mode = mode as u32;
    let mut h = (mode >> 9) & 1;
    let mut d = (mode >> 10) & 1;
    let a = (mode >> 5) & 3;
    let mut base = (mode >> 4) & 1;

    let (xw, yw);
    if mode & 3 != 0 {
        base |= (mode & 3) << 1;
        let b = (mode >> 7) & 3;
        match (mode >> 2) & 3 {
            0 => {
                xw = b + 4;
                yw = a + 2;
            }
            1 => {
                xw = b + 8;
                yw = a + 2;
            }
            2 => {
                xw = a + 2;
                yw = b + 8;
            }
            _ => {
                let b = b & 1;
                if mode & 0x100 != 0 {
                    xw = b + 2;
                    yw = a + 2;
                } else {
                    xw = a + 2;
                    yw = b + 6;
                }
            }
        }
    } else {
        base |= ((mode >> 2) & 3) << 1;
        if (mode >> 2) & 3 == 0 {
            return None;
        }
        let b = (mode >> 9) & 3;
        match (mode >> 7) & 3 {
            0 => {
                xw = 12;
                yw = a + 2;
            }
            1 => {
                xw = a + 2;
                yw = 12;
            }
            2 => {
                xw = a + 6;
                yw = b + 6;
                d = 0;
                h = 0;
            }
            _ => match (mode >> 5) & 3 {
                0 => {
                    xw = 6;
                    yw = 10;
                }
                1 => {
                    xw = 10;
                    yw = 6;
                }
                _ => return None,
            },
        }
    }

    let quant = Quant::from_index((base - 2 + 6 * h) as usize)?;
    Some(BlockModeLayout {
        x_weights: xw,
        y_weights: yw,
        z_weights: 1,
        quant,
        is_dual_plane: d != 0,
    })
}

/// Decode an 11-bit 3D block mode field, or `None` for reserved patterns.
pub fn decode_block_mode_3d(mode: u16) -> Option<BlockModeLayout> {
    let mode = mode as u32;
    let mut h = (mode >> 9) & 1;
    let mut d = (mode >> 10) & 1;
    let a = (mode >> 5) & 3;
    let mut base = (mode >> 4) & 1;

    let (xw, yw, zw);
    if mode & 3 != 0 {
        base |= (mode & 3) << 1;
        let b = (mode >> 7) & 3;
        let c = (mode >> 2) & 3;
        xw = a + 2;
        yw = b + 2;
        zw = c + 2;
    } else {
        base |= ((mode >> 2) & 3) << 1;
        if (mode >> 2) & 3 == 0 {
            return None;
        }
        let b = (mode >> 9) & 3;
        if (mode >> 7) & 3 != 3 {
            d = 0;
            h = 0;
            match (mode >> 7) & 3 {
                0 => {
                    xw = 6;
                    yw = b + 2;
                    zw = a + 2;
                }
                1 => {
                    xw = a + 2;
                    yw = 6;
                    zw = b + 2;
                }
                _ => {
                    xw = a + 2;
                    yw = b + 2;
                    zw = 6;
                }
            }
        } else {
            match (mode >> 5) & 3 {
                0 => {
                    xw = 6;
                    yw = 2;
                    zw = 2;
                }
                1 => {
                    xw = 2;
                    yw = 6;
                    zw = 2;
                }
                2 => {
                    xw = 2;
                    yw = 2;
                    zw = 6;
                }
                _ => return None,
            }
        }
    }

    let quant = Quant::from_index((base - 2 + 6 * h) as usize)?;
    Some(BlockModeLayout {
        x_weights: xw,
        y_weights: yw,
        z_weights: zw,
        quant,
        is_dual_plane: d != 0,
    })
}

/// The weight grid for one decimation pattern, with the per-texel bilinear
/// infill records and the inverted per-weight texel lists.
#[derive(Clone, Debug, Default)]
pub struct DecimationInfo {
    pub texel_count: usize,
    pub weight_count: usize,
    pub weight_x: u8,
    pub weight_y: u8,
    pub weight_z: u8,

    /// Per texel: number of stored weights with a non-zero contribution.
    pub texel_weight_count: Vec<u8>,
    /// Per texel: up to 4 contributing weight indices, zero padded.
    pub texel_weights: Vec<[u8; 4]>,
    /// Per texel: integer contribution factors, always summing to 16.
    pub texel_weights_int: Vec<[u8; 4]>,
    /// Per texel: float contribution factors, always summing to 1.
    pub texel_weights_float: Vec<[f32; 4]>,

    /// Per weight: start of its span in the flattened texel lists; one
    /// extra entry terminates the last span.
    pub weight_texel_offset: Vec<u32>,
    /// Flattened per-weight texel ids.
    pub weight_texels: Vec<u16>,
    /// This weight's own float factor at that texel.
    pub weight_texel_contrib: Vec<f32>,
    /// Folded copy of the texel's full infill record, so the grid solver
    /// walks one span without chasing the per-texel tables.
    pub weight_texel_fold_idx: Vec<[u8; 4]>,
    pub weight_texel_fold_flt: Vec<[f32; 4]>,
}

impl DecimationInfo {
    /// Bilinearly infill the weight for `texel` from a decimated float grid.
    pub fn bilinear_infill(&self, weights: &[f32], texel: usize) -> f32 {
        let idx = &self.texel_weights[texel];
        let flt = &self.texel_weights_float[texel];
        (weights[idx[0] as usize] * flt[0] + weights[idx[1] as usize] * flt[1])
            + (weights[idx[2] as usize] * flt[2] + weights[idx[3] as usize] * flt[3])
    }

    /// Integer infill used on the decode side: factors sum to 16 and the
    /// result is rounded back into the weight range.
    pub fn bilinear_infill_int(&self, weights: &[i32], texel: usize) -> i32 {
        let idx = &self.texel_weights[texel];
        let int = &self.texel_weights_int[texel];
        let sum = weights[idx[0] as usize] * int[0] as i32
            + weights[idx[1] as usize] * int[1] as i32
            + weights[idx[2] as usize] * int[2] as i32
            + weights[idx[3] as usize] * int[3] as i32;
        (sum + 8) >> 4
    }

    /// The texels covered by one stored weight.
    pub fn weight_span(&self, weight: usize) -> std::ops::Range<usize> {
        self.weight_texel_offset[weight] as usize..self.weight_texel_offset[weight + 1] as usize
    }
}

struct TexelContribution {
    weights: [u8; 4],
    ints: [u8; 4],
}

fn texel_contribution_2d(
    xdim: u32,
    ydim: u32,
    xw: u32,
    yw: u32,
    x: u32,
    y: u32,
) -> TexelContribution {
    let ds = (1024 + xdim / 2) / (xdim - 1);
    let dt = (1024 + ydim / 2) / (ydim - 1);

    let gs = (ds * x * (xw - 1) + 32) >> 6;
    let gt = (dt * y * (yw - 1) + 32) >> 6;

    let js = gs >> 4;
    let fs = (gs & 0xF) as i32;
    let jt = gt >> 4;
    let ft = (gt & 0xF) as i32;

    let w11 = (fs * ft + 8) >> 4;
    let w01 = fs - w11;
    let w10 = ft - w11;
    let w00 = 16 - fs - ft + w11;

    let v0 = js + jt * xw;
    TexelContribution {
        weights: [
            v0 as u8,
            (v0 + 1) as u8,
            (v0 + xw) as u8,
            (v0 + xw + 1) as u8,
        ],
        ints: [w00 as u8, w01 as u8, w10 as u8, w11 as u8],
    }
}

fn texel_contribution_3d(
    xdim: u32,
    ydim: u32,
    zdim: u32,
    xw: u32,
    yw: u32,
    zw: u32,
    x: u32,
    y: u32,
    z: u32,
) -> TexelContribution {
    let ds = (1024 + xdim / 2) / (xdim - 1);
    let dt = (1024 + ydim / 2) / (ydim - 1);
    let dr = (1024 + zdim / 2) / (zdim - 1);

    let gs = (ds * x * (xw - 1) + 32) >> 6;
    let gt = (dt * y * (yw - 1) + 32) >> 6;
    let gr = (dr * z * (zw - 1) + 32) >> 6;

    let js = (gs >> 4) as i32;
    let fs = (gs & 0xF) as i32;
    let jt = (gt >> 4) as i32;
    let ft = (gt & 0xF) as i32;
    let jr = (gr >> 4) as i32;
    let fr = (gr & 0xF) as i32;

    let n = xw as i32;
    let nm = (xw * yw) as i32;
    let v0 = js + jt * n + jr * nm;

    // Tetrahedral interpolation: order the fractional offsets and walk one
    // axis step at a time from v0 to the fully advanced corner.
    let cas = (((fs > ft) as u8) << 2) | (((ft > fr) as u8) << 1) | ((fs > fr) as u8);
    let (s1, s2, w0, w1, w2, w3) = match cas {
        7 => (1, n, 16 - fs, fs - ft, ft - fr, fr),
        3 => (n, 1, 16 - ft, ft - fs, fs - fr, fr),
        5 => (1, nm, 16 - fs, fs - fr, fr - ft, ft),
        4 => (nm, 1, 16 - fr, fr - fs, fs - ft, ft),
        2 => (n, nm, 16 - ft, ft - fr, fr - fs, fs),
        _ => (nm, n, 16 - fr, fr - ft, ft - fs, fs),
    };

    TexelContribution {
        weights: [
            v0 as u8,
            (v0 + s1) as u8,
            (v0 + s1 + s2) as u8,
            (v0 + 1 + n + nm) as u8,
        ],
        ints: [w0 as u8, w1 as u8, w2 as u8, w3 as u8],
    }
}

fn build_decimation_info(
    xdim: u32,
    ydim: u32,
    zdim: u32,
    xw: u32,
    yw: u32,
    zw: u32,
) -> DecimationInfo {
    let texel_count = (xdim * ydim * zdim) as usize;
    let weight_count = (xw * yw * zw) as usize;

    let mut di = DecimationInfo {
        texel_count,
        weight_count,
        weight_x: xw as u8,
        weight_y: yw as u8,
        weight_z: zw as u8,
        texel_weight_count: vec![0; texel_count],
        texel_weights: vec![[0; 4]; texel_count],
        texel_weights_int: vec![[0; 4]; texel_count],
        texel_weights_float: vec![[0.0; 4]; texel_count],
        ..DecimationInfo::default()
    };

    let mut per_weight: Vec<Vec<u16>> = vec![Vec::new(); weight_count];

    for z in 0..zdim {
        for y in 0..ydim {
            for x in 0..xdim {
                let texel = ((z * ydim + y) * xdim + x) as usize;
                let contrib = if zdim > 1 {
                    texel_contribution_3d(xdim, ydim, zdim, xw, yw, zw, x, y, z)
                } else {
                    texel_contribution_2d(xdim, ydim, xw, yw, x, y)
                };

                // Compact the non-zero contributions to the front; padding
                // entries keep index 0 and factor 0 so the infill formula
                // can always read 4 entries.
                let mut live = 0;
                for k in 0..4 {
                    if contrib.ints[k] != 0 {
                        di.texel_weights[texel][live] = contrib.weights[k];
                        di.texel_weights_int[texel][live] = contrib.ints[k];
                        di.texel_weights_float[texel][live] = contrib.ints[k] as f32 * (1.0 / 16.0);
                        per_weight[contrib.weights[k] as usize].push(texel as u16);
                        live += 1;
                    }
                }
                di.texel_weight_count[texel] = live as u8;
            }
        }
    }

    di.weight_texel_offset = Vec::with_capacity(weight_count + 1);
    let mut offset = 0u32;
    for texels in &per_weight {
        di.weight_texel_offset.push(offset);
        offset += texels.len() as u32;
    }
    di.weight_texel_offset.push(offset);

    for (w, texels) in per_weight.iter().enumerate() {
        for &texel in texels {
            let t = texel as usize;
            let slot = di.texel_weights[t]
                .iter()
                .take(di.texel_weight_count[t] as usize)
                .position(|&idx| idx as usize == w)
                .unwrap_or(0);
            di.weight_texels.push(texel);
            di.weight_texel_contrib.push(di.texel_weights_float[t][slot]);
            di.weight_texel_fold_idx.push(di.texel_weights[t]);
            di.weight_texel_fold_flt.push(di.texel_weights_float[t]);
        }
    }

    di
}

/// Metadata for a single block mode of this block size.
#[derive(Clone, Copy, Debug)]
pub struct BlockMode {
    /// The 11-bit mode field as encoded in the physical block.
    pub mode_index: u16,
    /// Index into the descriptor's decimation tables.
    pub decimation_mode: u8,
    pub quant_mode: Quant,
    pub is_dual_plane: bool,
    /// Enabled in the current search preset.
    pub percentile_hit: bool,
}

/// Metadata for a single decimation mode of this block size.
#[derive(Clone, Copy, Debug)]
pub struct DecimationMode {
    /// Max weight quant index usable in 1 plane mode, or -1.
    pub maxprec_1plane: i8,
    /// Max weight quant index usable in 2 plane mode, or -1.
    pub maxprec_2planes: i8,
    pub percentile_hit: bool,
}

/// Data tables for a single block size.
pub struct BlockSizeDescriptor {
    pub xdim: u8,
    pub ydim: u8,
    pub zdim: u8,
    pub texel_count: u8,

    pub block_modes: Vec<BlockMode>,
    pub always_block_mode_count: usize,
    /// Raw 11-bit mode field to packed index, or `BLOCK_BAD_BLOCK_MODE`.
    pub block_mode_packed_index: Box<[u16; WEIGHTS_MAX_BLOCK_MODES]>,

    pub decimation_modes: Vec<DecimationMode>,
    pub always_decimation_mode_count: usize,
    /// Owned decimation tables; `BlockMode::decimation_mode` indexes here.
    pub decimation_tables: Vec<DecimationInfo>,

    /// Partition records for 2/3/4 partitions plus the single-partition
    /// entry at index `3 * 1024`.
    pub partitions: Vec<PartitionInfo>,

    pub kmeans_texel_count: usize,
    pub kmeans_texels: [u8; BLOCK_MAX_KMEANS_TEXELS],
}

impl BlockSizeDescriptor {
    /// Build the descriptor for one block footprint.
    ///
    /// `can_omit_modes` lets the builder drop legal modes above the
    /// percentile `mode_cutoff`; decompression contexts must pass `false`
    /// so every legal mode stays decodable.
    pub fn new(
        xdim: u32,
        ydim: u32,
        zdim: u32,
        can_omit_modes: bool,
        mode_cutoff: f32,
    ) -> Result<Box<BlockSizeDescriptor>> {
        let is_3d = zdim > 1;
        if is_3d {
            if !is_legal_3d_block_size(xdim, ydim, zdim) {
                return Err(Error::InvalidBlockSize { xdim, ydim, zdim });
            }
        } else if !is_legal_2d_block_size(xdim, ydim) {
            return Err(Error::InvalidBlockSize { xdim, ydim, zdim });
        }

        let texel_count = (xdim * ydim * zdim) as usize;

        // Enumerate the legal modes with their percentile scores
        struct Candidate {
            mode_index: u16,
            layout: BlockModeLayout,
            percentile: f32,
        }
        let mut candidates: Vec<Candidate> = Vec::new();

        for mode_index in 0..WEIGHTS_MAX_BLOCK_MODES as u16 {
            let layout = if is_3d {
                decode_block_mode_3d(mode_index)
            } else {
                decode_block_mode_2d(mode_index)
            };
            let layout = match layout {
                Some(layout) => layout,
                None => continue,
            };

            if layout.x_weights > xdim || layout.y_weights > ydim || layout.z_weights > zdim {
                continue;
            }

            let planes = if layout.is_dual_plane { 2 } else { 1 };
            let weight_count =
                layout.x_weights * layout.y_weights * layout.z_weights * planes;
            if weight_count as usize > BLOCK_MAX_WEIGHTS {
                continue;
            }

            let weight_bits = ise_sequence_bitcount(weight_count, layout.quant);
            if !(BLOCK_MIN_WEIGHT_BITS as u32..=BLOCK_MAX_WEIGHT_BITS as u32)
                .contains(&weight_bits)
            {
                continue;
            }

            let percentile = if is_3d {
                mode_percentile_3d(
                    layout.x_weights,
                    layout.y_weights,
                    layout.z_weights,
                    layout.quant,
                    layout.is_dual_plane,
                )
            } else {
                mode_percentile_2d(
                    layout.x_weights,
                    layout.y_weights,
                    layout.quant,
                    layout.is_dual_plane,
                )
            };

            if can_omit_modes && percentile > mode_cutoff {
                continue;
            }

            candidates.push(Candidate {
                mode_index,
                layout,
                percentile,
            });
        }

        // Always modes sort to the front; order stays stable by mode index
        // within each tier so ties break toward lower packed indices.
        candidates.sort_by(|a, b| {
            let a_always = a.percentile <= PERCENTILE_ALWAYS;
            let b_always = b.percentile <= PERCENTILE_ALWAYS;
            b_always
                .cmp(&a_always)
                .then(a.mode_index.cmp(&b.mode_index))
        });

        let mut bsd = Box::new(BlockSizeDescriptor {
            xdim: xdim as u8,
            ydim: ydim as u8,
            zdim: zdim as u8,
            texel_count: texel_count as u8,
            block_modes: Vec::with_capacity(candidates.len()),
            always_block_mode_count: 0,
            block_mode_packed_index: Box::new([BLOCK_BAD_BLOCK_MODE; WEIGHTS_MAX_BLOCK_MODES]),
            decimation_modes: Vec::new(),
            always_decimation_mode_count: 0,
            decimation_tables: Vec::new(),
            partitions: Vec::new(),
            kmeans_texel_count: 0,
            kmeans_texels: [0; BLOCK_MAX_KMEANS_TEXELS],
        });

        let mut decimation_keys: Vec<(u32, u32, u32)> = Vec::new();

        for candidate in &candidates {
            let layout = candidate.layout;
            let key = (layout.x_weights, layout.y_weights, layout.z_weights);
            let decimation_mode = match decimation_keys.iter().position(|&k| k == key) {
                Some(i) => i,
                None => {
                    decimation_keys.push(key);
                    bsd.decimation_modes.push(DecimationMode {
                        maxprec_1plane: -1,
                        maxprec_2planes: -1,
                        percentile_hit: false,
                    });
                    bsd.decimation_tables.push(build_decimation_info(
                        xdim,
                        ydim,
                        zdim,
                        layout.x_weights,
                        layout.y_weights,
                        layout.z_weights,
                    ));
                    decimation_keys.len() - 1
                }
            };

            let always = candidate.percentile <= PERCENTILE_ALWAYS;
            let hit = candidate.percentile <= mode_cutoff;
            let dm = &mut bsd.decimation_modes[decimation_mode];
            if layout.is_dual_plane {
                dm.maxprec_2planes = dm.maxprec_2planes.max(layout.quant.index() as i8);
            } else {
                dm.maxprec_1plane = dm.maxprec_1plane.max(layout.quant.index() as i8);
            }
            dm.percentile_hit |= hit;

            let packed = bsd.block_modes.len();
            bsd.block_mode_packed_index[candidate.mode_index as usize] = packed as u16;
            bsd.block_modes.push(BlockMode {
                mode_index: candidate.mode_index,
                decimation_mode: decimation_mode as u8,
                quant_mode: layout.quant,
                is_dual_plane: layout.is_dual_plane,
                percentile_hit: hit,
            });

            if always {
                bsd.always_block_mode_count = packed + 1;
                bsd.always_decimation_mode_count = bsd.decimation_modes.len();
            }
        }

        // K-means texels, evenly strided across the block
        bsd.kmeans_texel_count = texel_count.min(BLOCK_MAX_KMEANS_TEXELS);
        for i in 0..bsd.kmeans_texel_count {
            bsd.kmeans_texels[i] = (i * texel_count / bsd.kmeans_texel_count) as u8;
        }

        init_partition_tables(&mut bsd);

        Ok(bsd)
    }

    /// The packed block mode for a raw 11-bit field, if enabled.
    pub fn get_block_mode(&self, mode_index: u16) -> Option<&BlockMode> {
        let packed = self.block_mode_packed_index[mode_index as usize];
        if packed == BLOCK_BAD_BLOCK_MODE {
            None
        } else {
            Some(&self.block_modes[packed as usize])
        }
    }

    pub fn get_decimation_info(&self, decimation_mode: usize) -> &DecimationInfo {
        &self.decimation_tables[decimation_mode]
    }

    /// The weight count stored by a block mode, counting both planes.
    pub fn mode_weight_count(&self, bm: &BlockMode) -> usize {
        let di = self.get_decimation_info(bm.decimation_mode as usize);
        di.weight_count * if bm.is_dual_plane { 2 } else { 1 }
    }

    /// The partition record table for a partition count.
    pub fn get_partition_table(&self, partition_count: usize) -> &[PartitionInfo] {
        if partition_count == 1 {
            &self.partitions[3 * BLOCK_MAX_PARTITIONINGS..]
        } else {
            let base = (partition_count - 2) * BLOCK_MAX_PARTITIONINGS;
            &self.partitions[base..base + BLOCK_MAX_PARTITIONINGS]
        }
    }

    pub fn get_partition_info(&self, partition_count: usize, index: usize) -> &PartitionInfo {
        &self.get_partition_table(partition_count)[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_block_sizes() {
        assert!(is_legal_2d_block_size(4, 4));
        assert!(is_legal_2d_block_size(12, 12));
        assert!(!is_legal_2d_block_size(4, 12));
        assert!(is_legal_3d_block_size(3, 3, 3));
        assert!(!is_legal_3d_block_size(6, 6, 4));
    }

    #[test]
    fn test_decode_block_mode_2d_known() {
        // 0x0042: a 8x8-class mode used by single plane transcoders
        let layout = decode_block_mode_2d(0x0042).unwrap();
        assert!(!layout.is_dual_plane);
        // Reserved pattern: low 4 bits zero
        assert!(decode_block_mode_2d(0).is_none());
    }

    #[test]
    fn test_infill_factors_sum() {
        for &(x, y) in LEGAL_2D.iter() {
            let di = build_decimation_info(x as u32, y as u32, 1, 3, 3, 1);
            for t in 0..di.texel_count {
                let int_sum: u32 = di.texel_weights_int[t].iter().map(|&v| v as u32).sum();
                assert_eq!(int_sum, 16);
                let flt_sum: f32 = di.texel_weights_float[t].iter().sum();
                assert!((flt_sum - 1.0).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_infill_factors_sum_3d() {
        let di = build_decimation_info(6, 6, 6, 3, 3, 3);
        for t in 0..di.texel_count {
            let int_sum: u32 = di.texel_weights_int[t].iter().map(|&v| v as u32).sum();
            assert_eq!(int_sum, 16, "texel {}", t);
        }
    }

    #[test]
    fn test_bsd_packed_index_consistent() {
        let bsd = BlockSizeDescriptor::new(6, 6, 1, false, 1.0).unwrap();
        assert!(bsd.block_modes.len() <= WEIGHTS_MAX_BLOCK_MODES);
        for raw in 0..WEIGHTS_MAX_BLOCK_MODES {
            let packed = bsd.block_mode_packed_index[raw];
            if packed != BLOCK_BAD_BLOCK_MODE {
                assert!((packed as usize) < bsd.block_modes.len());
                assert_eq!(bsd.block_modes[packed as usize].mode_index as usize, raw);
            }
        }
        // Always modes front loaded
        assert!(bsd.always_block_mode_count <= bsd.block_modes.len());
        for (i, bm) in bsd.block_modes.iter().enumerate() {
            if i < bsd.always_block_mode_count {
                assert!(bm.percentile_hit);
            }
        }
    }

    #[test]
    fn test_bsd_rejects_illegal_size() {
        assert!(BlockSizeDescriptor::new(7, 7, 1, false, 1.0).is_err());
    }

    #[test]
    fn test_weight_spans_cover_all_texels() {
        let di = build_decimation_info(8, 8, 1, 4, 4, 1);
        let mut seen = vec![0u32; di.texel_count];
        for w in 0..di.weight_count {
            for i in di.weight_span(w) {
                seen[di.weight_texels[i] as usize] += 1;
            }
        }
        for (t, &count) in seen.iter().enumerate() {
            assert_eq!(count as u8, di.texel_weight_count[t], "texel {}", t);
        }
    }
}
