//! Partition tables and partition search.
//!
//! The format defines 1024 candidate partitionings for each of 2/3/4
//! partition counts, generated from a seeded hash. Many seeds produce
//! duplicate or degenerate patterns; those stay decodable but are flagged
//! so compression skips them. Candidate selection clusters the block's
//! colors, ranks partitionings by coverage-bitmap mismatch against the
//! clustering, and scores the best few by projection error.

use crate::block_size::BlockSizeDescriptor;
use crate::image::{ErrorWeightBlock, ImageBlock};
use crate::vecmath::{Line4, ProcessedLine3, ProcessedLine4, Vec4};
use crate::{BLOCK_MAX_PARTITIONINGS, BLOCK_MAX_PARTITIONS, BLOCK_MAX_TEXELS};

/// The partition layout for a single (partition count, seed) pair.
#[derive(Clone)]
pub struct PartitionInfo {
    /// The partition count, or 0 when this seed is a duplicate or has an
    /// empty partition and is skipped by compression. The texel
    /// assignment stays valid either way so arbitrary blocks decode.
    pub partition_count: u16,
    pub partition_index: u16,
    pub partition_texel_count: [u8; BLOCK_MAX_PARTITIONS],
    pub partition_of_texel: [u8; BLOCK_MAX_TEXELS],
    pub texels_of_partition: [[u8; BLOCK_MAX_TEXELS]; BLOCK_MAX_PARTITIONS],
    /// Coverage over the k-means texel set, used to fingerprint canonical
    /// patterns and to rank candidates during search.
    pub coverage_bitmaps: [u64; BLOCK_MAX_PARTITIONS],
}

impl PartitionInfo {
    fn new_empty() -> Self {
        Self {
            partition_count: 0,
            partition_index: 0,
            partition_texel_count: [0; BLOCK_MAX_PARTITIONS],
            partition_of_texel: [0; BLOCK_MAX_TEXELS],
            texels_of_partition: [[0; BLOCK_MAX_TEXELS]; BLOCK_MAX_PARTITIONS],
            coverage_bitmaps: [0; BLOCK_MAX_PARTITIONS],
        }
    }
}

fn hash52(mut p: u32) -> u32 {
    p ^= p >> 15;
    p = p.wrapping_sub(p << 17);
    p = p.wrapping_add(p << 7);
    p = p.wrapping_add(p << 4);
    p ^= p >> 5;
    p = p.wrapping_add(p << 16);
    p ^= p >> 7;
    p ^= p >> 3;
    p ^= p << 6;
    p ^= p >> 17;
    p
}

/// The format's partition assignment function.
pub fn select_partition(
    seed: u32,
    x: u32,
    y: u32,
    z: u32,
    partition_count: u32,
    small_block: bool,
) -> u32 {
    // Scale up coordinates for small blocks so the patterns stay useful
    let (x, y, z) = if small_block {
        (x << 1, y << 1, z << 1)
    } else {
        (x, y, z)
    };

    let seed = seed + (partition_count - 1) * 1024;
    let rnum = hash52(seed);

    let mut s1 = (rnum & 0xF) as u32;
    let mut s2 = ((rnum >> 4) & 0xF) as u32;
    let mut s3 = ((rnum >> 8) & 0xF) as u32;
    let mut s4 = ((rnum >> 12) & 0xF) as u32;
    let mut s5 = ((rnum >> 16) & 0xF) as u32;
    let mut s6 = ((rnum >> 20) & 0xF) as u32;
    let mut s7 = ((rnum >> 24) & 0xF) as u32;
    let mut s8 = ((rnum >> 28) & 0xF) as u32;
    let mut s9 = ((rnum >> 18) & 0xF) as u32;
    let mut s10 = ((rnum >> 22) & 0xF) as u32;
    let mut s11 = ((rnum >> 26) & 0xF) as u32;
    let mut s12 = (((rnum >> 30) | (rnum << 2)) & 0xF) as u32;

    s1 = s1 * s1;
    s2 = s2 * s2;
    s3 = s3 * s3;
    s4 = s4 * s4;
    s5 = s5 * s5;
    s6 = s6 * s6;
    s7 = s7 * s7;
    s8 = s8 * s8;
    s9 = s9 * s9;
    s10 = s10 * s10;
    s11 = s11 * s11;
    s12 = s12 * s12;

    let (sh1, sh2) = if seed & 1 != 0 {
        (
            if seed & 2 != 0 { 4 } else { 5 },
            if partition_count == 3 { 6 } else { 5 },
        )
    } else {
        (
            if partition_count == 3 { 6 } else { 5 },
            if seed & 2 != 0 { 4 } else { 5 },
        )
    };
    let sh3 = if seed & 0x10 != 0 { sh1 } else { sh2 };

    s1 >>= sh1;
    s2 >>= sh2;
    s3 >>= sh1;
    s4 >>= sh2;
    s5 >>= sh1;
    s6 >>= sh2;
    s7 >>= sh1;
    s8 >>= sh2;
    s9 >>= sh3;
    s10 >>= sh3;
    s11 >>= sh3;
    s12 >>= sh3;

    let mut a = s1 * x + s2 * y + s11 * z + (rnum >> 14);
    let mut b = s3 * x + s4 * y + s12 * z + (rnum >> 10);
    let mut c = s5 * x + s6 * y + s9 * z + (rnum >> 6);
    let mut d = s7 * x + s8 * y + s10 * z + (rnum >> 2);

    a &= 0x3F;
    b &= 0x3F;
    c &= 0x3F;
    d &= 0x3F;

    if partition_count <= 3 {
        d = 0;
    }
    if partition_count <= 2 {
        c = 0;
    }
    if partition_count <= 1 {
        b = 0;
    }

    if a >= b && a >= c && a >= d {
        0
    } else if b >= c && b >= d {
        1
    } else if c >= d {
        2
    } else {
        3
    }
}

/// Populate the partition tables for a block size descriptor.
///
/// Must run after the k-means texel set is chosen: the coverage bitmaps
/// are defined over those texels.
pub fn init_partition_tables(bsd: &mut BlockSizeDescriptor) {
    let texel_count = bsd.texel_count as usize;
    let small_block = texel_count < 31;

    let mut partitions =
        vec![PartitionInfo::new_empty(); 3 * BLOCK_MAX_PARTITIONINGS + 1];

    for partition_count in 2..=4u32 {
        let base = (partition_count as usize - 2) * BLOCK_MAX_PARTITIONINGS;
        let mut seen: Vec<[u64; 4]> = Vec::with_capacity(BLOCK_MAX_PARTITIONINGS);

        for seed in 0..BLOCK_MAX_PARTITIONINGS as u32 {
            let pi = &mut partitions[base + seed as usize];
            pi.partition_index = seed as u16;

            for z in 0..bsd.zdim as u32 {
                for y in 0..bsd.ydim as u32 {
                    for x in 0..bsd.xdim as u32 {
                        let texel =
                            ((z * bsd.ydim as u32 + y) * bsd.xdim as u32 + x) as usize;
                        let part =
                            select_partition(seed, x, y, z, partition_count, small_block);
                        pi.partition_of_texel[texel] = part as u8;
                        let count = &mut pi.partition_texel_count[part as usize];
                        pi.texels_of_partition[part as usize][*count as usize] = texel as u8;
                        *count += 1;
                    }
                }
            }

            for (i, &texel) in bsd.kmeans_texels[..bsd.kmeans_texel_count].iter().enumerate() {
                let part = pi.partition_of_texel[texel as usize] as usize;
                pi.coverage_bitmaps[part] |= 1u64 << i;
            }

            // Canonical fingerprint: the multiset of coverage bitmaps.
            // Duplicates and patterns with an empty partition encode fine
            // but are useless to search.
            let mut key = pi.coverage_bitmaps;
            key.sort_unstable();
            let empty = pi.partition_texel_count[..partition_count as usize]
                .iter()
                .any(|&c| c == 0);
            if empty || seen.contains(&key) {
                pi.partition_count = 0;
            } else {
                pi.partition_count = partition_count as u16;
                seen.push(key);
            }
        }
    }

    // The degenerate single-partition entry
    let single = &mut partitions[3 * BLOCK_MAX_PARTITIONINGS];
    single.partition_count = 1;
    single.partition_texel_count[0] = texel_count as u8;
    for t in 0..texel_count {
        single.texels_of_partition[0][t] = t as u8;
    }
    for i in 0..bsd.kmeans_texel_count {
        single.coverage_bitmaps[0] |= 1u64 << i;
    }

    bsd.partitions = partitions;
}

/// Error-weighted average and dominant direction for one partition.
#[derive(Clone, Copy, Debug, Default)]
pub struct PartitionMetrics {
    pub avg: Vec4,
    pub dir: Vec4,
}

fn safe_div(num: Vec4, den: Vec4) -> Vec4 {
    let mut out = Vec4::zero();
    for i in 0..4 {
        if den.lane(i) > 1e-10 {
            out[i] = num.lane(i) / den.lane(i);
        }
    }
    out
}

/// Accumulate the dominant direction from signed deviations.
///
/// This approximates the principal axis in a single pass: texel deviations
/// are summed separately for each choice of positive axis and the largest
/// accumulated vector wins.
fn dominant_direction(
    pi: &PartitionInfo,
    partition: usize,
    avg: Vec4,
    point_of: impl Fn(usize) -> Vec4,
    weight_of: impl Fn(usize) -> Vec4,
) -> Vec4 {
    let mut sum_xp = Vec4::zero();
    let mut sum_yp = Vec4::zero();
    let mut sum_zp = Vec4::zero();
    let mut sum_wp = Vec4::zero();

    let count = pi.partition_texel_count[partition] as usize;
    for &texel in pi.texels_of_partition[partition][..count].iter() {
        let t = texel as usize;
        let datum = (point_of(t) - avg) * weight_of(t);
        if datum.lane(0) > 0.0 {
            sum_xp += datum;
        }
        if datum.lane(1) > 0.0 {
            sum_yp += datum;
        }
        if datum.lane(2) > 0.0 {
            sum_zp += datum;
        }
        if datum.lane(3) > 0.0 {
            sum_wp += datum;
        }
    }

    let mut best = sum_xp;
    let mut best_sum = sum_xp.dot(sum_xp);
    for cand in [sum_yp, sum_zp, sum_wp] {
        let s = cand.dot(cand);
        if s > best_sum {
            best = cand;
            best_sum = s;
        }
    }
    best
}

/// Averages and dominant directions for a full 4 component analysis.
pub fn compute_avgs_and_dirs_4_comp(
    pi: &PartitionInfo,
    blk: &ImageBlock,
    ewb: &ErrorWeightBlock,
    pm: &mut [PartitionMetrics; BLOCK_MAX_PARTITIONS],
) {
    let partition_count = pi.partition_count.max(1) as usize;
    for p in 0..partition_count {
        let count = pi.partition_texel_count[p] as usize;
        let mut weight_sum = Vec4::zero();
        let mut color_sum = Vec4::zero();
        for &texel in pi.texels_of_partition[p][..count].iter() {
            let t = texel as usize;
            let w = ewb.error_weights[t];
            weight_sum += w;
            color_sum += blk.texel(t) * w;
        }
        let avg = safe_div(color_sum, weight_sum);
        let dir = dominant_direction(pi, p, avg, |t| blk.texel(t), |t| ewb.error_weights[t]);
        pm[p] = PartitionMetrics { avg, dir };
    }
}

/// Averages and directions with one component excluded from the analysis.
pub fn compute_avgs_and_dirs_3_comp(
    pi: &PartitionInfo,
    blk: &ImageBlock,
    ewb: &ErrorWeightBlock,
    omitted_component: usize,
    pm: &mut [PartitionMetrics; BLOCK_MAX_PARTITIONS],
) {
    let partition_count = pi.partition_count.max(1) as usize;
    for p in 0..partition_count {
        let count = pi.partition_texel_count[p] as usize;
        let mut weight_sum = Vec4::zero();
        let mut color_sum = Vec4::zero();
        for &texel in pi.texels_of_partition[p][..count].iter() {
            let t = texel as usize;
            let w = ewb.error_weights[t].with_lane(omitted_component, 0.0);
            weight_sum += w;
            color_sum += blk.texel(t).with_lane(omitted_component, 0.0) * w;
        }
        let avg = safe_div(color_sum, weight_sum);
        let dir = dominant_direction(
            pi,
            p,
            avg,
            |t| blk.texel(t).with_lane(omitted_component, 0.0),
            |t| ewb.error_weights[t].with_lane(omitted_component, 0.0),
        );
        pm[p] = PartitionMetrics { avg, dir };
    }
}

/// Specialization for the common case of excluding alpha.
pub fn compute_avgs_and_dirs_3_comp_rgb(
    pi: &PartitionInfo,
    blk: &ImageBlock,
    ewb: &ErrorWeightBlock,
    pm: &mut [PartitionMetrics; BLOCK_MAX_PARTITIONS],
) {
    compute_avgs_and_dirs_3_comp(pi, blk, ewb, 3, pm);
}

/// Averages and directions over just two components, weighted by the
/// pre-averaged pair aggregate.
pub fn compute_avgs_and_dirs_2_comp(
    pi: &PartitionInfo,
    blk: &ImageBlock,
    ewb: &ErrorWeightBlock,
    component1: usize,
    component2: usize,
    pm: &mut [PartitionMetrics; BLOCK_MAX_PARTITIONS],
) {
    let pair = ewb.texel_weight_pair(component1, component2);
    let keep = |v: Vec4| {
        let mut out = Vec4::zero();
        out[component1] = v.lane(component1);
        out[component2] = v.lane(component2);
        out
    };
    let weight_of = |t: usize| {
        let mut out = Vec4::zero();
        out[component1] = pair[t];
        out[component2] = pair[t];
        out
    };
    let partition_count = pi.partition_count.max(1) as usize;
    for p in 0..partition_count {
        let count = pi.partition_texel_count[p] as usize;
        let mut weight_sum = Vec4::zero();
        let mut color_sum = Vec4::zero();
        for &texel in pi.texels_of_partition[p][..count].iter() {
            let t = texel as usize;
            let w = weight_of(t);
            weight_sum += w;
            color_sum += keep(blk.texel(t)) * w;
        }
        let avg = safe_div(color_sum, weight_sum);
        let dir = dominant_direction(pi, p, avg, |t| keep(blk.texel(t)), weight_of);
        pm[p] = PartitionMetrics { avg, dir };
    }
}

/// Squared projection error of the block against per-partition
/// uncorrelated and same-chroma lines, 4 component form.
///
/// Also reports the projection span on the uncorrelated and same-chroma
/// lines; the span feeds the weight-quantization imprecision penalty.
#[allow(clippy::too_many_arguments)]
pub fn compute_error_squared_rgba(
    pi: &PartitionInfo,
    blk: &ImageBlock,
    ewb: &ErrorWeightBlock,
    uncor_plines: &[ProcessedLine4; BLOCK_MAX_PARTITIONS],
    samec_plines: &[ProcessedLine4; BLOCK_MAX_PARTITIONS],
    uncor_lengths: &mut [f32; BLOCK_MAX_PARTITIONS],
    samec_lengths: &mut [f32; BLOCK_MAX_PARTITIONS],
) -> (f32, f32) {
    let mut uncor_error = 0.0f32;
    let mut samec_error = 0.0f32;

    let partition_count = pi.partition_count.max(1) as usize;
    for p in 0..partition_count {
        let count = pi.partition_texel_count[p] as usize;
        let uncor = &uncor_plines[p];
        let samec = &samec_plines[p];

        let mut uncor_lo = f32::MAX;
        let mut uncor_hi = f32::MIN;
        let mut samec_lo = f32::MAX;
        let mut samec_hi = f32::MIN;

        for &texel in pi.texels_of_partition[p][..count].iter() {
            let t = texel as usize;
            let point = blk.texel(t);
            let ew = ewb.error_weights[t];

            let param = uncor.param_of(point);
            uncor_lo = uncor_lo.min(param);
            uncor_hi = uncor_hi.max(param);
            let diff = point - (uncor.amod + uncor.bs * param);
            uncor_error += (ew * diff * diff).hsum();

            let param = samec.param_of(point);
            samec_lo = samec_lo.min(param);
            samec_hi = samec_hi.max(param);
            let diff = point - samec.bs * param;
            samec_error += (ew * diff * diff).hsum();
        }

        uncor_lengths[p] = (uncor_hi - uncor_lo).max(1e-7);
        samec_lengths[p] = (samec_hi - samec_lo).max(1e-7);
    }

    (uncor_error, samec_error)
}

/// Squared projection error, RGB-only form used when alpha is constant.
#[allow(clippy::too_many_arguments)]
pub fn compute_error_squared_rgb(
    pi: &PartitionInfo,
    blk: &ImageBlock,
    ewb: &ErrorWeightBlock,
    uncor_plines: &[ProcessedLine3; BLOCK_MAX_PARTITIONS],
    samec_plines: &[ProcessedLine3; BLOCK_MAX_PARTITIONS],
    uncor_lengths: &mut [f32; BLOCK_MAX_PARTITIONS],
    samec_lengths: &mut [f32; BLOCK_MAX_PARTITIONS],
) -> (f32, f32) {
    let mut uncor_error = 0.0f32;
    let mut samec_error = 0.0f32;

    let partition_count = pi.partition_count.max(1) as usize;
    for p in 0..partition_count {
        let count = pi.partition_texel_count[p] as usize;
        let uncor = &uncor_plines[p];
        let samec = &samec_plines[p];

        let mut uncor_lo = f32::MAX;
        let mut uncor_hi = f32::MIN;
        let mut samec_lo = f32::MAX;
        let mut samec_hi = f32::MIN;

        for &texel in pi.texels_of_partition[p][..count].iter() {
            let t = texel as usize;
            let point = blk.texel(t).with_lane(3, 0.0);
            let ew = ewb.error_weights[t];

            let param = uncor.param_of(point);
            uncor_lo = uncor_lo.min(param);
            uncor_hi = uncor_hi.max(param);
            let diff = point - (uncor.amod + uncor.bs * param);
            uncor_error += (ew * diff * diff).hsum3();

            let param = samec.param_of(point);
            samec_lo = samec_lo.min(param);
            samec_hi = samec_hi.max(param);
            let diff = point - samec.bs * param;
            samec_error += (ew * diff * diff).hsum3();
        }

        uncor_lengths[p] = (uncor_hi - uncor_lo).max(1e-7);
        samec_lengths[p] = (samec_hi - samec_lo).max(1e-7);
    }

    (uncor_error, samec_error)
}

// Cluster the k-means texel colors into partition_count groups. Two
// assign/update rounds from evenly spaced seeds is enough to rank
// partition patterns.
fn kmeans_cluster(
    bsd: &BlockSizeDescriptor,
    blk: &ImageBlock,
    partition_count: usize,
) -> [u64; BLOCK_MAX_PARTITIONS] {
    let count = bsd.kmeans_texel_count;
    let texels = &bsd.kmeans_texels[..count];

    let mut centers = [Vec4::zero(); BLOCK_MAX_PARTITIONS];
    for (p, center) in centers[..partition_count].iter_mut().enumerate() {
        let pick = texels[(2 * p + 1) * count / (2 * partition_count)];
        *center = blk.texel(pick as usize);
    }

    let mut assignment = [0u8; crate::BLOCK_MAX_KMEANS_TEXELS];
    for _round in 0..2 {
        // Assign
        for (i, &texel) in texels.iter().enumerate() {
            let point = blk.texel(texel as usize);
            let mut best = 0;
            let mut best_dist = f32::MAX;
            for (p, &center) in centers[..partition_count].iter().enumerate() {
                let diff = point - center;
                let dist = diff.dot(diff);
                if dist < best_dist {
                    best_dist = dist;
                    best = p;
                }
            }
            assignment[i] = best as u8;
        }
        // Update
        let mut sums = [Vec4::zero(); BLOCK_MAX_PARTITIONS];
        let mut counts = [0u32; BLOCK_MAX_PARTITIONS];
        for (i, &texel) in texels.iter().enumerate() {
            let p = assignment[i] as usize;
            sums[p] += blk.texel(texel as usize);
            counts[p] += 1;
        }
        for p in 0..partition_count {
            if counts[p] > 0 {
                centers[p] = sums[p] / counts[p] as f32;
            }
        }
    }

    let mut bitmaps = [0u64; BLOCK_MAX_PARTITIONS];
    for (i, &a) in assignment[..count].iter().enumerate() {
        bitmaps[a as usize] |= 1u64 << i;
    }
    bitmaps
}

fn mismatch_bits(a: [u64; 4], b: [u64; 4], partition_count: usize) -> u32 {
    // Minimum XOR popcount over cluster-to-partition relabelings
    const PERMS2: [[usize; 2]; 2] = [[0, 1], [1, 0]];
    const PERMS3: [[usize; 3]; 6] = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];

    match partition_count {
        2 => PERMS2
            .iter()
            .map(|perm| (a[0] ^ b[perm[0]]).count_ones() + (a[1] ^ b[perm[1]]).count_ones())
            .min()
            .unwrap(),
        3 => PERMS3
            .iter()
            .map(|perm| {
                (a[0] ^ b[perm[0]]).count_ones()
                    + (a[1] ^ b[perm[1]]).count_ones()
                    + (a[2] ^ b[perm[2]]).count_ones()
            })
            .min()
            .unwrap(),
        _ => {
            let mut best = u32::MAX;
            for p0 in 0..4 {
                for p1 in 0..4 {
                    if p1 == p0 {
                        continue;
                    }
                    for p2 in 0..4 {
                        if p2 == p0 || p2 == p1 {
                            continue;
                        }
                        let p3 = 6 - p0 - p1 - p2;
                        let bits = (a[0] ^ b[p0]).count_ones()
                            + (a[1] ^ b[p1]).count_ones()
                            + (a[2] ^ b[p2]).count_ones()
                            + (a[3] ^ b[p3]).count_ones();
                        best = best.min(bits);
                    }
                }
            }
            best
        }
    }
}

// Rough cost of weight imprecision along a line of the given span; tuned
// per partition count since more partitions get fewer weight bits each.
fn imprecision_factor(partition_count: usize) -> f32 {
    match partition_count {
        2 => 0.055,
        3 => 0.045,
        _ => 0.035,
    }
}

/// Find the best partitioning seeds for a given partition count.
///
/// Returns the seed that minimizes error assuming uncorrelated chroma and
/// the seed that minimizes error assuming the partitions share chroma;
/// they often differ and both get trialled downstream.
pub fn find_best_partition_candidates(
    bsd: &BlockSizeDescriptor,
    blk: &ImageBlock,
    ewb: &ErrorWeightBlock,
    partition_count: usize,
    partition_search_limit: usize,
) -> (u32, u32) {
    let cluster_bitmaps = kmeans_cluster(bsd, blk, partition_count);
    let table = bsd.get_partition_table(partition_count);

    // Rank the non-skipped partitionings by bitmap mismatch; the search
    // limit applies after skipped seeds are dropped.
    let mut order: Vec<(u32, u16)> = table
        .iter()
        .enumerate()
        .filter(|(_, pi)| pi.partition_count != 0)
        .map(|(seed, pi)| {
            (
                mismatch_bits(cluster_bitmaps, pi.coverage_bitmaps, partition_count),
                seed as u16,
            )
        })
        .collect();
    order.sort_unstable_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
    order.truncate(partition_search_limit);

    let uses_alpha = !blk.is_constant_channel(3);

    let mut best_uncor = (f32::MAX, 0u32);
    let mut best_samec = (f32::MAX, 0u32);

    for &(_, seed) in &order {
        let pi = &table[seed as usize];

        let mut pm = [PartitionMetrics::default(); BLOCK_MAX_PARTITIONS];
        let (uncor_error, samec_error);

        if uses_alpha {
            compute_avgs_and_dirs_4_comp(pi, blk, ewb, &mut pm);

            let mut uncor_plines = [ProcessedLine4::default(); BLOCK_MAX_PARTITIONS];
            let mut samec_plines = [ProcessedLine4::default(); BLOCK_MAX_PARTITIONS];
            for p in 0..partition_count {
                uncor_plines[p] = ProcessedLine4::new(Line4 {
                    a: pm[p].avg,
                    b: pm[p].dir.normalized_safe(),
                });
                samec_plines[p] = ProcessedLine4::new(Line4 {
                    a: Vec4::zero(),
                    b: pm[p].avg.normalized_safe(),
                });
            }

            let mut uncor_lengths = [0.0f32; BLOCK_MAX_PARTITIONS];
            let mut samec_lengths = [0.0f32; BLOCK_MAX_PARTITIONS];
            let (mut ue, mut se) = compute_error_squared_rgba(
                pi,
                blk,
                ewb,
                &uncor_plines,
                &samec_plines,
                &mut uncor_lengths,
                &mut samec_lengths,
            );

            let factor = imprecision_factor(partition_count);
            for p in 0..partition_count {
                ue += uncor_lengths[p] * uncor_lengths[p] * factor;
                se += samec_lengths[p] * samec_lengths[p] * factor;
            }
            uncor_error = ue;
            samec_error = se;
        } else {
            compute_avgs_and_dirs_3_comp_rgb(pi, blk, ewb, &mut pm);

            let mut uncor_plines = [ProcessedLine3::default(); BLOCK_MAX_PARTITIONS];
            let mut samec_plines = [ProcessedLine3::default(); BLOCK_MAX_PARTITIONS];
            for p in 0..partition_count {
                uncor_plines[p] = ProcessedLine3::new(Line4 {
                    a: pm[p].avg,
                    b: pm[p].dir.with_lane(3, 0.0).normalized_safe(),
                });
                samec_plines[p] = ProcessedLine3::new(Line4 {
                    a: Vec4::zero(),
                    b: pm[p].avg.with_lane(3, 0.0).normalized_safe(),
                });
            }

            let mut uncor_lengths = [0.0f32; BLOCK_MAX_PARTITIONS];
            let mut samec_lengths = [0.0f32; BLOCK_MAX_PARTITIONS];
            let (mut ue, mut se) = compute_error_squared_rgb(
                pi,
                blk,
                ewb,
                &uncor_plines,
                &samec_plines,
                &mut uncor_lengths,
                &mut samec_lengths,
            );

            let factor = imprecision_factor(partition_count);
            for p in 0..partition_count {
                ue += uncor_lengths[p] * uncor_lengths[p] * factor;
                se += samec_lengths[p] * samec_lengths[p] * factor;
            }
            uncor_error = ue;
            samec_error = se;
        }

        if uncor_error < best_uncor.0 {
            best_uncor = (uncor_error, seed as u32);
        }
        if samec_error < best_samec.0 {
            best_samec = (samec_error, seed as u32);
        }
    }

    (best_uncor.1, best_samec.1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_size::BlockSizeDescriptor;

    #[test]
    fn test_partition_texel_lists_consistent() {
        let bsd = BlockSizeDescriptor::new(6, 6, 1, false, 1.0).unwrap();
        let texel_count = bsd.texel_count as usize;

        for pc in 2..=4usize {
            for pi in bsd.get_partition_table(pc) {
                if pi.partition_count == 0 {
                    continue;
                }
                let total: u32 = pi.partition_texel_count[..pc]
                    .iter()
                    .map(|&c| c as u32)
                    .sum();
                assert_eq!(total as usize, texel_count);

                // Each texel appears once, in the partition it maps to
                let mut seen = vec![false; texel_count];
                for p in 0..pc {
                    let count = pi.partition_texel_count[p] as usize;
                    for &texel in pi.texels_of_partition[p][..count].iter() {
                        assert!(!seen[texel as usize]);
                        seen[texel as usize] = true;
                        assert_eq!(pi.partition_of_texel[texel as usize] as usize, p);
                    }
                }
                assert!(seen.iter().all(|&s| s));
            }
        }
    }

    #[test]
    fn test_single_partition_entry() {
        let bsd = BlockSizeDescriptor::new(4, 4, 1, false, 1.0).unwrap();
        let pi = bsd.get_partition_info(1, 0);
        assert_eq!(pi.partition_count, 1);
        assert_eq!(pi.partition_texel_count[0], 16);
    }

    #[test]
    fn test_duplicate_seeds_marked_skipped() {
        let bsd = BlockSizeDescriptor::new(4, 4, 1, false, 1.0).unwrap();
        // 4x4 blocks have plenty of colliding patterns in 1024 seeds
        let skipped = bsd
            .get_partition_table(2)
            .iter()
            .filter(|pi| pi.partition_count == 0)
            .count();
        assert!(skipped > 0);
        // Skipped entries still carry a valid texel assignment for decode
        for pi in bsd.get_partition_table(2) {
            for t in 0..16 {
                assert!(pi.partition_of_texel[t] < 2);
            }
        }
    }

    #[test]
    fn test_two_component_analysis_stays_in_plane() {
        use crate::image::{compute_error_weight_block, fetch_image_block, AstcImage, ImageData, Swizzle};
        use crate::{Config, Profile};

        let bsd = BlockSizeDescriptor::new(4, 4, 1, false, 1.0).unwrap();
        // Luminance + alpha content: only lanes 0 and 3 vary
        let pixels: Vec<u8> = (0..16u32)
            .flat_map(|i| {
                let l = (i * 16) as u8;
                [l, l, l, 255 - (i * 8) as u8]
            })
            .collect();
        let img = AstcImage {
            width: 4,
            height: 4,
            depth: 1,
            data: ImageData::Unorm8(&pixels),
        };
        let blk = fetch_image_block(Profile::Ldr, &img, &bsd, 0, 0, 0, Swizzle::RGBA);
        let config = Config::new_medium(Profile::Ldr, 4, 4, 1);
        let ewb = compute_error_weight_block(&config, &blk);

        let pi = bsd.get_partition_info(1, 0);
        let mut pm = [PartitionMetrics::default(); BLOCK_MAX_PARTITIONS];
        compute_avgs_and_dirs_2_comp(pi, &blk, &ewb, 0, 3, &mut pm);

        // The analysis never leaves the selected plane
        assert_eq!(pm[0].avg.lane(1), 0.0);
        assert_eq!(pm[0].avg.lane(2), 0.0);
        assert_eq!(pm[0].dir.lane(1), 0.0);
        assert_eq!(pm[0].dir.lane(2), 0.0);
        // And it sees the anticorrelated luminance/alpha ramp
        assert!(pm[0].dir.lane(0) != 0.0 || pm[0].dir.lane(3) != 0.0);
    }

    #[test]
    fn test_select_partition_in_range() {
        for seed in 0..64 {
            for pc in 2..=4 {
                for y in 0..6 {
                    for x in 0..6 {
                        let p = select_partition(seed, x, y, 0, pc, false);
                        assert!(p < pc);
                    }
                }
            }
        }
    }
}
