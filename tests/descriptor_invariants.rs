//! Structural invariants of the block size descriptor tables.

use astc_codec::{
    BlockSizeDescriptor, BLOCK_BAD_BLOCK_MODE, WEIGHTS_MAX_BLOCK_MODES, WEIGHTS_TEXEL_SUM,
};

const SHAPES_2D: [(u32, u32); 5] = [(4, 4), (5, 5), (6, 6), (8, 8), (12, 12)];

#[test]
fn decimation_contribution_sums() {
    for (x, y) in SHAPES_2D {
        let bsd = BlockSizeDescriptor::new(x, y, 1, false, 1.0).unwrap();
        for di in &bsd.decimation_tables {
            for t in 0..di.texel_count {
                let int_sum: u32 = di.texel_weights_int[t].iter().map(|&v| v as u32).sum();
                assert_eq!(int_sum, WEIGHTS_TEXEL_SUM as u32, "{}x{} texel {}", x, y, t);

                let flt_sum: f32 = di.texel_weights_float[t].iter().sum();
                assert!(
                    (flt_sum - 1.0).abs() < 1e-6,
                    "{}x{} texel {}: {}",
                    x,
                    y,
                    t,
                    flt_sum
                );

                // Padded entries reference weight 0 with a zero factor
                for k in di.texel_weight_count[t] as usize..4 {
                    assert_eq!(di.texel_weights_int[t][k], 0);
                }
            }
        }
    }
}

#[test]
fn decimation_contribution_sums_3d() {
    let bsd = BlockSizeDescriptor::new(6, 6, 6, false, 1.0).unwrap();
    for di in &bsd.decimation_tables {
        for t in 0..di.texel_count {
            let int_sum: u32 = di.texel_weights_int[t].iter().map(|&v| v as u32).sum();
            assert_eq!(int_sum, 16);
        }
    }
}

#[test]
fn packed_index_maps_back() {
    for (x, y) in SHAPES_2D {
        let bsd = BlockSizeDescriptor::new(x, y, 1, false, 1.0).unwrap();
        let mut enabled = 0;
        for raw in 0..WEIGHTS_MAX_BLOCK_MODES {
            let packed = bsd.block_mode_packed_index[raw];
            if packed == BLOCK_BAD_BLOCK_MODE {
                continue;
            }
            enabled += 1;
            assert!((packed as usize) < bsd.block_modes.len());
            assert_eq!(bsd.block_modes[packed as usize].mode_index as usize, raw);
        }
        assert_eq!(enabled, bsd.block_modes.len());
        assert!(enabled > 0, "{}x{} has no modes", x, y);
    }
}

#[test]
fn partition_texel_lists_partition_the_block() {
    for (x, y) in [(4, 4), (6, 6)] {
        let bsd = BlockSizeDescriptor::new(x, y, 1, false, 1.0).unwrap();
        let texel_count = (x * y) as usize;

        for pc in 2..=4usize {
            for pi in bsd.get_partition_table(pc) {
                if pi.partition_count == 0 {
                    continue;
                }
                let total: u32 = pi.partition_texel_count[..pc].iter().map(|&c| c as u32).sum();
                assert_eq!(total as usize, texel_count);

                let mut seen = vec![0u32; texel_count];
                for p in 0..pc {
                    for &texel in
                        pi.texels_of_partition[p][..pi.partition_texel_count[p] as usize].iter()
                    {
                        seen[texel as usize] += 1;
                        assert_eq!(pi.partition_of_texel[texel as usize] as usize, p);
                    }
                }
                assert!(seen.iter().all(|&c| c == 1));
            }
        }
    }
}

#[test]
fn always_modes_lead_the_arrays() {
    let bsd = BlockSizeDescriptor::new(6, 6, 1, true, 0.5).unwrap();
    assert!(bsd.always_block_mode_count > 0);
    assert!(bsd.always_block_mode_count <= bsd.block_modes.len());
    assert!(bsd.always_decimation_mode_count <= bsd.decimation_modes.len());
    for bm in &bsd.block_modes[..bsd.always_block_mode_count] {
        assert!(bm.percentile_hit);
        assert!(!bm.is_dual_plane);
    }
}

#[test]
fn kmeans_texels_strided_and_in_range() {
    let bsd = BlockSizeDescriptor::new(12, 12, 1, false, 1.0).unwrap();
    assert_eq!(bsd.kmeans_texel_count, 64);
    let texels = &bsd.kmeans_texels[..bsd.kmeans_texel_count];
    for w in texels.windows(2) {
        assert!(w[0] < w[1]);
    }
    assert!((*texels.last().unwrap() as usize) < 144);
}
