//! Symbolic and physical compressed blocks.
//!
//! The symbolic form stores the unpacked content of one 128-bit block.
//! Packing writes the block mode and partition fields at the low end,
//! BISE-packed endpoint colors after them, and the BISE-packed weights
//! bit-reversed from the high end downward; the plane-2 selector and any
//! extra endpoint-class bits sit immediately below the weights.
//! Unpacking tolerates arbitrary bytes and flags anything malformed as an
//! error block.

use byteorder::{ByteOrder, LE};

use crate::bise::{decode_ise, encode_ise, read_bits, write_bits};
use crate::block_size::BlockSizeDescriptor;
use crate::color::EndpointFormat;
use crate::quant::{ise_sequence_bitcount, Quant, QUANT_MODE_TABLE};
use crate::{
    BLOCK_MAX_COMPONENTS, BLOCK_MAX_PARTITIONS, BLOCK_MAX_WEIGHTS, PARTITION_INDEX_BITS,
    WEIGHTS_PLANE2_OFFSET,
};

/// A physical compressed block: 16 raw bytes.
pub type PhysicalBlock = [u8; 16];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockType {
    /// Decodes to the error color or NaN.
    Error,
    /// Constant color block with FP16 components.
    ConstF16,
    /// Constant color block with UNORM16 components.
    ConstU16,
    /// A normal block.
    NonConst,
}

/// A symbolic representation of one compressed block.
#[derive(Clone, Debug)]
pub struct SymbolicBlock {
    pub block_type: BlockType,

    /// Valid for non-constant blocks.
    pub partition_count: u8,
    pub color_formats_matched: bool,
    /// Plane 2 component, or -1 for single plane. Symbolic-only state;
    /// the physical form carries dual-plane in the block mode field.
    pub plane2_component: i8,
    /// The raw 11-bit block mode field.
    pub block_mode: u16,
    /// The partition seed; valid when two or more partitions.
    pub partition_index: u16,
    pub color_formats: [EndpointFormat; BLOCK_MAX_PARTITIONS],
    pub quant_mode: Quant,
    pub errorval: f32,

    /// Constant color payload for the constant block types.
    pub constant_color: [i32; BLOCK_MAX_COMPONENTS],
    /// Quantized endpoint bytes per partition.
    pub color_values: [[u8; 8]; BLOCK_MAX_PARTITIONS],
    /// Quantized weights; plane 2 starts at `WEIGHTS_PLANE2_OFFSET`.
    pub weights: [u8; BLOCK_MAX_WEIGHTS],
}

impl SymbolicBlock {
    pub fn new_error() -> Self {
        Self {
            block_type: BlockType::Error,
            partition_count: 0,
            color_formats_matched: false,
            plane2_component: -1,
            block_mode: 0,
            partition_index: 0,
            color_formats: [EndpointFormat::Luminance; BLOCK_MAX_PARTITIONS],
            quant_mode: Quant::Q6,
            errorval: 0.0,
            constant_color: [0; 4],
            color_values: [[0; 8]; BLOCK_MAX_PARTITIONS],
            weights: [0; BLOCK_MAX_WEIGHTS],
        }
    }

    pub fn new_constant(color: [i32; BLOCK_MAX_COMPONENTS], f16: bool) -> Self {
        let mut scb = Self::new_error();
        scb.block_type = if f16 {
            BlockType::ConstF16
        } else {
            BlockType::ConstU16
        };
        scb.constant_color = color;
        scb
    }
}

const VOID_EXTENT_SIGNATURE: u32 = 0x1FC;

fn write_constant_block(scb: &SymbolicBlock) -> PhysicalBlock {
    let mut data = [0u8; 16];
    // Void extent marker, dynamic range flag, reserved ones and all-ones
    // extent coordinates
    data[0] = 0xFC;
    data[1] = if scb.block_type == BlockType::ConstF16 {
        0xFF
    } else {
        0xFD
    };
    for b in data[2..8].iter_mut() {
        *b = 0xFF;
    }
    for i in 0..4 {
        LE::write_u16(&mut data[8 + 2 * i..], scb.constant_color[i] as u16);
    }
    data
}

/// Convert a symbolic block into its 128-bit physical encoding.
///
/// The symbolic data must be consistent and fit the bit budget; blocks
/// that cannot encode must have been turned into error or constant
/// blocks by the caller.
pub fn symbolic_to_physical(bsd: &BlockSizeDescriptor, scb: &SymbolicBlock) -> PhysicalBlock {
    match scb.block_type {
        BlockType::ConstF16 | BlockType::ConstU16 => return write_constant_block(scb),
        BlockType::Error => {
            // A void extent with the reserved bits cleared decodes as an
            // error block everywhere
            let mut data = [0u8; 16];
            data[0] = 0xFC;
            data[1] = 0x01;
            return data;
        }
        BlockType::NonConst => {}
    }

    let bm = bsd
        .get_block_mode(scb.block_mode)
        .expect("symbolic block mode must be enabled in the descriptor");
    let di = bsd.get_decimation_info(bm.decimation_mode as usize);
    let weight_count = di.weight_count;
    let is_dual_plane = bm.is_dual_plane;
    let real_weight_count = weight_count * if is_dual_plane { 2 } else { 1 };
    let partition_count = scb.partition_count as usize;

    let mut data = [0u8; 16];

    // Weights are stored bit-reversed from the top of the block downward;
    // dual plane weights interleave the two planes
    let mut weights = [0u8; BLOCK_MAX_WEIGHTS];
    if is_dual_plane {
        for i in 0..weight_count {
            weights[2 * i] = scb.weights[i];
            weights[2 * i + 1] = scb.weights[i + WEIGHTS_PLANE2_OFFSET];
        }
    } else {
        weights[..weight_count].copy_from_slice(&scb.weights[..weight_count]);
    }

    let mut weight_buf = [0u8; 16];
    encode_ise(
        bm.quant_mode,
        &weights[..real_weight_count],
        &mut weight_buf,
        0,
    );
    for i in 0..16 {
        data[i] |= weight_buf[15 - i].reverse_bits();
    }

    let weight_bits = ise_sequence_bitcount(real_weight_count as u32, bm.quant_mode) as usize;
    let below_weights = 128 - weight_bits;

    write_bits(&mut data, 0, 11, scb.block_mode as u32);
    write_bits(&mut data, 11, 2, partition_count as u32 - 1);

    let mut extra_bits = 0usize;
    let color_offset;
    if partition_count > 1 {
        write_bits(
            &mut data,
            13,
            PARTITION_INDEX_BITS,
            scb.partition_index as u32,
        );

        if scb.color_formats_matched {
            let cem = (scb.color_formats[0].index() as u32) << 2;
            write_bits(&mut data, 23, 6, cem);
        } else {
            // Class stream: a base class selector, one class offset bit
            // per partition, then two format bits per partition. The
            // first four stream bits ride in the main CEM field, the rest
            // sit below the weights.
            let min_class = scb
                .color_formats[..partition_count]
                .iter()
                .map(|f| f.index() / 4)
                .min()
                .unwrap();
            let mut stream = 0u32;
            let mut pos = 0;
            for p in 0..partition_count {
                let off = (scb.color_formats[p].index() / 4 - min_class) as u32;
                stream |= off << pos;
                pos += 1;
            }
            for p in 0..partition_count {
                let low = (scb.color_formats[p].index() & 3) as u32;
                stream |= low << pos;
                pos += 2;
            }

            let cem = (min_class as u32 + 1) | ((stream & 0xF) << 2);
            write_bits(&mut data, 23, 6, cem);
            extra_bits = 3 * partition_count - 4;
            write_bits(
                &mut data,
                below_weights - extra_bits,
                extra_bits,
                stream >> 4,
            );
        }
        color_offset = 29;
    } else {
        write_bits(&mut data, 13, 4, scb.color_formats[0].index() as u32);
        color_offset = 17;
    }

    if is_dual_plane {
        write_bits(
            &mut data,
            below_weights - extra_bits - 2,
            2,
            scb.plane2_component as u32,
        );
    }

    // Endpoint color integers
    let mut values = [0u8; 32];
    let mut value_count = 0;
    for p in 0..partition_count {
        let ints = scb.color_formats[p].integer_count();
        values[value_count..value_count + ints].copy_from_slice(&scb.color_values[p][..ints]);
        value_count += ints;
    }
    encode_ise(
        scb.quant_mode,
        &values[..value_count],
        &mut data,
        color_offset,
    );

    debug_assert!(
        color_offset
            + ise_sequence_bitcount(value_count as u32, scb.quant_mode) as usize
            <= below_weights - extra_bits - if is_dual_plane { 2 } else { 0 }
    );

    data
}

fn read_constant_block(data: &PhysicalBlock, is_3d: bool) -> SymbolicBlock {
    let f16 = read_bits(data, 9, 1) != 0;

    if is_3d {
        // 6 x 9 bit extent coordinates
        let mut coords = [0u32; 6];
        for (i, c) in coords.iter_mut().enumerate() {
            *c = read_bits(data, 10 + 9 * i, 9);
        }
        let all_ones = coords.iter().all(|&c| c == 0x1FF);
        if !all_ones
            && (coords[0] >= coords[1] || coords[2] >= coords[3] || coords[4] >= coords[5])
        {
            return SymbolicBlock::new_error();
        }
    } else {
        // Reserved bits must both be set
        if read_bits(data, 10, 2) != 0b11 {
            return SymbolicBlock::new_error();
        }
        // 4 x 13 bit extent coordinates
        let mut coords = [0u32; 4];
        for (i, c) in coords.iter_mut().enumerate() {
            *c = read_bits(data, 12 + 13 * i, 13);
        }
        let all_ones = coords.iter().all(|&c| c == 0x1FFF);
        if !all_ones && (coords[0] >= coords[1] || coords[2] >= coords[3]) {
            return SymbolicBlock::new_error();
        }
    }

    let mut color = [0i32; 4];
    for (i, c) in color.iter_mut().enumerate() {
        *c = LE::read_u16(&data[8 + 2 * i..]) as i32;
    }
    SymbolicBlock::new_constant(color, f16)
}

/// Convert a 128-bit physical encoding into symbolic form.
///
/// Copes with arbitrary input; malformed fields yield an error block.
pub fn physical_to_symbolic(bsd: &BlockSizeDescriptor, pcb: &PhysicalBlock) -> SymbolicBlock {
    let block_mode = read_bits(pcb, 0, 11) as u16;

    if block_mode as u32 & 0x1FF == VOID_EXTENT_SIGNATURE {
        return read_constant_block(pcb, bsd.zdim > 1);
    }

    let bm = match bsd.get_block_mode(block_mode) {
        Some(bm) => bm,
        None => return SymbolicBlock::new_error(),
    };
    let di = bsd.get_decimation_info(bm.decimation_mode as usize);
    let weight_count = di.weight_count;
    let is_dual_plane = bm.is_dual_plane;
    let real_weight_count = weight_count * if is_dual_plane { 2 } else { 1 };

    let partition_count = read_bits(pcb, 11, 2) as usize + 1;
    if is_dual_plane && partition_count == 4 {
        return SymbolicBlock::new_error();
    }

    let weight_bits = ise_sequence_bitcount(real_weight_count as u32, bm.quant_mode) as usize;
    let below_weights = 128 - weight_bits;

    // Undo the bit reversal and unpack the weight stream
    let mut reversed = [0u8; 16];
    for i in 0..16 {
        reversed[i] = pcb[15 - i].reverse_bits();
    }
    let mut packed_weights = [0u8; BLOCK_MAX_WEIGHTS];
    decode_ise(
        bm.quant_mode,
        real_weight_count,
        &reversed,
        &mut packed_weights,
        0,
    );

    let mut scb = SymbolicBlock::new_error();
    scb.block_type = BlockType::NonConst;
    scb.block_mode = block_mode;
    scb.partition_count = partition_count as u8;

    if is_dual_plane {
        for i in 0..weight_count {
            scb.weights[i] = packed_weights[2 * i];
            scb.weights[i + WEIGHTS_PLANE2_OFFSET] = packed_weights[2 * i + 1];
        }
    } else {
        scb.weights[..weight_count].copy_from_slice(&packed_weights[..weight_count]);
    }

    let mut extra_bits = 0usize;
    let color_offset;
    if partition_count > 1 {
        scb.partition_index = read_bits(pcb, 13, PARTITION_INDEX_BITS) as u16;

        let cem = read_bits(pcb, 23, 6);
        if cem & 3 == 0 {
            scb.color_formats_matched = true;
            let fmt = EndpointFormat::from_index((cem >> 2) as usize);
            for p in 0..partition_count {
                scb.color_formats[p] = fmt;
            }
        } else {
            let base_class = (cem & 3) as usize - 1;
            extra_bits = 3 * partition_count - 4;
            let extra = read_bits(pcb, below_weights - extra_bits, extra_bits);
            let stream = (cem >> 2) | (extra << 4);

            for p in 0..partition_count {
                let off = ((stream >> p) & 1) as usize;
                let low = ((stream >> (partition_count + 2 * p)) & 3) as usize;
                let class = base_class + off;
                if class > 3 {
                    return SymbolicBlock::new_error();
                }
                scb.color_formats[p] = EndpointFormat::from_index((class << 2) | low);
            }
        }
        color_offset = 29;
    } else {
        scb.partition_index = 0;
        scb.color_formats_matched = true;
        scb.color_formats[0] = EndpointFormat::from_index(read_bits(pcb, 13, 4) as usize);
        color_offset = 17;
    }

    if is_dual_plane {
        scb.plane2_component = read_bits(pcb, below_weights - extra_bits - 2, 2) as i8;
    } else {
        scb.plane2_component = -1;
    }

    let value_count: usize = scb.color_formats[..partition_count]
        .iter()
        .map(|f| f.integer_count())
        .sum();
    if value_count > 18 {
        return SymbolicBlock::new_error();
    }

    let color_bits = below_weights as i32
        - color_offset as i32
        - extra_bits as i32
        - if is_dual_plane { 2 } else { 0 };
    if color_bits <= 0 || color_bits > 127 {
        return SymbolicBlock::new_error();
    }
    let quant = QUANT_MODE_TABLE[value_count / 2][color_bits as usize];
    if quant < Quant::Q6 as i8 {
        return SymbolicBlock::new_error();
    }
    scb.quant_mode = Quant::from_index(quant as usize).unwrap();

    let mut values = [0u8; 32];
    decode_ise(scb.quant_mode, value_count, pcb, &mut values, color_offset);
    let mut cursor = 0;
    for p in 0..partition_count {
        let ints = scb.color_formats[p].integer_count();
        scb.color_values[p][..ints].copy_from_slice(&values[cursor..cursor + ints]);
        cursor += ints;
    }

    scb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_size::BlockSizeDescriptor;

    fn bsd_4x4() -> Box<BlockSizeDescriptor> {
        BlockSizeDescriptor::new(4, 4, 1, false, 1.0).unwrap()
    }

    #[test]
    fn test_constant_block_roundtrip() {
        let bsd = bsd_4x4();
        let scb = SymbolicBlock::new_constant([0x1234, 0x5678, 0x9ABC, 0xFFFF], false);
        let pcb = symbolic_to_physical(&bsd, &scb);

        assert_eq!(pcb[0] & 0xFF, 0xFC);

        let back = physical_to_symbolic(&bsd, &pcb);
        assert_eq!(back.block_type, BlockType::ConstU16);
        assert_eq!(back.constant_color, [0x1234, 0x5678, 0x9ABC, 0xFFFF]);
    }

    #[test]
    fn test_constant_f16_flag() {
        let bsd = bsd_4x4();
        let scb = SymbolicBlock::new_constant([0x3C00, 0x3C00, 0x3C00, 0x3C00], true);
        let pcb = symbolic_to_physical(&bsd, &scb);
        let back = physical_to_symbolic(&bsd, &pcb);
        assert_eq!(back.block_type, BlockType::ConstF16);
    }

    #[test]
    fn test_error_block_encodes_to_error() {
        let bsd = bsd_4x4();
        let scb = SymbolicBlock::new_error();
        let pcb = symbolic_to_physical(&bsd, &scb);
        let back = physical_to_symbolic(&bsd, &pcb);
        assert_eq!(back.block_type, BlockType::Error);
    }

    fn find_single_plane_mode(bsd: &BlockSizeDescriptor) -> (u16, usize, Quant) {
        for bm in &bsd.block_modes {
            if !bm.is_dual_plane {
                let di = bsd.get_decimation_info(bm.decimation_mode as usize);
                return (bm.mode_index, di.weight_count, bm.quant_mode);
            }
        }
        panic!("no single plane mode");
    }

    #[test]
    fn test_nonconst_roundtrip_single_partition() {
        let bsd = bsd_4x4();
        let (mode, weight_count, wquant) = find_single_plane_mode(&bsd);

        let mut scb = SymbolicBlock::new_error();
        scb.block_type = BlockType::NonConst;
        scb.block_mode = mode;
        scb.partition_count = 1;
        scb.partition_index = 0;
        scb.color_formats_matched = true;
        scb.plane2_component = -1;
        scb.color_formats = [EndpointFormat::Rgb; 4];
        scb.quant_mode = Quant::Q256;
        for i in 0..6 {
            scb.color_values[0][i] = [10, 200, 20, 180, 30, 160][i];
        }
        for w in 0..weight_count {
            scb.weights[w] = (w as u32 % wquant.levels()) as u8;
        }

        let pcb = symbolic_to_physical(&bsd, &scb);
        let back = physical_to_symbolic(&bsd, &pcb);

        assert_eq!(back.block_type, BlockType::NonConst);
        assert_eq!(back.block_mode, scb.block_mode);
        assert_eq!(back.partition_count, 1);
        assert_eq!(back.color_formats[0], EndpointFormat::Rgb);
        assert_eq!(back.plane2_component, -1);
        assert_eq!(back.color_values[0][..6], scb.color_values[0][..6]);
        assert_eq!(back.weights[..weight_count], scb.weights[..weight_count]);
    }

    #[test]
    fn test_reserved_mode_is_error() {
        let bsd = bsd_4x4();
        // Raw mode 0 has a reserved range field
        let mut pcb = [0u8; 16];
        pcb[0] = 0;
        let back = physical_to_symbolic(&bsd, &pcb);
        assert_eq!(back.block_type, BlockType::Error);
    }
}
