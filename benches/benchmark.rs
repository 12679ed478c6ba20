use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use astc_codec::image::{fetch_image_block, AstcImage, ImageData, Swizzle};
use astc_codec::{Config, Context, Profile};

criterion_main!(benches);
criterion_group!(benches, compress_4x4, compress_8x8, decompress_4x4);

fn test_pixels(n: usize) -> Vec<u8> {
    // Deterministic mixed-content texture
    (0..n * 4)
        .map(|i| {
            let x = i as u32;
            (x.wrapping_mul(2654435761) >> 24) as u8
        })
        .collect()
}

fn compress_blocks(c: &mut Criterion, name: &str, block: u32) {
    let mut group = c.benchmark_group(name);

    for preset in ["fast", "medium", "thorough"] {
        let config = match preset {
            "fast" => Config::new_fast(Profile::Ldr, block, block, 1),
            "medium" => Config::new_medium(Profile::Ldr, block, block, 1),
            _ => Config::new_thorough(Profile::Ldr, block, block, 1),
        };
        let ctx = Context::new(config).unwrap();
        let bsd = ctx.block_size_descriptor();

        let pixels = test_pixels((block * block) as usize);
        let img = AstcImage {
            width: block,
            height: block,
            depth: 1,
            data: ImageData::Unorm8(&pixels),
        };
        let blk = fetch_image_block(Profile::Ldr, &img, bsd, 0, 0, 0, Swizzle::RGBA);
        let mut tmpbuf = ctx.alloc_working_buffers();

        group.bench_with_input(BenchmarkId::from_parameter(preset), &blk, |b, blk| {
            b.iter(|| ctx.compress_block(blk, &mut tmpbuf));
        });
    }
    group.finish();
}

fn compress_4x4(c: &mut Criterion) {
    compress_blocks(c, "compress_4x4", 4);
}

fn compress_8x8(c: &mut Criterion) {
    compress_blocks(c, "compress_8x8", 8);
}

fn decompress_4x4(c: &mut Criterion) {
    let config = Config::new_medium(Profile::Ldr, 4, 4, 1);
    let ctx = Context::new(config).unwrap();
    let bsd = ctx.block_size_descriptor();

    let pixels = test_pixels(16);
    let img = AstcImage {
        width: 4,
        height: 4,
        depth: 1,
        data: ImageData::Unorm8(&pixels),
    };
    let blk = fetch_image_block(Profile::Ldr, &img, bsd, 0, 0, 0, Swizzle::RGBA);
    let mut tmpbuf = ctx.alloc_working_buffers();
    let (_, pcb) = ctx.compress_block(&blk, &mut tmpbuf);

    c.bench_function("decompress_4x4", |b| {
        b.iter(|| ctx.decompress_block(&pcb, 0, 0, 0));
    });
}
