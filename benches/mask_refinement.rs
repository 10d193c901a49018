use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sticker_bgremove::{
    feather_mask, BackendKind, BackgroundRemover, BinaryMask, MaskBuilder, RegionSelector,
    RemovalConfig, SaliencyMap, SeedPoint,
};

/// Saliency with one large subject and a scatter of small speckles
fn speckled_saliency(size: u32) -> SaliencyMap {
    let center = size as f32 / 2.0;
    let data = (0..size * size)
        .map(|i| {
            let (x, y) = ((i % size) as f32, (i / size) as f32);
            let r = ((x - center).powi(2) + (y - center).powi(2)).sqrt() / center;
            if r < 0.6 || (i % 97 == 0) {
                1.0
            } else {
                0.0
            }
        })
        .collect();
    SaliencyMap::new(size, size, data).expect("valid saliency")
}

fn mask_for(size: u32) -> BinaryMask {
    MaskBuilder::build(&speckled_saliency(size), size, size, 128)
}

fn bench_region_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("region_selection");
    for size in [256_u32, 1024] {
        let mask = mask_for(size);
        let seed = SeedPoint::new(i64::from(size / 2), i64::from(size / 2));

        group.bench_with_input(BenchmarkId::new("largest", size), &mask, |b, mask| {
            b.iter(|| RegionSelector::select(black_box(mask), None));
        });
        group.bench_with_input(BenchmarkId::new("seeded", size), &mask, |b, mask| {
            b.iter(|| RegionSelector::select(black_box(mask), Some(seed)));
        });
    }
    group.finish();
}

fn bench_feathering(c: &mut Criterion) {
    let mut group = c.benchmark_group("feathering");
    let mask = mask_for(1024);
    for radius in [1_u32, 2, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(radius), &radius, |b, &radius| {
            b.iter(|| feather_mask(black_box(&mask), radius));
        });
    }
    group.finish();
}

fn bench_full_refinement(c: &mut Criterion) {
    let config = RemovalConfig::builder()
        .backend(BackendKind::Mock)
        .build()
        .expect("valid config");
    let remover = BackgroundRemover::new(config).expect("mock remover");
    let saliency = speckled_saliency(320);

    c.bench_function("refine_320_to_1280", |b| {
        b.iter(|| remover.refine(black_box(&saliency), 1280, 1280, None));
    });
}

criterion_group!(
    benches,
    bench_region_selection,
    bench_feathering,
    bench_full_refinement
);
criterion_main!(benches);
