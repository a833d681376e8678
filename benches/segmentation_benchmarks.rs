use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{Rgba, RgbaImage};
use mockup_pipeline::{
    composite_onto, compute_background_mask, fit_contain, thumbnails::encode_thumbnail,
    BackgroundThreshold, BoundingBox,
};

/// Light studio backdrop with a darker garment silhouette in the middle
fn garment_photo(size: u32) -> RgbaImage {
    let center = size as f32 / 2.0;
    RgbaImage::from_fn(size, size, |x, y| {
        let dx = (x as f32 - center) / center;
        let dy = (y as f32 - center) / center;
        if dx * dx + dy * dy < 0.45 {
            Rgba([40, 60, 120, 255])
        } else {
            Rgba([250, 250, 248, 255])
        }
    })
}

fn bench_flood_fill(c: &mut Criterion) {
    let mut group = c.benchmark_group("background_mask");
    let threshold = BackgroundThreshold::default();
    for size in [256u32, 1024] {
        let image = garment_photo(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &image, |b, image| {
            b.iter(|| compute_background_mask(black_box(image), &threshold));
        });
    }
    group.finish();
}

fn bench_composite(c: &mut Criterion) {
    let drawing = RgbaImage::from_pixel(800, 600, Rgba([200, 20, 20, 255]));
    let placeholder = garment_photo(1024);
    let bbox = BoundingBox::new(312, 280, 400, 480).unwrap();

    c.bench_function("fit_and_composite", |b| {
        b.iter(|| {
            let fitted = fit_contain(black_box(&drawing), bbox.w, bbox.h);
            let mut canvas = placeholder.clone();
            composite_onto(&mut canvas, &fitted, &bbox);
            canvas
        });
    });
}

fn bench_thumbnail(c: &mut Criterion) {
    let image = garment_photo(1024);
    c.bench_function("grid_thumbnail_webp", |b| {
        b.iter(|| encode_thumbnail(black_box(&image), 640, 75));
    });
}

criterion_group!(benches, bench_flood_fill, bench_composite, bench_thumbnail);
criterion_main!(benches);
