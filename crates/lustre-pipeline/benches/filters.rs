//! Benchmarks for the heavy spatial filters and full pipeline runs.
//!
//! Run with: cargo bench -p lustre-pipeline

#![allow(clippy::unwrap_used)]

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use lustre_pipeline::bilateral::{BilateralParams, bilateral_filter};
use lustre_pipeline::blur::gaussian_blur;
use lustre_pipeline::local_contrast::{LocalContrastParams, enhance_local_contrast};
use lustre_pipeline::resample::resample;
use lustre_pipeline::{FilterSettings, Mode, OutputFormat, PipelineConfig, RgbaImage};

const SIZES: [u32; 3] = [256, 512, 1024];

/// Synthetic photo-like content: gradients plus a checker of edges.
fn test_image(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let r = u8::try_from(x * 255 / width).unwrap();
        let g = u8::try_from(y * 255 / height).unwrap();
        let b = if (x / 16 + y / 16) % 2 == 0 { 60 } else { 190 };
        image::Rgba([r, g, b, 255])
    })
}

fn bench_blur(c: &mut Criterion) {
    let mut group = c.benchmark_group("gaussian_blur");
    for size in SIZES {
        let image = test_image(size, size);
        group.throughput(Throughput::Elements(u64::from(size) * u64::from(size)));
        group.bench_with_input(
            BenchmarkId::new("radius_2", format!("{size}x{size}")),
            &image,
            |b, img| b.iter(|| gaussian_blur(black_box(img), 2.0).unwrap()),
        );
    }
    group.finish();
}

fn bench_bilateral(c: &mut Criterion) {
    let mut group = c.benchmark_group("bilateral");
    group.sample_size(10);
    for size in SIZES {
        let image = test_image(size, size);
        group.throughput(Throughput::Elements(u64::from(size) * u64::from(size)));
        group.bench_with_input(
            BenchmarkId::new("enhance_chain", format!("{size}x{size}")),
            &image,
            |b, img| {
                b.iter(|| bilateral_filter(black_box(img), BilateralParams::ENHANCE_CHAIN).unwrap());
            },
        );
    }
    group.finish();
}

fn bench_local_contrast(c: &mut Criterion) {
    let mut group = c.benchmark_group("local_contrast");
    for size in SIZES {
        let image = test_image(size, size);
        group.throughput(Throughput::Elements(u64::from(size) * u64::from(size)));
        group.bench_with_input(
            BenchmarkId::new("block_64", format!("{size}x{size}")),
            &image,
            |b, img| {
                b.iter_batched_ref(
                    || img.clone(),
                    |work| enhance_local_contrast(black_box(work), LocalContrastParams::default()),
                    criterion::BatchSize::LargeInput,
                );
            },
        );
    }
    group.finish();
}

fn bench_resample(c: &mut Criterion) {
    let mut group = c.benchmark_group("resample");
    let image = test_image(1024, 1024);
    for scale in [0.5, 2.0] {
        group.bench_with_input(BenchmarkId::new("bicubic", scale), &scale, |b, &s| {
            b.iter(|| resample(black_box(&image), s).unwrap());
        });
    }
    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    group.sample_size(10);
    let image = test_image(640, 480);
    let settings = FilterSettings {
        sharpening: 40.0,
        denoising: 30.0,
        brightness: 10.0,
        contrast: 15.0,
        saturation: 10.0,
        ai_enhance: true,
    };
    let config = PipelineConfig {
        output: OutputFormat::Raw,
        ..PipelineConfig::default()
    };
    for mode in [Mode::Preview, Mode::Final] {
        group.bench_with_input(BenchmarkId::new("all_stages", mode), &mode, |b, &m| {
            b.iter(|| lustre_pipeline::process(image.clone(), &settings, m, &config).unwrap());
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_blur,
    bench_bilateral,
    bench_local_contrast,
    bench_resample,
    bench_pipeline
);
criterion_main!(benches);
