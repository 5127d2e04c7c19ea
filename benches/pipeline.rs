//! Benchmarks for the ocean pipeline stages
//!
//! Run with: cargo bench

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use glam::IVec2;
use rustfft::num_complex::Complex32;

use oceanfft::ocean::{synthesize, CascadeManager, SpectralTransform, SPECTRAL_CHANNELS};
use oceanfft::params::{default_cascades, CascadeParameters, MapResolution};

const SIZES: [MapResolution; 3] = [MapResolution::R128, MapResolution::R256, MapResolution::R512];

/// Spectrum synthesis runs only when parameters change
fn bench_synthesize(c: &mut Criterion) {
    let params = CascadeParameters::default();
    let mut group = c.benchmark_group("synthesize");

    for resolution in SIZES {
        group.throughput(Throughput::Elements(resolution.cells() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(resolution),
            &resolution,
            |b, &resolution| b.iter(|| synthesize(black_box(&params), resolution, IVec2::new(1, 2))),
        );
    }

    group.finish();
}

/// One cascade's worth of channels through the inverse transform
fn bench_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("inverse_transform");

    for resolution in SIZES {
        let mut transform = SpectralTransform::new(resolution, SPECTRAL_CHANNELS).unwrap();
        let field: Vec<Complex32> = (0..SPECTRAL_CHANNELS * resolution.cells())
            .map(|i| Complex32::new((i as f32 * 0.1).sin(), (i as f32 * 0.3).cos()))
            .collect();
        let mut data = field.clone();

        group.throughput(Throughput::Elements(field.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(resolution), &resolution, |b, _| {
            b.iter(|| {
                data.copy_from_slice(&field);
                transform.inverse_2d(black_box(&mut data));
            })
        });
    }

    group.finish();
}

/// Full step of the three default cascades
fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("step");

    for resolution in SIZES {
        let mut manager = CascadeManager::default();
        manager.configure(&default_cascades(), resolution).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(resolution), &resolution, |b, _| {
            b.iter(|| {
                manager.step(black_box(1.0 / 60.0)).unwrap();
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_synthesize, bench_transform, bench_step);
criterion_main!(benches);
