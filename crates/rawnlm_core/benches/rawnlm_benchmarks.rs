//! Criterion benchmarks for raw NL-means core operations.
//!
//! Run with: cargo bench -p rawnlm_core
//! Run specific: cargo bench -p rawnlm_core -- patch_distance

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ndarray::{Array2, Axis};
use rand::prelude::*;

use rawnlm_core::patch_distance::{
    brute_force_distance, fill_band_distances, fill_squared_differences, PatchGeometry, RowScratch,
    ValidRegion,
};
use rawnlm_core::shift::Shift;
use rawnlm_core::{
    denoise_raw, stabilize_frame, CfaLayout, NlmConfig, NoiseModel, RawFrame, DEFAULT_BAND_ROWS,
};

// =============================================================================
// Helper Functions for Test Data Generation
// =============================================================================

fn random_raw_u16(rows: usize, cols: usize, seed: u64) -> Vec<u16> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..rows * cols)
        .map(|_| rng.gen_range(200u16..4000u16))
        .collect()
}

fn random_stabilized(rows: usize, cols: usize, seed: u64) -> Array2<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_fn((rows, cols), |_| 20.0 + 10.0 * rng.gen::<f32>())
}

// =============================================================================
// Variance Stabilization
// =============================================================================

fn bench_stabilize(c: &mut Criterion) {
    let mut group = c.benchmark_group("stabilize");
    let cfa = CfaLayout::bayer();
    let model = NoiseModel::<f32>::uniform(cfa, 2.0, 64.0).unwrap();

    for size in [64, 256, 1024] {
        let data = random_raw_u16(size, size, 7);
        let frame = RawFrame::from_slice(&data, size, size, cfa).unwrap();
        group.throughput(Throughput::Elements((size * size) as u64));
        group.bench_with_input(BenchmarkId::new("forward", size), &size, |b, _| {
            b.iter(|| stabilize_frame::<u16, f32>(black_box(frame.view()), &model))
        });
    }

    group.finish();
}

// =============================================================================
// Patch Distance: sliding window vs brute force
// =============================================================================

fn bench_patch_distance(c: &mut Criterion) {
    let mut group = c.benchmark_group("patch_distance");
    let size = 256;
    let stabilized = random_stabilized(size, size, 42);
    let shift = Shift { dx: 2, dy: -2 };

    for radius in [1usize, 2, 4] {
        let geometry = PatchGeometry::new(radius, 2);
        let Some(region) = ValidRegion::for_shift(size, size, shift, geometry) else {
            continue;
        };
        group.throughput(Throughput::Elements(region.pixel_count() as u64));

        let mut diff = Array2::zeros((size, size));
        let mut distances = Array2::zeros((size, size));
        let mut scratch = RowScratch::new(size);
        group.bench_with_input(BenchmarkId::new("sliding", radius), &radius, |b, _| {
            b.iter(|| {
                fill_squared_differences(stabilized.view(), shift, &region, geometry, &mut diff);
                for (band_idx, band) in distances
                    .axis_chunks_iter_mut(Axis(0), DEFAULT_BAND_ROWS)
                    .enumerate()
                {
                    fill_band_distances(
                        diff.view(),
                        &region,
                        geometry,
                        band_idx * DEFAULT_BAND_ROWS,
                        band,
                        &mut scratch,
                    );
                }
                black_box(&distances);
            })
        });

        group.bench_with_input(BenchmarkId::new("brute_force", radius), &radius, |b, _| {
            b.iter(|| {
                let mut total = 0.0f32;
                for y in region.y_start..region.y_end {
                    for x in region.x_start..region.x_end {
                        total += brute_force_distance(stabilized.view(), shift, geometry, x, y)
                            .unwrap_or(0.0);
                    }
                }
                black_box(total)
            })
        });
    }

    group.finish();
}

// =============================================================================
// Full Pipeline
// =============================================================================

fn bench_denoise_raw(c: &mut Criterion) {
    let mut group = c.benchmark_group("denoise_raw");
    group.sample_size(10);

    for (label, cfa) in [("bayer", CfaLayout::bayer()), ("xtrans", CfaLayout::xtrans())] {
        let model = NoiseModel::<f32>::poissonian(cfa);
        let config = NlmConfig::<f32>::new()
            .with_patch_radius(2)
            .with_neighborhood_radius(3);

        for size in [128, 256, 512] {
            let data = random_raw_u16(size, size, 11);
            let frame = RawFrame::from_slice(&data, size, size, cfa).unwrap();
            group.throughput(Throughput::Elements((size * size) as u64));
            group.bench_with_input(BenchmarkId::new(label, size), &size, |b, _| {
                b.iter(|| denoise_raw(black_box(&frame), &model, &config).unwrap())
            });
        }
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_stabilize,
    bench_patch_distance,
    bench_denoise_raw
);
criterion_main!(benches);
