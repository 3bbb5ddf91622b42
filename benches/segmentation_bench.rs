// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Benchmarks for normal estimation and plane segmentation.
//!
//! Measures:
//! - Integral-image normal estimation at common depth sensor resolutions
//! - Region-growing segmentation with and without the refinement sweep
//! - Full automatic estimation
//!
//! Run with: cargo bench --bench segmentation_bench
//!
//! For on-target profiling, cross-compile and run:
//!   cargo bench --bench segmentation_bench --target aarch64-unknown-linux-gnu

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use edgefirst_groundplane::{
    EstimatorConfig, PointCloud, PointXyz, estimate_automatic,
    normals::{NormalParams, estimate_normals},
    segmentation::{SegmentationParams, segment_planes},
};

/// Generate an organized indoor scene as seen by a depth camera.
///
/// The upper half of the image is a back wall at 6 m with a box in front of
/// it, the lower half is the floor 1.5 m below the sensor. Every 97th pixel
/// is an invalid return.
fn generate_scene(width: usize, height: usize) -> PointCloud<PointXyz> {
    let fx = width as f32 / 1.2;
    let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
    let mut points = Vec::with_capacity(width * height);

    for v in 0..height {
        for u in 0..width {
            if (v * width + u) % 97 == 0 {
                points.push(PointXyz::nan());
                continue;
            }
            let rx = (u as f32 - cx) / fx;
            let ry = (v as f32 - cy) / fx;
            // Floor ray hits y = 1.5 before the wall
            let z = if ry > 0.25 { (1.5 / ry).min(6.0) } else { 6.0 };
            let in_box = (u as f32 - cx).abs() < width as f32 / 10.0
                && ry > 0.0
                && ry < 0.25;
            let z = if in_box { 4.0 } else { z };
            points.push(PointXyz::new(rx * z, ry * z, z));
        }
    }

    PointCloud {
        points,
        width,
        height,
    }
}

/// Resolutions: QQVGA, QVGA, VGA
const RESOLUTIONS: [(usize, usize); 3] = [(160, 120), (320, 240), (640, 480)];

fn bench_normals(c: &mut Criterion) {
    let mut group = c.benchmark_group("normals");
    group.sample_size(20);

    for &(w, h) in &RESOLUTIONS {
        let scene = generate_scene(w, h);
        group.throughput(Throughput::Elements((w * h) as u64));
        group.bench_with_input(
            BenchmarkId::new("integral", format!("{}x{}", w, h)),
            &scene,
            |b, scene| b.iter(|| estimate_normals(scene, &NormalParams::default())),
        );
    }

    group.finish();
}

fn bench_segmentation(c: &mut Criterion) {
    let mut group = c.benchmark_group("segmentation");
    group.sample_size(20);

    for &(w, h) in &RESOLUTIONS {
        let scene = generate_scene(w, h);
        let Ok(normals) = estimate_normals(&scene, &NormalParams::default()) else {
            continue;
        };
        group.throughput(Throughput::Elements((w * h) as u64));

        for refine in [false, true] {
            let params = SegmentationParams {
                refine,
                ..Default::default()
            };
            let name = if refine { "refined" } else { "grow_only" };
            group.bench_with_input(
                BenchmarkId::new(name, format!("{}x{}", w, h)),
                &scene,
                |b, scene| b.iter(|| segment_planes(scene, &normals, &params)),
            );
        }
    }

    group.finish();
}

fn bench_automatic(c: &mut Criterion) {
    let scene = generate_scene(640, 480);
    let config = EstimatorConfig::default();
    c.bench_function("estimate_automatic_640x480", |b| {
        b.iter(|| estimate_automatic(&scene, &config))
    });
}

criterion_group!(benches, bench_normals, bench_segmentation, bench_automatic);
criterion_main!(benches);
