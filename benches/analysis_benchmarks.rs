//! Benchmarks for the per-frame pure components

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use expression_analysis::actions::classify;
use expression_analysis::anomaly::MotionAnomalyDetector;
use expression_analysis::constants::NUM_POSE_LANDMARKS;
use expression_analysis::landmarks::{Landmark, LandmarkSet};

fn test_pose(seed: f32) -> LandmarkSet {
    let mut points = [Landmark::default(); NUM_POSE_LANDMARKS];
    for (i, point) in points.iter_mut().enumerate() {
        let t = seed + i as f32 * 0.03;
        *point = Landmark::new(0.5 + 0.3 * t.sin(), 0.5 + 0.3 * t.cos(), 0.1 * t.sin());
    }
    LandmarkSet::new(points)
}

fn benchmark_action_classification(c: &mut Criterion) {
    let pose = test_pose(0.0);

    c.bench_function("classify_actions", |b| {
        b.iter(|| black_box(classify(black_box(Some(&pose)))));
    });

    c.bench_function("classify_actions_absent", |b| {
        b.iter(|| black_box(classify(black_box(None))));
    });
}

fn benchmark_anomaly_detection(c: &mut Criterion) {
    let detector = MotionAnomalyDetector::new(0.2);
    let previous = test_pose(0.0);
    let current = test_pose(0.5);

    c.bench_function("anomaly_check", |b| {
        b.iter(|| black_box(detector.check(black_box(Some(&previous)), black_box(&current))));
    });
}

criterion_group!(benches, benchmark_action_classification, benchmark_anomaly_detection);
criterion_main!(benches);
