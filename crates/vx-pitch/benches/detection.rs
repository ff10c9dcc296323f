//! Pitch analysis benchmarks
//!
//! Frame extraction dominates a separation request, so it is measured at a
//! few clip lengths alongside segmentation and the distribution pass.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use vx_core::FrameLayout;
use vx_pitch::detection::PeakPickingDetector;
use vx_pitch::distribution::{DistributionAnalyzer, DistributionConfig};
use vx_pitch::segment::Segmenter;
use vx_pitch::PitchConfig;

const SAMPLE_RATE: u32 = 22050;
const CLIP_SECONDS: &[usize] = &[1, 5, 15];

/// Two alternating voices with a short pause between them
fn generate_dialogue(seconds: usize) -> Vec<f64> {
    let len = seconds * SAMPLE_RATE as usize;
    (0..len)
        .map(|i| {
            let t = i as f64 / SAMPLE_RATE as f64;
            let phrase = t.fract();
            let freq = if (t as usize) % 2 == 0 { 140.0 } else { 230.0 };
            if phrase > 0.8 {
                0.0
            } else {
                let w = 2.0 * std::f64::consts::PI * freq * t;
                0.5 * w.sin() + 0.2 * (2.0 * w).sin()
            }
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// FRAME EXTRACTION
// ═══════════════════════════════════════════════════════════════════════════════

fn bench_frame_detection(c: &mut Criterion) {
    let mut group = c.benchmark_group("Frame Detection");
    let detector = match PeakPickingDetector::new(PitchConfig::default(), SAMPLE_RATE) {
        Ok(d) => d,
        Err(e) => panic!("detector: {}", e),
    };

    for &seconds in CLIP_SECONDS {
        let samples = generate_dialogue(seconds);
        group.bench_with_input(BenchmarkId::new("peak_picking", seconds), &samples, |b, s| {
            b.iter(|| black_box(detector.detect_frames(black_box(s))))
        });
    }

    group.finish();
}

// ═══════════════════════════════════════════════════════════════════════════════
// SEGMENTATION + DISTRIBUTION
// ═══════════════════════════════════════════════════════════════════════════════

fn bench_segmentation(c: &mut Criterion) {
    let segmenter = match Segmenter::new(FrameLayout::default(), 20.0) {
        Ok(s) => s,
        Err(e) => panic!("segmenter: {}", e),
    };
    let samples = generate_dialogue(5);

    c.bench_function("segment_split_5s", |b| {
        b.iter(|| black_box(segmenter.split(black_box(&samples))))
    });
}

fn bench_distribution(c: &mut Criterion) {
    let analyzer = match DistributionAnalyzer::new(DistributionConfig::default()) {
        Ok(a) => a,
        Err(e) => panic!("analyzer: {}", e),
    };
    let pitches: Vec<f64> = (0..10_000)
        .map(|i| (if i % 2 == 0 { 150.0 } else { 220.0 }) + (i % 7) as f64 - 3.0)
        .collect();

    c.bench_function("distribution_10k_frames", |b| {
        b.iter(|| black_box(analyzer.from_frequencies(black_box(&pitches))))
    });
}

criterion_group!(
    benches,
    bench_frame_detection,
    bench_segmentation,
    bench_distribution,
);

criterion_main!(benches);
