//! Criterion benchmarks for line framing and frame decoding.
//!
//! The device emits a frame every few milliseconds; decoding must stay far
//! below that so the control loop is never the bottleneck.
//!
//! Run with:
//! ```bash
//! cargo bench --package sensor-core --bench decode_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sensor_core::{FrameDecoder, LineFramer, ViewerMessage};

const VALID_LINE: &str = "512 498 1023 0 77 12 9 640 333 101 0 0 1023 256 700 301";
const NOISE_LINE: &str = "Calibration complete. Starting main loop...";

fn bench_decode(c: &mut Criterion) {
    let decoder = FrameDecoder::default();

    c.bench_function("decode_valid_frame", |b| {
        b.iter(|| decoder.decode(black_box(VALID_LINE)))
    });

    c.bench_function("decode_reject_noise", |b| {
        b.iter(|| decoder.decode(black_box(NOISE_LINE)))
    });
}

fn bench_frame_to_json(c: &mut Criterion) {
    let frame = FrameDecoder::default()
        .decode(VALID_LINE)
        .expect("benchmark fixture is a valid frame");
    let msg = ViewerMessage::from(frame);

    c.bench_function("frame_to_json", |b| b.iter(|| black_box(&msg).to_json()));
}

fn bench_framer(c: &mut Criterion) {
    let mut stream = Vec::new();
    for _ in 0..64 {
        stream.extend_from_slice(VALID_LINE.as_bytes());
        stream.extend_from_slice(b"\r\n");
    }

    c.bench_function("frame_64_lines_in_4k_reads", |b| {
        b.iter(|| {
            let mut framer = LineFramer::new();
            let mut count = 0usize;
            for chunk in stream.chunks(4096) {
                framer.extend(chunk);
                while let Some(line) = framer.next_line() {
                    if line.is_ok() {
                        count += 1;
                    }
                }
            }
            black_box(count)
        })
    });
}

criterion_group!(benches, bench_decode, bench_frame_to_json, bench_framer);
criterion_main!(benches);
