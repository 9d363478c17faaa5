//! Benchmarks for wire framing: the mouse-move path dominates traffic, so it
//! gets its own encode and decode measurements.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tx2tx_core::domain::geometry::NormalizedPoint;
use tx2tx_core::protocol::codec::{encode_frame, FrameDecoder};
use tx2tx_core::protocol::message::Message;

fn bench_encode_mouse_move(c: &mut Criterion) {
    let msg = Message::mouse_move(NormalizedPoint::new(0.4231, 0.7712));
    c.bench_function("codec_encode_mouse_move", |b| {
        b.iter(|| black_box(encode_frame(black_box(&msg)).unwrap()));
    });
}

fn bench_decode_mouse_move(c: &mut Criterion) {
    let frame = encode_frame(&Message::mouse_move(NormalizedPoint::new(0.4231, 0.7712))).unwrap();
    c.bench_function("codec_decode_mouse_move", |b| {
        b.iter(|| {
            let mut decoder = FrameDecoder::new();
            decoder.extend(black_box(&frame)).unwrap();
            black_box(decoder.next_message().unwrap())
        });
    });
}

criterion_group!(benches, bench_encode_mouse_move, bench_decode_mouse_move);
criterion_main!(benches);
