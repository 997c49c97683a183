use can_bus::CanFrame;
use capture_buffer::CaptureBuffer;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_push_pop(c: &mut Criterion) {
    let buffer = CaptureBuffer::with_default_capacity();
    let frame = CanFrame::new(0x123, &[0xAA, 0xBB, 0xCC, 0xDD]).unwrap();

    c.bench_function("push_pop", |b| {
        b.iter(|| {
            buffer.push(black_box(frame));
            black_box(buffer.pop())
        })
    });

    c.bench_function("fill_drain_255", |b| {
        b.iter(|| {
            for _ in 0..buffer.max_len() {
                buffer.push(frame);
            }
            while let Some(f) = buffer.pop() {
                black_box(f);
            }
        })
    });
}

criterion_group!(benches, bench_push_pop);
criterion_main!(benches);
