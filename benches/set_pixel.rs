// Run with:  cargo bench --bench set_pixel

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use embedded_graphics::prelude::Point;
use flipdot_framebuffer::{DotState, FrameBuffer};
use std::hint::black_box;

const COLS: usize = 112;
const ROWS: usize = 16;

fn set_pixel(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_pixel");
    group.throughput(Throughput::Elements((ROWS * COLS) as u64));

    group.bench_function("set_pending", |b| {
        let mut fb = FrameBuffer::<COLS, ROWS>::new();

        b.iter(|| {
            for y in 0..ROWS {
                for x in 0..COLS {
                    black_box(&mut fb)
                        .set_pending(
                            black_box(Point::new(x as i32, y as i32)),
                            black_box(DotState::Yellow),
                        )
                        .unwrap();
                }
            }
        });
    });

    group.bench_function("plot_clipped", |b| {
        let mut fb = FrameBuffer::<COLS, ROWS>::new();

        b.iter(|| {
            for y in -1..=ROWS as i32 {
                for x in -1..=COLS as i32 {
                    black_box(&mut fb)
                        .plot(black_box(Point::new(x, y)), black_box(DotState::Yellow));
                }
            }
        });
    });

    group.finish();
}

criterion_group!(benches, set_pixel);
criterion_main!(benches);
