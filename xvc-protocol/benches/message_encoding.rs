use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::io::Cursor;
use xvc_protocol::{Message, Version, XvcInfo};

fn bench_message_write(c: &mut Criterion) {
    let shift = Message::Shift {
        num_bits: 256,
        tms: vec![0u8; 32].into_boxed_slice(),
        tdi: vec![0xFFu8; 32].into_boxed_slice(),
    };
    c.bench_function("shift_write_to", |b| {
        b.iter(|| {
            let mut out = Vec::with_capacity(128);
            black_box(&shift).write_to(&mut out).unwrap();
            black_box(out);
        })
    });
}

fn bench_message_read(c: &mut Criterion) {
    let mut wire = Vec::new();
    let shift = Message::Shift {
        num_bits: 256,
        tms: vec![0u8; 32].into_boxed_slice(),
        tdi: vec![0xFFu8; 32].into_boxed_slice(),
    };
    shift.write_to(&mut wire).unwrap();

    c.bench_function("shift_from_reader", |b| {
        b.iter(|| {
            let mut cursor = Cursor::new(&wire);
            black_box(Message::from_reader(&mut cursor, 64).unwrap());
        })
    });
}

fn bench_xvc_info_roundtrip(c: &mut Criterion) {
    let info = XvcInfo::new(Version::V1_0, 2048);
    c.bench_function("xvc_info_roundtrip", |b| {
        b.iter(|| {
            let mut out = Vec::with_capacity(32);
            black_box(&info).write_to(&mut out).unwrap();
            let mut cursor = Cursor::new(&out);
            black_box(XvcInfo::from_reader(&mut cursor).unwrap());
        })
    });
}

criterion_group!(
    benches,
    bench_message_write,
    bench_message_read,
    bench_xvc_info_roundtrip
);
criterion_main!(benches);
