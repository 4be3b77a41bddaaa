use criterion::{black_box, criterion_group, criterion_main, Criterion};
use echonet_lite_rs::frame::{EchonetObject, Esv, Frame};
use echonet_lite_rs::property_map::{decode_property_map, PropertyMapVariant};

fn encode_benchmark(c: &mut Criterion) {
    let frame = Frame::request(
        42,
        EchonetObject::CONTROLLER,
        EchonetObject::SOLAR_POWER,
        Esv::SetC,
        0xE2,
        vec![0x12, 0x34],
    );
    c.bench_function("frame_encode", |b| {
        b.iter(|| black_box(&frame).encode().unwrap())
    });
}

fn decode_benchmark(c: &mut Criterion) {
    let encoded = Frame::request(
        42,
        EchonetObject::SOLAR_POWER,
        EchonetObject::CONTROLLER,
        Esv::GetRes,
        0xE0,
        vec![0x00, 0x01, 0x02, 0x03],
    )
    .encode()
    .unwrap();
    c.bench_function("frame_decode", |b| {
        b.iter(|| Frame::decode(black_box(&encoded)).unwrap())
    });
}

fn property_map_benchmark(c: &mut Criterion) {
    let mut bitmap = [0xFFu8; 17];
    bitmap[0] = 128;
    c.bench_function("property_map_decode_settable", |b| {
        b.iter(|| decode_property_map(black_box(&bitmap), PropertyMapVariant::Settable).unwrap())
    });
    c.bench_function("property_map_decode_gettable", |b| {
        b.iter(|| decode_property_map(black_box(&bitmap), PropertyMapVariant::Gettable).unwrap())
    });
}

criterion_group!(benches, encode_benchmark, decode_benchmark, property_map_benchmark);
criterion_main!(benches);
