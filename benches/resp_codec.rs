use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use reef::resp::{RespEncoder, RespParser, RespValue};

fn bench_encode_command(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_command");

    for arity in [2, 8, 32].iter() {
        let args: Vec<String> = (0..*arity).map(|i| format!("arg{}", i)).collect();
        group.bench_with_input(BenchmarkId::new("args", arity), &args, |b, args| {
            b.iter(|| {
                let encoded = RespEncoder::encode_command(args.iter().map(|s| s.as_bytes()));
                black_box(encoded);
            });
        });
    }

    group.finish();
}

fn bench_parse_bulk_string(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_reply");

    for payload_len in [8, 256, 16 * 1024].iter() {
        let value = RespValue::BulkString(Some(bytes::Bytes::from(vec![b'x'; *payload_len])));
        let encoded = RespEncoder::encode(&value);

        group.bench_with_input(BenchmarkId::new("bulk_string", payload_len), &encoded, |b, encoded| {
            b.iter(|| {
                let mut buf = BytesMut::from(&encoded[..]);
                let parsed = RespParser::parse(&mut buf).unwrap();
                black_box(parsed);
            });
        });
    }

    group.finish();
}

fn bench_parse_array_of_bulk_strings(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_reply");

    for count in [10, 100, 1000].iter() {
        let items: Vec<RespValue> = (0..*count)
            .map(|i| RespValue::BulkString(Some(bytes::Bytes::from(format!("member-{}", i)))))
            .collect();
        let value = RespValue::Array(Some(items));
        let encoded = RespEncoder::encode(&value);

        group.bench_with_input(BenchmarkId::new("array", count), &encoded, |b, encoded| {
            b.iter(|| {
                let mut buf = BytesMut::from(&encoded[..]);
                let parsed = RespParser::parse(&mut buf).unwrap();
                black_box(parsed);
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_encode_command,
    bench_parse_bulk_string,
    bench_parse_array_of_bulk_strings
);
criterion_main!(benches);
