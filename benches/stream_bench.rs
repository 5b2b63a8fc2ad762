// In benches/stream_bench.rs

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use tambak_stream::kernels::bitwidth::{BitReader, BitWidth, BitWriter};
use tambak_stream::kernels::delta_delta::{DeltaDeltaReader, DeltaDeltaWriter};
use tambak_stream::kernels::flag::{Flag32, Flag64, Flag64Lsb, FlagReader, FlagWriter};
use tambak_stream::{CodecConfig, MemoryChannel, StreamReader, StreamWriter};

// --- MOCK DATA GENERATION ---

/// Sensor-style readings: mostly small values with bursts of zeros.
fn generate_sparse_u32(size: usize) -> Vec<u32> {
    (0..size as u32)
        .map(|i| if i % 11 < 5 { 0 } else { i.wrapping_mul(2_654_435_761) >> (i % 24) })
        .collect()
}

/// Millisecond timestamps with a little jitter.
fn generate_timestamps(size: usize) -> Vec<i64> {
    (0..size as i64)
        .map(|i| 1_700_000_000_000 + i * 1000 + (i * 7919) % 5)
        .collect()
}

fn generate_nibbles(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i * 31 % 16) as u8).collect()
}

// --- HELPERS ---

fn encode_into<T: Default + Send>(writer: &mut dyn StreamWriter<T>, items: &[T]) -> MemoryChannel {
    let ch = MemoryChannel::new();
    writer.init(vec![ch.boxed()]).unwrap();
    writer.write(items).unwrap();
    writer.commit().unwrap();
    ch
}

fn decode_all<T: Default + Send + Clone>(reader: &mut dyn StreamReader<T>, ch: &MemoryChannel, len: usize) -> usize {
    reader.init(vec![ch.boxed()]).unwrap();
    let mut buf = vec![T::default(); len];
    reader.read(&mut buf).unwrap()
}

// --- Benchmark Suite ---

const BENCH_ITEMS: usize = 65536;

fn bench_flag_codecs(c: &mut Criterion) {
    let config = CodecConfig::default();
    let sparse = generate_sparse_u32(BENCH_ITEMS);
    let wide: Vec<u64> = sparse.iter().map(|&v| (v as u64) << 8).collect();

    let mut group = c.benchmark_group("Flag Codecs");
    group.throughput(Throughput::Elements(BENCH_ITEMS as u64));

    group.bench_function("Encode UInt32", |b| {
        b.iter(|| encode_into(&mut FlagWriter::<u32, Flag32>::new(config), black_box(&sparse)))
    });
    group.bench_function("Encode UInt64", |b| {
        b.iter(|| encode_into(&mut FlagWriter::<u64, Flag64>::new(config), black_box(&wide)))
    });
    group.bench_function("Encode UInt64-LSB", |b| {
        b.iter(|| encode_into(&mut FlagWriter::<u64, Flag64Lsb>::new(config), black_box(&wide)))
    });

    let encoded32 = encode_into(&mut FlagWriter::<u32, Flag32>::new(config), &sparse);
    let encoded64 = encode_into(&mut FlagWriter::<u64, Flag64>::new(config), &wide);
    group.bench_function("Decode UInt32", |b| {
        b.iter(|| decode_all(&mut FlagReader::<u32, Flag32>::new(config), &encoded32, BENCH_ITEMS))
    });
    group.bench_function("Decode UInt64", |b| {
        b.iter(|| decode_all(&mut FlagReader::<u64, Flag64>::new(config), &encoded64, BENCH_ITEMS))
    });
    group.finish();
}

fn bench_delta_delta(c: &mut Criterion) {
    let config = CodecConfig::default();
    let timestamps = generate_timestamps(BENCH_ITEMS);
    let encoded = encode_into(&mut DeltaDeltaWriter::<i64, Flag64>::new(config), &timestamps);

    let mut group = c.benchmark_group("Delta-Delta");
    group.throughput(Throughput::Elements(BENCH_ITEMS as u64));
    group.bench_function("Encode Timestamps", |b| {
        b.iter(|| encode_into(&mut DeltaDeltaWriter::<i64, Flag64>::new(config), black_box(&timestamps)))
    });
    group.bench_function("Decode Timestamps", |b| {
        b.iter(|| decode_all(&mut DeltaDeltaReader::<i64, Flag64>::new(config), &encoded, BENCH_ITEMS))
    });
    group.finish();
}

fn bench_bit_packed(c: &mut Criterion) {
    let config = CodecConfig::default();
    let nibbles = generate_nibbles(BENCH_ITEMS);
    let encoded = encode_into(&mut BitWriter::<u8>::new(BitWidth::W4, config).unwrap(), &nibbles);

    let mut group = c.benchmark_group("Bit-Packed");
    group.throughput(Throughput::Elements(BENCH_ITEMS as u64));
    group.bench_function("Encode 4-bit", |b| {
        b.iter(|| encode_into(&mut BitWriter::<u8>::new(BitWidth::W4, config).unwrap(), black_box(&nibbles)))
    });
    group.bench_function("Decode 4-bit", |b| {
        b.iter(|| {
            let mut reader = BitReader::<u8>::new(BitWidth::W4, config)
                .unwrap()
                .with_item_count(BENCH_ITEMS as u64);
            decode_all(&mut reader, &encoded, BENCH_ITEMS)
        })
    });
    group.finish();
}

criterion_group!(benches, bench_flag_codecs, bench_delta_delta, bench_bit_packed);
criterion_main!(benches);
