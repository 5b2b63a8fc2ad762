//! Shared helpers for the in-crate test suites.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::channel::{BoxedChannel, MemoryChannel};
use crate::pipeline::{StreamReader, StreamWriter};

/// Fresh cursors over every channel.
pub(crate) fn boxed(channels: &[MemoryChannel]) -> Vec<BoxedChannel> {
    channels.iter().map(MemoryChannel::boxed).collect()
}

/// Inits `writer` on new memory channels, writes `items` and commits.
pub(crate) fn encode<T: Default + Send + Clone>(
    writer: &mut dyn StreamWriter<T>,
    items: &[T],
) -> Vec<MemoryChannel> {
    let channels: Vec<MemoryChannel> = (0..writer.channel_count())
        .map(|_| MemoryChannel::new())
        .collect();
    writer.init(boxed(&channels)).unwrap();
    writer.write(items).unwrap();
    writer.commit().unwrap();
    channels
}

/// Inits `reader` on the channels and reads to the end in odd-sized chunks.
pub(crate) fn decode<T: Default + Send + Clone>(
    reader: &mut dyn StreamReader<T>,
    channels: &[MemoryChannel],
) -> Vec<T> {
    reader.init(boxed(channels)).unwrap();
    let mut out = Vec::new();
    let mut buf = vec![T::default(); 7];
    loop {
        let n = reader.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    out
}

/// Encodes with `writer`, then decodes with the reader it creates.
pub(crate) fn round_trip<T: Default + Send + Clone>(
    mut writer: Box<dyn StreamWriter<T>>,
    items: &[T],
) -> Vec<T> {
    let channels = encode(writer.as_mut(), items);
    let mut reader = writer.create_reader();
    decode(reader.as_mut(), &channels)
}

pub(crate) fn rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}
