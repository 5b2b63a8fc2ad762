// In: src/kernels/varlen.rs

//! This module contains the variable-length item codec for byte arrays,
//! UTF-8 strings and nested sub-streams.
//!
//! Two layouts are supported:
//! - `Inline` (one channel): every item is a UInt64 flag single-value unit
//!   holding the byte length, immediately followed by the payload.
//! - `Split` (two channels): lengths go through the UInt64-LSB flag codec on
//!   channel 0 and payloads are concatenated on channel 1, so lengths compress
//!   as a column of their own.
//!
//! In both layouts `skip` decodes lengths only and seeks past the payload.

use std::marker::PhantomData;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::channel::{clone_channels, expect_channels, BoxedChannel, ByteReader, ByteWriter, MemoryChannel};
use crate::config::CodecConfig;
use crate::error::{CodecError, Result};
use crate::kernels::flag::{decode_unit, encode_single, Flag64, Flag64Lsb, FlagReader, FlagWriter, Unit, MAX_UNIT_BYTES};
use crate::pipeline::{StreamReader, StreamWriter};

/// Payload bytes read per step, so a damaged length cannot force a huge allocation.
const PAYLOAD_CHUNK: usize = 64 * 1024;
/// Lengths decoded per step in the split layout.
const LENGTH_CHUNK: usize = 256;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum VarLayout {
    #[default]
    Inline,
    Split,
}

impl VarLayout {
    pub const fn channel_count(self) -> usize {
        match self {
            VarLayout::Inline => 1,
            VarLayout::Split => 2,
        }
    }
}

/// An item stored as a length-prefixed run of bytes.
pub trait VarItem: Default + Clone + Send + 'static {
    fn payload(&self) -> &[u8];
    fn from_payload(bytes: Vec<u8>) -> Result<Self>;
}

impl VarItem for Vec<u8> {
    #[inline]
    fn payload(&self) -> &[u8] {
        self
    }

    #[inline]
    fn from_payload(bytes: Vec<u8>) -> Result<Self> {
        Ok(bytes)
    }
}

impl VarItem for String {
    #[inline]
    fn payload(&self) -> &[u8] {
        self.as_bytes()
    }

    #[inline]
    fn from_payload(bytes: Vec<u8>) -> Result<Self> {
        Ok(String::from_utf8(bytes)?)
    }
}

/// Reads one inline length unit. `None` at a clean end of stream.
fn read_inline_length(input: &mut ByteReader) -> Result<Option<u64>> {
    match decode_unit::<Flag64>(input)? {
        None => Ok(None),
        Some(Unit::Single(len)) => Ok(Some(len)),
        Some(other) => Err(CodecError::CorruptStream(format!(
            "expected a single-value length unit, found {:?}",
            other
        ))),
    }
}

/// Reads exactly `len` payload bytes.
fn read_payload(input: &mut ByteReader, len: u64) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut left = len;
    while left > 0 {
        let step = left.min(PAYLOAD_CHUNK as u64) as usize;
        let start = out.len();
        out.resize(start + step, 0);
        input.read_exact_or_corrupt(&mut out[start..], "an item payload")?;
        left -= step as u64;
    }
    Ok(out)
}

fn skip_payload(input: &mut ByteReader, len: u64) -> Result<()> {
    if input.skip_bytes(len)? < len {
        return Err(CodecError::truncated("an item payload"));
    }
    Ok(())
}

//==================================================================================
// 1. Writer
//==================================================================================

enum Sink {
    Inline(ByteWriter),
    Split {
        lengths: FlagWriter<u64, Flag64Lsb>,
        payload: ByteWriter,
    },
}

pub struct VarWriter<T: VarItem> {
    config: CodecConfig,
    layout: VarLayout,
    sink: Option<Sink>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: VarItem> VarWriter<T> {
    pub fn new(layout: VarLayout, config: CodecConfig) -> Self {
        Self {
            config,
            layout,
            sink: None,
            _marker: PhantomData,
        }
    }

    pub fn layout(&self) -> VarLayout {
        self.layout
    }

    #[inline]
    fn sink(&mut self) -> Result<&mut Sink> {
        self.sink.as_mut().ok_or(CodecError::NotInitialized)
    }

    /// Appends one item's raw bytes.
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        match self.sink()? {
            Sink::Inline(out) => {
                let mut unit = [0u8; MAX_UNIT_BYTES];
                let n = encode_single::<Flag64>(bytes.len() as u64, &mut unit);
                out.write_all(&unit[..n])?;
                out.write_all(bytes)
            }
            Sink::Split { lengths, payload } => {
                lengths.push_word(bytes.len() as u64)?;
                payload.write_all(bytes)
            }
        }
    }

    /// A fresh in-memory channel for a nested codec to write into. Hand it
    /// back to `write_nested` once that codec has committed.
    pub fn nested_channel(&self) -> MemoryChannel {
        MemoryChannel::new()
    }

    /// Appends everything written to `channel` as a single item.
    pub fn write_nested(&mut self, channel: &MemoryChannel) -> Result<()> {
        let bytes = channel.to_vec();
        self.write_bytes(&bytes)
    }

    fn resume_inline(&self, mut channels: Vec<BoxedChannel>, row_count: u64) -> Result<Sink> {
        let replay = clone_channels(&mut channels)?;
        let mut reader = VarReader::<T>::new(VarLayout::Inline, self.config);
        reader.init(replay)?;
        let skipped = reader.skip(row_count)?;
        if skipped < row_count {
            return Err(CodecError::ResumeOutOfRange {
                requested: row_count,
                available: skipped,
            });
        }
        let offset = match &reader.source {
            Some(Source::Inline(input)) => input.position(),
            _ => return Err(CodecError::NotInitialized),
        };
        let channel = channels.pop().ok_or(CodecError::NotInitialized)?;
        let mut out = ByteWriter::attach(channel, self.config.buffer_size)?;
        out.reopen_at(offset)?;
        Ok(Sink::Inline(out))
    }

    fn resume_split(&self, mut channels: Vec<BoxedChannel>, row_count: u64) -> Result<Sink> {
        let replay = clone_channels(&mut channels)?;
        let mut reader = VarReader::<T>::new(VarLayout::Split, self.config);
        reader.init(replay)?;
        let skipped = reader.skip(row_count)?;
        if skipped < row_count {
            return Err(CodecError::ResumeOutOfRange {
                requested: row_count,
                available: skipped,
            });
        }
        let payload_offset = match &reader.source {
            Some(Source::Split { payload, .. }) => payload.position(),
            _ => return Err(CodecError::NotInitialized),
        };

        let payload_channel = channels.pop().ok_or(CodecError::NotInitialized)?;
        let mut lengths = FlagWriter::<u64, Flag64Lsb>::new(self.config);
        lengths.resume_words(channels, row_count)?;
        let mut payload = ByteWriter::attach(payload_channel, self.config.buffer_size)?;
        payload.reopen_at(payload_offset)?;
        Ok(Sink::Split { lengths, payload })
    }
}

impl<T: VarItem> StreamWriter<T> for VarWriter<T> {
    fn channel_count(&self) -> usize {
        self.layout.channel_count()
    }

    fn init(&mut self, mut channels: Vec<BoxedChannel>) -> Result<()> {
        expect_channels("var_length", &channels, self.layout.channel_count())?;
        let buffer_size = self.config.buffer_size;
        let sink = match self.layout {
            VarLayout::Inline => {
                let channel = channels.pop().ok_or(CodecError::NotInitialized)?;
                Sink::Inline(ByteWriter::new(channel, buffer_size)?)
            }
            VarLayout::Split => {
                let payload = channels.pop().ok_or(CodecError::NotInitialized)?;
                let mut lengths = FlagWriter::new(self.config);
                lengths.init(channels)?;
                Sink::Split {
                    lengths,
                    payload: ByteWriter::new(payload, buffer_size)?,
                }
            }
        };
        self.sink = Some(sink);
        debug!("var_length: writer initialized ({:?})", self.layout);
        Ok(())
    }

    fn write(&mut self, items: &[T]) -> Result<()> {
        self.sink()?;
        for item in items {
            self.write_bytes(item.payload())?;
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        match self.sink()? {
            Sink::Inline(out) => out.flush()?,
            Sink::Split { lengths, payload } => {
                lengths.commit_words()?;
                payload.flush()?;
            }
        }
        debug!("var_length: committed");
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        match self.sink()? {
            Sink::Inline(out) => out.reset(),
            Sink::Split { lengths, payload } => {
                lengths.reset()?;
                payload.reset()
            }
        }
    }

    fn flush(&mut self) -> Result<()> {
        match self.sink()? {
            Sink::Inline(out) => out.flush(),
            Sink::Split { lengths, payload } => {
                lengths.flush()?;
                payload.flush()
            }
        }
    }

    fn resume(&mut self, channels: Vec<BoxedChannel>, row_count: u64) -> Result<()> {
        expect_channels("var_length", &channels, self.layout.channel_count())?;
        let sink = match self.layout {
            VarLayout::Inline => self.resume_inline(channels, row_count)?,
            VarLayout::Split => self.resume_split(channels, row_count)?,
        };
        self.sink = Some(sink);
        log_metric!("event"="resume", "codec"="var_length", "rows"=&row_count);
        Ok(())
    }

    fn create_reader(&self) -> Box<dyn StreamReader<T>> {
        Box::new(VarReader::<T>::new(self.layout, self.config))
    }
}

//==================================================================================
// 2. Reader
//==================================================================================

enum Source {
    Inline(ByteReader),
    Split {
        lengths: FlagReader<u64, Flag64Lsb>,
        payload: ByteReader,
    },
}

pub struct VarReader<T: VarItem> {
    config: CodecConfig,
    layout: VarLayout,
    source: Option<Source>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: VarItem> VarReader<T> {
    pub fn new(layout: VarLayout, config: CodecConfig) -> Self {
        Self {
            config,
            layout,
            source: None,
            _marker: PhantomData,
        }
    }

    #[inline]
    fn source(&mut self) -> Result<&mut Source> {
        self.source.as_mut().ok_or(CodecError::NotInitialized)
    }

    /// Reads the raw bytes of the next item.
    fn read_bytes(&mut self) -> Result<Option<Vec<u8>>> {
        match self.source()? {
            Source::Inline(input) => match read_inline_length(input)? {
                None => Ok(None),
                Some(len) => read_payload(input, len).map(Some),
            },
            Source::Split { lengths, payload } => {
                let mut len = [0u64];
                if lengths.read_words(&mut len)? == 0 {
                    return Ok(None);
                }
                read_payload(payload, len[0]).map(Some)
            }
        }
    }

    /// Returns the next item as a readable channel for a nested codec.
    pub fn read_nested(&mut self) -> Result<Option<MemoryChannel>> {
        Ok(self.read_bytes()?.map(MemoryChannel::from_bytes))
    }
}

impl<T: VarItem> StreamReader<T> for VarReader<T> {
    fn channel_count(&self) -> usize {
        self.layout.channel_count()
    }

    fn init(&mut self, mut channels: Vec<BoxedChannel>) -> Result<()> {
        expect_channels("var_length", &channels, self.layout.channel_count())?;
        let buffer_size = self.config.buffer_size;
        let source = match self.layout {
            VarLayout::Inline => {
                let channel = channels.pop().ok_or(CodecError::NotInitialized)?;
                Source::Inline(ByteReader::new(channel, buffer_size)?)
            }
            VarLayout::Split => {
                let payload = channels.pop().ok_or(CodecError::NotInitialized)?;
                let mut lengths = FlagReader::new(self.config);
                lengths.init(channels)?;
                Source::Split {
                    lengths,
                    payload: ByteReader::new(payload, buffer_size)?,
                }
            }
        };
        self.source = Some(source);
        Ok(())
    }

    fn read(&mut self, buf: &mut [T]) -> Result<usize> {
        let mut n = 0;
        while n < buf.len() {
            match self.read_bytes()? {
                Some(bytes) => {
                    buf[n] = T::from_payload(bytes)?;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }

    fn skip(&mut self, count: u64) -> Result<u64> {
        match self.source()? {
            Source::Inline(input) => {
                let mut done = 0;
                while done < count {
                    match read_inline_length(input)? {
                        Some(len) => skip_payload(input, len)?,
                        None => break,
                    }
                    done += 1;
                }
                Ok(done)
            }
            Source::Split { lengths, payload } => {
                let mut buf = [0u64; LENGTH_CHUNK];
                let mut done = 0u64;
                let mut bytes = 0u64;
                while done < count {
                    let want = ((count - done) as usize).min(LENGTH_CHUNK);
                    let n = lengths.read_words(&mut buf[..want])?;
                    bytes += buf[..n].iter().sum::<u64>();
                    done += n as u64;
                    if n < want {
                        break;
                    }
                }
                skip_payload(payload, bytes)?;
                Ok(done)
            }
        }
    }

    fn create_writer(&self) -> Box<dyn StreamWriter<T>> {
        Box::new(VarWriter::<T>::new(self.layout, self.config))
    }
}

//==================================================================================
// 3. Unit Tests
//==================================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::flag::Flag32;
    use crate::test_util::{boxed, decode, encode, round_trip};

    fn words() -> Vec<String> {
        ["", "a", "tambak", "ünïcødé", "", "a longer string that spans more bytes"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_inline_wire_layout() {
        let mut writer = VarWriter::<Vec<u8>>::new(VarLayout::Inline, CodecConfig::default());
        let channels = encode(&mut writer, &[vec![0xAA, 0xBB], vec![]]);
        assert_eq!(channels[0].to_vec(), vec![0x0F, 0x02, 0xAA, 0xBB, 0x0F, 0x00]);
    }

    #[test]
    fn test_split_wire_layout() {
        let mut writer = VarWriter::<Vec<u8>>::new(VarLayout::Split, CodecConfig::default());
        let channels = encode(&mut writer, &[vec![1, 2, 3], vec![4]]);
        assert_eq!(channels[0].to_vec(), vec![0x11, 0x03, 0x01]);
        assert_eq!(channels[1].to_vec(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_round_trip_both_layouts() {
        for layout in [VarLayout::Inline, VarLayout::Split] {
            let items = words();
            let back = round_trip(Box::new(VarWriter::<String>::new(layout, CodecConfig::default())), &items);
            assert_eq!(back, items, "{:?}", layout);

            let blob = vec![(0..200_000).map(|i| i as u8).collect::<Vec<u8>>()];
            let back = round_trip(Box::new(VarWriter::<Vec<u8>>::new(layout, CodecConfig::default())), &blob);
            assert_eq!(back, blob);
        }
    }

    #[test]
    fn test_invalid_utf8_is_reported() {
        let mut writer = VarWriter::<Vec<u8>>::new(VarLayout::Inline, CodecConfig::default());
        let channels = encode(&mut writer, &[vec![0xFF, 0xFE]]);
        let mut reader = VarReader::<String>::new(VarLayout::Inline, CodecConfig::default());
        reader.init(boxed(&channels)).unwrap();
        assert!(matches!(reader.read_one(), Err(CodecError::Utf8(_))));
    }

    #[test]
    fn test_skip_then_read() {
        let items = words();
        for layout in [VarLayout::Inline, VarLayout::Split] {
            let mut writer = VarWriter::<String>::new(layout, CodecConfig::default());
            let channels = encode(&mut writer, &items);
            for k in 0..=items.len() as u64 {
                let mut reader = VarReader::<String>::new(layout, CodecConfig::default());
                reader.init(boxed(&channels)).unwrap();
                assert_eq!(reader.skip(k).unwrap(), k);
                assert_eq!(reader.read_one().unwrap(), items.get(k as usize).cloned());
            }
        }
    }

    #[test]
    fn test_resume_both_layouts() {
        let items = words();
        for layout in [VarLayout::Inline, VarLayout::Split] {
            let mut writer = VarWriter::<String>::new(layout, CodecConfig::default());
            let channels = encode(&mut writer, &items);
            for n in [0u64, 1, 3, items.len() as u64] {
                let copies: Vec<MemoryChannel> = channels
                    .iter()
                    .map(|c| MemoryChannel::from_bytes(c.to_vec()))
                    .collect();
                let mut resumed = VarWriter::<String>::new(layout, CodecConfig::default());
                resumed.resume(boxed(&copies), n).unwrap();
                resumed.write(&["tail".to_string()]).unwrap();
                resumed.commit().unwrap();

                let mut expected = items[..n as usize].to_vec();
                expected.push("tail".to_string());
                let mut reader = resumed.create_reader();
                assert_eq!(decode(reader.as_mut(), &copies), expected, "{:?} at {}", layout, n);
            }

            let mut resumed = VarWriter::<String>::new(layout, CodecConfig::default());
            assert!(matches!(
                resumed.resume(boxed(&channels), items.len() as u64 + 1),
                Err(CodecError::ResumeOutOfRange { .. })
            ));
        }
    }

    #[test]
    fn test_nested_stream_round_trip() {
        let mut outer = VarWriter::<Vec<u8>>::new(VarLayout::Inline, CodecConfig::default());
        let ch = MemoryChannel::new();
        outer.init(vec![ch.boxed()]).unwrap();

        let inner_ch = outer.nested_channel();
        let mut inner = FlagWriter::<u32, Flag32>::new(CodecConfig::default());
        inner.init(vec![inner_ch.boxed()]).unwrap();
        inner.write(&[0, 0, 0, 5, 0, 0]).unwrap();
        inner.commit().unwrap();
        outer.write_nested(&inner_ch).unwrap();
        outer.write(&[b"after".to_vec()]).unwrap();
        outer.commit().unwrap();

        let mut reader = VarReader::<Vec<u8>>::new(VarLayout::Inline, CodecConfig::default());
        reader.init(vec![ch.boxed()]).unwrap();
        let nested = reader.read_nested().unwrap().unwrap();
        let mut inner_reader = FlagReader::<u32, Flag32>::new(CodecConfig::default());
        assert_eq!(decode(&mut inner_reader, &[nested]), vec![0, 0, 0, 5, 0, 0]);
        assert_eq!(reader.read_one().unwrap(), Some(b"after".to_vec()));
        assert!(reader.read_nested().unwrap().is_none());
    }

    #[test]
    fn test_truncated_payload_is_corrupt() {
        let ch = MemoryChannel::from_bytes(vec![0x0F, 0x05, 1, 2]);
        let mut reader = VarReader::<Vec<u8>>::new(VarLayout::Inline, CodecConfig::default());
        reader.init(vec![ch.boxed()]).unwrap();
        assert!(matches!(reader.read_one(), Err(CodecError::CorruptStream(_))));
    }
}
