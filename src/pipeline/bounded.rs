// In: src/pipeline/bounded.rs

//! A reader adapter that stops after a declared number of items.
//!
//! Bit-packed streams end in padding that decodes as valid items, and page
//! formats often know their row count anyway. Wrapping any reader in
//! `Bounded` makes the declared count authoritative.

use crate::channel::BoxedChannel;
use crate::error::Result;
use crate::pipeline::{StreamReader, StreamWriter};

pub struct Bounded<T> {
    inner: Box<dyn StreamReader<T>>,
    limit: u64,
    delivered: u64,
}

impl<T: Default + Send + 'static> Bounded<T> {
    pub fn new(inner: Box<dyn StreamReader<T>>, limit: u64) -> Self {
        Self {
            inner,
            limit,
            delivered: 0,
        }
    }

    #[inline]
    fn remaining(&self) -> u64 {
        self.limit - self.delivered
    }
}

impl<T: Default + Send + 'static> StreamReader<T> for Bounded<T> {
    fn channel_count(&self) -> usize {
        self.inner.channel_count()
    }

    fn item_count(&self) -> Option<u64> {
        Some(self.limit)
    }

    fn init(&mut self, channels: Vec<BoxedChannel>) -> Result<()> {
        self.delivered = 0;
        self.inner.init(channels)
    }

    fn read(&mut self, buf: &mut [T]) -> Result<usize> {
        let want = (buf.len() as u64).min(self.remaining()) as usize;
        if want == 0 {
            return Ok(0);
        }
        let n = self.inner.read(&mut buf[..want])?;
        self.delivered += n as u64;
        Ok(n)
    }

    fn skip(&mut self, count: u64) -> Result<u64> {
        let n = self.inner.skip(count.min(self.remaining()))?;
        self.delivered += n;
        Ok(n)
    }

    fn create_writer(&self) -> Box<dyn StreamWriter<T>> {
        self.inner.create_writer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CodecConfig;
    use crate::kernels::bitwidth::{BitWidth, BoolWriter};
    use crate::test_util::{decode, encode};

    #[test]
    fn test_stops_at_declared_count() {
        let mut writer = BoolWriter::new(BitWidth::W1, CodecConfig::default()).unwrap();
        let channels = encode(&mut writer, &[true, false, true]);
        // Without a bound the padding bits of the last byte decode as items.
        let mut unbounded = writer.create_reader();
        assert_eq!(decode(unbounded.as_mut(), &channels).len(), 8);

        let mut bounded = Bounded::new(writer.create_reader(), 3);
        assert_eq!(bounded.item_count(), Some(3));
        assert_eq!(decode(&mut bounded, &channels), vec![true, false, true]);

        let mut bounded = Bounded::new(writer.create_reader(), 3);
        bounded.init(crate::test_util::boxed(&channels)).unwrap();
        assert_eq!(bounded.skip(10).unwrap(), 3);
        assert_eq!(bounded.read_one().unwrap(), None);
    }
}
