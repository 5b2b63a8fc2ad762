//! An owned, arena-like growable buffer with explicit length vs. capacity.
//!
//! Unlike `Vec`, every slot up to `capacity()` is initialized, so hot paths can
//! fill the spare region in place (e.g. straight from `Read::read`) and then
//! publish it with `advance`.

/// A growable buffer of `Copy` items with a separate logical length.
#[derive(Debug, Clone)]
pub struct GrowBuffer<T: Copy + Default> {
    slots: Vec<T>,
    len: usize,
}

impl<T: Copy + Default> GrowBuffer<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![T::default(); capacity],
            len: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Slots still free before the buffer must grow.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.slots.len() - self.len
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.slots[..self.len]
    }

    /// The initialized but unpublished region after `len`.
    #[inline]
    pub fn spare_mut(&mut self) -> &mut [T] {
        &mut self.slots[self.len..]
    }

    /// Publishes `n` slots previously filled through `spare_mut`.
    #[inline]
    pub fn advance(&mut self, n: usize) {
        debug_assert!(n <= self.remaining());
        self.len += n;
    }

    /// Grows capacity so that at least `additional` more items fit.
    pub fn reserve(&mut self, additional: usize) {
        let needed = self.len + additional;
        if needed > self.slots.len() {
            let new_cap = needed.max(self.slots.len() * 2).max(8);
            self.slots.resize(new_cap, T::default());
        }
    }

    #[inline]
    pub fn push(&mut self, item: T) {
        if self.len == self.slots.len() {
            self.reserve(1);
        }
        self.slots[self.len] = item;
        self.len += 1;
    }

    pub fn extend_from_slice(&mut self, items: &[T]) {
        self.reserve(items.len());
        self.slots[self.len..self.len + items.len()].copy_from_slice(items);
        self.len += items.len();
    }

    /// Shortens the logical length; capacity is kept.
    #[inline]
    pub fn truncate(&mut self, len: usize) {
        self.len = self.len.min(len);
    }

    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_grows_past_initial_capacity() {
        let mut buf = GrowBuffer::<u32>::with_capacity(2);
        for i in 0..10 {
            buf.push(i);
        }
        assert_eq!(buf.len(), 10);
        assert!(buf.capacity() >= 10);
        assert_eq!(buf.as_slice(), &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_spare_fill_then_advance() {
        let mut buf = GrowBuffer::<u8>::with_capacity(8);
        buf.push(1);
        buf.spare_mut()[..3].copy_from_slice(&[2, 3, 4]);
        buf.advance(3);
        assert_eq!(buf.as_slice(), &[1, 2, 3, 4]);
        assert_eq!(buf.remaining(), 4);

        buf.truncate(2);
        assert_eq!(buf.as_slice(), &[1, 2]);
        buf.clear();
        assert!(buf.is_empty());
    }
}
