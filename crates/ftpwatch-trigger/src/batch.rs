use std::num::NonZeroUsize;

/// Lazily split `items` into groups of `size`, preserving order. Every group
/// is full except possibly the last, which is never empty.
pub fn batches<I>(items: I, size: NonZeroUsize) -> Batches<I::IntoIter>
where
    I: IntoIterator,
{
    Batches {
        inner: items.into_iter(),
        size: size.get(),
    }
}

/// Iterator returned by [`batches`].
#[derive(Debug)]
pub struct Batches<I> {
    inner: I,
    size: usize,
}

impl<I: Iterator> Iterator for Batches<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let group: Vec<_> = self.inner.by_ref().take(self.size).collect();
        (!group.is_empty()).then_some(group)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (lo, hi) = self.inner.size_hint();
        (lo.div_ceil(self.size), hi.map(|h| h.div_ceil(self.size)))
    }
}
