//! Fixed-size windowing of the write request stream.

/// Lazy iterator over consecutive batches of at most `batch_size` elements.
///
/// Every batch is full except possibly the last one; no batch is empty and
/// element order is preserved within and across batches.
#[derive(Debug, Clone)]
pub struct Batches<I> {
    source: I,
    batch_size: usize,
}

/// Windows `source` into batches of `batch_size` (treated as at least 1).
pub fn batches<I>(source: I, batch_size: usize) -> Batches<I::IntoIter>
where
    I: IntoIterator,
{
    Batches {
        source: source.into_iter(),
        batch_size: batch_size.max(1),
    }
}

impl<I: Iterator> Iterator for Batches<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let first = self.source.next()?;
        let mut batch = Vec::with_capacity(self.batch_size);
        batch.push(first);
        batch.extend(self.source.by_ref().take(self.batch_size - 1));
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (lower, upper) = self.source.size_hint();
        (
            lower.div_ceil(self.batch_size),
            upper.map(|upper| upper.div_ceil(self.batch_size)),
        )
    }
}
