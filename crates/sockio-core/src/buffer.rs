//! Pushback chunk iterator for the write path
//!
//! Wraps an iterator of byte chunks and re-slices it into pieces of at most
//! `chunk_size` bytes. When the transport accepts only part of a piece, the
//! writer calls `unread(n)` and the unwritten tail is yielded again on the
//! next pull, so nothing is lost or re-derived from the source.
//!
//! ```ignore
//! let mut buf = PushbackIter::new(vec![b"hello world".to_vec()].into_iter(), 4);
//! let chunk = buf.next_chunk().unwrap();   // "hell"
//! buf.unread(2);                            // transport took "he"
//! assert_eq!(buf.next_chunk().unwrap(), b"llo ");
//! ```

use core::fmt;

pub struct PushbackIter<I> {
    source: I,
    source_done: bool,
    chunk_size: usize,
    /// Pulled bytes; `buffer[pos..]` is not yet yielded
    buffer: Vec<u8>,
    pos: usize,
    /// Length of the most recent yield, bounds `unread`
    last_yield: usize,
}

impl<I> PushbackIter<I>
where
    I: Iterator<Item = Vec<u8>>,
{
    /// Create a buffer yielding at most `chunk_size` bytes per pull
    ///
    /// A zero chunk size is treated as one.
    pub fn new(source: I, chunk_size: usize) -> Self {
        Self {
            source,
            source_done: false,
            chunk_size: chunk_size.max(1),
            buffer: Vec::new(),
            pos: 0,
            last_yield: 0,
        }
    }

    #[inline]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Bytes pulled from the source but not yet yielded
    #[inline]
    pub fn buffered(&self) -> usize {
        self.buffer.len() - self.pos
    }

    /// Next piece of at most `chunk_size` bytes, `None` once drained
    pub fn next_chunk(&mut self) -> Option<Vec<u8>> {
        if self.pos > 0 {
            self.buffer.drain(..self.pos);
            self.pos = 0;
        }
        self.last_yield = 0;

        while self.buffer.len() < self.chunk_size && !self.source_done {
            match self.source.next() {
                Some(chunk) => self.buffer.extend_from_slice(&chunk),
                None => self.source_done = true,
            }
        }

        if self.buffer.is_empty() {
            return None;
        }

        let n = self.chunk_size.min(self.buffer.len());
        self.pos = n;
        self.last_yield = n;
        Some(self.buffer[..n].to_vec())
    }

    /// Push back the last `n` bytes of the most recent yield
    ///
    /// `n` larger than the most recent yield is clamped.
    pub fn unread(&mut self, n: usize) {
        debug_assert!(n <= self.last_yield, "unread past the last yield");
        let n = n.min(self.last_yield);
        self.pos -= n;
        self.last_yield -= n;
    }

    /// True when the source is drained and nothing is buffered
    pub fn is_exhausted(&mut self) -> bool {
        if self.buffered() > 0 {
            return false;
        }
        while !self.source_done {
            match self.source.next() {
                Some(chunk) if chunk.is_empty() => continue,
                Some(chunk) => {
                    self.buffer.extend_from_slice(&chunk);
                    return false;
                }
                None => self.source_done = true,
            }
        }
        true
    }
}

impl<I> Iterator for PushbackIter<I>
where
    I: Iterator<Item = Vec<u8>>,
{
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Vec<u8>> {
        self.next_chunk()
    }
}

impl<I> fmt::Debug for PushbackIter<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushbackIter")
            .field("chunk_size", &self.chunk_size)
            .field("buffered", &(self.buffer.len() - self.pos))
            .field("source_done", &self.source_done)
            .finish()
    }
}
