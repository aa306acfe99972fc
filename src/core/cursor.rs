//! Buffer Cursor
//!
//! Read position inside the current input buffer plus the counters needed
//! to turn that position into a location. All buffer index arithmetic of
//! the scanner lives here.
//!
//! Offsets and columns are byte based. The row anchor is buffer relative;
//! when the buffer is replaced it is shifted back by the consumed amount,
//! so it can go negative while a long line spans several buffers.

use std::io;

use crate::reader::InputSource;

/// Bytes requested from an input source per refill
pub const READ_BLOCK: usize = 4096;

/// Position snapshot used for token start locations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark {
    pub offset: u64,
    pub row: u32,
    /// 0-based column
    pub column: u32,
}

impl Default for Mark {
    fn default() -> Self {
        Mark { offset: 0, row: 1, column: 0 }
    }
}

/// Read cursor over the text buffer of one input source
#[derive(Debug)]
pub struct Cursor {
    buf: String,
    pos: usize,
    /// Bytes of this source consumed before the current buffer
    processed: u64,
    /// Current row, 1-based
    row: u32,
    /// Buffer index where the current row starts
    row_start: i64,
    /// Byte length of the last character returned by `next`
    last_len: usize,
}

impl Cursor {
    pub fn new() -> Self {
        Cursor {
            buf: String::new(),
            pos: 0,
            processed: 0,
            row: 1,
            row_start: 0,
            last_len: 0,
        }
    }

    /// True once every buffered character has been consumed
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Unread bytes in the buffer
    #[inline]
    pub fn available(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Unread part of the buffer
    #[inline]
    pub fn remaining(&self) -> &str {
        &self.buf[self.pos..]
    }

    /// Current read index
    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Buffered text between an earlier read index and the current one
    #[inline]
    pub fn since(&self, start: usize) -> &str {
        &self.buf[start..self.pos]
    }

    /// Peek at the next character without consuming it
    #[inline]
    pub fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    /// Consume and return the next character
    #[inline]
    pub fn next(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.last_len = c.len_utf8();
        self.pos += self.last_len;
        Some(c)
    }

    /// Skip `len` bytes the caller already inspected through `remaining`
    #[inline]
    pub fn advance(&mut self, len: usize) {
        debug_assert!(self.buf.is_char_boundary(self.pos + len));
        self.pos += len;
        self.last_len = self.buf[..self.pos]
            .chars()
            .next_back()
            .map_or(0, char::len_utf8);
    }

    /// Un-read the last character returned by `next` (or ended by
    /// `advance`), also when a refill happened since.
    ///
    /// Only one character can be pushed back between two reads.
    #[inline]
    pub fn pushback(&mut self) {
        debug_assert!(self.last_len > 0, "pushback without a preceding read");
        self.pos -= self.last_len;
        self.last_len = 0;
    }

    /// Record a line break ending just before the current position
    #[inline]
    pub fn mark_lf(&mut self) {
        self.row += 1;
        self.row_start = self.pos as i64;
    }

    /// Replace the (fully consumed) buffer with the next block from `source`.
    ///
    /// The last character read stays in front of the new block, so a
    /// `pushback` right after a refill behaves as without one. Returns the
    /// number of new bytes.
    pub fn refill(&mut self, source: &mut dyn InputSource, max: usize) -> io::Result<usize> {
        self.discard_consumed();
        source.read_chunk(&mut self.buf, max)
    }

    /// Drop consumed text except the last character read
    fn discard_consumed(&mut self) {
        let keep_from = self.pos - self.last_len;
        if keep_from > 0 {
            self.buf.drain(..keep_from);
            self.processed += keep_from as u64;
            self.row_start -= keep_from as i64;
            self.pos -= keep_from;
        }
    }

    /// Make at least `min` unread bytes available without switching source.
    ///
    /// Consumed text is dropped from the buffer except the last character
    /// read, so a following `pushback` still works.
    pub fn ensure(&mut self, source: &mut dyn InputSource, min: usize) -> io::Result<bool> {
        if self.available() >= min {
            return Ok(true);
        }
        self.discard_consumed();
        while self.available() < min {
            if source.read_chunk(&mut self.buf, READ_BLOCK)? == 0 {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Row of the current position
    #[inline]
    pub fn row(&self) -> u32 {
        self.row
    }

    /// Offset of the current position within the source
    #[inline]
    pub fn offset(&self) -> u64 {
        self.processed + self.pos as u64
    }

    /// 0-based column of the current position
    #[inline]
    pub fn column(&self) -> u32 {
        (self.pos as i64 - self.row_start).max(0) as u32
    }

    /// Offset and 1-based column of the last consumed character
    pub fn last_char(&self) -> (u64, u32) {
        let back = self.last_len.max(1);
        let offset = self.offset().saturating_sub(back as u64);
        let column = (self.pos as i64 - self.row_start - back as i64 + 1).max(0) as u32;
        (offset, column)
    }

    /// Snapshot of the current position
    pub fn mark(&self) -> Mark {
        Mark {
            offset: self.offset(),
            row: self.row,
            column: self.column(),
        }
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Cursor::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::StrSource;

    #[test]
    fn test_next_and_pushback() {
        let mut source = StrSource::new("a\u{E9}b");
        let mut cursor = Cursor::new();
        assert!(cursor.is_exhausted());
        assert_eq!(cursor.refill(&mut source, READ_BLOCK).unwrap(), 4);
        assert_eq!(cursor.next(), Some('a'));
        assert_eq!(cursor.next(), Some('\u{E9}'));
        cursor.pushback();
        assert_eq!(cursor.next(), Some('\u{E9}'));
        assert_eq!(cursor.next(), Some('b'));
        assert_eq!(cursor.next(), None);
    }

    #[test]
    fn test_column_across_refill() {
        let mut source = StrSource::new("ab\ncdef").with_block_size(4);
        let mut cursor = Cursor::new();
        cursor.refill(&mut source, READ_BLOCK).unwrap();
        cursor.next();
        cursor.next();
        assert_eq!(cursor.next(), Some('\n'));
        cursor.mark_lf();
        assert_eq!(cursor.next(), Some('c'));
        assert_eq!(cursor.column(), 1);
        cursor.refill(&mut source, READ_BLOCK).unwrap();
        assert_eq!(cursor.column(), 1);
        assert_eq!(cursor.next(), Some('d'));
        assert_eq!(cursor.column(), 2);
        assert_eq!(cursor.row(), 2);
        assert_eq!(cursor.offset(), 5);
        assert_eq!(cursor.last_char(), (4, 2));
    }

    #[test]
    fn test_ensure_keeps_last_char() {
        let mut source = StrSource::new("&amp;x").with_block_size(2);
        let mut cursor = Cursor::new();
        cursor.refill(&mut source, READ_BLOCK).unwrap();
        assert_eq!(cursor.next(), Some('&'));
        assert!(cursor.ensure(&mut source, 4).unwrap());
        assert!(cursor.remaining().starts_with("amp;"));
        cursor.pushback();
        assert_eq!(cursor.next(), Some('&'));
        assert_eq!(cursor.offset(), 1);
    }

    #[test]
    fn test_ensure_hits_end() {
        let mut source = StrSource::new("ab");
        let mut cursor = Cursor::new();
        cursor.refill(&mut source, 1).unwrap();
        assert!(!cursor.ensure(&mut source, 6).unwrap());
        assert_eq!(cursor.remaining(), "ab");
    }

    #[test]
    fn test_pushback_after_refill() {
        let mut source = StrSource::from_chunks(&["ab", "\u{E9}c"]);
        let mut cursor = Cursor::new();
        cursor.refill(&mut source, READ_BLOCK).unwrap();
        cursor.next();
        assert_eq!(cursor.next(), Some('b'));
        assert!(cursor.is_exhausted());
        assert_eq!(cursor.refill(&mut source, READ_BLOCK).unwrap(), 3);
        assert_eq!(cursor.last_char(), (1, 2));
        cursor.pushback();
        assert_eq!(cursor.offset(), 1);
        assert_eq!(cursor.next(), Some('b'));
        assert_eq!(cursor.next(), Some('\u{E9}'));
        assert_eq!(cursor.offset(), 4);
        assert_eq!(cursor.column(), 4);
    }

    #[test]
    fn test_mark() {
        let mut source = StrSource::new("x\ny");
        let mut cursor = Cursor::new();
        cursor.refill(&mut source, READ_BLOCK).unwrap();
        cursor.next();
        cursor.next();
        cursor.mark_lf();
        assert_eq!(cursor.mark(), Mark { offset: 2, row: 2, column: 0 });
    }
}
