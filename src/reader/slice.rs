//! In-Memory Input Source
//!
//! Serves text that is already fully decoded: whole documents held in
//! memory and the replacement text of internal entities. Reads can be cut
//! into fixed-size blocks or at explicit offsets, which is how buffer
//! boundaries are exercised in tests.

use std::io;
use std::rc::Rc;

use super::{chunk_end, InputSource};

/// Input source over an owned string
#[derive(Debug, Clone)]
pub struct StrSource {
    text: String,
    pos: usize,
    /// Upper bound for a single read
    block_size: usize,
    /// Offsets a single read never crosses
    boundaries: Vec<usize>,
    entity_id: Option<Rc<str>>,
    system_id: Option<Rc<str>>,
    public_id: Option<Rc<str>>,
    internal_entity: bool,
    closed: bool,
}

impl StrSource {
    /// Create a source for a document (or other top-level text)
    pub fn new(text: impl Into<String>) -> Self {
        StrSource {
            text: text.into(),
            pos: 0,
            block_size: usize::MAX,
            boundaries: Vec::new(),
            entity_id: None,
            system_id: None,
            public_id: None,
            internal_entity: false,
            closed: false,
        }
    }

    /// Create a source for the expansion of internal entity `name`
    pub fn for_entity(name: &str, replacement: impl Into<String>) -> Self {
        let mut source = StrSource::new(replacement);
        source.entity_id = Some(Rc::from(name));
        source.internal_entity = true;
        source
    }

    /// Create a source that hands out `chunks` one read at a time
    pub fn from_chunks<S: AsRef<str>>(chunks: &[S]) -> Self {
        let mut text = String::new();
        let mut boundaries = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            text.push_str(chunk.as_ref());
            boundaries.push(text.len());
        }
        let mut source = StrSource::new(text);
        source.boundaries = boundaries;
        source
    }

    /// Never return more than `size` bytes from one read
    pub fn with_block_size(mut self, size: usize) -> Self {
        self.block_size = size.max(1);
        self
    }

    /// Additionally cut reads at the given byte offset
    pub fn with_boundary(mut self, offset: usize) -> Self {
        self.boundaries.push(offset);
        self.boundaries.sort_unstable();
        self
    }

    /// Mark this source as the expansion of an external entity `name`
    pub fn with_entity_id(mut self, name: &str) -> Self {
        self.entity_id = Some(Rc::from(name));
        self
    }

    pub fn with_system_id(mut self, system_id: &str) -> Self {
        self.system_id = Some(Rc::from(system_id));
        self
    }

    pub fn with_public_id(mut self, public_id: &str) -> Self {
        self.public_id = Some(Rc::from(public_id));
        self
    }

    /// Bytes not yet handed out
    pub fn remaining(&self) -> &str {
        &self.text[self.pos..]
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl InputSource for StrSource {
    fn read_chunk(&mut self, out: &mut String, max: usize) -> io::Result<usize> {
        if self.closed || self.pos >= self.text.len() {
            return Ok(0);
        }
        let mut limit = self.pos.saturating_add(max.min(self.block_size));
        if let Some(&boundary) = self.boundaries.iter().find(|&&b| b > self.pos) {
            limit = limit.min(boundary);
        }
        let end = chunk_end(&self.text, self.pos, limit);
        out.push_str(&self.text[self.pos..end]);
        let count = end - self.pos;
        self.pos = end;
        Ok(count)
    }

    fn system_id(&self) -> Option<Rc<str>> {
        self.system_id.clone()
    }

    fn public_id(&self) -> Option<Rc<str>> {
        self.public_id.clone()
    }

    fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    fn from_internal_entity(&self) -> bool {
        self.internal_entity
    }

    fn close(&mut self) -> io::Result<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(source: &mut StrSource, max: usize) -> Vec<String> {
        let mut reads = Vec::new();
        loop {
            let mut out = String::new();
            if source.read_chunk(&mut out, max).unwrap() == 0 {
                break;
            }
            reads.push(out);
        }
        reads
    }

    #[test]
    fn test_single_read() {
        let mut source = StrSource::new("<root/>");
        assert_eq!(drain(&mut source, 4096), vec!["<root/>"]);
    }

    #[test]
    fn test_block_size() {
        let mut source = StrSource::new("abcdefg").with_block_size(3);
        assert_eq!(drain(&mut source, 4096), vec!["abc", "def", "g"]);
    }

    #[test]
    fn test_from_chunks() {
        let mut source = StrSource::from_chunks(&["ab", "cdef", "", "g"]);
        assert_eq!(drain(&mut source, 4096), vec!["ab", "cdef", "g"]);
    }

    #[test]
    fn test_boundary_respects_chars() {
        let mut source = StrSource::new("x\u{E9}y").with_block_size(2);
        assert_eq!(drain(&mut source, 4096), vec!["x", "\u{E9}", "y"]);
    }

    #[test]
    fn test_entity_source() {
        let source = StrSource::for_entity("x", "1");
        assert_eq!(source.entity_id(), Some("x"));
        assert!(source.from_internal_entity());
        assert!(!StrSource::new("").from_internal_entity());
    }

    #[test]
    fn test_close_stops_reads() {
        let mut source = StrSource::new("abc");
        source.close().unwrap();
        assert!(source.is_closed());
        assert!(drain(&mut source, 10).is_empty());
    }
}
