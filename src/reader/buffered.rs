//! Buffered Reader Input Source
//!
//! Reads UTF-8 encoded XML from any source implementing Read trait,
//! decoding it incrementally through an internal byte buffer. A multi-byte
//! sequence split across two reads is kept in the buffer until complete.

use std::io::{self, Read};
use std::rc::Rc;

use super::InputSource;

/// Buffer size for reading chunks
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Input source decoding UTF-8 from a byte reader
pub struct ReaderSource<R: Read> {
    reader: R,
    buffer: Vec<u8>,
    pos: usize,
    end: usize,
    eof: bool,
    entity_id: Option<Rc<str>>,
    system_id: Option<Rc<str>>,
    public_id: Option<Rc<str>>,
}

impl<R: Read> ReaderSource<R> {
    /// Create a new reader source
    pub fn new(reader: R) -> Self {
        Self::with_capacity(reader, DEFAULT_BUFFER_SIZE)
    }

    /// Create a new reader source with specified buffer capacity
    pub fn with_capacity(reader: R, capacity: usize) -> Self {
        ReaderSource {
            reader,
            // room for at least one complete UTF-8 sequence
            buffer: vec![0u8; capacity.max(4)],
            pos: 0,
            end: 0,
            eof: false,
            entity_id: None,
            system_id: None,
            public_id: None,
        }
    }

    /// Mark this source as the expansion of external entity `name`
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

    /// Fill the buffer from the reader
    fn fill_buffer(&mut self) -> io::Result<bool> {
        if self.eof {
            return Ok(false);
        }

        // Compact: move remaining data to start
        if self.pos > 0 {
            let remaining = self.end - self.pos;
            if remaining > 0 {
                self.buffer.copy_within(self.pos..self.end, 0);
            }
            self.end = remaining;
            self.pos = 0;
        }

        loop {
            match self.reader.read(&mut self.buffer[self.end..]) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(false);
                }
                Ok(read) => {
                    self.end += read;
                    return Ok(true);
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }

    /// Length of the decodable prefix of the buffered bytes
    fn valid_prefix(&self) -> io::Result<usize> {
        match std::str::from_utf8(&self.buffer[self.pos..self.end]) {
            Ok(text) => Ok(text.len()),
            Err(err) if err.valid_up_to() > 0 => Ok(err.valid_up_to()),
            Err(err) if err.error_len().is_some() => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid UTF-8 byte 0x{:02x}", self.buffer[self.pos]),
            )),
            // incomplete sequence at the end of the buffer
            Err(_) => Ok(0),
        }
    }
}

impl<R: Read> InputSource for ReaderSource<R> {
    fn read_chunk(&mut self, out: &mut String, max: usize) -> io::Result<usize> {
        loop {
            let valid = self.valid_prefix()?;
            if valid > 0 {
                let bytes = &self.buffer[self.pos..self.pos + valid];
                let text = std::str::from_utf8(bytes)
                    .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
                let end = super::chunk_end(text, 0, max);
                out.push_str(&text[..end]);
                self.pos += end;
                return Ok(end);
            }
            if !self.fill_buffer()? {
                if self.pos < self.end {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "truncated UTF-8 sequence at end of input",
                    ));
                }
                return Ok(0);
            }
        }
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

    fn close(&mut self) -> io::Result<()> {
        self.eof = true;
        self.pos = self.end;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn read_all<R: Read>(source: &mut ReaderSource<R>) -> io::Result<String> {
        let mut out = String::new();
        while source.read_chunk(&mut out, 4096)? > 0 {}
        Ok(out)
    }

    #[test]
    fn test_buffered_reader() {
        let data = b"<root>content</root>";
        let mut source = ReaderSource::new(Cursor::new(data.to_vec()));
        assert_eq!(read_all(&mut source).unwrap(), "<root>content</root>");
    }

    #[test]
    fn test_split_multibyte_sequence() {
        // 4-byte buffer forces the 3-byte character across two fills
        let data = "ab\u{4E2D}cd".as_bytes().to_vec();
        let mut source = ReaderSource::with_capacity(Cursor::new(data), 4);
        assert_eq!(read_all(&mut source).unwrap(), "ab\u{4E2D}cd");
    }

    #[test]
    fn test_invalid_utf8() {
        let mut source = ReaderSource::new(Cursor::new(vec![b'a', 0xFF, b'b']));
        let mut out = String::new();
        assert_eq!(source.read_chunk(&mut out, 4096).unwrap(), 1);
        let err = source.read_chunk(&mut out, 4096).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_truncated_sequence() {
        let mut source = ReaderSource::new(Cursor::new(vec![b'a', 0xE4, 0xB8]));
        let err = read_all(&mut source).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_close() {
        let mut source = ReaderSource::new(Cursor::new(b"abc".to_vec()));
        source.close().unwrap();
        assert_eq!(read_all(&mut source).unwrap(), "");
    }
}
