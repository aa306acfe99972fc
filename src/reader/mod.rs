//! Input Sources
//!
//! Producers of decoded text for the scanner:
//! - InputSource: the abstraction the scanner reads through
//! - StrSource: in-memory text (documents, internal entity expansions)
//! - ReaderSource: UTF-8 text decoded incrementally from any `Read`
//! - XmlResolver: maps entity references to new input sources
//! - open_system_id: fallback resolution of system ids to local files

pub mod buffered;
pub mod slice;

use std::fs::File;
use std::io;
use std::path::Path;
use std::rc::Rc;

use crate::core::location::Location;

pub use buffered::ReaderSource;
pub use slice::StrSource;

/// One producer of decoded characters.
///
/// The scanner owns its sources exclusively; a source is never shared
/// between scanners.
pub trait InputSource {
    /// Append the next block of text to `out`.
    ///
    /// At most `max` bytes are appended, except that a single character is
    /// always appended whole. Returns the number of bytes appended; 0 means
    /// the source is exhausted.
    fn read_chunk(&mut self, out: &mut String, max: usize) -> io::Result<usize>;

    /// System id (URL, path) of this source, if any
    fn system_id(&self) -> Option<Rc<str>> {
        None
    }

    /// Public id of this source, if any
    fn public_id(&self) -> Option<Rc<str>> {
        None
    }

    /// Name of the entity this source is the expansion of
    fn entity_id(&self) -> Option<&str> {
        None
    }

    /// True if this source is the expansion of an internal entity
    fn from_internal_entity(&self) -> bool {
        false
    }

    /// Build a location for a position inside this source
    fn location(&self, char_offset: u64, row: u32, column: u32) -> Location {
        Location::new(char_offset, row, column).with_ids(self.public_id(), self.system_id())
    }

    /// Stop reading; underlying resources may stay open
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Stop reading and release underlying resources
    fn close_completely(&mut self) -> io::Result<()> {
        self.close()
    }
}

/// Resolves an entity (by public/system id, or just by name for undeclared
/// entities) into a new input source.
pub trait XmlResolver {
    /// `base` is the system id of the source containing the reference.
    /// `Ok(None)` means the resolver does not know the entity.
    fn resolve_entity(
        &mut self,
        public_id: Option<&str>,
        system_id: Option<&str>,
        base: Option<&str>,
        name: &str,
    ) -> io::Result<Option<Box<dyn InputSource>>>;
}

impl<F> XmlResolver for F
where
    F: FnMut(Option<&str>, Option<&str>, Option<&str>, &str) -> io::Result<Option<Box<dyn InputSource>>>,
{
    fn resolve_entity(
        &mut self,
        public_id: Option<&str>,
        system_id: Option<&str>,
        base: Option<&str>,
        name: &str,
    ) -> io::Result<Option<Box<dyn InputSource>>> {
        self(public_id, system_id, base, name)
    }
}

/// Open the file a system id points to, relative to the system id of the
/// referring source when the path is relative.
///
/// Only plain paths and `file:` URLs are understood.
pub fn open_system_id(system_id: &str, base: Option<&str>, entity: &str) -> io::Result<Box<dyn InputSource>> {
    let path = file_path(system_id).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::Unsupported,
            format!("no resolver for system id \"{system_id}\""),
        )
    })?;
    let resolved = match base.and_then(file_path) {
        Some(base) if path.is_relative() => match base.parent() {
            Some(dir) => dir.join(path),
            None => path.to_path_buf(),
        },
        _ => path.to_path_buf(),
    };
    let file = File::open(&resolved)?;
    let source = ReaderSource::new(file)
        .with_entity_id(entity)
        .with_system_id(&resolved.to_string_lossy());
    Ok(Box::new(source))
}

fn file_path(system_id: &str) -> Option<&Path> {
    if let Some(rest) = system_id.strip_prefix("file://") {
        return Some(Path::new(rest));
    }
    if let Some(rest) = system_id.strip_prefix("file:") {
        return Some(Path::new(rest));
    }
    if system_id.contains("://") {
        return None;
    }
    Some(Path::new(system_id))
}

/// Largest byte index `<= limit` that is a char boundary of `text`,
/// advanced past one whole character if that would be `start`
pub(crate) fn chunk_end(text: &str, start: usize, limit: usize) -> usize {
    let mut end = limit.min(text.len());
    while end > start && !text.is_char_boundary(end) {
        end -= 1;
    }
    if end == start && start < text.len() {
        end = start + text[start..].chars().next().map_or(0, char::len_utf8);
    }
    end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_end_ascii() {
        assert_eq!(chunk_end("abcdef", 0, 4), 4);
        assert_eq!(chunk_end("abcdef", 4, 100), 6);
    }

    #[test]
    fn test_chunk_end_multibyte() {
        let text = "a\u{4E2D}b";
        // limit falls inside the 3-byte character
        assert_eq!(chunk_end(text, 0, 2), 1);
        // never returns an empty chunk while text remains
        assert_eq!(chunk_end(text, 1, 2), 4);
    }

    #[test]
    fn test_closure_resolver() {
        let mut resolver = |_: Option<&str>,
                            sys: Option<&str>,
                            _: Option<&str>,
                            _: &str|
         -> io::Result<Option<Box<dyn InputSource>>> {
            Ok(sys.map(|s| Box::new(StrSource::new(s.to_string())) as Box<dyn InputSource>))
        };
        let found = resolver.resolve_entity(None, Some("x"), None, "e").unwrap();
        assert!(found.is_some());
        let missing = resolver.resolve_entity(None, None, None, "e").unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_file_path() {
        assert_eq!(file_path("file:///tmp/a.dtd"), Some(Path::new("/tmp/a.dtd")));
        assert_eq!(file_path("sub/a.ent"), Some(Path::new("sub/a.ent")));
        assert_eq!(file_path("http://example.com/a.dtd"), None);
    }

    #[test]
    fn test_open_system_id_relative_to_base() {
        let dir = std::env::temp_dir().join(format!("xmlscan-resolve-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("part.ent"), "<part/>").unwrap();
        let base = dir.join("doc.xml");
        let mut source = open_system_id("part.ent", Some(&base.to_string_lossy()), "part").unwrap();
        assert_eq!(source.entity_id(), Some("part"));
        let mut out = String::new();
        while source.read_chunk(&mut out, 4096).unwrap() > 0 {}
        assert_eq!(out, "<part/>");
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_open_system_id_unsupported_scheme() {
        let err = open_system_id("http://example.com/x.ent", None, "x").err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }
}
