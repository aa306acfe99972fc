//! XML Tokenizer Primitives
//!
//! Name and literal parsing on top of the scanner's character access:
//! - local names and full names (PI targets, entity/notation names)
//! - entity names with their terminating semicolon
//! - system and public identifier literals
//! - text up to a delimiter, with line break normalization
//! - name skipping and keyword checks
//!
//! Names are interned through the symbol table. They may continue across a
//! buffer refill but never past the end of an entity expansion.

use std::rc::Rc;

use memchr::memchr3;

use crate::core::dtd::EntityScope;
use crate::core::scanner::StreamScanner;
use crate::core::unicode::{is_name_char, is_name_start_char, is_pubid_char};
use crate::error::{suffix, Result, ScanError};

/// How a colon inside a name is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Colons {
    /// Colon ends the name (prefix/local name separator)
    End,
    /// Colon is part of the name (namespace processing disabled)
    Allow,
    /// Colon is an error (namespace processing enabled)
    Reject,
}

#[inline]
fn continues_name(c: char, colons: Colons) -> bool {
    if c == ':' {
        colons == Colons::Allow
    } else {
        is_name_char(c)
    }
}

impl<S: EntityScope> StreamScanner<S> {
    /// Parse a name without namespace prefix; `c` is its first character,
    /// just read.
    pub fn parse_local_name(&mut self, c: char) -> Result<Rc<str>> {
        if !is_name_start_char(c) {
            let suffix = if c == ':' {
                " (missing namespace prefix?)"
            } else {
                " (expected a name start character)"
            };
            return Err(self.unexpected_char(c, suffix));
        }
        self.scan_name(c, Colons::End)
    }

    /// Parse a full name (PI target, entity or notation name); `c` is its
    /// first character, just read.
    ///
    /// With namespace processing enabled a colon anywhere in the name is an
    /// error; otherwise colons are part of the name.
    pub fn parse_full_name(&mut self, c: char) -> Result<Rc<str>> {
        let colons = if self.config.namespace_aware {
            Colons::Reject
        } else {
            Colons::Allow
        };
        if !is_name_start_char(c) {
            if c != ':' {
                let suffix = if c <= ' ' {
                    " (missing name?)"
                } else {
                    " (expected a name start character)"
                };
                return Err(self.unexpected_char(c, suffix));
            }
            if colons == Colons::Reject {
                return Err(self.colon_error(String::from(":")));
            }
        }
        self.scan_name(c, colons)
    }

    /// [`parse_full_name`](Self::parse_full_name) starting with the next
    /// character of the current input level
    pub fn parse_full_name_next(&mut self) -> Result<Rc<str>> {
        let c = self.next_char_from_current(suffix::IN_NAME)?;
        self.parse_full_name(c)
    }

    /// Parse the name of an entity reference and the `;` after it, both
    /// from the current input level
    pub fn parse_entity_name(&mut self, c: char) -> Result<Rc<str>> {
        let name = self.parse_full_name(c)?;
        if self.cursor.is_exhausted() && !self.load_more_from_current()? {
            return Err(self.parse_error(format!("Missing semicolon after reference for entity \"{name}\"")));
        }
        match self.cursor.next() {
            Some(';') => Ok(name),
            Some(c) => Err(self.unexpected_char(
                c,
                &format!("; expected a semi-colon after the reference for entity '{name}'"),
            )),
            None => Err(self.parse_error(format!("Missing semicolon after reference for entity \"{name}\""))),
        }
    }

    /// Skip over something that looks like a name, colons included, without
    /// validating it. `c` is the first character, just read.
    ///
    /// Returns the number of characters skipped; 0 (with `c` pushed back)
    /// if `c` can not start a name. The character after the name is pushed
    /// back as well.
    pub fn skip_full_name(&mut self, c: char) -> Result<usize> {
        if !is_name_start_char(c) {
            self.pushback();
            return Ok(0);
        }
        let mut count = 1;
        loop {
            let c = self.next_char_or_eof(suffix::IN_NAME)?;
            if c != ':' && !is_name_char(c) {
                self.pushback();
                return Ok(count);
            }
            count += 1;
        }
    }

    /// Shared name scan; `c` is the (validated) first character, just read
    /// from the current buffer
    fn scan_name(&mut self, c: char, colons: Colons) -> Result<Rc<str>> {
        let start = self.cursor.pos() - c.len_utf8();
        debug_assert!(self.cursor.since(start).starts_with(c));

        let stop = self
            .cursor
            .remaining()
            .char_indices()
            .find(|&(_, ch)| !continues_name(ch, colons));
        match stop {
            Some((len, ch)) => {
                self.cursor.advance(len);
                if ch == ':' && colons == Colons::Reject {
                    let prefix = self.cursor.since(start).to_string();
                    return Err(self.colon_error(prefix));
                }
                Ok(self.config.symbols.intern(self.cursor.since(start)))
            }
            None => {
                // name may continue in the next block
                let len = self.cursor.available();
                self.cursor.advance(len);
                self.name_buffer.clear();
                self.name_buffer.push_str(self.cursor.since(start));
                self.scan_name_slow(colons)
            }
        }
    }

    fn scan_name_slow(&mut self, colons: Colons) -> Result<Rc<str>> {
        loop {
            if self.cursor.is_exhausted() && !self.load_more_from_current()? {
                break;
            }
            let Some(c) = self.cursor.peek() else {
                break;
            };
            if !continues_name(c, colons) {
                if c == ':' && colons == Colons::Reject {
                    let prefix = self.name_buffer.clone();
                    return Err(self.colon_error(prefix));
                }
                break;
            }
            self.cursor.next();
            self.push_name_char(c);
        }
        Ok(self.config.symbols.intern(&self.name_buffer))
    }

    /// Append to the name buffer, growing it by half when full
    fn push_name_char(&mut self, c: char) {
        let needed = self.name_buffer.len() + c.len_utf8();
        if needed > self.name_buffer.capacity() {
            let grow = (self.name_buffer.capacity() / 2).max(c.len_utf8());
            self.name_buffer.reserve_exact(grow);
        }
        self.name_buffer.push(c);
    }

    /// Error for a colon in a full name; the rest of the name (colons
    /// included) is read for the message
    fn colon_error(&mut self, prefix: String) -> ScanError {
        match self.parse_fname_for_error() {
            Ok(rest) => ScanError::NamespaceColon {
                name: prefix + &rest,
                location: self.last_char_location(),
            },
            Err(err) => err,
        }
    }

    fn parse_fname_for_error(&mut self) -> Result<String> {
        let mut name = String::new();
        while let Some(c) = self.next_char()? {
            if c != ':' && !is_name_char(c) {
                self.pushback();
                break;
            }
            name.push(c);
        }
        Ok(name)
    }

    /// Check that the text starting with `first` (just read) is the keyword
    /// `expected`, not followed by further name characters.
    ///
    /// Returns `None` on a match, otherwise the name actually found (for
    /// the error message). Reads from the current input level only.
    pub fn check_keyword(&mut self, first: char, expected: &str) -> Result<Option<String>> {
        let mut seen = String::with_capacity(expected.len() + 16);
        let mut c = first;
        let mut wanted = expected.chars().peekable();
        while let Some(want) = wanted.next() {
            seen.push(c);
            if c != want {
                self.read_name_tail(&mut seen)?;
                return Ok(Some(seen));
            }
            if wanted.peek().is_none() {
                break;
            }
            if self.cursor.is_exhausted() && !self.load_more_from_current()? {
                return Ok(Some(seen));
            }
            match self.cursor.next() {
                Some(next) => c = next,
                None => return Ok(Some(seen)),
            }
        }
        match self.peek_char()? {
            Some(next) if next == ':' || is_name_char(next) => {
                self.read_name_tail(&mut seen)?;
                Ok(Some(seen))
            }
            _ => Ok(None),
        }
    }

    fn read_name_tail(&mut self, seen: &mut String) -> Result<()> {
        while let Some(c) = self.peek_char()? {
            if c != ':' && !is_name_char(c) {
                break;
            }
            self.cursor.next();
            seen.push(c);
        }
        Ok(())
    }

    /// Read a system literal up to the closing `quote` (consumed, not
    /// returned).
    ///
    /// Line breaks are collapsed to `\n` when `convert_lfs` is set and the
    /// current input level is normalized; otherwise they are kept as is.
    pub fn parse_system_id(&mut self, quote: char, convert_lfs: bool, context: &str) -> Result<String> {
        let mut out = String::new();
        loop {
            let c = self.next_char_or_eof(context)?;
            if c == quote {
                return Ok(out);
            }
            match c {
                '\n' => {
                    self.mark_lf();
                    out.push('\n');
                }
                '\r' => {
                    let convert = convert_lfs && self.normalize_lfs;
                    if self.skip_crlf(c)? {
                        if !convert {
                            out.push('\r');
                        }
                        out.push('\n');
                    } else {
                        out.push(if convert { '\n' } else { '\r' });
                    }
                }
                _ => out.push(c),
            }
        }
    }

    /// Read a public id literal up to the closing `quote`.
    ///
    /// Whitespace runs are collapsed to one space; leading and trailing
    /// whitespace is dropped. Every other character must be a PubidChar.
    pub fn parse_public_id(&mut self, quote: char, context: &str) -> Result<String> {
        let mut out = String::new();
        let mut space_pending = false;
        loop {
            let c = self.next_char_or_eof(context)?;
            if c == quote {
                return Ok(out);
            }
            match c {
                '\n' | '\r' => {
                    self.skip_crlf(c)?;
                    space_pending = true;
                }
                ' ' => space_pending = true,
                _ if !is_pubid_char(c) => {
                    return Err(self.unexpected_char(c, suffix::IN_PUBLIC_ID));
                }
                _ => {
                    if space_pending && !out.is_empty() {
                        out.push(' ');
                    }
                    space_pending = false;
                    out.push(c);
                }
            }
        }
    }

    /// Append text to `out` up to the delimiter `end` (consumed, not
    /// appended), continuing through entity expansions.
    ///
    /// With `convert_lfs` (and a normalized input level) `\r\n` and `\r`
    /// are appended as `\n`; otherwise line breaks are kept as they are.
    pub fn parse_until(&mut self, out: &mut String, end: char, convert_lfs: bool, context: &str) -> Result<()> {
        self.scan_until(out, end, convert_lfs, context, true)
    }

    /// [`parse_until`](Self::parse_until) restricted to the current input
    /// level; its end is an error
    pub fn parse_until_in_current(
        &mut self,
        out: &mut String,
        end: char,
        convert_lfs: bool,
        context: &str,
    ) -> Result<()> {
        self.scan_until(out, end, convert_lfs, context, false)
    }

    fn scan_until(
        &mut self,
        out: &mut String,
        end: char,
        convert_lfs: bool,
        context: &str,
        across_inputs: bool,
    ) -> Result<()> {
        let mut utf8 = [0u8; 4];
        let lead = end.encode_utf8(&mut utf8).as_bytes()[0];
        loop {
            if self.cursor.is_exhausted() {
                if across_inputs {
                    self.load_more_or_eof(context)?;
                } else {
                    self.load_more_from_current_or_eob(context)?;
                }
            }
            let rest = self.cursor.remaining();
            let Some(i) = memchr3(lead, b'\n', b'\r', rest.as_bytes()) else {
                out.push_str(rest);
                let len = rest.len();
                self.cursor.advance(len);
                continue;
            };
            out.push_str(&rest[..i]);
            let found = rest[i..].chars().next();
            match found {
                Some(c) if c == end => {
                    self.cursor.advance(i + c.len_utf8());
                    return Ok(());
                }
                Some('\n') => {
                    self.cursor.advance(i + 1);
                    self.mark_lf();
                    out.push('\n');
                }
                Some('\r') => {
                    self.cursor.advance(i + 1);
                    let convert = convert_lfs && self.normalize_lfs;
                    let crlf = self.skip_crlf('\r')?;
                    match (convert, crlf) {
                        (true, _) => out.push('\n'),
                        (false, true) => out.push_str("\r\n"),
                        (false, false) => out.push('\r'),
                    }
                }
                // other character sharing the delimiter's lead byte
                Some(c) => {
                    self.cursor.advance(i + c.len_utf8());
                    out.push(c);
                }
                None => self.cursor.advance(i),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScannerConfig;
    use crate::core::dtd::DocumentScope;
    use crate::reader::StrSource;

    fn scanner(source: StrSource) -> StreamScanner<DocumentScope> {
        StreamScanner::new(source, ScannerConfig::default(), DocumentScope::new())
    }

    fn first(sc: &mut StreamScanner<DocumentScope>) -> char {
        sc.next_char().unwrap().unwrap()
    }

    #[test]
    fn test_local_name() {
        let mut sc = scanner(StrSource::new("ns:local rest"));
        let c = first(&mut sc);
        assert_eq!(&*sc.parse_local_name(c).unwrap(), "ns");
        assert_eq!(sc.next_char().unwrap(), Some(':'));
        let c = first(&mut sc);
        assert_eq!(&*sc.parse_local_name(c).unwrap(), "local");
        assert_eq!(sc.next_char().unwrap(), Some(' '));
    }

    #[test]
    fn test_local_name_interned() {
        let mut sc = scanner(StrSource::new("abc abc"));
        let c = first(&mut sc);
        let a = sc.parse_local_name(c).unwrap();
        sc.next_char().unwrap();
        let c = first(&mut sc);
        let b = sc.parse_local_name(c).unwrap();
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_local_name_across_refill() {
        let mut sc = scanner(StrSource::from_chunks(&["long_na", "me_here>"]));
        let c = first(&mut sc);
        assert_eq!(&*sc.parse_local_name(c).unwrap(), "long_name_here");
        assert_eq!(sc.next_char().unwrap(), Some('>'));
    }

    #[test]
    fn test_long_name_grows_buffer() {
        let name = "n".repeat(500);
        let mut sc = scanner(StrSource::new(format!("{name}/")).with_block_size(7));
        let c = first(&mut sc);
        assert_eq!(&*sc.parse_local_name(c).unwrap(), name.as_str());
    }

    #[test]
    fn test_local_name_errors() {
        let mut sc = scanner(StrSource::new(":x"));
        let c = first(&mut sc);
        let err = sc.parse_local_name(c).unwrap_err();
        assert!(err.to_string().contains("(missing namespace prefix?)"));

        let mut sc = scanner(StrSource::new("1x"));
        let c = first(&mut sc);
        let err = sc.parse_local_name(c).unwrap_err();
        assert!(err.to_string().contains("(expected a name start character)"));
    }

    #[test]
    fn test_full_name_colon_rejected() {
        let mut sc = scanner(StrSource::new("a:b:c?"));
        let c = first(&mut sc);
        let err = sc.parse_full_name(c).unwrap_err();
        match err {
            ScanError::NamespaceColon { name, .. } => assert_eq!(name, "a:b:c"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_full_name_colon_rejected_after_refill() {
        let mut sc = scanner(StrSource::from_chunks(&["a", "b:c "]));
        let c = first(&mut sc);
        let err = sc.parse_full_name(c).unwrap_err();
        assert!(matches!(err, ScanError::NamespaceColon { ref name, .. } if name == "ab:c"));
    }

    #[test]
    fn test_full_name_leading_colon() {
        let mut sc = scanner(StrSource::new(":x "));
        let c = first(&mut sc);
        let err = sc.parse_full_name(c).unwrap_err();
        assert!(matches!(err, ScanError::NamespaceColon { ref name, .. } if name == ":x"));
    }

    #[test]
    fn test_full_name_without_namespaces() {
        let config = ScannerConfig::new().with_namespace_aware(false);
        let mut sc = StreamScanner::new(StrSource::new("a:b:c?"), config, DocumentScope::new());
        let c = first(&mut sc);
        assert_eq!(&*sc.parse_full_name(c).unwrap(), "a:b:c");
    }

    #[test]
    fn test_full_name_missing() {
        let mut sc = scanner(StrSource::new(" x"));
        let c = first(&mut sc);
        let err = sc.parse_full_name(c).unwrap_err();
        assert!(err.to_string().contains("(missing name?)"));
    }

    #[test]
    fn test_full_name_stops_at_expansion_end() {
        let mut sc = scanner(StrSource::new("cd"));
        sc.init_input_source(Box::new(StrSource::for_entity("e", "ab")), false);
        let c = first(&mut sc);
        assert_eq!(&*sc.parse_full_name(c).unwrap(), "ab");
        assert_eq!(sc.next_char().unwrap(), Some('c'));
    }

    #[test]
    fn test_full_name_next() {
        let mut sc = scanner(StrSource::new("target data"));
        assert_eq!(&*sc.parse_full_name_next().unwrap(), "target");
    }

    #[test]
    fn test_entity_name() {
        let mut sc = scanner(StrSource::new("name;"));
        let c = first(&mut sc);
        assert_eq!(&*sc.parse_entity_name(c).unwrap(), "name");

        let mut sc = scanner(StrSource::new("name "));
        let c = first(&mut sc);
        let err = sc.parse_entity_name(c).unwrap_err();
        assert!(err.to_string().contains("expected a semi-colon after the reference for entity 'name'"));

        let mut sc = scanner(StrSource::new("name"));
        let c = first(&mut sc);
        let err = sc.parse_entity_name(c).unwrap_err();
        assert!(err.to_string().starts_with("Missing semicolon after reference for entity \"name\""));
    }

    #[test]
    fn test_skip_full_name() {
        let mut sc = scanner(StrSource::new("a:b-c.d>"));
        let c = first(&mut sc);
        assert_eq!(sc.skip_full_name(c).unwrap(), 7);
        assert_eq!(sc.next_char().unwrap(), Some('>'));

        let mut sc = scanner(StrSource::new("-x"));
        let c = first(&mut sc);
        assert_eq!(sc.skip_full_name(c).unwrap(), 0);
        assert_eq!(sc.next_char().unwrap(), Some('-'));
    }

    #[test]
    fn test_check_keyword() {
        let mut sc = scanner(StrSource::new("DOCTYPE root"));
        let c = first(&mut sc);
        assert_eq!(sc.check_keyword(c, "DOCTYPE").unwrap(), None);
        assert_eq!(sc.next_char().unwrap(), Some(' '));

        let mut sc = scanner(StrSource::new("DOCTYPEX "));
        let c = first(&mut sc);
        assert_eq!(sc.check_keyword(c, "DOCTYPE").unwrap().as_deref(), Some("DOCTYPEX"));

        let mut sc = scanner(StrSource::new("DOCKS "));
        let c = first(&mut sc);
        assert_eq!(sc.check_keyword(c, "DOCTYPE").unwrap().as_deref(), Some("DOCKS"));
    }

    #[test]
    fn test_system_id() {
        let mut sc = scanner(StrSource::new("a\r\nb\rc\"rest"));
        assert_eq!(sc.parse_system_id('"', true, suffix::IN_SYSTEM_ID).unwrap(), "a\nb\nc");
        assert_eq!(sc.next_char().unwrap(), Some('r'));
        assert_eq!(sc.current_location().row, 3);

        let mut sc = scanner(StrSource::new("a\r\nb\rc'"));
        assert_eq!(sc.parse_system_id('\'', false, suffix::IN_SYSTEM_ID).unwrap(), "a\r\nb\rc");
    }

    #[test]
    fn test_system_id_eof() {
        let mut sc = scanner(StrSource::new("never closed"));
        let err = sc.parse_system_id('"', true, suffix::IN_SYSTEM_ID).unwrap_err();
        assert!(err.to_string().starts_with("Unexpected EOF in system identifier"));
    }

    #[test]
    fn test_public_id_collapses_whitespace() {
        let mut sc = scanner(StrSource::new("  -//W3C//DTD  \r\n XHTML 1.0//EN \n\""));
        assert_eq!(
            sc.parse_public_id('"', suffix::IN_PUBLIC_ID).unwrap(),
            "-//W3C//DTD XHTML 1.0//EN"
        );
    }

    #[test]
    fn test_public_id_invalid_char() {
        let mut sc = scanner(StrSource::new("abc{def\""));
        let err = sc.parse_public_id('"', suffix::IN_PUBLIC_ID).unwrap_err();
        assert!(matches!(err, ScanError::UnexpectedChar { ch: '{', .. }));
        assert!(err.to_string().contains("in public identifier"));
    }

    #[test]
    fn test_parse_until() {
        let mut sc = scanner(StrSource::from_chunks(&["comment\r", "\ntext\rmore-", "->"]));
        let mut out = String::new();
        sc.parse_until(&mut out, '-', true, suffix::IN_TEXT).unwrap();
        assert_eq!(out, "comment\ntext\nmore");
        assert_eq!(sc.next_char().unwrap(), Some('-'));
        assert_eq!(sc.current_location().row, 3);
    }

    #[test]
    fn test_parse_until_keeps_line_breaks() {
        let mut sc = scanner(StrSource::new("a\r\nb\rc\nd?"));
        let mut out = String::new();
        sc.parse_until(&mut out, '?', false, suffix::IN_TEXT).unwrap();
        assert_eq!(out, "a\r\nb\rc\nd");
    }

    #[test]
    fn test_parse_until_non_ascii_delimiter() {
        let mut sc = scanner(StrSource::new("\u{E9}t\u{E8}\u{E9}"));
        let mut out = String::new();
        // '\u{E8}' and '\u{E9}' share their UTF-8 lead byte
        sc.parse_until(&mut out, '\u{E8}', true, suffix::IN_TEXT).unwrap();
        assert_eq!(out, "\u{E9}t");
        assert_eq!(sc.next_char().unwrap(), Some('\u{E9}'));
    }

    #[test]
    fn test_parse_until_spans_expansion() {
        let mut sc = scanner(StrSource::new("c]"));
        sc.init_input_source(Box::new(StrSource::for_entity("e", "ab")), false);
        let mut out = String::new();
        sc.parse_until(&mut out, ']', true, suffix::IN_TEXT).unwrap();
        assert_eq!(out, "abc");

        let mut sc = scanner(StrSource::new("c]"));
        sc.init_input_source(Box::new(StrSource::for_entity("e", "ab")), false);
        let mut out = String::new();
        let err = sc.parse_until_in_current(&mut out, ']', true, suffix::IN_TEXT).unwrap_err();
        assert!(matches!(err, ScanError::UnexpectedEob { .. }));
    }
}
