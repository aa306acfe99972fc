//! XML Entity Resolution
//!
//! Resolves references after `&` (or `%` in a DTD):
//! - Built-in entities: &lt; &gt; &amp; &quot; &apos;
//! - Numeric character references: &#123; &#x7B;
//! - Declared entities, by pushing their expansion as a new input source
//! - Undeclared entities, through the undeclared entity resolver
//!
//! A fast path works on the current buffer only and gives up at its end;
//! the full path reads character by character from the current input
//! level. Built-in names always take precedence over declarations.

use std::io;
use std::rc::Rc;

use log::{debug, trace};

use crate::config::XmlVersion;
use crate::core::dtd::{EntityDecl, EntityScope};
use crate::core::scanner::StreamScanner;
use crate::core::unicode::is_xml_char;
use crate::error::{suffix, Result, ScanError, MAX_UNICODE_CHAR};

/// Built-in entity references as they appear after `&`
const PREDEFINED_REFS: [(&str, char); 5] = [
    ("amp;", '&'),
    ("lt;", '<'),
    ("gt;", '>'),
    ("apos;", '\''),
    ("quot;", '"'),
];

/// Lookahead needed to classify a reference without leaving the buffer
const ENTITY_LOOKAHEAD: usize = 6;

/// Outcome of resolving an entity reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityResolution {
    /// Reference replaced by a single character (not to be re-parsed)
    Char(char),
    /// Expansion pushed as the new current input source
    SwitchedSource,
    /// Reference to be reported as an entity instead of being expanded
    Entity(Rc<EntityDecl>),
    /// Not resolved here; the caller falls back or reports it unexpanded
    NotResolved,
}

/// Character a built-in entity name stands for
#[inline]
pub fn predefined_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "apos" => Some('\''),
        "quot" => Some('"'),
        _ => None,
    }
}

/// Fast path decoding of `#...;` at the start of `text`.
///
/// Returns the number of bytes consumed and the (unvalidated) code point,
/// `Ok(None)` if the reference does not end inside `text`, or the offending
/// character and its end offset.
fn decode_numeric_prefix(text: &str) -> std::result::Result<Option<(usize, u32)>, NumericError> {
    let (hex, digits) = match text.strip_prefix("#x") {
        Some(rest) => (true, rest),
        None => (false, &text[1..]),
    };
    let base = text.len() - digits.len();
    let radix = if hex { 16 } else { 10 };
    let mut value: u32 = 0;
    for (i, c) in digits.char_indices() {
        if c == ';' {
            return Ok(Some((base + i + 1, value)));
        }
        let Some(digit) = c.to_digit(radix) else {
            return Err(NumericError::BadDigit { ch: c, hex, end: base + i + c.len_utf8() });
        };
        value = value * radix + digit;
        if value > MAX_UNICODE_CHAR {
            return Err(NumericError::Overflow { end: base + i + 1 });
        }
    }
    Ok(None)
}

#[derive(Debug, PartialEq, Eq)]
enum NumericError {
    BadDigit { ch: char, hex: bool, end: usize },
    Overflow { end: usize },
}

fn digit_suffix(hex: bool) -> &'static str {
    if hex {
        "; expected a hex digit (0-9a-fA-F)."
    } else {
        "; expected a decimal number."
    }
}

impl<S: EntityScope> StreamScanner<S> {
    /// Resolve a character or built-in entity reference using only what is
    /// already in the buffer. Called right after `&`.
    ///
    /// Returns `NotResolved` (cursor untouched) when the reference is
    /// something else or does not end inside the buffer.
    pub fn resolve_simple_entity(&mut self, check_std: bool) -> Result<EntityResolution> {
        let rest = self.cursor.remaining();
        if rest.starts_with('#') {
            return match decode_numeric_prefix(rest) {
                Ok(Some((len, value))) => {
                    self.cursor.advance(len);
                    Ok(EntityResolution::Char(self.validate_char(value)?))
                }
                Ok(None) => Ok(EntityResolution::NotResolved),
                Err(NumericError::BadDigit { ch, hex, end }) => {
                    self.cursor.advance(end);
                    Err(self.unexpected_char(ch, digit_suffix(hex)))
                }
                Err(NumericError::Overflow { end }) => {
                    self.cursor.advance(end);
                    Err(ScanError::Overflow { location: self.last_char_location() })
                }
            };
        }
        if check_std {
            if let Some(&(text, c)) = PREDEFINED_REFS.iter().find(|(text, _)| rest.starts_with(text)) {
                self.cursor.advance(text.len());
                return Ok(EntityResolution::Char(c));
            }
        }
        Ok(EntityResolution::NotResolved)
    }

    /// Make sure a reference can be classified from the current buffer.
    /// The `&` just read stays in the buffer so the caller can push it back.
    fn ensure_reference_lookahead(&mut self) -> Result<()> {
        if self.cursor.available() < ENTITY_LOOKAHEAD
            && !self.ensure_input(ENTITY_LOOKAHEAD)?
            && self.cursor.available() < 2
        {
            // shortest reference is `a;`
            return Err(self.unexpected_eof(suffix::IN_ENTITY_REF));
        }
        Ok(())
    }

    /// Resolve character references (and, with `check_std`, built-in
    /// entities) only. Called right after `&`.
    ///
    /// Any other reference gives `NotResolved` with the cursor still right
    /// after the `&`.
    pub fn resolve_char_only_entity(&mut self, check_std: bool) -> Result<EntityResolution> {
        self.ensure_reference_lookahead()?;
        let rest = self.cursor.remaining();
        if rest.starts_with('#') {
            self.cursor.advance(1);
            return Ok(EntityResolution::Char(self.resolve_char_ent(None)?));
        }
        if check_std {
            if let Some(&(text, c)) = PREDEFINED_REFS.iter().find(|(text, _)| rest.starts_with(text)) {
                self.cursor.advance(text.len());
                return Ok(EntityResolution::Char(c));
            }
        }
        Ok(EntityResolution::NotResolved)
    }

    /// Reverse of [`resolve_char_only_entity`](Self::resolve_char_only_entity)
    /// for non-replacing mode: returns the declaration of a general entity
    /// reference, `None` for character and built-in references (cursor left
    /// right after the `&`) or undeclared names.
    pub fn resolve_non_char_entity(&mut self) -> Result<Option<Rc<EntityDecl>>> {
        self.ensure_reference_lookahead()?;
        let rest = self.cursor.remaining();
        if rest.starts_with('#') || PREDEFINED_REFS.iter().any(|(text, _)| rest.starts_with(text)) {
            return Ok(None);
        }
        let c = self.next_char_from_current(suffix::IN_ENTITY_REF)?;
        let name = self.parse_entity_name(c)?;
        self.current_name = Some(Rc::clone(&name));
        self.scope.find_entity(&name)
    }

    /// Resolve any entity reference, reading from the current input level.
    /// Called right after `&`.
    ///
    /// `allow_ext` is false inside attribute values, where external
    /// entities are not allowed.
    pub fn fully_resolve_entity(&mut self, allow_ext: bool) -> Result<EntityResolution> {
        self.current_entity = None;
        let c = self.next_char_from_current(suffix::IN_ENTITY_REF)?;
        if c == '#' {
            if self.char_entities.is_none() {
                return Ok(EntityResolution::Char(self.resolve_char_ent(None)?));
            }
            let mut surface = String::from("#");
            let ch = self.resolve_char_ent(Some(&mut surface))?;
            return Ok(self.char_entity(ch, surface));
        }

        let name = self.parse_entity_name(c)?;
        if let Some(ch) = predefined_entity(&name) {
            if self.char_entities.is_none() {
                return Ok(EntityResolution::Char(ch));
            }
            return Ok(self.char_entity(ch, name.to_string()));
        }
        self.expand_entity(&name, allow_ext)
    }

    /// Look up entity `name` and expand it.
    ///
    /// Declared entities are pushed as a new input source, unless char
    /// references are surfaced as entities (then the declaration is
    /// returned unexpanded, except for scopes that always expand).
    /// Undeclared entities go to the undeclared entity resolver and then to
    /// [`EntityScope::handle_undeclared_entity`] in replacing mode, and are
    /// `NotResolved` otherwise.
    pub fn expand_entity(&mut self, name: &str, allow_ext: bool) -> Result<EntityResolution> {
        let name = self.config.symbols.intern(name);
        self.current_name = Some(Rc::clone(&name));

        let Some(decl) = self.scope.find_entity(&name)? else {
            if self.config.replace_entities {
                return self.expand_unresolved_entity(&name);
            }
            return Ok(EntityResolution::NotResolved);
        };

        if self.config.treat_char_refs_as_entities {
            if !self.scope.always_expand() {
                self.current_entity = Some(Rc::clone(&decl));
                return Ok(EntityResolution::Entity(decl));
            }
            self.current_entity = Some(Rc::clone(&decl));
        }
        self.push_expansion(&decl, allow_ext)?;
        Ok(EntityResolution::SwitchedSource)
    }

    fn push_expansion(&mut self, decl: &EntityDecl, allow_ext: bool) -> Result<()> {
        let name = &decl.name;
        if self.is_or_is_expanded_from(name) {
            return Err(ScanError::Recursion {
                entity: name.to_string(),
                location: self.last_char_location(),
            });
        }
        if !decl.is_parsed() {
            return Err(self.parse_error(format!("Illegal reference to unparsed external entity \"{name}\"")));
        }
        if decl.is_external {
            if !allow_ext {
                return Err(self.parse_error(format!(
                    "Encountered a reference to external parsed entity \"{name}\" when expanding attribute value: not legal as per XML 1.0/1.1 #3.1"
                )));
            }
            if !self.config.support_external_entities {
                return Err(self.parse_error(format!(
                    "Encountered a reference to external entity \"{name}\", but stream reader has feature \"support_external_entities\" disabled"
                )));
            }
        }

        let base = self.input.source.system_id();
        let resolver = self.config.entity_resolver.as_deref_mut();
        let source = match decl.expand(base.as_deref(), resolver) {
            Ok(source) => source,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(self.parse_error(format!("(was {:?}) {}", err.kind(), err)));
            }
            Err(err) => return Err(ScanError::Io(err)),
        };
        self.push_input(source, Some(Rc::clone(&decl.name)), decl.is_external);
        Ok(())
    }

    fn expand_unresolved_entity(&mut self, name: &Rc<str>) -> Result<EntityResolution> {
        if self.config.undeclared_entity_resolver.is_some() {
            if self.is_or_is_expanded_from(name) {
                return Err(ScanError::Recursion {
                    entity: name.to_string(),
                    location: self.last_char_location(),
                });
            }
            let base = self.input.source.system_id();
            let resolved = match self.config.undeclared_entity_resolver.as_deref_mut() {
                Some(resolver) => resolver.resolve_entity(None, None, base.as_deref(), name)?,
                None => None,
            };
            if let Some(mut source) = resolved {
                if self.config.treat_char_refs_as_entities {
                    // reported by name; the content is never read
                    let decl = Rc::new(EntityDecl {
                        system_id: source.system_id().map(|id| id.to_string()),
                        public_id: source.public_id().map(|id| id.to_string()),
                        ..EntityDecl::internal(name, "")
                    });
                    source.close()?;
                    self.current_entity = Some(Rc::clone(&decl));
                    return Ok(EntityResolution::Entity(decl));
                }
                self.push_input(source, Some(Rc::clone(name)), true);
                return Ok(EntityResolution::SwitchedSource);
            }
        }
        debug!(target: "xmlscan.entities", "undeclared entity {name:?}");
        let location = self.last_char_location();
        self.scope.handle_undeclared_entity(name, &location)?;
        Ok(EntityResolution::NotResolved)
    }

    /// Synthetic entity for a resolved char reference, cached by the
    /// reference's surface text
    fn char_entity(&mut self, ch: char, surface: String) -> EntityResolution {
        let decl = match self.char_entities.as_mut() {
            Some(cache) => match cache.get(&surface) {
                Some(decl) => Rc::clone(decl),
                None => {
                    trace!(target: "xmlscan.entities", "new char entity {surface:?}");
                    let decl = Rc::new(EntityDecl::internal(&surface, ch));
                    cache.put(surface, Rc::clone(&decl));
                    decl
                }
            },
            None => Rc::new(EntityDecl::internal(&surface, ch)),
        };
        self.current_entity = Some(Rc::clone(&decl));
        EntityResolution::Entity(decl)
    }

    /// Decode `[x]digits;` after `&#`, reading from the current input
    /// level. The surface text (without `&` and `;`) is appended to
    /// `surface` if given.
    fn resolve_char_ent(&mut self, mut surface: Option<&mut String>) -> Result<char> {
        let mut value: u32 = 0;
        let mut c = self.next_char_or_eof(suffix::IN_ENTITY_REF)?;
        if let Some(text) = surface.as_mut() {
            text.push(c);
        }

        if c == 'x' {
            loop {
                c = self.next_char_from_current(suffix::IN_ENTITY_REF)?;
                if c == ';' {
                    break;
                }
                if let Some(text) = surface.as_mut() {
                    text.push(c);
                }
                let Some(digit) = c.to_digit(16) else {
                    return Err(self.unexpected_char(c, digit_suffix(true)));
                };
                value = (value << 4) + digit;
                if value > MAX_UNICODE_CHAR {
                    return Err(ScanError::Overflow { location: self.last_char_location() });
                }
            }
        } else {
            while c != ';' {
                let Some(digit) = c.to_digit(10) else {
                    return Err(self.unexpected_char(c, digit_suffix(false)));
                };
                value = value * 10 + digit;
                if value > MAX_UNICODE_CHAR {
                    return Err(ScanError::Overflow { location: self.last_char_location() });
                }
                c = self.next_char_from_current(suffix::IN_ENTITY_REF)?;
                if c != ';' {
                    if let Some(text) = surface.as_mut() {
                        text.push(c);
                    }
                }
            }
        }
        self.validate_char(value)
    }

    /// Check that a decoded reference denotes a legal character
    pub(crate) fn validate_char(&self, value: u32) -> Result<char> {
        if value == 0 {
            return Err(self.parse_error("Invalid character reference: null character not allowed in XML content."));
        }
        if value > MAX_UNICODE_CHAR {
            return Err(ScanError::Overflow { location: self.last_char_location() });
        }
        let version = if self.config.allow_xml10_escaped_controls {
            XmlVersion::V1_1
        } else {
            self.xml_version
        };
        if !is_xml_char(value, version) {
            return Err(self.illegal_char(value));
        }
        char::from_u32(value).ok_or_else(|| self.illegal_char(value))
    }

    fn illegal_char(&self, value: u32) -> ScanError {
        self.parse_error(format!("Illegal character entity: expansion character (code 0x{value:x})"))
    }

    /// Take the entity recorded by the last resolution, if any
    pub fn take_current_entity(&mut self) -> Option<Rc<EntityDecl>> {
        self.current_entity.take()
    }

    /// Name of the last entity looked up
    pub fn current_name(&self) -> Option<Rc<str>> {
        self.current_name.clone()
    }
}
