//! Source Locations
//!
//! A position in the decoded input, bound to the input source it came from.
//! Locations inside an entity expansion keep the location of the reference
//! that opened the expansion.

use std::fmt;
use std::rc::Rc;

/// Position of a character in one input source.
///
/// Rows and columns are 1-based. Offsets and columns count bytes of the
/// decoded (UTF-8) text, so a non-ASCII character advances them by more
/// than one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// System id of the input source, if known
    pub system_id: Option<Rc<str>>,
    /// Public id of the input source, if known
    pub public_id: Option<Rc<str>>,
    /// Bytes before this position within the input source
    pub char_offset: u64,
    /// Line number
    pub row: u32,
    /// Column within the line
    pub column: u32,
    /// Location of the entity reference this input was expanded from
    pub context: Option<Rc<Location>>,
}

impl Location {
    pub fn new(char_offset: u64, row: u32, column: u32) -> Self {
        Location {
            system_id: None,
            public_id: None,
            char_offset,
            row,
            column,
            context: None,
        }
    }

    /// Location used when nothing better is known
    pub fn empty() -> Self {
        Location::new(0, 1, 1)
    }

    pub fn with_ids(mut self, public_id: Option<Rc<str>>, system_id: Option<Rc<str>>) -> Self {
        self.public_id = public_id;
        self.system_id = system_id;
        self
    }

    pub fn with_context(mut self, context: Option<Rc<Location>>) -> Self {
        self.context = context;
        self
    }

    /// Number of entity expansions between this location and the document
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut curr = self.context.as_deref();
        while let Some(loc) = curr {
            depth += 1;
            curr = loc.context.as_deref();
        }
        depth
    }
}

impl Default for Location {
    fn default() -> Self {
        Location::empty()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[row,col")?;
        if let Some(id) = &self.system_id {
            write!(f, " {{{id}}}")?;
        }
        write!(f, "]: [{},{}]", self.row, self.column)?;
        if let Some(ctx) = &self.context {
            write!(f, "\n from {ctx}")?;
        }
        Ok(())
    }
}
