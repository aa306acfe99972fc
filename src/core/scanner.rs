//! Stream Scanner
//!
//! Character level reading shared by the document reader and the DTD
//! reader:
//! - input stack: push on entity expansion, pop to the parent on exhaustion
//! - character reads with end-of-input and end-of-block variants
//! - whitespace skipping and line break tracking
//! - locations, problem reporting and deferred errors
//!
//! Entity resolution (`entities`) and name/literal parsing (`tokenizer`)
//! are further `impl` blocks of [`StreamScanner`].

use std::mem;
use std::num::NonZeroUsize;
use std::rc::Rc;

use log::{debug, trace};
use lru::LruCache;

use crate::config::{ScannerConfig, XmlVersion};
use crate::core::cursor::{Cursor, Mark, READ_BLOCK};
use crate::core::dtd::{EntityDecl, EntityScope};
use crate::core::location::Location;
use crate::core::symbols::SymbolTable;
use crate::core::unicode::char_desc;
use crate::error::{Result, ScanError};
use crate::reader::InputSource;
use crate::report::{Severity, ValidationProblem};

/// One level of the input stack
pub(crate) struct InputFrame {
    pub(crate) source: Box<dyn InputSource>,
    /// Cursor of this level while a nested expansion is current
    saved: Cursor,
    /// Nesting depth when this level was opened
    scope_id: usize,
    is_root: bool,
    /// Entity this level expands, as named by the reference
    entity: Option<Rc<str>>,
    /// Location of the reference that opened this level
    origin: Option<Rc<Location>>,
}

impl InputFrame {
    fn root(source: Box<dyn InputSource>) -> Self {
        InputFrame {
            source,
            saved: Cursor::new(),
            scope_id: 0,
            is_root: true,
            entity: None,
            origin: None,
        }
    }
}

/// Low-level XML scanner over a stack of input sources.
///
/// `S` decides how entity references are looked up: [`DocumentScope`]
/// for general entities in content, [`DtdScope`] for parameter entities.
///
/// [`DocumentScope`]: crate::DocumentScope
/// [`DtdScope`]: crate::DtdScope
pub struct StreamScanner<S: EntityScope> {
    pub(crate) config: ScannerConfig,
    pub(crate) scope: S,
    pub(crate) cursor: Cursor,
    pub(crate) input: InputFrame,
    parents: Vec<InputFrame>,
    curr_depth: usize,
    input_top_depth: usize,
    /// LF normalization for the current input level
    pub(crate) normalize_lfs: bool,
    pub(crate) xml_version: XmlVersion,
    /// Scratch buffer for names and literals that cross a refill
    pub(crate) name_buffer: String,
    token_start: Mark,
    /// Synthetic entities for char references, keyed by surface text
    pub(crate) char_entities: Option<LruCache<String, Rc<EntityDecl>>>,
    pub(crate) current_entity: Option<Rc<EntityDecl>>,
    pub(crate) current_name: Option<Rc<str>>,
    deferred: Option<ScanError>,
}

impl<S: EntityScope> StreamScanner<S> {
    /// Create a scanner reading `root` as the document (or DTD) input
    pub fn new(root: impl InputSource + 'static, config: ScannerConfig, scope: S) -> Self {
        let char_entities = if config.treat_char_refs_as_entities {
            NonZeroUsize::new(config.char_entity_cache_size.max(1)).map(LruCache::new)
        } else {
            None
        };
        StreamScanner {
            normalize_lfs: config.normalize_lfs,
            config,
            scope,
            cursor: Cursor::new(),
            input: InputFrame::root(Box::new(root)),
            parents: Vec::new(),
            curr_depth: 0,
            input_top_depth: 0,
            xml_version: XmlVersion::Unknown,
            name_buffer: String::with_capacity(64),
            token_start: Mark::default(),
            char_entities,
            current_entity: None,
            current_name: None,
            deferred: None,
        }
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn scope(&self) -> &S {
        &self.scope
    }

    pub fn scope_mut(&mut self) -> &mut S {
        &mut self.scope
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.config.symbols
    }

    pub fn xml_version(&self) -> XmlVersion {
        self.xml_version
    }

    /// Set the version from the XML declaration; affects which escaped
    /// characters are legal
    pub fn set_xml_version(&mut self, version: XmlVersion) {
        self.xml_version = version;
    }

    /// Whether line breaks of the current input level are normalized
    pub fn normalize_lfs(&self) -> bool {
        self.normalize_lfs
    }

    /// Input source characters are currently read from
    pub fn current_input(&self) -> &dyn InputSource {
        self.input.source.as_ref()
    }

    /// Number of entity expansions currently open
    pub fn input_depth(&self) -> usize {
        self.parents.len()
    }

    // Nesting depth bookkeeping: the embedding reader enters a scope for
    // every element/declaration it opens, so that an expansion closing
    // with scopes still open can be detected.

    pub fn enter_scope(&mut self) {
        self.curr_depth += 1;
    }

    pub fn leave_scope(&mut self) {
        self.curr_depth = self.curr_depth.saturating_sub(1);
    }

    pub fn current_depth(&self) -> usize {
        self.curr_depth
    }

    /// Nesting depth when the current input level was opened
    pub fn input_top_depth(&self) -> usize {
        self.input_top_depth
    }

    /// True if the current input is the expansion of entity `name`, or
    /// nested (at any depth) in such an expansion
    pub fn is_or_is_expanded_from(&self, name: &str) -> bool {
        self.input.entity.as_deref() == Some(name)
            || self
                .parents
                .iter()
                .any(|frame| frame.entity.as_deref() == Some(name))
    }

    // ---------------------------------------------------------------
    // Input stack
    // ---------------------------------------------------------------

    /// Refill the buffer, popping exhausted input levels.
    ///
    /// Returns false once the root input is exhausted.
    pub fn load_more(&mut self) -> Result<bool> {
        loop {
            let count = self.cursor.refill(self.input.source.as_mut(), READ_BLOCK)?;
            if count > 0 {
                return Ok(true);
            }
            self.input.source.close()?;
            if self.input.is_root {
                return Ok(false);
            }
            if self.curr_depth != self.input.scope_id {
                let location = self.last_char_location();
                self.scope
                    .handle_incomplete_entity_nesting(self.input.entity.as_deref(), &location)?;
            }
            let Some(parent) = self.parents.pop() else {
                return Err(self.null_parent());
            };
            let closed = mem::replace(&mut self.input, parent);
            self.cursor = mem::take(&mut self.input.saved);
            self.input_top_depth = self.input.scope_id;
            if !self.normalize_lfs {
                self.normalize_lfs = !self.input.source.from_internal_entity();
            }
            trace!(
                target: "xmlscan.input",
                "closed expansion of {:?}, back at depth {}",
                closed.entity,
                self.parents.len()
            );
            if !self.cursor.is_exhausted() {
                return Ok(true);
            }
        }
    }

    /// [`load_more`](Self::load_more) that fails at the end of the root input
    pub fn load_more_or_eof(&mut self, context: &str) -> Result<()> {
        if self.load_more()? {
            Ok(())
        } else {
            Err(self.unexpected_eof(context))
        }
    }

    /// Refill from the current input level only.
    ///
    /// Returns false once the current level is exhausted.
    pub fn load_more_from_current(&mut self) -> Result<bool> {
        let count = self.cursor.refill(self.input.source.as_mut(), READ_BLOCK)?;
        Ok(count > 0)
    }

    /// [`load_more_from_current`](Self::load_more_from_current) that fails
    /// at the end of the current level
    pub fn load_more_from_current_or_eob(&mut self, context: &str) -> Result<()> {
        if self.load_more_from_current()? {
            Ok(())
        } else {
            Err(self.unexpected_eob(context))
        }
    }

    /// Make at least `min` bytes available in the current buffer, reading
    /// only from the current input level
    pub fn ensure_input(&mut self, min: usize) -> Result<bool> {
        Ok(self.cursor.ensure(self.input.source.as_mut(), min)?)
    }

    /// Make `source` the current input; the next read comes from it.
    ///
    /// The level is recorded under the entity id the source reports.
    /// `is_external` enables LF normalization for the new level.
    pub fn init_input_source(&mut self, source: Box<dyn InputSource>, is_external: bool) {
        let entity = source.entity_id().map(Rc::from);
        self.push_input(source, entity, is_external);
    }

    /// Push the expansion of entity `entity`. The name, not the source's
    /// own entity id, is what recursion checks see.
    pub(crate) fn push_input(&mut self, source: Box<dyn InputSource>, entity: Option<Rc<str>>, is_external: bool) {
        let origin = Rc::new(self.last_char_location());
        trace!(
            target: "xmlscan.input",
            "expanding {:?} (external: {}) at depth {}",
            entity,
            is_external,
            self.parents.len() + 1
        );
        let frame = InputFrame {
            source,
            saved: Cursor::new(),
            scope_id: self.curr_depth,
            is_root: false,
            entity,
            origin: Some(origin),
        };
        let mut parent = mem::replace(&mut self.input, frame);
        parent.saved = mem::replace(&mut self.cursor, Cursor::new());
        self.parents.push(parent);
        self.input_top_depth = self.curr_depth;
        self.normalize_lfs = is_external;
    }

    /// Close every input level from the current one up to the root.
    ///
    /// `force` also releases underlying resources the source does not own
    /// outright.
    pub fn close_all_input(&mut self, force: bool) -> Result<()> {
        debug!(
            target: "xmlscan.input",
            "closing {} input level(s), force: {}",
            self.parents.len() + 1,
            force
        );
        loop {
            if force {
                self.input.source.close_completely()?;
            } else {
                self.input.source.close()?;
            }
            if self.input.is_root {
                return Ok(());
            }
            let Some(parent) = self.parents.pop() else {
                return Err(self.null_parent());
            };
            self.input = parent;
            self.cursor = mem::take(&mut self.input.saved);
        }
    }

    fn null_parent(&self) -> ScanError {
        ScanError::Internal(format!(
            "null parent for input source of entity {:?}",
            self.input.entity
        ))
    }

    // ---------------------------------------------------------------
    // Character access
    // ---------------------------------------------------------------

    /// Unread bytes left in the current buffer
    #[inline]
    pub fn input_in_buffer(&self) -> usize {
        self.cursor.available()
    }

    /// Next character from the input chain; `None` at the end of the root
    #[inline]
    pub fn next_char(&mut self) -> Result<Option<char>> {
        if self.cursor.is_exhausted() && !self.load_more()? {
            return Ok(None);
        }
        Ok(self.cursor.next())
    }

    /// Next character of the current input level without consuming it
    pub fn peek_char(&mut self) -> Result<Option<char>> {
        if self.cursor.is_exhausted() && !self.load_more_from_current()? {
            return Ok(None);
        }
        Ok(self.cursor.peek())
    }

    /// Next character; the end of the root input is an error
    #[inline]
    pub fn next_char_or_eof(&mut self, context: &str) -> Result<char> {
        if self.cursor.is_exhausted() {
            self.load_more_or_eof(context)?;
        }
        match self.cursor.next() {
            Some(c) => Ok(c),
            None => Err(self.unexpected_eof(context)),
        }
    }

    /// Next character of the current input level; its end is an error
    #[inline]
    pub fn next_char_from_current(&mut self, context: &str) -> Result<char> {
        if self.cursor.is_exhausted() {
            self.load_more_from_current_or_eob(context)?;
        }
        match self.cursor.next() {
            Some(c) => Ok(c),
            None => Err(self.unexpected_eob(context)),
        }
    }

    /// First non-whitespace character; `None` at the end of the root input
    pub fn next_after_ws(&mut self) -> Result<Option<char>> {
        loop {
            let Some(c) = self.next_char()? else {
                return Ok(None);
            };
            if c > ' ' {
                return Ok(Some(c));
            }
            self.skip_ws_char(c)?;
        }
    }

    /// First non-whitespace character; the end of the root input is an error
    pub fn next_char_after_ws(&mut self, context: &str) -> Result<char> {
        loop {
            let c = self.next_char_or_eof(context)?;
            if c > ' ' {
                return Ok(c);
            }
            self.skip_ws_char(c)?;
        }
    }

    /// First non-whitespace character of the current input level
    pub fn next_in_current_after_ws(&mut self, context: &str) -> Result<char> {
        loop {
            let c = self.next_char_from_current(context)?;
            if c > ' ' {
                return Ok(c);
            }
            self.skip_ws_char(c)?;
        }
    }

    fn skip_ws_char(&mut self, c: char) -> Result<()> {
        match c {
            '\n' | '\r' => {
                self.skip_crlf(c)?;
                Ok(())
            }
            ' ' | '\t' => Ok(()),
            _ => Err(self.invalid_space(c)),
        }
    }

    /// Account for the line break `c` that was just read.
    ///
    /// For `\r` a directly following `\n` (in the current input level) is
    /// consumed too; returns true in that case.
    pub fn skip_crlf(&mut self, c: char) -> Result<bool> {
        let crlf = c == '\r' && self.peek_char()? == Some('\n');
        if crlf {
            self.cursor.advance(1);
        }
        self.cursor.mark_lf();
        Ok(crlf)
    }

    /// Record a line break ending at the current position
    #[inline]
    pub fn mark_lf(&mut self) {
        self.cursor.mark_lf();
    }

    /// Un-read the last character read. Only one character can be pushed
    /// back at a time.
    ///
    /// A refill of the current level (e.g. by [`peek_char`](Self::peek_char))
    /// in between is fine; the end of an entity expansion is not, as the
    /// character belonged to the closed level.
    #[inline]
    pub fn pushback(&mut self) {
        self.cursor.pushback();
    }

    // ---------------------------------------------------------------
    // Locations
    // ---------------------------------------------------------------

    /// Remember the current position as the start of a token
    pub fn mark_token_start(&mut self) {
        self.token_start = self.cursor.mark();
    }

    fn location_at(&self, offset: u64, row: u32, column: u32) -> Location {
        self.input
            .source
            .location(offset, row, column)
            .with_context(self.input.origin.clone())
    }

    /// Location of the last [`mark_token_start`](Self::mark_token_start)
    pub fn start_location(&self) -> Location {
        let mark = self.token_start;
        self.location_at(mark.offset, mark.row, mark.column + 1)
    }

    /// Location of the next character to be read
    pub fn current_location(&self) -> Location {
        self.location_at(self.cursor.offset(), self.cursor.row(), self.cursor.column() + 1)
    }

    /// Location of the last character read
    pub fn last_char_location(&self) -> Location {
        let (offset, column) = self.cursor.last_char();
        self.location_at(offset, self.cursor.row(), column)
    }

    // ---------------------------------------------------------------
    // Errors and problem reporting
    // ---------------------------------------------------------------

    /// Well-formedness error at the last character read
    pub fn parse_error(&self, message: impl Into<String>) -> ScanError {
        ScanError::parse(message, self.last_char_location())
    }

    pub(crate) fn unexpected_char(&self, c: char, suffix: &str) -> ScanError {
        ScanError::UnexpectedChar {
            ch: c,
            message: format!("Unexpected character {}{}", char_desc(c), suffix),
            location: self.last_char_location(),
        }
    }

    pub(crate) fn invalid_space(&self, c: char) -> ScanError {
        let message = if c == '\0' {
            "Illegal character (NULL, unicode 0) encountered: not valid in any content".to_string()
        } else if self.xml_version.is_xml11() {
            format!(
                "Illegal character ({}) [note: in XML 1.1, it could be included via entity expansion]",
                char_desc(c)
            )
        } else {
            format!("Illegal character ({})", char_desc(c))
        };
        ScanError::UnexpectedChar {
            ch: c,
            message,
            location: self.last_char_location(),
        }
    }

    pub(crate) fn unexpected_eof(&self, context: &str) -> ScanError {
        ScanError::UnexpectedEof {
            message: format!("Unexpected EOF{context}"),
            location: self.last_char_location(),
        }
    }

    pub(crate) fn unexpected_eob(&self, context: &str) -> ScanError {
        ScanError::UnexpectedEob {
            message: format!("Unexpected end of input block{context}"),
            location: self.last_char_location(),
        }
    }

    /// Send a problem to the configured reporter, if any. Never fails by
    /// itself; only an error returned by the reporter is propagated.
    pub fn report_problem(
        &mut self,
        problem_type: &str,
        message: impl Into<String>,
        location: Option<Location>,
    ) -> Result<()> {
        let location = location.unwrap_or_else(|| self.last_char_location());
        match self.config.reporter.as_mut() {
            Some(reporter) => {
                let problem =
                    ValidationProblem::new(location, message, Severity::Error).with_type(problem_type);
                reporter.report(&problem)
            }
            None => Ok(()),
        }
    }

    /// Route a validation problem.
    ///
    /// Fatal problems always fail. Others go to the reporter; without a
    /// reporter errors fail and warnings are dropped.
    pub fn report_validation_problem(&mut self, problem: ValidationProblem) -> Result<()> {
        if problem.severity > Severity::Error {
            return Err(ScanError::Validation(problem));
        }
        match self.config.reporter.as_mut() {
            Some(reporter) => reporter.report(&problem),
            None if problem.severity >= Severity::Error => Err(ScanError::Validation(problem)),
            None => {
                debug!(target: "xmlscan.report", "no reporter, dropping {problem}");
                Ok(())
            }
        }
    }

    /// [`report_validation_problem`](Self::report_validation_problem) at the
    /// last character read
    pub fn report_validation_message(&mut self, message: impl Into<String>, severity: Severity) -> Result<()> {
        let problem = ValidationProblem::new(self.last_char_location(), message, severity);
        self.report_validation_problem(problem)
    }

    /// Well-formedness error that is either returned now or, with `defer`,
    /// kept until [`throw_deferred`](Self::throw_deferred)
    pub fn throw_wfc(&mut self, message: impl Into<String>, defer: bool) -> Result<()> {
        let err = self.parse_error(message);
        if defer {
            self.defer_error(err);
            Ok(())
        } else {
            Err(err)
        }
    }

    /// Keep an error to be returned at the next safe point. Only the first
    /// deferred error is kept.
    pub fn defer_error(&mut self, err: ScanError) {
        if self.deferred.is_none() {
            self.deferred = Some(err);
        }
    }

    pub fn has_deferred_error(&self) -> bool {
        self.deferred.is_some()
    }

    /// Return the deferred error, if any
    pub fn throw_deferred(&mut self) -> Result<()> {
        match self.deferred.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
