//! xmlscan - Streaming XML lexical scanner
//!
//! The character level layer underneath a pull-style XML reader:
//! - Input stack: entity expansions push new input sources, exhausted
//!   ones pop back to their parent
//! - Character access with line break normalization and row/column/offset
//!   tracking across nested inputs
//! - Entity resolution: predefined entities, character references,
//!   declared general or parameter entities, recursion checks
//! - Tokenizing: names (interned), system and public identifiers,
//!   delimited text
//! - Problem reporting: well-formedness errors, deferred errors and
//!   validation problems
//!
//! Concrete readers (document content, DTD subsets) drive a
//! [`StreamScanner`] and choose how entities are looked up through an
//! [`EntityScope`].

pub mod config;
pub mod core;
pub mod error;
pub mod reader;
pub mod report;

pub use config::{ScannerConfig, XmlVersion};
pub use core::dtd::{DocumentScope, DtdScope, EntityDecl, EntityScope, EntityTable};
pub use core::entities::{predefined_entity, EntityResolution};
pub use core::location::Location;
pub use core::scanner::StreamScanner;
pub use core::symbols::SymbolTable;
pub use error::{Result, ScanError};
pub use reader::{open_system_id, InputSource, ReaderSource, StrSource, XmlResolver};
pub use report::{CollectingReporter, ProblemReporter, Severity, ValidationProblem};
