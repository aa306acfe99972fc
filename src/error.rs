//! Scanner Errors
//!
//! One error type for everything the scanner can fail with. Variants are
//! split by what the caller can do about them:
//! - malformed input (always fatal, carries the location)
//! - validation problems (only surface here when promoted to errors)
//! - I/O failures from an input source
//! - internal bookkeeping bugs

use std::fmt;
use std::io;

use crate::core::location::Location;
use crate::report::ValidationProblem;

/// Highest valid Unicode scalar value
pub const MAX_UNICODE_CHAR: u32 = 0x10FFFF;

/// Context suffixes appended to end-of-input and unexpected char messages
pub mod suffix {
    pub const IN_ENTITY_REF: &str = " in entity reference";
    pub const IN_NAME: &str = "; expected an identifier";
    pub const IN_SYSTEM_ID: &str = " in system identifier";
    pub const IN_PUBLIC_ID: &str = " in public identifier";
    pub const IN_TEXT: &str = " in text content";
}

pub type Result<T> = std::result::Result<T, ScanError>;

/// Error returned by scanner operations
#[derive(Debug)]
pub enum ScanError {
    /// Well-formedness violation
    Parse { message: String, location: Location },
    /// A character that is not allowed where it was found
    UnexpectedChar { ch: char, message: String, location: Location },
    /// Root input ended in the middle of a construct
    UnexpectedEof { message: String, location: Location },
    /// An entity expansion ended in the middle of a construct that can not
    /// span input blocks
    UnexpectedEob { message: String, location: Location },
    /// Character reference above U+10FFFF
    Overflow { location: Location },
    /// Entity expansion that would include itself
    Recursion { entity: String, location: Location },
    /// Colon in a name that must not be namespace qualified
    NamespaceColon { name: String, location: Location },
    /// Validation problem promoted to an error
    Validation(ValidationProblem),
    /// Input source failure
    Io(io::Error),
    /// Broken input stack bookkeeping; not a document problem
    Internal(String),
}

impl ScanError {
    pub fn parse(message: impl Into<String>, location: Location) -> Self {
        ScanError::Parse { message: message.into(), location }
    }

    /// Location the problem was detected at, if the error has one
    pub fn location(&self) -> Option<&Location> {
        match self {
            ScanError::Parse { location, .. }
            | ScanError::UnexpectedChar { location, .. }
            | ScanError::UnexpectedEof { location, .. }
            | ScanError::UnexpectedEob { location, .. }
            | ScanError::Overflow { location }
            | ScanError::Recursion { location, .. }
            | ScanError::NamespaceColon { location, .. } => Some(location),
            ScanError::Validation(problem) => Some(&problem.location),
            ScanError::Io(_) | ScanError::Internal(_) => None,
        }
    }

    /// True for well-formedness violations (malformed input)
    pub fn is_well_formedness(&self) -> bool {
        matches!(
            self,
            ScanError::Parse { .. }
                | ScanError::UnexpectedChar { .. }
                | ScanError::UnexpectedEof { .. }
                | ScanError::UnexpectedEob { .. }
                | ScanError::Overflow { .. }
                | ScanError::Recursion { .. }
                | ScanError::NamespaceColon { .. }
        )
    }

    fn message(&self) -> String {
        match self {
            ScanError::Parse { message, .. }
            | ScanError::UnexpectedChar { message, .. }
            | ScanError::UnexpectedEof { message, .. }
            | ScanError::UnexpectedEob { message, .. } => message.clone(),
            ScanError::Overflow { .. } => format!(
                "Illegal character entity: value higher than max allowed (0x{MAX_UNICODE_CHAR:x})"
            ),
            ScanError::Recursion { entity, .. } => format!(
                "Illegal entity expansion: entity \"{entity}\" expands itself recursively."
            ),
            ScanError::NamespaceColon { name, .. } => format!(
                "Illegal name \"{name}\" (PI target, entity/notation name): can not contain a colon (XML Namespaces 1.0#6)"
            ),
            ScanError::Validation(problem) => problem.message.clone(),
            ScanError::Io(err) => format!("I/O error: {err}"),
            ScanError::Internal(what) => format!("Internal error: {what}"),
        }
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location() {
            Some(location) => write!(f, "{} at {}", self.message(), location),
            None => write!(f, "{}", self.message()),
        }
    }
}

impl std::error::Error for ScanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScanError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for ScanError {
    fn from(err: io::Error) -> Self {
        ScanError::Io(err)
    }
}
