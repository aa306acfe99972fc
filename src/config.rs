//! Scanner Configuration
//!
//! Settings shared by the document reader and the DTD reader that embed a
//! [`StreamScanner`](crate::StreamScanner). Collaborators (problem reporter,
//! entity resolvers, symbol table) are handed in here as well.

use std::fmt;
use std::rc::Rc;

use crate::core::symbols::SymbolTable;
use crate::reader::XmlResolver;
use crate::report::ProblemReporter;

/// Default capacity of the character entity cache
pub const DEFAULT_CHAR_ENTITY_CACHE_SIZE: usize = 256;

/// XML version declared by the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum XmlVersion {
    /// No declaration seen (yet); treated as 1.0
    #[default]
    Unknown,
    V1_0,
    V1_1,
}

impl XmlVersion {
    /// Parse the value of the `version` pseudo-attribute
    pub fn from_declared(value: &str) -> Option<Self> {
        match value {
            "1.0" => Some(XmlVersion::V1_0),
            "1.1" => Some(XmlVersion::V1_1),
            _ => None,
        }
    }

    #[inline]
    pub fn is_xml11(self) -> bool {
        self == XmlVersion::V1_1
    }
}

/// Scanner configuration
pub struct ScannerConfig {
    /// Enforce XML Namespaces rules on names (no colons in PI targets,
    /// entity and notation names)
    pub namespace_aware: bool,
    /// Expand entity references instead of reporting them unexpanded
    pub replace_entities: bool,
    /// Normalize CR and CRLF into LF for the main document
    pub normalize_lfs: bool,
    /// Surface character references and predefined entities as
    /// synthetic entities instead of plain characters
    pub treat_char_refs_as_entities: bool,
    /// Allow expansion of external parsed entities
    pub support_external_entities: bool,
    /// Accept escaped control characters (`&#1;`) in XML 1.0 documents
    pub allow_xml10_escaped_controls: bool,
    /// Capacity of the character entity cache
    pub char_entity_cache_size: usize,
    /// Receiver for non-fatal problems
    pub reporter: Option<Box<dyn ProblemReporter>>,
    /// Resolver for external entities (system/public ids)
    pub entity_resolver: Option<Box<dyn XmlResolver>>,
    /// Fallback resolver for references to undeclared entities
    pub undeclared_entity_resolver: Option<Box<dyn XmlResolver>>,
    /// Shared name interning table
    pub symbols: Rc<SymbolTable>,
}

impl ScannerConfig {
    pub fn new() -> Self {
        ScannerConfig {
            namespace_aware: true,
            replace_entities: true,
            normalize_lfs: true,
            treat_char_refs_as_entities: false,
            support_external_entities: true,
            allow_xml10_escaped_controls: false,
            char_entity_cache_size: DEFAULT_CHAR_ENTITY_CACHE_SIZE,
            reporter: None,
            entity_resolver: None,
            undeclared_entity_resolver: None,
            symbols: Rc::new(SymbolTable::new()),
        }
    }

    pub fn with_namespace_aware(mut self, enabled: bool) -> Self {
        self.namespace_aware = enabled;
        self
    }

    pub fn with_replace_entities(mut self, enabled: bool) -> Self {
        self.replace_entities = enabled;
        self
    }

    pub fn with_normalize_lfs(mut self, enabled: bool) -> Self {
        self.normalize_lfs = enabled;
        self
    }

    pub fn with_char_refs_as_entities(mut self, enabled: bool) -> Self {
        self.treat_char_refs_as_entities = enabled;
        self
    }

    pub fn with_external_entities(mut self, enabled: bool) -> Self {
        self.support_external_entities = enabled;
        self
    }

    pub fn with_xml10_escaped_controls(mut self, enabled: bool) -> Self {
        self.allow_xml10_escaped_controls = enabled;
        self
    }

    pub fn with_char_entity_cache_size(mut self, size: usize) -> Self {
        self.char_entity_cache_size = size;
        self
    }

    pub fn with_reporter(mut self, reporter: impl ProblemReporter + 'static) -> Self {
        self.reporter = Some(Box::new(reporter));
        self
    }

    pub fn with_entity_resolver(mut self, resolver: impl XmlResolver + 'static) -> Self {
        self.entity_resolver = Some(Box::new(resolver));
        self
    }

    pub fn with_undeclared_entity_resolver(mut self, resolver: impl XmlResolver + 'static) -> Self {
        self.undeclared_entity_resolver = Some(Box::new(resolver));
        self
    }

    /// Share a symbol table with other scanners
    pub fn with_symbols(mut self, symbols: Rc<SymbolTable>) -> Self {
        self.symbols = symbols;
        self
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ScannerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScannerConfig")
            .field("namespace_aware", &self.namespace_aware)
            .field("replace_entities", &self.replace_entities)
            .field("normalize_lfs", &self.normalize_lfs)
            .field("treat_char_refs_as_entities", &self.treat_char_refs_as_entities)
            .field("support_external_entities", &self.support_external_entities)
            .field("allow_xml10_escaped_controls", &self.allow_xml10_escaped_controls)
            .field("char_entity_cache_size", &self.char_entity_cache_size)
            .field("reporter", &self.reporter.is_some())
            .field("entity_resolver", &self.entity_resolver.is_some())
            .field("undeclared_entity_resolver", &self.undeclared_entity_resolver.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = ScannerConfig::default();
        assert!(cfg.namespace_aware);
        assert!(cfg.replace_entities);
        assert!(cfg.normalize_lfs);
        assert!(!cfg.treat_char_refs_as_entities);
        assert!(cfg.support_external_entities);
        assert!(cfg.reporter.is_none());
    }

    #[test]
    fn test_builder() {
        let cfg = ScannerConfig::new()
            .with_namespace_aware(false)
            .with_char_refs_as_entities(true)
            .with_char_entity_cache_size(4);
        assert!(!cfg.namespace_aware);
        assert!(cfg.treat_char_refs_as_entities);
        assert_eq!(cfg.char_entity_cache_size, 4);
    }

    #[test]
    fn test_version_from_declared() {
        assert_eq!(XmlVersion::from_declared("1.0"), Some(XmlVersion::V1_0));
        assert_eq!(XmlVersion::from_declared("1.1"), Some(XmlVersion::V1_1));
        assert_eq!(XmlVersion::from_declared("2.0"), None);
        assert!(!XmlVersion::Unknown.is_xml11());
    }
}
