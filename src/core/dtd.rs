//! Entity Declarations and Lookup Scopes
//!
//! Declarations collected from the DTD and the strategies the scanner uses
//! to look them up:
//! - EntityDecl: one general or parameter entity declaration
//! - EntityTable: declaration store (first declaration wins)
//! - EntityScope: lookup strategy injected into the scanner
//! - DocumentScope / DtdScope: general vs. parameter entity lookup

use std::collections::HashMap;
use std::io;
use std::rc::Rc;

use crate::core::location::Location;
use crate::error::{Result, ScanError};
use crate::reader::{open_system_id, InputSource, StrSource, XmlResolver};

/// Entity declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDecl {
    pub name: Rc<str>,
    pub is_external: bool,
    pub value: Option<String>,     // For internal entities
    pub system_id: Option<String>, // For external entities
    pub public_id: Option<String>, // For external entities
    pub ndata: Option<String>,     // For unparsed entities
    /// Where the declaration was read, if known
    pub location: Option<Location>,
}

impl EntityDecl {
    /// Internal parsed entity with the given replacement text
    pub fn internal(name: &str, value: impl Into<String>) -> Self {
        EntityDecl {
            name: Rc::from(name),
            is_external: false,
            value: Some(value.into()),
            system_id: None,
            public_id: None,
            ndata: None,
            location: None,
        }
    }

    /// External parsed entity
    pub fn external(name: &str, public_id: Option<&str>, system_id: &str) -> Self {
        EntityDecl {
            name: Rc::from(name),
            is_external: true,
            value: None,
            system_id: Some(system_id.to_string()),
            public_id: public_id.map(str::to_string),
            ndata: None,
            location: None,
        }
    }

    /// External unparsed entity (`NDATA notation`)
    pub fn unparsed(name: &str, public_id: Option<&str>, system_id: &str, notation: &str) -> Self {
        let mut decl = EntityDecl::external(name, public_id, system_id);
        decl.ndata = Some(notation.to_string());
        decl
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Parsed entities can be expanded; unparsed ones only named
    #[inline]
    pub fn is_parsed(&self) -> bool {
        self.ndata.is_none()
    }

    /// Replacement text of an internal entity
    pub fn replacement_text(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Open an input source producing the expansion of this entity.
    ///
    /// Internal entities expand from their replacement text. External
    /// entities go through `resolver` first; when it has nothing, the
    /// system id is opened as a file relative to `base`.
    pub fn expand(
        &self,
        base: Option<&str>,
        resolver: Option<&mut (dyn XmlResolver + 'static)>,
    ) -> io::Result<Box<dyn InputSource>> {
        if !self.is_external {
            let text = self.value.clone().unwrap_or_default();
            return Ok(Box::new(StrSource::for_entity(&self.name, text)));
        }
        if let Some(resolver) = resolver {
            let resolved = resolver.resolve_entity(
                self.public_id.as_deref(),
                self.system_id.as_deref(),
                base,
                &self.name,
            )?;
            if let Some(source) = resolved {
                return Ok(source);
            }
        }
        let system_id = self.system_id.as_deref().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("external entity \"{}\" has no system id", self.name),
            )
        })?;
        open_system_id(system_id, base, &self.name)
    }
}

/// Entity declaration store
#[derive(Debug, Default, Clone)]
pub struct EntityTable {
    entities: HashMap<Rc<str>, Rc<EntityDecl>>,
}

impl EntityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a declaration. Returns false (and keeps the existing one) if the
    /// name was declared before.
    pub fn declare(&mut self, decl: EntityDecl) -> bool {
        // First declaration wins (per XML spec)
        if self.entities.contains_key(decl.name.as_ref()) {
            return false;
        }
        self.entities.insert(Rc::clone(&decl.name), Rc::new(decl));
        true
    }

    pub fn get(&self, name: &str) -> Option<Rc<EntityDecl>> {
        self.entities.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Entity lookup strategy of the reader embedding the scanner.
///
/// The document reader looks up general entities, the DTD reader parameter
/// entities; the scanner itself never owns declarations.
pub trait EntityScope {
    /// Find a declared entity by name
    fn find_entity(&mut self, name: &str) -> Result<Option<Rc<EntityDecl>>>;

    /// Called in entity replacing mode for a reference nothing could resolve
    fn handle_undeclared_entity(&mut self, name: &str, location: &Location) -> Result<()> {
        Err(ScanError::parse(format!("Undeclared entity \"{name}\""), location.clone()))
    }

    /// Called when an entity expansion ends while a scope opened inside it
    /// (element, declaration) is still open
    fn handle_incomplete_entity_nesting(&mut self, entity: Option<&str>, location: &Location) -> Result<()> {
        Err(ScanError::parse(
            format!(
                "Unexpected end of entity expansion for entity &{};: construct started inside it was not closed",
                entity.unwrap_or("[unknown]")
            ),
            location.clone(),
        ))
    }

    /// Expand declared entities even when char references are surfaced as
    /// entities
    fn always_expand(&self) -> bool {
        false
    }
}

/// Scope of the main document: general entities (`&name;`)
#[derive(Debug, Default)]
pub struct DocumentScope {
    entities: EntityTable,
}

impl DocumentScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entities(entities: EntityTable) -> Self {
        DocumentScope { entities }
    }

    pub fn entities(&self) -> &EntityTable {
        &self.entities
    }

    /// Declarations can be added while scanning (internal subset)
    pub fn entities_mut(&mut self) -> &mut EntityTable {
        &mut self.entities
    }
}

impl EntityScope for DocumentScope {
    fn find_entity(&mut self, name: &str) -> Result<Option<Rc<EntityDecl>>> {
        Ok(self.entities.get(name))
    }

    fn handle_undeclared_entity(&mut self, name: &str, location: &Location) -> Result<()> {
        Err(ScanError::parse(format!("Undeclared general entity \"{name}\""), location.clone()))
    }

    fn handle_incomplete_entity_nesting(&mut self, entity: Option<&str>, location: &Location) -> Result<()> {
        Err(ScanError::parse(
            format!(
                "Unexpected end of entity expansion for entity &{};: was expecting a close tag for an element started in it",
                entity.unwrap_or("[unknown]")
            ),
            location.clone(),
        ))
    }
}

/// Scope of a DTD subset: parameter entities (`%name;`)
#[derive(Debug, Default)]
pub struct DtdScope {
    parameter_entities: EntityTable,
}

impl DtdScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entities(parameter_entities: EntityTable) -> Self {
        DtdScope { parameter_entities }
    }

    pub fn entities(&self) -> &EntityTable {
        &self.parameter_entities
    }

    pub fn entities_mut(&mut self) -> &mut EntityTable {
        &mut self.parameter_entities
    }
}

impl EntityScope for DtdScope {
    fn find_entity(&mut self, name: &str) -> Result<Option<Rc<EntityDecl>>> {
        Ok(self.parameter_entities.get(name))
    }

    fn handle_undeclared_entity(&mut self, name: &str, location: &Location) -> Result<()> {
        Err(ScanError::parse(format!("Undefined parameter entity '{name}'."), location.clone()))
    }

    // Declarations may legally span parameter entity boundaries here
    fn handle_incomplete_entity_nesting(&mut self, _entity: Option<&str>, _location: &Location) -> Result<()> {
        Ok(())
    }

    fn always_expand(&self) -> bool {
        true
    }
}
