//! Core scanning primitives
//!
//! The building blocks of the stream scanner:
//! - Cursor: read position, row and offset bookkeeping for one buffer
//! - Scanner: input stack, character access, locations, problem reporting
//! - Entities: character and entity reference resolution, expansion
//! - Tokenizer: names, identifiers and delimited text
//! - DTD: entity declarations and the scopes they are looked up in
//! - Location: positions inside nested inputs
//! - Symbols: name interning
//! - Unicode: XML 1.0 / 1.1 character classes

pub mod cursor;
pub mod dtd;
pub mod entities;
pub mod location;
pub mod scanner;
pub mod symbols;
pub mod tokenizer;
pub mod unicode;
