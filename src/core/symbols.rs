//! Symbol Table
//!
//! Interning pool for names (element, attribute, entity names and PI
//! targets). Interned names are `Rc<str>`; the same text always yields the
//! same allocation, so names can be compared with `Rc::ptr_eq`.
//!
//! The table is shared between scanners through `Rc<SymbolTable>` and uses
//! interior mutability, so scanners only need a shared reference.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

/// String interning pool
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: RefCell<HashSet<Rc<str>>>,
}

impl SymbolTable {
    /// Create a new empty symbol table
    pub fn new() -> Self {
        SymbolTable {
            symbols: RefCell::new(HashSet::with_capacity(64)),
        }
    }

    /// Return the canonical instance of `name`, adding it if needed
    pub fn intern(&self, name: &str) -> Rc<str> {
        let mut symbols = self.symbols.borrow_mut();
        if let Some(existing) = symbols.get(name) {
            return Rc::clone(existing);
        }
        let symbol: Rc<str> = Rc::from(name);
        symbols.insert(Rc::clone(&symbol));
        symbol
    }

    /// Look up a name without adding it
    pub fn find(&self, name: &str) -> Option<Rc<str>> {
        self.symbols.borrow().get(name).cloned()
    }

    /// Number of distinct symbols
    pub fn len(&self) -> usize {
        self.symbols.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_dedup() {
        let table = SymbolTable::new();
        let a = table.intern("element");
        let b = table.intern(&String::from("element"));
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_distinct_names() {
        let table = SymbolTable::new();
        let a = table.intern("a");
        let b = table.intern("b");
        assert!(!Rc::ptr_eq(&a, &b));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_find() {
        let table = SymbolTable::new();
        assert!(table.find("x").is_none());
        let x = table.intern("x");
        assert!(Rc::ptr_eq(&table.find("x").unwrap(), &x));
        assert!(!table.is_empty());
    }
}
