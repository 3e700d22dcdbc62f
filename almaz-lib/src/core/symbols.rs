//! The symbol table maps variable names to local slots of the entry procedure.
//!
//! Slots are handed out densely in first-declaration order. Declaring a name again resolves to
//! the slot it already has. It is built on an immutable map, so snapshots of the table (e.g. for
//! debugging output) are cheap

use im::HashMap as ImHashMap;

use std::borrow::Borrow;
use std::hash::Hash;

/// index of a local variable slot
pub type Slot = u16;

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    slots: ImHashMap<String, Slot>,
}

/// Most names a table holds. The local count of a procedure must itself fit into a [`Slot`],
/// so the highest slot is one less than `Slot::MAX`
pub const MAX_SYMBOLS: usize = Slot::MAX as usize;

/// returned when there are no free slots left
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotsExhausted;

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// returns the slot for `name`, assigning the next free one if the name is new
    pub fn declare(&mut self, name: &str) -> Result<Slot, SlotsExhausted> {
        if let Some(slot) = self.slots.get(name) {
            return Ok(*slot);
        }
        if self.slots.len() >= MAX_SYMBOLS {
            return Err(SlotsExhausted);
        }
        let slot = self.slots.len() as Slot;
        self.slots.insert(name.to_owned(), slot);
        Ok(slot)
    }

    /// returns the slot of a declared name
    pub fn resolve<Q>(&self, name: &Q) -> Option<Slot>
    where
        Q: Hash + Eq + ?Sized,
        String: Borrow<Q>,
    {
        self.slots.get(name).copied()
    }

    /// number of slots in use, which is the locals count a procedure needs
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_are_dense_in_declaration_order() {
        let mut table = SymbolTable::new();
        assert_eq!(table.declare("b"), Ok(0));
        assert_eq!(table.declare("a"), Ok(1));
        assert_eq!(table.declare("c"), Ok(2));
        assert_eq!(table.resolve("a"), Some(1));
    }

    #[test]
    fn test_redeclaration_keeps_slot() {
        let mut table = SymbolTable::new();
        let first = table.declare("x").unwrap();
        table.declare("y").unwrap();
        assert_eq!(table.declare("x"), Ok(first));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_resolve_unknown() {
        let mut table = SymbolTable::new();
        table.declare("x").unwrap();
        assert_eq!(table.resolve("x"), Some(0));
        assert_eq!(table.resolve("y"), None);
    }

    #[test]
    fn test_last_slot_keeps_locals_count_representable() {
        let mut table = SymbolTable::new();
        for i in 0..MAX_SYMBOLS {
            table.declare(&format!("v{i}")).unwrap();
        }
        assert_eq!(table.resolve("v65534"), Some(65534));
        assert_eq!(table.declare("one_too_many"), Err(SlotsExhausted));
        // known names still resolve when the table is full
        assert_eq!(table.declare("v0"), Ok(0));
        assert_eq!(table.len(), u16::MAX as usize);
    }
}
