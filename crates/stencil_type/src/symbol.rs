use std::collections::HashMap;

use crate::{Id, Store};

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Symbol {
  pub name: String,
}

pub type SymbolId = Id<Symbol>;

/// Interned names. Generated instantiation and dictionary names are interned here too,
/// so equal names always map to the same id.
#[derive(Default)]
pub struct SymbolTable {
  pub symbols: Store<Symbol>,
  pub map: HashMap<String, SymbolId>,
}

impl SymbolTable {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn intern(
    &mut self,
    name: &str,
  ) -> SymbolId {
    if let Some(id) = self.map.get(name) {
      return *id;
    }

    let id = self.symbols.alloc(Symbol { name: name.to_string() });
    self.map.insert(name.to_string(), id);
    id
  }

  pub fn get(
    &self,
    id: &SymbolId,
  ) -> &str {
    &self.symbols.get(id).name
  }

  pub fn lookup(
    &self,
    name: &str,
  ) -> Option<SymbolId> {
    self.map.get(name).copied()
  }
}
