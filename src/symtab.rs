//! Scoped symbol table and the string table for `.data`.
//!
//! Symbols live in an arena owned by the table; scopes and tree nodes only
//! hold `SymbolId` handles into it. Popping a scope hides its names from
//! lookup but keeps the records, because the generator still reads offsets
//! and depths after binding has finished.

use std::collections::HashMap;

use tracing::trace;

use crate::error::{CompileError, CompileResult};

/// Handle to a symbol in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(usize);

/// A resolved declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
  pub name: String,
  /// Byte offset from the declaring frame's base pointer.
  pub stack_offset: i32,
  /// Number of open scopes when the symbol was declared.
  pub depth: usize,
  /// Formal parameter count, for functions only.
  pub arity: Option<usize>,
}

impl Symbol {
  pub fn variable(name: impl Into<String>, stack_offset: i32) -> Self {
    Self {
      name: name.into(),
      stack_offset,
      depth: 0,
      arity: None,
    }
  }

  pub fn function(name: impl Into<String>, arity: usize) -> Self {
    Self {
      name: name.into(),
      stack_offset: 0,
      depth: 0,
      arity: Some(arity),
    }
  }

  pub fn is_function(&self) -> bool {
    self.arity.is_some()
  }
}

#[derive(Debug, Default)]
pub struct SymbolTable {
  symbols: Vec<Symbol>,
  scopes: Vec<HashMap<String, SymbolId>>,
}

impl SymbolTable {
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of open scopes.
  pub fn depth(&self) -> usize {
    self.scopes.len()
  }

  pub fn push_scope(&mut self) {
    self.scopes.push(HashMap::new());
    trace!(depth = self.depth(), "scope add");
  }

  pub fn pop_scope(&mut self) -> CompileResult<()> {
    self.scopes.pop().ok_or(CompileError::ScopeUnderflow)?;
    trace!(depth = self.depth(), "scope remove");
    Ok(())
  }

  /// Records `symbol` at the current depth and binds its name in the
  /// innermost scope, shadowing any outer binding of the same name.
  pub fn insert(&mut self, mut symbol: Symbol) -> CompileResult<SymbolId> {
    symbol.depth = self.depth();
    let scope = self.scopes.last_mut().ok_or(CompileError::ScopeUnderflow)?;
    let id = SymbolId(self.symbols.len());
    trace!("Inserting ({},{})", symbol.name, symbol.stack_offset);
    scope.insert(symbol.name.clone(), id);
    self.symbols.push(symbol);
    Ok(id)
  }

  /// Innermost binding of `name` across all open scopes.
  pub fn lookup(&self, name: &str) -> Option<SymbolId> {
    let id = self
      .scopes
      .iter()
      .rev()
      .find_map(|scope| scope.get(name).copied())?;
    trace!("Retrieving ({},{})", name, self.symbols[id.0].stack_offset);
    Some(id)
  }

  pub fn get(&self, id: SymbolId) -> &Symbol {
    &self.symbols[id.0]
  }

  /// Every symbol ever inserted, in insertion order.
  pub fn symbols(&self) -> &[Symbol] {
    &self.symbols
  }
}

/// Text literals collected for the `.data` section.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StringTable {
  strings: Vec<String>,
}

impl StringTable {
  pub fn new() -> Self {
    Self::default()
  }

  /// Index of `text`, appending it when it has not been seen before.
  pub fn intern(&mut self, text: &str) -> usize {
    if let Some(index) = self.strings.iter().position(|s| s == text) {
      return index;
    }
    self.strings.push(text.to_string());
    self.strings.len() - 1
  }

  pub fn get(&self, index: usize) -> Option<&str> {
    self.strings.get(index).map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.strings.len()
  }

  pub fn is_empty(&self) -> bool {
    self.strings.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.strings.iter().map(String::as_str)
  }
}
