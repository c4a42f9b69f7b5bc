//! Name binding over a simplified tree.
//!
//! Opens a scope for the function list, every function and every block,
//! gives each parameter and declared variable its frame offset, and points
//! every variable node at the symbol it denotes. Text literals are moved into
//! the string table and replaced by their index.

use tracing::debug;

use crate::Compilation;
use crate::config::Config;
use crate::error::{CompileError, CompileResult};
use crate::symtab::{StringTable, Symbol, SymbolTable};
use crate::tree::{Node, NodeKind, Payload};

/// Bind all names in `root`, recording symbols and strings in `ctx`.
pub fn bind(root: &mut Node, ctx: &mut Compilation) -> CompileResult<()> {
  let mut binder = Binder {
    config: &ctx.config,
    symbols: &mut ctx.symbols,
    strings: &mut ctx.strings,
  };
  binder.visit(root)?;
  debug!(
    symbols = ctx.symbols.symbols().len(),
    strings = ctx.strings.len(),
    "names bound"
  );
  Ok(())
}

struct Binder<'a> {
  config: &'a Config,
  symbols: &'a mut SymbolTable,
  strings: &'a mut StringTable,
}

impl Binder<'_> {
  fn visit(&mut self, node: &mut Node) -> CompileResult<()> {
    match node.kind() {
      NodeKind::FunctionList => self.visit_function_list(node),
      NodeKind::Function => self.visit_function(node),
      NodeKind::Block => self.scoped(|this| this.visit_children(node)),
      NodeKind::DeclarationList => self.declare_locals(node),
      NodeKind::Variable => self.resolve(node),
      NodeKind::Text => {
        self.intern_text(node);
        Ok(())
      }
      _ => self.visit_children(node),
    }
  }

  fn visit_children(&mut self, node: &mut Node) -> CompileResult<()> {
    for child in node.items_mut() {
      self.visit(child)?;
    }
    Ok(())
  }

  fn scoped(&mut self, body: impl FnOnce(&mut Self) -> CompileResult<()>) -> CompileResult<()> {
    self.symbols.push_scope();
    body(self)?;
    self.symbols.pop_scope()
  }

  /// Every function is declared before any body is visited, so calls may
  /// refer to functions defined further down.
  fn visit_function_list(&mut self, list: &mut Node) -> CompileResult<()> {
    self.scoped(|this| {
      for function in list.items_mut() {
        let arity = function.child(1).map_or(0, Node::len);
        let name_node = function
          .child_mut(0)
          .ok_or_else(|| CompileError::malformed(NodeKind::Function, "missing name"))?;
        let name = name_node
          .name()
          .ok_or_else(|| CompileError::malformed(NodeKind::Function, "unnamed function"))?
          .to_string();
        let id = this.symbols.insert(Symbol::function(name, arity))?;
        name_node.set_symbol(id);
      }
      this.visit_children(list)
    })
  }

  fn visit_function(&mut self, function: &mut Node) -> CompileResult<()> {
    self.scoped(|this| {
      if let Some(parameters) = function.child_mut(1) {
        let mut offset = this.config.first_parameter_offset(parameters.len());
        for parameter in parameters.items_mut() {
          this.declare(parameter, offset)?;
          offset -= this.config.word_size;
        }
      }
      let body = function
        .child_mut(2)
        .ok_or_else(|| CompileError::malformed(NodeKind::Function, "missing body"))?;
      this.visit(body)
    })
  }

  /// Declarations bind into the enclosing block's scope.
  fn declare_locals(&mut self, list: &mut Node) -> CompileResult<()> {
    let mut offset = self.config.first_local_offset();
    for declaration in list.items_mut() {
      let variables = declaration
        .child_mut(0)
        .ok_or_else(|| CompileError::malformed(NodeKind::Declaration, "missing variable list"))?;
      for variable in variables.items_mut() {
        self.declare(variable, offset)?;
        offset = self
          .config
          .declaration_size(variable.array_length())
          .and_then(|size| offset.checked_sub(size))
          .ok_or_else(|| CompileError::malformed(NodeKind::Variable, "array too large for a frame"))?;
      }
    }
    Ok(())
  }

  fn declare(&mut self, variable: &mut Node, offset: i32) -> CompileResult<()> {
    let name = variable
      .name()
      .ok_or_else(|| CompileError::malformed(NodeKind::Variable, "unnamed declaration"))?
      .to_string();
    let id = self.symbols.insert(Symbol::variable(name, offset))?;
    variable.set_symbol(id);
    Ok(())
  }

  fn resolve(&mut self, variable: &mut Node) -> CompileResult<()> {
    let name = variable
      .name()
      .ok_or_else(|| CompileError::malformed(NodeKind::Variable, "missing identifier"))?;
    let id = self
      .symbols
      .lookup(name)
      .ok_or_else(|| CompileError::UnknownIdentifier {
        name: name.to_string(),
      })?;
    variable.set_symbol(id);
    Ok(())
  }

  fn intern_text(&mut self, text: &mut Node) {
    if let Payload::Text(contents) = &text.payload {
      let index = self.strings.intern(contents);
      text.payload = Payload::StringIndex(index);
    }
  }
}
