//! Syntax tree shared by every pass.
//!
//! The external parser hands over a grammar-shaped tree built from the
//! constructors below. Each constructor fixes the arity of its kind, so the
//! passes can rely on child positions instead of re-checking them. A child
//! slot is `Option<Node>`: `None` is the grammar's "absent" marker (missing
//! else branch, empty declaration list, no parameters) and still occupies its
//! position.

use std::fmt;

use crate::symtab::SymbolId;

/// Node kinds recognised by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
  Program,
  FunctionList,
  Function,
  Block,
  StatementList,
  Statement,
  DeclarationList,
  Declaration,
  VariableList,
  Variable,
  PrintList,
  PrintItem,
  PrintStatement,
  Text,
  ExpressionList,
  Expression,
  Integer,
  AssignmentStatement,
  ReturnStatement,
  IfStatement,
  WhileStatement,
  NullStatement,
  ParameterList,
  ArgumentList,
}

impl NodeKind {
  pub fn text(self) -> &'static str {
    match self {
      Self::Program => "PROGRAM",
      Self::FunctionList => "FUNCTION_LIST",
      Self::Function => "FUNCTION",
      Self::Block => "BLOCK",
      Self::StatementList => "STATEMENT_LIST",
      Self::Statement => "STATEMENT",
      Self::DeclarationList => "DECLARATION_LIST",
      Self::Declaration => "DECLARATION",
      Self::VariableList => "VARIABLE_LIST",
      Self::Variable => "VARIABLE",
      Self::PrintList => "PRINT_LIST",
      Self::PrintItem => "PRINT_ITEM",
      Self::PrintStatement => "PRINT_STATEMENT",
      Self::Text => "TEXT",
      Self::ExpressionList => "EXPRESSION_LIST",
      Self::Expression => "EXPRESSION",
      Self::Integer => "INTEGER",
      Self::AssignmentStatement => "ASSIGNMENT_STATEMENT",
      Self::ReturnStatement => "RETURN_STATEMENT",
      Self::IfStatement => "IF_STATEMENT",
      Self::WhileStatement => "WHILE_STATEMENT",
      Self::NullStatement => "NULL_STATEMENT",
      Self::ParameterList => "PARAMETER_LIST",
      Self::ArgumentList => "ARGUMENT_LIST",
    }
  }

  /// Kinds the grammar builds as a left-nested chain of sub-lists.
  pub fn is_list(self) -> bool {
    matches!(
      self,
      Self::FunctionList
        | Self::StatementList
        | Self::PrintList
        | Self::ExpressionList
        | Self::VariableList
        | Self::DeclarationList
    )
  }
}

impl fmt::Display for NodeKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.text())
  }
}

/// Operator tag carried by `Expression` nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
  Neg,
  Add,
  Sub,
  Mul,
  Div,
  Pow,
  Call,
  Index,
}

impl Operator {
  pub fn symbol(self) -> &'static str {
    match self {
      Self::Neg | Self::Sub => "-",
      Self::Add => "+",
      Self::Mul => "*",
      Self::Div => "/",
      Self::Pow => "^",
      Self::Call => "F",
      Self::Index => "A",
    }
  }

  /// Operators whose value can be computed from two integer literals.
  pub fn is_arithmetic(self) -> bool {
    matches!(
      self,
      Self::Add | Self::Sub | Self::Mul | Self::Div | Self::Pow
    )
  }
}

/// Kind-dependent label of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
  None,
  Integer(i32),
  Operator(Operator),
  /// Identifier of a variable or function.
  Name(String),
  /// Raw contents of a text literal, before binding.
  Text(String),
  /// Position of a text literal in the string table, after binding.
  StringIndex(usize),
}

pub type Slot = Option<Node>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
  pub(crate) kind: NodeKind,
  pub(crate) payload: Payload,
  pub(crate) children: Vec<Slot>,
  pub(crate) symbol: Option<SymbolId>,
}

impl Node {
  fn new(kind: NodeKind, payload: Payload, children: Vec<Slot>) -> Self {
    Self {
      kind,
      payload,
      children,
      symbol: None,
    }
  }

  fn wrap(kind: NodeKind, child: Node) -> Self {
    Self::new(kind, Payload::None, vec![Some(child)])
  }

  pub fn program(functions: Node) -> Self {
    Self::wrap(NodeKind::Program, functions)
  }

  /// Bottom of a list chain: a list holding a single item.
  pub fn list(kind: NodeKind, item: Node) -> Self {
    debug_assert!(kind.is_list(), "{kind} is not a list kind");
    Self::wrap(kind, item)
  }

  /// One link of a list chain: every earlier item in `list`, plus `item`.
  pub fn list_append(list: Node, item: Node) -> Self {
    let kind = list.kind;
    debug_assert!(kind.is_list(), "{kind} is not a list kind");
    Self::new(kind, Payload::None, vec![Some(list), Some(item)])
  }

  /// A declaration list link. The grammar lets the earlier part be empty,
  /// in which case the bottom of the chain has an absent first slot.
  pub fn declaration_list(earlier: Option<Node>, declaration: Node) -> Self {
    Self::new(
      NodeKind::DeclarationList,
      Payload::None,
      vec![earlier, Some(declaration)],
    )
  }

  /// Builds the chain a bottom-up parser produces for `items`, oldest item
  /// deepest in the tree. Returns `None` when there are no items.
  pub fn chain(kind: NodeKind, items: Vec<Node>) -> Option<Node> {
    let mut items = items.into_iter();
    let first = items.next()?;
    let bottom = match kind {
      NodeKind::DeclarationList => Self::declaration_list(None, first),
      _ => Self::list(kind, first),
    };
    Some(items.fold(bottom, |list, item| match kind {
      NodeKind::DeclarationList => Self::declaration_list(Some(list), item),
      _ => Self::list_append(list, item),
    }))
  }

  pub fn function(name: Node, parameters: Option<Node>, body: Node) -> Self {
    Self::new(
      NodeKind::Function,
      Payload::None,
      vec![Some(name), parameters, Some(body)],
    )
  }

  pub fn block(declarations: Option<Node>, statements: Node) -> Self {
    Self::new(
      NodeKind::Block,
      Payload::None,
      vec![declarations, Some(statements)],
    )
  }

  pub fn statement(inner: Node) -> Self {
    Self::wrap(NodeKind::Statement, inner)
  }

  pub fn declaration(variables: Node) -> Self {
    Self::wrap(NodeKind::Declaration, variables)
  }

  pub fn variable(name: impl Into<String>) -> Self {
    Self::new(NodeKind::Variable, Payload::Name(name.into()), Vec::new())
  }

  /// A declared array of `length` elements.
  pub fn array_variable(name: impl Into<String>, length: i32) -> Self {
    Self::new(
      NodeKind::Variable,
      Payload::Name(name.into()),
      vec![Some(Self::integer(length))],
    )
  }

  pub fn parameter_list(variables: Node) -> Self {
    Self::wrap(NodeKind::ParameterList, variables)
  }

  pub fn argument_list(expressions: Node) -> Self {
    Self::wrap(NodeKind::ArgumentList, expressions)
  }

  pub fn print_statement(items: Node) -> Self {
    Self::wrap(NodeKind::PrintStatement, items)
  }

  pub fn print_item(item: Node) -> Self {
    Self::wrap(NodeKind::PrintItem, item)
  }

  pub fn text(contents: impl Into<String>) -> Self {
    Self::new(NodeKind::Text, Payload::Text(contents.into()), Vec::new())
  }

  pub fn integer(value: i32) -> Self {
    Self::new(NodeKind::Integer, Payload::Integer(value), Vec::new())
  }

  pub fn assignment(target: Node, value: Node) -> Self {
    Self::new(
      NodeKind::AssignmentStatement,
      Payload::None,
      vec![Some(target), Some(value)],
    )
  }

  pub fn indexed_assignment(target: Node, index: Node, value: Node) -> Self {
    Self::new(
      NodeKind::AssignmentStatement,
      Payload::None,
      vec![Some(target), Some(index), Some(value)],
    )
  }

  pub fn return_statement(value: Node) -> Self {
    Self::wrap(NodeKind::ReturnStatement, value)
  }

  pub fn if_statement(condition: Node, then: Node, otherwise: Option<Node>) -> Self {
    Self::new(
      NodeKind::IfStatement,
      Payload::None,
      vec![Some(condition), Some(then), otherwise],
    )
  }

  pub fn while_statement(condition: Node, body: Node) -> Self {
    Self::new(
      NodeKind::WhileStatement,
      Payload::None,
      vec![Some(condition), Some(body)],
    )
  }

  /// `continue`.
  pub fn null_statement() -> Self {
    Self::new(NodeKind::NullStatement, Payload::None, Vec::new())
  }

  /// Parenthesised expression, or a bare operand wrapped by the grammar.
  pub fn group(inner: Node) -> Self {
    Self::wrap(NodeKind::Expression, inner)
  }

  pub fn negate(operand: Node) -> Self {
    Self::new(
      NodeKind::Expression,
      Payload::Operator(Operator::Neg),
      vec![Some(operand)],
    )
  }

  pub fn binary(op: Operator, lhs: Node, rhs: Node) -> Self {
    debug_assert!(op.is_arithmetic(), "{op:?} is not a binary operator");
    Self::new(
      NodeKind::Expression,
      Payload::Operator(op),
      vec![Some(lhs), Some(rhs)],
    )
  }

  pub fn call(function: Node, arguments: Option<Node>) -> Self {
    Self::new(
      NodeKind::Expression,
      Payload::Operator(Operator::Call),
      vec![Some(function), arguments],
    )
  }

  pub fn index(array: Node, index: Node) -> Self {
    Self::new(
      NodeKind::Expression,
      Payload::Operator(Operator::Index),
      vec![Some(array), Some(index)],
    )
  }

  pub fn kind(&self) -> NodeKind {
    self.kind
  }

  pub fn payload(&self) -> &Payload {
    &self.payload
  }

  pub fn children(&self) -> &[Slot] {
    &self.children
  }

  /// Child in slot `index`, or `None` when the slot is absent or missing.
  pub fn child(&self, index: usize) -> Option<&Node> {
    self.children.get(index).and_then(Option::as_ref)
  }

  pub fn child_mut(&mut self, index: usize) -> Option<&mut Node> {
    self.children.get_mut(index).and_then(Option::as_mut)
  }

  /// Present children in order, skipping absent slots.
  pub fn items(&self) -> impl Iterator<Item = &Node> {
    self.children.iter().flatten()
  }

  pub fn items_mut(&mut self) -> impl Iterator<Item = &mut Node> {
    self.children.iter_mut().flatten()
  }

  pub fn len(&self) -> usize {
    self.children.len()
  }

  pub fn is_empty(&self) -> bool {
    self.children.is_empty()
  }

  pub fn name(&self) -> Option<&str> {
    match &self.payload {
      Payload::Name(name) => Some(name),
      _ => None,
    }
  }

  pub fn integer_value(&self) -> Option<i32> {
    match (self.kind, &self.payload) {
      (NodeKind::Integer, Payload::Integer(value)) => Some(*value),
      _ => None,
    }
  }

  pub fn operator(&self) -> Option<Operator> {
    match self.payload {
      Payload::Operator(op) => Some(op),
      _ => None,
    }
  }

  /// Symbol attached by the binder.
  pub fn symbol(&self) -> Option<SymbolId> {
    self.symbol
  }

  pub(crate) fn set_symbol(&mut self, id: SymbolId) {
    self.symbol = Some(id);
  }

  /// Array length of a declared variable, `None` for scalars.
  pub fn array_length(&self) -> Option<i32> {
    self.child(0).and_then(Node::integer_value)
  }

  fn write_nested(&self, f: &mut fmt::Formatter<'_>, nesting: usize) -> fmt::Result {
    write!(f, "{:nesting$}{}", "", self.kind)?;
    match &self.payload {
      Payload::None => {}
      Payload::Integer(value) => write!(f, "({value})")?,
      Payload::Operator(op) => write!(f, "(\"{}\")", op.symbol())?,
      Payload::Name(text) | Payload::Text(text) => write!(f, "(\"{text}\")")?,
      Payload::StringIndex(index) => write!(f, "(#{index})")?,
    }
    writeln!(f)?;
    for slot in &self.children {
      match slot {
        Some(child) => child.write_nested(f, nesting + 1)?,
        None => writeln!(f, "{:width$}(nil)", "", width = nesting + 1)?,
      }
    }
    Ok(())
  }
}

/// Indented dump, one node per line.
impl fmt::Display for Node {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.write_nested(f, 0)
  }
}
