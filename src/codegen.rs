//! Code generation: lower the bound tree into 32-bit AT&T assembly.
//!
//! The emitter is a stack machine. Every expression leaves exactly one value
//! on the stack, and statements consume what their expressions pushed. Each
//! function and each block gets its own frame whose first slot is a static
//! link to the enclosing frame, so a variable declared `n` scopes further out
//! is reached by following `n` links from `%ebp`.
//!
//! Output is an ordered `Listing` of typed instructions rather than text, so
//! later passes can rewrite it before it is printed.

use std::fmt;

use snafu::{OptionExt, ensure};
use tracing::{debug, trace};

use crate::Compilation;
use crate::error::{
  ArityMismatchSnafu, CompileError, CompileResult, NotAValueSnafu, NotCallableSnafu, UnboundSnafu,
};
use crate::peephole;
use crate::symtab::{StringTable, Symbol};
use crate::tree::{Node, NodeKind, Operator, Payload};

use Operand::{Immediate, Register as Reg};
use Register::{Eax, Ebp, Ebx, Ecx, Edx, Esi, Esp};

/// Scope depth of the function list; the generator starts here.
const GLOBAL_DEPTH: usize = 1;

/// Label of the `printf` format used for integer print items.
const INTEGER_FORMAT: &str = ".INTEGER";

const ENTRY_ARG_LOOP: &str = ".Lpusharg";
const ENTRY_NO_ARGS: &str = ".Lnoargs";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
  Eax,
  Ebx,
  Ecx,
  Edx,
  Esi,
  Ebp,
  Esp,
}

impl fmt::Display for Register {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::Eax => "%eax",
      Self::Ebx => "%ebx",
      Self::Ecx => "%ecx",
      Self::Edx => "%edx",
      Self::Esi => "%esi",
      Self::Ebp => "%ebp",
      Self::Esp => "%esp",
    };
    f.write_str(name)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
  /// `$42`
  Immediate(i32),
  /// `$label`, the address of a data label.
  Address(String),
  Register(Register),
  /// `offset(%base)`, printed as `(%base)` when the offset is zero.
  Memory { offset: i32, base: Register },
  /// A memory word named by a linker symbol, such as `stdout`.
  Global(String),
}

impl Operand {
  pub fn memory(offset: i32, base: Register) -> Self {
    Self::Memory { offset, base }
  }

  pub fn is_memory(&self) -> bool {
    matches!(self, Self::Memory { .. } | Self::Global(_))
  }

  /// Whether the operand reads or names the stack pointer.
  pub fn uses_stack_pointer(&self) -> bool {
    matches!(
      self,
      Self::Register(Register::Esp) | Self::Memory { base: Register::Esp, .. }
    )
  }
}

impl fmt::Display for Operand {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Immediate(value) => write!(f, "${value}"),
      Self::Address(label) => write!(f, "${label}"),
      Self::Register(register) => write!(f, "{register}"),
      Self::Memory { offset: 0, base } => write!(f, "({base})"),
      Self::Memory { offset, base } => write!(f, "{offset}({base})"),
      Self::Global(symbol) => f.write_str(symbol),
    }
  }
}

/// One line of the text section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
  Cdq,
  Leave,
  Ret,
  Label(String),
  Push(Operand),
  Pop(Operand),
  /// `imull`: `%edx:%eax = %eax * operand`.
  Mul(Operand),
  /// `idivl`: `%eax = %edx:%eax / operand`.
  Div(Operand),
  Dec(Operand),
  Neg(Operand),
  CmpZero(Operand),
  Call(String),
  Jump(String),
  JumpLess(String),
  JumpZero(String),
  JumpNonZero(String),
  /// Source first, destination second, as in AT&T syntax.
  Move(Operand, Operand),
  Add(Operand, Operand),
  Sub(Operand, Operand),
  Cmp(Operand, Operand),
  ShiftLeft(Operand, Operand),
}

impl fmt::Display for Instruction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Cdq => f.write_str("\tcdq"),
      Self::Leave => f.write_str("\tleave"),
      Self::Ret => f.write_str("\tret"),
      Self::Label(label) => write!(f, "{label}:"),
      Self::Push(op) => write!(f, "\tpushl\t{op}"),
      Self::Pop(op) => write!(f, "\tpopl\t{op}"),
      Self::Mul(op) => write!(f, "\timull\t{op}"),
      Self::Div(op) => write!(f, "\tidivl\t{op}"),
      Self::Dec(op) => write!(f, "\tdecl\t{op}"),
      Self::Neg(op) => write!(f, "\tnegl\t{op}"),
      Self::CmpZero(op) => write!(f, "\tcmpl\t$0,{op}"),
      Self::Call(target) => write!(f, "\tcall\t{target}"),
      Self::Jump(target) => write!(f, "\tjmp\t{target}"),
      Self::JumpLess(target) => write!(f, "\tjl\t{target}"),
      Self::JumpZero(target) => write!(f, "\tjz\t{target}"),
      Self::JumpNonZero(target) => write!(f, "\tjnz\t{target}"),
      Self::Move(src, dst) => write!(f, "\tmovl\t{src},{dst}"),
      Self::Add(src, dst) => write!(f, "\taddl\t{src},{dst}"),
      Self::Sub(src, dst) => write!(f, "\tsubl\t{src},{dst}"),
      Self::Cmp(src, dst) => write!(f, "\tcmpl\t{src},{dst}"),
      Self::ShiftLeft(src, dst) => write!(f, "\tshll\t{src},{dst}"),
    }
  }
}

/// A complete translation unit: string data plus the text section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
  entry_label: String,
  strings: StringTable,
  instructions: Vec<Instruction>,
}

impl Listing {
  pub fn instructions(&self) -> &[Instruction] {
    &self.instructions
  }

  pub fn strings(&self) -> &StringTable {
    &self.strings
  }

  pub fn entry_label(&self) -> &str {
    &self.entry_label
  }

  /// Run the push/pop fusion pass in place.
  pub fn optimize(&mut self) {
    let before = self.instructions.len();
    self.instructions = peephole::optimize(std::mem::take(&mut self.instructions));
    debug!(
      before,
      after = self.instructions.len(),
      "peephole pass finished"
    );
  }
}

impl fmt::Display for Listing {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, ".data")?;
    writeln!(f, "{INTEGER_FORMAT}: .string \"%d\"")?;
    for (index, text) in self.strings.iter().enumerate() {
      writeln!(f, "{}: .string \"{}\"", string_label(index), escape(text))?;
    }
    writeln!(f, ".globl {}", self.entry_label)?;
    writeln!(f, ".text")?;
    for instruction in &self.instructions {
      writeln!(f, "{instruction}")?;
    }
    Ok(())
  }
}

fn string_label(index: usize) -> String {
  format!(".STRING{index}")
}

/// Escape text for a `.string` directive.
fn escape(text: &str) -> String {
  let mut escaped = String::with_capacity(text.len());
  for c in text.chars() {
    match c {
      '"' => escaped.push_str("\\\""),
      '\\' => escaped.push_str("\\\\"),
      '\n' => escaped.push_str("\\n"),
      '\t' => escaped.push_str("\\t"),
      _ => escaped.push(c),
    }
  }
  escaped
}

/// Label of a user function; the leading underscore keeps user names clear
/// of the C runtime.
fn function_label(name: &str) -> String {
  format!("_{name}")
}

/// Assembler-local label for generated control flow. No identifier can
/// start with `.`, so these never collide with function labels.
fn local_label(stem: &str, n: usize) -> String {
  format!(".L{stem}{n}")
}

/// Generate the listing for a simplified, bound program.
pub fn generate(root: &Node, ctx: &Compilation) -> CompileResult<Listing> {
  let mut generator = Generator::new(ctx);
  generator.emit_node(root)?;
  debug!(
    instructions = generator.code.len(),
    strings = ctx.strings.len(),
    "code generated"
  );
  Ok(Listing {
    entry_label: ctx.config.entry_label.clone(),
    strings: ctx.strings.clone(),
    instructions: generator.code,
  })
}

#[derive(Debug, Default)]
struct LabelCounters {
  power: usize,
  branch: usize,
  loops: usize,
}

/// A `while` being generated: where `continue` jumps to, and the depth the
/// loop test runs at.
#[derive(Debug)]
struct LoopFrame {
  test_label: String,
  depth: usize,
}

struct Generator<'a> {
  ctx: &'a Compilation,
  code: Vec<Instruction>,
  depth: usize,
  labels: LabelCounters,
  loops: Vec<LoopFrame>,
}

impl<'a> Generator<'a> {
  fn new(ctx: &'a Compilation) -> Self {
    Self {
      ctx,
      code: Vec::new(),
      depth: GLOBAL_DEPTH,
      labels: LabelCounters::default(),
      loops: Vec::new(),
    }
  }

  fn emit(&mut self, instruction: Instruction) {
    self.code.push(instruction);
  }

  fn word(&self) -> i32 {
    self.ctx.config.word_size
  }

  fn required<'n>(node: &'n Node, index: usize, reason: &'static str) -> CompileResult<&'n Node> {
    node
      .child(index)
      .ok_or_else(|| CompileError::malformed(node.kind(), reason))
  }

  fn symbol_of(&self, node: &Node) -> CompileResult<&'a Symbol> {
    let id = node.symbol().context(UnboundSnafu { kind: node.kind() })?;
    Ok(self.ctx.symbols.get(id))
  }

  fn emit_node(&mut self, node: &Node) -> CompileResult<()> {
    match node.kind() {
      NodeKind::Program => self.emit_program(node),
      NodeKind::Function => self.emit_function(node),
      NodeKind::Block => self.emit_block(node),
      NodeKind::Declaration => self.emit_declaration(node),
      NodeKind::PrintStatement => self.emit_print(node),
      NodeKind::Expression => self.emit_expression(node),
      NodeKind::Integer => {
        let value = node
          .integer_value()
          .ok_or_else(|| CompileError::malformed(NodeKind::Integer, "missing value"))?;
        self.emit(Instruction::Push(Immediate(value)));
        Ok(())
      }
      NodeKind::Variable => self.emit_variable(node),
      NodeKind::AssignmentStatement => self.emit_assignment(node),
      NodeKind::ReturnStatement => self.emit_return(node),
      NodeKind::IfStatement => self.emit_if(node),
      NodeKind::WhileStatement => self.emit_while(node),
      NodeKind::NullStatement => self.emit_continue(),
      NodeKind::Text => Err(CompileError::malformed(
        NodeKind::Text,
        "text outside a print statement",
      )),
      _ => self.emit_children(node),
    }
  }

  fn emit_children(&mut self, node: &Node) -> CompileResult<()> {
    for child in node.items() {
      self.emit_node(child)?;
    }
    Ok(())
  }

  /// Functions first, then the process entry, which converts each
  /// command-line argument with `strtol` and passes them all to the first
  /// function. Its return value becomes the exit status.
  fn emit_program(&mut self, program: &Node) -> CompileResult<()> {
    let functions = Self::required(program, 0, "missing function list")?;
    self.emit_node(functions)?;

    let first = functions
      .child(0)
      .and_then(|function| function.child(0))
      .and_then(Node::name)
      .ok_or_else(|| CompileError::malformed(NodeKind::Program, "no functions"))?;
    let word = self.word();
    let entry = [
      Instruction::Label(self.ctx.config.entry_label.clone()),
      Instruction::Push(Reg(Ebp)),
      Instruction::Move(Reg(Esp), Reg(Ebp)),
      // argc, counting the program name
      Instruction::Move(Operand::memory(2 * word, Esp), Reg(Esi)),
      Instruction::Dec(Reg(Esi)),
      Instruction::JumpZero(ENTRY_NO_ARGS.to_string()),
      // argv
      Instruction::Move(Operand::memory(3 * word, Ebp), Reg(Ebx)),
      Instruction::Label(ENTRY_ARG_LOOP.to_string()),
      Instruction::Add(Immediate(word), Reg(Ebx)),
      Instruction::Push(Immediate(10)),
      Instruction::Push(Immediate(0)),
      Instruction::Push(Operand::memory(0, Ebx)),
      Instruction::Call("strtol".to_string()),
      Instruction::Add(Immediate(3 * word), Reg(Esp)),
      Instruction::Push(Reg(Eax)),
      Instruction::Dec(Reg(Esi)),
      Instruction::JumpNonZero(ENTRY_ARG_LOOP.to_string()),
      Instruction::Label(ENTRY_NO_ARGS.to_string()),
      Instruction::Call(function_label(first)),
      Instruction::Leave,
      Instruction::Push(Reg(Eax)),
      Instruction::Call("exit".to_string()),
    ];
    self.code.extend(entry);
    Ok(())
  }

  fn emit_function(&mut self, function: &Node) -> CompileResult<()> {
    let name = Self::required(function, 0, "missing name")?
      .name()
      .ok_or_else(|| CompileError::malformed(NodeKind::Function, "unnamed function"))?;
    let body = Self::required(function, 2, "missing body")?;
    trace!(name, "function");

    self.emit(Instruction::Label(function_label(name)));
    self.emit(Instruction::Push(Reg(Ebp)));
    self.emit(Instruction::Move(Reg(Esp), Reg(Ebp)));
    self.depth += 1;
    self.emit_node(body)?;
    self.emit(Instruction::Leave);
    self.depth -= 1;
    self.emit(Instruction::Ret);
    Ok(())
  }

  /// A block frame: static link, saved `%ebp`, then its locals. Leaving
  /// restores `%ebp` and drops the static link.
  fn emit_block(&mut self, block: &Node) -> CompileResult<()> {
    self.emit(Instruction::Push(Reg(Ebp)));
    self.emit(Instruction::Push(Reg(Ebp)));
    self.emit(Instruction::Move(Reg(Esp), Reg(Ebp)));
    self.depth += 1;
    self.emit_children(block)?;
    self.emit(Instruction::Leave);
    self.emit(Instruction::Add(Immediate(self.word()), Reg(Esp)));
    self.depth -= 1;
    Ok(())
  }

  /// Scalars get one zeroed slot. An array gets a pointer slot followed by
  /// its zeroed elements; the pointer addresses element 0, the lowest one.
  fn emit_declaration(&mut self, declaration: &Node) -> CompileResult<()> {
    let variables = Self::required(declaration, 0, "missing variable list")?;
    for variable in variables.items() {
      match variable.array_length() {
        None => self.emit(Instruction::Push(Immediate(0))),
        Some(length) => {
          let size = self
            .ctx
            .config
            .declaration_size(Some(length))
            .ok_or_else(|| CompileError::malformed(NodeKind::Variable, "array too large for a frame"))?;
          self.emit(Instruction::Move(Reg(Esp), Reg(Ecx)));
          self.emit(Instruction::Sub(Immediate(size), Reg(Ecx)));
          self.emit(Instruction::Push(Reg(Ecx)));
          for _ in 0..length {
            self.emit(Instruction::Push(Immediate(0)));
          }
        }
      }
    }
    Ok(())
  }

  fn emit_print(&mut self, print: &Node) -> CompileResult<()> {
    let word = self.word();
    for (position, item) in print.items().enumerate() {
      if position > 0 {
        self.emit(Instruction::Push(Immediate(i32::from(b' '))));
        self.emit(Instruction::Call("putchar".to_string()));
        self.emit(Instruction::Add(Immediate(word), Reg(Esp)));
      }
      match (item.kind(), item.payload()) {
        (NodeKind::Text, Payload::StringIndex(index)) => {
          let stream = self.ctx.config.output_stream.clone();
          self.emit(Instruction::Push(Operand::Global(stream)));
          self.emit(Instruction::Push(Operand::Address(string_label(*index))));
          self.emit(Instruction::Call("fputs".to_string()));
        }
        (NodeKind::Text, _) => return UnboundSnafu { kind: NodeKind::Text }.fail(),
        _ => {
          self.emit_node(item)?;
          self.emit(Instruction::Push(Operand::Address(INTEGER_FORMAT.to_string())));
          self.emit(Instruction::Call("printf".to_string()));
        }
      }
      self.emit(Instruction::Add(Immediate(2 * word), Reg(Esp)));
    }
    self.emit(Instruction::Push(Immediate(i32::from(b'\n'))));
    self.emit(Instruction::Call("putchar".to_string()));
    self.emit(Instruction::Add(Immediate(word), Reg(Esp)));
    Ok(())
  }

  fn emit_expression(&mut self, expression: &Node) -> CompileResult<()> {
    let Some(op) = expression.operator() else {
      // grouping the simplifier did not remove
      let inner = Self::required(expression, 0, "empty grouping")?;
      return self.emit_node(inner);
    };
    match op {
      Operator::Neg => {
        self.emit_node(Self::required(expression, 0, "missing operand")?)?;
        self.emit(Instruction::Pop(Reg(Eax)));
        self.emit(Instruction::Neg(Reg(Eax)));
        self.emit(Instruction::Push(Reg(Eax)));
      }
      Operator::Call => self.emit_call(expression)?,
      Operator::Index => {
        self.emit_element_address(expression)?;
        self.emit(Instruction::Push(Operand::memory(0, Ecx)));
      }
      Operator::Add | Operator::Sub | Operator::Mul | Operator::Div | Operator::Pow => {
        self.emit_node(Self::required(expression, 0, "missing left operand")?)?;
        self.emit_node(Self::required(expression, 1, "missing right operand")?)?;
        self.emit(Instruction::Pop(Reg(Ebx)));
        self.emit(Instruction::Pop(Reg(Eax)));
        match op {
          Operator::Add => self.emit(Instruction::Add(Reg(Ebx), Reg(Eax))),
          Operator::Sub => self.emit(Instruction::Sub(Reg(Ebx), Reg(Eax))),
          Operator::Mul => {
            self.emit(Instruction::Cdq);
            self.emit(Instruction::Mul(Reg(Ebx)));
          }
          Operator::Div => {
            self.emit(Instruction::Cdq);
            self.emit(Instruction::Div(Reg(Ebx)));
          }
          _ => self.emit_power(),
        }
        self.emit(Instruction::Push(Reg(Eax)));
      }
    }
    Ok(())
  }

  /// `%eax ^ %ebx` into `%eax`. Base 1 gives 1 and a negative exponent
  /// gives 0, otherwise the base is multiplied in `%ebx` times.
  fn emit_power(&mut self) {
    self.labels.power += 1;
    let n = self.labels.power;
    let (looping, end) = (local_label("power", n), local_label("endpower", n));
    self.code.extend([
      Instruction::Cmp(Immediate(1), Reg(Eax)),
      Instruction::JumpZero(end.clone()),
      Instruction::Move(Reg(Eax), Reg(Ecx)),
      Instruction::Move(Immediate(0), Reg(Eax)),
      Instruction::CmpZero(Reg(Ebx)),
      Instruction::JumpLess(end.clone()),
      Instruction::Move(Immediate(1), Reg(Eax)),
      Instruction::Label(looping.clone()),
      Instruction::CmpZero(Reg(Ebx)),
      Instruction::JumpZero(end.clone()),
      Instruction::Mul(Reg(Ecx)),
      Instruction::Sub(Immediate(1), Reg(Ebx)),
      Instruction::Jump(looping),
      Instruction::Label(end),
    ]);
  }

  fn emit_call(&mut self, call: &Node) -> CompileResult<()> {
    let callee = Self::required(call, 0, "missing callee")?;
    let symbol = self.symbol_of(callee)?;
    let expected = symbol.arity.context(NotCallableSnafu {
      name: symbol.name.clone(),
    })?;
    let arguments = call.child(1);
    let actual = arguments.map_or(0, Node::len);
    ensure!(
      expected == actual,
      ArityMismatchSnafu {
        function: symbol.name.clone(),
        expected,
        actual,
      }
    );

    if let Some(arguments) = arguments {
      self.emit_children(arguments)?;
    }
    self.emit(Instruction::Call(function_label(&symbol.name)));
    if actual > 0 {
      let bytes = self.word() * actual as i32;
      self.emit(Instruction::Add(Immediate(bytes), Reg(Esp)));
    }
    self.emit(Instruction::Push(Reg(Eax)));
    Ok(())
  }

  /// Leaves the address of `array[index]` in `%ecx`.
  fn emit_element_address(&mut self, indexed: &Node) -> CompileResult<()> {
    self.emit_node(Self::required(indexed, 0, "missing array")?)?;
    self.emit_node(Self::required(indexed, 1, "missing index")?)?;
    let shift = self.word().trailing_zeros() as i32;
    self.emit(Instruction::Pop(Reg(Edx)));
    self.emit(Instruction::Pop(Reg(Ecx)));
    self.emit(Instruction::ShiftLeft(Immediate(shift), Reg(Edx)));
    self.emit(Instruction::Add(Reg(Edx), Reg(Ecx)));
    Ok(())
  }

  /// Points `%ecx` at the frame that declared `symbol`.
  fn emit_frame_walk(&mut self, symbol: &Symbol) -> CompileResult<()> {
    let hops = self
      .depth
      .checked_sub(symbol.depth)
      .ok_or_else(|| CompileError::malformed(NodeKind::Variable, "declared in an inner scope"))?;
    let link = self.ctx.config.static_link_offset();
    self.emit(Instruction::Move(Reg(Ebp), Reg(Ecx)));
    for _ in 0..hops {
      self.emit(Instruction::Move(Operand::memory(link, Ecx), Reg(Ecx)));
    }
    Ok(())
  }

  /// Looks up a variable used as a value, rejecting function names.
  fn variable_symbol(&self, variable: &Node) -> CompileResult<&'a Symbol> {
    let symbol = self.symbol_of(variable)?;
    ensure!(
      !symbol.is_function(),
      NotAValueSnafu {
        name: symbol.name.clone(),
      }
    );
    Ok(symbol)
  }

  fn emit_variable(&mut self, variable: &Node) -> CompileResult<()> {
    let symbol = self.variable_symbol(variable)?;
    self.emit_frame_walk(symbol)?;
    self.emit(Instruction::Push(Operand::memory(symbol.stack_offset, Ecx)));
    Ok(())
  }

  fn emit_assignment(&mut self, assignment: &Node) -> CompileResult<()> {
    let target = Self::required(assignment, 0, "missing target")?;
    match assignment.len() {
      2 => {
        let symbol = self.variable_symbol(target)?;
        self.emit_node(Self::required(assignment, 1, "missing value")?)?;
        self.emit(Instruction::Pop(Reg(Eax)));
        self.emit_frame_walk(symbol)?;
        self.emit(Instruction::Move(
          Reg(Eax),
          Operand::memory(symbol.stack_offset, Ecx),
        ));
      }
      3 => {
        self.emit_node(Self::required(assignment, 2, "missing value")?)?;
        self.emit_element_address(assignment)?;
        self.emit(Instruction::Pop(Reg(Eax)));
        self.emit(Instruction::Move(Reg(Eax), Operand::memory(0, Ecx)));
      }
      _ => {
        return Err(CompileError::malformed(
          NodeKind::AssignmentStatement,
          "unexpected child count",
        ));
      }
    }
    Ok(())
  }

  /// Unwinds every block frame inside the function before returning.
  fn emit_return(&mut self, statement: &Node) -> CompileResult<()> {
    self.emit_node(Self::required(statement, 0, "missing value")?)?;
    self.emit(Instruction::Pop(Reg(Eax)));
    for _ in GLOBAL_DEPTH..self.depth {
      self.emit(Instruction::Leave);
    }
    self.emit(Instruction::Ret);
    Ok(())
  }

  fn emit_condition(&mut self, condition: &Node, on_false: &str) -> CompileResult<()> {
    self.emit_node(condition)?;
    self.emit(Instruction::Pop(Reg(Eax)));
    self.emit(Instruction::CmpZero(Reg(Eax)));
    self.emit(Instruction::JumpZero(on_false.to_string()));
    Ok(())
  }

  fn emit_if(&mut self, statement: &Node) -> CompileResult<()> {
    self.labels.branch += 1;
    let n = self.labels.branch;
    let (otherwise, end) = (local_label("else", n), local_label("endif", n));

    self.emit_condition(Self::required(statement, 0, "missing condition")?, &otherwise)?;
    self.emit_node(Self::required(statement, 1, "missing then branch")?)?;
    match statement.child(2) {
      Some(branch) => {
        self.emit(Instruction::Jump(end.clone()));
        self.emit(Instruction::Label(otherwise));
        self.emit_node(branch)?;
        self.emit(Instruction::Label(end));
      }
      None => self.emit(Instruction::Label(otherwise)),
    }
    Ok(())
  }

  fn emit_while(&mut self, statement: &Node) -> CompileResult<()> {
    self.labels.loops += 1;
    let n = self.labels.loops;
    let (test, end) = (local_label("while", n), local_label("endwhile", n));

    self.emit(Instruction::Label(test.clone()));
    self.emit_condition(Self::required(statement, 0, "missing condition")?, &end)?;
    self.loops.push(LoopFrame {
      test_label: test.clone(),
      depth: self.depth,
    });
    let body = self.emit_node(Self::required(statement, 1, "missing body")?);
    self.loops.pop();
    body?;
    self.emit(Instruction::Jump(test));
    self.emit(Instruction::Label(end));
    Ok(())
  }

  /// `continue`: leave the block frames opened since the loop test, then
  /// jump back to it.
  fn emit_continue(&mut self) -> CompileResult<()> {
    let frame = self.loops.last().ok_or_else(|| {
      CompileError::malformed(NodeKind::NullStatement, "continue outside a loop")
    })?;
    let test = frame.test_label.clone();
    let frames = self.depth - frame.depth;
    for _ in 0..frames {
      self.emit(Instruction::Leave);
    }
    if frames > 0 {
      self.emit(Instruction::Add(Immediate(self.word()), Reg(Esp)));
    }
    self.emit(Instruction::Jump(test));
    Ok(())
  }
}
