//! Shared helpers for the integration tests: tree builders shaped like the
//! parser's output, and a small interpreter for the i386 subset the
//! generator emits, so programs can be run without an assembler.

#![allow(dead_code)]

use std::collections::HashMap;

use vslc::codegen::{Instruction, Listing, Operand, Register};
use vslc::{Node, NodeKind, Operator};

pub fn init_tracing() {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_test_writer()
    .try_init();
}

pub fn list(kind: NodeKind, items: Vec<Node>) -> Node {
  Node::chain(kind, items).expect("non-empty list")
}

pub fn program(functions: Vec<Node>) -> Node {
  Node::program(list(NodeKind::FunctionList, functions))
}

pub fn function(name: &str, params: &[&str], body: Node) -> Node {
  let params = (!params.is_empty()).then(|| {
    Node::parameter_list(list(
      NodeKind::VariableList,
      params.iter().map(|p| Node::variable(*p)).collect(),
    ))
  });
  Node::function(Node::variable(name), params, Node::statement(body))
}

/// `{ declarations statements }`, each statement wrapped as the grammar does.
pub fn block(declarations: Vec<Node>, statements: Vec<Node>) -> Node {
  Node::block(
    Node::chain(NodeKind::DeclarationList, declarations),
    list(
      NodeKind::StatementList,
      statements.into_iter().map(Node::statement).collect(),
    ),
  )
}

pub fn var_decl(names: &[&str]) -> Node {
  Node::declaration(list(
    NodeKind::VariableList,
    names.iter().map(|name| Node::variable(*name)).collect(),
  ))
}

pub fn array_decl(name: &str, length: i32) -> Node {
  Node::declaration(Node::list(
    NodeKind::VariableList,
    Node::array_variable(name, length),
  ))
}

pub fn print(items: Vec<Node>) -> Node {
  Node::print_statement(list(
    NodeKind::PrintList,
    items.into_iter().map(Node::print_item).collect(),
  ))
}

pub fn var(name: &str) -> Node {
  Node::variable(name)
}

pub fn int(value: i32) -> Node {
  Node::integer(value)
}

pub fn bin(op: Operator, lhs: Node, rhs: Node) -> Node {
  Node::binary(op, lhs, rhs)
}

pub fn call(name: &str, arguments: Vec<Node>) -> Node {
  let arguments = Node::chain(NodeKind::ExpressionList, arguments).map(Node::argument_list);
  Node::call(Node::variable(name), arguments)
}

pub fn assign(name: &str, value: Node) -> Node {
  Node::assignment(Node::variable(name), value)
}

pub fn ret(value: Node) -> Node {
  Node::return_statement(value)
}

/// What a finished run left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
  pub stdout: String,
  pub exit_code: i32,
}

/// Runs `listing` from its entry label with `args` as the command line.
pub fn run(listing: &Listing, args: &[i32]) -> Outcome {
  Machine::load(listing, args).execute(listing.entry_label())
}

const STACK_TOP: i32 = 0x4000_0000;
const DATA_BASE: i32 = 0x1000;
const ARGV_BASE: i32 = 0x2000;
const ARG_TEXT_BASE: i32 = 0x3000;
const STDOUT_HANDLE: i32 = 0x100;
const RETURN_SENTINEL: i32 = -1;
const STEP_LIMIT: usize = 1_000_000;

struct Machine<'a> {
  code: &'a [Instruction],
  labels: HashMap<&'a str, usize>,
  data: HashMap<String, i32>,
  texts: HashMap<i32, String>,
  registers: HashMap<Register, i32>,
  memory: HashMap<i32, i32>,
  zero: bool,
  less: bool,
  stdout: String,
}

impl<'a> Machine<'a> {
  fn load(listing: &'a Listing, args: &[i32]) -> Self {
    let code = listing.instructions();
    let labels = code
      .iter()
      .enumerate()
      .filter_map(|(index, instruction)| match instruction {
        Instruction::Label(label) => Some((label.as_str(), index)),
        _ => None,
      })
      .collect();

    let mut machine = Self {
      code,
      labels,
      data: HashMap::new(),
      texts: HashMap::new(),
      registers: HashMap::new(),
      memory: HashMap::new(),
      zero: false,
      less: false,
      stdout: String::new(),
    };

    machine.data.insert(".INTEGER".to_string(), DATA_BASE);
    machine.texts.insert(DATA_BASE, "%d".to_string());
    for (index, text) in listing.strings().iter().enumerate() {
      let address = DATA_BASE + 16 * (index as i32 + 1);
      machine.data.insert(format!(".STRING{index}"), address);
      machine.texts.insert(address, text.to_string());
    }

    let argv: Vec<String> = std::iter::once("program".to_string())
      .chain(args.iter().map(ToString::to_string))
      .collect();
    for (index, text) in argv.iter().enumerate() {
      let address = ARG_TEXT_BASE + 16 * index as i32;
      machine.texts.insert(address, text.clone());
      machine.memory.insert(ARGV_BASE + 4 * index as i32, address);
    }

    machine.set(Register::Esp, STACK_TOP);
    machine.set(Register::Ebp, 0);
    machine.push(ARGV_BASE);
    machine.push(argv.len() as i32);
    machine.push(RETURN_SENTINEL);
    machine
  }

  fn reg(&self, register: Register) -> i32 {
    self.registers.get(&register).copied().unwrap_or(0)
  }

  fn set(&mut self, register: Register, value: i32) {
    self.registers.insert(register, value);
  }

  fn load_word(&self, address: i32) -> i32 {
    *self
      .memory
      .get(&address)
      .unwrap_or_else(|| panic!("read of unmapped address {address:#x}"))
  }

  fn push(&mut self, value: i32) {
    let esp = self.reg(Register::Esp) - 4;
    self.set(Register::Esp, esp);
    self.memory.insert(esp, value);
  }

  fn pop(&mut self) -> i32 {
    let esp = self.reg(Register::Esp);
    let value = self.load_word(esp);
    self.set(Register::Esp, esp + 4);
    value
  }

  /// Word `index` slots above the stack pointer.
  fn argument(&self, index: i32) -> i32 {
    self.load_word(self.reg(Register::Esp) + 4 * index)
  }

  fn read(&self, operand: &Operand) -> i32 {
    match operand {
      Operand::Immediate(value) => *value,
      Operand::Address(label) => *self
        .data
        .get(label)
        .unwrap_or_else(|| panic!("unknown data label {label}")),
      Operand::Register(register) => self.reg(*register),
      Operand::Memory { offset, base } => self.load_word(self.reg(*base) + offset),
      Operand::Global(symbol) => {
        assert_eq!(symbol, "stdout", "unknown global");
        STDOUT_HANDLE
      }
    }
  }

  fn write(&mut self, operand: &Operand, value: i32) {
    match operand {
      Operand::Register(register) => self.set(*register, value),
      Operand::Memory { offset, base } => {
        let address = self.reg(*base) + offset;
        self.memory.insert(address, value);
      }
      other => panic!("cannot write to {other}"),
    }
  }

  fn compare(&mut self, lhs: i32, rhs: i32) {
    self.zero = lhs == rhs;
    self.less = lhs < rhs;
  }

  fn label(&self, label: &str) -> usize {
    *self
      .labels
      .get(label)
      .unwrap_or_else(|| panic!("jump to unknown label {label}"))
  }

  fn text(&self, address: i32) -> &str {
    self
      .texts
      .get(&address)
      .unwrap_or_else(|| panic!("no string at {address:#x}"))
  }

  fn outcome(&self, exit_code: i32) -> Outcome {
    Outcome {
      stdout: self.stdout.clone(),
      exit_code,
    }
  }

  /// Runs a C library routine. Returns the exit status when it ends the run.
  fn library_call(&mut self, name: &str) -> Option<i32> {
    match name {
      "printf" => {
        assert_eq!(self.text(self.argument(0)), "%d");
        let value = self.argument(1).to_string();
        self.stdout.push_str(&value);
        self.set(Register::Eax, value.len() as i32);
      }
      "fputs" => {
        assert_eq!(self.argument(1), STDOUT_HANDLE);
        let text = self.text(self.argument(0)).to_string();
        self.stdout.push_str(&text);
        self.set(Register::Eax, 0);
      }
      "putchar" => {
        let c = self.argument(0);
        self.stdout.push(char::from(c as u8));
        self.set(Register::Eax, c);
      }
      "strtol" => {
        assert_eq!(self.argument(2), 10);
        let value = self
          .text(self.argument(0))
          .parse::<i32>()
          .expect("numeric argument");
        self.set(Register::Eax, value);
      }
      "exit" => return Some(self.argument(0)),
      other => panic!("call to unknown routine {other}"),
    }
    None
  }

  fn execute(mut self, entry: &str) -> Outcome {
    let code = self.code;
    let mut ip = self.label(entry);
    for _ in 0..STEP_LIMIT {
      let instruction = &code[ip];
      ip += 1;
      match instruction {
        Instruction::Cdq => {
          let sign = if self.reg(Register::Eax) < 0 { -1 } else { 0 };
          self.set(Register::Edx, sign);
        }
        Instruction::Leave => {
          let ebp = self.reg(Register::Ebp);
          self.set(Register::Esp, ebp);
          let saved = self.pop();
          self.set(Register::Ebp, saved);
        }
        Instruction::Ret => {
          let target = self.pop();
          if target == RETURN_SENTINEL {
            return self.outcome(self.reg(Register::Eax));
          }
          ip = target as usize;
        }
        Instruction::Label(_) => {}
        Instruction::Push(operand) => {
          let value = self.read(operand);
          self.push(value);
        }
        Instruction::Pop(operand) => {
          let value = self.pop();
          self.write(operand, value);
        }
        Instruction::Mul(operand) => {
          let product = self.reg(Register::Eax).wrapping_mul(self.read(operand));
          self.set(Register::Eax, product);
        }
        Instruction::Div(operand) => {
          let divisor = self.read(operand);
          let dividend = self.reg(Register::Eax);
          let quotient = dividend.checked_div(divisor).expect("division fault");
          self.set(Register::Eax, quotient);
          self.set(Register::Edx, dividend.wrapping_rem(divisor));
        }
        Instruction::Dec(operand) => {
          let value = self.read(operand).wrapping_sub(1);
          self.write(operand, value);
          self.compare(value, 0);
        }
        Instruction::Neg(operand) => {
          let value = self.read(operand).wrapping_neg();
          self.write(operand, value);
          self.compare(value, 0);
        }
        Instruction::CmpZero(operand) => {
          let value = self.read(operand);
          self.compare(value, 0);
        }
        Instruction::Cmp(source, target) => {
          let (lhs, rhs) = (self.read(target), self.read(source));
          self.compare(lhs, rhs);
        }
        Instruction::Call(target) => {
          if self.labels.contains_key(target.as_str()) {
            self.push(ip as i32);
            ip = self.label(target);
          } else if let Some(code) = self.library_call(target) {
            return self.outcome(code);
          }
        }
        Instruction::Jump(target) => ip = self.label(target),
        Instruction::JumpLess(target) => {
          if self.less {
            ip = self.label(target);
          }
        }
        Instruction::JumpZero(target) => {
          if self.zero {
            ip = self.label(target);
          }
        }
        Instruction::JumpNonZero(target) => {
          if !self.zero {
            ip = self.label(target);
          }
        }
        Instruction::Move(source, target) => {
          let value = self.read(source);
          self.write(target, value);
        }
        Instruction::Add(source, target) => {
          let value = self.read(target).wrapping_add(self.read(source));
          self.write(target, value);
          self.compare(value, 0);
        }
        Instruction::Sub(source, target) => {
          let value = self.read(target).wrapping_sub(self.read(source));
          self.write(target, value);
          self.compare(value, 0);
        }
        Instruction::ShiftLeft(source, target) => {
          let value = self.read(target) << self.read(source);
          self.write(target, value);
        }
      }
    }
    panic!("program did not finish within {STEP_LIMIT} steps");
  }
}
