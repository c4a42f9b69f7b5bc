//! Push/pop fusion over a generated listing.
//!
//! The stack machine often pushes a value only to pop it straight back into
//! a register. A `pushl X` immediately followed by `popl Y` becomes
//! `movl X,Y`, or disappears when `X` and `Y` are the same operand. Pairs
//! where both sides are memory stay, since `movl` cannot take two memory
//! operands, and so do pairs touching `%esp`, whose value the push and pop
//! themselves change. Self-moves left over by generation are dropped too.

use tracing::trace;

use crate::codegen::{Instruction, Operand};

pub fn optimize(instructions: Vec<Instruction>) -> Vec<Instruction> {
  let mut optimized = Vec::with_capacity(instructions.len());
  let mut instructions = instructions.into_iter().peekable();

  while let Some(instruction) = instructions.next() {
    if let Instruction::Push(source) = &instruction
      && let Some(Instruction::Pop(target)) = instructions.peek()
      && fusable(source, target)
    {
      let target = target.clone();
      instructions.next();
      if *source != target {
        trace!("fused push {source} / pop {target}");
        optimized.push(Instruction::Move(source.clone(), target));
      }
      continue;
    }
    if let Instruction::Move(source, target) = &instruction
      && source == target
    {
      continue;
    }
    optimized.push(instruction);
  }
  optimized
}

fn fusable(source: &Operand, target: &Operand) -> bool {
  !(source.is_memory() && target.is_memory())
    && !source.uses_stack_pointer()
    && !target.uses_stack_pointer()
}
