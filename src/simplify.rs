//! Tree simplification: turns the grammar-shaped tree into a minimal one.
//!
//! The pass consumes its input and rebuilds bottom-up, so every rule sees
//! children that are already flattened and folded:
//! - wrapper kinds with a single child are replaced by that child,
//! - list chains collapse into one node holding their items in source order,
//! - print statements adopt the items of their print list,
//! - grouping disappears and integer-literal arithmetic is folded.
//!
//! Shapes the grammar cannot produce are passed through untouched.

use tracing::{debug, trace};

use crate::tree::{Node, NodeKind, Operator, Payload};

/// Simplify a whole tree.
pub fn simplify(root: Node) -> Node {
  let simplified = simplify_node(root);
  debug!(kind = %simplified.kind(), "tree simplified");
  trace!("simplified tree:\n{simplified}");
  simplified
}

fn simplify_node(mut node: Node) -> Node {
  node.children = std::mem::take(&mut node.children)
    .into_iter()
    .map(|slot| slot.map(simplify_node))
    .collect();

  match node.kind {
    NodeKind::Statement | NodeKind::PrintItem | NodeKind::ParameterList | NodeKind::ArgumentList => {
      unwrap_single(node)
    }
    NodeKind::PrintStatement => adopt_print_list(node),
    NodeKind::DeclarationList => flatten_list(promote_first_declaration(node)),
    NodeKind::FunctionList
    | NodeKind::StatementList
    | NodeKind::PrintList
    | NodeKind::ExpressionList
    | NodeKind::VariableList => flatten_list(node),
    NodeKind::Expression => fold_expression(node),
    _ => node,
  }
}

/// Replace a wrapper by its only child.
fn unwrap_single(mut node: Node) -> Node {
  if node.children.len() != 1 {
    return node;
  }
  match node.children.pop().flatten() {
    Some(child) => child,
    None => {
      node.children.push(None);
      node
    }
  }
}

/// `print-statement[print-list[a, b, c]]` becomes `print-statement[a, b, c]`.
fn adopt_print_list(mut node: Node) -> Node {
  let is_print_list = matches!(
    node.children.as_slice(),
    [Some(list)] if list.kind == NodeKind::PrintList
  );
  if !is_print_list {
    return node;
  }
  if let Some(Some(list)) = node.children.pop() {
    node.children = list.children;
  }
  node
}

/// The bottom link of a declaration chain is `[absent, declaration]`; drop
/// the absent slot so it looks like every other list bottom.
fn promote_first_declaration(mut node: Node) -> Node {
  if node.children.len() == 2 && node.children[0].is_none() {
    node.children.remove(0);
  }
  node
}

/// `list[sub-list[a, b], c]` becomes `sub-list[a, b, c]`.
fn flatten_list(mut node: Node) -> Node {
  let extends_sub_list = matches!(
    node.children.as_slice(),
    [Some(sub_list), Some(_)] if sub_list.kind == node.kind
  );
  if !extends_sub_list {
    return node;
  }
  let item = node.children.pop().flatten();
  match node.children.pop().flatten() {
    Some(mut sub_list) => {
      sub_list.children.push(item);
      sub_list
    }
    None => node,
  }
}

fn fold_expression(mut node: Node) -> Node {
  match node.children.len() {
    1 => match (node.operator(), node.child(0).map(Node::kind)) {
      (None, Some(_)) => unwrap_single(node),
      (Some(Operator::Neg), Some(NodeKind::Integer)) => match node.children.pop().flatten() {
        Some(mut literal) => {
          if let Payload::Integer(value) = &mut literal.payload {
            *value = value.wrapping_neg();
          }
          literal
        }
        None => node,
      },
      _ => node,
    },
    2 => {
      let Some(op) = node.operator().filter(|op| op.is_arithmetic()) else {
        return node;
      };
      let (Some(lhs), Some(rhs)) = (
        node.child(0).and_then(Node::integer_value),
        node.child(1).and_then(Node::integer_value),
      ) else {
        return node;
      };
      match fold_binary(op, lhs, rhs) {
        Some(value) => {
          trace!("folded {lhs} {} {rhs} = {value}", op.symbol());
          Node::integer(value)
        }
        None => node,
      }
    }
    _ => node,
  }
}

/// Value of `lhs op rhs` on 32-bit integers, or `None` when it must be left
/// for run time (division by zero).
pub fn fold_binary(op: Operator, lhs: i32, rhs: i32) -> Option<i32> {
  match op {
    Operator::Add => Some(lhs.wrapping_add(rhs)),
    Operator::Sub => Some(lhs.wrapping_sub(rhs)),
    Operator::Mul => Some(lhs.wrapping_mul(rhs)),
    Operator::Div if rhs == 0 => None,
    Operator::Div => Some(lhs.wrapping_div(rhs)),
    Operator::Pow => Some(power(lhs, rhs)),
    Operator::Neg | Operator::Call | Operator::Index => None,
  }
}

/// Integer power. A negative exponent divides 1 by the base once per unit
/// of exponent, and a zero base with a negative exponent gives 1.
fn power(base: i32, exponent: i32) -> i32 {
  if exponent >= 0 {
    return base.wrapping_pow(exponent.unsigned_abs());
  }
  match base {
    0 | 1 => 1,
    // 1 / -1 alternates between -1 and 1.
    -1 if exponent % 2 != 0 => -1,
    -1 => 1,
    _ => 0,
  }
}
