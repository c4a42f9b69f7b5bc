//! Crate root: wires together the back half of the VSL compiler.
//!
//! A parser outside this crate builds the grammar-shaped tree with the
//! constructors in `tree`. From there the pipeline runs in order:
//! - `simplify` collapses wrappers and list chains and folds constants.
//! - `bind` opens scopes, assigns frame offsets and resolves every name.
//! - `codegen` lowers the bound tree into a 32-bit assembly `Listing`.
//! - `peephole` optionally fuses push/pop pairs in that listing.
//!
//! `symtab` holds the scoped symbol table and the string table, `config` the
//! target knobs, and `error` the fatal diagnostics every pass reports through.

pub mod bind;
pub mod codegen;
pub mod config;
pub mod error;
pub mod peephole;
pub mod simplify;
pub mod symtab;
pub mod tree;

use tracing::debug;

pub use codegen::Listing;
pub use config::Config;
pub use error::{CompileError, CompileResult};
pub use symtab::{StringTable, SymbolTable};
pub use tree::{Node, NodeKind, Operator};

/// State shared by the passes of one compilation run.
#[derive(Debug, Default)]
pub struct Compilation {
  pub config: Config,
  pub symbols: SymbolTable,
  pub strings: StringTable,
}

impl Compilation {
  pub fn new(config: Config) -> Self {
    Self {
      config,
      symbols: SymbolTable::new(),
      strings: StringTable::new(),
    }
  }
}

/// Run every pass over a parsed tree.
pub fn compile(tree: Node, config: &Config) -> CompileResult<Listing> {
  let mut ctx = Compilation::new(config.clone());
  let mut tree = simplify::simplify(tree);
  bind::bind(&mut tree, &mut ctx)?;
  let mut listing = codegen::generate(&tree, &ctx)?;
  if ctx.config.peephole {
    listing.optimize();
  }
  debug!(
    instructions = listing.instructions().len(),
    "compilation finished"
  );
  Ok(listing)
}

/// Compile a parsed tree into assembly text.
pub fn generate_assembly(tree: Node, config: &Config) -> CompileResult<String> {
  Ok(compile(tree, config)?.to_string())
}
