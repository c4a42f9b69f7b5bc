//! Target description handed to the pipeline alongside the raw tree.
//!
//! The defaults describe the 32-bit stack discipline the generator is built
//! around: 4-byte slots, parameters above the return address, locals below
//! the frame pointer, and a C runtime that exposes `stdout`.

/// Knobs for one compilation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
  /// Size in bytes of one stack slot.
  pub word_size: i32,
  /// Label of the synthesized process entry point.
  pub entry_label: String,
  /// C symbol of the stream text literals are written to.
  pub output_stream: String,
  /// Run the push/pop fusion pass over the generated listing.
  pub peephole: bool,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      word_size: 4,
      entry_label: "main".to_string(),
      output_stream: "stdout".to_string(),
      peephole: false,
    }
  }
}

impl Config {
  pub fn with_peephole(mut self, enabled: bool) -> Self {
    self.peephole = enabled;
    self
  }

  pub fn with_entry_label(mut self, label: impl Into<String>) -> Self {
    self.entry_label = label.into();
    self
  }

  pub fn with_output_stream(mut self, stream: impl Into<String>) -> Self {
    self.output_stream = stream.into();
    self
  }

  /// Offset of the first formal parameter of a function taking `n_params`
  /// arguments. Later parameters sit one word lower each.
  pub fn first_parameter_offset(&self, n_params: usize) -> i32 {
    self.word_size + self.word_size * n_params as i32
  }

  /// Offset of the first local declared in a block.
  pub fn first_local_offset(&self) -> i32 {
    -self.word_size
  }

  /// Bytes a declaration reserves: one word for a scalar, or a base pointer
  /// plus one word per element for an array. `None` when the length is
  /// negative or the frame size would not fit in an `i32`.
  pub fn declaration_size(&self, array_length: Option<i32>) -> Option<i32> {
    match array_length {
      None => Some(self.word_size),
      Some(len) if len < 0 => None,
      Some(len) => len.checked_add(1)?.checked_mul(self.word_size),
    }
  }

  /// Where a block frame keeps the frame pointer of its lexical parent.
  pub fn static_link_offset(&self) -> i32 {
    self.word_size
  }
}
