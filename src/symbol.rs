use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Marker that opens a nonterminal name in grammar source text.
pub const NONTERMINAL_MARKER: char = '_';

/// Prefix of scaffolding symbols synthesized by rule expansion. Scaffolding
/// symbols are hidden: they are spliced out of display trees and contribute
/// no arguments to semantic actions.
pub const SCAFFOLD_PREFIX: &str = "_#";

/// A grammar symbol. Terminal/nonterminal status is part of the type, never
/// re-derived from string shape, and equality is structural: the `Eq` impl is
/// the comparison strategy, so span-tagged symbols compare by content.
pub trait Symbol: Clone + Eq + Hash + fmt::Debug + fmt::Display + 'static {
  /// Terminals match input tokens directly; nonterminals head rules.
  fn is_terminal(&self) -> bool;

  fn is_nonterminal(&self) -> bool {
    !self.is_terminal()
  }

  /// Hidden symbols are structural scaffolding, elided from display trees.
  fn is_hidden(&self) -> bool {
    false
  }
}

/// The string-backed symbol used by the quick-grammar compiler.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Sym {
  Terminal(String),
  Nonterminal(String),
}

impl Sym {
  pub fn terminal(name: impl Into<String>) -> Self {
    Self::Terminal(name.into())
  }

  pub fn nonterminal(name: impl Into<String>) -> Self {
    Self::Nonterminal(name.into())
  }

  /// Classifies a source-text token by the reserved marker. This is the only
  /// place string shape decides terminal status.
  pub fn from_source(name: &str) -> Self {
    if name.starts_with(NONTERMINAL_MARKER) {
      Self::Nonterminal(name.to_string())
    } else {
      Self::Terminal(name.to_string())
    }
  }

  pub fn text(&self) -> &str {
    match self {
      Self::Terminal(s) => s,
      Self::Nonterminal(s) => s,
    }
  }

  /// Splits a sentence into terminal symbols on whitespace.
  pub fn terminals(input: &str) -> Vec<Sym> {
    input.split_whitespace().map(Sym::terminal).collect()
  }
}

impl Symbol for Sym {
  fn is_terminal(&self) -> bool {
    matches!(self, Self::Terminal(_))
  }

  fn is_hidden(&self) -> bool {
    self.text().starts_with(SCAFFOLD_PREFIX)
  }
}

impl fmt::Display for Sym {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.text())
  }
}

/// A symbol tagged with the token range it spans. Parse forests are grammars
/// over spanned symbols, so every grammar operation applies to them unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Spanned<S> {
  pub from: usize,
  pub to: usize,
  pub sym: S,
}

impl<S> Spanned<S> {
  pub fn new(from: usize, to: usize, sym: S) -> Self {
    Self { from, to, sym }
  }
}

impl<S: Symbol> Symbol for Spanned<S> {
  fn is_terminal(&self) -> bool {
    self.sym.is_terminal()
  }

  fn is_hidden(&self) -> bool {
    self.sym.is_hidden()
  }
}

impl<S: fmt::Display> fmt::Display for Spanned<S> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}..{}: {}", self.from, self.to, self.sym)
  }
}

// Ids come from a process-wide pool; scaffolding names minted by any two
// factories never collide, even across merged grammars.
static NEXT_SCAFFOLD_ID: AtomicUsize = AtomicUsize::new(0);

/// Mints fresh scaffolding nonterminals for rule expansion.
#[derive(Debug, Default)]
pub struct SymbolFactory {
  _private: (),
}

impl SymbolFactory {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn fresh(&self) -> Sym {
    let id = NEXT_SCAFFOLD_ID.fetch_add(1, Ordering::Relaxed);
    Sym::Nonterminal(format!("{}{}", SCAFFOLD_PREFIX, id))
  }
}

#[test]
fn test_source_classification() {
  assert!(Sym::from_source("_np").is_nonterminal());
  assert!(Sym::from_source("cat").is_terminal());
  assert!(!Sym::from_source("cat").is_hidden());
}

#[test]
fn test_fresh_symbols_are_hidden_and_unique() {
  let f = SymbolFactory::new();
  let g = SymbolFactory::new();
  let a = f.fresh();
  let b = g.fresh();
  assert!(a.is_hidden());
  assert!(a.is_nonterminal());
  assert_ne!(a, b);
}

#[test]
fn test_spanned_delegates() {
  let s = Spanned::new(0, 1, Sym::terminal("cat"));
  assert!(s.is_terminal());
  assert_eq!(format!("{}", s), "0..1: cat");
  assert_eq!(s, Spanned::new(0, 1, Sym::terminal("cat")));
}
