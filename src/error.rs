use thiserror::Error;

/// Everything that can go wrong while building or querying a grammar.
///
/// Construction-time variants abort grammar construction; per-call variants
/// (`NoSubstitution`) abort only that call. A string simply not being in the
/// language is *not* an error and never surfaces here.
#[derive(Debug, Error)]
pub enum GrammarError {
  /// Malformed rule source text.
  #[error("syntax error on line {line}: {message}")]
  Syntax { line: usize, message: String },

  /// A rule was given an empty body.
  #[error("rule for {0} has an empty body")]
  EmptyBody(String),

  /// A rule head must be a nonterminal.
  #[error("rule head must be a nonterminal, got {0}")]
  TerminalHead(String),

  /// A terminal rule's body must be a terminal.
  #[error("terminal rule body must be a terminal, got {0}")]
  NonterminalBody(String),

  /// No starting symbol was given and no nonterminal is free of rule bodies.
  #[error("cannot infer a starting symbol: every nonterminal appears in a rule body")]
  NoStartSymbol,

  /// No starting symbol was given and several nonterminals qualify.
  #[error("cannot infer a starting symbol, candidates: {0}")]
  AmbiguousStart(String),

  #[error("empty ruleset")]
  EmptyRuleset,

  /// Reported by `assert_no_duplicate_rules`.
  #[error("duplicate rule: {0}")]
  DuplicateRule(String),

  /// `random_substitution` found no rule applicable to the symbol.
  #[error("no substitution for {0}")]
  NoSubstitution(String),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}
