use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::error::GrammarError;
use crate::symbol::Symbol;

/// A semantic value synthesized by rule actions. `Token` carries a matched
/// input token, `Seq` an ordered collection of child values, and `Custom` an
/// arbitrary caller-defined payload.
#[derive(Clone)]
pub enum Value {
  Token(String),
  Seq(Vec<Value>),
  Custom(Rc<dyn Any>),
}

impl Value {
  pub fn token(sym: &impl fmt::Display) -> Self {
    Self::Token(sym.to_string())
  }

  pub fn custom<T: Any>(value: T) -> Self {
    Self::Custom(Rc::new(value))
  }

  pub fn as_token(&self) -> Option<&str> {
    match self {
      Self::Token(s) => Some(s),
      _ => None,
    }
  }

  /// Unwraps a `Seq` into its items; any other value becomes a singleton.
  pub fn into_items(self) -> Vec<Value> {
    match self {
      Self::Seq(items) => items,
      other => vec![other],
    }
  }

  pub fn downcast<T: Any>(&self) -> Option<&T> {
    match self {
      Self::Custom(rc) => rc.downcast_ref(),
      _ => None,
    }
  }
}

impl fmt::Debug for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Token(s) => write!(f, "Token({:?})", s),
      Self::Seq(items) => f.debug_list().entries(items).finish(),
      Self::Custom(_) => write!(f, "Custom(..)"),
    }
  }
}

impl PartialEq for Value {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (Self::Token(a), Self::Token(b)) => a == b,
      (Self::Seq(a), Self::Seq(b)) => a == b,
      (Self::Custom(a), Self::Custom(b)) => Rc::ptr_eq(a, b),
      _ => false,
    }
  }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Token(s) => write!(f, "{}", s),
      Self::Seq(items) => {
        for (idx, item) in items.iter().enumerate() {
          if idx > 0 {
            write!(f, " ")?;
          }
          write!(f, "{}", item)?;
        }
        Ok(())
      }
      Self::Custom(_) => write!(f, "<custom>"),
    }
  }
}

/// Action of a terminal rule: synthesizes a value from the matched token.
pub type TermAction<S> = Rc<dyn Fn(&S) -> Value>;
/// Action of a binary nonterminal rule.
pub type PairAction = Rc<dyn Fn(Value, Value) -> Value>;
/// Action of an alias rule.
pub type UnitAction = Rc<dyn Fn(Value) -> Value>;

/// `head -> token`. The head produces a single terminal.
pub struct TerminalRule<S> {
  pub head: S,
  pub body: S,
  pub action: TermAction<S>,
}

/// `head -> left right`. Strict two-symbol body; longer productions are
/// desugared to chains of these by rule expansion.
pub struct NonterminalRule<S> {
  pub head: S,
  pub body: (S, S),
  pub action: PairAction,
}

/// `head -> body` where both are nonterminals. An extension beyond Chomsky
/// Normal Form that keeps disjunctions from exploding the rule count.
pub struct AliasRule<S> {
  pub head: S,
  pub body: S,
  pub action: UnitAction,
}

impl<S: Symbol> TerminalRule<S> {
  pub fn new(head: S, body: S, action: TermAction<S>) -> Result<Self, GrammarError> {
    if head.is_terminal() {
      return Err(GrammarError::TerminalHead(head.to_string()));
    }
    if !body.is_terminal() {
      return Err(GrammarError::NonterminalBody(body.to_string()));
    }
    Ok(Self { head, body, action })
  }
}

impl<S: Symbol> NonterminalRule<S> {
  pub fn new(head: S, body: (S, S), action: PairAction) -> Result<Self, GrammarError> {
    if head.is_terminal() {
      return Err(GrammarError::TerminalHead(head.to_string()));
    }
    Ok(Self { head, body, action })
  }
}

impl<S: Symbol> AliasRule<S> {
  pub fn new(head: S, body: S, action: UnitAction) -> Result<Self, GrammarError> {
    if head.is_terminal() {
      return Err(GrammarError::TerminalHead(head.to_string()));
    }
    if body.is_terminal() {
      return Err(GrammarError::NonterminalBody(body.to_string()));
    }
    Ok(Self { head, body, action })
  }
}

// Rules compare and print by head and body; actions are opaque.

impl<S: PartialEq> PartialEq for TerminalRule<S> {
  fn eq(&self, other: &Self) -> bool {
    self.head == other.head && self.body == other.body
  }
}

impl<S: PartialEq> PartialEq for NonterminalRule<S> {
  fn eq(&self, other: &Self) -> bool {
    self.head == other.head && self.body == other.body
  }
}

impl<S: PartialEq> PartialEq for AliasRule<S> {
  fn eq(&self, other: &Self) -> bool {
    self.head == other.head && self.body == other.body
  }
}

impl<S: fmt::Display> fmt::Display for TerminalRule<S> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} -> {}", self.head, self.body)
  }
}

impl<S: fmt::Display> fmt::Display for NonterminalRule<S> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} -> {} {}", self.head, self.body.0, self.body.1)
  }
}

impl<S: fmt::Display> fmt::Display for AliasRule<S> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} -> {}", self.head, self.body)
  }
}

impl<S: fmt::Display> fmt::Debug for TerminalRule<S> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "TerminalRule({})", self)
  }
}

impl<S: fmt::Display> fmt::Debug for NonterminalRule<S> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "NonterminalRule({})", self)
  }
}

impl<S: fmt::Display> fmt::Debug for AliasRule<S> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "AliasRule({})", self)
  }
}

/// The three rule collections of a grammar, in the order they were added.
pub struct RuleSet<S> {
  pub terminal: Vec<Rc<TerminalRule<S>>>,
  pub nonterminal: Vec<Rc<NonterminalRule<S>>>,
  pub alias: Vec<Rc<AliasRule<S>>>,
}

impl<S> RuleSet<S> {
  pub fn new() -> Self {
    Self {
      terminal: Vec::new(),
      nonterminal: Vec::new(),
      alias: Vec::new(),
    }
  }

  pub fn len(&self) -> usize {
    self.terminal.len() + self.nonterminal.len() + self.alias.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Concatenates another set onto this one. Never deduplicates.
  pub fn extend(&mut self, other: RuleSet<S>) {
    self.terminal.extend(other.terminal);
    self.nonterminal.extend(other.nonterminal);
    self.alias.extend(other.alias);
  }
}

impl<S> Default for RuleSet<S> {
  fn default() -> Self {
    Self::new()
  }
}

impl<S> Clone for RuleSet<S> {
  fn clone(&self) -> Self {
    Self {
      terminal: self.terminal.clone(),
      nonterminal: self.nonterminal.clone(),
      alias: self.alias.clone(),
    }
  }
}

impl<S: fmt::Display> fmt::Debug for RuleSet<S> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RuleSet")
      .field("terminal", &self.terminal)
      .field("nonterminal", &self.nonterminal)
      .field("alias", &self.alias)
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::symbol::Sym;

  #[test]
  fn test_terminal_head_rejected() {
    let r = TerminalRule::new(
      Sym::terminal("cat"),
      Sym::terminal("cat"),
      Rc::new(|t: &Sym| Value::token(t)),
    );
    assert!(matches!(r, Err(GrammarError::TerminalHead(_))));
  }

  #[test]
  fn test_alias_body_must_be_nonterminal() {
    let r = AliasRule::new(Sym::nonterminal("_np"), Sym::terminal("cat"), Rc::new(|v| v));
    assert!(matches!(r, Err(GrammarError::NonterminalBody(_))));
  }

  #[test]
  fn test_rules_compare_by_shape() {
    let a = TerminalRule::new(
      Sym::nonterminal("_noun"),
      Sym::terminal("cat"),
      Rc::new(|t: &Sym| Value::token(t)),
    )
    .unwrap();
    let b = TerminalRule::new(
      Sym::nonterminal("_noun"),
      Sym::terminal("cat"),
      Rc::new(|_| Value::Seq(Vec::new())),
    )
    .unwrap();
    assert_eq!(a, b);
    assert_eq!(format!("{}", a), "_noun -> cat");
  }
}
