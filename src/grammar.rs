use std::collections::HashSet;
use std::fmt;

use tracing::debug;

use crate::error::GrammarError;
use crate::rules::RuleSet;
use crate::symbol::Symbol;

/// A context-free grammar in normalized form: terminal, binary nonterminal
/// and alias rules, plus a starting symbol.
///
/// The grammar exclusively owns its rule collections. It is immutable after
/// construction, so shared readers are safe.
pub struct Grammar<S> {
  pub(crate) rules: RuleSet<S>,
  pub(crate) start: S,
}

impl<S: Symbol> Grammar<S> {
  /// Builds a grammar. When `start` is `None` it is inferred as the unique
  /// nonterminal that appears in no rule body; zero or several candidates is
  /// a construction error.
  pub fn new(rules: RuleSet<S>, start: Option<S>) -> Result<Self, GrammarError> {
    let start = match start {
      Some(s) => {
        if s.is_terminal() {
          return Err(GrammarError::TerminalHead(s.to_string()));
        }
        s
      }
      None => {
        if rules.is_empty() {
          return Err(GrammarError::EmptyRuleset);
        }
        Self::infer_start(&rules)?
      }
    };

    debug!(start = %start, rules = rules.len(), "built grammar");
    Ok(Self { rules, start })
  }

  /// Internal constructor for grammars whose start symbol is known by
  /// construction, e.g. parse forests.
  pub(crate) fn from_parts(rules: RuleSet<S>, start: S) -> Self {
    Self { rules, start }
  }

  fn infer_start(rules: &RuleSet<S>) -> Result<S, GrammarError> {
    let tops = Self::top_nonterminals(rules);
    match tops.len() {
      0 => Err(GrammarError::NoStartSymbol),
      1 => Ok(tops.into_iter().next().unwrap()),
      _ => {
        let names = tops
          .iter()
          .map(|s| s.to_string())
          .collect::<Vec<_>>()
          .join(", ");
        Err(GrammarError::AmbiguousStart(names))
      }
    }
  }

  fn top_nonterminals(rules: &RuleSet<S>) -> Vec<S> {
    let mut in_body: HashSet<S> = HashSet::new();
    for r in rules.nonterminal.iter() {
      in_body.insert(r.body.0.clone());
      in_body.insert(r.body.1.clone());
    }
    for r in rules.alias.iter() {
      in_body.insert(r.body.clone());
    }

    let mut tops = Vec::new();
    for head in Self::heads(rules) {
      if !in_body.contains(&head) && !tops.contains(&head) {
        tops.push(head);
      }
    }
    tops
  }

  fn heads(rules: &RuleSet<S>) -> impl Iterator<Item = S> + '_ {
    rules
      .terminal
      .iter()
      .map(|r| r.head.clone())
      .chain(rules.nonterminal.iter().map(|r| r.head.clone()))
      .chain(rules.alias.iter().map(|r| r.head.clone()))
  }

  pub fn start(&self) -> &S {
    &self.start
  }

  pub fn rules(&self) -> &RuleSet<S> {
    &self.rules
  }

  pub fn number_of_rules(&self) -> usize {
    self.rules.len()
  }

  /// Every nonterminal mentioned by a rule, head or body, in first-seen order.
  pub fn list_all_nonterminals(&self) -> Vec<S> {
    let mut seen = Vec::new();
    let heads = Self::heads(&self.rules);
    let bodies = self
      .rules
      .nonterminal
      .iter()
      .flat_map(|r| [r.body.0.clone(), r.body.1.clone()])
      .chain(self.rules.alias.iter().map(|r| r.body.clone()));

    for sym in heads.chain(bodies) {
      if sym.is_nonterminal() && !seen.contains(&sym) {
        seen.push(sym);
      }
    }
    seen
  }

  /// Nonterminals that appear in no rule body; the candidates for the
  /// starting symbol.
  pub fn list_top_nonterminals(&self) -> Vec<S> {
    Self::top_nonterminals(&self.rules)
  }

  /// Checks that no rule occurs twice (same head and body). Merging never
  /// deduplicates, so callers that care must ask.
  pub fn assert_no_duplicate_rules(&self) -> Result<(), GrammarError> {
    for (idx, r) in self.rules.terminal.iter().enumerate() {
      if self.rules.terminal[..idx].iter().any(|o| **o == **r) {
        return Err(GrammarError::DuplicateRule(r.to_string()));
      }
    }
    for (idx, r) in self.rules.nonterminal.iter().enumerate() {
      if self.rules.nonterminal[..idx].iter().any(|o| **o == **r) {
        return Err(GrammarError::DuplicateRule(r.to_string()));
      }
    }
    for (idx, r) in self.rules.alias.iter().enumerate() {
      if self.rules.alias[..idx].iter().any(|o| **o == **r) {
        return Err(GrammarError::DuplicateRule(r.to_string()));
      }
    }
    Ok(())
  }
}

impl<S: Symbol> Clone for Grammar<S> {
  fn clone(&self) -> Self {
    Self {
      rules: self.rules.clone(),
      start: self.start.clone(),
    }
  }
}

impl<S: Symbol> fmt::Debug for Grammar<S> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Grammar")
      .field("start", &self.start)
      .field("rules", &self.rules)
      .finish()
  }
}

impl<S: Symbol> fmt::Display for Grammar<S> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "//** start: {}", self.start)?;
    write!(f, "//** nonterminals:")?;
    for nt in self.list_all_nonterminals() {
      write!(f, " {}", nt)?;
    }
    writeln!(f)?;

    for rule in self.rules.terminal.iter() {
      writeln!(f, "{}", rule)?;
    }
    for rule in self.rules.nonterminal.iter() {
      writeln!(f, "{}", rule)?;
    }
    for rule in self.rules.alias.iter() {
      writeln!(f, "{}", rule)?;
    }

    Ok(())
  }
}
