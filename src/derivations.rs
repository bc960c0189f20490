use std::rc::Rc;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::GrammarError;
use crate::grammar::Grammar;
use crate::rules::{AliasRule, NonterminalRule, TerminalRule};
use crate::symbol::Symbol;
use crate::tree::{SynTree, Tree};

enum Applicable<'a, S> {
  Terminal(&'a Rc<TerminalRule<S>>),
  Binary(&'a Rc<NonterminalRule<S>>),
  Alias(&'a Rc<AliasRule<S>>),
}

impl<S: Symbol> Grammar<S> {
  /// Lazily enumerates every derivation of the starting symbol, depth-first:
  /// terminal rules first, then binary rules (right child in the outer loop,
  /// left child in the inner loop), then alias rules.
  ///
  /// There is no cycle detection: on a grammar whose nonterminal or alias
  /// rule graph is cyclic, draining this iterator does not terminate. Bound
  /// consumption (`take`) or use `bounded_trees`.
  pub fn recursive_trees(&self) -> Box<dyn Iterator<Item = Tree<S>> + '_> {
    self.trees_for(&self.start)
  }

  /// `recursive_trees` starting from an arbitrary symbol.
  pub fn trees_for<'g>(&'g self, sym: &S) -> Box<dyn Iterator<Item = Tree<S>> + 'g> {
    self.bounded_trees(sym, usize::MAX)
  }

  /// Derivations of `sym` nested at most `max_depth` rule applications deep.
  /// The explicit opt-in guard for cyclic grammars; terminates on any input.
  pub fn bounded_trees<'g>(&'g self, sym: &S, max_depth: usize) -> Box<dyn Iterator<Item = Tree<S>> + 'g> {
    if max_depth == 0 {
      return Box::new(std::iter::empty());
    }
    let remaining = max_depth - 1;

    let wanted = sym.clone();
    let terminals = self
      .rules
      .terminal
      .iter()
      .filter(move |r| r.head == wanted)
      .map(|r| Tree::Terminal {
        rule: Rc::clone(r),
        token: r.body.clone(),
      });

    let wanted = sym.clone();
    let branches = self
      .rules
      .nonterminal
      .iter()
      .filter(move |r| r.head == wanted)
      .flat_map(move |r| {
        let rule = Rc::clone(r);
        self
          .bounded_trees(&rule.body.1, remaining)
          .flat_map(move |right| {
            let rule = Rc::clone(&rule);
            self
              .bounded_trees(&rule.body.0, remaining)
              .map(move |left| Tree::Branch {
                rule: Rc::clone(&rule),
                left: Box::new(left),
                right: Box::new(right.clone()),
              })
          })
      });

    let wanted = sym.clone();
    let aliases = self
      .rules
      .alias
      .iter()
      .filter(move |r| r.head == wanted)
      .flat_map(move |r| {
        let rule = Rc::clone(r);
        self.bounded_trees(&rule.body, remaining).map(move |child| {
          Tree::Alias {
            rule: Rc::clone(&rule),
            child: Box::new(child),
          }
        })
      });

    Box::new(terminals.chain(branches).chain(aliases))
  }

  /// The derivations as cleaned display trees (scaffolding spliced out).
  pub fn recursive_annotations(&self) -> Box<dyn Iterator<Item = SynTree<S>> + '_> {
    self.annotations_for(&self.start)
  }

  pub fn annotations_for<'g>(&'g self, sym: &S) -> Box<dyn Iterator<Item = SynTree<S>> + 'g> {
    Box::new(self.trees_for(sym).map(|t| t.display_tree()))
  }

  /// The derivations as flat terminal-token sequences.
  pub fn recursive_substitutions(&self) -> Box<dyn Iterator<Item = Vec<S>> + '_> {
    self.substitutions_for(&self.start)
  }

  pub fn substitutions_for<'g>(&'g self, sym: &S) -> Box<dyn Iterator<Item = Vec<S>> + 'g> {
    Box::new(self.trees_for(sym).map(|t| t.flatten()))
  }

  /// Generates one random token sequence derivable from the starting symbol.
  /// Each expansion step chooses uniformly among the rules applicable to the
  /// symbol (weighted by rule count, not by derivation count).
  pub fn random_substitution(&self) -> Result<Vec<S>, GrammarError> {
    self.random_substitution_for(&self.start)
  }

  pub fn random_substitution_for(&self, sym: &S) -> Result<Vec<S>, GrammarError> {
    let mut rng = rand::thread_rng();
    self.random_expand(sym, &mut rng)
  }

  fn random_expand<R: Rng>(&self, sym: &S, rng: &mut R) -> Result<Vec<S>, GrammarError> {
    let mut applicable = Vec::new();
    for r in self.rules.terminal.iter().filter(|r| r.head == *sym) {
      applicable.push(Applicable::Terminal(r));
    }
    for r in self.rules.nonterminal.iter().filter(|r| r.head == *sym) {
      applicable.push(Applicable::Binary(r));
    }
    for r in self.rules.alias.iter().filter(|r| r.head == *sym) {
      applicable.push(Applicable::Alias(r));
    }

    match applicable.choose(rng) {
      None => Err(GrammarError::NoSubstitution(sym.to_string())),
      Some(Applicable::Terminal(r)) => Ok(vec![r.body.clone()]),
      Some(Applicable::Binary(r)) => {
        let mut out = self.random_expand(&r.body.0, rng)?;
        out.extend(self.random_expand(&r.body.1, rng)?);
        Ok(out)
      }
      Some(Applicable::Alias(r)) => self.random_expand(&r.body, rng),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::quick::{quick_grammar_with_start, GrammarPart};
  use crate::symbol::{Sym, SymbolFactory};

  fn ambiguous_grammar() -> Grammar<Sym> {
    r#"
      _top -> _s
      _s -> x ; _s _s
    "#
    .parse()
    .unwrap()
  }

  #[test]
  fn test_terminal_derivations_come_first() {
    let g = ambiguous_grammar();
    let first = g.trees_for(&Sym::nonterminal("_s")).next().unwrap();
    assert!(first.is_leaf());
  }

  #[test]
  fn test_flatten_round_trip() {
    let g = ambiguous_grammar();
    for tree in g.recursive_trees().take(12) {
      let tokens = tree.flatten();
      assert!(!tokens.is_empty());
      assert!(g.recognise(&tokens), "generated {:?}", tokens);
    }
  }

  #[test]
  fn test_substitutions_match_trees() {
    let g = ambiguous_grammar();
    let subs = g.recursive_substitutions().take(5).collect::<Vec<_>>();
    let trees = g.recursive_trees().take(5).collect::<Vec<_>>();
    for (sub, tree) in subs.iter().zip(trees.iter()) {
      assert_eq!(*sub, tree.flatten());
    }
  }

  #[test]
  fn test_bounded_enumeration_terminates_on_cyclic_grammar() {
    let factory = SymbolFactory::new();
    // _a aliases itself through _b; unbounded enumeration of the alias arm
    // would never return
    let g = quick_grammar_with_start(
      &factory,
      vec![GrammarPart::Source("_a -> x ; _b\n_b -> _a".to_string())],
      Some(Sym::nonterminal("_a")),
    )
    .unwrap();

    let bounded = g
      .bounded_trees(&Sym::nonterminal("_a"), 6)
      .collect::<Vec<_>>();
    assert!(!bounded.is_empty());
    for tree in bounded {
      assert_eq!(tree.flatten(), vec![Sym::terminal("x")]);
    }
  }

  #[test]
  fn test_random_substitution_recognises() {
    let g = ambiguous_grammar();
    for _ in 0..20 {
      let tokens = g.random_substitution().unwrap();
      assert!(g.recognise(&tokens));
    }
  }

  #[test]
  fn test_random_substitution_without_rules_fails() {
    let g = ambiguous_grammar();
    let err = g
      .random_substitution_for(&Sym::nonterminal("_missing"))
      .unwrap_err();
    assert!(matches!(err, GrammarError::NoSubstitution(_)));
  }
}
