use std::rc::Rc;

use crate::cyk::SeedEntry;
use crate::grammar::Grammar;
use crate::rules::{AliasRule, NonterminalRule, RuleSet, TermAction, TerminalRule, Value};
use crate::symbol::{Spanned, Symbol};
use crate::tree::Tree;

/// A parse forest is just a grammar over span-tagged symbols: its rules are
/// the chart derivations, its starting symbol is the original start spanned
/// over the whole input. Every grammar operation (enumeration, evaluation,
/// merging) applies to forests unchanged.
pub type Forest<S> = Grammar<Spanned<S>>;

impl<S: Symbol> Grammar<Spanned<S>> {
  /// Every parse tree of the forest, lazily.
  pub fn trees(&self) -> Box<dyn Iterator<Item = Tree<Spanned<S>>> + '_> {
    self.recursive_trees()
  }
}

fn spanned_term_action<S: Symbol>(orig: TermAction<S>) -> TermAction<Spanned<S>> {
  Rc::new(move |sp: &Spanned<S>| orig(&sp.sym))
}

/// Accumulates span-tagged rules as the chart discovers justifications. The
/// built forest owns fresh rule collections; it never aliases the source
/// grammar's storage.
pub(crate) struct ForestBuilder<S> {
  rules: RuleSet<Spanned<S>>,
}

impl<S: Symbol> ForestBuilder<S> {
  pub fn new() -> Self {
    Self {
      rules: RuleSet::new(),
    }
  }

  pub fn add_terminal(&mut self, rule: &Rc<TerminalRule<S>>, from: usize, to: usize) {
    self.rules.terminal.push(Rc::new(TerminalRule {
      head: Spanned::new(from, to, rule.head.clone()),
      body: Spanned::new(from, to, rule.body.clone()),
      action: spanned_term_action(rule.action.clone()),
    }));
  }

  pub fn add_binary(&mut self, rule: &Rc<NonterminalRule<S>>, from: usize, mid: usize, to: usize) {
    self.rules.nonterminal.push(Rc::new(NonterminalRule {
      head: Spanned::new(from, to, rule.head.clone()),
      body: (
        Spanned::new(from, mid, rule.body.0.clone()),
        Spanned::new(mid, to, rule.body.1.clone()),
      ),
      action: rule.action.clone(),
    }));
  }

  pub fn add_alias(&mut self, rule: &Rc<AliasRule<S>>, from: usize, to: usize) {
    self.rules.alias.push(Rc::new(AliasRule {
      head: Spanned::new(from, to, rule.head.clone()),
      body: Spanned::new(from, to, rule.body.clone()),
      action: rule.action.clone(),
    }));
  }

  /// A seed entry becomes a terminal rule over its first covered token; a
  /// zero-width seed reaches the chart but has no token to materialize.
  pub fn add_seed(&mut self, seed: &SeedEntry<S>, tokens: &[S]) {
    if seed.to <= seed.from {
      return;
    }
    let token = match tokens.get(seed.from) {
      Some(token) => token.clone(),
      None => return,
    };
    let action: TermAction<S> = match &seed.action {
      Some(action) => action.clone(),
      None => Rc::new(|t: &S| Value::token(t)),
    };
    self.rules.terminal.push(Rc::new(TerminalRule {
      head: Spanned::new(seed.from, seed.to, seed.sym.clone()),
      body: Spanned::new(seed.from, seed.to, token),
      action: spanned_term_action(action),
    }));
  }

  pub fn build(self, start: S, input_len: usize) -> Forest<S> {
    Grammar::from_parts(self.rules, Spanned::new(0, input_len, start))
  }
}
