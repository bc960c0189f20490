use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use tracing::debug;

use crate::cyk::{Chart, SeedEntry};
use crate::forest::{Forest, ForestBuilder};
use crate::grammar::Grammar;
use crate::rules::{AliasRule, NonterminalRule, TerminalRule};
use crate::symbol::Symbol;

/// A grammar with lookup indices over its rule collections, trading memory
/// for chart-construction speed: terminal rules keyed by their body token,
/// binary rules keyed by first then second child symbol, alias rules keyed
/// by their body. Indexing is a rebuildable cache, never a second source of
/// truth; recognition and parsing agree with the plain grammar on every
/// input.
pub struct IndexedGrammar<S> {
  grammar: Grammar<S>,
  by_terminal: HashMap<S, Vec<Rc<TerminalRule<S>>>>,
  by_children: HashMap<S, HashMap<S, Vec<Rc<NonterminalRule<S>>>>>,
  by_alias_body: HashMap<S, Vec<Rc<AliasRule<S>>>>,
}

impl<S: Symbol> IndexedGrammar<S> {
  pub fn new(grammar: Grammar<S>) -> Self {
    let mut indexed = Self {
      grammar,
      by_terminal: HashMap::new(),
      by_children: HashMap::new(),
      by_alias_body: HashMap::new(),
    };
    indexed.rebuild_indexes();
    indexed
  }

  /// Rebuilds the three maps from the owned rule collections.
  pub fn rebuild_indexes(&mut self) {
    self.by_terminal.clear();
    self.by_children.clear();
    self.by_alias_body.clear();

    for rule in self.grammar.rules.terminal.iter() {
      self
        .by_terminal
        .entry(rule.body.clone())
        .or_default()
        .push(Rc::clone(rule));
    }
    for rule in self.grammar.rules.nonterminal.iter() {
      self
        .by_children
        .entry(rule.body.0.clone())
        .or_default()
        .entry(rule.body.1.clone())
        .or_default()
        .push(Rc::clone(rule));
    }
    for rule in self.grammar.rules.alias.iter() {
      self
        .by_alias_body
        .entry(rule.body.clone())
        .or_default()
        .push(Rc::clone(rule));
    }

    debug!(
      terminals = self.by_terminal.len(),
      firsts = self.by_children.len(),
      aliases = self.by_alias_body.len(),
      "rebuilt grammar indexes"
    );
  }

  pub fn into_grammar(self) -> Grammar<S> {
    self.grammar
  }

  pub fn recognise(&self, tokens: &[S]) -> bool {
    self.recognise_with(tokens, &[])
  }

  pub fn recognise_with(&self, tokens: &[S], seeds: &[SeedEntry<S>]) -> bool {
    let chart = self.build_chart(tokens, seeds, None);
    chart.has(0, &self.grammar.start, tokens.len())
  }

  pub fn parse_chart(&self, tokens: &[S], seeds: &[SeedEntry<S>]) -> Chart<S> {
    self.build_chart(tokens, seeds, None)
  }

  pub fn parse(&self, tokens: &[S]) -> Forest<S> {
    self.parse_with(tokens, &[])
  }

  pub fn parse_with(&self, tokens: &[S], seeds: &[SeedEntry<S>]) -> Forest<S> {
    let mut builder = ForestBuilder::new();
    let chart = self.build_chart(tokens, seeds, Some(&mut builder));
    debug!(
      entries = chart.entry_count(),
      tokens = tokens.len(),
      "indexed chart complete"
    );
    builder.build(self.grammar.start.clone(), tokens.len())
  }

  /// Same discovery order as the plain CYK loop, with index lookups in place
  /// of rule scans: terminal and alias rules by key, and binary rules by the
  /// symbol pairs actually present in the two sub-spans.
  fn build_chart(
    &self,
    tokens: &[S],
    seeds: &[SeedEntry<S>],
    mut forest: Option<&mut ForestBuilder<S>>,
  ) -> Chart<S> {
    let n = tokens.len();
    let mut chart = Chart::new(n);

    for seed in seeds {
      if let Some(fb) = forest.as_deref_mut() {
        fb.add_seed(seed, tokens);
      }
      if chart.add(seed.from, seed.sym.clone(), seed.to) {
        self.close_aliases(&mut chart, forest.as_deref_mut(), seed.from, seed.to, &seed.sym);
      }
    }

    for j in 1..=n {
      let token = &tokens[j - 1];

      if let Some(rules) = self.by_terminal.get(token) {
        for rule in rules {
          if let Some(fb) = forest.as_deref_mut() {
            fb.add_terminal(rule, j - 1, j);
          }
          if chart.add(j - 1, rule.head.clone(), j) {
            self.close_aliases(&mut chart, forest.as_deref_mut(), j - 1, j, &rule.head);
          }
        }
      }

      for i in (0..j.saturating_sub(1)).rev() {
        for k in i + 1..j {
          // snapshots: insertions during this step only land at (i, j)
          let lefts = chart.symbols_at(i, k).to_vec();
          let rights = chart.symbols_at(k, j).to_vec();
          for left in lefts.iter() {
            let Some(seconds) = self.by_children.get(left) else {
              continue;
            };
            for right in rights.iter() {
              let Some(rules) = seconds.get(right) else {
                continue;
              };
              for rule in rules {
                if let Some(fb) = forest.as_deref_mut() {
                  fb.add_binary(rule, i, k, j);
                }
                if chart.add(i, rule.head.clone(), j) {
                  self.close_aliases(&mut chart, forest.as_deref_mut(), i, j, &rule.head);
                }
              }
            }
          }
        }
      }
    }

    chart
  }

  fn close_aliases(
    &self,
    chart: &mut Chart<S>,
    mut forest: Option<&mut ForestBuilder<S>>,
    from: usize,
    to: usize,
    newly: &S,
  ) {
    let mut stack = vec![newly.clone()];
    while let Some(body) = stack.pop() {
      if let Some(rules) = self.by_alias_body.get(&body) {
        for rule in rules {
          if let Some(fb) = forest.as_deref_mut() {
            fb.add_alias(rule, from, to);
          }
          if chart.add(from, rule.head.clone(), to) {
            stack.push(rule.head.clone());
          }
        }
      }
    }
  }
}

/// Everything else (enumeration, listings, random generation) is inherited
/// from the underlying grammar.
impl<S> Deref for IndexedGrammar<S> {
  type Target = Grammar<S>;

  fn deref(&self) -> &Grammar<S> {
    &self.grammar
  }
}

impl<S: Symbol> fmt::Debug for IndexedGrammar<S> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("IndexedGrammar")
      .field("grammar", &self.grammar)
      .finish()
  }
}
