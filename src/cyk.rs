use std::collections::{HashMap, HashSet};
use std::fmt;

use tracing::{debug, trace};

use crate::forest::{Forest, ForestBuilder};
use crate::grammar::Grammar;
use crate::rules::TermAction;
use crate::symbol::Symbol;

/// The dynamic-programming table: `(from, symbol, to)` triples meaning
/// "symbol spans the token range [from, to)". Entries are discovered
/// bottom-up by span length; alias closure is applied eagerly on insertion.
pub struct Chart<S> {
  n: usize,
  cells: HashMap<(usize, usize), SpanCell<S>>,
  order: Vec<(usize, S, usize)>,
}

struct SpanCell<S> {
  list: Vec<S>,
  set: HashSet<S>,
}

impl<S> SpanCell<S> {
  fn new() -> Self {
    Self {
      list: Vec::new(),
      set: HashSet::new(),
    }
  }
}

impl<S: Symbol> Chart<S> {
  pub fn new(n: usize) -> Self {
    Self {
      n,
      cells: HashMap::new(),
      order: Vec::new(),
    }
  }

  /// Length of the parsed token sequence.
  pub fn input_len(&self) -> usize {
    self.n
  }

  pub fn entry_count(&self) -> usize {
    self.order.len()
  }

  pub fn has(&self, from: usize, sym: &S, to: usize) -> bool {
    self
      .cells
      .get(&(from, to))
      .map_or(false, |cell| cell.set.contains(sym))
  }

  /// All symbols spanning [from, to), in discovery order.
  pub fn symbols_at(&self, from: usize, to: usize) -> &[S] {
    self
      .cells
      .get(&(from, to))
      .map_or(&[][..], |cell| &cell.list)
  }

  /// Inserts an entry; returns false if it was already present.
  pub fn add(&mut self, from: usize, sym: S, to: usize) -> bool {
    let cell = self.cells.entry((from, to)).or_insert_with(SpanCell::new);
    if cell.set.insert(sym.clone()) {
      trace!(from, to, sym = %sym, "chart insert");
      cell.list.push(sym.clone());
      self.order.push((from, sym, to));
      true
    } else {
      false
    }
  }

  /// Entries in discovery order.
  pub fn entries(&self) -> impl Iterator<Item = &(usize, S, usize)> {
    self.order.iter()
  }
}

impl<S: Symbol> fmt::Display for Chart<S> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (from, sym, to) in self.order.iter() {
      writeln!(f, "{}..{}: {}", from, to, sym)?;
    }
    Ok(())
  }
}

/// An externally computed chart entry, spliced in before grammar rules run:
/// `sym` spans [from, to). Used to feed a parse with tags computed outside
/// the grammar, e.g. part-of-speech assignments. When `action` is omitted
/// the spanned node evaluates to the raw token.
pub struct SeedEntry<S> {
  pub from: usize,
  pub to: usize,
  pub sym: S,
  pub action: Option<TermAction<S>>,
}

impl<S> SeedEntry<S> {
  pub fn new(from: usize, to: usize, sym: S) -> Self {
    Self {
      from,
      to,
      sym,
      action: None,
    }
  }

  pub fn with_action(from: usize, to: usize, sym: S, action: TermAction<S>) -> Self {
    Self {
      from,
      to,
      sym,
      action: Some(action),
    }
  }
}

/// CYK chart construction. When a forest builder is supplied, every chart
/// justification (rule applied over a span, at a split) also records a
/// span-tagged production, preserving ambiguity.
pub(crate) fn build_chart<S: Symbol>(
  g: &Grammar<S>,
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
      close_aliases(g, &mut chart, forest.as_deref_mut(), seed.from, seed.to, &seed.sym);
    }
  }

  for j in 1..=n {
    let token = &tokens[j - 1];

    for rule in g.rules.terminal.iter() {
      if rule.body == *token {
        if let Some(fb) = forest.as_deref_mut() {
          fb.add_terminal(rule, j - 1, j);
        }
        if chart.add(j - 1, rule.head.clone(), j) {
          close_aliases(g, &mut chart, forest.as_deref_mut(), j - 1, j, &rule.head);
        }
      }
    }

    for i in (0..j.saturating_sub(1)).rev() {
      for k in i + 1..j {
        for rule in g.rules.nonterminal.iter() {
          if chart.has(i, &rule.body.0, k) && chart.has(k, &rule.body.1, j) {
            if let Some(fb) = forest.as_deref_mut() {
              fb.add_binary(rule, i, k, j);
            }
            if chart.add(i, rule.head.clone(), j) {
              close_aliases(g, &mut chart, forest.as_deref_mut(), i, j, &rule.head);
            }
          }
        }
      }
    }
  }

  chart
}

/// Transitive alias closure: whenever `(i, B, j)` is newly known, every alias
/// rule `H -> B` contributes `(i, H, j)` too.
fn close_aliases<S: Symbol>(
  g: &Grammar<S>,
  chart: &mut Chart<S>,
  mut forest: Option<&mut ForestBuilder<S>>,
  from: usize,
  to: usize,
  newly: &S,
) {
  let mut stack = vec![newly.clone()];
  while let Some(body) = stack.pop() {
    for rule in g.rules.alias.iter() {
      if rule.body == body {
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

impl<S: Symbol> Grammar<S> {
  /// True iff the token sequence derives from the starting symbol. Failure
  /// is the ordinary negative result, not an error.
  pub fn recognise(&self, tokens: &[S]) -> bool {
    self.recognise_with(tokens, &[])
  }

  pub fn recognise_with(&self, tokens: &[S], seeds: &[SeedEntry<S>]) -> bool {
    let chart = build_chart(self, tokens, seeds, None);
    chart.has(0, &self.start, tokens.len())
  }

  /// Builds the chart without materializing a forest.
  pub fn parse_chart(&self, tokens: &[S], seeds: &[SeedEntry<S>]) -> Chart<S> {
    build_chart(self, tokens, seeds, None)
  }

  /// Parses into an ambiguity-preserving forest: a grammar over span-tagged
  /// symbols whose derivations are exactly the parses of `tokens`. A failed
  /// parse yields a forest with no derivations, not an error.
  pub fn parse(&self, tokens: &[S]) -> Forest<S> {
    self.parse_with(tokens, &[])
  }

  pub fn parse_with(&self, tokens: &[S], seeds: &[SeedEntry<S>]) -> Forest<S> {
    let mut builder = ForestBuilder::new();
    let chart = build_chart(self, tokens, seeds, Some(&mut builder));
    debug!(
      entries = chart.entry_count(),
      tokens = tokens.len(),
      "chart complete"
    );
    builder.build(self.start.clone(), tokens.len())
  }
}

#[cfg(test)]
mod tests {
  use std::rc::Rc;

  use super::*;
  use crate::rules::Value;
  use crate::symbol::Sym;

  fn fish_grammar() -> Grammar<Sym> {
    r#"
      _np -> the _adjective _noun
      _np -> the _noun
      _noun -> mackeral;cod;salmon
      _adjective -> big;small;fluffy;austere
    "#
    .parse()
    .unwrap()
  }

  #[test]
  fn test_recognition() {
    let g = fish_grammar();
    assert!(g.recognise(&Sym::terminals("the salmon")));
    assert!(g.recognise(&Sym::terminals("the fluffy mackeral")));
    assert!(g.recognise(&Sym::terminals("the austere cod")));
    assert!(!g.recognise(&Sym::terminals("the red herring")));
  }

  #[test]
  fn test_unmatched_tokens_are_silent() {
    let g = fish_grammar();
    assert!(!g.recognise(&Sym::terminals("quantum the salmon")));
    assert!(!g.recognise(&Sym::terminals("")));
  }

  #[test]
  fn test_alias_closure_is_transitive() {
    let g: Grammar<Sym> = r#"
      _a -> _b
      _b -> _c
      _c -> x
    "#
    .parse()
    .unwrap();

    let tokens = Sym::terminals("x");
    let chart = g.parse_chart(&tokens, &[]);
    assert!(chart.has(0, &Sym::nonterminal("_c"), 1));
    assert!(chart.has(0, &Sym::nonterminal("_b"), 1));
    assert!(chart.has(0, &Sym::nonterminal("_a"), 1));
  }

  #[test]
  fn test_empty_input_needs_zero_width_seed() {
    let g = fish_grammar();
    assert!(!g.recognise(&[]));

    let seed = SeedEntry::new(0, 0, Sym::nonterminal("_np"));
    assert!(g.recognise_with(&[], &[seed]));
  }

  #[test]
  fn test_seeded_tags_splice_into_parse() {
    // no terminal rules for _verb or _noun: the tags come from outside
    let g: Grammar<Sym> = "_s -> _noun _verb".parse().unwrap();
    let tokens = Sym::terminals("fish swims");
    assert!(!g.recognise(&tokens));

    let seeds = vec![
      SeedEntry::new(0, 1, Sym::nonterminal("_noun")),
      SeedEntry::with_action(
        1,
        2,
        Sym::nonterminal("_verb"),
        Rc::new(|t: &Sym| Value::token(t)),
      ),
    ];
    assert!(g.recognise_with(&tokens, &seeds));
  }

  #[test]
  fn test_ambiguous_parse_keeps_every_justification() {
    let g: Grammar<Sym> = r#"
      _s -> x ; _s _s
      _top -> _s
    "#
    .parse()
    .unwrap();

    let tokens = Sym::terminals("x x x");
    let chart = g.parse_chart(&tokens, &[]);
    // both splits of the full span are derivable
    assert!(chart.has(0, &Sym::nonterminal("_s"), 3));
    assert!(chart.has(0, &Sym::nonterminal("_s"), 2));
    assert!(chart.has(1, &Sym::nonterminal("_s"), 3));
  }
}
