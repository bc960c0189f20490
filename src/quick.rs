use regex::Regex;
use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::str::FromStr;

use tracing::debug;

use crate::error::GrammarError;
use crate::grammar::Grammar;
use crate::rules::{AliasRule, NonterminalRule, RuleSet, TerminalRule, Value};
use crate::symbol::{Sym, Symbol, SymbolFactory, NONTERMINAL_MARKER};

/// A user-supplied semantic action for one rule alternative. Receives the
/// evaluated child values in original left-to-right order; scaffolding
/// children lifted out of the body never appear in the argument list.
pub type QuickAction = Rc<dyn Fn(Vec<Value>) -> Value>;

/// One input to `quick_grammar`, merged in order.
pub enum GrammarPart {
  /// Rule source text, expanded with default actions.
  Source(String),
  /// Rule source lines, each paired with the semantic action attached to
  /// every alternative on that line.
  Actions(Vec<(String, QuickAction)>),
  /// An existing grammar whose rules are copied in verbatim.
  Grammar(Grammar<Sym>),
}

/// helper macro for initializing a regex with lazy_static!
macro_rules! regex_static {
  ($name:ident, $pattern:expr) => {
    lazy_static! {
      static ref $name: Regex = Regex::new($pattern).unwrap();
    }
  };
}

/// The default action: a single child passes through, several children
/// collect into a `Seq`.
fn default_action() -> QuickAction {
  Rc::new(|mut values: Vec<Value>| {
    if values.len() == 1 {
      values.pop().unwrap()
    } else {
      Value::Seq(values)
    }
  })
}

fn token_action() -> Rc<dyn Fn(&Sym) -> Value> {
  Rc::new(|t: &Sym| Value::token(t))
}

/// Lifts an embedded terminal out of a rule body: mints a scaffolding
/// nonterminal, binds it to the terminal with a single-use rule, and reports
/// whether the original symbol contributes a semantic argument.
fn lift(
  factory: &SymbolFactory,
  out: &mut RuleSet<Sym>,
  sym: Sym,
) -> Result<(Sym, bool), GrammarError> {
  if sym.is_terminal() {
    let fresh = factory.fresh();
    out
      .terminal
      .push(Rc::new(TerminalRule::new(fresh.clone(), sym, token_action())?));
    Ok((fresh, false))
  } else {
    Ok((sym, true))
  }
}

/// Desugars one production `head -> body...` into the three canonical rule
/// shapes, synthesizing scaffolding symbols for embedded terminals and for
/// the right-leaning chain that binarizes long bodies.
///
/// Evaluating a tree built from the result applies `action` to exactly the
/// non-scaffolding children's values, in original order; flattening it
/// reproduces the original token sequence.
pub fn expand_rule(
  factory: &SymbolFactory,
  head: Sym,
  body: Vec<Sym>,
  action: Option<QuickAction>,
) -> Result<RuleSet<Sym>, GrammarError> {
  if head.is_terminal() {
    return Err(GrammarError::TerminalHead(head.to_string()));
  }

  let action = action.unwrap_or_else(default_action);
  let mut out = RuleSet::new();

  match body.len() {
    0 => return Err(GrammarError::EmptyBody(head.to_string())),
    1 => {
      let sym = body.into_iter().next().unwrap();
      if sym.is_terminal() {
        let act = action;
        out.terminal.push(Rc::new(TerminalRule::new(
          head,
          sym,
          Rc::new(move |t: &Sym| act(vec![Value::token(t)])),
        )?));
      } else {
        let act = action;
        out.alias.push(Rc::new(AliasRule::new(
          head,
          sym,
          Rc::new(move |v| act(vec![v])),
        )?));
      }
    }
    2 => {
      let mut it = body.into_iter();
      let (first, second) = (it.next().unwrap(), it.next().unwrap());
      let (left, keep_left) = lift(factory, &mut out, first)?;
      let (right, keep_right) = lift(factory, &mut out, second)?;
      let act = action;
      out.nonterminal.push(Rc::new(NonterminalRule::new(
        head,
        (left, right),
        Rc::new(move |a, b| {
          let mut args = Vec::new();
          if keep_left {
            args.push(a);
          }
          if keep_right {
            args.push(b);
          }
          act(args)
        }),
      )?));
    }
    n => {
      let mut children = Vec::with_capacity(n);
      let mut keep = Vec::with_capacity(n);
      for sym in body {
        let (child, kept) = lift(factory, &mut out, sym)?;
        children.push(child);
        keep.push(kept);
      }

      // right-leaning chain: the last two children form the innermost pair,
      // each link prepends its left child onto the accumulated sequence
      let innermost = factory.fresh();
      out.nonterminal.push(Rc::new(NonterminalRule::new(
        innermost.clone(),
        (children[n - 2].clone(), children[n - 1].clone()),
        Rc::new(|a, b| Value::Seq(vec![a, b])),
      )?));

      let mut rest = innermost;
      for idx in (1..n - 2).rev() {
        let link = factory.fresh();
        out.nonterminal.push(Rc::new(NonterminalRule::new(
          link.clone(),
          (children[idx].clone(), rest),
          Rc::new(|a, b| {
            let mut items = b.into_items();
            items.insert(0, a);
            Value::Seq(items)
          }),
        )?));
        rest = link;
      }

      let act = action;
      let mask = keep;
      out.nonterminal.push(Rc::new(NonterminalRule::new(
        head,
        (children[0].clone(), rest),
        Rc::new(move |a, b| {
          let mut all = vec![a];
          all.extend(b.into_items());
          let args = all
            .into_iter()
            .zip(mask.iter())
            .filter_map(|(v, kept)| if *kept { Some(v) } else { None })
            .collect();
          act(args)
        }),
      )?));
    }
  }

  Ok(out)
}

fn parse_symbol(name: &str, line: usize) -> Result<Sym, GrammarError> {
  regex_static!(SYMBOL, r"^[a-zA-Z0-9\-_']+$");
  if !SYMBOL.is_match(name) {
    return Err(GrammarError::Syntax {
      line,
      message: format!("invalid symbol {:?}", name),
    });
  }
  Ok(Sym::from_source(name))
}

fn expand_line(
  factory: &SymbolFactory,
  line: &str,
  lineno: usize,
  action: Option<QuickAction>,
) -> Result<RuleSet<Sym>, GrammarError> {
  let mut parts = line.split("->");
  let (lhs, rhs) = match (parts.next(), parts.next(), parts.next()) {
    (Some(lhs), Some(rhs), None) => (lhs.trim(), rhs.trim()),
    (_, None, _) => {
      return Err(GrammarError::Syntax {
        line: lineno,
        message: format!("missing '->' in {:?}", line),
      });
    }
    _ => {
      return Err(GrammarError::Syntax {
        line: lineno,
        message: format!("more than one '->' in {:?}", line),
      });
    }
  };

  let head = parse_symbol(lhs, lineno)?;
  if head.is_terminal() {
    return Err(GrammarError::Syntax {
      line: lineno,
      message: format!(
        "rule head must start with {:?}, got {:?}",
        NONTERMINAL_MARKER, lhs
      ),
    });
  }

  let mut out = RuleSet::new();
  for alt in rhs.split([';', '|']) {
    let symbols = alt
      .split_whitespace()
      .map(|name| parse_symbol(name, lineno))
      .collect::<Result<Vec<_>, _>>()?;
    out.extend(expand_rule(factory, head.clone(), symbols, action.clone())?);
  }

  debug!(rule = line, "expanded rule");
  Ok(out)
}

fn expand_source_with(
  factory: &SymbolFactory,
  src: &str,
  action: Option<&QuickAction>,
) -> Result<RuleSet<Sym>, GrammarError> {
  let mut out = RuleSet::new();
  for (idx, raw) in src.lines().enumerate() {
    let line = raw.trim();
    if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
      continue;
    }
    out.extend(expand_line(factory, line, idx + 1, action.cloned())?);
  }
  Ok(out)
}

/// Expands grammar source text: one rule per line, alternatives split on `;`
/// or `|`, blank lines and `#`/`//` comment lines ignored.
pub fn expand_source(factory: &SymbolFactory, src: &str) -> Result<RuleSet<Sym>, GrammarError> {
  expand_source_with(factory, src, None)
}

/// Merges rule sources into one grammar, in order, without deduplication.
/// The starting symbol is inferred; use `quick_grammar_with_start` to pin it.
pub fn quick_grammar(
  factory: &SymbolFactory,
  parts: Vec<GrammarPart>,
) -> Result<Grammar<Sym>, GrammarError> {
  quick_grammar_with_start(factory, parts, None)
}

pub fn quick_grammar_with_start(
  factory: &SymbolFactory,
  parts: Vec<GrammarPart>,
  start: Option<Sym>,
) -> Result<Grammar<Sym>, GrammarError> {
  let mut rules = RuleSet::new();
  for part in parts {
    match part {
      GrammarPart::Source(src) => rules.extend(expand_source(factory, &src)?),
      GrammarPart::Actions(entries) => {
        for (src, action) in entries {
          rules.extend(expand_source_with(factory, &src, Some(&action))?);
        }
      }
      GrammarPart::Grammar(g) => rules.extend(g.rules),
    }
  }

  if rules.is_empty() {
    return Err(GrammarError::EmptyRuleset);
  }
  Grammar::new(rules, start)
}

impl FromStr for Grammar<Sym> {
  type Err = GrammarError;

  /// Parses a grammar from rule source text. The starting symbol is the
  /// unique nonterminal that appears in no rule body.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let factory = SymbolFactory::new();
    let rules = expand_source(&factory, s)?;
    if rules.is_empty() {
      return Err(GrammarError::EmptyRuleset);
    }
    Grammar::new(rules, None)
  }
}

impl Grammar<Sym> {
  pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, GrammarError> {
    fs::read_to_string(path)?.parse()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_single_terminal_expands_to_terminal_rule() {
    let factory = SymbolFactory::new();
    let rules = expand_rule(
      &factory,
      Sym::nonterminal("_noun"),
      vec![Sym::terminal("cat")],
      None,
    )
    .unwrap();
    assert_eq!(rules.terminal.len(), 1);
    assert_eq!(rules.nonterminal.len(), 0);
    assert_eq!(rules.alias.len(), 0);
  }

  #[test]
  fn test_single_nonterminal_expands_to_alias() {
    let factory = SymbolFactory::new();
    let rules = expand_rule(
      &factory,
      Sym::nonterminal("_np"),
      vec![Sym::nonterminal("_noun")],
      None,
    )
    .unwrap();
    assert_eq!(rules.alias.len(), 1);
    assert_eq!(rules.alias[0].body, Sym::nonterminal("_noun"));
  }

  #[test]
  fn test_empty_body_rejected() {
    let factory = SymbolFactory::new();
    let rules = expand_rule(&factory, Sym::nonterminal("_np"), Vec::new(), None);
    assert!(matches!(rules, Err(GrammarError::EmptyBody(_))));
  }

  #[test]
  fn test_binary_with_embedded_terminal() {
    let factory = SymbolFactory::new();
    let rules = expand_rule(
      &factory,
      Sym::nonterminal("_np"),
      vec![Sym::terminal("the"), Sym::nonterminal("_noun")],
      None,
    )
    .unwrap();
    // one scaffolding terminal rule plus the binary rule
    assert_eq!(rules.terminal.len(), 1);
    assert_eq!(rules.nonterminal.len(), 1);
    assert!(rules.terminal[0].head.is_hidden());
    assert_eq!(rules.nonterminal[0].body.0, rules.terminal[0].head);
    assert_eq!(rules.nonterminal[0].body.1, Sym::nonterminal("_noun"));
  }

  #[test]
  fn test_long_body_builds_right_leaning_chain() {
    let factory = SymbolFactory::new();
    let rules = expand_rule(
      &factory,
      Sym::nonterminal("_np"),
      vec![
        Sym::terminal("the"),
        Sym::nonterminal("_adjective"),
        Sym::nonterminal("_noun"),
      ],
      None,
    )
    .unwrap();
    // lifted "the" plus two binary rules: head and the innermost pair
    assert_eq!(rules.terminal.len(), 1);
    assert_eq!(rules.nonterminal.len(), 2);

    let head_rule = rules
      .nonterminal
      .iter()
      .find(|r| r.head == Sym::nonterminal("_np"))
      .unwrap();
    let chain_rule = rules
      .nonterminal
      .iter()
      .find(|r| r.head.is_hidden())
      .unwrap();
    assert_eq!(head_rule.body.1, chain_rule.head);
    assert_eq!(
      chain_rule.body,
      (Sym::nonterminal("_adjective"), Sym::nonterminal("_noun"))
    );
  }

  #[test]
  fn test_source_with_comments_and_alternatives() {
    let factory = SymbolFactory::new();
    let rules = expand_source(
      &factory,
      r#"
        # noun phrases
        _np -> the _noun
        // three nouns
        _noun -> cat;fish | dog
      "#,
    )
    .unwrap();
    // _np: scaffold + binary; _noun: three terminal rules
    assert_eq!(rules.terminal.len(), 4);
    assert_eq!(rules.nonterminal.len(), 1);
  }

  #[test]
  fn test_missing_arrow_rejected() {
    let factory = SymbolFactory::new();
    let err = expand_source(&factory, "_np the _noun").unwrap_err();
    assert!(matches!(err, GrammarError::Syntax { line: 1, .. }));
  }

  #[test]
  fn test_double_arrow_rejected() {
    let factory = SymbolFactory::new();
    let err = expand_source(&factory, "_np -> the -> _noun").unwrap_err();
    assert!(matches!(err, GrammarError::Syntax { .. }));
  }

  #[test]
  fn test_terminal_head_rejected() {
    let factory = SymbolFactory::new();
    let err = expand_source(&factory, "np -> the _noun").unwrap_err();
    assert!(matches!(err, GrammarError::Syntax { .. }));
  }

  #[test]
  fn test_empty_alternative_rejected() {
    let factory = SymbolFactory::new();
    let err = expand_source(&factory, "_noun -> cat;;dog").unwrap_err();
    assert!(matches!(err, GrammarError::EmptyBody(_)));
  }

  #[test]
  fn test_from_str_rejects_empty_source() {
    let g = "# only a comment\n".parse::<Grammar<Sym>>();
    assert!(matches!(g, Err(GrammarError::EmptyRuleset)));
  }

  #[test]
  fn test_quick_grammar_merges_sources() {
    let factory = SymbolFactory::new();
    let nouns = quick_grammar_with_start(
      &factory,
      vec![GrammarPart::Source("_noun -> cat;fish".to_string())],
      Some(Sym::nonterminal("_noun")),
    )
    .unwrap();

    let g = quick_grammar(
      &factory,
      vec![
        GrammarPart::Source("_np -> the _noun".to_string()),
        GrammarPart::Grammar(nouns),
      ],
    )
    .unwrap();

    assert_eq!(g.start(), &Sym::nonterminal("_np"));
    // merged verbatim: 1 scaffold + 2 nouns terminal, 1 binary
    assert_eq!(g.number_of_rules(), 4);
    g.assert_no_duplicate_rules().unwrap();
  }
}
