//! A generic context-free-grammar engine: a compiler from a line-oriented
//! rule syntax into three normalized rule shapes (terminal, binary, alias),
//! a CYK chart recognizer/parser with optional pre-seeded entries, an
//! ambiguity-preserving parse forest expressed as a grammar over span-tagged
//! symbols, and lazy derivation enumeration with bottom-up semantic
//! evaluation.
//!
//! ```
//! use quickgram::{Grammar, Sym};
//!
//! let g: Grammar<Sym> = r#"
//!   _np -> the _noun
//!   _noun -> cat;fish;dog
//! "#
//! .parse()
//! .unwrap();
//!
//! assert!(g.recognise(&Sym::terminals("the cat")));
//!
//! let forest = g.parse(&Sym::terminals("the fish"));
//! let tree = forest.trees().next().unwrap();
//! assert_eq!(tree.evaluate().as_token(), Some("fish"));
//! ```

#[macro_use]
extern crate lazy_static;

pub mod cyk;
pub mod derivations;
pub mod error;
pub mod forest;
pub mod grammar;
pub mod index;
pub mod quick;
pub mod rules;
pub mod symbol;
pub mod tree;

pub use crate::cyk::{Chart, SeedEntry};
pub use crate::error::GrammarError;
pub use crate::forest::Forest;
pub use crate::grammar::Grammar;
pub use crate::index::IndexedGrammar;
pub use crate::quick::{
  expand_rule, expand_source, quick_grammar, quick_grammar_with_start, GrammarPart, QuickAction,
};
pub use crate::rules::{AliasRule, NonterminalRule, RuleSet, TermAction, TerminalRule, Value};
pub use crate::symbol::{Spanned, Sym, Symbol, SymbolFactory};
pub use crate::tree::{SynTree, Tree};

#[cfg(test)]
mod tests {
  use std::rc::Rc;

  use super::*;

  #[test]
  fn test_noun_phrase_grammar_surface() {
    let g: Grammar<Sym> = r#"
      _np -> the _noun
      _noun -> cat;fish;dog
    "#
    .parse()
    .unwrap();

    assert!(g.number_of_rules() > 0);
    let all = g.list_all_nonterminals();
    assert!(all.contains(&Sym::nonterminal("_np")));
    assert!(all.contains(&Sym::nonterminal("_noun")));
    assert!(g.list_top_nonterminals().contains(&Sym::nonterminal("_np")));
  }

  #[test]
  fn test_recognition_parse_and_trees_are_consistent() {
    let g: Grammar<Sym> = r#"
      _np -> the _adjective _noun
      _np -> the _noun
      _noun -> mackeral;cod;salmon
      _adjective -> big;small;fluffy;austere
    "#
    .parse()
    .unwrap();

    let inputs = [
      "the salmon",
      "the fluffy mackeral",
      "the austere cod",
      "the red herring",
      "mackeral the",
      "",
    ];

    for input in inputs {
      let tokens = Sym::terminals(input);
      let recognised = g.recognise(&tokens);
      let tree_count = g.parse(&tokens).trees().count();
      assert_eq!(recognised, tree_count > 0, "inconsistent on {:?}", input);
    }
  }

  #[test]
  fn test_every_tree_evaluates() {
    let g: Grammar<Sym> = r#"
      _np -> the _adjective _noun
      _np -> the _noun
      _noun -> mackeral;cod;salmon
      _adjective -> big;small;fluffy;austere
    "#
    .parse()
    .unwrap();

    let forest = g.parse(&Sym::terminals("the fluffy mackeral"));
    let mut seen = 0;
    for tree in forest.trees() {
      let value = tree.evaluate();
      assert_ne!(value, Value::Seq(Vec::new()));
      seen += 1;
    }
    assert!(seen > 0);
  }

  #[test]
  fn test_custom_actions_flow_through_parse() {
    #[derive(Debug, PartialEq)]
    struct NounPhrase {
      noun: String,
    }

    let factory = SymbolFactory::new();
    let g = quick_grammar(
      &factory,
      vec![
        GrammarPart::Actions(vec![(
          "_np -> the _noun".to_string(),
          Rc::new(|mut values: Vec<Value>| {
            let noun = values.remove(0).as_token().unwrap_or_default().to_string();
            Value::custom(NounPhrase { noun })
          }) as QuickAction,
        )]),
        GrammarPart::Source("_noun -> cat;fish".to_string()),
      ],
    )
    .unwrap();

    let forest = g.parse(&Sym::terminals("the fish"));
    let tree = forest.trees().next().unwrap();
    let value = tree.evaluate();
    assert_eq!(
      value.downcast::<NounPhrase>(),
      Some(&NounPhrase {
        noun: "fish".to_string()
      })
    );
  }

  #[test]
  fn test_seeded_parse_evaluates_through_seed_action() {
    let g: Grammar<Sym> = "_s -> _noun _verb".parse().unwrap();
    let tokens = Sym::terminals("fish swims");

    let seeds = vec![
      SeedEntry::new(0, 1, Sym::nonterminal("_noun")),
      SeedEntry::with_action(
        1,
        2,
        Sym::nonterminal("_verb"),
        Rc::new(|t: &Sym| Value::Token(format!("verb:{}", t))),
      ),
    ];

    let forest = g.parse_with(&tokens, &seeds);
    let tree = forest.trees().next().unwrap();
    assert_eq!(
      tree.evaluate(),
      Value::Seq(vec![
        Value::Token("fish".to_string()),
        Value::Token("verb:swims".to_string()),
      ])
    );
  }
}
