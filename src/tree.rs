use std::fmt;
use std::rc::Rc;

use crate::rules::{AliasRule, NonterminalRule, TerminalRule, Value};
use crate::symbol::Symbol;

/// One derivation, mirroring the three rule shapes. Trees are produced
/// lazily by enumeration, consumed by evaluation or display conversion, and
/// never retained by the engine.
pub enum Tree<S> {
  Terminal {
    rule: Rc<TerminalRule<S>>,
    token: S,
  },
  Branch {
    rule: Rc<NonterminalRule<S>>,
    left: Box<Tree<S>>,
    right: Box<Tree<S>>,
  },
  Alias {
    rule: Rc<AliasRule<S>>,
    child: Box<Tree<S>>,
  },
}

impl<S: Symbol> Tree<S> {
  pub fn head(&self) -> &S {
    match self {
      Self::Terminal { rule, .. } => &rule.head,
      Self::Branch { rule, .. } => &rule.head,
      Self::Alias { rule, .. } => &rule.head,
    }
  }

  pub fn is_leaf(&self) -> bool {
    matches!(self, Self::Terminal { .. })
  }

  /// Pure bottom-up fold: evaluates children, then applies the node rule's
  /// semantic action. The tree is not mutated.
  pub fn evaluate(&self) -> Value {
    match self {
      Self::Terminal { rule, token } => (rule.action)(token),
      Self::Branch { rule, left, right } => (rule.action)(left.evaluate(), right.evaluate()),
      Self::Alias { rule, child } => (rule.action)(child.evaluate()),
    }
  }

  /// The terminal tokens of the derivation, left to right.
  pub fn flatten(&self) -> Vec<S> {
    let mut out = Vec::new();
    self.flatten_into(&mut out);
    out
  }

  fn flatten_into(&self, out: &mut Vec<S>) {
    match self {
      Self::Terminal { token, .. } => out.push(token.clone()),
      Self::Branch { left, right, .. } => {
        left.flatten_into(out);
        right.flatten_into(out);
      }
      Self::Alias { child, .. } => child.flatten_into(out),
    }
  }

  /// Converts to an n-ary display tree, keeping every node.
  pub fn to_syntree(&self) -> SynTree<S> {
    match self {
      Self::Terminal { rule, token } => {
        SynTree::Branch(rule.head.clone(), vec![SynTree::Leaf(token.clone())])
      }
      Self::Branch { rule, left, right } => SynTree::Branch(
        rule.head.clone(),
        vec![left.to_syntree(), right.to_syntree()],
      ),
      Self::Alias { rule, child } => SynTree::Branch(rule.head.clone(), vec![child.to_syntree()]),
    }
  }

  /// The human-readable display tree: scaffolding symbols introduced by rule
  /// expansion are spliced out.
  pub fn display_tree(&self) -> SynTree<S> {
    self.to_syntree().clean_hidden()
  }
}

impl<S: Symbol> Clone for Tree<S> {
  fn clone(&self) -> Self {
    match self {
      Self::Terminal { rule, token } => Self::Terminal {
        rule: rule.clone(),
        token: token.clone(),
      },
      Self::Branch { rule, left, right } => Self::Branch {
        rule: rule.clone(),
        left: left.clone(),
        right: right.clone(),
      },
      Self::Alias { rule, child } => Self::Alias {
        rule: rule.clone(),
        child: child.clone(),
      },
    }
  }
}

impl<S: Symbol> fmt::Display for Tree<S> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.display_tree())
  }
}

impl<S: Symbol> fmt::Debug for Tree<S> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.to_syntree())
  }
}

/// An n-ary tree for display and traversal. Cleanup passes operate here so
/// hidden nodes' children can be spliced into the parent's child list;
/// grammar rule storage is never touched.
#[derive(Debug, Clone, PartialEq)]
pub enum SynTree<S> {
  Branch(S, Vec<SynTree<S>>),
  Leaf(S),
}

impl<S> SynTree<S> {
  pub fn is_leaf(&self) -> bool {
    matches!(self, Self::Leaf(_))
  }

  pub fn get_branch(&self) -> Option<(&S, &Vec<SynTree<S>>)> {
    match self {
      Self::Branch(head, children) => Some((head, children)),
      _ => None,
    }
  }

  pub fn get_leaf(&self) -> Option<&S> {
    match self {
      Self::Leaf(sym) => Some(sym),
      _ => None,
    }
  }
}

impl<S: Symbol> SynTree<S> {
  /// Removes hidden branches by splicing their children into the parent.
  /// Idempotent; an already-clean tree comes back unchanged.
  pub fn clean_hidden(self) -> Self {
    self.clean_hidden_with(&|sym: &S| sym.is_hidden())
  }

  /// Like `clean_hidden` with a caller-supplied notion of hiddenness.
  pub fn clean_hidden_with(self, is_hidden: &dyn Fn(&S) -> bool) -> Self {
    match self {
      Self::Leaf(sym) => Self::Leaf(sym),
      Self::Branch(head, children) => {
        let mut cleaned = Vec::with_capacity(children.len());
        for child in children {
          match child.clean_hidden_with(is_hidden) {
            Self::Branch(h, grandchildren) if is_hidden(&h) => cleaned.extend(grandchildren),
            other => cleaned.push(other),
          }
        }
        Self::Branch(head, cleaned)
      }
    }
  }
}

impl<S: fmt::Display> fmt::Display for SynTree<S> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Leaf(sym) => write!(f, "{}", sym),
      Self::Branch(head, children) => {
        write!(f, "({}", head)?;
        if children.len() == 1 && children[0].is_leaf() {
          write!(f, " {})", children[0])
        } else {
          for child in children.iter() {
            let rendered = format!("{}", child);
            for line in rendered.lines() {
              write!(f, "\n  {}", line)?;
            }
          }
          write!(f, ")")
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::grammar::Grammar;
  use crate::symbol::Sym;

  fn parse_one(src: &str, sentence: &str) -> Tree<crate::symbol::Spanned<Sym>> {
    let g: Grammar<Sym> = src.parse().unwrap();
    g.parse(&Sym::terminals(sentence)).trees().next().unwrap()
  }

  #[test]
  fn test_flatten_reproduces_input() {
    let tree = parse_one(
      "_np -> the _adjective _noun\n_noun -> cat\n_adjective -> fluffy",
      "the fluffy cat",
    );
    let words = tree
      .flatten()
      .iter()
      .map(|sp| sp.sym.text().to_string())
      .collect::<Vec<_>>();
    assert_eq!(words, vec!["the", "fluffy", "cat"]);
  }

  #[test]
  fn test_evaluation_is_total_with_default_actions() {
    let tree = parse_one(
      "_np -> the _adjective _noun\n_noun -> cat\n_adjective -> fluffy",
      "the fluffy cat",
    );
    // default actions drop the lifted "the" and collect the rest
    let value = tree.evaluate();
    assert_eq!(value, Value::Seq(vec![
      Value::Token("fluffy".to_string()),
      Value::Token("cat".to_string()),
    ]));
  }

  #[test]
  fn test_display_tree_hides_scaffolding() {
    let tree = parse_one(
      "_np -> the _adjective _noun\n_noun -> cat\n_adjective -> fluffy",
      "the fluffy cat",
    );
    let display = tree.display_tree();
    let (head, children) = display.get_branch().unwrap();
    assert_eq!(head.sym, Sym::nonterminal("_np"));
    // scaffolding spliced out: the, (_adjective fluffy), (_noun cat)
    assert_eq!(children.len(), 3);
    assert!(children[0].is_leaf());
  }

  #[test]
  fn test_cleanup_is_idempotent() {
    let tree = parse_one(
      "_np -> the _adjective _noun\n_noun -> cat\n_adjective -> fluffy",
      "the fluffy cat",
    );
    let once = tree.to_syntree().clean_hidden();
    let twice = once.clone().clean_hidden();
    assert_eq!(once, twice);
  }
}
