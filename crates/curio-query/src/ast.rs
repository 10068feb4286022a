//! Query abstract syntax tree.
//!
//! Represents parsed query expressions before compilation to storage
//! predicates.

use std::fmt;

use crate::filter::Filter;

/// A single operand: a tag match or a typed filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    /// A normalized tag name.
    Tag(String),

    /// A typed filter.
    Filter(Filter),
}

/// A parsed query expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A single term.
    Term(Term),

    /// Negation: results must NOT match this expression.
    Not(Box<Self>),

    /// Conjunction: all sub-expressions must match.
    And(Vec<Self>),

    /// Disjunction: at least one sub-expression must match.
    Or(Vec<Self>),
}

impl Expr {
    /// Combines two operands with AND, flattening left-associative chains.
    ///
    /// `a b c` collapses into a single three-item And, while a parenthesized
    /// right operand keeps its own node, so `(a b) c` and `a (b c)` stay
    /// distinguishable.
    pub fn and(lhs: Self, rhs: Self) -> Self {
        match lhs {
            Self::And(mut items) => {
                items.push(rhs);
                Self::And(items)
            }
            other => Self::And(vec![other, rhs]),
        }
    }

    /// Combines two operands with OR, flattening left-associative chains.
    pub fn or(lhs: Self, rhs: Self) -> Self {
        match lhs {
            Self::Or(mut items) => {
                items.push(rhs);
                Self::Or(items)
            }
            other => Self::Or(vec![other, rhs]),
        }
    }

    /// Removes every leaf term matched by `drop`, collapsing the tree as it
    /// goes.
    ///
    /// A `Not` whose child disappears disappears with it; an `And`/`Or` left
    /// with no children becomes `None` ("no constraint"); one left with a
    /// single child collapses to that child. Used to strip terms a query
    /// mode already implies, such as the collection marker tag.
    pub fn prune<F>(self, drop: &F) -> Option<Self>
    where
        F: Fn(&Term) -> bool,
    {
        match self {
            Self::Term(term) => {
                if drop(&term) {
                    None
                } else {
                    Some(Self::Term(term))
                }
            }
            Self::Not(inner) => inner.prune(drop).map(|e| Self::Not(Box::new(e))),
            Self::And(items) => {
                let kept: Vec<Self> = items.into_iter().filter_map(|e| e.prune(drop)).collect();
                match kept.len() {
                    0 => None,
                    1 => kept.into_iter().next(),
                    _ => Some(Self::And(kept)),
                }
            }
            Self::Or(items) => {
                let kept: Vec<Self> = items.into_iter().filter_map(|e| e.prune(drop)).collect();
                match kept.len() {
                    0 => None,
                    1 => kept.into_iter().next(),
                    _ => Some(Self::Or(kept)),
                }
            }
        }
    }

    /// Formats the expression as a tree with the given indentation level.
    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let prefix = "  ".repeat(indent);
        match self {
            Self::Term(Term::Tag(name)) => writeln!(f, "{prefix}Tag({name:?})"),
            Self::Term(Term::Filter(filter)) => writeln!(f, "{prefix}Filter({filter:?})"),
            Self::Not(inner) => {
                writeln!(f, "{prefix}Not")?;
                inner.fmt_tree(f, indent + 1)
            }
            Self::And(items) => {
                writeln!(f, "{prefix}And")?;
                for item in items {
                    item.fmt_tree(f, indent + 1)?;
                }
                Ok(())
            }
            Self::Or(items) => {
                writeln!(f, "{prefix}Or")?;
                for item in items {
                    item.fmt_tree(f, indent + 1)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_tree(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(name: &str) -> Expr {
        Expr::Term(Term::Tag(name.into()))
    }

    #[test]
    fn and_flattens_left_chain() {
        let chain = Expr::and(Expr::and(tag("a"), tag("b")), tag("c"));
        assert_eq!(chain, Expr::And(vec![tag("a"), tag("b"), tag("c")]));
    }

    #[test]
    fn and_keeps_grouped_right_operand() {
        let grouped = Expr::and(tag("a"), Expr::And(vec![tag("b"), tag("c")]));
        assert_eq!(
            grouped,
            Expr::And(vec![tag("a"), Expr::And(vec![tag("b"), tag("c")])])
        );
    }

    #[test]
    fn or_flattens_left_chain() {
        let chain = Expr::or(Expr::or(tag("a"), tag("b")), tag("c"));
        assert_eq!(chain, Expr::Or(vec![tag("a"), tag("b"), tag("c")]));
    }

    #[test]
    fn prune_leaf() {
        let expr = tag("comic");
        assert_eq!(expr.prune(&|t| matches!(t, Term::Tag(n) if n == "comic")), None);
    }

    #[test]
    fn prune_collapses_single_child_and() {
        let expr = Expr::And(vec![tag("comic"), tag("cat")]);
        assert_eq!(
            expr.prune(&|t| matches!(t, Term::Tag(n) if n == "comic")),
            Some(tag("cat"))
        );
    }

    #[test]
    fn prune_removes_emptied_not() {
        let expr = Expr::And(vec![
            Expr::Not(Box::new(tag("comic"))),
            tag("cat"),
            tag("dog"),
        ]);
        assert_eq!(
            expr.prune(&|t| matches!(t, Term::Tag(n) if n == "comic")),
            Some(Expr::And(vec![tag("cat"), tag("dog")]))
        );
    }

    #[test]
    fn prune_keeps_unrelated_terms() {
        let expr = Expr::Or(vec![tag("cat"), tag("dog")]);
        assert_eq!(
            expr.clone().prune(&|t| matches!(t, Term::Tag(n) if n == "comic")),
            Some(expr)
        );
    }
}
