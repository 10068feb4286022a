//! Query parser.
//!
//! Turns a token stream into a query AST plus extracted directives, in five
//! passes:
//!
//! 1. Directive and negation expansion: the reserved collection toggle and
//!    its negated form are pulled out of the stream, and `-foo` becomes
//!    `NOT foo`.
//! 2. Classification: each remaining word becomes a tag or filter term, and
//!    `sort:` directives are extracted.
//! 3. Implicit AND insertion: adjacent operands are joined with a synthetic
//!    AND, so `cat dog` means `cat AND dog`.
//! 4. Shunting-yard to RPN with precedence NOT > AND > OR.
//! 5. RPN to AST, collapsing left-associative same-operator chains into
//!    n-ary nodes.
//!
//! Unmatched parentheses and operators without operands are hard errors; a
//! query with no non-directive tokens parses to no expression at all, which
//! means "match everything the viewer may see".

use crate::{
    ast::{Expr, Term},
    error::QueryError,
    filter::{Atom, SortMode, classify, normalize_tag},
    lexer::{Token, tokenize},
};

/// Reserved token that switches a query into collection (comic) mode.
///
/// The marker tag that flags comic-page media carries the same name, which
/// is why the parser prunes that tag from the tree once the toggle is set.
pub const COLLECTION_TOKEN: &str = "comic";

/// Maximum expression-tree depth accepted from a single query.
///
/// Queries a human types stay in single digits; the cap keeps adversarial
/// paren/negation towers from exhausting the stack in later recursive walks.
const MAX_NESTING: usize = 128;

/// Result of parsing a query string.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseResult {
    /// The parsed expression, or None when the query holds no terms.
    pub expr: Option<Expr>,

    /// The collection-mode toggle appeared in the query.
    ///
    /// Always false when `collection_off` is set: explicit negation wins.
    pub collection_on: bool,

    /// The negated collection toggle appeared in the query.
    pub collection_off: bool,

    /// The last `sort:` directive, if any.
    pub sort: Option<SortMode>,
}

/// A token after directive extraction and classification.
#[derive(Debug, Clone, PartialEq)]
enum Item {
    /// A tag or filter operand.
    Operand(Term),
    /// The AND operator.
    And,
    /// The OR operator.
    Or,
    /// The NOT operator.
    Not,
    /// Left parenthesis.
    LParen,
    /// Right parenthesis.
    RParen,
}

/// An operator on the shunting-yard stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    /// Unary negation, binds tightest.
    Not,
    /// Conjunction.
    And,
    /// Disjunction, binds loosest.
    Or,
}

impl Op {
    /// Binding strength; higher binds tighter.
    fn precedence(self) -> u8 {
        match self {
            Self::Not => 3,
            Self::And => 2,
            Self::Or => 1,
        }
    }

    /// NOT is right-associative; AND and OR are left-associative.
    fn right_assoc(self) -> bool {
        matches!(self, Self::Not)
    }

    /// Operator name for error messages.
    fn name(self) -> &'static str {
        match self {
            Self::Not => "NOT",
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// An element of the RPN output queue.
#[derive(Debug, Clone, PartialEq)]
enum RpnItem {
    /// A tag or filter operand.
    Operand(Term),
    /// An operator application.
    Apply(Op),
}

/// An entry on the shunting-yard operator stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StackEntry {
    /// A pending operator.
    Op(Op),
    /// An open parenthesis awaiting its match.
    Open,
}

/// Parses a query string into an AST plus extracted directives.
pub fn parse(input: &str) -> Result<ParseResult, QueryError> {
    let tokens = tokenize(input);

    let mut collection_on = false;
    let mut collection_off = false;
    let tokens = expand(tokens, &mut collection_on, &mut collection_off);

    let mut sort = None;
    let items = classify_stream(tokens, &mut sort)?;
    let items = insert_implicit_and(items);

    let rpn = to_rpn(items)?;
    let mut expr = build_expr(rpn)?;

    if collection_off {
        collection_on = false;
    }
    if collection_on {
        // The toggle already implies the marker-tag restriction; a literal
        // occurrence of the tag would be redundant.
        let marker = normalize_tag(COLLECTION_TOKEN);
        expr = expr.and_then(|e| e.prune(&|term| matches!(term, Term::Tag(name) if *name == marker)));
    }

    Ok(ParseResult {
        expr,
        collection_on,
        collection_off,
        sort,
    })
}

/// Pass 1: extracts the collection toggle and expands `-foo` into `NOT foo`.
///
/// The literal negated toggle is intercepted before dash expansion, so
/// `-comic` never becomes `NOT comic`. Stacked dashes expand iteratively.
fn expand(tokens: Vec<Token>, collection_on: &mut bool, collection_off: &mut bool) -> Vec<Token> {
    let mut out = Vec::with_capacity(tokens.len());

    for token in tokens {
        let Token::Word(word) = token else {
            out.push(token);
            continue;
        };

        if word.eq_ignore_ascii_case(COLLECTION_TOKEN) {
            *collection_on = true;
            continue;
        }
        if let Some(rest) = word.strip_prefix('-') {
            if rest.eq_ignore_ascii_case(COLLECTION_TOKEN) {
                *collection_off = true;
                continue;
            }
        }

        let mut rest = word.as_str();
        while rest.starts_with('-') && rest.len() > 1 {
            out.push(Token::Not);
            rest = &rest[1..];
        }
        if !rest.is_empty() {
            out.push(Token::from_word(rest.to_string()));
        }
    }

    out
}

/// Pass 2: classifies each word, extracting `sort:` directives.
///
/// Directives contribute no operand; dropping them here, before implicit-AND
/// insertion, is what keeps `cat sort:new dog` meaning `cat AND dog`.
fn classify_stream(tokens: Vec<Token>, sort: &mut Option<SortMode>) -> Result<Vec<Item>, QueryError> {
    let mut items = Vec::with_capacity(tokens.len());

    for token in tokens {
        match token {
            Token::Word(word) => match classify(&word)? {
                Atom::Sort(mode) => *sort = Some(mode),
                Atom::Term(term) => items.push(Item::Operand(term)),
            },
            Token::And => items.push(Item::And),
            Token::Or => items.push(Item::Or),
            Token::Not => items.push(Item::Not),
            Token::LParen => items.push(Item::LParen),
            Token::RParen => items.push(Item::RParen),
        }
    }

    Ok(items)
}

/// Pass 3: inserts a synthetic AND between an operand ending and a new one
/// beginning.
fn insert_implicit_and(items: Vec<Item>) -> Vec<Item> {
    let mut out: Vec<Item> = Vec::with_capacity(items.len());

    for item in items {
        let begins_operand = matches!(item, Item::Operand(_) | Item::LParen | Item::Not);
        let after_operand = matches!(out.last(), Some(Item::Operand(_) | Item::RParen));
        if begins_operand && after_operand {
            out.push(Item::And);
        }
        out.push(item);
    }

    out
}

/// Pass 4: shunting-yard conversion to reverse Polish notation.
fn to_rpn(items: Vec<Item>) -> Result<Vec<RpnItem>, QueryError> {
    let mut output = Vec::with_capacity(items.len());
    let mut stack: Vec<StackEntry> = Vec::new();

    for item in items {
        match item {
            Item::Operand(term) => output.push(RpnItem::Operand(term)),
            Item::Not => push_operator(Op::Not, &mut stack, &mut output),
            Item::And => push_operator(Op::And, &mut stack, &mut output),
            Item::Or => push_operator(Op::Or, &mut stack, &mut output),
            Item::LParen => stack.push(StackEntry::Open),
            Item::RParen => loop {
                match stack.pop() {
                    Some(StackEntry::Op(op)) => output.push(RpnItem::Apply(op)),
                    Some(StackEntry::Open) => break,
                    None => {
                        return Err(QueryError::Syntax("unmatched closing parenthesis".into()));
                    }
                }
            },
        }
    }

    while let Some(entry) = stack.pop() {
        match entry {
            StackEntry::Op(op) => output.push(RpnItem::Apply(op)),
            StackEntry::Open => {
                return Err(QueryError::Syntax("unclosed parenthesis".into()));
            }
        }
    }

    Ok(output)
}

/// Pops higher-precedence operators, then pushes `op` onto the stack.
fn push_operator(op: Op, stack: &mut Vec<StackEntry>, output: &mut Vec<RpnItem>) {
    while let Some(StackEntry::Op(top)) = stack.last() {
        let pops = if op.right_assoc() {
            top.precedence() > op.precedence()
        } else {
            top.precedence() >= op.precedence()
        };
        if !pops {
            break;
        }
        output.push(RpnItem::Apply(*top));
        stack.pop();
    }
    stack.push(StackEntry::Op(op));
}

/// Pass 5: evaluates the RPN queue into an expression tree.
///
/// Tracks the exact depth of every partial tree so that over-nested queries
/// are rejected before a deep tree ever exists; the evaluation itself is
/// iterative, so the parser has no stack to exhaust.
fn build_expr(rpn: Vec<RpnItem>) -> Result<Option<Expr>, QueryError> {
    let mut operands: Vec<(Expr, usize)> = Vec::new();

    for item in rpn {
        match item {
            RpnItem::Operand(term) => operands.push((Expr::Term(term), 1)),
            RpnItem::Apply(op) => {
                let combined = apply_op(op, &mut operands)?;
                operands.push(combined);
            }
        }
    }

    match operands.len() {
        0 => Ok(None),
        1 => Ok(operands.pop().map(|(expr, _)| expr)),
        _ => Err(QueryError::Syntax(
            "expected an operator between expressions".into(),
        )),
    }
}

/// Applies one RPN operator to the operand stack.
fn apply_op(op: Op, operands: &mut Vec<(Expr, usize)>) -> Result<(Expr, usize), QueryError> {
    match op {
        Op::Not => {
            let (inner, inner_depth) = pop_operand(operands, op)?;
            let level = guard_depth(inner_depth + 1)?;
            Ok((Expr::Not(Box::new(inner)), level))
        }
        Op::And => {
            let (rhs, rhs_depth) = pop_operand(operands, op)?;
            let (lhs, lhs_depth) = pop_operand(operands, op)?;
            // A flattened left chain absorbs the new item without deepening.
            let level = if matches!(lhs, Expr::And(_)) {
                lhs_depth.max(rhs_depth + 1)
            } else {
                lhs_depth.max(rhs_depth) + 1
            };
            let level = guard_depth(level)?;
            Ok((Expr::and(lhs, rhs), level))
        }
        Op::Or => {
            let (rhs, rhs_depth) = pop_operand(operands, op)?;
            let (lhs, lhs_depth) = pop_operand(operands, op)?;
            let level = if matches!(lhs, Expr::Or(_)) {
                lhs_depth.max(rhs_depth + 1)
            } else {
                lhs_depth.max(rhs_depth) + 1
            };
            let level = guard_depth(level)?;
            Ok((Expr::or(lhs, rhs), level))
        }
    }
}

/// Rejects trees deeper than [`MAX_NESTING`].
fn guard_depth(level: usize) -> Result<usize, QueryError> {
    if level > MAX_NESTING {
        return Err(QueryError::Syntax("query is nested too deeply".into()));
    }
    Ok(level)
}

/// Pops an operand for `op`, or reports the imbalance.
fn pop_operand(operands: &mut Vec<(Expr, usize)>, op: Op) -> Result<(Expr, usize), QueryError> {
    operands
        .pop()
        .ok_or_else(|| QueryError::Syntax(format!("{} is missing an operand", op.name())))
}
