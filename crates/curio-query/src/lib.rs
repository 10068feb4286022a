//! Query language parsing and AST for the curio media catalog.
//!
//! This crate turns free-text catalog queries into expression trees:
//!
//! - **Tags**: `blue_sky` - items carrying the tag
//! - **Negation**: `-deprecated` - items that must NOT match
//! - **OR**: `cat OR dog`, or the `cat | dog` shorthand
//! - **Implicit AND**: `cat dog` means both, no keyword required
//! - **Grouping**: `(a b) | (c d)` - precedence control
//! - **Filters**: `width:10..20`, `uploaded:>=2024-01-01`, `ratio:16/9`,
//!   `type:video`
//! - **Directives**: `sort:rating` and the reserved `comic` collection
//!   toggle, extracted rather than matched
//!
//! # Example
//!
//! ```
//! use curio_query::parse;
//!
//! let result = parse("cat dog -nsfw sort:rating").unwrap();
//! assert!(result.expr.is_some());
//! ```

#![warn(missing_docs)]

mod ast;
mod error;
mod filter;
mod lexer;
mod parser;

pub use ast::{Expr, Term};
pub use error::QueryError;
pub use filter::{
    Comparison, Filter, MediaKind, NumericField, RATIO_EPSILON, SortMode, normalize_tag,
};
pub use lexer::{Token, tokenize};
pub use parser::{COLLECTION_TOKEN, ParseResult, parse};
