//! Query lexer (tokenizer).
//!
//! Splits a raw query string into word, operator, and parenthesis tokens.
//!
//! The lexer is deliberately permissive and never fails: whitespace and
//! commas separate tokens, `(`, `)`, and the OR shorthand `|` are always
//! single-character tokens, and any character outside the word alphabet is
//! silently skipped. Accepted behavior, not a bug — queries are typed by
//! users and stray punctuation should not turn into an error page.

use std::{fmt, iter::Peekable, str::Chars};

/// A token in the query language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A bare word: a tag, a `field:value` filter, or a directive.
    Word(String),

    /// The AND keyword.
    And,

    /// The OR keyword, or the `|` shorthand.
    Or,

    /// The NOT keyword.
    Not,

    /// Left parenthesis.
    LParen,

    /// Right parenthesis.
    RParen,
}

impl Token {
    /// Maps a word to its operator token when it is one of the keywords,
    /// recognized case-insensitively. Anything else stays a word.
    pub(crate) fn from_word(word: String) -> Self {
        if word.eq_ignore_ascii_case("AND") {
            Self::And
        } else if word.eq_ignore_ascii_case("OR") {
            Self::Or
        } else if word.eq_ignore_ascii_case("NOT") {
            Self::Not
        } else {
            Self::Word(word)
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Word(word) => write!(f, "{word}"),
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
            Self::Not => write!(f, "NOT"),
            Self::LParen => write!(f, "("),
            Self::RParen => write!(f, ")"),
        }
    }
}

/// Characters that may appear inside a word token.
///
/// The set admits `:` for field prefixes, `/` and `.` for ratio and date
/// specs, `-` for negation sugar and date separators, and `<`, `>`, `=` for
/// comparison specs such as `width:>=10`.
fn is_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | ':' | '/' | '.' | '-' | '<' | '>' | '=')
}

/// Characters that separate tokens. Commas count as whitespace.
fn is_separator(ch: char) -> bool {
    ch.is_whitespace() || ch == ','
}

/// Tokenizes a query string.
struct Lexer<'a> {
    /// Character iterator with one-character lookahead.
    chars: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input.
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    /// Tokenizes the entire input.
    fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();

        while let Some(token) = self.next_token() {
            tokens.push(token);
        }

        tokens
    }

    /// Returns the next token, or None at end of input.
    fn next_token(&mut self) -> Option<Token> {
        loop {
            let ch = *self.chars.peek()?;

            if is_separator(ch) {
                self.chars.next();
                continue;
            }

            match ch {
                '(' => {
                    self.chars.next();
                    return Some(Token::LParen);
                }
                ')' => {
                    self.chars.next();
                    return Some(Token::RParen);
                }
                '|' => {
                    self.chars.next();
                    return Some(Token::Or);
                }
                ch if is_word_char(ch) => return Some(self.read_word()),
                _ => {
                    // Unrecognized character: drop it and keep going.
                    self.chars.next();
                }
            }
        }
    }

    /// Reads a maximal run of word characters.
    fn read_word(&mut self) -> Token {
        let mut word = String::new();

        while let Some(&ch) = self.chars.peek() {
            if !is_word_char(ch) {
                break;
            }
            word.push(ch);
            self.chars.next();
        }

        Token::from_word(word)
    }
}

/// Convenience function to tokenize a query string.
///
/// Tokenizing never fails; see the module docs for the leniency policy.
pub fn tokenize(input: &str) -> Vec<Token> {
    Lexer::new(input).tokenize()
}
