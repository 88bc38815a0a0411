//! Shared lexical core for the C-family grammars (Java, C).
//!
//! Java and C agree closely at the token level: brace-delimited
//! blocks, semicolon-terminated statements, `//`/`/* */` comments,
//! C-style numeric/string/char literals. Per-language differences are
//! confined to the keyword set passed in by the caller.

use std::collections::HashSet;

use simcheck_types::{Span, Token};

use crate::error::TokenizeError;
use crate::scanner::{is_digit, is_ident_continue, is_ident_start, Cursor};

/// Multi-character operators, longest first so the scanner can do a
/// simple greedy prefix match.
const MULTI_CHAR_OPS: &[&str] = &[
    "<<=", ">>=", "...", "->", "::", "==", "!=", "<=", ">=", "&&", "||", "++", "--", "+=", "-=",
    "*=", "/=", "%=", "&=", "|=", "^=", "<<", ">>",
];

pub fn tokenize(src: &str, keywords: &HashSet<&'static str>) -> Result<Vec<Token>, TokenizeError> {
    let mut cur = Cursor::new(src);
    let mut tokens = Vec::new();

    loop {
        skip_whitespace_and_comments(&mut cur);
        let Some(c) = cur.peek() else { break };
        let start = cur.pos();

        if is_ident_start(c) {
            let word = read_ident(&mut cur);
            let end = cur.pos();
            let lexeme = if keywords.contains(word.as_str()) {
                word
            } else {
                "IDENT".to_string()
            };
            tokens.push(Token::new(lexeme, span(start, end)));
            continue;
        }

        if is_digit(c) {
            let is_float = read_number(&mut cur);
            let end = cur.pos();
            let lexeme = if is_float { "FLOAT_LIT" } else { "INT_LIT" };
            tokens.push(Token::new(lexeme, span(start, end)));
            continue;
        }

        if c == '"' {
            read_string_literal(&mut cur, '"')
                .map_err(|e| TokenizeError::parse_failure(format!("{e} at {start:?}")))?;
            let end = cur.pos();
            tokens.push(Token::new("STR_LIT", span(start, end)));
            continue;
        }

        if c == '\'' {
            read_string_literal(&mut cur, '\'')
                .map_err(|e| TokenizeError::parse_failure(format!("{e} at {start:?}")))?;
            let end = cur.pos();
            tokens.push(Token::new("CHAR_LIT", span(start, end)));
            continue;
        }

        if let Some(op) = MULTI_CHAR_OPS.iter().find(|op| cur.starts_with(op)) {
            for _ in 0..op.chars().count() {
                cur.advance();
            }
            let end = cur.pos();
            tokens.push(Token::new(*op, span(start, end)));
            continue;
        }

        // Single-char punctuation/operator: take it verbatim as the lexeme.
        cur.advance();
        let end = cur.pos();
        tokens.push(Token::new(c.to_string(), span(start, end)));
    }

    Ok(tokens)
}

fn span(start: (u32, u32), end: (u32, u32)) -> Span {
    Span::new(start.0, start.1, end.0, end.1)
}

fn skip_whitespace_and_comments(cur: &mut Cursor<'_>) {
    loop {
        match cur.peek() {
            Some(c) if c.is_whitespace() => {
                cur.advance();
            }
            Some('/') if cur.peek_at(1) == Some('/') => {
                while let Some(c) = cur.peek() {
                    if c == '\n' {
                        break;
                    }
                    cur.advance();
                }
            }
            Some('/') if cur.peek_at(1) == Some('*') => {
                cur.advance();
                cur.advance();
                while !cur.is_eof() && !cur.starts_with("*/") {
                    cur.advance();
                }
                if cur.starts_with("*/") {
                    cur.advance();
                    cur.advance();
                }
            }
            _ => break,
        }
    }
}

fn read_ident(cur: &mut Cursor<'_>) -> String {
    let mut s = String::new();
    while let Some(c) = cur.peek() {
        if is_ident_continue(c) {
            s.push(c);
            cur.advance();
        } else {
            break;
        }
    }
    s
}

/// Reads a numeric literal starting at the cursor; returns `true` if
/// it is a floating-point literal (contains `.` or an exponent).
fn read_number(cur: &mut Cursor<'_>) -> bool {
    let mut is_float = false;
    while matches!(cur.peek(), Some(c) if is_digit(c)) {
        cur.advance();
    }
    if cur.peek() == Some('.') && matches!(cur.peek_at(1), Some(c) if is_digit(c)) {
        is_float = true;
        cur.advance();
        while matches!(cur.peek(), Some(c) if is_digit(c)) {
            cur.advance();
        }
    }
    if matches!(cur.peek(), Some('e') | Some('E')) {
        let sign_offset = if matches!(cur.peek_at(1), Some('+') | Some('-')) { 2 } else { 1 };
        if matches!(cur.peek_at(sign_offset), Some(c) if is_digit(c)) {
            is_float = true;
            for _ in 0..sign_offset {
                cur.advance();
            }
            while matches!(cur.peek(), Some(c) if is_digit(c)) {
                cur.advance();
            }
        }
    }
    // Trailing numeric suffixes (L, UL, f, ...) are part of the same
    // literal but do not change its float/int classification.
    while matches!(cur.peek(), Some(c) if c.is_ascii_alphabetic()) {
        cur.advance();
    }
    is_float
}

fn read_string_literal(cur: &mut Cursor<'_>, quote: char) -> Result<(), &'static str> {
    cur.advance(); // opening quote
    loop {
        match cur.peek() {
            None => return Err("unterminated string/char literal"),
            Some('\\') => {
                cur.advance();
                cur.advance();
            }
            Some(c) if c == quote => {
                cur.advance();
                return Ok(());
            }
            Some('\n') => return Err("unterminated string/char literal"),
            Some(_) => {
                cur.advance();
            }
        }
    }
}
