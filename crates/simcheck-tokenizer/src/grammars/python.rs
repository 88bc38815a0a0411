//! Python grammar: indentation-sensitive, `#` line comments, and
//! leading triple-quoted docstrings discarded per spec.md §4.1.

use std::collections::HashSet;

use simcheck_types::{Span, Token};

use crate::error::TokenizeError;
use crate::scanner::{is_digit, is_ident_continue, is_ident_start, Cursor};

const PYTHON_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield", "match", "case",
];

const MULTI_CHAR_OPS: &[&str] = &[
    "**=", "//=", ">>=", "<<=", ":=", "->", "==", "!=", "<=", ">=", "**", "//", "<<", ">>", "+=",
    "-=", "*=", "/=", "%=", "&=", "|=", "^=", "@=",
];

struct State {
    indent_stack: Vec<usize>,
    bracket_depth: i32,
    tokens: Vec<Token>,
    line_has_token: bool,
    at_line_start: bool,
}

pub fn tokenize(src: &str) -> Result<Vec<Token>, TokenizeError> {
    let keywords: HashSet<&'static str> = PYTHON_KEYWORDS.iter().copied().collect();
    let mut cur = Cursor::new(src);
    let mut st = State {
        indent_stack: vec![0],
        bracket_depth: 0,
        tokens: Vec::new(),
        line_has_token: false,
        at_line_start: true,
    };

    loop {
        if st.at_line_start && st.bracket_depth == 0 {
            if !consume_line_start(&mut cur, &mut st)? {
                continue;
            }
        }

        skip_inline_whitespace_and_comments(&mut cur);
        let Some(c) = cur.peek() else { break };

        if c == '\n' {
            cur.advance();
            if st.bracket_depth == 0 {
                if st.line_has_token {
                    st.tokens.push(Token::new("NEWLINE", zero_span(&cur)));
                }
                st.line_has_token = false;
                st.at_line_start = true;
            }
            continue;
        }

        let start = cur.pos();

        if let Some((is_triple, quote)) = string_prefix_and_quote(&cur) {
            let prefix_len = string_prefix_len(&cur);
            for _ in 0..prefix_len {
                cur.advance();
            }
            read_python_string(&mut cur, quote, is_triple)
                .map_err(|e| TokenizeError::parse_failure(format!("{e} at {start:?}")))?;
            let end = cur.pos();
            let is_docstring = is_triple
                && (st.tokens.is_empty()
                    || matches!(st.tokens.last(), Some(t) if t.lexeme == "INDENT"));
            if !is_docstring {
                st.tokens.push(Token::new("STR_LIT", span(start, end)));
                st.line_has_token = true;
            }
            continue;
        }

        if is_ident_start(c) {
            let word = read_ident(&mut cur);
            let end = cur.pos();
            let lexeme = if keywords.contains(word.as_str()) {
                word
            } else {
                "IDENT".to_string()
            };
            st.tokens.push(Token::new(lexeme, span(start, end)));
            st.line_has_token = true;
            continue;
        }

        if is_digit(c) {
            let is_float = read_number(&mut cur);
            let end = cur.pos();
            let lexeme = if is_float { "FLOAT_LIT" } else { "INT_LIT" };
            st.tokens.push(Token::new(lexeme, span(start, end)));
            st.line_has_token = true;
            continue;
        }

        if matches!(c, '(' | '[' | '{') {
            st.bracket_depth += 1;
        } else if matches!(c, ')' | ']' | '}') {
            st.bracket_depth = (st.bracket_depth - 1).max(0);
        }

        if c == '\\' && cur.peek_at(1) == Some('\n') {
            // Explicit line continuation: consume both, stay on the
            // same logical line.
            cur.advance();
            cur.advance();
            continue;
        }

        if let Some(op) = MULTI_CHAR_OPS.iter().find(|op| cur.starts_with(op)) {
            for _ in 0..op.chars().count() {
                cur.advance();
            }
            let end = cur.pos();
            st.tokens.push(Token::new(*op, span(start, end)));
            st.line_has_token = true;
            continue;
        }

        cur.advance();
        let end = cur.pos();
        st.tokens.push(Token::new(c.to_string(), span(start, end)));
        st.line_has_token = true;
    }

    if st.line_has_token {
        st.tokens.push(Token::new("NEWLINE", zero_span(&cur)));
    }
    while st.indent_stack.len() > 1 {
        st.indent_stack.pop();
        st.tokens.push(Token::new("DEDENT", zero_span(&cur)));
    }

    Ok(st.tokens)
}

/// Handles a fresh logical line: measures indentation, skips
/// blank/comment-only lines, and emits INDENT/DEDENT as needed.
/// Returns `Ok(true)` once positioned at the first real token of the
/// line (or EOF); `Ok(false)` asks the caller to loop again (the line
/// was blank/comment-only and got fully consumed).
fn consume_line_start(cur: &mut Cursor<'_>, st: &mut State) -> Result<bool, TokenizeError> {
    let mut indent = 0usize;
    loop {
        match cur.peek() {
            Some(' ') => {
                indent += 1;
                cur.advance();
            }
            Some('\t') => {
                indent += 8 - (indent % 8);
                cur.advance();
            }
            _ => break,
        }
    }

    match cur.peek() {
        None => {
            st.at_line_start = false;
            return Ok(true);
        }
        Some('\n') | Some('#') => {
            // Blank or comment-only line: does not affect indentation.
            return Ok(false);
        }
        _ => {}
    }

    st.at_line_start = false;
    let current = *st.indent_stack.last().unwrap();
    if indent > current {
        st.indent_stack.push(indent);
        st.tokens.push(Token::new("INDENT", zero_span(cur)));
    } else {
        while indent < *st.indent_stack.last().unwrap() {
            st.indent_stack.pop();
            st.tokens.push(Token::new("DEDENT", zero_span(cur)));
        }
        if indent != *st.indent_stack.last().unwrap() {
            return Err(TokenizeError::parse_failure(format!(
                "inconsistent indentation at {:?}",
                cur.pos()
            )));
        }
    }
    Ok(true)
}

fn zero_span(cur: &Cursor<'_>) -> Span {
    let (r, c) = cur.pos();
    Span::new(r, c, r, c)
}

fn span(start: (u32, u32), end: (u32, u32)) -> Span {
    Span::new(start.0, start.1, end.0, end.1)
}

fn skip_inline_whitespace_and_comments(cur: &mut Cursor<'_>) {
    loop {
        match cur.peek() {
            Some(c) if c == ' ' || c == '\t' || c == '\r' => {
                cur.advance();
            }
            Some('#') => {
                while let Some(c) = cur.peek() {
                    if c == '\n' {
                        break;
                    }
                    cur.advance();
                }
            }
            _ => break,
        }
    }
}

fn string_prefix_len(cur: &Cursor<'_>) -> usize {
    let mut i = 0;
    while let Some(c) = cur.peek_at(i) {
        if matches!(c.to_ascii_lowercase(), 'r' | 'u' | 'f' | 'b') {
            i += 1;
        } else {
            break;
        }
    }
    i
}

/// Returns `(is_triple, quote_char)` if the cursor sits at a string
/// literal (optionally prefixed by `r`/`u`/`f`/`b` combinations).
fn string_prefix_and_quote(cur: &Cursor<'_>) -> Option<(bool, char)> {
    let prefix_len = string_prefix_len(cur);
    if prefix_len > 2 {
        return None;
    }
    let quote = cur.peek_at(prefix_len)?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    let is_triple =
        cur.peek_at(prefix_len + 1) == Some(quote) && cur.peek_at(prefix_len + 2) == Some(quote);
    Some((is_triple, quote))
}

fn read_python_string(cur: &mut Cursor<'_>, quote: char, triple: bool) -> Result<(), &'static str> {
    if triple {
        cur.advance();
        cur.advance();
        cur.advance();
        loop {
            if cur.is_eof() {
                return Err("unterminated triple-quoted string");
            }
            if cur.peek() == Some('\\') {
                cur.advance();
                cur.advance();
                continue;
            }
            if cur.peek() == Some(quote)
                && cur.peek_at(1) == Some(quote)
                && cur.peek_at(2) == Some(quote)
            {
                cur.advance();
                cur.advance();
                cur.advance();
                return Ok(());
            }
            cur.advance();
        }
    } else {
        cur.advance();
        loop {
            match cur.peek() {
                None => return Err("unterminated string literal"),
                Some('\n') => return Err("unterminated string literal"),
                Some('\\') => {
                    cur.advance();
                    cur.advance();
                }
                Some(c) if c == quote => {
                    cur.advance();
                    return Ok(());
                }
                Some(_) => {
                    cur.advance();
                }
            }
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
    if matches!(cur.peek(), Some('j') | Some('J')) {
        cur.advance();
    }
    is_float
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lexemes(src: &str) -> Vec<String> {
        tokenize(src)
            .unwrap()
            .into_iter()
            .map(|t| t.lexeme)
            .collect()
    }

    #[test]
    fn tokenizes_function_with_indent_dedent() {
        let src = "def f(x):\n    return x + 1\n";
        let toks = lexemes(src);
        assert_eq!(
            toks,
            vec![
                "def", "IDENT", "(", "IDENT", ")", ":", "NEWLINE", "INDENT", "return", "IDENT",
                "+", "INT_LIT", "NEWLINE", "DEDENT"
            ]
        );
    }

    #[test]
    fn discards_leading_module_docstring() {
        let src = "\"\"\"module doc\"\"\"\nx = 1\n";
        let toks = lexemes(src);
        assert_eq!(toks, vec!["IDENT", "=", "INT_LIT", "NEWLINE"]);
    }

    #[test]
    fn discards_function_docstring_but_keeps_body_strings() {
        let src = "def f():\n    \"\"\"doc\"\"\"\n    return \"hi\"\n";
        let toks = lexemes(src);
        assert_eq!(
            toks,
            vec![
                "def", "IDENT", "(", ")", ":", "NEWLINE", "INDENT", "return", "STR_LIT",
                "NEWLINE", "DEDENT"
            ]
        );
    }

    #[test]
    fn brackets_suppress_implicit_newlines() {
        let src = "x = (1 +\n     2)\n";
        let toks = lexemes(src);
        assert_eq!(
            toks,
            vec!["IDENT", "=", "(", "INT_LIT", "+", "INT_LIT", ")", "NEWLINE"]
        );
    }

    #[test]
    fn inconsistent_indentation_is_parse_failure() {
        let src = "if True:\n    x = 1\n   y = 2\n";
        assert!(tokenize(src).is_err());
    }
}
