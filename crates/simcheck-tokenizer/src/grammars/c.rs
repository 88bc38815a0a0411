use simcheck_types::Token;
use std::collections::HashSet;

use crate::error::TokenizeError;
use crate::grammars::c_family;

const C_KEYWORDS: &[&str] = &[
    "auto", "break", "case", "char", "const", "continue", "default", "do", "double", "else",
    "enum", "extern", "float", "for", "goto", "if", "inline", "int", "long", "register",
    "restrict", "return", "short", "signed", "sizeof", "static", "struct", "switch", "typedef",
    "union", "unsigned", "void", "volatile", "while", "_Bool", "_Complex", "_Imaginary",
];

pub fn tokenize(src: &str) -> Result<Vec<Token>, TokenizeError> {
    let keywords: HashSet<&'static str> = C_KEYWORDS.iter().copied().collect();
    c_family::tokenize(src, &keywords)
}
