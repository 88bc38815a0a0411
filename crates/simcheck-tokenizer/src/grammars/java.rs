use simcheck_types::Token;
use std::collections::HashSet;

use crate::error::TokenizeError;
use crate::grammars::c_family;

const JAVA_KEYWORDS: &[&str] = &[
    "abstract", "assert", "boolean", "break", "byte", "case", "catch", "char", "class", "const",
    "continue", "default", "do", "double", "else", "enum", "extends", "final", "finally", "float",
    "for", "goto", "if", "implements", "import", "instanceof", "int", "interface", "long",
    "native", "new", "package", "private", "protected", "public", "return", "short", "static",
    "strictfp", "super", "switch", "synchronized", "this", "throw", "throws", "transient", "try",
    "void", "volatile", "while", "true", "false", "null", "var", "record", "yield", "sealed",
    "permits",
];

pub fn tokenize(src: &str) -> Result<Vec<Token>, TokenizeError> {
    let keywords: HashSet<&'static str> = JAVA_KEYWORDS.iter().copied().collect();
    c_family::tokenize(src, &keywords)
}
