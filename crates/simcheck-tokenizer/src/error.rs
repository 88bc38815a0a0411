use thiserror::Error;

/// Errors surfaced by [`crate::tokenize`] (spec.md §4.1).
///
/// A `ParseFailure` is scoped to the one file being tokenized; callers
/// (the pipeline) turn it into a per-file warning rather than
/// aborting the whole analysis. `UnsupportedLanguage` aborts the
/// whole analysis since no grammar exists to fall back to.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {detail}")]
pub struct TokenizeError {
    pub kind: TokenizeErrorKind,
    pub detail: String,
}

impl TokenizeError {
    pub fn unsupported_language(detail: impl Into<String>) -> Self {
        Self {
            kind: TokenizeErrorKind::UnsupportedLanguage,
            detail: detail.into(),
        }
    }

    pub fn parse_failure(detail: impl Into<String>) -> Self {
        Self {
            kind: TokenizeErrorKind::ParseFailure,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenizeErrorKind {
    #[error("unsupported language")]
    UnsupportedLanguage,
    #[error("parse failure")]
    ParseFailure,
}
