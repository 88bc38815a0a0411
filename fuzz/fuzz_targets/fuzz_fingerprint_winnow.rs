#![no_main]
use libfuzzer_sys::fuzz_target;
use simcheck_types::{Span, Token};

const MAX_TOKENS: usize = 4096;
const TAG_ALPHABET: [&str; 8] = ["IDENT", "INT_LIT", "STR_LIT", "LPAREN", "RPAREN", "OP", "KEYWORD", "NEWLINE"];

fn build_tokens(data: &[u8]) -> Vec<Token> {
    data.iter()
        .take(MAX_TOKENS)
        .enumerate()
        .map(|(i, b)| {
            let tag = TAG_ALPHABET[(*b as usize) % TAG_ALPHABET.len()];
            Token::new(tag, Span::new(0, i as u32, 0, i as u32 + 1))
        })
        .collect()
}

fuzz_target!(|data: &[u8]| {
    let tokens = build_tokens(data);
    let k = 5;
    let w = 4;

    let first = simcheck_fingerprint::fingerprint(&tokens, k, w);
    let second = simcheck_fingerprint::fingerprint(&tokens, k, w);
    assert_eq!(first, second, "fingerprint must be deterministic for identical input");

    let mut last_start = None;
    for fp in &first {
        assert!(
            fp.span.start_row <= fp.span.end_row || (fp.span.start_row == fp.span.end_row && fp.span.start_col <= fp.span.end_col),
            "fingerprint span must not be inverted"
        );
        let start = fp.span.start_key();
        if let Some(prev) = last_start {
            assert!(prev <= start, "fingerprint output must be sorted by first token position");
        }
        last_start = Some(start);
    }
});
