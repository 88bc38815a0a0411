#![no_main]
use libfuzzer_sys::fuzz_target;
use simcheck_types::LangTag;

const MAX_INPUT_SIZE: usize = 64 * 1024;

fuzz_target!(|data: &[u8]| {
    if data.len() > MAX_INPUT_SIZE {
        return;
    }
    let first = simcheck_tokenizer::tokenize(data, LangTag::C);
    let second = simcheck_tokenizer::tokenize(data, LangTag::C);
    match (&first, &second) {
        (Ok(a), Ok(b)) => assert_eq!(a, b, "tokenize must be deterministic for identical input"),
        (Err(_), Err(_)) => {}
        _ => panic!("tokenize must not flip between Ok and Err for identical input"),
    }
});
