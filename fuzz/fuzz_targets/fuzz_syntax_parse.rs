#![no_main]

use std::sync::OnceLock;

use dj_core::{NodeIdGen, Options};
use dj_syntax::ParseError;
use libfuzzer_sys::fuzz_target;

mod utils;

fn run_one(text: String) {
    // Never panic or hang on malformed input; errors are expected.
    for options in [Options::default(), Options::strict()] {
        let mut ids = NodeIdGen::new();
        if let Err(err) = dj_syntax::parse_entries(&text, &options, &mut ids) {
            assert_span_in_bounds("parse_entries", &err, text.len());
        }
        if let Err(err) = dj_syntax::parse_compilation_unit(&text, &options, &mut ids) {
            assert_span_in_bounds("parse_compilation_unit", &err, text.len());
        }
    }
}

fn assert_span_in_bounds(label: &str, err: &ParseError, text_len: usize) {
    assert!(
        err.span.start <= err.span.end && err.span.end <= text_len,
        "{label}: span {}..{} out of bounds (len={text_len})",
        err.span.start,
        err.span.end
    );
}

fn runner() -> &'static utils::Runner<String> {
    static RUNNER: OnceLock<utils::Runner<String>> = OnceLock::new();
    RUNNER.get_or_init(|| utils::Runner::new("fuzz_syntax_parse", run_one))
}

fuzz_target!(|data: &[u8]| {
    let Some(text) = utils::truncate_utf8(data) else {
        return;
    };
    runner().run(text.to_owned());
});
