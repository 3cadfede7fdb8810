#![no_main]

use std::sync::OnceLock;

use dj_syntax::literals::{self, LiteralError};
use libfuzzer_sys::fuzz_target;

mod utils;

fn run_one(text: String) {
    let len = text.len();
    let checks: [(&str, Option<LiteralError>); 8] = [
        ("parse_int_literal", literals::parse_int_literal(&text).err()),
        ("parse_negated_int_literal", literals::parse_negated_int_literal(&text).err()),
        ("parse_long_literal", literals::parse_long_literal(&text).err()),
        ("parse_negated_long_literal", literals::parse_negated_long_literal(&text).err()),
        ("parse_float_literal", literals::parse_float_literal(&text).err()),
        ("parse_double_literal", literals::parse_double_literal(&text).err()),
        ("unescape_char_literal", literals::unescape_char_literal(&text).err()),
        ("unescape_string_literal", literals::unescape_string_literal(&text).err()),
    ];
    for (label, err) in checks {
        if let Some(err) = err {
            assert_span_in_bounds(label, &err, len);
        }
    }
}

fn assert_span_in_bounds(label: &str, err: &LiteralError, text_len: usize) {
    assert!(
        err.span.start <= err.span.end,
        "{label}: invalid span order {}..{} (len={text_len})",
        err.span.start,
        err.span.end
    );
    assert!(
        err.span.end <= text_len,
        "{label}: span end {} out of bounds (len={text_len}, span={:?})",
        err.span.end,
        err.span
    );
}

fn runner() -> &'static utils::Runner<String> {
    static RUNNER: OnceLock<utils::Runner<String>> = OnceLock::new();
    RUNNER.get_or_init(|| utils::Runner::new("fuzz_syntax_literals", run_one))
}

fuzz_target!(|data: &[u8]| {
    let Some(text) = utils::truncate_utf8(data) else {
        return;
    };
    runner().run(text.to_owned());
});
