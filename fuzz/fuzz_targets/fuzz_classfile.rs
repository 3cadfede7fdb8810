// Run locally (from the repo root):
//   cargo +nightly fuzz run fuzz_classfile -- -runs=1000
#![no_main]

use std::sync::OnceLock;

use libfuzzer_sys::fuzz_target;

mod utils;

fn runner() -> &'static utils::Runner<Vec<u8>> {
    static RUNNER: OnceLock<utils::Runner<Vec<u8>>> = OnceLock::new();
    RUNNER.get_or_init(|| {
        utils::Runner::new("fuzz_classfile", |input: Vec<u8>| {
            let _ = dj_classpath::ClassFile::parse(&input);
        })
    })
}

fuzz_target!(|data: &[u8]| {
    let cap = data.len().min(utils::MAX_INPUT_SIZE);
    runner().run(data[..cap].to_vec());
});
