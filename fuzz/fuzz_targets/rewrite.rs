#![no_main]

use keepscope::instrument::{EntryProbeRewriter, Rewrite, Rewriter};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let rewriter = EntryProbeRewriter::default();
    if let Ok(Rewrite::Instrumented { bytes, .. }) = rewriter.rewrite(data) {
        // Rewritten output must itself be a parseable class file
        assert!(keepscope::classfile::ClassFile::parse(&bytes).is_ok());
    }
});
