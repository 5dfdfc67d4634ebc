//! Fuzz target for descriptor parsing.
//!
//! Splits the input on newlines into source, stage and format fields and
//! runs both exact and approximate parsing over them.

#![no_main]

use ctrdal::descriptor::DatasetDescriptor;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 4096 {
        return;
    }
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let mut fields = text.splitn(3, '\n');
    let source = fields.next().unwrap_or_default();
    let stage = fields.next().unwrap_or_default();
    let format = fields.next().unwrap_or_default();

    let _ = DatasetDescriptor::parse("fuzz", source, stage, format);
    let _ = DatasetDescriptor::parse_fuzzy("fuzz", source, stage, format);
});
