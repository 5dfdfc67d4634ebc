//! Fuzz target for YAML document parsing.

#![no_main]

use ctrdal::io::document::from_yaml_slice;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 1024 * 1024 {
        return;
    }

    let _ = from_yaml_slice(data);
});
