//! Fuzz target for object store listing responses and key mapping.
//!
//! Every local path derived from a key must stay inside the target
//! directory.

#![no_main]

use std::path::Component;

use ctrdal::remote::fuzz_relative_object_path;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 1024 * 1024 {
        return;
    }
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let _ = ctrdal::remote::http::fuzz_parse_list_page(text);

    let (prefix, key) = text.split_once('\n').unwrap_or(("", text));
    if let Some(relative) = fuzz_relative_object_path(prefix, key) {
        assert!(relative
            .components()
            .all(|component| matches!(component, Component::Normal(_))));
    }
});
