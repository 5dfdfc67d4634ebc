//! Fuzz target for delimited-text parsing.
//!
//! This fuzzer feeds arbitrary byte sequences to the CSV reader with and
//! without a header row, checking for panics, crashes, or hangs.

#![no_main]

use ctrdal::io::csv::{from_csv_slice, CsvOptions};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let _ = from_csv_slice(data, &CsvOptions::default());
    let _ = from_csv_slice(
        data,
        &CsvOptions {
            header: false,
            ..CsvOptions::default()
        },
    );
});
