#![allow(dead_code)]

use ctrdal::table::Table;
use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// Cell text including separators, quotes and spaces, which CSV must quote.
pub fn arb_cell() -> impl Strategy<Value = String> {
    "[a-z0-9 ,\"]{0,6}"
}

/// Tables with 1..5 named columns and 0..60 rows.
pub fn arb_table() -> impl Strategy<Value = Table> {
    (1usize..5, 0usize..60).prop_flat_map(|(columns, rows)| {
        prop::collection::vec(prop::collection::vec(arb_cell(), columns), rows).prop_map(
            move |rows| Table {
                columns: (0..columns).map(|i| format!("col_{i}")).collect(),
                rows,
            },
        )
    })
}
