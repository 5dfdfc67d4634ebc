//! Property tests for chunked delimited-text transfers.

mod proptest_helpers;

use ctrdal::io::csv::{
    chunk_size, read_csv_chunked, split_into_groups, write_csv_chunked, CsvOptions,
};
use ctrdal::io::progress::RecordingProgress;
use proptest::prelude::*;
use proptest_helpers::{arb_table, proptest_config};

proptest! {
    #![proptest_config(proptest_config())]

    #[test]
    fn groups_cover_rows_in_order(total in 0usize..500, n_chunks in 0usize..40) {
        let groups = split_into_groups(total, n_chunks);
        prop_assert_eq!(groups.len(), n_chunks.max(1));

        let mut next = 0;
        for group in &groups {
            prop_assert_eq!(group.start, next);
            next = group.end;
        }
        prop_assert_eq!(next, total);

        let sizes: Vec<usize> = groups.iter().map(|g| g.len()).collect();
        let max = sizes.iter().copied().max().unwrap_or(0);
        let min = sizes.iter().copied().min().unwrap_or(0);
        prop_assert!(max - min <= 1);
        prop_assert!(sizes.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn read_chunks_cover_total(total in 0usize..500, n_chunks in 0usize..40) {
        let size = chunk_size(total, n_chunks);
        prop_assert!(size >= 1);
        prop_assert!(size * n_chunks.max(1) >= total);
    }

    #[test]
    fn write_then_read_preserves_table(
        table in arb_table(),
        write_chunks in 0usize..12,
        read_chunks in 0usize..12,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");

        let write_opts = CsvOptions { n_chunks: write_chunks, progress: false, ..CsvOptions::default() };
        let read_opts = CsvOptions { n_chunks: read_chunks, progress: false, ..CsvOptions::default() };

        write_csv_chunked(&table, &path, &write_opts, &mut RecordingProgress::default()).unwrap();
        let mut progress = RecordingProgress::default();
        let read = read_csv_chunked(&path, &read_opts, &mut progress).unwrap();

        prop_assert_eq!(progress.total, Some(table.num_rows()));
        prop_assert_eq!(progress.chunks.iter().sum::<usize>(), table.num_rows());
        prop_assert_eq!(read, table);
    }
}
