//! Progress reporting for chunked transfers.

/// Receives progress updates from a chunked read or write.
///
/// Implementations observe the transfer only; they never influence what is
/// read or written.
pub trait ProgressSink {
    /// Called once before the first chunk with the total number of rows.
    fn start(&mut self, total_rows: usize);

    /// Called after each chunk with the number of rows it carried.
    fn advance(&mut self, rows: usize);

    /// Called once after the last chunk.
    fn finish(&mut self) {}
}

/// Discards all progress updates.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn start(&mut self, _total_rows: usize) {}

    fn advance(&mut self, _rows: usize) {}
}

/// Emits one `tracing` event per chunk.
#[derive(Clone, Debug)]
pub struct TracingProgress {
    label: &'static str,
    total: usize,
    done: usize,
}

impl TracingProgress {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            total: 0,
            done: 0,
        }
    }
}

impl ProgressSink for TracingProgress {
    fn start(&mut self, total_rows: usize) {
        self.total = total_rows;
        self.done = 0;
    }

    fn advance(&mut self, rows: usize) {
        self.done += rows;
        tracing::info!(
            operation = self.label,
            rows = self.done,
            total = self.total,
            "rows {}",
            self.label
        );
    }

    fn finish(&mut self) {
        tracing::debug!(operation = self.label, rows = self.done, "chunked transfer complete");
    }
}

/// Records every update; handy for asserting on chunk boundaries.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordingProgress {
    pub total: Option<usize>,
    pub chunks: Vec<usize>,
    pub finished: bool,
}

impl ProgressSink for RecordingProgress {
    fn start(&mut self, total_rows: usize) {
        self.total = Some(total_rows);
    }

    fn advance(&mut self, rows: usize) {
        self.chunks.push(rows);
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}
