use std::collections::BTreeSet;
use std::time::Duration;

/// Summary of one `process_pages` call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConversionStats {
    pub pages_requested: usize,
    pub pages_rendered: usize,
    pub chunks_dispatched: usize,
    pub workers_used: usize,
    pub elapsed: Duration,
    workers: BTreeSet<usize>,
}

impl ConversionStats {
    pub fn new(pages_requested: usize) -> Self {
        Self {
            pages_requested,
            ..Self::default()
        }
    }

    pub fn record_dispatch(&mut self, worker: usize) {
        self.chunks_dispatched += 1;
        self.workers.insert(worker);
        self.workers_used = self.workers.len();
    }

    pub fn record_completion(&mut self, pages_rendered: usize, elapsed: Duration) {
        self.pages_rendered = pages_rendered;
        self.elapsed = elapsed;
    }

    pub fn pages_dropped(&self) -> usize {
        self.pages_requested.saturating_sub(self.pages_rendered)
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}
