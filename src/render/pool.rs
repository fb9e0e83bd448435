use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::try_join_all;
use tokio::sync::oneshot;

use crate::backend::{NoteDecoder, PageImage, PageNumber};
use crate::error::{NoteError, NoteResult};
use crate::stats::ConversionStats;

use super::chunk::plan_dispatch;
use super::worker::{ChunkOutcome, RenderWorker};

/// Fixed set of render workers for one conversion session.
pub struct WorkerPool {
    workers: Vec<RenderWorker>,
    chunk_timeout: Option<Duration>,
    last_stats: Option<ConversionStats>,
    terminated: bool,
}

impl WorkerPool {
    pub fn new(worker_count: usize, decoder: Arc<dyn NoteDecoder>) -> NoteResult<Self> {
        let worker_count = worker_count.max(1);
        let workers = (0..worker_count)
            .map(|id| RenderWorker::spawn(id, Arc::clone(&decoder)))
            .collect::<NoteResult<Vec<_>>>()?;
        log::debug!("spawned {worker_count} render workers");

        Ok(Self {
            workers,
            chunk_timeout: None,
            last_stats: None,
            terminated: false,
        })
    }

    /// A chunk that does not answer within `timeout` fails the whole call.
    pub fn with_chunk_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.chunk_timeout = timeout;
        self
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn last_stats(&self) -> Option<&ConversionStats> {
        self.last_stats.as_ref()
    }

    /// Renders `page_numbers` from `source` across the pool.
    ///
    /// Every chunk is dispatched before any reply is awaited. Output keeps the
    /// input order; pages that failed inside a chunk are missing from it. A
    /// chunk that produced nothing, faulted or timed out fails the whole call.
    pub async fn process_pages(
        &mut self,
        page_numbers: &[PageNumber],
        source: &[u8],
    ) -> NoteResult<Vec<PageImage>> {
        if self.terminated {
            return Err(NoteError::PoolTerminated);
        }
        let started = Instant::now();
        let mut stats = ConversionStats::new(page_numbers.len());
        if page_numbers.is_empty() {
            self.last_stats = Some(stats);
            return Ok(Vec::new());
        }

        let dispatches = plan_dispatch(source, page_numbers, self.workers.len());
        let mut pending = Vec::with_capacity(dispatches.len());
        for dispatch in dispatches {
            let pages = dispatch.pages.clone();
            let reply = self.workers[dispatch.worker].dispatch(dispatch.buffer, dispatch.pages)?;
            stats.record_dispatch(dispatch.worker);
            pending.push(await_chunk(reply, pages, self.chunk_timeout));
        }
        log::debug!(
            "dispatched {} chunks for {} pages",
            stats.chunks_dispatched,
            page_numbers.len()
        );

        let chunks = try_join_all(pending).await?;
        let images = chunks.into_iter().flatten().collect::<Vec<_>>();

        stats.record_completion(images.len(), started.elapsed());
        log::debug!(
            "rendered {} of {} pages on {} workers in {:.1} ms",
            stats.pages_rendered,
            stats.pages_requested,
            stats.workers_used,
            stats.elapsed_ms()
        );
        if stats.pages_dropped() > 0 {
            log::warn!(
                "{} of {} pages could not be rendered",
                stats.pages_dropped(),
                stats.pages_requested
            );
        }
        self.last_stats = Some(stats);
        Ok(images)
    }

    /// Shuts every worker down. Safe to call more than once.
    pub fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        for worker in &mut self.workers {
            worker.shutdown();
        }
        self.terminated = true;
        log::debug!("terminated {} render workers", self.workers.len());
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.terminate();
    }
}

async fn await_chunk(
    reply: oneshot::Receiver<ChunkOutcome>,
    pages: Vec<PageNumber>,
    timeout: Option<Duration>,
) -> ChunkOutcome {
    let received = match timeout {
        Some(limit) => tokio::time::timeout(limit, reply)
            .await
            .map_err(|_| NoteError::ChunkTimeout {
                pages: pages.clone(),
                elapsed_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
            })?,
        None => reply.await,
    };
    received.map_err(|_| {
        NoteError::worker_fault(format!(
            "render worker exited before replying for pages {pages:?}"
        ))
    })?
}
