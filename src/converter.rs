use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{Note, NoteDecoder, PageImage, PageNumber, default_decoder};
use crate::config::ConvertConfig;
use crate::error::{NoteError, NoteResult};
use crate::render::WorkerPool;
use crate::stats::ConversionStats;

/// Worker count used when none is configured.
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Converts note pages to images on a worker pool owned by this session.
///
/// The pool is created lazily by [`ImageConverter::convert_to_images`], after
/// the inputs have been checked, and is torn down by
/// [`ImageConverter::terminate`] or when the converter is dropped.
pub struct ImageConverter {
    max_workers: usize,
    chunk_timeout: Option<Duration>,
    decoder: Arc<dyn NoteDecoder>,
    pool: Option<WorkerPool>,
    terminated: bool,
}

impl ImageConverter {
    /// `None` or `Some(0)` sizes the pool to the available parallelism.
    pub fn new(max_workers: Option<usize>) -> Self {
        Self::with_decoder(max_workers, default_decoder())
    }

    pub fn with_decoder(max_workers: Option<usize>, decoder: Arc<dyn NoteDecoder>) -> Self {
        let max_workers = match max_workers {
            Some(count) if count > 0 => count,
            _ => default_worker_count(),
        };
        Self {
            max_workers,
            chunk_timeout: None,
            decoder,
            pool: None,
            terminated: false,
        }
    }

    pub fn from_config(config: &ConvertConfig) -> Self {
        Self::new(Some(config.max_workers)).with_chunk_timeout(config.chunk_timeout())
    }

    pub fn with_chunk_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.chunk_timeout = timeout;
        self
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Workers currently alive for this session.
    pub fn workers_spawned(&self) -> usize {
        self.pool
            .as_ref()
            .filter(|pool| !pool.is_terminated())
            .map_or(0, WorkerPool::worker_count)
    }

    pub fn last_stats(&self) -> Option<&ConversionStats> {
        self.pool.as_ref().and_then(WorkerPool::last_stats)
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Renders `page_numbers` (all pages when `None`) of `note` from `source`.
    ///
    /// Fails before any worker exists when `source` is missing or malformed or
    /// a page number is invalid.
    pub async fn convert_to_images(
        &mut self,
        note: &Note,
        page_numbers: Option<&[PageNumber]>,
        source: Option<&[u8]>,
    ) -> NoteResult<Vec<PageImage>> {
        if self.terminated {
            return Err(NoteError::PoolTerminated);
        }
        let source = match source {
            Some(source) if !source.is_empty() => source,
            _ => return Err(NoteError::MissingSourceBuffer),
        };
        self.decoder.validate(source)?;

        let pages = match page_numbers {
            Some(pages) => {
                validate_page_numbers(pages, note.page_count())?;
                pages.to_vec()
            }
            None => note.all_page_numbers(),
        };
        if pages.is_empty() {
            return Ok(Vec::new());
        }

        // a fresh pool per conversion; workers never outlive their session
        if let Some(mut previous) = self.pool.take() {
            previous.terminate();
        }
        let pool = self.pool.insert(
            WorkerPool::new(self.max_workers, Arc::clone(&self.decoder))?
                .with_chunk_timeout(self.chunk_timeout),
        );
        pool.process_pages(&pages, source).await
    }

    /// Releases the workers. Idempotent, and also run on drop.
    pub fn terminate(&mut self) {
        if let Some(pool) = self.pool.as_mut() {
            pool.terminate();
        }
        self.terminated = true;
    }

    /// Runs one conversion on a throwaway converter and releases its workers
    /// whatever the outcome.
    pub async fn convert_once(
        mut self,
        note: &Note,
        page_numbers: Option<&[PageNumber]>,
        source: &[u8],
    ) -> NoteResult<Vec<PageImage>> {
        let result = self.convert_to_images(note, page_numbers, Some(source)).await;
        self.terminate();
        result
    }
}

impl Drop for ImageConverter {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn validate_page_numbers(pages: &[PageNumber], page_count: usize) -> NoteResult<()> {
    let mut seen = HashSet::with_capacity(pages.len());
    for &page in pages {
        if page == 0 {
            return Err(NoteError::invalid_argument("page numbers start at 1"));
        }
        if page as usize > page_count {
            return Err(NoteError::invalid_argument(format!(
                "page {page} is out of range (note has {page_count} pages)"
            )));
        }
        if !seen.insert(page) {
            return Err(NoteError::invalid_argument(format!(
                "page {page} is requested more than once"
            )));
        }
    }
    Ok(())
}
