use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use flume::{Receiver, Sender};
use tokio::sync::oneshot;

use crate::backend::{Note, NoteDecoder, PageImage, PageNumber};
use crate::error::{NoteError, NoteResult};

pub(crate) type ChunkOutcome = NoteResult<Vec<PageImage>>;

pub(crate) enum RenderWorkerRequest {
    /// The buffer is moved into the worker; the sender keeps no handle to it.
    Convert {
        buffer: Vec<u8>,
        page_numbers: Vec<PageNumber>,
        reply: oneshot::Sender<ChunkOutcome>,
    },
    Shutdown,
}

/// A dedicated thread that decodes one buffer per request and rasterizes the
/// requested pages. Holds no state between requests.
pub(crate) struct RenderWorker {
    id: usize,
    request_tx: Option<Sender<RenderWorkerRequest>>,
    thread: Option<JoinHandle<()>>,
}

impl RenderWorker {
    pub(crate) fn spawn(id: usize, decoder: Arc<dyn NoteDecoder>) -> NoteResult<Self> {
        let (request_tx, request_rx) = flume::unbounded();
        let thread = thread::Builder::new()
            .name(format!("snr-render-{id}"))
            .spawn(move || render_worker_main(id, decoder, request_rx))
            .map_err(|source| {
                NoteError::io_with_context(source, format!("failed to spawn render worker {id}"))
            })?;

        Ok(Self {
            id,
            request_tx: Some(request_tx),
            thread: Some(thread),
        })
    }

    pub(crate) fn dispatch(
        &self,
        buffer: Vec<u8>,
        page_numbers: Vec<PageNumber>,
    ) -> NoteResult<oneshot::Receiver<ChunkOutcome>> {
        let request_tx = self.request_tx.as_ref().ok_or(NoteError::PoolTerminated)?;
        let (reply, reply_rx) = oneshot::channel();
        request_tx
            .send(RenderWorkerRequest::Convert {
                buffer,
                page_numbers,
                reply,
            })
            .map_err(|_| {
                NoteError::worker_fault(format!("render worker {} is not running", self.id))
            })?;
        Ok(reply_rx)
    }

    /// Stops accepting requests. A request still running is abandoned: the
    /// thread is detached rather than joined.
    pub(crate) fn shutdown(&mut self) {
        if let Some(request_tx) = self.request_tx.take() {
            let _ = request_tx.send(RenderWorkerRequest::Shutdown);
        }
        self.thread.take();
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub(crate) fn is_running(&self) -> bool {
        self.request_tx.is_some()
    }
}

impl Drop for RenderWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn render_worker_main(
    id: usize,
    decoder: Arc<dyn NoteDecoder>,
    request_rx: Receiver<RenderWorkerRequest>,
) {
    while let Ok(request) = request_rx.recv() {
        match request {
            RenderWorkerRequest::Convert {
                buffer,
                page_numbers,
                reply,
            } => {
                if reply.is_closed() {
                    continue;
                }
                let started = Instant::now();
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    convert_chunk(decoder.as_ref(), buffer, &page_numbers)
                }))
                .unwrap_or_else(|payload| {
                    Err(NoteError::worker_fault(format!(
                        "render worker {id} panicked: {}",
                        panic_message(payload.as_ref())
                    )))
                });
                log::debug!(
                    "render worker {id} finished pages {page_numbers:?} in {:?}",
                    started.elapsed()
                );
                let _ = reply.send(outcome);
            }
            RenderWorkerRequest::Shutdown => break,
        }
    }
}

/// Decodes `buffer` and renders each page independently. Failed pages are
/// logged and left out; the chunk only fails when nothing was produced.
pub(crate) fn convert_chunk(
    decoder: &dyn NoteDecoder,
    buffer: Vec<u8>,
    page_numbers: &[PageNumber],
) -> ChunkOutcome {
    let note = decoder.decode(buffer).map_err(|err| match err {
        NoteError::Malformed(_) => err,
        other => NoteError::malformed(other.to_string()),
    })?;

    let mut images = Vec::with_capacity(page_numbers.len());
    let mut last_error = None;
    for &page in page_numbers {
        match render_page(decoder, &note, page) {
            Ok(image) => images.push(image),
            Err(err) => {
                let detail = err.detail();
                log::warn!("skipping note page {page}: {detail}");
                last_error = Some(detail);
            }
        }
    }

    if images.is_empty() {
        return Err(NoteError::NoImagesGenerated {
            pages: page_numbers.to_vec(),
            last_error,
        });
    }
    Ok(images)
}

fn render_page(
    decoder: &dyn NoteDecoder,
    note: &Note,
    page: PageNumber,
) -> NoteResult<PageImage> {
    let rendered = panic::catch_unwind(AssertUnwindSafe(|| decoder.rasterize(note, page)))
        .map_err(|payload| {
            NoteError::page_render_message(
                page,
                format!("rasterizer panicked: {}", panic_message(payload.as_ref())),
            )
        })?;
    let raster = rendered.map_err(|err| match err {
        NoteError::PageRender { .. } => err,
        other => NoteError::page_render(page, other),
    })?;
    log::trace!(
        "page {page} rasterized to {}x{} ({} bytes)",
        raster.width,
        raster.height,
        raster.byte_len()
    );
    let data_url = raster
        .to_data_url()
        .map_err(|err| NoteError::page_render(page, err))?;
    Ok(PageImage { page, data_url })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "unknown panic".to_string()
}
