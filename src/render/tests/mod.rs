use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Barrier, Mutex};
use std::time::Duration;

use crate::backend::{Note, NoteDecoder, Page, PageNumber, RasterImage};
use crate::error::{NoteError, NoteResult};


const FAKE_SIGNATURE: &[u8] = b"FAKENOTE";
const FAKE_MIN_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DecodeRecord {
    pub(crate) thread: String,
    pub(crate) buffer_ptr: usize,
}

/// In-memory decoder whose pages can be told to fail, panic or hang.
pub(crate) struct FakeDecoder {
    page_count: u32,
    failing: Vec<PageNumber>,
    panicking: Vec<PageNumber>,
    hang: Option<Duration>,
    decode_panics: AtomicUsize,
    decode_barrier: Option<Barrier>,
    rasterize_calls: AtomicUsize,
    decodes: Mutex<Vec<DecodeRecord>>,
}

impl FakeDecoder {
    pub(crate) fn with_pages(page_count: u32) -> Self {
        Self {
            page_count,
            failing: Vec::new(),
            panicking: Vec::new(),
            hang: None,
            decode_panics: AtomicUsize::new(0),
            decode_barrier: None,
            rasterize_calls: AtomicUsize::new(0),
            decodes: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn buffer() -> Vec<u8> {
        let mut buffer = FAKE_SIGNATURE.to_vec();
        buffer.resize(64, 0);
        buffer
    }

    pub(crate) fn failing(mut self, pages: &[PageNumber]) -> Self {
        self.failing = pages.to_vec();
        self
    }

    pub(crate) fn panicking(mut self, pages: &[PageNumber]) -> Self {
        self.panicking = pages.to_vec();
        self
    }

    pub(crate) fn hanging(mut self, duration: Duration) -> Self {
        self.hang = Some(duration);
        self
    }

    /// The next `times` decodes panic; later ones succeed.
    pub(crate) fn panicking_on_decode(self, times: usize) -> Self {
        self.decode_panics.store(times, Ordering::SeqCst);
        self
    }

    /// Every decode blocks until `parties` decodes are in flight at once.
    pub(crate) fn rendezvous(mut self, parties: usize) -> Self {
        self.decode_barrier = Some(Barrier::new(parties));
        self
    }

    pub(crate) fn rasterize_calls(&self) -> usize {
        self.rasterize_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn decodes(&self) -> Vec<DecodeRecord> {
        self.decodes
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

impl NoteDecoder for FakeDecoder {
    fn validate(&self, bytes: &[u8]) -> NoteResult<()> {
        if bytes.len() < FAKE_MIN_LEN {
            return Err(NoteError::malformed(format!(
                "buffer too small: {} bytes",
                bytes.len()
            )));
        }
        if !bytes.starts_with(FAKE_SIGNATURE) {
            return Err(NoteError::malformed("missing fake signature"));
        }
        Ok(())
    }

    fn decode(&self, bytes: Vec<u8>) -> NoteResult<Note> {
        self.validate(&bytes)?;
        let should_panic = self
            .decode_panics
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if should_panic {
            panic!("fake decoder panic");
        }
        if let Ok(mut records) = self.decodes.lock() {
            records.push(DecodeRecord {
                thread: std::thread::current()
                    .name()
                    .unwrap_or_default()
                    .to_string(),
                buffer_ptr: bytes.as_ptr() as usize,
            });
        }
        let note = Note::new(
            2,
            2,
            (1..=self.page_count).map(Page::blank).collect(),
            bytes,
        );
        if let Some(barrier) = &self.decode_barrier {
            barrier.wait();
        }
        Ok(note)
    }

    fn rasterize(&self, note: &Note, page: PageNumber) -> NoteResult<RasterImage> {
        self.rasterize_calls.fetch_add(1, Ordering::SeqCst);
        note.page(page)?;
        if let Some(hang) = self.hang {
            std::thread::sleep(hang);
        }
        if self.panicking.contains(&page) {
            panic!("fake rasterizer panic on page {page}");
        }
        if self.failing.contains(&page) {
            return Err(NoteError::page_render_message(page, "fake decode failure"));
        }
        RasterImage::new(2, 2, vec![page as u8; 4])
    }
}
