use std::ops::Range;
use std::sync::Arc;

use crate::error::{NoteError, NoteResult};

/// 1-based index into a note's pages.
pub type PageNumber = u32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    /// 8-bit grayscale, row-major.
    pub pixels: Arc<[u8]>,
}

impl RasterImage {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> NoteResult<Self> {
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(NoteError::invalid_argument(format!(
                "raster pixel length {} does not match {width}x{height}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels: pixels.into(),
        })
    }

    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }
}

/// One encoded output image, tagged with the page it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    pub page: PageNumber,
    pub data_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    pub name: String,
    pub protocol: String,
    /// Encoded bitmap location inside the note buffer; see [`Note::layer_bytes`].
    pub bitmap: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub number: PageNumber,
    pub layers: Vec<Layer>,
    pub recognized_text: Option<String>,
}

impl Page {
    pub fn blank(number: PageNumber) -> Self {
        Self {
            number,
            layers: Vec::new(),
            recognized_text: None,
        }
    }
}

/// Decoded note. Owned by the thread that decoded it; workers decode their own
/// copy from raw bytes instead of receiving one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub width: u32,
    pub height: u32,
    pub pages: Vec<Page>,
    bytes: Vec<u8>,
}

impl Note {
    pub fn new(width: u32, height: u32, pages: Vec<Page>, bytes: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pages,
            bytes,
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page(&self, number: PageNumber) -> NoteResult<&Page> {
        let index = (number as usize)
            .checked_sub(1)
            .ok_or(NoteError::invalid_argument("page numbers start at 1"))?;
        self.pages
            .get(index)
            .ok_or(NoteError::invalid_argument("page number is out of range"))
    }

    pub fn all_page_numbers(&self) -> Vec<PageNumber> {
        (1..=self.pages.len() as PageNumber).collect()
    }

    pub fn layer_bytes(&self, layer: &Layer) -> NoteResult<&[u8]> {
        self.bytes.get(layer.bitmap.clone()).ok_or_else(|| {
            NoteError::malformed(format!("layer {} bitmap is out of bounds", layer.name))
        })
    }
}

/// Decode and rasterize capability consumed by render workers.
///
/// `rasterize` works on one page at a time so a failing page never takes its
/// neighbours down with it.
pub trait NoteDecoder: Send + Sync + 'static {
    /// Cheap structural check run before any worker is spawned.
    fn validate(&self, bytes: &[u8]) -> NoteResult<()>;
    fn decode(&self, bytes: Vec<u8>) -> NoteResult<Note>;
    fn rasterize(&self, note: &Note, page: PageNumber) -> NoteResult<RasterImage>;
}
