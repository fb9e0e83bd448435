use std::path::Path;
use std::sync::Arc;

use crate::error::{NoteError, NoteResult};

mod encode;
pub mod rle;
mod supernote;
mod traits;

#[cfg(test)]
pub(crate) mod fixtures;

pub use encode::decode_png_data_url;
pub use supernote::SupernoteDecoder;
pub use traits::{Layer, Note, NoteDecoder, Page, PageImage, PageNumber, RasterImage};

pub fn default_decoder() -> Arc<dyn NoteDecoder> {
    Arc::new(SupernoteDecoder)
}

pub fn load_note_bytes(path: impl AsRef<Path>) -> NoteResult<Vec<u8>> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Err(NoteError::invalid_argument("note path must not be empty"));
    }
    if !path.is_file() {
        return Err(NoteError::io_with_context(
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing file"),
            format!("note file not found: {}", path.display()),
        ));
    }
    std::fs::read(path).map_err(|source| {
        NoteError::io_with_context(source, format!("failed to read note: {}", path.display()))
    })
}
