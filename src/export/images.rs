use std::fs;
use std::path::{Path, PathBuf};

use crate::backend::{PageImage, PageNumber, decode_png_data_url};
use crate::error::{NoteError, NoteResult};

pub fn page_image_file_name(stem: &str, page: PageNumber) -> String {
    format!("{stem}-{page}.png")
}

/// Writes every image as `<stem>-<page>.png` under `dir`, creating it if needed.
pub fn write_page_images(
    dir: &Path,
    stem: &str,
    images: &[PageImage],
) -> NoteResult<Vec<PathBuf>> {
    fs::create_dir_all(dir).map_err(|source| {
        NoteError::io_with_context(source, format!("failed to create {}", dir.display()))
    })?;

    let mut written = Vec::with_capacity(images.len());
    for image in images {
        let png = decode_png_data_url(&image.data_url)?;
        let path = dir.join(page_image_file_name(stem, image.page));
        fs::write(&path, png).map_err(|source| {
            NoteError::io_with_context(source, format!("failed to write {}", path.display()))
        })?;
        written.push(path);
    }
    Ok(written)
}
