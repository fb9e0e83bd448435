use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::backend::{Note, PageImage};
use crate::config::ExportConfig;
use crate::error::{NoteError, NoteResult};

use super::images::{page_image_file_name, write_page_images};

/// Renders converted pages as a markdown document, one section per page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownExporter {
    inline_images: bool,
    include_text: bool,
    image_dir: String,
}

impl Default for MarkdownExporter {
    fn default() -> Self {
        Self::from_config(&ExportConfig::default())
    }
}

impl MarkdownExporter {
    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            inline_images: config.inline_images,
            include_text: config.include_text,
            image_dir: config.image_dir.clone(),
        }
    }

    pub fn render(&self, title: &str, note: &Note, images: &[PageImage]) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# {title}");

        for image in images {
            let _ = writeln!(out, "\n## Page {}\n", image.page);
            let target = if self.inline_images {
                image.data_url.clone()
            } else {
                format!(
                    "{}/{}",
                    self.image_dir,
                    page_image_file_name(title, image.page)
                )
            };
            let _ = writeln!(out, "![{title} page {}]({target})", image.page);

            if !self.include_text {
                continue;
            }
            let text = note
                .page(image.page)
                .ok()
                .and_then(|page| page.recognized_text.as_deref());
            if let Some(text) = text {
                let _ = writeln!(out, "\n{text}");
            }
        }
        out
    }

    /// Writes `<title>.md` into `out_dir`, plus the page PNGs under the image
    /// directory unless images are inlined. Returns the markdown path.
    pub fn export(
        &self,
        out_dir: &Path,
        title: &str,
        note: &Note,
        images: &[PageImage],
    ) -> NoteResult<PathBuf> {
        if !self.inline_images {
            write_page_images(&out_dir.join(&self.image_dir), title, images)?;
        }
        fs::create_dir_all(out_dir).map_err(|source| {
            NoteError::io_with_context(source, format!("failed to create {}", out_dir.display()))
        })?;
        let path = out_dir.join(format!("{title}.md"));
        fs::write(&path, self.render(title, note, images)).map_err(|source| {
            NoteError::io_with_context(source, format!("failed to write {}", path.display()))
        })?;
        Ok(path)
    }
}
