mod images;
mod markdown;

pub use images::{page_image_file_name, write_page_images};
pub use markdown::MarkdownExporter;
