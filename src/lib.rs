//! Parallel page rendering for Supernote `.note` files.
//!
//! [`converter::ImageConverter`] is the entry point: it validates a request,
//! spins up a [`render::WorkerPool`] for the session and returns one PNG data
//! URL per successfully rendered page, in request order.

pub mod backend;
pub mod config;
pub mod converter;
pub mod error;
pub mod export;
pub mod render;
pub mod stats;

pub use backend::{Note, NoteDecoder, PageImage, PageNumber, SupernoteDecoder};
pub use converter::ImageConverter;
pub use error::{NoteError, NoteResult};
pub use render::WorkerPool;
