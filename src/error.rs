use crate::backend::PageNumber;

pub type NoteResult<T> = Result<T, NoteError>;

#[derive(thiserror::Error, Debug)]
pub enum NoteError {
    #[error("I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },
    #[error("malformed note buffer: {0}")]
    Malformed(String),
    #[error("note render failed for page {page}")]
    PageRender {
        page: PageNumber,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("no images generated for pages {pages:?}{}", last_error_suffix(.last_error))]
    NoImagesGenerated {
        pages: Vec<PageNumber>,
        last_error: Option<String>,
    },
    #[error("render worker fault: {0}")]
    WorkerFault(String),
    #[error("render chunk timed out after {elapsed_ms} ms for pages {pages:?}")]
    ChunkTimeout {
        pages: Vec<PageNumber>,
        elapsed_ms: u64,
    },
    #[error("source buffer is required to convert note pages")]
    MissingSourceBuffer,
    #[error("worker pool has been terminated")]
    PoolTerminated,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

fn last_error_suffix(last_error: &Option<String>) -> String {
    match last_error {
        Some(message) => format!(" (last error: {message})"),
        None => String::new(),
    }
}

impl From<std::io::Error> for NoteError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            source,
            context: "I/O operation failed".to_string(),
        }
    }
}

impl NoteError {
    pub fn io_with_context(source: std::io::Error, context: impl Into<String>) -> Self {
        Self::Io {
            source,
            context: context.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    pub fn page_render(
        page: PageNumber,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::PageRender {
            page,
            source: Box::new(source),
        }
    }

    pub fn page_render_message(page: PageNumber, message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::PageRender {
            page,
            source: message.into(),
        }
    }

    pub fn worker_fault(message: impl Into<String>) -> Self {
        Self::WorkerFault(message.into())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Message of the innermost cause, used when a page error is folded into a
    /// chunk-level error.
    pub fn detail(&self) -> String {
        match self {
            Self::PageRender { page, source } => format!("page {page}: {source}"),
            other => other.to_string(),
        }
    }
}
