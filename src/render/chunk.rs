use crate::backend::PageNumber;

/// One chunk of pages bound for a worker, with its own copy of the source.
#[derive(Debug)]
pub(crate) struct ChunkDispatch {
    pub(crate) worker: usize,
    pub(crate) pages: Vec<PageNumber>,
    pub(crate) buffer: Vec<u8>,
}

/// Splits `pages` into contiguous chunks of `ceil(len / workers)` pages,
/// preserving order within and across chunks.
pub fn partition(pages: &[PageNumber], workers: usize) -> Vec<Vec<PageNumber>> {
    if pages.is_empty() {
        return Vec::new();
    }
    let chunk_len = pages.len().div_ceil(workers.max(1));
    pages.chunks(chunk_len).map(<[PageNumber]>::to_vec).collect()
}

/// Assigns chunk `i` to worker `i % workers`. Every dispatch owns a fresh copy
/// of `source`; no two dispatches share an allocation.
pub(crate) fn plan_dispatch(
    source: &[u8],
    pages: &[PageNumber],
    workers: usize,
) -> Vec<ChunkDispatch> {
    let workers = workers.max(1);
    partition(pages, workers)
        .into_iter()
        .enumerate()
        .map(|(index, pages)| ChunkDispatch {
            worker: index % workers,
            pages,
            buffer: source.to_vec(),
        })
        .collect()
}
