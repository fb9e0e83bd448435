pub mod chunk;
pub mod pool;
pub(crate) mod worker;

#[cfg(test)]
pub(crate) mod tests;

pub use chunk::partition;
pub use pool::WorkerPool;
