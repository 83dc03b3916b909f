//! Per-item execution strategies

use rayon::prelude::*;
use thiserror::Error;

/// Errors from setting up a worker pool
#[derive(Error, Debug)]
pub enum ParallelError {
    #[error("failed to build worker pool with {threads} threads: {reason}")]
    PoolBuild { threads: usize, reason: String },
}

/// How independent work items are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingMode {
    /// One item after another on the calling thread
    #[default]
    Sequential,
    /// Rayon's global pool, one worker per core
    Parallel,
    /// A dedicated pool with at most this many workers
    ParallelWith(usize),
}

impl ProcessingMode {
    /// Mode for a worker count: `1` is sequential, `0` means all cores,
    /// anything else bounds the pool.
    pub fn from_workers(workers: usize) -> Self {
        match workers {
            1 => ProcessingMode::Sequential,
            0 => ProcessingMode::Parallel,
            n => ProcessingMode::ParallelWith(n),
        }
    }

    /// Number of items that may run at once
    pub fn workers(&self) -> usize {
        match self {
            ProcessingMode::Sequential => 1,
            ProcessingMode::Parallel => num_cpus(),
            ProcessingMode::ParallelWith(n) => *n,
        }
    }
}

/// Strategy for running a function over independent items.
///
/// Results come back in input order regardless of completion order, so the
/// caller only ever reads a completed collection.
pub trait ParallelStrategy {
    fn par_map<I, T, F>(&self, items: &[I], f: F) -> Result<Vec<T>, ParallelError>
    where
        I: Sync,
        T: Send,
        F: Fn(&I) -> T + Sync + Send;
}

impl ParallelStrategy for ProcessingMode {
    fn par_map<I, T, F>(&self, items: &[I], f: F) -> Result<Vec<T>, ParallelError>
    where
        I: Sync,
        T: Send,
        F: Fn(&I) -> T + Sync + Send,
    {
        match self {
            ProcessingMode::Sequential => Ok(items.iter().map(f).collect()),
            ProcessingMode::Parallel => Ok(items.par_iter().map(f).collect()),
            ProcessingMode::ParallelWith(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(*threads)
                    .build()
                    .map_err(|e| ParallelError::PoolBuild {
                        threads: *threads,
                        reason: e.to_string(),
                    })?;
                Ok(pool.install(|| items.par_iter().map(f).collect()))
            }
        }
    }
}

/// Get the number of available CPU cores
pub fn num_cpus() -> usize {
    rayon::current_num_threads()
}
