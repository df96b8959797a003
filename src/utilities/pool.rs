//! Execution strategy for the embarrassingly parallel parts of the protocols.
//!
//! The base OTs of the correlated OT setup are independent of each other, and
//! so are the rows of the extension matrix. A [`Pool`] decides whether they run
//! on the calling thread or on a dedicated rayon thread pool.

use std::num::NonZeroUsize;
use std::sync::Arc;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("could not build the worker pool: {0}")]
    Build(#[from] ThreadPoolBuildError),
}

#[derive(Clone, Default)]
pub enum Pool {
    /// Everything runs on the caller's thread.
    #[default]
    Sequential,
    Parallel(Arc<ThreadPool>),
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Pool::Sequential => write!(f, "Pool::Sequential"),
            Pool::Parallel(pool) => write!(f, "Pool::Parallel({})", pool.current_num_threads()),
        }
    }
}

impl Pool {
    /// Builds a pool with `workers` threads.
    ///
    /// Zero workers means one per available execution unit.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the operating system refuses to spawn the threads.
    pub fn new(workers: usize) -> Result<Pool, PoolError> {
        let workers = if workers == 0 {
            std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
        } else {
            workers
        };

        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("ecdsa-ot-{index}"))
            .build()?;

        Ok(Pool::Parallel(Arc::new(pool)))
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        match self {
            Pool::Sequential => 1,
            Pool::Parallel(pool) => pool.current_num_threads(),
        }
    }

    /// Runs `f(i)` for every `i` in `0..count` and collects the results in order.
    pub fn map<T, F>(&self, count: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        match self {
            Pool::Sequential => (0..count).map(f).collect(),
            Pool::Parallel(pool) => pool.install(|| (0..count).into_par_iter().map(f).collect()),
        }
    }

    /// Consumes `items`, runs `f(i, item)` on each and collects the results in order.
    pub fn map_each<I, T, F>(&self, items: Vec<I>, f: F) -> Vec<T>
    where
        I: Send,
        T: Send,
        F: Fn(usize, I) -> T + Sync + Send,
    {
        match self {
            Pool::Sequential => items
                .into_iter()
                .enumerate()
                .map(|(index, item)| f(index, item))
                .collect(),
            Pool::Parallel(pool) => pool.install(|| {
                items
                    .into_par_iter()
                    .enumerate()
                    .map(|(index, item)| f(index, item))
                    .collect()
            }),
        }
    }

    /// Runs `f` until it has succeeded `count` times.
    ///
    /// On a parallel pool, every worker tries once per round, so a round may
    /// overshoot; the surplus is discarded.
    pub fn search<T, F>(&self, count: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn() -> Option<T> + Sync + Send,
    {
        let mut found: Vec<T> = Vec::with_capacity(count);
        match self {
            Pool::Sequential => {
                while found.len() < count {
                    if let Some(result) = f() {
                        found.push(result);
                    }
                }
            }
            Pool::Parallel(pool) => {
                let round = pool.current_num_threads();
                while found.len() < count {
                    let batch: Vec<T> =
                        pool.install(|| (0..round).into_par_iter().filter_map(|_| f()).collect());
                    found.extend(batch);
                }
                found.truncate(count);
            }
        }
        found
    }
}
