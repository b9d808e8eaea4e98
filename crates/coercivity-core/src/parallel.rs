//! Ordered fan-out for the embarrassingly parallel scan loops.
//!
//! Rows are computed on a dedicated rayon pool of `workers` threads and
//! collected through an indexed iterator, so they come back in input order and
//! the output is the same for every worker count.

use rayon::prelude::*;

use crate::error::{CertifyError, Result};

/// Map `f` over `items` on a pool of `workers` threads, preserving order.
///
/// Every item is evaluated; the first error in input order is returned, so a
/// failing scan reports the same error regardless of scheduling.
pub fn ordered_map<T, R, F>(items: &[T], workers: usize, f: F) -> Result<Vec<R>>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> Result<R> + Sync + Send,
{
    if workers <= 1 || items.len() < 2 {
        return items.iter().map(&f).collect();
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|err| {
            CertifyError::configuration("workers", workers, format!("thread pool: {err}"))
        })?;
    let rows: Vec<Result<R>> = pool.install(|| items.par_iter().map(&f).collect());
    rows.into_iter().collect()
}
