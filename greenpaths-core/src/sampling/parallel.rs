//! Optional chunked data-parallel execution of pure per-row transforms

use log::debug;
use rayon::prelude::*;

/// Number of chunks for `rows` rows on a machine with `cores` cores.
/// Small inputs use a quarter of the cores, medium ones half, large ones all
/// but one.
pub fn chunk_count(rows: usize, cores: usize) -> usize {
    let chunks = if rows < 10_000 {
        cores / 4
    } else if rows < 100_000 {
        cores / 2
    } else {
        cores.saturating_sub(1)
    };
    chunks.max(1)
}

/// Worker threads of the rayon pool the caller runs in
pub fn available_cores() -> usize {
    rayon::current_num_threads()
}

/// Splits `rows` into contiguous chunks, applies `transform` to every row on
/// the rayon pool and concatenates the surviving rows in input order
pub fn apply_chunked<T, F>(rows: Vec<T>, transform: F) -> Vec<T>
where
    T: Send,
    F: Fn(T) -> Option<T> + Sync,
{
    let row_count = rows.len();
    let chunks = chunk_count(row_count, available_cores());
    let chunk_size = row_count.div_ceil(chunks).max(1);
    debug!("Transforming {row_count} rows in {chunks} chunks");

    let mut chunked: Vec<Vec<T>> = Vec::with_capacity(chunks);
    let mut rows = rows.into_iter().peekable();
    while rows.peek().is_some() {
        chunked.push(rows.by_ref().take(chunk_size).collect());
    }

    chunked
        .into_par_iter()
        .map(|chunk| chunk.into_iter().filter_map(&transform).collect::<Vec<_>>())
        .collect::<Vec<_>>()
        .into_iter()
        .flatten()
        .collect()
}
