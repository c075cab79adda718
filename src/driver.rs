//! Fans one truncated search per vertex out over a rayon pool.
//!
//! Each rayon leaf job gets its own [`SearchScratch`] through `map_init`, so a
//! scratch instance only ever serves one search at a time. Leaves are at
//! least `n / (threads * SPLITS_PER_THREAD)` vertices long, which bounds the
//! number of O(V) scratch allocations by a small multiple of the pool size.
//! The graph itself is shared read-only.

use std::sync::atomic::{AtomicU64, Ordering};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::info;

use crate::error::{KnnError, Result};
use crate::graph::Graph;
use crate::search::{nearest_neighbours, NeighbourRow, SearchScratch, SearchStats};

/// Rows buffered between the workers and a streaming sink.
const STREAM_BUFFER: usize = 1024;

/// Leaf jobs per worker; a little over one so stealing can balance skew.
pub const SPLITS_PER_THREAD: usize = 4;

/// Rejects `k` that no row of an `n`-vertex graph could fill.
pub fn validate_k(vertices: usize, k: usize) -> Result<()> {
    if vertices == 0 { return Err(KnnError::EmptyGraph); }
    if k > vertices - 1 { return Err(KnnError::TooManyNeighbours { k, vertices }); }
    Ok(())
}

/// Rows indexed by source vertex plus the merged search counters.
#[derive(Debug, Clone)]
pub struct Sweep {
    pub rows: Vec<NeighbourRow>,
    pub stats: SearchStats,
}

pub struct Driver {
    pool: Option<ThreadPool>,
}

impl Driver {
    /// `threads = None` runs on the global rayon pool.
    pub fn new(threads: Option<usize>) -> Result<Self> {
        let pool = match threads {
            Some(n) => Some(
                ThreadPoolBuilder::new()
                    .num_threads(n)
                    .thread_name(|i| format!("knn-worker-{i}"))
                    .build()
                    .map_err(|e| KnnError::ThreadPool(e.to_string()))?,
            ),
            None => None,
        };
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.as_ref().map_or_else(rayon::current_num_threads, ThreadPool::current_num_threads)
    }

    /// Shortest run of consecutive sources one scratch instance serves.
    fn leaf_len(&self, n: usize) -> usize {
        n.div_ceil(self.threads() * SPLITS_PER_THREAD).max(1)
    }

    fn install<T: Send>(&self, f: impl FnOnce() -> T + Send) -> T {
        match &self.pool {
            Some(pool) => pool.install(f),
            None => f(),
        }
    }

    /// Searches every vertex and returns rows in dense-index order.
    pub fn sweep(&self, graph: &Graph, k: usize) -> Result<Sweep> {
        let n = graph.vertex_count();
        validate_k(n, k)?;
        let view = graph.view();
        let min_len = self.leaf_len(n);
        let allocations = AtomicU64::new(0);
        let results: Vec<(NeighbourRow, SearchStats)> = self.install(|| {
            (0..n as u32)
                .into_par_iter()
                .with_min_len(min_len)
                .map_init(
                    || { allocations.fetch_add(1, Ordering::Relaxed); SearchScratch::new(n) },
                    |scratch, source| {
                        let row = nearest_neighbours(view, source, k, scratch)?;
                        Ok((row, scratch.take_stats()))
                    },
                )
                .collect::<Result<Vec<_>>>()
        })?;

        let mut stats = SearchStats::default();
        let rows = results
            .into_iter()
            .map(|(row, s)| { stats.merge(&s); row })
            .collect();
        stats.scratch_allocations = allocations.into_inner();
        info!(rows = n, k, padded_rows = stats.padded_rows, relaxations = stats.relaxations, "sweep complete");
        Ok(Sweep { rows, stats })
    }

    /// Searches every vertex, handing each row to `sink` as soon as it is
    /// ready. Row order is arbitrary. The first sink error stops the sweep.
    pub fn sweep_streaming<F>(&self, graph: &Graph, k: usize, mut sink: F) -> Result<SearchStats>
    where
        F: FnMut(NeighbourRow) -> Result<()>,
    {
        let n = graph.vertex_count();
        validate_k(n, k)?;
        let view = graph.view();
        let min_len = self.leaf_len(n);
        let allocations = AtomicU64::new(0);

        std::thread::scope(|scope| {
            let (tx, rx) = crossbeam_channel::bounded::<(NeighbourRow, SearchStats)>(STREAM_BUFFER);
            let allocations = &allocations;
            let producer = scope.spawn(move || {
                self.install(|| {
                    (0..n as u32).into_par_iter().with_min_len(min_len).try_for_each_init(
                        || { allocations.fetch_add(1, Ordering::Relaxed); (SearchScratch::new(n), tx.clone()) },
                        |(scratch, tx), source| {
                            let row = nearest_neighbours(view, source, k, scratch)?;
                            tx.send((row, scratch.take_stats()))
                                .map_err(|_| KnnError::Internal("row sink closed early".into()))
                        },
                    )
                })
            });

            let mut stats = SearchStats::default();
            let mut sink_error = None;
            while let Ok((row, s)) = rx.recv() {
                stats.merge(&s);
                if let Err(e) = sink(row) {
                    sink_error = Some(e);
                    break;
                }
            }
            drop(rx);

            let produced = producer
                .join()
                .map_err(|_| KnnError::Internal("search worker panicked".into()))?;
            if let Some(e) = sink_error { return Err(e); }
            produced?;
            stats.scratch_allocations = allocations.load(Ordering::Relaxed);
            info!(rows = stats.searches, k, padded_rows = stats.padded_rows, relaxations = stats.relaxations, "sweep complete");
            Ok(stats)
        })
    }
}
