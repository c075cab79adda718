//! K-nearest-neighbour lists over a weighted undirected graph, computed with
//! a Dijkstra search truncated after K discoveries per vertex.
//!
//! Pipeline: [`graph::load_graph`] renumbers tags and builds the CSR
//! adjacency, [`driver::Driver`] runs [`search::nearest_neighbours`] for every
//! vertex in parallel, and [`emit::RowEmitter`] writes one fixed-width row per
//! vertex. [`run`] wires the three together.
//!
//! A single-row search is also exposed via a stable C ABI (`knn_run_row`).

use core::slice;
use std::io::{BufRead, Write};
use std::time::Instant;

use serde::Serialize;
use tracing::info;

pub mod config;
pub mod driver;
pub mod emit;
pub mod error;
pub mod graph;
pub mod search;

pub use config::KnnConfig;
pub use driver::{validate_k, Driver, Sweep};
pub use emit::{format_distance, write_row, RowEmitter};
pub use error::{KnnError, Result};
pub use graph::{load_graph, raw_weight_to_cost, CsrView, Graph, GraphLoader, LoadedGraph, VertexMap};
pub use search::{nearest_neighbours, NeighbourRow, SearchScratch, SearchStats, SENTINEL_DISTANCE};

/// Totals for one end-to-end run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub vertices: usize,
    pub arcs: usize,
    pub k: usize,
    pub threads: usize,
    pub ordered: bool,
    pub rows_written: u64,
    pub stats: SearchStats,
    pub load_ms: f64,
    pub search_ms: f64,
}

/// Loads `input`, writes the tag mapping to `mapping`, and emits every
/// vertex's row to `output`.
pub fn run<R, M, O>(config: &KnnConfig, input: R, mapping: M, output: O) -> Result<RunSummary>
where
    R: BufRead,
    M: Write,
    O: Write,
{
    let t0 = Instant::now();
    let LoadedGraph { graph, .. } = load_graph(input, mapping)?;
    let load_ms = t0.elapsed().as_secs_f64() * 1000.0;
    validate_k(graph.vertex_count(), config.k)?;

    let driver = Driver::new(config.threads)?;
    let mut emitter = RowEmitter::new(output);
    let t1 = Instant::now();
    let stats = if config.ordered {
        let sweep = driver.sweep(&graph, config.k)?;
        for row in &sweep.rows { emitter.emit(row)?; }
        sweep.stats
    } else {
        driver.sweep_streaming(&graph, config.k, |row| emitter.emit(&row))?
    };
    let rows_written = emitter.rows_written();
    emitter.finish()?;
    let search_ms = t1.elapsed().as_secs_f64() * 1000.0;

    info!(rows = rows_written, load_ms, search_ms, "neighbour lists written");
    Ok(RunSummary {
        vertices: graph.vertex_count(),
        arcs: graph.arc_count(),
        k: config.k,
        threads: driver.threads(),
        ordered: config.ordered,
        rows_written,
        stats,
        load_ms,
        search_ms,
    })
}

// ---------------- C ABI ----------------

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct KnnRowInfo {
    pub relaxations: u64,
    pub heap_pushes: u64,
    pub heap_pops: u64,
    pub padded: u32,   // sentinel slots at the end of the row
    pub error_code: i32, // 0 == success
}

#[inline(always)]
unsafe fn as_slice<'a, T>(ptr: *const T, len: usize) -> &'a [T] { slice::from_raw_parts(ptr, len) }
#[inline(always)]
unsafe fn as_mut_slice<'a, T>(ptr: *mut T, len: usize) -> &'a mut [T] { slice::from_raw_parts_mut(ptr, len) }

#[no_mangle]
pub extern "C" fn knn_version() -> u32 { 1 }

/// Runs one truncated search over caller-owned CSR arrays and writes `k`
/// neighbour indices and distances.
///
/// Returns 0 on success; -1 empty graph, -2 source out of range, -3 null
/// pointer, -4 inconsistent CSR arrays, -5 `k > n - 1`, -6 internal error.
///
/// # Safety
/// `offsets` must point to `n + 1` values, `targets`/`costs` to
/// `offsets[n]` values each, and `out_idx`/`out_dist` to `k` writable slots.
/// `info` may be null.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn knn_run_row(
    n: u32,
    offsets: *const u32, // len n+1
    targets: *const u32, // len m
    costs: *const f64,   // len m
    source: u32,
    k: u32,
    out_idx: *mut u32,   // len k
    out_dist: *mut f64,  // len k
    info: *mut KnnRowInfo,
) -> i32 {
    let rc = run_row_checked(n, offsets, targets, costs, source, k, out_idx, out_dist, info);
    if rc != 0 && !info.is_null() { *info = KnnRowInfo { error_code: rc, ..KnnRowInfo::default() }; }
    rc
}

#[allow(clippy::too_many_arguments)]
unsafe fn run_row_checked(
    n: u32, offsets: *const u32, targets: *const u32, costs: *const f64,
    source: u32, k: u32, out_idx: *mut u32, out_dist: *mut f64, info: *mut KnnRowInfo,
) -> i32 {
    if n == 0 { return -1; }
    if source >= n { return -2; }
    if offsets.is_null() || targets.is_null() || costs.is_null() || out_idx.is_null() || out_dist.is_null() { return -3; }
    let n_usize = n as usize;
    let off = as_slice(offsets, n_usize + 1);
    if off[0] != 0 || off.windows(2).any(|w| w[0] > w[1]) { return -4; }
    let m = off[n_usize] as usize;
    let tgt = as_slice(targets, m);
    let cst = as_slice(costs, m);
    if tgt.iter().any(|&v| v >= n) || cst.iter().any(|&c| c.is_nan() || c <= 0.0) { return -4; }
    if k >= n { return -5; }

    let view = CsrView { offsets: off, targets: tgt, costs: cst };
    let mut scratch = SearchScratch::new(n_usize);
    let row = match nearest_neighbours(view, source, k as usize, &mut scratch) {
        Ok(row) => row,
        Err(_) => return -6,
    };
    let idx = as_mut_slice(out_idx, k as usize);
    let dist = as_mut_slice(out_dist, k as usize);
    for (slot, &(v, d)) in row.neighbours.iter().enumerate() { idx[slot] = v; dist[slot] = d; }

    if !info.is_null() {
        let s = scratch.stats();
        *info = KnnRowInfo {
            relaxations: s.relaxations,
            heap_pushes: s.heap_pushes,
            heap_pops: s.heap_pops,
            padded: row.padded as u32,
            error_code: 0,
        };
    }
    0
}
