//! Truncated Dijkstra: the K closest vertices to one source.
//!
//! The search stops after `K + 1` extractions (the first is always the source
//! itself). Rows that run out of reachable vertices are padded with untouched
//! vertex indices at [`SENTINEL_DISTANCE`] so every row has exactly `K` slots.
//!
//! Scratch arrays are reused across searches. Entries are only trusted when
//! their stamp equals the current generation, so no per-search reset is needed.

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{KnnError, Result};
use crate::graph::CsrView;

/// Distance written for padded (unreachable) slots.
pub const SENTINEL_DISTANCE: f64 = 1e15;

#[derive(Copy, Clone, Debug)]
struct HeapItem { dist: f64, node: u32 }

impl HeapItem {
    // (dist, node) lexicographic: equal distances resolve to the lower index.
    #[inline(always)]
    fn precedes(&self, other: &Self) -> bool {
        self.dist < other.dist || (self.dist == other.dist && self.node < other.node)
    }
}

// Binary min-heap with explicit sift ops. Stale entries are left in place and
// skipped on pop by comparing against the current distance.
#[derive(Debug, Default)]
struct FrontierHeap { data: Vec<HeapItem> }

impl FrontierHeap {
    #[inline] fn with_capacity(cap: usize) -> Self { Self { data: Vec::with_capacity(cap) } }
    #[inline] fn clear(&mut self) { self.data.clear(); }
    #[inline] fn len(&self) -> usize { self.data.len() }
    #[inline] fn push(&mut self, item: HeapItem) { self.data.push(item); self.sift_up(self.data.len() - 1); }
    #[inline] fn pop(&mut self) -> Option<HeapItem> {
        let len = self.data.len();
        if len == 0 { return None; }
        self.data.swap(0, len - 1);
        let out = self.data.pop();
        if !self.data.is_empty() { self.sift_down(0); }
        out
    }
    #[inline] fn sift_up(&mut self, mut idx: usize) {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if self.data[idx].precedes(&self.data[parent]) { self.data.swap(idx, parent); idx = parent; } else { break; }
        }
    }
    #[inline] fn sift_down(&mut self, mut idx: usize) {
        let n = self.data.len();
        loop {
            let left = idx * 2 + 1;
            if left >= n { break; }
            let right = left + 1;
            let mut best = left;
            if right < n && self.data[right].precedes(&self.data[left]) { best = right; }
            if self.data[best].precedes(&self.data[idx]) { self.data.swap(idx, best); idx = best; } else { break; }
        }
    }
}

/// Counters accumulated by a [`SearchScratch`] across its searches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SearchStats {
    pub searches: u64,
    pub relaxations: u64,
    pub heap_pushes: u64,
    pub heap_pops: u64,
    pub heap_max: u64,
    pub padded_rows: u64,
    pub padded_slots: u64,
    /// O(V) scratch instances created by the driver for this tally.
    pub scratch_allocations: u64,
}

impl SearchStats {
    pub fn merge(&mut self, other: &SearchStats) {
        self.searches += other.searches;
        self.relaxations += other.relaxations;
        self.heap_pushes += other.heap_pushes;
        self.heap_pops += other.heap_pops;
        self.heap_max = self.heap_max.max(other.heap_max);
        self.padded_rows += other.padded_rows;
        self.padded_slots += other.padded_slots;
        self.scratch_allocations += other.scratch_allocations;
    }
}

/// The `K` nearest other vertices of `source`, by non-decreasing distance.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighbourRow {
    pub source: u32,
    pub neighbours: Vec<(u32, f64)>,
    /// Trailing slots filled with [`SENTINEL_DISTANCE`].
    pub padded: usize,
}

/// Per-worker scratch state. Never share one instance between concurrent
/// searches: the generation stamp assumes a single search in flight.
#[derive(Debug)]
pub struct SearchScratch {
    dist: Vec<f64>,
    stamp: Vec<u32>,
    generation: u32,
    heap: FrontierHeap,
    stats: SearchStats,
}

impl SearchScratch {
    pub fn new(n: usize) -> Self {
        Self {
            dist: vec![SENTINEL_DISTANCE; n],
            stamp: vec![0; n],
            generation: 0,
            heap: FrontierHeap::with_capacity(n.min(1024)),
            stats: SearchStats::default(),
        }
    }

    #[inline] pub fn capacity(&self) -> usize { self.dist.len() }
    pub fn stats(&self) -> &SearchStats { &self.stats }

    /// Returns the accumulated counters and starts a fresh tally.
    pub fn take_stats(&mut self) -> SearchStats { std::mem::take(&mut self.stats) }

    fn begin(&mut self) -> u32 {
        if self.generation == u32::MAX {
            warn!("search generation counter wrapped; clearing stamps");
            self.stamp.fill(0);
            self.generation = 0;
        }
        self.generation += 1;
        self.heap.clear();
        self.generation
    }

    #[inline(always)]
    fn distance(&self, v: usize, generation: u32) -> f64 {
        if self.stamp[v] == generation { self.dist[v] } else { SENTINEL_DISTANCE }
    }
}

/// Runs one truncated search from `source` and returns its `K`-slot row.
///
/// Fails when the graph is empty, `source` is out of range, `k > V - 1`, or
/// `scratch` was sized for a different graph.
pub fn nearest_neighbours(graph: CsrView<'_>, source: u32, k: usize, scratch: &mut SearchScratch) -> Result<NeighbourRow> {
    let n = graph.vertex_count();
    if n == 0 { return Err(KnnError::EmptyGraph); }
    if source as usize >= n { return Err(KnnError::Internal(format!("source {source} outside {n} vertices"))); }
    if k > n - 1 { return Err(KnnError::TooManyNeighbours { k, vertices: n }); }
    if scratch.capacity() != n {
        return Err(KnnError::Internal(format!("scratch sized for {} vertices, graph has {n}", scratch.capacity())));
    }

    let generation = scratch.begin();
    let s = source as usize;
    scratch.stamp[s] = generation;
    scratch.dist[s] = 0.0;
    scratch.heap.push(HeapItem { dist: 0.0, node: source });
    scratch.stats.heap_pushes += 1;
    scratch.stats.heap_max = scratch.stats.heap_max.max(1);

    let mut neighbours = Vec::with_capacity(k);
    let mut extracted = 0usize;
    while extracted <= k {
        let Some(item) = scratch.heap.pop() else { break };
        scratch.stats.heap_pops += 1;
        let u = item.node as usize;
        if item.dist > scratch.dist[u] { continue; }
        extracted += 1;
        if extracted > 1 { neighbours.push((item.node, item.dist)); }
        // Relaxing from the last extraction cannot change the row.
        if extracted == k + 1 { break; }

        let (targets, costs) = graph.arcs(u);
        for (&v, &c) in targets.iter().zip(costs) {
            let v = v as usize;
            let current = scratch.distance(v, generation);
            let proposed = item.dist + c;
            if proposed < current {
                scratch.stamp[v] = generation;
                scratch.dist[v] = proposed;
                scratch.heap.push(HeapItem { dist: proposed, node: v as u32 });
                scratch.stats.relaxations += 1;
                scratch.stats.heap_pushes += 1;
                scratch.stats.heap_max = scratch.stats.heap_max.max(scratch.heap.len() as u64);
            }
        }
    }

    // Frontier exhausted before K + 1 extractions: fill the rest with the
    // lowest-indexed vertices this search never touched.
    let mut padded = 0usize;
    let mut cursor = 0usize;
    while neighbours.len() < k {
        while cursor < n && scratch.stamp[cursor] == generation { cursor += 1; }
        if cursor >= n {
            return Err(KnnError::Internal(format!("row {source} filled {} of {k} slots", neighbours.len())));
        }
        scratch.stamp[cursor] = generation;
        scratch.dist[cursor] = SENTINEL_DISTANCE;
        neighbours.push((cursor as u32, SENTINEL_DISTANCE));
        padded += 1;
        cursor += 1;
    }

    scratch.stats.searches += 1;
    if padded > 0 {
        scratch.stats.padded_rows += 1;
        scratch.stats.padded_slots += padded as u64;
        debug!(source, padded, "row padded with sentinel entries");
    }
    Ok(NeighbourRow { source, neighbours, padded })
}
