//! Graph loading: tag renumbering, similarity-to-cost transform and the
//! frozen CSR adjacency every search reads from.
//!
//! Input rows look like `<tag> <dest>,<raw_w> <dest>,<raw_w> ...`. Tags are
//! renumbered to dense indices in first-seen order and each new `(tag, index)`
//! pair is written to the mapping sink the moment it is discovered.

use std::io::{BufRead, Write};

use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::error::{KnnError, Result};

/// Numerator of the cost transform `100 / ln(w + 1)`.
pub const COST_SCALE: f64 = 100.0;

/// Converts a raw similarity (larger is closer) into a traversal cost
/// (smaller is closer). Returns `None` outside the domain `raw >= 1`.
#[inline]
pub fn raw_weight_to_cost(raw: i64) -> Option<f64> {
    if raw < 1 { return None; }
    Some(COST_SCALE / (raw as f64).ln_1p())
}

/// Largest vertex count: dense indices and `0..V` ranges must fit in `u32`.
pub const MAX_VERTICES: usize = u32::MAX as usize;

/// Dense index for the vertex after `len` existing ones.
#[inline]
fn next_index(len: usize) -> Result<u32> {
    if len >= MAX_VERTICES {
        return Err(KnnError::Internal(format!("vertex count would exceed {MAX_VERTICES}")));
    }
    Ok(len as u32)
}

/// Bidirectional external tag <-> dense index mapping.
#[derive(Debug, Default, Clone)]
pub struct VertexMap {
    index_of: FxHashMap<i64, u32>,
    tags: Vec<i64>,
}

impl VertexMap {
    pub fn new() -> Self { Self::default() }
    #[inline] pub fn len(&self) -> usize { self.tags.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.tags.is_empty() }
    #[inline] pub fn index_of(&self, tag: i64) -> Option<u32> { self.index_of.get(&tag).copied() }
    #[inline] pub fn tag_of(&self, index: u32) -> Option<i64> { self.tags.get(index as usize).copied() }

    /// Tags in discovery order; position is the dense index.
    pub fn tags(&self) -> &[i64] { &self.tags }

    /// Returns the index for `tag`, plus `true` when it was newly assigned.
    fn intern(&mut self, tag: i64) -> Result<(u32, bool)> {
        if let Some(idx) = self.index_of(tag) { return Ok((idx, false)); }
        let idx = next_index(self.tags.len())?;
        self.index_of.insert(tag, idx);
        self.tags.push(tag);
        Ok((idx, true))
    }
}

/// Borrowed CSR adjacency: arcs of `u` live in `offsets[u]..offsets[u+1]`.
#[derive(Clone, Copy, Debug)]
pub struct CsrView<'a> {
    pub offsets: &'a [u32],
    pub targets: &'a [u32],
    pub costs: &'a [f64],
}

impl<'a> CsrView<'a> {
    #[inline] pub fn vertex_count(&self) -> usize { self.offsets.len().saturating_sub(1) }

    #[inline]
    pub fn arcs(&self, u: usize) -> (&'a [u32], &'a [f64]) {
        let start = self.offsets[u] as usize;
        let end = self.offsets[u + 1] as usize;
        (&self.targets[start..end], &self.costs[start..end])
    }
}

/// Read-only undirected graph in CSR form. Every edge is stored as two arcs.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    offsets: Vec<u32>,
    targets: Vec<u32>,
    costs: Vec<f64>,
}

impl Graph {
    /// Freezes per-vertex adjacency lists into CSR arrays.
    pub fn from_adjacency(adjacency: Vec<Vec<(u32, f64)>>) -> Result<Self> {
        if adjacency.len() > MAX_VERTICES {
            return Err(KnnError::Internal(format!("{} vertices exceed {MAX_VERTICES}", adjacency.len())));
        }
        let arcs: usize = adjacency.iter().map(Vec::len).sum();
        if u32::try_from(arcs).is_err() {
            return Err(KnnError::Internal(format!("{arcs} arcs exceed u32 offset space")));
        }
        let mut offsets = Vec::with_capacity(adjacency.len() + 1);
        let mut targets = Vec::with_capacity(arcs);
        let mut costs = Vec::with_capacity(arcs);
        offsets.push(0);
        for list in adjacency {
            for (v, c) in list { targets.push(v); costs.push(c); }
            offsets.push(targets.len() as u32);
        }
        Ok(Self { offsets, targets, costs })
    }

    /// Builds a graph over `n` vertices from undirected `(u, v, cost)` edges.
    pub fn from_edges(n: usize, edges: &[(u32, u32, f64)]) -> Result<Self> {
        let mut adjacency = vec![Vec::new(); n];
        for &(u, v, c) in edges {
            if u as usize >= n || v as usize >= n {
                return Err(KnnError::Internal(format!("edge ({u}, {v}) outside {n} vertices")));
            }
            adjacency[u as usize].push((v, c));
            adjacency[v as usize].push((u, c));
        }
        Self::from_adjacency(adjacency)
    }

    #[inline] pub fn vertex_count(&self) -> usize { self.offsets.len().saturating_sub(1) }
    #[inline] pub fn arc_count(&self) -> usize { self.targets.len() }
    pub fn offsets(&self) -> &[u32] { &self.offsets }
    pub fn targets(&self) -> &[u32] { &self.targets }
    pub fn costs(&self) -> &[f64] { &self.costs }

    #[inline]
    pub fn view(&self) -> CsrView<'_> {
        CsrView { offsets: &self.offsets, targets: &self.targets, costs: &self.costs }
    }

    pub fn neighbours(&self, u: u32) -> impl Iterator<Item = (u32, f64)> + '_ {
        let (t, c) = self.view().arcs(u as usize);
        t.iter().copied().zip(c.iter().copied())
    }
}

/// Output of a completed load.
#[derive(Debug, Clone)]
pub struct LoadedGraph {
    pub graph: Graph,
    pub vertices: VertexMap,
}

/// Streaming loader. Mapping lines are written as tags are discovered.
pub struct GraphLoader<W: Write> {
    vertices: VertexMap,
    adjacency: Vec<Vec<(u32, f64)>>,
    mapping_out: W,
    edges: usize,
}

impl<W: Write> GraphLoader<W> {
    pub fn new(mapping_out: W) -> Self {
        Self { vertices: VertexMap::new(), adjacency: Vec::new(), mapping_out, edges: 0 }
    }

    fn normalize(&mut self, tag: i64) -> Result<u32> {
        let (idx, fresh) = self.vertices.intern(tag)?;
        if fresh {
            self.adjacency.push(Vec::new());
            writeln!(self.mapping_out, "{tag} {idx}")?;
        }
        Ok(idx)
    }

    /// Parses one input row. `line_no` is 1-based and only used for errors.
    pub fn read_row(&mut self, line_no: usize, row: &str) -> Result<()> {
        let mut tokens = row.split_whitespace().peekable();
        let Some(head) = tokens.next() else { return Ok(()) };
        // One ':' may follow the tag, glued to it or to the first pair.
        let (head, glued) = match head.split_once(':') {
            Some((tag, rest)) => (tag, Some(rest).filter(|r| !r.is_empty())),
            None => (head, None),
        };
        let source_tag: i64 = head
            .parse()
            .map_err(|_| KnnError::parse(line_no, format!("source tag {head:?} is not an integer")))?;
        let source = self.normalize(source_tag)?;
        if glued.is_none() && tokens.peek() == Some(&":") { tokens.next(); }

        for pair in glued.into_iter().chain(tokens) {
            let (dest, raw) = pair
                .split_once(',')
                .ok_or_else(|| KnnError::parse(line_no, format!("pair {pair:?} lacks a ',' separator")))?;
            let dest_tag: i64 = dest
                .parse()
                .map_err(|_| KnnError::parse(line_no, format!("destination tag {dest:?} is not an integer")))?;
            let weight: i64 = raw
                .parse()
                .map_err(|_| KnnError::parse(line_no, format!("raw weight {raw:?} is not an integer")))?;
            let cost = raw_weight_to_cost(weight).ok_or(KnnError::InvalidWeight { line: line_no, weight })?;
            let dest = self.normalize(dest_tag)?;
            self.adjacency[source as usize].push((dest, cost));
            self.adjacency[dest as usize].push((source, cost));
            self.edges += 1;
        }
        Ok(())
    }

    /// Consumes every row of `reader` and freezes the adjacency.
    pub fn load<R: BufRead>(mut self, reader: R) -> Result<LoadedGraph> {
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            self.read_row(i + 1, &line)?;
        }
        self.finish()
    }

    pub fn finish(mut self) -> Result<LoadedGraph> {
        self.mapping_out.flush()?;
        debug!(edges = self.edges, "adjacency lists built");
        let graph = Graph::from_adjacency(self.adjacency)?;
        info!(vertices = graph.vertex_count(), edges = self.edges, arcs = graph.arc_count(), "graph loaded");
        Ok(LoadedGraph { graph, vertices: self.vertices })
    }
}

/// Loads a whole adjacency stream, writing the tag mapping to `mapping_out`.
pub fn load_graph<R: BufRead, W: Write>(reader: R, mapping_out: W) -> Result<LoadedGraph> {
    GraphLoader::new(mapping_out).load(reader)
}
