use sssp_knn::{nearest_neighbours, raw_weight_to_cost, Driver, Graph, NeighbourRow, SearchScratch, SENTINEL_DISTANCE};

// Undirected edge list helpers (u, v, cost)
fn path_graph(n: u32, w: f64) -> (usize, Vec<(u32, u32, f64)>) {
    (n as usize, (0..n.saturating_sub(1)).map(|u| (u, u + 1, w)).collect())
}

fn star_graph(k: u32, w: f64) -> (usize, Vec<(u32, u32, f64)>) { // center 0, leaves 1..=k
    ((k + 1) as usize, (1..=k).map(|leaf| (0, leaf, w)).collect())
}

fn complete_graph(n: u32, w: f64) -> (usize, Vec<(u32, u32, f64)>) {
    let mut edges = Vec::new();
    for u in 0..n { for v in (u + 1)..n { edges.push((u, v, w)); } }
    (n as usize, edges)
}

fn bridge_cliques(a: u32, b: u32, w: f64) -> (usize, Vec<(u32, u32, f64)>) { // bridge a-1 -- a
    let mut edges = Vec::new();
    for u in 0..a { for v in (u + 1)..a { edges.push((u, v, w)); } }
    for u in a..a + b { for v in (u + 1)..a + b { edges.push((u, v, w)); } }
    edges.push((a - 1, a, w));
    ((a + b) as usize, edges)
}

fn islands(sizes: &[u32], w: f64) -> (usize, Vec<(u32, u32, f64)>) { // disjoint paths
    let mut edges = Vec::new(); let mut base = 0u32;
    for &s in sizes { for u in base..base + s.saturating_sub(1) { edges.push((u, u + 1, w)); } base += s; }
    (base as usize, edges)
}

// Simple deterministic pseudo-random graph with integer raw weights
fn pseudo_random_graph(n: u32, m: u32, seed: u64) -> (usize, Vec<(u32, u32, f64)>) {
    let mut state = seed | 1;
    let mut next_u32 = || { // xorshift64*
        state ^= state >> 12; state ^= state << 25; state ^= state >> 27; state = state.wrapping_mul(2685821657736338717); (state >> 32) as u32
    };
    let mut edges = Vec::new();
    for _ in 0..m {
        let u = next_u32() % n; let v = next_u32() % n; if u == v { continue; }
        let raw = 1 + (next_u32() % 20) as i64;
        edges.push((u, v, raw_weight_to_cost(raw).unwrap()));
    }
    (n as usize, edges)
}

// O(n^2) full Dijkstra; unreachable = None.
fn reference_distances(n: usize, edges: &[(u32, u32, f64)], source: usize) -> Vec<Option<f64>> {
    let mut adj = vec![Vec::new(); n];
    for &(u, v, c) in edges { adj[u as usize].push((v as usize, c)); adj[v as usize].push((u as usize, c)); }
    let mut dist: Vec<Option<f64>> = vec![None; n];
    let mut done = vec![false; n];
    dist[source] = Some(0.0);
    loop {
        let mut best: Option<(usize, f64)> = None;
        for v in 0..n { if let (false, Some(d)) = (done[v], dist[v]) { if best.map_or(true, |(_, b)| d < b) { best = Some((v, d)); } } }
        let Some((u, du)) = best else { break };
        done[u] = true;
        for &(v, c) in &adj[u] { let nd = du + c; if dist[v].map_or(true, |d| nd < d) { dist[v] = Some(nd); } }
    }
    dist
}

fn expected_row(n: usize, edges: &[(u32, u32, f64)], source: usize, k: usize) -> Vec<(u32, f64)> {
    let dist = reference_distances(n, edges, source);
    let mut reach: Vec<(u32, f64)> = (0..n).filter(|&v| v != source).filter_map(|v| dist[v].map(|d| (v as u32, d))).collect();
    reach.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap().then(a.0.cmp(&b.0)));
    reach.truncate(k);
    let pads = (0..n).filter(|&v| v != source && dist[v].is_none()).map(|v| (v as u32, SENTINEL_DISTANCE));
    reach.extend(pads.take(k - reach.len()));
    reach
}

fn assert_parity(name: &str, n: usize, edges: &[(u32, u32, f64)], k: usize) {
    let g = Graph::from_edges(n, edges).unwrap();
    let mut scratch = SearchScratch::new(n);
    for s in 0..n {
        let row = nearest_neighbours(g.view(), s as u32, k, &mut scratch).unwrap();
        let expected = expected_row(n, edges, s, k);
        assert_eq!(row.neighbours, expected, "{name}: source {s} k {k}");
    }
}

#[test]
fn parity_core_small_graphs() {
    let graphs = vec![
        ("path", path_graph(10, 1.0)),
        ("star", star_graph(12, 1.0)),
        ("bridge", bridge_cliques(4, 4, 1.0)),
        ("complete", complete_graph(6, 1.0)),
        ("islands", islands(&[3, 1, 5, 2], 2.0)),
    ];
    for (name, (n, edges)) in &graphs {
        for k in [0, 1, 3, n - 1] { assert_parity(name, *n, edges, k); }
    }
}

#[test]
fn parity_random_graphs() {
    for seed in 1..=6u64 {
        let (n, edges) = pseudo_random_graph(40, 70, seed * 7919);
        for k in [1, 5, 12, 39] { assert_parity("random", n, &edges, k); }
    }
}

#[test]
fn parallel_sweep_matches_sequential_searches() {
    let (n, edges) = pseudo_random_graph(120, 200, 42);
    let g = Graph::from_edges(n, &edges).unwrap();
    let k = 15;
    let mut scratch = SearchScratch::new(n);
    let sequential: Vec<NeighbourRow> = (0..n as u32).map(|s| nearest_neighbours(g.view(), s, k, &mut scratch).unwrap()).collect();
    for threads in [Some(1), Some(4), None] {
        let sweep = Driver::new(threads).unwrap().sweep(&g, k).unwrap();
        assert_eq!(sweep.rows, sequential, "threads {threads:?}");
        assert_eq!(sweep.stats.searches, n as u64);
    }
}
