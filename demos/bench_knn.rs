use std::time::Instant;
use sssp_knn::{raw_weight_to_cost, Driver, Graph, KnnConfig};
use rand::{SeedableRng, rngs::SmallRng, Rng};

fn make_random_graph(n: usize, avg_degree: f32, seed: u64) -> Graph {
    let mut rng = SmallRng::seed_from_u64(seed);
    let m_est = (n as f32 * avg_degree / 2.0) as usize;
    let mut edges = Vec::with_capacity(m_est);
    for _ in 0..m_est {
        let u = rng.gen_range(0..n as u32); let v = rng.gen_range(0..n as u32);
        if u == v { continue; }
        let raw: i64 = rng.gen_range(1..500);
        edges.push((u, v, raw_weight_to_cost(raw).expect("raw >= 1")));
    }
    Graph::from_edges(n, &edges).expect("graph")
}

fn run_one(driver: &Driver, n: usize, avg_degree: f32, k: usize, seed: u64) -> serde_json::Value {
    let g = make_random_graph(n, avg_degree, seed);
    let t0 = Instant::now();
    let sweep = driver.sweep(&g, k).expect("sweep");
    let ms = t0.elapsed().as_secs_f64() * 1000.0;
    assert!(sweep.rows.iter().all(|r| r.neighbours.len() == k));
    serde_json::json!({
        "n": n, "arcs": g.arc_count(), "avg_degree": avg_degree, "k": k,
        "threads": driver.threads(),
        "sweep_ms": ms,
        "rows_per_sec": n as f64 / (ms / 1000.0).max(1e-9),
        "stats": sweep.stats,
    })
}

// Sizes via argv (default 1000 10000 50000); K and threads via KNN_BENCH_K / KNN_THREADS.
fn main() {
    let sizes: Vec<usize> = {
        let v: Vec<usize> = std::env::args().skip(1).filter_map(|a| a.parse().ok()).collect();
        if v.is_empty() { vec![1_000, 10_000, 50_000] } else { v }
    };
    let k: usize = std::env::var("KNN_BENCH_K").ok().and_then(|v| v.parse().ok()).unwrap_or(150);
    let config = KnnConfig::from_env(k);
    let driver = Driver::new(config.threads).expect("worker pool");
    let results: Vec<_> = sizes.iter().map(|&n| run_one(&driver, n, 8.0, k.min(n - 1), 0xC0FFEE ^ n as u64)).collect();
    println!("{}", serde_json::to_string_pretty(&results).expect("json"));
}
