use sssp_knn::*;
use rand::{Rng, SeedableRng};
use rand::rngs::SmallRng;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 6 { eprintln!("usage: run_one <n> <avg_degree> <seed> <source> <k>"); std::process::exit(1); }
    let n: u32 = args[1].parse().expect("n");
    let avg_deg: f32 = args[2].parse().expect("avg_degree");
    let seed: u64 = args[3].parse().expect("seed");
    let source: u32 = args[4].parse().expect("source");
    let k: u32 = args[5].parse().expect("k");
    let mut rng = SmallRng::seed_from_u64(seed);
    let m_est = (n as f32 * avg_deg / 2.0) as usize;
    let mut edges = Vec::with_capacity(m_est);
    for _ in 0..m_est {
        let u = rng.gen_range(0..n); let v = rng.gen_range(0..n);
        if u == v { continue; }
        let raw: i64 = rng.gen_range(1..100);
        edges.push((u, v, raw_weight_to_cost(raw).expect("raw >= 1")));
    }
    let g = Graph::from_edges(n as usize, &edges).expect("graph");

    let mut idx = vec![0u32; k as usize];
    let mut dist = vec![0f64; k as usize];
    let mut info = KnnRowInfo::default();
    let rc = unsafe {
        knn_run_row(n, g.offsets().as_ptr(), g.targets().as_ptr(), g.costs().as_ptr(), source, k, idx.as_mut_ptr(), dist.as_mut_ptr(), &mut info)
    };
    if rc != 0 { eprintln!("error {rc}"); return; }
    let row = NeighbourRow { source, neighbours: idx.into_iter().zip(dist).collect(), padded: info.padded as usize };
    let mut out = std::io::stdout().lock();
    write_row(&mut out, &row).expect("stdout");
    eprintln!("n={n} arcs={} relax={} pushes={} pops={} padded={}", g.arc_count(), info.relaxations, info.heap_pushes, info.heap_pops, info.padded);
}
