//! Run configuration. The binary fills this from its arguments; the env
//! knobs below are also honoured there and by [`KnnConfig::from_env`].

/// Worker count override (`0` or unset = rayon default).
pub const THREADS_ENV: &str = "KNN_THREADS";
/// Any non-falsey value (not `0`, `false`, `no`, `off` or empty) streams rows
/// in completion order instead of index order.
pub const UNORDERED_ENV: &str = "KNN_UNORDERED";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnnConfig {
    /// Neighbours per vertex, excluding the vertex itself.
    pub k: usize,
    /// Fixed worker pool size; `None` uses the global rayon pool.
    pub threads: Option<usize>,
    /// Emit rows by ascending dense index rather than completion order.
    pub ordered: bool,
}

impl KnnConfig {
    pub fn new(k: usize) -> Self { Self { k, threads: None, ordered: true } }

    pub fn with_threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads.filter(|&t| t > 0);
        self
    }

    pub fn with_ordered(mut self, ordered: bool) -> Self { self.ordered = ordered; self }

    /// `new(k)` with [`THREADS_ENV`] and [`UNORDERED_ENV`] applied.
    pub fn from_env(k: usize) -> Self {
        let threads = std::env::var(THREADS_ENV).ok().and_then(|v| v.trim().parse().ok());
        let unordered = std::env::var(UNORDERED_ENV).map(|v| !is_falsey(&v)).unwrap_or(false);
        Self::new(k).with_threads(threads).with_ordered(!unordered)
    }
}

// Same spellings clap's `FalseyValueParser` treats as false.
fn is_falsey(v: &str) -> bool {
    matches!(v.trim().to_ascii_lowercase().as_str(), "" | "0" | "n" | "no" | "f" | "false" | "off")
}
