use std::path::PathBuf;

/// Configuration for opening/building an index set (§D ambient
/// configuration).
#[derive(Debug, Clone)]
pub struct IndexSetConfig {
    /// Root directory under which named index sets live (CLI default
    /// `"indexes"`, §6).
    pub root: PathBuf,

    /// Batch size generators flush at (§5 backpressure primitive, default
    /// 1000).
    pub build_batch_size: usize,

    /// Max concurrent pooled index-set/document-store handles (§5 "Document
    /// store connection ... may be pooled").
    pub max_readers: usize,

    /// Whether the Nash temporal index eagerly builds its cache on open
    /// rather than lazily on first `DATE(...)` condition (§4.6 "lazy per
    /// corpus and cached").
    pub eager_nash_cache: bool,

    /// Entry capacity of the LRU query-result cache (§F).
    pub query_cache_size: usize,

    /// Refuse to overwrite non-empty index directories during generation
    /// (§4.3 `preserve_existing`).
    pub preserve_existing: bool,
}

impl Default for IndexSetConfig {
    fn default() -> Self {
        IndexSetConfig {
            root: PathBuf::from("indexes"),
            build_batch_size: 1000,
            max_readers: 10,
            eager_nash_cache: false,
            query_cache_size: 256,
            preserve_existing: true,
        }
    }
}

impl IndexSetConfig {
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }
}
