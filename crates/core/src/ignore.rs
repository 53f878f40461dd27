/// Ordered substring patterns over slash-relative paths. A directory
/// match prunes the whole subtree; a file match skips only that file.
#[derive(Debug, Clone, Default)]
pub struct IgnoreSet {
    patterns: Vec<String>,
}

impl IgnoreSet {
    pub fn new(patterns: Vec<String>) -> Self {
        Self { patterns }
    }

    pub fn matches(&self, relative: &str) -> bool {
        self.patterns.iter().any(|p| relative.contains(p))
    }
}
