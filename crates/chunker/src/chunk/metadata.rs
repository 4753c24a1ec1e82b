//! Metadata enrichment utilities.

use sha2::{Digest, Sha256};

use crate::analysis::ContentAnalysis;

/// Header path of content outside any section.
pub const ROOT_PATH: &str = "/";

/// Header path of the structural preamble chunk.
pub const PREAMBLE_PATH: &str = "/__preamble__";

/// Calculate SHA-256 hash of text.
pub fn calculate_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Stack of open headers at some point in a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderTrail {
    stack: Vec<(u8, String)>,
}

impl HeaderTrail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a header, closing every open header at the same or deeper level.
    pub fn push(&mut self, level: u8, text: &str) {
        while self.stack.last().is_some_and(|(l, _)| *l >= level) {
            self.stack.pop();
        }
        self.stack.push((level, text.to_string()));
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Slash-joined path, `/` when no header is open.
    pub fn path(&self) -> String {
        if self.stack.is_empty() {
            return ROOT_PATH.to_string();
        }
        self.stack
            .iter()
            .map(|(_, text)| format!("/{}", text.replace('/', "\\/")))
            .collect()
    }
}

/// Header path lookup by line for one analyzed text.
#[derive(Debug, Clone)]
pub struct HeaderIndex {
    root: String,
    /// No header was open before this text
    at_document_root: bool,
    /// `(line, path)` for each header, ascending by line
    entries: Vec<(usize, String)>,
    trail_after: HeaderTrail,
}

impl HeaderIndex {
    /// Build the index, starting from `base` (headers open before this text).
    pub fn new(analysis: &ContentAnalysis, base: &HeaderTrail) -> Self {
        let mut trail = base.clone();
        let mut entries = Vec::with_capacity(analysis.header_count);

        for (line, level, text) in analysis.headers() {
            trail.push(level, text);
            entries.push((line, trail.path()));
        }

        Self {
            root: base.path(),
            at_document_root: base.is_empty(),
            entries,
            trail_after: trail,
        }
    }

    /// Path of the section containing a 1-indexed line.
    pub fn path_at(&self, line: usize) -> &str {
        let idx = self.entries.partition_point(|(l, _)| *l <= line);
        if idx == 0 {
            &self.root
        } else {
            &self.entries[idx - 1].1
        }
    }

    /// Whether the text starts before the document's first header, so its
    /// leading lines can still form a preamble.
    pub fn at_document_root(&self) -> bool {
        self.at_document_root
    }

    /// Headers open at the end of the text.
    pub fn trail_after(&self) -> &HeaderTrail {
        &self.trail_after
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze;

    #[test]
    fn test_calculate_hash() {
        let text = "Hello, world!";
        let hash = calculate_hash(text);
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, calculate_hash(text));
        assert_ne!(hash, calculate_hash("Different text"));
    }

    #[test]
    fn test_header_trail_levels() {
        let mut trail = HeaderTrail::new();
        assert_eq!(trail.path(), "/");
        trail.push(1, "Intro");
        trail.push(2, "Setup");
        assert_eq!(trail.path(), "/Intro/Setup");
        trail.push(3, "Linux");
        trail.push(2, "Usage");
        assert_eq!(trail.path(), "/Intro/Usage");
        trail.push(1, "Appendix");
        assert_eq!(trail.path(), "/Appendix");
    }

    #[test]
    fn test_slash_in_header_is_escaped() {
        let mut trail = HeaderTrail::new();
        trail.push(1, "Input/Output");
        assert_eq!(trail.path(), "/Input\\/Output");
    }

    #[test]
    fn test_header_index_lookup() {
        let analysis = analyze("pre\n# A\ntext\n## B\nmore\n# C\nend").unwrap();
        let index = HeaderIndex::new(&analysis, &HeaderTrail::new());

        assert_eq!(index.path_at(1), "/");
        assert_eq!(index.path_at(2), "/A");
        assert_eq!(index.path_at(3), "/A");
        assert_eq!(index.path_at(5), "/A/B");
        assert_eq!(index.path_at(7), "/C");
        assert_eq!(index.trail_after().path(), "/C");
    }

    #[test]
    fn test_header_index_with_base_trail() {
        let mut base = HeaderTrail::new();
        base.push(1, "Book");
        base.push(2, "Chapter");

        let analysis = analyze("continued text\n### Detail\nbody").unwrap();
        let index = HeaderIndex::new(&analysis, &base);

        assert_eq!(index.path_at(1), "/Book/Chapter");
        assert_eq!(index.path_at(3), "/Book/Chapter/Detail");
        assert!(!index.at_document_root());
        assert!(HeaderIndex::new(&analysis, &HeaderTrail::new()).at_document_root());
    }
}
