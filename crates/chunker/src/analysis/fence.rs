//! Fence marker recognition and open-fence tracking.
//!
//! A fence opens with a run of at least three backticks or tildes and closes
//! only at a line whose run uses the same character, is at least as long, and
//! carries no info string. Longer inner fences inside documentation about
//! Markdown therefore stay inside their outer block.

/// A fence marker line: ```` ```rust ```` or `~~~~`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FenceMarker<'a> {
    /// Fence character (`` ` `` or `~`)
    pub ch: char,

    /// Length of the marker run
    pub len: usize,

    /// Trimmed text after the run (language tag on opening fences)
    pub info: &'a str,
}

impl<'a> FenceMarker<'a> {
    /// Parse a line as a fence marker.
    pub fn parse(line: &'a str) -> Option<Self> {
        let trimmed = line.trim_start();
        let ch = trimmed.chars().next()?;
        if ch != '`' && ch != '~' {
            return None;
        }

        let len = trimmed.chars().take_while(|&c| c == ch).count();
        if len < 3 {
            return None;
        }

        // Both fence characters are one byte wide.
        let info = trimmed[len..].trim();
        if ch == '`' && info.contains('`') {
            return None;
        }

        Some(Self { ch, len, info })
    }

    /// Whether this marker closes a fence opened by `opener`.
    pub fn closes(&self, opener: &FenceMarker<'_>) -> bool {
        self.ch == opener.ch && self.len >= opener.len && self.info.is_empty()
    }

    /// Language tag of an opening fence, if any.
    pub fn language(&self) -> Option<String> {
        self.info
            .split_whitespace()
            .next()
            .map(|tag| tag.trim_start_matches('{').trim_end_matches('}').to_lowercase())
            .filter(|tag| !tag.is_empty())
    }
}

/// What a single line did to the fence state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceEvent {
    /// Line is not a structural fence marker.
    None,
    /// Line opened a fence.
    Opened,
    /// Line closed the open fence.
    Closed,
}

/// Tracks whether a line-by-line scan is inside an open fence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FenceTracker {
    open: Option<(char, usize)>,
    markers: usize,
}

impl FenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the tracker by one line.
    pub fn feed_line(&mut self, line: &str) -> FenceEvent {
        let Some(marker) = FenceMarker::parse(line) else {
            return FenceEvent::None;
        };

        match self.open {
            None => {
                self.open = Some((marker.ch, marker.len));
                self.markers += 1;
                FenceEvent::Opened
            }
            Some((ch, len)) => {
                let opener = FenceMarker { ch, len, info: "" };
                if marker.closes(&opener) {
                    self.open = None;
                    self.markers += 1;
                    FenceEvent::Closed
                } else {
                    FenceEvent::None
                }
            }
        }
    }

    /// Whether the scan position is inside an open fence.
    pub fn in_fence(&self) -> bool {
        self.open.is_some()
    }

    /// Character and run length of the open fence.
    pub fn open_fence(&self) -> Option<(char, usize)> {
        self.open
    }

    /// Structural fence markers seen so far (openers plus closers).
    pub fn markers_seen(&self) -> usize {
        self.markers
    }
}

/// Count structural fence markers in `text`.
///
/// Only markers that open or close a fence count; marker-looking lines inside
/// a longer outer fence are content. The count is even iff every fence in the
/// text is closed.
pub fn count_fence_markers(text: &str) -> usize {
    let mut tracker = FenceTracker::new();
    for line in text.lines() {
        tracker.feed_line(line);
    }
    tracker.markers_seen()
}

/// Whether `text` contains at least one fence marker line.
pub fn contains_fence(text: &str) -> bool {
    text.lines().any(|line| FenceMarker::parse(line).is_some())
}
