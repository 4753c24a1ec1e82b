//! Safe split boundary detection for streaming windows.

use crate::analysis::{parse_header, FenceTracker};
use crate::config::StreamingConfig;

/// Kind of boundary a window was cut at, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitKind {
    /// Line right before a header
    BeforeHeader,
    /// After a blank line outside any fence
    ParagraphBreak,
    /// Any line end outside any fence
    Newline,
    /// Forced cut; may break a fence
    HardCut,
    /// Rest of the stream
    EndOfStream,
}

/// Finds where a window of lines can be cut without breaking a fence,
/// a paragraph or a header's relation to its body.
#[derive(Debug, Clone)]
pub struct SplitDetector {
    hard_cut_chars: usize,
}

impl SplitDetector {
    pub fn new(config: &StreamingConfig) -> Self {
        let hard_cut_chars = (config.buffer_size as f64 * config.safe_split_threshold) as usize;
        Self {
            hard_cut_chars: hard_cut_chars.max(1),
        }
    }

    /// Number of leading lines that form the window, and the boundary kind.
    ///
    /// `entry` is the fence state before the first line, which is inside a
    /// fence when the previous window was hard-cut in one. Candidates are
    /// searched backwards in the back half of the window first, then
    /// anywhere. At least one line always stays behind for the next window.
    /// `None` means every candidate lies inside an open fence.
    pub fn find_split<S: AsRef<str>>(
        &self,
        lines: &[S],
        entry: &FenceTracker,
    ) -> Option<(usize, SplitKind)> {
        let last = lines.len().checked_sub(2)?;

        let mut tracker = entry.clone();
        let safe: Vec<bool> = lines
            .iter()
            .map(|line| {
                tracker.feed_line(line.as_ref());
                !tracker.in_fence()
            })
            .collect();

        let before_header = |i: usize| safe[i] && parse_header(lines[i + 1].as_ref()).is_some();
        let paragraph_break = |i: usize| safe[i] && lines[i].as_ref().trim().is_empty();
        let newline = |i: usize| safe[i];

        let back_half = (lines.len() / 2).min(last);
        let search = |from: usize, accept: &dyn Fn(usize) -> bool| (from..=last).rev().find(|&i| accept(i));

        let found = search(back_half, &before_header)
            .map(|i| (i, SplitKind::BeforeHeader))
            .or_else(|| search(back_half, &paragraph_break).map(|i| (i, SplitKind::ParagraphBreak)))
            .or_else(|| search(0, &newline).map(|i| (i, SplitKind::Newline)));

        found.map(|(i, kind)| (i + 1, kind))
    }

    /// Lines to take for a forced cut at `safe_split_threshold × buffer_size`
    /// characters; always at least one.
    pub fn hard_cut<S: AsRef<str>>(&self, lines: &[S]) -> usize {
        let mut total = 0usize;
        for (i, line) in lines.iter().enumerate() {
            total += line.as_ref().chars().count() + 1;
            if total >= self.hard_cut_chars {
                return i + 1;
            }
        }
        lines.len().max(1)
    }
}
