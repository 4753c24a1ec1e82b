//! Bounded-memory streaming chunker.
//!
//! The source is read into one window of roughly `buffer_size` characters at a
//! time. Each window is cut at a safe boundary (never inside a fence when it
//! can be avoided), chunked by the batch pipeline with a strategy fixed from
//! the first window, and its chunks are yielded lazily.
//!
//! The last chunk of a window is held back until the next window has been
//! chunked so the two chunks on either side of the boundary can be linked
//! with overlap context.

mod buffer;
mod split;

pub use buffer::BufferManager;
pub use split::{SplitDetector, SplitKind};

use mdchunk_core::AppResult;
use std::collections::VecDeque;
use std::io::BufRead;

use crate::analysis::{analyze_with, validate_input, FenceTracker};
use crate::chunk::{
    merge_flagged_pair, overlap_prefix, overlap_suffix, select_strategy, Chunk, ChunkPipeline,
    HeaderTrail, StrategyId,
};
use crate::config::{ChunkConfig, StreamingConfig};

/// One resolved window of source lines.
#[derive(Debug, Clone)]
pub struct Window {
    pub index: usize,
    /// 1-indexed source line of the first line
    pub first_line: usize,
    pub lines: Vec<String>,
    pub split: SplitKind,
}

impl Window {
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Iterator over the chunks of a streamed document.
///
/// Yields `Err` once and then ends when the source fails or is not text.
pub struct StreamingChunker<R> {
    pipeline: ChunkPipeline,
    streaming: StreamingConfig,
    buffer: BufferManager<R>,
    detector: SplitDetector,
    /// Fence state at the start of the unread buffer
    fence: FenceTracker,
    strategy: Option<StrategyId>,
    trail: HeaderTrail,
    window_index: usize,
    chunk_index: usize,
    ready: VecDeque<Chunk>,
    held: Option<Chunk>,
    done: bool,
}

impl<R: BufRead> StreamingChunker<R> {
    pub fn new(source: R, config: ChunkConfig, streaming: StreamingConfig) -> AppResult<Self> {
        streaming.validate()?;
        let pipeline = ChunkPipeline::new(config)?;

        Ok(Self {
            pipeline,
            detector: SplitDetector::new(&streaming),
            streaming,
            buffer: BufferManager::new(source),
            fence: FenceTracker::new(),
            strategy: None,
            trail: HeaderTrail::new(),
            window_index: 0,
            chunk_index: 0,
            ready: VecDeque::new(),
            held: None,
            done: false,
        })
    }

    /// Strategy in use; known once the first window has been read.
    pub fn strategy(&self) -> Option<StrategyId> {
        self.strategy
    }

    /// Read and cut the next window, `None` at end of stream.
    fn next_window(&mut self) -> AppResult<Option<Window>> {
        self.buffer.fill(self.streaming.buffer_size)?;
        if self.buffer.lines().is_empty() {
            return Ok(None);
        }

        if self.strategy.is_none() {
            self.preview_strategy()?;
        }

        let first_line = self.buffer.first_line();
        let (count, split) = loop {
            if self.buffer.is_eof() {
                break (self.buffer.lines().len(), SplitKind::EndOfStream);
            }

            if let Some(found) = self.detector.find_split(self.buffer.lines(), &self.fence) {
                break found;
            }

            // Every candidate is inside an open fence: grow the window.
            if self.buffer.bytes() < self.streaming.max_window_bytes() {
                let target = self.buffer.chars() + self.streaming.buffer_size;
                self.buffer.fill(target)?;
                continue;
            }

            let count = self.detector.hard_cut(self.buffer.lines());
            tracing::warn!(
                "No safe split within {} MB at line {}; cutting after {} lines",
                self.streaming.max_memory_mb,
                first_line,
                count
            );
            break (count, SplitKind::HardCut);
        };

        let lines = self.buffer.take(count);
        for line in &lines {
            self.fence.feed_line(line);
        }
        let window = Window {
            index: self.window_index,
            first_line,
            lines,
            split,
        };
        self.window_index += 1;

        tracing::debug!(
            "Window {} at line {}: {} lines ({:?})",
            window.index,
            window.first_line,
            window.lines.len(),
            split
        );

        Ok(Some(window))
    }

    /// Fix the strategy for the whole stream from the first filled buffer.
    fn preview_strategy(&mut self) -> AppResult<StrategyId> {
        let preview = self.buffer.lines().join("\n");
        let analysis = analyze_with(&preview, &self.pipeline.config().analysis)?;
        let strategy = select_strategy(&analysis, self.pipeline.config());
        tracing::info!("Streaming with strategy {}", strategy);
        self.strategy = Some(strategy);
        Ok(strategy)
    }

    /// Chunk the next window into `ready`; `false` at end of stream.
    fn advance(&mut self) -> AppResult<bool> {
        let Some(window) = self.next_window()? else {
            return Ok(false);
        };
        let text = window.text();
        validate_input(&text)?;

        let strategy = match self.strategy {
            Some(strategy) => strategy,
            None => self.preview_strategy()?,
        };

        let output = self.pipeline.process_window(&text, strategy, &self.trail)?;
        self.trail = output.trail_after;
        for issue in &output.result.errors {
            tracing::warn!("Window {}: {}", window.index, issue);
        }

        let offset = window.first_line - 1;
        let mut chunks: VecDeque<Chunk> = output
            .result
            .chunks
            .into_iter()
            .map(|mut chunk| {
                chunk.start_line += offset;
                chunk.end_line += offset;
                chunk.metadata.stream_window_index = Some(window.index);
                chunk.metadata.is_cross_window = Some(false);
                chunk
            })
            .collect();

        if let Some(first) = chunks.pop_front() {
            let first = match self.held.take() {
                Some(previous) => self.join_boundary(previous, first, window.index),
                None => first,
            };
            chunks.push_front(first);
        }

        let last = chunks.pop_back();
        for chunk in chunks {
            self.release(chunk);
        }
        if last.is_some() {
            self.held = last;
        }

        Ok(true)
    }

    /// Settle the two chunks meeting at a window boundary: a small chunk the
    /// window pass could not place is merged across the boundary when the
    /// pair fits, otherwise both are linked. Returns the chunk that now
    /// leads the new window.
    fn join_boundary(&mut self, previous: Chunk, first: Chunk, window_index: usize) -> Chunk {
        let previous_window = previous.metadata.stream_window_index;
        match merge_flagged_pair(previous, first, self.pipeline.config()) {
            Ok(mut merged) => {
                tracing::debug!("Merged small chunk across window {}", window_index);
                merged.metadata.stream_window_index = previous_window;
                merged.metadata.is_cross_window = Some(true);
                merged
            }
            Err((mut previous, mut first)) => {
                self.link_across_boundary(&mut previous, &mut first);
                self.release(previous);
                first
            }
        }
    }

    fn link_across_boundary(&self, previous: &mut Chunk, next: &mut Chunk) {
        previous.metadata.is_cross_window = Some(true);
        next.metadata.is_cross_window = Some(true);

        let max_chars = self.pipeline.config().overlap_size;
        if max_chars == 0 {
            return;
        }
        let max_lines = Some(self.streaming.overlap_lines);

        let tail = overlap_suffix(&previous.content, max_chars, max_lines);
        next.metadata.previous_content = (!tail.is_empty()).then(|| tail.to_string());

        let head = overlap_prefix(&next.content, max_chars, max_lines);
        previous.metadata.next_content = (!head.is_empty()).then(|| head.to_string());
    }

    fn release(&mut self, mut chunk: Chunk) {
        chunk.metadata.stream_chunk_index = Some(self.chunk_index);
        self.chunk_index += 1;
        self.ready.push_back(chunk);
    }
}

impl<R: BufRead> Iterator for StreamingChunker<R> {
    type Item = AppResult<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(chunk) = self.ready.pop_front() {
                return Some(Ok(chunk));
            }
            if self.done {
                return None;
            }

            match self.advance() {
                Ok(true) => {}
                Ok(false) => {
                    self.done = true;
                    if let Some(last) = self.held.take() {
                        self.release(last);
                    }
                }
                Err(e) => {
                    self.done = true;
                    self.held = None;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Chunk a text source lazily in bounded memory.
pub fn chunk_stream<R: BufRead>(
    source: R,
    config: &ChunkConfig,
    streaming: &StreamingConfig,
) -> AppResult<StreamingChunker<R>> {
    StreamingChunker::new(source, config.clone(), streaming.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::count_fence_markers;
    use mdchunk_core::AppError;
    use std::io::Cursor;

    fn small_stream() -> StreamingConfig {
        StreamingConfig {
            buffer_size: 400,
            overlap_lines: 2,
            max_memory_mb: 1,
            safe_split_threshold: 0.8,
        }
    }

    fn small_chunks() -> ChunkConfig {
        ChunkConfig {
            max_chunk_size: 200,
            min_chunk_size: 20,
            overlap_size: 40,
            ..Default::default()
        }
    }

    fn document(sections: usize) -> String {
        (0..sections)
            .map(|i| {
                format!(
                    "## Section {i}\n\nParagraph for section {i} with a few words.\n\n```rust\nfn f{i}() {{}}\n```\n"
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_stream_matches_line_numbers() {
        let doc = document(12);
        let chunks: Vec<Chunk> = chunk_stream(Cursor::new(doc.clone()), &small_chunks(), &small_stream())
            .unwrap()
            .collect::<AppResult<_>>()
            .unwrap();

        let lines: Vec<&str> = doc.lines().collect();
        for chunk in &chunks {
            let first = chunk.content.lines().next().unwrap();
            assert_eq!(lines[chunk.start_line - 1], first);
            assert_eq!(count_fence_markers(&chunk.content) % 2, 0);
        }
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.metadata.stream_chunk_index, Some(i));
        }
        assert!(chunks.last().unwrap().metadata.stream_window_index.unwrap() > 0);
    }

    #[test]
    fn test_cross_window_links() {
        let doc = document(12);
        let chunks: Vec<Chunk> = chunk_stream(Cursor::new(doc), &small_chunks(), &small_stream())
            .unwrap()
            .map(Result::unwrap)
            .collect();

        let boundary = chunks
            .windows(2)
            .find(|pair| pair[0].metadata.stream_window_index != pair[1].metadata.stream_window_index)
            .unwrap();
        assert_eq!(boundary[0].metadata.is_cross_window, Some(true));
        assert_eq!(boundary[1].metadata.is_cross_window, Some(true));

        let previous = boundary[1].metadata.previous_content.as_deref().unwrap();
        assert!(boundary[0].content.ends_with(previous));
        assert!(previous.lines().count() <= 2);
    }

    #[test]
    fn test_header_path_carried_across_windows() {
        let mut doc = String::from("# Book\n\n");
        for i in 0..30 {
            doc.push_str(&format!("Paragraph {i} of the book has some words in it.\n\n"));
        }
        let config = ChunkConfig {
            strategy_override: Some(StrategyId::Fallback),
            ..small_chunks()
        };

        let chunks: Vec<Chunk> = chunk_stream(Cursor::new(doc), &config, &small_stream())
            .unwrap()
            .map(Result::unwrap)
            .collect();
        assert!(chunks.iter().any(|c| c.metadata.stream_window_index == Some(2)));
        assert!(chunks.iter().all(|c| c.metadata.header_path == "/Book"));
    }

    #[test]
    fn test_long_fence_extends_window() {
        let code: String = (0..100).map(|i| format!("let v{i} = {i};\n")).collect();
        let doc = format!("Intro text.\n\n```rust\n{code}```\n\nAfter the code.\n");

        let chunks: Vec<Chunk> = chunk_stream(Cursor::new(doc), &small_chunks(), &small_stream())
            .unwrap()
            .map(Result::unwrap)
            .collect();

        let code_chunk = chunks.iter().find(|c| c.content.contains("```rust")).unwrap();
        assert_eq!(count_fence_markers(&code_chunk.content), 2);
        assert!(code_chunk.metadata.allow_oversize);
    }

    #[test]
    fn test_empty_stream() {
        let mut stream = chunk_stream(Cursor::new(""), &small_chunks(), &small_stream()).unwrap();
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let streaming = StreamingConfig {
            safe_split_threshold: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            chunk_stream(Cursor::new("x"), &ChunkConfig::default(), &streaming),
            Err(AppError::Configuration(_))
        ));
    }

    #[test]
    fn test_invalid_utf8_surfaces_as_error_item() {
        let bytes = vec![b'#', b' ', b'A', b'\n', 0xff, b'\n'];
        let items: Vec<AppResult<Chunk>> = chunk_stream(Cursor::new(bytes), &small_chunks(), &small_stream())
            .unwrap()
            .collect();
        assert!(matches!(items.last(), Some(Err(AppError::InputValidation(_)))));
    }

    #[test]
    fn test_structural_windows_continue_sections() {
        let mut doc = String::from("# Book\n\n");
        for i in 0..40 {
            if i % 10 == 0 {
                doc.push_str(&format!("## Part {}\n\n", i / 10));
            }
            doc.push_str(&format!("Paragraph {i} of the book has some words in it.\n\n"));
        }
        let config = ChunkConfig {
            strategy_override: Some(StrategyId::Structural),
            ..small_chunks()
        };

        let streamed: Vec<Chunk> = chunk_stream(Cursor::new(doc.clone()), &config, &small_stream())
            .unwrap()
            .map(Result::unwrap)
            .collect();
        let batch = crate::chunk::chunk(&doc, &config).unwrap();

        assert!(streamed.iter().any(|c| c.metadata.stream_window_index == Some(3)));
        assert!(batch.chunks.iter().all(|c| !c.is_preamble()));
        assert!(streamed.iter().all(|c| !c.is_preamble()));
        assert!(streamed.iter().all(|c| c.metadata.preamble_type.is_none()));
        assert!(streamed
            .iter()
            .all(|c| c.metadata.header_path.starts_with("/Book")));
    }

    #[test]
    fn test_no_mergeable_small_chunk_left_at_window_edge() {
        let mut doc = String::new();
        for i in 0..40 {
            doc.push_str(&format!("Paragraph {i} carries a sentence of ordinary prose.\n\n"));
            if i % 3 == 0 {
                doc.push_str("ok.\n\n");
            }
        }
        let config = ChunkConfig {
            strategy_override: Some(StrategyId::Fallback),
            min_chunk_size: 60,
            ..small_chunks()
        };

        let chunks: Vec<Chunk> = chunk_stream(Cursor::new(doc.clone()), &config, &small_stream())
            .unwrap()
            .map(Result::unwrap)
            .collect();

        for pair in chunks.windows(2) {
            if pair[0].metadata.stream_window_index == pair[1].metadata.stream_window_index {
                continue;
            }
            let flagged = pair[0].metadata.small_chunk || pair[1].metadata.small_chunk;
            let fits = pair[0].size() + pair[1].size() + 2 <= config.max_chunk_size;
            assert!(!(flagged && fits), "{:?} / {:?}", pair[0].content, pair[1].content);
        }
        let total: usize = chunks
            .iter()
            .map(|c| c.content.chars().filter(|ch| !ch.is_whitespace()).count())
            .sum();
        assert_eq!(total, doc.chars().filter(|ch| !ch.is_whitespace()).count());
    }

    #[test]
    fn test_hard_cut_inside_unterminated_fence() {
        let mut doc = String::from("Intro paragraph.\n\n```text\n");
        let mut i = 0;
        while doc.len() < 1_300_000 {
            doc.push_str(&format!("# heading {i}\n\nvalue {i}\n"));
            i += 1;
        }
        let streaming = StreamingConfig {
            buffer_size: 100_000,
            max_memory_mb: 1,
            ..small_stream()
        };
        let config = ChunkConfig {
            overlap_size: 0,
            ..ChunkConfig::default()
        };

        let mut chunker = chunk_stream(Cursor::new(doc.clone()), &config, &streaming).unwrap();
        let mut windows = Vec::new();
        while let Some(window) = chunker.next_window().unwrap() {
            windows.push((window.first_line, window.lines.len(), window.split));
        }

        let total_lines = doc.lines().count();
        assert!(windows.len() > 3);
        assert_eq!(windows[0], (1, 2, SplitKind::Newline));
        let mut next_line = 1;
        for &(first_line, len, _) in &windows {
            assert_eq!(first_line, next_line);
            assert!(len > 0);
            next_line += len;
        }
        assert_eq!(next_line, total_lines + 1);

        // Everything after the opening fence is fence body: only forced cuts.
        let (last, middle) = windows[1..].split_last().unwrap();
        assert_eq!(last.2, SplitKind::EndOfStream);
        assert!(middle.iter().all(|w| w.2 == SplitKind::HardCut));

        let chunks: Vec<Chunk> = chunk_stream(Cursor::new(doc), &config, &streaming)
            .unwrap()
            .collect::<AppResult<_>>()
            .unwrap();
        assert_eq!(chunks.last().unwrap().end_line, total_lines);
    }
}
