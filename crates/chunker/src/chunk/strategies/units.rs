//! Block units and greedy packing shared by the code-aware and structural
//! strategies.
//!
//! A unit is the smallest piece a strategy places as a whole: a header line,
//! a paragraph, a list, a fenced code block or a table. Units are packed into
//! chunks in document order; a header is never left dangling at the end of a
//! chunk when the unit it introduces moves on to the next one.

use std::collections::BTreeMap;

use super::{pack_lines, split_text_block, StrategyContext, StrategyId};
use crate::analysis::{indent_width, list_marker, BlockElement, LineKind};
use crate::chunk::{render_lines, Chunk, OversizeReason};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnitKind {
    Header(u8),
    Paragraph,
    List,
    Code,
    Table,
}

/// Block unit over 0-based inclusive lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Unit {
    pub start: usize,
    pub end: usize,
    pub kind: UnitKind,
    pub chars: usize,
}

impl Unit {
    fn new(lines: &[&str], start: usize, end: usize, kind: UnitKind) -> Self {
        let chars = lines[start..=end]
            .iter()
            .map(|l| l.chars().count())
            .sum::<usize>()
            + (end - start);
        Self {
            start,
            end,
            kind,
            chars,
        }
    }
}

/// Split the 0-based inclusive line range into units.
pub(crate) fn build_units(ctx: &StrategyContext<'_>, start: usize, end: usize) -> Vec<Unit> {
    let lines = ctx.lines;
    if lines.is_empty() || start > end {
        return Vec::new();
    }
    let end = end.min(lines.len() - 1);

    // Elements keyed by their 0-based start line.
    let by_start: BTreeMap<usize, &BlockElement> = ctx
        .analysis
        .elements
        .iter()
        .filter(|e| e.start_line() > start && e.start_line() <= end + 1)
        .map(|e| (e.start_line() - 1, e))
        .collect();

    let mut units = Vec::new();
    let mut i = start;

    while i <= end {
        if lines[i].trim().is_empty() {
            i += 1;
            continue;
        }

        if let Some(element) = by_start.get(&i) {
            let last = (element.end_line() - 1).clamp(i, end);
            let kind = match element {
                BlockElement::CodeBlock { .. } => UnitKind::Code,
                BlockElement::Table { .. } => UnitKind::Table,
                BlockElement::ListBlock { .. } => UnitKind::List,
                BlockElement::Header { level, .. } => UnitKind::Header(*level),
            };
            units.push(Unit::new(lines, i, last, kind));
            i = last + 1;
            continue;
        }

        // Paragraph: consecutive text lines up to a blank line or an element.
        let mut j = i;
        while j < end
            && !by_start.contains_key(&(j + 1))
            && ctx.analysis.line_kind(j + 2) == LineKind::Text
        {
            j += 1;
        }
        units.push(Unit::new(lines, i, j, UnitKind::Paragraph));
        i = j + 1;
    }

    units
}

/// How units are grouped into chunks.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PackOptions<'p> {
    /// Start a new chunk at each header once the current one reaches
    /// `min_chunk_size`
    pub break_at_headers: bool,
    /// Header path for every chunk instead of the per-line lookup
    pub header_path: Option<&'p str>,
}

struct Packer<'c, 'a> {
    ctx: &'c StrategyContext<'a>,
    strategy: StrategyId,
    options: PackOptions<'c>,
    chunks: Vec<Chunk>,
    group: Vec<Unit>,
    size: usize,
}

impl<'c, 'a> Packer<'c, 'a> {
    fn path_for(&self, start: usize) -> String {
        match self.options.header_path {
            Some(path) => path.to_string(),
            None => self.ctx.headers.path_at(start + 1).to_string(),
        }
    }

    fn chunk_for(&self, start: usize, end: usize) -> Option<Chunk> {
        let (content, s, e) = render_lines(self.ctx.lines, start, end)?;
        let path = self.path_for(s - 1);
        Some(Chunk::new(content, s, e, self.strategy, path))
    }

    fn size_with(&self, unit: &Unit) -> usize {
        match self.group.last() {
            Some(last) => self.size + (unit.start - last.end) + unit.chars,
            None => unit.chars,
        }
    }

    fn flush(&mut self) {
        if let (Some(first), Some(last)) = (self.group.first(), self.group.last()) {
            if let Some(chunk) = self.chunk_for(first.start, last.end) {
                self.chunks.push(chunk);
            }
        }
        self.group.clear();
        self.size = 0;
    }

    /// Flush everything but trailing headers, which stay to lead the next chunk.
    fn flush_keep_headers(&mut self) {
        let split = self
            .group
            .iter()
            .rposition(|u| !matches!(u.kind, UnitKind::Header(_)))
            .map_or(0, |idx| idx + 1);
        let carried: Vec<Unit> = self.group.split_off(split);
        self.flush();
        for unit in carried {
            self.push(unit);
        }
    }

    fn push(&mut self, unit: Unit) {
        self.size = self.size_with(&unit);
        self.group.push(unit);
    }

    fn add(&mut self, unit: Unit) {
        let max = self.ctx.config.max_chunk_size;

        if self.options.break_at_headers
            && matches!(unit.kind, UnitKind::Header(_))
            && self.size >= self.ctx.config.min_chunk_size
            && self.group.iter().any(|u| !matches!(u.kind, UnitKind::Header(_)))
        {
            self.flush_keep_headers();
        }

        if unit.chars > max {
            self.flush_keep_headers();
            self.add_oversized(unit);
            return;
        }

        if !self.group.is_empty() && self.size_with(&unit) > max {
            self.flush_keep_headers();
            if !self.group.is_empty() && self.size_with(&unit) > max {
                self.flush();
            }
        }

        self.push(unit);
    }

    /// Place a unit larger than `max_chunk_size`; pending headers lead it when
    /// it stays whole.
    fn add_oversized(&mut self, unit: Unit) {
        let preserve = self.ctx.config.preserve_atomic_blocks;
        let lead = self.group.first().map(|u| u.start);

        match unit.kind {
            UnitKind::Code => self.emit_whole(lead, unit, OversizeReason::CodeBlockIntegrity),
            UnitKind::Table if preserve => {
                self.emit_whole(lead, unit, OversizeReason::TableIntegrity)
            }
            UnitKind::Table => {
                self.flush();
                let path = self.path_for(unit.start);
                let pieces = pack_lines(self.ctx, unit.start, unit.end, self.strategy, &path);
                self.chunks.extend(pieces);
            }
            UnitKind::List => {
                self.flush();
                self.split_list(unit);
            }
            UnitKind::Paragraph | UnitKind::Header(_) => {
                self.flush();
                let path = self.path_for(unit.start);
                let pieces = if unit.start == unit.end {
                    split_text_block(self.ctx, unit.start, unit.end, self.strategy, &path)
                } else {
                    pack_lines(self.ctx, unit.start, unit.end, self.strategy, &path)
                };
                self.chunks.extend(pieces);
            }
        }
    }

    fn emit_whole(&mut self, lead: Option<usize>, unit: Unit, reason: OversizeReason) {
        let start = lead.unwrap_or(unit.start);
        if let Some(mut chunk) = self.chunk_for(start, unit.end) {
            chunk.flag_oversize(reason);
            self.chunks.push(chunk);
        }
        self.group.clear();
        self.size = 0;
    }

    /// Split an oversized list only between top-level items.
    fn split_list(&mut self, unit: Unit) {
        let lines = self.ctx.lines;
        let top_indent = (unit.start..=unit.end)
            .filter_map(|i| list_marker(lines[i]).map(|(indent, _)| indent))
            .min()
            .unwrap_or(0);

        let mut item_starts: Vec<usize> = (unit.start..=unit.end)
            .filter(|&i| {
                list_marker(lines[i]).is_some() && indent_width(lines[i]) == top_indent
            })
            .collect();
        if item_starts.first() != Some(&unit.start) {
            item_starts.insert(0, unit.start);
        }

        let items: Vec<Unit> = item_starts
            .iter()
            .enumerate()
            .map(|(k, &s)| {
                let e = item_starts.get(k + 1).map_or(unit.end, |next| next - 1);
                Unit::new(lines, s, e, UnitKind::List)
            })
            .collect();

        let max = self.ctx.config.max_chunk_size;
        for item in items {
            if item.chars > max {
                self.flush();
                if let Some(mut chunk) = self.chunk_for(item.start, item.end) {
                    chunk.flag_oversize(OversizeReason::SectionIntegrity);
                    self.chunks.push(chunk);
                }
                continue;
            }
            if !self.group.is_empty() && self.size_with(&item) > max {
                self.flush();
            }
            self.push(item);
        }
        self.flush();
    }
}

/// Greedily pack units into chunks of at most `max_chunk_size` characters.
pub(crate) fn pack_units(
    ctx: &StrategyContext<'_>,
    units: &[Unit],
    strategy: StrategyId,
    options: PackOptions<'_>,
) -> Vec<Chunk> {
    let mut packer = Packer {
        ctx,
        strategy,
        options,
        chunks: Vec::new(),
        group: Vec::new(),
        size: 0,
    };

    for unit in units {
        packer.add(*unit);
    }
    packer.flush();

    packer.chunks
}
