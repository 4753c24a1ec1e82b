//! Block element extraction.
//!
//! A single forward pass over the document lines classifies every line and
//! collects the structural elements: fenced code blocks, headers, lists and
//! tables. Irregular input never fails; an unterminated fence simply runs to
//! the end of the document.

use serde::{Deserialize, Serialize};

use super::fence::FenceMarker;

/// A structural element of the document, in document order.
///
/// Line numbers are 1-indexed and inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockElement {
    /// Fenced code block, fences included
    CodeBlock {
        start_line: usize,
        end_line: usize,
        language: Option<String>,
        fence_char: char,
        fence_len: usize,
        /// False when the fence ran to the end of the document
        closed: bool,
    },

    /// ATX header
    Header {
        start_line: usize,
        level: u8,
        text: String,
    },

    /// Contiguous list, including nested items and continuation lines
    ListBlock {
        start_line: usize,
        end_line: usize,
        max_depth: usize,
        item_count: usize,
        ordered: bool,
    },

    /// Pipe table: header row, separator row and body rows
    Table {
        start_line: usize,
        end_line: usize,
        columns: usize,
    },
}

impl BlockElement {
    pub fn start_line(&self) -> usize {
        match self {
            Self::CodeBlock { start_line, .. }
            | Self::Header { start_line, .. }
            | Self::ListBlock { start_line, .. }
            | Self::Table { start_line, .. } => *start_line,
        }
    }

    pub fn end_line(&self) -> usize {
        match self {
            Self::CodeBlock { end_line, .. }
            | Self::ListBlock { end_line, .. }
            | Self::Table { end_line, .. } => *end_line,
            Self::Header { start_line, .. } => *start_line,
        }
    }

    /// Atomic elements are never split by any strategy.
    pub fn is_atomic(&self) -> bool {
        matches!(self, Self::CodeBlock { .. } | Self::Table { .. })
    }
}

/// Per-line classification used for ratio computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Blank,
    Text,
    Header,
    Code,
    List,
    Table,
}

/// Output of the element pass.
#[derive(Debug, Default)]
pub(crate) struct ParsedBlocks {
    pub elements: Vec<BlockElement>,
    pub line_kinds: Vec<LineKind>,
    pub inline_code_count: usize,
}

/// Parse an ATX header line into `(level, text)`.
pub fn parse_header(line: &str) -> Option<(u8, String)> {
    let trimmed = line.trim_start();
    if line.len() - trimmed.len() > 3 {
        return None;
    }

    let level = trimmed.chars().take_while(|&c| c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }

    let rest = &trimmed[level..];
    if !rest.starts_with(|c: char| c == ' ' || c == '\t') {
        return None;
    }

    let text = rest.trim().trim_end_matches('#').trim();
    if text.is_empty() {
        return None;
    }

    Some((level as u8, text.to_string()))
}

/// Detect a list item marker, returning `(indent_width, ordered)`.
pub fn list_marker(line: &str) -> Option<(usize, bool)> {
    let trimmed = line.trim_start();
    let indent = indent_width(line);

    let mut chars = trimmed.chars();
    match chars.next()? {
        '-' | '*' | '+' => {
            if matches!(chars.next(), Some(' ') | Some('\t')) {
                return Some((indent, false));
            }
            None
        }
        c if c.is_ascii_digit() => {
            let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
            if digits > 9 {
                return None;
            }
            let mut rest = trimmed[digits..].chars();
            match (rest.next(), rest.next()) {
                (Some('.') | Some(')'), Some(' ') | Some('\t')) => Some((indent, true)),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Leading whitespace width, tabs counted as four columns.
pub fn indent_width(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

pub fn is_table_row(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && trimmed.contains('|')
}

pub fn is_table_separator(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.contains('-')
        && trimmed.contains('|')
        && trimmed
            .chars()
            .all(|c| matches!(c, '|' | '-' | ':' | ' ' | '\t'))
}

/// Whether a table starts at `lines[idx]`.
pub fn is_table_start(lines: &[&str], idx: usize) -> bool {
    idx + 1 < lines.len()
        && is_table_row(lines[idx])
        && !is_table_separator(lines[idx])
        && is_table_separator(lines[idx + 1])
}

fn count_columns(header_row: &str) -> usize {
    let trimmed = header_row.trim();
    let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner.split('|').count()
}

/// Count inline code spans (matching backtick runs) in a text line.
fn count_inline_code(line: &str) -> usize {
    let mut spans = 0;
    let mut open: Option<usize> = None;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '`' {
            continue;
        }
        let mut run = 1;
        while chars.peek() == Some(&'`') {
            chars.next();
            run += 1;
        }
        match open {
            Some(len) if len == run => {
                spans += 1;
                open = None;
            }
            None => open = Some(run),
            _ => {}
        }
    }

    spans
}

/// Run the element pass over normalized lines.
pub(crate) fn parse_blocks(lines: &[&str]) -> ParsedBlocks {
    let n = lines.len();
    let mut parsed = ParsedBlocks {
        elements: Vec::new(),
        line_kinds: vec![LineKind::Blank; n],
        inline_code_count: 0,
    };

    let mut i = 0;
    while i < n {
        let line = lines[i];

        if let Some(opener) = FenceMarker::parse(line) {
            let close = (i + 1..n).find(|&j| {
                FenceMarker::parse(lines[j]).is_some_and(|m| m.closes(&opener))
            });
            let (end, closed) = match close {
                Some(j) => (j, true),
                None => (n - 1, false),
            };

            parsed.line_kinds[i..=end].fill(LineKind::Code);
            parsed.elements.push(BlockElement::CodeBlock {
                start_line: i + 1,
                end_line: end + 1,
                language: opener.language(),
                fence_char: opener.ch,
                fence_len: opener.len,
                closed,
            });
            i = end + 1;
            continue;
        }

        if line.trim().is_empty() {
            i += 1;
            continue;
        }

        if let Some((level, text)) = parse_header(line) {
            parsed.line_kinds[i] = LineKind::Header;
            parsed.elements.push(BlockElement::Header {
                start_line: i + 1,
                level,
                text,
            });
            i += 1;
            continue;
        }

        if is_table_start(lines, i) {
            let mut end = i + 1;
            while end + 1 < n
                && is_table_row(lines[end + 1])
                && FenceMarker::parse(lines[end + 1]).is_none()
            {
                end += 1;
            }

            parsed.line_kinds[i..=end].fill(LineKind::Table);
            parsed.elements.push(BlockElement::Table {
                start_line: i + 1,
                end_line: end + 1,
                columns: count_columns(line),
            });
            i = end + 1;
            continue;
        }

        if let Some((_, ordered)) = list_marker(line) {
            let scan = scan_list(lines, i);
            for j in i..=scan.end {
                if !lines[j].trim().is_empty() {
                    parsed.line_kinds[j] = LineKind::List;
                }
            }
            parsed.elements.push(BlockElement::ListBlock {
                start_line: i + 1,
                end_line: scan.end + 1,
                max_depth: scan.max_depth,
                item_count: scan.item_count,
                ordered,
            });
            i = scan.end + 1;
            continue;
        }

        parsed.line_kinds[i] = LineKind::Text;
        parsed.inline_code_count += count_inline_code(line);
        i += 1;
    }

    parsed
}

struct ListScan {
    end: usize,
    max_depth: usize,
    item_count: usize,
}

/// Whether a line interrupts a list regardless of indentation.
fn breaks_list(lines: &[&str], idx: usize) -> bool {
    FenceMarker::parse(lines[idx]).is_some()
        || parse_header(lines[idx]).is_some()
        || is_table_start(lines, idx)
}

fn scan_list(lines: &[&str], start: usize) -> ListScan {
    let n = lines.len();
    let mut indents: Vec<usize> = Vec::new();
    let mut max_depth = 0;
    let mut item_count = 0;
    let mut last_content = start;
    let mut j = start;

    while j < n {
        let line = lines[j];

        if line.trim().is_empty() {
            let mut k = j + 1;
            while k < n && lines[k].trim().is_empty() {
                k += 1;
            }
            let continues = k < n
                && !breaks_list(lines, k)
                && (list_marker(lines[k]).is_some() || indent_width(lines[k]) >= 2);
            if !continues {
                break;
            }
            j = k;
            continue;
        }

        if j > start && breaks_list(lines, j) {
            break;
        }

        if let Some((indent, _)) = list_marker(line) {
            while indents.last().is_some_and(|&top| top > indent) {
                indents.pop();
            }
            if indents.last().map_or(true, |&top| top < indent) {
                indents.push(indent);
            }
            max_depth = max_depth.max(indents.len());
            item_count += 1;
        } else {
            // Indented continuation, or a lazy continuation right after content.
            let lazy = !lines[j - 1].trim().is_empty();
            if indent_width(line) < 2 && !lazy {
                break;
            }
        }

        last_content = j;
        j += 1;
    }

    ListScan {
        end: last_content,
        max_depth,
        item_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> ParsedBlocks {
        let lines: Vec<&str> = text.lines().collect();
        parse_blocks(&lines)
    }

    #[test]
    fn test_parse_header() {
        assert_eq!(parse_header("## Setup ##"), Some((2, "Setup".to_string())));
        assert_eq!(parse_header("#hashtag"), None);
        assert_eq!(parse_header("####### too deep"), None);
        assert_eq!(parse_header("    # indented code"), None);
    }

    #[test]
    fn test_list_marker() {
        assert_eq!(list_marker("- item"), Some((0, false)));
        assert_eq!(list_marker("    * nested"), Some((4, false)));
        assert_eq!(list_marker("12. twelfth"), Some((0, true)));
        assert_eq!(list_marker("3) third"), Some((0, true)));
        assert_eq!(list_marker("---"), None);
        assert_eq!(list_marker("2024 was a year"), None);
    }

    #[test]
    fn test_code_block_extraction() {
        let parsed = parse("intro\n\n```python\nprint(1)\n```\n\nafter");
        assert_eq!(
            parsed.elements,
            vec![BlockElement::CodeBlock {
                start_line: 3,
                end_line: 5,
                language: Some("python".to_string()),
                fence_char: '`',
                fence_len: 3,
                closed: true,
            }]
        );
        assert_eq!(parsed.line_kinds[3], LineKind::Code);
        assert_eq!(parsed.line_kinds[0], LineKind::Text);
    }

    #[test]
    fn test_unterminated_fence_runs_to_end() {
        let parsed = parse("```\nnever closed\n# not a header");
        assert_eq!(parsed.elements.len(), 1);
        assert!(matches!(
            parsed.elements[0],
            BlockElement::CodeBlock { end_line: 3, closed: false, .. }
        ));
    }

    #[test]
    fn test_header_inside_fence_is_code() {
        let parsed = parse("# Real\n\n```bash\n# comment\n```");
        let headers: Vec<_> = parsed
            .elements
            .iter()
            .filter(|e| matches!(e, BlockElement::Header { .. }))
            .collect();
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_table_detection() {
        let parsed = parse("| a | b | c |\n|---|:-:|---|\n| 1 | 2 | 3 |\n\ntext");
        assert_eq!(
            parsed.elements[0],
            BlockElement::Table {
                start_line: 1,
                end_line: 3,
                columns: 3,
            }
        );
    }

    #[test]
    fn test_pipe_without_separator_is_text() {
        let parsed = parse("a | b\nplain");
        assert!(parsed.elements.is_empty());
    }

    #[test]
    fn test_nested_list_depth() {
        let parsed = parse("- one\n  - two\n    - three\n  - back\n- top\n\nparagraph");
        assert_eq!(
            parsed.elements[0],
            BlockElement::ListBlock {
                start_line: 1,
                end_line: 5,
                max_depth: 3,
                item_count: 5,
                ordered: false,
            }
        );
        assert_eq!(parsed.line_kinds[6], LineKind::Text);
    }

    #[test]
    fn test_list_spans_blank_line_between_items() {
        let parsed = parse("1. first\n\n2. second\n\nDone.");
        assert!(matches!(
            parsed.elements[0],
            BlockElement::ListBlock { start_line: 1, end_line: 3, item_count: 2, ordered: true, .. }
        ));
    }

    #[test]
    fn test_inline_code_count() {
        let parsed = parse("Use `cargo build` and ``a ` b`` here, unmatched `tick");
        assert_eq!(parsed.inline_code_count, 2);
    }
}
