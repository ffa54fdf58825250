//! Markdown block tokenizer.
//!
//! Blocks come from `pulldown-cmark`'s offset iterator. The token ranges tile
//! the source: the first token starts at 0, each token starts where the
//! previous one ended and the last ends at `source.len()`. Blank space
//! between blocks becomes `Whitespace` tokens; block tokens never include
//! their final line terminator.
//!
//! The parser accepts any input, so malformed markup is found by looking at
//! the source lines of the affected block: fences that are never closed,
//! tables without a delimiter row or with uneven rows, and list items
//! indented far past the previous item.

use once_cell::sync::Lazy;
use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag};
use regex::Regex;

use crate::config::ErrorHandlingStrategy;
use crate::error::{Result, StructureError};
use crate::model::{CharRange, ContentType, IssueKind, ProcessingIssue};

static LIST_ITEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([ \t]*)(?:[-*+]|\d{1,9}[.)])(?:[ \t]|$)").expect("valid list item regex")
});

static FRONT_MATTER_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+\s*:").expect("valid front matter key regex"));

/// Largest indentation jump allowed between consecutive list items.
const MAX_LIST_INDENT_STEP: usize = 4;

fn markdown_options() -> Options {
    Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH
}

/// Semantic kind of a block token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Heading { level: u8, text: String },
    Paragraph,
    CodeBlock { language: Option<String> },
    List { ordered: bool },
    Blockquote,
    TableRow { header: bool },
    FrontMatter,
    ThematicBreak,
    /// HTML blocks and link reference definitions
    Markup,
    Whitespace,
}

/// Separator placed before a content span when the spans are joined.
///
/// Variants are ordered by strength; when several separators are requested
/// between two spans the strongest one wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Join {
    /// Same line, nothing in between
    Inline,
    /// Soft-wrapped line, joined with a space
    Soft,
    /// Next cell of a table row
    Cell,
    /// Forced line break, always ends a sentence
    Hard,
}

/// Markup-free piece of a block, as a range into the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentSpan {
    pub range: CharRange,
    pub join: Join,
    /// Inside emphasis, strike-through, a link or image, or a code span
    pub formatted: bool,
}

impl ContentSpan {
    pub fn new(range: CharRange, join: Join) -> Self {
        Self {
            range,
            join,
            formatted: false,
        }
    }

    pub fn with_formatting(mut self, formatted: bool) -> Self {
        self.formatted = formatted;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub range: CharRange,
    pub content: Vec<ContentSpan>,
    /// Produced by degrading malformed markup
    pub recovered: bool,
}

impl Token {
    pub fn is_whitespace(&self) -> bool {
        self.kind == TokenKind::Whitespace
    }

    /// Paragraph type for blocks that carry narratable content.
    pub fn content_type(&self) -> Option<ContentType> {
        match self.kind {
            TokenKind::Heading { .. } => Some(ContentType::Heading),
            TokenKind::Paragraph => Some(ContentType::Text),
            TokenKind::CodeBlock { .. } => Some(ContentType::Code),
            TokenKind::List { .. } => Some(ContentType::List),
            TokenKind::Blockquote => Some(ContentType::Blockquote),
            TokenKind::TableRow { .. } => Some(ContentType::Table),
            TokenKind::FrontMatter
            | TokenKind::ThematicBreak
            | TokenKind::Markup
            | TokenKind::Whitespace => None,
        }
    }

    pub fn is_content(&self) -> bool {
        self.content_type().is_some()
    }

    pub fn heading_level(&self) -> Option<u8> {
        match self.kind {
            TokenKind::Heading { level, .. } => Some(level),
            _ => None,
        }
    }
}

/// Tokenizer output: the tokens plus any markup problems absorbed in
/// recover mode.
#[derive(Debug, Clone, Default)]
pub struct TokenStream {
    pub tokens: Vec<Token>,
    pub issues: Vec<ProcessingIssue>,
}

/// Scan `source` into block tokens.
///
/// In `Strict` mode the first malformed block fails the whole call. In
/// `Recover` mode malformed blocks are degraded and reported in
/// `TokenStream::issues`, and the call always succeeds.
pub fn tokenize(source: &str, mode: ErrorHandlingStrategy) -> Result<TokenStream> {
    let mut tokenizer = Tokenizer::new(source, mode);
    tokenizer.run()?;
    Ok(tokenizer.finish())
}

/// Where a table row starts, in the source and in the block's spans.
#[derive(Debug, Clone, Copy)]
struct RowStart {
    header: bool,
    offset: usize,
    first_span: usize,
}

/// A top-level block whose events are still arriving.
struct OpenBlock {
    kind: TokenKind,
    range: CharRange,
    table: bool,
    content: Vec<ContentSpan>,
    /// Strongest separator requested since the last span
    pending: Join,
    /// Open emphasis, strike-through, link and image tags
    formatting: usize,
    in_code: bool,
    /// Range of the first fenced code block that is never closed
    unclosed_fence: Option<CharRange>,
    heading_text: String,
    rows: Vec<RowStart>,
}

impl OpenBlock {
    fn new(tag: &Tag<'_>, range: CharRange) -> Self {
        let kind = match tag {
            Tag::Heading(level, _, _) => TokenKind::Heading {
                level: level_number(level),
                text: String::new(),
            },
            Tag::BlockQuote => TokenKind::Blockquote,
            Tag::CodeBlock(CodeBlockKind::Fenced(info)) => TokenKind::CodeBlock {
                language: info.split_whitespace().next().map(str::to_string),
            },
            Tag::CodeBlock(CodeBlockKind::Indented) => TokenKind::CodeBlock { language: None },
            Tag::List(start) => TokenKind::List {
                ordered: start.is_some(),
            },
            Tag::Table(_) => TokenKind::TableRow { header: true },
            _ => TokenKind::Paragraph,
        };
        Self {
            kind,
            range,
            table: matches!(tag, Tag::Table(_)),
            content: Vec::new(),
            pending: Join::Hard,
            formatting: 0,
            in_code: false,
            unclosed_fence: None,
            heading_text: String::new(),
            rows: Vec::new(),
        }
    }

    fn request(&mut self, join: Join) {
        self.pending = self.pending.max(join);
    }

    fn start(&mut self, tag: &Tag<'_>, range: CharRange, source: &str) {
        match tag {
            Tag::Emphasis | Tag::Strong | Tag::Strikethrough | Tag::Link(..) | Tag::Image(..) => {
                self.formatting += 1;
            }
            Tag::TableCell => self.request(Join::Cell),
            Tag::TableHead | Tag::TableRow => {
                self.request(Join::Hard);
                self.rows.push(RowStart {
                    header: matches!(tag, Tag::TableHead),
                    offset: line_at(source, range.start).start,
                    first_span: self.content.len(),
                });
            }
            Tag::CodeBlock(kind) => {
                self.request(Join::Hard);
                self.in_code = true;
                if matches!(kind, CodeBlockKind::Fenced(_))
                    && self.unclosed_fence.is_none()
                    && !fence_is_closed(source, range)
                {
                    self.unclosed_fence = Some(range);
                }
            }
            _ => self.request(Join::Hard),
        }
    }

    fn end(&mut self, tag: &Tag<'_>) {
        match tag {
            Tag::Emphasis | Tag::Strong | Tag::Strikethrough | Tag::Link(..) | Tag::Image(..) => {
                self.formatting = self.formatting.saturating_sub(1);
            }
            Tag::TableCell | Tag::TableHead | Tag::TableRow => {}
            Tag::CodeBlock(_) => {
                self.in_code = false;
                self.request(Join::Hard);
            }
            _ => self.request(Join::Hard),
        }
    }

    fn inline(&mut self, event: Event<'_>, range: CharRange, source: &str) {
        let heading = matches!(self.kind, TokenKind::Heading { .. });
        match event {
            Event::Text(text) if self.in_code => {
                // One span per non-blank code line
                for line in lines(source, range) {
                    if let Some(line) = trimmed(source, line) {
                        self.request(Join::Hard);
                        self.push_span(line, false);
                    }
                }
                if heading {
                    self.heading_text.push_str(&text);
                }
            }
            Event::Text(text) => {
                if heading {
                    self.heading_text.push_str(&text);
                }
                self.push_span(range, self.formatting > 0);
            }
            Event::Code(code) => {
                if heading {
                    self.heading_text.push_str(&code);
                }
                self.push_span(code_span_range(source, range, &code), true);
            }
            Event::SoftBreak => {
                self.heading_text.push(' ');
                self.request(Join::Soft);
            }
            Event::HardBreak => {
                self.heading_text.push(' ');
                self.request(Join::Hard);
            }
            _ => {}
        }
    }

    /// Append a span, extending the previous one when they touch on the
    /// same line with the same formatting.
    fn push_span(&mut self, range: CharRange, formatted: bool) {
        if range.is_empty() {
            return;
        }
        if self.pending == Join::Inline {
            if let Some(last) = self
                .content
                .last_mut()
                .filter(|last| last.range.end == range.start && last.formatted == formatted)
            {
                last.range = CharRange::new(last.range.start, range.end);
                return;
            }
        }
        self.content
            .push(ContentSpan::new(range, self.pending).with_formatting(formatted));
        self.pending = Join::Inline;
    }
}

struct Tokenizer<'a> {
    source: &'a str,
    mode: ErrorHandlingStrategy,
    /// Byte offset up to which tokens have been emitted
    cursor: usize,
    stream: TokenStream,
}

impl<'a> Tokenizer<'a> {
    fn new(source: &'a str, mode: ErrorHandlingStrategy) -> Self {
        Self {
            source,
            mode,
            cursor: 0,
            stream: TokenStream::default(),
        }
    }

    fn run(&mut self) -> Result<()> {
        let mut offset = self.front_matter();
        while offset < self.source.len() {
            offset = self.parse_from(offset)?;
        }
        Ok(())
    }

    /// Parse `source[offset..]`. Returns where parsing resumes after a
    /// recovered code fence, or the end of the source.
    fn parse_from(&mut self, offset: usize) -> Result<usize> {
        let source = self.source;
        let parser = Parser::new_ext(&source[offset..], markdown_options());
        let mut open: Option<OpenBlock> = None;
        let mut depth = 0usize;

        for (event, range) in parser.into_offset_iter() {
            let range = CharRange::new(offset + range.start, offset + range.end);
            match event {
                Event::Start(tag) => {
                    let block = open.get_or_insert_with(|| OpenBlock::new(&tag, range));
                    block.start(&tag, range, source);
                    depth += 1;
                }
                Event::End(tag) => {
                    depth = depth.saturating_sub(1);
                    if let Some(block) = open.as_mut() {
                        block.end(&tag);
                    }
                    if depth == 0 {
                        if let Some(block) = open.take() {
                            if let Some(resume) = self.close(block)? {
                                return Ok(resume);
                            }
                        }
                    }
                }
                Event::Rule if depth == 0 => {
                    self.push(TokenKind::ThematicBreak, range, Vec::new(), false);
                }
                Event::Html(_) if depth == 0 => {
                    self.push(TokenKind::Markup, range, Vec::new(), false);
                }
                event => {
                    if let Some(block) = open.as_mut() {
                        block.inline(event, range, source);
                    }
                }
            }
        }
        Ok(source.len())
    }

    fn finish(mut self) -> TokenStream {
        let len = self.source.len();
        if self.cursor < len {
            self.fill_gap(len);
        }
        self.stream
    }

    /// Cover `cursor..end` with a `Whitespace` token, or a `Markup` token
    /// when it holds text the parser produced no events for.
    fn fill_gap(&mut self, end: usize) {
        let range = CharRange::new(self.cursor, end);
        let kind = if range.slice(self.source).trim().is_empty() {
            TokenKind::Whitespace
        } else {
            TokenKind::Markup
        };
        self.stream.tokens.push(Token {
            kind,
            range,
            content: Vec::new(),
            recovered: false,
        });
        self.cursor = end;
    }

    fn push(&mut self, kind: TokenKind, range: CharRange, content: Vec<ContentSpan>, recovered: bool) {
        let start = range.start.max(self.cursor);
        if range.end <= start {
            return;
        }
        let range = self.trim_end(CharRange::new(start, range.end));
        if range.is_empty() {
            return;
        }

        // Consecutive HTML lines form one block
        if kind == TokenKind::Markup {
            if let Some(last) = self
                .stream
                .tokens
                .last_mut()
                .filter(|last| last.kind == TokenKind::Markup)
            {
                last.range = CharRange::new(last.range.start, range.end);
                self.cursor = range.end;
                return;
            }
        }

        if range.start > self.cursor {
            self.fill_gap(range.start);
        }
        let content = content
            .into_iter()
            .filter_map(|span| {
                let start = span.range.start.max(range.start);
                let end = span.range.end.min(range.end);
                (end > start).then(|| ContentSpan {
                    range: CharRange::new(start, end),
                    ..span
                })
            })
            .collect();
        self.cursor = range.end;
        self.stream.tokens.push(Token {
            kind,
            range,
            content,
            recovered,
        });
    }

    fn trim_end(&self, range: CharRange) -> CharRange {
        let text = range.slice(self.source);
        CharRange::new(range.start, range.start + text.trim_end().len())
    }

    /// Report malformed markup: an error in strict mode, a recorded issue
    /// otherwise.
    fn malformed(&mut self, kind: IssueKind, message: String, range: CharRange) -> Result<()> {
        match self.mode {
            ErrorHandlingStrategy::Strict => Err(StructureError::TokenizationFailure {
                offset: range.start,
                reason: message,
            }),
            ErrorHandlingStrategy::Recover => {
                log::warn!("{}; degrading to plain text", message);
                self.stream
                    .issues
                    .push(ProcessingIssue::new(kind, message, range));
                Ok(())
            }
        }
    }

    /// A leading `---` block of `key: value` lines. Returns the offset
    /// Markdown parsing starts from.
    fn front_matter(&mut self) -> usize {
        let source = self.source;
        let all = lines(source, CharRange::new(0, source.len()));
        let Some(first) = all.first() else {
            return 0;
        };
        if first.slice(source).trim_end() != "---" {
            return 0;
        }
        let Some(close) = all
            .iter()
            .skip(1)
            .position(|l| matches!(l.slice(source).trim_end(), "---" | "..."))
            .map(|offset| offset + 1)
        else {
            return 0;
        };

        let inner = &all[1..close];
        let looks_like_yaml = inner
            .iter()
            .find(|l| !l.slice(source).trim().is_empty())
            .is_some_and(|l| FRONT_MATTER_KEY.is_match(l.slice(source)));
        if !looks_like_yaml {
            return 0;
        }

        let content = inner
            .iter()
            .filter_map(|l| trimmed(source, *l))
            .map(|r| ContentSpan::new(r, Join::Hard))
            .collect();
        let range = CharRange::new(first.start, all[close].end);
        self.push(TokenKind::FrontMatter, range, content, false);
        range.end
    }

    /// Emit a finished top-level block. Returns a resume offset when the
    /// rest of the source has to be parsed again.
    fn close(&mut self, block: OpenBlock) -> Result<Option<usize>> {
        let source = self.source;
        let range = self.trim_end(block.range);
        let mut recovered = false;

        if let Some(fence) = block.unclosed_fence {
            let line = self.trim_end(line_at(source, fence.start));
            self.malformed(
                IssueKind::UnterminatedCodeFence,
                format!("code fence opened at byte {} is never closed", line.start),
                line,
            )?;
            // A top-level fence swallows the rest of the document
            if matches!(block.kind, TokenKind::CodeBlock { .. }) {
                return Ok(Some(self.recover_fence(line)));
            }
            recovered = true;
        }

        if block.table {
            self.table(block, range)?;
            return Ok(None);
        }
        if matches!(block.kind, TokenKind::List { .. }) {
            recovered |= self.check_list_indentation(range)?;
        }
        if block.kind == TokenKind::Paragraph && range.slice(source).trim_start().starts_with('|') {
            self.malformed(
                IssueKind::MalformedTable,
                format!("table at byte {} has no delimiter row", range.start),
                range,
            )?;
            recovered = true;
        }

        let kind = match block.kind {
            TokenKind::Heading { level, .. } => TokenKind::Heading {
                level,
                text: block.heading_text.trim().to_string(),
            },
            kind => kind,
        };
        self.push(kind, range, block.content, recovered);
        Ok(None)
    }

    /// The fence line and the lines after it, up to the next blank line,
    /// become one recovered paragraph. Returns where parsing resumes.
    fn recover_fence(&mut self, fence: CharRange) -> usize {
        let source = self.source;
        let body: Vec<CharRange> = lines(source, CharRange::new(fence.start, source.len()))
            .into_iter()
            .skip(1)
            .take_while(|l| !l.slice(source).trim().is_empty())
            .collect();
        let end = body.last().map_or(fence.end, |l| l.end);
        let content = body
            .iter()
            .filter_map(|l| trimmed(source, *l))
            .enumerate()
            .map(|(i, r)| ContentSpan::new(r, if i == 0 { Join::Hard } else { Join::Soft }))
            .collect();
        self.push(
            TokenKind::Paragraph,
            CharRange::new(fence.start, end),
            content,
            true,
        );
        end
    }

    /// One token per table row; the header token also covers the
    /// delimiter row.
    fn table(&mut self, block: OpenBlock, range: CharRange) -> Result<()> {
        let source = self.source;
        let cells = |row: &RowStart| cell_count(line_at(source, row.offset).slice(source));
        let header_cells = block.rows.first().map(cells);
        let uneven = block
            .rows
            .iter()
            .skip(1)
            .any(|row| Some(cells(row)) != header_cells);
        if uneven {
            self.malformed(
                IssueKind::MalformedTable,
                format!("table at byte {} has rows with uneven cell counts", range.start),
                range,
            )?;
        }

        for (i, row) in block.rows.iter().enumerate() {
            let next = block.rows.get(i + 1);
            let end = next.map_or(range.end, |n| n.offset);
            let spans_end = next.map_or(block.content.len(), |n| n.first_span);
            self.push(
                TokenKind::TableRow { header: row.header },
                CharRange::new(row.offset, end),
                block.content[row.first_span..spans_end].to_vec(),
                uneven,
            );
        }
        Ok(())
    }

    /// Flag list items indented far past the item before them.
    fn check_list_indentation(&mut self, range: CharRange) -> Result<bool> {
        let source = self.source;
        let mut recovered = false;
        let mut prev_indent: Option<usize> = None;
        for line in lines(source, range) {
            let Some(caps) = LIST_ITEM.captures(line.slice(source)) else {
                continue;
            };
            let indent = indent_width(&caps[1]);
            if let Some(prev) = prev_indent {
                if indent > prev + MAX_LIST_INDENT_STEP {
                    self.malformed(
                        IssueKind::BadListIndentation,
                        format!(
                            "list item at byte {} is indented {} columns past the previous item",
                            line.start,
                            indent - prev
                        ),
                        line,
                    )?;
                    recovered = true;
                }
            }
            prev_indent = Some(indent);
        }
        Ok(recovered)
    }
}

fn level_number(level: &HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Line content ranges inside `range`, without line terminators.
fn lines(source: &str, range: CharRange) -> Vec<CharRange> {
    let mut lines = Vec::new();
    let mut start = range.start;
    for (idx, _) in range.slice(source).match_indices('\n') {
        let newline = range.start + idx;
        let end = if newline > start && source.as_bytes()[newline - 1] == b'\r' {
            newline - 1
        } else {
            newline
        };
        lines.push(CharRange::new(start, end));
        start = newline + 1;
    }
    if start < range.end {
        lines.push(CharRange::new(start, range.end));
    }
    lines
}

/// The whole line holding byte `pos`, without its terminator.
fn line_at(source: &str, pos: usize) -> CharRange {
    let start = source[..pos].rfind('\n').map_or(0, |i| i + 1);
    let mut end = source[pos..].find('\n').map_or(source.len(), |i| pos + i);
    if end > start && source.as_bytes()[end - 1] == b'\r' {
        end -= 1;
    }
    CharRange::new(start, end)
}

fn trimmed(source: &str, range: CharRange) -> Option<CharRange> {
    let text = range.slice(source);
    let body = text.trim();
    if body.is_empty() {
        return None;
    }
    let start = range.start + (text.len() - text.trim_start().len());
    Some(CharRange::new(start, start + body.len()))
}

/// Range of a code span's text, without the backticks around it.
fn code_span_range(source: &str, range: CharRange, code: &str) -> CharRange {
    let raw = range.slice(source);
    match raw.find(code) {
        Some(at) if !code.is_empty() => {
            CharRange::new(range.start + at, range.start + at + code.len())
        }
        _ => {
            let lead = raw.len() - raw.trim_start_matches('`').len();
            let inner = raw.trim_matches('`');
            CharRange::new(range.start + lead, range.start + lead + inner.len())
        }
    }
}

/// A fenced block's last line repeats its opening fence.
fn fence_is_closed(source: &str, range: CharRange) -> bool {
    let text = range.slice(source).trim_end();
    let mut block_lines = text.lines();
    let Some(open) = block_lines.next() else {
        return false;
    };
    let Some(at) = open.find(['`', '~']) else {
        return false;
    };
    let fence = &open[at..];
    let Some(marker) = fence.chars().next() else {
        return false;
    };
    let run = fence.chars().take_while(|c| *c == marker).count();
    let Some(last) = block_lines.last() else {
        return false;
    };
    // Blockquote markers may precede the closing fence
    let close = last
        .trim_start_matches(|c: char| c == '>' || c.is_whitespace())
        .trim_end();
    close.len() >= run && close.chars().all(|c| c == marker)
}

fn indent_width(indent: &str) -> usize {
    indent.chars().map(|c| if c == '\t' { 4 } else { 1 }).sum()
}

/// Cells in a table row as written, ignoring escaped pipes.
fn cell_count(line: &str) -> usize {
    let row = line.trim();
    let row = row.strip_prefix('|').unwrap_or(row);
    let row = match row.strip_suffix('|') {
        Some(inner) if !inner.ends_with('\\') => inner,
        _ => row,
    };
    let mut cells = 1;
    let mut prev = None;
    for c in row.chars() {
        if c == '|' && prev != Some('\\') {
            cells += 1;
        }
        prev = Some(c);
    }
    cells
}
