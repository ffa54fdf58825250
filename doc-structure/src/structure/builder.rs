//! Builds the chapter / paragraph / sentence tree from block tokens.

use serde_json::Value;

use crate::config::ParseConfig;
use crate::model::{
    CharRange, Chapter, ContentType, CustomMetadata, DocumentMetadata, DocumentPosition,
    IssueKind, Paragraph, ProcessingIssue, Sentence, UNTITLED_DOCUMENT,
};
use crate::structure::strategy::{ChapterBoundary, ChapterContext, ChapterStrategy};
use crate::text::{
    ContentSpan, ContentText, SentenceSegmenter, Token, TokenKind, clean_sentence, count_words,
};

/// Confidence of a paragraph built from recovered markup or without any
/// sentence.
pub const RECOVERED_PARAGRAPH_CONFIDENCE: f64 = 0.5;

/// Builder output before scoring.
#[derive(Debug, Clone)]
pub struct BuiltStructure {
    pub metadata: DocumentMetadata,
    pub chapters: Vec<Chapter>,
    /// Content blocks that precede the first chapter
    pub unassigned_blocks: usize,
    pub issues: Vec<ProcessingIssue>,
}

/// One paragraph-to-be: a block token, or a run of table rows.
struct Block {
    content_type: ContentType,
    range: CharRange,
    spans: Vec<ContentSpan>,
    recovered: bool,
}

pub struct StructureBuilder<'a> {
    config: &'a ParseConfig,
    segmenter: &'a SentenceSegmenter,
    strategy: &'a dyn ChapterStrategy,
}

impl<'a> StructureBuilder<'a> {
    pub fn new(
        config: &'a ParseConfig,
        segmenter: &'a SentenceSegmenter,
        strategy: &'a dyn ChapterStrategy,
    ) -> Self {
        Self {
            config,
            segmenter,
            strategy,
        }
    }

    /// Build the tree. `custom` entries override front matter keys.
    pub fn build(&self, source: &str, tokens: &[Token], custom: CustomMetadata) -> BuiltStructure {
        let title_index = tokens.iter().position(|t| t.heading_level() == Some(1));
        let first_heading = tokens.iter().position(|t| t.heading_level().is_some());

        let title = title_index
            .and_then(|i| match &tokens[i].kind {
                TokenKind::Heading { text, .. } if !text.trim().is_empty() => Some(text.clone()),
                _ => None,
            })
            .unwrap_or_else(|| UNTITLED_DOCUMENT.to_string());

        let ctx = ChapterContext {
            source,
            tokens,
            title_index,
        };
        let mut boundaries: Vec<ChapterBoundary> = self
            .strategy
            .boundaries(&ctx)
            .into_iter()
            .filter(|b| b.token_index < tokens.len())
            .collect();
        boundaries.sort_by_key(|b| b.token_index);
        boundaries.dedup_by_key(|b| b.token_index);

        // The title heading stays out of the chapters when it comes first
        // and has no content of its own before the next chapter.
        let title_consumed = title_index.is_some_and(|title| {
            let next = boundaries
                .iter()
                .map(|b| b.token_index)
                .find(|&i| i > title)
                .unwrap_or(tokens.len());
            let opens_chapter = boundaries.iter().any(|b| b.token_index == title);
            let has_body = tokens[title + 1..next].iter().any(Token::is_content);
            first_heading == Some(title) && !(opens_chapter && has_body)
        });
        if title_consumed {
            boundaries.retain(|b| Some(b.token_index) != title_index);
        }
        log::debug!(
            "{} strategy found {} chapter boundaries",
            self.strategy.name(),
            boundaries.len()
        );

        let mut issues = Vec::new();

        // Blocks ahead of the first chapter still count toward the document.
        let first_boundary = boundaries.first().map_or(tokens.len(), |b| b.token_index);
        let preamble: Vec<&Token> = tokens[..first_boundary]
            .iter()
            .enumerate()
            .filter(|(i, _)| !(title_consumed && Some(*i) == title_index))
            .map(|(_, t)| t)
            .collect();
        let preamble_blocks = group_blocks(preamble);
        let unassigned_words: usize = preamble_blocks
            .iter()
            .map(|block| self.paragraph(source, 0, 0, block).word_count)
            .sum();
        if let (Some(first), Some(last)) = (preamble_blocks.first(), preamble_blocks.last()) {
            let message = format!(
                "{} block(s) before the first chapter are not part of any chapter",
                preamble_blocks.len()
            );
            log::warn!("{}", message);
            issues.push(ProcessingIssue::new(
                IssueKind::UnassignedContent,
                message,
                first.range.cover(&last.range),
            ));
        }

        let mut chapters: Vec<Chapter> = boundaries
            .iter()
            .enumerate()
            .map(|(position, boundary)| {
                let end = boundaries
                    .get(position + 1)
                    .map_or(tokens.len(), |next| next.token_index);
                self.chapter(source, position, boundary, tokens, end)
            })
            .collect();

        if let Some(min_level) = chapters.iter().map(|c| c.level).min() {
            for chapter in &mut chapters {
                chapter.depth = usize::from(chapter.level - min_level);
            }
        }

        let mut custom_metadata = front_matter(source, tokens);
        custom_metadata.extend(custom);

        let chapter_words: usize = chapters.iter().map(|c| c.word_count).sum();
        BuiltStructure {
            metadata: DocumentMetadata {
                title,
                word_count: chapter_words + unassigned_words,
                custom_metadata,
            },
            chapters,
            unassigned_blocks: preamble_blocks.len(),
            issues,
        }
    }

    fn chapter(
        &self,
        source: &str,
        position: usize,
        boundary: &ChapterBoundary,
        tokens: &[Token],
        end: usize,
    ) -> Chapter {
        let heading = &tokens[boundary.token_index];
        let body: Vec<&Token> = tokens[boundary.token_index + 1..end].iter().collect();

        let paragraphs: Vec<Paragraph> = group_blocks(body)
            .iter()
            .enumerate()
            .map(|(index, block)| self.paragraph(source, position, index, block))
            .collect();

        let range_end = paragraphs
            .last()
            .map_or(heading.range.end, |p| p.char_range.end);
        let word_count = paragraphs.iter().map(|p| p.word_count).sum();
        let estimated_duration = paragraphs
            .iter()
            .filter(|p| p.include_in_audio)
            .map(|p| p.estimated_duration)
            .sum();
        let confidence = if paragraphs.is_empty() {
            0.0
        } else {
            paragraphs.iter().map(|p| p.confidence).sum::<f64>() / paragraphs.len() as f64
        };

        Chapter {
            id: format!("ch{:03}", position),
            title: boundary.title.trim().to_string(),
            level: boundary.level,
            position,
            depth: 0,
            char_range: CharRange::new(heading.range.start, range_end),
            paragraphs,
            word_count,
            estimated_duration,
            confidence,
        }
    }

    fn paragraph(
        &self,
        source: &str,
        chapter_index: usize,
        paragraph_index: usize,
        block: &Block,
    ) -> Paragraph {
        let content = ContentText::from_spans(source, &block.spans);
        let paragraph_id = format!("ch{:03}_p{:04}", chapter_index, paragraph_index);

        let mut sentences: Vec<Sentence> = Vec::new();
        for range in self.segmenter.split(content.text()) {
            let text = clean_sentence(&content.text()[range.clone()], self.config.normalize_typography);
            let word_count = count_words(&text);
            if word_count == 0 {
                continue;
            }
            let has_formatting = content.has_formatting(range.clone());
            let char_range = content.source_range(range);
            let sentence_index = sentences.len();
            sentences.push(Sentence {
                id: format!("{}_s{:03}", paragraph_id, sentence_index),
                text,
                word_count,
                estimated_duration: self.duration(word_count),
                has_formatting,
                char_range,
                document_position: DocumentPosition {
                    chapter_index,
                    paragraph_index,
                    sentence_index: Some(sentence_index),
                    start_char: char_range.start,
                    end_char: char_range.end,
                },
            });
        }

        let word_count = sentences.iter().map(|s| s.word_count).sum();
        let confidence = if block.recovered || sentences.is_empty() {
            RECOVERED_PARAGRAPH_CONFIDENCE
        } else {
            1.0
        };

        Paragraph {
            id: paragraph_id,
            content_type: block.content_type,
            char_range: block.range,
            confidence,
            include_in_audio: self.include_in_audio(block.content_type),
            sentences,
            word_count,
            estimated_duration: self.duration(word_count),
            document_position: DocumentPosition {
                chapter_index,
                paragraph_index,
                sentence_index: None,
                start_char: block.range.start,
                end_char: block.range.end,
            },
        }
    }

    fn include_in_audio(&self, content_type: ContentType) -> bool {
        match content_type {
            ContentType::Text | ContentType::Heading => true,
            ContentType::Code => self.config.include_code_blocks,
            ContentType::Table => self.config.include_tables,
            ContentType::Blockquote => self.config.include_blockquotes,
            ContentType::List => self.config.include_lists,
        }
    }

    /// Seconds of narration for `words` at the configured pace.
    fn duration(&self, words: usize) -> f64 {
        words as f64 * 60.0 / self.config.words_per_minute
    }
}

/// Turn content tokens into paragraph blocks, merging adjacent table rows.
fn group_blocks(tokens: Vec<&Token>) -> Vec<Block> {
    let mut blocks: Vec<Block> = Vec::new();
    let mut in_table = false;

    for token in tokens {
        let Some(content_type) = token.content_type() else {
            if !token.is_whitespace() {
                in_table = false;
            }
            continue;
        };
        if let TokenKind::TableRow { header } = token.kind {
            let continues = in_table && !header;
            in_table = true;
            if continues {
                if let Some(table) = blocks.last_mut() {
                    table.range = table.range.cover(&token.range);
                    table.spans.extend(token.content.iter().copied());
                    table.recovered |= token.recovered;
                    continue;
                }
            }
        }
        if content_type != ContentType::Table {
            in_table = false;
        }
        blocks.push(Block {
            content_type,
            range: token.range,
            spans: token.content.clone(),
            recovered: token.recovered,
        });
    }
    blocks
}

/// `key: value` lines of any front matter block, with scalar values typed.
fn front_matter(source: &str, tokens: &[Token]) -> CustomMetadata {
    tokens
        .iter()
        .filter(|t| t.kind == TokenKind::FrontMatter)
        .flat_map(|t| t.content.iter())
        .filter_map(|span| {
            let (key, value) = span.range.slice(source).split_once(':')?;
            let key = key.trim();
            (!key.is_empty()).then(|| (key.to_string(), scalar_value(value.trim())))
        })
        .collect()
}

fn scalar_value(raw: &str) -> Value {
    for quote in ['"', '\''] {
        if raw.len() >= 2 && raw.starts_with(quote) && raw.ends_with(quote) {
            return Value::String(raw[1..raw.len() - 1].to_string());
        }
    }
    match raw {
        "" | "~" | "null" => Value::Null,
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => {
            if let Ok(int) = raw.parse::<i64>() {
                Value::from(int)
            } else if let Some(number) = raw
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
            {
                Value::Number(number)
            } else {
                Value::String(raw.to_string())
            }
        }
    }
}
