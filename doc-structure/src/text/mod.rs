//! Text processing: block tokenizing, sentence segmentation and cleaning.

pub mod cleaner;
pub mod content;
pub mod segmenter;
pub mod tokenizer;

pub use cleaner::clean_sentence;
pub use content::ContentText;
pub use segmenter::{SentenceSegmenter, count_words};
pub use tokenizer::{ContentSpan, Join, Token, TokenKind, TokenStream, tokenize};
