//! Sentence segmentation
//!
//! Splits cleaned text into sentence-level [`TextSegment`]s that respect:
//! - Terminal punctuation (periods, question marks, exclamation marks, CJK forms)
//! - Closing quotes and brackets that trail a sentence end
//! - A configurable set of abbreviations that never end a sentence
//!
//! The segmenter is pure: it keeps no state between calls.

use serde::{Deserialize, Serialize};

/// Sentence-ending punctuation characters
const SENTENCE_ENDINGS: &[char] = &['.', '!', '?', '。', '！', '？'];

/// CJK sentence endings, which end a sentence without trailing whitespace
const CJK_SENTENCE_ENDINGS: &[char] = &['。', '！', '？'];

/// Characters that close a quotation or parenthetical after a sentence end
const CLOSING_MARKS: &[char] = &[
    '"', '\'', '\u{201D}', '\u{2019}', ')', ']', '}', '\u{00BB}', '」', '』', '）',
];

/// Abbreviations recognized when none are configured
pub const DEFAULT_ABBREVIATIONS: &[&str] = &[
    "Dr.", "Mr.", "Mrs.", "Ms.", "Prof.", "Sr.", "Jr.", "St.", "vs.", "etc.", "e.g.", "i.e.",
    "et al.", "Fig.", "No.",
];

/// Kind of text unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentType {
    /// A single sentence from the segmenter
    Sentence,
    /// A group of sentences sent to a backend as one request
    Chunk,
}

/// An immutable unit of text with its word count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSegment {
    text: String,
    word_count: usize,
    segment_type: SegmentType,
}

impl TextSegment {
    /// Create a sentence segment
    pub fn sentence(text: impl Into<String>) -> Self {
        Self::new(text.into(), SegmentType::Sentence)
    }

    /// Create a chunk-level segment
    pub fn chunk(text: impl Into<String>) -> Self {
        Self::new(text.into(), SegmentType::Chunk)
    }

    fn new(text: String, segment_type: SegmentType) -> Self {
        let word_count = count_words(&text);
        Self {
            text,
            word_count,
            segment_type,
        }
    }

    /// Segment text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of spoken words (markup excluded)
    pub fn word_count(&self) -> usize {
        self.word_count
    }

    /// Segment kind
    pub fn segment_type(&self) -> SegmentType {
        self.segment_type
    }

    /// Length in characters (not bytes)
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Remove markup tags such as SSML (`<break time="1s"/>`)
///
/// An unmatched `<` is kept as text.
pub fn strip_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('<') {
        match rest[open..].find('>') {
            Some(close) => {
                out.push_str(&rest[..open]);
                out.push(' ');
                rest = &rest[open + close + 1..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}

/// Count whitespace-separated words that contain at least one alphanumeric character
pub fn count_words(text: &str) -> usize {
    strip_markup(text)
        .split_whitespace()
        .filter(|word| word.chars().any(char::is_alphanumeric))
        .count()
}

fn has_alphanumeric(text: &str) -> bool {
    text.chars().any(char::is_alphanumeric)
}

/// Sentence segmenter with abbreviation awareness
#[derive(Debug, Clone)]
pub struct SentenceSegmenter {
    /// Lowercased abbreviations, each ending with '.'
    abbreviations: Vec<String>,
}

impl Default for SentenceSegmenter {
    fn default() -> Self {
        Self::new(DEFAULT_ABBREVIATIONS.iter().copied())
    }
}

impl SentenceSegmenter {
    /// Create a segmenter with a custom abbreviation set
    ///
    /// Entries are matched case-insensitively; a missing trailing period is added.
    pub fn new<I, S>(abbreviations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut abbreviations: Vec<String> = abbreviations
            .into_iter()
            .map(|a| a.as_ref().trim().to_lowercase())
            .filter(|a| !a.is_empty())
            .map(|a| if a.ends_with('.') { a } else { format!("{}.", a) })
            .collect();
        abbreviations.sort();
        abbreviations.dedup();

        Self { abbreviations }
    }

    /// Configured abbreviations (lowercase)
    pub fn abbreviations(&self) -> &[String] {
        &self.abbreviations
    }

    /// Split text into sentence segments
    ///
    /// Blank input yields no segments. Pieces without any alphanumeric
    /// character are attached to a neighbouring sentence.
    pub fn segment(&self, text: &str) -> Vec<TextSegment> {
        let pieces = self.split_pieces(text);

        let mut sentences: Vec<String> = Vec::new();
        let mut pending_prefix = String::new();

        for piece in pieces {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }

            if !has_alphanumeric(piece) {
                match sentences.last_mut() {
                    Some(last) => {
                        last.push(' ');
                        last.push_str(piece);
                    }
                    None => {
                        pending_prefix.push_str(piece);
                        pending_prefix.push(' ');
                    }
                }
                continue;
            }

            if pending_prefix.is_empty() {
                sentences.push(piece.to_string());
            } else {
                sentences.push(format!("{}{}", pending_prefix, piece));
                pending_prefix.clear();
            }
        }

        sentences.into_iter().map(TextSegment::sentence).collect()
    }

    /// Split at sentence boundaries without trimming or merging
    fn split_pieces<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let mut pieces = Vec::new();
        let mut start = 0usize;
        let mut i = 0usize;

        while i < chars.len() {
            let (pos, c) = chars[i];
            if !SENTENCE_ENDINGS.contains(&c) {
                i += 1;
                continue;
            }

            let mut j = i;
            while j < chars.len() && SENTENCE_ENDINGS.contains(&chars[j].1) {
                j += 1;
            }
            let run_len = j - i;
            while j < chars.len() && CLOSING_MARKS.contains(&chars[j].1) {
                j += 1;
            }
            let end = chars.get(j).map_or(text.len(), |&(p, _)| p);

            let cjk = chars[i..j]
                .iter()
                .any(|(_, ch)| CJK_SENTENCE_ENDINGS.contains(ch));
            let followed_by_break = chars.get(j).is_none_or(|(_, ch)| ch.is_whitespace());

            let is_boundary = if cjk {
                true
            } else if !followed_by_break {
                false
            } else if run_len == 1 && c == '.' {
                !self.ends_with_abbreviation(&text[start..pos + 1])
            } else {
                true
            };

            if is_boundary {
                pieces.push(&text[start..end]);
                start = end;
            }
            i = j;
        }

        if start < text.len() {
            pieces.push(&text[start..]);
        }
        pieces
    }

    /// Whether `text` (ending in '.') ends with a whole-word abbreviation
    fn ends_with_abbreviation(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.abbreviations.iter().any(|abbr| {
            lower.ends_with(abbr.as_str())
                && lower[..lower.len() - abbr.len()]
                    .chars()
                    .next_back()
                    .is_none_or(|ch| !ch.is_alphanumeric())
        })
    }
}
