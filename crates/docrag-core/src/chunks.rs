//! Normalizes extracted text and splits it into overlapping chunks for embedding.
//! Paragraphs are the unit of packing; a paragraph is never split.

use std::sync::LazyLock;

use regex::Regex;

/// Default token budget per chunk.
pub const DEFAULT_MAX_TOKENS: usize = 350;

/// Default number of trailing words carried from one chunk into the next.
pub const DEFAULT_OVERLAP_TOKENS: usize = 40;

/// Joins paragraphs inside a chunk.
pub const CHUNK_SEPARATOR: &str = "\n";

static HORIZONTAL_WS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+").expect("static regex is valid"));
static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("static regex is valid"));

/// Canonical form of raw extracted text: no carriage returns, single spaces,
/// at most one blank line between paragraphs, trimmed.
pub fn normalize(text: &str) -> String {
    let text = text.replace('\r', "");
    let text = HORIZONTAL_WS.replace_all(&text, " ");
    let text = BLANK_LINES.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Splits normalized text on blank lines. Empty paragraphs are dropped, order is kept.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Cheap token estimate: one token per four characters, never less than one.
///
/// This does not match any real tokenizer. It is only used to compare sizes
/// against the chunk budget.
pub fn estimate_tokens(s: &str) -> usize {
    tokens_for_chars(s.chars().count())
}

fn tokens_for_chars(chars: usize) -> usize {
    (chars / 4).max(1)
}

/// Greedily packs paragraphs into chunks of at most `max_tokens` estimated tokens.
///
/// The running estimate is taken over the chunk text as it will be emitted,
/// separators included. When a paragraph does not fit, the current chunk is
/// flushed and the next one is seeded with up to `overlap_words` trailing words
/// of the flushed chunk. Leading words of that seed are dropped until seed and
/// paragraph fit the budget together; if none fit, no seed is used.
///
/// A paragraph larger than the budget on its own becomes its own chunk, unsplit.
pub fn chunk_paragraphs(
    paragraphs: &[String],
    max_tokens: usize,
    overlap_words: usize,
) -> Vec<String> {
    let mut chunks: Vec<String> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_chars = 0usize;

    for para in paragraphs {
        let para_chars = para.chars().count();
        if fits(current_chars, para_chars, max_tokens) {
            current_chars = appended_len(current_chars, para_chars);
            current.push(para.clone());
            continue;
        }

        if !current.is_empty() {
            chunks.push(current.join(CHUNK_SEPARATOR));
            current.clear();
        }
        current_chars = 0;

        if overlap_words > 0 {
            if let Some(prev) = chunks.last() {
                if let Some(seed) = overlap_seed(prev, overlap_words, para_chars, max_tokens) {
                    current_chars = seed.chars().count();
                    current.push(seed);
                }
            }
        }
        current_chars = appended_len(current_chars, para_chars);
        current.push(para.clone());
    }

    if !current.is_empty() {
        chunks.push(current.join(CHUNK_SEPARATOR));
    }
    chunks
}

fn appended_len(current_chars: usize, para_chars: usize) -> usize {
    if current_chars == 0 {
        para_chars
    } else {
        current_chars + CHUNK_SEPARATOR.len() + para_chars
    }
}

fn fits(current_chars: usize, para_chars: usize, max_tokens: usize) -> bool {
    tokens_for_chars(appended_len(current_chars, para_chars)) <= max_tokens
}

/// Longest suffix of the last `overlap_words` words of `prev` that still leaves
/// room for the incoming paragraph.
fn overlap_seed(
    prev: &str,
    overlap_words: usize,
    para_chars: usize,
    max_tokens: usize,
) -> Option<String> {
    let words: Vec<&str> = prev.split_whitespace().collect();
    let mut tail = &words[words.len().saturating_sub(overlap_words)..];
    while !tail.is_empty() {
        let seed = tail.join(" ");
        if fits(seed.chars().count(), para_chars, max_tokens) {
            return Some(seed);
        }
        tail = &tail[1..];
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paras(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn normalize_collapses_whitespace() {
        let raw = "  Loan\t\tAmount \r\n\r\n\r\n\r\nEMI:   500  ";
        assert_eq!(normalize(raw), "Loan Amount \n\nEMI: 500");
    }

    #[test]
    fn normalize_keeps_single_blank_line() {
        assert_eq!(normalize("a\n\nb\nc"), "a\n\nb\nc");
    }

    #[test]
    fn split_drops_blank_paragraphs() {
        let p = split_paragraphs("First\n\n \n\nSecond\nline\n\nThird");
        assert_eq!(p, paras(&["First", "Second\nline", "Third"]));
    }

    #[test]
    fn estimate_is_at_least_one() {
        assert_eq!(estimate_tokens(""), 1);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens(&"x".repeat(100)), 25);
        // counted in characters, not bytes
        assert_eq!(estimate_tokens("₹₹₹₹₹₹₹₹"), 2);
    }

    #[test]
    fn empty_input_gives_no_chunks() {
        assert!(chunk_paragraphs(&[], 50, 10).is_empty());
    }

    #[test]
    fn everything_fits_in_one_chunk() {
        let c = chunk_paragraphs(&paras(&["P1", "P2", "P3"]), 350, 40);
        assert_eq!(c, vec!["P1\nP2\nP3".to_string()]);
    }

    #[test]
    fn overflow_seeds_next_chunk_with_tail_of_previous() {
        let a = "A".repeat(100);
        let b = "B".repeat(100);
        let c = "C".repeat(100);
        let chunks = chunk_paragraphs(&[a.clone(), b.clone(), c.clone()], 50, 10);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], format!("{a}\n{b}"));
        // "A.." would push the seeded chunk over budget, so only "B.." is carried.
        assert_eq!(chunks[1], format!("{b}\n{c}"));
        assert!(chunks.iter().all(|ch| estimate_tokens(ch) <= 50));
    }

    #[test]
    fn overlap_carries_trailing_words() {
        let first = "one two three four five six seven eight".to_string();
        let second = "nine ten eleven twelve thirteen fourteen".to_string();
        let chunks = chunk_paragraphs(&[first, second], 14, 3);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].starts_with("six seven eight\nnine"));
    }

    #[test]
    fn no_overlap_when_disabled() {
        let chunks = chunk_paragraphs(&paras(&["aaaa bbbb", "cccc dddd"]), 2, 0);
        assert_eq!(chunks, paras(&["aaaa bbbb", "cccc dddd"]));
    }

    #[test]
    fn oversized_paragraph_is_kept_whole() {
        let big = "word ".repeat(100).trim().to_string();
        let chunks = chunk_paragraphs(&[big.clone(), "tail".to_string()], 20, 5);
        assert_eq!(chunks[0], big);
        assert!(chunks[1].ends_with("tail"));
    }

    #[test]
    fn chunks_respect_budget_and_cover_every_paragraph() {
        let input: Vec<String> = (0..40)
            .map(|i| format!("paragraph {i} {}", "lorem ipsum ".repeat(i % 7 + 1)).trim().to_string())
            .collect();
        let chunks = chunk_paragraphs(&input, 30, 6);

        for ch in &chunks {
            let single_oversized = input.iter().any(|p| p == ch && estimate_tokens(p) > 30);
            assert!(estimate_tokens(ch) <= 30 || single_oversized, "over budget: {ch:?}");
        }

        // every paragraph appears, in order
        let mut cursor = 0usize;
        for p in &input {
            let pos = chunks[cursor..]
                .iter()
                .position(|ch| ch.split(CHUNK_SEPARATOR).any(|line| line == p))
                .expect("paragraph present");
            cursor += pos;
        }
    }
}
