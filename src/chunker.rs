//! Recursive overlapping text chunker.
//!
//! Splits document text into chunks of at most `chunk_size` characters,
//! recursively preferring the earliest separator in [`SEPARATORS`] that
//! is present in the text: paragraph break, line break, sentence boundary,
//! whitespace, and finally individual characters. Adjacent chunks overlap
//! by up to `chunk_overlap` characters to preserve cross-boundary context.
//!
//! Separators are kept at the end of each split piece, so every chunk is
//! a contiguous substring of the input and consecutive chunks overlap or
//! abut — no text is ever dropped.

use std::collections::VecDeque;

/// Separator priority, most-preferred first. The empty string is the
/// per-character fallback and always matches.
pub const SEPARATORS: &[&str] = &["\n\n", "\n", ".", " ", ""];

/// Default chunk budget in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Default overlap between adjacent chunks in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Split `text` into overlapping chunks of at most `chunk_size` characters.
///
/// Whitespace-only chunks (a bare separator stranded between dense
/// pieces) are dropped; they carry no retrievable content. Empty or
/// whitespace-only input therefore produces an empty vector, and callers
/// skip documents that yield zero chunks rather than indexing a
/// degenerate chunk.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    split_recursive(text, chunk_size, chunk_overlap, SEPARATORS)
        .into_iter()
        .filter(|c| !c.trim().is_empty())
        .collect()
}

fn split_recursive(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
    separators: &[&str],
) -> Vec<String> {
    let (sep, rest) = choose_separator(text, separators);
    let pieces = split_keeping_separator(text, sep);

    let mut chunks = Vec::new();
    let mut run: Vec<String> = Vec::new();

    for piece in pieces {
        if char_len(&piece) <= chunk_size {
            run.push(piece);
            continue;
        }

        // Oversized piece: flush the pending run, then split the piece
        // with the next separator in the priority list.
        if !run.is_empty() {
            chunks.extend(merge_run(&run, chunk_size, chunk_overlap));
            run.clear();
        }
        if rest.is_empty() {
            chunks.push(piece);
        } else {
            chunks.extend(split_recursive(&piece, chunk_size, chunk_overlap, rest));
        }
    }

    if !run.is_empty() {
        chunks.extend(merge_run(&run, chunk_size, chunk_overlap));
    }

    chunks
}

/// Pick the earliest separator present in `text`. The trailing empty
/// string always matches, so this never fails for a non-empty list.
fn choose_separator<'a>(text: &str, separators: &'a [&'a str]) -> (&'a str, &'a [&'a str]) {
    for (i, sep) in separators.iter().enumerate() {
        if sep.is_empty() || text.contains(sep) {
            return (sep, &separators[i + 1..]);
        }
    }
    ("", &[])
}

/// Split on `sep`, keeping the separator attached to the end of each
/// piece. An empty separator splits into individual characters.
fn split_keeping_separator(text: &str, sep: &str) -> Vec<String> {
    if sep.is_empty() {
        return text.chars().map(String::from).collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    while let Some(pos) = text[start..].find(sep) {
        let end = start + pos + sep.len();
        pieces.push(text[start..end].to_string());
        start = end;
    }
    if start < text.len() {
        pieces.push(text[start..].to_string());
    }
    pieces
}

/// Merge a run of pieces (each within budget) into chunks, carrying a
/// sliding window of up to `chunk_overlap` trailing characters into the
/// next chunk.
fn merge_run(pieces: &[String], chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut window: VecDeque<&str> = VecDeque::new();
    let mut total = 0usize;

    for piece in pieces {
        let plen = char_len(piece);

        if total + plen > chunk_size && !window.is_empty() {
            chunks.push(window.iter().copied().collect::<String>());
            // Shrink the window to the overlap budget, and further if the
            // incoming piece still would not fit.
            while total > chunk_overlap || (total + plen > chunk_size && total > 0) {
                if let Some(front) = window.pop_front() {
                    total -= char_len(front);
                } else {
                    break;
                }
            }
        }

        window.push_back(piece);
        total += plen;
    }

    if !window.is_empty() {
        chunks.push(window.iter().copied().collect::<String>());
    }

    chunks
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Walk the chunks and verify they tile the input. Each chunk must
    /// match the text at a position that continues the covered region
    /// (repeated chunk text resolves to the latest position that still
    /// connects, never an earlier duplicate); any gap must be pure
    /// whitespace, since whitespace-only chunks are dropped. Coverage
    /// must reach the end of the text.
    fn assert_full_coverage(text: &str, chunks: &[String]) {
        assert!(!chunks.is_empty(), "no chunks for non-empty text");
        let mut covered_end = 0usize;
        for chunk in chunks {
            let limit = text.len().saturating_sub(chunk.len());
            let start = (0..=limit)
                .rev()
                .filter(|&s| text.is_char_boundary(s) && text[s..].starts_with(chunk.as_str()))
                .find(|&s| s <= covered_end || text[covered_end..s].trim().is_empty())
                .unwrap_or_else(|| panic!("chunk does not continue coverage: {:?}", chunk));
            covered_end = covered_end.max(start + chunk.len());
        }
        assert!(
            text[covered_end..].trim().is_empty(),
            "input not fully covered: stopped at byte {} of {}",
            covered_end,
            text.len()
        );
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(split_text("", 1000, 200).is_empty());
    }

    #[test]
    fn short_text_single_chunk() {
        let chunks = split_text("Hello, world!", 1000, 200);
        assert_eq!(chunks, vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn prefers_paragraph_boundaries() {
        let text = "First paragraph.\n\nSecond paragraph.\n\nThird paragraph.";
        let chunks = split_text(text, 25, 0);
        assert!(chunks.len() > 1);
        assert!(chunks[0].contains("First paragraph."));
        assert_full_coverage(text, &chunks);
    }

    #[test]
    fn respects_chunk_size() {
        let text = (0..40)
            .map(|i| format!("Sentence number {} here.", i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = split_text(&text, 80, 20);
        for c in &chunks {
            assert!(c.chars().count() <= 80, "chunk over budget: {:?}", c);
        }
        assert_full_coverage(&text, &chunks);
    }

    #[test]
    fn adjacent_chunks_overlap() {
        let text = (0..30)
            .map(|i| format!("word{}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = split_text(&text, 40, 15);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            // The next chunk must start with a suffix of the previous one
            // (the overlap) or directly continue it.
            let prev = &pair[0];
            let next = &pair[1];
            let overlaps = (1..=prev.len())
                .rev()
                .any(|n| prev.is_char_boundary(prev.len() - n) && next.starts_with(&prev[prev.len() - n..]));
            let abuts = text.contains(&format!("{}{}", prev, next));
            assert!(overlaps || abuts, "chunks neither overlap nor abut");
        }
        assert_full_coverage(&text, &chunks);
    }

    #[test]
    fn long_unbroken_text_falls_back_to_characters() {
        let text = "x".repeat(2500);
        let chunks = split_text(&text, 1000, 200);
        assert!(chunks.len() >= 3);
        for c in &chunks {
            assert!(c.chars().count() <= 1000);
        }
        assert_full_coverage(&text, &chunks);
    }

    #[test]
    fn coverage_on_mixed_structure() {
        let text = "Intro line.\nMore text follows here.\n\nA second paragraph with \
                    several sentences. Each one adds length. The final sentence \
                    runs a bit longer than the others to force a boundary.\n\nEnd.";
        let chunks = split_text(text, 60, 20);
        assert_full_coverage(text, &chunks);
    }

    #[test]
    fn coverage_with_multibyte_text() {
        let text = "Привет мир. ".repeat(30);
        let chunks = split_text(&text, 50, 10);
        for c in &chunks {
            assert!(c.chars().count() <= 50);
        }
        assert_full_coverage(&text, &chunks);
    }

    #[test]
    fn whitespace_only_chunks_are_dropped() {
        // Runs of blank lines strand bare separators between the dense
        // pieces at small budgets.
        let text = "Alpha paragraph.\n\n\n\n\n\nBeta paragraph.";
        let chunks = split_text(text, 18, 0);
        assert!(!chunks.is_empty());
        for c in &chunks {
            assert!(!c.trim().is_empty(), "whitespace-only chunk: {:?}", c);
        }
        assert_full_coverage(text, &chunks);
    }

    #[test]
    fn whitespace_only_input_yields_no_chunks() {
        assert!(split_text("\n\n  \n", 100, 10).is_empty());
    }

    #[test]
    fn deterministic() {
        let text = "Alpha.\n\nBeta gamma delta. Epsilon zeta.\n\nEta theta.";
        assert_eq!(split_text(text, 20, 5), split_text(text, 20, 5));
    }
}
