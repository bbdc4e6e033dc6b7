//! Text chunking with overlap.
//!
//! Documents arrive as already-extracted text with form-feed (`\u{0C}`)
//! page separators. Each page is split into overlapping windows that prefer
//! natural boundaries (paragraph > line > sentence > word) and together
//! cover every character of the page.

use crate::models::{Chunk, IndexingConfig};

/// Page separator emitted by common PDF text extractors.
const PAGE_SEPARATOR: char = '\u{0C}';

#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

impl TextChunker {
    pub fn new(config: &IndexingConfig) -> Self {
        let chunk_size = (config.chunk_size as usize).max(1);
        // Overlap must leave room for forward progress
        let overlap = (config.chunk_overlap as usize).min(chunk_size - 1);
        Self {
            chunk_size,
            overlap,
        }
    }

    /// Split a document into chunks. Pages with no content are skipped but
    /// still counted, so recorded page numbers match the source document.
    pub fn chunk(&self, full_text: &str, filename: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut chunk_index = 0u32;

        for (page_idx, page_text) in full_text.split(PAGE_SEPARATOR).enumerate() {
            if page_text.trim().is_empty() {
                continue;
            }

            for (text, start, end) in self.split_page(page_text) {
                chunks.push(Chunk {
                    text,
                    filename: filename.to_string(),
                    page: (page_idx + 1) as u32,
                    chunk_index,
                    start_offset: start as u64,
                    end_offset: end as u64,
                    embedding: Vec::new(),
                });
                chunk_index += 1;
            }
        }

        chunks
    }

    /// Number of non-empty pages in a document.
    pub fn page_count(full_text: &str) -> usize {
        full_text
            .split(PAGE_SEPARATOR)
            .filter(|p| !p.trim().is_empty())
            .count()
    }

    /// Split one page into overlapping windows with char-offset spans.
    /// Consecutive spans satisfy `next.start <= prev.end`, so their union
    /// covers the whole page.
    fn split_page(&self, page: &str) -> Vec<(String, usize, usize)> {
        let chars: Vec<char> = page.chars().collect();
        let total = chars.len();

        if total == 0 {
            return Vec::new();
        }
        if total <= self.chunk_size {
            return vec![(page.to_string(), 0, total)];
        }

        let mut spans = Vec::new();
        let mut start = 0usize;

        loop {
            let hard_end = (start + self.chunk_size).min(total);
            let end = if hard_end == total {
                total
            } else {
                self.find_break_point(&chars, start, hard_end)
            };

            spans.push((chars[start..end].iter().collect(), start, end));

            if end >= total {
                break;
            }
            // Step back by the overlap but always move forward
            start = end.saturating_sub(self.overlap).max(start + 1);
        }

        spans
    }

    /// Find a natural break point near the target end position, searching
    /// the last 20% of the window.
    fn find_break_point(&self, chars: &[char], start: usize, target_end: usize) -> usize {
        let search_start = target_end
            .saturating_sub(self.chunk_size / 5)
            .max(start + 1);
        let search_range = &chars[search_start..target_end];

        let mut paragraph = None;
        let mut newline = None;
        let mut sentence = None;
        let mut space = None;

        for (i, c) in search_range.iter().enumerate() {
            let pos = search_start + i;
            match c {
                '\n' => {
                    if i > 0 && search_range.get(i - 1) == Some(&'\n') {
                        paragraph = Some(pos + 1);
                    }
                    newline = Some(pos + 1);
                }
                '.' | '!' | '?' => {
                    if search_range.get(i + 1).is_some_and(|c| c.is_whitespace()) {
                        sentence = Some(pos + 1);
                    }
                }
                ' ' | '\t' => {
                    space = Some(pos + 1);
                }
                _ => {}
            }
        }

        paragraph
            .or(newline)
            .or(sentence)
            .or(space)
            .unwrap_or(target_end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(size: u32, overlap: u32) -> TextChunker {
        TextChunker::new(&IndexingConfig {
            chunk_size: size,
            chunk_overlap: overlap,
            ..Default::default()
        })
    }

    /// Every character position of every page must be covered by at least
    /// one chunk span.
    fn assert_full_coverage(chunker: &TextChunker, text: &str) {
        let chunks = chunker.chunk(text, "t.pdf");
        for (page_idx, page) in text.split('\u{0C}').enumerate() {
            if page.trim().is_empty() {
                continue;
            }
            let page_chunks: Vec<_> = chunks
                .iter()
                .filter(|c| c.page == (page_idx + 1) as u32)
                .collect();
            let mut covered = 0usize;
            for chunk in &page_chunks {
                assert!(
                    (chunk.start_offset as usize) <= covered,
                    "gap before offset {}",
                    chunk.start_offset
                );
                covered = covered.max(chunk.end_offset as usize);
            }
            assert_eq!(covered, page.chars().count());
        }
    }

    #[test]
    fn test_small_document_single_chunk() {
        let chunks = chunker(1000, 200).chunk("Hello, world!", "hello.pdf");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!(chunks[0].page, 1);
        assert_eq!(chunks[0].chunk_index, 0);
    }

    #[test]
    fn test_empty_document_yields_nothing() {
        assert!(chunker(1000, 200).chunk("", "e.pdf").is_empty());
        assert!(chunker(1000, 200).chunk("   \n \u{0C}  ", "e.pdf").is_empty());
    }

    #[test]
    fn test_no_chunk_is_empty() {
        let text = "word ".repeat(400);
        for chunk in chunker(100, 20).chunk(&text, "t.pdf") {
            assert!(!chunk.text.is_empty());
        }
    }

    #[test]
    fn test_full_coverage_plain_text() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(60);
        assert_full_coverage(&chunker(200, 40), &text);
    }

    #[test]
    fn test_full_coverage_without_break_points() {
        // No whitespace at all: hard cuts must still cover everything
        let text = "x".repeat(1234);
        assert_full_coverage(&chunker(100, 20), &text);
    }

    #[test]
    fn test_full_coverage_with_early_paragraph_breaks() {
        // Paragraph breaks near the start of the search window force early
        // cuts; the overlap stepping must not leave gaps behind them.
        let text = format!("{}\n\n{}", "a".repeat(85), "b ".repeat(300));
        assert_full_coverage(&chunker(100, 20), &text);
    }

    #[test]
    fn test_overlap_between_consecutive_chunks() {
        let text = "alpha beta gamma delta ".repeat(50);
        let chunks = chunker(100, 30).chunk(&text, "t.pdf");
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            assert!(pair[1].start_offset <= pair[0].end_offset);
        }
    }

    #[test]
    fn test_prefers_paragraph_break() {
        let para_one = "a".repeat(160);
        let text = format!("{}\n\n{}", para_one, "b".repeat(100));
        let chunks = chunker(200, 20).chunk(&text, "t.pdf");
        // First chunk should cut right after the blank line
        assert!(chunks[0].text.ends_with("\n\n"));
    }

    #[test]
    fn test_page_numbers_from_form_feeds() {
        let text = "page one text\u{0C}page two text\u{0C}page three text";
        let chunks = chunker(1000, 200).chunk(text, "t.pdf");
        let pages: Vec<u32> = chunks.iter().map(|c| c.page).collect();
        assert_eq!(pages, vec![1, 2, 3]);
    }

    #[test]
    fn test_blank_page_keeps_numbering() {
        let text = "page one\u{0C}   \u{0C}page three";
        let chunks = chunker(1000, 200).chunk(text, "t.pdf");
        let pages: Vec<u32> = chunks.iter().map(|c| c.page).collect();
        assert_eq!(pages, vec![1, 3]);
    }

    #[test]
    fn test_chunk_indexes_are_global_and_sequential() {
        let text = format!("{}\u{0C}{}", "a ".repeat(200), "b ".repeat(200));
        let chunks = chunker(100, 20).chunk(&text, "t.pdf");
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i as u32);
        }
    }
}
