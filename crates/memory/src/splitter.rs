//! Text splitting for ingestion.
//!
//! Packs whole paragraphs into chunks of at most `chunk_tokens` estimated
//! tokens. A paragraph that is too large on its own is cut on whitespace,
//! and a single word larger than a chunk is cut at a character boundary.

use chatrelay_core::token::{estimate_tokens, floor_char_boundary};

/// Splits documents into retrieval-sized chunks.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_tokens: usize,
}

impl TextSplitter {
    pub fn new(chunk_tokens: usize) -> Self {
        Self {
            chunk_tokens: chunk_tokens.max(1),
        }
    }

    /// Split `text` into trimmed, non-empty chunks in source order.
    pub fn split(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();

        for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
            if self.fits(paragraph) {
                let joined_len = if current.is_empty() {
                    paragraph.len()
                } else {
                    current.len() + 2 + paragraph.len()
                };
                if joined_len.div_ceil(4) > self.chunk_tokens {
                    chunks.push(std::mem::take(&mut current));
                }
                if !current.is_empty() {
                    current.push_str("\n\n");
                }
                current.push_str(paragraph);
            } else {
                if !current.is_empty() {
                    chunks.push(std::mem::take(&mut current));
                }
                chunks.extend(self.split_oversized(paragraph));
            }
        }

        if !current.is_empty() {
            chunks.push(current);
        }
        chunks
    }

    fn fits(&self, text: &str) -> bool {
        estimate_tokens(text) <= self.chunk_tokens
    }

    fn max_bytes(&self) -> usize {
        self.chunk_tokens * 4
    }

    fn split_oversized(&self, paragraph: &str) -> Vec<String> {
        let mut pieces = Vec::new();
        let mut current = String::new();

        for word in paragraph.split_whitespace() {
            let candidate_len = if current.is_empty() {
                word.len()
            } else {
                current.len() + 1 + word.len()
            };
            if candidate_len <= self.max_bytes() {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(word);
                continue;
            }

            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
            }
            if word.len() <= self.max_bytes() {
                current.push_str(word);
            } else {
                let mut rest = word;
                while !rest.is_empty() {
                    let cut = cut_point(rest, self.max_bytes());
                    let (head, tail) = rest.split_at(cut);
                    if tail.is_empty() {
                        current.push_str(head);
                    } else {
                        pieces.push(head.to_string());
                    }
                    rest = tail;
                }
            }
        }

        if !current.is_empty() {
            pieces.push(current);
        }
        pieces
    }
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self::new(400)
    }
}

/// Largest char boundary `<= index`, but at least one whole character.
fn cut_point(s: &str, index: usize) -> usize {
    match floor_char_boundary(s, index) {
        0 => s.chars().next().map(char::len_utf8).unwrap_or(s.len()),
        i => i,
    }
}
