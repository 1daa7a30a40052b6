//! Recursive separator-aware text chunker with character overlap.
//!
//! A document is first cut into atomic pieces: any span longer than
//! `max_chunk_size` characters is split at the highest-priority separator it
//! contains (paragraph, then line, sentence, word), recursing into parts that
//! are still too long, and falling back to a raw character cut. Separators
//! stay attached to the end of the piece they terminate, so the pieces tile
//! the document exactly.
//!
//! Pieces are then packed greedily into chunks of at most `max_chunk_size`
//! characters. Every chunk after the first starts with the trailing
//! `overlap` characters of its predecessor; the carried overlap shrinks only
//! when the next piece would otherwise push the chunk over the size limit.
//!
//! Chunk texts are exact substrings of the document, never trimmed, so
//! concatenating them after removing the overlap reproduces the input.

use std::ops::Range;

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};
use crate::models::{Chunk, Document};

/// Validated chunking parameters.
#[derive(Debug, Clone)]
pub struct Chunker {
    max_chunk_size: usize,
    overlap: usize,
    separators: Vec<String>,
}

impl Chunker {
    /// Build a chunker, rejecting `overlap >= max_chunk_size`.
    pub fn new(config: &ChunkingConfig) -> Result<Self> {
        if config.max_chunk_size == 0 {
            return Err(Error::Config("max_chunk_size must be > 0".to_string()));
        }
        if config.overlap >= config.max_chunk_size {
            return Err(Error::Config(format!(
                "overlap ({}) must be smaller than max_chunk_size ({})",
                config.overlap, config.max_chunk_size
            )));
        }

        Ok(Self {
            max_chunk_size: config.max_chunk_size,
            overlap: config.overlap,
            separators: config
                .separators
                .iter()
                .filter(|s| !s.is_empty())
                .cloned()
                .collect(),
        })
    }

    /// Chunks of `document`, produced on demand.
    ///
    /// The returned iterator is finite and cloneable; cloning it (or calling
    /// this again) restarts the sequence from the same piece plan.
    pub fn chunks<'a>(&self, document: &'a Document) -> Chunks<'a> {
        let text = document.text.as_str();
        let mut spans = Vec::new();
        self.split(text, 0..text.len(), 0, &mut spans);

        let mut pieces = Vec::with_capacity(spans.len());
        let mut char_start = 0;
        for range in spans {
            let char_len = text[range.clone()].chars().count();
            pieces.push(Piece {
                range,
                char_start,
                char_len,
            });
            char_start += char_len;
        }

        Chunks {
            text,
            source_id: &document.source_id,
            pieces,
            max_chunk_size: self.max_chunk_size,
            overlap: self.overlap,
            next_piece: 0,
            prev: None,
        }
    }

    /// Convenience: collect all chunks of `document`.
    pub fn chunk_document(&self, document: &Document) -> Vec<Chunk> {
        self.chunks(document).collect()
    }

    fn split(&self, text: &str, span: Range<usize>, level: usize, out: &mut Vec<Range<usize>>) {
        let slice = &text[span.clone()];
        if slice.chars().count() <= self.max_chunk_size {
            if !slice.is_empty() {
                out.push(span);
            }
            return;
        }

        let found = self.separators[level.min(self.separators.len())..]
            .iter()
            .position(|sep| slice.contains(sep.as_str()));

        let Some(offset) = found else {
            hard_cut(text, span, self.max_chunk_size, out);
            return;
        };

        let idx = level + offset;
        let sep = self.separators[idx].as_str();
        let mut part_start = span.start;
        for (pos, _) in slice.match_indices(sep) {
            let part_end = span.start + pos + sep.len();
            self.split(text, part_start..part_end, idx + 1, out);
            part_start = part_end;
        }
        if part_start < span.end {
            self.split(text, part_start..span.end, idx + 1, out);
        }
    }
}

/// Cut `span` into windows of `max` characters.
fn hard_cut(text: &str, span: Range<usize>, max: usize, out: &mut Vec<Range<usize>>) {
    let mut window_start = span.start;
    let mut count = 0;
    for (i, _) in text[span.clone()].char_indices() {
        if count == max {
            out.push(window_start..span.start + i);
            window_start = span.start + i;
            count = 0;
        }
        count += 1;
    }
    if window_start < span.end {
        out.push(window_start..span.end);
    }
}

#[derive(Debug, Clone)]
struct Piece {
    range: Range<usize>,
    char_start: usize,
    char_len: usize,
}

/// Lazy sequence of [`Chunk`]s over one document.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    text: &'a str,
    source_id: &'a str,
    pieces: Vec<Piece>,
    max_chunk_size: usize,
    overlap: usize,
    next_piece: usize,
    prev: Option<Range<usize>>,
}

impl Iterator for Chunks<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        let first = self.pieces.get(self.next_piece)?;

        let mut start = first.range.start;
        let mut char_start = first.char_start;
        let mut len = first.char_len;
        if let Some(prev) = &self.prev {
            let budget = self.overlap.min(self.max_chunk_size - first.char_len);
            let mut taken = 0;
            for (i, _) in self.text[prev.clone()].char_indices().rev() {
                if taken == budget {
                    break;
                }
                start = prev.start + i;
                taken += 1;
            }
            char_start -= taken;
            len += taken;
        }

        let mut end = first.range.end;
        self.next_piece += 1;
        while let Some(piece) = self.pieces.get(self.next_piece) {
            if len + piece.char_len > self.max_chunk_size {
                break;
            }
            end = piece.range.end;
            len += piece.char_len;
            self.next_piece += 1;
        }

        self.prev = Some(start..end);
        Some(Chunk {
            text: self.text[start..end].to_string(),
            source_id: self.source_id.to_string(),
            start_offset: char_start,
        })
    }
}
