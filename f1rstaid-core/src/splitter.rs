//! Recursive character splitting into overlapping windows.
//!
//! Text is cut on the highest-priority separator it contains; pieces that are
//! still too long are split again with the remaining separators, and short
//! neighbouring pieces are merged back up to the chunk size while carrying
//! the tail of the previous window forward as overlap. Separators stay
//! attached to the start of the following piece, so every chunk is a
//! contiguous, whitespace-trimmed slice of the input. Lengths are counted in
//! characters.

use crate::document::Document;
use std::collections::VecDeque;
use std::ops::Range;

pub const CHUNK_SIZE: usize = 500;
pub const CHUNK_OVERLAP: usize = 100;
pub const SEPARATORS: &[&str] = &["\n\n", ". ", "\n", " ", ""];

#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl Default for RecursiveSplitter {
    fn default() -> Self {
        Self::new(CHUNK_SIZE, CHUNK_OVERLAP)
    }
}

impl RecursiveSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap: chunk_overlap.min(chunk_size),
            separators: SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_separators(mut self, separators: &[&str]) -> Self {
        self.separators = separators.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn split_text<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut ranges = Vec::new();
        self.split_range(text, 0..text.len(), &self.separators, &mut ranges);
        ranges.into_iter().map(|range| &text[range]).collect()
    }

    pub fn split_document(&self, document: &Document) -> Vec<Document> {
        self.split_text(&document.content)
            .into_iter()
            .map(|chunk| document.derive(chunk))
            .collect()
    }

    fn split_range(&self, text: &str, range: Range<usize>, separators: &[String], out: &mut Vec<Range<usize>>) {
        let slice = &text[range.clone()];

        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut remaining: &[String] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = "";
                break;
            }
            if slice.contains(candidate.as_str()) {
                separator = candidate;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut short = Vec::new();
        for piece in split_keep_start(slice, separator) {
            let piece = (piece.start + range.start)..(piece.end + range.start);
            if char_len(&text[piece.clone()]) < self.chunk_size {
                short.push(piece);
                continue;
            }
            if !short.is_empty() {
                self.merge(text, &short, out);
                short.clear();
            }
            if remaining.is_empty() {
                push_trimmed(text, piece, out);
            } else {
                self.split_range(text, piece, remaining, out);
            }
        }
        if !short.is_empty() {
            self.merge(text, &short, out);
        }
    }

    /// Greedily pack adjacent pieces into windows of at most `chunk_size`,
    /// keeping up to `chunk_overlap` characters of the previous window.
    fn merge(&self, text: &str, pieces: &[Range<usize>], out: &mut Vec<Range<usize>>) {
        let mut window: VecDeque<(Range<usize>, usize)> = VecDeque::new();
        let mut total = 0;

        for piece in pieces {
            let len = char_len(&text[piece.clone()]);
            if total + len > self.chunk_size && !window.is_empty() {
                push_window(text, &window, out);
                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    match window.pop_front() {
                        Some((_, dropped)) => total -= dropped,
                        None => break,
                    }
                }
            }
            window.push_back((piece.clone(), len));
            total += len;
        }
        push_window(text, &window, out);
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Split `text` before every occurrence of `separator`; an empty separator
/// splits into single characters.
fn split_keep_start(text: &str, separator: &str) -> Vec<Range<usize>> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| i..i + c.len_utf8())
            .collect();
    }
    let mut pieces = Vec::new();
    let mut start = 0;
    for (i, _) in text.match_indices(separator) {
        if i > start {
            pieces.push(start..i);
        }
        start = i;
    }
    if start < text.len() {
        pieces.push(start..text.len());
    }
    pieces
}

fn push_window(text: &str, window: &VecDeque<(Range<usize>, usize)>, out: &mut Vec<Range<usize>>) {
    if let (Some((first, _)), Some((last, _))) = (window.front(), window.back()) {
        push_trimmed(text, first.start..last.end, out);
    }
}

fn push_trimmed(text: &str, range: Range<usize>, out: &mut Vec<Range<usize>>) {
    let slice = &text[range.clone()];
    let trimmed = slice.trim();
    if trimmed.is_empty() {
        return;
    }
    let start = range.start + (slice.len() - slice.trim_start().len());
    out.push(start..start + trimmed.len());
}
