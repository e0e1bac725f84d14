//! Splitting long text into pieces that fit a fixed-size message.
//!
//! Pieces are cut right after a boundary character (whitespace or ASCII
//! punctuation, plus any caller-supplied extras), so words are never split.
//! Concatenating the pieces in order gives back the original text.

use crate::{Error, Result};

/// Default piece size used for chat messages.
pub const DEFAULT_MAX_LENGTH: usize = 2000;

fn is_default_boundary(c: char) -> bool {
    c.is_whitespace() || c == '\u{FEFF}' || c == '\u{A0}' || c.is_ascii_punctuation()
}

/// Lazily yields pieces of `text`, each at most `max_length` characters long.
///
/// Pieces are never empty, so empty text yields nothing rather than a single
/// empty piece. After the first error the iterator is exhausted.
pub struct Chunks<'a> {
    text: &'a str,
    max_length: usize,
    extra_boundaries: &'a str,
    // Byte offset of the next piece.
    start: usize,
    failed: bool,
}

impl<'a> Chunks<'a> {
    pub fn new(text: &'a str, max_length: usize, extra_boundaries: &'a str) -> Self {
        Self {
            text,
            max_length,
            extra_boundaries,
            start: 0,
            failed: false,
        }
    }

    fn is_boundary(&self, c: char) -> bool {
        is_default_boundary(c) || self.extra_boundaries.contains(c)
    }

    fn fail(&mut self, err: Error) -> Option<Result<&'a str>> {
        self.failed = true;
        Some(Err(err))
    }

    fn take(&mut self, len: usize) -> &'a str {
        let piece = &self.text[self.start..self.start + len];
        self.start += len;
        piece
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Result<&'a str>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.start >= self.text.len() {
            return None;
        }
        if self.max_length == 0 {
            return self.fail(Error::InvalidChunkLength);
        }

        let rest = &self.text[self.start..];

        // Window of max_length chars plus the char that follows it, if any.
        let window = rest.char_indices().take(self.max_length + 1);
        let mut last: Option<(usize, char)> = None;
        let mut last_boundary_end: Option<usize> = None;
        for (idx, (offset, c)) in window.enumerate() {
            if idx == self.max_length {
                // Rest does not fit. Cut after the candidate if either the
                // candidate or its successor is a boundary.
                let Some((last_offset, last_char)) = last else {
                    return self.fail(Error::InvalidChunkLength);
                };
                if self.is_boundary(last_char) || self.is_boundary(c) {
                    let end = last_offset + last_char.len_utf8();
                    return Some(Ok(self.take(end)));
                }
                return match last_boundary_end {
                    Some(end) => Some(Ok(self.take(end))),
                    None => {
                        let segment = rest[..offset].to_owned();
                        self.fail(Error::UnsplittableSegment { segment })
                    }
                };
            }
            if self.is_boundary(c) {
                last_boundary_end = Some(offset + c.len_utf8());
            }
            last = Some((offset, c));
        }

        // Everything left fits.
        Some(Ok(self.take(rest.len())))
    }
}

/// Eagerly splits `text`. See [`Chunks`].
pub fn split_long_text<'a>(
    text: &'a str,
    max_length: usize,
    extra_boundaries: &'a str,
) -> Result<Vec<&'a str>> {
    Chunks::new(text, max_length, extra_boundaries).collect()
}
