//! Content signatures for the built-in classifiers.

use memchr::memmem;

use crate::models::SolidModelFileType;

/// Opening marker of a STEP Part 21 exchange file.
pub const STEP_OPEN_MARKER: &[u8] = b"ISO-10303-21";

/// Closing marker of a STEP Part 21 exchange file.
pub const STEP_CLOSE_MARKER: &[u8] = b"END-ISO-10303-21";

/// Bounded views over the start and end of a payload.
#[derive(Debug, Clone, Copy)]
pub struct Sniff<'a> {
    /// Leading slice, at most one window long.
    pub head: &'a [u8],
    /// Trailing slice, at most one window long. May overlap `head`.
    pub tail: &'a [u8],
}

impl<'a> Sniff<'a> {
    /// Slice `bytes` into head and tail windows of `window` bytes.
    pub fn new(bytes: &'a [u8], window: usize) -> Self {
        let head = &bytes[..bytes.len().min(window)];
        let tail = &bytes[bytes.len().saturating_sub(window)..];
        Self { head, tail }
    }

    fn head_or_tail_contains(&self, needle: &[u8]) -> bool {
        memmem::find(self.head, needle).is_some() || memmem::find(self.tail, needle).is_some()
    }
}

/// Offset of the first STEP opening marker that is not part of the closing one.
pub fn find_open_marker(haystack: &[u8]) -> Option<usize> {
    memmem::find_iter(haystack, STEP_OPEN_MARKER).find(|&at| {
        let prefix = b"END-";
        at < prefix.len() || &haystack[at - prefix.len()..at] != prefix
    })
}

/// STEP: opening marker, then `HEADER`, and a closing marker in either window.
pub fn classify_step(sniff: &Sniff<'_>) -> Option<SolidModelFileType> {
    let open = find_open_marker(sniff.head)?;
    let after_open = &sniff.head[open + STEP_OPEN_MARKER.len()..];
    memmem::find(after_open, b"HEADER")?;
    sniff
        .head_or_tail_contains(STEP_CLOSE_MARKER)
        .then_some(SolidModelFileType::Step)
}

/// ASCII STL: leading `solid` token and an `endsolid` token, case-insensitive.
pub fn classify_ascii_stl(sniff: &Sniff<'_>) -> Option<SolidModelFileType> {
    let head = sniff.head.to_ascii_lowercase();
    let body = head.trim_ascii_start();
    if !body.starts_with(b"solid") || !is_token_end(body, b"solid".len()) {
        return None;
    }

    let tail = sniff.tail.to_ascii_lowercase();
    (contains_token(&head, b"endsolid") || contains_token(&tail, b"endsolid"))
        .then_some(SolidModelFileType::Stl)
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn is_token_end(haystack: &[u8], end: usize) -> bool {
    haystack.get(end).is_none_or(|&b| !is_word_byte(b))
}

fn contains_token(haystack: &[u8], token: &[u8]) -> bool {
    memmem::find_iter(haystack, token).any(|at| {
        let starts_clean = at == 0 || !is_word_byte(haystack[at - 1]);
        starts_clean && is_token_end(haystack, at + token.len())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sniff(bytes: &[u8]) -> Sniff<'_> {
        Sniff::new(bytes, 4096)
    }

    #[test]
    fn test_closing_marker_alone_is_not_an_opening() {
        assert_eq!(find_open_marker(b"END-ISO-10303-21;"), None);
        assert_eq!(find_open_marker(b"xx ISO-10303-21;"), Some(3));
    }

    #[test]
    fn test_step_requires_header_after_marker() {
        assert!(classify_step(&sniff(b"HEADER; ISO-10303-21; END-ISO-10303-21;")).is_none());
        assert!(classify_step(&sniff(b"ISO-10303-21; HEADER; END-ISO-10303-21;")).is_some());
    }

    #[test]
    fn test_step_requires_closing_marker() {
        assert!(classify_step(&sniff(b"ISO-10303-21; HEADER; DATA;")).is_none());
    }

    #[test]
    fn test_stl_requires_whole_tokens() {
        assert!(classify_ascii_stl(&sniff(b"solidworks export\nendsolid")).is_none());
        assert!(classify_ascii_stl(&sniff(b"solid a\nendsolidx")).is_none());
        assert!(classify_ascii_stl(&sniff(b"  SOLID part\nENDSOLID part")).is_some());
    }

    #[test]
    fn test_binary_stl_header_is_not_ascii_stl() {
        let mut bytes = b"solid binary header".to_vec();
        bytes.extend_from_slice(&[0u8; 64]);
        assert!(classify_ascii_stl(&sniff(&bytes)).is_none());
    }

    #[test]
    fn test_windows_on_short_payload_overlap() {
        let s = Sniff::new(b"abc", 4096);
        assert_eq!(s.head, b"abc");
        assert_eq!(s.tail, b"abc");
    }
}
