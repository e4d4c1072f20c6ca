//! Fenced code block detection

use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

static FENCE_RE: OnceLock<Regex> = OnceLock::new();

fn fence_re() -> &'static Regex {
    FENCE_RE.get_or_init(|| {
        Regex::new(r"(?m)^ {0,3}(`{3,}|~{3,})").expect("fence pattern is valid")
    })
}

#[derive(Debug, Clone, Copy)]
struct FenceMarker {
    ch: char,
    len: usize,
    line_start: usize,
    line_end: usize,
}

fn line_end(text: &str, from: usize) -> usize {
    text[from..].find('\n').map_or(text.len(), |i| from + i)
}

fn markers(text: &str) -> Vec<FenceMarker> {
    fence_re()
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let run = caps.get(1)?.as_str();
            Some(FenceMarker {
                ch: run.chars().next()?,
                len: run.len(),
                line_start: whole.start(),
                line_end: line_end(text, whole.end()),
            })
        })
        .collect()
}

/// Byte ranges covered by closed fenced code blocks, opener line through
/// closer line.
///
/// An opener closes at the next fence of the same character that is at least
/// as long. Shorter or mismatched fences inside an open block are content. An
/// opener that never closes yields no range.
pub fn fenced_ranges(text: &str) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut open: Option<FenceMarker> = None;

    for marker in markers(text) {
        match open {
            None => open = Some(marker),
            Some(opener) => {
                if marker.ch == opener.ch && marker.len >= opener.len {
                    ranges.push(opener.line_start..marker.line_end);
                    open = None;
                }
            }
        }
    }

    ranges
}

/// Whether `offset` falls inside any of `ranges`
pub fn in_fence(ranges: &[Range<usize>], offset: usize) -> bool {
    ranges.iter().any(|r| r.contains(&offset))
}
