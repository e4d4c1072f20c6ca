//! Markdown section model for capsule text
//!
//! Sections are re-derived from the text on every call and never persisted.
//! Only ATX headers (`#` through `######` followed by whitespace) start a
//! section, and headers inside closed fenced code blocks are ignored.

pub mod fence;
pub mod synonyms;

use regex::Regex;
use std::sync::OnceLock;

pub use synonyms::{canonical_for, normalize_section_name, CanonicalSection};

static HEADER_RE: OnceLock<Regex> = OnceLock::new();

fn header_re() -> &'static Regex {
    HEADER_RE.get_or_init(|| {
        Regex::new(r"(?m)^(#{1,6})[ \t]+(\S.*?)[ \t\r]*$").expect("header pattern is valid")
    })
}

/// Trimmed, lowercased bodies that count as "nothing here yet"
const PLACEHOLDER_TOKENS: &[&str] = &["tbd", "n/a", "none", "pending", "-"];

/// A header and the content that follows it up to the next header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Header phrase with trailing whitespace trimmed
    pub header: String,
    /// Number of leading `#` characters
    pub level: u8,
    /// Canonical identity, `None` for custom sections
    pub canonical: Option<CanonicalSection>,
    /// Byte offset of the header line
    pub header_start: usize,
    /// Byte offset of the first content byte (after the header line)
    pub content_start: usize,
    /// Byte offset one past the last content byte
    pub content_end: usize,
    /// Content is empty or a placeholder token
    pub placeholder: bool,
}

impl Section {
    /// The section body as a slice of the text it was parsed from
    pub fn content<'a>(&self, text: &'a str) -> &'a str {
        &text[self.content_start..self.content_end]
    }

    pub fn is_canonical(&self) -> bool {
        self.canonical.is_some()
    }
}

/// Whether a section body carries no real information
pub fn is_placeholder(content: &str) -> bool {
    let trimmed = content.trim().to_lowercase();
    if trimmed.is_empty() {
        return true;
    }

    let inner = trimmed
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .map(str::trim)
        .unwrap_or(trimmed.as_str());

    PLACEHOLDER_TOKENS.contains(&inner)
}

struct HeaderMatch {
    start: usize,
    content_start: usize,
    level: u8,
    phrase: String,
}

fn header_matches(text: &str) -> Vec<HeaderMatch> {
    let fenced = fence::fenced_ranges(text);

    header_re()
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            if fence::in_fence(&fenced, whole.start()) {
                return None;
            }
            let content_start = text[whole.end()..]
                .find('\n')
                .map_or(text.len(), |i| whole.end() + i + 1);
            Some(HeaderMatch {
                start: whole.start(),
                content_start,
                level: caps.get(1)?.as_str().len() as u8,
                phrase: caps.get(2)?.as_str().to_string(),
            })
        })
        .collect()
}

/// Parse text into its ordered sections. Text without headers (for example a
/// JSON capsule) yields an empty list.
pub fn parse_sections(text: &str) -> Vec<Section> {
    let headers = header_matches(text);
    let mut sections = Vec::with_capacity(headers.len());

    for (i, header) in headers.iter().enumerate() {
        let content_end = headers.get(i + 1).map_or(text.len(), |next| next.start);
        let content_end = content_end.max(header.content_start);
        let content = &text[header.content_start..content_end];

        sections.push(Section {
            canonical: canonical_for(&header.phrase),
            header: header.phrase.clone(),
            level: header.level,
            header_start: header.start,
            content_start: header.content_start,
            content_end,
            placeholder: is_placeholder(content),
        });
    }

    sections
}

/// Find a section by name, resolving synonyms first and falling back to an
/// exact case-insensitive header match.
pub fn find_section<'a>(sections: &'a [Section], name: &str) -> Option<&'a Section> {
    if let Some(canonical) = canonical_for(name) {
        if let Some(section) = sections.iter().find(|s| s.canonical == Some(canonical)) {
            return Some(section);
        }
    }
    find_section_exact(sections, name)
}

/// Find a section whose header equals `name` case-insensitively, without
/// synonym resolution.
pub fn find_section_exact<'a>(sections: &'a [Section], name: &str) -> Option<&'a Section> {
    let wanted = name.trim().to_lowercase();
    sections
        .iter()
        .find(|s| s.header.to_lowercase() == wanted)
}

/// Insert `new_content` into `section` of `text`, returning the new text.
///
/// A placeholder body is replaced outright. Real content keeps its text, has
/// trailing whitespace trimmed, and gets `new_content` after exactly one blank
/// line. The section is separated from a following header by one blank line.
pub fn insert_content(text: &str, section: &Section, new_content: &str) -> String {
    let before = &text[..section.content_start];
    let after = &text[section.content_end..];
    let addition = new_content.trim_start_matches(['\n', '\r']).trim_end();

    let mut out = String::with_capacity(text.len() + addition.len() + 4);
    out.push_str(before);
    if !before.ends_with('\n') {
        out.push('\n');
    }

    if !section.placeholder {
        out.push_str(section.content(text).trim_end());
        out.push_str("\n\n");
    }
    out.push_str(addition);
    out.push('\n');

    if !after.is_empty() {
        out.push('\n');
        out.push_str(after);
    }

    out
}

/// Render an empty six-section capsule skeleton
pub fn template() -> String {
    CanonicalSection::ALL
        .iter()
        .map(|s| format!("## {}\nTBD\n", s.title()))
        .collect::<Vec<_>>()
        .join("\n")
}
