//! Capsule validation: size budget and canonical-section presence
//!
//! A canonical section counts as present when any of three encodings names
//! it: a markdown header, a `Label:` line, or a top-level key of a flat JSON
//! object. All three resolve names through the same synonym table.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::OnceLock;

use crate::error::{CapsuleError, Result};
use crate::sections::{canonical_for, fence, parse_sections, CanonicalSection};
use crate::text::count_chars;

static COLON_RE: OnceLock<Regex> = OnceLock::new();

fn colon_re() -> &'static Regex {
    COLON_RE.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*(?:[-*+][ \t]+)?[*_]{0,2}([A-Za-z][A-Za-z _/-]{0,40}?)[*_]{0,2}[ \t]*:")
            .expect("colon label pattern is valid")
    })
}

/// Outcome of [`lint`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LintReport {
    pub valid: bool,
    /// Canonical sections not found in any encoding, in canonical order
    pub missing_canonical_sections: Vec<CanonicalSection>,
    pub too_large: bool,
    pub actual_chars: usize,
}

fn header_sections(text: &str) -> BTreeSet<CanonicalSection> {
    parse_sections(text)
        .into_iter()
        .filter_map(|s| s.canonical)
        .collect()
}

fn colon_sections(text: &str) -> BTreeSet<CanonicalSection> {
    let fenced = fence::fenced_ranges(text);
    colon_re()
        .captures_iter(text)
        .filter(|caps| caps.get(0).is_some_and(|m| !fence::in_fence(&fenced, m.start())))
        .filter_map(|caps| canonical_for(caps.get(1)?.as_str()))
        .collect()
}

fn json_sections(text: &str) -> BTreeSet<CanonicalSection> {
    if !text.trim_start().starts_with('{') {
        return BTreeSet::new();
    }
    match serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(text) {
        Ok(object) => object.keys().filter_map(|k| canonical_for(k)).collect(),
        Err(_) => BTreeSet::new(),
    }
}

/// Canonical sections present in `text` under any encoding
pub fn present_sections(text: &str) -> BTreeSet<CanonicalSection> {
    let mut present = header_sections(text);
    present.extend(colon_sections(text));
    present.extend(json_sections(text));
    present
}

/// Check `text` against the size budget and, unless `allow_thin`, the six
/// canonical sections. `max_chars <= 0` means unlimited.
pub fn lint(text: &str, max_chars: i64, allow_thin: bool) -> LintReport {
    let actual_chars = count_chars(text);
    let too_large = max_chars > 0 && actual_chars as u64 > max_chars as u64;

    let missing_canonical_sections = if allow_thin {
        Vec::new()
    } else {
        let present = present_sections(text);
        CanonicalSection::ALL
            .into_iter()
            .filter(|s| !present.contains(s))
            .collect()
    };

    LintReport {
        valid: !too_large && missing_canonical_sections.is_empty(),
        missing_canonical_sections,
        too_large,
        actual_chars,
    }
}

/// Run [`lint`] and turn a failing report into a validator rejection.
/// Size is reported before missing sections.
pub fn enforce(text: &str, max_chars: i64, allow_thin: bool) -> Result<LintReport> {
    let report = lint(text, max_chars, allow_thin);
    if report.too_large {
        return Err(CapsuleError::TooLarge {
            actual: report.actual_chars,
            limit: max_chars as usize,
        });
    }
    if !report.missing_canonical_sections.is_empty() {
        return Err(CapsuleError::TooThin {
            missing: report
                .missing_canonical_sections
                .iter()
                .map(|s| s.title().to_string())
                .collect(),
        });
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sections::template;

    const MARKDOWN: &str = "## Goal\nShip auth.\n\n## Status\nHalf done.\n\n## Decisions\nJWT.\n\n## Next Steps\nTests.\n\n## Files\nsrc/auth.rs\n\n## Questions\nNone so far?\n";

    #[test]
    fn test_markdown_capsule_is_valid() {
        let report = lint(MARKDOWN, 0, false);
        assert!(report.valid, "{:?}", report);
        assert!(report.missing_canonical_sections.is_empty());
        assert!(!report.too_large);
    }

    #[test]
    fn test_placeholder_sections_still_count_as_present() {
        assert!(lint(&template(), 0, false).valid);
    }

    #[test]
    fn test_colon_style_capsule() {
        let text = "Objective: ship auth\nStatus: in progress\n**Decisions:** JWT\n- Next steps: tests\nLocations: src/auth.rs\nOpen questions: none\n";
        let report = lint(text, 0, false);
        assert!(report.valid, "{:?}", report);
    }

    #[test]
    fn test_json_capsule() {
        let text = r#"{"objective": "ship", "STATUS": "wip", "decisions": [], "next_actions": [], "locations": ["a.rs"], "open_questions": []}"#;
        let report = lint(text, 0, false);
        assert!(report.valid, "{:?}", report);
    }

    #[test]
    fn test_mixed_encodings_combine() {
        let text = "## Objective\nship\n\nStatus: wip\nDecisions: none\n\n## Next Actions\n- a\n\nFiles: x\n\n## Open Questions\n?\n";
        assert!(lint(text, 0, false).valid);
    }

    #[test]
    fn test_nothing_recognizable_reports_all_missing() {
        for text in ["", "just some prose without structure", "{not json", "[1, 2, 3]"] {
            let report = lint(text, 0, false);
            assert!(!report.valid);
            assert_eq!(
                report.missing_canonical_sections,
                CanonicalSection::ALL.to_vec(),
                "text {:?}",
                text
            );
        }
    }

    #[test]
    fn test_nested_json_keys_do_not_count() {
        let text = r#"{"capsule": {"objective": "x"}}"#;
        let report = lint(text, 0, false);
        assert_eq!(report.missing_canonical_sections.len(), 6);
    }

    #[test]
    fn test_fenced_false_positives_ignored() {
        let text = "## Objective\nx\n```\n## Status\nDecisions: fake\n```\n";
        let report = lint(text, 0, false);
        assert!(report.missing_canonical_sections.contains(&CanonicalSection::Status));
        assert!(report.missing_canonical_sections.contains(&CanonicalSection::Decisions));
        assert!(!report.missing_canonical_sections.contains(&CanonicalSection::Objective));
    }

    #[test]
    fn test_allow_thin_skips_presence() {
        let report = lint("hello", 0, true);
        assert!(report.valid);
        assert!(report.missing_canonical_sections.is_empty());
    }

    #[test]
    fn test_size_limit_counts_chars() {
        let text = "é".repeat(10);
        assert!(!lint(&text, 10, true).too_large);

        let report = lint(&text, 9, true);
        assert!(report.too_large);
        assert!(!report.valid);
        assert_eq!(report.actual_chars, 10);
    }

    #[test]
    fn test_non_positive_limit_is_unlimited() {
        let text = "x".repeat(100_000);
        assert!(!lint(&text, 0, true).too_large);
        assert!(!lint(&text, -5, true).too_large);
    }

    #[test]
    fn test_enforce_reports_size_first() {
        let err = enforce("tiny", 2, false).unwrap_err();
        assert!(matches!(err, CapsuleError::TooLarge { actual: 4, limit: 2 }));

        let err = enforce("tiny", 0, false).unwrap_err();
        match err {
            CapsuleError::TooThin { missing } => assert_eq!(missing.len(), 6),
            other => panic!("unexpected error: {:?}", other),
        }

        assert!(enforce(MARKDOWN, 10_000, false).is_ok());
    }
}
