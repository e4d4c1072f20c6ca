//! Canonical section identities and their accepted synonyms

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

/// One of the six topics every complete capsule covers
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalSection {
    Objective,
    Status,
    Decisions,
    NextActions,
    Locations,
    OpenQuestions,
}

impl CanonicalSection {
    /// All canonical sections in document order
    pub const ALL: [CanonicalSection; 6] = [
        CanonicalSection::Objective,
        CanonicalSection::Status,
        CanonicalSection::Decisions,
        CanonicalSection::NextActions,
        CanonicalSection::Locations,
        CanonicalSection::OpenQuestions,
    ];

    /// Header text used when rendering this section
    pub fn title(&self) -> &'static str {
        match self {
            CanonicalSection::Objective => "Objective",
            CanonicalSection::Status => "Status",
            CanonicalSection::Decisions => "Decisions",
            CanonicalSection::NextActions => "Next Actions",
            CanonicalSection::Locations => "Locations",
            CanonicalSection::OpenQuestions => "Open Questions",
        }
    }

    /// Accepted names, already in normalized form
    pub fn synonyms(&self) -> &'static [&'static str] {
        match self {
            CanonicalSection::Objective => &[
                "objective",
                "objectives",
                "goal",
                "goals",
                "purpose",
                "mission",
                "aim",
                "intent",
            ],
            CanonicalSection::Status => &[
                "status",
                "current status",
                "status update",
                "state",
                "current state",
                "progress",
            ],
            CanonicalSection::Decisions => &[
                "decisions",
                "decision",
                "decisions made",
                "key decisions",
                "decision log",
                "choices made",
            ],
            CanonicalSection::NextActions => &[
                "next actions",
                "next action",
                "nextactions",
                "next steps",
                "next step",
                "nextsteps",
                "action items",
                "todo",
                "todos",
                "to do",
                "follow ups",
                "followups",
            ],
            CanonicalSection::Locations => &[
                "locations",
                "location",
                "files",
                "key files",
                "relevant files",
                "file locations",
                "paths",
                "pointers",
                "references",
            ],
            CanonicalSection::OpenQuestions => &[
                "open questions",
                "openquestions",
                "questions",
                "unknowns",
                "open issues",
                "unresolved",
                "unresolved questions",
            ],
        }
    }
}

impl std::fmt::Display for CanonicalSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.title())
    }
}

static SYNONYMS: OnceLock<HashMap<&'static str, CanonicalSection>> = OnceLock::new();

fn synonym_table() -> &'static HashMap<&'static str, CanonicalSection> {
    SYNONYMS.get_or_init(|| {
        CanonicalSection::ALL
            .iter()
            .flat_map(|section| section.synonyms().iter().map(move |s| (*s, *section)))
            .collect()
    })
}

/// Normalize a header phrase, colon label, or JSON key for synonym lookup:
/// lowercase, `_`/`-` as spaces, trailing colons dropped, whitespace collapsed.
pub fn normalize_section_name(name: &str) -> String {
    let lowered = name.to_lowercase().replace(['_', '-'], " ");
    lowered
        .trim()
        .trim_end_matches(':')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolve a name to its canonical section, if it is a known synonym
pub fn canonical_for(name: &str) -> Option<CanonicalSection> {
    synonym_table()
        .get(normalize_section_name(name).as_str())
        .copied()
}
