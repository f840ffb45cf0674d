use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How much of a hunk a selection takes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    All,
    None,
    Partial,
}

/// A replacement for the content of one addition line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineEdit {
    /// Position in the hunk's line sequence
    pub line_index: usize,
    pub new_content: String,
}

/// What to stage from a single hunk.
///
/// In Partial mode the index sets name positions in the hunk's `lines`
/// sequence; every index must be valid for that hunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HunkSelection {
    pub hunk_id: String,
    pub mode: SelectionMode,
    #[serde(default)]
    pub include_additions: BTreeSet<usize>,
    #[serde(default)]
    pub include_removals: BTreeSet<usize>,
    #[serde(default)]
    pub line_edits: Vec<LineEdit>,
    #[serde(default)]
    pub note: Option<String>,
}

impl HunkSelection {
    pub fn all(hunk_id: impl Into<String>) -> Self {
        HunkSelection {
            hunk_id: hunk_id.into(),
            mode: SelectionMode::All,
            include_additions: BTreeSet::new(),
            include_removals: BTreeSet::new(),
            line_edits: Vec::new(),
            note: None,
        }
    }

    pub fn none(hunk_id: impl Into<String>) -> Self {
        HunkSelection { mode: SelectionMode::None, ..HunkSelection::all(hunk_id) }
    }
}

/// Where a compensation is spliced into its file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompAnchor {
    /// Insert after this 1-based line number
    Line(usize),
    /// Insert after the first line containing this pattern
    After(String),
    /// Insert before the first line containing this pattern
    Before(String),
}

/// A temporary insertion that keeps a partial commit compilable or runnable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compensation {
    pub file: String,
    pub anchor: CompAnchor,
    pub content: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub removed_by: Option<String>,
}

/// A complete staging plan: one commit's worth of selections
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingPlan {
    pub commit_message: String,
    pub selections: Vec<HunkSelection>,
    #[serde(default)]
    pub compensations: Vec<Compensation>,
    /// Hash of the diff this plan was generated from, when the document
    /// carried one
    #[serde(default)]
    pub diff_hash: Option<String>,
}

impl StagingPlan {
    pub fn new(commit_message: impl Into<String>) -> Self {
        StagingPlan {
            commit_message: commit_message.into(),
            selections: Vec::new(),
            compensations: Vec::new(),
            diff_hash: None,
        }
    }
}
