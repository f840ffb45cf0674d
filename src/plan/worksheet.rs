//! Structured worksheet form of a staging plan.
//!
//! Identical semantics to the plan document, but as a serde document an
//! agent can produce directly instead of editing checkbox text.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::git::{LineKind, ParsedDiff};
use crate::plan::model::{HunkSelection, LineEdit, SelectionMode, StagingPlan};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncludeMode {
    All,
    None,
    Partial,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorksheetLine {
    /// Position in the hunk's line sequence
    pub index: usize,
    pub include: bool,
    #[serde(default)]
    pub edit: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorksheetHunk {
    /// Zero-based hunk index within the file
    pub index: usize,
    pub include: IncludeMode,
    #[serde(default)]
    pub lines: Vec<WorksheetLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorksheetFile {
    pub path: String,
    pub include: IncludeMode,
    #[serde(default)]
    pub hunks: Vec<WorksheetHunk>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worksheet {
    #[serde(default)]
    pub commit_message: Option<String>,
    pub files: Vec<WorksheetFile>,
}

impl Worksheet {
    /// Parse a worksheet from its JSON document form
    pub fn from_json(json: &str) -> anyhow::Result<Worksheet> {
        Ok(serde_json::from_str(json)?)
    }

    /// Lower the worksheet into the plan form the executor runs.
    ///
    /// Per-line includes are classified into addition/removal sets by looking
    /// up the referenced line's kind in `diff`; indices that do not resolve
    /// are dropped.
    pub fn into_plan(self, diff: &ParsedDiff) -> StagingPlan {
        let mut plan = StagingPlan::new(
            self.commit_message
                .unwrap_or_else(|| "untitled commit".to_string()),
        );

        for file in self.files {
            match file.include {
                IncludeMode::All => {
                    for hunk in diff.file_hunks(&file.path) {
                        plan.selections.push(HunkSelection::all(&hunk.id));
                    }
                }
                IncludeMode::None => {
                    for hunk in diff.file_hunks(&file.path) {
                        plan.selections.push(HunkSelection::none(&hunk.id));
                    }
                }
                IncludeMode::Partial => {
                    for wh in file.hunks {
                        let hunk_id = format!("{}:{}", file.path, wh.index);
                        plan.selections.push(match wh.include {
                            IncludeMode::All => HunkSelection::all(&hunk_id),
                            IncludeMode::None => HunkSelection::none(&hunk_id),
                            IncludeMode::Partial => {
                                lower_partial(diff, hunk_id, &wh.lines)
                            }
                        });
                    }
                }
            }
        }

        plan
    }
}

fn lower_partial(diff: &ParsedDiff, hunk_id: String, lines: &[WorksheetLine]) -> HunkSelection {
    let mut additions = BTreeSet::new();
    let mut removals = BTreeSet::new();
    let mut edits = Vec::new();

    if let Some(hunk) = diff.hunk(&hunk_id) {
        for wl in lines {
            if !wl.include {
                continue;
            }
            match hunk.lines.get(wl.index).map(|l| l.kind) {
                Some(LineKind::Add) => {
                    additions.insert(wl.index);
                    if let Some(edit) = &wl.edit {
                        edits.push(LineEdit {
                            line_index: wl.index,
                            new_content: edit.clone(),
                        });
                    }
                }
                Some(LineKind::Remove) => {
                    removals.insert(wl.index);
                }
                _ => {}
            }
        }
    }

    HunkSelection {
        hunk_id,
        mode: SelectionMode::Partial,
        include_additions: additions,
        include_removals: removals,
        line_edits: edits,
        note: None,
    }
}
