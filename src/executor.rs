//! Plan execution: materialize each selection into a patch fragment and
//! apply it to the staged index, reporting partial progress on failure.

use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, warn};

use crate::git::{LineKind, ParsedDiff, Vcs};
use crate::hunk::{edit_hunk, generate_patch, HunkEdit};
use crate::plan::{CompAnchor, Compensation, SelectionMode, StagingPlan};

/// Outcome of running a plan. On failure, everything staged before the
/// failing selection remains in the index and is listed in `staged_hunks`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub success: bool,
    pub staged_hunks: Vec<String>,
    pub error: Option<String>,
}

impl ExecutionResult {
    fn failed(staged_hunks: Vec<String>, error: String) -> Self {
        ExecutionResult { success: false, staged_hunks, error: Some(error) }
    }
}

/// Apply a staging plan's selections to the index, in order.
///
/// Each selection is shaped into a standalone patch, dry-run checked, then
/// applied. The first failure halts execution; later selections are not
/// attempted.
pub fn execute_plan(plan: &StagingPlan, diff: &ParsedDiff, vcs: &dyn Vcs) -> ExecutionResult {
    let mut staged: Vec<String> = Vec::new();

    for selection in &plan.selections {
        if selection.mode == SelectionMode::None {
            continue;
        }

        let Some(hunk) = diff.hunk(&selection.hunk_id) else {
            return ExecutionResult::failed(
                staged,
                format!("Hunk not found: {}", selection.hunk_id),
            );
        };

        let shaped = if selection.mode == SelectionMode::All && selection.line_edits.is_empty() {
            hunk.clone()
        } else {
            // Resolve content edits against original line positions before
            // any lines are dropped
            let mut base = hunk.clone();
            for edit in &selection.line_edits {
                if let Some(line) = base.lines.get_mut(edit.line_index) {
                    if line.kind == LineKind::Add {
                        line.content = edit.new_content.clone();
                    }
                }
            }

            let edit = if selection.mode == SelectionMode::All {
                HunkEdit::default()
            } else {
                let remove_additions: BTreeSet<usize> = base
                    .lines
                    .iter()
                    .enumerate()
                    .filter(|(i, l)| {
                        l.kind == LineKind::Add && !selection.include_additions.contains(i)
                    })
                    .map(|(i, _)| i)
                    .collect();
                let keep_removals: BTreeSet<usize> = base
                    .lines
                    .iter()
                    .enumerate()
                    .filter(|(i, l)| {
                        l.kind == LineKind::Remove && !selection.include_removals.contains(i)
                    })
                    .map(|(i, _)| i)
                    .collect();
                HunkEdit { remove_additions, keep_removals }
            };
            edit_hunk(&base, &edit)
        };

        let patch = generate_patch(&[shaped]);

        match vcs.check_patch(&patch) {
            Ok(check) if check.applies => {}
            Ok(check) => {
                let detail = check.error.unwrap_or_default();
                warn!(hunk = %selection.hunk_id, %detail, "patch rejected by dry-run check");
                return ExecutionResult::failed(
                    staged,
                    format!("Patch for {} won't apply: {}", selection.hunk_id, detail),
                );
            }
            Err(e) => {
                return ExecutionResult::failed(
                    staged,
                    format!("Patch for {} won't apply: {}", selection.hunk_id, e),
                );
            }
        }

        match vcs.apply_to_index(&patch) {
            Ok(outcome) if outcome.success => {}
            Ok(outcome) => {
                return ExecutionResult::failed(
                    staged,
                    format!(
                        "Failed to stage {}: {}",
                        selection.hunk_id,
                        outcome.error.unwrap_or_default()
                    ),
                );
            }
            Err(e) => {
                return ExecutionResult::failed(
                    staged,
                    format!("Failed to stage {}: {}", selection.hunk_id, e),
                );
            }
        }

        debug!(hunk = %selection.hunk_id, "staged");
        staged.push(selection.hunk_id.clone());
    }

    ExecutionResult { success: true, staged_hunks: staged, error: None }
}

// ── Compensations ──

/// Outcome of applying compensations. `modified_files` lists every file
/// already written when an error surfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompensationResult {
    pub success: bool,
    pub modified_files: Vec<String>,
    pub error: Option<String>,
}

/// Comment marker pair for a file, picked by extension
fn comment_markers(file: &str, reason: Option<&str>, removed_by: Option<&str>) -> (String, String) {
    let ext = file.rsplit('.').next().unwrap_or("");
    let label = match reason {
        Some(r) => format!("temporary insertion: {r}"),
        None => "temporary insertion".to_string(),
    };
    let trailer = match removed_by {
        Some(id) => format!("end temporary insertion (removed by {id})"),
        None => "end temporary insertion".to_string(),
    };
    match ext {
        "py" | "rb" | "sh" => (format!("# {label}"), format!("# {trailer}")),
        "html" | "htm" => (format!("<!-- {label} -->"), format!("<!-- {trailer} -->")),
        "css" => (format!("/* {label} */"), format!("/* {trailer} */")),
        _ => (format!("// {label}"), format!("// {trailer}")),
    }
}

fn insertion_index(lines: &[&str], anchor: &CompAnchor) -> Option<usize> {
    match anchor {
        CompAnchor::Line(n) => {
            if *n <= lines.len() {
                Some(*n)
            } else {
                None
            }
        }
        CompAnchor::After(pattern) => lines
            .iter()
            .position(|l| l.contains(pattern.as_str()))
            .map(|i| i + 1),
        CompAnchor::Before(pattern) => lines.iter().position(|l| l.contains(pattern.as_str())),
    }
}

fn describe_anchor(anchor: &CompAnchor) -> String {
    match anchor {
        CompAnchor::Line(n) => format!("line {n}"),
        CompAnchor::After(p) => format!("after \"{p}\""),
        CompAnchor::Before(p) => format!("before \"{p}\""),
    }
}

/// Splice each compensation into its file on disk, bracketed by comment
/// markers, then stage the whole file.
pub fn apply_compensations(
    compensations: &[Compensation],
    repo_root: &Path,
    vcs: &dyn Vcs,
) -> CompensationResult {
    let mut modified: Vec<String> = Vec::new();

    for comp in compensations {
        let path = repo_root.join(&comp.file);
        let original = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                return CompensationResult {
                    success: false,
                    modified_files: modified,
                    error: Some(format!("Cannot read {}: {}", comp.file, e)),
                };
            }
        };

        let had_trailing_newline = original.ends_with('\n');
        let lines: Vec<&str> = original.lines().collect();

        let Some(at) = insertion_index(&lines, &comp.anchor) else {
            warn!(file = %comp.file, "compensation anchor not found");
            return CompensationResult {
                success: false,
                modified_files: modified,
                error: Some(format!(
                    "Insertion point not found in {}: {}",
                    comp.file,
                    describe_anchor(&comp.anchor)
                )),
            };
        };

        let (start_marker, end_marker) =
            comment_markers(&comp.file, comp.reason.as_deref(), comp.removed_by.as_deref());

        let mut out: Vec<&str> = Vec::with_capacity(lines.len() + comp.content.lines().count() + 2);
        out.extend_from_slice(&lines[..at]);
        out.push(&start_marker);
        out.extend(comp.content.lines());
        out.push(&end_marker);
        out.extend_from_slice(&lines[at..]);

        let mut rewritten = out.join("\n");
        if had_trailing_newline || original.is_empty() {
            rewritten.push('\n');
        }

        if let Err(e) = std::fs::write(&path, rewritten) {
            return CompensationResult {
                success: false,
                modified_files: modified,
                error: Some(format!("Cannot write {}: {}", comp.file, e)),
            };
        }
        modified.push(comp.file.clone());

        if let Err(e) = vcs.stage_file(&comp.file) {
            return CompensationResult {
                success: false,
                modified_files: modified,
                error: Some(format!("Failed to stage compensation in {}: {}", comp.file, e)),
            };
        }
        debug!(file = %comp.file, "compensation applied and staged");
    }

    CompensationResult { success: true, modified_files: modified, error: None }
}
