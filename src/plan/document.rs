//! Plan-document parsing: the round-trippable plain-text form of a
//! staging plan built from checkbox conventions.

use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

use crate::git::ParsedDiff;
use crate::plan::model::{
    CompAnchor, Compensation, HunkSelection, LineEdit, SelectionMode, StagingPlan,
};

const DEFAULT_COMMIT_MESSAGE: &str = "untitled commit";

fn entire_hunk_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"(?i)^\[x\] include entire hunk").unwrap())
}

fn line_checkbox_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"^\[([ xXeE])\]\s*\[\s*(\d+)\]\s*([+-])\s?(.*)$").unwrap()
    })
}

fn edit_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^EDIT \[\s*(\d+)\]:\s?(.*)$").unwrap())
}

fn compensate_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r#"^COMPENSATE\s+(\S+)\s+(?:AFTER LINE\s+(\d+)|AFTER\s+"([^"]*)"|BEFORE\s+"([^"]*)")\s*:\s*$"#)
            .unwrap()
    })
}

fn file_checkbox_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^\[([ xX~])\]\s+(\S.*)$").unwrap())
}

/// Per-hunk-section accumulator while walking the document
#[derive(Debug, Default)]
struct SectionState {
    hunk_id: String,
    entire: bool,
    additions: BTreeSet<usize>,
    removals: BTreeSet<usize>,
    edits: Vec<LineEdit>,
}

impl SectionState {
    fn into_selection(self) -> HunkSelection {
        let mode = if self.entire {
            SelectionMode::All
        } else if !self.additions.is_empty() || !self.removals.is_empty() || !self.edits.is_empty()
        {
            SelectionMode::Partial
        } else {
            SelectionMode::None
        };
        HunkSelection {
            hunk_id: self.hunk_id,
            mode,
            include_additions: self.additions,
            include_removals: self.removals,
            line_edits: self.edits,
            note: None,
        }
    }
}

/// In-progress COMPENSATE block
struct CompState {
    comp: Compensation,
    content_lines: Vec<String>,
    /// Content collection stops at the first metadata line
    content_open: bool,
}

impl CompState {
    fn finish(mut self) -> Compensation {
        self.comp.content = self.content_lines.join("\n");
        self.comp
    }
}

/// Parse a plan document back into a `StagingPlan`.
///
/// `diff` is consulted to expand file-level checkboxes into per-hunk
/// selections; hunk sections found later in the document override the
/// expanded entries in place.
pub fn parse_plan(doc: &str, diff: &ParsedDiff) -> StagingPlan {
    let mut commit_message: Option<String> = None;
    let mut doc_hash: Option<String> = None;
    let mut file_marks: Vec<(String, char)> = Vec::new();
    let mut sections: Vec<SectionState> = Vec::new();
    let mut current: Option<SectionState> = None;
    let mut comp: Option<CompState> = None;
    let mut compensations: Vec<Compensation> = Vec::new();
    let mut in_fence = false;

    for line in doc.lines() {
        if in_fence {
            if line.starts_with("```") {
                in_fence = false;
                continue;
            }
            if let Some(section) = current.as_mut() {
                if let Some(caps) = line_checkbox_regex().captures(line) {
                    let mark = caps[1].chars().next().unwrap_or(' ');
                    let index: usize = caps[2].parse().unwrap_or(0);
                    let prefix = &caps[3];
                    match (mark.to_ascii_lowercase(), prefix) {
                        ('x', "+") | ('e', "+") => {
                            section.additions.insert(index);
                        }
                        ('x', "-") | ('e', "-") => {
                            section.removals.insert(index);
                        }
                        _ => {}
                    }
                }
            }
            continue;
        }

        // An open COMPENSATE block swallows indented and blank lines first
        let mut close_comp = false;
        if let Some(state) = comp.as_mut() {
            if state.content_open && line.is_empty() {
                state.content_lines.push(String::new());
                continue;
            }
            if state.content_open {
                if let Some(content) = line.strip_prefix("  ") {
                    state.content_lines.push(content.to_string());
                    continue;
                }
            }
            if let Some(reason) = line.strip_prefix("REASON:") {
                state.comp.reason = Some(reason.trim().to_string());
                state.content_open = false;
                continue;
            }
            if let Some(removed_by) = line.strip_prefix("REMOVED_BY:") {
                state.comp.removed_by = Some(removed_by.trim().to_string());
                state.content_open = false;
                continue;
            }
            // Any other un-indented line ends the block; keep processing it
            close_comp = true;
        }
        if close_comp {
            if let Some(state) = comp.take() {
                compensations.push(state.finish());
            }
        }

        if line.starts_with("```") {
            in_fence = true;
            continue;
        }

        if let Some(heading) = line.strip_prefix("### ") {
            if let Some(section) = current.take() {
                sections.push(section);
            }
            current = Some(SectionState { hunk_id: heading.trim().to_string(), ..Default::default() });
            continue;
        }

        if let Some(caps) = compensate_regex().captures(line) {
            let file = caps[1].to_string();
            let anchor = if let Some(n) = caps.get(2) {
                CompAnchor::Line(n.as_str().parse().unwrap_or(0))
            } else if let Some(pattern) = caps.get(3) {
                CompAnchor::After(pattern.as_str().to_string())
            } else {
                CompAnchor::Before(caps.get(4).map(|m| m.as_str()).unwrap_or("").to_string())
            };
            comp = Some(CompState {
                comp: Compensation {
                    file,
                    anchor,
                    content: String::new(),
                    reason: None,
                    removed_by: None,
                },
                content_lines: Vec::new(),
                content_open: true,
            });
            continue;
        }

        if let Some(message) = line.strip_prefix("Commit message:") {
            if commit_message.is_none() {
                let message = message.trim();
                if !message.is_empty() {
                    commit_message = Some(message.to_string());
                }
            }
            continue;
        }

        if let Some(hash) = line.strip_prefix("Diff hash:") {
            if doc_hash.is_none() {
                let hash = hash.trim();
                if !hash.is_empty() {
                    doc_hash = Some(hash.to_string());
                }
            }
            continue;
        }

        if entire_hunk_regex().is_match(line) {
            if let Some(section) = current.as_mut() {
                section.entire = true;
            }
            continue;
        }

        if let Some(caps) = edit_regex().captures(line) {
            if let Some(section) = current.as_mut() {
                let index: usize = caps[1].parse().unwrap_or(0);
                section.additions.insert(index);
                section.edits.push(LineEdit {
                    line_index: index,
                    new_content: caps[2].to_string(),
                });
            }
            continue;
        }

        // File-level checkboxes live outside hunk sections; the entire-hunk
        // line was already consumed above so anything left that looks like a
        // checkbox names a path
        if current.is_none() {
            if let Some(caps) = file_checkbox_regex().captures(line) {
                let mark = caps[1].chars().next().unwrap_or(' ');
                file_marks.push((caps[2].trim().to_string(), mark));
            }
        }
    }

    if let Some(state) = comp.take() {
        compensations.push(state.finish());
    }
    if let Some(section) = current.take() {
        sections.push(section);
    }

    // File-level marks pre-populate; hunk sections override in place
    let mut order: Vec<String> = Vec::new();
    let mut by_id: HashMap<String, HunkSelection> = HashMap::new();
    for (path, mark) in &file_marks {
        for hunk in diff.file_hunks(path) {
            let selection = match mark.to_ascii_lowercase() {
                'x' => HunkSelection::all(&hunk.id),
                ' ' => HunkSelection::none(&hunk.id),
                _ => continue, // '~' defers to hunk-level parsing
            };
            if !by_id.contains_key(&hunk.id) {
                order.push(hunk.id.clone());
                by_id.insert(hunk.id.clone(), selection);
            }
        }
    }
    for section in sections {
        let selection = section.into_selection();
        if !by_id.contains_key(&selection.hunk_id) {
            order.push(selection.hunk_id.clone());
        }
        by_id.insert(selection.hunk_id.clone(), selection);
    }

    StagingPlan {
        commit_message: commit_message.unwrap_or_else(|| DEFAULT_COMMIT_MESSAGE.to_string()),
        selections: order
            .into_iter()
            .filter_map(|id| by_id.remove(&id))
            .collect(),
        compensations,
        diff_hash: doc_hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::parse_diff;

    fn sample_diff() -> ParsedDiff {
        parse_diff(
            "diff --git a/src/app.py b/src/app.py\n--- a/src/app.py\n+++ b/src/app.py\n@@ -1,2 +1,4 @@\n import os\n+import sys\n+import json\n def main():\n@@ -10,3 +12,3 @@\n     x = 1\n-    y = 2\n+    y = 3\n     return x\ndiff --git a/README.md b/README.md\n--- a/README.md\n+++ b/README.md\n@@ -1,1 +1,2 @@\n # Title\n+New line\n",
        )
    }

    #[test]
    fn parse_entire_hunk_checkbox() {
        let doc = "Commit message: add imports\n\n### src/app.py:0\n[x] Include entire hunk\n```\n[ ] [01] + import sys\n[ ] [02] + import json\n```\n";
        let plan = parse_plan(doc, &sample_diff());
        assert_eq!(plan.commit_message, "add imports");
        assert_eq!(plan.selections.len(), 1);
        assert_eq!(plan.selections[0].hunk_id, "src/app.py:0");
        assert_eq!(plan.selections[0].mode, SelectionMode::All);
    }

    #[test]
    fn parse_entire_hunk_is_case_insensitive() {
        let doc = "### src/app.py:0\n[X] include entire hunk\n";
        let plan = parse_plan(doc, &sample_diff());
        assert_eq!(plan.selections[0].mode, SelectionMode::All);
    }

    #[test]
    fn parse_partial_selection_by_checkboxes() {
        let doc = "Commit message: pick lines\n\n### src/app.py:0\n[ ] Include entire hunk\n```\n    [00]   import os\n[x] [01] + import sys\n[ ] [02] + import json\n    [03]   def main():\n```\n\n### src/app.py:1\n[ ] Include entire hunk\n```\n    [00]       x = 1\n[x] [01] -     y = 2\n[X] [02] +     y = 3\n    [03]       return x\n```\n";
        let plan = parse_plan(doc, &sample_diff());
        assert_eq!(plan.selections.len(), 2);

        let first = &plan.selections[0];
        assert_eq!(first.mode, SelectionMode::Partial);
        assert_eq!(first.include_additions, BTreeSet::from([1]));
        assert!(first.include_removals.is_empty());

        let second = &plan.selections[1];
        assert_eq!(second.mode, SelectionMode::Partial);
        assert_eq!(second.include_additions, BTreeSet::from([2]));
        assert_eq!(second.include_removals, BTreeSet::from([1]));
    }

    #[test]
    fn parse_unmarked_section_is_none() {
        let doc = "### src/app.py:0\n[ ] Include entire hunk\n```\n[ ] [01] + import sys\n[ ] [02] + import json\n```\n";
        let plan = parse_plan(doc, &sample_diff());
        assert_eq!(plan.selections[0].mode, SelectionMode::None);
    }

    #[test]
    fn parse_index_brackets_allow_leading_spaces() {
        let doc = "### src/app.py:0\n```\n[x] [ 1] + import sys\n```\n";
        let plan = parse_plan(doc, &sample_diff());
        assert_eq!(plan.selections[0].include_additions, BTreeSet::from([1]));
    }

    #[test]
    fn parse_edit_marker_and_directive() {
        let doc = "### src/app.py:0\n```\n[E] [02] + import json\n```\nEDIT [02]: import json as j\n";
        let plan = parse_plan(doc, &sample_diff());
        let selection = &plan.selections[0];
        assert_eq!(selection.mode, SelectionMode::Partial);
        assert_eq!(selection.include_additions, BTreeSet::from([2]));
        assert_eq!(
            selection.line_edits,
            vec![LineEdit { line_index: 2, new_content: "import json as j".to_string() }]
        );
    }

    #[test]
    fn parse_edits_collected_even_with_entire_hunk() {
        let doc = "### src/app.py:0\n[x] Include entire hunk\nEDIT [01]: import sys  # noqa\n";
        let plan = parse_plan(doc, &sample_diff());
        let selection = &plan.selections[0];
        assert_eq!(selection.mode, SelectionMode::All);
        assert_eq!(selection.line_edits.len(), 1);
    }

    #[test]
    fn parse_missing_commit_message_defaults() {
        let plan = parse_plan("### src/app.py:0\n[x] Include entire hunk\n", &sample_diff());
        assert_eq!(plan.commit_message, "untitled commit");
    }

    #[test]
    fn parse_diff_hash_line() {
        let doc = "Commit message: x\nDiff hash: abc123def\n### src/app.py:0\n[x] Include entire hunk\n";
        let plan = parse_plan(doc, &sample_diff());
        assert_eq!(plan.diff_hash.as_deref(), Some("abc123def"));
    }

    // ── file-level checkboxes ──

    #[test]
    fn file_level_include_all_expands_to_every_hunk() {
        let doc = "Commit message: everything in app\n[x] src/app.py\n[ ] README.md\n";
        let plan = parse_plan(doc, &sample_diff());
        assert_eq!(plan.selections.len(), 3);
        assert_eq!(plan.selections[0].hunk_id, "src/app.py:0");
        assert_eq!(plan.selections[0].mode, SelectionMode::All);
        assert_eq!(plan.selections[1].hunk_id, "src/app.py:1");
        assert_eq!(plan.selections[1].mode, SelectionMode::All);
        assert_eq!(plan.selections[2].hunk_id, "README.md:0");
        assert_eq!(plan.selections[2].mode, SelectionMode::None);
    }

    #[test]
    fn file_level_detail_mark_defers_to_sections() {
        let doc = "[~] src/app.py\n\n### src/app.py:0\n[x] Include entire hunk\n";
        let plan = parse_plan(doc, &sample_diff());
        assert_eq!(plan.selections.len(), 1);
        assert_eq!(plan.selections[0].mode, SelectionMode::All);
    }

    #[test]
    fn hunk_section_overrides_file_level_mark() {
        let doc = "[x] src/app.py\n\n### src/app.py:1\n[ ] Include entire hunk\n```\n[x] [01] -     y = 2\n```\n";
        let plan = parse_plan(doc, &sample_diff());
        assert_eq!(plan.selections.len(), 2);
        assert_eq!(plan.selections[0].mode, SelectionMode::All);
        let overridden = &plan.selections[1];
        assert_eq!(overridden.hunk_id, "src/app.py:1");
        assert_eq!(overridden.mode, SelectionMode::Partial);
        assert_eq!(overridden.include_removals, BTreeSet::from([1]));
    }

    // ── COMPENSATE blocks ──

    #[test]
    fn parse_compensation_after_pattern() {
        let doc = "COMPENSATE src/app.py AFTER \"import os\":\n  import placeholder\n  placeholder.init()\nREASON: keeps module importable\nREMOVED_BY: src/app.py:1\n";
        let plan = parse_plan(doc, &sample_diff());
        assert_eq!(plan.compensations.len(), 1);
        let comp = &plan.compensations[0];
        assert_eq!(comp.file, "src/app.py");
        assert_eq!(comp.anchor, CompAnchor::After("import os".to_string()));
        assert_eq!(comp.content, "import placeholder\nplaceholder.init()");
        assert_eq!(comp.reason.as_deref(), Some("keeps module importable"));
        assert_eq!(comp.removed_by.as_deref(), Some("src/app.py:1"));
    }

    #[test]
    fn parse_compensation_after_line_and_before_pattern() {
        let doc = "COMPENSATE lib.rs AFTER LINE 14:\n  // stub\n\nCOMPENSATE web/index.html BEFORE \"</body>\":\n  <div>placeholder</div>\n";
        let plan = parse_plan(doc, &sample_diff());
        assert_eq!(plan.compensations.len(), 2);
        assert_eq!(plan.compensations[0].anchor, CompAnchor::Line(14));
        assert_eq!(plan.compensations[0].content, "// stub\n");
        assert_eq!(
            plan.compensations[1].anchor,
            CompAnchor::Before("</body>".to_string())
        );
    }

    #[test]
    fn compensation_block_ends_at_next_section() {
        let doc = "COMPENSATE a.py AFTER \"x\":\n  pad\n### src/app.py:0\n[x] Include entire hunk\n";
        let plan = parse_plan(doc, &sample_diff());
        assert_eq!(plan.compensations.len(), 1);
        assert_eq!(plan.compensations[0].content, "pad");
        assert_eq!(plan.selections.len(), 1);
        assert_eq!(plan.selections[0].mode, SelectionMode::All);
    }

    #[test]
    fn unknown_lines_are_ignored() {
        let doc = "random prose\n### src/app.py:0\nsome note the agent left\n[x] Include entire hunk\ntrailing commentary\n";
        let plan = parse_plan(doc, &sample_diff());
        assert_eq!(plan.selections.len(), 1);
        assert_eq!(plan.selections[0].mode, SelectionMode::All);
    }
}
