//! Hunk manipulation: splitting at context gaps, extracting subsets of
//! change lines, and regenerating valid patch text.
//!
//! Every function here returns freshly constructed hunks; the input is never
//! mutated. All line indices are positions into a hunk's `lines` sequence,
//! not per-type counters.

use std::collections::{BTreeSet, HashMap};

use crate::git::{Hunk, Line, LineKind, ParsedDiff};

// ── Splitting ──

/// Maximal runs of consecutive Context lines, as (start index, length)
fn context_runs(hunk: &Hunk) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut start: Option<usize> = None;
    for (i, line) in hunk.lines.iter().enumerate() {
        match (line.kind, start) {
            (LineKind::Context, None) => start = Some(i),
            (LineKind::Context, Some(_)) => {}
            (_, Some(s)) => {
                runs.push((s, i - s));
                start = None;
            }
            (_, None) => {}
        }
    }
    if let Some(s) = start {
        runs.push((s, hunk.lines.len() - s));
    }
    runs
}

/// Context runs that actually separate two edits: at least `min_context_gap`
/// long, with a change line somewhere before and somewhere after the run
fn separating_gaps(hunk: &Hunk, min_context_gap: usize) -> Vec<(usize, usize)> {
    let change_before = |idx: usize| hunk.lines[..idx].iter().any(|l| l.kind != LineKind::Context);
    let change_after = |idx: usize| hunk.lines[idx..].iter().any(|l| l.kind != LineKind::Context);

    context_runs(hunk)
        .into_iter()
        .filter(|&(start, len)| {
            len >= min_context_gap && change_before(start) && change_after(start + len)
        })
        .collect()
}

/// Whether `hunk` joins multiple logically independent edits bridged only by
/// a run of at least `min_context_gap` context lines
pub fn is_splittable(hunk: &Hunk, min_context_gap: usize) -> bool {
    let gap = min_context_gap.max(1);
    !separating_gaps(hunk, gap).is_empty()
}

/// Number of sub-hunks `split_hunk` would produce
pub fn split_count(hunk: &Hunk, min_context_gap: usize) -> usize {
    separating_gaps(hunk, min_context_gap.max(1)).len() + 1
}

/// Split a hunk at its context gaps into independently applicable sub-hunks.
///
/// Each sub-hunk keeps its leading context and the first `min_context_gap`
/// lines of the gap that terminates it; any surplus gap context becomes
/// leading context of the following sub-hunk. Sub-hunk ids are
/// `"<file>:<index>.<sub>"`. A non-splittable hunk is returned unchanged as
/// a single-element vector.
pub fn split_hunk(hunk: &Hunk, min_context_gap: usize) -> Vec<Hunk> {
    let gap = min_context_gap.max(1);
    let gaps = separating_gaps(hunk, gap);
    if gaps.is_empty() {
        return vec![hunk.clone()];
    }

    let mut subs: Vec<Hunk> = Vec::new();
    let mut old_pos = hunk.old_start;
    let mut new_pos = hunk.new_start;
    let mut seg_old_start = old_pos;
    let mut seg_new_start = new_pos;
    let mut seg_lines = Vec::new();
    let mut cursor = 0;

    fn advance(kind: LineKind, old_pos: &mut usize, new_pos: &mut usize) {
        match kind {
            LineKind::Context => {
                *old_pos += 1;
                *new_pos += 1;
            }
            LineKind::Remove => *old_pos += 1,
            LineKind::Add => *new_pos += 1,
        }
    }

    for (gap_start, _gap_len) in gaps {
        // Everything up to and including the first `gap` context lines of the
        // separating run belongs to the current sub-hunk.
        let seg_end = gap_start + gap;
        for line in &hunk.lines[cursor..seg_end] {
            seg_lines.push(line.clone());
            advance(line.kind, &mut old_pos, &mut new_pos);
        }
        subs.push(build_sub(hunk, subs.len(), seg_old_start, seg_new_start, seg_lines));
        seg_lines = Vec::new();
        seg_old_start = old_pos;
        seg_new_start = new_pos;
        cursor = seg_end;
    }

    for line in &hunk.lines[cursor..] {
        seg_lines.push(line.clone());
        advance(line.kind, &mut old_pos, &mut new_pos);
    }
    subs.push(build_sub(hunk, subs.len(), seg_old_start, seg_new_start, seg_lines));

    subs
}

fn build_sub(
    parent: &Hunk,
    sub_index: usize,
    old_start: usize,
    new_start: usize,
    lines: Vec<Line>,
) -> Hunk {
    let mut sub = Hunk {
        file: parent.file.clone(),
        index: parent.index,
        id: format!("{}:{}.{}", parent.file, parent.index, sub_index),
        old_start,
        old_count: 0,
        new_start,
        new_count: 0,
        header: String::new(),
        context: parent.context.clone(),
        lines,
    };
    sub.recount();
    sub
}

// ── Editing ──

/// Instructions for `edit_hunk`: additions to drop and removals to demote
#[derive(Debug, Clone, Default)]
pub struct HunkEdit {
    /// Line indices of Add lines to drop from the hunk
    pub remove_additions: BTreeSet<usize>,
    /// Line indices of Remove lines to rewrite as Context ("keep this line")
    pub keep_removals: BTreeSet<usize>,
}

/// Produce a new hunk with some additions dropped and some removals demoted
/// to context. Indices refer to positions in the original `lines` sequence.
/// Counts and header are recomputed; starts, id, and context are preserved.
pub fn edit_hunk(hunk: &Hunk, edit: &HunkEdit) -> Hunk {
    let mut out = Hunk {
        file: hunk.file.clone(),
        index: hunk.index,
        id: hunk.id.clone(),
        old_start: hunk.old_start,
        old_count: 0,
        new_start: hunk.new_start,
        new_count: 0,
        header: String::new(),
        context: hunk.context.clone(),
        lines: Vec::with_capacity(hunk.lines.len()),
    };

    for (i, line) in hunk.lines.iter().enumerate() {
        match line.kind {
            LineKind::Add if edit.remove_additions.contains(&i) => {}
            LineKind::Remove if edit.keep_removals.contains(&i) => {
                out.lines.push(Line::context(line.content.clone()));
            }
            _ => out.lines.push(line.clone()),
        }
    }

    out.recount();
    out
}

// ── Selection by id ──

/// Resolve hunk ids into concrete (possibly edited) hunks.
///
/// Two id shapes are accepted: `"<file>:<hunkIndex>"` selects the whole hunk
/// and `"<file>:<hunkIndex>:<lineIndex>"` selects a single Add line. Line
/// ids for the same hunk accumulate; every addition outside the accumulated
/// set is dropped. Unknown ids yield nothing.
pub fn select_hunks(diff: &ParsedDiff, ids: &[String]) -> Vec<Hunk> {
    struct Picked {
        whole: bool,
        add_lines: BTreeSet<usize>,
    }

    let mut order: Vec<String> = Vec::new();
    let mut picked: HashMap<String, Picked> = HashMap::new();

    for id in ids {
        if diff.hunk(id).is_some() {
            let entry = picked.entry(id.clone()).or_insert_with(|| {
                order.push(id.clone());
                Picked { whole: false, add_lines: BTreeSet::new() }
            });
            entry.whole = true;
            continue;
        }

        // "<file>:<hunkIndex>:<lineIndex>" — split the line index off the end
        if let Some((hunk_id, line_part)) = id.rsplit_once(':') {
            if let Ok(line_index) = line_part.parse::<usize>() {
                if let Some(hunk) = diff.hunk(hunk_id) {
                    if line_index < hunk.lines.len() {
                        let entry = picked.entry(hunk_id.to_string()).or_insert_with(|| {
                            order.push(hunk_id.to_string());
                            Picked { whole: false, add_lines: BTreeSet::new() }
                        });
                        entry.add_lines.insert(line_index);
                    }
                }
            }
        }
    }

    order
        .into_iter()
        .filter_map(|hunk_id| {
            let selection = picked.remove(&hunk_id)?;
            let hunk = diff.hunk(&hunk_id)?;
            if selection.whole {
                return Some(hunk.clone());
            }
            let drop: BTreeSet<usize> = hunk
                .lines
                .iter()
                .enumerate()
                .filter(|(i, l)| l.kind == LineKind::Add && !selection.add_lines.contains(i))
                .map(|(i, _)| i)
                .collect();
            Some(edit_hunk(hunk, &HunkEdit { remove_additions: drop, ..Default::default() }))
        })
        .collect()
}

// ── Patch regeneration ──

/// Emit patch text for a set of hunks, grouped per file with hunks ordered
/// by `old_start`. The output uses modification-style headers only and ends
/// with exactly one newline; an empty input yields an empty string.
pub fn generate_patch(hunks: &[Hunk]) -> String {
    if hunks.is_empty() {
        return String::new();
    }

    let mut file_order: Vec<&str> = Vec::new();
    let mut by_file: HashMap<&str, Vec<&Hunk>> = HashMap::new();
    for hunk in hunks {
        let slot = by_file.entry(hunk.file.as_str()).or_insert_with(|| {
            file_order.push(hunk.file.as_str());
            Vec::new()
        });
        slot.push(hunk);
    }

    let mut patch = String::new();
    for file in file_order {
        let mut file_hunks = by_file.remove(file).unwrap_or_default();
        file_hunks.sort_by_key(|h| h.old_start);

        patch.push_str(&format!("diff --git a/{file} b/{file}\n"));
        patch.push_str(&format!("--- a/{file}\n"));
        patch.push_str(&format!("+++ b/{file}\n"));
        for hunk in file_hunks {
            patch.push_str(&hunk.to_text());
        }
    }
    patch
}
