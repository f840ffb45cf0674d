//! LLM-facing rendering: indexed, checkbox-annotated views of the parsed
//! model that an agent can read and edit back into a staging plan.

use regex::Regex;
use std::sync::OnceLock;

use crate::git::{diff_hash, Hunk, LineKind, ParsedDiff};
use crate::hunk::{generate_patch, is_splittable, split_count};

// ── Content tag probes ──
//
// Heuristic and advisory only; never feeds parsing, editing, or patch
// generation.

fn logging_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?m)(\blog(ger|ging)?\b|console\.|print(ln)?!?\(|\b(trace|debug|info|warn|error)!)")
            .unwrap()
    })
}

fn imports_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?m)^\s*(use\s|import\s|from\s+\S+\s+import\s|require\(|#include)").unwrap()
    })
}

fn function_def_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"(?m)\b(fn|def|func|function)\s+\w+").unwrap())
}

fn error_handling_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?m)(\b(try|catch|except|raise|throw)\b|\bResult\b|unwrap\(|panic!)").unwrap()
    })
}

fn async_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"(?m)\b(async|await)\b").unwrap())
}

fn conditional_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"(?m)\b(if|else|match|switch|case)\b").unwrap())
}

/// Advisory category tags detected over the hunk's aggregated change content
pub fn change_tags(hunk: &Hunk) -> Vec<&'static str> {
    let changed: String = hunk
        .lines
        .iter()
        .filter(|l| l.kind != LineKind::Context)
        .map(|l| l.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let probes: [(&'static str, &'static Regex); 6] = [
        ("logging", logging_regex()),
        ("imports", imports_regex()),
        ("function definition", function_def_regex()),
        ("error handling", error_handling_regex()),
        ("async", async_regex()),
        ("conditional", conditional_regex()),
    ];

    probes
        .into_iter()
        .filter(|(_, re)| re.is_match(&changed))
        .map(|(tag, _)| tag)
        .collect()
}

// ── Complexity ──

/// Rough effort estimate for deciding how carefully a hunk needs review:
/// 1 for a single-change hunk, 4 when several additions or removals pile
/// up, capped at 3 when the hunk can be split into smaller pieces instead.
pub fn complexity_hint(hunk: &Hunk, min_context_gap: usize) -> u8 {
    let mut score = 1;
    if hunk.addition_count() > 1 || hunk.removal_count() > 1 {
        score = 4;
    }
    if is_splittable(hunk, min_context_gap) {
        score = score.min(3);
    }
    score
}

/// Hunk ids bucketized by how they should be approached
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffAnalysis {
    pub simple_hunks: Vec<String>,
    pub splittable_hunks: Vec<String>,
    pub complex_hunks: Vec<String>,
}

pub fn analyze(diff: &ParsedDiff, min_context_gap: usize) -> DiffAnalysis {
    let mut analysis = DiffAnalysis::default();
    for hunk in diff.all_hunks() {
        if is_splittable(hunk, min_context_gap) {
            analysis.splittable_hunks.push(hunk.id.clone());
        } else if complexity_hint(hunk, min_context_gap) >= 4 {
            analysis.complex_hunks.push(hunk.id.clone());
        } else {
            analysis.simple_hunks.push(hunk.id.clone());
        }
    }
    analysis
}

// ── Rendering ──

fn summary(hunk: &Hunk) -> String {
    let adds = hunk.addition_count();
    let removes = hunk.removal_count();
    if adds == 0 && removes == 0 {
        "no changes".to_string()
    } else {
        format!("+{adds} lines, -{removes} lines")
    }
}

/// Compact markdown table of every hunk in the diff
pub fn hunk_table(diff: &ParsedDiff) -> String {
    let mut out = String::from("| ID | File | Lines | Summary |\n| --- | --- | --- | --- |\n");
    for hunk in diff.all_hunks() {
        let (start, count) = if hunk.new_count > 0 {
            (hunk.new_start, hunk.new_count)
        } else {
            (hunk.old_start, hunk.old_count)
        };
        let end = start + count.saturating_sub(1);
        out.push_str(&format!(
            "| {} | {} | lines {}-{} | {} |\n",
            hunk.id,
            hunk.file,
            start,
            end,
            summary(hunk)
        ));
    }
    out
}

/// One indexed line: `[<idx>] <old>:<new> <prefix> <content>` with 3-wide
/// line numbers; a side the line does not exist on renders as spaces
fn indexed_line(index: usize, old_no: Option<usize>, new_no: Option<usize>, hunk: &Hunk) -> String {
    let line = &hunk.lines[index];
    let old = old_no.map_or_else(|| "   ".to_string(), |n| format!("{n:>3}"));
    let new = new_no.map_or_else(|| "   ".to_string(), |n| format!("{n:>3}"));
    format!("[{index:02}] {old}:{new} {} {}", line.prefix(), line.content)
}

/// Detailed, fenced rendering of one hunk for agent consumption
pub fn format_hunk(hunk: &Hunk, min_context_gap: usize, tags: bool) -> String {
    let mut out = format!("### Hunk: {}\n", hunk.id);
    if let Some(ctx) = &hunk.context {
        out.push_str(&format!("Context: {ctx}\n"));
    }
    out.push_str(&format!("Summary: {}\n", summary(hunk)));
    if is_splittable(hunk, min_context_gap) {
        out.push_str(&format!(
            "Splittable: Can be split into {} sub-hunks\n",
            split_count(hunk, min_context_gap)
        ));
    }
    if tags {
        let detected = change_tags(hunk);
        if !detected.is_empty() {
            out.push_str(&format!("Tags: {}\n", detected.join(", ")));
        }
    }

    out.push_str("```\n");
    let mut old_no = hunk.old_start;
    let mut new_no = hunk.new_start;
    for (index, line) in hunk.lines.iter().enumerate() {
        match line.kind {
            LineKind::Context => {
                out.push_str(&indexed_line(index, Some(old_no), Some(new_no), hunk));
                old_no += 1;
                new_no += 1;
            }
            LineKind::Add => {
                out.push_str(&indexed_line(index, None, Some(new_no), hunk));
                new_no += 1;
            }
            LineKind::Remove => {
                out.push_str(&indexed_line(index, Some(old_no), None, hunk));
                old_no += 1;
            }
        }
        out.push('\n');
    }
    out.push_str("```\n");
    out
}

/// Table plus a detailed block per hunk
pub fn format_diff(diff: &ParsedDiff, min_context_gap: usize, tags: bool) -> String {
    let mut out = hunk_table(diff);
    for hunk in diff.all_hunks() {
        out.push('\n');
        out.push_str(&format_hunk(hunk, min_context_gap, tags));
    }
    out
}

/// Editable plan-document scaffold: every hunk pre-checked as "include
/// entire hunk", with per-line checkboxes ready to refine. Parsing the
/// scaffold back yields an all-inclusive plan.
pub fn plan_scaffold(diff: &ParsedDiff) -> String {
    let canonical = generate_patch(&diff.all_hunks().into_iter().cloned().collect::<Vec<_>>());
    let mut out = String::from("Commit message: untitled commit\n");
    out.push_str(&format!("Diff hash: {}\n", diff_hash(&canonical)));

    for hunk in diff.all_hunks() {
        out.push('\n');
        out.push_str(&format!("### {}\n", hunk.id));
        out.push_str("[x] Include entire hunk\n");
        out.push_str("```\n");
        for (index, line) in hunk.lines.iter().enumerate() {
            let slot = match line.kind {
                LineKind::Context => "   ",
                _ => "[ ]",
            };
            out.push_str(&format!(
                "{slot} [{index:02}] {} {}\n",
                line.prefix(),
                line.content
            ));
        }
        out.push_str("```\n");
    }
    out
}
