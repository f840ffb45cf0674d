use sha2::{Digest, Sha256};

/// Kind of a single line in a diff hunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Context,
    Add,
    Remove,
}

/// A single line in a diff hunk, without its one-character prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub kind: LineKind,
    pub content: String,
}

impl Line {
    pub fn context(content: impl Into<String>) -> Self {
        Line { kind: LineKind::Context, content: content.into() }
    }

    pub fn add(content: impl Into<String>) -> Self {
        Line { kind: LineKind::Add, content: content.into() }
    }

    pub fn remove(content: impl Into<String>) -> Self {
        Line { kind: LineKind::Remove, content: content.into() }
    }

    /// The one-character prefix this line carries in patch text
    pub fn prefix(&self) -> char {
        match self.kind {
            LineKind::Context => ' ',
            LineKind::Add => '+',
            LineKind::Remove => '-',
        }
    }
}

/// A contiguous block of changes from one file.
///
/// `old_count` always equals the number of non-Add lines and `new_count` the
/// number of non-Remove lines; any code that derives a new hunk must call
/// `recount` so the header stays consistent with the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    /// New path of the file this hunk belongs to
    pub file: String,
    /// Zero-based position within the file's hunk list
    pub index: usize,
    /// `"<file>:<index>"`, or `"<file>:<index>.<sub>"` for split products
    pub id: String,
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
    /// The `@@ … @@` header, kept consistent with the numeric fields
    pub header: String,
    /// Function-name fragment after the closing `@@`, if any
    pub context: Option<String>,
    pub lines: Vec<Line>,
}

impl Hunk {
    /// Build an `@@ -a,b +c,d @@ ctx` header string
    pub fn make_header(
        old_start: usize,
        old_count: usize,
        new_start: usize,
        new_count: usize,
        context: Option<&str>,
    ) -> String {
        match context {
            Some(ctx) if !ctx.is_empty() => format!(
                "@@ -{},{} +{},{} @@ {}",
                old_start, old_count, new_start, new_count, ctx
            ),
            _ => format!(
                "@@ -{},{} +{},{} @@",
                old_start, old_count, new_start, new_count
            ),
        }
    }

    /// Recompute `old_count`/`new_count` from `lines` and rewrite the header
    pub fn recount(&mut self) {
        self.old_count = self.lines.iter().filter(|l| l.kind != LineKind::Add).count();
        self.new_count = self
            .lines
            .iter()
            .filter(|l| l.kind != LineKind::Remove)
            .count();
        self.header = Hunk::make_header(
            self.old_start,
            self.old_count,
            self.new_start,
            self.new_count,
            self.context.as_deref(),
        );
    }

    pub fn addition_count(&self) -> usize {
        self.lines.iter().filter(|l| l.kind == LineKind::Add).count()
    }

    pub fn removal_count(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| l.kind == LineKind::Remove)
            .count()
    }

    /// Format this hunk as patch text (header plus prefixed lines)
    pub fn to_text(&self) -> String {
        let mut text = String::new();
        text.push_str(&self.header);
        text.push('\n');
        for line in &self.lines {
            text.push(line.prefix());
            text.push_str(&line.content);
            text.push('\n');
        }
        text
    }
}

/// A file with its diff hunks and metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub old_path: String,
    pub new_path: String,
    pub is_new: bool,
    pub is_deleted: bool,
    pub hunks: Vec<Hunk>,
}

impl FileDiff {
    pub fn is_renamed(&self) -> bool {
        self.old_path != self.new_path
    }
}

/// Structured model of a whole unified diff
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDiff {
    pub files: Vec<FileDiff>,
}

impl ParsedDiff {
    /// All hunks across all files, flattened in document order
    pub fn all_hunks(&self) -> Vec<&Hunk> {
        self.files.iter().flat_map(|f| f.hunks.iter()).collect()
    }

    /// Look up a hunk by its id
    pub fn hunk(&self, id: &str) -> Option<&Hunk> {
        self.files
            .iter()
            .flat_map(|f| f.hunks.iter())
            .find(|h| h.id == id)
    }

    /// All hunks of the file matching `path` against either the new or old path
    pub fn file_hunks(&self, path: &str) -> Vec<&Hunk> {
        self.files
            .iter()
            .filter(|f| f.new_path == path || f.old_path == path)
            .flat_map(|f| f.hunks.iter())
            .collect()
    }
}

/// SHA-256 hex digest of raw diff text, used to tie plan documents to the
/// diff state they were generated from
pub fn diff_hash(raw: &str) -> String {
    format!("{:x}", Sha256::digest(raw.as_bytes()))
}

// ── Parsing ──

/// Numeric fields and context fragment of a single `@@` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HunkHeader {
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
    pub context: Option<String>,
}

/// Parse a hunk header like `@@ -10,4 +10,15 @@ fn foo()`.
/// Returns None when the line does not match the header shape.
pub fn parse_hunk_header(line: &str) -> Option<HunkHeader> {
    let after = line.strip_prefix("@@ ")?;
    let end = after.find(" @@")?;
    let range_str = &after[..end];
    let context = {
        let ctx = after[end + 3..].trim();
        if ctx.is_empty() { None } else { Some(ctx.to_string()) }
    };

    let mut parts = range_str.split_whitespace();
    let old = parts.next()?.strip_prefix('-')?;
    let new = parts.next()?.strip_prefix('+')?;
    let (old_start, old_count) = parse_range(old)?;
    let (new_start, new_count) = parse_range(new)?;

    Some(HunkHeader { old_start, old_count, new_start, new_count, context })
}

/// Parse "start,count" or just "start" (count defaults to 1)
fn parse_range(s: &str) -> Option<(usize, usize)> {
    if let Some((start, count)) = s.split_once(',') {
        Some((start.parse().ok()?, count.parse().ok()?))
    } else {
        Some((s.parse().ok()?, 1))
    }
}

/// Check a hunk's line-count invariants against its numeric fields.
/// Returns one message per violation; an empty vector means the hunk is valid.
pub fn validate_hunk(hunk: &Hunk) -> Vec<String> {
    let mut problems = Vec::new();
    let old_lines = hunk
        .lines
        .iter()
        .filter(|l| l.kind != LineKind::Add)
        .count();
    let new_lines = hunk
        .lines
        .iter()
        .filter(|l| l.kind != LineKind::Remove)
        .count();
    if old_lines != hunk.old_count {
        problems.push(format!(
            "Old count mismatch: header says {}, body has {}",
            hunk.old_count, old_lines
        ));
    }
    if new_lines != hunk.new_count {
        problems.push(format!(
            "New count mismatch: header says {}, body has {}",
            hunk.new_count, new_lines
        ));
    }
    problems
}

/// Extract old and new paths from a `diff --git a/OLD b/NEW` line.
///
/// For non-rename diffs both paths are identical, so after stripping
/// "diff --git a/" the remainder is "PATH b/PATH" and PATH_len can be
/// recovered as (total - 3) / 2; both halves are validated to match.
/// For renames the paths differ and the split happens at the last " b/".
fn parse_file_header(line: &str) -> (String, String) {
    if let Some(rest) = line.strip_prefix("diff --git a/") {
        let half = rest.len().saturating_sub(3) / 2;
        if half > 0
            && rest.len() >= half + 3
            && rest.get(half..half + 3) == Some(" b/")
            && rest.get(..half) == rest.get(half + 3..)
        {
            let path = rest[..half].to_string();
            return (path.clone(), path);
        }
        if let Some(pos) = rest.rfind(" b/") {
            return (rest[..pos].to_string(), rest[pos + 3..].to_string());
        }
        return (rest.to_string(), rest.to_string());
    }
    let path = line.split(" b/").last().unwrap_or("").to_string();
    (path.clone(), path)
}

const METADATA_PREFIXES: &[&str] = &[
    "new file mode",
    "deleted file mode",
    "index ",
    "--- ",
    "+++ ",
    "old mode",
    "new mode",
    "similarity index",
    "rename from ",
    "rename to ",
    "Binary files ",
];

/// Parse unified-diff text into a structured model.
///
/// The parser is total: malformed input never fails. Unrecognized lines are
/// skipped and whatever structure is recoverable is returned. Lines before
/// the first file header are ignored.
pub fn parse_diff(raw: &str) -> ParsedDiff {
    let mut files: Vec<FileDiff> = Vec::new();
    let mut current_file: Option<FileDiff> = None;
    let mut current_hunk: Option<Hunk> = None;
    // Old/new lines still expected by the current hunk's header
    let mut old_left: usize = 0;
    let mut new_left: usize = 0;

    fn flush_hunk(hunk: Option<Hunk>, file: &mut Option<FileDiff>) {
        if let Some(h) = hunk {
            if let Some(f) = file.as_mut() {
                f.hunks.push(h);
            }
        }
    }

    for line in raw.lines() {
        if line.starts_with("diff --git ") {
            flush_hunk(current_hunk.take(), &mut current_file);
            if let Some(file) = current_file.take() {
                files.push(file);
            }

            let (old_path, new_path) = parse_file_header(line);
            current_file = Some(FileDiff {
                old_path,
                new_path,
                is_new: false,
                is_deleted: false,
                hunks: Vec::new(),
            });
            continue;
        }

        // Metadata lines appear between the file header and the first hunk
        if current_hunk.is_none() {
            if let Some(file) = current_file.as_mut() {
                if line.starts_with("new file") {
                    file.is_new = true;
                    continue;
                }
                if line.starts_with("deleted file") {
                    file.is_deleted = true;
                    continue;
                }
                if let Some(old) = line.strip_prefix("rename from ") {
                    file.old_path = old.to_string();
                    continue;
                }
                if let Some(new) = line.strip_prefix("rename to ") {
                    file.new_path = new.to_string();
                    continue;
                }
                if METADATA_PREFIXES.iter().any(|p| line.starts_with(p)) {
                    continue;
                }
            }
        }

        if line.starts_with("@@") {
            flush_hunk(current_hunk.take(), &mut current_file);

            if let Some(file) = current_file.as_ref() {
                if let Some(header) = parse_hunk_header(line) {
                    let index = file.hunks.len();
                    old_left = header.old_count;
                    new_left = header.new_count;
                    current_hunk = Some(Hunk {
                        file: file.new_path.clone(),
                        index,
                        id: format!("{}:{}", file.new_path, index),
                        old_start: header.old_start,
                        old_count: header.old_count,
                        new_start: header.new_start,
                        new_count: header.new_count,
                        header: Hunk::make_header(
                            header.old_start,
                            header.old_count,
                            header.new_start,
                            header.new_count,
                            header.context.as_deref(),
                        ),
                        context: header.context,
                        lines: Vec::new(),
                    });
                }
            }
            continue;
        }

        if let Some(hunk) = current_hunk.as_mut() {
            if let Some(content) = line.strip_prefix('+') {
                hunk.lines.push(Line::add(content));
                new_left = new_left.saturating_sub(1);
            } else if let Some(content) = line.strip_prefix('-') {
                hunk.lines.push(Line::remove(content));
                old_left = old_left.saturating_sub(1);
            } else if let Some(content) = line.strip_prefix(' ') {
                hunk.lines.push(Line::context(content));
                old_left = old_left.saturating_sub(1);
                new_left = new_left.saturating_sub(1);
            } else if line.is_empty() && (old_left > 0 || new_left > 0) {
                // A bare empty line inside an unfinished body is empty context;
                // once the header counts are satisfied it is no longer ours.
                hunk.lines.push(Line::context(""));
                old_left = old_left.saturating_sub(1);
                new_left = new_left.saturating_sub(1);
            }
            // Anything else, including "\ No newline at end of file", is skipped
        }
    }

    flush_hunk(current_hunk, &mut current_file);
    if let Some(file) = current_file {
        files.push(file);
    }

    ParsedDiff { files }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_insertion() {
        let raw = r#"diff --git a/file.txt b/file.txt
index abc123..def456 100644
--- a/file.txt
+++ b/file.txt
@@ -1,3 +1,4 @@
 line 1
+added line
 line 2
 line 3
"#;
        let diff = parse_diff(raw);
        assert_eq!(diff.files.len(), 1);
        let file = &diff.files[0];
        assert_eq!(file.new_path, "file.txt");
        assert!(!file.is_renamed());
        assert_eq!(file.hunks.len(), 1);

        let hunk = &file.hunks[0];
        assert_eq!(hunk.id, "file.txt:0");
        assert_eq!(
            hunk.lines,
            vec![
                Line::context("line 1"),
                Line::add("added line"),
                Line::context("line 2"),
                Line::context("line 3"),
            ]
        );
        assert_eq!(hunk.old_count, 3);
        assert_eq!(hunk.new_count, 4);
        assert!(validate_hunk(hunk).is_empty());
    }

    #[test]
    fn parse_new_file() {
        let raw = r#"diff --git a/new.rs b/new.rs
new file mode 100644
index 0000000..abc1234
--- /dev/null
+++ b/new.rs
@@ -0,0 +1,2 @@
+fn hello() {}
+fn world() {}
"#;
        let diff = parse_diff(raw);
        assert_eq!(diff.files.len(), 1);
        assert!(diff.files[0].is_new);
        assert!(!diff.files[0].is_deleted);
        assert_eq!(diff.files[0].hunks[0].addition_count(), 2);
    }

    #[test]
    fn parse_deleted_file() {
        let raw = r#"diff --git a/old.rs b/old.rs
deleted file mode 100644
index abc1234..0000000
--- a/old.rs
+++ /dev/null
@@ -1,3 +0,0 @@
-fn gone() {
-    0
-}
"#;
        let diff = parse_diff(raw);
        assert_eq!(diff.files.len(), 1);
        assert!(diff.files[0].is_deleted);
        assert_eq!(diff.files[0].hunks[0].removal_count(), 3);
    }

    #[test]
    fn parse_renamed_file_takes_paths_from_rename_lines() {
        let raw = r#"diff --git a/src/old_name.rs b/src/new_name.rs
similarity index 95%
rename from src/old_name.rs
rename to src/new_name.rs
index abc1234..def5678 100644
--- a/src/old_name.rs
+++ b/src/new_name.rs
@@ -1,3 +1,3 @@
 fn unchanged() {}
-fn old_fn() {}
+fn new_fn() {}
 fn also_unchanged() {}
"#;
        let diff = parse_diff(raw);
        let file = &diff.files[0];
        assert_eq!(file.old_path, "src/old_name.rs");
        assert_eq!(file.new_path, "src/new_name.rs");
        assert!(file.is_renamed());
    }

    #[test]
    fn parse_multiple_files_and_hunks() {
        let raw = r#"diff --git a/foo.rs b/foo.rs
index aaa..bbb 100644
--- a/foo.rs
+++ b/foo.rs
@@ -1,4 +1,5 @@
 fn alpha() {}
+fn alpha_new() {}
 fn beta() {}
 fn gamma() {}
 fn delta() {}
@@ -20,4 +21,3 @@
 fn omega() {}
-fn removed() {}
 fn psi() {}
 fn chi() {}
diff --git a/qux.rs b/qux.rs
index ccc..ddd 100644
--- a/qux.rs
+++ b/qux.rs
@@ -1,2 +1,1 @@
 fn qux() {}
-fn old() {}
"#;
        let diff = parse_diff(raw);
        assert_eq!(diff.files.len(), 2);
        assert_eq!(diff.files[0].hunks.len(), 2);
        assert_eq!(diff.files[0].hunks[0].id, "foo.rs:0");
        assert_eq!(diff.files[0].hunks[1].id, "foo.rs:1");
        assert_eq!(diff.files[0].hunks[1].index, 1);
        assert_eq!(diff.files[1].hunks[0].id, "qux.rs:0");

        // All ids from a single parse are distinct
        let ids: Vec<&str> = diff.all_hunks().iter().map(|h| h.id.as_str()).collect();
        let mut unique = ids.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn parse_hunk_context_fragment() {
        let raw = "diff --git a/a.rs b/a.rs\n--- a/a.rs\n+++ b/a.rs\n@@ -10,4 +10,5 @@ impl Foo\n context\n+added\n ctx2\n ctx3\n ctx4\n";
        let diff = parse_diff(raw);
        let hunk = &diff.files[0].hunks[0];
        assert_eq!(hunk.context.as_deref(), Some("impl Foo"));
        assert_eq!(hunk.header, "@@ -10,4 +10,5 @@ impl Foo");
    }

    #[test]
    fn parse_skips_no_newline_marker() {
        let raw = r#"diff --git a/a.rs b/a.rs
--- a/a.rs
+++ b/a.rs
@@ -1,2 +1,3 @@
 fn foo() {}
+fn bar() {}
 fn baz() {}
\ No newline at end of file
"#;
        let diff = parse_diff(raw);
        let hunk = &diff.files[0].hunks[0];
        assert_eq!(hunk.lines.len(), 3);
        assert!(hunk.lines.iter().all(|l| !l.content.contains("No newline")));
    }

    #[test]
    fn parse_ignores_junk_before_first_header() {
        let raw = "Some commit notes\nmore prose\ndiff --git a/a.txt b/a.txt\n--- a/a.txt\n+++ b/a.txt\n@@ -1,1 +1,2 @@\n keep\n+new\n";
        let diff = parse_diff(raw);
        assert_eq!(diff.files.len(), 1);
        assert_eq!(diff.files[0].hunks[0].lines.len(), 2);
    }

    #[test]
    fn parse_empty_line_is_context_only_while_body_is_open() {
        // The empty line sits inside the hunk (counts not yet satisfied)
        let raw = "diff --git a/a.txt b/a.txt\n--- a/a.txt\n+++ b/a.txt\n@@ -1,3 +1,4 @@\n one\n+two\n\n three\n";
        let diff = parse_diff(raw);
        let hunk = &diff.files[0].hunks[0];
        assert_eq!(hunk.lines.len(), 4);
        assert_eq!(hunk.lines[2], Line::context(""));
        assert!(validate_hunk(hunk).is_empty());

        // A trailing blank after a complete hunk does not extend it
        let raw = "diff --git a/a.txt b/a.txt\n--- a/a.txt\n+++ b/a.txt\n@@ -1,1 +1,2 @@\n one\n+two\n\n";
        let diff = parse_diff(raw);
        assert_eq!(diff.files[0].hunks[0].lines.len(), 2);
    }

    #[test]
    fn parse_mode_only_change_has_no_hunks() {
        let raw = "diff --git a/script.sh b/script.sh\nold mode 100644\nnew mode 100755\n";
        let diff = parse_diff(raw);
        assert_eq!(diff.files.len(), 1);
        assert!(diff.files[0].hunks.is_empty());
    }

    #[test]
    fn parse_path_with_space_containing_b() {
        let raw = "diff --git a/foo b/bar.rs b/foo b/bar.rs\nindex aaa..bbb 100644\n--- a/foo b/bar.rs\n+++ b/foo b/bar.rs\n@@ -1,1 +1,1 @@\n-old\n+new\n";
        let diff = parse_diff(raw);
        assert_eq!(diff.files[0].new_path, "foo b/bar.rs");
        assert_eq!(diff.files[0].old_path, "foo b/bar.rs");
    }

    #[test]
    fn parse_empty_input() {
        assert!(parse_diff("").files.is_empty());
    }

    // ── parse_hunk_header ──

    #[test]
    fn hunk_header_with_context() {
        let h = parse_hunk_header("@@ -10,4 +10,15 @@ impl Foo").unwrap();
        assert_eq!(h.old_start, 10);
        assert_eq!(h.old_count, 4);
        assert_eq!(h.new_start, 10);
        assert_eq!(h.new_count, 15);
        assert_eq!(h.context.as_deref(), Some("impl Foo"));
    }

    #[test]
    fn hunk_header_counts_default_to_one() {
        let h = parse_hunk_header("@@ -1 +1 @@").unwrap();
        assert_eq!(h.old_count, 1);
        assert_eq!(h.new_count, 1);
    }

    #[test]
    fn hunk_header_zero_old_range() {
        let h = parse_hunk_header("@@ -0,0 +1,2 @@").unwrap();
        assert_eq!(h.old_start, 0);
        assert_eq!(h.old_count, 0);
        assert_eq!(h.new_start, 1);
        assert_eq!(h.new_count, 2);
    }

    #[test]
    fn hunk_header_rejects_malformed() {
        assert!(parse_hunk_header("@@ -1,3 +1,4").is_none());
        assert!(parse_hunk_header("not a header").is_none());
        assert!(parse_hunk_header("@@ -x,3 +1,4 @@").is_none());
    }

    // ── validate_hunk ──

    #[test]
    fn validate_reports_both_mismatches() {
        let mut hunk = Hunk {
            file: "a.txt".into(),
            index: 0,
            id: "a.txt:0".into(),
            old_start: 1,
            old_count: 5,
            new_start: 1,
            new_count: 9,
            header: String::new(),
            context: None,
            lines: vec![Line::context("x"), Line::add("y")],
        };
        let problems = validate_hunk(&hunk);
        assert_eq!(problems.len(), 2);
        assert!(problems[0].starts_with("Old count mismatch"));
        assert!(problems[1].starts_with("New count mismatch"));

        hunk.recount();
        assert!(validate_hunk(&hunk).is_empty());
        assert_eq!(hunk.header, "@@ -1,1 +1,2 @@");
    }

    // ── lookup helpers ──

    #[test]
    fn lookup_by_id_and_path() {
        let raw = "diff --git a/a.rs b/a.rs\n--- a/a.rs\n+++ b/a.rs\n@@ -1,1 +1,2 @@\n ctx\n+add\ndiff --git a/b.rs b/b.rs\n--- a/b.rs\n+++ b/b.rs\n@@ -1,2 +1,1 @@\n ctx\n-gone\n";
        let diff = parse_diff(raw);
        assert_eq!(diff.all_hunks().len(), 2);
        assert!(diff.hunk("a.rs:0").is_some());
        assert!(diff.hunk("a.rs:1").is_none());
        assert!(diff.hunk("missing.rs:0").is_none());
        assert_eq!(diff.file_hunks("b.rs").len(), 1);
        assert!(diff.file_hunks("c.rs").is_empty());
    }

    #[test]
    fn file_hunks_matches_old_path_of_renames() {
        let raw = "diff --git a/old.rs b/new.rs\nrename from old.rs\nrename to new.rs\n--- a/old.rs\n+++ b/new.rs\n@@ -1,1 +1,2 @@\n ctx\n+add\n";
        let diff = parse_diff(raw);
        assert_eq!(diff.file_hunks("old.rs").len(), 1);
        assert_eq!(diff.file_hunks("new.rs").len(), 1);
    }

    // ── diff_hash ──

    #[test]
    fn diff_hash_is_stable_and_content_sensitive() {
        let a = diff_hash("diff --git a/x b/x\n");
        let b = diff_hash("diff --git a/x b/x\n");
        let c = diff_hash("diff --git a/y b/y\n");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}
