use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tracing::debug;

/// Outcome of a dry-run patch check against the staged index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchCheck {
    pub applies: bool,
    pub error: Option<String>,
}

/// Outcome of an apply/reverse operation on the staged index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub success: bool,
    pub error: Option<String>,
}

/// Outcome of creating a commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    pub success: bool,
    pub hash: Option<String>,
    pub error: Option<String>,
}

/// The version-control collaborator.
///
/// Tool rejections (a patch that does not apply, a commit that fails) are
/// reported as values; `Err` is reserved for not being able to talk to the
/// tool at all (spawn or pipe failures).
pub trait Vcs {
    fn unstaged_diff(&self) -> Result<String>;
    fn staged_diff(&self) -> Result<String>;
    fn diff_with_context(&self, context_lines: u32) -> Result<String>;
    fn check_patch(&self, patch: &str) -> Result<PatchCheck>;
    fn apply_to_index(&self, patch: &str) -> Result<ApplyOutcome>;
    /// Apply variant that tells the tool to recount header line numbers
    fn apply_with_recount(&self, patch: &str) -> Result<ApplyOutcome>;
    fn reverse_patch(&self, patch: &str) -> Result<ApplyOutcome>;
    fn reset_staging(&self) -> Result<()>;
    fn staged_files(&self) -> Result<Vec<String>>;
    fn commit(&self, message: &str) -> Result<CommitOutcome>;
    fn status(&self) -> Result<String>;
    fn stage_file(&self, path: &str) -> Result<()>;
}

/// `Vcs` implementation driving the `git` binary as a subprocess.
///
/// Patch text is always fed through stdin, never as an argument, so content
/// is immune to quoting hazards and arbitrarily large patches work.
pub struct GitCli {
    repo_root: PathBuf,
    include_untracked: bool,
}

impl GitCli {
    pub fn new(repo_root: impl AsRef<Path>) -> Self {
        GitCli { repo_root: repo_root.as_ref().to_path_buf(), include_untracked: true }
    }

    /// Whether `unstaged_diff` synthesizes new-file diffs for untracked files
    pub fn include_untracked(mut self, include: bool) -> Self {
        self.include_untracked = include;
        self
    }

    /// Build a client honoring the repo's `.stagecraft.toml`
    pub fn with_config(repo_root: impl AsRef<Path>, config: &crate::config::StageConfig) -> Self {
        GitCli::new(repo_root).include_untracked(config.unstaged.include_untracked)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        debug!(?args, "running git");
        Command::new("git")
            .args(args)
            .current_dir(&self.repo_root)
            .output()
            .with_context(|| format!("Failed to run git {}", args.join(" ")))
    }

    fn run_with_stdin(&self, args: &[&str], input: &str) -> Result<Output> {
        debug!(?args, bytes = input.len(), "running git with piped stdin");
        let mut child = Command::new("git")
            .args(args)
            .current_dir(&self.repo_root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn git {}", args.join(" ")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input.as_bytes())
                .context("Failed to write patch to git stdin")?;
        }

        child
            .wait_with_output()
            .context("Failed to wait for git")
    }

    fn apply_args<'a>(&self, extra: &[&'a str]) -> Vec<&'a str> {
        let mut args = vec!["apply", "--cached"];
        args.extend_from_slice(extra);
        args.push("-");
        args
    }

    /// List untracked files (excluding gitignored)
    fn untracked_files(&self) -> Result<Vec<String>> {
        let output = self.run(&["ls-files", "--others", "--exclude-standard"])?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().filter(|l| !l.is_empty()).map(String::from).collect())
    }

    fn diff(&self, args: &[&str]) -> Result<String> {
        let output = self.run(args)?;
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if !output.status.success() && !stderr.is_empty() {
            anyhow::bail!("git diff failed: {}", stderr.trim());
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Build a unified diff for a file that only exists in the working tree
fn synthetic_new_file_diff(path: &str, content: &str) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let count = lines.len();
    let mut diff = String::new();
    diff.push_str(&format!("diff --git a/{path} b/{path}\n"));
    diff.push_str("new file mode 100644\n");
    diff.push_str("--- /dev/null\n");
    diff.push_str(&format!("+++ b/{path}\n"));
    diff.push_str(&format!("@@ -0,0 +1,{count} @@\n"));
    for line in &lines {
        diff.push_str(&format!("+{line}\n"));
    }
    diff
}

fn apply_outcome(output: &Output) -> ApplyOutcome {
    if output.status.success() {
        ApplyOutcome { success: true, error: None }
    } else {
        ApplyOutcome {
            success: false,
            error: Some(String::from_utf8_lossy(&output.stderr).trim().to_string()),
        }
    }
}

impl Vcs for GitCli {
    fn unstaged_diff(&self) -> Result<String> {
        let mut raw = self.diff(&["diff", "--no-color", "--no-ext-diff"])?;
        if self.include_untracked {
            for path in self.untracked_files()? {
                if let Ok(content) = std::fs::read_to_string(self.repo_root.join(&path)) {
                    raw.push_str(&synthetic_new_file_diff(&path, &content));
                }
            }
        }
        Ok(raw)
    }

    fn staged_diff(&self) -> Result<String> {
        self.diff(&["diff", "--cached", "--no-color", "--no-ext-diff"])
    }

    fn diff_with_context(&self, context_lines: u32) -> Result<String> {
        let unified = format!("--unified={context_lines}");
        self.diff(&["diff", &unified, "--no-color", "--no-ext-diff"])
    }

    fn check_patch(&self, patch: &str) -> Result<PatchCheck> {
        let output = self.run_with_stdin(&self.apply_args(&["--check"]), patch)?;
        if output.status.success() {
            Ok(PatchCheck { applies: true, error: None })
        } else {
            Ok(PatchCheck {
                applies: false,
                error: Some(String::from_utf8_lossy(&output.stderr).trim().to_string()),
            })
        }
    }

    fn apply_to_index(&self, patch: &str) -> Result<ApplyOutcome> {
        let output = self.run_with_stdin(&self.apply_args(&[]), patch)?;
        Ok(apply_outcome(&output))
    }

    fn apply_with_recount(&self, patch: &str) -> Result<ApplyOutcome> {
        let output = self.run_with_stdin(&self.apply_args(&["--recount"]), patch)?;
        Ok(apply_outcome(&output))
    }

    fn reverse_patch(&self, patch: &str) -> Result<ApplyOutcome> {
        let output = self.run_with_stdin(&self.apply_args(&["--reverse"]), patch)?;
        Ok(apply_outcome(&output))
    }

    fn reset_staging(&self) -> Result<()> {
        let output = self.run(&["reset", "--quiet"])?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("git reset failed: {}", stderr.trim());
        }
        Ok(())
    }

    fn staged_files(&self) -> Result<Vec<String>> {
        let output = self.run(&["diff", "--cached", "--name-only"])?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("git diff --name-only failed: {}", stderr.trim());
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().filter(|l| !l.is_empty()).map(String::from).collect())
    }

    fn commit(&self, message: &str) -> Result<CommitOutcome> {
        let output = self.run(&["commit", "-m", message])?;
        if !output.status.success() {
            return Ok(CommitOutcome {
                success: false,
                hash: None,
                error: Some(String::from_utf8_lossy(&output.stderr).trim().to_string()),
            });
        }
        let head = self.run(&["rev-parse", "HEAD"])?;
        let hash = if head.status.success() {
            Some(String::from_utf8_lossy(&head.stdout).trim().to_string())
        } else {
            None
        };
        Ok(CommitOutcome { success: true, hash, error: None })
    }

    fn status(&self) -> Result<String> {
        let output = self.run(&["status", "--porcelain"])?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn stage_file(&self, path: &str) -> Result<()> {
        let output = self.run(&["add", "--", path])?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("git add failed: {}", stderr.trim());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_diff_for_untracked_file() {
        let diff = synthetic_new_file_diff("notes.txt", "alpha\nbeta\n");
        assert_eq!(
            diff,
            "diff --git a/notes.txt b/notes.txt\nnew file mode 100644\n--- /dev/null\n+++ b/notes.txt\n@@ -0,0 +1,2 @@\n+alpha\n+beta\n"
        );

        let parsed = crate::git::parse_diff(&diff);
        assert_eq!(parsed.files.len(), 1);
        assert!(parsed.files[0].is_new);
        assert_eq!(parsed.files[0].hunks[0].addition_count(), 2);
    }

    #[test]
    fn synthetic_diff_for_empty_file_has_zero_count() {
        let diff = synthetic_new_file_diff("empty.txt", "");
        assert!(diff.contains("@@ -0,0 +1,0 @@"));
    }

    #[test]
    fn with_config_honors_untracked_toggle() {
        let config = crate::config::StageConfig {
            unstaged: crate::config::UnstagedConfig { include_untracked: false },
            ..Default::default()
        };
        let cli = GitCli::with_config(".", &config);
        assert!(!cli.include_untracked);
    }

    #[test]
    fn apply_args_place_stdin_marker_last() {
        let cli = GitCli::new(".");
        assert_eq!(cli.apply_args(&[]), vec!["apply", "--cached", "-"]);
        assert_eq!(
            cli.apply_args(&["--check"]),
            vec!["apply", "--cached", "--check", "-"]
        );
        assert_eq!(
            cli.apply_args(&["--recount"]),
            vec!["apply", "--cached", "--recount", "-"]
        );
    }
}
