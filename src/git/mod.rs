mod cli;
mod diff;

pub use cli::{ApplyOutcome, CommitOutcome, GitCli, PatchCheck, Vcs};
pub use diff::{
    diff_hash, parse_diff, parse_hunk_header, validate_hunk, FileDiff, Hunk, HunkHeader, Line,
    LineKind, ParsedDiff,
};
