//! stagecraft — decompose uncommitted changes into atomic commits.
//!
//! The pipeline: parse the unstaged diff into a structural model, render it
//! as an indexed plan document for an agent to edit, parse the edited
//! document back into a staging plan, shape each selection into a valid
//! patch fragment, and apply the fragments to the staging index one by one.
//!
//! ```no_run
//! use stagecraft::git::{parse_diff, GitCli, Vcs};
//! use stagecraft::{execute_plan, parse_plan, plan_scaffold};
//!
//! # fn main() -> anyhow::Result<()> {
//! let vcs = GitCli::new(".");
//! let diff = parse_diff(&vcs.unstaged_diff()?);
//!
//! // Hand the scaffold to an agent; parse whatever it sends back.
//! let document = plan_scaffold(&diff);
//! let plan = parse_plan(&document, &diff);
//!
//! let result = execute_plan(&plan, &diff, &vcs);
//! if result.success {
//!     vcs.commit(&plan.commit_message)?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod executor;
pub mod format;
pub mod git;
pub mod hunk;
pub mod plan;

pub use config::{load_config, StageConfig};
pub use executor::{apply_compensations, execute_plan, CompensationResult, ExecutionResult};
pub use format::{
    analyze, change_tags, complexity_hint, format_diff, format_hunk, hunk_table, plan_scaffold,
    DiffAnalysis,
};
pub use git::{parse_diff, parse_hunk_header, validate_hunk, ParsedDiff};
pub use hunk::{edit_hunk, generate_patch, is_splittable, select_hunks, split_hunk, HunkEdit};
pub use plan::{parse_plan, HunkSelection, SelectionMode, StagingPlan, Worksheet};
