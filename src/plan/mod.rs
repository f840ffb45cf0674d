mod document;
mod model;
mod worksheet;

pub use document::parse_plan;
pub use model::{
    CompAnchor, Compensation, HunkSelection, LineEdit, SelectionMode, StagingPlan,
};
pub use worksheet::{IncludeMode, Worksheet, WorksheetFile, WorksheetHunk, WorksheetLine};
