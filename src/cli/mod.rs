//! Command workflows, decoupled from argument parsing so they can be driven
//! programmatically and tested without a terminal.

pub mod orchestration;

pub use orchestration::{
    execute_release, run_analysis, AnalysisSummary, ProjectOutcome, ProjectTarget, ReleaseOptions,
    ReleaseStatus, ReleaseSummary,
};
