//! Analysis engines: environment divergence and release version planning

pub mod divergence;
pub mod release_planner;

pub use divergence::{
    analyze_project, diff, DivergenceResult, EnvironmentDivergence, ProjectAnalysis,
};
pub use release_planner::{plan, ReleasePlan};
