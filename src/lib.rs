pub mod analyzer;
pub mod boundary;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod git;
pub mod report;
pub mod resolver;
pub mod status;
pub mod ui;

pub use error::{ReleaseTrackerError, Result};
