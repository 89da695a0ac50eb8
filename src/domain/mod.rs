//! Domain logic - pure business rules independent of git operations

pub mod commit;
pub mod environment;
pub mod ticket;
pub mod version;

pub use commit::CommitRecord;
pub use environment::{Environment, STABILITY_ORDER};
pub use ticket::TicketId;
pub use version::{SemanticVersion, VersionBump};
