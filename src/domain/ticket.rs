use crate::error::PlanError;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

fn ticket_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z]{1,10}-\d+$").expect("static regex"))
}

fn ticket_scan_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([A-Z]{1,10}-\d+)\b").expect("static regex"))
}

/// A validated ticket identifier such as `BWD-123`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TicketId(String);

impl TicketId {
    /// Validate a ticket against `^[A-Z]{1,10}-\d+$`.
    pub fn parse(raw: &str) -> Result<Self, PlanError> {
        if is_valid_ticket(raw) {
            Ok(TicketId(raw.to_string()))
        } else {
            Err(PlanError::InvalidTicketFormat(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the release branch cut for this ticket.
    pub fn release_branch(&self) -> String {
        format!("release/{}", self.0)
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn is_valid_ticket(raw: &str) -> bool {
    ticket_id_regex().is_match(raw)
}

/// Ticket ids mentioned in a commit message, deduplicated, first appearance first.
pub fn extract_ticket_ids(message: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for caps in ticket_scan_regex().captures_iter(message) {
        let id = &caps[1];
        if !found.iter().any(|t| t == id) {
            found.push(id.to_string());
        }
    }
    found
}

/// `{base}/browse/{ticket}`.
pub fn jira_link(jira_base_url: &str, ticket: &str) -> String {
    format!("{}/browse/{}", jira_base_url.trim_end_matches('/'), ticket)
}
