//! User interface module - interaction (prompts) and formatting.
//!
//! Separates concerns:
//! - `formatter` - Pure formatting functions
//! - This module - Interactive prompts and user input handling

use std::io::{self, Write};

use anyhow::Result;

pub mod formatter;

// Re-export formatter functions for convenience
pub use formatter::{
    display_analysis, display_boundary_warning, display_error, display_plan,
    display_release_summary, display_statistics, display_status, display_success,
};

/// Prompts user to confirm an action with a yes/no prompt.
///
/// Accepts "y" or "yes" (case-insensitive). Default is "no" if the user
/// presses Enter.
pub fn confirm_action(prompt: &str) -> Result<bool> {
    print!("\n{} (y/N): ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    Ok(parse_confirmation(&input))
}

fn parse_confirmation(input: &str) -> bool {
    let response = input.trim().to_lowercase();
    response == "y" || response == "yes"
}

/// Confirmation function for the release workflow.
///
/// With `assume_yes` every prompt is accepted without reading stdin. A failed
/// read counts as "no".
pub fn confirmer(assume_yes: bool) -> impl FnMut(&str) -> bool {
    move |prompt: &str| {
        if assume_yes {
            display_status(&format!("{} yes", prompt));
            return true;
        }
        match confirm_action(prompt) {
            Ok(answer) => answer,
            Err(e) => {
                display_error(&format!("Cannot read confirmation: {}", e));
                false
            }
        }
    }
}
