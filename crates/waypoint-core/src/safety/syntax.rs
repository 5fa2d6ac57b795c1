//! Lightweight shell syntax checks run before a command is executed.

use crate::error::CommandError;

/// Fragments that indicate a broken command, usually from mangled quoting.
const MALFORMED_PATTERNS: &[(&str, &str)] = &[
    ("\":\"", "stray quoted colon, likely mangled quoting"),
    ("\"\"\"", "run of three double quotes"),
];

/// Operators that cannot end a command.
const DANGLING_OPERATORS: &[&str] = &["&&", "||", "|"];

/// Checks that quotes are balanced and that no known-malformed fragment
/// appears. This is a heuristic and does not parse the shell grammar.
pub fn validate_syntax(command: &str) -> Result<(), CommandError> {
    let trimmed = command.trim();
    if trimmed.is_empty() {
        return Err(CommandError::Validation("Command is empty".to_string()));
    }

    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;

    for c in trimmed.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if !in_single => escaped = true,
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            _ => {}
        }
    }

    if in_single {
        return Err(CommandError::Validation(
            "Unbalanced single quotes".to_string(),
        ));
    }
    if in_double {
        return Err(CommandError::Validation(
            "Unbalanced double quotes".to_string(),
        ));
    }

    if let Some((_, reason)) = MALFORMED_PATTERNS
        .iter()
        .find(|(pattern, _)| trimmed.contains(pattern))
    {
        return Err(CommandError::Validation(format!(
            "Malformed command: {reason}"
        )));
    }

    if let Some(operator) = DANGLING_OPERATORS
        .iter()
        .find(|operator| trimmed.ends_with(**operator))
    {
        return Err(CommandError::Validation(format!(
            "Command ends with a dangling `{operator}`"
        )));
    }

    Ok(())
}
