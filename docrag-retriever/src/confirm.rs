//! Operator confirmation for destructive commands

use std::io::{BufRead, Write};

/// Print `prompt` and read one line from `input`.
///
/// Only `yes` (any case, surrounding whitespace ignored) confirms. Empty
/// input, end of input and read errors all decline.
pub fn confirm(prompt: &str, input: &mut impl BufRead, output: &mut impl Write) -> bool {
    if write!(output, "{prompt} (yes/no): ").and_then(|_| output.flush()).is_err() {
        return false;
    }
    let mut line = String::new();
    match input.read_line(&mut line) {
        Ok(_) => line.trim().eq_ignore_ascii_case("yes"),
        Err(e) => {
            tracing::warn!("Could not read confirmation: {}", e);
            false
        }
    }
}
