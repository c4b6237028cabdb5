//! Diagnostic extraction from validator output.
//!
//! Deliberately narrow: the validator's text format is not a stable contract,
//! so only `ERROR: <prefix>:<line>: <message>` lines are recognized and
//! everything else is skipped.

use std::sync::LazyLock;

use glint_types::Diagnostic;
use regex::Regex;

/// Source label attached to every parsed diagnostic.
pub const SOURCE: &str = "glslang";

static ERROR_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"ERROR:\s.*:(\d+):\s(.*)").expect("error line pattern is valid")
});

/// Parse combined validator output into whole-line error diagnostics.
///
/// Reported lines are 1-based; `line_offset` is the number of lines that were
/// prepended to the source before validation. Errors that land inside that
/// prelude are pinned to line 0.
#[must_use]
pub fn parse_output(output: &str, line_offset: u32) -> Vec<Diagnostic> {
    output
        .lines()
        .filter_map(|line| parse_line(line, line_offset))
        .collect()
}

fn parse_line(line: &str, line_offset: u32) -> Option<Diagnostic> {
    // `str::lines` already strips a trailing `\r`
    let caps = ERROR_LINE.captures(line)?;
    let reported: u32 = caps[1].parse().ok()?;
    let zero_based = reported.saturating_sub(1).saturating_sub(line_offset);
    let message = caps[2].trim().to_string();
    Some(Diagnostic::whole_line_error(zero_based, message, SOURCE))
}
