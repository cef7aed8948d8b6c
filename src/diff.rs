//! Line diff used to explain drift.

use similar::{Algorithm, ChangeTag, TextDiff};
use std::time::Duration;

/// Upper bound on time spent looking for a minimal diff. Past it the
/// diff is still correct, just coarser.
const DIFF_TIMEOUT: Duration = Duration::from_secs(1);

/// Render a line diff from `old` to `new`.
///
/// Unchanged lines are prefixed with two spaces, removed lines with `- `
/// and added lines with `+ `.
pub fn line_diff(old: &str, new: &str) -> String {
    let a: Vec<&str> = old.lines().collect();
    let b: Vec<&str> = new.lines().collect();

    let diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .timeout(DIFF_TIMEOUT)
        .diff_slices(&a, &b);

    let mut out: Vec<String> = diff
        .iter_all_changes()
        .map(|change| {
            let sign = match change.tag() {
                ChangeTag::Equal => "  ",
                ChangeTag::Delete => "- ",
                ChangeTag::Insert => "+ ",
            };
            format!("{}{}", sign, change.value())
        })
        .collect();

    // Changes invisible to `lines()` (trailing newline, CRLF).
    if out.iter().all(|l| l.starts_with("  ")) && old != new {
        out.push("~ (whitespace or line ending change)".to_string());
    }

    out.join("\n")
}
