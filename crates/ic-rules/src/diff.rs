use crate::dump::strip_counters;
use crate::error::DumpError;
use ic_core::Family;
use regex::Regex;
use similar::{ChangeTag, TextDiff};
use std::sync::LazyLock;

static CHAIN_COUNTERS: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^(:\S+\s+\S+)\s+\[\d+:\d+\]$"));

/// Result of comparing a live dump with the canonical rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpDiff {
    pub family: Family,
    pub matches: bool,
    pub diff: Option<String>,
}

/// Normalize a live dump for comparison: comments and blank lines go,
/// chain counters are zeroed and rule counters removed.
pub fn normalize_dump(text: &str) -> Result<String, DumpError> {
    let counters = CHAIN_COUNTERS
        .as_ref()
        .map_err(|err| DumpError::new(0, "", err.to_string()))?;

    let mut out = String::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let normalized = match counters.captures(line) {
            Some(caps) => format!("{} [0:0]", &caps[1]),
            None => strip_counters(line).to_string(),
        };
        out.push_str(&normalized);
        out.push('\n');
    }
    Ok(out)
}

/// Compare a live dump with the desired canonical text.
pub fn diff_dump(family: Family, live: &str, desired: &str) -> Result<DumpDiff, DumpError> {
    let current = normalize_dump(live)?;
    if current == desired {
        return Ok(DumpDiff {
            family,
            matches: true,
            diff: None,
        });
    }
    Ok(DumpDiff {
        family,
        matches: false,
        diff: Some(render_diff(&current, desired)),
    })
}

fn render_diff(current: &str, desired: &str) -> String {
    let diff = TextDiff::from_lines(current, desired);
    let mut output = String::new();

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => '-',
            ChangeTag::Insert => '+',
            ChangeTag::Equal => ' ',
        };
        output.push(sign);
        output.push_str(change.value());
        if change.missing_newline() {
            output.push('\n');
        }
    }

    output
}
