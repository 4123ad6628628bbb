//! Heuristic classification of process output lines.
//!
//! Classification is substring based and deliberately imprecise: a benign
//! line that happens to contain a marker is misclassified and left that way.

use std::borrow::Cow;
use std::sync::OnceLock;

use events::Level;
use regex::Regex;

const FAILURE_MARKERS: [&str; 3] = ["✗", "FAIL", "failed"];
const SUCCESS_MARKERS: [&str; 3] = ["✓", "PASS", "passed"];
const WARNING_MARKERS: [&str; 2] = ["⚠", "WARNING"];

static ANSI_PATTERN: OnceLock<Regex> = OnceLock::new();
static DIVIDER_PATTERN: OnceLock<Regex> = OnceLock::new();

fn ansi_pattern() -> &'static Regex {
    ANSI_PATTERN.get_or_init(|| {
        // CSI sequences, OSC sequences terminated by BEL or ST, and two-byte escapes.
        Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[@-Z\\-_]")
            .expect("Invalid ANSI escape regex pattern")
    })
}

fn divider_pattern() -> &'static Regex {
    DIVIDER_PATTERN.get_or_init(|| {
        // A bare run, or a title framed by runs on both sides.
        Regex::new(r"^(?:[=─]{3,}|[=─]{3,}.*[=─]{3,})$").expect("Invalid divider regex pattern")
    })
}

/// Remove terminal colour and control escape sequences.
pub fn strip_ansi(line: &str) -> Cow<'_, str> {
    if !line.contains('\x1b') {
        return Cow::Borrowed(line);
    }
    ansi_pattern().replace_all(line, "")
}

/// Whether a (stripped) line separates two sections of output.
pub fn is_divider(line: &str) -> bool {
    divider_pattern().is_match(line.trim())
}

/// Classify a line by marker substrings in priority order: failure, success,
/// warning, otherwise info. Lines from the error stream are at least warnings.
pub fn classify(line: &str, is_stderr: bool) -> Level {
    let contains_any = |markers: &[&str]| markers.iter().any(|marker| line.contains(marker));

    let level = if contains_any(&FAILURE_MARKERS) {
        Level::Error
    } else if contains_any(&SUCCESS_MARKERS) {
        Level::Success
    } else if contains_any(&WARNING_MARKERS) {
        Level::Warning
    } else {
        Level::Info
    };

    if is_stderr {
        level.at_least(Level::Warning)
    } else {
        level
    }
}
