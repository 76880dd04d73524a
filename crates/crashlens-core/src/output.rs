//! # Output Parsing
//!
//! Pure text transforms applied to backend output: legacy command prefixes,
//! prompt/echo/sentinel noise, and register dumps.
//!
//! The backend has no structured end-of-response signal. After each command
//! the channel sends a sentinel command the backend does not know; its
//! "not a valid command" reply marks the end of the real output. Everything
//! here removes that scaffolding again.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::RegisterSet;

/// Extension prefix callers used to put in front of runtime commands (`!clrstack`).
pub const LEGACY_PREFIX: char = '!';

/// Every sentinel command starts with this token.
pub const SENTINEL_PREFIX: &str = "__crashlens_end_";

/// `name = 0x…` (LLDB style) or `name   0x…` (column style) register lines.
static REGISTER_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z][A-Za-z0-9_]*)(?:\s*=\s*(?:0[xX])?|\s+0[xX])([0-9a-fA-F]+)\b")
        .expect("register regex is valid")
});

/// Build the sentinel command for a sequence number.
#[must_use]
pub fn sentinel_command(sequence: u64) -> String
{
    format!("{SENTINEL_PREFIX}{sequence}")
}

/// Whether a line mentions any sentinel command (echo or error reply).
#[must_use]
pub fn is_sentinel_line(line: &str) -> bool
{
    line.contains(SENTINEL_PREFIX)
}

/// Whether `line` mentions exactly `sentinel` (not a longer sentinel that
/// shares its prefix, e.g. `…_1` inside `…_12`).
#[must_use]
pub fn mentions_sentinel(line: &str, sentinel: &str) -> bool
{
    line.match_indices(sentinel).any(|(index, _)| {
        !line[index + sentinel.len()..]
            .chars()
            .next()
            .is_some_and(|next| next.is_ascii_digit())
    })
}

/// Remove a leading legacy extension prefix (`!dumpheap` → `dumpheap`).
///
/// The backend accepts the bare command name. Only one prefix character is
/// removed and surrounding whitespace is trimmed.
///
/// ```rust
/// use crashlens_core::output::strip_legacy_prefix;
///
/// assert_eq!(strip_legacy_prefix("!clrstack -a"), "clrstack -a");
/// assert_eq!(strip_legacy_prefix("  bt "), "bt");
/// ```
#[must_use]
pub fn strip_legacy_prefix(command: &str) -> &str
{
    let command = command.trim();
    command.strip_prefix(LEGACY_PREFIX).map_or(command, str::trim_start)
}

/// Remove leading prompt markers (and the space after each) from a line.
///
/// Returns `None` when the line was nothing but prompt markers, which is how
/// a bare prompt is told apart from a real empty output line.
#[must_use]
pub fn strip_prompt<'a>(line: &'a str, prompt: &str) -> Option<&'a str>
{
    if prompt.is_empty() {
        return Some(line);
    }

    let mut rest = line;
    let mut stripped = false;
    loop {
        let candidate = rest.trim_start();
        match candidate.strip_prefix(prompt) {
            Some(after) => {
                rest = after.strip_prefix(' ').unwrap_or(after);
                stripped = true;
            }
            None => break,
        }
    }

    if stripped && rest.trim().is_empty() {
        None
    } else {
        Some(rest)
    }
}

/// Turn the raw lines collected for one command into the command's output.
///
/// - Everything up to and including the echoed input line (the command
///   after a prompt marker) is dropped. When no echo is found nothing is
///   dropped, so already-clean text passes through unchanged.
/// - Output stops at the first sentinel line. When no sentinel is found,
///   everything after the echo is kept; real output is never discarded.
/// - Prompt markers are stripped and bare prompt lines removed.
///
/// ```rust
/// use crashlens_core::output::clean_output;
///
/// let raw = "(lldb) thread list\nProcess 1 stopped\n* thread #1\n(lldb) __crashlens_end_3\n\
///            error: '__crashlens_end_3' is not a valid command.";
/// let cleaned = clean_output(raw, "thread list", "(lldb)");
/// assert_eq!(cleaned, "Process 1 stopped\n* thread #1");
/// assert_eq!(clean_output(&cleaned, "thread list", "(lldb)"), cleaned);
/// ```
#[must_use]
pub fn clean_output(raw: &str, command: &str, prompt: &str) -> String
{
    let lines: Vec<&str> = raw.lines().collect();
    let command = command.trim();

    let start = if command.is_empty() {
        0
    } else {
        lines
            .iter()
            .position(|line| is_echo_of(line, command, prompt))
            .map_or(0, |index| index + 1)
    };

    let end = lines[start..]
        .iter()
        .position(|line| is_sentinel_line(line))
        .map_or(lines.len(), |offset| start + offset);

    let kept: Vec<&str> = lines[start..end]
        .iter()
        .filter_map(|line| strip_prompt(line, prompt))
        .map(str::trim_end)
        .collect();

    kept.join("\n").trim_matches('\n').trim_end().to_string()
}

/// Whether `line` is the backend echoing `command` after its prompt.
///
/// Only prompt-prefixed lines count. Cleaned output never carries a prompt,
/// so a result line that merely equals the command is not taken for an echo.
/// With an empty prompt nothing is an echo.
pub(crate) fn is_echo_of(line: &str, command: &str, prompt: &str) -> bool
{
    if prompt.is_empty() || command.is_empty() || !line.trim_start().starts_with(prompt) {
        return false;
    }
    strip_prompt(line, prompt).is_some_and(|rest| rest.trim() == command)
}

/// Parse a register dump into a canonical [`RegisterSet`].
///
/// Recognises both x86 (`rip`/`rsp`/`rbp`/`rflags`, `eip`/…) and ARM64
/// (`pc`/`sp`/`fp`/`lr`/`cpsr`, `x0`…) names, in `name = 0x…` or
/// `name 0x…` layouts. Unrecognised lines (headers, blank lines) are ignored,
/// so unexpected output yields an empty set rather than an error.
#[must_use]
pub fn parse_registers(text: &str) -> RegisterSet
{
    let mut registers = RegisterSet::new();
    for line in text.lines() {
        if let Some(captures) = REGISTER_LINE.captures(line) {
            registers.insert(&captures[1], &captures[2]);
        }
    }
    registers
}

/// Scan raw output for the first fault signature it contains.
#[must_use]
pub fn find_fault_signature<'a>(raw: &str, signatures: &'a [String]) -> Option<&'a str>
{
    signatures
        .iter()
        .find(|signature| raw.contains(signature.as_str()))
        .map(String::as_str)
}

#[cfg(test)]
mod tests
{
    use super::*;

    const PROMPT: &str = "(lldb)";

    #[test]
    fn test_strip_prompt_bare_prompt_is_dropped()
    {
        assert_eq!(strip_prompt("(lldb) ", PROMPT), None);
        assert_eq!(strip_prompt("(lldb) (lldb) ", PROMPT), None);
        assert_eq!(strip_prompt("", PROMPT), Some(""));
    }

    #[test]
    fn test_strip_prompt_keeps_indentation_of_output()
    {
        assert_eq!(strip_prompt("    rax = 0x1", PROMPT), Some("    rax = 0x1"));
        assert_eq!(strip_prompt("(lldb)   frame #0", PROMPT), Some("  frame #0"));
    }

    #[test]
    fn test_clean_output_without_sentinel_keeps_everything_after_echo()
    {
        let raw = "banner\n(lldb) bt\n* frame #0: 0x1\n  frame #1: 0x2";
        assert_eq!(clean_output(raw, "bt", PROMPT), "* frame #0: 0x1\n  frame #1: 0x2");
    }

    #[test]
    fn test_clean_output_without_echo_keeps_everything_before_sentinel()
    {
        let raw = "line one\n(lldb) \nline two\nerror: '__crashlens_end_9' is not a valid command.";
        assert_eq!(clean_output(raw, "bt", PROMPT), "line one\nline two");
    }

    #[test]
    fn test_sentinel_command_is_recognised()
    {
        assert!(is_sentinel_line(&format!("(lldb) {}", sentinel_command(12))));
        assert!(!is_sentinel_line("error: 'foo' is not a valid command."));
    }

    #[test]
    fn test_mentions_sentinel_is_exact()
    {
        let line = "error: '__crashlens_end_12' is not a valid command.";
        assert!(mentions_sentinel(line, &sentinel_command(12)));
        assert!(!mentions_sentinel(line, &sentinel_command(1)));
    }

    #[test]
    fn test_find_fault_signature()
    {
        let signatures = vec!["Segmentation fault".to_string(), "LLDB has crashed".to_string()];
        assert_eq!(
            find_fault_signature("PLEASE attach\nLLDB has crashed!", &signatures),
            Some("LLDB has crashed")
        );
        assert_eq!(find_fault_signature("all fine", &signatures), None);
    }
}
