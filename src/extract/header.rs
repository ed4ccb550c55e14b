//! Bracketed process header: `[<prefix> <pid> <caller>] LEVEL text` or
//! `[<pid> <caller>] LEVEL text`.

use super::level::header_level;

/// Fields recovered from a bracketed process header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessHeader<'a> {
    pub pid: &'a str,
    pub caller: &'a str,
    /// Normalized level, if a level token followed the bracket.
    pub level: Option<&'static str>,
    /// Text left after the header (and level token) were stripped.
    pub rest: &'a str,
}

/// Parses a bracketed process header at the start of `text`.
///
/// Returns `None` unless the pid candidate parses as an integer.
pub fn parse_header(text: &str) -> Option<ProcessHeader<'_>> {
    if !text.starts_with('[') {
        return None;
    }
    let close = text.find(']')?;
    let first_space = text.find(' ')?;
    if first_space >= close {
        return None;
    }

    let after_first = first_space + 1;
    let (pid, caller) = match text[after_first..].find(' ') {
        // Three tokens: the pid is the middle one.
        Some(second) if after_first + second < close => {
            if second == 0 {
                return None;
            }
            let pid_end = after_first + second;
            (&text[after_first..pid_end], &text[pid_end + 1..close])
        }
        // Two tokens: the pid leads.
        _ => (&text[1..first_space], &text[after_first..close]),
    };

    pid.parse::<i64>().ok()?;

    let mut header = ProcessHeader {
        pid,
        caller,
        level: None,
        rest: &text[close + 1..],
    };

    // The level token follows the separator right after the bracket.
    let separator_len = header.rest.chars().next().map_or(0, char::len_utf8);
    let tail = &header.rest[separator_len..];
    if let Some(space) = tail.find(' ') {
        if space > 0 {
            header.level = Some(header_level(&tail[..space]));
            header.rest = &tail[space + 1..];
        }
    }

    Some(header)
}
