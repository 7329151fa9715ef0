//! Small text utilities shared by the extraction rules.

use regex::Regex;
use std::sync::LazyLock;

static RE_LINE_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)%.*$").unwrap());

/// Remove `%` comments through end of line.
///
/// Quoted `%` characters (e.g. in `sprintf` formats) are stripped too; the
/// rules that consume this output only look for keywords and assignments.
pub fn strip_comments(text: &str) -> String {
    RE_LINE_COMMENT.replace_all(text, "").into_owned()
}

/// True for blank lines and lines whose first non-blank character is `%`.
pub fn is_comment_or_blank(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('%')
}

/// Byte offset at which line `index` (0-based) starts when `text` is split on `\n`.
pub fn line_start_offset(text: &str, index: usize) -> usize {
    text.split('\n').take(index).map(|l| l.len() + 1).sum()
}

/// 1-based line number of a byte offset.
pub fn line_number_at(text: &str, offset: usize) -> usize {
    text[..offset.min(text.len())].matches('\n').count() + 1
}

/// Longest prefix of `text` holding at most `max` bytes, cut on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Drop `...` continuation markers (and the trailing text they comment out)
/// and `%` comments, joining the remaining pieces with a space.
pub fn join_continuations(text: &str) -> String {
    text.split('\n')
        .map(|line| {
            let line = line.split("...").next().unwrap_or("");
            line.split('%').next().unwrap_or("").trim()
        })
        .filter(|piece| !piece.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split on top-level commas, respecting brackets and quoted strings.
///
/// Stops at the first unbalanced closing bracket, so it can be pointed at the
/// middle of a call's argument list.
pub fn split_top_level_args(text: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut current = String::new();

    for ch in text.chars() {
        if let Some(q) = quote {
            current.push(ch);
            if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' => {
                quote = Some(ch);
                current.push(ch);
            }
            '(' | '[' | '{' => {
                depth += 1;
                current.push(ch);
            }
            ')' | ']' | '}' => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
                current.push(ch);
            }
            ',' if depth == 0 => {
                args.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        args.push(current.trim().to_string());
    }
    args
}
