//! Argument-count guards (`if nargin < N ...`).

use crate::model::UNKNOWN_DEFAULT;
use crate::text::{strip_comments, truncate_chars};
use regex::Regex;
use std::sync::LazyLock;

static RE_LESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"if\s+nargin\s*<\s*(\d+)").unwrap());
static RE_GREATER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"if\s+nargin\s*>\s*(\d+)").unwrap());
static RE_GREATER_EQ: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"if\s+nargin\s*>=\s*(\d+)").unwrap());
static RE_LESS_EQ: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"if\s+nargin\s*<=\s*(\d+)").unwrap());
static RE_LESS_CI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)if\s+nargin\s*<\s*(\d+)\b").unwrap());

/// Only this much of a body is searched for a guard that rejects missing arguments.
const REQUIRED_GUARD_WINDOW: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardShape {
    Less,
    Greater,
    GreaterEq,
    LessEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Guard {
    pub shape: GuardShape,
    pub n: usize,
}

impl Guard {
    /// Number of leading parameters this guard implies are required.
    /// `<=` guards are detected but imply nothing.
    fn required_candidate(self) -> Option<i64> {
        let n = self.n as i64;
        match self.shape {
            GuardShape::Less | GuardShape::GreaterEq => Some(n - 1),
            GuardShape::Greater => Some(n),
            GuardShape::LessEq => None,
        }
    }
}

/// All argument-count guards in a body, comments ignored.
pub fn find_guards(body: &str) -> Vec<Guard> {
    let code = strip_comments(body);
    let shapes: [(&Regex, GuardShape); 4] = [
        (&RE_LESS, GuardShape::Less),
        (&RE_GREATER, GuardShape::Greater),
        (&RE_GREATER_EQ, GuardShape::GreaterEq),
        (&RE_LESS_EQ, GuardShape::LessEq),
    ];

    let mut guards = Vec::new();
    for (re, shape) in shapes {
        for caps in re.captures_iter(&code) {
            if let Ok(n) = caps[1].parse::<usize>() {
                guards.push(Guard { shape, n });
            }
        }
    }
    guards
}

/// Split point between required and optional positional parameters.
///
/// The smallest candidate across all guards wins. A split of zero coming
/// only from `nargin < 1` guards asserts that something was passed and is
/// not a split. Returns `None` when no guard yields a split below `total`.
pub fn required_count(body: &str, total: usize) -> Option<usize> {
    let guards = find_guards(body);
    let min = guards.iter().filter_map(|g| g.required_candidate()).min()?;

    let mut less = guards.iter().filter(|g| g.shape == GuardShape::Less).peekable();
    if min == 0 && less.peek().is_some() && less.all(|g| g.n == 1) {
        return None;
    }

    if min < total as i64 {
        Some(min.max(0) as usize)
    } else {
        None
    }
}

/// Default assigned to `name` under an `if nargin < position` guard.
///
/// Tries a guard followed by a line break first, then a guard on the same
/// line as the assignment. Falls back to `N/A`.
pub fn default_value(body: &str, name: &str, position: usize) -> String {
    let code = strip_comments(body);
    let name = regex::escape(name);
    let patterns = [
        format!(r"(?is)if\s+nargin\s*<\s*{position}\b\s*\n.*?\b{name}\s*=\s*([^=;\s][^;]*);"),
        format!(r"(?is)if\s+nargin\s*<\s*{position}\b.*?\b{name}\s*=\s*([^=;\s][^;]*);"),
    ];

    for pattern in &patterns {
        let Ok(re) = Regex::new(pattern) else {
            continue;
        };
        if let Some(caps) = re.captures(&code) {
            return caps[1].trim().to_string();
        }
    }
    UNKNOWN_DEFAULT.to_string()
}

/// True when the head of the body rejects calls with fewer than `position`
/// arguments (`if nargin < position ... error`).
pub fn has_required_guard(body: &str, position: usize) -> bool {
    let head = truncate_chars(body, REQUIRED_GUARD_WINDOW);
    RE_LESS_CI.captures_iter(head).any(|caps| {
        let at = caps.get(0).map_or(head.len(), |m| m.end());
        caps[1].parse::<usize>().ok() == Some(position) && head[at..].to_ascii_lowercase().contains("error")
    })
}
