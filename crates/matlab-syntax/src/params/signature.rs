//! Positional parameters from a declaration's input list.

use crate::text::join_continuations;

/// Catch-all trailing token; it and everything after it are not positional.
pub const CATCH_ALL: &str = "varargin";
/// Placeholder for an ignored input.
pub const IGNORED: &str = "~";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Positional {
    pub names: Vec<String>,
    pub has_varargin: bool,
}

/// Split the parenthesized input text into positional names.
pub fn positional(inputs_text: &str) -> Positional {
    let mut result = Positional::default();
    let cleaned = join_continuations(inputs_text);

    for token in cleaned.split(',').map(str::trim) {
        if token == CATCH_ALL {
            result.has_varargin = true;
            break;
        }
        if token.is_empty() || token == IGNORED {
            continue;
        }
        result.names.push(token.to_string());
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_list() {
        let p = positional("channel, area, system");
        assert_eq!(p.names, ["channel", "area", "system"]);
        assert!(!p.has_varargin);
    }

    #[test]
    fn varargin_stops_collection() {
        let p = positional("flip, varargin");
        assert_eq!(p.names, ["flip"]);
        assert!(p.has_varargin);
    }

    #[test]
    fn ignore_placeholder_skipped() {
        let p = positional("~, event, ~");
        assert_eq!(p.names, ["event"]);
    }

    #[test]
    fn empty_list() {
        assert_eq!(positional("  "), Positional::default());
    }

    #[test]
    fn continuation_lines() {
        let p = positional("a, ... first\n    b, varargin");
        assert_eq!(p.names, ["a", "b"]);
        assert!(p.has_varargin);
    }
}
