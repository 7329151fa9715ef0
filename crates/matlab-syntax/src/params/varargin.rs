//! Name/value options dispatched by hand from `varargin`.

use crate::text::strip_comments;
use regex::Regex;
use std::sync::LazyLock;

// case 'name'  |  case {'a', 'b'}
static RE_CASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bcase\s+(?:['"](\w+)['"]|\{([^}]*)\})"#).unwrap());

static RE_QUOTED_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"['"](\w+)['"]"#).unwrap());

/// Unique `case` labels of a body, in source order.
pub fn case_labels(body: &str) -> Vec<String> {
    let code = strip_comments(body);
    let mut labels: Vec<String> = Vec::new();
    let mut push = |label: &str| {
        if !labels.iter().any(|l| l == label) {
            labels.push(label.to_string());
        }
    };

    for caps in RE_CASE.captures_iter(&code) {
        if let Some(single) = caps.get(1) {
            push(single.as_str());
        } else if let Some(list) = caps.get(2) {
            for word in RE_QUOTED_WORD.captures_iter(list.as_str()) {
                push(&word[1]);
            }
        }
    }
    labels
}
