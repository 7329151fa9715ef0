//! Function locator: finds `function` declarations in raw source text.

use crate::text::line_number_at;
use regex::Regex;
use std::sync::LazyLock;

// function [a, b] = name(x, y)   |   function out = name(x)   |   function name(x)
static RE_FUNCTION_TOP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^function\s+(?:(\[[^\]]+\]|\w+)\s*=\s*)?(\w+)\s*\(([^)]*)\)").unwrap()
});

static RE_FUNCTION_INDENTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*function\s+(?:(\[[^\]]+\]|\w+)\s*=\s*)?(\w+)\s*\(([^)]*)\)").unwrap()
});

// Start of a top-level function keyword; terminates the previous span.
static RE_TOP_LEVEL_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^function\s+").unwrap());

/// A located function declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSpan {
    pub name: String,
    /// Raw output list, e.g. `[a, b]` or `out`
    pub outputs_text: Option<String>,
    /// Raw text between the parentheses
    pub inputs_text: String,
    /// Byte offset of the declaration (start of its line when indented)
    pub start_offset: usize,
    /// Byte offset where the span ends (exclusive)
    pub end_offset: usize,
    /// 1-based line of the declaration
    pub line_number: usize,
    pub full_signature: String,
}

impl FunctionSpan {
    pub fn body<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start_offset..self.end_offset]
    }

    /// Shift offsets and line numbers of a span found in a slice of a larger text.
    pub fn rebase(&mut self, offset: usize, lines: usize) {
        self.start_offset += offset;
        self.end_offset += offset;
        self.line_number += lines;
    }
}

/// Locate function declarations in source order.
///
/// With `allow_indented == false` only declarations starting in column 0
/// qualify, and each span runs to the next column-0 `function` keyword or end
/// of text. With `allow_indented == true` (method blocks) indented declarations
/// qualify too, and each span runs to the next located declaration.
pub fn find_functions(text: &str, allow_indented: bool) -> Vec<FunctionSpan> {
    let re = if allow_indented {
        &*RE_FUNCTION_INDENTED
    } else {
        &*RE_FUNCTION_TOP
    };

    let mut spans: Vec<FunctionSpan> = re
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(FunctionSpan {
                name: caps[2].to_string(),
                outputs_text: caps.get(1).map(|m| m.as_str().to_string()),
                inputs_text: caps[3].to_string(),
                start_offset: whole.start(),
                end_offset: text.len(),
                line_number: line_number_at(text, whole.start()),
                full_signature: whole.as_str().to_string(),
            })
        })
        .collect();

    if allow_indented {
        let starts: Vec<usize> = spans.iter().skip(1).map(|s| s.start_offset).collect();
        for (span, next) in spans.iter_mut().zip(starts) {
            span.end_offset = next;
        }
    } else {
        for span in &mut spans {
            let after = span.start_offset + span.full_signature.len();
            span.end_offset = RE_TOP_LEVEL_KEYWORD
                .find_at(text, after)
                .map(|m| m.start())
                .unwrap_or(text.len());
        }
    }

    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_all_signature_shapes() {
        let text = "function [a, b] = first(x, y)\n  a = x;\nend\n\
                    function out = second(z)\nend\n\
                    function third()\nend\n";
        let spans = find_functions(text, false);
        let names: Vec<_> = spans.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["first", "second", "third"]);
        assert_eq!(spans[0].outputs_text.as_deref(), Some("[a, b]"));
        assert_eq!(spans[0].inputs_text, "x, y");
        assert_eq!(spans[1].outputs_text.as_deref(), Some("out"));
        assert_eq!(spans[2].outputs_text, None);
        assert_eq!(spans[2].line_number, 6);
    }

    #[test]
    fn spans_end_at_next_top_level_function() {
        let text = "function a(x)\n  y = 1;\nfunction b(z)\n  w = 2;\n";
        let spans = find_functions(text, false);
        assert_eq!(spans[0].body(text), "function a(x)\n  y = 1;\n");
        assert_eq!(spans[1].body(text), "function b(z)\n  w = 2;\n");
    }

    #[test]
    fn top_level_mode_skips_indented() {
        let text = "function outer(x)\n    function inner(y)\n    end\nend\n";
        let spans = find_functions(text, false);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].end_offset, text.len());

        let spans = find_functions(text, true);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].end_offset, spans[1].start_offset);
    }

    #[test]
    fn start_offsets_strictly_increase() {
        let text = "function a(x)\nend\n  function b(y)\n  end\nfunction c(z)\nend\n";
        for indented in [false, true] {
            let spans = find_functions(text, indented);
            assert!(spans.windows(2).all(|w| w[0].start_offset < w[1].start_offset));
        }
    }

    #[test]
    fn multiline_parameter_list() {
        let text = "function r = f(a, ...\n    b)\nend\n";
        let spans = find_functions(text, false);
        assert_eq!(spans[0].inputs_text, "a, ...\n    b");
    }

    #[test]
    fn rebase_shifts_offsets() {
        let mut span = find_functions("function a(x)\n", false).remove(0);
        span.rebase(10, 3);
        assert_eq!(span.start_offset, 10);
        assert_eq!(span.line_number, 4);
    }
}
