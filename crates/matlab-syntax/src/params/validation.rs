//! `inputParser` validation blocks.
//!
//! A block starts at `<var> = inputParser` and runs to the matching
//! `parse(<var>, ...)` / `<var>.parse(...)` call. When no parse call follows,
//! it runs to the end of the last `add*` declaration instead.

use crate::model::UNKNOWN_DEFAULT;
use crate::text::split_top_level_args;
use regex::Regex;
use std::sync::LazyLock;

static RE_INIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\w+)\s*=\s*inputParser\b").unwrap());

static RE_ADD_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\b\w+\s*\.\s*|\b)add(?:Required|Optional|Parameter|ParamValue)\s*\([^;]*;")
        .unwrap()
});

// p.addRequired('name', ...)  |  addRequired(p, 'name', ...)
static RE_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)(?:\b\w+\s*\.\s*(addRequired|addOptional|addParameter|addParamValue)\s*\(\s*",
        r"|\b(addRequired|addOptional|addParameter|addParamValue)\s*\(\s*\w+\s*,\s*)",
        r#"['"](\w+)['"]"#
    ))
    .unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Required,
    Optional,
    Parameter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub kind: DeclKind,
    pub name: String,
    /// Default argument text; `N/A` when absent. Always `None` for required.
    pub default: Option<String>,
}

/// Extent of a validation block inside a function body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationBlock<'a> {
    /// Name of the parser object
    pub var: String,
    pub text: &'a str,
}

impl ValidationBlock<'_> {
    /// Declarations in source order.
    pub fn declarations(&self) -> Vec<Declaration> {
        RE_DECLARATION
            .captures_iter(self.text)
            .map(|caps| {
                let method = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .map(|m| m.as_str().to_ascii_lowercase())
                    .unwrap_or_default();
                let kind = match method.as_str() {
                    "addrequired" => DeclKind::Required,
                    "addoptional" => DeclKind::Optional,
                    _ => DeclKind::Parameter,
                };
                let default = match kind {
                    DeclKind::Required => None,
                    _ => {
                        let end = caps.get(0).map_or(self.text.len(), |m| m.end());
                        let rest = &self.text[end..];
                        Some(default_argument(rest).unwrap_or_else(|| UNKNOWN_DEFAULT.to_string()))
                    }
                };
                Declaration {
                    kind,
                    name: caps[3].to_string(),
                    default,
                }
            })
            .collect()
    }

    /// Names declared with `addRequired`, in declaration order, without repeats.
    pub fn required_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for decl in self.declarations() {
            if decl.kind == DeclKind::Required && !names.contains(&decl.name) {
                names.push(decl.name);
            }
        }
        names
    }
}

/// Locate the validation block of a function body.
pub fn find_block(body: &str) -> Option<ValidationBlock<'_>> {
    let init = RE_INIT.captures(body)?;
    let start = init.get(0)?.start();
    let var = init[1].to_string();
    let tail = &body[start..];

    let parse_call = Regex::new(&format!(
        r"(?i)(?:\b{v}\s*\.\s*parse\s*\(|\bparse\s*\(\s*{v}\b)[^)]*\)",
        v = regex::escape(&var)
    ))
    .ok()?;

    let end = match parse_call.find(tail) {
        Some(m) => m.end(),
        None => RE_ADD_CALL.find_iter(tail).last()?.end(),
    };

    Some(ValidationBlock {
        var,
        text: &tail[..end],
    })
}

/// First argument after the declared name, e.g. `, 0, @isnumeric)` → `0`.
fn default_argument(rest: &str) -> Option<String> {
    let after_comma = rest.trim_start().strip_prefix(',')?;
    split_top_level_args(after_comma)
        .into_iter()
        .next()
        .filter(|arg| !arg.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const METHOD_FORM: &str = r#"
    persistent parser
    if isempty(parser)
        parser = inputParser;
        parser.FunctionName = 'makeTrapezoid';
        parser.addRequired('channel', @(x) any(validatestring(x, {'x','y','z'})));
        parser.addOptional('system', [], @isstruct);
        parser.addParamValue('duration', 0, @isnumeric);
        parser.addParameter('maxGrad', 0, @isnumeric);
    end
    parse(parser, channel, varargin{:});
    opt = parser.Results;
"#;

    #[test]
    fn block_runs_to_parse_call() {
        let block = find_block(METHOD_FORM).unwrap();
        assert_eq!(block.var, "parser");
        assert!(block.text.starts_with("parser = inputParser"));
        assert!(block.text.ends_with("parse(parser, channel, varargin{:})"));
    }

    #[test]
    fn declarations_in_order() {
        let block = find_block(METHOD_FORM).unwrap();
        let decls = block.declarations();
        let summary: Vec<_> = decls
            .iter()
            .map(|d| (d.kind, d.name.as_str(), d.default.as_deref()))
            .collect();
        assert_eq!(
            summary,
            [
                (DeclKind::Required, "channel", None),
                (DeclKind::Optional, "system", Some("[]")),
                (DeclKind::Parameter, "duration", Some("0")),
                (DeclKind::Parameter, "maxGrad", Some("0")),
            ]
        );
    }

    #[test]
    fn function_form_and_method_parse() {
        let body = r#"
    p = inputParser;
    addRequired(p, 'flip', @isnumeric);
    addOptional(p, 'system', mr.opts(), @isstruct);
    addParameter(p, 'use', 'u', @ischar);
    p.parse(flip, varargin{:});
"#;
        let block = find_block(body).unwrap();
        assert!(block.text.ends_with("p.parse(flip, varargin{:})"));
        assert_eq!(block.required_names(), ["flip"]);
        let decls = block.declarations();
        assert_eq!(decls[1].default.as_deref(), Some("mr.opts()"));
        assert_eq!(decls[2].default.as_deref(), Some("'u'"));
    }

    #[test]
    fn without_parse_ends_at_last_add() {
        let body = "ip = inputParser;\nip.addRequired('a');\nip.addOptional('b', 2);\nx = 1;\n";
        let block = find_block(body).unwrap();
        assert!(block.text.ends_with("ip.addOptional('b', 2);"));
    }

    #[test]
    fn no_initializer() {
        assert!(find_block("x = 1;\nparse(p, varargin{:});").is_none());
    }

    #[test]
    fn initializer_without_declarations() {
        assert!(find_block("p = inputParser;\nx = 1;").is_none());
    }

    #[test]
    fn missing_default_is_unknown() {
        let block = find_block("p = inputParser;\np.addOptional('b');\n").unwrap();
        assert_eq!(block.declarations()[0].default.as_deref(), Some(UNKNOWN_DEFAULT));
    }
}
