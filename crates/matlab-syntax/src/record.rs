//! Function record builder: one normalized record per located function.

use crate::locate::FunctionSpan;
use crate::model::*;
use crate::params;
use crate::text::truncate_chars;

/// Body text kept on a record for prompting.
pub const BODY_EXCERPT_LIMIT: usize = 5000;

/// Prefix conventionally marking a function as not part of the public API.
const PRIVATE_NAME_PREFIX: char = '_';

/// Caller context for building records of one file or class.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildContext<'a> {
    pub expected_main: &'a str,
    pub parent_file: &'a str,
    pub namespace: Option<&'a str>,
    pub class_info: Option<&'a ClassInfo>,
    /// Visibility forced by location (private folder, private methods block)
    pub forced_private: bool,
}

/// Build the record for `span`, whose body is `body`.
///
/// `function_type` starts as `helper`; the file driver assigns the final type.
pub fn build(span: &FunctionSpan, body: &str, ctx: &BuildContext<'_>) -> FunctionRecord {
    let help_text = help_text(body, &span.full_signature);
    let resolution = params::resolve(&span.inputs_text, body);
    let visibility = determine_visibility(&span.name, &help_text, ctx.expected_main, ctx.forced_private);

    FunctionRecord {
        name: span.name.clone(),
        signature: span.full_signature.clone(),
        namespace: ctx.namespace.map(str::to_string),
        class_info: ctx.class_info.cloned(),
        parameters: resolution.parameters,
        returns: parse_returns(span.outputs_text.as_deref()),
        visibility,
        function_type: FunctionType::Helper,
        calling_pattern: Some(calling_pattern(&span.name, ctx.namespace, ctx.class_info)),
        uses_nargin_pattern: resolution.uses_nargin_pattern,
        help_text,
        line_number: span.line_number,
        parent_file: ctx.parent_file.to_string(),
        extraction_warning: None,
        class_metadata: None,
        body_excerpt: truncate_chars(body, BODY_EXCERPT_LIMIT).to_string(),
    }
}

/// Invocation string for documentation and search.
///
/// | class info   | pattern                                  |
/// |--------------|------------------------------------------|
/// | constructor  | `seq = mr.Sequence(...)`                 |
/// | class method | `seq.write(...)`                         |
/// | plain        | `mr.makeTrapezoid(...)` / `name(...)`    |
pub fn calling_pattern(name: &str, namespace: Option<&str>, class_info: Option<&ClassInfo>) -> String {
    match class_info {
        Some(info) if info.is_constructor => match namespace {
            Some(ns) => format!("{} = {}.{}(...)", info.instance_variable, ns, info.class_name),
            None => format!("{} = {}(...)", info.instance_variable, info.class_name),
        },
        Some(info) if info.is_class_method => format!("{}.{}(...)", info.instance_variable, name),
        _ => match namespace {
            Some(ns) => format!("{}.{}(...)", ns, name),
            None => format!("{}(...)", name),
        },
    }
}

/// Comment block following the declaration.
///
/// Blank lines before the block are skipped; the first code line ends it.
/// `%{ ... %}` block comments are included verbatim.
pub fn help_text(body: &str, signature: &str) -> String {
    let signature_lines = signature.matches('\n').count() + 1;
    let mut help = Vec::new();
    let mut in_help = false;
    let mut in_block = false;

    for line in body.split('\n').skip(signature_lines) {
        let trimmed = line.trim();
        if in_block {
            if trimmed == "%}" {
                in_block = false;
            } else {
                help.push(trimmed.to_string());
            }
            continue;
        }
        if trimmed == "%{" {
            in_block = true;
            in_help = true;
        } else if let Some(comment) = trimmed.strip_prefix('%') {
            in_help = true;
            help.push(comment.trim().to_string());
        } else if trimmed.is_empty() && !in_help {
            continue;
        } else {
            break;
        }
    }

    help.join("\n")
}

/// Output names from `[a, b]`, `[a b]` or `out`.
pub fn parse_returns(outputs: Option<&str>) -> Vec<ReturnValue> {
    let Some(outputs) = outputs else {
        return Vec::new();
    };
    let inner = outputs
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']');

    inner
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != "...")
        .map(|name| ReturnValue {
            name: name.to_string(),
        })
        .collect()
}

/// `private` when forced by location, marked private/internal in the help
/// text, or named with the private prefix. The file's main function is
/// otherwise always public.
pub fn determine_visibility(name: &str, help_text: &str, expected_main: &str, forced_private: bool) -> Visibility {
    if forced_private {
        return Visibility::Private;
    }
    if name == expected_main {
        return Visibility::Public;
    }
    let help = help_text.to_lowercase();
    if help.contains("private") || help.contains("internal") {
        return Visibility::Private;
    }
    if name.starts_with(PRIVATE_NAME_PREFIX) {
        return Visibility::Private;
    }
    Visibility::Public
}
