//! Classdef analyzer: class header, block structure, properties and methods.
//!
//! Block structure is recovered by counting keywords line by line. Blank and
//! comment-only lines never change any counter.

use crate::locate::{find_functions, FunctionSpan};
use crate::model::*;
use crate::path::instance_variable;
use crate::record::{self, BuildContext};
use crate::text::{is_comment_or_blank, line_start_offset, truncate_chars};
use regex::Regex;
use std::sync::LazyLock;

static RE_CLASSDEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*classdef\b\s*(?:\([^)]*\)\s*)?(\w+)(?:\s*<\s*([\w.]+))?").unwrap()
});

static RE_CLASSDEF_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*classdef\b").unwrap());

static RE_MAIN_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(properties|methods|events|enumeration)\b(.*)$").unwrap()
});

static RE_SUB_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:function|if|for|while|switch|try|parfor)\b").unwrap()
});

static RE_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*end\b").unwrap());

static RE_BLOCK_ATTRIBUTES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\(([^)]*)\)").unwrap());

static RE_PROPERTIES_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*properties\s*(?:\(([^)]*)\))?\s*(?:%.*)?$").unwrap()
});

static RE_PROPERTY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\w+)(?:\s*=\s*([^;%]+))?").unwrap());

// Nesting heuristic inside methods blocks
static RE_FUNCTION_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*function\s+").unwrap());

static RE_BARE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*end\s*(?:%.*)?$").unwrap());

/// Structure of a classdef file.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassdefInfo {
    pub class_name: String,
    pub parent_class: Option<String>,
    /// 0-based line of the `classdef` header
    pub header_line: usize,
    pub properties: ClassProperties,
    pub methods_blocks: Vec<MethodsBlock>,
    /// 0-based line of the `end` closing the classdef
    pub classdef_end_line: Option<usize>,
}

/// A `methods ... end` block, as 0-based inclusive line indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodsBlock {
    pub start_line: usize,
    pub end_line: usize,
    /// Text between the parentheses of `methods (...)`
    pub attributes: Option<String>,
}

impl MethodsBlock {
    /// `Access = private` / `protected` blocks are not part of the public API.
    pub fn is_restricted(&self) -> bool {
        self.attributes.as_deref().is_some_and(|a| {
            let a = a.to_lowercase();
            a.contains("private") || a.contains("protected")
        })
    }
}

/// Detect a classdef header and analyze the file's block structure.
pub fn detect(text: &str) -> Option<ClassdefInfo> {
    let caps = RE_CLASSDEF.captures(text)?;
    let header_line = text[..caps.get(0)?.start()].matches('\n').count();
    let (methods_blocks, classdef_end_line) = block_spans(text);

    Some(ClassdefInfo {
        class_name: caps[1].to_string(),
        parent_class: caps.get(2).map(|m| m.as_str().to_string()),
        header_line,
        properties: extract_properties(text),
        methods_blocks,
        classdef_end_line,
    })
}

/// `properties = ...` inside a method body is an assignment, not a block.
fn main_block_keyword(line: &str) -> Option<(String, String)> {
    let caps = RE_MAIN_BLOCK.captures(line)?;
    let rest = caps[2].to_string();
    let after = rest.trim_start();
    if after.starts_with('=') && !after.starts_with("==") {
        return None;
    }
    Some((caps[1].to_string(), rest))
}

/// Walk the file counting main blocks (classdef/properties/methods/events/
/// enumeration) and, inside a methods block, its own sub-blocks.
fn block_spans(text: &str) -> (Vec<MethodsBlock>, Option<usize>) {
    let mut blocks = Vec::new();
    let mut main_blocks = 0usize;
    let mut current: Option<(usize, Option<String>)> = None;
    let mut depth = 0usize;

    for (i, line) in text.split('\n').enumerate() {
        if is_comment_or_blank(line) {
            continue;
        }

        if RE_CLASSDEF_LINE.is_match(line) {
            main_blocks = 1;
        } else if let Some((keyword, rest)) = main_block_keyword(line) {
            if main_blocks > 0 {
                main_blocks += 1;
                if keyword == "methods" && current.is_none() {
                    let attributes = RE_BLOCK_ATTRIBUTES
                        .captures(&rest)
                        .map(|c| c[1].trim().to_string());
                    current = Some((i, attributes));
                    depth = 1;
                }
            }
        } else if let Some((start_line, attributes)) = current.take() {
            if RE_SUB_BLOCK.is_match(line) {
                depth += 1;
            } else if RE_END.is_match(line) {
                depth -= 1;
                if depth == 0 {
                    blocks.push(MethodsBlock {
                        start_line,
                        end_line: i,
                        attributes,
                    });
                    main_blocks = main_blocks.saturating_sub(1);
                    continue;
                }
            }
            current = Some((start_line, attributes));
        } else if RE_END.is_match(line) && main_blocks > 0 {
            main_blocks -= 1;
            if main_blocks == 0 {
                return (blocks, Some(i));
            }
        }
    }

    (blocks, None)
}

/// Simple `name = default % description` lines of every properties block.
pub fn extract_properties(text: &str) -> ClassProperties {
    let mut properties = ClassProperties::default();
    let mut access: Option<&str> = None;

    for line in text.split('\n') {
        if let Some(caps) = RE_PROPERTIES_HEADER.captures(line) {
            let attributes = caps.get(1).map(|m| m.as_str().to_lowercase()).unwrap_or_default();
            access = Some(if attributes.contains("private") {
                "private"
            } else if attributes.contains("protected") {
                "protected"
            } else {
                "public"
            });
            continue;
        }

        let Some(bucket) = access else {
            continue;
        };
        if RE_END.is_match(line) {
            access = None;
            continue;
        }
        let Some(caps) = RE_PROPERTY.captures(line) else {
            continue;
        };

        let property = Property {
            name: caps[1].to_string(),
            default: caps.get(2).map(|m| m.as_str().trim().to_string()),
            description: line
                .split_once('%')
                .map(|(_, comment)| comment.trim().to_string())
                .unwrap_or_default(),
        };
        let list = match bucket {
            "private" => &mut properties.private,
            "protected" => &mut properties.protected,
            _ => &mut properties.public,
        };
        match list.iter_mut().find(|p| p.name == property.name) {
            Some(existing) => *existing = property,
            None => list.push(property),
        }
    }

    properties
}

/// True when the function starting at `start` in `block_text` sits inside the
/// body of an earlier function.
///
/// Counts `function` keywords up and bare `end` lines down. An `end` closing
/// an `if`/`for`/... also counts down, so deeply nested control flow can
/// misclassify; this is a known approximation.
pub fn is_nested(block_text: &str, start: usize) -> bool {
    let mut depth = 0usize;
    for line in block_text[..start].split('\n') {
        if RE_FUNCTION_KEYWORD.is_match(line) {
            depth += 1;
        } else if RE_BARE_END.is_match(line) && depth > 0 {
            depth -= 1;
        }
    }
    depth > 0
}

/// Comment lines directly below the classdef header.
pub fn class_help(text: &str, header_line: usize) -> String {
    text.split('\n')
        .skip(header_line + 1)
        .map(str::trim)
        .take_while(|line| line.starts_with('%'))
        .map(|line| line.trim_start_matches('%').trim().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Methods of one block that are not nested in another function, with
/// offsets rebased onto the whole file and ends clipped to the next method.
fn block_methods(text: &str, block: &MethodsBlock) -> Vec<FunctionSpan> {
    let from = line_start_offset(text, block.start_line);
    let to = text[from..]
        .split('\n')
        .take(block.end_line - block.start_line + 1)
        .map(|l| l.len() + 1)
        .sum::<usize>()
        .min(text.len() - from);
    let block_text = &text[from..from + to];

    let mut methods: Vec<FunctionSpan> = find_functions(block_text, true)
        .into_iter()
        .filter(|span| !is_nested(block_text, span.start_offset))
        .collect();

    let next_starts: Vec<usize> = methods
        .iter()
        .skip(1)
        .map(|m| m.start_offset)
        .chain(std::iter::once(block_text.len()))
        .collect();
    for (method, end) in methods.iter_mut().zip(next_starts) {
        method.end_offset = end;
        method.rebase(from, block.start_line);
    }
    methods
}

/// Assemble the parse result of a classdef file: the class itself as main,
/// its methods as helpers, and functions after the class body as internal.
pub fn assemble(text: &str, mut file_info: FileInfo, info: &ClassdefInfo, private_dir: bool) -> FileParseResult {
    file_info.is_classdef = true;
    let namespace = file_info.namespace.clone();
    let parent_file = file_info.name.clone();
    let iv = instance_variable(&info.class_name);

    let constructor_info = ClassInfo {
        class_name: info.class_name.clone(),
        is_class_method: false,
        is_constructor: true,
        instance_variable: iv.clone(),
    };
    let method_info = ClassInfo {
        is_class_method: true,
        is_constructor: false,
        ..constructor_info.clone()
    };

    let mut methods = Vec::new();
    for block in &info.methods_blocks {
        for span in block_methods(text, block) {
            let is_constructor = span.name == info.class_name;
            let class_info = if is_constructor { &constructor_info } else { &method_info };
            let ctx = BuildContext {
                expected_main: &info.class_name,
                parent_file: &parent_file,
                namespace: namespace.as_deref(),
                class_info: Some(class_info),
                forced_private: private_dir || block.is_restricted(),
            };
            let mut record = record::build(&span, span.body(text), &ctx);
            record.function_type = if is_constructor {
                FunctionType::Constructor
            } else {
                FunctionType::Method
            };
            methods.push(record);
        }
    }

    let constructor = methods.iter().find(|m| m.function_type == FunctionType::Constructor);
    let mut signature = format!("classdef {}", info.class_name);
    if let Some(parent) = &info.parent_class {
        signature.push_str(&format!(" < {}", parent));
    }

    let class_record = FunctionRecord {
        name: info.class_name.clone(),
        signature,
        namespace: namespace.clone(),
        class_info: Some(ClassInfo {
            is_constructor: false,
            ..constructor_info.clone()
        }),
        parameters: constructor.map(|c| c.parameters.clone()).unwrap_or_default(),
        returns: Vec::new(),
        visibility: Visibility::Public,
        function_type: FunctionType::Class,
        calling_pattern: Some(record::calling_pattern(
            &info.class_name,
            namespace.as_deref(),
            Some(&constructor_info),
        )),
        uses_nargin_pattern: constructor.is_some_and(|c| c.uses_nargin_pattern),
        help_text: class_help(text, info.header_line),
        line_number: info.header_line + 1,
        parent_file: parent_file.clone(),
        extraction_warning: None,
        class_metadata: Some(ClassMetadata {
            properties: info.properties.clone(),
            parent_class: info.parent_class.clone(),
            methods: methods.iter().map(|m| m.name.clone()).collect(),
        }),
        body_excerpt: truncate_chars(text, record::BODY_EXCERPT_LIMIT).to_string(),
    };

    let internal = match info.classdef_end_line {
        Some(end_line) => trailing_functions(text, end_line, &file_info, private_dir),
        None => {
            let warning = format!("end of classdef '{}' not found", info.class_name);
            tracing::warn!(file = %file_info.path, "{}", warning);
            file_info.warnings.push(warning);
            Vec::new()
        }
    };

    FileParseResult {
        file_info,
        main_function: Some(class_record),
        helper_functions: methods,
        internal_functions: internal,
    }
}

/// File-local functions declared after the classdef's closing `end`.
fn trailing_functions(text: &str, end_line: usize, file_info: &FileInfo, private_dir: bool) -> Vec<FunctionRecord> {
    let from = line_start_offset(text, end_line + 1).min(text.len());
    let tail = &text[from..];
    let ctx = BuildContext {
        expected_main: &file_info.expected_main,
        parent_file: &file_info.name,
        namespace: file_info.namespace.as_deref(),
        class_info: None,
        forced_private: private_dir,
    };

    find_functions(tail, false)
        .into_iter()
        .map(|mut span| {
            let body = span.body(tail);
            span.rebase(from, end_line + 1);
            let mut record = record::build(&span, body, &ctx);
            record.function_type = FunctionType::Internal;
            record.calling_pattern = None;
            record
        })
        .collect()
}
