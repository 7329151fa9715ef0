//! File extraction driver: one `FileParseResult` per source file.

use crate::classdef;
use crate::error::ExtractError;
use crate::locate::find_functions;
use crate::model::*;
use crate::path;
use crate::record::{self, BuildContext};
use std::path::Path;

/// Extraction warning set on a main function chosen by position.
pub const FIRST_FUNCTION_AS_MAIN: &str = "Used first function as main";

/// Parse MATLAB source `text` found at `path`.
///
/// Never fails: ambiguities are resolved by fallback and reported in
/// `FileInfo::warnings`.
pub fn parse_source(path: &str, text: &str) -> FileParseResult {
    let ctx = path::classify(path);
    let file_info = FileInfo {
        path: path.to_string(),
        name: path::file_name(path).to_string(),
        expected_main: path::file_stem(path).to_string(),
        namespace: ctx.namespace.clone(),
        class_info: ctx.class_info.clone(),
        is_classdef: false,
        warnings: Vec::new(),
    };

    if let Some(info) = classdef::detect(text) {
        tracing::debug!(file = %path, class = %info.class_name, "classdef file");
        return classdef::assemble(text, file_info, &info, ctx.is_private);
    }

    parse_functions(text, file_info, &ctx)
}

/// Read `path` (lossy UTF-8) and parse it.
pub fn parse_path(path: &Path) -> Result<FileParseResult, ExtractError> {
    let bytes = std::fs::read(path).map_err(|source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(parse_source(&path.to_string_lossy(), &text))
}

fn parse_functions(text: &str, mut file_info: FileInfo, ctx: &path::PathContext) -> FileParseResult {
    let build_ctx = BuildContext {
        expected_main: &file_info.expected_main,
        parent_file: &file_info.name,
        namespace: file_info.namespace.as_deref(),
        class_info: file_info.class_info.as_ref(),
        forced_private: ctx.is_private,
    };

    let mut records: Vec<FunctionRecord> = find_functions(text, false)
        .iter()
        .map(|span| record::build(span, span.body(text), &build_ctx))
        .collect();

    let mut main_index = records.iter().position(|r| r.name == file_info.expected_main);
    if main_index.is_none() {
        if let Some(first) = records.first_mut() {
            let warning = format!(
                "no function named '{}'; used first function '{}' as main",
                file_info.expected_main, first.name
            );
            tracing::warn!(file = %file_info.path, "{}", warning);
            first.extraction_warning = Some(FIRST_FUNCTION_AS_MAIN.to_string());
            file_info.warnings.push(warning);
            main_index = Some(0);
        } else {
            file_info.warnings.push("no function definitions found".to_string());
        }
    }

    let mut result = FileParseResult {
        file_info,
        main_function: None,
        helper_functions: Vec::new(),
        internal_functions: Vec::new(),
    };

    for (i, mut record) in records.into_iter().enumerate() {
        if Some(i) == main_index {
            record.function_type = FunctionType::Main;
            result.main_function = Some(record);
        } else if record.visibility == Visibility::Private {
            record.function_type = FunctionType::Internal;
            result.internal_functions.push(record);
        } else {
            result.helper_functions.push(record);
        }
    }

    result
}
