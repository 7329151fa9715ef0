//! Path classifier: namespace and class context from folder conventions.
//!
//! MATLAB encodes packages as `+name` folders and classes as `@Name` folders:
//!
//! - `matlab/+mr/makeTrapezoid.m` → namespace `mr`
//! - `matlab/+mr/+aux/+quat/multiply.m` → namespace `mr.aux.quat`
//! - `matlab/+mr/@Sequence/write.m` → namespace `mr`, method of `Sequence`

use crate::model::ClassInfo;

/// Prefix marking a package folder.
pub const PACKAGE_MARKER: char = '+';
/// Prefix marking a class folder.
pub const CLASS_MARKER: char = '@';
/// Folder name whose functions are only callable from the parent folder.
const PRIVATE_DIR: &str = "private";

/// Context derived from a file path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathContext {
    pub namespace: Option<String>,
    pub class_info: Option<ClassInfo>,
    /// File lives under a `private/` folder
    pub is_private: bool,
}

/// Classify a path string (either separator style).
pub fn classify(path: &str) -> PathContext {
    PathContext {
        namespace: namespace_from_path(path),
        class_info: class_info_from_path(path),
        is_private: segments(path).any(|s| s == PRIVATE_DIR),
    }
}

/// Dotted package path; collection stops at the first class folder.
pub fn namespace_from_path(path: &str) -> Option<String> {
    let mut parts = Vec::new();
    for segment in segments(path) {
        if let Some(name) = segment.strip_prefix(PACKAGE_MARKER) {
            parts.push(name);
        } else if segment.starts_with(CLASS_MARKER) {
            break;
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("."))
    }
}

/// Class membership from the first `@Class` folder in the path.
pub fn class_info_from_path(path: &str) -> Option<ClassInfo> {
    let class_name = segments(path).find_map(|s| s.strip_prefix(CLASS_MARKER))?;
    let is_constructor = file_stem(path) == class_name;
    Some(ClassInfo {
        class_name: class_name.to_string(),
        is_class_method: !is_constructor,
        is_constructor,
        instance_variable: instance_variable(class_name),
    })
}

/// Variable name used in synthesized calling patterns for a class.
///
/// Lowercased first three characters of the class name (`Sequence` → `seq`).
/// This is a naming habit of the Pulseq codebase, not a MATLAB rule.
pub fn instance_variable(class_name: &str) -> String {
    class_name.to_lowercase().chars().take(3).collect()
}

/// File name without directories.
pub fn file_name(path: &str) -> &str {
    segments(path).last().unwrap_or(path)
}

/// File name without directories and without its last extension.
pub fn file_stem(path: &str) -> &str {
    let name = file_name(path);
    match name.rfind('.') {
        Some(0) | None => name,
        Some(dot) => &name[..dot],
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(['/', '\\']).filter(|s| !s.is_empty())
}
