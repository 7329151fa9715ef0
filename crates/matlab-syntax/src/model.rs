//! Data model for extracted API records: format-agnostic.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default text recorded when a parameter's default value could not be recovered.
pub const UNKNOWN_DEFAULT: &str = "N/A";

/// Everything extracted from a single source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileParseResult {
    pub file_info: FileInfo,
    pub main_function: Option<FunctionRecord>,
    pub helper_functions: Vec<FunctionRecord>,
    pub internal_functions: Vec<FunctionRecord>,
}

impl FileParseResult {
    /// Iterate main, helper and internal records in that order.
    pub fn records(&self) -> impl Iterator<Item = &FunctionRecord> {
        self.main_function
            .iter()
            .chain(self.helper_functions.iter())
            .chain(self.internal_functions.iter())
    }
}

/// File-level context shared by every record of a file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub path: String,
    /// File name with extension, e.g. `makeTrapezoid.m`
    pub name: String,
    /// File stem; the function expected to be the file's main entry point
    pub expected_main: String,
    pub namespace: Option<String>,
    pub class_info: Option<ClassInfo>,
    pub is_classdef: bool,
    /// Structural ambiguities resolved by fallback policy
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// One extracted function, method, constructor or class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionRecord {
    pub name: String,
    pub signature: String,
    pub namespace: Option<String>,
    pub class_info: Option<ClassInfo>,
    pub parameters: Parameters,
    pub returns: Vec<ReturnValue>,
    pub visibility: Visibility,
    pub function_type: FunctionType,
    /// `None` for file-local functions that follow a class body
    pub calling_pattern: Option<String>,
    pub uses_nargin_pattern: bool,
    pub help_text: String,
    pub line_number: usize,
    pub parent_file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_warning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_metadata: Option<ClassMetadata>,
    /// Leading slice of the function body, kept for prompting only.
    #[serde(skip)]
    pub body_excerpt: String,
}

/// Class membership of a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassInfo {
    pub class_name: String,
    pub is_class_method: bool,
    pub is_constructor: bool,
    pub instance_variable: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameters {
    pub required: Vec<RequiredParam>,
    pub optional: Vec<OptionalParam>,
    /// Signature name → name declared in the validation block, when they differ
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inputparser_mapping: BTreeMap<String, String>,
    /// Required count recovered from argument-count guards
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nargin_detection: Option<usize>,
}

impl Parameters {
    pub fn contains(&self, name: &str) -> bool {
        self.required.iter().any(|p| p.name == name) || self.optional.iter().any(|p| p.name == name)
    }

    /// All parameter names, required first.
    pub fn names(&self) -> Vec<&str> {
        self.required
            .iter()
            .map(|p| p.name.as_str())
            .chain(self.optional.iter().map(|p| p.name.as_str()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequiredParam {
    pub name: String,
    pub position: usize,
    pub provenance: Provenance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionalParam {
    pub name: String,
    pub default: String,
    pub provenance: Provenance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
}

/// Which detection rule produced a parameter classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provenance {
    #[serde(rename = "signature")]
    Signature,
    #[serde(rename = "signature_with_nargin_check")]
    SignatureWithNarginCheck,
    #[serde(rename = "inputParser.addRequired")]
    AddRequired,
    #[serde(rename = "inputParser.addOptional")]
    AddOptional,
    #[serde(rename = "inputParser.addParameter")]
    AddParameter,
    #[serde(rename = "nargin_check")]
    NarginCheck,
    #[serde(rename = "varargin_case")]
    VararginCase,
}

impl Provenance {
    pub fn as_str(self) -> &'static str {
        match self {
            Provenance::Signature => "signature",
            Provenance::SignatureWithNarginCheck => "signature_with_nargin_check",
            Provenance::AddRequired => "inputParser.addRequired",
            Provenance::AddOptional => "inputParser.addOptional",
            Provenance::AddParameter => "inputParser.addParameter",
            Provenance::NarginCheck => "nargin_check",
            Provenance::VararginCase => "varargin_case",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnValue {
    pub name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionType {
    Main,
    Helper,
    Internal,
    Class,
    Constructor,
    Method,
}

impl FunctionType {
    pub fn as_str(self) -> &'static str {
        match self {
            FunctionType::Main => "main",
            FunctionType::Helper => "helper",
            FunctionType::Internal => "internal",
            FunctionType::Class => "class",
            FunctionType::Constructor => "constructor",
            FunctionType::Method => "method",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "main" => Some(FunctionType::Main),
            "helper" => Some(FunctionType::Helper),
            "internal" => Some(FunctionType::Internal),
            "class" => Some(FunctionType::Class),
            "constructor" => Some(FunctionType::Constructor),
            "method" => Some(FunctionType::Method),
            _ => None,
        }
    }
}

/// Class-level details attached to the record of a classdef.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassMetadata {
    pub properties: ClassProperties,
    pub parent_class: Option<String>,
    pub methods: Vec<String>,
}

/// Declared properties bucketed by access level, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassProperties {
    pub public: Vec<Property>,
    pub private: Vec<Property>,
    pub protected: Vec<Property>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub default: Option<String>,
    pub description: String,
}
