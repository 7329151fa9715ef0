//! Enrichment: descriptions, types and units from an LLM, merged onto the
//! extracted records.
//!
//! The extracted parameter lists are authoritative. Reply entries are matched
//! by exact name; anything the model invents is dropped and anything it leaves
//! out keeps a placeholder description.

use crate::prompt;
use anyhow::{Context, Result};
use matlab_syntax::{
    ClassMetadata, FileInfo, FileParseResult, FunctionRecord, FunctionType, Visibility, UNKNOWN_DEFAULT,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;

const DEFAULT_TYPE: &str = "double";
const DEFAULT_UNITS: &str = "none";

/// Text generation backend.
pub trait LlmClient {
    fn generate(&self, prompt: &str) -> Result<String>;
}

/// `generateContent` endpoint of the Gemini API.
pub struct GeminiClient {
    agent: ureq::Agent,
    url: String,
}

impl GeminiClient {
    pub fn new(api_base: &str, model: &str, api_key: &str) -> Self {
        let model = model.strip_prefix("models/").unwrap_or(model);
        GeminiClient {
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(120))
                .build(),
            url: format!(
                "{}/v1beta/models/{}:generateContent?key={}",
                api_base.trim_end_matches('/'),
                model,
                api_key
            ),
        }
    }
}

impl LlmClient for GeminiClient {
    fn generate(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": 0.1 },
        });
        let response: Value = self
            .agent
            .post(&self.url)
            .send_json(body)
            .context("generateContent request failed")?
            .into_json()
            .context("generateContent response is not JSON")?;

        response
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .map(str::to_string)
            .context("generateContent response carries no text")
    }
}

/// Position of a record within its file, which decides the prompt context.
#[derive(Debug, Clone, Copy)]
pub enum Role<'a> {
    Main { related: &'a [String] },
    Helper { parent: Option<&'a str> },
    Internal,
}

impl Role<'_> {
    fn label(&self) -> &'static str {
        match self {
            Role::Main { .. } => "Main",
            Role::Helper { .. } => "Helper",
            Role::Internal => "Internal",
        }
    }
}

/// How a record's descriptive fields were obtained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentSource {
    Llm,
    #[default]
    Fallback,
    Minimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedParam {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub units: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_values: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedParameters {
    pub required: Vec<EnrichedParam>,
    pub optional: Vec<EnrichedParam>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inputparser_mapping: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nargin_detection: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedReturn {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
}

/// A function record with documentation attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedRecord {
    pub name: String,
    pub function_type: FunctionType,
    pub description: String,
    pub signature: String,
    pub namespace: Option<String>,
    pub class_name: Option<String>,
    pub is_class_method: bool,
    pub is_constructor: bool,
    pub instance_variable: Option<String>,
    pub calling_pattern: Option<String>,
    pub visibility: Visibility,
    pub parent_file: String,
    pub line_number: usize,
    pub uses_nargin_pattern: bool,
    pub parameters: EnrichedParameters,
    pub returns: Vec<EnrichedReturn>,
    pub usage_examples: Vec<String>,
    pub related_functions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_metadata: Option<ClassMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_warning: Option<String>,
    #[serde(default)]
    pub enrichment: EnrichmentSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedFile {
    pub file_info: FileInfo,
    pub main_function: Option<EnrichedRecord>,
    pub helper_functions: Vec<EnrichedRecord>,
    pub internal_functions: Vec<EnrichedRecord>,
}

pub struct Enricher<'a> {
    llm: Option<&'a dyn LlmClient>,
}

impl<'a> Enricher<'a> {
    /// Without a client every record gets the fallback enrichment.
    pub fn new(llm: Option<&'a dyn LlmClient>) -> Self {
        Enricher { llm }
    }

    pub fn enrich_file(&self, parsed: &FileParseResult) -> EnrichedFile {
        let related: Vec<String> = parsed
            .helper_functions
            .iter()
            .map(|h| h.name.clone())
            .collect();
        let parent = parsed.main_function.as_ref().map(|m| m.name.as_str());

        EnrichedFile {
            file_info: parsed.file_info.clone(),
            main_function: parsed
                .main_function
                .as_ref()
                .map(|m| self.enrich(m, Role::Main { related: &related })),
            helper_functions: parsed
                .helper_functions
                .iter()
                .map(|h| self.enrich(h, Role::Helper { parent }))
                .collect(),
            internal_functions: parsed
                .internal_functions
                .iter()
                .map(|i| self.enrich(i, Role::Internal))
                .collect(),
        }
    }

    /// Enrich one record. Internal functions never reach the LLM.
    pub fn enrich(&self, record: &FunctionRecord, role: Role<'_>) -> EnrichedRecord {
        if matches!(role, Role::Internal) {
            return minimal(record);
        }
        let Some(llm) = self.llm else {
            return fallback(record, role);
        };

        let reply = match llm.generate(&prompt::build(record, &role)) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(function = %record.name, "enrichment failed: {:#}", e);
                return fallback(record, role);
            }
        };
        let parsed = extract_json(&reply).and_then(|json| serde_json::from_str::<Value>(&json).ok());
        match parsed {
            Some(value) if value.is_object() => merge(record, role, &value),
            _ => {
                tracing::warn!(function = %record.name, "enrichment reply holds no JSON object");
                fallback(record, role)
            }
        }
    }
}

/// Recover the first JSON object of an LLM reply, ignoring code fences and
/// surrounding prose.
pub fn extract_json(reply: &str) -> Option<String> {
    let text = reply.replace("```json", "").replace("```", "");
    let start = text.find('{')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..start + i + 1].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

/// Record built from extracted data only: first help line as description,
/// placeholder type and units.
pub fn fallback(record: &FunctionRecord, role: Role<'_>) -> EnrichedRecord {
    let description = first_help_line(record).unwrap_or_else(|| format!("{} function", role.label()));
    let mut enriched = base(record, description, EnrichmentSource::Fallback);
    match role {
        Role::Main { related } => enriched.related_functions = related.to_vec(),
        Role::Helper { parent: Some(parent) } => enriched.related_functions = vec![parent.to_string()],
        _ => {}
    }
    enriched
}

/// Cheap enrichment for file-local functions.
pub fn minimal(record: &FunctionRecord) -> EnrichedRecord {
    let description = first_help_line(record).unwrap_or_else(|| "Internal function".to_string());
    base(record, description, EnrichmentSource::Minimal)
}

fn first_help_line(record: &FunctionRecord) -> Option<String> {
    record
        .help_text
        .lines()
        .next()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
}

fn placeholder(name: &str, default: Option<&str>) -> EnrichedParam {
    EnrichedParam {
        name: name.to_string(),
        kind: DEFAULT_TYPE.to_string(),
        units: DEFAULT_UNITS.to_string(),
        description: format!("Parameter {}", name),
        default: default.map(str::to_string),
        valid_values: None,
        example: None,
    }
}

fn base(record: &FunctionRecord, description: String, source: EnrichmentSource) -> EnrichedRecord {
    let params = &record.parameters;
    let class = record.class_info.as_ref();
    EnrichedRecord {
        name: record.name.clone(),
        function_type: record.function_type,
        description,
        signature: record.signature.clone(),
        namespace: record.namespace.clone(),
        class_name: class.map(|c| c.class_name.clone()),
        is_class_method: class.is_some_and(|c| c.is_class_method),
        is_constructor: class.is_some_and(|c| c.is_constructor),
        instance_variable: class.map(|c| c.instance_variable.clone()),
        calling_pattern: record.calling_pattern.clone(),
        visibility: record.visibility,
        parent_file: record.parent_file.clone(),
        line_number: record.line_number,
        uses_nargin_pattern: record.uses_nargin_pattern,
        parameters: EnrichedParameters {
            required: params.required.iter().map(|p| placeholder(&p.name, None)).collect(),
            optional: params
                .optional
                .iter()
                .map(|p| placeholder(&p.name, Some(&p.default)))
                .collect(),
            inputparser_mapping: params.inputparser_mapping.clone(),
            nargin_detection: params.nargin_detection,
        },
        returns: record
            .returns
            .iter()
            .map(|r| EnrichedReturn {
                name: r.name.clone(),
                kind: String::new(),
                description: String::new(),
            })
            .collect(),
        usage_examples: Vec::new(),
        related_functions: Vec::new(),
        class_metadata: record.class_metadata.clone(),
        extraction_warning: record.extraction_warning.clone(),
        enrichment: source,
    }
}

/// Scalar or list JSON value as display text; `None` for null or empty.
fn value_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items.iter().filter_map(value_text).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

fn field(entry: &Value, key: &str) -> Option<String> {
    entry.get(key).and_then(value_text)
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(value_text).collect())
        .unwrap_or_default()
}

fn merge(record: &FunctionRecord, role: Role<'_>, reply: &Value) -> EnrichedRecord {
    let mut enriched = fallback(record, role);
    enriched.enrichment = EnrichmentSource::Llm;
    if let Some(description) = field(reply, "description") {
        enriched.description = description;
    }

    let described: Vec<&Value> = ["required", "optional"]
        .iter()
        .filter_map(|list| reply.pointer(&format!("/parameters/{}", list)))
        .filter_map(Value::as_array)
        .flatten()
        .collect();
    let entry_for = |name: &str| {
        described
            .iter()
            .find(|e| e.get("name").and_then(Value::as_str) == Some(name))
    };

    let params = &mut enriched.parameters;
    for param in params.required.iter_mut().chain(params.optional.iter_mut()) {
        let Some(entry) = entry_for(&param.name) else {
            tracing::debug!(function = %record.name, parameter = %param.name, "parameter not described by enrichment");
            continue;
        };
        if let Some(kind) = field(entry, "type") {
            param.kind = kind;
        }
        if let Some(units) = field(entry, "units") {
            param.units = units;
        }
        if let Some(description) = field(entry, "description") {
            param.description = description;
        }
        param.valid_values = field(entry, "valid_values");
        param.example = field(entry, "example");
        if param.default.as_deref() == Some(UNKNOWN_DEFAULT) {
            if let Some(default) = field(entry, "default") {
                param.default = Some(default);
            }
        }
    }

    for entry in &described {
        if let Some(name) = entry.get("name").and_then(Value::as_str) {
            if !record.parameters.contains(name) {
                tracing::warn!(function = %record.name, parameter = %name, "ignoring parameter not present in the source");
            }
        }
    }

    if let Some(returns) = reply.get("returns").and_then(Value::as_array) {
        for ret in &mut enriched.returns {
            let found = returns
                .iter()
                .find(|r| r.get("name").and_then(Value::as_str) == Some(ret.name.as_str()));
            if let Some(entry) = found {
                ret.kind = field(entry, "type").unwrap_or_default();
                ret.description = field(entry, "description").unwrap_or_default();
            }
        }
    }

    enriched.usage_examples = string_list(reply.get("usage_examples"));
    let related = string_list(reply.get("related_functions"));
    if !related.is_empty() {
        enriched.related_functions = related;
    }
    enriched
}
