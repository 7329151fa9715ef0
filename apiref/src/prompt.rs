//! Enrichment prompt.

use crate::enrich::Role;
use matlab_syntax::text::truncate_chars;
use matlab_syntax::FunctionRecord;

const HELP_LIMIT: usize = 1000;
const BODY_LIMIT: usize = 3000;

const REPLY_SCHEMA: &str = r#"{
    "description": "Clear, comprehensive description of what this function does",
    "parameters": {
        "required": [
            {
                "name": "exact_param_name",
                "type": "double|string|struct|char|cell",
                "units": "seconds|Hz|Hz/m|radians|meters|none|1/m",
                "description": "What this parameter controls",
                "example": "pi/2 or 'x' or mr.opts()"
            }
        ],
        "optional": [
            {
                "name": "exact_param_name",
                "type": "double|string|struct|char|cell",
                "units": "seconds|Hz|Hz/m|radians|meters|none|1/m",
                "default": "exact_default_value",
                "description": "What this parameter controls",
                "valid_values": "any constraints",
                "example": "0.004 or 'excitation'"
            }
        ]
    },
    "returns": [
        {
            "name": "return_variable_name",
            "type": "struct|double|cell",
            "description": "What this returns"
        }
    ],
    "usage_examples": ["Example call with typical parameters"],
    "related_functions": ["Other functions commonly used with this one"]
}"#;

const RULES: &str = "\
CRITICAL INSTRUCTIONS:
1. PRESERVE EXACT PARAMETER NAMES. The names under EXTRACTED PARAMETERS come from the \
function signature and are the truth: if a parameter is named 'flip', use 'flip', not 'flipAngle'.
2. Do not add, drop or move parameters between the required and optional lists.
3. Enhance descriptions, types, units and examples only.

UNIT CONVENTIONS:
- Gradients use Hz/m (not T/m or mT/m).
- Time uses seconds (not milliseconds or microseconds).
- Angles use radians in code, even if comments mention degrees.
- Gradient areas use 1/m.

Return ONLY valid JSON, no extra text or markdown.";

/// Prompt asking for descriptions, types and units of `record`'s parameters.
pub fn build(record: &FunctionRecord, role: &Role<'_>) -> String {
    let mut out = String::new();
    out.push_str("Analyze this MATLAB function and provide detailed parameter information.\n\n");

    out.push_str("FUNCTION DETAILS:\n");
    out.push_str(&format!("- Name: {}\n", record.name));
    out.push_str(&format!("- Type: {} function\n", record.function_type.as_str()));
    out.push_str(&format!("- Parent File: {}\n", record.parent_file));
    out.push_str(&format!("- Signature: {}\n", record.signature));
    if let Some(pattern) = &record.calling_pattern {
        out.push_str(&format!("- Called as: {}\n", pattern));
    }
    match role {
        Role::Main { related } if !related.is_empty() => {
            out.push_str(&format!("- Related Functions: {}\n", related.join(", ")));
        }
        Role::Helper { parent: Some(parent) } => {
            out.push_str(&format!("- Parent Function: {}\n", parent));
        }
        _ => {}
    }

    let parameters =
        serde_json::to_string_pretty(&record.parameters).unwrap_or_else(|_| "{}".to_string());
    out.push_str("\nEXTRACTED PARAMETERS (PRESERVE THESE EXACT NAMES):\n");
    out.push_str(&parameters);
    out.push('\n');

    out.push_str("\nHELP TEXT:\n");
    if record.help_text.is_empty() {
        out.push_str("No help text available");
    } else {
        out.push_str(truncate_chars(&record.help_text, HELP_LIMIT));
    }
    out.push('\n');

    out.push_str("\nFUNCTION BODY (excerpt):\n");
    if record.body_excerpt.is_empty() {
        out.push_str("No body available");
    } else {
        out.push_str(truncate_chars(&record.body_excerpt, BODY_LIMIT));
    }
    out.push('\n');

    out.push_str("\nProvide a JSON response with:\n");
    out.push_str(REPLY_SCHEMA);
    out.push_str("\n\n");
    out.push_str(RULES);
    out
}
