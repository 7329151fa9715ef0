//! Parameter resolver: required vs. optional classification.
//!
//! Rules are applied as an ordered cascade; each parameter records the rule
//! that classified it:
//!
//! | step | condition                                   | produces                                   |
//! |------|---------------------------------------------|--------------------------------------------|
//! | 1    | always                                      | positional names from the signature        |
//! | 2    | `inputParser` block present                 | `signature`, `signature_with_nargin_check`, `inputParser.*` |
//! | 3    | no block, positional names present          | `signature`, `nargin_check`                |
//! | 4    | no block, `varargin` in the signature       | `varargin_case`                            |
//!
//! Ambiguous positional parameters are always classified required.

pub mod nargin;
pub mod signature;
pub mod validation;
pub mod varargin;

use crate::model::{OptionalParam, Parameters, Provenance, RequiredParam, UNKNOWN_DEFAULT};
use signature::Positional;
use std::collections::HashSet;
use validation::{DeclKind, ValidationBlock};

/// Output of the resolver for one function.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub parameters: Parameters,
    pub uses_nargin_pattern: bool,
}

/// Classify the parameters of a function from its input list and body.
pub fn resolve(inputs_text: &str, body: &str) -> Resolution {
    let positional = signature::positional(inputs_text);
    let block = validation::find_block(body);
    let mut params = Parameters::default();

    match &block {
        Some(block) => apply_validation_block(&mut params, &positional, block, body),
        None if !positional.names.is_empty() => apply_nargin_split(&mut params, &positional, body),
        None => {}
    }

    if block.is_none() && positional.has_varargin {
        apply_varargin_cases(&mut params, body);
    }

    let uses_nargin_pattern = params.nargin_detection.is_some()
        || params
            .optional
            .iter()
            .any(|p| p.provenance == Provenance::NarginCheck);

    Resolution {
        parameters: params,
        uses_nargin_pattern,
    }
}

fn apply_validation_block(
    params: &mut Parameters,
    positional: &Positional,
    block: &ValidationBlock<'_>,
    body: &str,
) {
    let declarations = block.declarations();
    let declared_required = block.required_names();
    let declared_optional: HashSet<&str> = declarations
        .iter()
        .filter(|d| d.kind != DeclKind::Required)
        .map(|d| d.name.as_str())
        .collect();

    for (i, name) in positional.names.iter().enumerate() {
        if let Some(declared) = declared_required.get(i) {
            params.required.push(required(name, i, Provenance::Signature));
            if declared != name {
                tracing::debug!(signature = %name, declared = %declared, "parameter name mismatch");
                params
                    .inputparser_mapping
                    .insert(name.clone(), declared.clone());
            }
        } else if declared_optional.contains(name.as_str()) {
            // classified below from its own declaration
            continue;
        } else if nargin::has_required_guard(body, i + 1) {
            params
                .required
                .push(required(name, i, Provenance::SignatureWithNarginCheck));
        } else {
            params.required.push(required(name, i, Provenance::Signature));
        }
    }

    // Required values passed through varargin (e.g. `makeArbitraryGrad(channel, varargin)`)
    if declared_required.len() > positional.names.len() && positional.has_varargin {
        for (j, name) in declared_required
            .iter()
            .enumerate()
            .skip(positional.names.len())
        {
            if !params.contains(name) {
                params.required.push(required(name, j, Provenance::AddRequired));
            }
        }
    }

    for decl in declarations {
        let provenance = match decl.kind {
            DeclKind::Required => continue,
            DeclKind::Optional => Provenance::AddOptional,
            DeclKind::Parameter => Provenance::AddParameter,
        };
        if params.contains(&decl.name) {
            continue;
        }
        params.optional.push(OptionalParam {
            name: decl.name,
            default: decl.default.unwrap_or_else(|| UNKNOWN_DEFAULT.to_string()),
            provenance,
            position: None,
        });
    }
}

fn apply_nargin_split(params: &mut Parameters, positional: &Positional, body: &str) {
    let total = positional.names.len();
    let Some(count) = nargin::required_count(body, total) else {
        for (i, name) in positional.names.iter().enumerate() {
            params.required.push(required(name, i, Provenance::Signature));
        }
        return;
    };

    tracing::debug!(required = count, total, "argument-count split detected");
    params.nargin_detection = Some(count);
    for (i, name) in positional.names.iter().enumerate() {
        if i < count {
            params.required.push(required(name, i, Provenance::Signature));
        } else {
            params.optional.push(OptionalParam {
                name: name.clone(),
                default: nargin::default_value(body, name, i + 1),
                provenance: Provenance::NarginCheck,
                position: Some(i),
            });
        }
    }
}

fn apply_varargin_cases(params: &mut Parameters, body: &str) {
    for label in varargin::case_labels(body) {
        if params.contains(&label) {
            continue;
        }
        params.optional.push(OptionalParam {
            name: label,
            default: UNKNOWN_DEFAULT.to_string(),
            provenance: Provenance::VararginCase,
            position: None,
        });
    }
}

fn required(name: &str, position: usize, provenance: Provenance) -> RequiredParam {
    RequiredParam {
        name: name.to_string(),
        position,
        provenance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names_with(params: &[RequiredParam]) -> Vec<(&str, usize, Provenance)> {
        params
            .iter()
            .map(|p| (p.name.as_str(), p.position, p.provenance))
            .collect()
    }

    #[test]
    fn argument_count_split() {
        let body = "function out = f(a, b, c)\nif nargin < 2\n    b = 5;\nend\nout = a + b + c;\n";
        let res = resolve("a, b, c", body);
        assert_eq!(names_with(&res.parameters.required), [("a", 0, Provenance::Signature)]);
        let optional: Vec<_> = res
            .parameters
            .optional
            .iter()
            .map(|p| (p.name.as_str(), p.default.as_str(), p.provenance))
            .collect();
        assert_eq!(
            optional,
            [
                ("b", "5", Provenance::NarginCheck),
                ("c", UNKNOWN_DEFAULT, Provenance::NarginCheck)
            ]
        );
        assert_eq!(res.parameters.nargin_detection, Some(1));
        assert!(res.uses_nargin_pattern);
    }

    #[test]
    fn defensive_guard_keeps_everything_required() {
        let body = "function f(a)\nif nargin < 1\n    error('a is required');\nend\n";
        let res = resolve("a", body);
        assert_eq!(names_with(&res.parameters.required), [("a", 0, Provenance::Signature)]);
        assert!(res.parameters.optional.is_empty());
        assert!(!res.uses_nargin_pattern);
    }

    #[test]
    fn defensive_guard_disables_later_split() {
        let body = "if nargin < 1\n error('need a');\nend\nif nargin >= 3\n x = c;\nend";
        let res = resolve("a, b, c", body);
        assert_eq!(res.parameters.names(), ["a", "b", "c"]);
        assert!(res.parameters.optional.is_empty());
        assert_eq!(res.parameters.nargin_detection, None);
        assert!(!res.uses_nargin_pattern);
    }

    #[test]
    fn less_eq_guard_keeps_everything_required() {
        let res = resolve("a, b, c", "if nargin <= 2\n c = 1;\nend");
        assert_eq!(res.parameters.required.len(), 3);
        assert_eq!(res.parameters.nargin_detection, None);
    }

    #[test]
    fn validation_block_takes_precedence() {
        let body = r#"function f(a, b)
if nargin < 2
    b = 3;
end
p = inputParser;
p.addRequired('a');
p.addOptional('b', 'x');
parse(p, a, b);
"#;
        let res = resolve("a, b", body);
        assert_eq!(names_with(&res.parameters.required), [("a", 0, Provenance::Signature)]);
        assert_eq!(res.parameters.optional.len(), 1);
        assert_eq!(res.parameters.optional[0].name, "b");
        assert_eq!(res.parameters.optional[0].default, "'x'");
        assert_eq!(res.parameters.optional[0].provenance, Provenance::AddOptional);
        assert!(!res.uses_nargin_pattern);
    }

    #[test]
    fn validation_name_mismatch_keeps_signature_name() {
        let body = "function g = f(ch, varargin)\np = inputParser;\np.addRequired('channel');\np.parse(ch, varargin{:});\n";
        let res = resolve("ch, varargin", body);
        assert_eq!(res.parameters.required[0].name, "ch");
        assert_eq!(
            res.parameters.inputparser_mapping.get("ch").map(String::as_str),
            Some("channel")
        );
    }

    #[test]
    fn uncovered_positional_with_error_guard() {
        let body = "function f(a, b, varargin)\nif nargin < 2\n    error('b missing');\nend\np = inputParser;\np.addRequired('a');\np.addParameter('gain', 1);\nparse(p, a, varargin{:});\n";
        let res = resolve("a, b, varargin", body);
        assert_eq!(
            names_with(&res.parameters.required),
            [
                ("a", 0, Provenance::Signature),
                ("b", 1, Provenance::SignatureWithNarginCheck)
            ]
        );
        assert_eq!(res.parameters.optional[0].name, "gain");
        assert_eq!(res.parameters.optional[0].provenance, Provenance::AddParameter);
    }

    #[test]
    fn uncovered_positional_defaults_to_required() {
        let body = "function f(a, b)\np = inputParser;\np.addRequired('a');\nparse(p, a);\n";
        let res = resolve("a, b", body);
        assert_eq!(
            names_with(&res.parameters.required),
            [("a", 0, Provenance::Signature), ("b", 1, Provenance::Signature)]
        );
    }

    #[test]
    fn extra_required_through_varargin() {
        let body = "function g = makeArbitraryGrad(channel, varargin)\np = inputParser;\np.addRequired('channel');\np.addRequired('waveform');\np.addOptional('system', []);\nparse(p, channel, varargin{:});\n";
        let res = resolve("channel, varargin", body);
        assert_eq!(
            names_with(&res.parameters.required),
            [
                ("channel", 0, Provenance::Signature),
                ("waveform", 1, Provenance::AddRequired)
            ]
        );
        assert_eq!(res.parameters.optional[0].name, "system");
    }

    #[test]
    fn duplicate_declarations_first_wins() {
        let body = "p = inputParser;\np.addParameter('x', 1);\naddParameter(p, 'x', 2);\nparse(p, varargin{:});\n";
        let res = resolve("varargin", body);
        assert_eq!(res.parameters.optional.len(), 1);
        assert_eq!(res.parameters.optional[0].default, "1");
    }

    #[test]
    fn varargin_cases_without_block() {
        let body = "function f(a, varargin)\nfor i=1:2:numel(varargin)\n  switch varargin{i}\n    case 'gain'\n    case 'a'\n  end\nend\n";
        let res = resolve("a, varargin", body);
        assert_eq!(res.parameters.required.len(), 1);
        assert_eq!(res.parameters.optional.len(), 1);
        assert_eq!(res.parameters.optional[0].name, "gain");
        assert_eq!(res.parameters.optional[0].provenance, Provenance::VararginCase);
        assert_eq!(res.parameters.optional[0].default, UNKNOWN_DEFAULT);
    }

    #[test]
    fn no_parameters() {
        let res = resolve("", "function f()\nend\n");
        assert_eq!(res, Resolution::default());
    }

    #[test]
    fn every_positional_appears_once() {
        let cases = [
            ("a, b, c", "if nargin < 3\n c = 1;\nend"),
            ("a, b", "p = inputParser;\np.addRequired('a');\np.addOptional('b', 1);\nparse(p, a, b);"),
            ("x, ~, y, varargin", "if nargin > 2\nend"),
            ("a", ""),
        ];
        for (inputs, body) in cases {
            let res = resolve(inputs, body);
            let expected = signature::positional(inputs).names;
            let mut seen: Vec<&str> = res.parameters.names();
            seen.retain(|n| expected.iter().any(|e| e == n));
            let mut sorted_seen = seen.clone();
            sorted_seen.sort();
            let mut sorted_expected: Vec<&str> = expected.iter().map(String::as_str).collect();
            sorted_expected.sort();
            assert_eq!(sorted_seen, sorted_expected, "inputs: {inputs}");
        }
    }
}
