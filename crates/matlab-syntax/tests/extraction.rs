use matlab_syntax::{parse_path, parse_source, FunctionType, Provenance, Visibility, UNKNOWN_DEFAULT};
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name))
}

fn optional_defaults(params: &matlab_syntax::Parameters) -> Vec<(&str, &str)> {
    params
        .optional
        .iter()
        .map(|p| (p.name.as_str(), p.default.as_str()))
        .collect()
}

// -- plain function files --

#[test]
fn input_parser_function() {
    let result = parse_path(&fixture_path("+mr/makeTrapezoid.m")).unwrap();
    assert!(!result.file_info.is_classdef);
    assert_eq!(result.file_info.expected_main, "makeTrapezoid");
    assert_eq!(result.file_info.namespace.as_deref(), Some("mr"));

    let main = result.main_function.as_ref().unwrap();
    assert_eq!(main.function_type, FunctionType::Main);
    assert_eq!(main.signature, "function grad=makeTrapezoid(channel, varargin)");
    assert_eq!(main.calling_pattern.as_deref(), Some("mr.makeTrapezoid(...)"));
    assert!(main.help_text.starts_with("makeTrapezoid Create a trapezoid gradient event."));
    assert_eq!(main.line_number, 1);
    assert_eq!(main.parent_file, "makeTrapezoid.m");

    assert_eq!(main.parameters.required.len(), 1);
    assert_eq!(main.parameters.required[0].name, "channel");
    assert_eq!(main.parameters.required[0].provenance, Provenance::Signature);
    assert_eq!(
        optional_defaults(&main.parameters),
        [
            ("system", "[]"),
            ("amplitude", "0"),
            ("area", "[]"),
            ("flatTime", "0"),
            ("maxSlew", "0"),
        ]
    );
    assert_eq!(main.parameters.optional[0].provenance, Provenance::AddOptional);
    assert_eq!(main.parameters.optional[1].provenance, Provenance::AddParameter);
    assert!(!main.uses_nargin_pattern);

    // "Internal helper" in its help text
    assert!(result.helper_functions.is_empty());
    assert_eq!(result.internal_functions.len(), 1);
    let helper = &result.internal_functions[0];
    assert_eq!(helper.name, "riseFor");
    assert_eq!(helper.visibility, Visibility::Private);
    assert_eq!(helper.line_number, 35);
}

#[test]
fn argument_count_split_function() {
    let result = parse_path(&fixture_path("+mr/calcShortest.m")).unwrap();
    let main = result.main_function.as_ref().unwrap();
    assert_eq!(main.parameters.names(), ["a", "b", "c"]);
    assert_eq!(main.parameters.required.len(), 1);
    assert_eq!(optional_defaults(&main.parameters), [("b", "5"), ("c", "'linear'")]);
    assert!(main
        .parameters
        .optional
        .iter()
        .all(|p| p.provenance == Provenance::NarginCheck));
    assert_eq!(main.parameters.nargin_detection, Some(1));
    assert!(main.uses_nargin_pattern);
    let returns: Vec<_> = main.returns.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(returns, ["out", "steps"]);
}

#[test]
fn nested_namespace() {
    let result = parse_path(&fixture_path("+mr/+aux/+quat/multiply.m")).unwrap();
    let main = result.main_function.as_ref().unwrap();
    assert_eq!(main.namespace.as_deref(), Some("mr.aux.quat"));
    assert_eq!(main.calling_pattern.as_deref(), Some("mr.aux.quat.multiply(...)"));
    assert_eq!(main.parameters.names(), ["q1", "q2"]);
}

#[test]
fn private_folder_function() {
    let result = parse_path(&fixture_path("+mr/private/clipValue.m")).unwrap();
    let main = result.main_function.as_ref().unwrap();
    assert_eq!(main.visibility, Visibility::Private);
    assert_eq!(main.parameters.names(), ["x", "lo", "hi"]);
}

// -- classdef files --

#[test]
fn classdef_constructor_and_methods() {
    let result = parse_path(&fixture_path("+mr/Sequence.m")).unwrap();
    assert!(result.file_info.is_classdef);

    let class = result.main_function.as_ref().unwrap();
    assert_eq!(class.function_type, FunctionType::Class);
    assert_eq!(class.name, "Sequence");
    assert_eq!(class.signature, "classdef Sequence < handle");
    assert_eq!(class.calling_pattern.as_deref(), Some("seq = mr.Sequence(...)"));
    assert!(class.help_text.starts_with("Sequence Generate sequences"));

    let types: Vec<_> = result.helper_functions.iter().map(|m| m.function_type).collect();
    assert_eq!(
        types.iter().filter(|t| **t == FunctionType::Constructor).count(),
        1
    );
    assert_eq!(types.iter().filter(|t| **t == FunctionType::Method).count(), 2);

    let names: Vec<_> = result.helper_functions.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, ["Sequence", "addBlock", "write"]);

    let write = &result.helper_functions[2];
    assert_eq!(write.calling_pattern.as_deref(), Some("seq.write(...)"));
    assert_eq!(optional_defaults(&write.parameters), [("create_signature", "true")]);
    assert!(write.uses_nargin_pattern);

    let meta = class.class_metadata.as_ref().unwrap();
    assert_eq!(meta.parent_class.as_deref(), Some("handle"));
    assert_eq!(meta.properties.public.len(), 2);
    assert_eq!(meta.properties.private.len(), 1);
    assert_eq!(meta.properties.private[0].description, "cached block events");

    assert_eq!(result.internal_functions.len(), 1);
    let local = &result.internal_functions[0];
    assert_eq!(local.name, "md5sum");
    assert_eq!(local.function_type, FunctionType::Internal);
    assert_eq!(local.calling_pattern, None);
}

// -- properties --

#[test]
fn parsing_is_idempotent() {
    for name in ["+mr/makeTrapezoid.m", "+mr/Sequence.m", "+mr/calcShortest.m"] {
        let path = fixture_path(name);
        let first = serde_json::to_string(&parse_path(&path).unwrap()).unwrap();
        let second = serde_json::to_string(&parse_path(&path).unwrap()).unwrap();
        assert_eq!(first, second, "{name}");
    }
}

#[test]
fn locator_offsets_increase() {
    let text = std::fs::read_to_string(fixture_path("+mr/makeTrapezoid.m")).unwrap();
    let spans = matlab_syntax::locate::find_functions(&text, false);
    assert_eq!(spans.len(), 2);
    assert!(spans.windows(2).all(|w| w[0].start_offset < w[1].start_offset));
}

#[test]
fn serialized_shape() {
    let result = parse_source(
        "matlab/+mr/makeDelay.m",
        "function del = makeDelay(delay, tol)\nif nargin < 2\n  tol = 1e-6;\nend\n",
    );
    let json = serde_json::to_value(&result).unwrap();
    let main = &json["mainFunction"];
    assert_eq!(main["functionType"], "main");
    assert_eq!(main["visibility"], "public");
    assert_eq!(main["usesNarginPattern"], true);
    assert_eq!(main["parameters"]["required"][0]["provenance"], "signature");
    assert_eq!(main["parameters"]["optional"][0]["default"], "1e-6");
    assert_eq!(main["parameters"]["optional"][0]["provenance"], "nargin_check");
    assert_eq!(json["fileInfo"]["expectedMain"], "makeDelay");
    assert!(main.get("bodyExcerpt").is_none());
    assert_ne!(main["parameters"]["optional"][0]["default"], UNKNOWN_DEFAULT);
}
