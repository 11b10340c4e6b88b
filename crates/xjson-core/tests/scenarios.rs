use std::fs;

use pretty_assertions::assert_eq;
use serde_json::json;
use xjson_core::{load, loads, LoadOptions};

#[test]
fn unchanged_structure_round_trips() {
    let text = r#"{"Name":"S","Values":["A","AB","ABC"],"Count":3}"#;
    let value = loads(text, &LoadOptions::default()).unwrap();
    assert_eq!(value, json!({"Name":"S","Values":["A","AB","ABC"],"Count":3}));
}

#[test]
fn missing_include_with_default_in_non_strict_mode() {
    let text = r#"{
        "Parameters": {},
        /* #INCLUDE <Steps:missing.json|[]> */
        "Enabled": true
    }"#;
    let value = loads(text, &LoadOptions::default()).unwrap();
    assert_eq!(value["Steps"], json!([]));
    assert_eq!(value["Enabled"], json!(true));
}

#[test]
fn sequence_repeated_four_times_then_a_second_name() {
    let text = r#"{
        "first": [
            { "id": $.sequence('A') },
            { "id": $.sequence('A') },
            { "id": $.sequence('A') },
            { "id": $.sequence('A') }
        ],
        "second": $.sequence('B')
    }"#;
    let value = loads(text, &LoadOptions::default()).unwrap();
    assert_eq!(
        value,
        json!({
            "first": [{"id": 1}, {"id": 2}, {"id": 3}, {"id": 4}],
            "second": 1
        })
    );
}

#[test]
fn root_path_reference_resolves_after_parse() {
    let text = r#"{"prefix":"A","x":"Z-$root.prefix"}"#;
    let value = loads(text, &LoadOptions::default()).unwrap();
    assert_eq!(value, json!({"prefix":"A","x":"Z-A"}));
}

#[test]
fn md5_expression_matches_known_vector() {
    let text = r#"{"a":"$.md5('test string')"}"#;
    let value = loads(text, &LoadOptions::default()).unwrap();
    assert_eq!(value, json!({"a":"6f8db599de986fab7a21625b7916589c"}));
}

#[test]
fn mutual_recursion_across_two_files_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("a.json"),
        r#"{ /* #INCLUDE <Next:b.json> */ "Name": "A" }"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("b.json"),
        r#"{ /* #INCLUDE <Next:a.json> */ "Name": "B" }"#,
    )
    .unwrap();

    let err = load(dir.path().join("a.json"), &LoadOptions::default()).unwrap_err();
    assert!(matches!(err, xjson_core::XjsonError::IncludeRecursion { .. }));
}

#[test]
fn include_from_a_sibling_file_is_spliced_into_the_host_document() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("step.json"), r#"{"Name": "Get Data"}"#).unwrap();
    fs::write(
        dir.path().join("root.json"),
        r#"{
            "Name": "First Stage",
            /* #INCLUDE <Step:step.json> */
            "Enabled": true
        }"#,
    )
    .unwrap();

    let value = load(dir.path().join("root.json"), &LoadOptions::default()).unwrap();
    assert_eq!(value["Step"], json!({"Name": "Get Data"}));
    assert_eq!(value["Enabled"], json!(true));
}

#[test]
fn checksum_mismatch_is_rejected_with_strict_mode() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("other.json"), r#"{"x": 1}"#).unwrap();
    fs::write(
        dir.path().join("root.json"),
        r#"{ /* #INCLUDE <Data:other.json||deadbeefdeadbeefdeadbeefdeadbeef> */ }"#,
    )
    .unwrap();

    let err = load(dir.path().join("root.json"), &LoadOptions::default()).unwrap_err();
    assert!(matches!(err, xjson_core::XjsonError::ChecksumMismatch { .. }));
}

#[test]
fn non_ascii_document_content_is_preserved() {
    let text = r#"{"city": "café", "note": "日本語", "greeting": "Z-$root.city"}"#;
    let value = loads(text, &LoadOptions::default()).unwrap();
    assert_eq!(
        value,
        json!({"city": "café", "note": "日本語", "greeting": "Z-café"})
    );
}

#[test]
fn comments_are_removed_without_shifting_surrounding_values() {
    let text = "{\n  // leading comment\n  \"a\": 1,\n  \"b\": /* inline */ 2\n}\n";
    let value = loads(text, &LoadOptions::default()).unwrap();
    assert_eq!(value, json!({"a": 1, "b": 2}));
}
