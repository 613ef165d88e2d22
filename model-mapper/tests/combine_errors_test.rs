use model_mapper::{AdapterOptions, JsonAdapter, MappingError, Model, PropertySet};
use serde_json::json;
use std::sync::Arc;
use url::Url;

#[derive(Debug, Clone, PartialEq, PropertySet)]
struct Links {
    a: Url,
    b: String,
    c: Url,
}

impl Model for Links {}

fn combining() -> JsonAdapter {
    JsonAdapter::with_options(AdapterOptions::new().with_combine_errors(true))
}

#[test]
fn test_combine_collects_every_failure() {
    let input = json!({"a": 1, "b": "fine", "c": 2});
    let err = combining().model_from_json::<Links>(&input).unwrap_err();

    let MappingError::Aggregate(errors) = &err else {
        panic!("expected an aggregate, got {err:?}");
    };
    assert_eq!(errors.len(), 2);
    let keys: Vec<_> = errors.iter().filter_map(MappingError::property_key).collect();
    assert_eq!(keys, vec!["a", "c"]);
    assert_eq!(err.errors().len(), 2);
}

#[test]
fn test_fail_fast_reports_first_failure() {
    let input = json!({"a": 1, "b": "fine", "c": 2});
    let err = JsonAdapter::new().model_from_json::<Links>(&input).unwrap_err();
    assert!(matches!(err, MappingError::PropertyFailed { .. }));
    assert_eq!(err.property_key(), Some("a"));
}

#[test]
fn test_combine_includes_missing_required_values() {
    let err = combining()
        .model_from_json::<Links>(&json!({"a": 1, "c": "https://c.example/"}))
        .unwrap_err();
    let keys: Vec<_> = err
        .errors()
        .into_iter()
        .filter_map(|e| e.property_key())
        .collect();
    assert_eq!(keys, vec!["a", "b"]);
    assert!(matches!(err.errors()[1], MappingError::ValidationFailed { .. }));
}

#[test]
fn test_combine_succeeds_without_failures() {
    let links: Links = combining()
        .model_from_json(&json!({
            "a": "https://a.example/",
            "b": "fine",
            "c": "https://c.example/"
        }))
        .unwrap();
    assert_eq!(links.b, "fine");
}

#[derive(Debug, Clone, PartialEq, PropertySet)]
struct Page {
    title: String,
    links: Arc<Links>,
}

impl Model for Page {}

#[test]
fn test_nested_failures_fold_into_parent_property() {
    let input = json!({
        "title": "Home",
        "links": {"a": 1, "b": "fine", "c": 2}
    });
    let err = combining().model_from_json::<Page>(&input).unwrap_err();

    let errors = err.errors();
    assert_eq!(errors.len(), 1);
    match errors[0] {
        MappingError::PropertyFailed { key, source, .. } => {
            assert_eq!(key, "links");
            let nested: Vec<_> = source
                .errors()
                .into_iter()
                .filter_map(|e| e.property_key())
                .collect();
            assert_eq!(nested, vec!["a", "c"]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_nested_failure_in_fail_fast_mode() {
    let input = json!({
        "title": "Home",
        "links": {"a": 1, "b": "fine", "c": 2}
    });
    let err = JsonAdapter::new().model_from_json::<Page>(&input).unwrap_err();
    assert_eq!(err.property_key(), Some("links"));
    assert!(matches!(
        err.root_cause(),
        MappingError::TransformationFailed { transformer, .. } if transformer == "url"
    ));
}
