use model_mapper::update::copy_value_for_key;
use model_mapper::{
    ErrorMode, JsonAdapter, MappingError, Model, ModelRef, Properties, PropertySet, PropertyValue,
    StorageBehavior, ValidationReason,
};
use serde_json::json;

#[derive(Debug, Clone, PartialEq, PropertySet)]
struct Article {
    title: String,
    tags: Vec<String>,
    #[property(default)]
    views: u64,
    #[property(default)]
    render_cache: Option<String>,
}

impl Model for Article {
    fn storage_behavior(key: &str) -> StorageBehavior {
        match key {
            "views" => StorageBehavior::Transitory,
            "render_cache" => StorageBehavior::None,
            _ => StorageBehavior::Permanent,
        }
    }

    fn validate_property(
        key: &str,
        value: Option<&PropertyValue>,
    ) -> Result<Option<PropertyValue>, ValidationReason> {
        match (key, value) {
            ("title", Some(PropertyValue::String(title))) if title.is_empty() => {
                Err(ValidationReason::custom("title is empty"))
            }
            _ => Ok(None),
        }
    }

    fn merge_value_for_key(&mut self, key: &str, other: &Self) -> Result<(), MappingError> {
        match key {
            "tags" => {
                for tag in &other.tags {
                    if !self.tags.contains(tag) {
                        self.tags.push(tag.clone());
                    }
                }
                Ok(())
            }
            _ => copy_value_for_key(self, key, other),
        }
    }
}

fn article(title: &str, tags: &[&str]) -> Article {
    Article {
        title: title.to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        views: 0,
        render_cache: Some("<p>cached</p>".to_string()),
    }
}

fn updates(entries: &[(&str, PropertyValue)]) -> Properties {
    entries
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

#[test]
fn test_unstored_property_is_not_encoded_or_decoded() {
    let adapter = JsonAdapter::new();
    let json = adapter.json_from_model(&article("Intro", &["rust"])).unwrap();
    assert_eq!(json, json!({"title": "Intro", "tags": ["rust"], "views": 0}));

    let decoded: Article = adapter
        .model_from_json(&json!({"title": "Intro", "tags": [], "render_cache": "<p>stale</p>"}))
        .unwrap();
    assert_eq!(decoded.render_cache, None);
}

#[test]
fn test_dictionary_value_keeps_transitory_properties() {
    let properties = article("Intro", &[]).dictionary_value();
    assert!(properties.contains_key("views"));
    assert!(!properties.contains_key("render_cache"));
}

#[test]
fn test_model_refs_ignore_transitory_properties() {
    let mut read = article("Intro", &["rust"]);
    read.views = 42;
    let fresh = article("Intro", &["rust"]);
    assert_eq!(ModelRef::new(read.clone()), ModelRef::new(fresh));
    assert!(!ModelRef::new(read).permanent_properties().contains_key("views"));

    let renamed = article("Outro", &["rust"]);
    assert_ne!(ModelRef::new(article("Intro", &["rust"])), ModelRef::new(renamed));
}

#[test]
fn test_merge_values_uses_override_per_key() {
    let mut local = article("Draft", &["rust", "json"]);
    let mut remote = article("Final", &["json", "serde"]);
    remote.views = 9;
    remote.render_cache = None;

    local.merge_values_from(&remote).unwrap();
    assert_eq!(local.title, "Final");
    assert_eq!(local.tags, vec!["rust", "json", "serde"]);
    assert_eq!(local.views, 9);
    assert_eq!(local.render_cache.as_deref(), Some("<p>cached</p>"));
}

#[test]
fn test_merge_single_key_by_default_copies() {
    let mut local = article("Draft", &["rust"]);
    local
        .merge_value_for_key("title", &article("Final", &[]))
        .unwrap();
    assert_eq!(local.title, "Final");
    assert_eq!(local.tags, vec!["rust"]);
}

#[test]
fn test_update_with_properties_revalidates() {
    let mut post = article("Intro", &[]);
    post.update_with_properties(
        updates(&[("title", PropertyValue::from("Intro, revised"))]),
        ErrorMode::FailFast,
    )
    .unwrap();
    assert_eq!(post.title, "Intro, revised");

    let err = post
        .update_with_properties(
            updates(&[("title", PropertyValue::from(""))]),
            ErrorMode::FailFast,
        )
        .unwrap_err();
    assert_eq!(err.property_key(), Some("title"));
    assert_eq!(post.title, "Intro, revised");
}

#[test]
fn test_update_rejects_undeclared_and_mistyped_values() {
    let mut post = article("Intro", &[]);
    let err = post
        .update_with_properties(
            updates(&[
                ("tags", PropertyValue::from("not a list")),
                ("author", PropertyValue::from("eve")),
            ]),
            ErrorMode::Combine,
        )
        .unwrap_err();
    let mut keys: Vec<_> = err
        .errors()
        .into_iter()
        .filter_map(|e| e.property_key())
        .collect();
    keys.sort();
    assert_eq!(keys, vec!["author", "tags"]);
    assert_eq!(post, article("Intro", &[]));
}

#[test]
fn test_update_with_null_clears_optional_value() {
    let mut post = article("Intro", &[]);
    post.update_with_properties(
        updates(&[("render_cache", PropertyValue::Null)]),
        ErrorMode::FailFast,
    )
    .unwrap();
    assert_eq!(post.render_cache, None);
}

#[test]
fn test_with_properties_builds_and_validates() {
    let built = Article::with_properties(
        updates(&[
            ("title", PropertyValue::from("Intro")),
            ("tags", PropertyValue::Array(vec![PropertyValue::from("rust")])),
        ]),
        ErrorMode::FailFast,
    )
    .unwrap();
    assert_eq!(built.views, 0);
    assert_eq!(built.tags, vec!["rust"]);

    let err = Article::with_properties(
        updates(&[("tags", PropertyValue::Array(Vec::new()))]),
        ErrorMode::FailFast,
    )
    .unwrap_err();
    match err {
        MappingError::ValidationFailed { key, reason, .. } => {
            assert_eq!(key, "title");
            assert_eq!(reason, ValidationReason::RequiredValueMissing);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
