use model_mapper::transformer::registry;
use model_mapper::{
    JsonAdapter, JsonMap, KeyPathMapping, MappingError, Model, ModelRef, ModelType, PropertySet,
    Transformer,
};
use serde_json::json;

#[derive(Debug, Clone, PartialEq, PropertySet)]
struct Flavor {
    kind: String,
}

fn flavor_for(external: &JsonMap) -> Option<ModelType> {
    match external.get("kind")?.as_str()? {
        "chocolate" => Some(ModelType::of::<Chocolate>()),
        "vanilla" => Some(ModelType::of::<Vanilla>()),
        _ => None,
    }
}

impl Model for Flavor {
    fn class_for_parsing(external: &JsonMap) -> Option<ModelType> {
        flavor_for(external)
    }
}

#[derive(Debug, Clone, PartialEq, PropertySet)]
struct Chocolate {
    #[property(flatten)]
    flavor: Flavor,
    bitterness: u32,
}

impl Model for Chocolate {
    fn key_paths() -> KeyPathMapping {
        KeyPathMapping::new()
            .path("bitterness", "chocolate_bitterness")
            .inherit(Flavor::key_paths())
    }

    fn transformer_for_key(key: &str) -> Option<Transformer> {
        match key {
            "bitterness" => registry::named(registry::NUMBER_STRING),
            _ => Flavor::transformer_for_key(key),
        }
    }
}

#[derive(Debug, Clone, PartialEq, PropertySet)]
struct Vanilla {
    #[property(flatten)]
    flavor: Flavor,
    #[property(default)]
    bourbon: bool,
}

impl Model for Vanilla {}

#[test]
fn test_dispatch_to_concrete_type() {
    let adapter = JsonAdapter::new();
    let input = json!({"kind": "chocolate", "chocolate_bitterness": "100"});
    let flavor = adapter
        .model_of_type(ModelType::of::<Flavor>(), &input)
        .unwrap();

    assert!(flavor.is::<Chocolate>());
    assert_eq!(flavor.model_type().name(), "Chocolate");
    let chocolate = flavor.downcast_ref::<Chocolate>().unwrap();
    assert_eq!(chocolate.bitterness, 100);
    assert_eq!(chocolate.flavor.kind, "chocolate");
    assert!(flavor.downcast::<Vanilla>().is_none());
}

#[test]
fn test_dispatch_of_other_branch() {
    let flavor = JsonAdapter::new()
        .model_of_type(
            ModelType::of::<Flavor>(),
            &json!({"kind": "vanilla", "bourbon": true}),
        )
        .unwrap();
    let vanilla = flavor.downcast::<Vanilla>().unwrap();
    assert!(vanilla.bourbon);
}

#[test]
fn test_unknown_discriminator_fails() {
    let err = JsonAdapter::new()
        .model_of_type(ModelType::of::<Flavor>(), &json!({"kind": "unknown"}))
        .unwrap_err();
    match err {
        MappingError::NoConcreteTypeFound { model } => assert_eq!(model, "Flavor"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_typed_decode_rejects_other_concrete_type() {
    let err = JsonAdapter::new()
        .model_from_json::<Flavor>(&json!({"kind": "chocolate", "chocolate_bitterness": "1"}))
        .unwrap_err();
    assert!(matches!(err, MappingError::TypeMismatch { .. }));
}

#[test]
fn test_concrete_type_decodes_directly() {
    let chocolate: Chocolate = JsonAdapter::new()
        .model_from_json(&json!({"kind": "chocolate", "chocolate_bitterness": "70"}))
        .unwrap();
    assert_eq!(chocolate.bitterness, 70);
}

#[test]
fn test_runtime_typed_round_trip() {
    let adapter = JsonAdapter::new();
    let input = json!({"kind": "chocolate", "chocolate_bitterness": "85"});
    let flavor = adapter
        .model_of_type(ModelType::of::<Flavor>(), &input)
        .unwrap();
    assert_eq!(adapter.json_from_any(flavor.as_model()).unwrap(), input);
}

#[derive(Debug, Clone, PartialEq, PropertySet)]
struct Shop {
    featured: ModelRef,
    menu: Vec<ModelRef>,
}

impl Model for Shop {
    fn transformer_for_key(key: &str) -> Option<Transformer> {
        match key {
            "featured" => Some(JsonAdapter::dictionary_transformer(ModelType::of::<Flavor>())),
            "menu" => Some(JsonAdapter::array_transformer(ModelType::of::<Flavor>())),
            _ => None,
        }
    }
}

#[test]
fn test_cluster_members_as_properties() {
    let adapter = JsonAdapter::new();
    let input = json!({
        "featured": {"kind": "vanilla", "bourbon": false},
        "menu": [
            {"kind": "chocolate", "chocolate_bitterness": "60"},
            {"kind": "vanilla", "bourbon": true}
        ]
    });
    let shop: Shop = adapter.model_from_json(&input).unwrap();

    assert!(shop.featured.is::<Vanilla>());
    let kinds: Vec<_> = shop.menu.iter().map(|m| m.model_type().name()).collect();
    assert_eq!(kinds, vec!["Chocolate", "Vanilla"]);

    assert_eq!(adapter.json_from_model(&shop).unwrap(), input);
}

#[test]
fn test_cluster_member_failure_reports_element() {
    let err = JsonAdapter::new()
        .model_from_json::<Shop>(&json!({
            "featured": {"kind": "vanilla"},
            "menu": [{"kind": "vanilla"}, {"kind": "strawberry"}]
        }))
        .unwrap_err();
    assert_eq!(err.property_key(), Some("menu"));
    assert!(matches!(
        err.root_cause(),
        MappingError::NoConcreteTypeFound { .. }
    ));
}
