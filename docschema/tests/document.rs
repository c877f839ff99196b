use std::{collections::BTreeMap, str::FromStr, sync::Arc};

use docschema::prelude::*;
use serde_json::json;

fn pet() -> Arc<SchemaDescriptor> {
    SchemaDescriptor::builder("Pet")
        .field("name", FieldSpec::string().required())
        .field("birthdate", FieldSpec::date())
        .build()
        .unwrap()
}

fn address() -> Arc<SchemaDescriptor> {
    SchemaDescriptor::builder("Address")
        .field("city", FieldSpec::string())
        .field("kind", FieldSpec::string().choices(["home", "work"]))
        .build()
        .unwrap()
}

fn kitchen_sink() -> Arc<SchemaDescriptor> {
    SchemaDescriptor::builder("Sink")
        .field("s", FieldSpec::string())
        .field("i", FieldSpec::integer())
        .field("f", FieldSpec::float())
        .field("b", FieldSpec::boolean())
        .field("d", FieldSpec::decimal())
        .field("day", FieldSpec::date())
        .field("at", FieldSpec::time())
        .field("when", FieldSpec::datetime())
        .field("tags", FieldSpec::set(Some(FieldType::String)))
        .field("scores", FieldSpec::list(Some(FieldType::Integer)))
        .field("meta", FieldSpec::dict(None))
        .field("labels", FieldSpec::list(Some(FieldType::String)).default(vec!["new"]))
        .field("home", FieldSpec::schema(&address()))
        .build()
        .unwrap()
}

#[test]
fn pet_scenario_validates() {
    let pet = pet();

    let mut fluffy = pet.instantiate().unwrap();
    fluffy.set("name", "Fluffy").unwrap();
    assert!(fluffy.validate().is_empty());

    let nameless = pet.instantiate().unwrap();
    assert_eq!(
        nameless.validate(),
        vec![Violation::RequiredFieldMissing { field: "name".into() }]
    );
}

#[test]
fn declared_values_round_trip_through_the_canonical_tree() {
    let schema = kitchen_sink();
    let day = NaiveDate::from_ymd_opt(2008, 11, 10).unwrap();
    let at = NaiveTime::from_hms_opt(8, 30, 15).unwrap();
    let when = DateTime::parse_from_rfc3339("2008-11-10T08:00:00Z")
        .unwrap()
        .with_timezone(&Utc);

    let mut doc = schema.instantiate().unwrap();
    doc.set("s", "hello").unwrap();
    doc.set("i", 42).unwrap();
    doc.set("f", 1.5).unwrap();
    doc.set("b", true).unwrap();
    doc.set("d", BigDecimal::from_str("12.50").unwrap()).unwrap();
    doc.set("day", day).unwrap();
    doc.set("at", at).unwrap();
    doc.set("when", when).unwrap();

    let back = Document::decode(&schema, doc.encode()).unwrap();

    assert_eq!(back.get_as::<String>("s").unwrap(), "hello");
    assert_eq!(back.get_as::<i64>("i").unwrap(), 42);
    assert_eq!(back.get_as::<f64>("f").unwrap(), 1.5);
    assert!(back.get_as::<bool>("b").unwrap());
    assert_eq!(back.get_as::<BigDecimal>("d").unwrap(), BigDecimal::from_str("12.5").unwrap());
    assert_eq!(back.get_as::<NaiveDate>("day").unwrap(), day);
    assert_eq!(back.get_as::<NaiveTime>("at").unwrap(), at);
    assert_eq!(back.get_as::<DateTime<Utc>>("when").unwrap(), when);
    assert_eq!(back.encode()["day"], json!("2008-11-10"));
    assert_eq!(back.encode()["when"], json!("2008-11-10T08:00:00Z"));
}

#[test]
fn sub_second_precision_is_truncated() {
    let schema = kitchen_sink();
    let mut doc = schema.instantiate().unwrap();

    let at = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap();
    let when = NaiveDate::from_ymd_opt(2024, 12, 31)
        .unwrap()
        .and_hms_milli_opt(23, 59, 59, 999)
        .unwrap()
        .and_utc();
    doc.set("at", at).unwrap();
    doc.set("when", when).unwrap();

    assert_eq!(doc.encode()["at"], json!("23:59:59"));
    assert_eq!(doc.encode()["when"], json!("2024-12-31T23:59:59Z"));
}

#[test]
fn mistyped_assignment_fails_fast_and_leaves_the_slot_unchanged() {
    let mut doc = pet().instantiate().unwrap();
    doc.set("name", "Fluffy").unwrap();

    let err = doc.set("name", 123).unwrap_err();

    assert!(matches!(err, DocumentError::TypeMismatch { ref field, .. } if field == "name"));
    assert_eq!(doc.encode()["name"], json!("Fluffy"));
}

#[test]
fn choices_and_validators_reject_at_assignment() {
    let schema = SchemaDescriptor::builder("Shirt")
        .field("size", FieldSpec::string().choices(["S", "M", "L"]))
        .field(
            "price",
            FieldSpec::integer().validator("positive", |value| match value.as_i64() {
                Some(price) if price <= 0 => Err("must be positive".into()),
                _ => Ok(()),
            }),
        )
        .build()
        .unwrap();
    let mut shirt = schema.instantiate().unwrap();

    shirt.set("size", "L").unwrap();
    assert!(matches!(
        shirt.set("size", "XL"),
        Err(DocumentError::Validation(Violation::ChoiceViolation { .. }))
    ));
    assert!(matches!(
        shirt.set("price", -3),
        Err(DocumentError::Validation(Violation::ValidatorFailure { ref validator, .. })) if validator == "positive"
    ));

    assert_eq!(shirt.encode()["size"], json!("L"));
    assert_eq!(shirt.encode()["price"], json!(null));
}

#[test]
fn every_document_gets_its_own_default_containers() {
    let schema = kitchen_sink();
    let mut first = schema.instantiate().unwrap();
    let second = schema.instantiate().unwrap();

    first.list_mut("scores").unwrap().push(7).unwrap();
    first.dict_mut("meta").unwrap().insert("k", "v").unwrap();
    first.set_mut("tags").unwrap().add("x").unwrap();
    first.list_mut("labels").unwrap().push("urgent").unwrap();
    first.schema_mut("home").unwrap().set("city", "Oslo").unwrap();

    assert_eq!(second.encode()["scores"], json!([]));
    assert_eq!(second.encode()["meta"], json!({}));
    assert_eq!(second.encode()["tags"], json!([]));
    assert_eq!(first.encode()["labels"], json!(["new", "urgent"]));
    assert_eq!(second.encode()["labels"], json!(["new"]));
    assert_eq!(first.encode()["home"], json!({"city": "Oslo", "kind": null}));
    assert_eq!(second.encode()["home"], json!({"city": null, "kind": null}));
}

#[test]
fn decoded_sets_hold_each_element_once() {
    let schema = kitchen_sink();
    let mut doc = Document::decode(&schema, json!({"tags": ["x", "y", "x"]})).unwrap();

    assert_eq!(doc.encode()["tags"], json!(["x", "y"]));
    assert_eq!(doc.get_as::<Vec<String>>("tags").unwrap(), ["x", "y"]);

    let mut tags = doc.set_mut("tags").unwrap();
    assert_eq!(tags.len().unwrap(), 2);
    assert_eq!(tags.pop().unwrap(), Some(Value::from("x")));
    assert!(!tags.contains("x").unwrap());
}

#[test]
fn sets_inside_nested_containers_are_deduplicated_on_decode() {
    let schema = SchemaDescriptor::builder("Index")
        .field("index", FieldSpec::dict(Some(FieldType::Set(item(FieldType::String)))))
        .build()
        .unwrap();

    let doc = Document::decode(&schema, json!({"index": {"a": ["x", "x", "y"]}})).unwrap();

    assert_eq!(doc.encode()["index"], json!({"a": ["x", "y"]}));
}

#[test]
fn nested_items_written_through_proxies_are_validated() {
    let schema = SchemaDescriptor::builder("Owner")
        .field("offices", FieldSpec::list(Some(FieldType::Schema(address()))))
        .field("sites", FieldSpec::dict(Some(FieldType::Schema(address()))))
        .build()
        .unwrap();
    let mut doc = schema.instantiate().unwrap();
    let moon = || BTreeMap::from([("kind".to_string(), Value::from("moon"))]);
    let work = || BTreeMap::from([("kind".to_string(), Value::from("work"))]);

    assert!(matches!(doc.set("offices", vec![moon()]), Err(DocumentError::Validation(_))));
    {
        let mut offices = doc.list_mut("offices").unwrap();
        let err = offices.push(moon()).unwrap_err();
        assert!(matches!(
            err,
            DocumentError::Validation(Violation::ChoiceViolation { ref field, .. }) if field == "offices.0.kind"
        ));
        assert!(offices.extend([work(), moon()]).is_err());
        offices.push(work()).unwrap();
        assert!(offices.set(0, moon()).is_err());
        assert!(offices.insert(0, moon()).is_err());
    }
    {
        let mut sites = doc.dict_mut("sites").unwrap();
        assert!(matches!(sites.insert("hq", moon()), Err(DocumentError::Validation(_))));
        assert!(sites.update([("a", work()), ("b", moon())]).is_err());
    }

    assert_eq!(doc.encode()["offices"], json!([{"city": null, "kind": "work"}]));
    assert_eq!(doc.encode()["sites"], json!({}));
}

#[test]
fn dict_entries_that_no_longer_decode_can_be_replaced() {
    let schema = SchemaDescriptor::builder("Scores")
        .field("scores", FieldSpec::dict(Some(FieldType::Integer)))
        .build()
        .unwrap();
    let mut doc = Document::decode(&schema, json!({"scores": {"ann": "ten", "bob": "two"}})).unwrap();

    {
        let mut scores = doc.dict_mut("scores").unwrap();
        assert_eq!(scores.insert("ann", 10).unwrap(), Some(Value::from("ten")));
        assert_eq!(scores.remove("bob").unwrap(), Some(Value::from("two")));
    }

    assert_eq!(doc.encode()["scores"], json!({"ann": 10}));
}

#[test]
fn mistyped_values_are_never_members() {
    let mut doc = kitchen_sink().instantiate().unwrap();
    doc.set("scores", vec![1, 2]).unwrap();
    doc.set("tags", vec!["a"]).unwrap();

    {
        let mut scores = doc.list_mut("scores").unwrap();
        assert_eq!(scores.position(&Value::from("one")).unwrap(), None);
        assert!(!scores.contains(&Value::from("one")).unwrap());
        assert!(!scores.remove_value(&Value::from("one")).unwrap());
        assert!(scores.contains(&Value::from(2)).unwrap());
    }
    {
        let mut tags = doc.set_mut("tags").unwrap();
        assert!(!tags.contains(7).unwrap());
        assert!(!tags.discard(7).unwrap());
        assert!(tags.contains("a").unwrap());
    }

    assert_eq!(doc.encode()["scores"], json!([1, 2]));
    assert_eq!(doc.encode()["tags"], json!(["a"]));
}

#[test]
fn factory_defaults_are_called_per_document() {
    let schema = SchemaDescriptor::builder("Board")
        .field(
            "columns",
            FieldSpec::list(Some(FieldType::String))
                .default_with(|| Value::from(vec!["todo", "done"])),
        )
        .build()
        .unwrap();

    let mut first = schema.instantiate().unwrap();
    let second = schema.instantiate().unwrap();
    first.list_mut("columns").unwrap().push("doing").unwrap();

    assert_eq!(first.encode()["columns"], json!(["todo", "done", "doing"]));
    assert_eq!(second.encode()["columns"], json!(["todo", "done"]));
}

#[test]
fn set_writes_through_exactly_once() {
    let mut doc = kitchen_sink().instantiate().unwrap();

    doc.set_mut("tags").unwrap().add("x").unwrap();
    assert_eq!(doc.encode()["tags"], json!(["x"]));

    doc.set_mut("tags").unwrap().add("x").unwrap();
    assert_eq!(doc.encode()["tags"], json!(["x"]));
}

#[test]
fn assigning_a_set_value_deduplicates() {
    let mut doc = kitchen_sink().instantiate().unwrap();

    doc.set("tags", vec!["a", "b", "a"]).unwrap();

    assert_eq!(doc.encode()["tags"], json!(["a", "b"]));
}

#[test]
fn replaced_slot_is_only_reachable_through_a_new_proxy() {
    let mut doc = kitchen_sink().instantiate().unwrap();

    {
        let mut child = doc.dict_mut("meta").unwrap();
        child.insert("old", 1).unwrap();
    }
    let before = doc.get("meta").unwrap();

    doc.set("meta", BTreeMap::<String, Value>::new()).unwrap();
    doc.dict_mut("meta").unwrap().insert("new", 2).unwrap();

    assert_eq!(doc.encode()["meta"], json!({"new": 2}));
    assert_eq!(before, Value::Dict(BTreeMap::from([("old".to_string(), Value::Integer(1))])));
}

#[test]
fn dynamic_fields_are_inferred_on_read() {
    let schema = SchemaDescriptor::builder("Loose").build().unwrap();
    let doc = Document::decode(
        &schema,
        json!({
            "day": "2008-11-10",
            "when": "2008-11-10T08:00:00Z",
            "at": "08:00",
            "price": "9.99",
            "name": "plain",
            "count": 3,
        }),
    )
    .unwrap();

    assert_eq!(doc.get("day").unwrap(), Value::Date(NaiveDate::from_ymd_opt(2008, 11, 10).unwrap()));
    assert!(matches!(doc.get("when").unwrap(), Value::DateTime(_)));
    assert!(matches!(doc.get("at").unwrap(), Value::Time(_)));
    assert!(matches!(doc.get("price").unwrap(), Value::Decimal(_)));
    assert_eq!(doc.get("name").unwrap(), Value::from("plain"));
    assert_eq!(doc.get("count").unwrap(), Value::Integer(3));
    assert_eq!(doc.dynamic_keys().len(), 6);
}

#[test]
fn dynamic_writes_use_the_write_time_type() {
    let mut doc = pet().instantiate().unwrap();

    doc.set("adopted", NaiveDate::from_ymd_opt(2021, 5, 1).unwrap()).unwrap();
    doc.set("nicknames", vec!["Fluff", "F"]).unwrap();

    assert_eq!(doc.encode()["adopted"], json!("2021-05-01"));
    assert_eq!(doc.encode()["nicknames"], json!(["Fluff", "F"]));
    assert_eq!(doc.remove("adopted").unwrap(), Some(Value::Date(NaiveDate::from_ymd_opt(2021, 5, 1).unwrap())));
    assert!(doc.encode().get("adopted").is_none());
}

#[test]
fn static_schemas_reject_dynamic_fields() {
    let schema = SchemaDescriptor::builder("Strict")
        .field("name", FieldSpec::string())
        .allow_dynamic(false)
        .build()
        .unwrap();
    let mut doc = schema.instantiate().unwrap();

    assert!(matches!(doc.set("color", "red"), Err(DocumentError::UnknownField(_))));
    assert!(doc.encode().get("color").is_none());
}

#[test]
fn nested_schemas_validate_with_dotted_paths() {
    let address = SchemaDescriptor::builder("Address")
        .field("city", FieldSpec::string().required())
        .field("zip", FieldSpec::string())
        .build()
        .unwrap();
    let owner = SchemaDescriptor::builder("Owner")
        .field("name", FieldSpec::string().required())
        .field("home", FieldSpec::schema(&address))
        .field("offices", FieldSpec::list(Some(FieldType::Schema(address.clone()))))
        .build()
        .unwrap();

    let mut doc = owner.instantiate().unwrap();
    assert_eq!(doc.encode()["home"], json!({"city": null, "zip": null}));

    doc.list_mut("offices")
        .unwrap()
        .push(BTreeMap::from([("zip".to_string(), Value::from("0150"))]))
        .unwrap();

    let fields: Vec<String> = doc.validate().iter().map(|v| v.field().to_string()).collect();
    assert_eq!(fields, ["name", "home.city", "offices.0.city"]);

    doc.set("name", "Ann").unwrap();
    doc.schema_mut("home").unwrap().set("city", "Oslo").unwrap();
    doc.list_mut("offices").unwrap().schema_at(0).unwrap().set("city", "Bergen").unwrap();

    assert!(doc.validate().is_empty());
    assert_eq!(doc.encode()["offices"], json!([{"city": "Bergen", "zip": "0150"}]));
}

#[test]
fn nested_containers_materialize_lazily_and_write_through() {
    let schema = SchemaDescriptor::builder("Grid")
        .field("rows", FieldSpec::list(Some(FieldType::List(item(FieldType::Integer)))))
        .field("index", FieldSpec::dict(Some(FieldType::Set(item(FieldType::String)))))
        .build()
        .unwrap();
    let mut doc = schema.instantiate().unwrap();

    {
        let mut rows = doc.list_mut("rows").unwrap();
        rows.push(Vec::<i64>::new()).unwrap();
        rows.list_at(0).unwrap().extend([1, 2, 3]).unwrap();
        assert!(rows.list_at(0).unwrap().push("four").is_err());
    }
    {
        let mut index = doc.dict_mut("index").unwrap();
        index.setdefault("a", Vec::<String>::new()).unwrap();
        index.set_mut("a").unwrap().update(["x", "y", "x"]).unwrap();
    }

    assert_eq!(doc.encode()["rows"], json!([[1, 2, 3]]));
    assert_eq!(doc.encode()["index"], json!({"a": ["x", "y"]}));
}

#[test]
fn proxies_refuse_the_wrong_container_kind() {
    let mut doc = kitchen_sink().instantiate().unwrap();

    assert!(matches!(doc.dict_mut("scores"), Err(DocumentError::TypeMismatch { .. })));
    assert!(matches!(doc.list_mut("s"), Err(DocumentError::TypeMismatch { .. })));
    assert!(matches!(doc.list_mut("nope"), Err(DocumentError::UnknownField(_))));
}

#[test]
fn inheritance_merges_parent_fields_in_order() {
    let animal = SchemaDescriptor::builder("Animal")
        .field("name", FieldSpec::string().required())
        .field("legs", FieldSpec::integer().default(4))
        .build()
        .unwrap();
    let pet = SchemaDescriptor::builder("Pet")
        .inherit(&animal)
        .field("legs", FieldSpec::integer().default(3))
        .field("birthdate", FieldSpec::date())
        .build()
        .unwrap();

    let doc = pet.instantiate().unwrap();

    assert_eq!(
        doc.encode(),
        json!({"name": null, "legs": 3, "birthdate": null, "doc_type": "Pet"})
    );
    assert_eq!(
        doc.encode().as_object().unwrap().keys().collect::<Vec<_>>(),
        ["name", "legs", "birthdate", "doc_type"]
    );
}
