use std::{collections::BTreeSet, sync::Arc};

use docschema::prelude::*;
use proptest::prelude::*;

fn schema() -> Arc<SchemaDescriptor> {
    SchemaDescriptor::builder("Props")
        .field("label", FieldSpec::string())
        .field("count", FieldSpec::integer())
        .field("tags", FieldSpec::set(Some(FieldType::String)))
        .field("log", FieldSpec::list(Some(FieldType::Integer)))
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn declared_scalars_survive_encode_decode(label in ".*", count in any::<i64>()) {
        let schema = schema();
        let mut doc = schema.instantiate().unwrap();
        doc.set("label", label.clone()).unwrap();
        doc.set("count", count).unwrap();

        let back = Document::decode(&schema, doc.encode()).unwrap();

        prop_assert_eq!(back.get_as::<String>("label").unwrap(), label);
        prop_assert_eq!(back.get_as::<i64>("count").unwrap(), count);
    }

    #[test]
    fn set_holds_each_element_once(items in prop::collection::vec("[a-d]{1,2}", 0..24)) {
        let mut doc = schema().instantiate().unwrap();
        {
            let mut tags = doc.set_mut("tags").unwrap();
            for item in &items {
                tags.add(item.as_str()).unwrap();
            }
        }

        let unique: BTreeSet<&String> = items.iter().collect();
        let stored = doc.encode()["tags"].as_array().unwrap().len();

        prop_assert_eq!(stored, unique.len());
    }

    #[test]
    fn list_proxy_matches_a_plain_vec(ops in prop::collection::vec((any::<bool>(), any::<i32>()), 0..32)) {
        let mut doc = schema().instantiate().unwrap();
        let mut expected: Vec<i64> = Vec::new();
        {
            let mut log = doc.list_mut("log").unwrap();
            for (push, value) in ops {
                if push || expected.is_empty() {
                    log.push(value).unwrap();
                    expected.push(i64::from(value));
                } else {
                    log.pop().unwrap();
                    expected.pop();
                }
            }
        }

        prop_assert_eq!(doc.get_as::<Vec<i64>>("log").unwrap(), expected);
    }
}
