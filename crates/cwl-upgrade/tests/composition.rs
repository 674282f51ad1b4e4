//! Composition and purity properties of the upgrade chain

use cwl_document::{CwlVersion, Document, DocumentUri, Value};
use cwl_upgrade::{upgrade, upgrade_to};
use proptest::prelude::*;
use serde_json::json;

fn class() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("CommandLineTool"),
        Just("ExpressionTool"),
        Just("Workflow"),
        Just("Operation"),
    ]
}

fn param_type() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(json!("File")),
        Just(json!("Directory")),
        Just(json!("Directory[]")),
        Just(json!("string?")),
        Just(json!(["null", "int"])),
        Just(json!({"type": "array", "items": "Directory"})),
    ]
}

fn requirement() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(json!({"class": "cwltool:LoadListingRequirement", "loadListing": "no_listing"})),
        Just(json!({"class": "cwltool:TimeLimit", "timelimit": 10})),
        Just(json!({"class": "cwltool:NetworkAccess", "networkAccess": false})),
        Just(json!({"class": "DockerRequirement", "dockerPull": "alpine"})),
        Just(json!({"class": "InlineJavascriptRequirement"})),
    ]
}

fn process() -> impl Strategy<Value = Value> {
    (
        class(),
        prop::collection::vec((param_type(), prop::option::of(Just(".idx"))), 0..4),
        prop::collection::vec(requirement(), 0..3),
    )
        .prop_map(|(class, params, hints)| {
            let inputs: Vec<Value> = params
                .into_iter()
                .enumerate()
                .map(|(i, (ty, secondary))| {
                    let mut param = json!({"id": format!("p{i}"), "type": ty});
                    if let Some(pattern) = secondary {
                        param["secondaryFiles"] = json!(pattern);
                    }
                    param
                })
                .collect();
            json!({
                "id": "proc",
                "class": class,
                "inputs": inputs,
                "outputs": [],
                "hints": hints
            })
        })
}

fn document(process: Value) -> Document {
    let uri = DocumentUri::parse("file:///props/proc.cwl").unwrap();
    Document::new(uri, CwlVersion::V1_0, vec![process])
}

proptest! {
    #[test]
    fn upgrades_compose(process in process()) {
        let doc = document(process);
        let direct = upgrade(&doc, CwlVersion::V1_0, CwlVersion::V1_2).unwrap();
        let middle = upgrade(&doc, CwlVersion::V1_0, CwlVersion::V1_1).unwrap();
        let stepped = upgrade(&middle, CwlVersion::V1_1, CwlVersion::V1_2).unwrap();
        prop_assert_eq!(direct, stepped);
    }

    #[test]
    fn upgrades_are_pure_and_keep_ids(process in process()) {
        let doc = document(process);
        let before = doc.clone();
        let upgraded = upgrade_to(&doc, CwlVersion::V1_2).unwrap();
        prop_assert_eq!(&doc, &before);
        prop_assert_eq!(upgraded.version(), CwlVersion::V1_2);
        prop_assert!(upgraded.process_ids().eq(doc.process_ids()));
    }

    #[test]
    fn latest_is_a_fixed_point(process in process()) {
        let upgraded = upgrade_to(&document(process), CwlVersion::V1_2).unwrap();
        let again = upgrade(&upgraded, CwlVersion::V1_1, CwlVersion::V1_2).unwrap();
        prop_assert_eq!(&upgraded, &again);
        let unmoved = upgrade(&upgraded, CwlVersion::V1_1, CwlVersion::V1_1).unwrap();
        prop_assert_eq!(upgraded, unmoved);
    }
}
