//! Property tests for parameter mutation and content-type handling.

use oasgate_core::{ApiDocument, ApiRequest, ContentType, ParameterMutator, ParameterSchemas};
use proptest::prelude::*;
use serde_json::{json, Value};

fn parameters() -> ParameterSchemas {
    let doc = ApiDocument::new(json!({
        "components": {"schemas": {"Rgb": {"type": "object", "properties": {
            "r": {"type": "integer"},
            "g": {"type": "integer"},
            "shades": {"type": "array", "items": {"type": "integer"}}
        }}}}
    }))
    .unwrap();
    let raw = vec![
        json!({"name": "tags", "in": "query", "style": "pipeDelimited", "explode": false,
               "schema": {"type": "array", "items": {"type": "string"}}}),
        json!({"name": "ids", "in": "query", "schema": {"type": "array", "items": {"type": "integer"}}}),
        json!({"name": "color", "in": "query", "schema": {"$ref": "#/components/schemas/Rgb"}}),
        json!({"name": "meta", "in": "query", "content": {"application/json": {"schema": {"type": "object"}}}}),
        json!({"name": "label", "in": "query", "content": {"application/json": {"schema": {"type": "string"}}}}),
        json!({"name": "x-trace", "in": "header", "explode": false, "schema": {"type": "array"}}),
    ];
    ParameterSchemas::parse(&raw, &doc).unwrap()
}

proptest! {
    #[test]
    fn mutation_is_idempotent(
        tags in proptest::collection::vec("[a-z0-9]{1,8}", 1..5),
        ids in proptest::collection::vec(any::<u16>(), 1..4),
        r in any::<u8>(),
        shade in any::<u8>(),
        page in any::<u32>(),
        trace in proptest::collection::vec("[a-z]{1,6}", 1..4),
        label in "[0-9]{1,6}",
    ) {
        let mut url = format!("/pets?tags={}&r={r}&shades={shade}", tags.join("%7C"));
        for id in &ids {
            url.push_str(&format!("&ids={id}"));
        }
        url.push_str(&format!("&meta=%7B%22page%22%3A{page}%7D&label=%22{label}%22"));
        let mut request = ApiRequest::new("GET", &url).with_header("x-trace", &trace.join(","));

        let schemas = parameters();
        let mutator = ParameterMutator::new(schemas.parameters());
        mutator.mutate(&mut request).unwrap();

        prop_assert_eq!(&request.query["tags"], &json!(tags));
        prop_assert_eq!(&request.headers["x-trace"], &json!(trace));
        prop_assert_eq!(&request.query["meta"], &json!({"page": page}));
        // Digits stay a string: the JSON string is decoded exactly once.
        prop_assert_eq!(&request.query["label"], &json!(label));
        let expected_ids: Vec<Value> = ids.iter().map(|id| json!(id.to_string())).collect();
        // A single occurrence is wrapped, repeats arrive as an array already.
        prop_assert_eq!(&request.query["ids"], &Value::Array(expected_ids));
        prop_assert_eq!(
            &request.query["color"],
            &json!({"r": r.to_string(), "shades": [shade.to_string()]})
        );

        let once = request.clone();
        mutator.mutate(&mut request).unwrap();
        prop_assert_eq!(request, once);
    }

    #[test]
    fn equivalents_cover_charset_variants(
        kind in "[a-z]{1,10}",
        subtype in "[a-z0-9.+-]{1,12}",
        charset in proptest::option::of("[a-z0-9-]{1,10}"),
    ) {
        let media = format!("{kind}/{subtype}");
        let header = match &charset {
            Some(charset) => format!("{media}; charset={charset}"),
            None => media.clone(),
        };
        let equivalents = ContentType::parse(Some(&header)).equivalents();
        prop_assert_eq!(equivalents.len(), 2);
        prop_assert_eq!(&equivalents[0], &media);
        let with_charset = format!("{media}; charset={}", charset.as_deref().unwrap_or("utf-8"));
        prop_assert_eq!(&equivalents[1], &with_charset);
    }

    #[test]
    fn cache_keys_ignore_boundaries(
        subtype in "[a-z]{1,10}",
        boundary in "[A-Za-z0-9]{1,24}",
    ) {
        let media = format!("multipart/{subtype}");
        let plain = ContentType::parse(Some(&media));
        let bounded = ContentType::parse(Some(&format!("{media}; boundary={boundary}")));
        prop_assert_eq!(plain.cache_key(), bounded.cache_key());
        prop_assert_eq!(bounded.cache_key(), media);
    }
}
