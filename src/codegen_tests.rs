#[cfg(test)]
mod tests {
    use crate::catalog::ComponentCategory;
    use crate::codegen::*;
    use crate::document::{ComponentInstance, Position};
    use crate::error::{SerializationError, ValueParseError};
    use crate::PropertyBag;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn round_trip(value: &Value) {
        let text = serialize_prop_value(value).unwrap();
        let parsed = parse_prop_value(&text)
            .unwrap_or_else(|e| panic!("failed to read back `{}`: {}", text, e));
        assert_eq!(&parsed, value, "source was `{}`", text);
        assert_eq!(serialize_prop_value(&parsed).unwrap(), text);
    }

    fn bag(v: Value) -> PropertyBag {
        v.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_strings_read_back_exactly() {
        for s in [
            "",
            "plain",
            "Hello \"World\"",
            "back\\slash",
            "C:\\path\\to\\\"file\"",
            "tab\tnew\nline\rreturn",
            "unicode: caf\u{e9} \u{1f680}",
            "separators \u{2028} \u{2029}",
            "control \u{1} \u{1f} \u{7f}",
            "braces {x} <b>&amp;</b>",
            "`backticks` and ${template}",
            "'single' quotes",
        ] {
            round_trip(&json!(s));
        }
    }

    #[test]
    fn test_numbers_read_back_exactly() {
        for v in [
            json!(0),
            json!(42),
            json!(-3),
            json!(1.5),
            json!(-0.25),
            json!(1.0),
            json!(u64::MAX),
            json!(i64::MIN),
            json!(1e300),
        ] {
            round_trip(&v);
        }
    }

    #[test]
    fn test_nested_values_read_back_exactly() {
        round_trip(&json!({
            "title": "Hello \"World\"",
            "count": 3,
            "ratio": 0.5,
            "enabled": false,
            "tags": ["a", "b\\c", "d\"e"],
            "nested": { "deep": { "list": [1, [2, 3], { "x": "y" }] } },
            "with-dash": "quoted key",
            "two words": true,
            "$dollar_ok": 1,
            "empty": {},
            "none": []
        }));
    }

    #[test]
    fn test_object_key_quoting() {
        assert_eq!(
            serialize_prop_value(&json!({ "ok": 1, "not-ok": 2, "9lives": 3 })).unwrap(),
            r#"{ ok: 1, "not-ok": 2, "9lives": 3 }"#
        );
        assert_eq!(serialize_prop_value(&json!({})).unwrap(), "{}");
        assert_eq!(serialize_prop_value(&json!([])).unwrap(), "[]");
    }

    #[test]
    fn test_proto_key_uses_computed_form() {
        let value = json!({ "__proto__": { "admin": true }, "name": "x" });
        assert_eq!(
            serialize_prop_value(&value).unwrap(),
            r#"{ ["__proto__"]: { admin: true }, name: "x" }"#
        );
        round_trip(&value);

        // the bare form is a prototype setter, not a data key
        for text in ["{ __proto__: 1 }", r#"{ "__proto__": 1 }"#] {
            assert!(matches!(
                parse_prop_value(text).unwrap_err(),
                ValueParseError::Unsupported(_)
            ));
        }
    }

    #[test]
    fn test_null_reports_path() {
        let err = serialize_prop_value(&json!(null)).unwrap_err();
        assert!(matches!(err, SerializationError::NullValue { ref path } if path.is_empty()));

        let err = serialize_prop_value(&json!({ "a": { "b": [1, 2, null] } })).unwrap_err();
        assert!(matches!(err, SerializationError::NullValue { ref path } if path == "a.b[2]"));
    }

    #[test]
    fn test_markup_null_path_is_prefixed_by_attribute() {
        let err = emit_markup("List", &bag(json!({ "items": ["a", null] }))).unwrap_err();
        assert!(matches!(err, SerializationError::NullValue { ref path } if path == "items[1]"));

        let err = emit_markup("List", &bag(json!({ "meta": { "owner": null } }))).unwrap_err();
        assert!(matches!(err, SerializationError::NullValue { ref path } if path == "meta.owner"));

        let err = emit_markup("List", &bag(json!({ "gone": null }))).unwrap_err();
        assert!(matches!(err, SerializationError::NullValue { ref path } if path == "gone"));
    }

    #[test]
    fn test_invalid_attribute_name() {
        let err = emit_markup("Card", &bag(json!({ "bad key": 1 }))).unwrap_err();
        assert!(matches!(err, SerializationError::InvalidAttributeName { ref key } if key == "bad key"));

        let err = emit_markup("Card", &bag(json!({ "x=\"y\"": 1 }))).unwrap_err();
        assert!(matches!(err, SerializationError::InvalidAttributeName { .. }));

        // hyphenated attribute names are legal markup
        assert_eq!(
            emit_markup("Card", &bag(json!({ "aria-label": "Close" }))).unwrap(),
            r#"<Card aria-label="Close" />"#
        );
    }

    #[test]
    fn test_emit_markup_keeps_property_order() {
        let line = emit_markup(
            "Card",
            &bag(json!({
                "title": "Hello \"World\"",
                "count": 2,
                "subtitle": "Plain text",
                "items": ["a"]
            })),
        )
        .unwrap();
        assert_eq!(
            line,
            r#"<Card title={"Hello \"World\""} count={2} subtitle="Plain text" items={["a"]} />"#
        );
        assert_eq!(emit_markup("Divider", &PropertyBag::new()).unwrap(), "<Divider />");
    }

    #[test]
    fn test_emit_instance_markup() {
        let instance = ComponentInstance {
            type_id: "HeroSection".to_string(),
            category: ComponentCategory::Hero,
            properties: bag(json!({ "title": "Ship it", "primary": { "label": "Go" } })),
            position: Position::new(0.0, 0.0),
        };
        assert_eq!(
            emit_instance_markup(&instance).unwrap(),
            r#"<HeroSection title="Ship it" primary={{ label: "Go" }} />"#
        );
    }

    #[test]
    fn test_attribute_values_read_back() {
        for v in [
            json!("Plain text"),
            json!("Hello \"World\""),
            json!("a & b"),
            json!("{curly}"),
            json!("multi\nline"),
            json!(12),
            json!([1, "two"]),
            json!({ "k": "v" }),
        ] {
            let text = attribute_value(&v).unwrap();
            assert_eq!(parse_attribute_value(&text).unwrap(), v, "attribute text `{}`", text);
        }
    }

    #[test]
    fn test_parse_accepts_hand_written_forms() {
        assert_eq!(parse_prop_value("'single'").unwrap(), json!("single"));
        assert_eq!(parse_prop_value("`tpl`").unwrap(), json!("tpl"));
        assert_eq!(parse_prop_value("(1_000)").unwrap(), json!(1000));
        assert_eq!(
            parse_prop_value("{ 'quoted': [true, -2] }").unwrap(),
            json!({ "quoted": [true, -2] })
        );
    }

    #[test]
    fn test_parse_rejects_non_literal_forms() {
        for text in ["foo", "a + b", "[...xs]", "{ [k]: 1 }", "{ m() {} }", "`a${b}`", "null"] {
            let err = parse_prop_value(text).unwrap_err();
            assert!(matches!(err, ValueParseError::Unsupported(_)), "`{}` gave {:?}", text, err);
        }
        assert!(matches!(
            parse_prop_value("{ a: ").unwrap_err(),
            ValueParseError::Syntax(_)
        ));
        assert!(parse_attribute_value("bare").is_err());
    }
}
