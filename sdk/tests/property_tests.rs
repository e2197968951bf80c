use proptest::prelude::*;
use sdk::errors::{EngineError, StriderErrorExt};
use sdk::schema::InputSchema;
use serde_json::{json, Value};

// Every error variant must carry a non-empty, static user hint
proptest! {
    #[test]
    fn test_error_user_hint_completeness(error_str in "\\PC*") {
        let errs = vec![
            EngineError::Config(error_str.clone()),
            EngineError::CapabilityNotFound(error_str.clone()),
            EngineError::DuplicateCapability(error_str.clone()),
            EngineError::capability_failed(error_str.clone(), &error_str),
            EngineError::DecisionProvider(error_str.clone()),
            EngineError::Persistence(error_str.clone()),
            EngineError::InvalidPattern(error_str.clone()),
        ];

        for err in errs {
            let hint = err.user_hint();
            prop_assert!(!hint.is_empty());
            prop_assert!(err.to_string().contains(error_str.as_str()));
        }
    }
}

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        (-1.0e6..1.0e6f64).prop_map(|n| json!(n)),
        "[a-z]{0,8}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,4}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

// Validation never panics and always reports a path rooted at `$`
proptest! {
    #[test]
    fn test_validation_is_total(value in arb_json()) {
        let schema = InputSchema::object()
            .field("name", InputSchema::string().length(1, 4))
            .optional_field("count", InputSchema::integer().min(0.0))
            .optional_field("items", InputSchema::array(InputSchema::number()))
            .strict();

        if let Err(err) = schema.validate(&value) {
            prop_assert!(err.path.starts_with('$'));
        }
        prop_assert!(InputSchema::any().validate(&value).is_ok());
    }

    #[test]
    fn test_integer_bounds(n in -1000i64..1000, lo in -500i64..0, hi in 0i64..500) {
        let schema = InputSchema::integer().min(lo as f64).max(hi as f64);
        let ok = schema.validate(&json!(n)).is_ok();
        prop_assert_eq!(ok, n >= lo && n <= hi);
    }
}
