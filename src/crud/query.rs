//! Query filter compiler.
//!
//! Rewrites suffix-annotated keys from the `where` parameter (for example
//! `name_contains` or `deadline_between`) into typed [`Condition`]s, using
//! the model's field schema to decide which operators apply. Keys that do
//! not name a declared field are silently dropped so unknown filters never
//! reach storage.

use serde_json::Value;

use crate::model::{FieldSchema, FieldType};
use crate::store::{Condition, Filter};

/// Operator suffixes recognized at the end of a filter key.
const SUFFIXES: &[&str] = &[
    "_contains",
    "_starts_with",
    "_ends_with",
    "_includes",
    "_excludes",
    "_before",
    "_after",
    "_between",
    "_lte",
    "_lt",
    "_gte",
    "_gt",
];

pub fn compile(fields: &FieldSchema, raw_query: &Value) -> Filter {
    let mut filter = Filter::new();
    let Some(entries) = raw_query.as_object() else {
        return filter;
    };

    for (key, value) in entries {
        let (base, suffix) = split_operator(key);
        let Some(descriptor) = fields.get(base) else {
            continue;
        };
        let (out_key, condition) =
            compile_condition(key, base, suffix, value, descriptor.field_type);
        filter.insert(out_key, condition);
    }

    filter
}

fn split_operator(key: &str) -> (&str, Option<&'static str>) {
    for suffix in SUFFIXES {
        if let Some(base) = key.strip_suffix(suffix) {
            if !base.is_empty() {
                return (base, Some(suffix));
            }
        }
    }
    (key, None)
}

fn compile_condition(
    key: &str,
    base: &str,
    suffix: Option<&'static str>,
    value: &Value,
    field_type: FieldType,
) -> (String, Condition) {
    match (field_type, suffix) {
        (FieldType::String, Some("_contains")) => string_condition(base, value, Condition::Contains),
        (FieldType::String, Some("_starts_with")) => {
            string_condition(base, value, Condition::StartsWith)
        }
        (FieldType::String, Some("_ends_with")) => {
            string_condition(base, value, Condition::EndsWith)
        }

        (FieldType::Array, Some("_includes")) => {
            (base.to_string(), Condition::All(as_elements(value)))
        }
        (FieldType::Array, Some("_excludes")) => {
            (base.to_string(), Condition::NotIn(as_elements(value)))
        }

        (FieldType::Date, Some("_before")) => (base.to_string(), Condition::Lt(value.clone())),
        (FieldType::Date, Some("_after")) => (base.to_string(), Condition::Gt(value.clone())),

        (FieldType::Date | FieldType::Number, Some("_between")) => match value.as_array() {
            Some(bounds) if bounds.len() == 2 => (
                base.to_string(),
                Condition::Between(bounds[0].clone(), bounds[1].clone()),
            ),
            _ => (key.to_string(), Condition::Eq(value.clone())),
        },

        (FieldType::Number, Some("_lt")) => (base.to_string(), Condition::Lt(value.clone())),
        (FieldType::Number, Some("_lte")) => (base.to_string(), Condition::Lte(value.clone())),
        (FieldType::Number, Some("_gt")) => (base.to_string(), Condition::Gt(value.clone())),
        (FieldType::Number, Some("_gte")) => (base.to_string(), Condition::Gte(value.clone())),

        // Bare equality; raw number input is coerced first.
        (FieldType::Number, None) => (base.to_string(), Condition::Eq(coerce_number(value))),
        (_, None) => (base.to_string(), Condition::Eq(value.clone())),

        // Types without operator handling match on the bare field.
        (FieldType::Boolean | FieldType::Reference, Some(_)) => {
            (base.to_string(), Condition::Eq(value.clone()))
        }

        // Declared field, but the suffix has no branch for its type:
        // fall back to verbatim equality on the original key.
        _ => (key.to_string(), Condition::Eq(value.clone())),
    }
}

fn string_condition(
    base: &str,
    value: &Value,
    make: impl Fn(String) -> Condition,
) -> (String, Condition) {
    match value.as_str() {
        Some(s) if !s.is_empty() => (base.to_string(), make(s.to_string())),
        // Empty or non-string input degrades to empty-string equality.
        _ => (base.to_string(), Condition::Eq(Value::String(String::new()))),
    }
}

fn as_elements(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

fn coerce_number(value: &Value) -> Value {
    if let Value::String(s) = value {
        if let Ok(n) = s.trim().parse::<i64>() {
            return Value::from(n);
        }
        if let Some(n) = s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .and_then(serde_json::Number::from_f64)
        {
            return Value::Number(n);
        }
    }
    value.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldDescriptor;
    use serde_json::json;

    fn fields() -> FieldSchema {
        [
            ("name", FieldDescriptor::scalar(FieldType::String)),
            ("points", FieldDescriptor::scalar(FieldType::Number)),
            ("completed", FieldDescriptor::scalar(FieldType::Boolean)),
            ("deadline", FieldDescriptor::scalar(FieldType::Date)),
            ("tags", FieldDescriptor::array(FieldType::String)),
        ]
        .into_iter()
        .map(|(name, d)| (name.to_string(), d))
        .collect()
    }

    #[test]
    fn compiles_string_operators() {
        let filter = compile(&fields(), &json!({"name_contains": "x"}));
        assert_eq!(filter.get("name"), Some(&Condition::Contains("x".into())));

        let filter = compile(&fields(), &json!({"name_starts_with": "ab"}));
        assert_eq!(filter.get("name"), Some(&Condition::StartsWith("ab".into())));

        let filter = compile(&fields(), &json!({"name_ends_with": "yz"}));
        assert_eq!(filter.get("name"), Some(&Condition::EndsWith("yz".into())));

        // Empty needle degrades to empty-string equality.
        let filter = compile(&fields(), &json!({"name_contains": ""}));
        assert_eq!(filter.get("name"), Some(&Condition::Eq(json!(""))));
    }

    #[test]
    fn compiles_array_operators() {
        let filter = compile(&fields(), &json!({"tags_includes": ["a", "b"]}));
        assert_eq!(
            filter.get("tags"),
            Some(&Condition::All(vec![json!("a"), json!("b")]))
        );

        let filter = compile(&fields(), &json!({"tags_excludes": ["a", "b"]}));
        assert_eq!(
            filter.get("tags"),
            Some(&Condition::NotIn(vec![json!("a"), json!("b")]))
        );

        // A scalar operand is treated as a one-element set.
        let filter = compile(&fields(), &json!({"tags_includes": "solo"}));
        assert_eq!(filter.get("tags"), Some(&Condition::All(vec![json!("solo")])));
    }

    #[test]
    fn compiles_date_operators() {
        let filter = compile(&fields(), &json!({"deadline_before": "2021-01-01"}));
        assert_eq!(filter.get("deadline"), Some(&Condition::Lt(json!("2021-01-01"))));

        let filter = compile(&fields(), &json!({"deadline_after": "2021-01-01"}));
        assert_eq!(filter.get("deadline"), Some(&Condition::Gt(json!("2021-01-01"))));

        let filter = compile(
            &fields(),
            &json!({"deadline_between": ["2021-01-01", "2021-12-31"]}),
        );
        assert_eq!(
            filter.get("deadline"),
            Some(&Condition::Between(json!("2021-01-01"), json!("2021-12-31")))
        );
    }

    #[test]
    fn compiles_number_operators() {
        let cases = [
            ("points_lt", Condition::Lt(json!(1))),
            ("points_lte", Condition::Lte(json!(1))),
            ("points_gt", Condition::Gt(json!(1))),
            ("points_gte", Condition::Gte(json!(1))),
        ];
        for (key, expected) in cases {
            let filter = compile(&fields(), &json!({ key: 1 }));
            assert_eq!(filter.get("points"), Some(&expected), "{}", key);
        }

        let filter = compile(&fields(), &json!({"points_between": [5, 10]}));
        assert_eq!(
            filter.get("points"),
            Some(&Condition::Between(json!(5), json!(10)))
        );
    }

    #[test]
    fn bare_number_keys_coerce_the_value() {
        let filter = compile(&fields(), &json!({"points": "10"}));
        assert_eq!(filter.get("points"), Some(&Condition::Eq(json!(10))));
    }

    #[test]
    fn drops_undeclared_fields() {
        let filter = compile(&fields(), &json!({"nope": 1, "nope_contains": "x"}));
        assert!(filter.is_empty());
    }

    #[test]
    fn unhandled_suffixes_fall_back_to_equality() {
        // String fields have no _lt branch: verbatim equality on the
        // original key (which no stored document carries).
        let filter = compile(&fields(), &json!({"name_lt": "x"}));
        assert_eq!(filter.get("name_lt"), Some(&Condition::Eq(json!("x"))));

        // Boolean fields have no operator branches at all: the suffix is
        // stripped and the bare field matched.
        let filter = compile(&fields(), &json!({"completed_lt": true}));
        assert_eq!(filter.get("completed"), Some(&Condition::Eq(json!(true))));
    }

    #[test]
    fn plain_equality_passes_through() {
        let filter = compile(&fields(), &json!({"completed": false, "name": "x"}));
        assert_eq!(filter.get("completed"), Some(&Condition::Eq(json!(false))));
        assert_eq!(filter.get("name"), Some(&Condition::Eq(json!("x"))));
    }
}
