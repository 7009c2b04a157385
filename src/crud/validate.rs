//! Structural validator for write bodies.
//!
//! Pure: builds a per-field rule from the declared type and `required` flag
//! and checks the raw input against it, collecting every field's error
//! instead of stopping at the first. In editing mode no field is required,
//! so partial patches never have to re-supply existing values. Keys not
//! declared in the schema are dropped from the output.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::model::{FieldDescriptor, FieldSchema, FieldType};
use crate::store::memory::parse_iso_datetime;
use crate::store::Document;

/// Field-keyed human-readable messages, returned as the 400 body verbatim.
pub type FieldErrors = BTreeMap<String, String>;

pub fn validate(
    fields: &FieldSchema,
    input: &Value,
    is_editing: bool,
) -> Result<Document, FieldErrors> {
    let empty = Document::new();
    let input = input.as_object().unwrap_or(&empty);

    let mut value = Document::new();
    let mut errors = FieldErrors::new();

    for (name, descriptor) in fields {
        let required = !is_editing && descriptor.opts.required;
        match input.get(name) {
            None | Some(Value::Null) if required => {
                errors.insert(name.clone(), format!("{} is required", name));
            }
            None => {}
            Some(Value::Null) => {
                value.insert(name.clone(), Value::Null);
            }
            Some(raw) => match check_value(name, raw, descriptor) {
                Ok(checked) => {
                    value.insert(name.clone(), checked);
                }
                Err(message) => {
                    errors.insert(name.clone(), message);
                }
            },
        }
    }

    if errors.is_empty() {
        Ok(value)
    } else {
        Err(errors)
    }
}

fn check_value(field: &str, raw: &Value, descriptor: &FieldDescriptor) -> Result<Value, String> {
    match descriptor.field_type {
        FieldType::Array => {
            let Value::Array(items) = raw else {
                return Err(format!("{} must be an array", field));
            };
            // Registry validation guarantees list_type is present.
            let element_type = descriptor.list_type.unwrap_or(FieldType::String);
            let mut checked = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                let label = format!("{}[{}]", field, index);
                checked.push(check_scalar(&label, item, element_type)?);
            }
            Ok(Value::Array(checked))
        }
        scalar => check_scalar(field, raw, scalar),
    }
}

fn check_scalar(label: &str, raw: &Value, field_type: FieldType) -> Result<Value, String> {
    match field_type {
        FieldType::String => match raw {
            Value::String(_) => Ok(raw.clone()),
            _ => Err(format!("{} must be a string", label)),
        },
        FieldType::Number => check_number(label, raw),
        FieldType::Boolean => check_boolean(label, raw),
        FieldType::Date => check_date(label, raw),
        // Backend id format is not validated here, only that it is a string.
        FieldType::Reference => match raw {
            Value::String(_) => Ok(raw.clone()),
            _ => Err(format!("{} must be a string", label)),
        },
        FieldType::Array => Err(format!("{} must be a {}", label, field_type.label())),
    }
}

fn check_number(label: &str, raw: &Value) -> Result<Value, String> {
    match raw {
        Value::Number(_) => Ok(raw.clone()),
        // Numeric strings pass and are coerced.
        Value::String(s) => {
            if let Ok(n) = s.trim().parse::<i64>() {
                return Ok(Value::from(n));
            }
            s.trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| format!("{} must be a number", label))
        }
        _ => Err(format!("{} must be a number", label)),
    }
}

fn check_boolean(label: &str, raw: &Value) -> Result<Value, String> {
    match raw {
        Value::Bool(_) => Ok(raw.clone()),
        Value::String(s) if s == "true" => Ok(Value::Bool(true)),
        Value::String(s) if s == "false" => Ok(Value::Bool(false)),
        _ => Err(format!("{} must be a boolean", label)),
    }
}

fn check_date(label: &str, raw: &Value) -> Result<Value, String> {
    let parsed: Option<DateTime<Utc>> = match raw {
        Value::String(s) => parse_iso_datetime(s),
        // Epoch milliseconds are accepted alongside date strings.
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    };

    parsed
        .map(|dt| Value::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true)))
        .ok_or_else(|| format!("{} must be in ISO 8601 date format", label))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldDescriptor;
    use serde_json::json;

    fn schema(entries: Vec<(&str, FieldDescriptor)>) -> FieldSchema {
        entries
            .into_iter()
            .map(|(name, d)| (name.to_string(), d))
            .collect()
    }

    fn single(field_type: FieldType) -> FieldSchema {
        schema(vec![("desc", FieldDescriptor::scalar(field_type))])
    }

    #[test]
    fn checks_strings() {
        let fields = single(FieldType::String);
        assert!(validate(&fields, &json!({"desc": "string"}), false).is_ok());

        let errors = validate(&fields, &json!({"desc": 2134}), false).unwrap_err();
        assert_eq!(errors["desc"], "desc must be a string");
        let errors = validate(&fields, &json!({"desc": true}), false).unwrap_err();
        assert_eq!(errors["desc"], "desc must be a string");
    }

    #[test]
    fn checks_numbers_with_string_coercion() {
        let fields = single(FieldType::Number);
        assert!(validate(&fields, &json!({"desc": 1234}), false).is_ok());

        // Numeric strings coerce; everything else fails.
        let value = validate(&fields, &json!({"desc": "123"}), false).unwrap();
        assert_eq!(value["desc"], json!(123));

        let errors = validate(&fields, &json!({"desc": "string"}), false).unwrap_err();
        assert_eq!(errors["desc"], "desc must be a number");
        let errors = validate(&fields, &json!({"desc": true}), false).unwrap_err();
        assert_eq!(errors["desc"], "desc must be a number");
    }

    #[test]
    fn checks_booleans() {
        let fields = single(FieldType::Boolean);
        assert!(validate(&fields, &json!({"desc": true}), false).is_ok());

        let value = validate(&fields, &json!({"desc": "false"}), false).unwrap();
        assert_eq!(value["desc"], json!(false));

        let errors = validate(&fields, &json!({"desc": "string"}), false).unwrap_err();
        assert_eq!(errors["desc"], "desc must be a boolean");
        let errors = validate(&fields, &json!({"desc": 12345}), false).unwrap_err();
        assert_eq!(errors["desc"], "desc must be a boolean");
    }

    #[test]
    fn checks_dates() {
        let fields = single(FieldType::Date);
        let value = validate(&fields, &json!({"desc": "2020-12-16T08:54:48.717Z"}), false).unwrap();
        assert_eq!(value["desc"], json!("2020-12-16T08:54:48.717Z"));

        // Date-only input normalizes to a full timestamp.
        let value = validate(&fields, &json!({"desc": "2020-12-16"}), false).unwrap();
        assert_eq!(value["desc"], json!("2020-12-16T00:00:00.000Z"));

        let errors = validate(&fields, &json!({"desc": "a random string"}), false).unwrap_err();
        assert_eq!(errors["desc"], "desc must be in ISO 8601 date format");
    }

    #[test]
    fn collects_every_required_field_error() {
        let fields = schema(vec![
            ("desc", FieldDescriptor::scalar(FieldType::String).required()),
            ("amount", FieldDescriptor::scalar(FieldType::Number).required()),
            ("completed", FieldDescriptor::scalar(FieldType::Boolean).required()),
            ("date", FieldDescriptor::scalar(FieldType::Date).required()),
            ("arr", FieldDescriptor::array(FieldType::String).required()),
        ]);

        let errors = validate(&fields, &json!({}), false).unwrap_err();
        assert_eq!(errors["desc"], "desc is required");
        assert_eq!(errors["amount"], "amount is required");
        assert_eq!(errors["completed"], "completed is required");
        assert_eq!(errors["date"], "date is required");
        assert_eq!(errors["arr"], "arr is required");
        assert_eq!(errors.len(), 5);
    }

    #[test]
    fn editing_mode_relaxes_required_fields() {
        let fields = schema(vec![
            ("desc", FieldDescriptor::scalar(FieldType::String).required()),
            ("amount", FieldDescriptor::scalar(FieldType::Number)),
        ]);

        // Only supplied fields are checked.
        let value = validate(&fields, &json!({"amount": 3}), true).unwrap();
        assert_eq!(value.len(), 1);
        assert_eq!(value["amount"], json!(3));

        // Type rules still apply to whatever is supplied.
        let errors = validate(&fields, &json!({"desc": 7}), true).unwrap_err();
        assert_eq!(errors["desc"], "desc must be a string");
    }

    #[test]
    fn drops_undeclared_keys() {
        let fields = single(FieldType::String);
        let value = validate(
            &fields,
            &json!({"desc": "keep", "sneaky": "drop", "user": "drop"}),
            false,
        )
        .unwrap();
        assert_eq!(value.len(), 1);
        assert!(value.contains_key("desc"));
    }

    #[test]
    fn checks_array_elements() {
        let fields = schema(vec![("tags", FieldDescriptor::array(FieldType::String))]);

        assert!(validate(&fields, &json!({"tags": ["a", "b"]}), false).is_ok());

        let errors = validate(&fields, &json!({"tags": "not a list"}), false).unwrap_err();
        assert_eq!(errors["tags"], "tags must be an array");

        let errors = validate(&fields, &json!({"tags": ["a", 2]}), false).unwrap_err();
        assert_eq!(errors["tags"], "tags[1] must be a string");
    }

    #[test]
    fn null_clears_optional_fields() {
        let fields = single(FieldType::String);
        let value = validate(&fields, &json!({"desc": null}), true).unwrap();
        assert_eq!(value["desc"], Value::Null);
    }
}
