use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{Local, NaiveDate, NaiveDateTime, SubsecRound};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::error::{GenError, ValidationDetail};
use crate::model::*;

const DATETIME_PARSE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

#[derive(Debug, Clone, Copy)]
pub enum Scope<'a> {
    Full,
    Only(&'a BTreeSet<String>),
}

pub fn parse_instance_text(
    model: &GeneratedModel,
    text: &str,
    scope: Scope<'_>,
) -> Result<Instance, GenError> {
    let render_error = |detail| GenError::RenderValidation {
        model: model.name.clone(),
        detail,
    };
    let value: Value = serde_json::from_str(text)
        .map_err(|e| render_error(ValidationDetail::new("$root", "valid JSON", e.to_string())))?;
    parse_instance(model, &value, scope).map_err(render_error)
}

pub fn parse_instance(
    model: &GeneratedModel,
    value: &Value,
    scope: Scope<'_>,
) -> Result<Instance, ValidationDetail> {
    let obj = value
        .as_object()
        .ok_or_else(|| ValidationDetail::new("$root", "object", json_type_name(value)))?;

    for key in obj.keys() {
        let declared = match scope {
            Scope::Full => model.field(key).is_some(),
            Scope::Only(names) => names.contains(key),
        };
        if !declared {
            return Err(ValidationDetail::extra_field(key.as_str()));
        }
    }

    let mut instance = Instance::new();
    for field in &model.fields {
        if let Scope::Only(names) = scope {
            if !names.contains(&field.name) {
                continue;
            }
        }
        let value = match obj.get(&field.name) {
            Some(json) => parse_value(field, json)?,
            None if matches!(scope, Scope::Only(_)) => {
                return Err(ValidationDetail::missing_field(field.name.as_str()));
            }
            None => missing_value(field)?,
        };
        instance.push(field.name.clone(), value);
    }

    Ok(instance)
}

pub fn check_instance(
    model: &GeneratedModel,
    instance: &Instance,
    scope: Scope<'_>,
) -> Result<(), ValidationDetail> {
    for (name, _) in instance.iter() {
        let declared = match scope {
            Scope::Full => model.field(name).is_some(),
            Scope::Only(names) => names.contains(name),
        };
        if !declared {
            return Err(ValidationDetail::extra_field(name));
        }
    }
    for field in &model.fields {
        if let Scope::Only(names) = scope {
            if !names.contains(&field.name) {
                continue;
            }
        }
        let value = instance
            .get(&field.name)
            .ok_or_else(|| ValidationDetail::missing_field(field.name.as_str()))?;
        check_value(field, value)?;
    }
    Ok(())
}

fn missing_value(field: &GeneratedField) -> Result<FieldValue, ValidationDetail> {
    match &field.field_type.presence {
        Presence::Optional => Ok(FieldValue::Null),
        Presence::Defaulted(DefaultValue::Literal(literal)) => {
            parse_literal(&field.field_type.kind, literal)
                .ok_or_else(|| {
                    ValidationDetail::new(
                        field.name.as_str(),
                        format!("default usable as {}", field.field_type.kind.type_name()),
                        literal.as_str(),
                    )
                })
                .and_then(|value| {
                    check_value(field, &value)?;
                    Ok(value)
                })
        }
        Presence::Defaulted(DefaultValue::CurrentTimestamp) => match field.field_type.kind {
            ValueKind::Date => Ok(FieldValue::Date(Local::now().date_naive())),
            ValueKind::DateTime => Ok(FieldValue::DateTime(
                Local::now().naive_local().trunc_subsecs(6),
            )),
            _ => Err(ValidationDetail::missing_field(field.name.as_str())),
        },
        Presence::Required => Err(ValidationDetail::missing_field(field.name.as_str())),
    }
}

pub fn parse_value(field: &GeneratedField, json: &Value) -> Result<FieldValue, ValidationDetail> {
    let name = field.name.as_str();
    let kind = &field.field_type.kind;
    let mismatch = || ValidationDetail::new(name, expected_json(kind), json_type_name(json));

    let value = match (kind, json) {
        (_, Value::Null) => FieldValue::Null,
        (ValueKind::Integer { .. }, Value::Number(n)) => {
            FieldValue::Integer(n.as_i64().ok_or_else(mismatch)?)
        }
        (ValueKind::String { .. } | ValueKind::Enum { .. }, Value::String(s)) => {
            FieldValue::Text(s.clone())
        }
        (ValueKind::Date, Value::String(s)) => FieldValue::Date(
            parse_date(s).ok_or_else(|| ValidationDetail::new(name, "ISO-8601 date", s.as_str()))?,
        ),
        (ValueKind::DateTime, Value::String(s)) => FieldValue::DateTime(
            parse_date_time(s)
                .ok_or_else(|| ValidationDetail::new(name, "ISO-8601 date-time", s.as_str()))?,
        ),
        (
            ValueKind::Decimal {
                max_digits,
                decimal_places,
            },
            Value::String(s),
        ) => FieldValue::Decimal(parse_decimal(name, s, *max_digits, *decimal_places)?),
        (
            ValueKind::Decimal {
                max_digits,
                decimal_places,
            },
            Value::Number(n),
        ) => FieldValue::Decimal(parse_decimal(
            name,
            &n.to_string(),
            *max_digits,
            *decimal_places,
        )?),
        _ => return Err(mismatch()),
    };

    check_value(field, &value)?;
    Ok(value)
}

pub fn parse_literal(kind: &ValueKind, literal: &str) -> Option<FieldValue> {
    match kind {
        ValueKind::Integer { .. } => literal.trim().parse().ok().map(FieldValue::Integer),
        ValueKind::String { .. } | ValueKind::Enum { .. } => {
            Some(FieldValue::Text(literal.to_string()))
        }
        ValueKind::Date => parse_date(literal).map(FieldValue::Date),
        ValueKind::DateTime => parse_date_time(literal).map(FieldValue::DateTime),
        ValueKind::Decimal { decimal_places, .. } => {
            let mut d = Decimal::from_str(literal.trim()).ok()?;
            if d.scale() < *decimal_places {
                d.rescale(*decimal_places);
            }
            Some(FieldValue::Decimal(d))
        }
    }
}

/// Digit counts come from the text first, so a column wider than `Decimal`
/// still gets a precision error rather than a parse error.
fn parse_decimal(
    name: &str,
    text: &str,
    max_digits: u32,
    decimal_places: u32,
) -> Result<Decimal, ValidationDetail> {
    let Some((whole, fraction)) = decimal_text_digits(text) else {
        return Err(ValidationDetail::new(name, "decimal", text));
    };
    check_digits(name, text, whole, fraction, max_digits, decimal_places)?;
    // Too many significant digits either overflows or rounds the fraction.
    Decimal::from_str(text)
        .ok()
        .filter(|d| d.normalize().scale() == fraction)
        .ok_or_else(|| ValidationDetail::new(name, "decimal within 28 significant digits", text))
}

fn decimal_text_digits(text: &str) -> Option<(u32, u32)> {
    let unsigned = text.strip_prefix(['-', '+']).unwrap_or(text);
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }
    let whole = whole.trim_start_matches('0').len();
    let fraction = fraction.trim_end_matches('0').len();
    Some((u32::try_from(whole).ok()?, u32::try_from(fraction).ok()?))
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).ok()
}

fn parse_date_time(s: &str) -> Option<NaiveDateTime> {
    DATETIME_PARSE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
}

pub fn check_value(field: &GeneratedField, value: &FieldValue) -> Result<(), ValidationDetail> {
    let name = field.name.as_str();
    match (&field.field_type.kind, value) {
        (_, FieldValue::Null) => {
            if field.field_type.is_optional() {
                Ok(())
            } else {
                Err(ValidationDetail::null_value(name))
            }
        }
        (ValueKind::Integer { bound }, FieldValue::Integer(n)) => match bound {
            Some(bound) if !bound.admits(*n) => Err(ValidationDetail::new(
                name,
                format!("value {bound}"),
                n.to_string(),
            )),
            _ => Ok(()),
        },
        (ValueKind::String { max_length }, FieldValue::Text(s)) => {
            let length = s.chars().count();
            if length > *max_length as usize {
                Err(ValidationDetail::new(
                    name,
                    format!("at most {max_length} characters"),
                    format!("{length} characters"),
                ))
            } else {
                Ok(())
            }
        }
        (ValueKind::Enum { variants }, FieldValue::Text(s)) => {
            if variants.iter().any(|v| v == s) {
                Ok(())
            } else {
                Err(ValidationDetail::new(
                    name,
                    format!("one of {}", variants.join(", ")),
                    format!("'{s}'"),
                ))
            }
        }
        (ValueKind::Date, FieldValue::Date(_)) | (ValueKind::DateTime, FieldValue::DateTime(_)) => {
            Ok(())
        }
        (
            ValueKind::Decimal {
                max_digits,
                decimal_places,
            },
            FieldValue::Decimal(d),
        ) => check_decimal(name, d, *max_digits, *decimal_places),
        (kind, other) => Err(ValidationDetail::new(
            name,
            kind.type_name(),
            value_type_name(other),
        )),
    }
}

fn check_decimal(
    name: &str,
    value: &Decimal,
    max_digits: u32,
    decimal_places: u32,
) -> Result<(), ValidationDetail> {
    let normalized = value.normalize();
    let scale = normalized.scale();
    let digits = digit_count(normalized.mantissa().unsigned_abs());
    let whole_digits = digits.saturating_sub(scale);
    check_digits(
        name,
        &value.to_string(),
        whole_digits,
        scale,
        max_digits,
        decimal_places,
    )
}

fn check_digits(
    name: &str,
    shown: &str,
    whole_digits: u32,
    fraction_digits: u32,
    max_digits: u32,
    decimal_places: u32,
) -> Result<(), ValidationDetail> {
    if fraction_digits > decimal_places {
        return Err(ValidationDetail::new(
            name,
            format!("at most {decimal_places} fractional digits"),
            format!("{fraction_digits} in {shown}"),
        ));
    }
    let max_whole = max_digits.saturating_sub(decimal_places);
    if whole_digits > max_whole {
        return Err(ValidationDetail::new(
            name,
            format!("at most {max_whole} digits before the decimal point"),
            format!("{whole_digits} in {shown}"),
        ));
    }
    Ok(())
}

fn digit_count(mut n: u128) -> u32 {
    if n == 0 {
        return 0;
    }
    let mut count = 0;
    while n > 0 {
        n /= 10;
        count += 1;
    }
    count
}

fn expected_json(kind: &ValueKind) -> &'static str {
    match kind {
        ValueKind::Integer { .. } => "integer",
        ValueKind::String { .. } | ValueKind::Enum { .. } => "string",
        ValueKind::Date => "ISO-8601 date string",
        ValueKind::DateTime => "ISO-8601 date-time string",
        ValueKind::Decimal { .. } => "decimal string",
    }
}

fn value_type_name(value: &FieldValue) -> &'static str {
    match value {
        FieldValue::Null => "null",
        FieldValue::Integer(_) => "integer",
        FieldValue::Text(_) => "string",
        FieldValue::Date(_) => "date",
        FieldValue::DateTime(_) => "date-time",
        FieldValue::Decimal(_) => "decimal",
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn field(name: &str, field_type: FieldType) -> GeneratedField {
        GeneratedField {
            name: name.into(),
            field_type,
            description: None,
        }
    }

    fn model(fields: Vec<GeneratedField>, minimal: &[&str]) -> GeneratedModel {
        GeneratedModel {
            name: "test".into(),
            type_name: "Test".into(),
            table: "test".into(),
            fields,
            minimal_fields: minimal.iter().map(|s| s.to_string()).collect(),
            example: Instance::new(),
        }
    }

    fn decimal_field(m: u32, d: u32) -> GeneratedField {
        field(
            "amount",
            FieldType::required(ValueKind::Decimal {
                max_digits: m,
                decimal_places: d,
            }),
        )
    }

    #[test]
    fn decimal_rejects_extra_fractional_digits() {
        let f = decimal_field(12, 4);
        let err = parse_value(&f, &json!("1.23456")).unwrap_err();
        assert!(err.expected.contains("4 fractional"), "got: {err}");
        assert!(parse_value(&f, &json!("1.2345")).is_ok());
    }

    #[test]
    fn decimal_trailing_zeros_do_not_count() {
        let f = decimal_field(5, 2);
        assert!(parse_value(&f, &json!("2.5000")).is_ok());
    }

    #[test]
    fn decimal_rejects_too_many_whole_digits() {
        let f = decimal_field(5, 2);
        assert!(parse_value(&f, &json!("1234.5")).is_err());
        assert!(parse_value(&f, &json!("-999.99")).is_ok());
    }

    #[test]
    fn wide_decimal_is_checked_on_its_digits() {
        let f = decimal_field(30, 2);
        assert_eq!(
            parse_value(&f, &json!("123456789012345678901234.50")).unwrap(),
            FieldValue::Decimal(Decimal::from_str("123456789012345678901234.50").unwrap())
        );
        let err = parse_value(&f, &json!("1234567890123456789012345678901")).unwrap_err();
        assert!(err.expected.contains("28 digits before"), "got: {err}");
        let err = parse_value(&f, &json!("9999999999999999999999999999.99")).unwrap_err();
        assert!(err.expected.contains("28 significant"), "got: {err}");
        assert!(parse_value(&f, &json!("12x")).is_err());
    }

    #[test]
    fn literal_decimal_carries_column_scale() {
        let kind = ValueKind::Decimal {
            max_digits: 5,
            decimal_places: 2,
        };
        let value = parse_literal(&kind, "0").unwrap();
        assert_eq!(value.to_json(), json!("0.00"));
        assert_eq!(parse_literal(&kind, "1.5").unwrap().to_json(), json!("1.50"));
        assert_eq!(parse_literal(&kind, "1.234").unwrap().to_json(), json!("1.234"));
    }

    #[test]
    fn decimal_accepts_json_number() {
        let f = decimal_field(12, 3);
        assert_eq!(
            parse_value(&f, &json!(9.99)).unwrap(),
            FieldValue::Decimal(Decimal::from_str("9.99").unwrap())
        );
    }

    #[test]
    fn enum_rejects_outside_value() {
        let f = field(
            "status",
            FieldType::required(ValueKind::Enum {
                variants: vec![
                    "SETUP".into(),
                    "ACTIVE".into(),
                    "DEPRECATED".into(),
                    "DELETED".into(),
                ],
            }),
        );
        assert!(parse_value(&f, &json!("ACTIVE")).is_ok());
        let err = parse_value(&f, &json!("ARCHIVED")).unwrap_err();
        assert_eq!(err.field, "status");
    }

    #[test]
    fn string_length_is_enforced() {
        let f = field("uuid", FieldType::required(ValueKind::String { max_length: 26 }));
        assert!(parse_value(&f, &json!("01H8X7Y7Z7QWERTYUIOPASDFGH")).is_ok());
        assert!(parse_value(&f, &json!("01H8X7Y7Z7QWERTYUIOPASDFGHX")).is_err());
    }

    #[test]
    fn integer_bound_is_enforced() {
        let f = field(
            "id",
            FieldType::required(ValueKind::Integer {
                bound: Some(IntBound::Gt(0)),
            }),
        );
        assert!(parse_value(&f, &json!(0)).is_err());
        assert!(parse_value(&f, &json!(1)).is_ok());
        assert!(parse_value(&f, &json!("1")).is_err());
    }

    #[test]
    fn date_time_must_be_iso_string() {
        let f = field("created_timestamp", FieldType::required(ValueKind::DateTime));
        assert!(parse_value(&f, &json!("2023-10-27T10:00:00.123456")).is_ok());
        let err = parse_value(&f, &json!(1698400800)).unwrap_err();
        assert!(err.expected.contains("ISO-8601"), "got: {err}");
        assert!(parse_value(&f, &json!("27/10/2023")).is_err());
    }

    #[test]
    fn null_only_for_optional() {
        let required = field("fee_code", FieldType::required(ValueKind::String { max_length: 25 }));
        assert!(parse_value(&required, &Value::Null).is_err());
        let optional = field("full_desc", FieldType::optional(ValueKind::String { max_length: 25 }));
        assert_eq!(parse_value(&optional, &Value::Null).unwrap(), FieldValue::Null);
    }

    #[test]
    fn full_scope_rejects_undeclared_and_missing_fields() {
        let m = model(
            vec![field("fee_code", FieldType::required(ValueKind::String { max_length: 25 }))],
            &["fee_code"],
        );
        let err = parse_instance(&m, &json!({"fee_code": "X", "other": 1}), Scope::Full).unwrap_err();
        assert_eq!(err, ValidationDetail::extra_field("other"));
        let err = parse_instance(&m, &json!({}), Scope::Full).unwrap_err();
        assert_eq!(err, ValidationDetail::missing_field("fee_code"));
    }

    #[test]
    fn full_scope_fills_optional_and_defaults() {
        let m = model(
            vec![
                field("full_desc", FieldType::optional(ValueKind::String { max_length: 25 })),
                field(
                    "currency",
                    FieldType {
                        kind: ValueKind::String { max_length: 3 },
                        presence: Presence::Defaulted(DefaultValue::Literal("USD".into())),
                    },
                ),
            ],
            &["currency"],
        );
        let instance = parse_instance(&m, &json!({}), Scope::Full).unwrap();
        assert_eq!(instance.get("full_desc"), Some(&FieldValue::Null));
        assert_eq!(instance.get("currency"), Some(&FieldValue::Text("USD".into())));
    }

    #[test]
    fn only_scope_requires_exact_field_set() {
        let m = model(
            vec![
                field("fee_code", FieldType::required(ValueKind::String { max_length: 25 })),
                field("short_desc", FieldType::optional(ValueKind::String { max_length: 40 })),
            ],
            &["fee_code"],
        );
        let only = &m.minimal_fields;
        assert!(parse_instance(&m, &json!({"fee_code": "X"}), Scope::Only(only)).is_ok());
        assert!(
            parse_instance(&m, &json!({"fee_code": "X", "short_desc": "y"}), Scope::Only(only))
                .is_err()
        );
        assert!(parse_instance(&m, &json!({}), Scope::Only(only)).is_err());
    }

    #[test]
    fn check_instance_requires_every_field() {
        let m = model(
            vec![field("fee_code", FieldType::required(ValueKind::String { max_length: 5 }))],
            &["fee_code"],
        );
        let mut instance = Instance::new();
        assert_eq!(
            check_instance(&m, &instance, Scope::Full).unwrap_err(),
            ValidationDetail::missing_field("fee_code")
        );
        instance.push("fee_code", FieldValue::Text("MONTHLY_FEE".into()));
        let err = check_instance(&m, &instance, Scope::Full).unwrap_err();
        assert_eq!(err.field, "fee_code");
    }

    #[test]
    fn non_object_root_is_rejected() {
        let m = model(Vec::new(), &[]);
        let err = parse_instance(&m, &json!([1, 2]), Scope::Full).unwrap_err();
        assert_eq!(err.field, "$root");
    }

    #[test]
    fn invalid_json_text_is_a_render_error() {
        let m = model(Vec::new(), &[]);
        let err = parse_instance_text(&m, "{not json", Scope::Full).unwrap_err();
        assert_eq!(err.exit_code(), 5);
    }
}
