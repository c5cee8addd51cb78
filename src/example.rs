use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use ulid::Ulid;
use xxhash_rust::xxh3::xxh3_128;

use crate::error::GenError;
use crate::mapper;
use crate::model::*;
use crate::schema_ast::TableSchema;
use crate::validate;

/// Business strings by column-name fragment, most specific first.
const TEXT_SAMPLES: &[(&str, &str)] = &[
    ("currency", "USD"),
    ("fee_category", "RECURRING"),
    ("fee_code", "MONTHLY_FEE"),
    ("adjust_reason", "REFUND"),
    ("invoice_num", "202506/000006200"),
    ("gl_code", "51501"),
    ("item_code", "V20071.0000"),
    ("payable_receivable", "RECEIVABLE"),
    ("ledger_account_key", "Incur.Plan"),
    ("short_desc", "Monthly subscription fee"),
    ("full_desc", "Standard monthly subscription fee for basic service plan"),
    ("country", "US"),
    ("timezone", "America/Los_Angeles"),
    ("email", "billing@example.com"),
    ("phone", "4155550100"),
    ("reason", "REFUND"),
    ("desc", "Monthly subscription fee"),
    ("note", "Manual adjustment approved"),
    ("name", "MerchantMcMerchantface"),
    ("status", "ACTIVE"),
    ("category", "RECURRING"),
    ("code", "MONTHLY_FEE"),
    ("type", "STANDARD"),
    ("frequency", "MONTHLY"),
    ("period", "MONTHLY"),
];

pub fn example_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 10, 1).unwrap_or_default()
}

pub fn example_date_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 10, 27)
        .and_then(|d| d.and_hms_micro_opt(10, 0, 0, 123_456))
        .unwrap_or_default()
}

pub fn build_example(schema: &TableSchema) -> Result<Instance, GenError> {
    let fields = mapper::map_columns(schema)?;
    Ok(example_for_fields(&schema.name, &fields))
}

pub fn example_for_fields(table: &str, fields: &[GeneratedField]) -> Instance {
    let mut instance = Instance::new();
    for field in fields {
        instance.push(field.name.clone(), example_value(table, field));
    }
    instance
}

fn example_value(table: &str, field: &GeneratedField) -> FieldValue {
    let name = field.name.to_ascii_lowercase();
    if field.field_type.is_optional() && is_soft_delete_marker(&name) {
        return FieldValue::Null;
    }
    if let Presence::Defaulted(DefaultValue::Literal(literal)) = &field.field_type.presence {
        if let Some(value) = validate::parse_literal(&field.field_type.kind, literal) {
            if validate::check_value(field, &value).is_ok() {
                return value;
            }
        }
    }

    match &field.field_type.kind {
        ValueKind::Integer { bound } => FieldValue::Integer(integer_example(&name, *bound)),
        ValueKind::String { max_length } => {
            FieldValue::Text(text_example(table, &name, *max_length))
        }
        ValueKind::DateTime => FieldValue::DateTime(example_date_time()),
        ValueKind::Date => FieldValue::Date(example_date()),
        ValueKind::Decimal {
            max_digits,
            decimal_places,
        } => FieldValue::Decimal(decimal_example(&name, *max_digits, *decimal_places)),
        ValueKind::Enum { variants } => {
            let chosen = variants
                .iter()
                .find(|v| v.as_str() == "ACTIVE")
                .or_else(|| variants.first());
            match chosen {
                Some(v) => FieldValue::Text(v.clone()),
                None => FieldValue::Null,
            }
        }
    }
}

fn is_soft_delete_marker(name: &str) -> bool {
    name.starts_with("deleted_") || name == "is_deleted"
}

fn is_identifier(name: &str) -> bool {
    name == "uuid" || name.ends_with("_uuid") || name.ends_with("_id")
}

fn integer_example(name: &str, bound: Option<IntBound>) -> i64 {
    let flag = name.starts_with("is_") || name.starts_with("exclude_") || name.ends_with("_flag");
    let preferred = if flag {
        0
    } else if name.ends_with("_order") {
        10
    } else {
        1
    };
    match bound {
        Some(bound) if !bound.admits(preferred) => 1,
        _ => preferred,
    }
}

fn text_example(table: &str, name: &str, max_length: u32) -> String {
    let max_length = max_length as usize;
    if is_identifier(name) {
        return identifier_token(table, name, max_length);
    }
    let sample = TEXT_SAMPLES
        .iter()
        .find(|(fragment, _)| name.contains(fragment))
        .map(|(_, sample)| sample.to_string())
        .unwrap_or_else(|| name.to_ascii_uppercase());
    sample.chars().take(max_length).collect()
}

/// ULID-style base32 token, stable for a given table and column. Columns
/// narrower than a full ULID keep its trailing random characters.
pub fn identifier_token(table: &str, column: &str, max_length: usize) -> String {
    let seed = xxh3_128(format!("{table}.{column}").as_bytes());
    let timestamp_ms = u64::try_from(example_date_time().and_utc().timestamp_millis())
        .unwrap_or_default();
    let token = Ulid::from_parts(timestamp_ms, seed).to_string();
    if max_length >= token.len() {
        token
    } else {
        token[token.len() - max_length..].to_string()
    }
}

fn decimal_example(name: &str, max_digits: u32, decimal_places: u32) -> Decimal {
    let (whole, fraction) = if name.contains("percent") || name.contains("rate") {
        (2i128, "50")
    } else {
        (29i128, "99")
    };
    let whole = match max_digits.saturating_sub(decimal_places) {
        0 => 0,
        1 => whole % 10,
        _ => whole,
    };
    let fraction: String = fraction
        .chars()
        .chain(std::iter::repeat('0'))
        .take(decimal_places as usize)
        .collect();
    let fraction_value: i128 = fraction.parse().unwrap_or(0);
    let mantissa = whole * 10i128.pow(decimal_places) + fraction_value;
    Decimal::try_from_i128_with_scale(mantissa, decimal_places)
        .or_else(|_| Decimal::try_from_i128_with_scale(fraction_value, decimal_places))
        .unwrap_or(Decimal::ZERO)
}
