use std::collections::HashSet;

use convert_case::{Case, Casing};
use log::{debug, info, warn};

use crate::error::GenError;
use crate::example;
use crate::minimal::{self, MinimalFieldPolicy};
use crate::model::*;
use crate::renderer;
use crate::schema_ast::*;
use crate::validate::{self, Scope};

const MAX_DECIMAL_PRECISION: u32 = 65;
/// `rust_decimal` cannot carry a larger scale.
const MAX_DECIMAL_SCALE: u32 = 28;

pub fn map_column_type(table: &str, column: &ColumnDefinition) -> Result<FieldType, GenError> {
    let unrecognized = || GenError::UnrecognizedType {
        table: table.to_string(),
        column: column.name.clone(),
        sql_type: column.sql_type.to_string(),
    };

    let kind = match &column.sql_type {
        SqlType::Integer { unsigned, .. } | SqlType::SmallInt { unsigned, .. } => {
            let bound = if column.auto_increment {
                Some(IntBound::Gt(0))
            } else if *unsigned {
                Some(IntBound::Ge(0))
            } else {
                None
            };
            ValueKind::Integer { bound }
        }
        SqlType::Char(n) | SqlType::VarChar(n) => ValueKind::String { max_length: *n },
        SqlType::Date => ValueKind::Date,
        SqlType::Timestamp { .. } => ValueKind::DateTime,
        SqlType::Decimal { precision, scale } => {
            if *precision == 0
                || *precision > MAX_DECIMAL_PRECISION
                || *scale > MAX_DECIMAL_SCALE
                || scale > precision
            {
                return Err(unrecognized());
            }
            ValueKind::Decimal {
                max_digits: *precision,
                decimal_places: *scale,
            }
        }
        SqlType::Enum(variants) => ValueKind::Enum {
            variants: variants.clone(),
        },
        SqlType::Unrecognized(_) => return Err(unrecognized()),
    };

    let presence = if column.nullable {
        Presence::Optional
    } else {
        match &column.default {
            ColumnDefault::Literal(value) => Presence::Defaulted(DefaultValue::Literal(value.clone())),
            ColumnDefault::CurrentTimestamp => Presence::Defaulted(DefaultValue::CurrentTimestamp),
            ColumnDefault::None | ColumnDefault::Null => Presence::Required,
        }
    };

    Ok(FieldType { kind, presence })
}

pub fn map_columns(schema: &TableSchema) -> Result<Vec<GeneratedField>, GenError> {
    schema
        .columns
        .iter()
        .map(|column| -> Result<GeneratedField, GenError> {
            Ok(GeneratedField {
                name: column.name.clone(),
                field_type: map_column_type(&schema.name, column)?,
                description: column.comment.clone(),
            })
        })
        .collect()
}

pub fn model_name(table: &str) -> String {
    table.to_case(Case::Kebab)
}

pub fn type_name(table: &str) -> String {
    table.to_case(Case::Pascal)
}

/// Map, select, build the example, and confirm the example survives a
/// render/parse round trip. No partially generated model is ever returned.
pub fn generate(
    schema: &TableSchema,
    policy: &dyn MinimalFieldPolicy,
) -> Result<GeneratedModel, GenError> {
    let fields = map_columns(schema)?;
    debug!("{}: mapped {} columns", schema.name, fields.len());

    let minimal_fields = minimal::select_minimal_fields(schema, policy)?;
    let example = example::example_for_fields(&schema.name, &fields);

    let model = GeneratedModel {
        name: model_name(&schema.name),
        type_name: type_name(&schema.name),
        table: schema.name.clone(),
        fields,
        minimal_fields,
        example,
    };
    validate::check_instance(&model, &model.example, Scope::Full).map_err(|detail| {
        GenError::RenderValidation {
            model: model.name.clone(),
            detail,
        }
    })?;
    renderer::self_check(&model, &renderer::report(&model)?)?;

    info!(
        "generated {} ({} fields, minimal: {:?})",
        model.type_name,
        model.fields.len(),
        model.minimal_fields
    );
    Ok(model)
}

#[derive(Debug)]
pub struct Outcome {
    pub table: String,
    pub result: Result<GeneratedModel, GenError>,
}

pub fn generate_all(schemas: &[TableSchema], policy: &dyn MinimalFieldPolicy) -> Vec<Outcome> {
    let mut seen: HashSet<&str> = HashSet::new();
    schemas
        .iter()
        .map(|schema| {
            let result = if seen.insert(schema.name.as_str()) {
                generate(schema, policy)
            } else {
                Err(GenError::DuplicateTable(schema.name.clone()))
            };
            if let Err(e) = &result {
                warn!("{}: {e}", schema.name);
            }
            Outcome {
                table: schema.name.clone(),
                result,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::minimal::BillingRelevance;
    use pretty_assertions::assert_eq;

    fn map(column: ColumnDefinition) -> FieldType {
        map_column_type("t", &column).unwrap()
    }

    #[test]
    fn bigint_unsigned_auto_increment_is_positive_integer() {
        let ty = map(
            ColumnDefinition::new(
                "id",
                SqlType::Integer {
                    width: IntWidth::Big,
                    unsigned: true,
                },
            )
            .auto_increment(),
        );
        assert_eq!(
            ty,
            FieldType::required(ValueKind::Integer {
                bound: Some(IntBound::Gt(0))
            })
        );
    }

    #[test]
    fn char_and_varchar_carry_max_length() {
        assert_eq!(
            map(ColumnDefinition::new("uuid", SqlType::Char(26))),
            FieldType::required(ValueKind::String { max_length: 26 })
        );
        assert_eq!(
            map(ColumnDefinition::new("fee_code", SqlType::VarChar(25))),
            FieldType::required(ValueKind::String { max_length: 25 })
        );
    }

    #[test]
    fn nullable_varchar_is_optional() {
        assert_eq!(
            map(ColumnDefinition::new("full_desc", SqlType::VarChar(255)).nullable()),
            FieldType::optional(ValueKind::String { max_length: 255 })
        );
    }

    #[test]
    fn nullability_overrides_every_base_type() {
        let types = [
            SqlType::Date,
            SqlType::Timestamp { fsp: 6 },
            SqlType::Decimal {
                precision: 5,
                scale: 2,
            },
            SqlType::SmallInt {
                width: SmallWidth::Small,
                unsigned: true,
            },
            SqlType::Enum(vec!["A".into()]),
            SqlType::Char(3),
        ];
        for sql_type in types {
            let ty = map(
                ColumnDefinition::new("c", sql_type.clone())
                    .nullable()
                    .with_default(ColumnDefault::Literal("x".into())),
            );
            assert_eq!(ty.presence, Presence::Optional, "{sql_type}");
        }
    }

    #[test]
    fn timestamp_and_date() {
        assert_eq!(
            map(ColumnDefinition::new("t", SqlType::Timestamp { fsp: 6 })).kind,
            ValueKind::DateTime
        );
        assert_eq!(
            map(ColumnDefinition::new("d", SqlType::Date)).kind,
            ValueKind::Date
        );
    }

    #[test]
    fn decimal_carries_precision_and_scale() {
        assert_eq!(
            map(ColumnDefinition::new(
                "per_item_amount",
                SqlType::Decimal {
                    precision: 12,
                    scale: 3
                }
            ))
            .kind,
            ValueKind::Decimal {
                max_digits: 12,
                decimal_places: 3
            }
        );
    }

    #[test]
    fn small_integer_bounds() {
        let signed = map(ColumnDefinition::new(
            "sort_order",
            SqlType::SmallInt {
                width: SmallWidth::Small,
                unsigned: false,
            },
        ));
        assert_eq!(signed.kind, ValueKind::Integer { bound: None });
        let unsigned = map(ColumnDefinition::new(
            "tier",
            SqlType::SmallInt {
                width: SmallWidth::Small,
                unsigned: true,
            },
        ));
        assert_eq!(
            unsigned.kind,
            ValueKind::Integer {
                bound: Some(IntBound::Ge(0))
            }
        );
    }

    #[test]
    fn enum_restricts_to_literals() {
        let ty = map(ColumnDefinition::new(
            "status",
            SqlType::Enum(vec!["SETUP".into(), "ACTIVE".into()]),
        ));
        assert_eq!(
            ty.kind,
            ValueKind::Enum {
                variants: vec!["SETUP".into(), "ACTIVE".into()]
            }
        );
    }

    #[test]
    fn defaults_make_prefilled_required_fields() {
        let ty = map(
            ColumnDefinition::new("created_timestamp", SqlType::Timestamp { fsp: 6 })
                .with_default(ColumnDefault::CurrentTimestamp),
        );
        assert_eq!(ty.presence, Presence::Defaulted(DefaultValue::CurrentTimestamp));

        let ty = map(
            ColumnDefinition::new("currency", SqlType::Char(3))
                .with_default(ColumnDefault::Literal("USD".into())),
        );
        assert_eq!(
            ty.presence,
            Presence::Defaulted(DefaultValue::Literal("USD".into()))
        );
    }

    #[test]
    fn unrecognized_type_is_an_error() {
        let err = map_column_type(
            "fee_rate",
            &ColumnDefinition::new("payload", SqlType::Unrecognized("json".into())),
        )
        .unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("fee_rate.payload"), "got: {err}");
    }

    #[test]
    fn decimal_scale_above_precision_is_unrecognized() {
        let err = map_column_type(
            "t",
            &ColumnDefinition::new(
                "x",
                SqlType::Decimal {
                    precision: 4,
                    scale: 6,
                },
            ),
        )
        .unwrap_err();
        assert!(matches!(err, GenError::UnrecognizedType { .. }));
    }

    #[test]
    fn wide_decimal_is_recognized() {
        let decimal = |precision, scale| {
            map_column_type(
                "ledger_total",
                &ColumnDefinition::new("total_amount", SqlType::Decimal { precision, scale }),
            )
        };
        assert_eq!(
            decimal(65, 2).unwrap().kind,
            ValueKind::Decimal {
                max_digits: 65,
                decimal_places: 2
            }
        );
        assert!(matches!(decimal(66, 2), Err(GenError::UnrecognizedType { .. })));
        assert!(matches!(decimal(30, 29), Err(GenError::UnrecognizedType { .. })));
    }

    #[test]
    fn mapping_is_deterministic() {
        let column = ColumnDefinition::new("percentage", SqlType::Decimal { precision: 5, scale: 2 })
            .nullable();
        assert_eq!(
            map_column_type("fee_rate", &column).unwrap(),
            map_column_type("fee_rate", &column).unwrap()
        );
    }

    #[test]
    fn names_follow_table() {
        assert_eq!(model_name("adjust_reason"), "adjust-reason");
        assert_eq!(type_name("adjust_reason"), "AdjustReason");
    }

    #[test]
    fn duplicate_table_fails_only_the_repeat() {
        let schema = TableSchema::new(
            "fee_code",
            vec![ColumnDefinition::new("fee_code", SqlType::VarChar(25))],
        );
        let outcomes = generate_all(&[schema.clone(), schema], &BillingRelevance);
        assert!(outcomes[0].result.is_ok());
        assert!(matches!(
            outcomes[1].result,
            Err(GenError::DuplicateTable(_))
        ));
    }

    #[test]
    fn failing_schema_does_not_block_others() {
        let bad = TableSchema::new(
            "bad",
            vec![ColumnDefinition::new("blob", SqlType::Unrecognized("blob".into()))],
        );
        let good = TableSchema::new(
            "adjust_reason",
            vec![ColumnDefinition::new("adjust_reason", SqlType::VarChar(25))],
        );
        let outcomes = generate_all(&[bad, good], &BillingRelevance);
        assert!(outcomes[0].result.is_err());
        let model = outcomes[1].result.as_ref().unwrap();
        assert_eq!(model.name, "adjust-reason");
    }
}
