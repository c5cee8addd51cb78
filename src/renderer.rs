use serde_json::Value;

use crate::error::{GenError, ValidationDetail};
use crate::model::{GeneratedModel, Instance};
use crate::validate::{self, Scope};

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedModel {
    pub name: String,
    pub full: String,
    pub minimal: String,
}

pub fn begin_marker(name: &str) -> String {
    format!("----begin example: {name}----")
}

pub fn minimal_marker(name: &str) -> String {
    format!("----begin minmal example: {name}----")
}

pub fn end_marker(name: &str) -> String {
    format!("----end: {name}----")
}

pub fn render(model: &GeneratedModel) -> Result<RenderedModel, GenError> {
    Ok(RenderedModel {
        name: model.name.clone(),
        full: pretty(model, &model.example.to_json())?,
        minimal: pretty(model, &model.minimal_example().to_json())?,
    })
}

fn pretty(model: &GeneratedModel, value: &Value) -> Result<String, GenError> {
    serde_json::to_string_pretty(value).map_err(|e| GenError::RenderValidation {
        model: model.name.clone(),
        detail: ValidationDetail::new("$root", "serializable JSON", e.to_string()),
    })
}

impl RenderedModel {
    pub fn report(&self) -> String {
        format!(
            "{}\n{}\n{}\n{}\n{}\n",
            begin_marker(&self.name),
            self.full,
            minimal_marker(&self.name),
            self.minimal,
            end_marker(&self.name),
        )
    }
}

pub fn report(model: &GeneratedModel) -> Result<String, GenError> {
    Ok(render(model)?.report())
}

pub fn split_report<'a>(name: &str, text: &'a str) -> Result<(&'a str, &'a str), GenError> {
    let begin = begin_marker(name);
    let minimal = minimal_marker(name);
    let end = end_marker(name);
    let missing = |marker: &str| GenError::RenderValidation {
        model: name.to_string(),
        detail: ValidationDetail::new("$report", format!("marker '{marker}'"), "end of report"),
    };

    let (_, rest) = text.split_once(begin.as_str()).ok_or_else(|| missing(&begin))?;
    let (full, rest) = rest.split_once(minimal.as_str()).ok_or_else(|| missing(&minimal))?;
    let (min, _) = rest.split_once(end.as_str()).ok_or_else(|| missing(&end))?;
    Ok((full.trim(), min.trim()))
}

/// Parse a report back and confirm both blocks are valid instances of the
/// model. The full block must reproduce the generated example.
pub fn self_check(model: &GeneratedModel, text: &str) -> Result<(), GenError> {
    let (full, minimal) = split_report(&model.name, text)?;

    let parsed = validate::parse_instance_text(model, full, Scope::Full)?;
    if let Some(detail) = first_difference(&model.example, &parsed) {
        return Err(GenError::RenderValidation {
            model: model.name.clone(),
            detail,
        });
    }

    validate::parse_instance_text(model, minimal, Scope::Only(&model.minimal_fields))?;
    Ok(())
}

fn first_difference(expected: &Instance, actual: &Instance) -> Option<ValidationDetail> {
    for (name, value) in expected.iter() {
        match actual.get(name) {
            Some(parsed) if parsed == value => {}
            Some(parsed) => {
                return Some(ValidationDetail::new(
                    name,
                    value.to_json().to_string(),
                    parsed.to_json().to_string(),
                ));
            }
            None => return Some(ValidationDetail::missing_field(name)),
        }
    }
    if actual.len() != expected.len() {
        let extra = actual.iter().find(|(name, _)| expected.get(name).is_none());
        if let Some((name, _)) = extra {
            return Some(ValidationDetail::extra_field(name));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use pretty_assertions::assert_eq;

    fn model() -> GeneratedModel {
        let mut example = Instance::new();
        example.push("id", FieldValue::Integer(1));
        example.push("adjust_reason", FieldValue::Text("REFUND".into()));
        GeneratedModel {
            name: "adjust-reason".into(),
            type_name: "AdjustReason".into(),
            table: "adjust_reason".into(),
            fields: vec![
                GeneratedField {
                    name: "id".into(),
                    field_type: FieldType::required(ValueKind::Integer {
                        bound: Some(IntBound::Gt(0)),
                    }),
                    description: None,
                },
                GeneratedField {
                    name: "adjust_reason".into(),
                    field_type: FieldType::required(ValueKind::String { max_length: 25 }),
                    description: None,
                },
            ],
            minimal_fields: ["adjust_reason".to_string()].into(),
            example,
        }
    }

    #[test]
    fn report_is_framed_in_order() {
        let text = report(&model()).unwrap();
        let expected = "\
----begin example: adjust-reason----
{
  \"id\": 1,
  \"adjust_reason\": \"REFUND\"
}
----begin minmal example: adjust-reason----
{
  \"adjust_reason\": \"REFUND\"
}
----end: adjust-reason----
";
        assert_eq!(text, expected);
        assert!(!text.contains("}\n\n----end:"));
    }

    #[test]
    fn rendered_report_passes_self_check() {
        let m = model();
        let text = report(&m).unwrap();
        assert!(self_check(&m, &text).is_ok());
    }

    #[test]
    fn tampered_value_fails_self_check() {
        let m = model();
        let text = report(&m).unwrap().replacen("\"id\": 1", "\"id\": 0", 1);
        let err = self_check(&m, &text).unwrap_err();
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn changed_but_valid_value_fails_self_check() {
        let m = model();
        let text = report(&m).unwrap().replacen("\"id\": 1", "\"id\": 2", 1);
        let err = self_check(&m, &text).unwrap_err();
        assert!(err.to_string().contains("'id'"), "got: {err}");
    }

    #[test]
    fn extra_minimal_key_fails_self_check() {
        let m = model();
        let text = report(&m).unwrap().replacen(
            "{\n  \"adjust_reason\": \"REFUND\"\n}",
            "{\n  \"adjust_reason\": \"REFUND\",\n  \"id\": 1\n}",
            1,
        );
        assert!(self_check(&m, &text).is_err());
    }

    #[test]
    fn missing_end_marker_fails() {
        let m = model();
        let text = report(&m).unwrap().replace("----end: adjust-reason----", "");
        assert!(split_report(&m.name, &text).is_err());
    }
}
