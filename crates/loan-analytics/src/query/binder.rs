//! Parameter binding: raw caller input to validated, typed values

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde_json::Value as Json;

use super::definition::QueryDefinition;
use super::placeholder;
use super::value::{ParamKind, ParamSpec, ParamValue, escape_component};
use crate::constants::DATE_FORMAT;
use crate::error::{Error, Result, ValidationReason};
use crate::warehouse::BoundParam;

/// Raw parameters as supplied by the presentation layer
pub type RawParams = BTreeMap<String, Json>;

/// Validated parameters for one request, ordered by name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedParameters {
    values: BTreeMap<String, ParamValue>,
}

impl ResolvedParameters {
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Stable encoding used in cache keys: `name=tag:value` joined by `&`
    #[must_use]
    pub fn canonical(&self) -> String {
        self.values
            .iter()
            .map(|(name, value)| format!("{}={}", escape_component(name), value.canonical()))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Named parameters for the warehouse client
    #[must_use]
    pub fn bound_params(&self) -> Vec<BoundParam> {
        self.values
            .iter()
            .map(|(name, value)| BoundParam {
                name: name.clone(),
                value: value.wire_value(),
                sql_type: value.sql_type(),
            })
            .collect()
    }

    /// Template with every placeholder replaced by an escaped literal
    ///
    /// For display and logging only; execution always binds parameters.
    #[must_use]
    pub fn render_sql(&self, template: &str) -> String {
        placeholder::substitute(template, |name| self.get(name).map(ParamValue::sql_literal))
    }
}

/// Validate `raw` against the parameters `definition` declares
///
/// Declared parameters are checked in declaration order, then any
/// undeclared names are rejected.
pub fn bind(definition: &QueryDefinition, raw: &RawParams) -> Result<ResolvedParameters> {
    let mut values = BTreeMap::new();

    for spec in definition.params() {
        let value = match raw.get(&spec.name).filter(|v| !v.is_null()) {
            Some(input) => coerce(spec, input)?,
            None => match &spec.default {
                Some(default) => coerce(spec, &Json::String(default.clone()))?,
                None => return Err(Error::validation(&spec.name, ValidationReason::Missing)),
            },
        };
        values.insert(spec.name.clone(), value);
    }

    if let Some(unknown) = raw.keys().find(|k| definition.param_spec(k).is_none()) {
        return Err(Error::validation(unknown, ValidationReason::Unknown));
    }

    Ok(ResolvedParameters { values })
}

const fn json_type_name(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

fn wrong_type(spec: &ParamSpec, found: impl Into<String>) -> Error {
    Error::validation(
        &spec.name,
        ValidationReason::WrongType {
            expected: spec.kind.type_name().to_string(),
            found: found.into(),
        },
    )
}

fn coerce(spec: &ParamSpec, input: &Json) -> Result<ParamValue> {
    match spec.kind {
        ParamKind::Text { max_len } => {
            let Json::String(s) = input else {
                return Err(wrong_type(spec, json_type_name(input)));
            };
            let len = s.chars().count();
            if len > max_len {
                return Err(Error::validation(
                    &spec.name,
                    ValidationReason::TooLong { len, max: max_len },
                ));
            }
            Ok(ParamValue::Text(s.clone()))
        }
        ParamKind::Integer { min, max } => {
            let parsed = match input {
                Json::Number(n) => n.as_i64(),
                Json::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            };
            let value = parsed.ok_or_else(|| wrong_type(spec, describe(input)))?;
            if !(min..=max).contains(&value) {
                return Err(Error::validation(
                    &spec.name,
                    ValidationReason::OutOfRange {
                        value: value.to_string(),
                        min,
                        max,
                    },
                ));
            }
            Ok(ParamValue::Integer(value))
        }
        ParamKind::Number => {
            let parsed = match input {
                Json::Number(n) => n.as_f64(),
                Json::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            parsed
                .filter(|v| v.is_finite())
                .map(ParamValue::Number)
                .ok_or_else(|| wrong_type(spec, describe(input)))
        }
        ParamKind::Date => {
            let Json::String(s) = input else {
                return Err(wrong_type(spec, json_type_name(input)));
            };
            NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
                .map(ParamValue::Date)
                .map_err(|_| wrong_type(spec, format!("'{s}'")))
        }
        ParamKind::Enum(allowed) => {
            let Json::String(s) = input else {
                return Err(wrong_type(spec, json_type_name(input)));
            };
            let candidate = s.trim();
            allowed
                .iter()
                .copied()
                .find(|member| member.eq_ignore_ascii_case(candidate))
                .map(ParamValue::Enum)
                .ok_or_else(|| {
                    Error::validation(
                        &spec.name,
                        ValidationReason::NotAllowed {
                            value: s.clone(),
                            allowed: allowed.iter().map(ToString::to_string).collect(),
                        },
                    )
                })
        }
    }
}

/// Short description of a rejected input for error messages
fn describe(input: &Json) -> String {
    match input {
        Json::String(s) => format!("'{s}'"),
        Json::Number(n) => n.to_string(),
        other => json_type_name(other).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::query::definition::QueryDomain;

    const STATUSES: &[&str] = &["active", "cancelled", "other"];

    fn definition() -> QueryDefinition {
        QueryDefinition::new(
            "demo",
            QueryDomain::Loan,
            "SELECT * FROM t WHERE d >= :start_date AND s = :status LIMIT :limit",
        )
        .required("start_date", ParamKind::Date)
        .required("status", ParamKind::Enum(STATUSES))
        .param(ParamSpec::required("limit", ParamKind::integer(1, 100)).with_default("20"))
    }

    fn raw(pairs: &[(&str, Json)]) -> RawParams {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_bind_happy_path_with_default() {
        let params = raw(&[("start_date", json!("2023-01-01")), ("status", json!("Active"))]);
        let resolved = bind(&definition(), &params).unwrap();

        assert_eq!(resolved.len(), 3);
        assert_eq!(resolved.get("status"), Some(&ParamValue::Enum("active")));
        assert_eq!(resolved.get("limit"), Some(&ParamValue::Integer(20)));
        assert_eq!(
            resolved.canonical(),
            "limit=i:20&start_date=d:2023-01-01&status=e:active"
        );
    }

    #[test]
    fn test_bind_numeric_string_parsed() {
        let params = raw(&[
            ("start_date", json!("2023-01-01")),
            ("status", json!("other")),
            ("limit", json!(" 42 ")),
        ]);
        let resolved = bind(&definition(), &params).unwrap();
        assert_eq!(resolved.get("limit"), Some(&ParamValue::Integer(42)));
    }

    #[test]
    fn test_bind_canonical_independent_of_input_shape() {
        let a = raw(&[
            ("status", json!("ACTIVE")),
            ("start_date", json!("2023-01-01")),
            ("limit", json!(5)),
        ]);
        let b = raw(&[
            ("limit", json!("5")),
            ("start_date", json!("2023-01-01")),
            ("status", json!("active")),
        ]);
        let def = definition();
        assert_eq!(
            bind(&def, &a).unwrap().canonical(),
            bind(&def, &b).unwrap().canonical()
        );
    }

    #[test]
    fn test_bind_missing_required() {
        let err = bind(&definition(), &raw(&[("status", json!("active"))])).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation { ref parameter, reason: ValidationReason::Missing } if parameter == "start_date"
        ));
    }

    #[test]
    fn test_bind_null_counts_as_missing() {
        let params = raw(&[("start_date", Json::Null), ("status", json!("active"))]);
        let err = bind(&definition(), &params).unwrap_err();
        assert_eq!(err.identifier(), Some("start_date"));
    }

    #[test]
    fn test_bind_rejects_unknown() {
        let params = raw(&[
            ("start_date", json!("2023-01-01")),
            ("status", json!("active")),
            ("grade", json!("A")),
        ]);
        let err = bind(&definition(), &params).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation { ref parameter, reason: ValidationReason::Unknown } if parameter == "grade"
        ));
    }

    #[test]
    fn test_bind_rejects_bad_date() {
        let params = raw(&[("start_date", json!("01/02/2023")), ("status", json!("active"))]);
        let err = bind(&definition(), &params).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation { reason: ValidationReason::WrongType { .. }, .. }
        ));
    }

    #[test]
    fn test_bind_rejects_enum_outside_set() {
        let params = raw(&[("start_date", json!("2023-01-01")), ("status", json!("closed"))]);
        let err = bind(&definition(), &params).unwrap_err();
        let Error::Validation {
            reason: ValidationReason::NotAllowed { allowed, .. },
            ..
        } = err
        else {
            panic!("expected NotAllowed");
        };
        assert_eq!(allowed, vec!["active", "cancelled", "other"]);
    }

    #[test]
    fn test_bind_rejects_out_of_range_and_fractional() {
        let def = definition();
        let base = [("start_date", json!("2023-01-01")), ("status", json!("active"))];

        let mut params = raw(&base);
        params.insert("limit".into(), json!(0));
        assert!(matches!(
            bind(&def, &params).unwrap_err(),
            Error::Validation { reason: ValidationReason::OutOfRange { .. }, .. }
        ));

        params.insert("limit".into(), json!(2.5));
        assert!(matches!(
            bind(&def, &params).unwrap_err(),
            Error::Validation { reason: ValidationReason::WrongType { .. }, .. }
        ));

        params.insert("limit".into(), json!(true));
        assert!(bind(&def, &params).unwrap_err().is_validation());
    }

    #[test]
    fn test_bind_number_and_text() {
        let def = QueryDefinition::new("n", QueryDomain::Loan, "SELECT :x, :label")
            .required("x", ParamKind::Number)
            .required("label", ParamKind::text(3));

        let ok = bind(&def, &raw(&[("x", json!("1.25")), ("label", json!("abc"))])).unwrap();
        assert_eq!(ok.get("x"), Some(&ParamValue::Number(1.25)));

        let err = bind(&def, &raw(&[("x", json!("NaN")), ("label", json!("a"))])).unwrap_err();
        assert_eq!(err.identifier(), Some("x"));

        let err = bind(&def, &raw(&[("x", json!(1)), ("label", json!("abcd"))])).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation { reason: ValidationReason::TooLong { len: 4, max: 3 }, .. }
        ));
    }

    #[test]
    fn test_render_and_bound_params() {
        let params = raw(&[("start_date", json!("2023-01-01")), ("status", json!("active"))]);
        let resolved = bind(&definition(), &params).unwrap();

        let sql = resolved.render_sql(definition().template());
        assert_eq!(
            sql,
            "SELECT * FROM t WHERE d >= DATE'2023-01-01' AND s = 'active' LIMIT 20"
        );

        let bound = resolved.bound_params();
        assert_eq!(bound.len(), 3);
        assert_eq!(bound[0].name, "limit");
        assert_eq!(bound[0].sql_type, "BIGINT");
        assert_eq!(bound[1].value, "2023-01-01");
        assert_eq!(bound[1].sql_type, "DATE");
    }

    #[test]
    fn test_bind_empty_definition() {
        let def = QueryDefinition::new("plain", QueryDomain::Loan, "SELECT 1");
        let resolved = bind(&def, &RawParams::new()).unwrap();
        assert!(resolved.is_empty());
        assert_eq!(resolved.canonical(), "");
    }
}
