//! Constraints file parsing (`--constrains`, §4.5 step 3, §6, §8 property 7):
//! a disjunction of conjunctive property-value views, with integer ranges
//! written as `"N:M"` or `"N:M:S"` expanded eagerly at load time.
use crate::engine::{ConstrainedView, View};
use crate::error::KaonError;
use crate::value::{PropertyName, PropertyValue, PropertyValueLiteral};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static RANGE_WITH_STEP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+):(\d+):(\d+)$").expect("static regex"));
static RANGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+):(\d+)$").expect("static regex"));

/// Parse a constraints file's top-level JSON array of view objects.
pub fn parse_constraints(source: &str, file_label: &str) -> Result<ConstrainedView, KaonError> {
    let value: Value = serde_json::from_str(source).map_err(|e| KaonError::SchemaError {
        path: file_label.to_owned(),
        message: format!("invalid JSON: {e}"),
    })?;

    let array = value.as_array().ok_or_else(|| KaonError::SchemaError {
        path: file_label.to_owned(),
        message: "expected a top-level JSON array of views".to_owned(),
    })?;

    array
        .iter()
        .enumerate()
        .map(|(i, view)| parse_view(view, &format!("{file_label}/[{i}]")))
        .collect()
}

fn parse_view(value: &Value, path: &str) -> Result<View, KaonError> {
    let obj = value.as_object().ok_or_else(|| KaonError::SchemaError {
        path: path.to_owned(),
        message: "a view must be an object".to_owned(),
    })?;

    let mut view = View::new();
    for (name, spec) in obj {
        let values = expand_values(spec, &format!("{path}/{name}"))?;
        view.insert(PropertyName::new(name.as_str()), PropertyValueLiteral::List(values));
    }
    Ok(view)
}

fn expand_values(value: &Value, path: &str) -> Result<Vec<PropertyValue>, KaonError> {
    let raw: Vec<String> = match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .map(|v| {
                v.as_str().map(str::to_owned).ok_or_else(|| KaonError::SchemaError {
                    path: path.to_owned(),
                    message: "unexpected type, it should be a string".to_owned(),
                })
            })
            .collect::<Result<_, _>>()?,
        _ => {
            return Err(KaonError::SchemaError {
                path: path.to_owned(),
                message: "unexpected type, it should be a string or a list of strings".to_owned(),
            })
        }
    };

    Ok(raw.iter().flat_map(|s| expand_one(s)).collect())
}

/// Expand one constraint string: a `"start:step:stop"` or half-open
/// `"start:stop"` range into the integers it denotes, or a plain literal
/// unchanged (§4, §6, §8 property 7). Both forms exclude `stop`. Shared with
/// `cli.rs`, which applies the same expansion to CLI-supplied option values.
pub(crate) fn expand_one(raw: &str) -> Vec<PropertyValue> {
    if let Some(caps) = RANGE_WITH_STEP.captures(raw) {
        let start: i64 = caps[1].parse().expect("digits");
        let step: i64 = caps[2].parse().expect("digits").max(1);
        let stop: i64 = caps[3].parse().expect("digits");
        return (start..stop).step_by(step as usize).map(render_int).collect();
    }
    if let Some(caps) = RANGE.captures(raw) {
        let start: i64 = caps[1].parse().expect("digits");
        let stop: i64 = caps[2].parse().expect("digits");
        return (start..stop).map(render_int).collect();
    }
    vec![PropertyValue::Plain(raw.to_owned())]
}

fn render_int(n: i64) -> PropertyValue {
    PropertyValue::Plain(n.to_string())
}
