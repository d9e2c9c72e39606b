//! Schema file parsing and validation (§6): a top-level JSON array of action
//! objects, each recognizing a fixed set of keys. Unknown keys are rejected at
//! load time with a `SchemaError` carrying a JSON-path-like locator, the same
//! contract `original_source/kaon.py`'s `check_action`/`check_schema` enforce.
use crate::constraint::{Clause, PropertyConstraints, SelectSpec};
use crate::error::KaonError;
use crate::value::{PropertyName, PropertyValueLiteral};
use indexmap::IndexMap;
use serde_json::Value;

/// A single `modify`/`finalize` rule: an ordered set of property assignments,
/// each either a literal value or a fan-out list of values (§4.4 step 3).
pub type ModifyRule = IndexMap<PropertyName, PropertyValueLiteral>;

/// One `execute` item (§4.4 step 4).
#[derive(Debug, Clone)]
pub struct ExecuteItem {
    pub command: String,
    pub return_properties: Vec<PropertyName>,
    /// `None` means "split on runs of whitespace" (§9.1).
    pub split: Option<String>,
}

/// The phase names `show-after` may name (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowPhase {
    Select,
    Modify,
    Execute,
    Finalize,
    UpdatedEntries,
}

impl ShowPhase {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "select" => Some(Self::Select),
            "modify" => Some(Self::Modify),
            "execute" => Some(Self::Execute),
            "finalize" => Some(Self::Finalize),
            "updated-entries" => Some(Self::UpdatedEntries),
            _ => None,
        }
    }

    /// The header line written to stderr after this phase runs (§6).
    pub fn trace_header(self) -> &'static str {
        match self {
            ShowPhase::Select => "Entries after applying `select`",
            ShowPhase::Modify => "Entries after applying `modify`",
            ShowPhase::Execute => "Entries after applying `execute`",
            ShowPhase::Finalize => "Entries after applying `finalize`",
            ShowPhase::UpdatedEntries => "Updated entries",
        }
    }
}

/// One schema action (§3, §6).
#[derive(Debug, Clone)]
pub struct Action {
    pub name: Option<String>,
    pub select: Option<SelectSpec>,
    pub modify: Vec<ModifyRule>,
    pub execute: Vec<ExecuteItem>,
    pub finalize: Vec<ModifyRule>,
    pub show_after: Vec<ShowPhase>,
    /// The identity template (§4.4 step 6). Absent means this action's emitted
    /// entries are never identity-merged - each lands in the store fresh,
    /// never upserted (§4.4 step 6: "if `id` present").
    pub id: Option<String>,
}

impl Action {
    /// The name used in error messages and debug trace headers: the declared
    /// `name`, or `[i]` by position (matching `original_source/kaon.py`).
    pub fn display_name(&self, index: usize) -> String {
        self.name.clone().unwrap_or_else(|| format!("[{index}]"))
    }
}

/// Parse a schema file's top-level JSON array into a `Vec<Action>`, failing
/// loud with a `SchemaError` carrying a JSON-path-like locator for the first
/// violation found (§6, §7).
pub fn parse_schema(source: &str, file_label: &str) -> Result<Vec<Action>, KaonError> {
    let value: Value = serde_json::from_str(source).map_err(|e| KaonError::SchemaError {
        path: file_label.to_owned(),
        message: format!("invalid JSON: {e}"),
    })?;

    let array = value.as_array().ok_or_else(|| KaonError::SchemaError {
        path: file_label.to_owned(),
        message: "expected a top-level JSON array of actions".to_owned(),
    })?;

    let actions: Result<Vec<Action>, KaonError> = array
        .iter()
        .enumerate()
        .map(|(i, action)| {
            let path = action_path(action, i, file_label);
            parse_action(action, &path)
        })
        .collect();
    if let Ok(actions) = &actions {
        log::debug!("parsed {} action(s) from `{file_label}`", actions.len());
    }
    actions
}

fn action_path(action: &Value, index: usize, file_label: &str) -> String {
    if let Some(name) = action.get("name").and_then(Value::as_str) {
        format!("{file_label}/[name='{name}']")
    } else {
        format!("{file_label}/[{index}]")
    }
}

const KNOWN_ACTION_KEYS: [&str; 7] =
    ["name", "description", "select", "modify", "execute", "finalize", "show-after", "id"];

fn parse_action(action: &Value, path: &str) -> Result<Action, KaonError> {
    let obj = action.as_object().ok_or_else(|| KaonError::SchemaError {
        path: path.to_owned(),
        message: "an action must be an object".to_owned(),
    })?;

    for key in obj.keys() {
        if !KNOWN_ACTION_KEYS.contains(&key.as_str()) {
            return Err(KaonError::SchemaError {
                path: format!("{path}/{key}"),
                message: "unexpected key".to_owned(),
            });
        }
    }

    let name = match obj.get("name") {
        Some(v) => Some(expect_string(v, &format!("{path}/name"))?),
        None => None,
    };

    let select = match obj.get("select") {
        Some(v) => Some(parse_select_spec(v, &format!("{path}/select"))?),
        None => None,
    };

    let modify = match obj.get("modify") {
        Some(v) => parse_modify_rules(v, &format!("{path}/modify"))?,
        None => Vec::new(),
    };

    let execute = match obj.get("execute") {
        Some(v) => parse_execute(v, &format!("{path}/execute"))?,
        None => Vec::new(),
    };

    let finalize = match obj.get("finalize") {
        Some(v) => parse_modify_rules(v, &format!("{path}/finalize"))?,
        None => Vec::new(),
    };

    let show_after = match obj.get("show-after") {
        Some(v) => parse_show_after(v, &format!("{path}/show-after"))?,
        None => Vec::new(),
    };

    // `id` is optional (§4.4 step 6: "if `id` present"): an action with none
    // still runs its phases, it just never identity-merges the result.
    let id = match obj.get("id") {
        Some(v) => Some(expect_string(v, &format!("{path}/id"))?),
        None => None,
    };

    Ok(Action { name, select, modify, execute, finalize, show_after, id })
}

fn expect_string(value: &Value, path: &str) -> Result<String, KaonError> {
    value.as_str().map(str::to_owned).ok_or_else(|| KaonError::SchemaError {
        path: path.to_owned(),
        message: "unexpected type, it should be a string".to_owned(),
    })
}

fn parse_select_spec(value: &Value, path: &str) -> Result<SelectSpec, KaonError> {
    if let Some(arr) = value.as_array() {
        let head = arr.first().and_then(Value::as_str).ok_or_else(|| KaonError::SchemaError {
            path: path.to_owned(),
            message: "a list select spec must start with \"and\" or \"joint\"".to_owned(),
        })?;
        let rest = &arr[1..];
        if rest.len() < 2 {
            return Err(KaonError::SchemaError {
                path: path.to_owned(),
                message: "\"and\"/\"joint\" need at least two sub-specs".to_owned(),
            });
        }
        let sub_specs = rest
            .iter()
            .enumerate()
            .map(|(i, v)| parse_select_spec(v, &format!("{path}/[{}]", i + 1)))
            .collect::<Result<Vec<_>, _>>()?;
        return match head {
            "and" => Ok(SelectSpec::And(sub_specs)),
            "joint" => Ok(SelectSpec::Joint(sub_specs)),
            other => Err(KaonError::SchemaError {
                path: path.to_owned(),
                message: format!("unexpected select combinator `{other}`, expected \"and\" or \"joint\""),
            }),
        };
    }

    let constraints = PropertyConstraints::from_json(value).map_err(|message| KaonError::SchemaError {
        path: path.to_owned(),
        message,
    })?;
    let obj: IndexMap<PropertyName, Vec<Clause>> = constraints.0.into_iter().collect();
    Ok(SelectSpec::Object(obj))
}

fn parse_modify_rules(value: &Value, path: &str) -> Result<Vec<ModifyRule>, KaonError> {
    let as_rule = |v: &Value, path: &str| -> Result<ModifyRule, KaonError> {
        let obj = v.as_object().ok_or_else(|| KaonError::SchemaError {
            path: path.to_owned(),
            message: "a modify/finalize rule must be an object".to_owned(),
        })?;
        let mut rule = ModifyRule::new();
        for (k, v) in obj {
            let literal: PropertyValueLiteral =
                serde_json::from_value(v.clone()).map_err(|e| KaonError::SchemaError {
                    path: format!("{path}/{k}"),
                    message: e.to_string(),
                })?;
            rule.insert(PropertyName::new(k.as_str()), literal);
        }
        Ok(rule)
    };

    if let Some(arr) = value.as_array() {
        arr.iter()
            .enumerate()
            .map(|(i, v)| as_rule(v, &format!("{path}/[{i}]")))
            .collect()
    } else {
        Ok(vec![as_rule(value, path)?])
    }
}

fn parse_execute(value: &Value, path: &str) -> Result<Vec<ExecuteItem>, KaonError> {
    let as_item = |v: &Value, path: &str| -> Result<ExecuteItem, KaonError> {
        let obj = v.as_object().ok_or_else(|| KaonError::SchemaError {
            path: path.to_owned(),
            message: "an execute item must be an object".to_owned(),
        })?;

        for key in obj.keys() {
            if !matches!(key.as_str(), "command" | "return-properties" | "split") {
                return Err(KaonError::SchemaError {
                    path: format!("{path}/{key}"),
                    message: "unexpected key".to_owned(),
                });
            }
        }

        let command = obj
            .get("command")
            .ok_or_else(|| KaonError::SchemaError {
                path: path.to_owned(),
                message: "missing key `command`".to_owned(),
            })
            .and_then(|v| expect_string(v, &format!("{path}/command")))?;

        let return_properties = obj
            .get("return-properties")
            .ok_or_else(|| KaonError::SchemaError {
                path: path.to_owned(),
                message: "missing key `return-properties`".to_owned(),
            })
            .and_then(|v| {
                v.as_array().ok_or_else(|| KaonError::SchemaError {
                    path: format!("{path}/return-properties"),
                    message: "unexpected type, it should be a list".to_owned(),
                })
            })?
            .iter()
            .enumerate()
            .map(|(i, v)| expect_string(v, &format!("{path}/return-properties/[{i}]")))
            .map(|r| r.map(PropertyName::new))
            .collect::<Result<Vec<_>, _>>()?;

        let split = match obj.get("split") {
            Some(v) => Some(expect_string(v, &format!("{path}/split"))?),
            None => None,
        };

        Ok(ExecuteItem { command, return_properties, split })
    };

    if let Some(arr) = value.as_array() {
        arr.iter().enumerate().map(|(i, v)| as_item(v, &format!("{path}/[{i}]"))).collect()
    } else {
        Ok(vec![as_item(value, path)?])
    }
}

fn parse_show_after(value: &Value, path: &str) -> Result<Vec<ShowPhase>, KaonError> {
    let arr = value.as_array().ok_or_else(|| KaonError::SchemaError {
        path: path.to_owned(),
        message: "unexpected type, it should be a list".to_owned(),
    })?;
    arr.iter()
        .enumerate()
        .map(|(i, v)| {
            let s = expect_string(v, &format!("{path}/[{i}]"))?;
            ShowPhase::parse(&s).ok_or_else(|| KaonError::SchemaError {
                path: format!("{path}/[{i}]"),
                message: format!("unexpected phase name `{s}`"),
            })
        })
        .collect()
}
