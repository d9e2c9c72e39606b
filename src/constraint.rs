//! The predicate/constraint evaluator (§4.3): evaluates a property constraint
//! against a single entry, yielding an enriched entry or a rejection.
use crate::entry::{Entry, Environment};
use crate::interpolate::{interpolate_resolved, resolve_defaults};
use crate::value::{PropertyName, PropertyValue, PropertyValueLiteral};
use indexmap::IndexMap;
use regex::Regex;

/// The `in:` clause's three distinct shapes (§4.3's table): `null` means
/// "present", `[]` means "absent", and a non-empty list means "one of these".
#[derive(Debug, Clone)]
pub enum InSet {
    Present,
    Absent,
    Values(Vec<PropertyValue>),
}

/// One clause of a property constraint object. Clauses combine left-to-right
/// within an object (§4.3): later clauses observe bindings made by earlier ones.
#[derive(Debug, Clone)]
pub enum Clause {
    /// A bare value or list of values: exact-match or any-of membership.
    Literal(PropertyValueLiteral),
    Interpolate(String),
    In(InSet),
    CopyTo(PropertyName),
    /// `move-to: null` just deletes the original; `move-to: name` also binds it.
    MoveTo(Option<PropertyName>),
    MatchingRe(String),
}

/// A property-constraint object: an ordered list of `(name, clause)` pairs,
/// one or more clauses per property, in the object's written key order.
///
/// Deserialized from `serde_json::Value` rather than derived directly, because
/// `in`/`move-to`/`copy-to`/`interpolate`/`matching-re` can appear combined on
/// one property (e.g. `{"matching-re": "...", "copy-to": "alias"}`) and clause
/// order inside that combination must survive JSON object parsing (§4.3.1).
#[derive(Debug, Clone, Default)]
pub struct PropertyConstraints(pub Vec<(PropertyName, Vec<Clause>)>);

impl PropertyConstraints {
    pub fn from_json(value: &serde_json::Value) -> Result<Self, String> {
        let obj = value
            .as_object()
            .ok_or_else(|| "a select object must be a JSON object".to_string())?;
        let mut out = Vec::with_capacity(obj.len());
        for (name, rule) in obj {
            let clauses = clauses_from_rule(rule)
                .map_err(|e| format!("property `{name}`: {e}"))?;
            out.push((PropertyName::new(name.as_str()), clauses));
        }
        Ok(out.into_iter().collect::<Vec<_>>().into())
    }
}

impl From<Vec<(PropertyName, Vec<Clause>)>> for PropertyConstraints {
    fn from(v: Vec<(PropertyName, Vec<Clause>)>) -> Self {
        Self(v)
    }
}

fn clauses_from_rule(rule: &serde_json::Value) -> Result<Vec<Clause>, String> {
    // A bare value or list of values: exact-match / any-of membership.
    if rule.is_string() || rule.is_array() {
        let literal: PropertyValueLiteral =
            serde_json::from_value(rule.clone()).map_err(|e| e.to_string())?;
        return Ok(vec![Clause::Literal(literal)]);
    }

    let obj = rule
        .as_object()
        .ok_or_else(|| "a property constraint must be a string, list, or object".to_string())?;

    if obj.is_empty() {
        // "An object with no clauses means 'property present'" (§4.3).
        return Ok(vec![Clause::In(InSet::Present)]);
    }

    for key in obj.keys() {
        if !matches!(
            key.as_str(),
            "interpolate" | "in" | "copy-to" | "move-to" | "matching-re"
        ) {
            return Err(format!("unexpected key `{key}`"));
        }
    }

    // `obj` is a `serde_json::Map`, which preserves source key order when the
    // `preserve_order` feature is enabled - exactly the ordering §4.3's clause
    // chain depends on.
    let mut clauses = Vec::with_capacity(obj.len());
    for (key, value) in obj {
        let clause = match key.as_str() {
            "interpolate" => {
                let template: String = serde_json::from_value(value.clone()).map_err(|e| e.to_string())?;
                Clause::Interpolate(template)
            }
            "in" => {
                if value.is_null() {
                    Clause::In(InSet::Present)
                } else {
                    let values: Vec<PropertyValue> =
                        serde_json::from_value(value.clone()).map_err(|e| e.to_string())?;
                    if values.is_empty() {
                        Clause::In(InSet::Absent)
                    } else {
                        Clause::In(InSet::Values(values))
                    }
                }
            }
            "copy-to" => {
                let name: String = serde_json::from_value(value.clone()).map_err(|e| e.to_string())?;
                Clause::CopyTo(PropertyName::new(name))
            }
            "move-to" => {
                if value.is_null() {
                    Clause::MoveTo(None)
                } else {
                    let name: String = serde_json::from_value(value.clone()).map_err(|e| e.to_string())?;
                    Clause::MoveTo(Some(PropertyName::new(name)))
                }
            }
            "matching-re" => {
                let template: String = serde_json::from_value(value.clone()).map_err(|e| e.to_string())?;
                Clause::MatchingRe(template)
            }
            other => return Err(format!("unexpected key `{other}`")),
        };
        clauses.push(clause);
    }
    Ok(clauses)
}

/// A select specification: one property-constraint object (all-match), or a
/// recursive `and`/`joint` combination of two or more sub-specs (§4.3).
#[derive(Debug, Clone)]
pub enum SelectSpec {
    Object(IndexMap<PropertyName, Vec<Clause>>),
    And(Vec<SelectSpec>),
    Joint(Vec<SelectSpec>),
}

/// Evaluate one property's clause chain against an entry.
///
/// `entry` accumulates bindings made by earlier clauses in the same object
/// (§4.3: "later clauses see bindings produced by earlier clauses"); `name` is
/// the property this chain is attached to. Returns `None` if any clause rejects.
fn eval_clauses(name: &PropertyName, clauses: &[Clause], entry: &Entry, env: &Environment) -> Option<Entry> {
    let mut entry = entry.clone();

    for clause in clauses {
        match clause {
            Clause::Literal(literal) => {
                let allowed: Vec<String> = literal.values().iter().map(|v| v.render()).collect();
                let current = entry.get(name)?;
                if !allowed.contains(current) {
                    return None;
                }
            }
            Clause::Interpolate(template) => {
                let resolved = resolve_defaults(&entry);
                let computed = interpolate_resolved(template, &resolved, env)?;
                match entry.get(name) {
                    Some(existing) => {
                        if existing != &computed {
                            return None;
                        }
                    }
                    None => {
                        entry.insert(name.clone(), computed);
                    }
                }
            }
            Clause::In(InSet::Present) => {
                entry.get(name)?;
            }
            Clause::In(InSet::Absent) => {
                if entry.contains_key(name) {
                    return None;
                }
            }
            Clause::In(InSet::Values(values)) => {
                let current = entry.get(name)?;
                let allowed: Vec<String> = values.iter().map(|v| v.render()).collect();
                if !allowed.contains(current) {
                    return None;
                }
            }
            Clause::CopyTo(target) => {
                let value = entry.get(name)?.clone();
                entry.insert(target.clone(), value);
            }
            Clause::MoveTo(target) => {
                let value = entry.shift_remove(name)?;
                if let Some(target) = target {
                    entry.insert(target.clone(), value);
                }
            }
            Clause::MatchingRe(template) => {
                // §9.1 open question: if neither the property is present nor an
                // `interpolate` clause has just set it, this clause filters out.
                let current = entry.get(name)?.clone();
                let resolved = resolve_defaults(&entry);
                let pattern = interpolate_resolved(template, &resolved, env)?;
                let re = Regex::new(&format!("^(?:{pattern})$")).ok()?;
                let captures = re.captures(&current)?;
                for group_name in re.capture_names().flatten() {
                    if let Some(m) = captures.name(group_name) {
                        entry.insert(PropertyName::new(group_name), m.as_str().to_owned());
                    }
                }
            }
        }
    }

    Some(entry)
}

fn eval_object(obj: &IndexMap<PropertyName, Vec<Clause>>, entry: &Entry, env: &Environment) -> Option<Entry> {
    let mut current = entry.clone();
    for (name, clauses) in obj {
        current = eval_clauses(name, clauses, &current, env)?;
    }
    Some(current)
}

/// Evaluate a select specification against the known entries (§4.3).
pub fn select(entries: &[Entry], spec: &SelectSpec, env: &Environment) -> Vec<Entry> {
    match spec {
        SelectSpec::Object(obj) => entries.iter().filter_map(|e| eval_object(obj, e, env)).collect(),
        SelectSpec::And(specs) => specs.iter().flat_map(|s| select(entries, s, env)).collect(),
        SelectSpec::Joint(specs) => crate::combine::joint(
            &specs.iter().map(|s| select(entries, s, env)).collect::<Vec<_>>(),
        ),
    }
}
