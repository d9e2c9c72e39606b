//! The value model: property names, property values, and the literal forms a
//! schema author writes in JSON before they are rendered down to plain strings.
use serde::Deserialize;
use std::fmt;
use std::ops::Deref;

/// Suffix marking a property name as a tentative default (see `PropertyName::is_tentative`).
pub const DEFAULT_SUFFIX: &str = "@default";

/// A non-empty property name.
///
/// Names ending in [`DEFAULT_SUFFIX`] are tentative: `@default`-resolution
/// (see [`crate::interpolate::resolve_defaults`]) strips the suffix and keeps
/// the value only when the suffix-less name is absent.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(transparent)]
pub struct PropertyName(String);

impl PropertyName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn is_tentative(&self) -> bool {
        self.0.ends_with(DEFAULT_SUFFIX)
    }

    /// The suffix-less form of this name, whether or not it is tentative.
    pub fn base_name(&self) -> &str {
        self.0.strip_suffix(DEFAULT_SUFFIX).unwrap_or(&self.0)
    }
}

impl Deref for PropertyName {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PropertyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PropertyName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for PropertyName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// How the parts of a composite [`PropertyValue`] are joined when rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JoinKind {
    BrokenLine,
    MultipleLines,
}

impl JoinKind {
    fn separator(self) -> &'static str {
        match self {
            JoinKind::BrokenLine => "",
            JoinKind::MultipleLines => "\n",
        }
    }
}

/// A single property's value: a plain string, or a composite joined from parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Plain(String),
    Composite { join: JoinKind, parts: Vec<String> },
}

impl PropertyValue {
    /// Collapse a composite value down to the plain string it represents.
    pub fn render(&self) -> String {
        match self {
            PropertyValue::Plain(s) => s.clone(),
            PropertyValue::Composite { join, parts } => parts.join(join.separator()),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// The raw shape a `PropertyValue` can take in schema JSON: a plain string, or
/// a tagged object with a join kind and a list of parts.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawPropertyValue {
    Plain(String),
    Composite {
        #[serde(rename = "broken-line")]
        broken_line: Option<Vec<String>>,
        #[serde(rename = "multiple-lines")]
        multiple_lines: Option<Vec<String>>,
    },
}

impl<'de> Deserialize<'de> for PropertyValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        match RawPropertyValue::deserialize(deserializer)? {
            RawPropertyValue::Plain(s) => Ok(PropertyValue::Plain(s)),
            RawPropertyValue::Composite {
                broken_line: Some(parts),
                multiple_lines: None,
            } => Ok(PropertyValue::Composite {
                join: JoinKind::BrokenLine,
                parts,
            }),
            RawPropertyValue::Composite {
                broken_line: None,
                multiple_lines: Some(parts),
            } => Ok(PropertyValue::Composite {
                join: JoinKind::MultipleLines,
                parts,
            }),
            RawPropertyValue::Composite { .. } => Err(serde::de::Error::custom(
                "a composite property value must have exactly one of `broken-line` or `multiple-lines`",
            )),
        }
    }
}

/// The full literal form a schema author writes for a property: either one
/// `PropertyValue`, or a list of them (an any-of membership set in `select`,
/// a fan-out in `modify`/`finalize`).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PropertyValueLiteral {
    List(Vec<PropertyValue>),
    Single(PropertyValue),
}

impl PropertyValueLiteral {
    /// All values this literal denotes, in written order.
    pub fn values(&self) -> Vec<&PropertyValue> {
        match self {
            PropertyValueLiteral::Single(v) => vec![v],
            PropertyValueLiteral::List(vs) => vs.iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_value_renders_as_is() {
        let v = PropertyValue::Plain("hello".into());
        assert_eq!(v.render(), "hello");
    }

    #[test]
    fn broken_line_joins_with_empty_string() {
        let v = PropertyValue::Composite {
            join: JoinKind::BrokenLine,
            parts: vec!["ab".into(), "cd".into()],
        };
        assert_eq!(v.render(), "abcd");
    }

    #[test]
    fn multiple_lines_joins_with_newline() {
        let v = PropertyValue::Composite {
            join: JoinKind::MultipleLines,
            parts: vec!["ab".into(), "cd".into()],
        };
        assert_eq!(v.render(), "ab\ncd");
    }

    #[test]
    fn tentative_name_strips_suffix() {
        let n = PropertyName::new("prefix@default");
        assert!(n.is_tentative());
        assert_eq!(n.base_name(), "prefix");

        let n = PropertyName::new("prefix");
        assert!(!n.is_tentative());
        assert_eq!(n.base_name(), "prefix");
    }

    #[test]
    fn deserialize_plain_and_composite() {
        let v: PropertyValue = serde_json::from_str(r#""hi""#).unwrap();
        assert_eq!(v, PropertyValue::Plain("hi".into()));

        let v: PropertyValue = serde_json::from_str(r#"{"multiple-lines": ["a", "b"]}"#).unwrap();
        assert_eq!(v.render(), "a\nb");
    }

    #[test]
    fn deserialize_literal_list_and_single() {
        let lit: PropertyValueLiteral = serde_json::from_str(r#""solo""#).unwrap();
        assert_eq!(lit.values().len(), 1);

        let lit: PropertyValueLiteral = serde_json::from_str(r#"["a", "b", "c"]"#).unwrap();
        assert_eq!(lit.values().len(), 3);
    }
}
