//! Entries, the entry store, and the interpolation environment.
use crate::value::PropertyName;
use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;

/// An open string-to-string record. Key identity is by [`PropertyName`];
/// insertion order is preserved but not semantically relevant (§3).
pub type Entry = IndexMap<PropertyName, String>;

/// Ordered mapping from identity string to [`Entry`], preserving first-insertion
/// order so schema output is deterministic (§3, §8 property 2).
pub type EntryStore = IndexMap<String, Entry>;

/// Variables supplied on the command line (via schema-declared `variable-name`
/// flags, §6.1), visible during interpolation. Entries take precedence over
/// the environment on name conflict (§3).
#[derive(Debug, Clone, Default)]
pub struct Environment(HashMap<String, String>);

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

impl FromIterator<(String, String)> for Environment {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The set of property names shared by two entries, used by the `joint`
/// combinator (§4.3) to decide whether to natural-join or fall back to a
/// Cartesian product.
pub fn common_properties<'a>(entries: impl IntoIterator<Item = &'a Entry>) -> IndexSet<PropertyName> {
    let mut iter = entries.into_iter();
    let Some(first) = iter.next() else {
        return IndexSet::new();
    };
    let mut common: IndexSet<PropertyName> = first.keys().cloned().collect();
    for entry in iter {
        let keys: IndexSet<PropertyName> = entry.keys().cloned().collect();
        common.retain(|k| keys.contains(k));
    }
    common
}

/// Merge `new` into `base`, with `new` winning on conflicting keys.
///
/// This is the field-wise right-biased combine used both for identity merges
/// (§4.4 step 6) and for the left-to-right key merge in `and`/`joint`/Cartesian
/// fan-outs (§4.3).
pub fn merge_right_biased(base: &Entry, new: &Entry) -> Entry {
    let mut merged = base.clone();
    for (k, v) in new {
        merged.insert(k.clone(), v.clone());
    }
    merged
}
