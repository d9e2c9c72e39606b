//! Set combinators (§4.3, §4.4 step 3): `and` (concatenation), `joint`
//! (natural join falling back to Cartesian product), and the plain Cartesian
//! fan-out used by `modify`/`finalize`.
use crate::entry::{common_properties, merge_right_biased, Entry};
use crate::value::PropertyName;
use indexmap::IndexMap;

/// `joint` of N sub-spec result sets (§4.3): natural-join on the properties
/// common to every entry across every sub-spec, or a plain Cartesian product
/// (merging keys left-to-right) when there is no such common property, or when
/// any sub-spec produced no entries at all.
pub fn joint(results: &[Vec<Entry>]) -> Vec<Entry> {
    if results.is_empty() {
        return Vec::new();
    }
    if results.iter().any(Vec::is_empty) {
        return Vec::new();
    }

    let all_entries = results.iter().flatten();
    let common = common_properties(all_entries);

    if common.is_empty() {
        return cartesian_product(results);
    }

    group_and_join(results, &common)
}

/// Plain Cartesian product across N entry lists, merging keys left-to-right
/// (later lists win on conflict), used both as `joint`'s disjoint fallback and
/// as the fan-out rule for `modify`/`finalize` rules with several keys (§4.4).
pub fn cartesian_product(lists: &[Vec<Entry>]) -> Vec<Entry> {
    lists.iter().fold(vec![Entry::new()], |acc, list| {
        let mut out = Vec::with_capacity(acc.len() * list.len().max(1));
        for base in &acc {
            for entry in list {
                out.push(merge_right_biased(base, entry));
            }
        }
        out
    })
}

/// The natural-join path of `joint`: group each sub-spec's entries by the
/// tuple of values at the common properties, then emit the Cartesian product
/// of the per-sub-spec groups for every key present in every sub-spec.
///
/// Groups are kept in an order-preserving map keyed by that tuple so that
/// output order is deterministic and follows first-seen group key (§5, §9).
fn group_and_join(results: &[Vec<Entry>], common: &indexmap::IndexSet<PropertyName>) -> Vec<Entry> {
    let key_of = |entry: &Entry| -> Vec<String> {
        common.iter().map(|name| entry.get(name).cloned().unwrap_or_default()).collect()
    };

    let mut grouped: Vec<IndexMap<Vec<String>, Vec<Entry>>> = Vec::with_capacity(results.len());
    for list in results {
        let mut groups: IndexMap<Vec<String>, Vec<Entry>> = IndexMap::new();
        for entry in list {
            groups.entry(key_of(entry)).or_default().push(entry.clone());
        }
        grouped.push(groups);
    }

    let mut output = Vec::new();
    let Some(first) = grouped.first() else {
        return output;
    };

    for key in first.keys() {
        if let Some(per_subspec) = grouped
            .iter()
            .map(|g| g.get(key).cloned())
            .collect::<Option<Vec<Vec<Entry>>>>()
        {
            output.extend(cartesian_product(&per_subspec));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::PropertyName;

    fn entry(pairs: &[(&str, &str)]) -> Entry {
        pairs.iter().map(|(k, v)| (PropertyName::new(*k), v.to_string())).collect()
    }

    #[test]
    fn joint_natural_joins_on_common_property() {
        let a = vec![entry(&[("k", "A"), ("x", "1")]), entry(&[("k", "B"), ("x", "2")])];
        let b = vec![entry(&[("k", "A"), ("y", "9")]), entry(&[("k", "C"), ("y", "3")])];
        let out = joint(&[a, b]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get(&PropertyName::new("k")).unwrap(), "A");
        assert_eq!(out[0].get(&PropertyName::new("x")).unwrap(), "1");
        assert_eq!(out[0].get(&PropertyName::new("y")).unwrap(), "9");
    }

    #[test]
    fn joint_on_disjoint_schemas_is_cartesian_product() {
        let a = vec![entry(&[("x", "1")]), entry(&[("x", "2")])];
        let b = vec![entry(&[("y", "9")])];
        let out = joint(&[a, b]);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|e| e.get(&PropertyName::new("y")).unwrap() == "9"));
    }

    #[test]
    fn joint_with_empty_subspec_is_empty() {
        let a: Vec<Entry> = vec![];
        let b = vec![entry(&[("y", "9")])];
        let out = joint(&[a, b]);
        assert!(out.is_empty());
    }

    #[test]
    fn cartesian_product_merges_left_to_right() {
        let a = vec![entry(&[("x", "1")])];
        let b = vec![entry(&[("x", "2"), ("y", "3")])];
        let out = cartesian_product(&[a, b]);
        assert_eq!(out.len(), 1);
        // later list wins on conflicting keys
        assert_eq!(out[0].get(&PropertyName::new("x")).unwrap(), "2");
        assert_eq!(out[0].get(&PropertyName::new("y")).unwrap(), "3");
    }
}
