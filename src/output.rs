//! Output formatting (§6): render the final entries as a table (with or
//! without headers), as JSON, or as a round-trippable schema fragment.
use crate::entry::Entry;
use crate::value::PropertyName;
use indexmap::IndexSet;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Serializer;
use std::collections::BTreeMap;

/// Properties that exist purely to drive the CLI (§6.1) and are hidden from
/// output unless the caller explicitly asks for them via `--show`.
pub const IGNORED_ATTRIBUTES: [&str; 6] = [
    "option-name",
    "option-doc",
    "option-group",
    "variable-name",
    "variable-doc",
    "variable-default",
];

/// The four ways the final entries can be rendered (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    HeadlessTable,
    Table,
    Json,
    Schema,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "headless-table" => Some(Self::HeadlessTable),
            "table" => Some(Self::Table),
            "json" => Some(Self::Json),
            "schema" => Some(Self::Schema),
            _ => None,
        }
    }
}

/// Render `entries` in `format`, applying `--show` column selection.
pub fn render(
    entries: &[Entry],
    format: OutputFormat,
    show: Option<&[PropertyName]>,
    column_sep: &str,
) -> String {
    match format {
        OutputFormat::HeadlessTable => render_table(entries, show, false, column_sep),
        OutputFormat::Table => render_table(entries, show, true, column_sep),
        OutputFormat::Json => render_json(entries, show),
        OutputFormat::Schema => render_schema(entries, show),
    }
}

/// Keep only the properties named in `show` (when given), or everything but
/// [`IGNORED_ATTRIBUTES`] (unless `keep_internal` is set), dropping any entry
/// left with no properties at all.
fn restrict(entries: &[Entry], show: Option<&[PropertyName]>, keep_internal: bool) -> Vec<Entry> {
    entries
        .iter()
        .filter_map(|entry| {
            let filtered: Entry = entry
                .iter()
                .filter(|(k, _)| {
                    if let Some(show) = show {
                        show.contains(k)
                    } else {
                        let k: &str = k;
                        keep_internal || !IGNORED_ATTRIBUTES.contains(&k)
                    }
                })
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            if filtered.is_empty() {
                None
            } else {
                Some(filtered)
            }
        })
        .collect()
}

fn render_table(entries: &[Entry], show: Option<&[PropertyName]>, with_headers: bool, sep: &str) -> String {
    let restricted = restrict(entries, show, false);

    let columns: Vec<PropertyName> = match show {
        Some(show) => show.to_vec(),
        None => {
            let mut seen: IndexSet<PropertyName> = IndexSet::new();
            for entry in &restricted {
                for key in entry.keys() {
                    seen.insert(key.clone());
                }
            }
            seen.into_iter().collect()
        }
    };

    let mut rows: Vec<Vec<String>> = restricted
        .iter()
        .map(|entry| {
            columns.iter().map(|c| entry.get(c).cloned().unwrap_or_else(|| "_null_".to_owned())).collect()
        })
        .collect();

    if with_headers {
        rows.insert(0, columns.iter().map(PropertyName::to_string).collect());
    }

    if rows.is_empty() {
        return String::new();
    }

    let mut widths = vec![0usize; columns.len()];
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.len());
        }
    }

    rows.iter()
        .map(|row| {
            row.iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{cell:width$}"))
                .collect::<Vec<_>>()
                .join(sep)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Flatten entries into plain sorted-key maps, ready for `pretty_print`
/// (used by both the `json`/`schema` output formats and the binary's debug
/// trace dump, so all three agree on formatting).
pub fn entries_as_sorted_maps(entries: &[Entry]) -> Vec<BTreeMap<String, String>> {
    entries.iter().map(|e| e.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()).collect()
}

/// Serialize as 4-space-indented, alphabetically-sorted-key JSON (`serde_json`
/// sorts map keys because `BTreeMap`/`serde_json::Map`'s `preserve_order`
/// feature is off), matching `original_source/kaon.py`'s
/// `json.dump(..., indent=4, sort_keys=True)`.
pub fn pretty_print(value: &impl Serialize) -> String {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut ser = Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser).expect("string-keyed maps always serialize");
    String::from_utf8(buf).expect("serde_json output is valid UTF-8")
}

fn render_json(entries: &[Entry], show: Option<&[PropertyName]>) -> String {
    pretty_print(&entries_as_sorted_maps(&restrict(entries, show, false)))
}

/// Render the entries back out as a single-action schema fragment (`modify`,
/// with no `id`), so the output of one run can be fed into another as a
/// schema file (§6). Omitting `id` means feeding this back through
/// `parse_schema`/`engine::run` never identity-merges - each entry lands
/// fresh, which is exactly what re-emitting someone else's final entries
/// calls for.
fn render_schema(entries: &[Entry], show: Option<&[PropertyName]>) -> String {
    let restricted = entries_as_sorted_maps(&restrict(entries, show, true));
    pretty_print(&serde_json::json!([{ "modify": restricted }]))
}
