//! The action executor (§4.4): runs one action's full phase pipeline -
//! select, modify, execute, finalize, identity merge - against the current
//! entry store, returning the debug-trace records its `show-after` list asks for.
use crate::entry::{merge_right_biased, Entry, EntryStore, Environment};
use crate::error::{EntrySnapshot, KaonError};
use crate::interpolate::{interpolate, interpolate_resolved, resolve_defaults};
use crate::schema::{Action, ExecuteItem, ModifyRule, ShowPhase};
use crate::subprocess::CommandRunner;

/// One `show-after` snapshot: the entries visible right after `phase` ran.
#[derive(Debug, Clone)]
pub struct ActionTrace {
    pub phase: ShowPhase,
    pub entries: Vec<Entry>,
}

/// Run one action against `store`, mutating it in place, and return the
/// `show-after` traces it asked for (§6). The caller decides how (or whether)
/// to render those traces - this function stays free of any I/O.
pub fn run_action(
    action: &Action,
    action_index: usize,
    store: &mut EntryStore,
    env: &Environment,
    runner: &dyn CommandRunner,
) -> Result<Vec<ActionTrace>, KaonError> {
    let name = action.display_name(action_index);
    log::debug!("running action `{name}`");
    let mut traces = Vec::new();

    let mut working: Vec<Entry> = match &action.select {
        Some(spec) => {
            let known: Vec<Entry> = store.values().cloned().collect();
            crate::constraint::select(&known, spec, env)
        }
        // No `select` means the action seeds brand-new entries from scratch
        // rather than drawing on any previously known ones (§4.4 step 1, §9.1).
        None => vec![Entry::new()],
    };
    record(action, ShowPhase::Select, &working, &mut traces);

    working = apply_rules(working, &action.modify);
    record(action, ShowPhase::Modify, &working, &mut traces);

    working = run_execute(&name, &action.execute, working, env, runner)?;
    record(action, ShowPhase::Execute, &working, &mut traces);

    working = apply_rules(working, &action.finalize);
    record(action, ShowPhase::Finalize, &working, &mut traces);

    log::trace!("action `{name}`: {} entr(ies) entering identity merge", working.len());
    let updated =
        identity_merge(&name, action_index, action.id.as_deref(), working, store, env)?;
    record(action, ShowPhase::UpdatedEntries, &updated, &mut traces);

    Ok(traces)
}

fn record(action: &Action, phase: ShowPhase, entries: &[Entry], traces: &mut Vec<ActionTrace>) {
    if action.show_after.contains(&phase) {
        traces.push(ActionTrace { phase, entries: entries.to_vec() });
    }
}

/// Apply a `modify`/`finalize` rule list in order (§4.4 step 3): each rule
/// fans the working set out across the Cartesian product of its properties'
/// literal values, merging the result field-wise into each base entry.
///
/// Exposed crate-wide because the CLI also needs it, to statically discover
/// `option-name`/`variable-name` declarations without running `select` or
/// `execute` (§6.1) - those rules are static JSON literals, independent of
/// any runtime state, so evaluating them standalone is well-defined.
pub(crate) fn apply_rules(working: Vec<Entry>, rules: &[ModifyRule]) -> Vec<Entry> {
    rules.iter().fold(working, |working, rule| {
        let fanned = rule_fanout(rule);
        if fanned.is_empty() {
            return working;
        }
        working
            .iter()
            .flat_map(|base| fanned.iter().map(move |add| merge_right_biased(base, add)))
            .collect()
    })
}

/// The Cartesian product of one rule's property assignments: one tiny entry
/// per combination of its properties' literal values.
fn rule_fanout(rule: &ModifyRule) -> Vec<Entry> {
    rule.iter().fold(vec![Entry::new()], |acc, (name, literal)| {
        let values = literal.values();
        let mut out = Vec::with_capacity(acc.len() * values.len().max(1));
        for base in &acc {
            for value in &values {
                let mut next = base.clone();
                next.insert(name.clone(), value.render());
                out.push(next);
            }
        }
        out
    })
}

/// Run the `execute` items in order (§4.4 step 4), each one potentially
/// fanning an entry out into several (one per line of subprocess stdout).
fn run_execute(
    action_name: &str,
    items: &[ExecuteItem],
    working: Vec<Entry>,
    env: &Environment,
    runner: &dyn CommandRunner,
) -> Result<Vec<Entry>, KaonError> {
    items.iter().try_fold(working, |working, item| {
        run_execute_item(action_name, item, working, env, runner)
    })
}

fn run_execute_item(
    action_name: &str,
    item: &ExecuteItem,
    working: Vec<Entry>,
    env: &Environment,
    runner: &dyn CommandRunner,
) -> Result<Vec<Entry>, KaonError> {
    let mut out = Vec::new();

    for entry in &working {
        // A command that cannot be fully interpolated silently drops this
        // entry, the same as any other non-`id` interpolation (§4.2).
        let Some(command) = interpolate(&item.command, entry, env) else {
            continue;
        };

        let output = runner.run(&command).map_err(|source| KaonError::ExecuteSpawnError {
            action: action_name.to_owned(),
            command: command.clone(),
            source,
        })?;

        if output.status != 0 {
            return Err(KaonError::ExecuteProcessError {
                action: action_name.to_owned(),
                command,
                status: output.status,
            });
        }

        // `str::lines` already drops the single trailing empty line a final
        // `\n` would otherwise produce, matching Python's `splitlines()`; a
        // blank line anywhere else still reaches `split_line` and is subject
        // to the same arity check as any other line.
        for line in output.stdout.lines() {
            let fields = split_line(line, item.split.as_deref());
            if fields.len() != item.return_properties.len() {
                return Err(KaonError::ExecuteArityError {
                    action: action_name.to_owned(),
                    expected: item.return_properties.len(),
                    got: fields.len(),
                    line: line.to_owned(),
                });
            }

            // §9.1 open question, resolved: returned fields are defaults
            // beneath the input entry - the input wins on conflict.
            let mut next = entry.clone();
            for (name, value) in item.return_properties.iter().zip(fields) {
                next.entry(name.clone()).or_insert(value);
            }
            out.push(next);
        }
    }

    Ok(out)
}

/// Split one line of `execute` output: on a literal separator if `split` was
/// given, otherwise on runs of whitespace (§5.1, §9.1 - `split` is a literal
/// string, not a regular expression, matching `str.split` in `kaon.py`).
fn split_line(line: &str, sep: Option<&str>) -> Vec<String> {
    match sep {
        Some(sep) => line.split(sep).map(str::to_owned).collect(),
        None => line.split_whitespace().map(str::to_owned).collect(),
    }
}

/// Identity-merge the working set into the store (§4.4 step 6): resolve each
/// entry's `@default` properties, interpolate its `id` template - fatally, on
/// failure - then merge it field-wise, right-biased, into any existing entry
/// at that id.
///
/// When the action declares no `id` at all (§4.4 step 6: "if `id` present"),
/// there is nothing to merge against: each entry is appended to the store
/// under a fresh internal key it can never collide with (store keys never
/// reach output - only the `Entry` values do).
fn identity_merge(
    action_name: &str,
    action_index: usize,
    id_template: Option<&str>,
    working: Vec<Entry>,
    store: &mut EntryStore,
    env: &Environment,
) -> Result<Vec<Entry>, KaonError> {
    let mut updated = Vec::with_capacity(working.len());

    for (i, entry) in working.iter().enumerate() {
        let resolved = resolve_defaults(entry);

        let id = match id_template {
            Some(template) => interpolate_resolved(template, &resolved, env).ok_or_else(|| {
                KaonError::MissingPlaceholderInId {
                    action: action_name.to_owned(),
                    template: template.to_owned(),
                    entry: EntrySnapshot::new(&resolved),
                }
            })?,
            None => format!("\0auto/{action_index}/{i}"),
        };

        let merged = match store.get(&id) {
            Some(existing) => merge_right_biased(existing, &resolved),
            None => resolved,
        };
        store.insert(id, merged.clone());
        updated.push(merged);
    }

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::SelectSpec;
    use crate::subprocess::test_support::StubRunner;
    use crate::value::PropertyName;
    use indexmap::IndexMap;

    fn rule(pairs: &[(&str, &str)]) -> ModifyRule {
        pairs
            .iter()
            .map(|(k, v)| {
                let json = if v.starts_with('[') || v.starts_with('{') {
                    v.to_string()
                } else {
                    format!("{v:?}")
                };
                (PropertyName::new(*k), serde_json::from_str(&json).unwrap())
            })
            .collect()
    }

    fn action(id: &str) -> Action {
        Action {
            name: None,
            select: None,
            modify: Vec::new(),
            execute: Vec::new(),
            finalize: Vec::new(),
            show_after: Vec::new(),
            id: Some(id.to_owned()),
        }
    }

    #[test]
    fn modify_only_action_seeds_and_stores_a_fresh_entry() {
        let mut a = action("e-{name}");
        a.modify = vec![rule(&[("name", "e1")])];
        let mut store = EntryStore::new();
        let runner = StubRunner::new();
        run_action(&a, 0, &mut store, &Environment::new(), &runner).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("e-e1").unwrap().get(&PropertyName::new("name")).unwrap(), "e1");
    }

    #[test]
    fn modify_rule_fans_out_across_list_literal() {
        let mut a = action("e-{name}");
        a.modify = vec![rule(&[("name", "[\"e1\", \"e2\"]")])];
        let mut store = EntryStore::new();
        let runner = StubRunner::new();
        run_action(&a, 0, &mut store, &Environment::new(), &runner).unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.contains_key("e-e1"));
        assert!(store.contains_key("e-e2"));
    }

    #[test]
    fn identity_merge_upserts_existing_entry() {
        let mut store = EntryStore::new();
        let mut first = Entry::new();
        first.insert(PropertyName::new("name"), "e1".to_owned());
        first.insert(PropertyName::new("kept"), "yes".to_owned());
        store.insert("e-e1".to_owned(), first);

        let mut a = action("e-{name}");
        a.modify = vec![rule(&[("name", "e1"), ("added", "new")])];
        let runner = StubRunner::new();
        run_action(&a, 0, &mut store, &Environment::new(), &runner).unwrap();

        let merged = store.get("e-e1").unwrap();
        assert_eq!(merged.get(&PropertyName::new("kept")).unwrap(), "yes");
        assert_eq!(merged.get(&PropertyName::new("added")).unwrap(), "new");
    }

    #[test]
    fn missing_id_placeholder_is_fatal() {
        let a = action("e-{missing}");
        let mut store = EntryStore::new();
        let runner = StubRunner::new();
        let err = run_action(&a, 0, &mut store, &Environment::new(), &runner).unwrap_err();
        assert!(matches!(err, KaonError::MissingPlaceholderInId { .. }));
    }

    #[test]
    fn action_without_id_appends_each_entry_without_merging() {
        let mut a = action("unused");
        a.id = None;
        a.modify = vec![rule(&[("name", "[\"e1\", \"e1\"]")])];
        let mut store = EntryStore::new();
        let runner = StubRunner::new();
        run_action(&a, 0, &mut store, &Environment::new(), &runner).unwrap();
        // Two entries with identical properties still land as two separate
        // rows, since there is no `id` to merge them by.
        assert_eq!(store.len(), 2);
        assert!(store.values().all(|e| e.get(&PropertyName::new("name")).unwrap() == "e1"));
    }

    #[test]
    fn execute_returned_fields_do_not_overwrite_the_input_entry() {
        let mut a = action("e-{slot}");
        a.modify = vec![rule(&[("slot", "1"), ("name", "pinned")])];
        a.execute = vec![ExecuteItem {
            command: "whoami".to_owned(),
            return_properties: vec![PropertyName::new("name"), PropertyName::new("extra")],
            split: None,
        }];
        let runner = StubRunner::new();
        runner.stub("whoami", "from-command extra-value\n", 0);
        let mut store = EntryStore::new();
        run_action(&a, 0, &mut store, &Environment::new(), &runner).unwrap();
        let entry = store.get("e-1").unwrap();
        // `name` came from `modify` first, so the returned field is dropped.
        assert_eq!(entry.get(&PropertyName::new("name")).unwrap(), "pinned");
        // `extra` has no prior value, so the returned field fills it in.
        assert_eq!(entry.get(&PropertyName::new("extra")).unwrap(), "extra-value");
    }

    #[test]
    fn execute_fans_out_one_entry_per_output_line() {
        let mut a = action("e-{name}");
        a.execute = vec![ExecuteItem {
            command: "list-names".to_owned(),
            return_properties: vec![PropertyName::new("name")],
            split: None,
        }];
        let runner = StubRunner::new();
        runner.stub("list-names", "e1\ne2\n", 0);
        let mut store = EntryStore::new();
        run_action(&a, 0, &mut store, &Environment::new(), &runner).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn execute_arity_mismatch_is_fatal() {
        let mut a = action("e-{name}");
        a.execute = vec![ExecuteItem {
            command: "list-names".to_owned(),
            return_properties: vec![PropertyName::new("name"), PropertyName::new("extra")],
            split: None,
        }];
        let runner = StubRunner::new();
        runner.stub("list-names", "only-one-field\n", 0);
        let mut store = EntryStore::new();
        let err = run_action(&a, 0, &mut store, &Environment::new(), &runner).unwrap_err();
        assert!(matches!(err, KaonError::ExecuteArityError { .. }));
    }

    #[test]
    fn execute_nonzero_exit_is_fatal() {
        let mut a = action("e-{name}");
        a.execute = vec![ExecuteItem {
            command: "boom".to_owned(),
            return_properties: vec![PropertyName::new("name")],
            split: None,
        }];
        let runner = StubRunner::new();
        runner.stub("boom", "", 1);
        let mut store = EntryStore::new();
        let err = run_action(&a, 0, &mut store, &Environment::new(), &runner).unwrap_err();
        assert!(matches!(err, KaonError::ExecuteProcessError { .. }));
    }

    #[test]
    fn select_narrows_the_working_set_before_modify() {
        let mut store = EntryStore::new();
        let mut e1 = Entry::new();
        e1.insert(PropertyName::new("name"), "e1".to_owned());
        store.insert("e-e1".to_owned(), e1);
        let mut e2 = Entry::new();
        e2.insert(PropertyName::new("name"), "e2".to_owned());
        store.insert("e-e2".to_owned(), e2);

        let mut obj: IndexMap<PropertyName, Vec<crate::constraint::Clause>> = IndexMap::new();
        obj.insert(
            PropertyName::new("name"),
            vec![crate::constraint::Clause::Literal(
                serde_json::from_str(r#""e1""#).unwrap(),
            )],
        );
        let mut a = action("{name}-tagged");
        a.select = Some(SelectSpec::Object(obj));
        a.modify = vec![rule(&[("tag", "x")])];
        let runner = StubRunner::new();
        run_action(&a, 0, &mut store, &Environment::new(), &runner).unwrap();

        assert!(store.contains_key("e1-tagged"));
        assert!(!store.contains_key("e2-tagged"));
    }
}
