//! The top-level schema engine (§4.5): runs a loaded schema's actions in
//! order against an entry store, then narrows the result down to a
//! constrained view for output.
use crate::action::{run_action, ActionTrace};
use crate::entry::{Entry, EntryStore, Environment};
use crate::error::KaonError;
use crate::interpolate::resolve_defaults;
use crate::schema::Action;
use crate::subprocess::CommandRunner;
use crate::value::{PropertyName, PropertyValueLiteral};
use indexmap::IndexMap;

/// One conjunctive view: an entry matches it when every named property holds
/// one of the listed values (§4.5 step 3, `--constrains`).
pub type View = IndexMap<PropertyName, PropertyValueLiteral>;

/// A disjunction of [`View`]s: an entry matches a constrained view when it
/// matches at least one of its views, or unconditionally when the list is
/// empty (§4.5 step 3; `original_source/kaon.py`'s `get_constrained_view`
/// returns a single empty view - equivalent here to an unconstrained match).
pub type ConstrainedView = Vec<View>;

fn matches_view(entry: &Entry, view: &View) -> bool {
    view.iter().all(|(name, literal)| match entry.get(name) {
        Some(value) => literal.values().iter().any(|v| &v.render() == value),
        None => false,
    })
}

/// Whether `entry` satisfies the constrained view (§4.5 step 3).
pub fn matches_constrained_view(entry: &Entry, constrained_view: &ConstrainedView) -> bool {
    constrained_view.is_empty() || constrained_view.iter().any(|view| matches_view(entry, view))
}

/// Engine-wide settings that do not belong to any one action: the subprocess
/// backend (swappable for testing, §9 design note) and internal `log`-facade
/// verbosity are configured by the caller directly; this struct only carries
/// what `run` itself needs.
pub struct EngineConfig<'a> {
    pub runner: &'a dyn CommandRunner,
}

/// A trace record produced while running one action, tagged with the
/// action's display name so callers can render `> <header> (action <name>)`-style
/// headers without threading the action list back through (§6).
pub struct EngineTrace {
    pub action_name: String,
    pub trace: ActionTrace,
}

/// Run every action in `schema`, in order, against a fresh entry store, then
/// filter the result down to entries matching `constrained_view` (§4.5).
///
/// Returns the final, `@default`-resolved entries alongside every debug trace
/// record the schema's `show-after` declarations asked for, in the order they
/// were produced.
pub fn run(
    schema: &[Action],
    constrained_view: &ConstrainedView,
    env: &Environment,
    config: &EngineConfig,
) -> Result<(Vec<Entry>, Vec<EngineTrace>), KaonError> {
    log::debug!("running schema with {} action(s)", schema.len());
    let mut store = EntryStore::new();
    let mut traces = Vec::new();

    for (index, action) in schema.iter().enumerate() {
        let action_traces = run_action(action, index, &mut store, env, config.runner)?;
        let action_name = action.display_name(index);
        traces.extend(
            action_traces
                .into_iter()
                .map(|trace| EngineTrace { action_name: action_name.clone(), trace }),
        );
    }

    let entries: Vec<Entry> = store
        .values()
        .map(resolve_defaults)
        .filter(|entry| matches_constrained_view(entry, constrained_view))
        .collect();
    log::debug!("schema run produced {} entr(ies) after view filtering", entries.len());

    Ok((entries, traces))
}
