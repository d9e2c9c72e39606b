//! Placeholder interpolation (§4.2) and `@default`-resolution.
use crate::entry::{Entry, Environment};
use crate::value::{PropertyName, DEFAULT_SUFFIX};

/// Produce a new entry where every `@default`-suffixed key has been resolved
/// into its suffix-less counterpart: if the stripped key is already present,
/// the tentative one is dropped; otherwise the tentative value becomes the
/// stripped key's value (§3, §4.2).
///
/// Resolving twice is the same as resolving once (§8 property 4): a second
/// pass sees no `@default`-suffixed keys left to process.
pub fn resolve_defaults(entry: &Entry) -> Entry {
    let mut resolved = Entry::new();
    let mut tentative: Vec<(&PropertyName, &String)> = Vec::new();

    for (name, value) in entry {
        if name.is_tentative() {
            tentative.push((name, value));
        } else {
            resolved.insert(name.clone(), value.clone());
        }
    }

    for (name, value) in tentative {
        let base = PropertyName::new(name.base_name());
        if !resolved.contains_key(&base) {
            resolved.insert(base, value.clone());
        }
    }

    resolved
}

/// Interpolate `{name}` placeholders in `template` against an `@default`-resolved
/// `entry`, falling back to `env` when the entry lacks the name. Returns `None`
/// ("Missing") if any placeholder cannot be resolved - callers decide whether
/// that is a silent guard (select/execute) or a fatal error (identity, via
/// [`interpolate_required`]).
pub fn interpolate(template: &str, entry: &Entry, env: &Environment) -> Option<String> {
    let resolved = resolve_defaults(entry);
    interpolate_resolved(template, &resolved, env)
}

/// As [`interpolate`], but the caller has already `@default`-resolved the entry
/// and wants to avoid resolving it again (e.g. clause chains in §4.3.1, where
/// every intermediate clause sees the same resolved view).
pub fn interpolate_resolved(template: &str, resolved_entry: &Entry, env: &Environment) -> Option<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after_open = &rest[open + 1..];
        let close = after_open.find('}')?;
        let name = &after_open[..close];

        let value = resolved_entry
            .get(&PropertyName::new(name))
            .cloned()
            .or_else(|| env.get(name).map(str::to_owned))?;
        out.push_str(&value);

        rest = &after_open[close + 1..];
    }
    out.push_str(rest);
    Some(out)
}

/// Interpolate the identity template: a missing placeholder is fatal (§4.4 step 6).
pub fn interpolate_required(
    template: &str,
    entry: &Entry,
    env: &Environment,
) -> Result<String, ()> {
    interpolate(template, entry, env).ok_or(())
}
