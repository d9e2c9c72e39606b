//! The command-line surface (§6, §6.1): a fixed set of engine-wide flags plus
//! flags generated at runtime from the loaded schema's `option-name`/
//! `variable-name` declarations.
use crate::action::apply_rules;
use crate::constraints::expand_one;
use crate::engine::{ConstrainedView, View};
use crate::entry::{Entry, Environment};
use crate::output::OutputFormat;
use crate::schema::Action;
use crate::value::{PropertyName, PropertyValue, PropertyValueLiteral};
use clap::{Arg, ArgAction, Command};

/// One `option-name`/`option-doc` declaration found in the schema (§6.1).
#[derive(Debug, Clone)]
pub struct OptionDecl {
    pub name: String,
    pub doc: String,
    pub group: Option<String>,
}

/// One `variable-name`/`variable-doc` declaration found in the schema (§6.1).
#[derive(Debug, Clone)]
pub struct VariableDecl {
    pub name: String,
    pub default: Option<String>,
    pub doc: String,
}

/// Evaluate one action's `modify` then `finalize` rules from a single empty
/// seed entry, ignoring `select`/`execute` entirely (§6.1).
fn static_entries(action: &Action) -> Vec<Entry> {
    let seeded = apply_rules(vec![Entry::new()], &action.modify);
    apply_rules(seeded, &action.finalize)
}

/// Scan every action for `option-name`/`option-doc` declarations, in
/// first-declared order, later re-declarations of the same name updating the
/// doc/group in place (matching `original_source/kaon.py`'s `dict` accumulation).
pub fn discover_options(schema: &[Action]) -> Vec<OptionDecl> {
    let mut seen: indexmap::IndexMap<String, OptionDecl> = indexmap::IndexMap::new();
    for action in schema {
        for entry in static_entries(action) {
            let name = entry.get(&PropertyName::new("option-name"));
            let doc = entry.get(&PropertyName::new("option-doc"));
            if let (Some(name), Some(doc)) = (name, doc) {
                let group = entry.get(&PropertyName::new("option-group")).cloned();
                seen.insert(
                    name.clone(),
                    OptionDecl { name: name.clone(), doc: doc.clone(), group },
                );
            }
        }
    }
    seen.into_values().collect()
}

/// As [`discover_options`], for `variable-name`/`variable-doc`/`variable-default`.
pub fn discover_variables(schema: &[Action]) -> Vec<VariableDecl> {
    let mut seen: indexmap::IndexMap<String, VariableDecl> = indexmap::IndexMap::new();
    for action in schema {
        for entry in static_entries(action) {
            let name = entry.get(&PropertyName::new("variable-name"));
            let doc = entry.get(&PropertyName::new("variable-doc"));
            if let (Some(name), Some(doc)) = (name, doc) {
                let default = entry.get(&PropertyName::new("variable-default")).cloned();
                seen.insert(
                    name.clone(),
                    VariableDecl { name: name.clone(), default, doc: doc.clone() },
                );
            }
        }
    }
    seen.into_values().collect()
}

/// Build the full `clap::Command`: the fixed engine flags plus one flag per
/// discovered option and variable, options grouped under their declared
/// `option-group` as a help heading (§6, §6.1).
pub fn build_command(options: &[OptionDecl], variables: &[VariableDecl]) -> Command {
    let mut cmd = Command::new("kaon")
        .version(clap::crate_version!())
        .author("clux <sszynrae@gmail.com>")
        .about("KhAOs Nemesis: turn a filesystem into a queryable information system")
        .arg(
            Arg::new("schema")
                .help("schema file(s) to run, in order; `-` reads from stdin")
                .required(true)
                .num_args(1..),
        )
        .arg(
            Arg::new("constrains")
                .long("constrains")
                .help("constraints file(s) narrowing the output to a view")
                .num_args(1..)
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("show")
                .long("show")
                .help("output only the named properties")
                .num_args(1..),
        )
        .arg(
            Arg::new("output-format")
                .long("output-format")
                .help("how to print the entries")
                .value_parser(["headless-table", "table", "json", "schema"])
                .default_value("headless-table"),
        )
        .arg(
            Arg::new("column-sep")
                .long("column-sep")
                .help("column separator used in table output")
                .default_value(" "),
        )
        .arg(
            Arg::new("log")
                .long("log")
                .help("increase internal log verbosity (may be repeated)")
                .action(ArgAction::Count),
        );

    for opt in options {
        let mut arg = Arg::new(format!("opt:{}", opt.name))
            .long(opt.name.clone())
            .help(opt.doc.clone())
            .num_args(1..)
            .action(ArgAction::Append);
        if let Some(group) = &opt.group {
            arg = arg.help_heading(group.clone());
        }
        cmd = cmd.arg(arg);
    }

    for var in variables {
        let mut arg = Arg::new(format!("var:{}", var.name))
            .long(var.name.clone())
            .help(var.doc.clone())
            .help_heading("Variables");
        // §6.1: a schema variable is required unless it declares a default.
        arg = match &var.default {
            Some(default) => arg.default_value(default.clone()),
            None => arg.required(true),
        };
        cmd = cmd.arg(arg);
    }

    cmd
}

/// Build the [`Environment`] (`--var`-style schema variables, §6.1) from
/// parsed matches.
pub fn environment_from_matches(matches: &clap::ArgMatches, variables: &[VariableDecl]) -> Environment {
    let mut env = Environment::new();
    for var in variables {
        if let Some(value) = matches.get_one::<String>(&format!("var:{}", var.name)) {
            env.insert(var.name.clone(), value.clone());
        }
    }
    env
}

/// Build the single CLI-derived [`View`] (one conjunction) from every
/// `--<option-name>` flag the user actually passed (§4.5 step 3, §6.1).
///
/// Each raw value goes through the same range expansion `--constrains` files
/// use (`original_source/kaon.py`'s `process_args` calls
/// `normalize_value_constrain` on CLI values identically to file values), so
/// `--cfg_num 1000:1100` narrows to the 100 individual values, not the
/// literal string `"1000:1100"`.
pub fn view_from_matches(matches: &clap::ArgMatches, options: &[OptionDecl]) -> View {
    let mut view = View::new();
    for opt in options {
        let values: Vec<PropertyValue> = matches
            .get_many::<String>(&format!("opt:{}", opt.name))
            .into_iter()
            .flatten()
            .flat_map(|v| expand_one(v))
            .collect();
        if !values.is_empty() {
            view.insert(PropertyName::new(opt.name.clone()), PropertyValueLiteral::List(values));
        }
    }
    view
}

/// Combine the CLI-derived view with any `--constrains` file views (§4.5 step 3).
///
/// `original_source/kaon.py`'s `get_constrained_view` intersects each file
/// view's existing value set with the CLI's; we take the simpler, still
/// explicit-wins reading: a CLI-supplied option narrows every file view down
/// to exactly the values the user passed (an Open Question resolution - see
/// the design notes).
pub fn build_constrained_view(cli_view: View, file_views: ConstrainedView) -> ConstrainedView {
    if cli_view.is_empty() {
        return file_views;
    }
    if file_views.is_empty() {
        return vec![cli_view];
    }
    file_views
        .into_iter()
        .map(|mut view| {
            for (name, literal) in &cli_view {
                view.insert(name.clone(), literal.clone());
            }
            view
        })
        .collect()
}

pub fn output_format_from_matches(matches: &clap::ArgMatches) -> OutputFormat {
    let raw = matches.get_one::<String>("output-format").map(String::as_str).unwrap_or("headless-table");
    OutputFormat::parse(raw).unwrap_or(OutputFormat::HeadlessTable)
}
