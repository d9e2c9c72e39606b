use anyhow::{bail, Context, Result};
use clap::error::ErrorKind;
use kaon::cli;
use kaon::constraints::parse_constraints;
use kaon::engine::{self, ConstrainedView, EngineConfig};
use kaon::error::KaonError;
use kaon::output::{self, OutputFormat};
use kaon::schema::{parse_schema, Action};
use kaon::subprocess::ShellRunner;
use kaon::value::PropertyName;
use std::io::Read;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(exit_code_for(&err));
    }
}

/// §6.1's exit-code convention: 1 for argument/schema-loading errors, 2 for
/// errors raised while actually executing the schema.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<KaonError>() {
        Some(KaonError::SchemaError { .. } | KaonError::IOError { .. }) => 1,
        Some(_) => 2,
        None => 1,
    }
}

fn run() -> Result<()> {
    let raw_args: Vec<String> = std::env::args().skip(1).collect();

    // First pass (mirrors `original_source/kaon.py`'s `parse_known_args`):
    // grab just the schema files and `--constrains` list, ignoring any flag we
    // don't know about yet, so we can load the schema and discover the rest.
    let prescan = clap::Command::new("kaon")
        .disable_help_flag(true)
        .disable_version_flag(true)
        .ignore_errors(true)
        .arg(clap::Arg::new("schema").num_args(1..))
        .arg(
            clap::Arg::new("constrains")
                .long("constrains")
                .num_args(1..)
                .action(clap::ArgAction::Append),
        );
    let prematches = prescan
        .try_get_matches_from(std::iter::once("kaon".to_owned()).chain(raw_args.iter().cloned()))
        .expect("prescan command never errors with ignore_errors enabled");

    let schema_files: Vec<String> =
        prematches.get_many::<String>("schema").into_iter().flatten().cloned().collect();
    if schema_files.is_empty() {
        bail!("no schema file given; pass at least one schema file, or `-` for stdin");
    }

    let schema = load_schema(&schema_files)?;
    let options = cli::discover_options(&schema);
    let variables = cli::discover_variables(&schema);

    let command = cli::build_command(&options, &variables);
    let matches = get_matches_or_exit(
        command,
        std::iter::once("kaon".to_owned()).chain(raw_args.iter().cloned()),
    );

    init_logger(matches.get_count("log"));

    let constrains_files: Vec<String> =
        matches.get_many::<String>("constrains").into_iter().flatten().cloned().collect();
    let file_views = load_constraints(&constrains_files)?;
    let cli_view = cli::view_from_matches(&matches, &options);
    let constrained_view: ConstrainedView = cli::build_constrained_view(cli_view, file_views);

    let env = cli::environment_from_matches(&matches, &variables);
    let show: Option<Vec<PropertyName>> = matches
        .get_many::<String>("show")
        .map(|values| values.map(|s| PropertyName::new(s.clone())).collect());
    let output_format: OutputFormat = cli::output_format_from_matches(&matches);
    let column_sep = matches.get_one::<String>("column-sep").cloned().unwrap_or_else(|| " ".to_owned());

    let runner = ShellRunner;
    let config = EngineConfig { runner: &runner };
    let (entries, traces) = engine::run(&schema, &constrained_view, &env, &config)?;

    for engine_trace in &traces {
        // §6: exactly `> Entries after applying \`<phase>\`` (or `> Updated
        // entries`), independent of which action produced the trace.
        eprintln!("> {}", engine_trace.trace.phase.trace_header());
        let json = output::pretty_print(&output::entries_as_sorted_maps(&engine_trace.trace.entries));
        eprintln!("{json}");
    }

    let rendered = output::render(&entries, output_format, show.as_deref(), &column_sep);
    if !rendered.is_empty() {
        println!("{rendered}");
    }

    Ok(())
}

/// `--log` (repeatable, §6) raises internal `log`-facade verbosity on top of
/// whatever `RUST_LOG` already asks for: once for per-command tracing (each
/// `execute` invocation, at `debug`), twice for full engine tracing (`trace`).
fn init_logger(log_count: u8) {
    let default_level = match log_count {
        0 => "warn",
        1 => "kaon=debug",
        _ => "kaon=trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();
}

fn get_matches_or_exit(
    command: clap::Command,
    args: impl IntoIterator<Item = String>,
) -> clap::ArgMatches {
    match command.try_get_matches_from(args) {
        Ok(matches) => matches,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = e.print();
            std::process::exit(code);
        }
    }
}

fn load_schema(files: &[String]) -> Result<Vec<Action>> {
    let mut actions = Vec::new();
    for file in files {
        let source = read_input(file)?;
        actions.extend(parse_schema(&source, file)?);
    }
    Ok(actions)
}

fn load_constraints(files: &[String]) -> Result<ConstrainedView> {
    let mut views = Vec::new();
    for file in files {
        let source = read_input(file)?;
        views.extend(parse_constraints(&source, file)?);
    }
    Ok(views)
}

fn read_input(path: &str) -> Result<String> {
    if path == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).context("failed to read schema from stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(path)
            .map_err(|source| KaonError::IOError { path: path.to_owned(), source }.into())
    }
}
