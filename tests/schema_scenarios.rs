//! End-to-end schema-engine scenarios, exercising schema parsing, action
//! execution and the constrained-view filter together (the §8 worked
//! scenarios S1-S6).
use kaon::constraints::parse_constraints;
use kaon::engine::{self, ConstrainedView, EngineConfig, View};
use kaon::entry::Environment;
use kaon::error::KaonError;
use kaon::schema::parse_schema;
use kaon::subprocess::ShellRunner;
use kaon::value::{PropertyName, PropertyValue, PropertyValueLiteral};

fn run(schema_json: &str, view: ConstrainedView) -> Vec<kaon::entry::Entry> {
    let actions = parse_schema(schema_json, "schema.json").unwrap();
    let runner = ShellRunner;
    let config = EngineConfig { runner: &runner };
    let (entries, _traces) = engine::run(&actions, &view, &Environment::new(), &config).unwrap();
    entries
}

#[test]
fn s1_matching_re_copy_to_on_a_reselected_entry() {
    let schema = r#"[
        {"modify": [{"name": "e1"}, {"name": "e2", "kind": "file"}],
         "finalize": {"kind": "ensemble"}, "id": "e-{name}"},
        {"select": {"name": {"matching-re": "e(?P<num>\\d+)", "copy-to": "alias"}},
         "id": "e-{name}"}
    ]"#;

    let entries = run(schema, Vec::new());
    assert_eq!(entries.len(), 2);
    for entry in &entries {
        assert_eq!(entry.get(&PropertyName::new("kind")).unwrap(), "ensemble");
        let name = entry.get(&PropertyName::new("name")).unwrap();
        let alias = entry.get(&PropertyName::new("alias")).unwrap();
        assert_eq!(name, alias);
        let num = entry.get(&PropertyName::new("num")).unwrap();
        assert_eq!(name, &format!("e{num}"));
    }
}

#[test]
fn s1_with_view_keeps_only_the_matching_entry() {
    let schema = r#"[
        {"modify": [{"name": "e1"}, {"name": "e2", "kind": "file"}],
         "finalize": {"kind": "ensemble"}, "id": "e-{name}"},
        {"select": {"name": {"matching-re": "e(?P<num>\\d+)", "copy-to": "alias"}},
         "id": "e-{name}"}
    ]"#;

    let mut view = View::new();
    view.insert(
        PropertyName::new("name"),
        PropertyValueLiteral::List(vec![PropertyValue::Plain("e2".to_owned())]),
    );
    let entries = run(schema, vec![view]);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].get(&PropertyName::new("name")).unwrap(), "e2");
}

#[test]
fn s2_execute_fans_out_across_modify_fanout_and_output_lines() {
    let schema = r#"[
        {"modify": [{"prefix@default": "pre0"}, {"prefix": "pre1"}],
         "execute": {"command": "for i in 1 2; do echo {prefix} $i; done",
                     "return-properties": ["o0", "o1"]},
         "id": "ex-{o0}-{o1}"}
    ]"#;

    let entries = run(schema, Vec::new());
    let mut pairs: Vec<(String, String, String)> = entries
        .iter()
        .map(|e| {
            (
                e.get(&PropertyName::new("prefix")).unwrap().clone(),
                e.get(&PropertyName::new("o0")).unwrap().clone(),
                e.get(&PropertyName::new("o1")).unwrap().clone(),
            )
        })
        .collect();
    pairs.sort();

    assert_eq!(
        pairs,
        vec![
            ("pre0".to_owned(), "pre0".to_owned(), "1".to_owned()),
            ("pre0".to_owned(), "pre0".to_owned(), "2".to_owned()),
            ("pre1".to_owned(), "pre1".to_owned(), "1".to_owned()),
            ("pre1".to_owned(), "pre1".to_owned(), "2".to_owned()),
        ]
    );
}

#[test]
fn s3_joint_natural_join_on_common_property() {
    let schema = r#"[
        {"modify": [{"k": "A", "x": "1"}, {"k": "B", "x": "2"}], "id": "left-{k}"},
        {"modify": [{"k": "A", "y": "9"}, {"k": "C", "y": "3"}], "id": "right-{k}"},
        {"select": ["joint",
                    {"x": {"in": null}},
                    {"y": {"in": null}}],
         "id": "joined-{k}"}
    ]"#;

    let entries = run(schema, Vec::new());
    let joined: Vec<_> = entries.iter().filter(|e| e.get(&PropertyName::new("x")).is_some() && e.get(&PropertyName::new("y")).is_some()).collect();
    assert_eq!(joined.len(), 1);
    assert_eq!(joined[0].get(&PropertyName::new("k")).unwrap(), "A");
    assert_eq!(joined[0].get(&PropertyName::new("x")).unwrap(), "1");
    assert_eq!(joined[0].get(&PropertyName::new("y")).unwrap(), "9");
}

#[test]
fn s4_constrained_view_from_a_constraints_file_and_cli_conjunction() {
    let schema = r#"[
        {"modify": [{"kind": "cfg", "cfg_num": "1000"}, {"kind": "cfg", "cfg_num": "1050"},
                     {"kind": "eig", "cfg_num": "1000"}, {"kind": "eig", "cfg_num": "2000"}],
         "id": "{kind}-{cfg_num}"}
    ]"#;

    let file_views = parse_constraints(r#"[{"kind": "cfg", "cfg_num": "1000:1100"}]"#, "constraints.json").unwrap();
    // CLI-supplied `--kind eig` narrows the file view down to `eig`.
    let mut cli_view = file_views[0].clone();
    cli_view.insert(
        PropertyName::new("kind"),
        PropertyValueLiteral::List(vec![PropertyValue::Plain("eig".to_owned())]),
    );

    let entries = run(schema, vec![cli_view]);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].get(&PropertyName::new("kind")).unwrap(), "eig");
    assert_eq!(entries[0].get(&PropertyName::new("cfg_num")).unwrap(), "1000");
}

#[test]
fn s5_identity_failure_aborts_the_run() {
    let schema = r#"[{"modify": {"name": "e1"}, "id": "{missing}"}]"#;
    let actions = parse_schema(schema, "schema.json").unwrap();
    let runner = ShellRunner;
    let config = EngineConfig { runner: &runner };
    let err = engine::run(&actions, &Vec::new(), &Environment::new(), &config).unwrap_err();
    match err {
        KaonError::MissingPlaceholderInId { action, .. } => assert_eq!(action, "[0]"),
        other => panic!("expected MissingPlaceholderInId, got {other:?}"),
    }
}

#[test]
fn s6_execute_arity_mismatch_aborts_the_run() {
    let schema = r#"[
        {"execute": {"command": "echo a b c", "return-properties": ["x", "y"]}, "id": "e-{x}"}
    ]"#;
    let actions = parse_schema(schema, "schema.json").unwrap();
    let runner = ShellRunner;
    let config = EngineConfig { runner: &runner };
    let err = engine::run(&actions, &Vec::new(), &Environment::new(), &config).unwrap_err();
    match err {
        KaonError::ExecuteArityError { expected, got, .. } => {
            assert_eq!(expected, 2);
            assert_eq!(got, 3);
        }
        other => panic!("expected ExecuteArityError, got {other:?}"),
    }
}
