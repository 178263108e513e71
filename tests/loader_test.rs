use cutscript::compiler::loader::{load_blueprint, load_blueprints_from_dir, load_graph_from_yaml};
use cutscript::runtime::blueprint::ListMode;
use cutscript::runtime::ending::Ending;
use cutscript::runtime::parameter::ParameterValue;
use std::fs;
use tempfile::tempdir;

const INTRO: &str = r#"
id: intro
name: Opening scene
start: hello
settings:
  mode: RunInBackground
  start_delay: 0.5
parameters:
  - id: 1
    label: speaker
    value: !String Ada
nodes:
  - id: note
    kind: comment
    params:
      text: skipped by start
  - id: hello
    kind: log
    params:
      message: "[param:1] says hi"
  - id: pause
    kind: wait
    params:
      seconds: 1.5
    outputs: ["goto:hello"]
"#;

const OUTRO: &str = r#"
id: outro
nodes:
  - id: bye
    kind: log
    params:
      message: bye
    outputs: ["stop"]
"#;

#[test]
fn test_load_single_graph() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("intro.yaml");
    fs::write(&path, INTRO).unwrap();

    let doc = load_graph_from_yaml(&path).unwrap();
    assert_eq!(doc.nodes.len(), 3);
    assert!(doc.nodes[0].enabled);

    let bp = load_blueprint(&path).unwrap();
    assert_eq!(bp.name, "Opening scene");
    assert_eq!(bp.start_index, 1);
    assert_eq!(bp.settings.mode, ListMode::RunInBackground);
    assert_eq!(bp.settings.start_delay, 0.5);
    assert!(bp.settings.skippable);
    assert_eq!(bp.parameters[0].value, ParameterValue::String("Ada".into()));
    assert_eq!(bp.nodes[2].endings, vec![Ending::SkipTo(1)]);
}

#[test]
fn test_load_directory_sorted_and_filtered() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("b_outro.yml"), OUTRO).unwrap();
    fs::write(dir.path().join("a_intro.yaml"), INTRO).unwrap();
    fs::write(dir.path().join("notes.txt"), "not a graph").unwrap();

    let blueprints = load_blueprints_from_dir(dir.path()).unwrap();

    let ids: Vec<&str> = blueprints.iter().map(|b| b.id.as_str()).collect();
    assert_eq!(ids, vec!["intro", "outro"]);
}

#[test]
fn test_load_reports_the_failing_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.yaml");
    fs::write(&path, "id: broken\nnodes:\n  - id: a\n    kind: log\n    outputs: [\"goto:b\"]\n").unwrap();

    let err = load_blueprint(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("broken.yaml"));
    assert!(load_blueprint(dir.path().join("missing.yaml")).is_err());
}
