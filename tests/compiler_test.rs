mod common;

use common::*;
use cutscript::compiler::core::Compiler;
use cutscript::dsl::builder::GraphBuilder;
use cutscript::runtime::blueprint::ListMode;
use cutscript::runtime::ending::Ending;
use cutscript::runtime::parameter::ParameterValue;
use cutscript::runtime::variables::{VarScope, VarValue};

#[test]
fn test_compile_resolves_gotos_and_start() {
    let doc = GraphBuilder::new("shop")
        .start("greet")
        .node("intro", "comment").param("text", "unused").done()
        .node("greet", "log").param("message", "hello").outputs(&["goto:close"]).done()
        .node("close", "comment").outputs(&["stop"]).done()
        .build();

    let bp = Compiler::new().compile(doc).expect("compile failed");

    assert_eq!(bp.start_index, 1);
    assert_eq!(bp.name, "shop");
    assert_eq!(bp.nodes[1].endings, vec![Ending::SkipTo(2)]);
    assert_eq!(bp.nodes[2].endings, vec![Ending::Stop]);
    assert_eq!(bp.nodes[0].endings, vec![Ending::Continue]);
    assert_eq!(bp.nodes[0].id, "intro");
}

#[test]
fn test_compile_keeps_settings_parameters_and_run_outputs() {
    let doc = GraphBuilder::new("ambient")
        .name("Ambient chatter")
        .background()
        .multi_instance()
        .parameter(1, "line", ParameterValue::String("hi".into()))
        .node("say", "log").bind("message", 1).outputs(&["run:next_scene"]).done()
        .build();

    let bp = Compiler::new().compile(doc).unwrap();

    assert_eq!(bp.name, "Ambient chatter");
    assert_eq!(bp.settings.mode, ListMode::RunInBackground);
    assert!(bp.settings.multi_instance);
    assert_eq!(bp.parameters.len(), 1);
    assert_eq!(bp.nodes[0].endings, vec![Ending::run_graph("next_scene")]);
    assert_eq!(bp.nodes[0].params["message_parameter"], 1);
}

#[test]
fn test_compile_rejects_duplicate_ids() {
    let doc = GraphBuilder::new("dup")
        .node("a", "comment").done()
        .node("a", "comment").done()
        .build();

    let err = Compiler::new().compile(doc).unwrap_err();
    assert!(err.to_string().contains("Duplicate node ID"));
}

#[test]
fn test_compile_rejects_unknown_targets() {
    let doc = GraphBuilder::new("bad")
        .node("a", "comment").outputs(&["goto:nowhere"]).done()
        .build();
    let err = Compiler::new().compile(doc).unwrap_err();
    assert!(err.to_string().contains("Target node not found"));

    let doc = GraphBuilder::new("bad").start("ghost").node("a", "comment").done().build();
    assert!(Compiler::new().compile(doc).is_err());
}

#[test]
fn test_compile_rejects_malformed_outputs() {
    for output in ["jump:a", "run:", ""] {
        let doc = GraphBuilder::new("bad").node("a", "comment").outputs(&[output]).done().build();
        assert!(Compiler::new().compile(doc).is_err(), "accepted {:?}", output);
    }
    assert!(Compiler::new().compile(GraphBuilder::new(" ").build()).is_err());
}

#[test]
fn test_compiled_graph_runs_in_the_engine() {
    let doc = GraphBuilder::new("gate")
        .node("set", "set_variable").param("variable", 3).param("value", 10).done()
        .node("test", "check").param("condition", "var3 >= 10").outputs(&["goto:open", "goto:shut"]).done()
        .node("open", "set_variable").param("variable", 4).param("value", "open").outputs(&["stop"]).done()
        .node("shut", "set_variable").param("variable", 4).param("value", "shut").done()
        .build();
    let bp = Compiler::new().compile(doc).unwrap();

    let mut h = Harness::new();
    h.engine.validate_blueprint(&bp).expect("built-in kinds should validate");
    h.engine.register_blueprint(bp);
    h.engine.interact("gate").unwrap();

    assert_eq!(h.engine.variables().get(VarScope::Global, 4), Some(VarValue::String("open".into())));
    assert_eq!(h.event_names(), vec!["begin", "end"]);
}
