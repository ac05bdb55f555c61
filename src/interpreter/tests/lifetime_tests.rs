//! Tests for scope reclamation while scripts run

use super::helpers::*;
use crate::environment::Environment;
use crate::interpreter::types::{ExecResult, Val};
use serde_json::{json, Value};
use std::cell::Cell;
use std::rc::Rc;

const ITERATIONS: f64 = 1000.0;

fn empty_object() -> Value {
    json!({ "t": "LitObj", "properties": [] })
}

/// `let i = 0; while i < ITERATIONS { body...; i = i + 1 }`
fn counted_loop(mut body: Vec<Value>) -> Vec<Value> {
    body.push(assign("i", binary("Add", ident("i"), num(1.0))));
    vec![
        let_("i", num(0.0)),
        while_(binary("Lt", ident("i"), num(ITERATIONS)), body),
    ]
}

/// Environment with a `live()` native that records the highest live count
fn gauged_env() -> (Environment, Rc<Cell<usize>>) {
    init_tracing();
    let peak = Rc::new(Cell::new(0));
    let seen = peak.clone();
    let mut env = Environment::new();
    env.register_native("gauge", "live", move |_, _, env| {
        let live = env.contexts().live_count();
        seen.set(seen.get().max(live));
        ExecResult::normal(Val::Num(live as f64))
    });
    env.load_natives().expect("load_natives failed");
    env.load_builtins().expect("load_builtins failed");
    env.load_normal().expect("load_normal failed");
    (env, peak)
}

#[test]
fn test_loop_objects_are_reclaimed() {
    let mut env = env();
    let script = env.compile_program("main", program(counted_loop(vec![let_("o", empty_object())])));
    let before = env.contexts().live_count();

    let result = env.run_script(&script);

    assert!(result.is_normal());
    // Only the object still bound to `o` survives
    assert!(env.contexts().live_count() <= before + 1);
}

#[test]
fn test_live_count_stays_bounded_during_loop() {
    let (mut env, peak) = gauged_env();
    let body = counted_loop(vec![
        let_("o", empty_object()),
        expr(call("live", vec![])),
    ]);

    let (result, _) = run_in(&mut env, body);

    assert!(result.is_normal());
    assert!(peak.get() > 0);
    assert!(peak.get() < 400, "peak live count {}", peak.get());
}

#[test]
fn test_dropped_closures_release_captured_scopes() {
    let (mut env, peak) = gauged_env();
    let mut body = vec![function(
        "mk",
        &[],
        vec![let_("n", num(1.0)), ret(lambda(&[], vec![ret(ident("n"))]))],
    )];
    body.extend(counted_loop(vec![
        let_("f", call("mk", vec![])),
        expr(call("f", vec![])),
        expr(call("live", vec![])),
    ]));
    let script = env.compile_program("main", program(body));
    let before = env.contexts().live_count();

    let result = env.run_script(&script);

    assert!(result.is_normal());
    assert!(peak.get() < 400, "peak live count {}", peak.get());
    // The scope captured by the last `f` is the only one left
    assert!(env.contexts().live_count() <= before + 1);
    let f = env.contexts().get(script.context, "f");
    assert_eq!(env.call(&f, vec![], Default::default()).into_value(), Val::Num(1.0));
}

#[test]
fn test_reachable_objects_survive_collection() {
    let mut env = env();
    let nested = json!({ "t": "LitObj", "properties": [["child", empty_object()]] });
    let body = counted_loop(vec![let_("o", nested)]);

    let (result, script) = run_in(&mut env, body);

    assert!(result.is_normal());
    let Val::Obj(outer) = env.contexts().get(script.context, "o") else {
        panic!("expected an object in o");
    };
    assert!(env.contexts().is_live(outer));
    match env.contexts().get(outer, "child") {
        Val::Obj(child) => assert!(env.contexts().is_live(child)),
        other => panic!("expected object, got {:?}", other),
    }
}
