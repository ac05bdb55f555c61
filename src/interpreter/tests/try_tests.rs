//! Tests for try / catch / finally

use super::helpers::*;
use crate::interpreter::errors::{DIVISION_BY_ZERO, USER_ERROR, WRONG_ARG_TYPE};
use crate::interpreter::types::{State, Val};
use serde_json::{json, Value};

fn try_(
    body: Vec<Value>,
    catch_var: Option<&str>,
    catch_body: Option<Vec<Value>>,
    finally: Option<Vec<Value>>,
) -> Value {
    json!({
        "t": "Try",
        "body": block(body),
        "catch_var": catch_var,
        "catch_body": catch_body.map(block),
        "finally_body": finally.map(block),
    })
}

#[test]
fn test_catch_binds_thrown_value() {
    let (env, result, _) = run(vec![
        let_("caught", num(0.0)),
        try_(
            vec![throw(string("bad"))],
            Some("e"),
            Some(vec![assign("caught", ident("e"))]),
            None,
        ),
        ret(ident("caught")),
    ]);

    assert!(result.is_normal());
    assert_eq!(result.into_value(), Val::from("bad"));
    assert!(env.traceback().is_empty());
}

#[test]
fn test_catch_error_from_native() {
    let mut env = env();
    let (result, script) = run_in(
        &mut env,
        vec![try_(
            vec![expr(call("floor", vec![string("x")]))],
            Some("e"),
            None,
            None,
        )],
    );

    assert!(result.is_normal());
    match env.contexts().get(script.context, "e") {
        Val::Error(info) => assert_eq!(info.code, WRONG_ARG_TYPE),
        other => panic!("expected error, got {:?}", other),
    }
    assert!(env.traceback().is_empty());
}

#[test]
fn test_finally_runs_after_normal_body() {
    let (_, result, _) = run(vec![
        let_("log", string("")),
        try_(
            vec![assign("log", binary("Add", ident("log"), string("body;")))],
            None,
            None,
            Some(vec![assign("log", binary("Add", ident("log"), string("finally;")))]),
        ),
        ret(ident("log")),
    ]);

    assert_eq!(result.into_value(), Val::from("body;finally;"));
}

#[test]
fn test_uncaught_throw_passes_through_finally() {
    let (env, result, script) = run(vec![
        let_("cleaned", boolean(false)),
        try_(
            vec![throw(call("error", vec![string("boom")]))],
            None,
            None,
            Some(vec![assign("cleaned", boolean(true))]),
        ),
    ]);

    assert_eq!(result.state(), State::Throwing);
    match result.value() {
        Val::Error(info) => {
            assert_eq!(info.code, USER_ERROR);
            assert_eq!(info.message, "boom");
        }
        other => panic!("expected error, got {:?}", other),
    }
    assert_eq!(env.contexts().get(script.context, "cleaned"), Val::Bool(true));
}

#[test]
fn test_abnormal_finally_overrides() {
    let (_, result, _) = run(vec![
        function(
            "f",
            &[],
            vec![try_(
                vec![throw(string("lost"))],
                None,
                None,
                Some(vec![ret(string("finally wins"))]),
            )],
        ),
        ret(call("f", vec![])),
    ]);

    assert!(result.is_normal());
    assert_eq!(result.into_value(), Val::from("finally wins"));
}

#[test]
fn test_return_in_body_still_runs_finally() {
    let (env, result, script) = run(vec![
        let_("cleaned", boolean(false)),
        function(
            "f",
            &[],
            vec![try_(
                vec![ret(num(1.0))],
                Some("e"),
                Some(vec![]),
                Some(vec![assign("cleaned", boolean(true))]),
            )],
        ),
        ret(call("f", vec![])),
    ]);

    assert_eq!(result.into_value(), Val::Num(1.0));
    assert_eq!(env.contexts().get(script.context, "cleaned"), Val::Bool(true));
}

#[test]
fn test_try_does_not_catch_break() {
    let (_, result, _) = run(vec![
        let_("handled", boolean(false)),
        while_(
            boolean(true),
            vec![try_(
                vec![brk()],
                Some("e"),
                Some(vec![assign("handled", boolean(true))]),
                None,
            )],
        ),
        ret(ident("handled")),
    ]);

    assert_eq!(result.into_value(), Val::Bool(false));
}

#[test]
fn test_rethrow_from_handler() {
    let (_, result, _) = run(vec![try_(
        vec![throw(num(1.0))],
        Some("e"),
        Some(vec![throw(binary("Add", ident("e"), num(1.0)))]),
        None,
    )]);

    assert_eq!(result.state(), State::Throwing);
    assert_eq!(result.into_value(), Val::Num(2.0));
}

#[test]
fn test_division_by_zero_code() {
    let mut env = env();
    let (result, script) = run_in(
        &mut env,
        vec![try_(
            vec![expr(binary("Div", num(1.0), num(0.0)))],
            Some("e"),
            None,
            None,
        )],
    );

    assert!(result.is_normal());
    match env.contexts().get(script.context, "e") {
        Val::Error(info) => assert_eq!(info.code, DIVISION_BY_ZERO),
        other => panic!("expected error, got {:?}", other),
    }
}
