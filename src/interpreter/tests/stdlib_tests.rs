//! Tests for the standard native modules

use super::helpers::*;
use crate::interpreter::errors::{USER_ERROR, WRONG_ARG_COUNT, WRONG_ARG_TYPE};
use crate::interpreter::types::{State, Val};
use serde_json::{json, Value};

fn eval(e: Value) -> Val {
    let (_, result, _) = run(vec![ret(e)]);
    assert!(result.is_normal(), "unexpected {:?}", result);
    result.into_value()
}

fn thrown_code(e: Value) -> String {
    let (_, result, _) = run(vec![expr(e)]);
    assert_eq!(result.state(), State::Throwing);
    match result.into_value() {
        Val::Error(info) => info.code,
        other => panic!("expected error, got {:?}", other),
    }
}

fn object(properties: Vec<(&str, Value)>) -> Value {
    let properties: Vec<Value> = properties.into_iter().map(|(k, v)| json!([k, v])).collect();
    json!({ "t": "LitObj", "properties": properties })
}

/* ===================== lang ===================== */

#[test]
fn test_print_is_captured() {
    let mut env = env();
    let (result, _) = run_in(
        &mut env,
        vec![
            expr(call("print", vec![string("a"), num(1.0), list(vec![string("b")])])),
            expr(call("print", vec![])),
        ],
    );

    assert!(result.is_normal());
    assert_eq!(env.take_output(), vec!["a 1 [\"b\"]".to_string(), String::new()]);
    assert!(env.take_output().is_empty());
}

#[test]
fn test_len() {
    assert_eq!(eval(call("len", vec![string("héllo")])), Val::Num(5.0));
    assert_eq!(eval(call("len", vec![list(vec![num(1.0), num(2.0)])])), Val::Num(2.0));
    assert_eq!(
        eval(call("len", vec![object(vec![("a", num(1.0)), ("b", num(2.0))])])),
        Val::Num(2.0)
    );
    assert_eq!(thrown_code(call("len", vec![num(3.0)])), WRONG_ARG_TYPE);
}

#[test]
fn test_type_and_str() {
    assert_eq!(eval(call("type", vec![num(1.0)])), Val::from("number"));
    assert_eq!(eval(call("type", vec![string("x")])), Val::from("string"));
    assert_eq!(eval(call("str", vec![num(42.0)])), Val::from("42"));
    assert_eq!(eval(call("str", vec![boolean(true)])), Val::from("true"));
}

#[test]
fn test_keys_in_insertion_order() {
    let o = object(vec![("z", num(1.0)), ("a", num(2.0)), ("m", num(3.0))]);

    assert_eq!(
        eval(call("keys", vec![o])),
        Val::List(vec![Val::from("z"), Val::from("a"), Val::from("m")])
    );
}

#[test]
fn test_copy_is_independent() {
    let (_, result, _) = run(vec![
        let_("a", object(vec![("n", num(1.0))])),
        let_("b", call("copy", vec![ident("a")])),
        assign("b.n", num(2.0)),
        ret(list(vec![member(ident("a"), "n"), member(ident("b"), "n")])),
    ]);

    assert_eq!(result.into_value(), Val::List(vec![Val::Num(1.0), Val::Num(2.0)]));
}

#[test]
fn test_error_constructor() {
    match eval(call("error", vec![string("oops")])) {
        Val::Error(info) => {
            assert_eq!(info.code, USER_ERROR);
            assert_eq!(info.message, "oops");
        }
        other => panic!("expected error, got {:?}", other),
    }

    match eval(call("error", vec![string("custom"), string("details")])) {
        Val::Error(info) => {
            assert_eq!(info.code, "custom");
            assert_eq!(info.message, "details");
        }
        other => panic!("expected error, got {:?}", other),
    }

    let named = json!({
        "t": "Call",
        "callee": ident("error"),
        "args": [],
        "named": [{ "name": "message", "value": string("by name") }],
    });
    match eval(named) {
        Val::Error(info) => assert_eq!(info.message, "by name"),
        other => panic!("expected error, got {:?}", other),
    }
}

/* ===================== math ===================== */

#[test]
fn test_math_functions() {
    assert_eq!(eval(call("floor", vec![num(2.7)])), Val::Num(2.0));
    assert_eq!(eval(call("ceil", vec![num(2.1)])), Val::Num(3.0));
    assert_eq!(eval(call("abs", vec![num(-4.0)])), Val::Num(4.0));
    assert_eq!(eval(call("round", vec![num(2.5)])), Val::Num(3.0));
    assert_eq!(eval(call("sqrt", vec![num(9.0)])), Val::Num(3.0));
    assert_eq!(eval(call("min", vec![num(3.0), num(1.0), num(2.0)])), Val::Num(1.0));
    assert_eq!(eval(call("max", vec![num(3.0), num(1.0), num(2.0)])), Val::Num(3.0));
}

#[test]
fn test_math_argument_errors() {
    assert_eq!(thrown_code(call("floor", vec![])), WRONG_ARG_COUNT);
    assert_eq!(thrown_code(call("floor", vec![num(1.0), num(2.0)])), WRONG_ARG_COUNT);
    assert_eq!(thrown_code(call("sqrt", vec![num(-1.0)])), WRONG_ARG_TYPE);
    assert_eq!(thrown_code(call("max", vec![])), WRONG_ARG_COUNT);
    assert_eq!(thrown_code(call("min", vec![num(1.0), string("2")])), WRONG_ARG_TYPE);
}

#[test]
fn test_native_error_message_and_frame() {
    let (env, result, _) = run(vec![expr(call("abs", vec![]))]);

    match result.into_value() {
        Val::Error(info) => assert_eq!(info.message, "Expected 1 argument(s), got 0"),
        other => panic!("expected error, got {:?}", other),
    }
    let first = env.traceback().frames().next().expect("native frame");
    assert_eq!(&*first.location.module, "<native abs>");
}
