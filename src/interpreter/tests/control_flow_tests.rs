//! Tests for if, loops, for-each and short-circuit logic

use super::helpers::*;
use crate::interpreter::errors::TYPE_ERROR;
use crate::interpreter::types::{State, Val};
use serde_json::json;

/* ===================== If / Ternary ===================== */

#[test]
fn test_if_else() {
    let (_, result, _) = run(vec![
        let_("x", num(3.0)),
        if_(
            binary("Gt", ident("x"), num(2.0)),
            vec![ret(string("big"))],
            Some(vec![ret(string("small"))]),
        ),
    ]);

    assert_eq!(result.into_value(), Val::from("big"));
}

#[test]
fn test_if_without_else_yields_void() {
    let (_, result, _) = run(vec![if_(boolean(false), vec![ret(num(1.0))], None)]);

    assert!(result.is_normal());
    assert_eq!(result.into_value(), Val::Void);
}

#[test]
fn test_ternary() {
    let ternary = json!({
        "t": "Ternary",
        "condition": boolean(false),
        "consequent": num(1.0),
        "alternate": num(2.0),
    });
    let (_, result, _) = run(vec![ret(ternary)]);

    assert_eq!(result.into_value(), Val::Num(2.0));
}

#[test]
fn test_logical_short_circuit() {
    // `missing` is unbound, so calling it would throw
    let and = json!({
        "t": "Logical", "op": "And",
        "left": boolean(false),
        "right": call("missing", vec![]),
    });
    let or = json!({
        "t": "Logical", "op": "Or",
        "left": num(5.0),
        "right": call("missing", vec![]),
    });

    let (_, and_result, _) = run(vec![ret(and)]);
    let (_, or_result, _) = run(vec![ret(or)]);

    assert_eq!(and_result.into_value(), Val::Bool(false));
    assert_eq!(or_result.into_value(), Val::Num(5.0));
}

#[test]
fn test_logical_evaluates_right_side() {
    let and = json!({
        "t": "Logical", "op": "And",
        "left": boolean(true),
        "right": string("rhs"),
    });
    let (_, result, _) = run(vec![ret(and)]);

    assert_eq!(result.into_value(), Val::from("rhs"));
}

/* ===================== While ===================== */

#[test]
fn test_while_accumulates() {
    let (_, result, _) = run(vec![
        let_("i", num(0.0)),
        let_("sum", num(0.0)),
        while_(
            binary("Lt", ident("i"), num(5.0)),
            vec![
                assign("i", binary("Add", ident("i"), num(1.0))),
                assign("sum", binary("Add", ident("sum"), ident("i"))),
            ],
        ),
        ret(ident("sum")),
    ]);

    assert_eq!(result.into_value(), Val::Num(15.0));
}

#[test]
fn test_break_absorbed_by_loop() {
    let (env, result, _) = run(vec![
        let_("after", boolean(false)),
        while_(boolean(true), vec![brk()]),
        assign("after", boolean(true)),
        ret(ident("after")),
    ]);

    assert!(result.is_normal());
    assert_eq!(result.into_value(), Val::Bool(true));
    assert!(env.traceback().is_empty());
}

#[test]
fn test_continue_skips_rest_of_body() {
    // Sum odd numbers below 10
    let is_even = binary("Eq", binary("Mod", ident("i"), num(2.0)), num(0.0));
    let (_, result, _) = run(vec![
        let_("i", num(0.0)),
        let_("sum", num(0.0)),
        while_(
            binary("Lt", ident("i"), num(10.0)),
            vec![
                assign("i", binary("Add", ident("i"), num(1.0))),
                if_(is_even, vec![cont()], None),
                assign("sum", binary("Add", ident("sum"), ident("i"))),
            ],
        ),
        ret(ident("sum")),
    ]);

    assert_eq!(result.into_value(), Val::Num(25.0));
}

#[test]
fn test_break_passes_through_nested_blocks() {
    let (_, result, _) = run(vec![
        let_("n", num(0.0)),
        while_(
            boolean(true),
            vec![
                assign("n", binary("Add", ident("n"), num(1.0))),
                if_(
                    binary("Ge", ident("n"), num(3.0)),
                    vec![block(vec![block(vec![brk()])])],
                    None,
                ),
            ],
        ),
        ret(ident("n")),
    ]);

    assert_eq!(result.into_value(), Val::Num(3.0));
}

#[test]
fn test_stray_break_is_not_validated() {
    let (env, result, _) = run(vec![brk(), let_("unreached", num(1.0))]);

    assert_eq!(result.state(), State::Breaking);
    assert_eq!(env.traceback().depth(), 1);
}

#[test]
fn test_return_passes_through_loop() {
    let (_, result, _) = run(vec![
        function("f", &[], vec![while_(boolean(true), vec![ret(num(7.0))])]),
        ret(call("f", vec![])),
    ]);

    assert!(result.is_normal());
    assert_eq!(result.into_value(), Val::Num(7.0));
}

/* ===================== For-each ===================== */

fn for_each(binding: &str, iterable: serde_json::Value, body: Vec<serde_json::Value>) -> serde_json::Value {
    json!({ "t": "ForEach", "binding": binding, "iterable": iterable, "body": block(body) })
}

#[test]
fn test_for_each_over_list() {
    let (_, result, _) = run(vec![
        let_("total", num(0.0)),
        for_each(
            "x",
            list(vec![num(1.0), num(2.0), num(3.0)]),
            vec![assign("total", binary("Add", ident("total"), ident("x")))],
        ),
        ret(ident("total")),
    ]);

    assert_eq!(result.into_value(), Val::Num(6.0));
}

#[test]
fn test_for_each_over_string_and_object_keys() {
    let object = json!({
        "t": "LitObj",
        "properties": [["b", num(1.0)], ["a", num(2.0)]],
    });
    let (_, result, _) = run(vec![
        let_("out", string("")),
        for_each("c", string("xy"), vec![assign("out", binary("Add", ident("out"), ident("c")))]),
        for_each("k", object, vec![assign("out", binary("Add", ident("out"), ident("k")))]),
        ret(ident("out")),
    ]);

    assert_eq!(result.into_value(), Val::from("xyba"));
}

#[test]
fn test_for_each_break() {
    let (_, result, _) = run(vec![
        let_("seen", num(0.0)),
        for_each(
            "x",
            list(vec![num(1.0), num(2.0), num(3.0)]),
            vec![
                if_(binary("Eq", ident("x"), num(2.0)), vec![brk()], None),
                assign("seen", ident("x")),
            ],
        ),
        ret(ident("seen")),
    ]);

    assert_eq!(result.into_value(), Val::Num(1.0));
}

#[test]
fn test_for_each_over_number_throws() {
    let (_, result, _) = run(vec![for_each("x", num(3.0), vec![])]);

    assert_eq!(result.state(), State::Throwing);
    match result.into_value() {
        Val::Error(info) => assert_eq!(info.code, TYPE_ERROR),
        other => panic!("expected error, got {:?}", other),
    }
}
