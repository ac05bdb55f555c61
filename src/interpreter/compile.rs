//! AST to stepper compilation
//!
//! Compilation is cheap and pure: it allocates steppers but never touches
//! scopes. Each call compiles one node; its children become `Deferred`
//! steppers that compile when the VM reaches them, so no AST shape makes
//! compilation recurse. Expressions report errors at the location of their
//! statement.

use super::ops::{FunctionTemplate, Op};
use super::stepper::{Arm, Branch, Call, Guard, Iterate, Loop, Stepper};
use super::types::{Expr, Flag, LogicalOp, Param, Program, Stmt, Val};
use crate::environment::traceback::Location;
use std::rc::Rc;

/// Top-level initializer for a module
pub fn program(program: &Program, module: &Rc<str>) -> Stepper {
    block(&program.body, module)
}

fn block(body: &[Rc<Stmt>], module: &Rc<str>) -> Stepper {
    Stepper::sequence(
        body.iter()
            .map(|stmt| Stepper::deferred_stmt(stmt.clone(), module.clone()))
            .collect(),
    )
}

pub fn statement(stmt: &Stmt, module: &Rc<str>) -> Stepper {
    let at = Location::new(module.clone(), stmt.span());
    let sub = |e: &Rc<Expr>| Stepper::deferred_expr(e.clone(), at.clone());
    let nested = |s: &Rc<Stmt>| Box::new(Stepper::deferred_stmt(s.clone(), module.clone()));

    match stmt {
        Stmt::Block { body, .. } => block(body, module),

        Stmt::Let {
            name, flags, init, ..
        } => {
            let inner = match init {
                Some(expr) => sub(expr),
                None => Stepper::supply(Val::Null, at.clone()),
            };
            let op = Op::Declare {
                name: name.clone(),
                flags: flags.clone(),
            };
            Stepper::transform(Some(inner), op, at)
        }

        Stmt::Assign { target, value, .. } => {
            Stepper::transform(Some(sub(value)), Op::Assign(target.clone()), at)
        }

        Stmt::SetMember {
            object,
            property,
            value,
            ..
        } => {
            let operands = Stepper::collect(vec![sub(object), sub(value)]);
            Stepper::transform(Some(operands), Op::SetMember(property.clone()), at)
        }

        Stmt::Delete { name, .. } => Stepper::transform(None, Op::Delete(name.clone()), at),

        Stmt::If {
            test,
            then_s,
            else_s,
            ..
        } => {
            let when_true = Arm::Run(nested(then_s));
            let when_false = match else_s {
                Some(else_s) => Arm::Run(nested(else_s)),
                None => Arm::Void,
            };
            Stepper::Branch(Branch::new(sub(test), when_true, when_false))
        }

        Stmt::While { test, body, .. } => Stepper::Loop(Loop::new(test.clone(), body.clone(), at)),

        Stmt::ForEach {
            binding,
            iterable,
            body,
            ..
        } => {
            let source = sub(iterable);
            Stepper::Iterate(Iterate::new(binding.clone(), source, body.clone(), at))
        }

        Stmt::Function {
            name,
            params,
            body,
            flags,
            ..
        } => function(Some(name.clone()), params, body, flags.clone(), at),

        Stmt::Return { value, .. } => Stepper::transform(value.as_ref().map(sub), Op::Return, at),

        Stmt::Break { .. } => Stepper::transform(None, Op::Break, at),
        Stmt::Continue { .. } => Stepper::transform(None, Op::Continue, at),

        Stmt::Throw { value, .. } => Stepper::transform(Some(sub(value)), Op::Throw, at),

        Stmt::Try {
            body,
            catch_var,
            catch_body,
            finally_body,
            ..
        } => {
            let handler = match (catch_var, catch_body) {
                (_, Some(handler)) => Some(handler.clone()),
                (Some(_), None) => Some(Rc::new(Stmt::Block {
                    body: Vec::new(),
                    span: stmt.span(),
                })),
                (None, None) => None,
            };
            Stepper::Guard(Guard::new(
                *nested(body),
                catch_var.clone(),
                handler,
                finally_body.clone(),
                at,
            ))
        }

        Stmt::Import { module: name, alias, .. } => {
            let bind = alias
                .clone()
                .or_else(|| name.rsplit('.').next().map(str::to_string));
            let op = Op::Import {
                module: name.clone(),
                bind,
            };
            Stepper::transform(None, op, at)
        }

        Stmt::Expr { expr, .. } => expression(expr, &at),
    }
}

pub fn expression(expr: &Expr, at: &Location) -> Stepper {
    let sub = |e: &Rc<Expr>| Stepper::deferred_expr(e.clone(), at.clone());

    match expr {
        Expr::LitBool { v } => Stepper::supply(Val::Bool(*v), at.clone()),
        Expr::LitNum { v } => Stepper::supply(Val::Num(*v), at.clone()),
        Expr::LitStr { v } => Stepper::supply(Val::Str(v.clone()), at.clone()),
        Expr::LitNull => Stepper::supply(Val::Null, at.clone()),

        Expr::LitList { elements } => {
            let operands = Stepper::collect(elements.iter().map(sub).collect());
            Stepper::transform(Some(operands), Op::MakeList, at.clone())
        }

        Expr::LitObj { properties } => {
            let keys = properties.iter().map(|(k, _)| k.clone()).collect();
            let operands = Stepper::collect(properties.iter().map(|(_, v)| sub(v)).collect());
            Stepper::transform(Some(operands), Op::MakeObject(keys), at.clone())
        }

        Expr::Ident { name } => Stepper::transform(None, Op::Lookup(name.clone()), at.clone()),

        Expr::Member { object, property } => {
            Stepper::transform(Some(sub(object)), Op::GetMember(property.clone()), at.clone())
        }

        Expr::Index { object, index } => {
            let operands = Stepper::collect(vec![sub(object), sub(index)]);
            Stepper::transform(Some(operands), Op::Index, at.clone())
        }

        Expr::Call {
            callee,
            args,
            named,
        } => {
            let mut operands = Vec::with_capacity(1 + args.len() + named.len());
            operands.push(sub(callee));
            operands.extend(args.iter().map(sub));
            operands.extend(named.iter().map(|arg| sub(&arg.value)));
            let names = named.iter().map(|arg| arg.name.clone()).collect();
            Stepper::Call(Call::new(
                Stepper::collect(operands),
                args.len(),
                names,
                at.clone(),
            ))
        }

        Expr::Binary { op, left, right } => {
            let operands = Stepper::collect(vec![sub(left), sub(right)]);
            Stepper::transform(Some(operands), Op::Binary(*op), at.clone())
        }

        Expr::Logical { op, left, right } => {
            let rest = Arm::Run(Box::new(sub(right)));
            let (when_true, when_false) = match op {
                LogicalOp::And => (rest, Arm::Yield),
                LogicalOp::Or => (Arm::Yield, rest),
            };
            Stepper::Branch(Branch::new(sub(left), when_true, when_false))
        }

        Expr::Unary { op, operand } => {
            Stepper::transform(Some(sub(operand)), Op::Unary(*op), at.clone())
        }

        Expr::Ternary {
            condition,
            consequent,
            alternate,
        } => Stepper::Branch(Branch::new(
            sub(condition),
            Arm::Run(Box::new(sub(consequent))),
            Arm::Run(Box::new(sub(alternate))),
        )),

        Expr::Lambda { params, body } => function(None, params, body, Vec::new(), at.clone()),

        Expr::Import { module } => {
            let op = Op::Import {
                module: module.clone(),
                bind: None,
            };
            Stepper::transform(None, op, at.clone())
        }
    }
}

/// Function definition: default values are evaluated as operands
fn function(
    name: Option<String>,
    params: &[Param],
    body: &Rc<Stmt>,
    flags: Vec<Flag>,
    at: Location,
) -> Stepper {
    let defaulted: Vec<&Param> = params.iter().filter(|p| p.default.is_some()).collect();
    let defaults = defaulted
        .iter()
        .filter_map(|p| p.default.as_ref())
        .map(|e| Stepper::deferred_expr(e.clone(), at.clone()))
        .collect();
    let template = FunctionTemplate {
        name,
        params: params.iter().map(|p| p.name.clone()).collect(),
        defaulted: defaulted.iter().map(|p| p.name.clone()).collect(),
        body: body.clone(),
        flags,
    };
    Stepper::transform(
        Some(Stepper::collect(defaults)),
        Op::Function(Rc::new(template)),
        at,
    )
}
