//! Abstract Syntax Tree node types
//!
//! This is the shape the parser collaborator hands to the core. Each node is
//! tagged with `t` so programs round-trip through JSON. Children are shared
//! with `Rc` so steppers can hold a subtree without copying it.

use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Source position of a statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Span {
    /// Line (1-indexed, 0 when unknown)
    pub line: u32,
    /// Column (1-indexed, 0 when unknown)
    pub col: u32,
}

impl Span {
    pub fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

/// A parsed module: top-level statements plus an optional main entry point
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Program {
    #[serde(default)]
    pub body: Vec<Rc<Stmt>>,
    /// Name of a top-level function to invoke after the initializer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
}

/// Per-binding modifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flag {
    Private,
    Final,
    NoImport,
}

/// Function parameter with an optional default expression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Rc<Expr>>,
}

/// Named argument at a call site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedArg {
    pub name: String,
    pub value: Rc<Expr>,
}

/// Statement AST node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum Stmt {
    Block {
        body: Vec<Rc<Stmt>>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    /// Local declaration: always binds in the current frame
    Let {
        name: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        flags: Vec<Flag>,
        #[serde(default)]
        init: Option<Rc<Expr>>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    /// Assignment to a (possibly dotted or caret-prefixed) name
    Assign {
        target: String,
        value: Rc<Expr>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    /// Assignment to a member of a computed object
    SetMember {
        object: Rc<Expr>,
        property: String,
        value: Rc<Expr>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Delete {
        name: String,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    If {
        test: Rc<Expr>,
        then_s: Rc<Stmt>,
        #[serde(default)]
        else_s: Option<Rc<Stmt>>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    While {
        test: Rc<Expr>,
        body: Rc<Stmt>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    ForEach {
        binding: String,
        iterable: Rc<Expr>,
        body: Rc<Stmt>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Function {
        name: String,
        params: Vec<Param>,
        body: Rc<Stmt>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        flags: Vec<Flag>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Return {
        #[serde(default)]
        value: Option<Rc<Expr>>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Break {
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Continue {
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Throw {
        value: Rc<Expr>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Try {
        body: Rc<Stmt>,
        #[serde(default)]
        catch_var: Option<String>,
        #[serde(default)]
        catch_body: Option<Rc<Stmt>>,
        #[serde(default)]
        finally_body: Option<Rc<Stmt>>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    /// `import a.b` binds `b`; `import a.b as c` binds `c`
    Import {
        module: String,
        #[serde(default)]
        alias: Option<String>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Expr {
        expr: Rc<Expr>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
}

impl Stmt {
    /// Get the span of this statement
    pub fn span(&self) -> Span {
        match self {
            Stmt::Block { span, .. } => *span,
            Stmt::Let { span, .. } => *span,
            Stmt::Assign { span, .. } => *span,
            Stmt::SetMember { span, .. } => *span,
            Stmt::Delete { span, .. } => *span,
            Stmt::If { span, .. } => *span,
            Stmt::While { span, .. } => *span,
            Stmt::ForEach { span, .. } => *span,
            Stmt::Function { span, .. } => *span,
            Stmt::Return { span, .. } => *span,
            Stmt::Break { span } => *span,
            Stmt::Continue { span } => *span,
            Stmt::Throw { span, .. } => *span,
            Stmt::Try { span, .. } => *span,
            Stmt::Import { span, .. } => *span,
            Stmt::Expr { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Short-circuit operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// Expression AST node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum Expr {
    LitBool {
        v: bool,
    },
    LitNum {
        v: f64,
    },
    LitStr {
        v: String,
    },
    LitNull,
    LitList {
        elements: Vec<Rc<Expr>>,
    },
    LitObj {
        properties: Vec<(String, Rc<Expr>)>,
    },
    Ident {
        name: String,
    },
    Member {
        object: Rc<Expr>,
        property: String,
    },
    Index {
        object: Rc<Expr>,
        index: Rc<Expr>,
    },
    Call {
        callee: Rc<Expr>,
        #[serde(default)]
        args: Vec<Rc<Expr>>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        named: Vec<NamedArg>,
    },
    Binary {
        op: BinaryOp,
        left: Rc<Expr>,
        right: Rc<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Rc<Expr>,
        right: Rc<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Rc<Expr>,
    },
    Ternary {
        condition: Rc<Expr>,
        consequent: Rc<Expr>,
        alternate: Rc<Expr>,
    },
    Lambda {
        params: Vec<Param>,
        body: Rc<Stmt>,
    },
    Import {
        module: String,
    },
}

/// Helper function for serde to skip serializing default spans
fn is_default_span(span: &Span) -> bool {
    *span == Span::default()
}
