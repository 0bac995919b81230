// Abstract syntax tree
// Nodes are immutable once built; the parser constructs them bottom-up.
// Line numbers are carried where the runtime needs them for diagnostics
// (variables, calls, operators, statements that can raise).

use smol_str::SmolStr;
use std::sync::Arc;

pub type Name = SmolStr;

/// Attribute of a local binding: `<const>` or `<close>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attrib {
    None,
    Const,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    IDiv,
    Mod,
    Pow,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    BAnd,
    BOr,
    BXor,
    Shl,
    Shr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
    Len,
    BNot,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Nil,
    True,
    False,
    Vararg {
        line: u32,
    },
    Integer(i64),
    Float(f64),
    /// String literal, raw bytes after escape decoding.
    Str(Vec<u8>),
    Name {
        name: Name,
        line: u32,
    },
    /// `obj[key]`; field access desugars to a string key.
    Index {
        obj: Box<Expr>,
        key: Box<Expr>,
        line: u32,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        line: u32,
    },
    /// `obj:method(args)` kept as one node so `obj` evaluates once.
    MethodCall {
        obj: Box<Expr>,
        method: Name,
        args: Vec<Expr>,
        line: u32,
    },
    Function(Arc<FuncBody>),
    Table {
        fields: Vec<TableField>,
        line: u32,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        line: u32,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
        line: u32,
    },
    /// Parenthesized expression: a first-class single-value truncator.
    Paren(Box<Expr>),
}

impl Expr {
    /// True for expressions that may produce multiple values in tail
    /// position (the last element of an expression list expands).
    pub fn is_multi_value(&self) -> bool {
        matches!(
            self,
            Expr::Call { .. } | Expr::MethodCall { .. } | Expr::Vararg { .. }
        )
    }

    pub fn line(&self) -> u32 {
        match self {
            Expr::Vararg { line }
            | Expr::Name { line, .. }
            | Expr::Index { line, .. }
            | Expr::Call { line, .. }
            | Expr::MethodCall { line, .. }
            | Expr::Table { line, .. }
            | Expr::Binary { line, .. }
            | Expr::Unary { line, .. } => *line,
            Expr::Function(body) => body.line,
            Expr::Paren(inner) => inner.line(),
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableField {
    /// Positional entry `expr`.
    Item(Expr),
    /// `name = expr`.
    Named(Name, Expr),
    /// `[key] = expr`.
    Keyed(Expr, Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncBody {
    pub params: Vec<Name>,
    pub is_vararg: bool,
    pub body: Block,
    /// Name used in error messages and tracebacks, when known.
    pub name: Option<String>,
    /// Chunk label of the source this function came from.
    pub chunk: Arc<str>,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub stats: Vec<Stat>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stat {
    Assign {
        targets: Vec<Expr>,
        values: Vec<Expr>,
        line: u32,
    },
    Local {
        names: Vec<(Name, Attrib)>,
        values: Vec<Expr>,
        line: u32,
    },
    LocalFunction {
        name: Name,
        body: Arc<FuncBody>,
    },
    /// Function call in statement position.
    Call(Expr),
    Label(Name),
    Goto {
        label: Name,
        line: u32,
    },
    Break {
        line: u32,
    },
    Do(Block),
    While {
        cond: Expr,
        body: Block,
    },
    Repeat {
        body: Block,
        cond: Expr,
    },
    If {
        arms: Vec<(Expr, Block)>,
        else_body: Option<Block>,
    },
    NumericFor {
        var: Name,
        start: Expr,
        stop: Expr,
        step: Option<Expr>,
        body: Block,
        line: u32,
    },
    GenericFor {
        names: Vec<Name>,
        exprs: Vec<Expr>,
        body: Block,
        line: u32,
    },
    Return {
        exprs: Vec<Expr>,
        line: u32,
    },
}
