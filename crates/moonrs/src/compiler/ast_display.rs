// Canonical rendering of the AST back to Lua source
// Every statement is terminated with ';' so the output re-parses without
// call/assignment ambiguity; re-rendering the re-parse is a fixpoint.

use crate::compiler::ast::{Attrib, BinOp, Block, Expr, FuncBody, Stat, TableField, UnOp};

pub fn render_chunk(block: &Block) -> String {
    let mut r = Renderer::new();
    r.block(block);
    r.out
}

struct Renderer {
    out: String,
    indent: usize,
}

impl Renderer {
    fn new() -> Self {
        Renderer {
            out: String::new(),
            indent: 0,
        }
    }

    fn push(&mut self, s: &str) {
        self.out.push_str(s);
    }

    fn line_start(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
    }

    fn newline(&mut self) {
        self.out.push('\n');
    }

    fn block(&mut self, block: &Block) {
        for stat in &block.stats {
            self.line_start();
            self.stat(stat);
            self.newline();
        }
    }

    fn nested_block(&mut self, block: &Block) {
        self.indent += 1;
        self.block(block);
        self.indent -= 1;
        self.line_start();
    }

    fn stat(&mut self, stat: &Stat) {
        match stat {
            Stat::Assign { targets, values, .. } => {
                self.expr_list(targets);
                self.push(" = ");
                self.expr_list(values);
                self.push(";");
            }
            Stat::Local { names, values, .. } => {
                self.push("local ");
                for (i, (name, attrib)) in names.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.push(name);
                    match attrib {
                        Attrib::None => {}
                        Attrib::Const => self.push(" <const>"),
                        Attrib::Close => self.push(" <close>"),
                    }
                }
                if !values.is_empty() {
                    self.push(" = ");
                    self.expr_list(values);
                }
                self.push(";");
            }
            Stat::LocalFunction { name, body } => {
                self.push("local function ");
                self.push(name);
                self.func_body(body);
                self.push(";");
            }
            Stat::Call(expr) => {
                self.expr(expr);
                self.push(";");
            }
            Stat::Label(name) => {
                self.push("::");
                self.push(name);
                self.push("::");
            }
            Stat::Goto { label, .. } => {
                self.push("goto ");
                self.push(label);
                self.push(";");
            }
            Stat::Break { .. } => self.push("break;"),
            Stat::Do(body) => {
                self.push("do");
                self.newline();
                self.nested_block(body);
                self.push("end;");
            }
            Stat::While { cond, body } => {
                self.push("while ");
                self.expr(cond);
                self.push(" do");
                self.newline();
                self.nested_block(body);
                self.push("end;");
            }
            Stat::Repeat { body, cond } => {
                self.push("repeat");
                self.newline();
                self.nested_block(body);
                self.push("until ");
                self.expr(cond);
                self.push(";");
            }
            Stat::If { arms, else_body } => {
                for (i, (cond, body)) in arms.iter().enumerate() {
                    self.push(if i == 0 { "if " } else { "elseif " });
                    self.expr(cond);
                    self.push(" then");
                    self.newline();
                    self.nested_block(body);
                }
                if let Some(body) = else_body {
                    self.push("else");
                    self.newline();
                    self.nested_block(body);
                }
                self.push("end;");
            }
            Stat::NumericFor {
                var,
                start,
                stop,
                step,
                body,
                ..
            } => {
                self.push("for ");
                self.push(var);
                self.push(" = ");
                self.expr(start);
                self.push(", ");
                self.expr(stop);
                if let Some(step) = step {
                    self.push(", ");
                    self.expr(step);
                }
                self.push(" do");
                self.newline();
                self.nested_block(body);
                self.push("end;");
            }
            Stat::GenericFor {
                names, exprs, body, ..
            } => {
                self.push("for ");
                for (i, name) in names.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.push(name);
                }
                self.push(" in ");
                self.expr_list(exprs);
                self.push(" do");
                self.newline();
                self.nested_block(body);
                self.push("end;");
            }
            Stat::Return { exprs, .. } => {
                self.push("return");
                if !exprs.is_empty() {
                    self.push(" ");
                    self.expr_list(exprs);
                }
                self.push(";");
            }
        }
    }

    fn expr_list(&mut self, exprs: &[Expr]) {
        for (i, expr) in exprs.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.expr(expr);
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Nil => self.push("nil"),
            Expr::True => self.push("true"),
            Expr::False => self.push("false"),
            Expr::Vararg { .. } => self.push("..."),
            Expr::Integer(i) => self.push(&i.to_string()),
            Expr::Float(f) => self.push(&render_float(*f)),
            Expr::Str(bytes) => self.push(&render_string(bytes)),
            Expr::Name { name, .. } => self.push(name),
            Expr::Index { obj, key, .. } => {
                self.expr(obj);
                if let Expr::Str(bytes) = key.as_ref() {
                    if let Some(ident) = as_identifier(bytes) {
                        self.push(".");
                        self.push(ident);
                        return;
                    }
                }
                self.push("[");
                self.expr(key);
                self.push("]");
            }
            Expr::Call { func, args, .. } => {
                self.expr(func);
                self.push("(");
                self.expr_list(args);
                self.push(")");
            }
            Expr::MethodCall {
                obj, method, args, ..
            } => {
                self.expr(obj);
                self.push(":");
                self.push(method);
                self.push("(");
                self.expr_list(args);
                self.push(")");
            }
            Expr::Function(body) => {
                self.push("function");
                self.func_body(body);
            }
            Expr::Table { fields, .. } => {
                self.push("{");
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    match field {
                        TableField::Item(e) => self.expr(e),
                        TableField::Named(name, e) => {
                            self.push(name);
                            self.push(" = ");
                            self.expr(e);
                        }
                        TableField::Keyed(k, v) => {
                            self.push("[");
                            self.expr(k);
                            self.push("] = ");
                            self.expr(v);
                        }
                    }
                }
                self.push("}");
            }
            Expr::Binary { op, lhs, rhs, .. } => {
                self.expr(lhs);
                self.push(" ");
                self.push(binop_text(*op));
                self.push(" ");
                self.expr(rhs);
            }
            Expr::Unary { op, operand, .. } => {
                match op {
                    UnOp::Neg => self.push("-"),
                    UnOp::Not => self.push("not "),
                    UnOp::Len => self.push("#"),
                    UnOp::BNot => self.push("~"),
                }
                // `- -x` must not lex as a comment
                if matches!(
                    (op, operand.as_ref()),
                    (UnOp::Neg, Expr::Unary { op: UnOp::Neg, .. })
                ) {
                    self.push(" ");
                }
                self.expr(operand);
            }
            Expr::Paren(inner) => {
                self.push("(");
                self.expr(inner);
                self.push(")");
            }
        }
    }

    fn func_body(&mut self, body: &FuncBody) {
        self.push("(");
        for (i, param) in body.params.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.push(param);
        }
        if body.is_vararg {
            if !body.params.is_empty() {
                self.push(", ");
            }
            self.push("...");
        }
        self.push(")");
        self.newline();
        self.indent += 1;
        self.block(&body.body);
        self.indent -= 1;
        self.line_start();
        self.push("end");
    }
}

fn binop_text(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::IDiv => "//",
        BinOp::Mod => "%",
        BinOp::Pow => "^",
        BinOp::Concat => "..",
        BinOp::Eq => "==",
        BinOp::Ne => "~=",
        BinOp::Lt => "<",
        BinOp::Le => "<=",
        BinOp::Gt => ">",
        BinOp::Ge => ">=",
        BinOp::And => "and",
        BinOp::Or => "or",
        BinOp::BAnd => "&",
        BinOp::BOr => "|",
        BinOp::BXor => "~",
        BinOp::Shl => "<<",
        BinOp::Shr => ">>",
    }
}

fn as_identifier(bytes: &[u8]) -> Option<&str> {
    let s = std::str::from_utf8(bytes).ok()?;
    let mut chars = s.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() && first != '_' {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    if is_reserved(s) {
        return None;
    }
    Some(s)
}

fn is_reserved(s: &str) -> bool {
    matches!(
        s,
        "and" | "break" | "do" | "else" | "elseif" | "end" | "false" | "for" | "function"
            | "goto" | "if" | "in" | "local" | "nil" | "not" | "or" | "repeat" | "return"
            | "then" | "true" | "until" | "while"
    )
}

/// Float literal that re-parses to the identical bit pattern.
fn render_float(f: f64) -> String {
    if f.is_infinite() {
        // No literal form; a huge exponent overflows back to inf
        return if f > 0.0 { "1e9999".to_string() } else { "-1e9999".to_string() };
    }
    if f.is_nan() {
        return "(0/0)".to_string();
    }
    let repr = format!("{:?}", f);
    if repr.contains(['.', 'e', 'E']) {
        repr
    } else {
        format!("{}.0", repr)
    }
}

fn render_string(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() + 2);
    out.push('"');
    for &b in bytes {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            0x20..=0x7E => out.push(b as char),
            _ => out.push_str(&format!("\\{:03}", b)),
        }
    }
    out.push('"');
    out
}
