mod lua_token_data;
mod lua_token_kind;
mod lua_tokenize;
pub mod parse_number;
mod reader;

pub use lua_token_data::LuaTokenData;
pub use lua_token_kind::LuaTokenKind;
pub use lua_tokenize::LuaTokenize;
pub use reader::{Reader, SourceRange};

use std::sync::Arc;

use smol_str::SmolStr;

use crate::compiler::ast::{
    Attrib, BinOp, Block, Expr, FuncBody, Name, Stat, TableField, UnOp,
};
use crate::diagnostics::{codes, Diagnostic, DiagnosticCollector, SourceLocation};
use parse_number::{NumberValue, parse_lua_number};

/// Lexer-side error before it is materialized into a [`Diagnostic`].
pub struct RawError {
    pub code: &'static str,
    pub message: String,
    pub range: SourceRange,
    pub line: u32,
}

/// Unit error: the diagnostic has already been recorded when this is
/// returned, the caller only needs to resynchronize.
pub struct ParseFail;

type ParseResult<T> = Result<T, ParseFail>;

const UNARY_PRIORITY: u8 = 12;

/// (left, right) binding priority per the Lua reference grammar.
fn bin_priority(op: BinOp) -> (u8, u8) {
    match op {
        BinOp::Or => (1, 1),
        BinOp::And => (2, 2),
        BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge | BinOp::Ne | BinOp::Eq => (3, 3),
        BinOp::BOr => (4, 4),
        BinOp::BXor => (5, 5),
        BinOp::BAnd => (6, 6),
        BinOp::Shl | BinOp::Shr => (7, 7),
        BinOp::Concat => (9, 8), // right associative
        BinOp::Add | BinOp::Sub => (10, 10),
        BinOp::Mul | BinOp::Div | BinOp::IDiv | BinOp::Mod => (11, 11),
        BinOp::Pow => (14, 13), // right associative
    }
}

fn token_to_binop(kind: LuaTokenKind) -> Option<BinOp> {
    use LuaTokenKind::*;
    Some(match kind {
        TkOr => BinOp::Or,
        TkAnd => BinOp::And,
        TkLt => BinOp::Lt,
        TkGt => BinOp::Gt,
        TkLe => BinOp::Le,
        TkGe => BinOp::Ge,
        TkNe => BinOp::Ne,
        TkEq => BinOp::Eq,
        TkBitOr => BinOp::BOr,
        TkBitXor => BinOp::BXor,
        TkBitAnd => BinOp::BAnd,
        TkShl => BinOp::Shl,
        TkShr => BinOp::Shr,
        TkConcat => BinOp::Concat,
        TkPlus => BinOp::Add,
        TkMinus => BinOp::Sub,
        TkMul => BinOp::Mul,
        TkDiv => BinOp::Div,
        TkIDiv => BinOp::IDiv,
        TkMod => BinOp::Mod,
        TkPow => BinOp::Pow,
        _ => return std::option::Option::None,
    })
}

pub struct LuaParser<'a> {
    text: &'a str,
    chunk: Arc<str>,
    tokens: Vec<LuaTokenData>,
    token_index: usize,
    diagnostics: &'a DiagnosticCollector,
    /// Vararg-ness of the enclosing function, innermost last.
    vararg_stack: Vec<bool>,
    loop_depth: usize,
}

impl<'a> LuaParser<'a> {
    pub fn new(text: &'a str, chunk: Arc<str>, diagnostics: &'a DiagnosticCollector) -> Self {
        let mut raw_errors = Vec::new();
        let tokens: Vec<LuaTokenData> = LuaTokenize::new(text)
            .tokenize(&mut raw_errors)
            .into_iter()
            .filter(|t| !t.kind.is_trivia())
            .collect();

        let parser = LuaParser {
            text,
            chunk,
            tokens,
            token_index: 0,
            diagnostics,
            vararg_stack: vec![true], // the chunk itself is vararg
            loop_depth: 0,
        };
        for err in raw_errors {
            parser.report_raw(err);
        }
        parser
    }

    /// Parse the whole chunk. The returned block is meaningful only when
    /// the diagnostic collector holds no errors.
    pub fn parse_chunk(mut self) -> Block {
        let block = self.block();
        if self.current() != LuaTokenKind::TkEof {
            self.error_here(
                codes::UNEXPECTED_TOKEN,
                format!("{} expected near {}", "<eof>", self.current().describe()),
            );
        }
        block
    }

    // ===== token cursor =====

    fn current(&self) -> LuaTokenKind {
        self.tokens
            .get(self.token_index)
            .map(|t| t.kind)
            .unwrap_or(LuaTokenKind::TkEof)
    }

    fn current_line(&self) -> u32 {
        self.tokens
            .get(self.token_index)
            .map(|t| t.line)
            .unwrap_or_else(|| self.tokens.last().map(|t| t.line).unwrap_or(1))
    }

    fn current_text(&self) -> &'a str {
        match self.tokens.get(self.token_index) {
            Some(t) => &self.text[t.range.start..t.range.end()],
            None => "",
        }
    }

    fn bump(&mut self) {
        if self.token_index < self.tokens.len() {
            self.token_index += 1;
        }
    }

    /// Consume the token if it matches.
    fn check(&mut self, kind: LuaTokenKind) -> bool {
        if self.current() == kind {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: LuaTokenKind) -> ParseResult<()> {
        if self.check(kind) {
            Ok(())
        } else {
            self.error_here(
                codes::UNEXPECTED_TOKEN,
                format!("{} expected near {}", kind.describe(), self.current().describe()),
            );
            Err(ParseFail)
        }
    }

    /// `end` (or `until`) matching an opener at `open_line`.
    fn expect_match(&mut self, kind: LuaTokenKind, open: &str, open_line: u32) -> ParseResult<()> {
        if self.check(kind) {
            Ok(())
        } else {
            self.error_here(
                codes::MISSING_DELIMITER,
                format!(
                    "{} expected (to close '{}' at line {}) near {}",
                    kind.describe(),
                    open,
                    open_line,
                    self.current().describe()
                ),
            );
            Err(ParseFail)
        }
    }

    fn expect_name(&mut self) -> ParseResult<Name> {
        if self.current() == LuaTokenKind::TkName {
            let name = SmolStr::new(self.current_text());
            self.bump();
            Ok(name)
        } else if self.current().is_keyword() {
            self.error_here(
                codes::RESERVED_WORD,
                format!("<name> expected near {}", self.current().describe()),
            );
            Err(ParseFail)
        } else {
            self.error_here(
                codes::UNEXPECTED_TOKEN,
                format!("<name> expected near {}", self.current().describe()),
            );
            Err(ParseFail)
        }
    }

    // ===== diagnostics =====

    fn location_of(&self, range: SourceRange, line: u32) -> SourceLocation {
        let line_start = self.text[..range.start.min(self.text.len())]
            .rfind('\n')
            .map(|i| i + 1)
            .unwrap_or(0);
        SourceLocation {
            file: self.chunk.to_string(),
            line,
            column: (range.start.saturating_sub(line_start) + 1) as u32,
            length: range.len as u32,
        }
    }

    fn report_raw(&self, err: RawError) {
        let location = self.location_of(err.range, err.line);
        self.diagnostics
            .report(Diagnostic::error(err.code, err.message).at(location));
    }

    fn error_here(&self, code: &'static str, message: String) {
        let (range, line) = match self.tokens.get(self.token_index) {
            Some(t) => (t.range, t.line),
            None => (SourceRange::EMPTY, self.current_line()),
        };
        self.diagnostics
            .report(Diagnostic::error(code, message).at(self.location_of(range, line)));
    }

    /// Skip to a plausible statement boundary after an error.
    fn synchronize(&mut self) {
        use LuaTokenKind::*;
        loop {
            match self.current() {
                TkEof | TkEnd | TkElse | TkElseIf | TkUntil => return,
                TkSemicolon => {
                    self.bump();
                    return;
                }
                TkIf | TkWhile | TkFor | TkRepeat | TkDo | TkLocal | TkFunction | TkReturn
                | TkBreak | TkGoto | TkDbColon => return,
                _ => self.bump(),
            }
        }
    }

    // ===== blocks and statements =====

    fn at_block_end(&self) -> bool {
        matches!(
            self.current(),
            LuaTokenKind::TkEof
                | LuaTokenKind::TkEnd
                | LuaTokenKind::TkElse
                | LuaTokenKind::TkElseIf
                | LuaTokenKind::TkUntil
        )
    }

    fn block(&mut self) -> Block {
        let mut stats = Vec::new();
        while !self.at_block_end() {
            if self.check(LuaTokenKind::TkSemicolon) {
                continue;
            }
            let is_return = self.current() == LuaTokenKind::TkReturn;
            match self.statement() {
                Ok(Some(stat)) => stats.push(stat),
                Ok(None) => {}
                Err(ParseFail) => {
                    // Recover at a statement boundary; guarantee progress
                    let before = self.token_index;
                    self.synchronize();
                    if self.token_index == before && !self.at_block_end() {
                        self.bump();
                    }
                    continue;
                }
            }
            if is_return {
                // 'return' must close its block
                self.check(LuaTokenKind::TkSemicolon);
                if !self.at_block_end() {
                    self.error_here(
                        codes::MISPLACED_STATEMENT,
                        format!("'<eof>' expected after 'return' near {}", self.current().describe()),
                    );
                    self.synchronize();
                }
                break;
            }
        }
        Block { stats }
    }

    fn statement(&mut self) -> ParseResult<Option<Stat>> {
        use LuaTokenKind::*;
        let line = self.current_line();
        match self.current() {
            TkIf => self.if_stat().map(Some),
            TkWhile => {
                self.bump();
                let cond = self.expression()?;
                self.expect(TkDo)?;
                self.loop_depth += 1;
                let body = self.block();
                self.loop_depth -= 1;
                self.expect_match(TkEnd, "while", line)?;
                Ok(Some(Stat::While { cond, body }))
            }
            TkDo => {
                self.bump();
                let body = self.block();
                self.expect_match(TkEnd, "do", line)?;
                Ok(Some(Stat::Do(body)))
            }
            TkFor => self.for_stat(line).map(Some),
            TkRepeat => {
                self.bump();
                self.loop_depth += 1;
                let body = self.block();
                self.loop_depth -= 1;
                self.expect_match(TkUntil, "repeat", line)?;
                let cond = self.expression()?;
                Ok(Some(Stat::Repeat { body, cond }))
            }
            TkFunction => self.function_stat().map(Some),
            TkLocal => {
                self.bump();
                if self.check(TkFunction) {
                    let name = self.expect_name()?;
                    let body = self.func_body(false, Some(name.to_string()), line)?;
                    Ok(Some(Stat::LocalFunction { name, body }))
                } else {
                    self.local_stat(line).map(Some)
                }
            }
            TkDbColon => {
                self.bump();
                let name = self.expect_name()?;
                self.expect(TkDbColon)?;
                Ok(Some(Stat::Label(name)))
            }
            TkReturn => {
                self.bump();
                let exprs = if self.at_block_end() || self.current() == TkSemicolon {
                    Vec::new()
                } else {
                    self.expression_list()?
                };
                Ok(Some(Stat::Return { exprs, line }))
            }
            TkBreak => {
                self.bump();
                if self.loop_depth == 0 {
                    self.error_here(
                        codes::MISPLACED_STATEMENT,
                        "break outside a loop".to_string(),
                    );
                    return Err(ParseFail);
                }
                Ok(Some(Stat::Break { line }))
            }
            TkGoto => {
                self.bump();
                let label = self.expect_name()?;
                Ok(Some(Stat::Goto { label, line }))
            }
            _ => self.expr_stat(line).map(Some),
        }
    }

    fn if_stat(&mut self) -> ParseResult<Stat> {
        use LuaTokenKind::*;
        let line = self.current_line();
        self.bump(); // if
        let mut arms = Vec::new();
        let cond = self.expression()?;
        self.expect(TkThen)?;
        arms.push((cond, self.block()));
        while self.current() == TkElseIf {
            self.bump();
            let cond = self.expression()?;
            self.expect(TkThen)?;
            arms.push((cond, self.block()));
        }
        let else_body = if self.check(TkElse) {
            Some(self.block())
        } else {
            std::option::Option::None
        };
        self.expect_match(TkEnd, "if", line)?;
        Ok(Stat::If { arms, else_body })
    }

    fn for_stat(&mut self, line: u32) -> ParseResult<Stat> {
        use LuaTokenKind::*;
        self.bump(); // for
        let first = self.expect_name()?;
        if self.check(TkAssign) {
            let start = self.expression()?;
            self.expect(TkComma)?;
            let stop = self.expression()?;
            let step = if self.check(TkComma) {
                Some(self.expression()?)
            } else {
                std::option::Option::None
            };
            self.expect(TkDo)?;
            self.loop_depth += 1;
            let body = self.block();
            self.loop_depth -= 1;
            self.expect_match(TkEnd, "for", line)?;
            Ok(Stat::NumericFor {
                var: first,
                start,
                stop,
                step,
                body,
                line,
            })
        } else {
            let mut names = vec![first];
            while self.check(TkComma) {
                names.push(self.expect_name()?);
            }
            self.expect(TkIn)?;
            let exprs = self.expression_list()?;
            self.expect(TkDo)?;
            self.loop_depth += 1;
            let body = self.block();
            self.loop_depth -= 1;
            self.expect_match(TkEnd, "for", line)?;
            Ok(Stat::GenericFor {
                names,
                exprs,
                body,
                line,
            })
        }
    }

    /// `function a.b.c:m(...) ... end` desugars to an assignment.
    fn function_stat(&mut self) -> ParseResult<Stat> {
        use LuaTokenKind::*;
        let line = self.current_line();
        self.bump(); // function
        let base = self.expect_name()?;
        let mut display = base.to_string();
        let mut target = Expr::Name { name: base, line };
        let mut is_method = false;

        loop {
            if self.check(TkDot) {
                let field = self.expect_name()?;
                display.push('.');
                display.push_str(&field);
                target = Expr::Index {
                    obj: Box::new(target),
                    key: Box::new(Expr::Str(field.as_bytes().to_vec())),
                    line,
                };
            } else if self.check(TkColon) {
                let method = self.expect_name()?;
                display.push(':');
                display.push_str(&method);
                target = Expr::Index {
                    obj: Box::new(target),
                    key: Box::new(Expr::Str(method.as_bytes().to_vec())),
                    line,
                };
                is_method = true;
                break;
            } else {
                break;
            }
        }

        let body = self.func_body(is_method, Some(display), line)?;
        Ok(Stat::Assign {
            targets: vec![target],
            values: vec![Expr::Function(body)],
            line,
        })
    }

    fn local_stat(&mut self, line: u32) -> ParseResult<Stat> {
        use LuaTokenKind::*;
        let mut names = Vec::new();
        loop {
            let name = self.expect_name()?;
            let attrib = if self.check(TkLt) {
                let attrib_name = self.expect_name()?;
                let attrib = match attrib_name.as_str() {
                    "const" => Attrib::Const,
                    "close" => Attrib::Close,
                    other => {
                        self.error_here(
                            codes::UNEXPECTED_TOKEN,
                            format!("unknown attribute '{}'", other),
                        );
                        return Err(ParseFail);
                    }
                };
                self.expect(TkGt)?;
                attrib
            } else {
                Attrib::None
            };
            names.push((name, attrib));
            if !self.check(TkComma) {
                break;
            }
        }
        let values = if self.check(TkAssign) {
            self.expression_list()?
        } else {
            Vec::new()
        };
        Ok(Stat::Local {
            names,
            values,
            line,
        })
    }

    /// Expression statement: either an assignment or a bare call.
    fn expr_stat(&mut self, line: u32) -> ParseResult<Stat> {
        use LuaTokenKind::*;
        let first = self.suffixed_expression()?;
        if self.current() == TkAssign || self.current() == TkComma {
            let mut targets = vec![first];
            while self.check(TkComma) {
                targets.push(self.suffixed_expression()?);
            }
            for target in &targets {
                if !matches!(target, Expr::Name { .. } | Expr::Index { .. }) {
                    self.error_here(
                        codes::UNEXPECTED_TOKEN,
                        "cannot assign to this expression".to_string(),
                    );
                    return Err(ParseFail);
                }
            }
            self.expect(TkAssign)?;
            let values = self.expression_list()?;
            Ok(Stat::Assign {
                targets,
                values,
                line,
            })
        } else if first.is_multi_value() {
            Ok(Stat::Call(first))
        } else {
            self.error_here(codes::MISPLACED_STATEMENT, "syntax error: unexpected expression statement".to_string());
            Err(ParseFail)
        }
    }

    // ===== expressions =====

    fn expression(&mut self) -> ParseResult<Expr> {
        self.sub_expression(0)
    }

    fn expression_list(&mut self) -> ParseResult<Vec<Expr>> {
        let mut exprs = vec![self.expression()?];
        while self.check(LuaTokenKind::TkComma) {
            exprs.push(self.expression()?);
        }
        Ok(exprs)
    }

    fn sub_expression(&mut self, limit: u8) -> ParseResult<Expr> {
        use LuaTokenKind::*;
        let line = self.current_line();
        let mut left = match self.current() {
            TkNot => self.unary(UnOp::Not, line)?,
            TkMinus => self.unary(UnOp::Neg, line)?,
            TkLen => self.unary(UnOp::Len, line)?,
            TkBitXor => self.unary(UnOp::BNot, line)?,
            _ => self.simple_expression()?,
        };

        while let Some(op) = token_to_binop(self.current()) {
            let (left_pri, right_pri) = bin_priority(op);
            if left_pri <= limit {
                break;
            }
            let op_line = self.current_line();
            self.bump();
            let right = self.sub_expression(right_pri)?;
            left = Expr::Binary {
                op,
                lhs: Box::new(left),
                rhs: Box::new(right),
                line: op_line,
            };
        }

        Ok(left)
    }

    fn unary(&mut self, op: UnOp, line: u32) -> ParseResult<Expr> {
        self.bump();
        let operand = self.sub_expression(UNARY_PRIORITY)?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
            line,
        })
    }

    fn simple_expression(&mut self) -> ParseResult<Expr> {
        use LuaTokenKind::*;
        let line = self.current_line();
        match self.current() {
            TkNil => {
                self.bump();
                Ok(Expr::Nil)
            }
            TkTrue => {
                self.bump();
                Ok(Expr::True)
            }
            TkFalse => {
                self.bump();
                Ok(Expr::False)
            }
            TkDots => {
                self.bump();
                if !self.vararg_stack.last().copied().unwrap_or(false) {
                    self.error_here(
                        codes::UNEXPECTED_TOKEN,
                        "cannot use '...' outside a vararg function".to_string(),
                    );
                    return Err(ParseFail);
                }
                Ok(Expr::Vararg { line })
            }
            TkInt | TkFloat => self.number_expression(),
            TkString => {
                let decoded = self.decode_short_string()?;
                self.bump();
                Ok(Expr::Str(decoded))
            }
            TkLongString => {
                let decoded = decode_long_string(self.current_text());
                self.bump();
                Ok(Expr::Str(decoded))
            }
            TkFunction => {
                self.bump();
                let body = self.func_body(false, std::option::Option::None, line)?;
                Ok(Expr::Function(body))
            }
            TkLeftBrace => self.table_constructor(line),
            _ => self.suffixed_expression(),
        }
    }

    fn number_expression(&mut self) -> ParseResult<Expr> {
        let text = self.current_text();
        match parse_lua_number(text) {
            Some(NumberValue::Int(i)) => {
                self.bump();
                Ok(Expr::Integer(i))
            }
            Some(NumberValue::Float(f)) => {
                self.bump();
                Ok(Expr::Float(f))
            }
            None => {
                self.error_here(
                    codes::INVALID_NUMBER,
                    format!("malformed number near '{}'", text),
                );
                self.bump();
                Err(ParseFail)
            }
        }
    }

    fn primary_expression(&mut self) -> ParseResult<Expr> {
        use LuaTokenKind::*;
        let line = self.current_line();
        match self.current() {
            TkName => {
                let name = SmolStr::new(self.current_text());
                self.bump();
                Ok(Expr::Name { name, line })
            }
            TkLeftParen => {
                self.bump();
                let inner = self.expression()?;
                self.expect_match(TkRightParen, "(", line)?;
                Ok(Expr::Paren(Box::new(inner)))
            }
            _ => {
                self.error_here(
                    codes::UNEXPECTED_TOKEN,
                    format!("unexpected symbol near {}", self.current().describe()),
                );
                Err(ParseFail)
            }
        }
    }

    fn suffixed_expression(&mut self) -> ParseResult<Expr> {
        use LuaTokenKind::*;
        let mut expr = self.primary_expression()?;
        loop {
            let line = self.current_line();
            match self.current() {
                TkDot => {
                    self.bump();
                    let field = self.expect_name()?;
                    expr = Expr::Index {
                        obj: Box::new(expr),
                        key: Box::new(Expr::Str(field.as_bytes().to_vec())),
                        line,
                    };
                }
                TkLeftBracket => {
                    self.bump();
                    let key = self.expression()?;
                    self.expect_match(TkRightBracket, "[", line)?;
                    expr = Expr::Index {
                        obj: Box::new(expr),
                        key: Box::new(key),
                        line,
                    };
                }
                TkColon => {
                    self.bump();
                    let method = self.expect_name()?;
                    let args = self.call_arguments(line)?;
                    expr = Expr::MethodCall {
                        obj: Box::new(expr),
                        method,
                        args,
                        line,
                    };
                }
                TkLeftParen | TkLeftBrace | TkString | TkLongString => {
                    let args = self.call_arguments(line)?;
                    expr = Expr::Call {
                        func: Box::new(expr),
                        args,
                        line,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    /// Call arguments: parenthesized list, single table constructor, or
    /// single string literal.
    fn call_arguments(&mut self, line: u32) -> ParseResult<Vec<Expr>> {
        use LuaTokenKind::*;
        match self.current() {
            TkLeftParen => {
                self.bump();
                let args = if self.current() == TkRightParen {
                    Vec::new()
                } else {
                    self.expression_list()?
                };
                self.expect_match(TkRightParen, "(", line)?;
                Ok(args)
            }
            TkLeftBrace => Ok(vec![self.table_constructor(line)?]),
            TkString => {
                let decoded = self.decode_short_string()?;
                self.bump();
                Ok(vec![Expr::Str(decoded)])
            }
            TkLongString => {
                let decoded = decode_long_string(self.current_text());
                self.bump();
                Ok(vec![Expr::Str(decoded)])
            }
            _ => {
                self.error_here(
                    codes::UNEXPECTED_TOKEN,
                    format!("function arguments expected near {}", self.current().describe()),
                );
                Err(ParseFail)
            }
        }
    }

    fn table_constructor(&mut self, line: u32) -> ParseResult<Expr> {
        use LuaTokenKind::*;
        self.expect(TkLeftBrace)?;
        let mut fields = Vec::new();
        loop {
            if self.current() == TkRightBrace {
                break;
            }
            match self.current() {
                TkLeftBracket => {
                    self.bump();
                    let key = self.expression()?;
                    self.expect_match(TkRightBracket, "[", line)?;
                    if !self.check(TkAssign) {
                        self.error_here(
                            codes::INVALID_TABLE_CONSTRUCTOR,
                            format!("'=' expected near {}", self.current().describe()),
                        );
                        return Err(ParseFail);
                    }
                    let value = self.expression()?;
                    fields.push(TableField::Keyed(key, value));
                }
                TkName if self.peek_kind(1) == TkAssign => {
                    let name = SmolStr::new(self.current_text());
                    self.bump(); // name
                    self.bump(); // =
                    let value = self.expression()?;
                    fields.push(TableField::Named(name, value));
                }
                _ => {
                    fields.push(TableField::Item(self.expression()?));
                }
            }
            if !self.check(TkComma) && !self.check(TkSemicolon) {
                break;
            }
        }
        self.expect_match(TkRightBrace, "{", line)?;
        Ok(Expr::Table { fields, line })
    }

    fn peek_kind(&self, ahead: usize) -> LuaTokenKind {
        self.tokens
            .get(self.token_index + ahead)
            .map(|t| t.kind)
            .unwrap_or(LuaTokenKind::TkEof)
    }

    fn func_body(
        &mut self,
        is_method: bool,
        name: Option<String>,
        line: u32,
    ) -> ParseResult<Arc<FuncBody>> {
        use LuaTokenKind::*;
        self.expect(TkLeftParen)?;
        let mut params: Vec<Name> = Vec::new();
        if is_method {
            params.push(SmolStr::new("self"));
        }
        let mut is_vararg = false;
        if self.current() != TkRightParen {
            loop {
                if self.check(TkDots) {
                    is_vararg = true;
                    break;
                }
                params.push(self.expect_name()?);
                if !self.check(TkComma) {
                    break;
                }
            }
        }
        self.expect_match(TkRightParen, "(", line)?;

        self.vararg_stack.push(is_vararg);
        let body = self.block();
        self.vararg_stack.pop();
        self.expect_match(TkEnd, "function", line)?;

        Ok(Arc::new(FuncBody {
            params,
            is_vararg,
            body,
            name,
            chunk: self.chunk.clone(),
            line,
        }))
    }

    // ===== literal decoding =====

    fn decode_short_string(&self) -> ParseResult<Vec<u8>> {
        match decode_short_string(self.current_text()) {
            Ok(bytes) => Ok(bytes),
            Err(message) => {
                self.error_here(codes::INVALID_ESCAPE, message);
                Err(ParseFail)
            }
        }
    }
}

/// Decode a short string literal including its quotes.
pub fn decode_short_string(text: &str) -> Result<Vec<u8>, String> {
    let bytes = text.as_bytes();
    if bytes.len() < 2 {
        return Ok(Vec::new());
    }
    let body = &bytes[1..bytes.len() - 1];
    let mut out = Vec::with_capacity(body.len());
    let mut i = 0;

    while i < body.len() {
        let b = body[i];
        if b != b'\\' {
            out.push(b);
            i += 1;
            continue;
        }
        i += 1;
        if i >= body.len() {
            break;
        }
        match body[i] {
            b'a' => {
                out.push(0x07);
                i += 1;
            }
            b'b' => {
                out.push(0x08);
                i += 1;
            }
            b'f' => {
                out.push(0x0C);
                i += 1;
            }
            b'n' => {
                out.push(b'\n');
                i += 1;
            }
            b'r' => {
                out.push(b'\r');
                i += 1;
            }
            b't' => {
                out.push(b'\t');
                i += 1;
            }
            b'v' => {
                out.push(0x0B);
                i += 1;
            }
            b'\\' => {
                out.push(b'\\');
                i += 1;
            }
            b'"' => {
                out.push(b'"');
                i += 1;
            }
            b'\'' => {
                out.push(b'\'');
                i += 1;
            }
            b'\n' | b'\r' => {
                // Escaped line break: becomes a newline
                let first = body[i];
                out.push(b'\n');
                i += 1;
                if i < body.len() && (body[i] == b'\n' || body[i] == b'\r') && body[i] != first {
                    i += 1;
                }
            }
            b'x' => {
                i += 1;
                let mut value = 0u32;
                let mut count = 0;
                while count < 2 && i < body.len() {
                    match (body[i] as char).to_digit(16) {
                        Some(d) => {
                            value = value * 16 + d;
                            i += 1;
                            count += 1;
                        }
                        None => break,
                    }
                }
                if count != 2 {
                    return Err("hexadecimal digit expected".to_string());
                }
                out.push(value as u8);
            }
            b'z' => {
                i += 1;
                while i < body.len() && body[i].is_ascii_whitespace() {
                    i += 1;
                }
            }
            b'u' => {
                i += 1;
                if i >= body.len() || body[i] != b'{' {
                    return Err("missing '{' in \\u{xxxx}".to_string());
                }
                i += 1;
                let mut value: u32 = 0;
                let mut count = 0;
                while i < body.len() && body[i] != b'}' {
                    match (body[i] as char).to_digit(16) {
                        Some(d) => {
                            if value > 0x7FFF_FFFF / 16 {
                                return Err("UTF-8 value too large".to_string());
                            }
                            value = value * 16 + d;
                            i += 1;
                            count += 1;
                        }
                        None => return Err("hexadecimal digit expected".to_string()),
                    }
                }
                if i >= body.len() || count == 0 {
                    return Err("missing '}' in \\u{xxxx}".to_string());
                }
                i += 1; // consume '}'
                push_utf8(&mut out, value);
            }
            d if d.is_ascii_digit() => {
                let mut value: u32 = 0;
                let mut count = 0;
                while count < 3 && i < body.len() && body[i].is_ascii_digit() {
                    value = value * 10 + (body[i] - b'0') as u32;
                    i += 1;
                    count += 1;
                }
                if value > 255 {
                    return Err("decimal escape too large".to_string());
                }
                out.push(value as u8);
            }
            other => {
                return Err(format!("invalid escape sequence '\\{}'", other as char));
            }
        }
    }

    Ok(out)
}

/// Encode a code point as (possibly extended) UTF-8, up to 6 bytes, the
/// way the reference string escape does.
pub fn push_utf8(out: &mut Vec<u8>, value: u32) {
    if value < 0x80 {
        out.push(value as u8);
    } else if value < 0x800 {
        out.push(0xC0 | (value >> 6) as u8);
        out.push(0x80 | (value & 0x3F) as u8);
    } else if value < 0x10000 {
        out.push(0xE0 | (value >> 12) as u8);
        out.push(0x80 | ((value >> 6) & 0x3F) as u8);
        out.push(0x80 | (value & 0x3F) as u8);
    } else if value < 0x200000 {
        out.push(0xF0 | (value >> 18) as u8);
        out.push(0x80 | ((value >> 12) & 0x3F) as u8);
        out.push(0x80 | ((value >> 6) & 0x3F) as u8);
        out.push(0x80 | (value & 0x3F) as u8);
    } else if value < 0x4000000 {
        out.push(0xF8 | (value >> 24) as u8);
        out.push(0x80 | ((value >> 18) & 0x3F) as u8);
        out.push(0x80 | ((value >> 12) & 0x3F) as u8);
        out.push(0x80 | ((value >> 6) & 0x3F) as u8);
        out.push(0x80 | (value & 0x3F) as u8);
    } else {
        out.push(0xFC | (value >> 30) as u8);
        out.push(0x80 | ((value >> 24) & 0x3F) as u8);
        out.push(0x80 | ((value >> 18) & 0x3F) as u8);
        out.push(0x80 | ((value >> 12) & 0x3F) as u8);
        out.push(0x80 | ((value >> 6) & 0x3F) as u8);
        out.push(0x80 | (value & 0x3F) as u8);
    }
}

/// Strip the brackets of a long string literal; the first newline right
/// after the opener is not part of the content.
pub fn decode_long_string(text: &str) -> Vec<u8> {
    let bytes = text.as_bytes();
    let mut level = 0;
    let mut i = 1; // past '['
    while i < bytes.len() && bytes[i] == b'=' {
        level += 1;
        i += 1;
    }
    i += 1; // past second '['

    // Opening newline is consumed
    if i < bytes.len() && (bytes[i] == b'\r' || bytes[i] == b'\n') {
        let first = bytes[i];
        i += 1;
        if i < bytes.len() && (bytes[i] == b'\n' || bytes[i] == b'\r') && bytes[i] != first {
            i += 1;
        }
    }

    let close_len = level + 2;
    let end = bytes.len().saturating_sub(close_len);
    if i >= end {
        return Vec::new();
    }
    bytes[i..end].to_vec()
}
