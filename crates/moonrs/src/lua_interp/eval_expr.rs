// Expression evaluation
// Two entry points honor the adjustment rules cheaply: `eval_expr`
// produces exactly one value, `eval_expr_list` lets only the final
// expression expand. Parentheses truncate by construction.

use crate::compiler::ast::{BinOp, Expr, TableField, UnOp};
use crate::lua_interp::scope::{Scope, lock_cell};
use crate::lua_interp::{LuaResult, LuaState};
use crate::lua_value::number::NumOp;
use crate::lua_value::{LuaClosure, LuaValue};
use std::sync::Arc;

impl LuaState {
    /// Evaluate to a single value.
    pub fn eval_expr(&mut self, expr: &Expr, scope: &Arc<Scope>) -> LuaResult<LuaValue> {
        match expr {
            Expr::Nil => Ok(LuaValue::Nil),
            Expr::True => Ok(LuaValue::Boolean(true)),
            Expr::False => Ok(LuaValue::Boolean(false)),
            Expr::Integer(i) => Ok(LuaValue::Integer(*i)),
            Expr::Float(f) => Ok(LuaValue::Float(*f)),
            Expr::Str(bytes) => self.alloc_bytes(bytes.clone()),
            Expr::Vararg { .. } => {
                Ok(scope.varargs().first().cloned().unwrap_or(LuaValue::Nil))
            }
            Expr::Name { name, line } => self.eval_name(name, *line, scope),
            Expr::Index { obj, key, line } => {
                let obj = self.eval_expr(obj, scope)?;
                let key = self.eval_expr(key, scope)?;
                self.set_line(*line);
                self.index_value(&obj, &key)
            }
            Expr::Call { .. } | Expr::MethodCall { .. } => {
                let mut results = self.eval_multi_expr(expr, scope)?;
                Ok(if results.is_empty() {
                    LuaValue::Nil
                } else {
                    results.swap_remove(0)
                })
            }
            Expr::Function(def) => Ok(LuaValue::Function(Arc::new(LuaClosure {
                def: def.clone(),
                captured: scope.clone(),
            }))),
            Expr::Table { fields, line } => self.eval_table(fields, *line, scope),
            Expr::Binary { op, lhs, rhs, line } => self.eval_binary(*op, lhs, rhs, *line, scope),
            Expr::Unary { op, operand, line } => {
                let value = self.eval_expr(operand, scope)?;
                self.set_line(*line);
                match op {
                    UnOp::Not => Ok(LuaValue::Boolean(!value.is_truthy())),
                    UnOp::Neg => self.arith_value(NumOp::Unm, &value, &value),
                    UnOp::BNot => self.arith_value(NumOp::BNot, &value, &value),
                    UnOp::Len => self.length_value(&value),
                }
            }
            Expr::Paren(inner) => self.eval_expr(inner, scope),
        }
    }

    fn eval_name(&mut self, name: &str, line: u32, scope: &Arc<Scope>) -> LuaResult<LuaValue> {
        if let Some(cell) = scope.lookup(name) {
            let binding = lock_cell(&cell);
            if binding.closed {
                self.set_line(line);
                return Err(self.error(format!("attempt to use a closed variable '{}'", name)));
            }
            return Ok(binding.value.clone());
        }
        // Free name: read _ENV.name
        let env = self.env_value(scope, line)?;
        self.set_line(line);
        let key = self.alloc_str(name)?;
        self.index_value(&env, &key)
    }

    /// The `_ENV` upvalue; every chunk scope declares it.
    pub(crate) fn env_value(&mut self, scope: &Arc<Scope>, line: u32) -> LuaResult<LuaValue> {
        match scope.lookup("_ENV") {
            Some(cell) => {
                let value = lock_cell(&cell).value.clone();
                if value.is_nil() {
                    self.set_line(line);
                    return Err(
                        self.error("attempt to index a nil value (upvalue '_ENV')")
                    );
                }
                Ok(value)
            }
            None => Err(self.error("attempt to index a nil value (upvalue '_ENV')")),
        }
    }

    fn eval_binary(
        &mut self,
        op: BinOp,
        lhs: &Expr,
        rhs: &Expr,
        line: u32,
        scope: &Arc<Scope>,
    ) -> LuaResult<LuaValue> {
        // Shortcut operators evaluate the right side lazily
        match op {
            BinOp::And => {
                let left = self.eval_expr(lhs, scope)?;
                if !left.is_truthy() {
                    return Ok(left);
                }
                return self.eval_expr(rhs, scope);
            }
            BinOp::Or => {
                let left = self.eval_expr(lhs, scope)?;
                if left.is_truthy() {
                    return Ok(left);
                }
                return self.eval_expr(rhs, scope);
            }
            _ => {}
        }

        let left = self.eval_expr(lhs, scope)?;
        let right = self.eval_expr(rhs, scope)?;
        self.set_line(line);

        match op {
            BinOp::Add => self.arith_value(NumOp::Add, &left, &right),
            BinOp::Sub => self.arith_value(NumOp::Sub, &left, &right),
            BinOp::Mul => self.arith_value(NumOp::Mul, &left, &right),
            BinOp::Div => self.arith_value(NumOp::Div, &left, &right),
            BinOp::IDiv => self.arith_value(NumOp::IDiv, &left, &right),
            BinOp::Mod => self.arith_value(NumOp::Mod, &left, &right),
            BinOp::Pow => self.arith_value(NumOp::Pow, &left, &right),
            BinOp::BAnd => self.arith_value(NumOp::BAnd, &left, &right),
            BinOp::BOr => self.arith_value(NumOp::BOr, &left, &right),
            BinOp::BXor => self.arith_value(NumOp::BXor, &left, &right),
            BinOp::Shl => self.arith_value(NumOp::Shl, &left, &right),
            BinOp::Shr => self.arith_value(NumOp::Shr, &left, &right),
            BinOp::Concat => self.concat_values(&left, &right),
            BinOp::Eq => Ok(LuaValue::Boolean(self.equals_value(&left, &right)?)),
            BinOp::Ne => Ok(LuaValue::Boolean(!self.equals_value(&left, &right)?)),
            BinOp::Lt => Ok(LuaValue::Boolean(self.less_than(&left, &right)?)),
            BinOp::Le => Ok(LuaValue::Boolean(self.less_equal(&left, &right)?)),
            BinOp::Gt => Ok(LuaValue::Boolean(self.less_than(&right, &left)?)),
            BinOp::Ge => Ok(LuaValue::Boolean(self.less_equal(&right, &left)?)),
            BinOp::And | BinOp::Or => unreachable!(),
        }
    }

    fn eval_table(
        &mut self,
        fields: &[TableField],
        line: u32,
        scope: &Arc<Scope>,
    ) -> LuaResult<LuaValue> {
        let positional = fields
            .iter()
            .filter(|f| matches!(f, TableField::Item(_)))
            .count();
        let table = self.new_table_with(positional, fields.len() - positional)?;
        let LuaValue::Table(t) = &table else { unreachable!() };

        let mut array_index: i64 = 1;
        let last = fields.len().saturating_sub(1);
        for (i, field) in fields.iter().enumerate() {
            match field {
                TableField::Item(expr) => {
                    if i == last && expr.is_multi_value() {
                        for value in self.eval_multi_expr(expr, scope)? {
                            t.lock().set_int(array_index, value);
                            array_index += 1;
                        }
                    } else {
                        let value = self.eval_expr(expr, scope)?;
                        t.lock().set_int(array_index, value);
                        array_index += 1;
                    }
                }
                TableField::Named(name, expr) => {
                    let value = self.eval_expr(expr, scope)?;
                    t.lock().set_str(name, value);
                }
                TableField::Keyed(key_expr, value_expr) => {
                    let key = self.eval_expr(key_expr, scope)?;
                    let value = self.eval_expr(value_expr, scope)?;
                    self.set_line(line);
                    t.lock().raw_set(key, value).map_err(|msg| self.error(msg))?;
                }
            }
        }
        Ok(table)
    }

    /// Evaluate a multi-value expression (call, method call, vararg) to
    /// its full value list.
    pub fn eval_multi_expr(
        &mut self,
        expr: &Expr,
        scope: &Arc<Scope>,
    ) -> LuaResult<Vec<LuaValue>> {
        match expr {
            Expr::Call { func, args, line } => {
                let callee = self.eval_expr(func, scope)?;
                let args = self.eval_expr_list(args, scope)?;
                self.set_line(*line);
                self.call_value(callee, args)
            }
            Expr::MethodCall {
                obj,
                method,
                args,
                line,
            } => {
                let receiver = self.eval_expr(obj, scope)?;
                self.set_line(*line);
                let key = self.alloc_str(method.as_str())?;
                let callee = self.index_value(&receiver, &key)?;
                let mut all_args = Vec::with_capacity(args.len() + 1);
                all_args.push(receiver);
                all_args.extend(self.eval_expr_list(args, scope)?);
                self.set_line(*line);
                self.call_value(callee, all_args)
            }
            Expr::Vararg { .. } => Ok(scope.varargs().as_ref().clone()),
            other => Ok(vec![self.eval_expr(other, scope)?]),
        }
    }

    /// Expression-list evaluation: every expression but the last is
    /// truncated to one value; the last contributes all of its values.
    pub fn eval_expr_list(
        &mut self,
        exprs: &[Expr],
        scope: &Arc<Scope>,
    ) -> LuaResult<Vec<LuaValue>> {
        let mut values = Vec::with_capacity(exprs.len());
        if exprs.is_empty() {
            return Ok(values);
        }
        for expr in &exprs[..exprs.len() - 1] {
            values.push(self.eval_expr(expr, scope)?);
        }
        let last = &exprs[exprs.len() - 1];
        if last.is_multi_value() {
            values.extend(self.eval_multi_expr(last, scope)?);
        } else {
            values.push(self.eval_expr(last, scope)?);
        }
        Ok(values)
    }

    /// Expression list adjusted to exactly `want` values.
    pub fn eval_expr_list_n(
        &mut self,
        exprs: &[Expr],
        scope: &Arc<Scope>,
        want: usize,
    ) -> LuaResult<Vec<LuaValue>> {
        let mut values = self.eval_expr_list(exprs, scope)?;
        values.resize(want, LuaValue::Nil);
        Ok(values)
    }
}
