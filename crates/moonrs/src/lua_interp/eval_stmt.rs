// Statement evaluation
// Control flow travels as `Flow` signals through Ok; errors through Err.
// Every block owns a to-be-closed list unwound LIFO on any exit path,
// and a declaration log so goto can drop locals scoped after a label.

use std::sync::Arc;

use crate::compiler::ast::{Attrib, Block, Expr, Name, Stat};
use crate::lua_interp::scope::{BindingCell, Scope, lock_cell};
use crate::lua_interp::{LuaError, LuaResult, LuaState};
use crate::lua_value::{LuaClosure, LuaValue};

#[derive(Debug)]
pub enum Flow {
    Normal,
    Break,
    Return(Vec<LuaValue>),
    Goto(Name),
}

/// Per-block bookkeeping: to-be-closed cells and declared locals, both
/// tagged with the statement index that created them.
#[derive(Default)]
struct BlockCtx {
    tbc: Vec<(usize, Name, BindingCell)>,
    declared: Vec<(usize, Name, Option<BindingCell>)>,
}

enum Target {
    Cell(BindingCell, Name),
    Index(LuaValue, LuaValue),
}

impl LuaState {
    /// Execute a block in `scope`, closing `<close>` bindings on every
    /// exit path.
    pub fn exec_block(&mut self, block: &Block, scope: &Arc<Scope>) -> LuaResult<Flow> {
        let mut ctx = BlockCtx::default();
        match self.run_block(block, scope, &mut ctx) {
            Ok(flow) => match self.unwind_tbc(&mut ctx.tbc, 0, None) {
                None => Ok(flow),
                Some(err) => Err(err),
            },
            Err(err) => match self.unwind_tbc(&mut ctx.tbc, 0, Some(err)) {
                Some(err) => Err(err),
                None => Err(LuaError::internal("to-be-closed unwind lost its error")),
            },
        }
    }

    fn run_block(
        &mut self,
        block: &Block,
        scope: &Arc<Scope>,
        ctx: &mut BlockCtx,
    ) -> LuaResult<Flow> {
        let mut idx = 0;
        while idx < block.stats.len() {
            self.check_interrupt()?;
            match self.exec_stmt(&block.stats[idx], scope, ctx, idx)? {
                Flow::Normal => idx += 1,
                Flow::Goto(label) => match find_label(block, &label) {
                    Some(label_idx) => {
                        // Leaving the span after the label closes its
                        // to-be-closed bindings and drops its locals.
                        if let Some(err) =
                            self.unwind_tbc(&mut ctx.tbc, label_idx + 1, None)
                        {
                            return Err(err);
                        }
                        while ctx
                            .declared
                            .last()
                            .map(|(didx, _, _)| *didx > label_idx)
                            .unwrap_or(false)
                        {
                            let (_, name, prev) = ctx.declared.pop().expect("checked non-empty");
                            scope.restore(&name, prev);
                        }
                        idx = label_idx + 1;
                    }
                    None => return Ok(Flow::Goto(label)),
                },
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    /// Close to-be-closed entries declared at statement index
    /// `keep_below` or later, LIFO. Returns the error to propagate, if
    /// any; an in-flight error is preferred over `__close` failures.
    fn unwind_tbc(
        &mut self,
        tbc: &mut Vec<(usize, Name, BindingCell)>,
        keep_below: usize,
        mut pending: Option<LuaError>,
    ) -> Option<LuaError> {
        while let Some((idx, _, _)) = tbc.last() {
            if *idx < keep_below {
                break;
            }
            let (_, name, cell) = tbc.pop().expect("checked non-empty");
            let value = {
                let mut binding = lock_cell(&cell);
                binding.closed = true;
                binding.value.clone()
            };
            if !value.is_truthy() {
                continue;
            }
            let error_arg = pending
                .as_ref()
                .map(|e| e.value.clone())
                .unwrap_or(LuaValue::Nil);
            pending = self.close_one(&name, value, error_arg, pending);
        }
        pending
    }

    fn close_one(
        &mut self,
        name: &str,
        value: LuaValue,
        error_arg: LuaValue,
        pending: Option<LuaError>,
    ) -> Option<LuaError> {
        let outcome = match self.get_metamethod(&value, "__close") {
            Some(handler) => self.call_value(handler, vec![value, error_arg]).map(|_| ()),
            None => Err(self.error(format!("variable '{}' got a non-closable value", name))),
        };
        match (outcome, pending) {
            (Ok(()), pending) => pending,
            // A __close error surfaces unless an error is already in flight;
            // then it chains as a note instead of masking it.
            (Err(close_err), None) => Some(close_err),
            (Err(close_err), Some(mut pending)) => {
                pending.push_frame(format!(
                    "\terror closing variable '{}': {}",
                    name,
                    close_err.message()
                ));
                Some(pending)
            }
        }
    }

    fn exec_stmt(
        &mut self,
        stat: &Stat,
        scope: &Arc<Scope>,
        ctx: &mut BlockCtx,
        idx: usize,
    ) -> LuaResult<Flow> {
        match stat {
            Stat::Local {
                names,
                values,
                line,
            } => {
                self.set_line(*line);
                let values = self.eval_expr_list_n(values, scope, names.len())?;
                for ((name, attrib), value) in names.iter().zip(values) {
                    if *attrib == Attrib::Close
                        && value.is_truthy()
                        && self.get_metamethod(&value, "__close").is_none()
                    {
                        return Err(self.error(format!(
                            "variable '{}' got a non-closable value",
                            name
                        )));
                    }
                    let previous = scope.get_own(name);
                    let cell = scope.declare(name.clone(), value, *attrib);
                    ctx.declared.push((idx, name.clone(), previous));
                    if *attrib == Attrib::Close {
                        ctx.tbc.push((idx, name.clone(), cell));
                    }
                }
                Ok(Flow::Normal)
            }
            Stat::LocalFunction { name, body } => {
                // The name is visible inside the body (self-recursion)
                let previous = scope.get_own(name);
                let cell = scope.declare(name.clone(), LuaValue::Nil, Attrib::None);
                ctx.declared.push((idx, name.clone(), previous));
                let closure = LuaValue::Function(Arc::new(LuaClosure {
                    def: body.clone(),
                    captured: scope.clone(),
                }));
                lock_cell(&cell).value = closure;
                Ok(Flow::Normal)
            }
            Stat::Assign {
                targets,
                values,
                line,
            } => {
                self.set_line(*line);
                // Target prefixes evaluate before the right-hand side
                let mut prepared = Vec::with_capacity(targets.len());
                for target in targets {
                    prepared.push(self.prepare_target(target, scope)?);
                }
                let values = self.eval_expr_list_n(values, scope, targets.len())?;
                self.set_line(*line);
                for (target, value) in prepared.into_iter().zip(values) {
                    match target {
                        Target::Cell(cell, name) => {
                            let mut binding = lock_cell(&cell);
                            if binding.attrib != Attrib::None {
                                drop(binding);
                                return Err(self.error(format!(
                                    "attempt to assign to const variable '{}'",
                                    name
                                )));
                            }
                            if binding.closed {
                                drop(binding);
                                return Err(self.error(format!(
                                    "attempt to use a closed variable '{}'",
                                    name
                                )));
                            }
                            binding.value = value;
                        }
                        Target::Index(obj, key) => {
                            self.setindex_value(&obj, key, value)?;
                        }
                    }
                }
                Ok(Flow::Normal)
            }
            Stat::Call(expr) => {
                self.eval_multi_expr(expr, scope)?;
                Ok(Flow::Normal)
            }
            Stat::Label(_) => Ok(Flow::Normal),
            Stat::Goto { label, line } => {
                self.set_line(*line);
                Ok(Flow::Goto(label.clone()))
            }
            Stat::Break { line } => {
                self.set_line(*line);
                Ok(Flow::Break)
            }
            Stat::Do(body) => {
                let inner = Scope::block(scope);
                self.exec_block(body, &inner)
            }
            Stat::While { cond, body } => {
                loop {
                    if !self.eval_expr(cond, scope)?.is_truthy() {
                        break;
                    }
                    let inner = Scope::block(scope);
                    match self.exec_block(body, &inner)? {
                        Flow::Normal => {}
                        Flow::Break => break,
                        other => return Ok(other),
                    }
                    self.check_interrupt()?;
                }
                Ok(Flow::Normal)
            }
            Stat::Repeat { body, cond } => self.exec_repeat(body, cond, scope),
            Stat::If { arms, else_body } => {
                for (cond, body) in arms {
                    if self.eval_expr(cond, scope)?.is_truthy() {
                        let inner = Scope::block(scope);
                        return self.exec_block(body, &inner);
                    }
                }
                if let Some(body) = else_body {
                    let inner = Scope::block(scope);
                    return self.exec_block(body, &inner);
                }
                Ok(Flow::Normal)
            }
            Stat::NumericFor {
                var,
                start,
                stop,
                step,
                body,
                line,
            } => {
                self.set_line(*line);
                self.exec_numeric_for(var, start, stop, step.as_ref(), body, scope)
            }
            Stat::GenericFor {
                names,
                exprs,
                body,
                line,
            } => {
                self.set_line(*line);
                self.exec_generic_for(names, exprs, body, scope)
            }
            Stat::Return { exprs, line } => {
                self.set_line(*line);
                let values = self.eval_expr_list(exprs, scope)?;
                Ok(Flow::Return(values))
            }
        }
    }

    fn prepare_target(&mut self, target: &Expr, scope: &Arc<Scope>) -> LuaResult<Target> {
        match target {
            Expr::Name { name, line } => match scope.lookup(name) {
                Some(cell) => Ok(Target::Cell(cell, name.clone())),
                None => {
                    let env = self.env_value(scope, *line)?;
                    let key = self.alloc_str(name.as_str())?;
                    Ok(Target::Index(env, key))
                }
            },
            Expr::Index { obj, key, line } => {
                let obj = self.eval_expr(obj, scope)?;
                let key = self.eval_expr(key, scope)?;
                self.set_line(*line);
                Ok(Target::Index(obj, key))
            }
            _ => Err(LuaError::internal("invalid assignment target")),
        }
    }

    /// repeat/until: the condition is evaluated in the body scope, and
    /// to-be-closed bindings close only after it.
    fn exec_repeat(&mut self, body: &Block, cond: &Expr, scope: &Arc<Scope>) -> LuaResult<Flow> {
        loop {
            let inner = Scope::block(scope);
            let mut ctx = BlockCtx::default();
            match self.run_block(body, &inner, &mut ctx) {
                Ok(Flow::Normal) => match self.eval_expr(cond, &inner) {
                    Ok(value) => {
                        if let Some(err) = self.unwind_tbc(&mut ctx.tbc, 0, None) {
                            return Err(err);
                        }
                        if value.is_truthy() {
                            return Ok(Flow::Normal);
                        }
                    }
                    Err(err) => {
                        return Err(self
                            .unwind_tbc(&mut ctx.tbc, 0, Some(err))
                            .unwrap_or_else(|| LuaError::internal("lost repeat error")));
                    }
                },
                Ok(Flow::Break) => {
                    if let Some(err) = self.unwind_tbc(&mut ctx.tbc, 0, None) {
                        return Err(err);
                    }
                    return Ok(Flow::Normal);
                }
                Ok(other) => {
                    if let Some(err) = self.unwind_tbc(&mut ctx.tbc, 0, None) {
                        return Err(err);
                    }
                    return Ok(other);
                }
                Err(err) => {
                    return Err(self
                        .unwind_tbc(&mut ctx.tbc, 0, Some(err))
                        .unwrap_or_else(|| LuaError::internal("lost repeat error")));
                }
            }
            self.check_interrupt()?;
        }
    }

    fn exec_numeric_for(
        &mut self,
        var: &Name,
        start: &Expr,
        stop: &Expr,
        step: Option<&Expr>,
        body: &Block,
        scope: &Arc<Scope>,
    ) -> LuaResult<Flow> {
        let start = self.for_number(start, scope, "initial")?;
        let stop = self.for_number(stop, scope, "limit")?;
        let step = match step {
            Some(expr) => self.for_number(expr, scope, "step")?,
            None => LuaValue::Integer(1),
        };

        match (&start, &stop, &step) {
            (LuaValue::Integer(i0), LuaValue::Integer(limit), LuaValue::Integer(st)) => {
                let (mut i, limit, st) = (*i0, *limit, *st);
                if st == 0 {
                    return Err(self.error("'for' step is zero"));
                }
                if (st > 0 && i > limit) || (st < 0 && i < limit) {
                    return Ok(Flow::Normal);
                }
                loop {
                    let inner = Scope::block(scope);
                    inner.declare(var.clone(), LuaValue::Integer(i), Attrib::None);
                    match self.exec_block(body, &inner)? {
                        Flow::Normal => {}
                        Flow::Break => return Ok(Flow::Normal),
                        other => return Ok(other),
                    }
                    self.check_interrupt()?;
                    // Overflow of the control variable terminates
                    match i.checked_add(st) {
                        Some(next) if (st > 0 && next <= limit) || (st < 0 && next >= limit) => {
                            i = next;
                        }
                        _ => return Ok(Flow::Normal),
                    }
                }
            }
            _ => {
                let mut i = start.as_number().unwrap_or(f64::NAN);
                let limit = stop.as_number().unwrap_or(f64::NAN);
                let st = step.as_number().unwrap_or(f64::NAN);
                if st == 0.0 {
                    return Err(self.error("'for' step is zero"));
                }
                while (st > 0.0 && i <= limit) || (st < 0.0 && i >= limit) {
                    let inner = Scope::block(scope);
                    inner.declare(var.clone(), LuaValue::Float(i), Attrib::None);
                    match self.exec_block(body, &inner)? {
                        Flow::Normal => {}
                        Flow::Break => return Ok(Flow::Normal),
                        other => return Ok(other),
                    }
                    self.check_interrupt()?;
                    i += st;
                }
                Ok(Flow::Normal)
            }
        }
    }

    fn for_number(
        &mut self,
        expr: &Expr,
        scope: &Arc<Scope>,
        what: &str,
    ) -> LuaResult<LuaValue> {
        let value = self.eval_expr(expr, scope)?;
        match value {
            LuaValue::Integer(_) | LuaValue::Float(_) => Ok(value),
            other => Err(self.error(format!(
                "'for' {} value must be a number (got {})",
                what,
                other.type_name()
            ))),
        }
    }

    fn exec_generic_for(
        &mut self,
        names: &[Name],
        exprs: &[Expr],
        body: &Block,
        scope: &Arc<Scope>,
    ) -> LuaResult<Flow> {
        // Iterator list adjusts to exactly four values: function,
        // invariant state, control variable, to-be-closed value.
        let mut iter = self.eval_expr_list_n(exprs, scope, 4)?;
        let closing = iter.pop().expect("adjusted to 4");
        let control = iter.pop().expect("adjusted to 4");
        let state = iter.pop().expect("adjusted to 4");
        let func = iter.pop().expect("adjusted to 4");

        if closing.is_truthy() && self.get_metamethod(&closing, "__close").is_none() {
            return Err(self.error("variable '(for state)' got a non-closable value"));
        }

        let result = self.generic_for_loop(names, func, state, control, body, scope);

        // The fourth value closes when the loop exits, however it exits
        match result {
            Ok(flow) => {
                if closing.is_truthy() {
                    if let Some(err) = self.close_one("(for state)", closing, LuaValue::Nil, None)
                    {
                        return Err(err);
                    }
                }
                Ok(flow)
            }
            Err(err) => {
                if closing.is_truthy() {
                    let error_arg = err.value.clone();
                    return Err(self
                        .close_one("(for state)", closing, error_arg, Some(err))
                        .unwrap_or_else(|| LuaError::internal("lost loop error")));
                }
                Err(err)
            }
        }
    }

    fn generic_for_loop(
        &mut self,
        names: &[Name],
        func: LuaValue,
        state: LuaValue,
        mut control: LuaValue,
        body: &Block,
        scope: &Arc<Scope>,
    ) -> LuaResult<Flow> {
        loop {
            let results =
                self.call_value(func.clone(), vec![state.clone(), control.clone()])?;
            let first = results.first().cloned().unwrap_or(LuaValue::Nil);
            if first.is_nil() {
                return Ok(Flow::Normal);
            }
            control = first;

            let inner = Scope::block(scope);
            for (i, name) in names.iter().enumerate() {
                inner.declare(
                    name.clone(),
                    results.get(i).cloned().unwrap_or(LuaValue::Nil),
                    Attrib::None,
                );
            }
            match self.exec_block(body, &inner)? {
                Flow::Normal => {}
                Flow::Break => return Ok(Flow::Normal),
                other => return Ok(other),
            }
            self.check_interrupt()?;
        }
    }
}

fn find_label(block: &Block, label: &str) -> Option<usize> {
    block
        .stats
        .iter()
        .position(|s| matches!(s, Stat::Label(name) if name == label))
}
