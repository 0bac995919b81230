// Call machinery
// Argument adjustment, frame bookkeeping, the `__call` chain, and the
// depth guard live here.

use std::sync::Arc;

use crate::lua_interp::eval_stmt::Flow;
use crate::lua_interp::scope::Scope;
use crate::lua_interp::{Frame, LuaError, LuaResult, LuaState, MAX_CALL_DEPTH, MAX_META_CHAIN};
use crate::lua_value::{LuaClosure, LuaValue};

impl LuaState {
    /// Call any callable value with the given arguments.
    pub fn call_value(
        &mut self,
        callee: LuaValue,
        args: Vec<LuaValue>,
    ) -> LuaResult<Vec<LuaValue>> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(self.error("stack overflow"));
        }

        let mut callee = callee;
        let mut args = args;
        for _ in 0..MAX_META_CHAIN {
            match callee {
                LuaValue::Function(closure) => return self.call_closure(&closure, args),
                LuaValue::Native(native) => {
                    self.frames.push(Frame {
                        name: format!(
                            "function '{}'",
                            native.name.as_deref().unwrap_or("?")
                        ),
                        chunk: Arc::from("[C]"),
                        line: 0,
                    });
                    self.depth += 1;
                    let result = native.call(self, &args);
                    self.depth -= 1;
                    let frame = self.frames.pop();
                    return result.map_err(|mut e| {
                        if let Some(frame) = frame {
                            e.push_frame(format!("\t[C]: in {}", frame.name));
                        }
                        e
                    });
                }
                other => match self.get_metamethod(&other, "__call") {
                    Some(handler) => {
                        let mut new_args = Vec::with_capacity(args.len() + 1);
                        new_args.push(other);
                        new_args.append(&mut args);
                        args = new_args;
                        callee = handler;
                    }
                    None => {
                        return Err(self.error(format!(
                            "attempt to call a {} value",
                            other.type_name()
                        )));
                    }
                },
            }
        }
        Err(self.error("'__call' chain too long; possible loop"))
    }

    pub(crate) fn call_closure(
        &mut self,
        closure: &LuaClosure,
        mut args: Vec<LuaValue>,
    ) -> LuaResult<Vec<LuaValue>> {
        let def = &closure.def;

        // Fixed parameters take the leading arguments, the vararg slot
        // takes the rest.
        let nparams = def.params.len();
        let varargs = if def.is_vararg && args.len() > nparams {
            args.split_off(nparams)
        } else {
            Vec::new()
        };
        args.resize(nparams, LuaValue::Nil);

        let scope = Scope::function(&closure.captured, varargs);
        for (param, value) in def.params.iter().zip(args) {
            scope.declare(param.clone(), value, crate::compiler::ast::Attrib::None);
        }

        self.frames.push(Frame {
            name: match &def.name {
                Some(name) => format!("function '{}'", name),
                None => format!("function <{}:{}>", def.chunk, def.line),
            },
            chunk: def.chunk.clone(),
            line: def.line,
        });
        self.depth += 1;
        let result = self.exec_block(&def.body, &scope);
        self.depth -= 1;
        let frame = self.frames.pop();

        let flow = result.map_err(|mut e| {
            if let Some(frame) = &frame {
                e.push_frame(format!("\t{}:{}: in {}", frame.chunk, frame.line, frame.name));
            }
            e
        })?;

        match flow {
            Flow::Return(values) => Ok(values),
            Flow::Normal => Ok(Vec::new()),
            Flow::Goto(label) => {
                Err(self.error(format!("no visible label '{}' for goto", label)))
            }
            Flow::Break => Err(LuaError::internal("break escaped a function body")),
        }
    }
}
