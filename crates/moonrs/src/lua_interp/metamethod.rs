// Metamethod dispatch
// Every operation that can trap on a non-primitive operand goes through
// here; chains (`__index` tables, `__call` callables) are bounded to
// avoid unbounded loops.

use crate::lua_interp::{LuaResult, LuaState, MAX_META_CHAIN};
use crate::lua_value::number::{self, NumOp};
use crate::lua_value::{LuaValue, LuaValueKind};

impl LuaState {
    /// The metatable of a value: tables and userdata carry their own,
    /// strings share the runtime-wide string metatable.
    pub fn get_metatable(&self, value: &LuaValue) -> Option<LuaValue> {
        match value {
            LuaValue::Table(t) => t.lock().metatable(),
            LuaValue::Userdata(u) => u.metatable(),
            LuaValue::Str(_) => {
                let mt = self.rt.string_metatable();
                if mt.is_nil() { None } else { Some(mt) }
            }
            _ => None,
        }
    }

    /// Raw lookup of a metamethod by event name.
    pub fn get_metamethod(&self, value: &LuaValue, event: &str) -> Option<LuaValue> {
        let mt = self.get_metatable(value)?;
        let table = mt.as_table()?;
        let method = table.lock().get_str(event);
        if method.is_nil() { None } else { Some(method) }
    }

    // ===== indexing =====

    /// `t[k]` with `__index` chains.
    pub fn index_value(&mut self, obj: &LuaValue, key: &LuaValue) -> LuaResult<LuaValue> {
        let mut current = obj.clone();
        for _ in 0..MAX_META_CHAIN {
            if let LuaValue::Table(t) = &current {
                let raw = t.lock().raw_get(key);
                if !raw.is_nil() {
                    return Ok(raw);
                }
                match self.get_metamethod(&current, "__index") {
                    None => return Ok(LuaValue::Nil),
                    Some(handler) if handler.is_function() => {
                        let results =
                            self.call_value(handler, vec![current.clone(), key.clone()])?;
                        return Ok(results.into_iter().next().unwrap_or(LuaValue::Nil));
                    }
                    Some(next) => current = next,
                }
            } else {
                match self.get_metamethod(&current, "__index") {
                    None => {
                        return Err(self.error(format!(
                            "attempt to index a {} value",
                            current.type_name()
                        )));
                    }
                    Some(handler) if handler.is_function() => {
                        let results =
                            self.call_value(handler, vec![current.clone(), key.clone()])?;
                        return Ok(results.into_iter().next().unwrap_or(LuaValue::Nil));
                    }
                    Some(next) => current = next,
                }
            }
        }
        Err(self.error("'__index' chain too long; possible loop"))
    }

    /// `t[k] = v` with `__newindex` chains.
    pub fn setindex_value(
        &mut self,
        obj: &LuaValue,
        key: LuaValue,
        value: LuaValue,
    ) -> LuaResult<()> {
        let mut current = obj.clone();
        for _ in 0..MAX_META_CHAIN {
            if let LuaValue::Table(t) = &current {
                let has_slot = !t.lock().raw_get(&key).is_nil();
                if has_slot {
                    t.lock()
                        .raw_set(key, value)
                        .map_err(|msg| self.error(msg))?;
                    return Ok(());
                }
                match self.get_metamethod(&current, "__newindex") {
                    None => {
                        t.lock()
                            .raw_set(key, value)
                            .map_err(|msg| self.error(msg))?;
                        return Ok(());
                    }
                    Some(handler) if handler.is_function() => {
                        self.call_value(handler, vec![current.clone(), key, value])?;
                        return Ok(());
                    }
                    Some(next) => current = next,
                }
            } else {
                match self.get_metamethod(&current, "__newindex") {
                    None => {
                        return Err(self.error(format!(
                            "attempt to index a {} value",
                            current.type_name()
                        )));
                    }
                    Some(handler) if handler.is_function() => {
                        self.call_value(handler, vec![current.clone(), key, value])?;
                        return Ok(());
                    }
                    Some(next) => current = next,
                }
            }
        }
        Err(self.error("'__newindex' chain too long; possible loop"))
    }

    // ===== arithmetic =====

    /// Arithmetic/bitwise with numeric fast path and metamethod fallback.
    pub fn arith_value(&mut self, op: NumOp, a: &LuaValue, b: &LuaValue) -> LuaResult<LuaValue> {
        match number::arith(op, a, b) {
            Ok(Some(v)) => Ok(v),
            Err(msg) => Err(self.error(msg)),
            Ok(None) => {
                let event = op.metamethod();
                if let Some(handler) = self
                    .get_metamethod(a, event)
                    .or_else(|| self.get_metamethod(b, event))
                {
                    let results = self.call_value(handler, vec![a.clone(), b.clone()])?;
                    return Ok(results.into_iter().next().unwrap_or(LuaValue::Nil));
                }
                // Blame the operand that does not coerce
                let culprit = if number::coerce_number(a).is_none() { a } else { b };
                let what = if op.is_bitwise() {
                    "perform bitwise operation on"
                } else {
                    "perform arithmetic on"
                };
                Err(self.error(format!(
                    "attempt to {} a {} value",
                    what,
                    culprit.type_name()
                )))
            }
        }
    }

    // ===== equality and ordering =====

    /// `a == b` with `__eq` (only for two tables or two userdata).
    pub fn equals_value(&mut self, a: &LuaValue, b: &LuaValue) -> LuaResult<bool> {
        if a.raw_equals(b) {
            return Ok(true);
        }
        let comparable = matches!(
            (a.kind(), b.kind()),
            (LuaValueKind::Table, LuaValueKind::Table)
                | (LuaValueKind::Userdata, LuaValueKind::Userdata)
        );
        if comparable {
            if let Some(handler) = self
                .get_metamethod(a, "__eq")
                .or_else(|| self.get_metamethod(b, "__eq"))
            {
                let results = self.call_value(handler, vec![a.clone(), b.clone()])?;
                return Ok(results.first().map(|v| v.is_truthy()).unwrap_or(false));
            }
        }
        Ok(false)
    }

    pub fn less_than(&mut self, a: &LuaValue, b: &LuaValue) -> LuaResult<bool> {
        if let Some(result) = number::num_lt(a, b) {
            return Ok(result);
        }
        if let (LuaValue::Str(x), LuaValue::Str(y)) = (a, b) {
            return Ok(x < y);
        }
        self.order_metamethod("__lt", a, b)
    }

    pub fn less_equal(&mut self, a: &LuaValue, b: &LuaValue) -> LuaResult<bool> {
        if let Some(result) = number::num_le(a, b) {
            return Ok(result);
        }
        if let (LuaValue::Str(x), LuaValue::Str(y)) = (a, b) {
            return Ok(x <= y);
        }
        self.order_metamethod("__le", a, b)
    }

    fn order_metamethod(&mut self, event: &str, a: &LuaValue, b: &LuaValue) -> LuaResult<bool> {
        if let Some(handler) = self
            .get_metamethod(a, event)
            .or_else(|| self.get_metamethod(b, event))
        {
            let results = self.call_value(handler, vec![a.clone(), b.clone()])?;
            return Ok(results.first().map(|v| v.is_truthy()).unwrap_or(false));
        }
        Err(self.error(format!(
            "attempt to compare {} with {}",
            a.type_name(),
            b.type_name()
        )))
    }

    // ===== concatenation and length =====

    /// `a .. b`; strings and numbers fuse, anything else traps.
    pub fn concat_values(&mut self, a: &LuaValue, b: &LuaValue) -> LuaResult<LuaValue> {
        if concatenable(a) && concatenable(b) {
            let mut bytes = concat_bytes(a);
            bytes.extend_from_slice(&concat_bytes(b));
            return self.alloc_bytes(bytes);
        }
        if let Some(handler) = self
            .get_metamethod(a, "__concat")
            .or_else(|| self.get_metamethod(b, "__concat"))
        {
            let results = self.call_value(handler, vec![a.clone(), b.clone()])?;
            return Ok(results.into_iter().next().unwrap_or(LuaValue::Nil));
        }
        let culprit = if concatenable(a) { b } else { a };
        Err(self.error(format!(
            "attempt to concatenate a {} value",
            culprit.type_name()
        )))
    }

    /// `#v`: byte length for strings, `__len` or a border for tables.
    pub fn length_value(&mut self, value: &LuaValue) -> LuaResult<LuaValue> {
        match value {
            LuaValue::Str(s) => Ok(LuaValue::Integer(s.len() as i64)),
            LuaValue::Table(t) => {
                if let Some(handler) = self.get_metamethod(value, "__len") {
                    let results = self.call_value(handler, vec![value.clone()])?;
                    return Ok(results.into_iter().next().unwrap_or(LuaValue::Nil));
                }
                Ok(LuaValue::Integer(t.lock().length()))
            }
            other => {
                if let Some(handler) = self.get_metamethod(other, "__len") {
                    let results = self.call_value(handler, vec![other.clone()])?;
                    return Ok(results.into_iter().next().unwrap_or(LuaValue::Nil));
                }
                Err(self.error(format!(
                    "attempt to get length of a {} value",
                    other.type_name()
                )))
            }
        }
    }

    /// `tostring(v)`: `__tostring` first, then the default rendering.
    pub fn tostring_value(&mut self, value: &LuaValue) -> LuaResult<LuaValue> {
        if let Some(handler) = self.get_metamethod(value, "__tostring") {
            let results = self.call_value(handler, vec![value.clone()])?;
            let first = results.into_iter().next().unwrap_or(LuaValue::Nil);
            if !first.is_string() {
                return Err(self.error("'__tostring' must return a string"));
            }
            return Ok(first);
        }
        if let Some(mt) = self.get_metatable(value) {
            if let Some(t) = mt.as_table() {
                let name = t.lock().get_str("__name");
                if let Some(s) = name.as_str() {
                    return self.alloc_str(format!(
                        "{}: {:#x}",
                        s,
                        value.ref_addr().unwrap_or(0)
                    ));
                }
            }
        }
        self.alloc_str(value.to_display_string())
    }
}

fn concatenable(v: &LuaValue) -> bool {
    matches!(
        v,
        LuaValue::Str(_) | LuaValue::Integer(_) | LuaValue::Float(_)
    )
}

fn concat_bytes(v: &LuaValue) -> Vec<u8> {
    match v {
        LuaValue::Str(s) => s.as_bytes().to_vec(),
        LuaValue::Integer(i) => {
            let mut buffer = itoa::Buffer::new();
            buffer.format(*i).as_bytes().to_vec()
        }
        LuaValue::Float(f) => number::float_to_display(*f).into_bytes(),
        _ => Vec::new(),
    }
}
