// Lua table: hybrid container with an array part for the dense 1-based
// prefix and a hash part for everything else.
//
// The hash part keeps entries in insertion order with nil tombstones so
// `next` stays stable across deletions mid-traversal; lookups go through
// an ahash index. Integer-valued float keys normalize to integer keys.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ahash::AHashMap;

use crate::lua_value::lua_string::LuaStr;
use crate::lua_value::lua_value::LuaValue;
use crate::lua_value::number::float_to_integer;

/// Normalized table key. Nil and NaN are rejected before construction;
/// reference types key by identity (the value is kept alive inside).
#[derive(Clone)]
pub enum LuaKey {
    Integer(i64),
    Float(u64),
    Boolean(bool),
    Str(Arc<LuaStr>),
    Ref(usize, LuaValue),
}

impl LuaKey {
    /// Normalize a value into a key. `None` for nil and NaN.
    pub fn from_value(value: &LuaValue) -> Option<LuaKey> {
        match value {
            LuaValue::Nil => None,
            LuaValue::Boolean(b) => Some(LuaKey::Boolean(*b)),
            LuaValue::Integer(i) => Some(LuaKey::Integer(*i)),
            LuaValue::Float(f) => {
                if f.is_nan() {
                    None
                } else if let Some(i) = float_to_integer(*f) {
                    Some(LuaKey::Integer(i))
                } else {
                    Some(LuaKey::Float(f.to_bits()))
                }
            }
            LuaValue::Str(s) => Some(LuaKey::Str(s.clone())),
            other => other.ref_addr().map(|addr| LuaKey::Ref(addr, other.clone())),
        }
    }

    pub fn to_value(&self) -> LuaValue {
        match self {
            LuaKey::Integer(i) => LuaValue::Integer(*i),
            LuaKey::Float(bits) => LuaValue::Float(f64::from_bits(*bits)),
            LuaKey::Boolean(b) => LuaValue::Boolean(*b),
            LuaKey::Str(s) => LuaValue::Str(s.clone()),
            LuaKey::Ref(_, v) => v.clone(),
        }
    }
}

impl PartialEq for LuaKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (LuaKey::Integer(a), LuaKey::Integer(b)) => a == b,
            (LuaKey::Float(a), LuaKey::Float(b)) => a == b,
            (LuaKey::Boolean(a), LuaKey::Boolean(b)) => a == b,
            (LuaKey::Str(a), LuaKey::Str(b)) => a == b,
            (LuaKey::Ref(a, _), LuaKey::Ref(b, _)) => a == b,
            _ => false,
        }
    }
}

impl Eq for LuaKey {}

impl std::hash::Hash for LuaKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            LuaKey::Integer(i) => {
                state.write_u8(1);
                state.write_i64(*i);
            }
            LuaKey::Float(bits) => {
                state.write_u8(2);
                state.write_u64(*bits);
            }
            LuaKey::Boolean(b) => {
                state.write_u8(3);
                state.write_u8(*b as u8);
            }
            LuaKey::Str(s) => {
                state.write_u8(4);
                state.write_u64(s.cached_hash());
            }
            LuaKey::Ref(addr, _) => {
                state.write_u8(5);
                state.write_usize(*addr);
            }
        }
    }
}

#[derive(Default)]
pub struct LuaTable {
    /// Dense 1-based prefix: `array[i]` holds `t[i + 1]`.
    array: Vec<LuaValue>,
    /// Hash part in insertion order; removed entries become tombstones.
    entries: Vec<(LuaKey, LuaValue)>,
    index: AHashMap<LuaKey, usize>,
    metatable: Option<LuaValue>,
}

impl LuaTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(narray: usize, nhash: usize) -> Self {
        LuaTable {
            array: Vec::with_capacity(narray),
            entries: Vec::with_capacity(nhash),
            index: AHashMap::with_capacity(nhash),
            metatable: None,
        }
    }

    pub fn metatable(&self) -> Option<LuaValue> {
        self.metatable.clone()
    }

    pub fn set_metatable(&mut self, mt: Option<LuaValue>) {
        self.metatable = mt;
    }

    /// Raw read, no metamethods.
    pub fn raw_get(&self, key: &LuaValue) -> LuaValue {
        match LuaKey::from_value(key) {
            Some(key) => self.raw_get_key(&key),
            None => LuaValue::Nil,
        }
    }

    pub fn raw_get_key(&self, key: &LuaKey) -> LuaValue {
        if let LuaKey::Integer(i) = key {
            if let Some(v) = self.array_get(*i) {
                return v;
            }
        }
        match self.index.get(key) {
            Some(&slot) => self.entries[slot].1.clone(),
            None => LuaValue::Nil,
        }
    }

    pub fn get_int(&self, i: i64) -> LuaValue {
        self.raw_get_key(&LuaKey::Integer(i))
    }

    pub fn get_str(&self, name: &str) -> LuaValue {
        self.raw_get_key(&LuaKey::Str(Arc::new(LuaStr::from_str(name))))
    }

    fn array_get(&self, i: i64) -> Option<LuaValue> {
        if i >= 1 && (i as usize) <= self.array.len() {
            Some(self.array[i as usize - 1].clone())
        } else {
            None
        }
    }

    /// Raw store, no metamethods. Errors on nil/NaN keys.
    pub fn raw_set(&mut self, key: LuaValue, value: LuaValue) -> Result<(), &'static str> {
        let key = match LuaKey::from_value(&key) {
            Some(k) => k,
            None if key.is_nil() => return Err("table index is nil"),
            None => return Err("table index is NaN"),
        };
        self.raw_set_key(key, value);
        Ok(())
    }

    pub fn raw_set_key(&mut self, key: LuaKey, value: LuaValue) {
        if let LuaKey::Integer(i) = key {
            let i = i;
            if i >= 1 && (i as usize) <= self.array.len() {
                self.array[i as usize - 1] = value;
                return;
            }
            if i >= 1 && i as usize == self.array.len() + 1 && !value.is_nil() {
                self.array.push(value);
                self.migrate_from_hash();
                return;
            }
        }

        match self.index.get(&key) {
            Some(&slot) => {
                // Tombstone on nil keeps traversal positions stable
                self.entries[slot].1 = value;
            }
            None => {
                if !value.is_nil() {
                    let slot = self.entries.len();
                    self.entries.push((key.clone(), value));
                    self.index.insert(key, slot);
                }
            }
        }
    }

    pub fn set_int(&mut self, i: i64, value: LuaValue) {
        self.raw_set_key(LuaKey::Integer(i), value);
    }

    pub fn set_str(&mut self, name: &str, value: LuaValue) {
        self.raw_set_key(LuaKey::Str(Arc::new(LuaStr::from_str(name))), value);
    }

    /// Pull successors of a freshly extended array part out of the hash.
    fn migrate_from_hash(&mut self) {
        loop {
            let next = LuaKey::Integer(self.array.len() as i64 + 1);
            match self.index.remove(&next) {
                Some(slot) => {
                    let value = std::mem::take(&mut self.entries[slot].1);
                    if value.is_nil() {
                        break;
                    }
                    self.array.push(value);
                }
                None => break,
            }
        }
    }

    /// A border: some `n` with `t[n] ~= nil` and `t[n+1] == nil`.
    /// Prefers the end of the array part when that is a border.
    pub fn length(&self) -> i64 {
        let n = self.array.len();
        if n > 0 && !self.array[n - 1].is_nil() {
            // Array part full; rarely the hash continues the sequence
            let mut len = n as i64;
            while !self.raw_get_key(&LuaKey::Integer(len + 1)).is_nil() {
                len += 1;
            }
            return len;
        }
        if n == 0 {
            if self.raw_get_key(&LuaKey::Integer(1)).is_nil() {
                return 0;
            }
            // Unbound search through the hash part
            let mut i: i64 = 1;
            let mut j: i64 = 2;
            while !self.raw_get_key(&LuaKey::Integer(j)).is_nil() {
                i = j;
                if j > i64::MAX / 2 {
                    // Degenerate table; fall back to a linear scan
                    let mut n = 1;
                    while !self.raw_get_key(&LuaKey::Integer(n + 1)).is_nil() {
                        n += 1;
                    }
                    return n;
                }
                j *= 2;
            }
            // Binary search for the border in (i, j)
            while j - i > 1 {
                let m = (i + j) / 2;
                if self.raw_get_key(&LuaKey::Integer(m)).is_nil() {
                    j = m;
                } else {
                    i = m;
                }
            }
            return i;
        }
        // Trailing nil in the array part: binary search for a border
        let (mut lo, mut hi) = (0usize, n);
        while hi - lo > 1 {
            let m = (lo + hi) / 2;
            if self.array[m - 1].is_nil() {
                hi = m;
            } else {
                lo = m;
            }
        }
        lo as i64
    }

    /// Successor of `key` in traversal order, for `next`.
    pub fn next(&self, key: Option<&LuaKey>) -> Result<Option<(LuaValue, LuaValue)>, &'static str> {
        let start = match key {
            None => TraversalPos::Array(0),
            Some(LuaKey::Integer(i))
                if *i >= 1 && (*i as usize) <= self.array.len() =>
            {
                TraversalPos::Array(*i as usize)
            }
            Some(k) => match self.index.get(k) {
                Some(&slot) => TraversalPos::Hash(slot + 1),
                None => return Err("invalid key to 'next'"),
            },
        };

        if let TraversalPos::Array(from) = start {
            for (i, v) in self.array.iter().enumerate().skip(from) {
                if !v.is_nil() {
                    return Ok(Some((LuaValue::Integer(i as i64 + 1), v.clone())));
                }
            }
        }
        let from = match start {
            TraversalPos::Array(_) => 0,
            TraversalPos::Hash(slot) => slot,
        };
        for (key, value) in self.entries.iter().skip(from) {
            if !value.is_nil() {
                return Ok(Some((key.to_value(), value.clone())));
            }
        }
        Ok(None)
    }

    /// Number of live entries (debug/diagnostic use, not `#`).
    pub fn count(&self) -> usize {
        self.array.iter().filter(|v| !v.is_nil()).count()
            + self.entries.iter().filter(|(_, v)| !v.is_nil()).count()
    }
}

enum TraversalPos {
    Array(usize),
    Hash(usize),
}

/// Shared handle to a table. Locks are short-lived: a guard is never held
/// across re-entry into the interpreter.
#[derive(Clone)]
pub struct LuaTableRef(Arc<Mutex<LuaTable>>);

impl LuaTableRef {
    pub fn new(table: LuaTable) -> Self {
        LuaTableRef(Arc::new(Mutex::new(table)))
    }

    pub fn lock(&self) -> MutexGuard<'_, LuaTable> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn ptr_eq(&self, other: &LuaTableRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn ptr_id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_and_hash_parts() {
        let mut t = LuaTable::new();
        t.set_int(1, LuaValue::integer(10));
        t.set_int(2, LuaValue::integer(20));
        t.set_str("x", LuaValue::integer(99));
        assert_eq!(t.get_int(1).as_integer(), Some(10));
        assert_eq!(t.get_str("x").as_integer(), Some(99));
        assert_eq!(t.length(), 2);
    }

    #[test]
    fn float_keys_normalize() {
        let mut t = LuaTable::new();
        t.raw_set(LuaValue::float(1.0), LuaValue::str("one")).unwrap();
        assert_eq!(t.raw_get(&LuaValue::integer(1)).as_str(), Some("one"));
    }

    #[test]
    fn out_of_order_fill_migrates() {
        let mut t = LuaTable::new();
        t.set_int(3, LuaValue::integer(3));
        t.set_int(1, LuaValue::integer(1));
        t.set_int(2, LuaValue::integer(2));
        assert_eq!(t.length(), 3);
    }

    #[test]
    fn border_with_trailing_nil() {
        let mut t = LuaTable::new();
        t.set_int(1, LuaValue::integer(1));
        t.set_int(2, LuaValue::integer(2));
        t.set_int(3, LuaValue::integer(3));
        t.set_int(3, LuaValue::Nil);
        let n = t.length();
        assert!(!t.get_int(n).is_nil() || n == 0);
        assert!(t.get_int(n + 1).is_nil());
    }

    #[test]
    fn nil_and_nan_keys_rejected() {
        let mut t = LuaTable::new();
        assert!(t.raw_set(LuaValue::Nil, LuaValue::integer(1)).is_err());
        assert!(t.raw_set(LuaValue::float(f64::NAN), LuaValue::integer(1)).is_err());
    }

    #[test]
    fn next_traverses_everything() {
        let mut t = LuaTable::new();
        t.set_int(1, LuaValue::integer(10));
        t.set_str("k", LuaValue::integer(20));
        let mut seen = 0;
        let mut key: Option<LuaKey> = None;
        while let Some((k, _)) = t.next(key.as_ref()).unwrap() {
            key = LuaKey::from_value(&k);
            seen += 1;
        }
        assert_eq!(seen, 2);
    }
}
