// Lua 5.4 value representation
// A clone-cheap tagged enum; reference types are Arc handles so values
// can cross coroutine threads (exactly one thread runs at a time).

use std::fmt;
use std::sync::Arc;

use smol_str::SmolStr;

use crate::compiler::ast::FuncBody;
use crate::lua_interp::coroutine::Coroutine;
use crate::lua_interp::scope::Scope;
use crate::lua_interp::{LuaResult, LuaState};
use crate::lua_value::lua_string::LuaStr;
use crate::lua_value::lua_table::LuaTableRef;
use crate::lua_value::lua_userdata::LuaUserdata;
use crate::lua_value::number;

/// Plain native function, the common case for library entries.
pub type NativeFn = fn(&mut LuaState, &[LuaValue]) -> LuaResult<Vec<LuaValue>>;

/// Boxed native callable for stateful functions (iterators, host bindings).
pub type BoxedNativeFn =
    Arc<dyn Fn(&mut LuaState, &[LuaValue]) -> LuaResult<Vec<LuaValue>> + Send + Sync>;

pub enum NativeImpl {
    Static(NativeFn),
    Boxed(BoxedNativeFn),
}

/// A host-side function exposed to Lua: takes a value slice, returns a
/// value slice. Carries an optional name for diagnostics.
pub struct NativeFunction {
    pub name: Option<SmolStr>,
    imp: NativeImpl,
}

impl NativeFunction {
    pub fn new(name: &str, func: NativeFn) -> Self {
        NativeFunction {
            name: Some(SmolStr::new(name)),
            imp: NativeImpl::Static(func),
        }
    }

    pub fn from_closure<F>(name: &str, func: F) -> Self
    where
        F: Fn(&mut LuaState, &[LuaValue]) -> LuaResult<Vec<LuaValue>> + Send + Sync + 'static,
    {
        NativeFunction {
            name: Some(SmolStr::new(name)),
            imp: NativeImpl::Boxed(Arc::new(func)),
        }
    }

    pub fn call(&self, l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
        match &self.imp {
            NativeImpl::Static(f) => f(l, args),
            NativeImpl::Boxed(f) => f(l, args),
        }
    }
}

/// A Lua function: its definition plus the scope it closed over.
pub struct LuaClosure {
    pub def: Arc<FuncBody>,
    pub captured: Arc<Scope>,
}

impl LuaClosure {
    pub fn name(&self) -> &str {
        self.def.name.as_deref().unwrap_or("?")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LuaValueKind {
    Nil,
    Boolean,
    Integer,
    Float,
    String,
    Table,
    Function,
    Userdata,
    Thread,
}

#[derive(Clone, Default)]
pub enum LuaValue {
    #[default]
    Nil,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Str(Arc<LuaStr>),
    Table(LuaTableRef),
    Function(Arc<LuaClosure>),
    Native(Arc<NativeFunction>),
    Userdata(Arc<LuaUserdata>),
    Coroutine(Arc<Coroutine>),
}

impl LuaValue {
    // ===== constructors =====

    pub fn nil() -> Self {
        LuaValue::Nil
    }

    pub fn boolean(b: bool) -> Self {
        LuaValue::Boolean(b)
    }

    pub fn integer(i: i64) -> Self {
        LuaValue::Integer(i)
    }

    pub fn float(f: f64) -> Self {
        LuaValue::Float(f)
    }

    pub fn str(s: &str) -> Self {
        LuaValue::Str(Arc::new(LuaStr::from_str(s)))
    }

    pub fn string_owned(s: String) -> Self {
        LuaValue::Str(Arc::new(LuaStr::from_bytes(s.into_bytes())))
    }

    pub fn bytes(b: impl Into<Box<[u8]>>) -> Self {
        LuaValue::Str(Arc::new(LuaStr::from_bytes(b)))
    }

    pub fn native(name: &str, f: NativeFn) -> Self {
        LuaValue::Native(Arc::new(NativeFunction::new(name, f)))
    }

    // ===== type checks =====

    pub fn kind(&self) -> LuaValueKind {
        match self {
            LuaValue::Nil => LuaValueKind::Nil,
            LuaValue::Boolean(_) => LuaValueKind::Boolean,
            LuaValue::Integer(_) => LuaValueKind::Integer,
            LuaValue::Float(_) => LuaValueKind::Float,
            LuaValue::Str(_) => LuaValueKind::String,
            LuaValue::Table(_) => LuaValueKind::Table,
            LuaValue::Function(_) | LuaValue::Native(_) => LuaValueKind::Function,
            LuaValue::Userdata(_) => LuaValueKind::Userdata,
            LuaValue::Coroutine(_) => LuaValueKind::Thread,
        }
    }

    /// The name `type()` reports.
    pub fn type_name(&self) -> &'static str {
        match self.kind() {
            LuaValueKind::Nil => "nil",
            LuaValueKind::Boolean => "boolean",
            LuaValueKind::Integer | LuaValueKind::Float => "number",
            LuaValueKind::String => "string",
            LuaValueKind::Table => "table",
            LuaValueKind::Function => "function",
            LuaValueKind::Userdata => "userdata",
            LuaValueKind::Thread => "thread",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, LuaValue::Nil)
    }

    pub fn is_function(&self) -> bool {
        matches!(self, LuaValue::Function(_) | LuaValue::Native(_))
    }

    pub fn is_table(&self) -> bool {
        matches!(self, LuaValue::Table(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, LuaValue::Str(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, LuaValue::Integer(_) | LuaValue::Float(_))
    }

    /// Everything except nil and false.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, LuaValue::Nil | LuaValue::Boolean(false))
    }

    // ===== accessors =====

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            LuaValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer payload; floats with an exact integer value qualify.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            LuaValue::Integer(i) => Some(*i),
            LuaValue::Float(f) => number::float_to_integer(*f),
            _ => None,
        }
    }

    /// Numeric value as a float; does not coerce strings.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            LuaValue::Integer(i) => Some(*i as f64),
            LuaValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_lua_str(&self) -> Option<&Arc<LuaStr>> {
        match self {
            LuaValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            LuaValue::Str(s) => s.as_str(),
            _ => None,
        }
    }

    /// Owned text form of a string value (lossy for non-UTF-8 bytes).
    pub fn as_string(&self) -> Option<String> {
        match self {
            LuaValue::Str(s) => Some(s.display().into_owned()),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&LuaTableRef> {
        match self {
            LuaValue::Table(t) => Some(t),
            _ => None,
        }
    }

    // ===== identity =====

    /// Raw (metamethod-free) equality per Lua `rawequal`.
    pub fn raw_equals(&self, other: &LuaValue) -> bool {
        match (self, other) {
            (LuaValue::Nil, LuaValue::Nil) => true,
            (LuaValue::Boolean(a), LuaValue::Boolean(b)) => a == b,
            (LuaValue::Integer(a), LuaValue::Integer(b)) => a == b,
            (LuaValue::Float(a), LuaValue::Float(b)) => a == b,
            (LuaValue::Integer(a), LuaValue::Float(b))
            | (LuaValue::Float(b), LuaValue::Integer(a)) => number::int_eq_float(*a, *b),
            (LuaValue::Str(a), LuaValue::Str(b)) => a == b,
            (LuaValue::Table(a), LuaValue::Table(b)) => a.ptr_eq(b),
            (LuaValue::Function(a), LuaValue::Function(b)) => Arc::ptr_eq(a, b),
            (LuaValue::Native(a), LuaValue::Native(b)) => Arc::ptr_eq(a, b),
            (LuaValue::Userdata(a), LuaValue::Userdata(b)) => Arc::ptr_eq(a, b),
            (LuaValue::Coroutine(a), LuaValue::Coroutine(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Stable address used for `tostring` of reference values.
    pub fn ref_addr(&self) -> Option<usize> {
        match self {
            LuaValue::Table(t) => Some(t.ptr_id()),
            LuaValue::Function(f) => Some(Arc::as_ptr(f) as usize),
            LuaValue::Native(f) => Some(Arc::as_ptr(f) as usize),
            LuaValue::Userdata(u) => Some(Arc::as_ptr(u) as usize),
            LuaValue::Coroutine(c) => Some(Arc::as_ptr(c) as usize),
            _ => None,
        }
    }

    /// Default textual form, before `__tostring` is considered.
    pub fn to_display_string(&self) -> String {
        match self {
            LuaValue::Nil => "nil".to_string(),
            LuaValue::Boolean(b) => b.to_string(),
            LuaValue::Integer(i) => {
                let mut buffer = itoa::Buffer::new();
                buffer.format(*i).to_string()
            }
            LuaValue::Float(f) => number::float_to_display(*f),
            LuaValue::Str(s) => s.display().into_owned(),
            LuaValue::Table(t) => format!("table: {:#x}", t.ptr_id()),
            LuaValue::Function(f) => format!("function: {:#x}", Arc::as_ptr(f) as usize),
            LuaValue::Native(f) => format!("function: builtin: {:#x}", Arc::as_ptr(f) as usize),
            LuaValue::Userdata(u) => format!("userdata: {:#x}", Arc::as_ptr(u) as usize),
            LuaValue::Coroutine(c) => format!("thread: {:#x}", Arc::as_ptr(c) as usize),
        }
    }
}

/// Structural equality is raw equality (no metamethods); reference
/// types compare by identity.
impl PartialEq for LuaValue {
    fn eq(&self, other: &Self) -> bool {
        self.raw_equals(other)
    }
}

impl fmt::Debug for LuaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LuaValue::Str(s) => write!(f, "{:?}", s),
            other => write!(f, "{}", other.to_display_string()),
        }
    }
}

impl From<bool> for LuaValue {
    fn from(b: bool) -> Self {
        LuaValue::Boolean(b)
    }
}

impl From<i64> for LuaValue {
    fn from(i: i64) -> Self {
        LuaValue::Integer(i)
    }
}

impl From<f64> for LuaValue {
    fn from(f: f64) -> Self {
        LuaValue::Float(f)
    }
}

impl From<&str> for LuaValue {
    fn from(s: &str) -> Self {
        LuaValue::str(s)
    }
}

impl From<String> for LuaValue {
    fn from(s: String) -> Self {
        LuaValue::string_owned(s)
    }
}
