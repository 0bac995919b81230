// Runtime error representation
// An error value may be any Lua value (per `error(v)`); the kind decides
// whether protected calls may catch it, and the traceback accumulates as
// frames unwind.

use crate::lua_value::LuaValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LuaErrorKind {
    /// Ordinary runtime error; catchable by pcall/xpcall.
    Runtime,
    /// Load-time failure surfaced through `load`/`require`.
    Syntax,
    /// Operation forbidden by the active trust level.
    Security,
    /// Module resolution failure.
    Module,
    /// A host function reported a failure.
    Host,
    /// Cooperative cancellation; unwinds through protected calls.
    Cancelled,
    /// Execution timeout; unwinds through protected calls.
    Timeout,
    /// Interpreter invariant failure.
    Internal,
}

#[derive(Debug, Clone)]
pub struct LuaError {
    pub kind: LuaErrorKind,
    pub value: LuaValue,
    pub traceback: Vec<String>,
}

pub type LuaResult<T> = Result<T, LuaError>;

impl LuaError {
    pub fn new(kind: LuaErrorKind, message: impl Into<String>) -> Self {
        LuaError {
            kind,
            value: LuaValue::string_owned(message.into()),
            traceback: Vec::new(),
        }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(LuaErrorKind::Runtime, message)
    }

    pub fn security(message: impl Into<String>) -> Self {
        Self::new(LuaErrorKind::Security, message)
    }

    pub fn module(message: impl Into<String>) -> Self {
        Self::new(LuaErrorKind::Module, message)
    }

    pub fn host(message: impl Into<String>) -> Self {
        Self::new(LuaErrorKind::Host, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(LuaErrorKind::Internal, message)
    }

    /// Error carrying an arbitrary Lua value (the `error(v)` path).
    pub fn with_value(value: LuaValue) -> Self {
        LuaError {
            kind: LuaErrorKind::Runtime,
            value,
            traceback: Vec::new(),
        }
    }

    /// Whether pcall/xpcall may observe this error.
    pub fn is_catchable(&self) -> bool {
        matches!(
            self.kind,
            LuaErrorKind::Runtime
                | LuaErrorKind::Syntax
                | LuaErrorKind::Security
                | LuaErrorKind::Module
                | LuaErrorKind::Host
        )
    }

    /// Message form of the error value.
    pub fn message(&self) -> String {
        self.value.to_display_string()
    }

    pub fn push_frame(&mut self, entry: String) {
        // Bound the traceback; deep recursion is reported elsewhere
        if self.traceback.len() < 64 {
            self.traceback.push(entry);
        }
    }

    pub fn with_note(mut self, note: String) -> Self {
        self.traceback.push(note);
        self
    }
}

impl std::fmt::Display for LuaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())?;
        if !self.traceback.is_empty() {
            write!(f, "\nstack traceback:")?;
            for entry in &self.traceback {
                write!(f, "\n{}", entry)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for LuaError {}
