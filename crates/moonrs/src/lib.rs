// Lua 5.4 Runtime
// A tree-walking Lua interpreter with a trust-scoped embedding host

#[cfg(test)]
mod test;

pub mod compiler;
pub mod diagnostics;
pub mod host;
pub mod lib_registry;
pub mod lua_interp;
pub mod lua_value;
pub mod stdlib;

pub use compiler::{Chunk, Compiler};
pub use diagnostics::{Diagnostic, DiagnosticCollector, Severity, SourceLocation};
pub use host::{
    CancelToken, CompiledChunk, FileSystemResolver, LuaHost, LuaHostOptions, ModuleResolver,
    SecurityPolicy, TrustLevel,
};
pub use lib_registry::LibraryRegistry;
pub use lua_interp::{LuaError, LuaErrorKind, LuaResult, LuaRuntime, LuaState};
pub use lua_value::{LuaStr, LuaTable, LuaValue};

/// Execute a chunk of Lua source at full trust and return its results.
///
/// Convenience entry point; embedders that need sandboxing, timeouts or
/// module resolution should go through [`LuaHost`].
pub fn execute(source: &str) -> LuaResult<Vec<LuaValue>> {
    let host = LuaHost::new(LuaHostOptions::full_trust());
    host.execute(source)
}

/// Parse a chunk and return its diagnostics without executing anything.
pub fn validate(source: &str) -> Vec<Diagnostic> {
    let host = LuaHost::new(LuaHostOptions::default());
    host.validate(source)
}
