// Host facade
// The embedding surface: execute, validate, compile-to-callable, async
// execution with cooperative cancellation, and the filtered-environment
// factory that applies the security policy structurally.

pub mod options;
pub mod resolver;
pub mod security;

pub use options::{CancelToken, CompileTarget, CompilerOptions, HostFunction, LuaHostOptions};
pub use resolver::{FileSystemResolver, ModuleResolver, ResolvedModule};
pub use security::{SecurityPolicy, TrustLevel};

use std::sync::Arc;
use std::time::Instant;

use crate::compiler::{Chunk, Compiler};
use crate::diagnostics::{Diagnostic, DiagnosticCollector};
use crate::lua_interp::{LuaError, LuaErrorKind, LuaResult, LuaRuntime, LuaState};
use crate::lua_value::number;
use crate::lua_value::{LuaValue, NativeFunction};
use crate::stdlib::create_standard_registry;

pub struct LuaHost {
    options: LuaHostOptions,
    policy: SecurityPolicy,
}

impl LuaHost {
    pub fn new(options: LuaHostOptions) -> Self {
        LuaHost {
            options,
            policy: SecurityPolicy,
        }
    }

    pub fn options(&self) -> &LuaHostOptions {
        &self.options
    }

    /// Execute a chunk under this host's options and return its results.
    pub fn execute(&self, source: &str) -> LuaResult<Vec<LuaValue>> {
        self.execute_with_token(source, None)
    }

    fn execute_with_token(
        &self,
        source: &str,
        token: Option<CancelToken>,
    ) -> LuaResult<Vec<LuaValue>> {
        let chunk = self.compile_chunk(source, "chunk")?;
        let mut state = self.build_state(self.options.trust)?;
        self.arm_limits(&state, token);
        let globals = state.globals();
        state.exec_chunk(&chunk, globals, Vec::new())
    }

    /// Parse only; never executes.
    pub fn validate(&self, source: &str) -> Vec<Diagnostic> {
        let collector = DiagnosticCollector::new();
        Compiler::compile_with(source, "chunk", &collector);
        collector.into_diagnostics()
    }

    /// Compile a chunk for repeated execution.
    pub fn compile(&self, source: &str) -> Result<CompiledChunk, Vec<Diagnostic>> {
        Compiler::compile(source, "chunk").map(|chunk| CompiledChunk { chunk })
    }

    /// Typed zero-parameter compilation: the chunk's first return value
    /// converted to `T`.
    pub fn compile_to_function<T: FromLua>(&self, source: &str) -> LuaResult<TypedFunction<T>> {
        let compiled = self
            .compile(source)
            .map_err(|diagnostics| syntax_error(&diagnostics))?;
        let callable = compiled.into_callable(self)?;
        Ok(TypedFunction {
            inner: callable,
            _marker: std::marker::PhantomData,
        })
    }

    /// Run a chunk on a dedicated thread; the token is honored at
    /// statement boundaries and loop back-edges.
    pub fn execute_async(&self, source: &str, token: CancelToken) -> ExecutionHandle {
        let options = self.options.clone();
        let source = source.to_string();
        let thread_token = token.clone();
        let handle = std::thread::Builder::new()
            .name("lua-execution".to_string())
            .spawn(move || {
                let host = LuaHost::new(options);
                host.execute_with_token(&source, Some(thread_token))
            })
            .expect("spawn execution thread");
        ExecutionHandle { handle, token }
    }

    /// A pre-filtered globals table for the given trust level.
    pub fn create_filtered_environment(&self, trust: TrustLevel) -> LuaResult<LuaValue> {
        let state = self.build_state(trust)?;
        Ok(state.globals())
    }

    // ===== wiring =====

    fn compile_chunk(&self, source: &str, name: &str) -> LuaResult<Chunk> {
        Compiler::compile(source, name).map_err(|diagnostics| syntax_error(&diagnostics))
    }

    fn build_state(&self, trust: TrustLevel) -> LuaResult<LuaState> {
        let rt = LuaRuntime::with_config(
            trust,
            self.options.memory_limit,
            self.options.resolver.clone(),
            None,
        );
        let mut state = LuaState::new(rt);

        let globals = state.new_table()?;
        state.rt.set_globals(globals.clone());

        let registry = create_standard_registry();
        let policy = self.policy;
        registry.load_filtered(&mut state, &globals, |name| {
            name == "_G" || policy.allows_library(trust, name)
        })?;

        self.apply_policy(&mut state, &globals, trust)?;
        self.install_host_functions(&globals)?;
        Ok(state)
    }

    /// Structural policy application: strip blocked globals, shrink `os`
    /// to its read-only subset at Restricted.
    fn apply_policy(
        &self,
        state: &mut LuaState,
        globals: &LuaValue,
        trust: TrustLevel,
    ) -> LuaResult<()> {
        let Some(globals_table) = globals.as_table() else {
            return Ok(());
        };
        for name in self.policy.blocked_globals(trust) {
            globals_table.lock().set_str(name, LuaValue::Nil);
        }

        if self.policy.os_read_only(trust) {
            let os = globals_table.lock().get_str("os");
            if let Some(os_table) = os.as_table() {
                let subset = state.new_table_with(0, SecurityPolicy::OS_READ_ONLY_SUBSET.len())?;
                if let Some(subset_table) = subset.as_table() {
                    for name in SecurityPolicy::OS_READ_ONLY_SUBSET {
                        let value = os_table.lock().get_str(name);
                        subset_table.lock().set_str(name, value);
                    }
                }
                globals_table.lock().set_str("os", subset);
            }
        }
        Ok(())
    }

    fn install_host_functions(&self, globals: &LuaValue) -> LuaResult<()> {
        let Some(globals_table) = globals.as_table() else {
            return Ok(());
        };
        for (name, func) in &self.options.host_functions {
            let func = func.clone();
            let fname = name.clone();
            let native = NativeFunction::from_closure(name, move |_l, args| {
                func(args).map_err(|message| {
                    let mut err = LuaError::host(message);
                    err.push_frame(format!("\t[host]: in function '{}'", fname));
                    err
                })
            });
            globals_table
                .lock()
                .set_str(name, LuaValue::Native(Arc::new(native)));
        }
        Ok(())
    }

    fn arm_limits(&self, state: &LuaState, token: Option<CancelToken>) {
        if let Some(timeout) = self.options.timeout {
            *state.rt.deadline.lock().unwrap_or_else(|e| e.into_inner()) =
                Some(Instant::now() + timeout);
        }
        if let Some(token) = token {
            *state.rt.cancel.lock().unwrap_or_else(|e| e.into_inner()) = Some(token);
        }
    }
}

fn syntax_error(diagnostics: &[Diagnostic]) -> LuaError {
    let message = diagnostics
        .iter()
        .find(|d| d.severity == crate::diagnostics::Severity::Error)
        .or_else(|| diagnostics.first())
        .map(|d| d.to_string())
        .unwrap_or_else(|| "syntax error".to_string());
    LuaError::new(LuaErrorKind::Syntax, message)
}

/// A compiled chunk, not yet bound to an environment.
pub struct CompiledChunk {
    chunk: Chunk,
}

impl CompiledChunk {
    /// Bind to a fresh filtered environment. Only permitted at Trusted
    /// and above; the callable stays closed over that environment.
    pub fn into_callable(self, host: &LuaHost) -> LuaResult<CompiledFunction> {
        let trust = host.options.trust;
        if !host.policy.allows_compilation(trust) {
            return Err(LuaError::security(format!(
                "compilation to a callable requires Trusted or above (current: {})",
                trust
            )));
        }
        let state = host.build_state(trust)?;
        Ok(CompiledFunction {
            rt: state.rt.clone(),
            chunk: self.chunk,
        })
    }
}

/// A reusable callable over a fixed environment.
pub struct CompiledFunction {
    rt: Arc<LuaRuntime>,
    chunk: Chunk,
}

impl std::fmt::Debug for CompiledFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledFunction")
            .field("chunk", &self.chunk)
            .finish()
    }
}

impl CompiledFunction {
    pub fn call(&self, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
        let mut state = LuaState::new(self.rt.clone());
        let globals = state.globals();
        state.exec_chunk(&self.chunk, globals, args.to_vec())
    }
}

pub struct TypedFunction<T: FromLua> {
    inner: CompiledFunction,
    _marker: std::marker::PhantomData<T>,
}

impl<T: FromLua> TypedFunction<T> {
    pub fn call(&self) -> LuaResult<T> {
        let results = self.inner.call(&[])?;
        T::from_lua(results.into_iter().next().unwrap_or(LuaValue::Nil))
    }
}

/// Handle to an asynchronous execution.
pub struct ExecutionHandle {
    handle: std::thread::JoinHandle<LuaResult<Vec<LuaValue>>>,
    token: CancelToken,
}

impl ExecutionHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.token.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn join(self) -> LuaResult<Vec<LuaValue>> {
        self.handle
            .join()
            .unwrap_or_else(|_| Err(LuaError::internal("execution thread panicked")))
    }
}

/// Conversion from a Lua value into a host type.
pub trait FromLua: Sized {
    fn from_lua(value: LuaValue) -> LuaResult<Self>;
}

impl FromLua for LuaValue {
    fn from_lua(value: LuaValue) -> LuaResult<Self> {
        Ok(value)
    }
}

impl FromLua for () {
    fn from_lua(_value: LuaValue) -> LuaResult<Self> {
        Ok(())
    }
}

impl FromLua for bool {
    fn from_lua(value: LuaValue) -> LuaResult<Self> {
        Ok(value.is_truthy())
    }
}

impl FromLua for i64 {
    fn from_lua(value: LuaValue) -> LuaResult<Self> {
        number::coerce_integer(&value)
            .ok_or_else(|| LuaError::runtime(format!("expected integer, got {}", value.type_name())))
    }
}

impl FromLua for f64 {
    fn from_lua(value: LuaValue) -> LuaResult<Self> {
        match number::coerce_number(&value) {
            Some(LuaValue::Integer(i)) => Ok(i as f64),
            Some(LuaValue::Float(f)) => Ok(f),
            _ => Err(LuaError::runtime(format!(
                "expected number, got {}",
                value.type_name()
            ))),
        }
    }
}

impl FromLua for String {
    fn from_lua(value: LuaValue) -> LuaResult<Self> {
        match &value {
            LuaValue::Str(s) => Ok(s.display().into_owned()),
            LuaValue::Integer(_) | LuaValue::Float(_) => Ok(value.to_display_string()),
            _ => Err(LuaError::runtime(format!(
                "expected string, got {}",
                value.type_name()
            ))),
        }
    }
}
