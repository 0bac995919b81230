// Interpreter state
// A `LuaRuntime` is the shared half of one Lua state: globals, limits,
// policy hooks. A `LuaState` is one thread of execution over it, either
// the main body or a coroutine body on its own thread. Exactly one
// LuaState of a runtime runs at any instant.

pub mod call;
pub mod coroutine;
pub mod eval_expr;
pub mod eval_stmt;
pub mod lua_error;
pub mod metamethod;
pub mod scope;

pub use lua_error::{LuaError, LuaErrorKind, LuaResult};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use ahash::AHashSet;

use crate::compiler::Chunk;
use crate::host::options::CancelToken;
use crate::host::resolver::ModuleResolver;
use crate::host::security::TrustLevel;
use crate::lua_interp::coroutine::{Coroutine, YieldChannel};
use crate::lua_interp::eval_stmt::Flow;
use crate::lua_interp::scope::Scope;
use crate::lua_value::{LuaTable, LuaTableRef, LuaValue};

/// Largest interpreter call depth before "stack overflow".
pub const MAX_CALL_DEPTH: usize = 200;

/// Metamethod chain hop bound (`__index`/`__call` chains).
pub const MAX_META_CHAIN: usize = 2000;

/// Shared state of one Lua universe.
pub struct LuaRuntime {
    globals: Mutex<LuaValue>,
    string_metatable: Mutex<LuaValue>,
    file_metatable: Mutex<LuaValue>,
    pub trust: TrustLevel,
    pub cancel: Mutex<Option<CancelToken>>,
    pub deadline: Mutex<Option<Instant>>,
    pub memory_limit: Option<usize>,
    pub memory_used: AtomicUsize,
    pub rng: Mutex<LuaRng>,
    pub resolver: Option<Arc<dyn ModuleResolver>>,
    /// Module roots context passed to the resolver.
    pub module_context: Option<String>,
    /// Names currently being loaded by `require` (circular detection).
    pub loading: Mutex<AHashSet<String>>,
    pub start_time: Instant,
}

impl LuaRuntime {
    pub fn new(trust: TrustLevel) -> Arc<LuaRuntime> {
        Self::with_config(trust, None, None, None)
    }

    pub fn with_config(
        trust: TrustLevel,
        memory_limit: Option<usize>,
        resolver: Option<Arc<dyn ModuleResolver>>,
        module_context: Option<String>,
    ) -> Arc<LuaRuntime> {
        Arc::new(LuaRuntime {
            globals: Mutex::new(LuaValue::Nil),
            string_metatable: Mutex::new(LuaValue::Nil),
            file_metatable: Mutex::new(LuaValue::Nil),
            trust,
            cancel: Mutex::new(None),
            deadline: Mutex::new(None),
            memory_limit,
            memory_used: AtomicUsize::new(0),
            rng: Mutex::new(LuaRng::from_clock()),
            resolver,
            module_context,
            loading: Mutex::new(AHashSet::new()),
            start_time: Instant::now(),
        })
    }

    pub fn globals(&self) -> LuaValue {
        lock(&self.globals).clone()
    }

    pub fn set_globals(&self, globals: LuaValue) {
        *lock(&self.globals) = globals;
    }

    pub fn string_metatable(&self) -> LuaValue {
        lock(&self.string_metatable).clone()
    }

    pub fn set_string_metatable(&self, mt: LuaValue) {
        *lock(&self.string_metatable) = mt;
    }

    pub fn file_metatable(&self) -> LuaValue {
        lock(&self.file_metatable).clone()
    }

    pub fn set_file_metatable(&self, mt: LuaValue) {
        *lock(&self.file_metatable) = mt;
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One call-stack frame, for tracebacks and error positions.
#[derive(Clone)]
pub struct Frame {
    pub name: String,
    pub chunk: Arc<str>,
    pub line: u32,
}

/// One thread of execution over a shared runtime.
pub struct LuaState {
    pub rt: Arc<LuaRuntime>,
    pub frames: Vec<Frame>,
    pub depth: usize,
    /// Present when running inside a coroutine body thread.
    pub(crate) yield_channel: Option<YieldChannel>,
    pub(crate) current_coroutine: Option<Arc<Coroutine>>,
}

impl LuaState {
    pub fn new(rt: Arc<LuaRuntime>) -> Self {
        LuaState {
            rt,
            frames: Vec::new(),
            depth: 0,
            yield_channel: None,
            current_coroutine: None,
        }
    }

    pub(crate) fn for_coroutine(
        rt: Arc<LuaRuntime>,
        co: Arc<Coroutine>,
        channel: YieldChannel,
    ) -> Self {
        LuaState {
            rt,
            frames: Vec::new(),
            depth: 0,
            yield_channel: Some(channel),
            current_coroutine: Some(co),
        }
    }

    pub fn globals(&self) -> LuaValue {
        self.rt.globals()
    }

    /// Run a compiled chunk as the main function, with `_ENV` bound to
    /// `env` and the given varargs.
    pub fn exec_chunk(
        &mut self,
        chunk: &Chunk,
        env: LuaValue,
        varargs: Vec<LuaValue>,
    ) -> LuaResult<Vec<LuaValue>> {
        let scope = Scope::chunk(env, varargs);
        self.frames.push(Frame {
            name: "main chunk".to_string(),
            chunk: chunk.name.clone(),
            line: 0,
        });
        let result = self.exec_block(&chunk.block, &scope);
        self.frames.pop();
        match result? {
            Flow::Return(values) => Ok(values),
            Flow::Normal => Ok(Vec::new()),
            Flow::Break => Err(LuaError::internal("break escaped the chunk")),
            Flow::Goto(label) => Err(self.error(format!("no visible label '{}' for goto", label))),
        }
    }

    // ===== positions and errors =====

    pub(crate) fn set_line(&mut self, line: u32) {
        if line != 0 {
            if let Some(frame) = self.frames.last_mut() {
                frame.line = line;
            }
        }
    }

    pub fn where_am_i(&self) -> Option<(Arc<str>, u32)> {
        self.frames.last().map(|f| (f.chunk.clone(), f.line))
    }

    /// Runtime error with the current source position prefixed, the way
    /// the reference implementation formats raise sites.
    pub fn error(&self, message: impl Into<String>) -> LuaError {
        let message = message.into();
        match self.where_am_i() {
            Some((chunk, line)) if line != 0 => {
                LuaError::runtime(format!("{}:{}: {}", chunk, line, message))
            }
            _ => LuaError::runtime(message),
        }
    }

    /// A `file:line:` prefix for `error()` levels.
    pub fn position_prefix(&self, level: usize) -> Option<String> {
        if level == 0 {
            return None;
        }
        let frame = self.frames.iter().rev().nth(level - 1)?;
        if frame.line == 0 {
            return None;
        }
        Some(format!("{}:{}: ", frame.chunk, frame.line))
    }

    pub fn traceback(&self) -> Vec<String> {
        self.frames
            .iter()
            .rev()
            .map(|f| format!("\t{}:{}: in {}", f.chunk, f.line, f.name))
            .collect()
    }

    // ===== interruption =====

    /// Cancellation and timeout checkpoint: between statements and on
    /// every loop back-edge.
    pub fn check_interrupt(&self) -> LuaResult<()> {
        if let Some(token) = lock(&self.rt.cancel).as_ref() {
            if token.is_cancelled() {
                return Err(LuaError::new(LuaErrorKind::Cancelled, "execution cancelled"));
            }
        }
        if let Some(deadline) = *lock(&self.rt.deadline) {
            if Instant::now() >= deadline {
                return Err(LuaError::new(
                    LuaErrorKind::Timeout,
                    "execution timed out",
                ));
            }
        }
        Ok(())
    }

    // ===== allocation =====

    /// Best-effort memory accounting, charged on value creation.
    pub fn charge_memory(&self, bytes: usize) -> LuaResult<()> {
        let used = self.rt.memory_used.fetch_add(bytes, Ordering::Relaxed) + bytes;
        if let Some(limit) = self.rt.memory_limit {
            if used > limit {
                return Err(self.error("memory limit exceeded"));
            }
        }
        Ok(())
    }

    pub fn memory_in_use(&self) -> usize {
        self.rt.memory_used.load(Ordering::Relaxed)
    }

    pub fn new_table(&mut self) -> LuaResult<LuaValue> {
        self.new_table_with(0, 0)
    }

    pub fn new_table_with(&mut self, narray: usize, nhash: usize) -> LuaResult<LuaValue> {
        self.charge_memory(64 + narray * 16 + nhash * 32)?;
        Ok(LuaValue::Table(LuaTableRef::new(LuaTable::with_capacity(
            narray, nhash,
        ))))
    }

    pub fn alloc_str(&mut self, s: impl Into<String>) -> LuaResult<LuaValue> {
        let s = s.into();
        self.charge_memory(s.len() + 24)?;
        Ok(LuaValue::string_owned(s))
    }

    pub fn alloc_bytes(&mut self, bytes: Vec<u8>) -> LuaResult<LuaValue> {
        self.charge_memory(bytes.len() + 24)?;
        Ok(LuaValue::bytes(bytes))
    }
}

/// xoshiro256** pseudo-random generator, the reference generator of the
/// math library.
pub struct LuaRng {
    state: [u64; 4],
}

impl LuaRng {
    pub fn seeded(n1: u64, n2: u64) -> Self {
        // splitmix64 over the two seeds fills the state
        let mut seed = n1 ^ 0x9E37_79B9_7F4A_7C15;
        let mut next = || {
            seed = seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
            let mut z = seed;
            z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
            z ^ (z >> 31)
        };
        let a = next();
        let b = next() ^ n2;
        let c = next();
        let d = next() | 1;
        LuaRng {
            state: [a, b, c, d],
        }
    }

    pub fn from_clock() -> Self {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x853C_49E6_748F_EA9B);
        Self::seeded(now, now ^ 0xDA94_2042_E4DD_58B5)
    }

    pub fn next_u64(&mut self) -> u64 {
        let s = &mut self.state;
        let result = s[1].wrapping_mul(5).rotate_left(7).wrapping_mul(9);
        let t = s[1] << 17;
        s[2] ^= s[0];
        s[3] ^= s[1];
        s[1] ^= s[2];
        s[0] ^= s[3];
        s[2] ^= t;
        s[3] = s[3].rotate_left(45);
        result
    }

    /// Uniform float in [0, 1).
    pub fn next_float(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Uniform integer in [low, high], inclusive.
    pub fn next_in_range(&mut self, low: i64, high: i64) -> i64 {
        let span = (high as u64).wrapping_sub(low as u64).wrapping_add(1);
        if span == 0 {
            // Full 64-bit range
            return self.next_u64() as i64;
        }
        low.wrapping_add((self.next_u64() % span) as i64)
    }
}
