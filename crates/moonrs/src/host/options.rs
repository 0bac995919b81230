// Host configuration
// Everything an embedder can tune for one execution surface: trust
// level, limits, module resolution, host functions, compiler options.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::host::resolver::ModuleResolver;
use crate::host::security::TrustLevel;
use crate::lua_value::LuaValue;

/// Host-supplied native callable: value slice in, value slice out; a
/// failure message becomes a Lua error at the call site.
pub type HostFunction =
    Arc<dyn Fn(&[LuaValue]) -> Result<Vec<LuaValue>, String> + Send + Sync>;

/// Cooperative cancellation token, checked between statements and on
/// loop back-edges.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Target shape for ahead-of-time compilation. The interpreter honors
/// the observable contract for all of them; `Lambda` behaves as
/// `Library`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompileTarget {
    #[default]
    Library,
    ConsoleApp,
    Lambda,
}

#[derive(Debug, Clone, Default)]
pub struct CompilerOptions {
    pub target: CompileTarget,
    /// In-memory compilation; `false` lets a host persist the chunk
    /// cache as opaque blobs keyed by resolved path.
    pub in_memory: bool,
}

#[derive(Clone, Default)]
pub struct LuaHostOptions {
    pub trust: TrustLevel,
    pub timeout: Option<Duration>,
    /// Best-effort allocation budget in bytes.
    pub memory_limit: Option<usize>,
    pub resolver: Option<Arc<dyn ModuleResolver>>,
    pub host_functions: Vec<(String, HostFunction)>,
    pub compiler: CompilerOptions,
}

impl LuaHostOptions {
    pub fn with_trust(trust: TrustLevel) -> Self {
        LuaHostOptions {
            trust,
            ..Default::default()
        }
    }

    pub fn full_trust() -> Self {
        Self::with_trust(TrustLevel::FullTrust)
    }

    pub fn untrusted() -> Self {
        Self::with_trust(TrustLevel::Untrusted)
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = Some(bytes);
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn ModuleResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn host_function<F>(mut self, name: &str, func: F) -> Self
    where
        F: Fn(&[LuaValue]) -> Result<Vec<LuaValue>, String> + Send + Sync + 'static,
    {
        self.host_functions.push((name.to_string(), Arc::new(func)));
        self
    }
}
