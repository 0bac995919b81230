// Trust levels and the default security policy
// A trust level maps to (allowed libraries, blocked globals, forbidden
// modules). Enforcement is structural: the host builds a fresh globals
// table from the full registry and removes what the level forbids,
// never by rewriting source.

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TrustLevel {
    Untrusted,
    Sandbox,
    Restricted,
    Trusted,
    FullTrust,
}

impl Default for TrustLevel {
    fn default() -> Self {
        TrustLevel::Sandbox
    }
}

impl std::fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TrustLevel::Untrusted => "Untrusted",
            TrustLevel::Sandbox => "Sandbox",
            TrustLevel::Restricted => "Restricted",
            TrustLevel::Trusted => "Trusted",
            TrustLevel::FullTrust => "FullTrust",
        };
        write!(f, "{}", name)
    }
}

/// The default policy matrix.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecurityPolicy;

impl SecurityPolicy {
    pub fn allowed_libraries(&self, trust: TrustLevel) -> &'static [&'static str] {
        match trust {
            TrustLevel::Untrusted => &["math", "string"],
            TrustLevel::Sandbox => &["math", "string", "table", "coroutine", "utf8"],
            TrustLevel::Restricted => &["math", "string", "table", "coroutine", "utf8", "os"],
            TrustLevel::Trusted => &[
                "math", "string", "table", "coroutine", "utf8", "os", "io", "package",
            ],
            TrustLevel::FullTrust => &[
                "math", "string", "table", "coroutine", "utf8", "os", "io", "package", "debug",
            ],
        }
    }

    pub fn blocked_globals(&self, trust: TrustLevel) -> &'static [&'static str] {
        match trust {
            TrustLevel::Untrusted => &[
                "load",
                "loadfile",
                "dofile",
                "require",
                "collectgarbage",
                "rawget",
                "rawset",
                "rawequal",
                "rawlen",
                "getmetatable",
                "setmetatable",
                "pcall",
                "xpcall",
                "error",
                "warn",
            ],
            TrustLevel::Sandbox => &[
                "load",
                "loadfile",
                "dofile",
                "require",
                "collectgarbage",
            ],
            TrustLevel::Restricted => &["loadfile", "dofile"],
            TrustLevel::Trusted | TrustLevel::FullTrust => &[],
        }
    }

    pub fn forbidden_modules(&self, trust: TrustLevel) -> &'static [&'static str] {
        match trust {
            // All modules are forbidden below Sandbox
            TrustLevel::Untrusted => &["*"],
            TrustLevel::Sandbox => &["io", "os", "package", "debug"],
            TrustLevel::Restricted | TrustLevel::Trusted => &["debug"],
            TrustLevel::FullTrust => &[],
        }
    }

    pub fn allows_library(&self, trust: TrustLevel, name: &str) -> bool {
        self.allowed_libraries(trust).contains(&name)
    }

    pub fn allows_module(&self, trust: TrustLevel, name: &str) -> bool {
        let forbidden = self.forbidden_modules(trust);
        if forbidden.contains(&"*") {
            return false;
        }
        !forbidden.contains(&name)
    }

    /// At Restricted, `os` keeps only its read-only subset.
    pub fn os_read_only(&self, trust: TrustLevel) -> bool {
        trust == TrustLevel::Restricted
    }

    pub const OS_READ_ONLY_SUBSET: &'static [&'static str] =
        &["time", "date", "clock", "difftime", "getenv"];

    /// Ahead-of-time compilation to a callable is a Trusted+ capability.
    pub fn allows_compilation(&self, trust: TrustLevel) -> bool {
        trust >= TrustLevel::Trusted
    }
}
