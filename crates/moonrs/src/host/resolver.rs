// Module resolution
// `require` delegates to a ModuleResolver; the default implementation
// searches a list of filesystem roots for `name.lua`, refuses paths
// escaping the roots, and caches compiled chunks keyed by
// (resolved path, trust level).

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ahash::AHashMap;

use crate::compiler::Chunk;
use crate::host::security::TrustLevel;

#[derive(Debug, Clone)]
pub struct ResolvedModule {
    pub source: String,
    pub resolved_path: String,
    pub cacheable: bool,
}

pub trait ModuleResolver: Send + Sync {
    /// Locate the source of `name`. `context` is the path of the module
    /// performing the require, when known.
    fn resolve(&self, name: &str, context: Option<&str>) -> Result<ResolvedModule, String>;

    /// Resolver-level veto on top of the security policy.
    fn is_allowed(&self, _name: &str, _trust: TrustLevel) -> bool {
        true
    }

    /// Compilation cache hooks; the default resolver implements them.
    fn cached_chunk(&self, _path: &str, _trust: TrustLevel) -> Option<Chunk> {
        None
    }

    fn store_chunk(&self, _path: &str, _trust: TrustLevel, _chunk: Chunk) {}
}

pub struct FileSystemResolver {
    roots: Vec<PathBuf>,
    cache: Mutex<AHashMap<(String, TrustLevel), Chunk>>,
}

impl FileSystemResolver {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        FileSystemResolver {
            roots,
            cache: Mutex::new(AHashMap::new()),
        }
    }

    pub fn single_root(root: impl Into<PathBuf>) -> Self {
        Self::new(vec![root.into()])
    }

    fn candidate(&self, root: &Path, name: &str) -> PathBuf {
        // Dots in module names map to path separators
        let mut path = root.to_path_buf();
        for part in name.split('.') {
            path.push(part);
        }
        path.set_extension("lua");
        path
    }
}

impl ModuleResolver for FileSystemResolver {
    fn resolve(&self, name: &str, _context: Option<&str>) -> Result<ResolvedModule, String> {
        let mut attempts = Vec::new();
        for root in &self.roots {
            let candidate = self.candidate(root, name);
            let Ok(resolved) = candidate.canonicalize() else {
                attempts.push(format!("no file '{}'", candidate.display()));
                continue;
            };
            // Normalized path must stay under its root
            if let Ok(root) = root.canonicalize() {
                if !resolved.starts_with(&root) {
                    attempts.push(format!(
                        "path '{}' escapes its search root",
                        resolved.display()
                    ));
                    continue;
                }
            }
            match std::fs::read_to_string(&resolved) {
                Ok(source) => {
                    return Ok(ResolvedModule {
                        source,
                        resolved_path: resolved.to_string_lossy().into_owned(),
                        cacheable: true,
                    });
                }
                Err(e) => attempts.push(format!("cannot read '{}': {}", resolved.display(), e)),
            }
        }
        Err(attempts.join("; "))
    }

    fn is_allowed(&self, name: &str, _trust: TrustLevel) -> bool {
        // Reject escapes before touching the filesystem
        !name.contains("..") && !name.starts_with('/') && !name.contains('\\')
    }

    fn cached_chunk(&self, path: &str, trust: TrustLevel) -> Option<Chunk> {
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(path.to_string(), trust))
            .cloned()
    }

    fn store_chunk(&self, path: &str, trust: TrustLevel, chunk: Chunk) {
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert((path.to_string(), trust), chunk);
    }
}
