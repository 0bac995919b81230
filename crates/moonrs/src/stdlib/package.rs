// Package library and `require`
// `require` consults package.loaded, then walks the live
// package.searchers list: a preload searcher and a resolver searcher
// (backed by the module resolver configured on the runtime). The first
// return value of the module chunk is cached in package.loaded;
// circular requires observe whatever partial value is already there.

use std::sync::Arc;

use crate::lib_registry::{LibraryModule, check_str};
use crate::lua_interp::{LuaError, LuaResult, LuaState};
use crate::lua_value::{LuaValue, NativeFunction};
use crate::stdlib::basic::chunk_to_function;

pub fn create_package_lib() -> LibraryModule {
    LibraryModule::new("package")
        .with_value("path", |l| l.alloc_str("./?.lua"))
        .with_value("loaded", |l| l.new_table())
        .with_value("preload", |l| l.new_table())
        .with_value("searchers", |l| {
            let searchers = l.new_table_with(2, 0)?;
            if let Some(t) = searchers.as_table() {
                let mut guard = t.lock();
                guard.set_int(1, LuaValue::native("preload_searcher", searcher_preload));
                guard.set_int(2, LuaValue::native("resolver_searcher", searcher_resolver));
            }
            Ok(searchers)
        })
        .with_initializer(|l, _lib| {
            // `require` itself is a global
            let globals = l.globals();
            if let Some(t) = globals.as_table() {
                t.lock()
                    .set_str("require", LuaValue::native("require", lua_require));
            }
            Ok(())
        })
}

fn package_field(l: &mut LuaState, field: &str) -> LuaValue {
    let globals = l.globals();
    let package = globals
        .as_table()
        .map(|t| t.lock().get_str("package"))
        .unwrap_or(LuaValue::Nil);
    package
        .as_table()
        .map(|t| t.lock().get_str(field))
        .unwrap_or(LuaValue::Nil)
}

/// Searcher over package.preload: the registered function is the loader.
fn searcher_preload(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let name = check_str(l, args, 1, "searcher")?;
    let name = String::from_utf8_lossy(&name).into_owned();
    let preload = package_field(l, "preload");
    let loader = preload
        .as_table()
        .map(|t| t.lock().get_str(&name))
        .unwrap_or(LuaValue::Nil);
    if loader.is_function() {
        Ok(vec![loader, LuaValue::str(":preload:")])
    } else {
        Ok(vec![LuaValue::string_owned(format!(
            "no field package.preload['{}']",
            name
        ))])
    }
}

/// Searcher over the runtime's module resolver. Security vetoes raise;
/// resolution misses return a message like any other searcher.
fn searcher_resolver(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let name = check_str(l, args, 1, "searcher")?;
    let name = String::from_utf8_lossy(&name).into_owned();

    let policy = crate::host::security::SecurityPolicy;
    if !policy.allows_module(l.rt.trust, &name) {
        return Err(LuaError::security(format!(
            "module '{}' is not allowed at the current trust level",
            name
        )));
    }

    let Some(resolver) = l.rt.resolver.clone() else {
        return Ok(vec![LuaValue::str("no module resolver configured")]);
    };
    if !resolver.is_allowed(&name, l.rt.trust) {
        return Err(LuaError::security(format!(
            "module '{}' is not allowed at the current trust level",
            name
        )));
    }
    let resolved = match resolver.resolve(&name, l.rt.module_context.as_deref()) {
        Ok(resolved) => resolved,
        Err(message) => return Ok(vec![LuaValue::string_owned(message)]),
    };

    let chunk = match resolver.cached_chunk(&resolved.resolved_path, l.rt.trust) {
        Some(chunk) => chunk,
        None => {
            let chunk = crate::compiler::Compiler::compile(
                &resolved.source,
                &resolved.resolved_path,
            )
            .map_err(|diagnostics| {
                let detail = diagnostics
                    .first()
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "syntax error".to_string());
                LuaError::new(crate::lua_interp::LuaErrorKind::Syntax, detail)
            })?;
            if resolved.cacheable {
                resolver.store_chunk(&resolved.resolved_path, l.rt.trust, chunk.clone());
            }
            chunk
        }
    };

    // The loader runs the chunk against the current (policy-filtered)
    // globals in a fresh chunk scope, with (name, path) as varargs.
    let path = resolved.resolved_path.clone();
    let loader = NativeFunction::from_closure("module_loader", move |l, loader_args| {
        let env = l.globals();
        let func = chunk_to_function(&chunk, env, None);
        l.call_value(func, loader_args.to_vec())
    });
    Ok(vec![
        LuaValue::Native(Arc::new(loader)),
        LuaValue::string_owned(path),
    ])
}

pub fn lua_require(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let name_bytes = check_str(l, args, 1, "require")?;
    let name = String::from_utf8_lossy(&name_bytes).into_owned();

    // Already loaded?
    let loaded = package_field(l, "loaded");
    if let Some(loaded_table) = loaded.as_table() {
        let cached = loaded_table.lock().get_str(&name);
        if !cached.is_nil() {
            return Ok(vec![cached]);
        }
    }

    // In-flight load with no partial value is a hard cycle
    {
        let mut loading = l.rt.loading.lock().unwrap_or_else(|e| e.into_inner());
        if !loading.insert(name.clone()) {
            return Err(LuaError::module(format!(
                "circular dependency loading module '{}'",
                name
            )));
        }
    }
    let result = require_via_searchers(l, &name);
    l.rt.loading
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .remove(&name);
    result
}

fn require_via_searchers(l: &mut LuaState, name: &str) -> LuaResult<Vec<LuaValue>> {
    let searchers = package_field(l, "searchers");
    let Some(searchers_table) = searchers.as_table() else {
        return Err(LuaError::module(format!(
            "module '{}' not found: package.searchers is not a table",
            name
        )));
    };

    let mut misses: Vec<String> = Vec::new();
    let mut index = 1i64;
    loop {
        let searcher = searchers_table.lock().get_int(index);
        if searcher.is_nil() {
            break;
        }
        index += 1;

        let results = l.call_value(searcher, vec![LuaValue::str(name)])?;
        let first = results.first().cloned().unwrap_or(LuaValue::Nil);
        if first.is_function() {
            let data = results.get(1).cloned().unwrap_or(LuaValue::Nil);
            let loaded = l.call_value(first, vec![LuaValue::str(name), data.clone()])?;
            let value = finish_load(l, name, loaded.into_iter().next());
            return Ok(vec![value, data]);
        }
        if let LuaValue::Str(message) = first {
            misses.push(message.display().into_owned());
        }
    }

    Err(LuaError::module(format!(
        "module '{}' not found: {}",
        name,
        misses.join("; ")
    )))
}

/// Store the module result in package.loaded; a chunk returning nothing
/// records `true` by convention.
fn finish_load(l: &mut LuaState, name: &str, result: Option<LuaValue>) -> LuaValue {
    let value = match result {
        None | Some(LuaValue::Nil) => {
            // A partial value stored by the module itself wins
            let loaded = package_field(l, "loaded");
            let existing = loaded
                .as_table()
                .map(|t| t.lock().get_str(name))
                .unwrap_or(LuaValue::Nil);
            if existing.is_nil() {
                LuaValue::Boolean(true)
            } else {
                existing
            }
        }
        Some(v) => v,
    };
    let loaded = package_field(l, "loaded");
    if let Some(t) = loaded.as_table() {
        t.lock().set_str(name, value.clone());
    }
    value
}
