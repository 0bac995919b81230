// package library and module resolution
use std::sync::Arc;

use crate::host::{FileSystemResolver, LuaHost, LuaHostOptions, TrustLevel};
use crate::lua_interp::LuaErrorKind;
use crate::lua_value::LuaValue;

fn host_with_modules(files: &[(&str, &str)]) -> (LuaHost, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    for (name, source) in files {
        let path = dir.path().join(format!("{}.lua", name.replace('.', "/")));
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("mkdir");
        }
        std::fs::write(&path, source).expect("write module");
    }
    let resolver = Arc::new(FileSystemResolver::single_root(dir.path().to_path_buf()));
    let host = LuaHost::new(LuaHostOptions::with_trust(TrustLevel::Trusted).resolver(resolver));
    (host, dir)
}

#[test]
fn test_require_returns_module_value() {
    let (host, _dir) = host_with_modules(&[(
        "answer",
        "local m = {} m.value = 42 return m",
    )]);
    let values = host
        .execute("local m = require('answer') return m.value")
        .expect("runs");
    assert!(matches!(values[0], LuaValue::Integer(42)));
}

#[test]
fn test_require_caches_in_package_loaded() {
    let (host, _dir) = host_with_modules(&[(
        "counted",
        "hits = (hits or 0) + 1 return {hits = hits}",
    )]);
    let values = host
        .execute(
            r#"
            local a = require('counted')
            local b = require('counted')
            return a == b, hits, package.loaded['counted'] == a
        "#,
        )
        .expect("runs");
    assert_eq!(values[0].as_boolean(), Some(true));
    assert!(matches!(values[1], LuaValue::Integer(1)));
    assert_eq!(values[2].as_boolean(), Some(true));
}

#[test]
fn test_require_dotted_names() {
    let (host, _dir) = host_with_modules(&[("pkg.inner", "return 'nested'")]);
    let values = host
        .execute("return require('pkg.inner')")
        .expect("runs");
    assert_eq!(values[0].as_str(), Some("nested"));
}

#[test]
fn test_require_passes_name_and_path() {
    let (host, _dir) = host_with_modules(&[("meta", "local name = ... return name")]);
    let values = host.execute("return require('meta')").expect("runs");
    assert_eq!(values[0].as_str(), Some("meta"));
}

#[test]
fn test_require_missing_module() {
    let (host, _dir) = host_with_modules(&[]);
    let err = host
        .execute("return require('ghost')")
        .expect_err("must fail");
    assert_eq!(err.kind, LuaErrorKind::Module);
    assert!(err.message().contains("ghost"), "got: {}", err.message());
}

#[test]
fn test_require_forbidden_by_trust() {
    // debug stays forbidden at Trusted
    let (host, _dir) = host_with_modules(&[("debug", "return {}")]);
    let err = host
        .execute("return require('debug')")
        .expect_err("must fail");
    assert_eq!(err.kind, LuaErrorKind::Security);
}

#[test]
fn test_require_rejects_path_escapes() {
    let (host, _dir) = host_with_modules(&[]);
    let err = host
        .execute("return require('../outside')")
        .expect_err("must fail");
    assert_eq!(err.kind, LuaErrorKind::Security);
}

#[test]
fn test_preload() {
    let (host, _dir) = host_with_modules(&[]);
    let values = host
        .execute(
            r#"
            package.preload['virtual'] = function(name)
                return {source = 'preload', name = name}
            end
            local m = require('virtual')
            return m.source, m.name
        "#,
        )
        .expect("runs");
    assert_eq!(values[0].as_str(), Some("preload"));
    assert_eq!(values[1].as_str(), Some("virtual"));
}

#[test]
fn test_circular_require_with_partial_value() {
    let (host, _dir) = host_with_modules(&[
        (
            "alpha",
            r#"
            local m = {name = 'alpha'}
            package.loaded['alpha'] = m
            m.other = require('beta')
            return m
        "#,
        ),
        (
            "beta",
            r#"
            -- sees alpha's partial table
            local partial = require('alpha')
            return {name = 'beta', saw = partial.name}
        "#,
        ),
    ]);
    let values = host
        .execute(
            r#"
            local alpha = require('alpha')
            return alpha.name, alpha.other.name, alpha.other.saw
        "#,
        )
        .expect("runs");
    assert_eq!(values[0].as_str(), Some("alpha"));
    assert_eq!(values[1].as_str(), Some("beta"));
    assert_eq!(values[2].as_str(), Some("alpha"));
}

#[test]
fn test_circular_require_without_partial_fails() {
    let (host, _dir) = host_with_modules(&[
        ("ping", "return require('pong')"),
        ("pong", "return require('ping')"),
    ]);
    let err = host.execute("return require('ping')").expect_err("cycle");
    assert!(
        err.message().contains("circular"),
        "got: {}",
        err.message()
    );
}

#[test]
fn test_standard_libs_in_package_loaded() {
    let (host, _dir) = host_with_modules(&[]);
    let values = host
        .execute("return package.loaded.string == string, package.loaded.math == math")
        .expect("runs");
    assert_eq!(values[0].as_boolean(), Some(true));
    assert_eq!(values[1].as_boolean(), Some(true));
}

#[test]
fn test_module_chunk_syntax_error() {
    let (host, _dir) = host_with_modules(&[("broken", "return +")]);
    let err = host.execute("return require('broken')").expect_err("bad");
    assert_eq!(err.kind, LuaErrorKind::Syntax);
}
