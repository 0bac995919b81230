// Host facade: trust levels, host functions, limits, compiled callables
use std::time::Duration;

use crate::host::{CancelToken, LuaHost, LuaHostOptions, TrustLevel};
use crate::lua_interp::LuaErrorKind;
use crate::lua_value::LuaValue;

fn host_at(trust: TrustLevel) -> LuaHost {
    LuaHost::new(LuaHostOptions::with_trust(trust))
}

#[test]
fn test_untrusted_blocks_functions() {
    let host = host_at(TrustLevel::Untrusted);
    // Every blocked global reads as nil
    let values = host
        .execute(
            r#"
            return type(pcall), type(load), type(require), type(setmetatable),
                   type(rawget), type(collectgarbage)
        "#,
        )
        .expect("runs");
    for value in values {
        assert_eq!(value.as_str(), Some("nil"));
    }
}

#[test]
fn test_untrusted_keeps_math_and_string() {
    let host = host_at(TrustLevel::Untrusted);
    let values = host
        .execute("return math.floor(3.7), string.upper('ok'), type(print)")
        .expect("runs");
    assert!(matches!(values[0], LuaValue::Integer(3)));
    assert_eq!(values[1].as_str(), Some("OK"));
    assert_eq!(values[2].as_str(), Some("function"));
}

#[test]
fn test_sandbox_has_no_io_or_os() {
    // Scenario: io.open is unreachable at Sandbox
    let host = host_at(TrustLevel::Sandbox);
    let err = host
        .execute("return io.open('x', 'w')")
        .expect_err("must fail");
    assert!(
        err.message().contains("attempt to index a nil value"),
        "got: {}",
        err.message()
    );
    let values = host
        .execute("return type(io), type(os), type(debug), type(table)")
        .expect("runs");
    assert_eq!(values[0].as_str(), Some("nil"));
    assert_eq!(values[1].as_str(), Some("nil"));
    assert_eq!(values[2].as_str(), Some("nil"));
    assert_eq!(values[3].as_str(), Some("table"));
}

#[test]
fn test_restricted_os_subset() {
    let host = host_at(TrustLevel::Restricted);
    let values = host
        .execute("return type(os.time), type(os.clock), type(os.execute), type(os.remove)")
        .expect("runs");
    assert_eq!(values[0].as_str(), Some("function"));
    assert_eq!(values[1].as_str(), Some("function"));
    assert_eq!(values[2].as_str(), Some("nil"));
    assert_eq!(values[3].as_str(), Some("nil"));
}

#[test]
fn test_trusted_has_io() {
    let host = host_at(TrustLevel::Trusted);
    let values = host
        .execute("return type(io.open), type(pcall), type(debug)")
        .expect("runs");
    assert_eq!(values[0].as_str(), Some("function"));
    assert_eq!(values[1].as_str(), Some("function"));
    assert_eq!(values[2].as_str(), Some("nil"));
}

#[test]
fn test_full_trust_has_debug() {
    let host = host_at(TrustLevel::FullTrust);
    let values = host.execute("return type(debug.traceback)").expect("runs");
    assert_eq!(values[0].as_str(), Some("function"));
}

#[test]
fn test_filtered_environment() {
    let host = host_at(TrustLevel::Untrusted);
    let globals = host
        .create_filtered_environment(TrustLevel::Untrusted)
        .expect("builds");
    let table = globals.as_table().expect("table");
    assert!(table.lock().get_str("pcall").is_nil());
    assert!(!table.lock().get_str("math").is_nil());
    assert!(table.lock().get_str("io").is_nil());
}

#[test]
fn test_host_functions() {
    let options = LuaHostOptions::with_trust(TrustLevel::Sandbox)
        .host_function("host_add", |args| {
            let a = args.first().and_then(|v| v.as_integer()).unwrap_or(0);
            let b = args.get(1).and_then(|v| v.as_integer()).unwrap_or(0);
            Ok(vec![LuaValue::Integer(a + b)])
        })
        .host_function("host_fail", |_args| Err("host exploded".to_string()));
    let host = LuaHost::new(options);

    let values = host.execute("return host_add(20, 22)").expect("runs");
    assert!(matches!(values[0], LuaValue::Integer(42)));

    // Host failures surface as catchable Lua errors with the message kept
    let values = host
        .execute("local ok, err = pcall(host_fail) return ok, err")
        .expect("runs");
    assert!(matches!(values[0], LuaValue::Boolean(false)));
    assert!(values[1].to_display_string().contains("host exploded"));
}

#[test]
fn test_timeout() {
    let host = LuaHost::new(
        LuaHostOptions::with_trust(TrustLevel::Sandbox).timeout(Duration::from_millis(50)),
    );
    let err = host.execute("while true do end").expect_err("must time out");
    assert_eq!(err.kind, LuaErrorKind::Timeout);
}

#[test]
fn test_timeout_is_not_catchable() {
    let host = LuaHost::new(
        LuaHostOptions::with_trust(TrustLevel::Trusted).timeout(Duration::from_millis(50)),
    );
    // pcall must not swallow the timeout
    let err = host
        .execute("while true do pcall(function() while true do end end) end")
        .expect_err("must time out");
    assert_eq!(err.kind, LuaErrorKind::Timeout);
}

#[test]
fn test_cancellation() {
    let host = host_at(TrustLevel::Sandbox);
    let token = CancelToken::new();
    let handle = host.execute_async("while true do end", token.clone());
    std::thread::sleep(Duration::from_millis(30));
    token.cancel();
    let err = handle.join().expect_err("must be cancelled");
    assert_eq!(err.kind, LuaErrorKind::Cancelled);
}

#[test]
fn test_execute_async_completes() {
    let host = host_at(TrustLevel::Sandbox);
    let handle = host.execute_async("return 6 * 7", CancelToken::new());
    let values = handle.join().expect("runs");
    assert!(matches!(values[0], LuaValue::Integer(42)));
}

#[test]
fn test_memory_limit() {
    let host =
        LuaHost::new(LuaHostOptions::with_trust(TrustLevel::Sandbox).memory_limit(256 * 1024));
    let err = host
        .execute("local s = 'x' while true do s = s .. s end")
        .expect_err("must exhaust");
    assert!(err.message().contains("memory limit"), "got: {}", err.message());
}

#[test]
fn test_validate() {
    let host = host_at(TrustLevel::Sandbox);
    assert!(host.validate("return 1 + 2").is_empty());
    let diagnostics = host.validate("return +");
    assert!(!diagnostics.is_empty());
    // Validation never executes
    assert!(host.validate("error('should not run')").is_empty());
}

#[test]
fn test_compiled_callable_requires_trusted() {
    let sandbox = host_at(TrustLevel::Sandbox);
    let compiled = sandbox.compile("return 1").expect("compiles");
    let err = compiled.into_callable(&sandbox).expect_err("gated");
    assert_eq!(err.kind, LuaErrorKind::Security);

    let trusted = host_at(TrustLevel::Trusted);
    let compiled = trusted.compile("return 40 + 2").expect("compiles");
    let callable = compiled.into_callable(&trusted).expect("allowed");
    let values = callable.call(&[]).expect("runs");
    assert!(matches!(values[0], LuaValue::Integer(42)));
    // The callable is reusable over its captured environment
    let values = callable.call(&[]).expect("runs again");
    assert!(matches!(values[0], LuaValue::Integer(42)));
}

#[test]
fn test_compiled_callable_keeps_environment() {
    let trusted = host_at(TrustLevel::Trusted);
    let compiled = trusted
        .compile("counter = (counter or 0) + 1 return counter")
        .expect("compiles");
    let callable = compiled.into_callable(&trusted).expect("allowed");
    assert!(matches!(callable.call(&[]).expect("1")[0], LuaValue::Integer(1)));
    assert!(matches!(callable.call(&[]).expect("2")[0], LuaValue::Integer(2)));
}

#[test]
fn test_compile_to_function_typed() {
    let trusted = host_at(TrustLevel::Trusted);
    let func = trusted
        .compile_to_function::<i64>("return 21 * 2")
        .expect("compiles");
    assert_eq!(func.call().expect("runs"), 42);

    let func = trusted
        .compile_to_function::<String>("return 'type' .. 'd'")
        .expect("compiles");
    assert_eq!(func.call().expect("runs"), "typed");
}

#[test]
fn test_chunk_varargs_reach_callable() {
    let trusted = host_at(TrustLevel::Trusted);
    let compiled = trusted.compile("return select('#', ...), ...").expect("ok");
    let callable = compiled.into_callable(&trusted).expect("allowed");
    let values = callable
        .call(&[LuaValue::Integer(5), LuaValue::str("x")])
        .expect("runs");
    assert!(matches!(values[0], LuaValue::Integer(2)));
    assert!(matches!(values[1], LuaValue::Integer(5)));
    assert_eq!(values[2].as_str(), Some("x"));
}

#[test]
fn test_values_cross_boundary() {
    let host = host_at(TrustLevel::Sandbox);
    let values = host
        .execute("return nil, true, 42, 2.5, 'str', {10}")
        .expect("runs");
    assert!(values[0].is_nil());
    assert_eq!(values[1].as_boolean(), Some(true));
    assert_eq!(values[2].as_integer(), Some(42));
    assert_eq!(values[3].as_number(), Some(2.5));
    assert_eq!(values[4].as_str(), Some("str"));
    let table = values[5].as_table().expect("table");
    assert_eq!(table.lock().get_int(1).as_integer(), Some(10));
}
