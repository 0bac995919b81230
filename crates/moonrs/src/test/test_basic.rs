// Tests for basic library functions
use crate::lua_value::LuaValue;
use crate::test::{check, run, run_err, run_int, run_str};

#[test]
fn test_return_arithmetic() {
    let values = run("return 1 + 2");
    assert_eq!(values.len(), 1);
    assert!(matches!(values[0], LuaValue::Integer(3)));
}

#[test]
fn test_type() {
    check(
        r#"
        assert(type(nil) == "nil")
        assert(type(true) == "boolean")
        assert(type(42) == "number")
        assert(type(3.14) == "number")
        assert(type("hello") == "string")
        assert(type({}) == "table")
        assert(type(print) == "function")
        assert(type(type) == "function")
    "#,
    );
}

#[test]
fn test_tostring() {
    assert_eq!(run_str("return tostring(42)"), "42");
    assert_eq!(run_str("return tostring(1.5)"), "1.5");
    assert_eq!(run_str("return tostring(10.0)"), "10.0");
    assert_eq!(run_str("return tostring(nil)"), "nil");
    assert_eq!(run_str("return tostring(true)"), "true");
    assert_eq!(run_str("return tostring('x')"), "x");
}

#[test]
fn test_tonumber() {
    check(
        r#"
        assert(tonumber("123") == 123)
        assert(tonumber("3.14") == 3.14)
        assert(tonumber("  42  ") == 42)
        assert(tonumber("0x10") == 16)
        assert(tonumber("-7") == -7)
        assert(tonumber("FF", 16) == 255)
        assert(tonumber("z", 36) == 35)
        assert(tonumber("invalid") == nil)
        assert(tonumber(42) == 42)
        assert(tonumber("1e2") == 100.0)
    "#,
    );
}

#[test]
fn test_select() {
    // Scenario: select('#', ...) counts nils
    assert_eq!(
        run_int("local function f(...) return select('#', ...) end return f(1, nil, 3)"),
        3
    );
    check(
        r#"
        assert(select('#') == 0)
        assert(select(2, 'a', 'b', 'c') == 'b')
        assert(select(-1, 'a', 'b', 'c') == 'c')
        local a, b = select(2, 'x', 'y', 'z')
        assert(a == 'y' and b == 'z')
    "#,
    );
}

#[test]
fn test_assert_and_error() {
    let message = run_err("error('boom')");
    assert!(message.contains("boom"));
    // Position information is prefixed for string errors
    assert!(message.contains("chunk:"), "got: {}", message);

    let message = run_err("assert(false, 'custom')");
    assert!(message.contains("custom"));

    let message = run_err("assert(nil)");
    assert!(message.contains("assertion failed"));
}

#[test]
fn test_error_with_non_string_value() {
    check(
        r#"
        local ok, err = pcall(function() error({code = 42}) end)
        assert(ok == false)
        assert(type(err) == "table")
        assert(err.code == 42)
    "#,
    );
}

#[test]
fn test_pcall() {
    check(
        r#"
        local ok, a, b = pcall(function() return 1, 2 end)
        assert(ok == true and a == 1 and b == 2)

        local ok, err = pcall(function() error("inside") end)
        assert(ok == false)
        assert(string.find(err, "inside") ~= nil)

        -- errors in nested calls are caught too
        local function deep(n)
            if n == 0 then error("deep") end
            return deep(n - 1)
        end
        local ok2 = pcall(deep, 5)
        assert(ok2 == false)
    "#,
    );
}

#[test]
fn test_xpcall() {
    check(
        r#"
        local ok, msg = xpcall(function() error("boom") end, function(e)
            return "handled: " .. e
        end)
        assert(ok == false)
        assert(string.find(msg, "handled: ") == 1)
        assert(string.find(msg, "boom") ~= nil)
    "#,
    );
}

#[test]
fn test_ipairs_and_pairs() {
    check(
        r#"
        local t = {10, 20, 30}
        local sum = 0
        for i, v in ipairs(t) do sum = sum + i * v end
        assert(sum == 10 + 40 + 90)

        local seen = 0
        local u = {a = 1, b = 2, [1] = 3}
        for k, v in pairs(u) do seen = seen + 1 end
        assert(seen == 3)

        -- ipairs stops at the first hole
        local holes = {1, 2, nil, 4}
        local count = 0
        for _ in ipairs(holes) do count = count + 1 end
        assert(count == 2)
    "#,
    );
}

#[test]
fn test_next() {
    check(
        r#"
        assert(next({}) == nil)
        local t = {x = 1}
        local k, v = next(t)
        assert(k == "x" and v == 1)
        assert(next(t, "x") == nil)
    "#,
    );
}

#[test]
fn test_rawget_rawset_rawequal_rawlen() {
    check(
        r#"
        local t = setmetatable({}, {__index = function() return 99 end})
        assert(t.missing == 99)
        assert(rawget(t, "missing") == nil)

        rawset(t, "x", 1)
        assert(t.x == 1)

        assert(rawequal(t, t))
        assert(not rawequal(t, {}))

        assert(rawlen({1, 2, 3}) == 3)
        assert(rawlen("hello") == 5)
    "#,
    );
}

#[test]
fn test_metatable_protection() {
    check(
        r#"
        local t = setmetatable({}, {__metatable = "locked"})
        assert(getmetatable(t) == "locked")
        local ok = pcall(setmetatable, t, {})
        assert(ok == false)
    "#,
    );
}

#[test]
fn test_load() {
    check(
        r#"
        local f = load("return 1 + 2")
        assert(f() == 3)

        local bad, err = load("return +")
        assert(bad == nil)
        assert(type(err) == "string")

        -- load with an explicit environment
        local env = {}
        local g = load("x = 7", "inline", "t", env)
        g()
        assert(env.x == 7)
    "#,
    );
}

#[test]
fn test_multiple_returns_adjustment() {
    // Scenario: non-final calls are truncated to one value
    let values = run("return (function() return 1, 2, 3 end)(), 9");
    assert_eq!(values.len(), 2);
    assert!(matches!(values[0], LuaValue::Integer(1)));
    assert!(matches!(values[1], LuaValue::Integer(9)));

    check(
        r#"
        local function three() return 1, 2, 3 end
        local a, b, c = three()
        assert(a == 1 and b == 2 and c == 3)

        -- parenthesized expressions truncate
        local x, y = (three())
        assert(x == 1 and y == nil)

        -- only the final expression expands
        local p, q, r = three(), 10
        assert(p == 1 and q == 10 and r == nil)
    "#,
    );
}

#[test]
fn test_collectgarbage_count() {
    check(
        r#"
        local kb = collectgarbage("count")
        assert(type(kb) == "number")
        assert(kb >= 0)
    "#,
    );
}

#[test]
fn test_version() {
    assert_eq!(run_str("return _VERSION"), "Lua 5.4");
}

#[test]
fn test_global_table_alias() {
    check(
        r#"
        x = 5
        assert(_G.x == 5)
        _G.y = 6
        assert(y == 6)
        assert(_G._G == _G)
    "#,
    );
}
