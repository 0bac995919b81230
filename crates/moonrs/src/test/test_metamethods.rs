// Metamethod dispatch
use crate::test::{check, run_err, run_int};

#[test]
fn test_index_function() {
    // Scenario: __index computes missing keys
    assert_eq!(
        run_int(
            r#"
            local t = {}
            setmetatable(t, {__index = function(_, k) return k * 2 end})
            return t[21]
        "#
        ),
        42
    );
}

#[test]
fn test_index_table_chain() {
    check(
        r#"
        local base = {greet = "hello"}
        local mid = setmetatable({}, {__index = base})
        local leaf = setmetatable({}, {__index = mid})
        assert(leaf.greet == "hello")
        -- present keys do not consult the chain
        leaf.greet = "hi"
        assert(leaf.greet == "hi")
        assert(base.greet == "hello")
    "#,
    );
}

#[test]
fn test_newindex() {
    check(
        r#"
        local store = {}
        local t = setmetatable({}, {
            __newindex = function(_, k, v) store[k] = v end,
        })
        t.x = 1
        assert(store.x == 1)
        assert(rawget(t, "x") == nil)

        -- __newindex as a table redirects writes
        local target = {}
        local u = setmetatable({}, {__newindex = target})
        u.y = 2
        assert(target.y == 2)

        -- raw writes bypass the handler
        rawset(t, "z", 3)
        assert(rawget(t, "z") == 3)
    "#,
    );
}

#[test]
fn test_arithmetic_metamethods() {
    check(
        r#"
        local mt = {
            __add = function(a, b) return a.v + b.v end,
            __mul = function(a, b) return a.v * b.v end,
            __unm = function(a) return -a.v end,
        }
        local function box(v) return setmetatable({v = v}, mt) end
        assert(box(2) + box(3) == 5)
        assert(box(4) * box(5) == 20)
        assert(-box(7) == -7)

        -- left operand tried first, then right
        local right = setmetatable({}, {__add = function(a, b) return "right" end})
        assert(1 + right == "right")
    "#,
    );
}

#[test]
fn test_eq_lt_le() {
    check(
        r#"
        local mt = {
            __eq = function(a, b) return a.id == b.id end,
            __lt = function(a, b) return a.id < b.id end,
            __le = function(a, b) return a.id <= b.id end,
        }
        local function item(id) return setmetatable({id = id}, mt) end
        assert(item(1) == item(1))
        assert(item(1) ~= item(2))
        assert(item(1) < item(2))
        assert(item(2) <= item(2))
        assert(item(3) > item(2))

        -- __eq is not consulted for mixed types
        assert(item(1) ~= 1)
    "#,
    );
}

#[test]
fn test_call_metamethod() {
    assert_eq!(
        run_int(
            r#"
            local callable = setmetatable({}, {
                __call = function(self, a, b) return a + b end,
            })
            return callable(19, 23)
        "#
        ),
        42
    );
    let message = run_err("local t = {} t()");
    assert!(message.contains("attempt to call a table value"), "got: {}", message);
}

#[test]
fn test_len_and_concat() {
    check(
        r#"
        local t = setmetatable({}, {__len = function() return 99 end})
        assert(#t == 99)

        local c = setmetatable({}, {__concat = function(a, b)
            if type(a) == "table" then a = "T" end
            if type(b) == "table" then b = "T" end
            return a .. "/" .. b
        end})
        assert(c .. "x" == "T/x")
        assert("x" .. c == "x/T")
    "#,
    );
}

#[test]
fn test_tostring_metamethod() {
    check(
        r#"
        local t = setmetatable({}, {__tostring = function() return "custom" end})
        assert(tostring(t) == "custom")
    "#,
    );
}

#[test]
fn test_rawget_unaffected_by_index() {
    // Installing or removing __index never changes raw access
    check(
        r#"
        local t = {present = 1}
        local before = rawget(t, "present")
        setmetatable(t, {__index = function() return "shadow" end})
        assert(rawget(t, "present") == before)
        assert(rawget(t, "absent") == nil)
        setmetatable(t, nil)
        assert(rawget(t, "present") == before)
    "#,
    );
}

#[test]
fn test_index_errors() {
    let message = run_err("local x = nil return x.field");
    assert!(message.contains("attempt to index a nil value"), "got: {}", message);
    let message = run_err("return (5).field");
    assert!(message.contains("attempt to index a number value"), "got: {}", message);
}

#[test]
fn test_index_chain_loop_detected() {
    check(
        r#"
        local a = {}
        local b = {}
        setmetatable(a, {__index = b})
        setmetatable(b, {__index = a})
        local ok, err = pcall(function() return a.missing end)
        assert(ok == false)
        assert(string.find(err, "__index") ~= nil)
    "#,
    );
}

#[test]
fn test_string_methods_via_metatable() {
    check(
        r#"
        local s = "Hello"
        assert(s:len() == 5)
        assert(s:upper() == "HELLO")
        assert(("abc"):sub(2) == "bc")
        assert(string.len == ("x").len)
    "#,
    );
}
