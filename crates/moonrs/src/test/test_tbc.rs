// const attributes and to-be-closed bindings
use crate::lua_value::LuaValue;
use crate::test::{check, run, run_err};

#[test]
fn test_const_rejects_assignment() {
    // Scenario: pcall observes the const violation
    let values = run(
        r#"
        local ok, err = pcall(function()
            local x <const> = 1
            x = 2
        end)
        return ok, err
    "#,
    );
    assert!(matches!(values[0], LuaValue::Boolean(false)));
    let message = values[1].to_display_string();
    assert!(message.contains("const"), "got: {}", message);
}

#[test]
fn test_const_reads_fine() {
    check(
        r#"
        local limit <const> = 10
        local total = 0
        for i = 1, limit do total = total + 1 end
        assert(total == limit)
    "#,
    );
}

#[test]
fn test_close_lifo_order() {
    // Scenario: closers run in reverse declaration order
    let values = run(
        r#"
        local log = {}
        do
            local r <close> = setmetatable({}, {__close = function() log[#log + 1] = 'a' end})
            local s <close> = setmetatable({}, {__close = function() log[#log + 1] = 'b' end})
        end
        return log[1], log[2]
    "#,
    );
    assert_eq!(values[0].as_str(), Some("b"));
    assert_eq!(values[1].as_str(), Some("a"));
}

#[test]
fn test_close_runs_on_break_and_return() {
    check(
        r#"
        local events = {}
        local function tracked(name)
            return setmetatable({}, {__close = function()
                events[#events + 1] = name
            end})
        end

        for i = 1, 3 do
            local guard <close> = tracked("loop" .. i)
            if i == 2 then break end
        end
        assert(events[1] == "loop1" and events[2] == "loop2" and #events == 2)

        local function f()
            local guard <close> = tracked("fn")
            return "done"
        end
        assert(f() == "done")
        assert(events[3] == "fn")
    "#,
    );
}

#[test]
fn test_close_runs_on_error() {
    check(
        r#"
        local closed = false
        local ok, err = pcall(function()
            local guard <close> = setmetatable({}, {__close = function(_, e)
                closed = true
                -- the in-flight error is passed as the second argument
                assert(e ~= nil)
            end})
            error("fail")
        end)
        assert(ok == false)
        assert(closed == true)
        assert(string.find(err, "fail") ~= nil)
    "#,
    );
}

#[test]
fn test_close_receives_nil_on_clean_exit() {
    check(
        r#"
        local seen = "unset"
        do
            local guard <close> = setmetatable({}, {__close = function(_, e)
                seen = e
            end})
        end
        assert(seen == nil)
    "#,
    );
}

#[test]
fn test_close_error_propagates() {
    let message = run_err(
        r#"
        do
            local guard <close> = setmetatable({}, {__close = function()
                error("closer failed")
            end})
        end
    "#,
    );
    assert!(message.contains("closer failed"), "got: {}", message);
}

#[test]
fn test_close_requires_closable_value() {
    let message = run_err("local x <close> = 42");
    assert!(message.contains("non-closable"), "got: {}", message);
    // nil and false are acceptable and simply skipped
    check(
        r#"
        do
            local a <close> = nil
            local b <close> = false
        end
    "#,
    );
}

#[test]
fn test_close_on_goto_exit() {
    check(
        r#"
        local closed = 0
        do
            goto past
            ::unused::
        end
        ::past::

        local log = {}
        for i = 1, 2 do
            local guard <close> = setmetatable({}, {__close = function()
                log[#log + 1] = i
            end})
            goto continue
            ::continue::
        end
        assert(#log == 2 and log[1] == 1 and log[2] == 2)
        assert(closed == 0)
    "#,
    );
}

#[test]
fn test_generic_for_closing_value() {
    check(
        r#"
        local released = false
        local resource = setmetatable({}, {__close = function() released = true end})
        local function iter(_, i)
            if i < 2 then return i + 1 end
        end
        for v in iter, nil, 0, resource do end
        assert(released == true)
    "#,
    );
}
