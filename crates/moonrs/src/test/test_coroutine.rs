// Coroutines: stackful yield/resume across call depth
use crate::test::{check, run_int};

#[test]
fn test_create_resume_yield() {
    check(
        r#"
        local co = coroutine.create(function(a, b)
            local c = coroutine.yield(a + b)
            return c * 2
        end)
        assert(coroutine.status(co) == "suspended")

        local ok, sum = coroutine.resume(co, 3, 4)
        assert(ok == true and sum == 7)
        assert(coroutine.status(co) == "suspended")

        local ok2, doubled = coroutine.resume(co, 10)
        assert(ok2 == true and doubled == 20)
        assert(coroutine.status(co) == "dead")

        local ok3, err = coroutine.resume(co)
        assert(ok3 == false)
        assert(string.find(err, "dead") ~= nil)
    "#,
    );
}

#[test]
fn test_yield_across_call_depth() {
    // Yield from a helper function several frames down
    assert_eq!(
        run_int(
            r#"
            local function inner(x)
                return coroutine.yield(x * 10)
            end
            local function middle(x)
                return inner(x + 1)
            end
            local co = coroutine.create(function(x)
                return middle(x)
            end)
            local _, v = coroutine.resume(co, 2)
            local _, final = coroutine.resume(co, 99)
            return v + final
        "#
        ),
        30 + 99
    );
}

#[test]
fn test_wrap() {
    check(
        r#"
        local gen = coroutine.wrap(function()
            for i = 1, 3 do coroutine.yield(i) end
        end)
        assert(gen() == 1)
        assert(gen() == 2)
        assert(gen() == 3)

        -- errors re-raise through the wrapper
        local bad = coroutine.wrap(function() error("inside") end)
        local ok, err = pcall(bad)
        assert(ok == false)
        assert(string.find(err, "inside") ~= nil)
    "#,
    );
}

#[test]
fn test_generator_pattern() {
    assert_eq!(
        run_int(
            r#"
            local function squares(n)
                return coroutine.wrap(function()
                    for i = 1, n do coroutine.yield(i * i) end
                end)
            end
            local total = 0
            for sq in squares(4) do total = total + sq end
            return total
        "#
        ),
        1 + 4 + 9 + 16
    );
}

#[test]
fn test_error_in_coroutine_does_not_kill_host() {
    check(
        r#"
        local co = coroutine.create(function() error("boom") end)
        local ok, err = coroutine.resume(co)
        assert(ok == false)
        assert(string.find(err, "boom") ~= nil)
        assert(coroutine.status(co) == "dead")
        -- the main state keeps going
        assert(1 + 1 == 2)
    "#,
    );
}

#[test]
fn test_isyieldable_and_running() {
    check(
        r#"
        assert(coroutine.isyieldable() == false)
        local co_seen, main_seen
        local co = coroutine.create(function()
            co_seen = coroutine.isyieldable()
            local current, is_main = coroutine.running()
            main_seen = is_main
        end)
        local _, is_main_outside = coroutine.running()
        assert(is_main_outside == true)
        assert(coroutine.resume(co))
        assert(co_seen == true)
        assert(main_seen == false)
    "#,
    );
}

#[test]
fn test_yield_outside_coroutine_raises() {
    check(
        r#"
        local ok, err = pcall(coroutine.yield)
        assert(ok == false)
        assert(string.find(err, "yield") ~= nil)
    "#,
    );
}

#[test]
fn test_close() {
    check(
        r#"
        local co = coroutine.create(function() coroutine.yield() end)
        coroutine.resume(co)
        assert(coroutine.status(co) == "suspended")
        assert(coroutine.close(co) == true)
        assert(coroutine.status(co) == "dead")
        -- closing a dead coroutine is fine
        assert(coroutine.close(co) == true)
    "#,
    );
}

#[test]
fn test_pcall_inside_coroutine() {
    check(
        r#"
        -- yields cross pcall boundaries in this runtime
        local co = coroutine.create(function()
            local ok, v = pcall(function()
                return coroutine.yield("from pcall")
            end)
            return ok, v
        end)
        local _, msg = coroutine.resume(co)
        assert(msg == "from pcall")
        local _, ok, v = coroutine.resume(co, "answer")
        assert(ok == true and v == "answer")
    "#,
    );
}

#[test]
fn test_values_round_trip() {
    check(
        r#"
        local co = coroutine.create(function(...)
            local got = select('#', ...)
            local a, b = coroutine.yield(got)
            return a, b
        end)
        local _, n = coroutine.resume(co, 'x', 'y', 'z')
        assert(n == 3)
        local _, a, b = coroutine.resume(co, 10, 20)
        assert(a == 10 and b == 20)
    "#,
    );
}
