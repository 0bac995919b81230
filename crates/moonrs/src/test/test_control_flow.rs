// Control flow: if/while/repeat, numeric and generic for, goto, break
use crate::test::{check, run, run_err, run_int};

#[test]
fn test_if_chain() {
    check(
        r#"
        local function classify(n)
            if n < 0 then return "negative"
            elseif n == 0 then return "zero"
            elseif n < 10 then return "small"
            else return "large"
            end
        end
        assert(classify(-1) == "negative")
        assert(classify(0) == "zero")
        assert(classify(5) == "small")
        assert(classify(99) == "large")
    "#,
    );
}

#[test]
fn test_while_and_break() {
    assert_eq!(
        run_int(
            r#"
            local n = 0
            while true do
                n = n + 1
                if n == 10 then break end
            end
            return n
        "#
        ),
        10
    );
}

#[test]
fn test_repeat_until_sees_body_locals() {
    // The until condition runs in the body scope
    assert_eq!(
        run_int(
            r#"
            local count = 0
            repeat
                local done = count >= 3
                count = count + 1
            until done
            return count
        "#
        ),
        4
    );
}

#[test]
fn test_numeric_for() {
    check(
        r#"
        local sum = 0
        for i = 1, 10 do sum = sum + i end
        assert(sum == 55)

        local down = {}
        for i = 3, 1, -1 do down[#down + 1] = i end
        assert(down[1] == 3 and down[3] == 1)

        -- float stepping
        local steps = 0
        for x = 1, 2, 0.5 do steps = steps + 1 end
        assert(steps == 3)

        -- the loop variable is local to the loop
        for i = 1, 1 do end
        assert(i == nil)
    "#,
    );
}

#[test]
fn test_numeric_for_empty_range() {
    // Scenario: a descending-from-below range never runs the body
    let values = run("for i = 1, 0 do error('x') end return 'done'");
    assert_eq!(values[0].as_str(), Some("done"));
}

#[test]
fn test_numeric_for_zero_step_raises() {
    let message = run_err("for i = 1, 10, 0 do end");
    assert!(message.contains("'for' step is zero"), "got: {}", message);
}

#[test]
fn test_numeric_for_overflow_terminates() {
    assert_eq!(
        run_int(
            r#"
            local count = 0
            for i = math.maxinteger - 2, math.maxinteger do count = count + 1 end
            return count
        "#
        ),
        3
    );
}

#[test]
fn test_generic_for() {
    check(
        r#"
        -- a hand-written stateless iterator
        local function range(n)
            local function step(limit, i)
                i = i + 1
                if i <= limit then return i, i * i end
            end
            return step, n, 0
        end
        local total = 0
        for i, sq in range(4) do total = total + sq end
        assert(total == 1 + 4 + 9 + 16)
    "#,
    );
}

#[test]
fn test_goto_backward() {
    assert_eq!(
        run_int(
            r#"
            local i = 1
            ::top::
            i = i + 1
            if i < 4 then goto top end
            return i
        "#
        ),
        4
    );
}

#[test]
fn test_goto_forward_as_continue() {
    assert_eq!(
        run_int(
            r#"
            local sum = 0
            for i = 1, 10 do
                if i % 2 == 0 then goto continue end
                sum = sum + i
                ::continue::
            end
            return sum
        "#
        ),
        25
    );
}

#[test]
fn test_goto_without_label_raises() {
    let message = run_err("goto nowhere");
    assert!(message.contains("nowhere"), "got: {}", message);
}

#[test]
fn test_nested_break() {
    assert_eq!(
        run_int(
            r#"
            local hits = 0
            for i = 1, 3 do
                for j = 1, 3 do
                    if j == 2 then break end
                    hits = hits + 1
                end
            end
            return hits
        "#
        ),
        3
    );
}

#[test]
fn test_do_block_scoping() {
    check(
        r#"
        local x = 1
        do
            local x = 2
            assert(x == 2)
        end
        assert(x == 1)
    "#,
    );
}

#[test]
fn test_return_from_nested_blocks() {
    assert_eq!(
        run_int(
            r#"
            local function find(t, needle)
                for i = 1, #t do
                    if t[i] == needle then
                        return i
                    end
                end
                return -1
            end
            return find({"a", "b", "c"}, "b")
        "#
        ),
        2
    );
}

#[test]
fn test_closures_and_upvalues() {
    check(
        r#"
        local function counter()
            local n = 0
            return function()
                n = n + 1
                return n
            end
        end
        local c1 = counter()
        local c2 = counter()
        assert(c1() == 1 and c1() == 2 and c1() == 3)
        assert(c2() == 1)  -- independent cells

        -- loop variables are fresh per iteration
        local fns = {}
        for i = 1, 3 do fns[i] = function() return i end end
        assert(fns[1]() == 1 and fns[2]() == 2 and fns[3]() == 3)

        -- shared upvalue between two closures
        local function pair()
            local v = 0
            return function() v = v + 1 end, function() return v end
        end
        local bump, read = pair()
        bump() bump()
        assert(read() == 2)
    "#,
    );
}

#[test]
fn test_recursion() {
    assert_eq!(
        run_int(
            r#"
            local function fib(n)
                if n < 2 then return n end
                return fib(n - 1) + fib(n - 2)
            end
            return fib(15)
        "#
        ),
        610
    );
}

#[test]
fn test_stack_overflow_is_caught() {
    check(
        r#"
        local function loop() return loop() + 1 end
        local ok, err = pcall(loop)
        assert(ok == false)
        assert(string.find(err, "stack overflow") ~= nil)
    "#,
    );
}

#[test]
fn test_env_indirection() {
    check(
        r#"
        -- every free name x is _ENV.x
        shared = 1
        assert(_ENV.shared == 1)
        _ENV.shared = 2
        assert(shared == 2)

        -- rebinding _ENV redirects global access
        local sandbox = {}
        do
            local _ENV = sandbox
            hidden = 42
        end
        assert(sandbox.hidden == 42)
        assert(rawget(_G, "hidden") == nil)
    "#,
    );
}

#[test]
fn test_vararg_propagation() {
    check(
        r#"
        local function pass(...) return ... end
        local a, b, c = pass(1, 2, 3)
        assert(a == 1 and b == 2 and c == 3)

        local function count(...) return select('#', ...) end
        assert(count() == 0)
        assert(count(nil) == 1)
        assert(count(1, nil, nil) == 3)

        -- vararg in the middle contributes one value
        local function first(...) return (...), "tail" end
        local x, y = first(7, 8, 9)
        assert(x == 7 and y == "tail")

        -- table constructor expands a trailing vararg
        local function collect(...) return {...} end
        local t = collect(4, 5, 6)
        assert(#t == 3 and t[3] == 6)
    "#,
    );
}
