// Table library and table semantics
use crate::test::{check, run_int};

#[test]
fn test_constructor_forms() {
    check(
        r#"
        local t = {10, 20, 30}
        assert(t[1] + t[2] + t[3] == 60)

        local u = {x = 1, ["y z"] = 2, [10] = 3, 4}
        assert(u.x == 1 and u["y z"] == 2 and u[10] == 3 and u[1] == 4)

        -- trailing call expands
        local function multi() return 7, 8, 9 end
        local v = {0, multi()}
        assert(#v == 4 and v[4] == 9)

        -- non-trailing call truncates
        local w = {multi(), 0}
        assert(w[1] == 7 and w[2] == 0)
    "#,
    );
}

#[test]
fn test_sum_scenario() {
    assert_eq!(
        run_int("local t = {10, 20, 30} return t[1] + t[2] + t[3]"),
        60
    );
}

#[test]
fn test_float_keys_normalize() {
    check(
        r#"
        local t = {}
        t[1.0] = "one"
        assert(t[1] == "one")
        t[2] = "two"
        assert(t[2.0] == "two")
        assert(#t == 2)
    "#,
    );
}

#[test]
fn test_nil_key_raises() {
    check(
        r#"
        local t = {}
        local ok, err = pcall(function() t[nil] = 1 end)
        assert(ok == false and string.find(err, "nil") ~= nil)
        local ok2, err2 = pcall(function() t[0/0] = 1 end)
        assert(ok2 == false and string.find(err2, "NaN") ~= nil)
        -- reading a nil key is fine
        assert(t[nil] == nil)
    "#,
    );
}

#[test]
fn test_length_border() {
    check(
        r#"
        -- #t satisfies the border definition
        local cases = {
            {},
            {1},
            {1, 2, 3},
            {1, 2, 3, nil},
            {nil},
            {[1] = 1, [2] = 2, [3] = 3},
        }
        for _, t in ipairs(cases) do
            local n = #t
            assert(n >= 0)
            if n > 0 then assert(t[n] ~= nil) end
            assert(t[n + 1] == nil)
        end
    "#,
    );
}

#[test]
fn test_insert_remove() {
    check(
        r#"
        local t = {}
        table.insert(t, "a")
        table.insert(t, "b")
        table.insert(t, 1, "front")
        assert(t[1] == "front" and t[2] == "a" and t[3] == "b")

        local popped = table.remove(t)
        assert(popped == "b" and #t == 2)
        local front = table.remove(t, 1)
        assert(front == "front" and t[1] == "a" and #t == 1)

        assert(table.remove({}) == nil)
    "#,
    );
}

#[test]
fn test_concat() {
    check(
        r#"
        assert(table.concat({1, 2, 3}) == "123")
        assert(table.concat({1, 2, 3}, "-") == "1-2-3")
        assert(table.concat({"a", "b", "c"}, ",", 2, 3) == "b,c")
        assert(table.concat({}) == "")
        local ok = pcall(table.concat, {true})
        assert(ok == false)
    "#,
    );
}

#[test]
fn test_sort() {
    check(
        r#"
        local t = {5, 2, 8, 1, 9}
        table.sort(t)
        assert(table.concat(t, ",") == "1,2,5,8,9")

        table.sort(t, function(a, b) return a > b end)
        assert(table.concat(t, ",") == "9,8,5,2,1")

        local words = {"pear", "apple", "cherry"}
        table.sort(words)
        assert(words[1] == "apple" and words[3] == "pear")

        -- a raising comparator propagates through pcall
        local ok = pcall(table.sort, {3, 1, 2}, function() error("bad cmp") end)
        assert(ok == false)
    "#,
    );
}

#[test]
fn test_unpack_pack() {
    check(
        r#"
        local a, b, c = table.unpack({1, 2, 3})
        assert(a == 1 and b == 2 and c == 3)
        local x, y = table.unpack({1, 2, 3}, 2, 3)
        assert(x == 2 and y == 3)

        -- global alias
        assert(unpack ~= nil)

        local packed = table.pack(7, nil, 9)
        assert(packed.n == 3 and packed[1] == 7 and packed[3] == 9)
    "#,
    );
}

#[test]
fn test_move() {
    check(
        r#"
        local src = {1, 2, 3, 4, 5}
        local dst = {}
        table.move(src, 2, 4, 1, dst)
        assert(dst[1] == 2 and dst[2] == 3 and dst[3] == 4)

        -- overlapping move within one table
        local t = {1, 2, 3, 4, 5}
        table.move(t, 1, 3, 2)
        assert(t[1] == 1 and t[2] == 1 and t[3] == 2 and t[4] == 3)
    "#,
    );
}

#[test]
fn test_sparse_fill_migration() {
    check(
        r#"
        -- out-of-order integer fill still yields a dense sequence
        local t = {}
        t[3] = "c"
        t[1] = "a"
        t[2] = "b"
        assert(#t == 3)
        assert(t[1] == "a" and t[2] == "b" and t[3] == "c")
    "#,
    );
}

#[test]
fn test_cycles_allowed() {
    check(
        r#"
        local a = {}
        local b = {other = a}
        a.other = b
        a.self = a
        assert(a.self.self == a)
        assert(a.other.other == a)
        -- a table can be its own key
        a[a] = "me"
        assert(a[a] == "me")
    "#,
    );
}

#[test]
fn test_next_during_removal() {
    check(
        r#"
        -- removing the current key during traversal is allowed
        local t = {a = 1, b = 2, c = 3}
        local seen = 0
        local k, v = next(t)
        while k ~= nil do
            seen = seen + 1
            local dead = k
            local nk, nv = next(t, k)
            t[dead] = nil
            k, v = nk, nv
        end
        assert(seen == 3)
        assert(next(t) == nil)
    "#,
    );
}
