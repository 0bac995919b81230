// String library: slicing, formatting, patterns, pack
use crate::test::{check, run_err, run_str};

#[test]
fn test_len_sub() {
    check(
        r#"
        assert(string.len("hello") == 5)
        assert(("hello"):sub(2, 3) == "el")
        assert(("hello"):sub(2) == "ello")
        assert(("hello"):sub(-3) == "llo")
        assert(("hello"):sub(2, -2) == "ell")
        assert(("hello"):sub(5, 1) == "")
        assert(("hello"):sub(0) == "hello")
    "#,
    );
}

#[test]
fn test_case_rep_reverse() {
    check(
        r#"
        assert(("mIxEd"):upper() == "MIXED")
        assert(("mIxEd"):lower() == "mixed")
        assert(("ab"):rep(3) == "ababab")
        assert(("ab"):rep(3, "-") == "ab-ab-ab")
        assert(("ab"):rep(0) == "")
        assert(("abc"):reverse() == "cba")
    "#,
    );
}

#[test]
fn test_byte_char() {
    check(
        r#"
        assert(("A"):byte() == 65)
        local a, b = ("AB"):byte(1, 2)
        assert(a == 65 and b == 66)
        assert(string.char(104, 105) == "hi")
        assert(("x"):byte(-1) == 120)
    "#,
    );
}

#[test]
fn test_format() {
    check(
        r#"
        assert(string.format("%d/%d", 1, 2) == "1/2")
        assert(string.format("%5d", 42) == "   42")
        assert(string.format("%-5d|", 42) == "42   |")
        assert(string.format("%05d", 42) == "00042")
        assert(string.format("%+d", 42) == "+42")
        assert(string.format("%x", 255) == "ff")
        assert(string.format("%X", 255) == "FF")
        assert(string.format("%o", 8) == "10")
        assert(string.format("%c", 65) == "A")
        assert(string.format("%s=%s", "k", "v") == "k=v")
        assert(string.format("%.2f", 3.14159) == "3.14")
        assert(string.format("%e", 1500.0) == "1.500000e+03")
        assert(string.format("%g", 0.00001) == "1e-05")
        assert(string.format("%g", 100.0) == "100")
        assert(string.format("%.3s", "abcdef") == "abc")
        assert(string.format("%%") == "%")
        assert(string.format("%q", 'a"b') == '"a\\"b"')
        assert(string.format("%a", 1.0) == "0x1p+0")
        assert(string.format("%a", 3.0) == "0x1.8p+1")
    "#,
    );
    let message = run_err("return string.format('%d', 1.5)");
    assert!(message.contains("no integer representation"), "got: {}", message);
}

#[test]
fn test_find() {
    check(
        r#"
        assert(string.find("hello world", "world") == 7)
        local s, e = string.find("hello", "l+")
        assert(s == 3 and e == 4)
        assert(string.find("hello", "z") == nil)
        assert(string.find("a.b", ".", 1, true) == 2)
        local s2, e2, cap = string.find("key=value", "(%w+)=")
        assert(s2 == 1 and e2 == 4 and cap == "key")
        -- init offset
        assert(string.find("aaa", "a", 2) == 2)
        assert(string.find("abc", "^b") == nil)
        assert(string.find("abc", "^a") == 1)
    "#,
    );
}

#[test]
fn test_match() {
    check(
        r#"
        assert(string.match("hello 42 world", "%d+") == "42")
        local k, v = string.match("name=lua", "(%w+)=(%w+)")
        assert(k == "name" and v == "lua")
        assert(string.match("abc", "%d") == nil)
        -- position capture
        assert(string.match("abc", "()b") == 2)
        -- anchored
        assert(string.match("  trim  ", "^%s*(.-)%s*$") == "trim")
    "#,
    );
}

#[test]
fn test_gmatch() {
    check(
        r#"
        local words = {}
        for w in string.gmatch("one two three", "%a+") do
            words[#words + 1] = w
        end
        assert(#words == 3 and words[2] == "two")

        local pairs_found = {}
        for k, v in string.gmatch("a=1,b=2", "(%w+)=(%w+)") do
            pairs_found[k] = v
        end
        assert(pairs_found.a == "1" and pairs_found.b == "2")
    "#,
    );
}

#[test]
fn test_gsub() {
    check(
        r#"
        local s, n = string.gsub("hello world", "o", "0")
        assert(s == "hell0 w0rld" and n == 2)

        -- count limit
        local s2 = string.gsub("aaa", "a", "b", 2)
        assert(s2 == "bba")

        -- %1 back-reference in the replacement
        local s3 = string.gsub("hello", "(l+)", "[%1]")
        assert(s3 == "he[ll]o")

        -- %0 is the whole match
        assert(string.gsub("abc", "%a", "<%0>") == "<a><b><c>")

        -- function replacement
        local s4 = string.gsub("1 2 3", "%d", function(d) return tonumber(d) * 2 end)
        assert(s4 == "2 4 6")

        -- table replacement
        local s5 = string.gsub("$x + $y", "%$(%w+)", {x = "10", y = "20"})
        assert(s5 == "10 + 20")

        -- nil replacement keeps the match
        local s6 = string.gsub("keep", "%a+", function() return nil end)
        assert(s6 == "keep")

        -- anchored pattern replaces only at the start
        assert(string.gsub("aaa", "^a", "b") == "baa")
    "#,
    );
}

#[test]
fn test_pattern_classes() {
    check(
        r#"
        assert(string.match("abc123", "%a+") == "abc")
        assert(string.match("abc123", "%d+") == "123")
        assert(string.match("  x", "%s+") == "  ")
        assert(string.match("hi!", "%p") == "!")
        assert(string.match("DEADbeef", "%x+") == "DEADbeef")
        assert(string.match("abc", "%A") == nil)
        assert(string.match("a1", "%D") == "a")
        assert(string.match("word-x", "[%a%-]+") == "word-x")
        assert(string.match("abc", "[^b]+") == "a")
        assert(string.match("(nested (parens))", "%b()") == "(nested (parens))")
        assert(string.match("THE cat", "%f[%l]%l+") == "cat")
    "#,
    );
}

#[test]
fn test_pack_unpack() {
    check(
        r#"
        -- round trip of fixed-size items
        local packed = string.pack("<i4i4", 1, -2)
        assert(#packed == 8)
        local a, b, next_pos = string.unpack("<i4i4", packed)
        assert(a == 1 and b == -2 and next_pos == 9)

        -- endianness is observable
        local be = string.pack(">i2", 1)
        assert(be:byte(1) == 0 and be:byte(2) == 1)
        local le = string.pack("<i2", 1)
        assert(le:byte(1) == 1 and le:byte(2) == 0)

        -- strings with length prefix and zero-terminated
        local s = string.pack("<s4", "hey")
        local out = string.unpack("<s4", s)
        assert(out == "hey")
        local z = string.pack("z", "abc")
        assert(#z == 4)
        assert(string.unpack("z", z) == "abc")

        -- doubles survive exactly
        local d = string.pack("d", 3.25)
        assert(string.unpack("d", d) == 3.25)

        -- sizes
        assert(string.packsize("<i4i8") == 12)
        assert(string.packsize("bxH") == 4)

        -- range check
        local ok = pcall(string.pack, "b", 1000)
        assert(ok == false)
    "#,
    );
}

#[test]
fn test_embedded_zeros() {
    check(
        r#"
        local s = "a\0b"
        assert(#s == 3)
        assert(s:byte(2) == 0)
        assert(s == "a\0b")
        assert(s ~= "a\0c")
    "#,
    );
    assert_eq!(run_str(r#"return "x\065y""#), "xAy");
    assert_eq!(run_str(r#"return "\x41\x42""#), "AB");
    assert_eq!(run_str(r#"return "\u{48}\u{49}""#), "HI");
}

#[test]
fn test_long_strings() {
    assert_eq!(run_str("return [[plain]]"), "plain");
    assert_eq!(run_str("return [==[with ]] inside]==]"), "with ]] inside");
    // The first newline after the opener is skipped
    assert_eq!(run_str("return [[\nline]]"), "line");
}
