// utf8 library
use crate::test::{check, run_int, run_str};

#[test]
fn test_char_and_codepoint() {
    assert_eq!(run_str("return utf8.char(72, 105)"), "Hi");
    assert_eq!(run_str("return utf8.char(0x4E2D)"), "中");
    check(
        r#"
        assert(utf8.codepoint("A") == 65)
        assert(utf8.codepoint("中") == 0x4E2D)
        local a, b = utf8.codepoint("hi", 1, 2)
        assert(a == 104 and b == 105)
        -- round trip
        assert(utf8.char(utf8.codepoint("é")) == "é")
    "#,
    );
}

#[test]
fn test_len() {
    check(
        r#"
        assert(utf8.len("") == 0)
        assert(utf8.len("abc") == 3)
        assert(utf8.len("中文字") == 3)
        assert(utf8.len("naïve") == 5)
        -- invalid byte reports its position
        local n, pos = utf8.len("a\xFFb")
        assert(n == nil and pos == 2)
    "#,
    );
}

#[test]
fn test_offset() {
    check(
        r#"
        local s = "中文字"
        assert(utf8.offset(s, 1) == 1)
        assert(utf8.offset(s, 2) == 4)
        assert(utf8.offset(s, 3) == 7)
        assert(utf8.offset(s, -1) == 7)
        assert(utf8.offset(s, 4) == #s + 1)
    "#,
    );
}

#[test]
fn test_codes() {
    assert_eq!(
        run_int(
            r#"
            local count = 0
            local last = 0
            for pos, code in utf8.codes("a中b") do
                count = count + 1
                last = code
            end
            return count * 1000 + last
        "#
        ),
        3 * 1000 + 98
    );
}

#[test]
fn test_charpattern() {
    check(
        r#"
        local chars = {}
        for c in string.gmatch("a中b", utf8.charpattern) do
            chars[#chars + 1] = c
        end
        assert(#chars == 3)
        assert(chars[2] == "中")
    "#,
    );
}
