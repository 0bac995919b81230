// Operator semantics: integer/float duality, wrapping, floor division,
// bitwise, comparison, concatenation, length
use crate::test::{check, run_err, run_str};

#[test]
fn test_integer_float_duality() {
    check(
        r#"
        assert(3 == 3.0)
        assert(math.type(3) == "integer")
        assert(math.type(3.0) == "float")
        assert(math.type(3) ~= math.type(3.0))
        assert(1 + 2 == 3 and math.type(1 + 2) == "integer")
        assert(1 + 2.0 == 3.0 and math.type(1 + 2.0) == "float")
        assert(math.type(2^2) == "float")
        assert(math.type(7 / 2) == "float")
        assert(7 / 2 == 3.5)
    "#,
    );
}

#[test]
fn test_integer_wrap() {
    check(
        r#"
        assert(math.maxinteger + 1 == math.mininteger)
        assert(math.mininteger - 1 == math.maxinteger)
        assert(math.maxinteger * 2 == -2)
        assert(-math.mininteger == math.mininteger)
    "#,
    );
}

#[test]
fn test_floor_division_and_modulo() {
    check(
        r#"
        assert(7 // 2 == 3)
        assert(-7 // 2 == -4)
        assert(7 // -2 == -4)
        assert(7.0 // 2 == 3.0)
        assert(math.type(7.0 // 2) == "float")

        -- result takes the sign of the divisor
        assert(7 % 3 == 1)
        assert(-7 % 3 == 2)
        assert(7 % -3 == -2)
        assert(-7 % -3 == -1)
        assert(5.5 % 2 == 1.5)
        assert(-5.5 % 2 == 0.5)
    "#,
    );
}

#[test]
fn test_integer_division_by_zero_raises() {
    let message = run_err("return 1 // 0");
    assert!(message.contains("n//0"), "got: {}", message);
    let message = run_err("return 1 % 0");
    assert!(message.contains("n%0"), "got: {}", message);
    // Float division by zero is inf, not an error
    check("assert(1 / 0 == math.huge) assert(1.0 // 0 == math.huge)");
}

#[test]
fn test_bitwise() {
    check(
        r#"
        assert(0xF0 & 0x3C == 0x30)
        assert(0xF0 | 0x0F == 0xFF)
        assert(0xF0 ~ 0xFF == 0x0F)
        assert(~0 == -1)
        assert(1 << 4 == 16)
        assert(16 >> 4 == 1)
        -- shifts are logical and saturate past 63
        assert(-1 >> 1 == 0x7fffffffffffffff)
        assert(1 << 64 == 0)
        assert(1 << -4 == 0)
        assert(1 >> -4 == 16)
        -- floats with exact integer values are accepted
        assert(3.0 & 1 == 1)
    "#,
    );
    let message = run_err("return 1.5 & 1");
    assert!(message.contains("no integer representation"), "got: {}", message);
}

#[test]
fn test_string_number_coercion() {
    check(
        r#"
        assert("10" + 1 == 11)
        assert("0x10" * 2 == 32)
        assert(10 .. "" == "10")
        assert("3" .. "4" == "34")
        assert("2" * "3" == 6)
    "#,
    );
    let message = run_err("return {} + 1");
    assert!(message.contains("arithmetic"), "got: {}", message);
}

#[test]
fn test_comparison() {
    check(
        r#"
        assert(1 < 2)
        assert(2 <= 2)
        assert(3 > 2.5)
        assert(2.5 >= 2.5)
        assert("a" < "b")
        assert("abc" < "abd")
        assert("" < "a")
        assert(not (1 < 1))
        -- exact mixed comparison near 2^63
        assert(math.maxinteger < 9.3e18)
        assert(not (9.3e18 < math.maxinteger))
        -- NaN compares false with everything
        local nan = 0/0
        assert(not (nan < 1) and not (nan <= 1) and not (nan == nan))
    "#,
    );
    let message = run_err("return 1 < 'x'");
    assert!(message.contains("compare"), "got: {}", message);
}

#[test]
fn test_concat_loop() {
    // Scenario: numbers fuse into the string left to right
    assert_eq!(
        run_str("local s = '' for i = 1, 4 do s = s .. i end return s"),
        "1234"
    );
    check(
        r#"
        assert("a" .. "b" .. "c" == "abc")
        assert(1 .. 2 == "12")
        assert(1.5 .. "x" == "1.5x")
    "#,
    );
    let message = run_err("return 'a' .. {}");
    assert!(message.contains("concatenate"), "got: {}", message);
}

#[test]
fn test_length() {
    check(
        r#"
        assert(#"hello" == 5)
        assert(#"" == 0)
        assert(#{1, 2, 3} == 3)
        assert(#{} == 0)
    "#,
    );
    let message = run_err("return #42");
    assert!(message.contains("length"), "got: {}", message);
}

#[test]
fn test_logical_operators() {
    check(
        r#"
        -- and/or return their operands
        assert((nil and 1) == nil)
        assert((false or "x") == "x")
        assert((1 and 2) == 2)
        assert((nil or nil) == nil)
        assert(not nil == true)
        assert(not 0 == false)  -- zero is truthy

        -- short-circuit: the right side must not evaluate
        local evaluated = false
        local function touch() evaluated = true return true end
        local _ = false and touch()
        assert(evaluated == false)
        local _ = true or touch()
        assert(evaluated == false)
    "#,
    );
}

#[test]
fn test_unary_minus() {
    check(
        r#"
        assert(-(-5) == 5)
        assert(-"3" == -3)
        local x = 2
        assert(-x^2 == -4)  -- ^ binds tighter than unary minus
        assert((-x)^2 == 4)
        assert(2^-1 == 0.5)
    "#,
    );
}

#[test]
fn test_precedence_and_associativity() {
    check(
        r#"
        assert(1 + 2 * 3 == 7)
        assert((1 + 2) * 3 == 9)
        assert(2 ^ 3 ^ 2 == 512)        -- right associative
        assert("a" .. "b" .. "c" == "abc")
        assert(1 < 2 == true)            -- comparison binds tighter than ==
        assert(1 | 2 ~ 3 == 1 | (2 ~ 3))
        assert(1 << 2 + 1 == 8)          -- + binds tighter than <<
        assert(not true == false)
    "#,
    );
}

#[test]
fn test_float_formatting() {
    assert_eq!(run_str("return tostring(1e20)"), "1e+20");
    assert_eq!(run_str("return tostring(0.1)"), "0.1");
    assert_eq!(run_str("return tostring(1/0)"), "inf");
    assert_eq!(run_str("return tostring(-1/0)"), "-inf");
    assert_eq!(run_str("return tostring(100.0)"), "100.0");
}
