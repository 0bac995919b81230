// Numeric literal decoding
// Decimal integers overflowing i64 fall back to float; hex integers wrap
// into the signed 64-bit domain, matching reference lexer behavior.

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumberValue {
    Int(i64),
    Float(f64),
}

/// Decode an unsigned Lua numeric literal (the lexer guarantees shape,
/// this still rejects leftovers defensively).
pub fn parse_lua_number(text: &str) -> Option<NumberValue> {
    let text = text.trim();
    if let Some(hex) = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        return parse_hex(hex);
    }

    if !text.contains(['.', 'e', 'E']) {
        match text.parse::<i64>() {
            Ok(i) => return Some(NumberValue::Int(i)),
            Err(e) if matches!(
                e.kind(),
                std::num::IntErrorKind::PosOverflow | std::num::IntErrorKind::NegOverflow
            ) =>
            {
                // Integer constant too large: take the float value
                return text.parse::<f64>().ok().map(NumberValue::Float);
            }
            Err(_) => return None,
        }
    }

    text.parse::<f64>().ok().map(NumberValue::Float)
}

fn parse_hex(body: &str) -> Option<NumberValue> {
    let bytes = body.as_bytes();
    let mut i = 0;

    let mut mantissa: f64 = 0.0;
    let mut int_acc: u64 = 0;
    let mut digits = 0usize;
    let mut exponent: i32 = 0;
    let mut seen_dot = false;
    let mut is_float = false;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(d) = (b as char).to_digit(16) {
            mantissa = mantissa * 16.0 + d as f64;
            int_acc = int_acc.wrapping_mul(16).wrapping_add(d as u64);
            if seen_dot {
                exponent -= 4;
            }
            digits += 1;
            i += 1;
        } else if b == b'.' && !seen_dot {
            seen_dot = true;
            is_float = true;
            i += 1;
        } else {
            break;
        }
    }

    if digits == 0 {
        return None;
    }

    if i < bytes.len() && matches!(bytes[i], b'p' | b'P') {
        is_float = true;
        i += 1;
        let mut sign = 1i32;
        if i < bytes.len() && matches!(bytes[i], b'+' | b'-') {
            if bytes[i] == b'-' {
                sign = -1;
            }
            i += 1;
        }
        let mut exp_digits = 0usize;
        let mut exp_val: i32 = 0;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            exp_val = exp_val.saturating_mul(10).saturating_add((bytes[i] - b'0') as i32);
            exp_digits += 1;
            i += 1;
        }
        if exp_digits == 0 {
            return None;
        }
        exponent = exponent.saturating_add(sign.saturating_mul(exp_val));
    }

    if i != bytes.len() {
        return None;
    }

    if is_float {
        Some(NumberValue::Float(mantissa * (exponent as f64).exp2()))
    } else {
        // Hex integers wrap modulo 2^64 into the signed domain
        Some(NumberValue::Int(int_acc as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_integers() {
        assert_eq!(parse_lua_number("0"), Some(NumberValue::Int(0)));
        assert_eq!(parse_lua_number("42"), Some(NumberValue::Int(42)));
        assert_eq!(
            parse_lua_number("9223372036854775807"),
            Some(NumberValue::Int(i64::MAX))
        );
        // Overflow falls back to float
        assert_eq!(
            parse_lua_number("9223372036854775808"),
            Some(NumberValue::Float(9.223372036854776e18))
        );
    }

    #[test]
    fn hex_integers_wrap() {
        assert_eq!(
            parse_lua_number("0x7fffffffffffffff"),
            Some(NumberValue::Int(i64::MAX))
        );
        assert_eq!(
            parse_lua_number("0xffffffffffffffff"),
            Some(NumberValue::Int(-1))
        );
        assert_eq!(parse_lua_number("0xFF"), Some(NumberValue::Int(255)));
    }

    #[test]
    fn floats() {
        assert_eq!(parse_lua_number("3.14"), Some(NumberValue::Float(3.14)));
        assert_eq!(parse_lua_number("1e5"), Some(NumberValue::Float(1e5)));
        assert_eq!(parse_lua_number(".5"), Some(NumberValue::Float(0.5)));
        assert_eq!(parse_lua_number("3.14E+2"), Some(NumberValue::Float(314.0)));
    }

    #[test]
    fn hex_floats() {
        assert_eq!(parse_lua_number("0x1p4"), Some(NumberValue::Float(16.0)));
        assert_eq!(parse_lua_number("0x1.8p1"), Some(NumberValue::Float(3.0)));
        assert_eq!(parse_lua_number("0xA"), Some(NumberValue::Int(10)));
        assert_eq!(parse_lua_number("0x.8p1"), Some(NumberValue::Float(1.0)));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_lua_number("0x"), None);
        assert_eq!(parse_lua_number("1e+"), None);
        assert_eq!(parse_lua_number("12ab"), None);
    }
}
