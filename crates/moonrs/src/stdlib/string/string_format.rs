// string.format
// C printf-style directives over Lua values: %d %i %u %o %x %X %c %s %q
// %f %F %e %E %g %G %a %A %% with flags, width and precision.

use crate::lib_registry::bad_argument;
use crate::lua_interp::{LuaResult, LuaState};
use crate::lua_value::number::{
    self, coerce_integer, format_e, format_f, format_g, format_hex_float,
};
use crate::lua_value::LuaValue;

#[derive(Default)]
struct Directive {
    minus: bool,
    plus: bool,
    space: bool,
    zero: bool,
    alt: bool,
    width: usize,
    precision: Option<usize>,
    spec: u8,
}

pub fn format(l: &mut LuaState, fmt: &[u8], args: &[LuaValue]) -> LuaResult<Vec<u8>> {
    let mut out: Vec<u8> = Vec::with_capacity(fmt.len());
    let mut arg_index = 1; // args[0] is the format string itself
    let mut i = 0;

    while i < fmt.len() {
        if fmt[i] != b'%' {
            out.push(fmt[i]);
            i += 1;
            continue;
        }
        i += 1;
        if i < fmt.len() && fmt[i] == b'%' {
            out.push(b'%');
            i += 1;
            continue;
        }

        let (directive, consumed) = parse_directive(l, fmt, i)?;
        i += consumed;
        arg_index += 1;
        let value = args.get(arg_index - 1).cloned().unwrap_or(LuaValue::Nil);
        let rendered = render(l, &directive, &value, arg_index)?;
        out.extend_from_slice(&rendered);
    }

    Ok(out)
}

fn parse_directive(l: &LuaState, fmt: &[u8], start: usize) -> LuaResult<(Directive, usize)> {
    let mut d = Directive::default();
    let mut i = start;

    while i < fmt.len() {
        match fmt[i] {
            b'-' => d.minus = true,
            b'+' => d.plus = true,
            b' ' => d.space = true,
            b'0' => d.zero = true,
            b'#' => d.alt = true,
            _ => break,
        }
        i += 1;
    }
    let mut width = 0usize;
    while i < fmt.len() && fmt[i].is_ascii_digit() {
        width = width * 10 + (fmt[i] - b'0') as usize;
        if width > 99 {
            return Err(l.error("invalid conversion: width too long"));
        }
        i += 1;
    }
    d.width = width;
    if i < fmt.len() && fmt[i] == b'.' {
        i += 1;
        let mut precision = 0usize;
        while i < fmt.len() && fmt[i].is_ascii_digit() {
            precision = precision * 10 + (fmt[i] - b'0') as usize;
            if precision > 99 {
                return Err(l.error("invalid conversion: precision too long"));
            }
            i += 1;
        }
        d.precision = Some(precision);
    }
    if i >= fmt.len() {
        return Err(l.error("invalid conversion to 'format'"));
    }
    d.spec = fmt[i];
    i += 1;
    Ok((d, i - start))
}

fn render(
    l: &mut LuaState,
    d: &Directive,
    value: &LuaValue,
    arg_n: usize,
) -> LuaResult<Vec<u8>> {
    let text: Vec<u8> = match d.spec {
        b'd' | b'i' => {
            let n = check_format_integer(l, value, arg_n)?;
            let mut buffer = itoa::Buffer::new();
            signed_pad(d, buffer.format(n))
        }
        b'u' => {
            let n = check_format_integer(l, value, arg_n)?;
            let mut buffer = itoa::Buffer::new();
            signed_pad(d, buffer.format(n as u64))
        }
        b'o' => {
            let n = check_format_integer(l, value, arg_n)? as u64;
            signed_pad(d, &format!("{:o}", n))
        }
        b'x' => {
            let n = check_format_integer(l, value, arg_n)? as u64;
            let body = format!("{:x}", n);
            let body = if d.alt && n != 0 { format!("0x{}", body) } else { body };
            signed_pad(d, &body)
        }
        b'X' => {
            let n = check_format_integer(l, value, arg_n)? as u64;
            let body = format!("{:X}", n);
            let body = if d.alt && n != 0 { format!("0X{}", body) } else { body };
            signed_pad(d, &body)
        }
        b'c' => {
            let n = check_format_integer(l, value, arg_n)?;
            vec![n as u8]
        }
        b'f' | b'F' => {
            let f = check_format_number(l, value, arg_n)?;
            signed_pad(d, &format_f(f, d.precision.unwrap_or(6)))
        }
        b'e' | b'E' => {
            let f = check_format_number(l, value, arg_n)?;
            signed_pad(d, &format_e(f, d.precision.unwrap_or(6), d.spec == b'E'))
        }
        b'g' | b'G' => {
            let f = check_format_number(l, value, arg_n)?;
            signed_pad(d, &format_g(f, d.precision.unwrap_or(6), d.spec == b'G'))
        }
        b'a' | b'A' => {
            let f = check_format_number(l, value, arg_n)?;
            signed_pad(d, &format_hex_float(f, d.spec == b'A'))
        }
        b's' => {
            let rendered = l.tostring_value(value)?;
            let mut bytes = match &rendered {
                LuaValue::Str(s) => s.as_bytes().to_vec(),
                other => other.to_display_string().into_bytes(),
            };
            if let Some(precision) = d.precision {
                bytes.truncate(precision);
            }
            pad_bytes(d, bytes)
        }
        b'q' => quote_value(l, value, arg_n)?,
        other => {
            return Err(l.error(format!(
                "invalid conversion '%{}' to 'format'",
                other as char
            )));
        }
    };
    Ok(text)
}

fn check_format_integer(l: &LuaState, value: &LuaValue, arg_n: usize) -> LuaResult<i64> {
    match coerce_integer(value) {
        Some(i) => Ok(i),
        None => match value {
            LuaValue::Float(_) => Err(l.error(format!(
                "bad argument #{} to 'format' (number has no integer representation)",
                arg_n
            ))),
            other => Err(bad_argument(l, arg_n, "format", "number", other)),
        },
    }
}

fn check_format_number(l: &LuaState, value: &LuaValue, arg_n: usize) -> LuaResult<f64> {
    match number::coerce_number(value) {
        Some(LuaValue::Integer(i)) => Ok(i as f64),
        Some(LuaValue::Float(f)) => Ok(f),
        _ => Err(bad_argument(l, arg_n, "format", "number", value)),
    }
}

/// Apply sign flags, zero fill and width to a numeric rendering.
fn signed_pad(d: &Directive, body: &str) -> Vec<u8> {
    let (sign, digits) = match body.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None if d.plus => ("+", body),
        None if d.space => (" ", body),
        None => ("", body),
    };
    let content_len = sign.len() + digits.len();
    let mut out = Vec::new();
    if d.width > content_len {
        let fill = d.width - content_len;
        if d.minus {
            out.extend_from_slice(sign.as_bytes());
            out.extend_from_slice(digits.as_bytes());
            out.extend(std::iter::repeat_n(b' ', fill));
            return out;
        }
        if d.zero && d.precision.is_none() {
            out.extend_from_slice(sign.as_bytes());
            out.extend(std::iter::repeat_n(b'0', fill));
            out.extend_from_slice(digits.as_bytes());
            return out;
        }
        out.extend(std::iter::repeat_n(b' ', fill));
    }
    out.extend_from_slice(sign.as_bytes());
    out.extend_from_slice(digits.as_bytes());
    out
}

fn pad_bytes(d: &Directive, bytes: Vec<u8>) -> Vec<u8> {
    if bytes.len() >= d.width {
        return bytes;
    }
    let fill = d.width - bytes.len();
    let mut out = Vec::with_capacity(d.width);
    if d.minus {
        out.extend_from_slice(&bytes);
        out.extend(std::iter::repeat_n(b' ', fill));
    } else {
        out.extend(std::iter::repeat_n(b' ', fill));
        out.extend_from_slice(&bytes);
    }
    out
}

/// %q: a form that can be read back by the Lua lexer.
fn quote_value(l: &LuaState, value: &LuaValue, arg_n: usize) -> LuaResult<Vec<u8>> {
    match value {
        LuaValue::Str(s) => {
            let mut out = Vec::with_capacity(s.len() + 2);
            out.push(b'"');
            let bytes = s.as_bytes();
            for (i, &b) in bytes.iter().enumerate() {
                match b {
                    b'"' => out.extend_from_slice(b"\\\""),
                    b'\\' => out.extend_from_slice(b"\\\\"),
                    b'\n' => out.extend_from_slice(b"\\n"),
                    b'\r' => out.extend_from_slice(b"\\r"),
                    0 => {
                        // Disambiguate from a following digit
                        if bytes.get(i + 1).is_some_and(|n| n.is_ascii_digit()) {
                            out.extend_from_slice(b"\\000");
                        } else {
                            out.extend_from_slice(b"\\0");
                        }
                    }
                    0x20..=0x7E => out.push(b),
                    _ => out.extend_from_slice(format!("\\{}", b).as_bytes()),
                }
            }
            out.push(b'"');
            Ok(out)
        }
        LuaValue::Integer(i) => {
            let mut buffer = itoa::Buffer::new();
            Ok(buffer.format(*i).as_bytes().to_vec())
        }
        LuaValue::Float(f) => {
            // Hex float keeps the exact value
            if f.is_finite() {
                Ok(format_hex_float(*f, false).into_bytes())
            } else if f.is_nan() {
                Ok(b"(0/0)".to_vec())
            } else if *f > 0.0 {
                Ok(b"1e9999".to_vec())
            } else {
                Ok(b"-1e9999".to_vec())
            }
        }
        LuaValue::Nil => Ok(b"nil".to_vec()),
        LuaValue::Boolean(true) => Ok(b"true".to_vec()),
        LuaValue::Boolean(false) => Ok(b"false".to_vec()),
        other => Err(l.error(format!(
            "bad argument #{} to 'format' (value has no literal form, got {})",
            arg_n,
            other.type_name()
        ))),
    }
}
