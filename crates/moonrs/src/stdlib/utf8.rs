// UTF-8 library
// Implements: char, codepoint, len, offset, codes, charpattern.
// Strings stay byte sequences; these functions interpret them as UTF-8
// on demand.

use crate::compiler::parser::push_utf8;
use crate::lib_registry::{LibraryModule, check_integer, check_str, opt_integer};
use crate::lua_interp::{LuaResult, LuaState};
use crate::lua_value::LuaValue;

pub fn create_utf8_lib() -> LibraryModule {
    crate::lib_module!("utf8", {
        "char" => utf8_char,
        "codepoint" => utf8_codepoint,
        "len" => utf8_len,
        "offset" => utf8_offset,
        "codes" => utf8_codes,
    })
    .with_value("charpattern", |l| {
        l.alloc_bytes(b"[\x00-\x7F\xC2-\xFD][\x80-\xBF]*".to_vec())
    })
}

/// Decode one sequence starting at `i`; returns (code point, length).
fn decode_utf8(bytes: &[u8], i: usize) -> Option<(u32, usize)> {
    let first = *bytes.get(i)?;
    if first < 0x80 {
        return Some((first as u32, 1));
    }
    let len = match first {
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => return None,
    };
    if i + len > bytes.len() {
        return None;
    }
    let mut value = (first as u32) & (0x7F >> len);
    for &b in &bytes[i + 1..i + len] {
        if b & 0xC0 != 0x80 {
            return None;
        }
        value = (value << 6) | (b & 0x3F) as u32;
    }
    Some((value, len))
}

fn utf8_char(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let mut out = Vec::with_capacity(args.len() * 4);
    for n in 1..=args.len() {
        let code = check_integer(l, args, n, "char")?;
        if !(0..=0x7FFF_FFFF).contains(&code) {
            return Err(l.error(format!(
                "bad argument #{} to 'char' (value out of range)",
                n
            )));
        }
        push_utf8(&mut out, code as u32);
    }
    l.alloc_bytes(out).map(|v| vec![v])
}

fn str_pos(pos: i64, len: usize) -> i64 {
    if pos >= 0 {
        pos
    } else if (-pos) as usize > len {
        0
    } else {
        len as i64 + pos + 1
    }
}

fn utf8_codepoint(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let s = check_str(l, args, 1, "codepoint")?;
    let i = str_pos(opt_integer(l, args, 2, "codepoint", 1)?, s.len());
    let j = str_pos(opt_integer(l, args, 3, "codepoint", i)?, s.len());
    if i < 1 {
        return Err(l.error("bad argument #2 to 'codepoint' (out of bounds)"));
    }
    if j > s.len() as i64 {
        return Err(l.error("bad argument #3 to 'codepoint' (out of bounds)"));
    }
    let mut out = Vec::new();
    let mut pos = (i - 1) as usize;
    while pos < j as usize {
        let (code, len) = decode_utf8(&s, pos)
            .ok_or_else(|| l.error(format!("invalid UTF-8 code at position {}", pos + 1)))?;
        out.push(LuaValue::Integer(code as i64));
        pos += len;
    }
    Ok(out)
}

/// utf8.len(s [, i [, j]]) -> count | nil, first_invalid_position
fn utf8_len(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let s = check_str(l, args, 1, "len")?;
    let i = str_pos(opt_integer(l, args, 2, "len", 1)?, s.len());
    let j = str_pos(opt_integer(l, args, 3, "len", -1)?, s.len());
    let mut pos = (i.max(1) - 1) as usize;
    let end = j.max(0) as usize;
    let mut count: i64 = 0;
    while pos < end {
        match decode_utf8(&s, pos) {
            Some((_, len)) => {
                count += 1;
                pos += len;
            }
            None => {
                return Ok(vec![LuaValue::Nil, LuaValue::Integer(pos as i64 + 1)]);
            }
        }
    }
    Ok(vec![LuaValue::Integer(count)])
}

/// utf8.offset(s, n [, i]): byte index where the n-th character starts.
fn utf8_offset(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let s = check_str(l, args, 1, "offset")?;
    let n = check_integer(l, args, 2, "offset")?;
    let default_i = if n >= 0 { 1 } else { s.len() as i64 + 1 };
    let i = str_pos(opt_integer(l, args, 3, "offset", default_i)?, s.len());
    if i < 1 || i > s.len() as i64 + 1 {
        return Err(l.error("bad argument #3 to 'offset' (position out of bounds)"));
    }
    let is_cont = |pos: usize| pos < s.len() && (s[pos] & 0xC0) == 0x80;
    let mut pos = (i - 1) as usize;

    if n == 0 {
        while pos > 0 && is_cont(pos) {
            pos -= 1;
        }
        return Ok(vec![LuaValue::Integer(pos as i64 + 1)]);
    }
    if is_cont(pos) {
        return Err(l.error("initial position is a continuation byte"));
    }
    let mut n = n;
    if n > 0 {
        n -= 1;
        while n > 0 && pos < s.len() {
            pos += 1;
            while is_cont(pos) {
                pos += 1;
            }
            n -= 1;
        }
        if n > 0 {
            return Ok(vec![LuaValue::Nil]);
        }
        Ok(vec![LuaValue::Integer(pos as i64 + 1)])
    } else {
        while n < 0 && pos > 0 {
            pos -= 1;
            while pos > 0 && is_cont(pos) {
                pos -= 1;
            }
            n += 1;
        }
        if n < 0 {
            return Ok(vec![LuaValue::Nil]);
        }
        Ok(vec![LuaValue::Integer(pos as i64 + 1)])
    }
}

fn utf8_codes_iter(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let s = check_str(l, args, 1, "codes iterator")?;
    let previous = check_integer(l, args, 2, "codes iterator")?;
    let mut pos = previous.max(0) as usize;
    // Skip over the character that starts at `previous`
    if pos > 0 {
        match decode_utf8(&s, pos - 1) {
            Some((_, len)) => pos = pos - 1 + len,
            None => {
                return Err(l.error(format!("invalid UTF-8 code at position {}", pos)));
            }
        }
    }
    if pos >= s.len() {
        return Ok(vec![LuaValue::Nil]);
    }
    let (code, _) = decode_utf8(&s, pos)
        .ok_or_else(|| l.error(format!("invalid UTF-8 code at position {}", pos + 1)))?;
    Ok(vec![
        LuaValue::Integer(pos as i64 + 1),
        LuaValue::Integer(code as i64),
    ])
}

fn utf8_codes(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let value = crate::lib_registry::check_arg(l, args, 1, "codes")?;
    if !value.is_string() {
        return Err(crate::lib_registry::bad_argument(
            l, 1, "codes", "string", &value,
        ));
    }
    Ok(vec![
        LuaValue::native("utf8_codes_iterator", utf8_codes_iter),
        value,
        LuaValue::Integer(0),
    ])
}
