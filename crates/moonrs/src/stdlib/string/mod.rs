// String library
// Implements: len, sub, upper, lower, rep, reverse, byte, char, format,
// find, match, gmatch, gsub, pack, unpack, packsize. The library table
// doubles as `__index` of the shared string metatable so method syntax
// resolves on string values.

pub mod pack;
pub mod pattern;
pub mod string_format;

use std::sync::Mutex;

use crate::lib_registry::{
    LibraryModule, arg_or_nil, bad_argument, check_integer, check_str, opt_integer,
};
use crate::lua_interp::{LuaResult, LuaState};
use crate::lua_value::{LuaValue, NativeFunction};
use pattern::{CaptureValue, MatchResult, is_plain_pattern, pattern_find};

pub fn create_string_lib() -> LibraryModule {
    crate::lib_module!("string", {
        "len" => string_len,
        "sub" => string_sub,
        "upper" => string_upper,
        "lower" => string_lower,
        "rep" => string_rep,
        "reverse" => string_reverse,
        "byte" => string_byte,
        "char" => string_char,
        "format" => string_format_fn,
        "find" => string_find,
        "match" => string_match,
        "gmatch" => string_gmatch,
        "gsub" => string_gsub,
        "pack" => string_pack,
        "unpack" => string_unpack,
        "packsize" => string_packsize,
    })
    .with_initializer(|l, lib| {
        // All strings share one metatable with __index = string library
        let mt = l.new_table_with(0, 1)?;
        if let Some(table) = mt.as_table() {
            table.lock().set_str("__index", lib.clone());
        }
        l.rt.set_string_metatable(mt);
        Ok(())
    })
}

/// Relative string position: negative indices count from the end.
fn posrelat(pos: i64, len: usize) -> i64 {
    if pos >= 0 {
        pos
    } else if (-pos) as usize > len {
        0
    } else {
        len as i64 + pos + 1
    }
}

fn string_len(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let s = check_str(l, args, 1, "len")?;
    Ok(vec![LuaValue::Integer(s.len() as i64)])
}

fn string_sub(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let s = check_str(l, args, 1, "sub")?;
    let len = s.len();
    let mut i = posrelat(check_integer(l, args, 2, "sub")?, len);
    let mut j = posrelat(opt_integer(l, args, 3, "sub", -1)?, len);
    if i < 1 {
        i = 1;
    }
    if j > len as i64 {
        j = len as i64;
    }
    if i > j {
        return Ok(vec![LuaValue::str("")]);
    }
    l.alloc_bytes(s[i as usize - 1..j as usize].to_vec())
        .map(|v| vec![v])
}

fn string_upper(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let s = check_str(l, args, 1, "upper")?;
    l.alloc_bytes(s.iter().map(|b| b.to_ascii_uppercase()).collect())
        .map(|v| vec![v])
}

fn string_lower(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let s = check_str(l, args, 1, "lower")?;
    l.alloc_bytes(s.iter().map(|b| b.to_ascii_lowercase()).collect())
        .map(|v| vec![v])
}

fn string_rep(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let s = check_str(l, args, 1, "rep")?;
    let n = check_integer(l, args, 2, "rep")?;
    let sep = match args.get(2) {
        None | Some(LuaValue::Nil) => Vec::new(),
        _ => check_str(l, args, 3, "rep")?,
    };
    if n <= 0 {
        return Ok(vec![LuaValue::str("")]);
    }
    let total = (s.len() + sep.len())
        .checked_mul(n as usize)
        .ok_or_else(|| l.error("resulting string too large"))?;
    if total > 1 << 30 {
        return Err(l.error("resulting string too large"));
    }
    let mut out = Vec::with_capacity(total);
    for k in 0..n {
        if k > 0 {
            out.extend_from_slice(&sep);
        }
        out.extend_from_slice(&s);
    }
    l.alloc_bytes(out).map(|v| vec![v])
}

fn string_reverse(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let mut s = check_str(l, args, 1, "reverse")?;
    s.reverse();
    l.alloc_bytes(s).map(|v| vec![v])
}

fn string_byte(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let s = check_str(l, args, 1, "byte")?;
    let len = s.len();
    let i = posrelat(opt_integer(l, args, 2, "byte", 1)?, len).max(1);
    let j = posrelat(opt_integer(l, args, 3, "byte", i)?, len).min(len as i64);
    let mut out = Vec::new();
    let mut k = i;
    while k <= j {
        out.push(LuaValue::Integer(s[k as usize - 1] as i64));
        k += 1;
    }
    Ok(out)
}

fn string_char(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let mut out = Vec::with_capacity(args.len());
    for n in 1..=args.len() {
        let code = check_integer(l, args, n, "char")?;
        if !(0..=255).contains(&code) {
            return Err(l.error(format!(
                "bad argument #{} to 'char' (value out of range)",
                n
            )));
        }
        out.push(code as u8);
    }
    l.alloc_bytes(out).map(|v| vec![v])
}

fn string_format_fn(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let fmt = check_str(l, args, 1, "format")?;
    let out = string_format::format(l, &fmt, args)?;
    l.alloc_bytes(out).map(|v| vec![v])
}

/// Initial search position for find/gmatch: 1-based, clamped.
fn search_init(init: i64, len: usize) -> usize {
    let pos = posrelat(init, len);
    if pos < 1 { 0 } else { (pos - 1) as usize }
}

fn capture_to_value(l: &mut LuaState, src: &[u8], cap: &CaptureValue) -> LuaResult<LuaValue> {
    match cap {
        CaptureValue::Span(start, end) => l.alloc_bytes(src[*start..*end].to_vec()),
        CaptureValue::Position(pos) => Ok(LuaValue::Integer(*pos as i64)),
    }
}

fn captures_to_values(
    l: &mut LuaState,
    src: &[u8],
    m: &MatchResult,
) -> LuaResult<Vec<LuaValue>> {
    m.captures
        .iter()
        .map(|cap| capture_to_value(l, src, cap))
        .collect()
}

fn string_find(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let s = check_str(l, args, 1, "find")?;
    let pat = check_str(l, args, 2, "find")?;
    let init = search_init(opt_integer(l, args, 3, "find", 1)?, s.len());
    let plain = arg_or_nil(args, 4).is_truthy();

    if init > s.len() {
        return Ok(vec![LuaValue::Nil]);
    }

    if plain || is_plain_pattern(&pat) {
        // Literal substring search
        if pat.is_empty() {
            return Ok(vec![
                LuaValue::Integer(init as i64 + 1),
                LuaValue::Integer(init as i64),
            ]);
        }
        let found = s[init..]
            .windows(pat.len())
            .position(|w| w == &pat[..])
            .map(|at| init + at);
        return Ok(match found {
            Some(at) => vec![
                LuaValue::Integer(at as i64 + 1),
                LuaValue::Integer((at + pat.len()) as i64),
            ],
            None => vec![LuaValue::Nil],
        });
    }

    match pattern_find(&s, &pat, init).map_err(|msg| l.error(msg))? {
        None => Ok(vec![LuaValue::Nil]),
        Some(m) => {
            let mut out = vec![
                LuaValue::Integer(m.start as i64 + 1),
                LuaValue::Integer(m.end as i64),
            ];
            // Explicit captures follow the span
            if m.has_captures {
                out.extend(captures_to_values(l, &s, &m)?);
            }
            Ok(out)
        }
    }
}

fn string_match(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let s = check_str(l, args, 1, "match")?;
    let pat = check_str(l, args, 2, "match")?;
    let init = search_init(opt_integer(l, args, 3, "match", 1)?, s.len());
    if init > s.len() {
        return Ok(vec![LuaValue::Nil]);
    }
    match pattern_find(&s, &pat, init).map_err(|msg| l.error(msg))? {
        None => Ok(vec![LuaValue::Nil]),
        Some(m) => captures_to_values(l, &s, &m),
    }
}

fn string_gmatch(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let s = check_str(l, args, 1, "gmatch")?;
    let pat = check_str(l, args, 2, "gmatch")?;
    let pos = Mutex::new(0usize);

    let iterator = NativeFunction::from_closure("gmatch_iterator", move |l, _args| {
        let mut pos_guard = pos.lock().unwrap_or_else(|e| e.into_inner());
        if *pos_guard > s.len() {
            return Ok(vec![LuaValue::Nil]);
        }
        match pattern_find(&s, &pat, *pos_guard).map_err(|msg| l.error(msg))? {
            None => {
                *pos_guard = s.len() + 1;
                Ok(vec![LuaValue::Nil])
            }
            Some(m) => {
                // Always make progress, even on empty matches
                *pos_guard = if m.end > m.start { m.end } else { m.start + 1 };
                let values = captures_to_values(l, &s, &m)?;
                Ok(values)
            }
        }
    });

    Ok(vec![LuaValue::Native(std::sync::Arc::new(iterator))])
}

fn string_gsub(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let s = check_str(l, args, 1, "gsub")?;
    let pat = check_str(l, args, 2, "gsub")?;
    let repl = arg_or_nil(args, 3);
    let max_n = match args.get(3) {
        None | Some(LuaValue::Nil) => i64::MAX,
        _ => check_integer(l, args, 4, "gsub")?,
    };

    match &repl {
        LuaValue::Str(_)
        | LuaValue::Integer(_)
        | LuaValue::Float(_)
        | LuaValue::Table(_) => {}
        f if f.is_function() => {}
        other => {
            return Err(bad_argument(l, 3, "gsub", "string/function/table", other));
        }
    }

    let anchored = pat.first() == Some(&b'^');
    let mut out: Vec<u8> = Vec::with_capacity(s.len());
    let mut pos = 0usize;
    let mut count: i64 = 0;

    while count < max_n {
        let m = match pattern_find(&s, &pat, pos).map_err(|msg| l.error(msg))? {
            Some(m) if m.start >= pos => m,
            _ => break,
        };
        // With an anchor only the very first position may match
        if anchored && m.start != pos {
            break;
        }
        out.extend_from_slice(&s[pos..m.start]);
        count += 1;
        apply_replacement(l, &s, &m, &repl, &mut out)?;

        if m.end > m.start {
            pos = m.end;
        } else {
            // Empty match: copy one byte and continue after it
            if m.start < s.len() {
                out.push(s[m.start]);
            }
            pos = m.start + 1;
        }
        if pos > s.len() || anchored {
            break;
        }
    }
    if pos < s.len() {
        out.extend_from_slice(&s[pos..]);
    }

    let result = l.alloc_bytes(out)?;
    Ok(vec![result, LuaValue::Integer(count)])
}

fn apply_replacement(
    l: &mut LuaState,
    src: &[u8],
    m: &MatchResult,
    repl: &LuaValue,
    out: &mut Vec<u8>,
) -> LuaResult<()> {
    let whole = &src[m.start..m.end];
    let replacement: LuaValue = match repl {
        LuaValue::Str(template) => {
            expand_template(l, src, m, template.as_bytes(), out)?;
            return Ok(());
        }
        LuaValue::Integer(_) | LuaValue::Float(_) => {
            out.extend_from_slice(repl.to_display_string().as_bytes());
            return Ok(());
        }
        LuaValue::Table(t) => {
            let key = capture_to_value(l, src, &m.captures[0])?;
            t.lock().raw_get(&key)
        }
        func => {
            let call_args = captures_to_values(l, src, m)?;
            let results = l.call_value(func.clone(), call_args)?;
            results.into_iter().next().unwrap_or(LuaValue::Nil)
        }
    };

    match replacement {
        LuaValue::Nil | LuaValue::Boolean(false) => out.extend_from_slice(whole),
        LuaValue::Str(s) => out.extend_from_slice(s.as_bytes()),
        v @ (LuaValue::Integer(_) | LuaValue::Float(_)) => {
            out.extend_from_slice(v.to_display_string().as_bytes());
        }
        other => {
            return Err(l.error(format!(
                "invalid replacement value (a {})",
                other.type_name()
            )));
        }
    }
    Ok(())
}

/// `%0`..`%9` and `%%` expansion in a string replacement.
fn expand_template(
    l: &mut LuaState,
    src: &[u8],
    m: &MatchResult,
    template: &[u8],
    out: &mut Vec<u8>,
) -> LuaResult<()> {
    let mut i = 0;
    while i < template.len() {
        let b = template[i];
        if b != b'%' {
            out.push(b);
            i += 1;
            continue;
        }
        i += 1;
        match template.get(i) {
            Some(b'%') => {
                out.push(b'%');
                i += 1;
            }
            Some(b'0') => {
                out.extend_from_slice(&src[m.start..m.end]);
                i += 1;
            }
            Some(d) if d.is_ascii_digit() => {
                let index = (d - b'0') as usize;
                let cap = m
                    .captures
                    .get(index - 1)
                    .ok_or_else(|| l.error(format!("invalid capture index %{} in replacement string", index)))?;
                match cap {
                    CaptureValue::Span(start, end) => out.extend_from_slice(&src[*start..*end]),
                    CaptureValue::Position(pos) => {
                        out.extend_from_slice(pos.to_string().as_bytes())
                    }
                }
                i += 1;
            }
            _ => {
                return Err(l.error("invalid use of '%' in replacement string"));
            }
        }
    }
    Ok(())
}

fn string_pack(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let fmt = check_str(l, args, 1, "pack")?;
    let out = pack::pack(l, &fmt, args)?;
    l.alloc_bytes(out).map(|v| vec![v])
}

fn string_unpack(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let fmt = check_str(l, args, 1, "unpack")?;
    let data = check_str(l, args, 2, "unpack")?;
    let init = posrelat(opt_integer(l, args, 3, "unpack", 1)?, data.len()).max(1) as usize - 1;
    pack::unpack(l, &fmt, &data, init)
}

fn string_packsize(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let fmt = check_str(l, args, 1, "packsize")?;
    Ok(vec![LuaValue::Integer(pack::packsize(l, &fmt)?)])
}
