// Basic library (_G global functions)
// Implements: print, type, assert, error, tonumber, tostring, select,
// ipairs, pairs, next, pcall, xpcall, getmetatable, setmetatable,
// rawget, rawset, rawlen, rawequal, collectgarbage, load, loadfile,
// dofile, warn, unpack

use std::sync::Arc;

use crate::compiler::ast::FuncBody;
use crate::compiler::Compiler;
use crate::lib_registry::{
    LibraryModule, arg_or_nil, bad_argument, check_arg, check_function, check_integer,
    check_str, check_table,
};
use crate::lua_interp::scope::Scope;
use crate::lua_interp::{LuaResult, LuaState};
use crate::lua_value::number;
use crate::lua_value::{LuaClosure, LuaKey, LuaValue};

pub fn create_basic_lib() -> LibraryModule {
    crate::lib_module!("_G", {
        "print" => lua_print,
        "type" => lua_type,
        "assert" => lua_assert,
        "error" => lua_error_fn,
        "tonumber" => lua_tonumber,
        "tostring" => lua_tostring,
        "select" => lua_select,
        "ipairs" => lua_ipairs,
        "pairs" => lua_pairs,
        "next" => lua_next,
        "pcall" => lua_pcall,
        "xpcall" => lua_xpcall,
        "getmetatable" => lua_getmetatable,
        "setmetatable" => lua_setmetatable,
        "rawget" => lua_rawget,
        "rawset" => lua_rawset,
        "rawlen" => lua_rawlen,
        "rawequal" => lua_rawequal,
        "collectgarbage" => lua_collectgarbage,
        "load" => lua_load,
        "loadfile" => lua_loadfile,
        "dofile" => lua_dofile,
        "warn" => lua_warn,
        "unpack" => crate::stdlib::table::lua_unpack,
    })
    .with_value("_VERSION", |l| l.alloc_str("Lua 5.4"))
}

/// print(...) - Write values to stdout, tab separated.
fn lua_print(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let mut output = String::new();
    for (index, arg) in args.iter().enumerate() {
        if index > 0 {
            output.push('\t');
        }
        let s = l.tostring_value(arg)?;
        output.push_str(&s.to_display_string());
    }
    println!("{}", output);
    Ok(Vec::new())
}

/// type(v) - The type of a value as a string.
fn lua_type(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let value = check_arg(l, args, 1, "type")?;
    Ok(vec![LuaValue::str(value.type_name())])
}

fn lua_assert(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let value = arg_or_nil(args, 1);
    if value.is_truthy() {
        return Ok(args.to_vec());
    }
    match args.get(1) {
        None => Err(l.error("assertion failed!")),
        Some(LuaValue::Str(s)) => Err(l.error(s.display().into_owned())),
        Some(other) => Err(crate::lua_interp::LuaError::with_value(other.clone())),
    }
}

/// error(message [, level]) - Raise; string messages get a position
/// prefix for the given stack level.
fn lua_error_fn(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let message = arg_or_nil(args, 1);
    let level = match args.get(1) {
        None | Some(LuaValue::Nil) => 1,
        _ => check_integer(l, args, 2, "error")?,
    };
    if let LuaValue::Str(s) = &message {
        if level > 0 {
            // +1 skips this native frame when counting levels
            if let Some(prefix) = l.position_prefix(level as usize + 1) {
                return Err(crate::lua_interp::LuaError::with_value(
                    LuaValue::string_owned(format!("{}{}", prefix, s.display())),
                ));
            }
        }
    }
    Err(crate::lua_interp::LuaError::with_value(message))
}

fn lua_tonumber(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let value = check_arg(l, args, 1, "tonumber")?;
    match args.get(1) {
        None | Some(LuaValue::Nil) => Ok(vec![
            number::coerce_number(&value).unwrap_or(LuaValue::Nil),
        ]),
        _ => {
            let base = check_integer(l, args, 2, "tonumber")?;
            if !(2..=36).contains(&base) {
                return Err(l.error("bad argument #2 to 'tonumber' (base out of range)"));
            }
            let text = match value.as_lua_str() {
                Some(s) => s.display().into_owned(),
                None => return Err(bad_argument(l, 1, "tonumber", "string", &value)),
            };
            Ok(vec![parse_with_base(text.trim(), base as u32)])
        }
    }
}

fn parse_with_base(text: &str, base: u32) -> LuaValue {
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    if digits.is_empty() {
        return LuaValue::Nil;
    }
    let mut value: i64 = 0;
    for c in digits.chars() {
        match c.to_digit(36) {
            Some(d) if d < base => {
                value = value
                    .wrapping_mul(base as i64)
                    .wrapping_add(d as i64);
            }
            _ => return LuaValue::Nil,
        }
    }
    LuaValue::Integer(if negative { value.wrapping_neg() } else { value })
}

fn lua_tostring(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let value = check_arg(l, args, 1, "tostring")?;
    Ok(vec![l.tostring_value(&value)?])
}

/// select('#', ...) or select(n, ...).
fn lua_select(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let selector = check_arg(l, args, 1, "select")?;
    if selector.as_str() == Some("#") {
        return Ok(vec![LuaValue::Integer(args.len() as i64 - 1)]);
    }
    let n = check_integer(l, args, 1, "select")?;
    let rest = &args[1..];
    let start = if n > 0 {
        n as usize
    } else if n < 0 {
        let from_end = (-n) as usize;
        if from_end > rest.len() {
            return Err(l.error("bad argument #1 to 'select' (index out of range)"));
        }
        rest.len() - from_end + 1
    } else {
        return Err(l.error("bad argument #1 to 'select' (index out of range)"));
    };
    if start > rest.len() {
        return Ok(Vec::new());
    }
    Ok(rest[start - 1..].to_vec())
}

fn ipairs_iter(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let table = arg_or_nil(args, 1);
    let i = check_integer(l, args, 2, "ipairs iterator")?.wrapping_add(1);
    let value = l.index_value(&table, &LuaValue::Integer(i))?;
    if value.is_nil() {
        Ok(vec![LuaValue::Nil])
    } else {
        Ok(vec![LuaValue::Integer(i), value])
    }
}

fn lua_ipairs(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let value = check_arg(l, args, 1, "ipairs")?;
    Ok(vec![
        LuaValue::native("ipairs_iterator", ipairs_iter),
        value,
        LuaValue::Integer(0),
    ])
}

fn lua_pairs(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let value = check_arg(l, args, 1, "pairs")?;
    if value.as_table().is_none() {
        return Err(bad_argument(l, 1, "pairs", "table", &value));
    }
    Ok(vec![
        LuaValue::native("next", lua_next),
        value,
        LuaValue::Nil,
    ])
}

pub(crate) fn lua_next(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let table = check_table(l, args, 1, "next")?;
    let key = arg_or_nil(args, 2);
    let key = if key.is_nil() {
        None
    } else {
        match LuaKey::from_value(&key) {
            Some(k) => Some(k),
            None => return Err(l.error("invalid key to 'next'")),
        }
    };
    let entry = table
        .lock()
        .next(key.as_ref())
        .map_err(|msg| l.error(msg))?;
    match entry {
        Some((k, v)) => Ok(vec![k, v]),
        None => Ok(vec![LuaValue::Nil]),
    }
}

fn lua_pcall(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let func = check_arg(l, args, 1, "pcall")?;
    match l.call_value(func, args[1..].to_vec()) {
        Ok(mut results) => {
            let mut all = Vec::with_capacity(results.len() + 1);
            all.push(LuaValue::Boolean(true));
            all.append(&mut results);
            Ok(all)
        }
        Err(err) if err.is_catchable() => Ok(vec![LuaValue::Boolean(false), err.value]),
        Err(err) => Err(err),
    }
}

fn lua_xpcall(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let func = check_arg(l, args, 1, "xpcall")?;
    let handler = check_function(l, args, 2, "xpcall")?;
    match l.call_value(func, args[2..].to_vec()) {
        Ok(mut results) => {
            let mut all = Vec::with_capacity(results.len() + 1);
            all.push(LuaValue::Boolean(true));
            all.append(&mut results);
            Ok(all)
        }
        Err(err) if err.is_catchable() => {
            // The message handler runs before further unwinding
            let handled = l.call_value(handler, vec![err.value])?;
            let first = handled.into_iter().next().unwrap_or(LuaValue::Nil);
            Ok(vec![LuaValue::Boolean(false), first])
        }
        Err(err) => Err(err),
    }
}

fn lua_getmetatable(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let value = check_arg(l, args, 1, "getmetatable")?;
    match l.get_metatable(&value) {
        None => Ok(vec![LuaValue::Nil]),
        Some(mt) => {
            if let Some(table) = mt.as_table() {
                let protected = table.lock().get_str("__metatable");
                if !protected.is_nil() {
                    return Ok(vec![protected]);
                }
            }
            Ok(vec![mt])
        }
    }
}

fn lua_setmetatable(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let target = check_table(l, args, 1, "setmetatable")?;
    let mt = arg_or_nil(args, 2);
    if !mt.is_nil() && mt.as_table().is_none() {
        return Err(bad_argument(l, 2, "setmetatable", "nil or table", &mt));
    }
    if let Some(existing) = target.lock().metatable() {
        if let Some(existing_table) = existing.as_table() {
            if !existing_table.lock().get_str("__metatable").is_nil() {
                return Err(l.error("cannot change a protected metatable"));
            }
        }
    }
    let new_mt = if mt.is_nil() { None } else { Some(mt) };
    target.lock().set_metatable(new_mt);
    Ok(vec![arg_or_nil(args, 1)])
}

fn lua_rawget(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let table = check_table(l, args, 1, "rawget")?;
    let key = arg_or_nil(args, 2);
    let value = table.lock().raw_get(&key);
    Ok(vec![value])
}

fn lua_rawset(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let table = check_table(l, args, 1, "rawset")?;
    let key = arg_or_nil(args, 2);
    let value = arg_or_nil(args, 3);
    table.lock().raw_set(key, value).map_err(|msg| l.error(msg))?;
    Ok(vec![arg_or_nil(args, 1)])
}

fn lua_rawlen(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let value = check_arg(l, args, 1, "rawlen")?;
    match &value {
        LuaValue::Str(s) => Ok(vec![LuaValue::Integer(s.len() as i64)]),
        LuaValue::Table(t) => Ok(vec![LuaValue::Integer(t.lock().length())]),
        _ => Err(bad_argument(l, 1, "rawlen", "table or string", &value)),
    }
}

fn lua_rawequal(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let a = check_arg(l, args, 1, "rawequal")?;
    let b = check_arg(l, args, 2, "rawequal")?;
    Ok(vec![LuaValue::Boolean(a.raw_equals(&b))])
}

/// collectgarbage([opt]) - Reference-counted runtime: most options are
/// accepted no-ops; "count" reports the allocation counter in KB.
fn lua_collectgarbage(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let option = match args.first() {
        None | Some(LuaValue::Nil) => "collect".to_string(),
        Some(v) => match v.as_str() {
            Some(s) => s.to_string(),
            None => return Err(bad_argument(l, 1, "collectgarbage", "string", v)),
        },
    };
    match option.as_str() {
        "count" => {
            let kb = l.memory_in_use() as f64 / 1024.0;
            Ok(vec![LuaValue::Float(kb), LuaValue::Integer(0)])
        }
        "collect" | "step" | "stop" | "restart" => Ok(vec![LuaValue::Integer(0)]),
        "isrunning" => Ok(vec![LuaValue::Boolean(true)]),
        "incremental" | "generational" => Ok(vec![LuaValue::str("incremental")]),
        other => Err(l.error(format!(
            "bad argument #1 to 'collectgarbage' (invalid option '{}')",
            other
        ))),
    }
}

/// Build a callable from a parsed chunk and an environment table.
pub(crate) fn chunk_to_function(
    chunk: &crate::compiler::Chunk,
    env: LuaValue,
    name: Option<String>,
) -> LuaValue {
    let def = Arc::new(FuncBody {
        params: Vec::new(),
        is_vararg: true,
        body: chunk.block.as_ref().clone(),
        name,
        chunk: chunk.name.clone(),
        line: 0,
    });
    LuaValue::Function(Arc::new(LuaClosure {
        def,
        captured: Scope::chunk(env, Vec::new()),
    }))
}

/// load(chunk [, chunkname [, mode [, env]]])
fn lua_load(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let chunk_arg = check_arg(l, args, 1, "load")?;
    let source = match &chunk_arg {
        LuaValue::Str(s) => s.display().into_owned(),
        f if f.is_function() => {
            // Reader function: concatenate pieces until nil/empty
            let mut source = String::new();
            loop {
                let piece = l.call_value(f.clone(), Vec::new())?;
                match piece.into_iter().next() {
                    None | Some(LuaValue::Nil) => break,
                    Some(LuaValue::Str(s)) if s.is_empty() => break,
                    Some(LuaValue::Str(s)) => source.push_str(&s.display()),
                    Some(other) => {
                        return Err(l.error(format!(
                            "reader function must return a string (got {})",
                            other.type_name()
                        )));
                    }
                }
            }
            source
        }
        other => return Err(bad_argument(l, 1, "load", "string or function", other)),
    };

    let chunkname = match args.get(2) {
        None | Some(LuaValue::Nil) => "=(load)".to_string(),
        Some(v) => v.to_display_string(),
    };
    let env = match args.get(4 - 1) {
        None | Some(LuaValue::Nil) => l.globals(),
        Some(v) => v.clone(),
    };

    match Compiler::compile(&source, &chunkname) {
        Ok(chunk) => Ok(vec![chunk_to_function(&chunk, env, Some(chunkname))]),
        Err(diagnostics) => {
            let message = diagnostics
                .first()
                .map(|d| d.to_string())
                .unwrap_or_else(|| "syntax error".to_string());
            Ok(vec![LuaValue::Nil, LuaValue::string_owned(message)])
        }
    }
}

fn load_file_value(l: &mut LuaState, path: &str) -> LuaResult<Vec<LuaValue>> {
    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            return Ok(vec![
                LuaValue::Nil,
                LuaValue::string_owned(format!("cannot open {}: {}", path, e)),
            ]);
        }
    };
    match Compiler::compile(&source, path) {
        Ok(chunk) => {
            let env = l.globals();
            Ok(vec![chunk_to_function(&chunk, env, Some(path.to_string()))])
        }
        Err(diagnostics) => {
            let message = diagnostics
                .first()
                .map(|d| d.to_string())
                .unwrap_or_else(|| "syntax error".to_string());
            Ok(vec![LuaValue::Nil, LuaValue::string_owned(message)])
        }
    }
}

fn lua_loadfile(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let path = check_str(l, args, 1, "loadfile")?;
    let path = String::from_utf8_lossy(&path).into_owned();
    load_file_value(l, &path)
}

fn lua_dofile(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let path = check_str(l, args, 1, "dofile")?;
    let path = String::from_utf8_lossy(&path).into_owned();
    let loaded = load_file_value(l, &path)?;
    match loaded.first() {
        Some(LuaValue::Nil) | None => {
            let message = loaded
                .get(1)
                .map(|v| v.to_display_string())
                .unwrap_or_else(|| "cannot load file".to_string());
            Err(l.error(message))
        }
        Some(func) => l.call_value(func.clone(), Vec::new()),
    }
}

fn lua_warn(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let mut message = String::new();
    for (i, arg) in args.iter().enumerate() {
        match arg.as_str() {
            Some(s) => message.push_str(s),
            None => return Err(bad_argument(l, i + 1, "warn", "string", arg)),
        }
    }
    // Control messages ("@on", "@off", ...) are accepted and ignored
    if !message.starts_with('@') {
        eprintln!("Lua warning: {}", message);
    }
    Ok(Vec::new())
}
