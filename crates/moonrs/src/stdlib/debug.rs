// Debug library (FullTrust only)
// A deliberately small surface: traceback and getinfo with the fields
// the diagnostic paths need.

use crate::lib_registry::{LibraryModule, arg_or_nil, opt_integer};
use crate::lua_interp::{LuaResult, LuaState};
use crate::lua_value::LuaValue;

pub fn create_debug_lib() -> LibraryModule {
    crate::lib_module!("debug", {
        "traceback" => debug_traceback,
        "getinfo" => debug_getinfo,
    })
}

fn debug_traceback(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let mut out = String::new();
    if let Some(message) = args.first() {
        if let Some(s) = message.as_str() {
            out.push_str(s);
            out.push('\n');
        } else if !message.is_nil() {
            // Non-string messages pass through untouched
            return Ok(vec![message.clone()]);
        }
    }
    out.push_str("stack traceback:");
    for entry in l.traceback() {
        out.push('\n');
        out.push_str(&entry);
    }
    l.alloc_str(out).map(|v| vec![v])
}

fn debug_getinfo(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let info = l.new_table_with(0, 5)?;
    let Some(table) = info.as_table() else {
        return Ok(vec![LuaValue::Nil]);
    };

    match arg_or_nil(args, 1) {
        LuaValue::Function(f) => {
            let mut guard = table.lock();
            guard.set_str("what", LuaValue::str("Lua"));
            guard.set_str("source", LuaValue::str(&format!("@{}", f.def.chunk)));
            guard.set_str("short_src", LuaValue::str(&f.def.chunk));
            guard.set_str("linedefined", LuaValue::Integer(f.def.line as i64));
            guard.set_str("nparams", LuaValue::Integer(f.def.params.len() as i64));
        }
        LuaValue::Native(f) => {
            let mut guard = table.lock();
            guard.set_str("what", LuaValue::str("C"));
            guard.set_str("source", LuaValue::str("=[C]"));
            guard.set_str("short_src", LuaValue::str("[C]"));
            guard.set_str(
                "name",
                match &f.name {
                    Some(name) => LuaValue::str(name),
                    None => LuaValue::Nil,
                },
            );
        }
        _ => {
            let level = opt_integer(l, args, 1, "getinfo", 1)? as usize;
            // Skip this native frame when counting
            match l.frames.iter().rev().nth(level) {
                Some(frame) => {
                    let mut guard = table.lock();
                    guard.set_str("currentline", LuaValue::Integer(frame.line as i64));
                    guard.set_str("source", LuaValue::str(&format!("@{}", frame.chunk)));
                    guard.set_str("short_src", LuaValue::str(&frame.chunk));
                    guard.set_str("what", LuaValue::str("Lua"));
                }
                None => return Ok(vec![LuaValue::Nil]),
            }
        }
    }
    Ok(vec![info])
}
