// Coroutine library
// Implements: create, resume, yield, status, running, wrap, isyieldable,
// close, over the thread-backed coroutine runtime.

use std::sync::Arc;

use crate::lib_registry::{LibraryModule, arg_or_nil, bad_argument, check_function};
use crate::lua_interp::coroutine::{CoStatus, Coroutine};
use crate::lua_interp::{LuaResult, LuaState};
use crate::lua_value::{LuaValue, NativeFunction};

pub fn create_coroutine_lib() -> LibraryModule {
    crate::lib_module!("coroutine", {
        "create" => coroutine_create,
        "resume" => coroutine_resume,
        "yield" => coroutine_yield,
        "status" => coroutine_status,
        "running" => coroutine_running,
        "wrap" => coroutine_wrap,
        "isyieldable" => coroutine_isyieldable,
        "close" => coroutine_close,
    })
}

fn coroutine_create(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let func = check_function(l, args, 1, "create")?;
    let coroutine = Coroutine::spawn(l.rt.clone(), func)?;
    Ok(vec![LuaValue::Coroutine(coroutine)])
}

fn check_coroutine(
    l: &LuaState,
    args: &[LuaValue],
    n: usize,
    fname: &str,
) -> LuaResult<Arc<Coroutine>> {
    match arg_or_nil(args, n) {
        LuaValue::Coroutine(co) => Ok(co),
        other => Err(bad_argument(l, n, fname, "coroutine", &other)),
    }
}

/// coroutine.resume(co, ...) -> true, ... | false, error
fn coroutine_resume(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let co = check_coroutine(l, args, 1, "resume")?;
    match co.resume(l, args[1..].to_vec()) {
        Ok(mut values) => {
            let mut all = Vec::with_capacity(values.len() + 1);
            all.push(LuaValue::Boolean(true));
            all.append(&mut values);
            Ok(all)
        }
        Err(err) if err.is_catchable() => Ok(vec![LuaValue::Boolean(false), err.value]),
        Err(err) => Err(err),
    }
}

fn coroutine_yield(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    l.do_yield(args.to_vec())
}

fn coroutine_status(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let co = check_coroutine(l, args, 1, "status")?;
    let status = co.status();
    // The coroutine asking about itself is "running"
    let name = match (&l.running_coroutine(), status) {
        (Some(current), CoStatus::Running) if Arc::ptr_eq(current, &co) => "running",
        (_, status) => status.name(),
    };
    Ok(vec![LuaValue::str(name)])
}

/// coroutine.running() -> co | nil, is_main
fn coroutine_running(l: &mut LuaState, _args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    match l.running_coroutine() {
        Some(co) => Ok(vec![LuaValue::Coroutine(co), LuaValue::Boolean(false)]),
        None => Ok(vec![LuaValue::Nil, LuaValue::Boolean(true)]),
    }
}

/// coroutine.wrap(f): a callable that resumes and re-raises errors.
fn coroutine_wrap(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let func = check_function(l, args, 1, "wrap")?;
    let coroutine = Coroutine::spawn(l.rt.clone(), func)?;

    let wrapper = NativeFunction::from_closure("wrapped_coroutine", move |l, call_args| {
        coroutine.resume(l, call_args.to_vec())
    });
    Ok(vec![LuaValue::Native(Arc::new(wrapper))])
}

fn coroutine_isyieldable(l: &mut LuaState, _args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    Ok(vec![LuaValue::Boolean(l.is_yieldable())])
}

fn coroutine_close(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let co = check_coroutine(l, args, 1, "close")?;
    match co.close() {
        Ok(()) => Ok(vec![LuaValue::Boolean(true)]),
        Err(err) => Ok(vec![LuaValue::Boolean(false), err.value]),
    }
}
