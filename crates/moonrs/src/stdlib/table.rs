// Table library
// Implements: insert, remove, concat, sort, unpack, pack, move

use crate::lib_registry::{
    LibraryModule, arg_or_nil, check_integer, check_table, opt_integer, opt_str,
};
use crate::lua_interp::{LuaResult, LuaState};
use crate::lua_value::LuaValue;

pub fn create_table_lib() -> LibraryModule {
    crate::lib_module!("table", {
        "insert" => table_insert,
        "remove" => table_remove,
        "concat" => table_concat,
        "sort" => table_sort,
        "unpack" => lua_unpack,
        "pack" => table_pack,
        "move" => table_move,
    })
}

fn table_insert(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let table = check_table(l, args, 1, "insert")?;
    let len = table.lock().length();
    match args.len() {
        2 => {
            let value = arg_or_nil(args, 2);
            table.lock().set_int(len + 1, value);
        }
        3 => {
            let pos = check_integer(l, args, 2, "insert")?;
            if pos < 1 || pos > len + 1 {
                return Err(l.error("bad argument #2 to 'insert' (position out of bounds)"));
            }
            let value = arg_or_nil(args, 3);
            let mut t = table.lock();
            let mut i = len;
            while i >= pos {
                let moved = t.get_int(i);
                t.set_int(i + 1, moved);
                i -= 1;
            }
            t.set_int(pos, value);
        }
        n => {
            return Err(l.error(format!(
                "wrong number of arguments to 'insert' (got {})",
                n
            )));
        }
    }
    Ok(Vec::new())
}

fn table_remove(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let table = check_table(l, args, 1, "remove")?;
    let len = table.lock().length();
    let pos = opt_integer(l, args, 2, "remove", len)?;
    if len == 0 && args.len() < 2 {
        return Ok(vec![LuaValue::Nil]);
    }
    if len > 0 && (pos < 1 || pos > len + 1) {
        return Err(l.error("bad argument #2 to 'remove' (position out of bounds)"));
    }
    let mut t = table.lock();
    let removed = t.get_int(pos);
    let mut i = pos;
    while i < len {
        let next = t.get_int(i + 1);
        t.set_int(i, next);
        i += 1;
    }
    if pos <= len {
        t.set_int(len, LuaValue::Nil);
    }
    Ok(vec![removed])
}

fn table_concat(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let table = check_table(l, args, 1, "concat")?;
    let sep = opt_str(l, args, 2, "concat", "")?;
    let len = table.lock().length();
    let i = opt_integer(l, args, 3, "concat", 1)?;
    let j = opt_integer(l, args, 4, "concat", len)?;

    let mut out: Vec<u8> = Vec::new();
    let mut k = i;
    while k <= j {
        let value = table.lock().get_int(k);
        match &value {
            LuaValue::Str(s) => out.extend_from_slice(s.as_bytes()),
            LuaValue::Integer(_) | LuaValue::Float(_) => {
                out.extend_from_slice(value.to_display_string().as_bytes());
            }
            other => {
                return Err(l.error(format!(
                    "invalid value (at index {}) in table for 'concat' (got {})",
                    k,
                    other.type_name()
                )));
            }
        }
        if k < j {
            out.extend_from_slice(&sep);
        }
        k += 1;
    }
    l.alloc_bytes(out).map(|v| vec![v])
}

/// table.sort(t [, comp]) - Merge sort so the comparator can raise.
fn table_sort(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let table = check_table(l, args, 1, "sort")?;
    let comparator = arg_or_nil(args, 2);
    if !comparator.is_nil() && !comparator.is_function() {
        return Err(crate::lib_registry::bad_argument(
            l, 2, "sort", "function", &comparator,
        ));
    }

    let len = table.lock().length();
    let mut items: Vec<LuaValue> = Vec::with_capacity(len as usize);
    for i in 1..=len {
        items.push(table.lock().get_int(i));
    }

    let sorted = merge_sort(l, items, &comparator)?;

    let mut t = table.lock();
    for (i, value) in sorted.into_iter().enumerate() {
        t.set_int(i as i64 + 1, value);
    }
    Ok(Vec::new())
}

fn sort_less(
    l: &mut LuaState,
    comparator: &LuaValue,
    a: &LuaValue,
    b: &LuaValue,
) -> LuaResult<bool> {
    if comparator.is_nil() {
        l.less_than(a, b)
    } else {
        let results = l.call_value(comparator.clone(), vec![a.clone(), b.clone()])?;
        Ok(results.first().map(|v| v.is_truthy()).unwrap_or(false))
    }
}

fn merge_sort(
    l: &mut LuaState,
    mut items: Vec<LuaValue>,
    comparator: &LuaValue,
) -> LuaResult<Vec<LuaValue>> {
    if items.len() <= 1 {
        return Ok(items);
    }
    let right = items.split_off(items.len() / 2);
    let left = merge_sort(l, items, comparator)?;
    let right = merge_sort(l, right, comparator)?;

    let mut out = Vec::with_capacity(left.len() + right.len());
    let (mut li, mut ri) = (0, 0);
    while li < left.len() && ri < right.len() {
        if sort_less(l, comparator, &right[ri], &left[li])? {
            out.push(right[ri].clone());
            ri += 1;
        } else {
            out.push(left[li].clone());
            li += 1;
        }
    }
    out.extend_from_slice(&left[li..]);
    out.extend_from_slice(&right[ri..]);
    Ok(out)
}

pub(crate) fn lua_unpack(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let table = check_table(l, args, 1, "unpack")?;
    let i = opt_integer(l, args, 2, "unpack", 1)?;
    let j = match args.get(2) {
        None | Some(LuaValue::Nil) => table.lock().length(),
        _ => check_integer(l, args, 3, "unpack")?,
    };
    if i > j {
        return Ok(Vec::new());
    }
    let count = (j - i + 1) as usize;
    if count > 1_000_000 {
        return Err(l.error("too many results to unpack"));
    }
    let mut out = Vec::with_capacity(count);
    let t = table.lock();
    for k in i..=j {
        out.push(t.get_int(k));
    }
    Ok(out)
}

fn table_pack(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let result = l.new_table_with(args.len(), 1)?;
    if let Some(t) = result.as_table() {
        let mut guard = t.lock();
        for (i, value) in args.iter().enumerate() {
            guard.set_int(i as i64 + 1, value.clone());
        }
        guard.set_str("n", LuaValue::Integer(args.len() as i64));
    }
    Ok(vec![result])
}

/// table.move(a1, f, e, t [, a2])
fn table_move(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let a1 = check_table(l, args, 1, "move")?;
    let f = check_integer(l, args, 2, "move")?;
    let e = check_integer(l, args, 3, "move")?;
    let t = check_integer(l, args, 4, "move")?;
    let a2 = match args.get(4) {
        None | Some(LuaValue::Nil) => a1.clone(),
        _ => check_table(l, args, 5, "move")?,
    };

    if e >= f {
        let same = a1.ptr_eq(&a2);
        // Forward copy is safe unless the ranges overlap with t inside (f, e]
        if !same || t > e || t <= f {
            for i in 0..=(e - f) {
                let value = a1.lock().get_int(f + i);
                a2.lock().set_int(t + i, value);
            }
        } else {
            for i in (0..=(e - f)).rev() {
                let value = a1.lock().get_int(f + i);
                a2.lock().set_int(t + i, value);
            }
        }
    }
    Ok(vec![LuaValue::Table(a2)])
}
