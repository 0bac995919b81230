// IO library
// Implements: open, close, read, write, lines, type, stdin, stdout,
// stderr, plus the file handle methods. Handles expose __close so
// `local f <close> = io.open(...)` releases them on scope exit.

pub mod file;

use std::sync::{Arc, Mutex};

use crate::lib_registry::{
    LibraryModule, arg_or_nil, bad_argument, check_str, opt_str,
};
use crate::lua_interp::{LuaResult, LuaState};
use crate::lua_value::{LuaUserdata, LuaValue, NativeFunction};
use file::{FILE_TAG, FileKind, LuaFile, ReadFormat};

pub fn create_io_lib() -> LibraryModule {
    crate::lib_module!("io", {
        "open" => io_open,
        "close" => io_close,
        "read" => io_read,
        "write" => io_write,
        "lines" => io_lines,
        "type" => io_type,
    })
    .with_initializer(|l, lib| {
        // Shared metatable: methods via __index, release via __close
        let methods = l.new_table_with(0, 8)?;
        if let Some(t) = methods.as_table() {
            let mut guard = t.lock();
            guard.set_str("read", LuaValue::native("read", file_read));
            guard.set_str("write", LuaValue::native("write", file_write));
            guard.set_str("lines", LuaValue::native("lines", file_lines));
            guard.set_str("close", LuaValue::native("close", file_close));
            guard.set_str("flush", LuaValue::native("flush", file_flush));
            guard.set_str("seek", LuaValue::native("seek", file_seek));
            guard.set_str("setvbuf", LuaValue::native("setvbuf", file_setvbuf));
        }
        let mt = l.new_table_with(0, 4)?;
        if let Some(t) = mt.as_table() {
            let mut guard = t.lock();
            guard.set_str("__index", methods);
            guard.set_str("__close", LuaValue::native("close", file_close));
            guard.set_str("__tostring", LuaValue::native("tostring", file_tostring));
            guard.set_str("__name", LuaValue::str(FILE_TAG));
        }
        l.rt.set_file_metatable(mt);

        if let Some(t) = lib.as_table() {
            let stdin = make_handle(l, FileKind::Stdin)?;
            let stdout = make_handle(l, FileKind::Stdout)?;
            let stderr = make_handle(l, FileKind::Stderr)?;
            let mut guard = t.lock();
            guard.set_str("stdin", stdin);
            guard.set_str("stdout", stdout);
            guard.set_str("stderr", stderr);
        }
        Ok(())
    })
}

fn make_handle(l: &mut LuaState, kind: FileKind) -> LuaResult<LuaValue> {
    l.charge_memory(128)?;
    let userdata = LuaUserdata::new(FILE_TAG, Mutex::new(LuaFile { kind }));
    userdata.set_metatable(Some(l.rt.file_metatable()));
    Ok(LuaValue::Userdata(Arc::new(userdata)))
}

/// Run `f` over the LuaFile inside a handle userdata.
fn with_file<R>(
    value: &LuaValue,
    f: impl FnOnce(&mut LuaFile) -> R,
) -> Option<R> {
    match value {
        LuaValue::Userdata(u) if u.tag == FILE_TAG => u.with(|m: &mut Mutex<LuaFile>| {
            let mut guard = m.lock().unwrap_or_else(|e| e.into_inner());
            f(&mut guard)
        }),
        _ => None,
    }
}

fn expect_file<R>(
    l: &LuaState,
    args: &[LuaValue],
    n: usize,
    fname: &str,
    f: impl FnOnce(&mut LuaFile) -> R,
) -> LuaResult<R> {
    let value = arg_or_nil(args, n);
    with_file(&value, f).ok_or_else(|| bad_argument(l, n, fname, FILE_TAG, &value))
}

fn io_open(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let path = check_str(l, args, 1, "open")?;
    let path = String::from_utf8_lossy(&path).into_owned();
    let mode = opt_str(l, args, 2, "open", "r")?;
    let mode = String::from_utf8_lossy(&mode).into_owned();
    match LuaFile::open(&path, &mode) {
        Ok(file) => Ok(vec![make_handle(l, file.kind)?]),
        Err(e) => Ok(vec![
            LuaValue::Nil,
            LuaValue::string_owned(format!("{}: {}", path, e)),
            LuaValue::Integer(e.raw_os_error().unwrap_or(-1) as i64),
        ]),
    }
}

fn io_close(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    if args.is_empty() {
        return Ok(vec![LuaValue::Boolean(true)]);
    }
    file_close(l, args)
}

fn io_read(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let mut stdin = LuaFile { kind: FileKind::Stdin };
    read_formats(l, &mut stdin, args, 0)
}

fn io_write(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let mut stdout = LuaFile {
        kind: FileKind::Stdout,
    };
    write_values(l, &mut stdout, args, 0)?;
    // Return the stdout handle for chaining
    let io_table = {
        let globals = l.globals();
        globals
            .as_table()
            .map(|t| t.lock().get_str("io"))
            .unwrap_or(LuaValue::Nil)
    };
    let stdout_handle = io_table
        .as_table()
        .map(|t| t.lock().get_str("stdout"))
        .unwrap_or(LuaValue::Nil);
    Ok(vec![stdout_handle])
}

fn io_lines(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    if args.is_empty() || args[0].is_nil() {
        return Ok(vec![make_lines_iterator(
            make_handle(l, FileKind::Stdin)?,
            vec![],
            false,
        )]);
    }
    let path = check_str(l, args, 1, "lines")?;
    let path = String::from_utf8_lossy(&path).into_owned();
    let file = LuaFile::open(&path, "r")
        .map_err(|e| l.error(format!("{}: {}", path, e)))?;
    let handle = make_handle(l, file.kind)?;
    let formats = parse_read_formats(l, args, 1)?;
    Ok(vec![make_lines_iterator(handle, formats, true)])
}

fn io_type(_l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let value = arg_or_nil(args, 1);
    let status = with_file(&value, |file| file.is_closed());
    Ok(vec![match status {
        Some(true) => LuaValue::str("closed file"),
        Some(false) => LuaValue::str("file"),
        None => LuaValue::Nil,
    }])
}

// ===== file methods =====

fn file_read(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let formats = parse_read_formats(l, args, 1)?;
    expect_file(l, args, 1, "read", |file| {
        let mut out = Vec::new();
        let effective = if formats.is_empty() {
            std::slice::from_ref(&DEFAULT_FORMAT)
        } else {
            &formats
        };
        for format in effective {
            match file.read_format(format) {
                Ok(LuaValue::Nil) => {
                    out.push(LuaValue::Nil);
                    break;
                }
                Ok(v) => out.push(v),
                Err(e) => return Err(e.to_string()),
            }
        }
        Ok(out)
    })?
    .map_err(|msg| l.error(msg))
}

static DEFAULT_FORMAT: ReadFormat = ReadFormat::Line { keep_newline: false };

fn parse_read_formats(
    l: &LuaState,
    args: &[LuaValue],
    skip: usize,
) -> LuaResult<Vec<ReadFormat>> {
    args[skip.min(args.len())..]
        .iter()
        .map(|spec| ReadFormat::parse(spec).map_err(|msg| l.error(msg)))
        .collect()
}

fn read_formats(
    l: &mut LuaState,
    file: &mut LuaFile,
    args: &[LuaValue],
    skip: usize,
) -> LuaResult<Vec<LuaValue>> {
    let formats = parse_read_formats(l, args, skip)?;
    let effective = if formats.is_empty() {
        std::slice::from_ref(&DEFAULT_FORMAT)
    } else {
        &formats
    };
    let mut out = Vec::new();
    for format in effective {
        match file.read_format(format) {
            Ok(LuaValue::Nil) => {
                out.push(LuaValue::Nil);
                break;
            }
            Ok(v) => out.push(v),
            Err(e) => return Err(l.error(e.to_string())),
        }
    }
    Ok(out)
}

fn write_values(
    l: &mut LuaState,
    file: &mut LuaFile,
    args: &[LuaValue],
    skip: usize,
) -> LuaResult<()> {
    for (i, value) in args.iter().enumerate().skip(skip) {
        let bytes = match value {
            LuaValue::Str(s) => s.as_bytes().to_vec(),
            LuaValue::Integer(_) | LuaValue::Float(_) => {
                value.to_display_string().into_bytes()
            }
            other => return Err(bad_argument(l, i + 1, "write", "string", other)),
        };
        file.write_bytes(&bytes).map_err(|e| l.error(e.to_string()))?;
    }
    Ok(())
}

fn file_write(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let outcome = expect_file(l, args, 1, "write", |file| {
        for value in &args[1..] {
            let bytes = match value {
                LuaValue::Str(s) => s.as_bytes().to_vec(),
                LuaValue::Integer(_) | LuaValue::Float(_) => {
                    value.to_display_string().into_bytes()
                }
                other => return Err(format!("invalid write value (a {})", other.type_name())),
            };
            if let Err(e) = file.write_bytes(&bytes) {
                return Err(e.to_string());
            }
        }
        Ok(())
    })?;
    match outcome {
        Ok(()) => Ok(vec![arg_or_nil(args, 1)]),
        Err(msg) => Ok(vec![LuaValue::Nil, LuaValue::string_owned(msg)]),
    }
}

fn file_lines(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    // Validate the handle up front
    expect_file(l, args, 1, "lines", |_| ())?;
    let formats = parse_read_formats(l, args, 1)?;
    Ok(vec![make_lines_iterator(
        arg_or_nil(args, 1),
        formats,
        false,
    )])
}

fn make_lines_iterator(
    handle: LuaValue,
    formats: Vec<ReadFormat>,
    close_at_eof: bool,
) -> LuaValue {
    let iterator = NativeFunction::from_closure("lines_iterator", move |l, _args| {
        let effective: &[ReadFormat] = if formats.is_empty() {
            std::slice::from_ref(&DEFAULT_FORMAT)
        } else {
            &formats
        };
        let result = with_file(&handle, |file| {
            let mut out = Vec::new();
            for format in effective {
                match file.read_format(format) {
                    Ok(v) => out.push(v),
                    Err(e) => return Err(e.to_string()),
                }
            }
            Ok(out)
        });
        match result {
            Some(Ok(values)) => {
                if values.first().map(|v| v.is_nil()).unwrap_or(true) {
                    if close_at_eof {
                        with_file(&handle, |file| file.close());
                    }
                    Ok(vec![LuaValue::Nil])
                } else {
                    Ok(values)
                }
            }
            Some(Err(msg)) => Err(l.error(msg)),
            None => Err(l.error("file handle lost")),
        }
    });
    LuaValue::Native(Arc::new(iterator))
}

/// close method and __close handler share this entry.
fn file_close(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    expect_file(l, args, 1, "close", |file| {
        let _ = file.flush();
        file.close();
    })?;
    Ok(vec![LuaValue::Boolean(true)])
}

fn file_flush(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let outcome = expect_file(l, args, 1, "flush", |file| file.flush())?;
    outcome.map_err(|e| l.error(e.to_string()))?;
    Ok(vec![arg_or_nil(args, 1)])
}

fn file_seek(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let whence = opt_str(l, args, 2, "seek", "cur")?;
    let whence = String::from_utf8_lossy(&whence).into_owned();
    let offset = crate::lib_registry::opt_integer(l, args, 3, "seek", 0)?;
    let outcome = expect_file(l, args, 1, "seek", |file| file.seek(&whence, offset))?;
    match outcome {
        Ok(pos) => Ok(vec![LuaValue::Integer(pos as i64)]),
        Err(e) => Ok(vec![
            LuaValue::Nil,
            LuaValue::string_owned(e.to_string()),
        ]),
    }
}

fn file_setvbuf(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    expect_file(l, args, 1, "setvbuf", |_| ())?;
    Ok(vec![LuaValue::Boolean(true)])
}

fn file_tostring(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let value = arg_or_nil(args, 1);
    let closed = with_file(&value, |file| file.is_closed()).unwrap_or(true);
    let text = if closed {
        "file (closed)".to_string()
    } else {
        format!("file ({:#x})", value.ref_addr().unwrap_or(0))
    };
    l.alloc_str(text).map(|v| vec![v])
}
