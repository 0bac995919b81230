// OS library
// Implements: time, date, clock, difftime, getenv, setenv, exit, remove,
// rename, tmpname, execute. Process-affecting functions only survive
// policy filtering at Trusted and above.

use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, Datelike, Local, TimeZone, Timelike, Utc};

use crate::lib_registry::{LibraryModule, check_integer, check_str, check_table, opt_str};
use crate::lua_interp::{LuaResult, LuaState};
use crate::lua_value::LuaValue;

pub fn create_os_lib() -> LibraryModule {
    crate::lib_module!("os", {
        "time" => os_time,
        "date" => os_date,
        "clock" => os_clock,
        "difftime" => os_difftime,
        "getenv" => os_getenv,
        "setenv" => os_setenv,
        "exit" => os_exit,
        "remove" => os_remove,
        "rename" => os_rename,
        "tmpname" => os_tmpname,
        "execute" => os_execute,
    })
}

fn os_time(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    match args.first() {
        None | Some(LuaValue::Nil) => Ok(vec![LuaValue::Integer(Utc::now().timestamp())]),
        Some(LuaValue::Table(_)) => {
            let spec = check_table(l, args, 1, "time")?;
            let field = |name: &str, default: Option<i64>| -> LuaResult<i64> {
                let value = spec.lock().get_str(name);
                match crate::lua_value::number::coerce_integer(&value) {
                    Some(i) => Ok(i),
                    None => default.ok_or_else(|| {
                        l.error(format!("field '{}' missing in date table", name))
                    }),
                }
            };
            let year = field("year", None)?;
            let month = field("month", None)?;
            let day = field("day", None)?;
            let hour = field("hour", Some(12))?;
            let min = field("min", Some(0))?;
            let sec = field("sec", Some(0))?;
            match Local.with_ymd_and_hms(
                year as i32,
                month as u32,
                day as u32,
                hour as u32,
                min as u32,
                sec as u32,
            ) {
                chrono::LocalResult::Single(dt) | chrono::LocalResult::Ambiguous(dt, _) => {
                    Ok(vec![LuaValue::Integer(dt.timestamp())])
                }
                chrono::LocalResult::None => {
                    Err(l.error("time result cannot be represented"))
                }
            }
        }
        Some(other) => Err(crate::lib_registry::bad_argument(
            l, 1, "time", "table", other,
        )),
    }
}

fn date_table<Tz: TimeZone>(l: &mut LuaState, dt: &DateTime<Tz>) -> LuaResult<LuaValue> {
    let table = l.new_table_with(0, 9)?;
    if let Some(t) = table.as_table() {
        let mut guard = t.lock();
        guard.set_str("year", LuaValue::Integer(dt.year() as i64));
        guard.set_str("month", LuaValue::Integer(dt.month() as i64));
        guard.set_str("day", LuaValue::Integer(dt.day() as i64));
        guard.set_str("hour", LuaValue::Integer(dt.hour() as i64));
        guard.set_str("min", LuaValue::Integer(dt.minute() as i64));
        guard.set_str("sec", LuaValue::Integer(dt.second() as i64));
        guard.set_str(
            "wday",
            LuaValue::Integer(dt.weekday().number_from_sunday() as i64),
        );
        guard.set_str("yday", LuaValue::Integer(dt.ordinal() as i64));
        guard.set_str("isdst", LuaValue::Boolean(false));
    }
    Ok(table)
}

fn os_date(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let format = opt_str(l, args, 1, "date", "%c")?;
    let mut format = String::from_utf8_lossy(&format).into_owned();
    let timestamp = match args.get(1) {
        None | Some(LuaValue::Nil) => Utc::now().timestamp(),
        _ => check_integer(l, args, 2, "date")?,
    };

    let utc = format.starts_with('!');
    if utc {
        format.remove(0);
    }

    if utc {
        let dt: DateTime<Utc> = match Utc.timestamp_opt(timestamp, 0) {
            chrono::LocalResult::Single(dt) => dt,
            _ => return Err(l.error("time value out of range")),
        };
        if format == "*t" {
            return Ok(vec![date_table(l, &dt)?]);
        }
        let rendered = dt.format(&format).to_string();
        return l.alloc_str(rendered).map(|v| vec![v]);
    }

    let dt: DateTime<Local> = match Local.timestamp_opt(timestamp, 0) {
        chrono::LocalResult::Single(dt) | chrono::LocalResult::Ambiguous(dt, _) => dt,
        chrono::LocalResult::None => return Err(l.error("time value out of range")),
    };
    if format == "*t" {
        return Ok(vec![date_table(l, &dt)?]);
    }
    let rendered = dt.format(&format).to_string();
    l.alloc_str(rendered).map(|v| vec![v])
}

/// CPU-ish clock: seconds since this runtime started.
fn os_clock(l: &mut LuaState, _args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let elapsed = l.rt.start_time.elapsed().as_secs_f64();
    Ok(vec![LuaValue::Float(elapsed)])
}

fn os_difftime(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let t2 = check_integer(l, args, 1, "difftime")?;
    let t1 = match args.get(1) {
        None | Some(LuaValue::Nil) => 0,
        _ => check_integer(l, args, 2, "difftime")?,
    };
    Ok(vec![LuaValue::Float((t2 - t1) as f64)])
}

fn os_getenv(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let name = check_str(l, args, 1, "getenv")?;
    let name = String::from_utf8_lossy(&name).into_owned();
    match std::env::var(&name) {
        Ok(value) => l.alloc_str(value).map(|v| vec![v]),
        Err(_) => Ok(vec![LuaValue::Nil]),
    }
}

fn os_setenv(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let name = check_str(l, args, 1, "setenv")?;
    let name = String::from_utf8_lossy(&name).into_owned();
    match args.get(1) {
        None | Some(LuaValue::Nil) => unsafe { std::env::remove_var(&name) },
        Some(value) => {
            let value = value.to_display_string();
            unsafe { std::env::set_var(&name, value) }
        }
    }
    Ok(vec![LuaValue::Boolean(true)])
}

fn os_exit(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let code = match args.first() {
        None | Some(LuaValue::Nil) | Some(LuaValue::Boolean(true)) => 0,
        Some(LuaValue::Boolean(false)) => 1,
        _ => check_integer(l, args, 1, "exit")? as i32,
    };
    std::process::exit(code);
}

fn os_remove(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let path = check_str(l, args, 1, "remove")?;
    let path = String::from_utf8_lossy(&path).into_owned();
    let result = if std::path::Path::new(&path).is_dir() {
        std::fs::remove_dir(&path)
    } else {
        std::fs::remove_file(&path)
    };
    match result {
        Ok(()) => Ok(vec![LuaValue::Boolean(true)]),
        Err(e) => Ok(vec![
            LuaValue::Nil,
            LuaValue::string_owned(format!("{}: {}", path, e)),
        ]),
    }
}

fn os_rename(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let from = check_str(l, args, 1, "rename")?;
    let to = check_str(l, args, 2, "rename")?;
    let from = String::from_utf8_lossy(&from).into_owned();
    let to = String::from_utf8_lossy(&to).into_owned();
    match std::fs::rename(&from, &to) {
        Ok(()) => Ok(vec![LuaValue::Boolean(true)]),
        Err(e) => Ok(vec![
            LuaValue::Nil,
            LuaValue::string_owned(format!("{} -> {}: {}", from, to, e)),
        ]),
    }
}

fn os_tmpname(l: &mut LuaState, _args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let path = std::env::temp_dir().join(format!(
        "lua_{}_{}",
        std::process::id(),
        n
    ));
    l.alloc_str(path.to_string_lossy().into_owned())
        .map(|v| vec![v])
}

fn os_execute(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let command = match args.first() {
        None | Some(LuaValue::Nil) => {
            // execute() asks whether a shell is available
            return Ok(vec![LuaValue::Boolean(cfg!(unix) || cfg!(windows))]);
        }
        _ => check_str(l, args, 1, "execute")?,
    };
    let command = String::from_utf8_lossy(&command).into_owned();

    let status = if cfg!(windows) {
        std::process::Command::new("cmd").args(["/C", &command]).status()
    } else {
        std::process::Command::new("sh").args(["-c", &command]).status()
    };

    match status {
        Ok(status) => {
            let code = status.code().unwrap_or(-1) as i64;
            Ok(vec![
                LuaValue::Boolean(status.success()),
                LuaValue::str("exit"),
                LuaValue::Integer(code),
            ])
        }
        Err(e) => Ok(vec![
            LuaValue::Nil,
            LuaValue::string_owned(format!("cannot run command: {}", e)),
        ]),
    }
}
