// Test module organization

pub mod test_basic;
pub mod test_control_flow;
pub mod test_coroutine;
pub mod test_host;
pub mod test_io_os;
pub mod test_math;
pub mod test_metamethods;
pub mod test_operators;
pub mod test_package;
pub mod test_string;
pub mod test_syntax;
pub mod test_table;
pub mod test_tbc;
pub mod test_utf8;

use crate::lua_value::LuaValue;

/// Run a chunk at full trust and return its results.
pub fn run(source: &str) -> Vec<LuaValue> {
    match crate::execute(source) {
        Ok(values) => values,
        Err(err) => panic!("execution failed: {}\nsource:\n{}", err, source),
    }
}

/// Run a chunk expected to raise; returns the error message.
pub fn run_err(source: &str) -> String {
    match crate::execute(source) {
        Ok(values) => panic!("expected error, got {:?}\nsource:\n{}", values, source),
        Err(err) => err.message(),
    }
}

/// Run a chunk that returns a single integer.
pub fn run_int(source: &str) -> i64 {
    let values = run(source);
    match values.first() {
        Some(LuaValue::Integer(i)) => *i,
        other => panic!("expected integer result, got {:?}", other),
    }
}

/// Run a chunk that returns a single string.
pub fn run_str(source: &str) -> String {
    let values = run(source);
    match values.first() {
        Some(LuaValue::Str(s)) => s.display().into_owned(),
        other => panic!("expected string result, got {:?}", other),
    }
}

/// Run a chunk full of `assert(...)` statements.
pub fn check(source: &str) {
    run(source);
}
