// The Lua value universe: tagged values, strings, tables, userdata and
// the numeric tower.

mod lua_string;
mod lua_table;
mod lua_userdata;
#[allow(clippy::module_inception)]
mod lua_value;
pub mod number;

pub use lua_string::LuaStr;
pub use lua_table::{LuaKey, LuaTable, LuaTableRef};
pub use lua_userdata::LuaUserdata;
pub use lua_value::{
    BoxedNativeFn, LuaClosure, LuaValue, LuaValueKind, NativeFn, NativeFunction,
};
