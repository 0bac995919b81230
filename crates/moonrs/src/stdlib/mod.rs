// Standard library modules

pub mod basic;
pub mod coroutine;
pub mod debug;
pub mod io;
pub mod math;
pub mod os;
pub mod package;
pub mod string;
pub mod table;
pub mod utf8;

use crate::lib_registry::LibraryRegistry;

/// The full Lua 5.4 library registry; the host filters it per trust
/// level when building an environment.
pub fn create_standard_registry() -> LibraryRegistry {
    let mut registry = LibraryRegistry::new();

    // package first so package.loaded exists when the others register
    registry.register(package::create_package_lib());
    registry.register(basic::create_basic_lib());
    registry.register(string::create_string_lib());
    registry.register(table::create_table_lib());
    registry.register(math::create_math_lib());
    registry.register(io::create_io_lib());
    registry.register(os::create_os_lib());
    registry.register(utf8::create_utf8_lib());
    registry.register(coroutine::create_coroutine_lib());
    registry.register(debug::create_debug_lib());

    registry
}
