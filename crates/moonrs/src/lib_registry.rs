// Library registration system for Lua standard libraries
// Declarative modules of native functions and values, loaded into a
// globals table; the host filters what gets loaded by trust level.

use crate::lua_interp::{LuaResult, LuaState};
use crate::lua_value::{LuaValue, NativeFn};

/// Value initializers run at load time with the state available.
pub type ValueInitializer = fn(&mut LuaState) -> LuaResult<LuaValue>;

/// Module initializers set up extra wiring (metatables, caches) after
/// the table is populated.
pub type ModuleInitializer = fn(&mut LuaState, &LuaValue) -> LuaResult<()>;

pub enum LibraryEntry {
    Function(NativeFn),
    Value(ValueInitializer),
}

/// A library module: a named set of functions and values.
pub struct LibraryModule {
    pub name: &'static str,
    pub entries: Vec<(&'static str, LibraryEntry)>,
    pub initializer: Option<ModuleInitializer>,
}

impl LibraryModule {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Vec::new(),
            initializer: None,
        }
    }

    pub fn with_function(mut self, name: &'static str, func: NativeFn) -> Self {
        self.entries.push((name, LibraryEntry::Function(func)));
        self
    }

    pub fn with_value(mut self, name: &'static str, value_init: ValueInitializer) -> Self {
        self.entries.push((name, LibraryEntry::Value(value_init)));
        self
    }

    pub fn with_initializer(mut self, init: ModuleInitializer) -> Self {
        self.initializer = Some(init);
        self
    }
}

/// Builder for library modules.
#[macro_export]
macro_rules! lib_module {
    ($name:expr, {
        $($item_name:expr => $item:expr),* $(,)?
    }) => {{
        let mut module = $crate::lib_registry::LibraryModule::new($name);
        $(
            module.entries.push((
                $item_name,
                $crate::lib_registry::LibraryEntry::Function($item),
            ));
        )*
        module
    }};
}

/// Registry of library modules in load order.
pub struct LibraryRegistry {
    modules: Vec<LibraryModule>,
}

impl LibraryRegistry {
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
        }
    }

    pub fn register(&mut self, module: LibraryModule) {
        self.modules.push(module);
    }

    pub fn modules(&self) -> &[LibraryModule] {
        &self.modules
    }

    /// Load every registered module whose name passes `filter` into
    /// `globals`.
    pub fn load_filtered(
        &self,
        l: &mut LuaState,
        globals: &LuaValue,
        filter: impl Fn(&str) -> bool,
    ) -> LuaResult<()> {
        for module in &self.modules {
            if filter(module.name) {
                self.load_module(l, globals, module)?;
            }
        }
        Ok(())
    }

    pub fn load_module(
        &self,
        l: &mut LuaState,
        globals: &LuaValue,
        module: &LibraryModule,
    ) -> LuaResult<()> {
        let Some(globals_table) = globals.as_table() else {
            return Err(LuaError::runtime("globals must be a table"));
        };

        if module.name == "_G" {
            // Global functions land directly in the globals table
            for (name, entry) in &module.entries {
                let value = self.materialize(l, name, entry)?;
                globals_table.lock().set_str(name, value);
            }
            globals_table.lock().set_str("_G", globals.clone());
        } else {
            let lib = l.new_table_with(0, module.entries.len())?;
            {
                let lib_table = lib.as_table().expect("fresh table");
                for (name, entry) in &module.entries {
                    let value = self.materialize(l, name, entry)?;
                    lib_table.lock().set_str(name, value);
                }
            }
            globals_table.lock().set_str(module.name, lib.clone());

            // Standard libraries are require-able via package.loaded
            let package = globals_table.lock().get_str("package");
            if let Some(package_table) = package.as_table() {
                let loaded = package_table.lock().get_str("loaded");
                if let Some(loaded_table) = loaded.as_table() {
                    loaded_table.lock().set_str(module.name, lib.clone());
                }
            }

            if let Some(init) = module.initializer {
                init(l, &lib)?;
            }
            return Ok(());
        }

        if let Some(init) = module.initializer {
            init(l, globals)?;
        }
        Ok(())
    }

    fn materialize(
        &self,
        l: &mut LuaState,
        name: &'static str,
        entry: &LibraryEntry,
    ) -> LuaResult<LuaValue> {
        Ok(match entry {
            LibraryEntry::Function(func) => LuaValue::native(name, *func),
            LibraryEntry::Value(init) => init(l)?,
        })
    }
}

impl Default for LibraryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ===== argument helpers =====

use crate::lua_interp::LuaError;

pub fn arg_or_nil(args: &[LuaValue], n: usize) -> LuaValue {
    args.get(n - 1).cloned().unwrap_or(LuaValue::Nil)
}

/// Required argument at 1-based position `n`.
pub fn check_arg(
    l: &LuaState,
    args: &[LuaValue],
    n: usize,
    fname: &str,
) -> LuaResult<LuaValue> {
    match args.get(n - 1) {
        Some(v) => Ok(v.clone()),
        None => Err(l.error(format!(
            "bad argument #{} to '{}' (value expected)",
            n, fname
        ))),
    }
}

pub fn check_integer(l: &LuaState, args: &[LuaValue], n: usize, fname: &str) -> LuaResult<i64> {
    let value = arg_or_nil(args, n);
    match crate::lua_value::number::coerce_integer(&value) {
        Some(i) => Ok(i),
        None => Err(bad_argument(l, n, fname, "number", &value)),
    }
}

pub fn check_number(l: &LuaState, args: &[LuaValue], n: usize, fname: &str) -> LuaResult<f64> {
    let value = arg_or_nil(args, n);
    match crate::lua_value::number::coerce_number(&value) {
        Some(LuaValue::Integer(i)) => Ok(i as f64),
        Some(LuaValue::Float(f)) => Ok(f),
        _ => Err(bad_argument(l, n, fname, "number", &value)),
    }
}

pub fn check_str(
    l: &LuaState,
    args: &[LuaValue],
    n: usize,
    fname: &str,
) -> LuaResult<Vec<u8>> {
    let value = arg_or_nil(args, n);
    match &value {
        LuaValue::Str(s) => Ok(s.as_bytes().to_vec()),
        // Numbers convert implicitly where a string is expected
        LuaValue::Integer(_) | LuaValue::Float(_) => {
            Ok(value.to_display_string().into_bytes())
        }
        _ => Err(bad_argument(l, n, fname, "string", &value)),
    }
}

pub fn check_table(
    l: &LuaState,
    args: &[LuaValue],
    n: usize,
    fname: &str,
) -> LuaResult<crate::lua_value::LuaTableRef> {
    let value = arg_or_nil(args, n);
    match value.as_table() {
        Some(t) => Ok(t.clone()),
        None => Err(bad_argument(l, n, fname, "table", &value)),
    }
}

pub fn check_function(
    l: &LuaState,
    args: &[LuaValue],
    n: usize,
    fname: &str,
) -> LuaResult<LuaValue> {
    let value = arg_or_nil(args, n);
    if value.is_function() {
        Ok(value)
    } else {
        Err(bad_argument(l, n, fname, "function", &value))
    }
}

pub fn opt_integer(
    l: &LuaState,
    args: &[LuaValue],
    n: usize,
    fname: &str,
    default: i64,
) -> LuaResult<i64> {
    match args.get(n - 1) {
        None | Some(LuaValue::Nil) => Ok(default),
        _ => check_integer(l, args, n, fname),
    }
}

pub fn opt_str(
    l: &LuaState,
    args: &[LuaValue],
    n: usize,
    fname: &str,
    default: &str,
) -> LuaResult<Vec<u8>> {
    match args.get(n - 1) {
        None | Some(LuaValue::Nil) => Ok(default.as_bytes().to_vec()),
        _ => check_str(l, args, n, fname),
    }
}

pub fn bad_argument(
    l: &LuaState,
    n: usize,
    fname: &str,
    expected: &str,
    got: &LuaValue,
) -> LuaError {
    let got = if got.is_nil() {
        "no value".to_string()
    } else {
        got.type_name().to_string()
    };
    l.error(format!(
        "bad argument #{} to '{}' ({} expected, got {})",
        n, fname, expected, got
    ))
}
