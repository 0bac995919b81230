// Host-owned opaque values with an optional metatable

use std::any::Any;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::lua_value::lua_value::LuaValue;

pub struct LuaUserdata {
    data: Mutex<Box<dyn Any + Send>>,
    metatable: Mutex<Option<LuaValue>>,
    /// Type tag shown by `io.type`-style introspection.
    pub tag: &'static str,
}

impl LuaUserdata {
    pub fn new<T: Any + Send>(tag: &'static str, data: T) -> Self {
        LuaUserdata {
            data: Mutex::new(Box::new(data)),
            metatable: Mutex::new(None),
            tag,
        }
    }

    pub fn data(&self) -> MutexGuard<'_, Box<dyn Any + Send>> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` over the payload when it has type `T`.
    pub fn with<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut guard = self.data();
        guard.downcast_mut::<T>().map(f)
    }

    pub fn metatable(&self) -> Option<LuaValue> {
        self.metatable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_metatable(&self, mt: Option<LuaValue>) {
        *self
            .metatable
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = mt;
    }
}
