// Lexical scopes
// A scope maps names to shared binding cells; closures capture the scope
// they were defined in, which makes upvalues shared-by-reference for
// free: the outer frame mutates the cell, inner closures observe it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ahash::AHashMap;

use crate::compiler::ast::{Attrib, Name};
use crate::lua_value::LuaValue;

/// One local binding: current value, declaration attribute, and whether a
/// `<close>` binding has already been closed.
pub struct Binding {
    pub value: LuaValue,
    pub attrib: Attrib,
    pub closed: bool,
}

pub type BindingCell = Arc<Mutex<Binding>>;

pub fn new_cell(value: LuaValue, attrib: Attrib) -> BindingCell {
    Arc::new(Mutex::new(Binding {
        value,
        attrib,
        closed: false,
    }))
}

pub fn lock_cell(cell: &BindingCell) -> MutexGuard<'_, Binding> {
    cell.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Scope {
    vars: Mutex<AHashMap<Name, BindingCell>>,
    parent: Option<Arc<Scope>>,
    /// Set on function (and chunk) scopes; block scopes inherit.
    varargs: Option<Arc<Vec<LuaValue>>>,
}

impl Scope {
    /// Top-level scope of a chunk: declares `_ENV` bound to the supplied
    /// globals table, plus the chunk varargs.
    pub fn chunk(globals: LuaValue, varargs: Vec<LuaValue>) -> Arc<Scope> {
        let scope = Scope {
            vars: Mutex::new(AHashMap::new()),
            parent: None,
            varargs: Some(Arc::new(varargs)),
        };
        scope.declare(Name::new("_ENV"), globals, Attrib::None);
        Arc::new(scope)
    }

    /// Fresh block scope nested in `parent`.
    pub fn block(parent: &Arc<Scope>) -> Arc<Scope> {
        Arc::new(Scope {
            vars: Mutex::new(AHashMap::new()),
            parent: Some(parent.clone()),
            varargs: None,
        })
    }

    /// Function-entry scope chaining the captured environment.
    pub fn function(captured: &Arc<Scope>, varargs: Vec<LuaValue>) -> Arc<Scope> {
        Arc::new(Scope {
            vars: Mutex::new(AHashMap::new()),
            parent: Some(captured.clone()),
            varargs: Some(Arc::new(varargs)),
        })
    }

    /// Declare a (possibly shadowing) local. Returns the new cell.
    pub fn declare(&self, name: Name, value: LuaValue, attrib: Attrib) -> BindingCell {
        let cell = new_cell(value, attrib);
        self.lock_vars().insert(name, cell.clone());
        cell
    }

    /// Resolve a name through the scope chain.
    pub fn lookup(&self, name: &str) -> Option<BindingCell> {
        if let Some(cell) = self.lock_vars().get(name) {
            return Some(cell.clone());
        }
        self.parent.as_ref()?.lookup(name)
    }

    /// Binding in this scope only (used by goto unwinding).
    pub fn get_own(&self, name: &str) -> Option<BindingCell> {
        self.lock_vars().get(name).cloned()
    }

    /// Reinstate or remove a binding in this scope (goto unwinding).
    pub fn restore(&self, name: &Name, previous: Option<BindingCell>) {
        let mut vars = self.lock_vars();
        match previous {
            Some(cell) => {
                vars.insert(name.clone(), cell);
            }
            None => {
                vars.remove(name);
            }
        }
    }

    /// The varargs of the nearest enclosing function.
    pub fn varargs(&self) -> Arc<Vec<LuaValue>> {
        let mut scope = self;
        loop {
            if let Some(va) = &scope.varargs {
                return va.clone();
            }
            match &scope.parent {
                Some(parent) => scope = parent,
                None => return Arc::new(Vec::new()),
            }
        }
    }

    fn lock_vars(&self) -> MutexGuard<'_, AHashMap<Name, BindingCell>> {
        self.vars.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
