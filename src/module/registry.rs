use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use super::{builtin, FunctionOptions, Module, ModuleDefinition};
use crate::error::Error;

/// Keyed store of modules.
///
/// Two instances mediate compilation: the process-wide design-time
/// registry (seeded once with the bundled modules, see [`with_design`])
/// and a per-session runtime registry the compiler repopulates with
/// option-rewritten copies.
pub struct ModuleRegistry {
    modules: IndexMap<String, Rc<RefCell<Module>>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self {
            modules: IndexMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn has(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Registers a module under its own name. Occupied names are rejected.
    pub fn register(&mut self, module: Module) -> Result<Rc<RefCell<Module>>, Error> {
        let name = module.name().to_string();
        if self.modules.contains_key(&name) {
            return Err(Error::ModuleOccupied(name));
        }

        let module = Rc::new(RefCell::new(module));
        self.modules.insert(name, Rc::clone(&module));
        Ok(module)
    }

    pub fn resolve(&self, name: &str) -> Result<Rc<RefCell<Module>>, Error> {
        self.modules
            .get(name)
            .map(Rc::clone)
            .ok_or_else(|| Error::NoSuchModule(name.to_string()))
    }

    pub fn remove(&mut self, name: &str) -> Option<Rc<RefCell<Module>>> {
        self.modules.shift_remove(name)
    }

    /// Registers every module of an iterator, stopping at the first fault.
    pub fn load<I>(&mut self, modules: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = Module>,
    {
        for module in modules {
            self.register(module)?;
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.modules.clear();
    }

    /// Compiles every module and returns its definition, in registration
    /// order.
    pub fn available(&self) -> Result<Vec<ModuleDefinition>, Error> {
        self.modules
            .values()
            .map(|module| module.borrow_mut().definition())
            .collect()
    }

    /// Finds the option record registered under a function name or import
    /// alias. This is how the driver maps a user-level option onto its
    /// namespaced uniform.
    pub fn resolve_options(&self, key: &str) -> Option<FunctionOptions> {
        self.modules
            .values()
            .find_map(|module| module.borrow().options().function(key).cloned())
    }
}

thread_local! {
    static DESIGN: RefCell<Option<ModuleRegistry>> = RefCell::new(None);
}

/// Runs `f` against the design-time registry, seeding it with the bundled
/// modules on first access.
///
/// The registry is per-thread state; do not trigger compilation from
/// inside `f`, compilation resolves modules here itself.
pub fn with_design<R>(f: impl FnOnce(&mut ModuleRegistry) -> R) -> R {
    DESIGN.with(|cell| {
        let mut slot = cell.borrow_mut();
        let registry = slot.get_or_insert_with(builtin::seeded_registry);
        f(registry)
    })
}

/// Resolves a module in the design-time registry.
pub fn resolve_design(name: &str) -> Result<Rc<RefCell<Module>>, Error> {
    with_design(|registry| registry.resolve(name))
}

pub(crate) fn register_design(module: Module) -> Result<Rc<RefCell<Module>>, Error> {
    with_design(|registry| registry.register(module))
}
