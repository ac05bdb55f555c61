//! Loaded modules

use crate::interpreter::compile;
use crate::interpreter::context::ContextId;
use crate::interpreter::stepper::Stepper;
use crate::interpreter::types::Program;
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

/// Search-location tier a module was found in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tier {
    Native,
    Builtin,
    PreLibrary,
    Normal,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Native, Tier::Builtin, Tier::PreLibrary, Tier::Normal];
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tier::Native => "native",
            Tier::Builtin => "builtin",
            Tier::PreLibrary => "pre-library",
            Tier::Normal => "normal",
        };
        f.write_str(name)
    }
}

/// A compiled module bound to its top-level context
#[derive(Debug, Clone)]
pub struct Script {
    pub name: String,
    pub tier: Tier,
    /// File the program came from; `None` for host-only modules and inline scripts
    pub origin: Option<PathBuf>,
    pub context: ContextId,
    pub program: Rc<Program>,
    /// Top-level function `run_script` calls after the initializer
    pub entry: Option<String>,
}

impl Script {
    /// Fresh stepper for the module's top-level statements
    pub fn initializer(&self) -> Stepper {
        let module: Rc<str> = Rc::from(self.name.as_str());
        compile::program(&self.program, &module)
    }
}
