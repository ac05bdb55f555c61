//! # Environment - Runtime Instance and Loading State Machine
//!
//! The environment owns every piece of runtime state: the context arena,
//! the trace stack, the module loader and the natives registered by the
//! host. It is brought up in a fixed order:
//!
//! ```text
//! Natives --load_natives--> Builtins --load_builtins--> PreNormal --load_normal--> Normal
//! ```
//!
//! Each loading method requires the exact predecessor state. Embedders that
//! do not need the standard library can `transition_immediately_to_normal`.

pub mod artifact;
pub mod loader;
pub mod natives;
pub mod parser;
pub mod script;
pub mod traceback;

#[cfg(test)]
mod tests;

pub use loader::{ImportError, Loader, ModuleError};
pub use natives::NativeRegistry;
pub use parser::{JsonAstParser, ParseError, ScriptParser};
pub use script::{Script, Tier};
pub use traceback::{Location, TraceFrame, Traceback};

use crate::config::Config;
use crate::error::EnvironmentError;
use crate::interpreter::callable::{Callable, Named, NativeFunction};
use crate::interpreter::context::{ContextArena, ContextId};
use crate::interpreter::errors::{ErrorInfo, LOADING_FAILED, NOT_CALLABLE};
use crate::interpreter::exec_loop;
use crate::interpreter::stdlib;
use crate::interpreter::types::{ExecResult, Program, Span, State, Val};
use indexmap::IndexMap;
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Loading cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LoadingState {
    Natives,
    Builtins,
    PreNormal,
    Normal,
}

impl LoadingState {
    /// Tiers whose locations are indexed in this state
    fn working_tiers(self) -> &'static [Tier] {
        match self {
            LoadingState::Natives => &[Tier::Native],
            LoadingState::Builtins => &[Tier::Native, Tier::Builtin, Tier::PreLibrary],
            LoadingState::PreNormal | LoadingState::Normal => &Tier::ALL,
        }
    }
}

/// Where `print` output goes
#[derive(Debug, Clone)]
enum Output {
    Stdout,
    Capture(Vec<String>),
}

pub struct Environment {
    state: LoadingState,
    contexts: ContextArena,
    traceback: Traceback,
    loader: Loader,
    /// Search locations per tier, in lookup order
    locations: IndexMap<Tier, Vec<PathBuf>>,
    natives: NativeRegistry,
    /// Default bindings sources, in load order
    native_scripts: IndexMap<String, Script>,
    builtin_scripts: IndexMap<String, Script>,
    parser: Box<dyn ScriptParser>,
    step_limit: Option<u64>,
    steps: u64,
    /// Active user calls across every driver
    call_depth: usize,
    max_call_depth: usize,
    /// Drivers currently running; only the outermost reclaims scopes
    drivers: usize,
    write_artifacts: bool,
    output: Output,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    /// Empty environment with the standard natives registered
    pub fn new() -> Self {
        let mut natives = NativeRegistry::new();
        stdlib::install(&mut natives);

        Self {
            state: LoadingState::Natives,
            contexts: ContextArena::new(),
            traceback: Traceback::new(crate::config::DEFAULT_TRACEBACK_LIMIT),
            loader: Loader::new(),
            locations: Tier::ALL.iter().map(|tier| (*tier, Vec::new())).collect(),
            natives,
            native_scripts: IndexMap::new(),
            builtin_scripts: IndexMap::new(),
            parser: Box::new(JsonAstParser),
            step_limit: None,
            steps: 0,
            call_depth: 0,
            max_call_depth: crate::config::DEFAULT_MAX_CALL_DEPTH,
            drivers: 0,
            write_artifacts: false,
            output: Output::Stdout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let mut env = Self::new();
        for tier in Tier::ALL {
            env.locations
                .insert(tier, config.search.locations(tier).to_vec());
        }
        env.traceback = Traceback::new(config.runtime.traceback_limit);
        env.step_limit = config.runtime.max_steps;
        env.max_call_depth = config.runtime.max_call_depth;
        env.write_artifacts = config.runtime.write_artifacts;
        env
    }

    /// Replace the parser collaborator
    pub fn with_parser(mut self, parser: impl ScriptParser + 'static) -> Self {
        self.parser = Box::new(parser);
        self
    }

    pub fn state(&self) -> LoadingState {
        self.state
    }

    /* ===================== Host Surface ===================== */

    /// Register a host native under a module name
    ///
    /// Only natives registered before `load_natives` are bound.
    pub fn register_native(
        &mut self,
        module: &str,
        name: &str,
        func: impl Fn(&[Val], &Named, &mut Environment) -> ExecResult + 'static,
    ) {
        self.natives.register(module, NativeFunction::new(name, func));
    }

    pub fn natives_mut(&mut self) -> &mut NativeRegistry {
        &mut self.natives
    }

    /// Append a search location; reindexes if the tier is being searched
    pub fn add_search_location(
        &mut self,
        tier: Tier,
        path: impl Into<PathBuf>,
    ) -> Result<(), EnvironmentError> {
        self.locations.entry(tier).or_default().push(path.into());
        if self.state.working_tiers().contains(&tier) {
            self.reindex()?;
        }
        Ok(())
    }

    pub fn set_step_limit(&mut self, limit: Option<u64>) {
        self.step_limit = limit;
    }

    pub fn step_limit(&self) -> Option<u64> {
        self.step_limit
    }

    /// Count one step; false once the budget is spent
    pub(crate) fn tick(&mut self) -> bool {
        self.steps += 1;
        match self.step_limit {
            Some(limit) => self.steps <= limit,
            None => true,
        }
    }

    /// Limit on nested user calls; 0 means unbounded
    pub fn set_max_call_depth(&mut self, depth: usize) {
        self.max_call_depth = depth;
    }

    pub fn max_call_depth(&self) -> usize {
        self.max_call_depth
    }

    /// User calls currently in flight
    pub fn call_depth(&self) -> usize {
        self.call_depth
    }

    pub(crate) fn call_depth_exceeded(&self) -> bool {
        self.max_call_depth != 0 && self.call_depth >= self.max_call_depth
    }

    pub(crate) fn enter_call(&mut self) {
        self.call_depth += 1;
    }

    pub(crate) fn leave_call(&mut self) {
        self.call_depth = self.call_depth.saturating_sub(1);
    }

    /// Register a running driver; true for the outermost one
    ///
    /// The outermost driver opens a new arena epoch, so scopes that existed
    /// before it started are never swept by it.
    pub(crate) fn enter_driver(&mut self) -> bool {
        self.drivers += 1;
        let outermost = self.drivers == 1;
        if outermost {
            self.contexts.begin_epoch();
        }
        outermost
    }

    pub(crate) fn leave_driver(&mut self) {
        self.drivers = self.drivers.saturating_sub(1);
    }

    /// Top-level contexts of every loaded module
    pub(crate) fn module_contexts(&self) -> Vec<ContextId> {
        self.loader
            .scripts()
            .chain(self.native_scripts.values())
            .chain(self.builtin_scripts.values())
            .map(|script| script.context)
            .collect()
    }

    /// Collect `print` output instead of writing to stdout
    pub fn capture_output(&mut self) {
        self.output = Output::Capture(Vec::new());
    }

    pub fn take_output(&mut self) -> Vec<String> {
        match &mut self.output {
            Output::Capture(lines) => std::mem::take(lines),
            Output::Stdout => Vec::new(),
        }
    }

    pub(crate) fn print(&mut self, line: String) {
        match &mut self.output {
            Output::Stdout => println!("{}", line),
            Output::Capture(lines) => lines.push(line),
        }
    }

    pub fn contexts(&self) -> &ContextArena {
        &self.contexts
    }

    pub fn contexts_mut(&mut self) -> &mut ContextArena {
        &mut self.contexts
    }

    /* ===================== Trace Stack ===================== */

    pub fn traceback(&self) -> &Traceback {
        &self.traceback
    }

    pub fn traceback_mut(&mut self) -> &mut Traceback {
        &mut self.traceback
    }

    pub fn push_traceback(&mut self, frame: TraceFrame) {
        self.traceback.push(frame);
    }

    pub fn pop_traceback(&mut self) -> Option<TraceFrame> {
        self.traceback.pop()
    }

    pub fn format_traceback(&self) -> String {
        self.traceback.format()
    }

    /// Build an abnormal result, recording where it was raised
    pub fn raise(
        &mut self,
        state: State,
        value: Val,
        at: &Location,
        description: impl Into<String>,
    ) -> ExecResult {
        let frame = TraceFrame::new(at.clone(), description);
        ExecResult::abnormal(state, value, frame, &mut self.traceback)
    }

    /// Throw an error value
    pub fn throw_error(&mut self, info: ErrorInfo, at: &Location) -> ExecResult {
        let description = info.to_string();
        self.raise(State::Throwing, Val::Error(info), at, description)
    }

    /* ===================== Loading State Machine ===================== */

    /// Execute every native module
    ///
    /// Native modules are the indexed native-tier scripts plus the modules
    /// registered in the native registry, in name order.
    pub fn load_natives(&mut self) -> Result<ExecResult, EnvironmentError> {
        self.expect_state("load_natives", LoadingState::Natives)?;
        info!("loading natives");
        self.steps = 0;
        self.reindex()?;

        let mut names: BTreeSet<String> = self.loader.names_in(Tier::Native).into_iter().collect();
        names.extend(self.natives.modules().map(str::to_string));

        for name in names {
            let script = self.bootstrap_module(&name)?;
            self.native_scripts.insert(name, script);
        }

        self.advance_to(LoadingState::Builtins)?;
        Ok(ExecResult::void())
    }

    /// Execute builtin modules, then pre-library modules
    ///
    /// Only builtins become default bindings; pre-library modules stay
    /// importable by name.
    pub fn load_builtins(&mut self) -> Result<ExecResult, EnvironmentError> {
        self.expect_state("load_builtins", LoadingState::Builtins)?;
        info!("loading builtins");
        self.steps = 0;

        let mut builtins = IndexMap::new();
        for name in self.loader.names_in(Tier::Builtin) {
            let script = self.bootstrap_module(&name)?;
            builtins.insert(name, script);
        }
        for name in self.loader.names_in(Tier::PreLibrary) {
            self.bootstrap_module(&name)?;
        }
        self.builtin_scripts = builtins;

        self.advance_to(LoadingState::PreNormal)?;
        Ok(ExecResult::void())
    }

    pub fn load_normal(&mut self) -> Result<ExecResult, EnvironmentError> {
        self.expect_state("load_normal", LoadingState::PreNormal)?;
        self.advance_to(LoadingState::Normal)?;
        Ok(ExecResult::void())
    }

    /// Skip the remaining bring-up stages
    pub fn transition_immediately_to_normal(&mut self) -> Result<(), EnvironmentError> {
        if self.state == LoadingState::Normal {
            return Err(EnvironmentError::AlreadyNormal);
        }
        self.advance_to(LoadingState::Normal)
    }

    fn expect_state(
        &self,
        operation: &'static str,
        expected: LoadingState,
    ) -> Result<(), EnvironmentError> {
        if self.state != expected {
            return Err(EnvironmentError::OutOfOrder {
                operation,
                expected,
                found: self.state,
            });
        }
        Ok(())
    }

    fn advance_to(&mut self, next: LoadingState) -> Result<(), EnvironmentError> {
        info!(from = ?self.state, to = ?next, "loading state transition");
        self.state = next;
        self.reindex()
    }

    fn reindex(&mut self) -> Result<(), EnvironmentError> {
        let working: Vec<(Tier, PathBuf)> = self
            .state
            .working_tiers()
            .iter()
            .flat_map(|tier| {
                self.locations
                    .get(tier)
                    .into_iter()
                    .flatten()
                    .map(move |path| (*tier, path.clone()))
            })
            .collect();
        self.loader.reindex(&working)
    }

    /// Load a module during bring-up; any failure aborts it
    ///
    /// The error carries the abnormal result the failure would have produced
    /// at an import site.
    fn bootstrap_module(&mut self, name: &str) -> Result<Script, EnvironmentError> {
        match self.get_module(name) {
            Ok(script) => Ok(script),
            Err(err) => {
                let reason = err.to_string();
                let at = Location::new(name, Span::default());
                let result = self.module_failure(name, err, &at);
                Err(EnvironmentError::Bootstrap {
                    module: name.to_string(),
                    reason,
                    result,
                })
            }
        }
    }

    /* ===================== Modules ===================== */

    /// Resolve, initialize and cache a module
    pub fn get_module(&mut self, name: &str) -> Result<Script, ModuleError> {
        if let Some(script) = self.loader.cached(name) {
            return Ok(script.clone());
        }

        self.loader.enter(name)?;
        debug!(module = name, depth = self.loader.resolving().len(), "resolving module");
        let result = self.resolve(name);
        self.loader.leave(name);

        if let Ok(script) = &result {
            self.loader.store(script.clone());
        }
        result
    }

    /// Module object for `name`, or the failure as a Throwing result
    pub fn get_module_execution(&mut self, name: &str) -> ExecResult {
        let at = Location::new(name, Span::default());
        self.import(name, &at)
    }

    /// Import as seen from a script: failures become catchable errors
    pub(crate) fn import(&mut self, name: &str, at: &Location) -> ExecResult {
        match self.get_module(name) {
            Ok(script) => ExecResult::normal(Val::Obj(script.context)),
            Err(err) => self.module_failure(name, err, at),
        }
    }

    /// Throwing result for a module that could not be produced
    fn module_failure(&mut self, name: &str, err: ModuleError, at: &Location) -> ExecResult {
        match err {
            ModuleError::Import(err) => {
                self.throw_error(ErrorInfo::new(err.code(), err.to_string()), at)
            }
            ModuleError::Initialization(result) => {
                let value = match result.state() {
                    State::Throwing => result.into_value(),
                    other => Val::Error(ErrorInfo::new(
                        LOADING_FAILED,
                        format!("initializer of '{}' ended with {:?}", name, other),
                    )),
                };
                self.raise(State::Throwing, value, at, format!("while importing {}", name))
            }
        }
    }

    fn resolve(&mut self, name: &str) -> Result<Script, ModuleError> {
        let files = self.loader.find(name).cloned();
        let (tier, origin, program) = match files {
            Some(files) => {
                let program = self.load_program(name, &files)?;
                (files.tier, files.source.or(files.artifact), program)
            }
            // Host-only native module
            None if self.natives.contains_module(name) => {
                (Tier::Native, None, Program::default())
            }
            None => return Err(ImportError::Absent(name.to_string()).into()),
        };

        let script = self.instantiate(name, tier, origin, program);
        let result = self.execute(&script);
        if result.is_abnormal() {
            self.contexts.release_uncaptured(script.context);
            return Err(ModuleError::Initialization(result));
        }
        Ok(script)
    }

    /// Program for a module: a fresh artifact if there is one, else the parsed source
    fn load_program(&self, name: &str, files: &loader::ModuleFiles) -> Result<Program, ImportError> {
        let source = match &files.source {
            Some(path) => Some(fs::read_to_string(path).map_err(|e| ImportError::LoadingFailed {
                module: name.to_string(),
                reason: format!("{}: {}", path.display(), e),
            })?),
            None => None,
        };

        if let Some(path) = &files.artifact {
            match artifact::read(path) {
                Ok(found) if found.is_fresh(name, source.as_deref()) => {
                    debug!(module = name, "using compiled artifact");
                    return Ok(found.program);
                }
                Ok(_) => warn!(module = name, path = %path.display(), "ignoring stale artifact"),
                Err(err) => {
                    warn!(module = name, path = %path.display(), error = %err, "unreadable artifact")
                }
            }
        }

        let Some(text) = source else {
            return Err(ImportError::LoadingFailed {
                module: name.to_string(),
                reason: "no source and no usable artifact".to_string(),
            });
        };
        let program = self.parser.parse(name, &text)?;

        if self.write_artifacts {
            if let Some(source_path) = &files.source {
                let path = artifact::artifact_path(source_path);
                let envelope = artifact::Artifact::new(name, Some(&text), program.clone());
                if let Err(err) = artifact::write(&path, &envelope) {
                    warn!(module = name, path = %path.display(), error = %err, "failed to write artifact");
                }
            }
        }
        Ok(program)
    }

    /// Create the module's top-level context and bind its defaults
    fn instantiate(
        &mut self,
        name: &str,
        tier: Tier,
        origin: Option<PathBuf>,
        program: Program,
    ) -> Script {
        let context = self.contexts.create(None);
        let entry = program.entry.clone();
        let script = Script {
            name: name.to_string(),
            tier,
            origin,
            context,
            program: Rc::new(program),
            entry,
        };

        if tier == Tier::Native {
            for (binding, func) in self.natives.bindings(name) {
                let value = Val::Func(Callable::Native(func));
                if let Err(err) = self.contexts.declare(context, &binding, value, &[]) {
                    warn!(module = name, binding = %binding, error = %err, "could not bind native");
                }
            }
        } else {
            self.apply_defaults(&script);
        }
        script
    }

    /// Run a module initializer; a top-level return ends it normally
    fn execute(&mut self, script: &Script) -> ExecResult {
        let mark = self.traceback.mark();
        let mut initializer = script.initializer();
        let result = exec_loop::run_until_done(&mut initializer, script.context, self);
        if result.state() == State::Returning {
            self.traceback.truncate(mark);
            return result.absorb();
        }
        result
    }

    /// Copy native and builtin bindings into a script's top-level context
    ///
    /// Bindings flagged `Private` or `NoImport` are skipped. Builtins are only
    /// available once `load_builtins` has completed.
    pub fn apply_defaults(&mut self, script: &Script) {
        let sources: Vec<ContextId> = self
            .native_scripts
            .values()
            .chain(self.builtin_scripts.values())
            .map(|s| s.context)
            .collect();

        for source in sources {
            for (name, value) in self.contexts.default_bindings(source) {
                if let Err(err) = self.contexts.declare(script.context, &name, value, &[]) {
                    warn!(module = %script.name, binding = %name, error = %err, "default binding skipped");
                }
            }
        }
    }

    /* ===================== Running Scripts ===================== */

    /// Compile source text into a script that has not run yet
    pub fn compile_script(&mut self, name: &str, source: &str) -> Result<Script, ModuleError> {
        let program = self.parser.parse(name, source).map_err(ImportError::from)?;
        Ok(self.compile_program(name, program))
    }

    /// Bind an already-parsed program to a fresh context
    pub fn compile_program(&mut self, name: &str, program: Program) -> Script {
        self.instantiate(name, Tier::Normal, None, program)
    }

    /// Run the initializer, then the entry function if the program names one
    pub fn run_script(&mut self, script: &Script) -> ExecResult {
        self.steps = 0;
        let result = self.execute(script);
        if result.is_abnormal() {
            return result;
        }

        let Some(entry) = &script.entry else {
            return result;
        };
        let target = self.contexts.get(script.context, entry);
        self.call(&target, Vec::new(), Named::new())
    }

    /// Call a function value from the host
    pub fn call(&mut self, target: &Val, args: Vec<Val>, named: Named) -> ExecResult {
        match target {
            Val::Func(func) => func.invoke(args, named, self),
            other => {
                let info = ErrorInfo::new(NOT_CALLABLE, format!("{} is not callable", other.type_name()));
                self.throw_error(info, &Location::new("<host>", Span::default()))
            }
        }
    }
}
