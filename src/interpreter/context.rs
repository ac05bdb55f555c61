//! Scopes and path-addressed variable lookup
//!
//! Every scope lives in a `ContextArena` slot and points at its parent by id,
//! so sibling scopes can share an ancestor and observe each other's writes
//! to it without shared ownership.
//!
//! Name syntax understood by every operation:
//! - `x` resolves through the lexical chain
//! - `a.b.c` resolves `a` lexically, then walks each object's own context
//! - `^x` starts one frame up (repeat the caret to climb further)
//!
//! Scopes are reclaimed two ways. A call scope is released as soon as its
//! call finishes unless a closure captured it. Everything else created while
//! a driver runs (objects, captured scopes, materialized path segments) is
//! swept by `collect` once nothing reachable refers to it.

use super::callable::Callable;
use super::types::{Flag, Val};
use indexmap::IndexMap;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use thiserror::Error;

/// Handle to a scope in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(usize);

impl ContextId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContextError {
    #[error("cannot rebind final name '{0}'")]
    Final(String),

    #[error("'{0}' is private")]
    Private(String),

    #[error("'{name}' is a {found}, not an object")]
    NotAnObject { name: String, found: &'static str },

    #[error("context {0} has been released")]
    Released(ContextId),

    #[error("empty name segment in '{0}'")]
    EmptyName(String),
}

/* ===================== Scope ===================== */

#[derive(Debug, Clone, Default)]
struct Scope {
    values: IndexMap<String, Val>,
    flags: HashMap<String, BTreeSet<Flag>>,
    parent: Option<ContextId>,
    /// Set once a closure holds this scope
    captured: bool,
    /// Arena epoch the scope was created in
    born: u64,
}

impl Scope {
    fn binds(&self, name: &str) -> bool {
        self.values.contains_key(name) || self.flags.contains_key(name)
    }

    fn has_flag(&self, name: &str, flag: Flag) -> bool {
        self.flags.get(name).is_some_and(|set| set.contains(&flag))
    }
}

/* ===================== Arena ===================== */

/// Live scopes needed before the first collection is considered
const MIN_COLLECTION_THRESHOLD: usize = 256;

#[derive(Debug)]
pub struct ContextArena {
    scopes: Vec<Option<Scope>>,
    free: Vec<usize>,
    epoch: u64,
    /// `live_count` at which the next collection is due
    threshold: usize,
}

impl Default for ContextArena {
    fn default() -> Self {
        Self {
            scopes: Vec::new(),
            free: Vec::new(),
            epoch: 0,
            threshold: MIN_COLLECTION_THRESHOLD,
        }
    }
}

impl ContextArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an empty scope
    pub fn create(&mut self, parent: Option<ContextId>) -> ContextId {
        let scope = Scope {
            parent,
            born: self.epoch,
            ..Scope::default()
        };
        self.insert(scope)
    }

    fn insert(&mut self, scope: Scope) -> ContextId {
        match self.free.pop() {
            Some(idx) => {
                self.scopes[idx] = Some(scope);
                ContextId(idx)
            }
            None => {
                self.scopes.push(Some(scope));
                ContextId(self.scopes.len() - 1)
            }
        }
    }

    pub fn is_live(&self, id: ContextId) -> bool {
        self.scope(id).is_some()
    }

    /// Number of scopes currently allocated
    pub fn live_count(&self) -> usize {
        self.scopes.len() - self.free.len()
    }

    pub fn parent(&self, id: ContextId) -> Option<ContextId> {
        self.scope(id).and_then(|scope| scope.parent)
    }

    /* ---------- reads ---------- */

    /// Resolve a name; `Void` when unbound
    pub fn get(&self, id: ContextId, name: &str) -> Val {
        let (carets, path) = split_carets(name);
        match self.climb(id, carets) {
            Some(root) => self.walk(root, path),
            None => Val::Void,
        }
    }

    /// Member of an object, honouring `Private`
    pub fn member(&self, object: ContextId, name: &str) -> Val {
        match self.defining_frame(object, name) {
            Some(frame) if !self.has_local_flag(frame, name, Flag::Private) => {
                self.value_in(frame, name)
            }
            _ => Val::Void,
        }
    }

    /// Whether the name is bound to a value
    pub fn contains(&self, id: ContextId, name: &str) -> bool {
        self.locate(id, name)
            .and_then(|(frame, last)| self.scope(frame).map(|s| s.values.contains_key(last)))
            .unwrap_or(false)
    }

    /// Flags on the binding the name resolves to
    pub fn flags(&self, id: ContextId, name: &str) -> BTreeSet<Flag> {
        self.locate(id, name)
            .and_then(|(frame, last)| self.scope(frame).and_then(|s| s.flags.get(last).cloned()))
            .unwrap_or_default()
    }

    pub fn has_flag(&self, id: ContextId, name: &str, flag: Flag) -> bool {
        self.flags(id, name).contains(&flag)
    }

    /// Identifiers bound in this frame only, in insertion order
    pub fn names(&self, id: ContextId) -> Vec<String> {
        self.scope(id)
            .map(|scope| scope.values.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Like `names`, without members flagged `Private`
    pub fn public_names(&self, id: ContextId) -> Vec<String> {
        self.scope(id)
            .map(|scope| {
                scope
                    .values
                    .keys()
                    .filter(|name| !scope.has_flag(name, Flag::Private))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Bindings of this frame that may be injected into other modules
    pub fn default_bindings(&self, id: ContextId) -> Vec<(String, Val)> {
        let Some(scope) = self.scope(id) else {
            return Vec::new();
        };
        scope
            .values
            .iter()
            .filter(|(name, _)| {
                !scope.has_flag(name, Flag::Private) && !scope.has_flag(name, Flag::NoImport)
            })
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    /* ---------- writes ---------- */

    /// Assign, mutating the innermost existing binding or creating a local one
    pub fn set(&mut self, id: ContextId, name: &str, value: Val) -> Result<(), ContextError> {
        let (target, last) = self.write_target(id, name)?;
        self.assign(target, last, value)
    }

    /// Bind in the target frame itself, shadowing any ancestor binding
    pub fn declare(
        &mut self,
        id: ContextId,
        name: &str,
        value: Val,
        flags: &[Flag],
    ) -> Result<(), ContextError> {
        let (target, last) = self.write_target(id, name)?;
        let scope = self.scope_mut(target)?;
        if scope.values.contains_key(last) && scope.has_flag(last, Flag::Final) {
            return Err(ContextError::Final(last.to_string()));
        }
        scope.values.insert(last.to_string(), value);
        if flags.is_empty() {
            scope.flags.remove(last);
        } else {
            scope
                .flags
                .insert(last.to_string(), flags.iter().copied().collect());
        }
        Ok(())
    }

    /// Add a modifier to the binding the name resolves to
    ///
    /// Flags on a name that is not bound yet are recorded in the target
    /// frame, so a later `set` lands there.
    pub fn set_flag(&mut self, id: ContextId, name: &str, flag: Flag) -> Result<(), ContextError> {
        let (target, last) = self.write_target(id, name)?;
        let frame = self.defining_frame(target, last).unwrap_or(target);
        self.scope_mut(frame)?
            .flags
            .entry(last.to_string())
            .or_default()
            .insert(flag);
        Ok(())
    }

    /// Remove value and flags together; returns whether anything was bound
    pub fn del(&mut self, id: ContextId, name: &str) -> bool {
        let Some((frame, last)) = self.locate(id, name) else {
            return false;
        };
        let Ok(scope) = self.scope_mut(frame) else {
            return false;
        };
        let had_value = scope.values.shift_remove(last).is_some();
        let had_flags = scope.flags.remove(last).is_some();
        had_value || had_flags
    }

    /// Shallow duplicate sharing the parent, with independent bindings
    pub fn copy(&mut self, id: ContextId) -> Result<ContextId, ContextError> {
        let mut scope = self.scope(id).cloned().ok_or(ContextError::Released(id))?;
        scope.captured = false;
        scope.born = self.epoch;
        Ok(self.insert(scope))
    }

    /* ---------- lifetime ---------- */

    pub fn mark_captured(&mut self, id: ContextId) {
        if let Ok(scope) = self.scope_mut(id) {
            scope.captured = true;
        }
    }

    /// Free a call scope unless a closure captured it
    pub fn release_uncaptured(&mut self, id: ContextId) -> bool {
        match self.scope(id) {
            Some(scope) if !scope.captured => {
                self.scopes[id.0] = None;
                self.free.push(id.0);
                true
            }
            _ => false,
        }
    }

    /// Start a new epoch; scopes created before it are never swept
    pub fn begin_epoch(&mut self) {
        self.epoch += 1;
    }

    /// Whether the arena has grown enough since the last collection
    pub fn wants_collection(&self) -> bool {
        self.live_count() >= self.threshold
    }

    /// Free scopes of the current epoch that nothing reaches
    ///
    /// Scopes from earlier epochs are roots along with `contexts` and
    /// `values`. Reachability follows parents, bound values, list items and
    /// the closure and defaults of user functions. Returns how many scopes
    /// were freed.
    pub fn collect(&mut self, contexts: &[ContextId], values: &[&Val]) -> usize {
        let marked = self.mark(contexts, values);
        let epoch = self.epoch;
        let mut freed = 0;
        for (idx, slot) in self.scopes.iter_mut().enumerate() {
            let unreachable = slot.as_ref().is_some_and(|s| s.born == epoch) && !marked[idx];
            if unreachable {
                *slot = None;
                self.free.push(idx);
                freed += 1;
            }
        }

        let live = self.live_count();
        self.threshold = (live * 2).max(live + MIN_COLLECTION_THRESHOLD);
        freed
    }

    fn mark(&self, contexts: &[ContextId], values: &[&Val]) -> Vec<bool> {
        let mut marked = vec![false; self.scopes.len()];
        let mut pending_values: Vec<&Val> = values.to_vec();
        let mut pending: Vec<ContextId> = contexts.to_vec();
        pending.extend(
            self.scopes
                .iter()
                .enumerate()
                .filter(|(_, slot)| slot.as_ref().is_some_and(|s| s.born != self.epoch))
                .map(|(idx, _)| ContextId(idx)),
        );

        loop {
            if let Some(value) = pending_values.pop() {
                match value {
                    Val::Obj(object) => pending.push(*object),
                    Val::List(items) => pending_values.extend(items),
                    Val::Func(Callable::User(func)) => {
                        pending.push(func.closure);
                        pending_values.extend(func.defaults.values());
                    }
                    _ => {}
                }
                continue;
            }

            let Some(id) = pending.pop() else {
                break;
            };
            match marked.get_mut(id.0) {
                Some(seen) if !*seen => *seen = true,
                _ => continue,
            }
            if let Some(scope) = self.scope(id) {
                pending.extend(scope.parent);
                pending_values.extend(scope.values.values());
            }
        }
        marked
    }

    /* ===================== Internals ===================== */

    fn scope(&self, id: ContextId) -> Option<&Scope> {
        self.scopes.get(id.0).and_then(Option::as_ref)
    }

    fn scope_mut(&mut self, id: ContextId) -> Result<&mut Scope, ContextError> {
        self.scopes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(ContextError::Released(id))
    }

    fn has_local_flag(&self, frame: ContextId, name: &str, flag: Flag) -> bool {
        self.scope(frame).is_some_and(|s| s.has_flag(name, flag))
    }

    fn value_in(&self, frame: ContextId, name: &str) -> Val {
        self.scope(frame)
            .and_then(|s| s.values.get(name).cloned())
            .unwrap_or(Val::Void)
    }

    /// Innermost frame of the chain that binds the name
    fn defining_frame(&self, id: ContextId, name: &str) -> Option<ContextId> {
        let mut current = Some(id);
        while let Some(frame) = current {
            let scope = self.scope(frame)?;
            if scope.binds(name) {
                return Some(frame);
            }
            current = scope.parent;
        }
        None
    }

    fn lookup(&self, id: ContextId, name: &str) -> Val {
        self.defining_frame(id, name)
            .map(|frame| self.value_in(frame, name))
            .unwrap_or(Val::Void)
    }

    fn climb(&self, id: ContextId, carets: usize) -> Option<ContextId> {
        let mut current = id;
        for _ in 0..carets {
            current = self.parent(current)?;
        }
        Some(current)
    }

    fn ensure_parent(&mut self, id: ContextId) -> Result<ContextId, ContextError> {
        if let Some(parent) = self.scope_mut(id)?.parent {
            return Ok(parent);
        }
        let parent = self.create(None);
        self.scope_mut(id)?.parent = Some(parent);
        Ok(parent)
    }

    /// Resolve a caret-free path starting at `root`
    fn walk(&self, root: ContextId, path: &str) -> Val {
        let mut segments = path.split('.');
        let Some(first) = segments.next() else {
            return Val::Void;
        };
        let mut current = self.lookup(root, first);
        for segment in segments {
            let Val::Obj(object) = current else {
                return Val::Void;
            };
            current = self.member(object, segment);
        }
        current
    }

    /// Frame holding the binding a name resolves to, without creating anything
    fn locate<'n>(&self, id: ContextId, name: &'n str) -> Option<(ContextId, &'n str)> {
        let (carets, path) = split_carets(name);
        let root = self.climb(id, carets)?;
        let Some((head, last)) = path.rsplit_once('.') else {
            return self.defining_frame(root, path).map(|frame| (frame, path));
        };
        let Val::Obj(object) = self.walk(root, head) else {
            return None;
        };
        let frame = self.defining_frame(object, last)?;
        if self.has_local_flag(frame, last, Flag::Private) {
            return None;
        }
        Some((frame, last))
    }

    /// Context and final segment a write lands in
    ///
    /// Creates parents for carets and empty objects for absent intermediate
    /// segments.
    fn write_target<'n>(
        &mut self,
        id: ContextId,
        name: &'n str,
    ) -> Result<(ContextId, &'n str), ContextError> {
        let (carets, path) = split_carets(name);
        let mut current = id;
        for _ in 0..carets {
            current = self.ensure_parent(current)?;
        }

        let mut segments: Vec<&str> = path.split('.').collect();
        let last = segments.pop().unwrap_or_default();
        if last.is_empty() || segments.iter().any(|s| s.is_empty()) {
            return Err(ContextError::EmptyName(name.to_string()));
        }
        if segments.is_empty() {
            return Ok((current, last));
        }

        for (depth, segment) in segments.into_iter().enumerate() {
            let existing = if depth == 0 {
                self.lookup(current, segment)
            } else {
                self.private_checked(current, segment)?
            };
            current = match existing {
                Val::Obj(object) => object,
                Val::Void => {
                    let object = self.create(None);
                    self.assign(current, segment, Val::Obj(object))?;
                    object
                }
                other => {
                    return Err(ContextError::NotAnObject {
                        name: segment.to_string(),
                        found: other.type_name(),
                    })
                }
            };
        }

        // `current` is now an object context reached through a member path
        if let Some(frame) = self.defining_frame(current, last) {
            if self.has_local_flag(frame, last, Flag::Private) {
                return Err(ContextError::Private(last.to_string()));
            }
        }
        Ok((current, last))
    }

    fn private_checked(&self, object: ContextId, name: &str) -> Result<Val, ContextError> {
        match self.defining_frame(object, name) {
            Some(frame) if self.has_local_flag(frame, name, Flag::Private) => {
                Err(ContextError::Private(name.to_string()))
            }
            Some(frame) => Ok(self.value_in(frame, name)),
            None => Ok(Val::Void),
        }
    }

    /// Copy-up assignment
    fn assign(&mut self, id: ContextId, name: &str, value: Val) -> Result<(), ContextError> {
        let frame = self.defining_frame(id, name).unwrap_or(id);
        let scope = self.scope_mut(frame)?;
        if scope.values.contains_key(name) && scope.has_flag(name, Flag::Final) {
            return Err(ContextError::Final(name.to_string()));
        }
        scope.values.insert(name.to_string(), value);
        Ok(())
    }
}

/// Strip leading carets, returning how many there were
fn split_carets(name: &str) -> (usize, &str) {
    let path = name.trim_start_matches('^');
    (name.len() - path.len(), path)
}
