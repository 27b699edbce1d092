use crate::version::SchemaVersion;
use std::collections::HashMap;
use std::fmt;

/// When a hook runs relative to the statements of its step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookStage {
    Pre,
    Post,
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookStage::Pre => f.write_str("Pre"),
            HookStage::Post => f.write_str("Post"),
        }
    }
}

/// Pre and post update hooks keyed by the version a step produces.
///
/// `F` is the backend's hook signature, e.g. `dyn Fn(&rusqlite::Transaction) -> Result<(), Error>`.
/// Hooks receive the step's open transaction by reference, so they can read and write
/// through it but cannot commit, roll back or close it.
pub struct HookRegistry<F: ?Sized> {
    pre: HashMap<SchemaVersion, Box<F>>,
    post: HashMap<SchemaVersion, Box<F>>,
}

impl<F: ?Sized> HookRegistry<F> {
    pub fn new() -> Self {
        Self {
            pre: HashMap::new(),
            post: HashMap::new(),
        }
    }

    /// Register a hook, replacing any hook already set for the same version and stage.
    pub fn insert(&mut self, stage: HookStage, version: SchemaVersion, hook: Box<F>) {
        match stage {
            HookStage::Pre => self.pre.insert(version, hook),
            HookStage::Post => self.post.insert(version, hook),
        };
    }

    pub fn get(&self, stage: HookStage, version: SchemaVersion) -> Option<&F> {
        match stage {
            HookStage::Pre => self.pre.get(&version),
            HookStage::Post => self.post.get(&version),
        }
        .map(|hook| hook.as_ref())
    }

    pub fn len(&self) -> usize {
        self.pre.len() + self.post.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pre.is_empty() && self.post.is_empty()
    }
}

impl<F: ?Sized> Default for HookRegistry<F> {
    fn default() -> Self {
        Self::new()
    }
}

// Manual Debug impl since closures don't implement Debug
impl<F: ?Sized> fmt::Debug for HookRegistry<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut pre: Vec<_> = self.pre.keys().collect();
        pre.sort();
        let mut post: Vec<_> = self.post.keys().collect();
        post.sort();
        f.debug_struct("HookRegistry")
            .field("pre", &pre)
            .field("post", &post)
            .finish()
    }
}
