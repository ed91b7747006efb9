/// Transform registry — named string-to-string functions chained with `.name()`.

use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

use crate::core::english;

/// A transform function. Closures may capture whatever they need, including
/// handles to other grammar facilities.
pub type TransformFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Names that select how an alternation picks its next alternative. They are
/// registered as identity transforms but intercepted by the visitor first.
pub const SEQUENCE_TRANSFORMS: &[&str] = &["seq", "rseq", "norep"];

/// Registry of transform functions owned by an engine.
#[derive(Clone)]
pub struct TransformRegistry {
    transforms: FxHashMap<String, TransformFn>,
}

impl TransformRegistry {
    /// Create an empty registry.
    pub fn empty() -> Self {
        Self {
            transforms: FxHashMap::default(),
        }
    }

    /// Create a registry holding the default transforms.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.add("capitalize", english::capitalize);
        registry.add("ucf", english::capitalize);
        registry.add("uc", str::to_uppercase);
        registry.add("toUpperCase", str::to_uppercase);
        registry.add("toLowerCase", str::to_lowercase);
        registry.add("quotify", quotify);
        registry.add("qq", quotify);
        registry.add("pluralize", english::pluralize);
        registry.add("articlize", english::articlize);
        registry.add("trim", |s: &str| s.trim().to_string());
        for name in SEQUENCE_TRANSFORMS {
            registry.add(name, str::to_string);
        }
        registry
    }

    /// Register or overwrite a transform.
    pub fn add<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.transforms.insert(name.to_string(), Arc::new(f));
    }

    /// Register an already shared transform.
    pub fn insert(&mut self, name: &str, f: TransformFn) {
        self.transforms.insert(name.to_string(), f);
    }

    /// Remove a transform, returning whether it was present.
    pub fn remove(&mut self, name: &str) -> bool {
        self.transforms.remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&TransformFn> {
        self.transforms.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.transforms.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.transforms.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformRegistry")
            .field("transforms", &self.names())
            .finish()
    }
}

/// Wrap in encoded double quotes; decoded at the end of evaluation.
fn quotify(s: &str) -> String {
    format!("&quot;{}&quot;", s)
}

/// Whether `name` is one of the sequencing-mode markers.
pub fn is_sequence_transform(name: &str) -> bool {
    SEQUENCE_TRANSFORMS.contains(&name)
}
