/// Evaluation context — variable bindings plus a transform overlay for one call.

use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

use crate::core::transforms::{TransformFn, TransformRegistry};

/// Per-call state for `evaluate`.
///
/// Bindings are set by the caller or by `[$x = …]` assignments during
/// evaluation. Overlay transforms shadow the engine registry for the
/// duration of the call and never leak into it.
#[derive(Clone, Default)]
pub struct Context {
    bindings: FxHashMap<String, String>,
    transforms: FxHashMap<String, TransformFn>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a variable; a leading `$` is ignored.
    pub fn bind(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.bindings
            .insert(name.trim_start_matches('$').to_string(), value.into());
        self
    }

    pub fn binding(&self, name: &str) -> Option<&str> {
        self.bindings
            .get(name.trim_start_matches('$'))
            .map(String::as_str)
    }

    pub fn bindings(&self) -> &FxHashMap<String, String> {
        &self.bindings
    }

    /// Add a transform visible only to evaluations using this context.
    pub fn add_transform<F>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.transforms.insert(name.to_string(), Arc::new(f));
        self
    }

    /// Copy the bindings and overlay transforms of `other` into this context,
    /// replacing same-named entries.
    pub fn extend(&mut self, other: &Context) {
        for (name, value) in &other.bindings {
            self.bindings.insert(name.clone(), value.clone());
        }
        for (name, f) in &other.transforms {
            self.transforms.insert(name.clone(), Arc::clone(f));
        }
    }

    /// Look a transform up in the overlay first, then in `registry`.
    pub fn transform<'a>(
        &'a self,
        name: &str,
        registry: &'a TransformRegistry,
    ) -> Option<&'a TransformFn> {
        self.transforms.get(name).or_else(|| registry.get(name))
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.transforms.keys().collect();
        names.sort();
        f.debug_struct("Context")
            .field("bindings", &self.bindings)
            .field("transforms", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bindings_ignore_sigil() {
        let mut ctx = Context::new();
        ctx.bind("$name", "Dave");
        assert_eq!(ctx.binding("name"), Some("Dave"));
        assert_eq!(ctx.binding("$name"), Some("Dave"));
        ctx.bind("name", "Jill");
        assert_eq!(ctx.binding("name"), Some("Jill"));
    }

    #[test]
    fn overlay_shadows_registry() {
        let registry = TransformRegistry::new();
        let mut ctx = Context::new();
        ctx.add_transform("uc", |_: &str| "shadowed".to_string());
        assert_eq!((ctx.transform("uc", &registry).unwrap())("x"), "shadowed");
        assert_eq!(
            (ctx.transform("capitalize", &registry).unwrap())("x"),
            "X"
        );
        assert!(ctx.transform("missing", &registry).is_none());
    }

    #[test]
    fn extend_overrides_same_names() {
        let mut base = Context::new();
        base.bind("a", "1").add_transform("t", |_: &str| "base".to_string());
        let mut extra = Context::new();
        extra.bind("a", "2").add_transform("t", |_: &str| "extra".to_string());
        base.extend(&extra);
        let registry = TransformRegistry::empty();
        assert_eq!(base.binding("a"), Some("2"));
        assert_eq!((base.transform("t", &registry).unwrap())(""), "extra");
    }

    #[test]
    fn context_debug_lists_names() {
        let mut ctx = Context::new();
        ctx.add_transform("pos", |_: &str| String::new());
        assert!(format!("{:?}", ctx).contains("pos"));
    }
}
