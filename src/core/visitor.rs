/// Tree visitor — applies grammar semantics to one parse tree.

use rustc_hash::FxHashMap;

use crate::core::context::Context;
use crate::core::engine::{is_parseable, Engine, EvalOptions, ResolveError};
use crate::core::grammar::RuleSet;
use crate::core::parser::{Expr, Node, Script, TransformCall};
use crate::core::sequence::SelectionMode;
use crate::core::transforms::is_sequence_transform;

/// Output of visiting one tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Visited {
    pub text: String,
    /// Symbols expanded through a binding or a rule during this visit.
    pub expansions: usize,
}

/// Walks a parse tree against the active context. Symbol lookups consult the
/// context bindings first, then `rules`.
pub struct Visitor<'a> {
    engine: &'a mut Engine,
    context: &'a mut Context,
    rules: Option<&'a RuleSet>,
    opts: &'a EvalOptions,
    depth: usize,
    expansions: usize,
    /// How many times each alternation source has been visited in this tree.
    occurrences: FxHashMap<String, usize>,
}

impl<'a> Visitor<'a> {
    pub fn new(
        engine: &'a mut Engine,
        context: &'a mut Context,
        rules: Option<&'a RuleSet>,
        opts: &'a EvalOptions,
        depth: usize,
    ) -> Self {
        Self {
            engine,
            context,
            rules,
            opts,
            depth,
            expansions: 0,
            occurrences: FxHashMap::default(),
        }
    }

    pub fn visit(mut self, script: &Script) -> Result<Visited, ResolveError> {
        let root = &script.root;
        let text = if root.is_alternation() {
            self.choose(root, SelectionMode::Weighted)?.trim().to_string()
        } else {
            self.sequence(&root.alternatives[0].nodes)?
        };
        Ok(Visited {
            text,
            expansions: self.expansions,
        })
    }

    fn sequence(&mut self, nodes: &[Node]) -> Result<String, ResolveError> {
        let mut out = String::new();
        for node in nodes {
            out.push_str(&self.node(node)?);
        }
        Ok(out)
    }

    fn node(&mut self, node: &Node) -> Result<String, ResolveError> {
        match node {
            Node::Text(text) => Ok(text.clone()),
            Node::Symbol {
                name,
                transforms,
                source,
            } => self.symbol(name, transforms, source),
            Node::Choice { expr, transforms } => {
                let mode = SelectionMode::from_transforms(transforms);
                let text = self.choose(expr, mode)?.trim().to_string();
                self.apply_transforms(text, transforms)
            }
            Node::Assign {
                name,
                value,
                transforms,
                silent,
            } => {
                let mut text = self.choose(value, SelectionMode::Weighted)?.trim().to_string();
                if is_parseable(&text) {
                    text = self.resolve_nested(&text)?;
                }
                self.context.bind(name, text.clone());
                if *silent {
                    Ok(String::new())
                } else {
                    self.apply_transforms(text, transforms)
                }
            }
            Node::Transforms(calls) => self.apply_transforms(String::new(), calls),
        }
    }

    fn symbol(
        &mut self,
        name: &str,
        transforms: &[TransformCall],
        source: &str,
    ) -> Result<String, ResolveError> {
        let value = if let Some(bound) = self.context.binding(name) {
            bound.to_string()
        } else if let Some(rule) = self.rules.and_then(|rules| rules.get(name)) {
            let mode = SelectionMode::from_transforms(transforms);
            let weights = rule.weights();
            let engine = &mut *self.engine;
            let key = format!("rule:{}", name);
            let index = engine
                .sequencer
                .select(&key, mode, &weights, &mut engine.rng)
                .unwrap_or(0);
            match rule.alternatives.get(index) {
                Some(alt) => alt.text.clone(),
                None => String::new(),
            }
        } else {
            return Ok(source.to_string());
        };
        self.expansions += 1;
        self.apply_transforms(value, transforms)
    }

    /// Select one alternative of `expr` and resolve its nodes. Sequencing
    /// state is kept per site: identical alternations in one tree are told
    /// apart by their occurrence index.
    fn choose(&mut self, expr: &Expr, mode: SelectionMode) -> Result<String, ResolveError> {
        let weights: Vec<f64> = expr.alternatives.iter().map(|a| a.weight()).collect();
        let seen = self.occurrences.entry(expr.source.clone()).or_insert(0);
        let key = format!("alt:{}#{}", expr.source, seen);
        *seen += 1;
        let engine = &mut *self.engine;
        let index = engine
            .sequencer
            .select(&key, mode, &weights, &mut engine.rng)
            .unwrap_or(0);
        match expr.alternatives.get(index) {
            Some(alt) => self.sequence(&alt.nodes),
            None => Ok(String::new()),
        }
    }

    /// Apply a transform chain left to right. Text that still holds markup is
    /// resolved first; if it cannot be, the node is re-emitted as markup so a
    /// later pass can retry.
    fn apply_transforms(
        &mut self,
        text: String,
        calls: &[TransformCall],
    ) -> Result<String, ResolveError> {
        if calls.iter().all(|c| is_sequence_transform(&c.name)) {
            return Ok(text);
        }
        let mut text = text;
        if is_parseable(&text) {
            text = self.resolve_nested(&text)?;
            if is_parseable(&text) {
                return Ok(format!("({}){}", text, render_calls(calls)));
            }
        }
        for (i, call) in calls.iter().enumerate() {
            if is_sequence_transform(&call.name) {
                continue;
            }
            match self.context.transform(&call.name, &self.engine.registry) {
                Some(f) => text = f(&text),
                None => {
                    if !self.opts.silent {
                        eprintln!("[WARN] Unknown transform '.{}()'", call.name);
                    }
                    text.push_str(&render_calls(&calls[i..]));
                    break;
                }
            }
        }
        Ok(text)
    }

    fn resolve_nested(&mut self, text: &str) -> Result<String, ResolveError> {
        self.engine
            .resolve(text, self.context, self.opts, self.rules, self.depth + 1)
    }
}

fn render_calls(calls: &[TransformCall]) -> String {
    calls.iter().map(|c| c.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::parse;

    fn visit(engine: &mut Engine, ctx: &mut Context, input: &str) -> Visited {
        let script = parse(input).unwrap();
        let opts = EvalOptions {
            silent: true,
            ..EvalOptions::default()
        };
        Visitor::new(engine, ctx, None, &opts, 0).visit(&script).unwrap()
    }

    #[test]
    fn literal_text_passes_through() {
        let mut engine = Engine::with_seed(1);
        let mut ctx = Context::new();
        let out = visit(&mut engine, &mut ctx, "plain &amp; simple.");
        assert_eq!(out.text, "plain &amp; simple.");
        assert_eq!(out.expansions, 0);
    }

    #[test]
    fn bound_symbol_expands() {
        let mut engine = Engine::with_seed(1);
        let mut ctx = Context::new();
        ctx.bind("name", "Dave");
        let out = visit(&mut engine, &mut ctx, "hi $name.uc()!");
        assert_eq!(out.text, "hi DAVE!");
        assert_eq!(out.expansions, 1);
    }

    #[test]
    fn unknown_symbol_is_left_verbatim() {
        let mut engine = Engine::with_seed(1);
        let mut ctx = Context::new();
        let out = visit(&mut engine, &mut ctx, "hi $nobody.uc()");
        assert_eq!(out.text, "hi $nobody.uc()");
        assert_eq!(out.expansions, 0);
    }

    #[test]
    fn assignment_binds_and_emits() {
        let mut engine = Engine::with_seed(1);
        let mut ctx = Context::new();
        let out = visit(&mut engine, &mut ctx, "[$x = (a|b)] and $x");
        let chosen = ctx.binding("x").unwrap().to_string();
        assert_eq!(out.text, format!("{} and {}", chosen, chosen));
    }

    #[test]
    fn silent_assignment_emits_nothing() {
        let mut engine = Engine::with_seed(1);
        let mut ctx = Context::new();
        let out = visit(&mut engine, &mut ctx, "{$x = cat}the $x");
        assert_eq!(out.text, "the cat");
    }

    #[test]
    fn choice_is_trimmed_and_transformed() {
        let mut engine = Engine::with_seed(1);
        let mut ctx = Context::new();
        let out = visit(&mut engine, &mut ctx, "( dog ).toUpperCase()");
        assert_eq!(out.text, "DOG");
    }

    #[test]
    fn unknown_transform_is_kept() {
        let mut engine = Engine::with_seed(1);
        let mut ctx = Context::new();
        let out = visit(&mut engine, &mut ctx, "(dog).nope().uc()");
        assert_eq!(out.text, "dog.nope().uc()");
    }

    #[test]
    fn identical_sequences_advance_independently() {
        let mut engine = Engine::with_seed(1);
        let mut ctx = Context::new();
        let input = "(a|b|c).seq() (a|b|c).seq()";
        assert_eq!(visit(&mut engine, &mut ctx, input).text, "a a");
        assert_eq!(visit(&mut engine, &mut ctx, input).text, "b b");
    }

    #[test]
    fn context_transform_on_empty() {
        let mut engine = Engine::with_seed(1);
        let mut ctx = Context::new();
        ctx.add_transform("pos", |_: &str| "jobArea jobType".to_string());
        let out = visit(&mut engine, &mut ctx, ".pos().");
        assert_eq!(out.text, "jobArea jobType.");
    }
}
