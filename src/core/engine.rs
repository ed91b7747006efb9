/// The resolution engine: markup → text by repeated parse-and-visit passes.
///
/// Each pass splits off plain prefix/suffix words, parses the grammar-bearing
/// middle, visits it, and reassembles the string. Passes repeat until the
/// text stops changing, then entities are decoded and whitespace normalized.

use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::SeedableRng;
use regex::Regex;
use std::fmt;
use thiserror::Error;

use crate::core::context::Context;
use crate::core::entities::resolve_entities;
use crate::core::grammar::RuleSet;
use crate::core::parser::{parse, SyntaxError};
use crate::core::sequence::Sequencer;
use crate::core::transforms::{TransformFn, TransformRegistry};
use crate::core::visitor::{Visited, Visitor};

/// Pass ceiling for one evaluation, and the nesting ceiling for nested
/// resolution inside transforms and assignments.
pub const MAX_PASSES: usize = 99;

static PARSEABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[()]|\$[A-Za-z_0-9][A-Za-z_0-9-]*").unwrap());

static UNRESOLVED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$[A-Za-z_]").unwrap());

/// Characters that mark a word as grammar-bearing during boundary extraction.
const GRAMMAR_CHARS: &[char] = &['(', ')', '$', '|', '{', '}'];

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("lexer error at {position} in \"{input}\": {message}")]
    Lexer {
        input: String,
        position: usize,
        message: String,
    },
    #[error("parser error at {position} in \"{input}\": {message}")]
    Parser {
        input: String,
        position: usize,
        message: String,
    },
    #[error("unable to resolve \"{input}\" after {passes} passes (an infinite loop?)")]
    Unresolvable { input: String, passes: usize },
}

/// Per-call switches for `evaluate`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvalOptions {
    /// Run exactly one pass.
    pub single_pass: bool,
    /// Print each pass to stderr.
    pub trace: bool,
    /// Suppress warnings and front-end diagnostics.
    pub silent: bool,
    /// Parse the whole input instead of splitting off plain prefix/suffix words.
    pub skip_pre_parse: bool,
}

impl EvalOptions {
    pub fn silent() -> Self {
        Self {
            silent: true,
            ..Self::default()
        }
    }
}

/// Resolution engine. Owns the transform registry, the random source and the
/// sequencing state; one engine should serve one logical task at a time.
pub struct Engine {
    pub(crate) registry: TransformRegistry,
    pub(crate) sequencer: Sequencer,
    pub(crate) rng: StdRng,
}

/// Builder for constructing an `Engine`.
pub struct EngineBuilder {
    seed: Option<u64>,
    defaults: bool,
    transforms: Vec<(String, TransformFn)>,
}

impl Engine {
    /// Engine with the default transforms and an entropy-seeded RNG.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Engine with the default transforms and a fixed seed.
    pub fn with_seed(seed: u64) -> Self {
        Self::builder().seed(seed).build()
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder {
            seed: None,
            defaults: true,
            transforms: Vec::new(),
        }
    }

    /// Register or overwrite a transform for all future evaluations.
    pub fn add_transform<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.registry.add(name, f);
    }

    pub fn remove_transform(&mut self, name: &str) -> bool {
        self.registry.remove(name)
    }

    pub fn has_transform(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    pub fn transforms(&self) -> &TransformRegistry {
        &self.registry
    }

    /// Re-seed the random source and forget all sequencing state.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
        self.sequencer.reset();
    }

    /// Evaluate with a fresh context and default options.
    pub fn eval(&mut self, input: &str) -> Result<String, ResolveError> {
        let mut ctx = Context::new();
        self.evaluate(input, &mut ctx, &EvalOptions::default())
    }

    /// Resolve `input` to a fixed point. Assignments made during evaluation
    /// stay bound in `ctx` afterwards.
    pub fn evaluate(
        &mut self,
        input: &str,
        ctx: &mut Context,
        opts: &EvalOptions,
    ) -> Result<String, ResolveError> {
        self.evaluate_with_rules(input, ctx, opts, None)
    }

    pub(crate) fn evaluate_with_rules(
        &mut self,
        input: &str,
        ctx: &mut Context,
        opts: &EvalOptions,
        rules: Option<&RuleSet>,
    ) -> Result<String, ResolveError> {
        let result = self.resolve(input, ctx, opts, rules, 0)?;
        if !opts.silent && has_unresolved(&result) {
            eprintln!("[WARN] Unresolved symbol(s) in \"{}\"", result);
        }
        Ok(resolve_entities(&result))
    }

    /// The resolve-until-stable loop. The loop continues while the text is
    /// parseable and the last pass either changed it or expanded a symbol.
    pub(crate) fn resolve(
        &mut self,
        input: &str,
        ctx: &mut Context,
        opts: &EvalOptions,
        rules: Option<&RuleSet>,
        depth: usize,
    ) -> Result<String, ResolveError> {
        if depth > MAX_PASSES {
            return Err(ResolveError::Unresolvable {
                input: input.to_string(),
                passes: depth,
            });
        }

        let mut current = self.pass(input, ctx, opts, rules, depth)?;
        if opts.trace {
            eprintln!(
                "[resolve] depth={} input=\"{}\" pass#1=\"{}\" bindings={:?}",
                depth,
                escape_newlines(input),
                current.text,
                ctx.bindings()
            );
        }
        if opts.single_pass {
            return Ok(current.text);
        }

        let mut last = input.to_string();
        let mut passes = 1;
        while !current.text.is_empty()
            && is_parseable(&current.text)
            && (current.text != last || current.expansions > 0)
        {
            if passes >= MAX_PASSES {
                return Err(ResolveError::Unresolvable {
                    input: input.to_string(),
                    passes,
                });
            }
            last = current.text;
            current = self.pass(&last, ctx, opts, rules, depth)?;
            passes += 1;
            if opts.trace {
                eprintln!(
                    "[resolve] depth={} pass#{}=\"{}\"",
                    depth, passes, current.text
                );
            }
        }
        Ok(current.text)
    }

    /// One pass: boundary extraction, parse, visit, reassembly.
    fn pass(
        &mut self,
        input: &str,
        ctx: &mut Context,
        opts: &EvalOptions,
        rules: Option<&RuleSet>,
        depth: usize,
    ) -> Result<Visited, ResolveError> {
        let split = pre_parse(input, opts.skip_pre_parse);
        if opts.trace && !(split.pre.is_empty() && split.post.is_empty()) {
            eprintln!("[pre_parse] pre=\"{}\" post=\"{}\"", split.pre, split.post);
        }

        let visited = if split.body.is_empty() {
            Visited::default()
        } else {
            let script = parse(&split.body).map_err(|e| syntax_error(&split.body, e, opts))?;
            Visitor::new(self, ctx, rules, opts, depth).visit(&script)?
        };

        let text = format!(
            "{} {} {}",
            normalize(&split.pre),
            visited.text,
            normalize(&split.post)
        )
        .trim()
        .to_string();
        Ok(Visited {
            text,
            expansions: visited.expansions,
        })
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("registry", &self.registry)
            .field("sequencer", &self.sequencer)
            .finish_non_exhaustive()
    }
}

impl EngineBuilder {
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Start from an empty registry instead of the default transforms.
    pub fn without_default_transforms(mut self) -> Self {
        self.defaults = false;
        self
    }

    pub fn transform<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.transforms
            .push((name.to_string(), std::sync::Arc::new(f)));
        self
    }

    pub fn build(self) -> Engine {
        let mut registry = if self.defaults {
            TransformRegistry::new()
        } else {
            TransformRegistry::empty()
        };
        for (name, f) in self.transforms {
            registry.insert(&name, f);
        }
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Engine {
            registry,
            sequencer: Sequencer::new(),
            rng,
        }
    }
}

/// Whether a string still holds something a pass could rewrite: a
/// parenthesis or a `$symbol`.
pub fn is_parseable(s: &str) -> bool {
    PARSEABLE.is_match(s)
}

/// Whether a string still contains a symbol reference.
pub fn has_unresolved(s: &str) -> bool {
    UNRESOLVED.is_match(s)
}

/// The three slices produced by boundary extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreParse {
    pub pre: String,
    pub body: String,
    pub post: String,
}

/// Split plain words off the front and back of `input` so only the
/// grammar-bearing middle is parsed. Input starting with `$` or `{`, or
/// holding a top-level `|`, is parsed whole.
pub fn pre_parse(input: &str, skip: bool) -> PreParse {
    if skip || input.starts_with(['$', '{']) || has_top_level_pipe(input) {
        return PreParse {
            body: input.to_string(),
            ..PreParse::default()
        };
    }

    let words: Vec<&str> = input.split(' ').filter(|w| !w.is_empty()).collect();
    let is_grammar = |w: &&str| w.contains(GRAMMAR_CHARS);

    let Some(pre_idx) = words.iter().position(is_grammar) else {
        return PreParse {
            pre: words.join(" "),
            ..PreParse::default()
        };
    };
    let post_idx = words.iter().rposition(is_grammar).unwrap_or(pre_idx);

    PreParse {
        pre: words[..pre_idx].join(" "),
        body: words[pre_idx..=post_idx].join(" "),
        post: words[post_idx + 1..].join(" "),
    }
}

fn has_top_level_pipe(input: &str) -> bool {
    let mut depth: i32 = 0;
    for c in input.chars() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            '|' if depth <= 0 => return true,
            _ => {}
        }
    }
    false
}

/// Strip carriage returns and fold escaped or literal newlines into spaces.
fn normalize(s: &str) -> String {
    s.replace('\r', "").replace("\\n", " ").replace('\n', " ")
}

fn escape_newlines(s: &str) -> String {
    s.replace('\n', "\\n")
}

fn syntax_error(input: &str, err: SyntaxError, opts: &EvalOptions) -> ResolveError {
    let err = match err {
        SyntaxError::Lexer(e) => ResolveError::Lexer {
            input: input.to_string(),
            position: e.position,
            message: e.message,
        },
        SyntaxError::Parser { position, message } => ResolveError::Parser {
            input: input.to_string(),
            position,
            message,
        },
    };
    if !opts.silent {
        eprintln!("[ERROR] {}", err);
    }
    err
}
