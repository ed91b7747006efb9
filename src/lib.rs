//! Resolvent — generative grammars over a small inline markup.
//!
//! Markup such as `The (cat | dog).uc() [$who = $name] ran.` is rewritten
//! pass by pass until it stops changing: alternations pick a weighted
//! option, `$symbols` expand through bindings or grammar rules, and
//! transforms post-process the result. A `Grammar` adds a rule store with
//! `expand()` from a start symbol.
//!
//! ```no_run
//! use resolvent::{Grammar, RuleSet};
//!
//! let rules = RuleSet::parse_json(r#"{ "start": "$pet.articlize() barks.", "pet": "dog | hound" }"#)?;
//! let mut grammar = Grammar::with_engine(rules, resolvent::Engine::with_seed(42));
//! println!("{}", grammar.expand()?);
//! # Ok::<(), resolvent::GrammarError>(())
//! ```

pub mod core;

pub use crate::core::context::Context;
pub use crate::core::engine::{Engine, EngineBuilder, EvalOptions, ResolveError, MAX_PASSES};
pub use crate::core::grammar::{ExpandOptions, Grammar, GrammarError, Rule, RuleSet};
pub use crate::core::transforms::{TransformFn, TransformRegistry};
